//! Exact rational matrices.
//!
//! Used to invert schedule relations: the equalities of `{ [c] -> S[i] }`
//! are row-reduced on the output columns, which expresses every statement
//! variable in terms of the loop counters.

use num_integer::Integer;
use num_rational::Rational64;
use num_traits::{One, Signed, Zero};
use std::fmt;

/// A matrix with rational entries, used for exact arithmetic in polyhedral operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RationalMatrix {
    data: Vec<Vec<Rational64>>,
    rows: usize,
    cols: usize,
}

impl RationalMatrix {
    /// Create a new matrix with the given dimensions, initialized to zero.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![vec![Rational64::zero(); cols]; rows],
            rows,
            cols,
        }
    }

    /// Create an identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut mat = Self::zeros(n, n);
        for i in 0..n {
            mat.data[i][i] = Rational64::one();
        }
        mat
    }

    /// Create a matrix from integer rows.
    pub fn from_vec(data: Vec<Vec<i64>>) -> Self {
        let rows = data.len();
        let cols = data.first().map(|r| r.len()).unwrap_or(0);
        let data = data
            .into_iter()
            .map(|row| row.into_iter().map(Rational64::from_integer).collect())
            .collect();
        Self { data, rows, cols }
    }

    /// Get the number of rows.
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Get the number of columns.
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Get an element.
    pub fn get(&self, row: usize, col: usize) -> Option<&Rational64> {
        self.data.get(row)?.get(col)
    }

    /// Set an element.
    pub fn set(&mut self, row: usize, col: usize, value: Rational64) {
        if row < self.rows && col < self.cols {
            self.data[row][col] = value;
        }
    }

    /// Set an element from an integer.
    pub fn set_int(&mut self, row: usize, col: usize, value: i64) {
        self.set(row, col, Rational64::from_integer(value));
    }

    /// Get a row.
    pub fn row(&self, row: usize) -> Option<&[Rational64]> {
        self.data.get(row).map(|r| r.as_slice())
    }

    /// Matrix multiplication.
    pub fn mul(&self, other: &Self) -> Option<Self> {
        if self.cols != other.rows {
            return None;
        }
        let mut result = Self::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for j in 0..other.cols {
                let mut sum = Rational64::zero();
                for k in 0..self.cols {
                    sum += self.data[i][k] * other.data[k][j];
                }
                result.data[i][j] = sum;
            }
        }
        Some(result)
    }

    /// Compute the determinant (for square matrices).
    pub fn determinant(&self) -> Option<Rational64> {
        if self.rows != self.cols {
            return None;
        }
        let mut det = Rational64::one();
        let mut lu = self.clone();
        for k in 0..self.rows {
            let Some(pivot_row) = (k..self.rows).find(|&i| !lu.data[i][k].is_zero()) else {
                return Some(Rational64::zero());
            };
            if pivot_row != k {
                lu.data.swap(k, pivot_row);
                det = -det;
            }
            det *= lu.data[k][k];
            for i in (k + 1)..self.rows {
                let factor = lu.data[i][k] / lu.data[k][k];
                if factor.is_zero() {
                    continue;
                }
                let row_k = lu.data[k].clone();
                for (j, v) in row_k.iter().enumerate().skip(k) {
                    lu.data[i][j] -= factor * v;
                }
            }
        }
        Some(det)
    }

    /// Check if the matrix is unimodular (determinant is +1 or -1).
    pub fn is_unimodular(&self) -> bool {
        self.determinant().map(|d| d.abs().is_one()).unwrap_or(false)
    }

    /// Compute the inverse (for square matrices with non-zero determinant).
    pub fn inverse(&self) -> Option<Self> {
        if self.rows != self.cols {
            return None;
        }
        let n = self.rows;
        let mut aug = Self::zeros(n, 2 * n);
        for i in 0..n {
            for j in 0..n {
                aug.data[i][j] = self.data[i][j];
            }
            aug.data[i][n + i] = Rational64::one();
        }
        let pivots = aug.row_reduce(n);
        if pivots.iter().filter(|p| p.is_some()).count() != n {
            return None;
        }
        let mut inv = Self::zeros(n, n);
        for (col, pivot) in pivots.iter().enumerate() {
            if let Some(r) = pivot {
                for j in 0..n {
                    inv.data[col][j] = aug.data[*r][n + j];
                }
            }
        }
        Some(inv)
    }

    /// Gauss-Jordan elimination in place, pivoting only on the first
    /// `pivot_cols` columns.
    ///
    /// Returns, for each of those columns, the row holding its unit pivot.
    /// Rows below the last pivot are zero on the pivot columns.
    pub fn row_reduce(&mut self, pivot_cols: usize) -> Vec<Option<usize>> {
        let mut pivots = vec![None; pivot_cols.min(self.cols)];
        let mut next_row = 0;
        for (col, pivot) in pivots.iter_mut().enumerate() {
            if next_row >= self.rows {
                break;
            }
            let Some(r) = (next_row..self.rows).find(|&r| !self.data[r][col].is_zero()) else {
                continue;
            };
            self.data.swap(next_row, r);
            let p = self.data[next_row][col];
            for v in self.data[next_row].iter_mut() {
                *v /= p;
            }
            let pivot_row = self.data[next_row].clone();
            for (i, row) in self.data.iter_mut().enumerate() {
                if i == next_row || row[col].is_zero() {
                    continue;
                }
                let factor = row[col];
                for (v, pv) in row.iter_mut().zip(&pivot_row) {
                    *v -= factor * pv;
                }
            }
            *pivot = Some(next_row);
            next_row += 1;
        }
        pivots
    }

    /// Rank of the matrix.
    pub fn rank(&self) -> usize {
        let mut m = self.clone();
        m.row_reduce(self.cols).iter().filter(|p| p.is_some()).count()
    }

    /// Check if all entries are integers.
    pub fn is_integer(&self) -> bool {
        self.data.iter().all(|row| row.iter().all(|r| r.is_integer()))
    }

    /// Convert to integer matrix if possible.
    pub fn to_integer_matrix(&self) -> Option<Vec<Vec<i64>>> {
        if !self.is_integer() {
            return None;
        }
        Some(
            self.data
                .iter()
                .map(|row| row.iter().map(|r| *r.numer()).collect())
                .collect(),
        )
    }
}

impl fmt::Display for RationalMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[")?;
        for row in &self.data {
            let cells: Vec<String> = row
                .iter()
                .map(|val| {
                    if val.is_integer() {
                        val.numer().to_string()
                    } else {
                        format!("{}/{}", val.numer(), val.denom())
                    }
                })
                .collect();
            writeln!(f, "  [{}]", cells.join(", "))?;
        }
        write!(f, "]")
    }
}

/// Scale a rational row to the smallest integer row with the same direction.
pub fn clear_denominators(row: &[Rational64]) -> Vec<i64> {
    let lcm = vector_lcm(&row.iter().map(|r| *r.denom()).collect::<Vec<_>>());
    row.iter()
        .map(|r| *(r * Rational64::from_integer(lcm)).numer())
        .collect()
}

/// Compute the LCM of a vector of integers.
pub fn vector_lcm(v: &[i64]) -> i64 {
    v.iter().fold(1, |acc, &x| acc.lcm(&x))
}
