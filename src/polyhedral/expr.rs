//! Affine expressions for polyhedral representation.
//!
//! An affine expression is a linear combination of variables plus a constant:
//! `aff(x) = c0 + c1*x1 + c2*x2 + ... + cn*xn`

use num_integer::Integer;
use serde::Serialize;
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// An affine expression: constant + sum(coeff[i] * var[i]) + sum(pcoeff[j] * param[j])
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AffineExpr {
    /// Constant term
    pub constant: i64,
    /// Coefficients for each dimension (index = dimension index)
    pub coeffs: Vec<i64>,
    /// Coefficients for parameters (index = parameter index)
    pub param_coeffs: Vec<i64>,
}

impl AffineExpr {
    /// Create a zero expression.
    pub fn zero(n_dim: usize, n_param: usize) -> Self {
        Self {
            constant: 0,
            coeffs: vec![0; n_dim],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create a constant expression.
    pub fn constant(value: i64, n_dim: usize, n_param: usize) -> Self {
        Self { constant: value, ..Self::zero(n_dim, n_param) }
    }

    /// Create an expression for a single dimension variable.
    pub fn var(dim: usize, n_dim: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_dim, n_param);
        expr.set_coeff(dim, 1);
        expr
    }

    /// Create an expression for a parameter.
    pub fn param(param_idx: usize, n_dim: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_dim, n_param);
        expr.set_param_coeff(param_idx, 1);
        expr
    }

    /// Check if this is a constant expression.
    pub fn is_constant(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0) && self.param_coeffs.iter().all(|&c| c == 0)
    }

    /// Check if this expression is zero.
    pub fn is_zero(&self) -> bool {
        self.constant == 0 && self.is_constant()
    }

    /// Get the constant value if this is a constant expression.
    pub fn as_constant(&self) -> Option<i64> {
        if self.is_constant() {
            Some(self.constant)
        } else {
            None
        }
    }

    /// Get the number of dimensions.
    pub fn n_dim(&self) -> usize {
        self.coeffs.len()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.param_coeffs.len()
    }

    /// Get coefficient for a dimension.
    pub fn coeff(&self, dim: usize) -> i64 {
        self.coeffs.get(dim).copied().unwrap_or(0)
    }

    /// Get coefficient for a parameter.
    pub fn param_coeff(&self, idx: usize) -> i64 {
        self.param_coeffs.get(idx).copied().unwrap_or(0)
    }

    /// Set coefficient for a dimension.
    pub fn set_coeff(&mut self, dim: usize, value: i64) {
        if dim < self.coeffs.len() {
            self.coeffs[dim] = value;
        }
    }

    /// Set coefficient for a parameter.
    pub fn set_param_coeff(&mut self, idx: usize, value: i64) {
        if idx < self.param_coeffs.len() {
            self.param_coeffs[idx] = value;
        }
    }

    /// Evaluate the expression given concrete values.
    pub fn evaluate(&self, dim_values: &[i64], param_values: &[i64]) -> i64 {
        let mut result = self.constant;
        for (i, &c) in self.coeffs.iter().enumerate() {
            if let Some(&v) = dim_values.get(i) {
                result += c * v;
            }
        }
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            if let Some(&v) = param_values.get(i) {
                result += c * v;
            }
        }
        result
    }

    /// Scale the expression by a constant.
    pub fn scale(&self, factor: i64) -> Self {
        Self {
            constant: self.constant * factor,
            coeffs: self.coeffs.iter().map(|&c| c * factor).collect(),
            param_coeffs: self.param_coeffs.iter().map(|&c| c * factor).collect(),
        }
    }

    /// Exact division of the expression by a constant.
    ///
    /// Returns `None` unless every coefficient and the constant are divisible.
    pub fn exact_div(&self, divisor: i64) -> Option<Self> {
        if divisor == 0 {
            return None;
        }
        let divisible = self.constant % divisor == 0
            && self.coeffs.iter().all(|c| c % divisor == 0)
            && self.param_coeffs.iter().all(|c| c % divisor == 0);
        if !divisible {
            return None;
        }
        Some(Self {
            constant: self.constant / divisor,
            coeffs: self.coeffs.iter().map(|&c| c / divisor).collect(),
            param_coeffs: self.param_coeffs.iter().map(|&c| c / divisor).collect(),
        })
    }

    /// GCD of the variable and parameter coefficients (the constant excluded).
    ///
    /// Returns 0 for a constant expression.
    pub fn coeff_gcd(&self) -> i64 {
        self.coeffs
            .iter()
            .chain(self.param_coeffs.iter())
            .fold(0i64, |g, c| g.gcd(c))
    }

    /// GCD of all coefficients including the constant.
    pub fn gcd(&self) -> i64 {
        let g = self.coeff_gcd().gcd(&self.constant);
        if g == 0 { 1 } else { g }
    }

    /// Normalize by dividing by GCD.
    pub fn normalize(&self) -> Self {
        let g = self.gcd();
        if g <= 1 {
            self.clone()
        } else {
            self.exact_div(g).unwrap_or_else(|| self.clone())
        }
    }

    /// Replace dimension `dim` by `value` (an expression in the same space).
    pub fn substitute(&self, dim: usize, value: &AffineExpr) -> Self {
        let c = self.coeff(dim);
        if c == 0 {
            return self.clone();
        }
        let mut rest = self.clone();
        rest.set_coeff(dim, 0);
        rest + value.scale(c)
    }

    /// Substitute every dimension: dimension `k` becomes `values[k]`.
    ///
    /// All `values` live in a space of `n_dim` dimensions with the same
    /// parameters as `self`.
    pub fn compose(&self, values: &[AffineExpr], n_dim: usize) -> Self {
        let mut result = AffineExpr::constant(self.constant, n_dim, self.n_param());
        result.param_coeffs = self.param_coeffs.clone();
        for (k, &c) in self.coeffs.iter().enumerate() {
            if c != 0 {
                if let Some(v) = values.get(k) {
                    result = result + v.scale(c);
                }
            }
        }
        result
    }

    /// Pad or truncate the dimension vector to `n_dim` entries.
    pub fn resize_dims(&self, n_dim: usize) -> Self {
        let mut expr = self.clone();
        expr.coeffs.resize(n_dim, 0);
        expr
    }

    /// Insert `n` zero dimensions before position `pos`.
    pub fn insert_dims(&self, pos: usize, n: usize) -> Self {
        let mut expr = self.clone();
        let pos = pos.min(expr.coeffs.len());
        expr.coeffs.splice(pos..pos, std::iter::repeat(0).take(n));
        expr
    }

    /// Remove `n` dimensions starting at `first`.
    pub fn drop_dims(&self, first: usize, n: usize) -> Self {
        let mut expr = self.clone();
        let end = (first + n).min(expr.coeffs.len());
        expr.coeffs.drain(first.min(end)..end);
        expr
    }

    /// Convert to string with given dimension and parameter names.
    ///
    /// Terms come first and the constant last, with implicit multiplication
    /// (`2i + N - 1`), which is the notation the frontend reads back.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        let mut out = String::new();
        let terms = self
            .coeffs
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, dim_names.get(i).cloned().unwrap_or_else(|| format!("d{}", i))))
            .chain(self.param_coeffs.iter().enumerate().map(|(i, &c)| {
                (c, param_names.get(i).cloned().unwrap_or_else(|| format!("p{}", i)))
            }))
            .filter(|(c, _)| *c != 0);

        for (c, name) in terms {
            if out.is_empty() {
                if c < 0 {
                    out.push('-');
                }
            } else {
                out.push_str(if c < 0 { " - " } else { " + " });
            }
            if c.abs() != 1 {
                out.push_str(&c.abs().to_string());
            }
            out.push_str(&name);
        }

        if out.is_empty() {
            return self.constant.to_string();
        }
        if self.constant > 0 {
            out.push_str(&format!(" + {}", self.constant));
        } else if self.constant < 0 {
            out.push_str(&format!(" - {}", -self.constant));
        }
        out
    }
}

impl Add for AffineExpr {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        assert_eq!(self.param_coeffs.len(), other.param_coeffs.len());
        Self {
            constant: self.constant + other.constant,
            coeffs: self.coeffs.iter().zip(&other.coeffs).map(|(&a, &b)| a + b).collect(),
            param_coeffs: self
                .param_coeffs
                .iter()
                .zip(&other.param_coeffs)
                .map(|(&a, &b)| a + b)
                .collect(),
        }
    }
}

impl Sub for AffineExpr {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self + (-other)
    }
}

impl Neg for AffineExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self.scale(-1)
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names: Vec<String> = (0..self.n_dim()).map(|i| format!("d{}", i)).collect();
        let param_names: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&dim_names, &param_names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let expr = AffineExpr::constant(5, 2, 1);
        assert!(expr.is_constant());
        assert_eq!(expr.evaluate(&[1, 2], &[3]), 5);
    }

    #[test]
    fn test_var() {
        let expr = AffineExpr::var(0, 2, 0);
        assert!(!expr.is_constant());
        assert_eq!(expr.evaluate(&[7, 3], &[]), 7);
    }

    #[test]
    fn test_add_sub() {
        let e1 = AffineExpr::var(0, 2, 0);
        let e2 = AffineExpr::var(1, 2, 0);
        assert_eq!((e1.clone() + e2.clone()).evaluate(&[3, 4], &[]), 7);
        assert_eq!((e1 - e2).evaluate(&[3, 4], &[]), -1);
    }

    #[test]
    fn test_substitute() {
        // 2*d0 + d1, d0 := d1 + 3  ->  3*d1 + 6
        let mut expr = AffineExpr::var(1, 2, 0);
        expr.set_coeff(0, 2);
        let mut value = AffineExpr::var(1, 2, 0);
        value.constant = 3;
        let result = expr.substitute(0, &value);
        assert_eq!(result.coeffs, vec![0, 3]);
        assert_eq!(result.constant, 6);
    }

    #[test]
    fn test_compose_keeps_params() {
        // d0 + N  with d0 := 2*e0 - 1 over one dim
        let mut expr = AffineExpr::var(0, 1, 1);
        expr.set_param_coeff(0, 1);
        let mut value = AffineExpr::var(0, 1, 1);
        value.set_coeff(0, 2);
        value.constant = -1;
        let result = expr.compose(&[value], 1);
        assert_eq!(result.evaluate(&[4], &[10]), 17);
    }

    #[test]
    fn test_dims_reshape() {
        let expr = AffineExpr::var(1, 2, 0);
        let wide = expr.insert_dims(0, 2);
        assert_eq!(wide.coeffs, vec![0, 0, 0, 1]);
        assert_eq!(wide.drop_dims(0, 2), expr);
        assert_eq!(expr.resize_dims(3).coeffs, vec![0, 1, 0]);
    }

    #[test]
    fn test_display() {
        let mut expr = AffineExpr::zero(2, 1);
        expr.constant = -5;
        expr.coeffs[0] = 2;
        expr.coeffs[1] = -1;
        expr.param_coeffs[0] = 1;

        let s = expr.to_string_with_names(&["i".to_string(), "j".to_string()], &["N".to_string()]);
        assert_eq!(s, "2i - j + N - 5");
        assert_eq!(AffineExpr::constant(-3, 1, 0).to_string(), "-3");
    }
}
