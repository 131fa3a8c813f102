//! Basic relations between two tuples.
//!
//! A [`BasicMap`] is a conjunction of affine constraints over the input
//! dimensions followed by the output dimensions. The AST builder hands one
//! out per leaf (`{ S[i] -> [c] }`); reversing it and converting it to a
//! [`PwMultiAff`] yields the inverse schedule.

use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::map::AffineMap;
use crate::polyhedral::pw_aff::{Piece, PwMultiAff};
use crate::polyhedral::set::IntegerSet;
use crate::polyhedral::space::Space;
use crate::utils::errors::PolyError;
use crate::utils::matrix::{clear_denominators, RationalMatrix};
use num_rational::Rational64;
use serde::Serialize;
use std::fmt;

/// A relation given by constraints over `[in | out]` and the parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasicMap {
    pub space: Space,
    pub constraints: ConstraintSystem,
}

impl BasicMap {
    /// The universe relation of a map space.
    pub fn universe(space: Space) -> Self {
        let constraints = ConstraintSystem::new(space.total_dim(), space.n_param);
        Self { space, constraints }
    }

    /// The graph of `map` restricted to `domain`.
    pub fn from_affine_map(map: &AffineMap, domain: &IntegerSet) -> Self {
        assert_eq!(map.n_in(), domain.dim());
        let mut rel = Self::universe(map.space.clone());
        let n_total = map.space.total_dim();
        for c in &domain.constraints.constraints {
            rel.constraints.add(Constraint::new(c.expr.resize_dims(n_total), c.kind));
        }
        for (k, out) in map.outputs.iter().enumerate() {
            let lhs = AffineExpr::var(map.n_in() + k, n_total, map.n_param());
            rel.constraints.add(Constraint::eq(lhs, out.resize_dims(n_total)));
        }
        rel
    }

    pub fn n_in(&self) -> usize {
        self.space.n_in
    }

    pub fn n_out(&self) -> usize {
        self.space.n_dim
    }

    pub fn n_param(&self) -> usize {
        self.space.n_param
    }

    /// Add a constraint over `[in | out]`.
    pub fn add_constraint(&mut self, c: Constraint) {
        self.constraints.add(c);
    }

    /// Check whether `(input, output)` is in the relation.
    pub fn contains(&self, input: &[i64], output: &[i64], params: &[i64]) -> bool {
        let point: Vec<i64> = input.iter().chain(output).copied().collect();
        self.constraints.is_satisfied(&point, params)
    }

    /// Swap the input and output tuples.
    pub fn reverse(&self) -> Self {
        let (n_in, n_out) = (self.n_in(), self.n_out());
        let constraints = self
            .constraints
            .constraints
            .iter()
            .map(|c| {
                let mut expr = c.expr.clone();
                expr.coeffs = c.expr.coeffs[n_in..]
                    .iter()
                    .chain(&c.expr.coeffs[..n_in])
                    .copied()
                    .collect();
                Constraint::new(expr, c.kind)
            })
            .collect();
        Self {
            space: self.space.reverse(),
            constraints: ConstraintSystem {
                constraints,
                n_dim: n_in + n_out,
                n_param: self.n_param(),
            },
        }
    }

    /// Project out the outputs.
    pub fn domain(&self) -> IntegerSet {
        let sys = self.constraints.project_out(self.n_in(), self.n_out());
        IntegerSet::from_constraints(self.space.domain(), sys)
    }

    /// Express the outputs as affine functions of the inputs.
    ///
    /// The equalities are row-reduced on the output columns. Every output
    /// needs a pivot (`NotSingleValued` otherwise) whose row has integer
    /// coefficients (`NonIntegralInverse` otherwise). Equalities left
    /// without an output term, and all inequalities with the outputs
    /// substituted, form the domain of the single resulting piece.
    pub fn as_pw_multi_aff(&self) -> Result<PwMultiAff, PolyError> {
        let (n_in, n_out, n_param) = (self.n_in(), self.n_out(), self.n_param());
        let eqs: Vec<&Constraint> = self.constraints.equalities().collect();

        // columns: [out | in | params | constant]
        let n_cols = n_out + n_in + n_param + 1;
        let mut m = RationalMatrix::zeros(eqs.len(), n_cols);
        for (r, c) in eqs.iter().enumerate() {
            for o in 0..n_out {
                m.set_int(r, o, c.expr.coeff(n_in + o));
            }
            for i in 0..n_in {
                m.set_int(r, n_out + i, c.expr.coeff(i));
            }
            for p in 0..n_param {
                m.set_int(r, n_out + n_in + p, c.expr.param_coeff(p));
            }
            m.set_int(r, n_cols - 1, c.expr.constant);
        }
        let pivots = m.row_reduce(n_out);

        let mut outputs = Vec::with_capacity(n_out);
        for (o, &pivot) in pivots.iter().enumerate() {
            let row = pivot
                .and_then(|r| m.row(r))
                .ok_or(PolyError::NotSingleValued { dim: o })?;
            // out_o + rest = 0  =>  out_o = -rest
            let int = |v: &Rational64| -> Result<i64, PolyError> {
                if v.is_integer() {
                    Ok(-*v.numer())
                } else {
                    Err(PolyError::NonIntegralInverse { dim: o })
                }
            };
            let mut value = AffineExpr::zero(n_in, n_param);
            for i in 0..n_in {
                value.coeffs[i] = int(&row[n_out + i])?;
            }
            for p in 0..n_param {
                value.param_coeffs[p] = int(&row[n_out + n_in + p])?;
            }
            value.constant = int(&row[n_cols - 1])?;
            outputs.push(value);
        }

        let mut domain = IntegerSet::from_space(self.space.domain());
        let n_pivots = pivots.iter().filter(|p| p.is_some()).count();
        for r in n_pivots..m.nrows() {
            if let Some(row) = m.row(r) {
                let ints = clear_denominators(&row[n_out..]);
                let expr = AffineExpr {
                    constant: ints[n_in + n_param],
                    coeffs: ints[..n_in].to_vec(),
                    param_coeffs: ints[n_in..n_in + n_param].to_vec(),
                };
                domain.add_constraint(Constraint::eq_zero(expr));
            }
        }
        for c in self.constraints.inequalities() {
            let mut expr = AffineExpr {
                constant: c.expr.constant,
                coeffs: c.expr.coeffs[..n_in].to_vec(),
                param_coeffs: c.expr.param_coeffs.clone(),
            };
            for (o, value) in outputs.iter().enumerate() {
                let k = c.expr.coeff(n_in + o);
                if k != 0 {
                    expr = expr + value.scale(k);
                }
            }
            domain.add_constraint(Constraint::ge_zero(expr));
        }

        let value = AffineMap::with_space(self.space.clone(), outputs);
        Ok(PwMultiAff::from_pieces(
            self.space.clone(),
            vec![Piece { domain: domain.normalize(), value }],
        ))
    }
}

impl fmt::Display for BasicMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let in_names = self.space.all_in_names();
        let out_names: Vec<String> = (0..self.n_out())
            .map(|k| {
                self.space
                    .dim_names
                    .get(k)
                    .cloned()
                    .unwrap_or_else(|| format!("o{}", k))
            })
            .collect();
        let params = self.space.all_param_names();
        if !params.is_empty() {
            write!(f, "[{}] -> ", params.join(", "))?;
        }
        write!(f, "{{ ")?;
        if let Some(id) = &self.space.in_tuple {
            write!(f, "{}", id)?;
        }
        write!(f, "[{}] -> ", in_names.join(", "))?;
        if let Some(id) = &self.space.tuple {
            write!(f, "{}", id)?;
        }
        write!(f, "[{}]", out_names.join(", "))?;
        let names: Vec<String> = in_names.into_iter().chain(out_names).collect();
        let parts: Vec<String> = self
            .constraints
            .constraints
            .iter()
            .map(|c| c.to_string_with_names(&names, &params))
            .collect();
        if !parts.is_empty() {
            write!(f, " : {}", parts.join(" and "))?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::id::IdContext;

    fn skewed_schedule() -> BasicMap {
        // { S[i, j] -> [i + j, j] : 0 <= i, j < 4 }
        let mut ctx = IdContext::new();
        let domain = IntegerSet::rectangular(&[4, 4]).with_tuple(ctx.id("S"));
        let map = AffineMap::with_space(
            Space::map_from(&domain.space, &Space::set(2)),
            vec![
                AffineExpr::var(0, 2, 0) + AffineExpr::var(1, 2, 0),
                AffineExpr::var(1, 2, 0),
            ],
        );
        BasicMap::from_affine_map(&map, &domain)
    }

    #[test]
    fn test_from_affine_map() {
        let rel = skewed_schedule();
        assert!(rel.contains(&[1, 2], &[3, 2], &[]));
        assert!(!rel.contains(&[1, 2], &[2, 2], &[]));
        assert!(!rel.contains(&[4, 0], &[4, 0], &[]));
    }

    #[test]
    fn test_reverse_and_invert() {
        let inv = skewed_schedule().reverse().as_pw_multi_aff().unwrap();
        assert_eq!(inv.pieces.len(), 1);
        // [c0, c1] -> S[c0 - c1, c1]
        assert_eq!(inv.eval(&[3, 2], &[]), Some(vec![1, 2]));
        assert_eq!(inv.eval(&[9, 0], &[]), None);
        assert_eq!(inv.out_tuple().map(|id| id.name()), Some("S"));
    }

    #[test]
    fn test_non_integral_inverse() {
        // { S[i] -> [2i] }
        let domain = IntegerSet::rectangular(&[4]);
        let map = AffineMap::from_outputs(1, vec![AffineExpr::var(0, 1, 0).scale(2)]);
        let rel = BasicMap::from_affine_map(&map, &domain).reverse();
        assert_eq!(rel.as_pw_multi_aff(), Err(PolyError::NonIntegralInverse { dim: 0 }));
    }

    #[test]
    fn test_not_single_valued() {
        // { S[i, j] -> [i] } reversed leaves j free
        let domain = IntegerSet::rectangular(&[4, 4]);
        let map = AffineMap::from_outputs(2, vec![AffineExpr::var(0, 2, 0)]);
        let rel = BasicMap::from_affine_map(&map, &domain).reverse();
        assert_eq!(rel.as_pw_multi_aff(), Err(PolyError::NotSingleValued { dim: 1 }));
    }

    #[test]
    fn test_domain_projection() {
        let dom = skewed_schedule().reverse().domain();
        // 0 <= c1 <= 3 and c1 <= c0 <= c1 + 3
        assert!(dom.contains(&[3, 2], &[]));
        assert!(!dom.contains(&[1, 2], &[]));
    }
}
