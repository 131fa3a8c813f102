//! Piecewise multi-affine functions.
//!
//! Access indices and inverse schedules are [`PwMultiAff`]s: a list of
//! pieces, each an affine map valid on its own integer set. Pieces are
//! tried in order, so the first piece containing a point defines the value
//! there.

use crate::polyhedral::constraint::Constraint;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::id::TupleId;
use crate::polyhedral::map::AffineMap;
use crate::polyhedral::set::IntegerSet;
use crate::polyhedral::space::Space;
use crate::utils::errors::PolyError;
use serde::Serialize;
use std::fmt;

/// One piece: `value` on `domain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Piece {
    pub domain: IntegerSet,
    pub value: AffineMap,
}

/// A piecewise multi-affine function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PwMultiAff {
    /// Map space: `n_in` inputs, `n_dim` outputs
    pub space: Space,
    pub pieces: Vec<Piece>,
}

impl PwMultiAff {
    pub fn from_pieces(space: Space, pieces: Vec<Piece>) -> Self {
        Self { space, pieces }
    }

    /// A single piece valid everywhere.
    pub fn from_affine_map(map: AffineMap) -> Self {
        let domain = IntegerSet::from_space(map.space.domain());
        Self {
            space: map.space.clone(),
            pieces: vec![Piece { domain, value: map }],
        }
    }

    /// A single piece valid on `domain`.
    pub fn from_map_on(map: AffineMap, domain: IntegerSet) -> Self {
        assert_eq!(map.n_in(), domain.dim());
        Self {
            space: map.space.clone(),
            pieces: vec![Piece { domain, value: map }],
        }
    }

    /// The function returning `values` for every input of `space`.
    pub fn constant(space: Space, values: &[i64]) -> Self {
        assert_eq!(space.n_dim, values.len());
        let outputs = values
            .iter()
            .map(|&v| AffineExpr::constant(v, space.n_in, space.n_param))
            .collect();
        Self::from_affine_map(AffineMap::with_space(space, outputs))
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

    /// Identity of the output tuple (the array of an access).
    pub fn out_tuple(&self) -> Option<&TupleId> {
        self.space.tuple.as_ref()
    }

    /// Identity of the input tuple.
    pub fn in_tuple(&self) -> Option<&TupleId> {
        self.space.in_tuple.as_ref()
    }

    /// Evaluate at `point`, using the first piece that contains it.
    pub fn eval(&self, point: &[i64], params: &[i64]) -> Option<Vec<i64>> {
        self.pieces
            .iter()
            .find(|p| p.domain.contains(point, params))
            .map(|p| p.value.apply(point, params))
    }

    /// Compose with `inner`: the result maps `x` to `self(inner(x))`.
    ///
    /// Each pair of pieces yields a piece whose domain is the inner domain
    /// intersected with the preimage of the outer domain; obviously empty
    /// pieces are dropped.
    pub fn pullback(&self, inner: &PwMultiAff) -> Result<PwMultiAff, PolyError> {
        if inner.n_out() != self.n_in() {
            return Err(PolyError::DimensionMismatch { expected: self.n_in(), found: inner.n_out() });
        }
        if inner.n_param() != self.n_param() {
            return Err(PolyError::DimensionMismatch {
                expected: self.n_param(),
                found: inner.n_param(),
            });
        }

        let space = Space::map_from(&inner.space.domain(), &self.space.range());
        let mut pieces = Vec::new();
        for ip in &inner.pieces {
            for op in &self.pieces {
                let mut domain = ip.domain.clone();
                for c in &op.domain.constraints.constraints {
                    let expr = c.expr.compose(&ip.value.outputs, inner.n_in());
                    domain.add_constraint(Constraint::new(expr, c.kind));
                }
                let domain = domain.normalize();
                if domain.is_obviously_empty() {
                    continue;
                }
                let mut value = op.value.compose(&ip.value);
                value.space = space.clone();
                pieces.push(Piece { domain, value });
            }
        }
        Ok(Self { space, pieces })
    }

    /// True when there is exactly one piece.
    pub fn is_single_piece(&self) -> bool {
        self.pieces.len() == 1
    }
}

impl fmt::Display for PwMultiAff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let in_names = self.space.all_in_names();
        let params = self.space.all_param_names();
        if !params.is_empty() {
            write!(f, "[{}] -> ", params.join(", "))?;
        }
        write!(f, "{{ ")?;
        for (k, piece) in self.pieces.iter().enumerate() {
            if k > 0 {
                write!(f, "; ")?;
            }
            if let Some(id) = self.in_tuple() {
                write!(f, "{}", id)?;
            }
            write!(f, "[{}] -> ", in_names.join(", "))?;
            if let Some(id) = self.out_tuple() {
                write!(f, "{}", id)?;
            }
            let outs: Vec<String> = piece
                .value
                .outputs
                .iter()
                .map(|e| format!("({})", e.to_string_with_names(&in_names, &params)))
                .collect();
            write!(f, "[{}]", outs.join(", "))?;
            let conds: Vec<String> = piece
                .domain
                .constraints
                .constraints
                .iter()
                .map(|c| c.to_string_with_names(&in_names, &params))
                .collect();
            if !conds.is_empty() {
                write!(f, " : {}", conds.join(" and "))?;
            }
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::id::IdContext;

    #[test]
    fn test_constant() {
        let space = Space::map(2, 1);
        let pma = PwMultiAff::constant(space, &[7]);
        assert_eq!(pma.eval(&[3, -4], &[]), Some(vec![7]));
        assert!(pma.is_single_piece());
    }

    #[test]
    fn test_pullback_composes() {
        // index: S[i] -> A[i + 1]; inverse: [c0] -> S[c0 - 2]
        let mut ctx = IdContext::new();
        let s = ctx.id("S");
        let a = ctx.id("A");
        let mut plus_one = AffineExpr::var(0, 1, 0);
        plus_one.constant = 1;
        let index = PwMultiAff::from_affine_map(AffineMap::with_space(
            Space::map(1, 1).with_in_tuple(Some(s.clone())).with_tuple(Some(a.clone())),
            vec![plus_one],
        ));
        let mut minus_two = AffineExpr::var(0, 1, 0);
        minus_two.constant = -2;
        let inverse = PwMultiAff::from_affine_map(AffineMap::with_space(
            Space::map(1, 1).with_tuple(Some(s)),
            vec![minus_two],
        ));
        let pulled = index.pullback(&inverse).unwrap();
        assert_eq!(pulled.out_tuple(), Some(&a));
        assert_eq!(pulled.eval(&[5], &[]), Some(vec![4]));
        assert_eq!(pulled.to_string(), "{ [i0] -> A[(i0 - 1)] }");
    }

    #[test]
    fn test_pullback_restricts_domains() {
        // index valid on i >= 0 only; inverse [c0] -> [c0 - 3]
        let index = PwMultiAff::from_map_on(AffineMap::identity(1), {
            let mut d = IntegerSet::universe(1);
            d.add_constraint(Constraint::lower_bound(0, 0, 1, 0));
            d
        });
        let mut shift = AffineExpr::var(0, 1, 0);
        shift.constant = -3;
        let inverse = PwMultiAff::from_affine_map(AffineMap::from_outputs(1, vec![shift]));
        let pulled = index.pullback(&inverse).unwrap();
        assert_eq!(pulled.eval(&[3], &[]), Some(vec![0]));
        assert_eq!(pulled.eval(&[2], &[]), None);
    }

    #[test]
    fn test_pullback_arity_mismatch() {
        let index = PwMultiAff::from_affine_map(AffineMap::identity(2));
        let inverse = PwMultiAff::from_affine_map(AffineMap::identity(1));
        assert_eq!(
            index.pullback(&inverse),
            Err(PolyError::DimensionMismatch { expected: 2, found: 1 })
        );
    }
}
