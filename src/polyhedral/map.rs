//! Affine maps for schedules and access functions.
//!
//! An [`AffineMap`] is a multi-affine function: every output dimension is an
//! affine expression over the input dimensions and the parameters.

use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::id::TupleId;
use crate::polyhedral::space::Space;
use serde::Serialize;
use std::fmt;

/// An affine map from one space to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffineMap {
    pub space: Space,
    /// Output expressions (one per output dimension)
    pub outputs: Vec<AffineExpr>,
}

impl AffineMap {
    /// Create an identity map of given dimension.
    pub fn identity(n_dim: usize) -> Self {
        let outputs = (0..n_dim).map(|i| AffineExpr::var(i, n_dim, 0)).collect();
        Self::from_outputs(n_dim, outputs)
    }

    /// Create from output expressions.
    pub fn from_outputs(n_in: usize, outputs: Vec<AffineExpr>) -> Self {
        let n_param = outputs.first().map(|e| e.n_param()).unwrap_or(0);
        Self {
            space: Space::map_with_params(n_in, outputs.len(), n_param),
            outputs,
        }
    }

    /// Create from a full map space and output expressions.
    pub fn with_space(space: Space, outputs: Vec<AffineExpr>) -> Self {
        debug_assert_eq!(space.n_dim, outputs.len());
        Self { space, outputs }
    }

    /// Get input dimensions.
    pub fn n_in(&self) -> usize { self.space.n_in }

    /// Get output dimensions.
    pub fn n_out(&self) -> usize { self.space.n_dim }

    /// Get number of parameters.
    pub fn n_param(&self) -> usize { self.space.n_param }

    /// Identity of the input tuple.
    pub fn in_tuple(&self) -> Option<&TupleId> {
        self.space.in_tuple.as_ref()
    }

    /// Identity of the output tuple.
    pub fn out_tuple(&self) -> Option<&TupleId> {
        self.space.tuple.as_ref()
    }

    /// Apply the map to a point.
    pub fn apply(&self, input: &[i64], params: &[i64]) -> Vec<i64> {
        self.outputs.iter().map(|expr| expr.evaluate(input, params)).collect()
    }

    /// Compose two maps: `self` after `other`, so `x -> self(other(x))`.
    pub fn compose(&self, other: &AffineMap) -> AffineMap {
        assert_eq!(self.n_in(), other.n_out());
        let outputs = self
            .outputs
            .iter()
            .map(|e| e.compose(&other.outputs, other.n_in()))
            .collect();
        let space = Space::map_from(&other.space.domain(), &self.space.range());
        Self { space, outputs }
    }

    /// Swap two output dimensions.
    pub fn interchange(&self, dim1: usize, dim2: usize) -> Self {
        assert!(dim1 < self.n_out() && dim2 < self.n_out());
        let mut outputs = self.outputs.clone();
        outputs.swap(dim1, dim2);
        Self { space: self.space.clone(), outputs }
    }

    /// Skew output dimension `target` by `factor` times output dimension `source`.
    pub fn skew(&self, target_dim: usize, source_dim: usize, factor: i64) -> Self {
        assert!(target_dim < self.n_out() && source_dim < self.n_out());
        let mut outputs = self.outputs.clone();
        let source_expr = outputs[source_dim].scale(factor);
        outputs[target_dim] = outputs[target_dim].clone() + source_expr;
        Self { space: self.space.clone(), outputs }
    }

    /// Scale an output dimension by a factor.
    pub fn scale_dim(&self, dim: usize, factor: i64) -> Self {
        assert!(dim < self.n_out());
        let mut outputs = self.outputs.clone();
        outputs[dim] = outputs[dim].scale(factor);
        Self { space: self.space.clone(), outputs }
    }

    /// Shift an output dimension by a constant offset.
    pub fn shift_dim(&self, dim: usize, offset: i64) -> Self {
        assert!(dim < self.n_out());
        let mut outputs = self.outputs.clone();
        outputs[dim].constant += offset;
        Self { space: self.space.clone(), outputs }
    }

    /// Insert an output dimension at the given position.
    pub fn add_dim(&self, pos: usize, expr: AffineExpr) -> Self {
        let mut outputs = self.outputs.clone();
        outputs.insert(pos, expr);
        let mut space = self.space.clone();
        space.n_dim = outputs.len();
        space.dim_names.clear();
        Self { space, outputs }
    }

    /// Create a permutation map.
    pub fn permutation(perm: &[usize]) -> Self {
        let n = perm.len();
        let outputs = perm.iter().map(|&i| AffineExpr::var(i, n, 0)).collect();
        Self::from_outputs(n, outputs)
    }

    /// Check if this is an identity map.
    pub fn is_identity(&self) -> bool {
        if self.n_in() != self.n_out() {
            return false;
        }
        self.outputs.iter().enumerate().all(|(i, expr)| {
            expr.constant == 0
                && expr.param_coeffs.iter().all(|&c| c == 0)
                && expr.coeffs.iter().enumerate().all(|(j, &c)| c == if i == j { 1 } else { 0 })
        })
    }

    /// Check if this is a permutation of the input dimensions.
    pub fn is_permutation(&self) -> bool {
        if self.n_in() != self.n_out() {
            return false;
        }
        let mut used = vec![false; self.n_in()];
        for expr in &self.outputs {
            if expr.constant != 0 || expr.param_coeffs.iter().any(|&c| c != 0) {
                return false;
            }
            let mut found = None;
            for (i, &coeff) in expr.coeffs.iter().enumerate() {
                if coeff == 1 && found.is_none() {
                    found = Some(i);
                } else if coeff != 0 {
                    return false;
                }
            }
            match found {
                Some(i) if !used[i] => used[i] = true,
                _ => return false,
            }
        }
        true
    }
}

impl fmt::Display for AffineMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let in_names = self.space.all_in_names();
        let param_names = self.space.all_param_names();
        if self.n_param() > 0 {
            write!(f, "[{}] -> ", param_names.join(", "))?;
        }
        write!(f, "{{ ")?;
        if let Some(id) = self.in_tuple() {
            write!(f, "{}", id)?;
        }
        write!(f, "[{}] -> ", in_names.join(", "))?;
        if let Some(id) = self.out_tuple() {
            write!(f, "{}", id)?;
        }
        let outs: Vec<String> = self
            .outputs
            .iter()
            .map(|e| e.to_string_with_names(&in_names, &param_names))
            .collect();
        write!(f, "[{}] }}", outs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let map = AffineMap::identity(3);
        assert!(map.is_identity());
        assert_eq!(map.apply(&[1, 2, 3], &[]), vec![1, 2, 3]);
    }

    #[test]
    fn test_compose() {
        // [i, j] -> [j, i] after [i, j] -> [i + j, j]
        let swap = AffineMap::permutation(&[1, 0]);
        let skew = AffineMap::identity(2).skew(0, 1, 1);
        let composed = swap.compose(&skew);
        assert_eq!(composed.apply(&[5, 7], &[]), vec![7, 12]);
    }

    #[test]
    fn test_transforms() {
        let map = AffineMap::identity(2);
        assert_eq!(map.interchange(0, 1).apply(&[3, 4], &[]), vec![4, 3]);
        assert_eq!(map.shift_dim(1, 2).apply(&[3, 4], &[]), vec![3, 6]);
        assert_eq!(map.scale_dim(0, -1).apply(&[3, 4], &[]), vec![-3, 4]);
        assert!(map.interchange(0, 1).is_permutation());
        assert!(!map.skew(0, 1, 1).is_permutation());
    }

    #[test]
    fn test_add_dim() {
        let sched = AffineMap::identity(2).add_dim(0, AffineExpr::constant(1, 2, 0));
        assert_eq!(sched.n_out(), 3);
        assert_eq!(sched.apply(&[3, 4], &[]), vec![1, 3, 4]);
    }
}
