//! Integer sets (polyhedra) for iteration domains.

use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::id::TupleId;
use crate::polyhedral::space::Space;
use serde::Serialize;
use std::fmt;

/// An integer set defined by affine constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegerSet {
    pub space: Space,
    pub constraints: ConstraintSystem,
}

impl IntegerSet {
    pub fn empty(n_dim: usize) -> Self {
        Self {
            space: Space::set(n_dim),
            constraints: ConstraintSystem::infeasible(n_dim, 0),
        }
    }

    pub fn universe(n_dim: usize) -> Self {
        Self::from_space(Space::set(n_dim))
    }

    pub fn from_space(space: Space) -> Self {
        let constraints = ConstraintSystem::new(space.n_dim, space.n_param);
        Self { space, constraints }
    }

    pub fn from_constraints(space: Space, constraints: ConstraintSystem) -> Self {
        assert_eq!(space.n_dim, constraints.n_dim);
        assert_eq!(space.n_param, constraints.n_param);
        Self { space, constraints }
    }

    /// `{ [i0, ...] : 0 <= ik < bounds[k] }`
    pub fn rectangular(bounds: &[i64]) -> Self {
        let n_dim = bounds.len();
        let mut set = Self::universe(n_dim);
        for (i, &bound) in bounds.iter().enumerate() {
            set.add_constraint(Constraint::lower_bound(i, 0, n_dim, 0));
            set.add_constraint(Constraint::strict_upper_bound(i, bound, n_dim, 0));
        }
        set
    }

    pub fn dim(&self) -> usize { self.space.n_dim }
    pub fn n_param(&self) -> usize { self.space.n_param }

    /// The tuple identity of the set, if it has one.
    pub fn tuple_id(&self) -> Option<&TupleId> {
        self.space.tuple.as_ref()
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.add(constraint);
    }

    pub fn contains(&self, point: &[i64], params: &[i64]) -> bool {
        point.len() == self.dim() && self.constraints.is_satisfied(point, params)
    }

    pub fn is_obviously_empty(&self) -> bool {
        self.constraints.is_obviously_infeasible()
    }

    /// Intersect with a parameter-only set (a context).
    pub fn intersect_params(&self, context: &IntegerSet) -> IntegerSet {
        assert_eq!(context.dim(), 0);
        let mut result = self.clone();
        for c in &context.constraints.constraints {
            let expr = c.expr.resize_dims(self.dim());
            result.add_constraint(Constraint::new(expr, c.kind));
        }
        result
    }

    /// Simplified copy of the set.
    pub fn normalize(&self) -> IntegerSet {
        Self {
            space: self.space.clone(),
            constraints: self.constraints.normalize(),
        }
    }

    /// Enumerate the points of the set inside the box `[lo, hi]^dim`.
    ///
    /// Points come out in lexicographic order.
    pub fn points_in_box(&self, lo: i64, hi: i64, params: &[i64]) -> Vec<Vec<i64>> {
        let n = self.dim();
        let mut points = Vec::new();
        if lo > hi {
            return points;
        }
        let mut point = vec![lo; n];
        loop {
            if self.constraints.is_satisfied(&point, params) {
                points.push(point.clone());
            }
            // advance like an odometer, last dimension fastest
            let mut k = n;
            loop {
                if k == 0 {
                    return points;
                }
                k -= 1;
                if point[k] < hi {
                    point[k] += 1;
                    for p in point.iter_mut().skip(k + 1) {
                        *p = lo;
                    }
                    break;
                }
            }
        }
    }

    pub fn dim_names(&self) -> Vec<String> { self.space.all_dim_names() }
    pub fn param_names(&self) -> Vec<String> { self.space.all_param_names() }

    pub fn with_dim_names(mut self, names: Vec<String>) -> Self {
        self.space = self.space.with_dim_names(names);
        self
    }

    pub fn with_param_names(mut self, names: Vec<String>) -> Self {
        self.space = self.space.with_param_names(names);
        self
    }

    pub fn with_tuple(mut self, id: TupleId) -> Self {
        self.space = self.space.with_tuple(Some(id));
        self
    }

    fn fmt_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names = self.dim_names();
        let param_names = self.param_names();
        if let Some(id) = self.tuple_id() {
            write!(f, "{}", id)?;
        }
        write!(f, "[{}]", dim_names.join(", "))?;
        if !self.constraints.is_empty() {
            let parts: Vec<String> = self
                .constraints
                .constraints
                .iter()
                .map(|c| c.to_string_with_names(&dim_names, &param_names))
                .collect();
            write!(f, " : {}", parts.join(" and "))?;
        }
        Ok(())
    }
}

impl fmt::Display for IntegerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self.param_names();
        if !params.is_empty() {
            write!(f, "[{}] -> ", params.join(", "))?;
        }
        write!(f, "{{ ")?;
        self.fmt_body(f)?;
        write!(f, " }}")
    }
}

/// A union of integer sets living in different tuples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnionSet {
    pub sets: Vec<IntegerSet>,
}

impl UnionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sets(sets: Vec<IntegerSet>) -> Self {
        Self { sets }
    }

    pub fn add(&mut self, set: IntegerSet) {
        self.sets.push(set);
    }

    /// The member set whose tuple is `id`.
    pub fn find(&self, id: &TupleId) -> Option<&IntegerSet> {
        self.sets.iter().find(|s| s.tuple_id() == Some(id))
    }

    pub fn tuple_ids(&self) -> Vec<TupleId> {
        self.sets.iter().filter_map(|s| s.tuple_id().cloned()).collect()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntegerSet> {
        self.sets.iter()
    }

    /// Parameter names shared by the member sets.
    pub fn param_names(&self) -> Vec<String> {
        self.sets.first().map(|s| s.space.param_names.clone()).unwrap_or_default()
    }
}

impl fmt::Display for UnionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self.param_names();
        if !params.is_empty() {
            write!(f, "[{}] -> ", params.join(", "))?;
        }
        write!(f, "{{ ")?;
        for (i, set) in self.sets.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            set.fmt_body(f)?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::expr::AffineExpr;
    use crate::polyhedral::id::IdContext;

    #[test]
    fn test_rectangular() {
        let set = IntegerSet::rectangular(&[10, 20]);
        assert!(set.contains(&[0, 0], &[]));
        assert!(set.contains(&[9, 19], &[]));
        assert!(!set.contains(&[10, 0], &[]));
    }

    #[test]
    fn test_points_in_box() {
        // { [i, j] : 0 <= j <= i < 3 }
        let mut set = IntegerSet::rectangular(&[3, 3]);
        set.add_constraint(Constraint::ge(AffineExpr::var(0, 2, 0), AffineExpr::var(1, 2, 0)));
        let points = set.points_in_box(-1, 4, &[]);
        assert_eq!(points.len(), 6);
        assert_eq!(points[0], vec![0, 0]);
        assert_eq!(points[5], vec![2, 2]);
    }

    #[test]
    fn test_context_intersection() {
        // { S[i] : 0 <= i < N } with context N >= 1
        let space = Space::set(1).with_param_names(vec!["N".to_string()]);
        let mut set = IntegerSet::from_space(space);
        set.add_constraint(Constraint::lower_bound(0, 0, 1, 1));
        set.add_constraint(Constraint::ge_zero(
            AffineExpr::param(0, 1, 1) - AffineExpr::var(0, 1, 1) - AffineExpr::constant(1, 1, 1),
        ));
        let mut context = IntegerSet::from_space(Space::set(0).with_param_names(vec!["N".to_string()]));
        context.add_constraint(Constraint::ge_zero(
            AffineExpr::param(0, 0, 1) - AffineExpr::constant(1, 0, 1),
        ));
        let bounded = set.intersect_params(&context);
        assert!(bounded.contains(&[0], &[1]));
        assert!(!bounded.contains(&[0], &[0]));
    }

    #[test]
    fn test_union_find_by_identity() {
        let mut ctx = IdContext::new();
        let s = ctx.id("S");
        let t = ctx.fresh("S");
        let union = UnionSet::from_sets(vec![
            IntegerSet::rectangular(&[2]).with_tuple(s.clone()),
            IntegerSet::rectangular(&[4]).with_tuple(t.clone()),
        ]);
        assert_eq!(union.find(&t).map(|set| set.tuple_id()), Some(Some(&t)));
        assert_eq!(union.to_string(), "{ S[i0] : i0 >= 0 and 1 >= i0; S[i0] : i0 >= 0 and 3 >= i0 }");
    }
}
