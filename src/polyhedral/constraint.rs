//! Linear constraints for polyhedral representation.
//!
//! A constraint is a linear inequality or equality:
//! - Inequality: expr >= 0
//! - Equality: expr = 0
//!
//! [`ConstraintSystem`] also carries the projection machinery used by the
//! AST builder: Fourier-Motzkin elimination with equality substitution and
//! gcd-based tightening of the integer constraints.

use crate::polyhedral::expr::AffineExpr;
use num_integer::Integer;
use serde::Serialize;
use std::fmt;

/// A linear constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Constraint {
    /// The affine expression (constraint is: expr >= 0 or expr = 0)
    pub expr: AffineExpr,
    /// Kind of constraint
    pub kind: ConstraintKind,
}

/// Kind of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConstraintKind {
    /// Greater than or equal: expr >= 0
    Inequality,
    /// Equal: expr = 0
    Equality,
}

impl Constraint {
    /// Create a new constraint.
    pub fn new(expr: AffineExpr, kind: ConstraintKind) -> Self {
        Self { expr, kind }
    }

    /// Create an inequality constraint: expr >= 0
    pub fn ge_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Inequality)
    }

    /// Create an equality constraint: expr = 0
    pub fn eq_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Equality)
    }

    /// Create a constraint: lhs >= rhs
    pub fn ge(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(lhs - rhs)
    }

    /// Create a constraint: lhs <= rhs
    pub fn le(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(rhs - lhs)
    }

    /// Create a constraint: lhs = rhs
    pub fn eq(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::eq_zero(lhs - rhs)
    }

    /// Create a lower bound constraint: var >= lower
    pub fn lower_bound(dim: usize, lower: i64, n_dim: usize, n_param: usize) -> Self {
        let mut expr = AffineExpr::var(dim, n_dim, n_param);
        expr.constant = -lower;
        Self::ge_zero(expr)
    }

    /// Create an upper bound constraint: var <= upper
    pub fn upper_bound(dim: usize, upper: i64, n_dim: usize, n_param: usize) -> Self {
        let mut expr = -AffineExpr::var(dim, n_dim, n_param);
        expr.constant = upper;
        Self::ge_zero(expr)
    }

    /// Create a strict upper bound constraint: var < upper
    /// In integers, this is equivalent to: var <= upper - 1
    pub fn strict_upper_bound(dim: usize, upper: i64, n_dim: usize, n_param: usize) -> Self {
        Self::upper_bound(dim, upper - 1, n_dim, n_param)
    }

    /// Check if this is an equality constraint.
    pub fn is_equality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Equality)
    }

    /// Check if this is an inequality constraint.
    pub fn is_inequality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Inequality)
    }

    /// Check if this constraint is satisfied by the given point.
    pub fn is_satisfied(&self, dim_values: &[i64], param_values: &[i64]) -> bool {
        let value = self.expr.evaluate(dim_values, param_values);
        match self.kind {
            ConstraintKind::Inequality => value >= 0,
            ConstraintKind::Equality => value == 0,
        }
    }

    /// A constant constraint that always holds.
    pub fn is_trivially_true(&self) -> bool {
        match (self.expr.as_constant(), self.kind) {
            (Some(v), ConstraintKind::Inequality) => v >= 0,
            (Some(v), ConstraintKind::Equality) => v == 0,
            (None, _) => false,
        }
    }

    /// A constant constraint that never holds.
    pub fn is_trivially_false(&self) -> bool {
        match (self.expr.as_constant(), self.kind) {
            (Some(v), ConstraintKind::Inequality) => v < 0,
            (Some(v), ConstraintKind::Equality) => v != 0,
            (None, _) => false,
        }
    }

    /// Integer tightening.
    ///
    /// Inequalities are divided by the gcd of their variable coefficients with
    /// the constant rounded down; equalities whose constant is not a multiple
    /// of that gcd become the infeasible `-1 >= 0`.
    pub fn tighten(&self) -> Self {
        let g = self.expr.coeff_gcd();
        if g <= 1 {
            return self.clone();
        }
        let mut expr = self.expr.clone();
        match self.kind {
            ConstraintKind::Inequality => {
                expr.constant = Integer::div_floor(&expr.constant, &g);
                for c in expr.coeffs.iter_mut().chain(expr.param_coeffs.iter_mut()) {
                    *c /= g;
                }
                Self::ge_zero(expr)
            }
            ConstraintKind::Equality => {
                if expr.constant % g != 0 {
                    return Self::ge_zero(AffineExpr::constant(-1, expr.n_dim(), expr.n_param()));
                }
                Self::eq_zero(expr.exact_div(g).unwrap_or(expr))
            }
        }
    }

    /// Replace dimension `dim` by `value`.
    pub fn substitute(&self, dim: usize, value: &AffineExpr) -> Self {
        Self::new(self.expr.substitute(dim, value), self.kind)
    }

    /// Get the number of dimensions.
    pub fn n_dim(&self) -> usize {
        self.expr.n_dim()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.expr.n_param()
    }

    /// Convert to string with given names.
    ///
    /// Positive terms go left and negative terms right, so `i - 1 >= 0`
    /// prints as `i >= 1`.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        let (lhs, rhs) = split_signs(&self.expr);
        let op = match self.kind {
            ConstraintKind::Inequality => ">=",
            ConstraintKind::Equality => "=",
        };
        format!(
            "{} {} {}",
            lhs.to_string_with_names(dim_names, param_names),
            op,
            rhs.to_string_with_names(dim_names, param_names)
        )
    }
}

/// Split `e` into `(pos, neg)` with `e = pos - neg` and all coefficients of
/// both sides non-negative.
pub fn split_signs(e: &AffineExpr) -> (AffineExpr, AffineExpr) {
    let mut pos = AffineExpr::zero(e.n_dim(), e.n_param());
    let mut neg = AffineExpr::zero(e.n_dim(), e.n_param());
    for (k, &c) in e.coeffs.iter().enumerate() {
        if c > 0 {
            pos.coeffs[k] = c;
        } else {
            neg.coeffs[k] = -c;
        }
    }
    for (k, &c) in e.param_coeffs.iter().enumerate() {
        if c > 0 {
            pos.param_coeffs[k] = c;
        } else {
            neg.param_coeffs[k] = -c;
        }
    }
    if e.constant > 0 {
        pos.constant = e.constant;
    } else {
        neg.constant = -e.constant;
    }
    (pos, neg)
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names: Vec<String> = (0..self.n_dim()).map(|i| format!("d{}", i)).collect();
        let param_names: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&dim_names, &param_names))
    }
}

/// A system of constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConstraintSystem {
    /// All constraints in the system
    pub constraints: Vec<Constraint>,
    /// Number of dimensions
    pub n_dim: usize,
    /// Number of parameters
    pub n_param: usize,
}

impl ConstraintSystem {
    /// Create an empty constraint system.
    pub fn new(n_dim: usize, n_param: usize) -> Self {
        Self {
            constraints: Vec::new(),
            n_dim,
            n_param,
        }
    }

    /// The canonical infeasible system.
    pub fn infeasible(n_dim: usize, n_param: usize) -> Self {
        let mut sys = Self::new(n_dim, n_param);
        sys.add(Constraint::ge_zero(AffineExpr::constant(-1, n_dim, n_param)));
        sys
    }

    /// Add a constraint.
    pub fn add(&mut self, constraint: Constraint) {
        assert_eq!(constraint.n_dim(), self.n_dim);
        assert_eq!(constraint.n_param(), self.n_param);
        self.constraints.push(constraint);
    }

    /// Get all equality constraints.
    pub fn equalities(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_equality())
    }

    /// Get all inequality constraints.
    pub fn inequalities(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_inequality())
    }

    /// Check if a point satisfies all constraints.
    pub fn is_satisfied(&self, dim_values: &[i64], param_values: &[i64]) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied(dim_values, param_values))
    }

    /// Check if the system is empty (has no constraints).
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Get the number of constraints.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// True when some constraint is a constant contradiction.
    pub fn is_obviously_infeasible(&self) -> bool {
        self.constraints.iter().any(|c| c.is_trivially_false())
    }

    /// Tighten every constraint, drop duplicates and constant truths, and
    /// collapse a contradictory system to `-1 >= 0`.
    ///
    /// An inequality whose negation is also present (`e >= 0` and `-e >= 0`)
    /// is merged into the equality `e = 0`.
    pub fn normalize(&self) -> Self {
        let mut out: Vec<Constraint> = Vec::new();
        for c in &self.constraints {
            let c = c.tighten();
            if c.is_trivially_false() {
                return Self::infeasible(self.n_dim, self.n_param);
            }
            if c.is_trivially_true() {
                continue;
            }
            let c = canonical_sign(c);
            if out.contains(&c) {
                continue;
            }
            if c.is_inequality() {
                let opposite = Constraint::ge_zero(-c.expr.clone());
                if let Some(pos) = out.iter().position(|o| *o == opposite) {
                    out[pos] = canonical_sign(Constraint::eq_zero(c.expr));
                    continue;
                }
            }
            out.push(c);
        }
        Self {
            constraints: out,
            n_dim: self.n_dim,
            n_param: self.n_param,
        }
    }

    /// Append `n` unconstrained dimensions at the end.
    pub fn add_dims(&self, n: usize) -> Self {
        let n_dim = self.n_dim + n;
        Self {
            constraints: self
                .constraints
                .iter()
                .map(|c| Constraint::new(c.expr.resize_dims(n_dim), c.kind))
                .collect(),
            n_dim,
            n_param: self.n_param,
        }
    }

    /// Insert `n` unconstrained dimensions before position `pos`.
    pub fn insert_dims(&self, pos: usize, n: usize) -> Self {
        Self {
            constraints: self
                .constraints
                .iter()
                .map(|c| Constraint::new(c.expr.insert_dims(pos, n), c.kind))
                .collect(),
            n_dim: self.n_dim + n,
            n_param: self.n_param,
        }
    }

    /// Replace dimension `dim` by `value` in every constraint.
    pub fn substitute(&self, dim: usize, value: &AffineExpr) -> Self {
        Self {
            constraints: self.constraints.iter().map(|c| c.substitute(dim, value)).collect(),
            n_dim: self.n_dim,
            n_param: self.n_param,
        }
    }

    /// Eliminate dimension `var`, keeping its column (now unused).
    ///
    /// An equality with a unit coefficient on `var` is substituted into the
    /// rest of the system. Any other equality is combined with every other
    /// constraint to cancel `var`. Without equalities, each lower bound is
    /// paired with each upper bound (Fourier-Motzkin). The result is the
    /// rational shadow, tightened for integers.
    pub fn eliminate(&self, var: usize) -> Self {
        let sys = self.normalize();
        if sys.is_obviously_infeasible() {
            return sys;
        }

        let eq_pos = sys
            .constraints
            .iter()
            .filter(|c| c.is_equality() && c.expr.coeff(var) != 0)
            .min_by_key(|c| c.expr.coeff(var).abs())
            .cloned();

        let mut out = Self::new(self.n_dim, self.n_param);
        if let Some(eq) = eq_pos {
            let a = eq.expr.coeff(var);
            if a.abs() == 1 {
                // var = -(rest) / a
                let mut rest = eq.expr.clone();
                rest.set_coeff(var, 0);
                let value = rest.scale(-a);
                for c in sys.constraints.iter().filter(|c| **c != eq) {
                    out.add(c.substitute(var, &value));
                }
            } else {
                for c in sys.constraints.iter().filter(|c| **c != eq) {
                    let b = c.expr.coeff(var);
                    if b == 0 {
                        out.add(c.clone());
                        continue;
                    }
                    // |a| * c - sign(a) * b * eq cancels var and keeps the
                    // direction of c.
                    let combined = c.expr.scale(a.abs()) - eq.expr.scale(a.signum() * b);
                    out.add(Constraint::new(combined, c.kind));
                }
            }
            return out.normalize();
        }

        let mut lowers = Vec::new();
        let mut uppers = Vec::new();
        for c in &sys.constraints {
            let b = c.expr.coeff(var);
            if b > 0 {
                lowers.push(c);
            } else if b < 0 {
                uppers.push(c);
            } else {
                out.add(c.clone());
            }
        }
        for l in &lowers {
            for u in &uppers {
                let lb = l.expr.coeff(var);
                let ub = -u.expr.coeff(var);
                let combined = l.expr.scale(ub) + u.expr.scale(lb);
                out.add(Constraint::ge_zero(combined));
            }
        }
        out.normalize()
    }

    /// Eliminate and then remove `n` dimensions starting at `first`.
    pub fn project_out(&self, first: usize, n: usize) -> Self {
        let mut sys = self.clone();
        for var in (first..first + n).rev() {
            sys = sys.eliminate(var);
        }
        Self {
            constraints: sys
                .constraints
                .iter()
                .map(|c| Constraint::new(c.expr.drop_dims(first, n), c.kind))
                .collect(),
            n_dim: self.n_dim - n,
            n_param: self.n_param,
        }
    }

    /// Constraints that mention dimension `var`.
    pub fn involving(&self, var: usize) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |c| c.expr.coeff(var) != 0)
    }
}

/// Equalities are stored with a positive leading coefficient so that `e = 0`
/// and `-e = 0` compare equal.
fn canonical_sign(c: Constraint) -> Constraint {
    if !c.is_equality() {
        return c;
    }
    let lead = c
        .expr
        .coeffs
        .iter()
        .chain(c.expr.param_coeffs.iter())
        .find(|&&v| v != 0)
        .copied()
        .unwrap_or(0);
    if lead < 0 {
        Constraint::eq_zero(-c.expr)
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_system() -> ConstraintSystem {
        let mut sys = ConstraintSystem::new(2, 0);
        // 0 <= i < 10, 0 <= j < 10
        sys.add(Constraint::lower_bound(0, 0, 2, 0));
        sys.add(Constraint::strict_upper_bound(0, 10, 2, 0));
        sys.add(Constraint::lower_bound(1, 0, 2, 0));
        sys.add(Constraint::strict_upper_bound(1, 10, 2, 0));
        sys
    }

    #[test]
    fn test_lower_bound() {
        let c = Constraint::lower_bound(0, 0, 2, 0);
        assert!(c.is_satisfied(&[0, 0], &[]));
        assert!(c.is_satisfied(&[5, 0], &[]));
        assert!(!c.is_satisfied(&[-1, 0], &[]));
    }

    #[test]
    fn test_upper_bound() {
        let c = Constraint::upper_bound(0, 10, 2, 0);
        assert!(c.is_satisfied(&[10, 0], &[]));
        assert!(!c.is_satisfied(&[11, 0], &[]));
    }

    #[test]
    fn test_equality() {
        let mut expr = AffineExpr::var(0, 1, 0);
        expr.constant = -5;
        let c = Constraint::eq_zero(expr);
        assert!(c.is_satisfied(&[5], &[]));
        assert!(!c.is_satisfied(&[4], &[]));
    }

    #[test]
    fn test_constraint_system() {
        let sys = box_system();
        assert!(sys.is_satisfied(&[0, 0], &[]));
        assert!(sys.is_satisfied(&[9, 9], &[]));
        assert!(!sys.is_satisfied(&[10, 0], &[]));
        assert!(!sys.is_satisfied(&[-1, 0], &[]));
    }

    #[test]
    fn test_tighten() {
        // 2i - 3 >= 0  ->  i - 2 >= 0
        let mut expr = AffineExpr::var(0, 1, 0).scale(2);
        expr.constant = -3;
        let c = Constraint::ge_zero(expr).tighten();
        assert_eq!(c.expr.coeffs, vec![1]);
        assert_eq!(c.expr.constant, -2);

        // 2i = 1 has no integer solution
        let mut expr = AffineExpr::var(0, 1, 0).scale(2);
        expr.constant = -1;
        assert!(Constraint::eq_zero(expr).tighten().is_trivially_false());
    }

    #[test]
    fn test_normalize_merges_opposite_inequalities() {
        let mut sys = ConstraintSystem::new(1, 0);
        sys.add(Constraint::lower_bound(0, 3, 1, 0));
        sys.add(Constraint::upper_bound(0, 3, 1, 0));
        sys.add(Constraint::lower_bound(0, 3, 1, 0));
        let norm = sys.normalize();
        assert_eq!(norm.len(), 1);
        assert!(norm.constraints[0].is_equality());
    }

    #[test]
    fn test_eliminate_fourier_motzkin() {
        // 0 <= j <= i <= 9: projecting out i leaves 0 <= j <= 9
        let mut sys = ConstraintSystem::new(2, 0);
        sys.add(Constraint::lower_bound(1, 0, 2, 0));
        sys.add(Constraint::ge(AffineExpr::var(0, 2, 0), AffineExpr::var(1, 2, 0)));
        sys.add(Constraint::upper_bound(0, 9, 2, 0));
        let proj = sys.project_out(0, 1);
        assert_eq!(proj.n_dim, 1);
        assert!(proj.is_satisfied(&[0], &[]));
        assert!(proj.is_satisfied(&[9], &[]));
        assert!(!proj.is_satisfied(&[10], &[]));
        assert!(!proj.is_satisfied(&[-1], &[]));
    }

    #[test]
    fn test_eliminate_through_equality() {
        // c = i + 1, 0 <= i <= 4: projecting out i gives 1 <= c <= 5
        let mut sys = ConstraintSystem::new(2, 0);
        sys.add(Constraint::lower_bound(0, 0, 2, 0));
        sys.add(Constraint::upper_bound(0, 4, 2, 0));
        let mut rhs = AffineExpr::var(0, 2, 0);
        rhs.constant = 1;
        sys.add(Constraint::eq(AffineExpr::var(1, 2, 0), rhs));
        let proj = sys.project_out(0, 1);
        assert!(proj.is_satisfied(&[1], &[]));
        assert!(proj.is_satisfied(&[5], &[]));
        assert!(!proj.is_satisfied(&[0], &[]));
        assert!(!proj.is_satisfied(&[6], &[]));
    }

    #[test]
    fn test_infeasible_projection() {
        let mut sys = ConstraintSystem::new(1, 0);
        sys.add(Constraint::lower_bound(0, 5, 1, 0));
        sys.add(Constraint::upper_bound(0, 2, 1, 0));
        assert!(sys.project_out(0, 1).is_obviously_infeasible());
    }

    #[test]
    fn test_display() {
        let c = Constraint::lower_bound(0, 1, 1, 0);
        assert_eq!(c.to_string_with_names(&["i".to_string()], &[]), "i >= 1");
    }
}
