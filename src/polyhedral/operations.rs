//! Polyhedral operations: projection and bound extraction.

use crate::polyhedral::constraint::{ConstraintKind, ConstraintSystem};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::set::IntegerSet;

/// One side of a variable's range: `var >= ceil(expr / div)` for a lower
/// bound, `var <= floor(expr / div)` for an upper bound. `div` is positive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    pub expr: AffineExpr,
    pub div: i64,
}

impl Bound {
    pub fn exact(expr: AffineExpr) -> Self {
        Self { expr, div: 1 }
    }

    /// The bound as an exact affine expression, when `div` divides it.
    pub fn as_affine(&self) -> Option<AffineExpr> {
        if self.div == 1 {
            Some(self.expr.clone())
        } else {
            self.expr.exact_div(self.div)
        }
    }

    pub fn as_constant(&self) -> Option<i64> {
        self.as_affine().and_then(|e| e.as_constant())
    }
}

/// Bounds on one variable read off a constraint system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarBounds {
    pub lowers: Vec<Bound>,
    pub uppers: Vec<Bound>,
    /// Set when a unit equality pins the variable to an affine value
    pub fixed: Option<AffineExpr>,
}

/// Read the bounds of `var` from the constraints that mention it.
///
/// The expressions are over the same space as `sys` with the coefficient of
/// `var` cleared.
pub fn var_bounds(sys: &ConstraintSystem, var: usize) -> VarBounds {
    let mut bounds = VarBounds::default();
    for c in sys.involving(var) {
        let a = c.expr.coeff(var);
        let mut rest = c.expr.clone();
        rest.set_coeff(var, 0);
        match c.kind {
            ConstraintKind::Inequality if a > 0 => push_unique(&mut bounds.lowers, Bound { expr: -rest, div: a }),
            ConstraintKind::Inequality => push_unique(&mut bounds.uppers, Bound { expr: rest, div: -a }),
            ConstraintKind::Equality => {
                // a*var + rest = 0  =>  var = -rest / a
                let value = Bound { expr: rest.scale(-a.signum()), div: a.abs() };
                if a.abs() == 1 && bounds.fixed.is_none() {
                    bounds.fixed = Some(value.expr.clone());
                }
                push_unique(&mut bounds.lowers, value.clone());
                push_unique(&mut bounds.uppers, value);
            }
        }
    }
    bounds
}

fn push_unique(v: &mut Vec<Bound>, b: Bound) {
    if !v.contains(&b) {
        v.push(b);
    }
}

/// Project out `n` set dimensions starting at `first`.
pub fn project_out(set: &IntegerSet, first: usize, n: usize) -> IntegerSet {
    let mut space = set.space.clone();
    space.n_dim -= n;
    if space.dim_names.len() >= first + n {
        space.dim_names.drain(first..first + n);
    }
    IntegerSet::from_constraints(space, set.constraints.project_out(first, n))
}

/// Check if a set is empty as far as projection can tell.
///
/// Eliminating every dimension leaves a parameter-only system; a constant
/// contradiction there proves emptiness.
pub fn is_empty(set: &IntegerSet) -> bool {
    set.constraints.project_out(0, set.dim()).is_obviously_infeasible()
}
