//! Polyhedral data structures and operations.
//!
//! This module provides the affine integer-set layer code generation runs on:
//! - Tuple identities and spaces
//! - Affine expressions and constraints, with Fourier-Motzkin projection
//! - Integer sets and unions of them
//! - Multi-affine maps, basic relations and piecewise multi-affine functions

pub mod id;
pub mod space;
pub mod expr;
pub mod constraint;
pub mod set;
pub mod map;
pub mod relation;
pub mod pw_aff;
pub mod operations;

pub use id::{IdContext, TupleId};
pub use space::Space;
pub use expr::AffineExpr;
pub use constraint::{Constraint, ConstraintKind, ConstraintSystem};
pub use set::{IntegerSet, UnionSet};
pub use map::AffineMap;
pub use relation::BasicMap;
pub use pw_aff::{Piece, PwMultiAff};
