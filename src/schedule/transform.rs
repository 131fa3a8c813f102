//! Band transformations.
//!
//! Each transformation rewrites the partial schedules of a band. Example:
//! ```text
//! for c0 = 0 to N:
//!   for c1 = 0 to M:
//!     A[c0][c1] = B[c1][c0]
//! ```
//! becomes (after interchange(0, 1)):
//! ```text
//! for c0 = 0 to M:
//!   for c1 = 0 to N:
//!     A[c1][c0] = B[c0][c1]
//! ```
//! Legality is not checked; the caller decides which orders are valid.

use crate::polyhedral::map::AffineMap;
use crate::schedule::tree::{Schedule, ScheduleNode};
use crate::utils::errors::CodegenError;
use std::fmt;

/// A transformation of band members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandTransform {
    /// Swap two members
    Interchange(usize, usize),
    /// `target += factor * source`
    Skew { target: usize, source: usize, factor: i64 },
    /// `dim += offset`
    Shift { dim: usize, offset: i64 },
    /// `dim = -dim`
    Reverse(usize),
}

impl BandTransform {
    /// Number of band members the transformation needs.
    pub fn min_members(&self) -> usize {
        match *self {
            BandTransform::Interchange(a, b) => a.max(b) + 1,
            BandTransform::Skew { target, source, .. } => target.max(source) + 1,
            BandTransform::Shift { dim, .. } | BandTransform::Reverse(dim) => dim + 1,
        }
    }

    /// Apply to one partial schedule.
    pub fn apply_to(&self, map: &AffineMap) -> AffineMap {
        match *self {
            BandTransform::Interchange(a, b) => map.interchange(a, b),
            BandTransform::Skew { target, source, factor } => map.skew(target, source, factor),
            BandTransform::Shift { dim, offset } => map.shift_dim(dim, offset),
            BandTransform::Reverse(dim) => map.scale_dim(dim, -1),
        }
    }
}

impl fmt::Display for BandTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandTransform::Interchange(a, b) => write!(f, "interchange({}, {})", a, b),
            BandTransform::Skew { target, source, factor } => {
                write!(f, "skew({}, {}, {})", target, source, factor)
            }
            BandTransform::Shift { dim, offset } => write!(f, "shift({}, {})", dim, offset),
            BandTransform::Reverse(dim) => write!(f, "reverse({})", dim),
        }
    }
}

impl Schedule {
    /// Apply `transform` to every band with enough members.
    ///
    /// Fails when no band is large enough.
    pub fn apply(&self, transform: BandTransform) -> Result<Schedule, CodegenError> {
        let mut touched = 0;
        let root = transform_node(&self.root, transform, &mut touched);
        if touched == 0 {
            return Err(CodegenError::malformed(
                "schedule",
                format!("{} needs a band with {} members", transform, transform.min_members()),
            ));
        }
        log::debug!("applied {} to {} band(s)", transform, touched);
        Ok(Schedule { domain: self.domain.clone(), root })
    }
}

fn transform_node(node: &ScheduleNode, t: BandTransform, touched: &mut usize) -> ScheduleNode {
    match node {
        ScheduleNode::Band(band) => {
            let child = transform_node(&band.child, t, touched);
            let partial = if band.n_member() >= t.min_members() {
                *touched += 1;
                band.partial.iter().map(|m| t.apply_to(m)).collect()
            } else {
                band.partial.clone()
            };
            ScheduleNode::band(partial, child)
        }
        ScheduleNode::Sequence(children) => {
            ScheduleNode::Sequence(children.iter().map(|c| transform_node(c, t, touched)).collect())
        }
        ScheduleNode::Filter { filter, child } => {
            ScheduleNode::filter(filter.clone(), transform_node(child, t, touched))
        }
        ScheduleNode::Leaf => ScheduleNode::Leaf,
    }
}
