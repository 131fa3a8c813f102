//! Schedule trees and their transformations.

pub mod transform;
pub mod tree;

pub use transform::BandTransform;
pub use tree::{format_union_map, BandNode, Schedule, ScheduleNode};
