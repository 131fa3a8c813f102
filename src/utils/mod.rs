//! Utility modules for polylearn.
//!
//! This module contains common utilities used throughout the codebase:
//! - Error types
//! - Exact rational matrices
//! - Source location tracking
//! - Symbol interning
//! - Indenting text output

pub mod errors;
pub mod matrix;
pub mod location;
pub mod intern;
pub mod pretty;

// Re-exports
pub use errors::*;
pub use location::{SourceLocation, Span};
pub use intern::{Symbol, SymbolInterner};
pub use pretty::CodeFormatter;
