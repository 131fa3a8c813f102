//! # polylearn - polyhedral code generation
//!
//! Generates C loop nests from a static control part (SCoP) and a schedule
//! tree, the way isl's AST generator and its printing callbacks do:
//! - Statements with iteration domains, accesses and bodies
//! - Schedule trees with band transformations (interchange, skew, shift, reversal)
//! - AST build with a per-leaf hook that rewrites every access through the
//!   inverse schedule
//! - C printing with a per-leaf hook that renders the rewritten bodies
//!
//! ## Architecture
//!
//! ```text
//! .scop → Frontend → Scop + Schedule → AST build (annotate) → Print → C source
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use polylearn::prelude::*;
//!
//! let source = r#"
//!     params N;
//!     stmt [N] -> { S[i, j] : 0 <= i < N and 0 <= j < N } { C[i][j] += A[i][j] * B[j]; }
//! "#;
//!
//! let program = polylearn::parse(source, "gemv")?;
//! let schedule = polylearn::transform(&program.schedule, &[BandTransform::Interchange(0, 1)])?;
//! let code = polylearn::generate(&program.scop, &schedule, CodegenOptions::default())?;
//! ```

#![warn(clippy::all)]

pub mod codegen;
pub mod frontend;
pub mod polyhedral;
pub mod schedule;
pub mod scop;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::codegen::{
        AccessRewrite, AstBuild, AstBuilder, AstNode, AstPrinter, AtEachDomain, CSource, CodeGenerator,
        CodegenOptions, IndexRewriter, PrintUser, UserNode,
    };
    pub use crate::frontend::{parse_scop, parse_set, parse_union_map, ParseError, ScopProgram};
    pub use crate::polyhedral::{
        AffineExpr, AffineMap, BasicMap, Constraint, IdContext, IntegerSet, PwMultiAff, Space, TupleId,
        UnionSet,
    };
    pub use crate::schedule::{BandTransform, Schedule, ScheduleNode};
    pub use crate::scop::{Access, BodyExpr, BodyOp, Scop, Statement, StatementRegistry, StmtBody};
    pub use crate::utils::errors::*;
}

use anyhow::{Context, Result};
use codegen::{CSource, CodeGenerator, CodegenOptions};
use frontend::ScopProgram;
use schedule::{BandTransform, Schedule};
use scop::Scop;

/// Parse and lower a `.scop` description.
pub fn parse(source: &str, name: &str) -> Result<ScopProgram> {
    frontend::parse_scop(source, name).with_context(|| format!("Failed to read SCoP '{}'", name))
}

/// Apply band transformations in order.
pub fn transform(schedule: &Schedule, transforms: &[BandTransform]) -> Result<Schedule> {
    transforms.iter().try_fold(schedule.clone(), |schedule, &t| {
        schedule.apply(t).with_context(|| format!("Failed to apply {}", t))
    })
}

/// Generate C code for `scop` under `schedule`.
pub fn generate(scop: &Scop, schedule: &Schedule, options: CodegenOptions) -> Result<CSource> {
    CodeGenerator::new(scop, schedule)
        .with_options(options)
        .generate()
        .with_context(|| format!("Code generation failed for '{}'", scop.name))
}

/// Full pipeline: parse, transform the schedule and generate code.
pub fn compile(source: &str, name: &str, transforms: &[BandTransform], options: CodegenOptions) -> Result<CSource> {
    let program = parse(source, name)?;
    let schedule = transform(&program.schedule, transforms)?;
    generate(&program.scop, &schedule, options)
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_compile() {
        let source = "stmt { S[i] : 0 <= i < 3 } { A[i] = i; }";
        let code = compile(source, "fill", &[], CodegenOptions::default()).unwrap();
        assert_eq!(code.as_str(), "for (int c0 = 0; c0 <= 2; c0 += 1)\n  A[c0] = c0;\n");
    }

    #[test]
    fn test_errors_carry_context() {
        let err = compile("stmt { S[i] : 0 <= i < 3 } { A[i] = i; }", "fill", &[BandTransform::Interchange(0, 1)], CodegenOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("interchange(0, 1)"));

        let err = parse("stmt { S[i] }", "broken").unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
