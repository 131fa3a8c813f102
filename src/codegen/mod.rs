//! Code generation from a SCoP and a schedule tree.
//!
//! The pipeline builds an AST from the schedule ([`build`]), annotating
//! every leaf with its rewritten accesses on the way ([`annotate`]), and
//! prints the annotated AST as C ([`printer`]).

pub mod annotate;
pub mod ast;
pub mod build;
pub mod generator;
pub mod printer;
pub mod rewrite;
pub mod source;

pub use annotate::{Annotated, AnnotationCache, Annotator};
pub use ast::{AstBinOp, AstExpr, AstNode, NodeId, UserNode};
pub use build::{AstBuild, AstBuilder, AtEachDomain};
pub use generator::CodeGenerator;
pub use printer::{AstPrinter, CallPrinter, PrintUser, StatementPrinter};
pub use rewrite::{AccessRewrite, IndexRewriter};
pub use source::CSource;

/// Output options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Spaces per indentation level
    pub indent: usize,
    /// Emit `#define`s for the helper functions used
    pub emit_macros: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self { indent: 2, emit_macros: false }
    }
}
