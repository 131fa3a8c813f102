//! Error types for polylearn.
//!
//! Errors are organized by the phase that produces them: reading `.scop`
//! text, assembling a SCoP, polyhedral operations, and code generation.

use crate::polyhedral::id::TupleId;
use crate::utils::location::Span;
use std::fmt;
use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum PolyLearnError {
    /// Error during lexing/tokenization
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    /// Error during parsing
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error while assembling a SCoP
    #[error("SCoP error: {0}")]
    Scop(#[from] ScopError),

    /// Error in a polyhedral operation
    #[error("Polyhedral error: {0}")]
    Poly(#[from] PolyError),

    /// Error during code generation
    #[error("Code generation error: {0}")]
    Codegen(#[from] CodegenError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during lexical analysis.
#[derive(Error, Debug, Clone)]
pub struct LexerError {
    /// The error message
    pub message: String,
    /// Location in source
    pub span: Span,
    /// The kind of lexer error
    pub kind: LexerErrorKind,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerErrorKind {
    /// Unexpected character
    UnexpectedChar,
    /// Invalid number literal
    InvalidNumber,
    /// Unterminated block comment
    UnterminatedComment,
}

/// Error during parsing.
#[derive(Error, Debug, Clone)]
pub struct ParseError {
    /// The error message
    pub message: String,
    /// Location in source
    pub span: Span,
    /// The kind of parse error
    pub kind: ParseErrorKind,
    /// Expected tokens (if applicable)
    pub expected: Vec<String>,
    /// What was found
    pub found: Option<String>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)?;
        if !self.expected.is_empty() {
            write!(f, " (expected: {})", self.expected.join(", "))?;
        }
        if let Some(ref found) = self.found {
            write!(f, " (found: {})", found)?;
        }
        Ok(())
    }
}

impl From<LexerError> for ParseError {
    fn from(err: LexerError) -> Self {
        Self {
            message: err.message,
            span: err.span,
            kind: ParseErrorKind::InvalidToken,
            expected: Vec::new(),
            found: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The lexer rejected the input
    InvalidToken,
    /// Unexpected token
    UnexpectedToken,
    /// Expected a specific token
    ExpectedToken,
    /// Expected an expression
    ExpectedExpression,
    /// Expected an identifier
    ExpectedIdentifier,
    /// An expression that is not affine where an affine one is required
    NonAffine,
    /// A name that is neither a tuple variable nor a parameter
    UnknownName,
    /// Well-formed syntax in a place that does not allow it
    Misplaced,
    /// Unexpected end of file
    UnexpectedEof,
}

/// Error while assembling a SCoP.
#[derive(Error, Debug, Clone)]
pub struct ScopError {
    /// The error message
    pub message: String,
    /// Location in source (if available)
    pub span: Option<Span>,
    /// The kind of SCoP error
    pub kind: ScopErrorKind,
}

impl ScopError {
    pub fn new(kind: ScopErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), span: None, kind }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

impl fmt::Display for ScopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref span) = self.span {
            write!(f, "{} at {}", self.message, span)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopErrorKind {
    /// Two statements share one tuple identity
    DuplicateStatement,
    /// An array is accessed with different ranks
    RankMismatch,
    /// An access index does not start from the statement's domain
    AccessSpaceMismatch,
    /// Parameters of a set disagree with the SCoP parameters
    ParameterMismatch,
    /// A schedule names a statement that does not exist
    UnknownStatement,
}

/// Error in a polyhedral operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolyError {
    /// Some output dimension is not determined by the inputs
    #[error("relation is not single-valued: output dimension {dim} is not determined by the inputs")]
    NotSingleValued { dim: usize },

    /// The inverse exists over the rationals only
    #[error("output dimension {dim} has a non-integral affine expression")]
    NonIntegralInverse { dim: usize },

    /// Spaces do not line up
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Error during code generation.
///
/// Any of these aborts generation; no partial text is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    /// The registry has no statement with this identity
    #[error("no statement with identity {id:?} in the SCoP")]
    StatementNotFound { id: TupleId },

    /// A rewritten access index has the wrong shape
    #[error(
        "rewrite of access {access} of {stmt:?} has arity {found_in} -> {found_out}, \
         expected {expected_in} -> {expected_out}"
    )]
    RewriteArityMismatch {
        stmt: TupleId,
        access: usize,
        expected_in: usize,
        expected_out: usize,
        found_in: usize,
        found_out: usize,
    },

    /// The annotation cache and the AST disagree
    #[error("inconsistent annotation state at leaf {leaf}: {reason}")]
    InconsistentAnnotationState { leaf: String, reason: String },

    /// The schedule cannot be scanned or inverted
    #[error("malformed schedule for {stmt}: {reason}")]
    MalformedSchedule { stmt: String, reason: String },
}

impl CodegenError {
    pub(crate) fn malformed(stmt: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::MalformedSchedule { stmt: stmt.to_string(), reason: reason.into() }
    }

    pub(crate) fn inconsistent(leaf: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::InconsistentAnnotationState { leaf: leaf.to_string(), reason: reason.into() }
    }
}

/// Result type using PolyLearnError.
pub type PolyResult<T> = Result<T, PolyLearnError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::id::IdContext;

    #[test]
    fn test_error_display() {
        let err = ParseError {
            message: "Unexpected token".to_string(),
            span: Span::new(1, 5, 1, 10),
            kind: ParseErrorKind::UnexpectedToken,
            expected: vec!["identifier".to_string()],
            found: Some("number".to_string()),
        };
        let s = format!("{}", err);
        assert!(s.contains("Unexpected token"));
        assert!(s.contains("identifier"));
        assert!(s.contains("1:5-10"));
    }

    #[test]
    fn test_codegen_error_names_statement() {
        let mut ctx = IdContext::new();
        let id = ctx.id("S");
        let err = CodegenError::StatementNotFound { id };
        assert!(err.to_string().contains("S@0"));

        let err: PolyLearnError = CodegenError::malformed("S", "not unimodular").into();
        assert!(err.to_string().starts_with("Code generation error"));
    }
}
