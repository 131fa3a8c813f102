//! Frontend: Lexer, Parser, and semantic lowering for isl notation.
//!
//! Sets, maps and whole SCoPs are written the way isl prints them:
//!
//! ```text
//! params N;
//! context [N] -> { : N >= 1 };
//! stmt [N] -> { S[i, j] : 0 <= i < N and 0 <= j <= i } { A[i][j] = A[i][j] + B[j]; }
//! schedule { S[i, j] -> [j, i] };
//! ```
//!
//! The parser produces a syntax tree ([`ast`]); the [`semantic`] pass
//! resolves names and lowers it to polyhedral objects.

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod semantic;

// Re-exports
pub use lexer::Lexer;
pub use parser::Parser;
pub use semantic::{lower_file, Lowering, ScopProgram};
pub use token::{Token, TokenKind};
pub use crate::utils::errors::ParseError;

use crate::polyhedral::{AffineMap, IdContext, PwMultiAff, UnionSet};
use crate::utils::errors::PolyLearnError;

/// Parse a `.scop` file into its syntax tree.
pub fn parse(source: &str) -> Result<ast::ScopFile, ParseError> {
    let mut parser = Parser::new(Lexer::new(source))?;
    parser.parse_file()
}

/// Parse a union of sets, `[N] -> { S[i] : 0 <= i < N; T[] }`.
pub fn parse_set(source: &str, ids: &mut IdContext) -> Result<UnionSet, ParseError> {
    let set = Parser::new(Lexer::new(source))?.parse_set_only()?;
    Lowering::new(ids).union_set(&set)
}

/// Parse a union of maps without constraints, `{ S[i] -> [i, 0] }`.
pub fn parse_union_map(source: &str, ids: &mut IdContext) -> Result<Vec<AffineMap>, ParseError> {
    let map = Parser::new(Lexer::new(source))?.parse_map_only()?;
    Lowering::new(ids).union_map(&map)
}

/// Parse a single map, `{ S[i] -> A[i - 1] : i >= 1 }`.
pub fn parse_pw_multi_aff(source: &str, ids: &mut IdContext) -> Result<PwMultiAff, ParseError> {
    let map = Parser::new(Lexer::new(source))?.parse_map_only()?;
    Lowering::new(ids).pw_multi_aff(&map)
}

/// Parse and lower a `.scop` file.
pub fn parse_scop(source: &str, name: &str) -> Result<ScopProgram, PolyLearnError> {
    lower_file(&parse(source)?, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scop() {
        let source = r#"
            params N;
            stmt [N] -> { S[i] : 0 <= i < N } { A[i] = i; }
        "#;
        let program = parse_scop(source, "simple").unwrap();
        assert_eq!(program.scop.name, "simple");
        assert_eq!(program.scop.n_stmt(), 1);
        assert!(program.ids.lookup("A").is_some());
    }

    #[test]
    fn test_shared_identities() {
        let mut ids = IdContext::new();
        let domain = parse_set("{ S[i] : 0 <= i < 3 }", &mut ids).unwrap();
        let maps = parse_union_map("{ S[i] -> [i] }", &mut ids).unwrap();
        assert_eq!(domain.sets[0].tuple_id(), maps[0].in_tuple());
    }
}
