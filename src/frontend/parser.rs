//! Parser for isl notation and `.scop` files.
//!
//! A recursive descent parser over the token stream. Grammar:
//!
//! ```text
//! file     := item*
//! item     := 'params' IDENT (',' IDENT)* ';'
//!           | 'context' set ';'
//!           | 'stmt' set '{' body '}' ';'?
//!           | 'schedule' map ';'
//! set      := prefix? '{' (bset (';' bset)*)? '}'
//! map      := prefix? '{' (bmap (';' bmap)*)? '}'
//! prefix   := '[' (IDENT (',' IDENT)*)? ']' '->'
//! bset     := tuple? (':' conj)?
//! bmap     := tuple '->' tuple (':' conj)?
//! tuple    := IDENT? '[' (expr (',' expr)*)? ']'
//! conj     := chain (('and' | '&&') chain)*
//! chain    := expr (cmp expr)+
//! body     := primary assign expr ';'?
//! ```

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::errors::{ParseError, ParseErrorKind};

/// A parser over one source text.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser from a lexer.
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self, ParseError> {
        let first = lexer.next_token()?;
        Ok(Self { lexer, current: first.clone(), previous: first })
    }

    /// Parse a complete `.scop` file.
    pub fn parse_file(&mut self) -> Result<ScopFile, ParseError> {
        let mut file = ScopFile::default();
        while !self.is_at_end() {
            file.items.push(self.parse_item()?);
        }
        Ok(file)
    }

    /// Parse a set and require the end of input.
    pub fn parse_set_only(&mut self) -> Result<SetExpr, ParseError> {
        let set = self.parse_set()?;
        self.expect_end()?;
        Ok(set)
    }

    /// Parse a map and require the end of input.
    pub fn parse_map_only(&mut self) -> Result<MapExpr, ParseError> {
        let map = self.parse_map()?;
        self.expect_end()?;
        Ok(map)
    }

    /// Parse a statement body and require the end of input.
    pub fn parse_body_only(&mut self) -> Result<BodyStmt, ParseError> {
        let body = self.parse_body()?;
        self.expect_end()?;
        Ok(body)
    }

    fn parse_item(&mut self) -> Result<Item, ParseError> {
        match self.current.kind {
            TokenKind::Params => {
                let start = self.current.span;
                self.advance()?;
                let mut names = vec![self.consume_identifier("parameter name")?];
                while self.match_token(TokenKind::Comma)? {
                    names.push(self.consume_identifier("parameter name")?);
                }
                self.consume(TokenKind::Semicolon, "after the parameter list")?;
                Ok(Item::Params { names, span: start.merge(&self.previous.span) })
            }
            TokenKind::Context => {
                self.advance()?;
                let set = self.parse_set()?;
                self.consume(TokenKind::Semicolon, "after the context")?;
                Ok(Item::Context(set))
            }
            TokenKind::Stmt => {
                self.advance()?;
                let domain = self.parse_set()?;
                self.consume(TokenKind::LeftBrace, "before the statement body")?;
                let body = self.parse_body()?;
                self.consume(TokenKind::RightBrace, "after the statement body")?;
                self.match_token(TokenKind::Semicolon)?;
                Ok(Item::Stmt { domain, body })
            }
            TokenKind::Schedule => {
                self.advance()?;
                let map = self.parse_map()?;
                self.consume(TokenKind::Semicolon, "after the schedule")?;
                Ok(Item::Schedule(map))
            }
            _ => Err(self.error(
                ParseErrorKind::UnexpectedToken,
                "Expected an item",
                &["params", "context", "stmt", "schedule"],
            )),
        }
    }

    /// `[N, M] ->`, or nothing when the text starts with `{`.
    fn parse_prefix(&mut self) -> Result<Vec<String>, ParseError> {
        let mut params = Vec::new();
        if self.match_token(TokenKind::LeftBracket)? {
            if !self.check(TokenKind::RightBracket) {
                params.push(self.consume_identifier("parameter name")?);
                while self.match_token(TokenKind::Comma)? {
                    params.push(self.consume_identifier("parameter name")?);
                }
            }
            self.consume(TokenKind::RightBracket, "after the parameters")?;
            self.consume(TokenKind::Arrow, "after the parameters")?;
        }
        Ok(params)
    }

    fn parse_set(&mut self) -> Result<SetExpr, ParseError> {
        let start = self.current.span;
        let params = self.parse_prefix()?;
        self.consume(TokenKind::LeftBrace, "to open the set")?;
        let mut parts = Vec::new();
        if !self.check(TokenKind::RightBrace) {
            parts.push(self.parse_basic_set()?);
            while self.match_token(TokenKind::Semicolon)? {
                parts.push(self.parse_basic_set()?);
            }
        }
        self.consume(TokenKind::RightBrace, "to close the set")?;
        Ok(SetExpr { params, parts, span: start.merge(&self.previous.span) })
    }

    fn parse_basic_set(&mut self) -> Result<BasicSetExpr, ParseError> {
        let start = self.current.span;
        let tuple = if self.check(TokenKind::Identifier) || self.check(TokenKind::LeftBracket) {
            Some(self.parse_tuple()?)
        } else {
            None
        };
        let constraints = self.parse_optional_constraints()?;
        if tuple.is_none() && constraints.is_empty() {
            return Err(self.error(ParseErrorKind::ExpectedToken, "Expected a tuple or constraints", &["identifier", "[", ":"]));
        }
        Ok(BasicSetExpr { tuple, constraints, span: start.merge(&self.previous.span) })
    }

    fn parse_map(&mut self) -> Result<MapExpr, ParseError> {
        let start = self.current.span;
        let params = self.parse_prefix()?;
        self.consume(TokenKind::LeftBrace, "to open the map")?;
        let mut parts = Vec::new();
        if !self.check(TokenKind::RightBrace) {
            parts.push(self.parse_basic_map()?);
            while self.match_token(TokenKind::Semicolon)? {
                parts.push(self.parse_basic_map()?);
            }
        }
        self.consume(TokenKind::RightBrace, "to close the map")?;
        Ok(MapExpr { params, parts, span: start.merge(&self.previous.span) })
    }

    fn parse_basic_map(&mut self) -> Result<BasicMapExpr, ParseError> {
        let start = self.current.span;
        let input = self.parse_tuple()?;
        self.consume(TokenKind::Arrow, "between the map tuples")?;
        let output = self.parse_tuple()?;
        let constraints = self.parse_optional_constraints()?;
        Ok(BasicMapExpr { input, output, constraints, span: start.merge(&self.previous.span) })
    }

    fn parse_tuple(&mut self) -> Result<Tuple, ParseError> {
        let start = self.current.span;
        let name = if self.check(TokenKind::Identifier) {
            Some(self.consume_identifier("tuple name")?)
        } else {
            None
        };
        self.consume(TokenKind::LeftBracket, "to open the tuple")?;
        let mut elems = Vec::new();
        if !self.check(TokenKind::RightBracket) {
            elems.push(self.parse_expression()?);
            while self.match_token(TokenKind::Comma)? {
                elems.push(self.parse_expression()?);
            }
        }
        self.consume(TokenKind::RightBracket, "to close the tuple")?;
        Ok(Tuple { name, elems, span: start.merge(&self.previous.span) })
    }

    fn parse_optional_constraints(&mut self) -> Result<Vec<Chain>, ParseError> {
        let mut chains = Vec::new();
        if self.match_token(TokenKind::Colon)? {
            chains.push(self.parse_chain()?);
            while self.match_token(TokenKind::And)? || self.match_token(TokenKind::AmpAmp)? {
                chains.push(self.parse_chain()?);
            }
        }
        Ok(chains)
    }

    fn parse_chain(&mut self) -> Result<Chain, ParseError> {
        let first = self.parse_expression()?;
        let start = first.span;
        let mut operands = vec![first];
        let mut ops = Vec::new();
        while let Some(op) = cmp_op(self.current.kind) {
            self.advance()?;
            ops.push(op);
            operands.push(self.parse_expression()?);
        }
        if ops.is_empty() {
            return Err(self.error(
                ParseErrorKind::ExpectedToken,
                "Expected a comparison",
                &["<", "<=", "=", ">=", ">"],
            ));
        }
        Ok(Chain { operands, ops, span: start.merge(&self.previous.span) })
    }

    fn parse_body(&mut self) -> Result<BodyStmt, ParseError> {
        let start = self.current.span;
        let target = self.parse_primary()?;
        if !matches!(target.kind, ExprKind::Var(_) | ExprKind::Access { .. }) {
            return Err(ParseError {
                message: "Assignment target must be an array element or a scalar".to_string(),
                span: target.span,
                kind: ParseErrorKind::UnexpectedToken,
                expected: Vec::new(),
                found: None,
            });
        }
        let op = match self.current.kind {
            TokenKind::Equal => None,
            TokenKind::PlusEqual => Some(BinOp::Add),
            TokenKind::MinusEqual => Some(BinOp::Sub),
            TokenKind::StarEqual => Some(BinOp::Mul),
            TokenKind::SlashEqual => Some(BinOp::Div),
            TokenKind::PercentEqual => Some(BinOp::Mod),
            _ => {
                return Err(self.error(
                    ParseErrorKind::ExpectedToken,
                    "Expected an assignment",
                    &["=", "+=", "-=", "*=", "/=", "%="],
                ))
            }
        };
        self.advance()?;
        let value = self.parse_expression()?;
        self.match_token(TokenKind::Semicolon)?;
        Ok(BodyStmt { target, op, value, span: start.merge(&self.previous.span) })
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_additive_expr()
    }

    fn parse_additive_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative_expr()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative_expr()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                // `2i`, `3(i + j)`
                TokenKind::Identifier | TokenKind::LeftParen if self.previous.kind == TokenKind::Integer => {
                    let right = self.parse_unary_expr()?;
                    left = Expr::binary(BinOp::Mul, left, right);
                    continue;
                }
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary_expr()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span;
        if self.match_token(TokenKind::Minus)? {
            let operand = self.parse_unary_expr()?;
            let span = start.merge(&operand.span);
            return Ok(Expr::new(ExprKind::Neg(Box::new(operand)), span));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span;
        match self.current.kind {
            TokenKind::Integer => {
                let value: i64 = self.current.lexeme.parse().map_err(|_| {
                    self.error(ParseErrorKind::InvalidToken, "Invalid integer literal", &[])
                })?;
                self.advance()?;
                Ok(Expr::new(ExprKind::Int(value), start))
            }
            TokenKind::Float => {
                let text = self.current.lexeme.clone();
                self.advance()?;
                Ok(Expr::new(ExprKind::Float(text), start))
            }
            TokenKind::Identifier => {
                let name = self.current.lexeme.clone();
                self.advance()?;
                if self.match_token(TokenKind::LeftParen)? {
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RightParen) {
                        args.push(self.parse_expression()?);
                        while self.match_token(TokenKind::Comma)? {
                            args.push(self.parse_expression()?);
                        }
                    }
                    self.consume(TokenKind::RightParen, "after the call arguments")?;
                    Ok(Expr::new(ExprKind::Call { func: name, args }, start.merge(&self.previous.span)))
                } else if self.check(TokenKind::LeftBracket) {
                    // both A[i][j] and A[i, j]
                    let mut indices = Vec::new();
                    while self.match_token(TokenKind::LeftBracket)? {
                        indices.push(self.parse_expression()?);
                        while self.match_token(TokenKind::Comma)? {
                            indices.push(self.parse_expression()?);
                        }
                        self.consume(TokenKind::RightBracket, "after the index")?;
                    }
                    Ok(Expr::new(ExprKind::Access { array: name, indices }, start.merge(&self.previous.span)))
                } else {
                    Ok(Expr::new(ExprKind::Var(name), start))
                }
            }
            TokenKind::LeftParen => {
                self.advance()?;
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RightParen, "to close the parenthesis")?;
                Ok(Expr::new(inner.kind, start.merge(&self.previous.span)))
            }
            _ => Err(self.error(ParseErrorKind::ExpectedExpression, "Expected an expression", &[])),
        }
    }

    // Helper methods
    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Result<&Token, ParseError> {
        let next = self.lexer.next_token()?;
        self.previous = std::mem::replace(&mut self.current, next);
        Ok(&self.previous)
    }

    fn consume(&mut self, kind: TokenKind, context: &str) -> Result<&Token, ParseError> {
        if self.check(kind) {
            self.advance()
        } else {
            Err(self.error(ParseErrorKind::ExpectedToken, &format!("Expected '{}' {}", kind, context), &[kind.name()]))
        }
    }

    fn consume_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        if self.check(TokenKind::Identifier) {
            let name = self.current.lexeme.clone();
            self.advance()?;
            Ok(name)
        } else {
            Err(self.error(ParseErrorKind::ExpectedIdentifier, &format!("Expected {}", what), &["identifier"]))
        }
    }

    fn match_token(&mut self, kind: TokenKind) -> Result<bool, ParseError> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(self.error(ParseErrorKind::UnexpectedToken, "Expected end of input", &["end of file"]))
        }
    }

    /// An error at the current token.
    fn error(&self, kind: ParseErrorKind, message: &str, expected: &[&str]) -> ParseError {
        let kind = if self.is_at_end() && kind != ParseErrorKind::InvalidToken {
            ParseErrorKind::UnexpectedEof
        } else {
            kind
        };
        ParseError {
            message: message.to_string(),
            span: self.current.span,
            kind,
            expected: expected.iter().map(|s| s.to_string()).collect(),
            found: Some(self.current.describe()),
        }
    }
}

fn cmp_op(kind: TokenKind) -> Option<CmpOp> {
    match kind {
        TokenKind::Less => Some(CmpOp::Lt),
        TokenKind::LessEqual => Some(CmpOp::Le),
        TokenKind::Equal | TokenKind::EqualEqual => Some(CmpOp::Eq),
        TokenKind::GreaterEqual => Some(CmpOp::Ge),
        TokenKind::Greater => Some(CmpOp::Gt),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(source: &str) -> Parser<'_> {
        Parser::new(Lexer::new(source)).unwrap()
    }

    #[test]
    fn test_parametric_set() {
        let set = parser("[N] -> { S[i, j] : 0 <= i < N and 0 <= j <= i }").parse_set_only().unwrap();
        assert_eq!(set.params, vec!["N"]);
        assert_eq!(set.parts.len(), 1);
        let part = &set.parts[0];
        assert_eq!(part.tuple.as_ref().and_then(|t| t.name.clone()), Some("S".to_string()));
        assert_eq!(part.constraints.len(), 2);
        assert_eq!(part.constraints[0].ops, vec![CmpOp::Le, CmpOp::Lt]);
    }

    #[test]
    fn test_union_and_param_only_sets() {
        let set = parser("{ S[i] : i >= 0; T[] }").parse_set_only().unwrap();
        assert_eq!(set.parts.len(), 2);
        assert!(set.parts[1].tuple.as_ref().map_or(false, |t| t.elems.is_empty()));

        let context = parser("[N] -> { : N >= 1 }").parse_set_only().unwrap();
        assert!(context.parts[0].tuple.is_none());
    }

    #[test]
    fn test_map_with_implicit_multiplication() {
        let map = parser("{ S[i] -> A[i + 1, 2i] }").parse_map_only().unwrap();
        let out = &map.parts[0].output;
        assert_eq!(out.name.as_deref(), Some("A"));
        assert!(matches!(
            out.elems[1].kind,
            ExprKind::Binary { op: BinOp::Mul, .. }
        ));
    }

    #[test]
    fn test_body() {
        let body = parser("A[i][j] += B[i] * 2.5 + f(x)").parse_body_only().unwrap();
        assert_eq!(body.op, Some(BinOp::Add));
        assert!(matches!(body.target.kind, ExprKind::Access { ref indices, .. } if indices.len() == 2));
    }

    #[test]
    fn test_scop_file() {
        let source = r#"
            params N;
            context { : N >= 1 };
            stmt { S[i] : 0 <= i < N } { A[i] = B[i] + 1; }
            schedule { S[i] -> [i] };
        "#;
        let file = parser(source).parse_file().unwrap();
        assert_eq!(file.items.len(), 4);
        assert!(matches!(file.items[2], Item::Stmt { .. }));
    }

    #[test]
    fn test_error_reports_expected_and_found() {
        let err = parser("{ S[i] : 0 <= i N }").parse_set_only().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ExpectedToken);
        assert_eq!(err.found.as_deref(), Some("'N'"));
        assert_eq!(err.span.start_column, 17);

        let err = parser("{ S[i] : i >= 0").parse_set_only().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);

        let err = parser("stmt { S[] } { 3 = 4; }").parse_file().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
    }
}
