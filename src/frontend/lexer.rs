//! Lexer for isl notation and `.scop` files.
//!
//! The lexer converts source text into a stream of tokens. A number is
//! never glued to a following name, so `2i` lexes as `2` `i` and the parser
//! reads it as an implicit multiplication.

use crate::frontend::token::{Token, TokenKind};
use crate::utils::errors::{LexerError, LexerErrorKind};
use crate::utils::location::{SourceLocation, SourceMap, Span};
use std::iter::Peekable;
use std::str::Chars;
use unicode_xid::UnicodeXID;

/// A lexer for tokenizing source code.
pub struct Lexer<'a> {
    /// The source text
    source: &'a str,
    /// Character iterator
    chars: Peekable<Chars<'a>>,
    /// Current byte offset
    offset: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Start of current token
    token_start: SourceLocation,
    /// Source map for location lookups
    source_map: SourceMap<'a>,
    /// Whether we've hit EOF
    at_eof: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
            offset: 0,
            line: 1,
            column: 1,
            token_start: SourceLocation::start(),
            source_map: SourceMap::new(source),
            at_eof: false,
        }
    }

    /// Get the source map.
    pub fn source_map(&self) -> &SourceMap<'a> {
        &self.source_map
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column, self.offset)
    }

    fn mark_token_start(&mut self) {
        self.token_start = self.current_location();
    }

    fn make_span(&self) -> Span {
        Span::from_locations(self.token_start, self.current_location())
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Peek `n` characters past the current one.
    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.offset..].chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_digit_at(&self, n: usize) -> bool {
        self.peek_at(n).map_or(false, |c| c.is_ascii_digit())
    }

    /// Skip whitespace and comments (`//`, `#` and `/* */`).
    fn skip_whitespace(&mut self) -> Result<(), LexerError> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance();
                }
                Some('#') => self.skip_line(),
                Some('/') if self.peek_at(1) == Some('/') => self.skip_line(),
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.mark_token_start();
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(self.make_error("Unterminated block comment", LexerErrorKind::UnterminatedComment));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line(&mut self) {
        while self.peek().is_some() && self.peek() != Some('\n') {
            self.advance();
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        let span = self.make_span();
        let lexeme = self.source[span.start_offset..span.end_offset].to_string();
        Token::new(kind, span, lexeme)
    }

    fn make_error(&self, message: &str, kind: LexerErrorKind) -> LexerError {
        LexerError {
            message: message.to_string(),
            span: self.make_span(),
            kind,
        }
    }

    /// Scan a number literal; the first digit is consumed.
    fn scan_number(&mut self) -> Result<Token, LexerError> {
        while self.is_digit_at(0) {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == Some('.') && self.is_digit_at(1) {
            is_float = true;
            self.advance();
            while self.is_digit_at(0) {
                self.advance();
            }
        }

        // `2e5` is an exponent, `2e` is 2 * e
        if matches!(self.peek(), Some('e') | Some('E')) {
            let signed = matches!(self.peek_at(1), Some('+') | Some('-'));
            if self.is_digit_at(1) || (signed && self.is_digit_at(2)) {
                is_float = true;
                self.advance();
                if signed {
                    self.advance();
                }
                while self.is_digit_at(0) {
                    self.advance();
                }
            }
        }

        // C float suffix
        if is_float && matches!(self.peek(), Some('f') | Some('F')) && !self.peek_at(1).map_or(false, |c| c.is_xid_continue()) {
            self.advance();
        }

        if is_float {
            Ok(self.make_token(TokenKind::Float))
        } else {
            let token = self.make_token(TokenKind::Integer);
            if token.lexeme.parse::<i64>().is_err() {
                return Err(self.make_error("Integer literal out of range", LexerErrorKind::InvalidNumber));
            }
            Ok(token)
        }
    }

    /// Scan an identifier or keyword.
    fn scan_identifier(&mut self) -> Token {
        while self.peek().map_or(false, |c| c.is_xid_continue() || c == '_' || c == '\'') {
            self.advance();
        }

        let span = self.make_span();
        let lexeme = &self.source[span.start_offset..span.end_offset];
        let kind = TokenKind::keyword(lexeme).unwrap_or(TokenKind::Identifier);
        Token::new(kind, span, lexeme.to_string())
    }

    /// Scan the next token.
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace()?;
        self.mark_token_start();

        let c = match self.advance() {
            Some(c) => c,
            None => {
                self.at_eof = true;
                return Ok(self.make_token(TokenKind::Eof));
            }
        };

        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,

            '+' if self.match_char('=') => TokenKind::PlusEqual,
            '+' => TokenKind::Plus,
            '-' if self.match_char('=') => TokenKind::MinusEqual,
            '-' if self.match_char('>') => TokenKind::Arrow,
            '-' => TokenKind::Minus,
            '*' if self.match_char('=') => TokenKind::StarEqual,
            '*' => TokenKind::Star,
            '/' if self.match_char('=') => TokenKind::SlashEqual,
            '/' => TokenKind::Slash,
            '%' if self.match_char('=') => TokenKind::PercentEqual,
            '%' => TokenKind::Percent,
            '=' if self.match_char('=') => TokenKind::EqualEqual,
            '=' => TokenKind::Equal,
            '<' if self.match_char('=') => TokenKind::LessEqual,
            '<' => TokenKind::Less,
            '>' if self.match_char('=') => TokenKind::GreaterEqual,
            '>' => TokenKind::Greater,
            '&' if self.match_char('&') => TokenKind::AmpAmp,
            '&' => {
                return Err(self.make_error("Expected '&&', found single '&'", LexerErrorKind::UnexpectedChar));
            }

            c if c.is_ascii_digit() => return self.scan_number(),
            c if c.is_xid_start() || c == '_' => return Ok(self.scan_identifier()),

            _ => {
                return Err(self.make_error(&format!("Unexpected character: '{}'", c), LexerErrorKind::UnexpectedChar));
            }
        };
        Ok(self.make_token(kind))
    }

    /// Check if we've reached EOF.
    pub fn is_at_end(&self) -> bool {
        self.at_eof
    }

    /// Collect all tokens into a vector.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.at_eof {
            None
        } else {
            let result = self.next_token();
            if result.as_ref().map(|t| t.is_eof()).unwrap_or(false) {
                self.at_eof = true;
            }
            Some(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::new(source).tokenize().unwrap()
    }

    fn token_kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_empty() {
        let tokens = lex("  \n\t ");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn test_set_notation() {
        let kinds = token_kinds("[N] -> { S[i] : 0 <= i < N and i = 2 }");
        assert_eq!(
            kinds,
            vec![
                TokenKind::LeftBracket,
                TokenKind::Identifier,
                TokenKind::RightBracket,
                TokenKind::Arrow,
                TokenKind::LeftBrace,
                TokenKind::Identifier,
                TokenKind::LeftBracket,
                TokenKind::Identifier,
                TokenKind::RightBracket,
                TokenKind::Colon,
                TokenKind::Integer,
                TokenKind::LessEqual,
                TokenKind::Identifier,
                TokenKind::Less,
                TokenKind::Identifier,
                TokenKind::And,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Integer,
                TokenKind::RightBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_implicit_multiplication() {
        let tokens = lex("2i 3e 1e3 2.5f");
        assert_eq!(tokens[0].kind, TokenKind::Integer);
        assert_eq!(tokens[1].lexeme, "i");
        assert_eq!(tokens[2].lexeme, "3");
        assert_eq!(tokens[3].lexeme, "e");
        assert_eq!(tokens[4].kind, TokenKind::Float);
        assert_eq!(tokens[5].lexeme, "2.5f");
    }

    #[test]
    fn test_assignment_operators() {
        let kinds = token_kinds("+= -= *= /= %= == =");
        assert_eq!(
            kinds,
            vec![
                TokenKind::PlusEqual,
                TokenKind::MinusEqual,
                TokenKind::StarEqual,
                TokenKind::SlashEqual,
                TokenKind::PercentEqual,
                TokenKind::EqualEqual,
                TokenKind::Equal,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        let tokens = lex("params // a\n# b\n/* c */ N");
        assert_eq!(tokens[0].kind, TokenKind::Params);
        assert_eq!(tokens[1].lexeme, "N");
        assert_eq!(tokens[1].span.start_line, 3);
    }

    #[test]
    fn test_errors() {
        let err = Lexer::new("S[i] $").tokenize().unwrap_err();
        assert_eq!(err.kind, LexerErrorKind::UnexpectedChar);
        assert_eq!(err.span.start_column, 6);

        let err = Lexer::new("/* open").tokenize().unwrap_err();
        assert_eq!(err.kind, LexerErrorKind::UnterminatedComment);

        let err = Lexer::new("99999999999999999999").tokenize().unwrap_err();
        assert_eq!(err.kind, LexerErrorKind::InvalidNumber);
    }
}
