//! Stage 2 of the pipeline: a hand-written recursive-descent parser that
//! turns a flat token stream into an [`ast::Root`](crate::ast::Root).

mod expression;
mod statement;

use crate::ast::Root;
use crate::error::TranspileError;
use crate::token::{Token, TokenKind};

pub type ParseResult<T> = Result<T, TranspileError>;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    pub fn parse(mut self) -> ParseResult<Root> {
        let body = self.parse_stmts_until(&[])?;
        Ok(Root { body })
    }

    // -- token-stream plumbing, shared by statement.rs and expression.rs --

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// Matches a textual keyword regardless of whether the lexer classified
    /// it as `Name` (`if`, `else`, `as`, ...) or `Operator` (`and`, `or`,
    /// `not`, `in`, `is` — see `token::WORD_OPERATORS`): both are spelled
    /// out as identifiers in the source and only differ by the lexer's
    /// expression-mode word-operator carve-out, which callers here don't
    /// need to care about.
    fn check_keyword(&self, word: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Name | TokenKind::Operator) && self.peek().lexeme == word
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_keyword(&mut self, word: &str) -> bool {
        if self.check_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> ParseResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let found = self.peek().lexeme.clone();
            let offset = self.peek().position;
            Err(TranspileError::UnexpectedToken {
                expected: expected.to_string(),
                found: if found.is_empty() { "end of input".to_string() } else { found },
                offset,
            })
        }
    }

    fn expect_keyword(&mut self, word: &str) -> ParseResult<()> {
        if self.match_keyword(word) {
            Ok(())
        } else {
            let found = self.peek().lexeme.clone();
            let offset = self.peek().position;
            Err(TranspileError::UnexpectedToken {
                expected: format!("'{}'", word),
                found: if found.is_empty() { "end of input".to_string() } else { found },
                offset,
            })
        }
    }

    fn expect_name(&mut self) -> ParseResult<String> {
        let tok = self.expect(TokenKind::Name, "identifier")?;
        Ok(tok.lexeme.clone())
    }

    /// Looks at the keyword of an upcoming `{% keyword %}` tag without
    /// consuming anything, so callers can decide whether it's a terminator.
    fn peek_stmt_keyword(&self) -> String {
        if self.peek_kind() != TokenKind::StmtStart {
            return String::new();
        }
        self.tokens
            .get(self.current + 1)
            .filter(|t| t.kind == TokenKind::Name)
            .map(|t| t.lexeme.clone())
            .unwrap_or_default()
    }

    /// Consumes a `{% keyword %}` end tag, returning whether it requested a
    /// trailing whitespace strip.
    fn consume_end_tag(&mut self, keyword: &str) -> ParseResult<bool> {
        self.expect(TokenKind::StmtStart, "{%")?;
        self.expect_keyword(keyword)?;
        let end = self.expect(TokenKind::StmtEnd, "%}")?;
        Ok(end.strip_after)
    }

    fn parse_context_clause(&mut self, default: bool) -> ParseResult<bool> {
        if self.check_keyword("with") {
            self.advance();
            self.expect_keyword("context")?;
            Ok(true)
        } else if self.check_keyword("without") {
            self.advance();
            self.expect_keyword("context")?;
            Ok(false)
        } else {
            Ok(default)
        }
    }
}
