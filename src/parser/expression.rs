//! Expression-precedence grammar, loosest-binding to tightest:
//! ternary -> or -> and -> not -> comparison -> additive -> multiplicative
//! -> unary -> power -> filter chain -> postfix -> primary.

use super::{ParseResult, Parser};
use crate::ast::{BinOpKind, Expr, LiteralValue, UnaryOpKind};
use crate::error::TranspileError;
use crate::token::TokenKind;

impl Parser {
    pub(super) fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> ParseResult<Expr> {
        let true_val = self.parse_or()?;
        if self.check_keyword("if") {
            self.advance();
            let condition = self.parse_or()?;
            let false_val = if self.check_keyword("else") {
                self.advance();
                Some(Box::new(self.parse_ternary()?))
            } else {
                None
            };
            return Ok(Expr::Ternary {
                true_val: Box::new(true_val),
                condition: Box::new(condition),
                false_val,
            });
        }
        Ok(true_val)
    }

    /// Entry point for contexts where a bare `if` must be left for the
    /// caller to consume (e.g. a `for` loop's `if <filter>` clause) rather
    /// than absorbed into a ternary, which binds looser than everything
    /// below `or`.
    pub(super) fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;
        while self.check_keyword("or") {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::BinOp {
                op: BinOpKind::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_not()?;
        while self.check_keyword("and") {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::BinOp {
                op: BinOpKind::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<Expr> {
        if self.check_keyword("not") {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOpKind::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.check_operator("==") {
                BinOpKind::Eq
            } else if self.check_operator("!=") {
                BinOpKind::NotEq
            } else if self.check_operator("<=") {
                BinOpKind::LtEq
            } else if self.check_operator(">=") {
                BinOpKind::GtEq
            } else if self.check_operator("<") {
                BinOpKind::Lt
            } else if self.check_operator(">") {
                BinOpKind::Gt
            } else if self.check_keyword("in") {
                BinOpKind::In
            } else if self.check_keyword("not") && self.peek_ahead_is("in") {
                self.advance();
                self.advance();
                let right = self.parse_additive()?;
                left = Expr::BinOp {
                    op: BinOpKind::NotIn,
                    left: Box::new(left),
                    right: Box::new(right),
                };
                continue;
            } else if self.check_keyword("is") && self.peek_ahead_is("not") {
                self.advance();
                self.advance();
                let right = self.parse_additive()?;
                left = Expr::BinOp {
                    op: BinOpKind::IsNot,
                    left: Box::new(left),
                    right: Box::new(right),
                };
                continue;
            } else if self.check_keyword("is") {
                BinOpKind::Is
            } else {
                break;
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.check_operator("+") {
                BinOpKind::Add
            } else if self.check_operator("-") {
                BinOpKind::Sub
            } else if self.check_operator("~") {
                BinOpKind::Concat
            } else {
                break;
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.check_operator("//") {
                BinOpKind::FloorDiv
            } else if self.check_operator("**") {
                BinOpKind::Pow
            } else if self.check_operator("*") {
                BinOpKind::Mul
            } else if self.check_operator("/") {
                BinOpKind::Div
            } else if self.check_operator("%") {
                BinOpKind::Mod
            } else {
                break;
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.check_operator("-") {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOpKind::Minus,
                operand: Box::new(operand),
            });
        }
        if self.check_operator("+") {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOpKind::Plus,
                operand: Box::new(operand),
            });
        }
        self.parse_filter_chain()
    }

    fn parse_filter_chain(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_postfix()?;
        while self.match_kind(TokenKind::Pipe) {
            let name = self.expect_name()?;
            let args = if self.match_kind(TokenKind::LParen) {
                self.parse_call_args()?
            } else {
                Vec::new()
            };
            expr = Expr::Filter {
                name,
                expr: Box::new(expr),
                args,
            };
        }
        Ok(expr)
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.match_kind(TokenKind::Dot) {
                let attr = self.expect_name()?;
                expr = Expr::GetAttr {
                    expr: Box::new(expr),
                    attr,
                };
            } else if self.match_kind(TokenKind::LBracket) {
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket, "]")?;
                expr = Expr::GetItem {
                    expr: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.match_kind(TokenKind::LParen) {
                let (args, kwargs) = self.parse_call_args_and_kwargs()?;
                expr = Expr::Call {
                    expr: Box::new(expr),
                    args,
                    kwargs,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    pub(super) fn parse_call_args(&mut self) -> ParseResult<Vec<Expr>> {
        let (args, kwargs) = self.parse_call_args_and_kwargs()?;
        let mut out = args;
        for (name, value) in kwargs {
            out.push(Expr::NamedArg {
                name,
                value: Box::new(value),
            });
        }
        Ok(out)
    }

    fn parse_call_args_and_kwargs(&mut self) -> ParseResult<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        if self.check(TokenKind::RParen) {
            self.advance();
            return Ok((args, kwargs));
        }
        loop {
            if self.check(TokenKind::Name) && self.peek_ahead_kind_is(TokenKind::Assign) {
                let name = self.expect_name()?;
                self.advance(); // '='
                let value = self.parse_expr()?;
                kwargs.push((name, value));
            } else {
                args.push(self.parse_expr()?);
            }
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, ")")?;
        Ok((args, kwargs))
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                Ok(Expr::Literal(LiteralValue::Num(tok.lexeme)))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::Literal(LiteralValue::Str(unescape(&tok.lexeme))))
            }
            TokenKind::Name => {
                self.advance();
                match tok.lexeme.as_str() {
                    "true" | "True" => Ok(Expr::Literal(LiteralValue::Bool(true))),
                    "false" | "False" => Ok(Expr::Literal(LiteralValue::Bool(false))),
                    "none" | "None" | "null" => Ok(Expr::Literal(LiteralValue::None)),
                    _ => Ok(Expr::Name(tok.lexeme)),
                }
            }
            TokenKind::LParen => {
                self.advance();
                if self.check(TokenKind::RParen) {
                    self.advance();
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.check(TokenKind::Comma) {
                    let mut items = vec![first];
                    while self.match_kind(TokenKind::Comma) {
                        if self.check(TokenKind::RParen) {
                            break;
                        }
                        items.push(self.parse_expr()?);
                    }
                    self.expect(TokenKind::RParen, ")")?;
                    Ok(Expr::Tuple(items))
                } else {
                    self.expect(TokenKind::RParen, ")")?;
                    Ok(first)
                }
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.match_kind(TokenKind::Comma) {
                            break;
                        }
                        if self.check(TokenKind::RBracket) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket, "]")?;
                Ok(Expr::List(items))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(TokenKind::RBrace) {
                    loop {
                        let key = self.parse_expr()?;
                        self.expect(TokenKind::Colon, ":")?;
                        let value = self.parse_expr()?;
                        items.push((key, value));
                        if !self.match_kind(TokenKind::Comma) {
                            break;
                        }
                        if self.check(TokenKind::RBrace) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBrace, "}")?;
                Ok(Expr::Dict(items))
            }
            _ => Err(TranspileError::MalformedExpression { offset: tok.position }),
        }
    }

    // -- lookahead helpers --

    fn check_operator(&self, op: &str) -> bool {
        self.peek_kind() == TokenKind::Operator && self.peek().lexeme == op
    }

    fn peek_ahead_is(&self, word: &str) -> bool {
        self.tokens
            .get(self.current + 1)
            .map(|t| t.kind == TokenKind::Operator && t.lexeme == word)
            .unwrap_or(false)
    }

    fn peek_ahead_kind_is(&self, kind: TokenKind) -> bool {
        self.tokens.get(self.current + 1).map(|t| t.kind == kind).unwrap_or(false)
    }
}

/// Unescapes a string-literal lexeme, stripping the surrounding quotes.
fn unescape(lexeme: &str) -> String {
    let inner = &lexeme[1..lexeme.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some('\'') => out.push('\''),
                Some('"') => out.push('"'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}
