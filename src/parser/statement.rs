//! Statement grammar: tag dispatch and the body/terminator handling shared
//! by every block-form tag (`if`/`for`/`block`/`macro`/...).

use super::{ParseResult, Parser};
use crate::ast::{
    AutoescapeStmt, BlockStmt, CallStmt, ExtendsStmt, FilterChainLink, FilterStmt, ForStmt,
    FromImport, FromStmt, IfBranch, IfStmt, ImportStmt, IncludeStmt, MacroArg, MacroStmt,
    OutputStmt, SetStmt, SetValue, Stmt, WithStmt,
};
use crate::error::TranspileError;
use crate::token::TokenKind;

/// `end*`/`elif`/`else` keywords reachable only as a block terminator inside
/// `parse_stmts_until`; seeing one here (via `parse_tag`) means it appeared
/// with no matching opener.
fn is_closer_keyword(word: &str) -> bool {
    matches!(
        word,
        "elif"
            | "else"
            | "endif"
            | "endfor"
            | "endblock"
            | "endmacro"
            | "endcall"
            | "endfilter"
            | "endraw"
            | "endset"
            | "endwith"
            | "endautoescape"
    )
}

impl Parser {
    pub(super) fn parse_stmts_until(&mut self, terminators: &[&str]) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Text => {
                    let lexeme = self.advance().lexeme.clone();
                    stmts.push(Stmt::Text(lexeme));
                }
                TokenKind::Comment => {
                    let lexeme = self.advance().lexeme.clone();
                    stmts.push(Stmt::Comment(lexeme));
                }
                TokenKind::VarStart => {
                    stmts.push(self.parse_output()?);
                }
                TokenKind::StmtStart => {
                    let keyword = self.peek_stmt_keyword();
                    if terminators.contains(&keyword.as_str()) {
                        break;
                    }
                    stmts.push(self.parse_tag()?);
                }
                _ => {
                    self.advance();
                }
            }
        }
        Ok(stmts)
    }

    fn parse_output(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::VarStart, "{{")?.clone();
        let expr = self.parse_expr()?;
        let end = self.expect(TokenKind::VarEnd, "}}")?;
        Ok(Stmt::Output(OutputStmt {
            expr,
            strip_before: start.strip_before,
            strip_after: end.strip_after,
        }))
    }

    fn parse_tag(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::StmtStart, "{%")?.clone();
        let strip_before = start.strip_before;
        let keyword_tok = self.expect(TokenKind::Name, "a statement keyword")?.clone();
        match keyword_tok.lexeme.as_str() {
            "if" => self.parse_if(strip_before),
            "for" => self.parse_for(strip_before),
            "block" => self.parse_block(strip_before),
            "extends" => self.parse_extends(),
            "include" => self.parse_include(),
            "import" => self.parse_import(),
            "from" => self.parse_from(),
            "set" => self.parse_set(),
            "macro" => self.parse_macro(),
            "call" => self.parse_call(),
            "filter" => self.parse_filter(),
            "raw" => self.parse_raw(),
            "with" => self.parse_with(),
            "autoescape" => self.parse_autoescape(),
            closer if is_closer_keyword(closer) => {
                Err(TranspileError::unmatched_closure(closer, keyword_tok.position))
            }
            other => Err(TranspileError::unknown_statement(other, keyword_tok.position)),
        }
    }

    fn parse_if(&mut self, strip_before: bool) -> ParseResult<Stmt> {
        let condition = self.parse_expr()?;
        self.expect(TokenKind::StmtEnd, "%}")?;
        let body = self.parse_stmts_until(&["elif", "else", "endif"])?;

        let mut branches = Vec::new();
        loop {
            match self.peek_stmt_keyword().as_str() {
                "elif" => {
                    self.expect(TokenKind::StmtStart, "{%")?;
                    self.expect_keyword("elif")?;
                    let cond = self.parse_expr()?;
                    self.expect(TokenKind::StmtEnd, "%}")?;
                    let b = self.parse_stmts_until(&["elif", "else", "endif"])?;
                    branches.push(IfBranch::Elif { condition: cond, body: b });
                }
                "else" => {
                    self.expect(TokenKind::StmtStart, "{%")?;
                    self.expect_keyword("else")?;
                    self.expect(TokenKind::StmtEnd, "%}")?;
                    let b = self.parse_stmts_until(&["endif"])?;
                    branches.push(IfBranch::Else { body: b });
                    break;
                }
                _ => break,
            }
        }

        let strip_after = self.consume_end_tag("endif")?;
        Ok(Stmt::If(IfStmt {
            condition,
            body,
            branches,
            strip_before,
            strip_after,
        }))
    }

    fn parse_for(&mut self, strip_before: bool) -> ParseResult<Stmt> {
        let mut loop_vars = vec![self.expect_name()?];
        while self.match_kind(TokenKind::Comma) {
            loop_vars.push(self.expect_name()?);
        }
        self.expect_keyword("in")?;
        // Parsed one level below the ternary so a bare `if` here is left
        // for this loop's own `if <filter>` clause instead of being
        // absorbed as `iterable if x else ...`.
        let iterable = self.parse_or()?;
        let filter = if self.check_keyword("if") {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        let recursive = self.match_keyword("recursive");
        self.expect(TokenKind::StmtEnd, "%}")?;

        let body = self.parse_stmts_until(&["else", "endfor"])?;
        let else_body = if self.peek_stmt_keyword() == "else" {
            self.expect(TokenKind::StmtStart, "{%")?;
            self.expect_keyword("else")?;
            self.expect(TokenKind::StmtEnd, "%}")?;
            Some(self.parse_stmts_until(&["endfor"])?)
        } else {
            None
        };
        self.consume_end_tag("endfor")?;

        Ok(Stmt::For(ForStmt {
            loop_vars,
            iterable,
            filter,
            recursive,
            body,
            else_body,
            strip_before,
        }))
    }

    fn parse_block(&mut self, strip_before: bool) -> ParseResult<Stmt> {
        let name = self.expect_name()?;
        let scoped = self.match_keyword("scoped");
        self.expect(TokenKind::StmtEnd, "%}")?;
        let body = self.parse_stmts_until(&["endblock"])?;
        self.expect(TokenKind::StmtStart, "{%")?;
        self.expect_keyword("endblock")?;
        if self.check(TokenKind::Name) {
            self.advance();
        }
        self.expect(TokenKind::StmtEnd, "%}")?;
        Ok(Stmt::Block(BlockStmt { name, scoped, body, strip_before }))
    }

    fn parse_extends(&mut self) -> ParseResult<Stmt> {
        let template = self.parse_expr()?;
        self.expect(TokenKind::StmtEnd, "%}")?;
        Ok(Stmt::Extends(ExtendsStmt { template }))
    }

    fn parse_include(&mut self) -> ParseResult<Stmt> {
        let template = self.parse_expr()?;
        let ignore_missing = if self.check_keyword("ignore") {
            self.advance();
            self.expect_keyword("missing")?;
            true
        } else {
            false
        };
        let with_context = self.parse_context_clause(true)?;
        self.expect(TokenKind::StmtEnd, "%}")?;
        Ok(Stmt::Include(IncludeStmt {
            template,
            ignore_missing,
            with_context,
        }))
    }

    fn parse_import(&mut self) -> ParseResult<Stmt> {
        let template = self.parse_expr()?;
        self.expect_keyword("as")?;
        let alias = self.expect_name()?;
        let with_context = self.parse_context_clause(false)?;
        self.expect(TokenKind::StmtEnd, "%}")?;
        Ok(Stmt::Import(ImportStmt {
            template,
            alias,
            with_context,
        }))
    }

    fn parse_from(&mut self) -> ParseResult<Stmt> {
        let template = self.parse_expr()?;
        self.expect_keyword("import")?;
        let mut imports = Vec::new();
        loop {
            let name = self.expect_name()?;
            let alias = if self.match_keyword("as") { Some(self.expect_name()?) } else { None };
            imports.push(FromImport { name, alias });
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        let with_context = self.parse_context_clause(false)?;
        self.expect(TokenKind::StmtEnd, "%}")?;
        Ok(Stmt::From(FromStmt {
            template,
            imports,
            with_context,
        }))
    }

    fn parse_set(&mut self) -> ParseResult<Stmt> {
        let mut names = vec![self.expect_name()?];
        while self.match_kind(TokenKind::Comma) {
            names.push(self.expect_name()?);
        }
        if self.match_kind(TokenKind::Assign) {
            let value = self.parse_expr()?;
            self.expect(TokenKind::StmtEnd, "%}")?;
            Ok(Stmt::Set(SetStmt { names, value: SetValue::Inline(value) }))
        } else {
            self.expect(TokenKind::StmtEnd, "%}")?;
            let body = self.parse_stmts_until(&["endset"])?;
            self.consume_end_tag("endset")?;
            Ok(Stmt::Set(SetStmt { names, value: SetValue::Block(body) }))
        }
    }

    fn parse_macro_args(&mut self) -> ParseResult<Vec<MacroArg>> {
        let mut args = Vec::new();
        if self.check(TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            let name = self.expect_name()?;
            let default = if self.match_kind(TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            args.push(MacroArg { name, default });
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, ")")?;
        Ok(args)
    }

    fn parse_macro(&mut self) -> ParseResult<Stmt> {
        let name = self.expect_name()?;
        self.expect(TokenKind::LParen, "(")?;
        let args = self.parse_macro_args()?;
        self.expect(TokenKind::StmtEnd, "%}")?;
        let body = self.parse_stmts_until(&["endmacro"])?;
        self.consume_end_tag("endmacro")?;
        Ok(Stmt::Macro(MacroStmt { name, args, body }))
    }

    fn parse_call(&mut self) -> ParseResult<Stmt> {
        let args = if self.match_kind(TokenKind::LParen) {
            self.parse_macro_args()?
        } else {
            Vec::new()
        };
        let call = self.parse_expr()?;
        self.expect(TokenKind::StmtEnd, "%}")?;
        let body = self.parse_stmts_until(&["endcall"])?;
        self.consume_end_tag("endcall")?;
        Ok(Stmt::Call(CallStmt { args, call, body }))
    }

    fn parse_filter(&mut self) -> ParseResult<Stmt> {
        let mut chain = Vec::new();
        loop {
            let name = self.expect_name()?;
            let args = if self.match_kind(TokenKind::LParen) {
                self.parse_call_args()?
            } else {
                Vec::new()
            };
            chain.push(FilterChainLink { name, args });
            if !self.match_kind(TokenKind::Pipe) {
                break;
            }
        }
        self.expect(TokenKind::StmtEnd, "%}")?;
        let body = self.parse_stmts_until(&["endfilter"])?;
        self.consume_end_tag("endfilter")?;
        Ok(Stmt::Filter(FilterStmt { chain, body }))
    }

    fn parse_raw(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::StmtEnd, "%}")?;
        // The lexer captures everything up to `{% endraw %}` as one Text
        // token so this body is never expression-mode scanned.
        let body = match self.peek_kind() {
            TokenKind::Text => self.advance().lexeme.clone(),
            _ => String::new(),
        };
        self.consume_end_tag("endraw")?;
        Ok(Stmt::Raw(body))
    }

    fn parse_with(&mut self) -> ParseResult<Stmt> {
        let mut assignments = Vec::new();
        if !self.check(TokenKind::StmtEnd) {
            loop {
                let name = self.expect_name()?;
                self.expect(TokenKind::Assign, "=")?;
                let value = self.parse_expr()?;
                assignments.push((name, value));
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::StmtEnd, "%}")?;
        let body = self.parse_stmts_until(&["endwith"])?;
        self.consume_end_tag("endwith")?;
        Ok(Stmt::With(WithStmt { assignments, body }))
    }

    fn parse_autoescape(&mut self) -> ParseResult<Stmt> {
        let enabled_expr = self.parse_expr()?;
        let enabled = matches!(
            enabled_expr,
            crate::ast::Expr::Literal(crate::ast::LiteralValue::Bool(true))
        );
        self.expect(TokenKind::StmtEnd, "%}")?;
        let body = self.parse_stmts_until(&["endautoescape"])?;
        self.consume_end_tag("endautoescape")?;
        Ok(Stmt::Autoescape(AutoescapeStmt { enabled, body }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::Parser;
    use crate::ast::{IfBranch, SetValue, Stmt};
    use crate::lexer::{Delimiters, Lexer};

    fn parse(src: &str) -> Vec<Stmt> {
        let tokens = Lexer::new(src, Delimiters::default()).tokenize().unwrap();
        Parser::new(tokens).parse().unwrap().body
    }

    #[test]
    fn if_else_roundtrips_branches() {
        let body = parse("{% if a %}x{% else %}y{% endif %}");
        match &body[0] {
            Stmt::If(s) => {
                assert_eq!(s.branches.len(), 1);
                assert!(matches!(s.branches[0], IfBranch::Else { .. }));
            }
            _ => panic!("expected if"),
        }
    }

    #[test]
    fn if_elif_else_chain() {
        let body = parse("{% if a %}1{% elif b %}2{% else %}3{% endif %}");
        match &body[0] {
            Stmt::If(s) => {
                assert_eq!(s.branches.len(), 2);
                assert!(matches!(s.branches[0], IfBranch::Elif { .. }));
                assert!(matches!(s.branches[1], IfBranch::Else { .. }));
            }
            _ => panic!("expected if"),
        }
    }

    #[test]
    fn for_loop_with_filter_and_else() {
        let body = parse("{% for x in items if x.ok %}a{% else %}b{% endfor %}");
        match &body[0] {
            Stmt::For(s) => {
                assert!(s.filter.is_some());
                assert!(s.else_body.is_some());
            }
            _ => panic!("expected for"),
        }
    }

    #[test]
    fn set_inline_vs_block() {
        let inline = parse("{% set x = 1 %}");
        match &inline[0] {
            Stmt::Set(s) => assert!(matches!(s.value, SetValue::Inline(_))),
            _ => panic!("expected set"),
        }
        let block = parse("{% set x %}hi{% endset %}");
        match &block[0] {
            Stmt::Set(s) => assert!(matches!(s.value, SetValue::Block(_))),
            _ => panic!("expected set"),
        }
    }

    #[test]
    fn macro_with_default_arg() {
        let body = parse("{% macro greet(name, greeting='hi') %}x{% endmacro %}");
        match &body[0] {
            Stmt::Macro(m) => {
                assert_eq!(m.args.len(), 2);
                assert!(m.args[1].default.is_some());
            }
            _ => panic!("expected macro"),
        }
    }

    #[test]
    fn raw_block_is_captured_verbatim() {
        let body = parse("{% raw %}{{ not touched }}{% endraw %}");
        match &body[0] {
            Stmt::Raw(text) => assert_eq!(text, "{{ not touched }}"),
            _ => panic!("expected raw"),
        }
    }

    #[test]
    fn include_defaults_to_with_context() {
        let body = parse("{% include 'x.html' %}");
        match &body[0] {
            Stmt::Include(s) => assert!(s.with_context),
            _ => panic!("expected include"),
        }
    }

    #[test]
    fn import_defaults_to_without_context() {
        let body = parse("{% import 'x.html' as x %}");
        match &body[0] {
            Stmt::Import(s) => assert!(!s.with_context),
            _ => panic!("expected import"),
        }
    }

    #[test]
    fn from_import_with_alias() {
        let body = parse("{% from 'x.html' import a as b %}");
        match &body[0] {
            Stmt::From(s) => {
                assert_eq!(s.imports[0].name, "a");
                assert_eq!(s.imports[0].alias.as_deref(), Some("b"));
            }
            _ => panic!("expected from"),
        }
    }

    #[test]
    fn unknown_statement_keyword_errors() {
        let tokens = Lexer::new("{% bogus %}", Delimiters::default()).tokenize().unwrap();
        let err = Parser::new(tokens).parse();
        assert!(err.is_err());
    }

    #[test]
    fn endif_without_matching_if_is_unmatched_closure() {
        let tokens = Lexer::new("{% endif %}", Delimiters::default()).tokenize().unwrap();
        let err = Parser::new(tokens).parse();
        match err {
            Err(crate::error::TranspileError::UnmatchedClosure { closer, .. }) => {
                assert_eq!(closer, "endif")
            }
            other => panic!("expected UnmatchedClosure, got {:?}", other),
        }
    }

    #[test]
    fn for_missing_in_keyword_is_unexpected_token() {
        let tokens = Lexer::new("{% for x items %}{% endfor %}", Delimiters::default())
            .tokenize()
            .unwrap();
        let err = Parser::new(tokens).parse();
        assert!(matches!(
            err,
            Err(crate::error::TranspileError::UnexpectedToken { .. })
        ));
    }
}
