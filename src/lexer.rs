//! Stage 1 of the pipeline: turns raw template source into a flat token
//! stream. The lexer alternates between "text mode" (raw passthrough until a
//! delimiter is seen) and "expression mode" (inside `{{ }}`, `{% %}`) where it
//! recognizes names, literals, operators and punctuation.

use crate::error::TranspileError;
use crate::token::{Token, TokenKind, WORD_OPERATORS};

/// The six configurable delimiter strings. Defaults match Jinja2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub var_start: String,
    pub var_end: String,
    pub stmt_start: String,
    pub stmt_end: String,
    pub comment_start: String,
    pub comment_end: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Delimiters {
            var_start: "{{".to_string(),
            var_end: "}}".to_string(),
            stmt_start: "{%".to_string(),
            stmt_end: "%}".to_string(),
            comment_start: "{#".to_string(),
            comment_end: "#}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Expr,
}

pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    delimiters: Delimiters,
    mode: Mode,
    /// Which delimiter opened the current expression-mode region, so the
    /// matching end delimiter (and only that one) closes it.
    closing: &'static str,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, delimiters: Delimiters) -> Self {
        Lexer {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            delimiters,
            mode: Mode::Text,
            closing: "",
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, TranspileError> {
        let mut tokens = Vec::new();
        loop {
            match self.mode {
                Mode::Text => {
                    if self.pos >= self.bytes.len() {
                        break;
                    }
                    self.lex_text(&mut tokens)?;
                }
                Mode::Expr => {
                    if self.pos >= self.bytes.len() {
                        return Err(TranspileError::Lex {
                            delimiter: self.closing,
                            offset: self.pos,
                        });
                    }
                    self.lex_expr_token(&mut tokens)?;
                    if self.just_closed_raw_tag(&tokens) {
                        self.lex_raw_block(&mut tokens)?;
                    }
                }
            }
        }
        tokens.push(Token::new(TokenKind::Eof, "", self.pos));
        Ok(tokens)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn starts_with(&self, needle: &str) -> bool {
        self.rest().starts_with(needle)
    }

    fn lex_text(&mut self, tokens: &mut Vec<Token>) -> Result<(), TranspileError> {
        let start = self.pos;
        let openers = [
            (self.delimiters.comment_start.clone(), TokenKind::Comment),
            (self.delimiters.var_start.clone(), TokenKind::VarStart),
            (self.delimiters.stmt_start.clone(), TokenKind::StmtStart),
        ];

        while self.pos < self.bytes.len() {
            let mut matched = false;
            for (opener, _) in openers.iter() {
                if self.starts_with(opener) {
                    matched = true;
                    break;
                }
            }
            if matched {
                break;
            }
            self.pos += char_len_at(self.bytes, self.pos);
        }

        if self.pos > start {
            tokens.push(Token::new(TokenKind::Text, &self.input[start..self.pos], start));
        }

        if self.pos >= self.bytes.len() {
            return Ok(());
        }

        if self.starts_with(&self.delimiters.comment_start) {
            self.lex_comment(tokens)
        } else if self.starts_with(&self.delimiters.var_start) {
            self.open_expr(tokens, TokenKind::VarStart, self.delimiters.var_start.clone());
            Ok(())
        } else {
            self.open_expr(tokens, TokenKind::StmtStart, self.delimiters.stmt_start.clone());
            Ok(())
        }
    }

    fn open_expr(&mut self, tokens: &mut Vec<Token>, kind: TokenKind, opener: String) {
        let start = self.pos;
        self.pos += opener.len();
        let strip = self.bytes.get(self.pos) == Some(&b'-');
        if strip {
            self.pos += 1;
        }
        self.closing = if kind == TokenKind::VarStart {
            leak_end(&self.delimiters.var_end)
        } else {
            leak_end(&self.delimiters.stmt_end)
        };
        tokens.push(Token::new(kind, opener, start).with_strip(strip, false));
        self.mode = Mode::Expr;
        self.skip_ws();
    }

    fn lex_comment(&mut self, tokens: &mut Vec<Token>) -> Result<(), TranspileError> {
        let start = self.pos;
        self.pos += self.delimiters.comment_start.len();
        let body_start = self.pos;
        loop {
            if self.pos >= self.bytes.len() {
                return Err(TranspileError::Lex {
                    delimiter: "{#",
                    offset: start,
                });
            }
            if self.starts_with(&self.delimiters.comment_end) {
                break;
            }
            self.pos += char_len_at(self.bytes, self.pos);
        }
        let body = self.input[body_start..self.pos].to_string();
        self.pos += self.delimiters.comment_end.len();
        tokens.push(Token::new(TokenKind::Comment, body, start));
        Ok(())
    }

    fn lex_expr_token(&mut self, tokens: &mut Vec<Token>) -> Result<(), TranspileError> {
        self.skip_ws();
        if self.pos >= self.bytes.len() {
            return Err(TranspileError::Lex {
                delimiter: self.closing,
                offset: self.pos,
            });
        }

        let var_end = self.delimiters.var_end.clone();
        let stmt_end = self.delimiters.stmt_end.clone();

        // closing delimiter, possibly with leading `-` whitespace-strip marker
        let strip_before_close = self.bytes.get(self.pos) == Some(&b'-');
        let probe_pos = if strip_before_close { self.pos + 1 } else { self.pos };
        let probe = &self.input[probe_pos..];

        if probe.starts_with(&var_end) {
            let start = self.pos;
            if strip_before_close {
                self.pos += 1;
            }
            self.pos += var_end.len();
            tokens.push(Token::new(TokenKind::VarEnd, var_end.clone(), start).with_strip(false, strip_before_close));
            self.mode = Mode::Text;
            return Ok(());
        }
        if probe.starts_with(&stmt_end) {
            let start = self.pos;
            if strip_before_close {
                self.pos += 1;
            }
            self.pos += stmt_end.len();
            tokens.push(Token::new(TokenKind::StmtEnd, stmt_end.clone(), start).with_strip(false, strip_before_close));
            self.mode = Mode::Text;
            return Ok(());
        }

        let c = self.bytes[self.pos] as char;
        let start = self.pos;

        if c == '\'' || c == '"' {
            return self.lex_string(tokens);
        }
        if c.is_ascii_digit() {
            return self.lex_number(tokens);
        }
        if is_ident_start(c) {
            return self.lex_name(tokens);
        }

        let two: Option<&str> = if self.pos + 2 <= self.bytes.len() {
            Some(&self.input[self.pos..self.pos + 2])
        } else {
            None
        };

        let (kind, len): (TokenKind, usize) = match two {
            Some("==") | Some("!=") | Some("<=") | Some(">=") | Some("//") | Some("**") => {
                (TokenKind::Operator, 2)
            }
            _ => match c {
                '+' | '-' | '*' | '/' | '%' | '<' | '>' | '~' => (TokenKind::Operator, 1),
                '=' => (TokenKind::Assign, 1),
                '|' => (TokenKind::Pipe, 1),
                '.' => (TokenKind::Dot, 1),
                ',' => (TokenKind::Comma, 1),
                ':' => (TokenKind::Colon, 1),
                '(' => (TokenKind::LParen, 1),
                ')' => (TokenKind::RParen, 1),
                '[' => (TokenKind::LBracket, 1),
                ']' => (TokenKind::RBracket, 1),
                '{' => (TokenKind::LBrace, 1),
                '}' => (TokenKind::RBrace, 1),
                _ => {
                    // Unknown character: skip it rather than fail the whole
                    // transpile over stray input.
                    self.pos += char_len_at(self.bytes, self.pos);
                    return Ok(());
                }
            },
        };

        let lexeme = &self.input[start..start + len];
        tokens.push(Token::new(kind, lexeme, start));
        self.pos += len;
        Ok(())
    }

    fn lex_string(&mut self, tokens: &mut Vec<Token>) -> Result<(), TranspileError> {
        let start = self.pos;
        let quote = self.bytes[self.pos];
        self.pos += 1;
        loop {
            if self.pos >= self.bytes.len() {
                return Err(TranspileError::Lex {
                    delimiter: "string literal",
                    offset: start,
                });
            }
            let b = self.bytes[self.pos];
            if b == b'\\' && self.pos + 1 < self.bytes.len() {
                self.pos += 2;
                continue;
            }
            if b == quote {
                self.pos += 1;
                break;
            }
            self.pos += char_len_at(self.bytes, self.pos);
        }
        let lexeme = &self.input[start..self.pos];
        tokens.push(Token::new(TokenKind::String, lexeme, start));
        Ok(())
    }

    fn lex_number(&mut self, tokens: &mut Vec<Token>) -> Result<(), TranspileError> {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_digit() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        if self.bytes.get(self.pos) == Some(&b'.')
            && self.bytes.get(self.pos + 1).map(u8::is_ascii_digit) == Some(true)
        {
            self.pos += 1;
            while self.pos < self.bytes.len()
                && (self.bytes[self.pos].is_ascii_digit() || self.bytes[self.pos] == b'_')
            {
                self.pos += 1;
            }
        }
        if matches!(self.bytes.get(self.pos), Some(b'e') | Some(b'E')) {
            let mut p = self.pos + 1;
            if matches!(self.bytes.get(p), Some(b'+') | Some(b'-')) {
                p += 1;
            }
            if self.bytes.get(p).map(u8::is_ascii_digit) == Some(true) {
                self.pos = p;
                while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                    self.pos += 1;
                }
            }
        }
        let lexeme = &self.input[start..self.pos];
        tokens.push(Token::new(TokenKind::Number, lexeme, start));
        Ok(())
    }

    fn lex_name(&mut self, tokens: &mut Vec<Token>) -> Result<(), TranspileError> {
        let start = self.pos;
        while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos] as char) {
            self.pos += 1;
        }
        let lexeme = &self.input[start..self.pos];
        let kind = if WORD_OPERATORS.contains(&lexeme) {
            TokenKind::Operator
        } else {
            TokenKind::Name
        };
        tokens.push(Token::new(kind, lexeme, start));
        Ok(())
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && (self.bytes[self.pos] as char).is_whitespace() {
            self.pos += 1;
        }
    }
}

impl<'a> Lexer<'a> {
    /// True right after emitting the `StmtEnd` that closes a `{% raw %}` tag.
    fn just_closed_raw_tag(&self, tokens: &[Token]) -> bool {
        let n = tokens.len();
        n >= 3
            && tokens[n - 1].kind == TokenKind::StmtEnd
            && tokens[n - 2].kind == TokenKind::Name
            && tokens[n - 2].lexeme == "raw"
            && tokens[n - 3].kind == TokenKind::StmtStart
    }

    /// Scans raw text verbatim (no tag recognition at all) up to the matching
    /// `{% endraw %}`, then hands control back to normal text-mode lexing so
    /// the `endraw` tag itself is tokenized the usual way.
    fn lex_raw_block(&mut self, tokens: &mut Vec<Token>) -> Result<(), TranspileError> {
        let start = self.pos;
        let stmt_start = self.delimiters.stmt_start.clone();
        loop {
            if self.pos >= self.bytes.len() {
                return Err(TranspileError::Lex {
                    delimiter: "{% endraw %}",
                    offset: start,
                });
            }
            if self.starts_with(&stmt_start) {
                let mut p = self.pos + stmt_start.len();
                if self.bytes.get(p) == Some(&b'-') {
                    p += 1;
                }
                while self.bytes.get(p).map(|b| (*b as char).is_whitespace()).unwrap_or(false) {
                    p += 1;
                }
                if self.input[p..].starts_with("endraw") {
                    break;
                }
            }
            self.pos += char_len_at(self.bytes, self.pos);
        }
        if self.pos > start {
            tokens.push(Token::new(TokenKind::Text, &self.input[start..self.pos], start));
        }
        self.mode = Mode::Text;
        Ok(())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn char_len_at(bytes: &[u8], pos: usize) -> usize {
    let b = bytes[pos];
    if b < 0x80 {
        1
    } else if b >> 5 == 0b110 {
        2
    } else if b >> 4 == 0b1110 {
        3
    } else {
        4
    }
}

/// `TranspileError::Lex.delimiter` is `&'static str`; the small fixed set of
/// closing markers we ever report is interned here rather than threading a
/// lifetime through the error type for configurable delimiters.
fn leak_end(s: &str) -> &'static str {
    match s {
        "}}" => "}}",
        "%}" => "%}",
        _ => "end of tag",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        Lexer::new(src, Delimiters::default()).tokenize().unwrap()
    }

    #[test]
    fn plain_text_passes_through() {
        let tokens = lex("hello world");
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert_eq!(tokens[0].lexeme, "hello world");
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn variable_expression_tokenizes_name() {
        let tokens = lex("{{ name }}");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::VarStart,
                TokenKind::Name,
                TokenKind::VarEnd,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn statement_tag_tokenizes_keyword() {
        let tokens = lex("{% if x %}");
        assert_eq!(tokens[1].kind, TokenKind::Name);
        assert_eq!(tokens[1].lexeme, "if");
    }

    #[test]
    fn comment_is_a_single_token() {
        let tokens = lex("{# a comment #}");
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[0].lexeme, " a comment ");
    }

    #[test]
    fn string_literal_captures_quotes() {
        let tokens = lex("{{ 'abc' }}");
        assert_eq!(tokens[1].kind, TokenKind::String);
        assert_eq!(tokens[1].lexeme, "'abc'");
    }

    #[test]
    fn string_literal_handles_escaped_quote() {
        let tokens = lex(r#"{{ "a\"b" }}"#);
        assert_eq!(tokens[1].kind, TokenKind::String);
        assert_eq!(tokens[1].lexeme, r#""a\"b""#);
    }

    #[test]
    fn number_literal_with_decimal() {
        let tokens = lex("{{ 3.14 }}");
        assert_eq!(tokens[1].kind, TokenKind::Number);
        assert_eq!(tokens[1].lexeme, "3.14");
    }

    #[test]
    fn number_literal_with_exponent() {
        let tokens = lex("{{ 1.5e-10 }}");
        assert_eq!(tokens[1].kind, TokenKind::Number);
        assert_eq!(tokens[1].lexeme, "1.5e-10");
    }

    #[test]
    fn number_literal_with_digit_group_separators() {
        let tokens = lex("{{ 1_000_000 }}");
        assert_eq!(tokens[1].kind, TokenKind::Number);
        assert_eq!(tokens[1].lexeme, "1_000_000");
    }

    #[test]
    fn two_char_operators_are_single_tokens() {
        let tokens = lex("{{ a == b }}");
        assert_eq!(tokens[2].kind, TokenKind::Operator);
        assert_eq!(tokens[2].lexeme, "==");
    }

    #[test]
    fn word_operators_become_operator_tokens() {
        let tokens = lex("{{ a is not b }}");
        assert_eq!(tokens[2].kind, TokenKind::Operator);
        assert_eq!(tokens[2].lexeme, "is");
        assert_eq!(tokens[3].kind, TokenKind::Operator);
        assert_eq!(tokens[3].lexeme, "not");
    }

    #[test]
    fn whitespace_strip_markers_are_recorded() {
        let tokens = lex("{%- if x -%}");
        assert!(tokens[0].strip_before);
        let end = tokens.iter().find(|t| t.kind == TokenKind::StmtEnd).unwrap();
        assert!(end.strip_after);
    }

    #[test]
    fn unterminated_tag_is_an_error() {
        let err = Lexer::new("{{ x", Delimiters::default()).tokenize();
        assert!(err.is_err());
    }

    #[test]
    fn custom_delimiters_are_honored() {
        let delims = Delimiters {
            var_start: "<<".into(),
            var_end: ">>".into(),
            ..Delimiters::default()
        };
        let tokens = Lexer::new("<< name >>", delims).tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::VarStart);
        assert_eq!(tokens[1].lexeme, "name");
    }

    #[test]
    fn raw_block_body_is_not_tag_scanned() {
        let tokens = lex("{% raw %}{{ not an expr }}{% endraw %}");
        let text = tokens.iter().find(|t| t.kind == TokenKind::Text).unwrap();
        assert_eq!(text.lexeme, "{{ not an expr }}");
        let names: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Name)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(names, vec!["raw", "endraw"]);
    }

    #[test]
    fn dict_literal_braces_lex_as_punctuation() {
        let tokens = lex("{{ {'a': 1} }}");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TokenKind::LBrace));
        assert!(kinds.contains(&TokenKind::RBrace));
        assert!(kinds.contains(&TokenKind::Colon));
    }
}
