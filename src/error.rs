//! The error taxonomy for the transpile pipeline.
//!
//! Every variant (other than `Io`) carries the byte offset at which the
//! problem was detected, so callers and the CLI's renderer can point at the
//! exact spot in the source.

use crate::style::Style;
use crate::suggest::{find_similar, KNOWN_FILTERS, KNOWN_STATEMENTS};

#[derive(Debug, thiserror::Error)]
pub enum TranspileError {
    #[error("unterminated {delimiter} tag at byte {offset}")]
    Lex { delimiter: &'static str, offset: usize },

    #[error("expected {expected}, found {found} at byte {offset}")]
    UnexpectedToken {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("unknown statement '{keyword}' at byte {offset}")]
    UnknownStatement {
        keyword: String,
        offset: usize,
        suggestion: Option<String>,
    },

    #[error("unmatched '{closer}' at byte {offset}")]
    UnmatchedClosure { closer: String, offset: usize },

    #[error("unexpected token in expression at byte {offset}")]
    MalformedExpression { offset: usize },

    #[error("internal error: emitter received unknown node kind {kind}")]
    Emit { kind: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TranspileError {
    /// Byte offset the error occurred at, when one is meaningful.
    pub fn offset(&self) -> Option<usize> {
        match self {
            TranspileError::Lex { offset, .. }
            | TranspileError::UnexpectedToken { offset, .. }
            | TranspileError::UnknownStatement { offset, .. }
            | TranspileError::UnmatchedClosure { offset, .. }
            | TranspileError::MalformedExpression { offset } => Some(*offset),
            TranspileError::Emit { .. } | TranspileError::Io(_) => None,
        }
    }

    pub fn unknown_statement(keyword: impl Into<String>, offset: usize) -> Self {
        let keyword = keyword.into();
        let suggestion = find_similar(&keyword, KNOWN_STATEMENTS, 2).map(|s| s.to_string());
        TranspileError::UnknownStatement {
            keyword,
            offset,
            suggestion,
        }
    }

    pub fn unmatched_closure(closer: impl Into<String>, offset: usize) -> Self {
        TranspileError::UnmatchedClosure {
            closer: closer.into(),
            offset,
        }
    }

    /// Human-facing rendering with line/column context, an underline under
    /// the offending span, and (when available) a "did you mean" hint.
    pub fn render(&self, source: &str) -> String {
        let Some(offset) = self.offset() else {
            return format!("{}: {}", Style::bold_red("error"), self);
        };

        let (line_num, line_start, line_content) = find_context(source, offset);
        let col = offset.saturating_sub(line_start);
        let underline = format!("{}^", " ".repeat(col));

        let error_label = Style::bold_red("error");
        let line_num_str = Style::blue(&format!("{:4}", line_num));
        let pipe = Style::blue("|");
        let underline_colored = Style::red(&underline);

        let mut out = format!(
            "{}: {}\n\n{} {} {}\n     {} {}",
            error_label, self, line_num_str, pipe, line_content, pipe, underline_colored
        );

        if let Some(hint) = self.suggestion_hint() {
            out.push_str(&format!(
                "\n     {} {}: did you mean '{}'?",
                pipe,
                Style::cyan("help"),
                Style::green(&hint)
            ));
        }

        out
    }

    fn suggestion_hint(&self) -> Option<String> {
        match self {
            TranspileError::UnknownStatement { suggestion, .. } => suggestion.clone(),
            _ => None,
        }
    }
}

/// Looks up an unknown filter name against the built-in table. Used by
/// `emitter::apply_filter`'s passthrough path to annotate an unrecognized
/// filter with a "did you mean" hint inline in the emitted output (the
/// emitter never errors, so this can't surface as a `TranspileError` the
/// way `unknown_statement`'s suggestion does).
pub fn suggest_filter(name: &str) -> Option<String> {
    find_similar(name, KNOWN_FILTERS, 2).map(|s| s.to_string())
}

fn find_context(source: &str, offset: usize) -> (usize, usize, &str) {
    let mut line_num = 1;
    let mut line_start = 0;

    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line_num += 1;
            line_start = i + 1;
        }
    }

    let line_end = source[line_start..]
        .find('\n')
        .map(|off| line_start + off)
        .unwrap_or(source.len());

    (line_num, line_start, &source[line_start..line_end])
}
