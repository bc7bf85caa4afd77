//! Transpiles Jinja2-family templates into Template Toolkit 2 syntax.
//!
//! The pipeline is three stages, each its own module: [`lexer`] turns source
//! text into tokens, [`parser`] turns tokens into an [`ast::Root`], and
//! [`emitter`] walks the tree into a Target-syntax `String`. [`Transpiler`]
//! wires the three together behind a small public API.

pub mod ast;
pub mod cli;
pub mod emitter;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod style;
pub mod suggest;
pub mod token;

use std::fs;
use std::path::Path;

pub use emitter::FilterMapping;
pub use error::TranspileError;
pub use lexer::Delimiters;

/// Runtime configuration for a [`Transpiler`] instance.
#[derive(Clone)]
pub struct TranspilerOptions {
    pub delimiters: Delimiters,
    /// Filter-name overrides/additions layered on top of the built-in table.
    pub extra_filters: Vec<(String, FilterMapping)>,
    pub debug: bool,
}

impl Default for TranspilerOptions {
    fn default() -> Self {
        TranspilerOptions {
            delimiters: Delimiters::default(),
            extra_filters: Vec::new(),
            debug: false,
        }
    }
}

/// The transpiler itself. Holds no mutable state, so a single instance can
/// be shared across threads and reused across any number of `transpile`
/// calls.
pub struct Transpiler {
    options: TranspilerOptions,
}

impl Transpiler {
    pub fn new(options: TranspilerOptions) -> Self {
        Transpiler { options }
    }

    /// Transpiles a template given as a string.
    pub fn transpile(&self, input: &str) -> Result<String, TranspileError> {
        let tokens = lexer::Lexer::new(input, self.options.delimiters.clone()).tokenize()?;
        let root = parser::Parser::new(tokens).parse()?;

        let mut filters = emitter::default_filter_table();
        for (name, mapping) in &self.options.extra_filters {
            filters.insert(name.clone(), mapping.clone());
        }
        let ctx = emitter::EmitContext { filters };

        Ok(emitter::emit(&root, &ctx))
    }

    /// Reads `path` and transpiles its contents.
    pub fn transpile_file(&self, path: impl AsRef<Path>) -> Result<String, TranspileError> {
        let input = fs::read_to_string(path)?;
        self.transpile(&input)
    }
}

impl Default for Transpiler {
    fn default() -> Self {
        Transpiler::new(TranspilerOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_variable_output() {
        let t = Transpiler::default();
        assert_eq!(t.transpile("{{ name }}").unwrap(), "[% name %]");
    }

    #[test]
    fn end_to_end_for_loop() {
        let t = Transpiler::default();
        let out = t.transpile("{% for x in items %}{{ x }}{% endfor %}").unwrap();
        assert!(out.contains("FOREACH x IN items"));
    }

    #[test]
    fn custom_delimiters_flow_through_options() {
        let options = TranspilerOptions {
            delimiters: Delimiters {
                var_start: "<<".into(),
                var_end: ">>".into(),
                ..Delimiters::default()
            },
            ..TranspilerOptions::default()
        };
        let t = Transpiler::new(options);
        assert_eq!(t.transpile("<< name >>").unwrap(), "[% name %]");
    }

    #[test]
    fn extra_filter_overrides_builtin() {
        let options = TranspilerOptions {
            extra_filters: vec![(
                "upper".to_string(),
                FilterMapping::Custom(|e, _| format!("{}.caps", e)),
            )],
            ..TranspilerOptions::default()
        };
        let t = Transpiler::new(options);
        assert_eq!(t.transpile("{{ name|upper }}").unwrap(), "[% name.caps %]");
    }

    #[test]
    fn syntax_error_surfaces_as_transpile_error() {
        let t = Transpiler::default();
        assert!(t.transpile("{% bogus %}").is_err());
    }
}
