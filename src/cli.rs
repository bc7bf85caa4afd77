//! Command-line interface for the `j2tt` binary.

use clap::Parser;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::lexer::{Delimiters, Lexer};
use crate::parser::Parser as TemplateParser;
use crate::{Transpiler, TranspilerOptions};

#[derive(Parser)]
#[command(name = "j2tt")]
#[command(about = "Transpiles Jinja2-family templates into Template Toolkit 2 syntax")]
#[command(version)]
pub struct Cli {
    /// Template file to transpile, or `-` to read from stdin.
    pub path: String,

    /// Write output to this path instead of stdout.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Write the translated output to a sibling file next to the source,
    /// with its extension replaced by `.tt`, instead of stdout. Invalid
    /// together with `-`/stdin input.
    #[arg(short = 'i', long)]
    pub in_place: bool,

    /// Dump the token stream and AST (via `{:#?}`) to stderr before emitting
    /// normal output, and render errors with source-line context.
    #[arg(long)]
    pub debug: bool,

    #[arg(long = "var-start", default_value = "{{")]
    pub var_start: String,
    #[arg(long = "var-end", default_value = "}}")]
    pub var_end: String,
    #[arg(long = "stmt-start", default_value = "{%")]
    pub stmt_start: String,
    #[arg(long = "stmt-end", default_value = "%}")]
    pub stmt_end: String,
    #[arg(long = "comment-start", default_value = "{#")]
    pub comment_start: String,
    #[arg(long = "comment-end", default_value = "#}")]
    pub comment_end: String,
}

pub fn run_cli() -> Result<(), String> {
    let cli = Cli::parse();

    let delimiters = Delimiters {
        var_start: cli.var_start.clone(),
        var_end: cli.var_end.clone(),
        stmt_start: cli.stmt_start.clone(),
        stmt_end: cli.stmt_end.clone(),
        comment_start: cli.comment_start.clone(),
        comment_end: cli.comment_end.clone(),
    };
    let options = TranspilerOptions {
        delimiters: delimiters.clone(),
        extra_filters: Vec::new(),
        debug: cli.debug,
    };
    let transpiler = Transpiler::new(options);

    let input = read_input(&cli.path)?;

    if cli.debug {
        dump_debug_info(&input, delimiters);
    }

    let output = transpiler
        .transpile(&input)
        .map_err(|e| render_error(&e, &input, cli.debug))?;

    if cli.in_place {
        if cli.path == "-" {
            return Err("-i cannot be used when reading from stdin".to_string());
        }
        let tt_path = sibling_with_tt_extension(&cli.path);
        fs::write(&tt_path, &output).map_err(|e| format!("{}: {}", tt_path.display(), e))?;
        return Ok(());
    }

    write_output(&output, cli.output.as_deref())
}

/// Replaces (or appends, if there was none) the source path's extension
/// with `.tt`, in the same directory as the original.
fn sibling_with_tt_extension(path: &str) -> PathBuf {
    PathBuf::from(path).with_extension("tt")
}

fn dump_debug_info(input: &str, delimiters: Delimiters) {
    eprintln!(
        "j2tt: delimiters var={}/{} stmt={}/{} comment={}/{}",
        delimiters.var_start,
        delimiters.var_end,
        delimiters.stmt_start,
        delimiters.stmt_end,
        delimiters.comment_start,
        delimiters.comment_end
    );
    match Lexer::new(input, delimiters).tokenize() {
        Ok(tokens) => {
            eprintln!("--- tokens ---\n{:#?}", tokens);
            match TemplateParser::new(tokens).parse() {
                Ok(root) => eprintln!("--- ast ---\n{:#?}", root),
                Err(e) => eprintln!("--- ast ---\n<parse failed: {}>", e),
            }
        }
        Err(e) => eprintln!("--- tokens ---\n<lex failed: {}>", e),
    }
}

fn read_input(path: &str) -> Result<String, String> {
    if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map_err(|e| e.to_string())?;
        Ok(buf)
    } else {
        fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))
    }
}

fn write_output(output: &str, path: Option<&Path>) -> Result<(), String> {
    match path {
        Some(path) => fs::write(path, output).map_err(|e| e.to_string()),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(output.as_bytes()).map_err(|e| e.to_string())
        }
    }
}

fn render_error(err: &crate::TranspileError, source: &str, debug: bool) -> String {
    if debug {
        err.render(source)
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_tt_extension_replaces_existing_extension() {
        assert_eq!(
            sibling_with_tt_extension("templates/page.html"),
            PathBuf::from("templates/page.tt")
        );
    }

    #[test]
    fn sibling_tt_extension_appends_when_none_present() {
        assert_eq!(sibling_with_tt_extension("templates/page"), PathBuf::from("templates/page.tt"));
    }
}
