//! j2tt entry point.

fn main() {
    if let Err(e) = j2tt::cli::run_cli() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
