//! Thin binary entry point. All real logic lives in `rolodex_cli` and below.

fn main() -> std::process::ExitCode {
    rolodex_cli::run()
}
