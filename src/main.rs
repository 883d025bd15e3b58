use std::process::ExitCode;

fn main() -> ExitCode {
    scholar_metrics::cli::run()
}
