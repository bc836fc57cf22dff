use std::process::ExitCode;

fn main() -> ExitCode {
    salesgate_cli::run()
}
