use std::process::ExitCode;

fn main() -> ExitCode {
    stockpilot_cli::run()
}
