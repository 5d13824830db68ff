use std::process::ExitCode;

fn main() -> ExitCode {
    chatorder_cli::run()
}
