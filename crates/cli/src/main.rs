use std::process::ExitCode;

fn main() -> ExitCode {
    posada_cli::run()
}
