use std::process::ExitCode;

fn main() -> ExitCode {
    carebook_cli::run()
}
