use std::process::ExitCode;

use vmn::ui::output;

fn main() -> ExitCode {
    match vmn::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}
