use std::{env::args, process::ExitCode};

use okra::{
    config::{Config, Mode},
    format_file, init_tracing, run_file, RunError,
};

fn main() -> ExitCode {
    init_tracing();

    let config = match Config::from_args(args()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(64);
        }
    };

    let result = match config.mode {
        Mode::Run => run_file(&config.path),
        Mode::Fmt => format_file(&config.path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::FileRead { path, source }) => {
            eprintln!("Couldn't read {}. Reason: {}", path.display(), source);
            ExitCode::from(66)
        }
        Err(RunError::Static(errors)) => {
            for error in &errors {
                eprintln!("{error}");
            }
            ExitCode::from(65)
        }
        Err(RunError::Runtime(error)) => {
            eprintln!("{error}");
            ExitCode::from(70)
        }
        Err(RunError::Output(e)) => {
            eprintln!("Couldn't write output. Reason: {e}");
            ExitCode::from(74)
        }
    }
}
