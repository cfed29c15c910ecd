use std::process::ExitCode;

use clap::Parser;
use stageboard_backend::cli::{self, Cli};
use stageboard_backend::log_bridge;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = log_bridge::init() {
        log_bridge::write_fallback_line(&format!("failed to initialize logger: {}", e));
    }

    match cli::run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
