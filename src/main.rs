//! Agent Matrix - connection hub relaying messages between remote agents
//! and their in-process proxies.

use agent_matrix::{logging, Commands};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse first: the log flags decide where logging goes
    let args = Commands::parse();

    let _logging = match logging::init(&args.log_options()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Run the command
    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
