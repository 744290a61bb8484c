use anyhow::Result;
use berth_core::errors::{BerthError, GatewayError};
use clap::Parser;

mod cli;
mod commands;
mod ui;

/// Exit status when the container CLI cannot be started
const EXIT_BINARY_UNAVAILABLE: i32 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    let parsed = cli::Cli::parse();

    match parsed.dispatch().await {
        Ok(()) => Ok(()),
        Err(err) => {
            if let Some(berth_error) = err.downcast_ref::<BerthError>() {
                if matches!(
                    berth_error,
                    BerthError::Gateway(GatewayError::BinaryNotFound { .. })
                ) {
                    eprintln!("Error: {}", berth_error);
                    std::process::exit(EXIT_BINARY_UNAVAILABLE);
                }
            }
            Err(err)
        }
    }
}
