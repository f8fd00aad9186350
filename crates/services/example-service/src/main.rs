//! Example Service - web API and direct endpoints over one use case.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use common::logging::init_tracing;
use common::AppError;
use example_service_lib::settings::ServiceSettings;

#[derive(Parser)]
#[command(name = "example-service")]
#[command(about = "Reference microservice")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Defaults to SERVER_HOST
        #[arg(long)]
        host: Option<String>,
        /// Defaults to SERVER_PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run a direct endpoint against an event file and print the result
    Invoke {
        #[arg(long)]
        endpoint: String,
        #[arg(long)]
        event: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Loads .env before reading variables
    let settings = ServiceSettings::from_env()?;
    init_tracing(&settings.base.logging.level, false);

    let handlers = example_service_lib::microservice_base(settings.clone()).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.base.api.host.clone());
            let port = port.unwrap_or(settings.base.api.port);
            example_service_lib::run_server(&host, port, handlers.api).await?;
        }
        Commands::Invoke { endpoint, event } => {
            let raw = tokio::fs::read_to_string(&event)
                .await
                .map_err(|e| AppError::internal(format!("Failed to read {}: {e}", event.display())))?;
            let event = serde_json::from_str(&raw)?;
            let result = handlers.direct.invoke(&endpoint, event).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
