use anyhow::Result;
use clap::Parser;
use thesis_refs::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets (SUPABASE_KEY, LANGFLOW_TOKEN) may come from a local .env
    dotenvy::dotenv().ok();

    // Initialize tracing for the CLI; stdout is reserved for command output.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}
