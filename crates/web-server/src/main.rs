use clap::Parser;
use configuration::ConfigArgs;
use tracing_subscriber::EnvFilter;

/// Serves the trade dashboard on its own, without the pipeline commands.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
}

// This main function is the entry point when running `cargo run -p web-server`.
// Its only job is to load the configuration and call `run_server`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.config.load()?;
    web_server::run_server(&config).await
}
