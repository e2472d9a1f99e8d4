use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use configuration::{Config, ConfigArgs};
use database::{connect, run_migrations, DbRepository};
use std::time::{Duration, Instant};
use tracing::Instrument;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod stages;

/// The main entry point for the trade observatory.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // OBSERVATORY__* overrides may live in a .env file; it is optional.
    dotenvy::dotenv().ok();
    let _guard = init_logging()?;

    // Parse command-line arguments
    let cli = Cli::parse();
    let config = cli.config.load().context("Failed to load the configuration")?;

    // Execute the appropriate command
    match cli.command {
        Commands::Etl => {
            let repo = open_store(&config).await?;
            stages::run_etl(&config, &repo)
                .instrument(tracing::info_span!("etl"))
                .await
        }
        Commands::Kpi => {
            let repo = open_store(&config).await?;
            stages::run_kpi(&config, &repo)
                .instrument(tracing::info_span!("kpi"))
                .await
        }
        Commands::Eda => {
            let repo = open_store(&config).await?;
            stages::run_eda(&config, &repo)
                .instrument(tracing::info_span!("eda"))
                .await
                .map(|_| ())
        }
        Commands::EtlProducts => {
            let repo = open_store(&config).await?;
            stages::run_etl_products(&config, &repo)
                .instrument(tracing::info_span!("etl_products"))
                .await
        }
        Commands::KpiProducts => {
            let repo = open_store(&config).await?;
            stages::run_kpi_products(&config, &repo)
                .instrument(tracing::info_span!("kpi_products"))
                .await
        }
        Commands::Pipeline => run_pipeline(&config).await,
        Commands::Serve => web_server::run_server(&config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// ETL, KPIs, exploratory reports and a dashboard over Peru's monthly foreign trade.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the import/export workbooks into the `trade` table.
    Etl,
    /// Recompute `kpi_monthly` from the `trade` table.
    Kpi,
    /// Write the exploratory statistics and charts to the reports directory.
    Eda,
    /// Parse the per-category workbooks into the `trade_prod` table.
    EtlProducts,
    /// Recompute `kpi_prod_monthly` and print the category findings.
    KpiProducts,
    /// Check the inputs, then run etl, kpi and eda in order.
    Pipeline,
    /// Serve the interactive dashboard.
    Serve,
}

// ==============================================================================
// Setup
// ==============================================================================

/// Console logs go through the indicatif writer so they do not tear progress
/// bars; a daily file under `logs/` keeps the full record.
fn init_logging() -> anyhow::Result<WorkerGuard> {
    let indicatif_layer = IndicatifLayer::new();
    let file_appender = tracing_appender::rolling::daily("logs", "observatory.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .with(indicatif_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    Ok(guard)
}

async fn open_store(config: &Config) -> anyhow::Result<DbRepository> {
    let pool = connect(&config.store.database)
        .await
        .with_context(|| format!("Failed to open the store at {}", config.store.database.display()))?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(DbRepository::new(pool))
}

// ==============================================================================
// Pipeline Command Logic
// ==============================================================================

/// Runs etl, kpi and eda in order, stopping at the first failing stage.
async fn run_pipeline(config: &Config) -> anyhow::Result<()> {
    let missing: Vec<String> = [&config.sources.imports, &config.sources.exports]
        .into_iter()
        .filter(|path| !path.is_file())
        .map(|path| path.display().to_string())
        .collect();
    if !missing.is_empty() {
        bail!("Missing input workbooks: {}", missing.join(", "));
    }

    let started_at = chrono::Local::now();
    println!("Pipeline started at {}", started_at.format("%Y-%m-%d %H:%M:%S"));
    let repo = open_store(config).await?;
    let mut timings: Vec<(&str, Duration)> = Vec::new();

    let start = Instant::now();
    stages::run_etl(config, &repo)
        .instrument(tracing::info_span!("etl"))
        .await
        .context("Stage 'etl' failed")?;
    timings.push(("etl", start.elapsed()));

    let start = Instant::now();
    stages::run_kpi(config, &repo)
        .instrument(tracing::info_span!("kpi"))
        .await
        .context("Stage 'kpi' failed")?;
    timings.push(("kpi", start.elapsed()));

    let start = Instant::now();
    let reports = stages::run_eda(config, &repo)
        .instrument(tracing::info_span!("eda"))
        .await
        .context("Stage 'eda' failed")?;
    timings.push(("eda", start.elapsed()));

    let mut table = comfy_table::Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_header(vec!["Stage", "Duration"]);
    for (stage, elapsed) in &timings {
        table.add_row(vec![stage.to_string(), format!("{:.2}s", elapsed.as_secs_f64())]);
    }
    let total: Duration = timings.iter().map(|(_, d)| *d).sum();
    table.add_row(vec!["total".to_string(), format!("{:.2}s", total.as_secs_f64())]);
    println!("\n{table}");

    let mut artifacts = comfy_table::Table::new();
    artifacts
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_header(vec!["Artifact", "Size"]);
    for (path, size) in stages::artifacts(config, &reports) {
        artifacts.add_row(vec![path.display().to_string(), stages::human_size(size)]);
    }
    println!("{artifacts}");

    tracing::info!(elapsed = ?total, "Pipeline complete.");
    Ok(())
}
