use crate::error::ConfigError;
use rust_decimal::Decimal;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{Config, Eda, Kpi, ProductSources, Qa, Server, Sources, Store};

/// Prefix of the environment variables overriding file settings,
/// e.g. `OBSERVATORY__STORE__DATABASE=/tmp/trade.db`.
pub const ENV_PREFIX: &str = "OBSERVATORY";

/// Loads the application configuration from a TOML file.
///
/// This function is the primary entry point for this crate. The file is optional:
/// every setting has a default, and `OBSERVATORY__SECTION__KEY` environment
/// variables take precedence over both.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults.");
    }

    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    validate(&config)?;

    Ok(config)
}

/// Rejects settings that would make a pipeline stage meaningless.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.qa.relative_tolerance <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "qa.relative_tolerance must be positive".to_string(),
        ));
    }
    if config.qa.absolute_tolerance < Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "qa.absolute_tolerance must not be negative".to_string(),
        ));
    }
    if config.kpi.moving_average_window == 0 || config.kpi.yoy_lag == 0 {
        return Err(ConfigError::ValidationError(
            "kpi windows must be at least one period".to_string(),
        ));
    }
    if config.eda.outlier_window == 0 {
        return Err(ConfigError::ValidationError(
            "eda.outlier_window must be at least one period".to_string(),
        ));
    }
    if !(config.eda.outlier_sigma > 0.0) {
        return Err(ConfigError::ValidationError(
            "eda.outlier_sigma must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Global command-line arguments shared by the binaries.
#[cfg(feature = "clap")]
#[derive(Debug, Clone, clap::Args)]
pub struct ConfigArgs {
    /// Path to the configuration file.
    #[arg(long, short, global = true, default_value = "config.toml")]
    pub config: std::path::PathBuf,
}

#[cfg(feature = "clap")]
impl ConfigArgs {
    pub fn load(&self) -> Result<Config, ConfigError> {
        load_config(&self.config)
    }
}
