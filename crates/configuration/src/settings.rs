use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
///
/// Every section has defaults matching the conventional file layout, so a
/// missing `config.toml` (or a missing section) still yields a usable config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sources: Sources,
    pub store: Store,
    pub qa: Qa,
    pub kpi: Kpi,
    pub eda: Eda,
    pub server: Server,
}

/// Locations of the input workbooks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Sources {
    /// Workbook with one sheet per year of monthly imports.
    pub imports: PathBuf,
    /// Workbook with one sheet per year of monthly exports.
    pub exports: PathBuf,
    /// Optional per-category workbooks; the product ETL is skipped without them.
    pub products: Option<ProductSources>,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            imports: PathBuf::from("data/cdro_F8.xlsx"),
            exports: PathBuf::from("data/cdro_G6.xlsx"),
            products: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductSources {
    pub imports: PathBuf,
    pub exports: PathBuf,
}

/// Where the pipeline persists its tables and snapshots.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Store {
    /// The SQLite database file holding `trade`, `kpi_monthly` and friends.
    pub database: PathBuf,
    /// Directory receiving the Parquet snapshots.
    pub snapshot_dir: PathBuf,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            database: PathBuf::from("trade.db"),
            snapshot_dir: PathBuf::from("."),
        }
    }
}

/// Parameters for the annual-total reconciliation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Qa {
    /// Maximum accepted |sum − total| / |total|. 0.005 corresponds to 0.5%.
    pub relative_tolerance: Decimal,
    /// Differences at or below this many dollars always pass.
    pub absolute_tolerance: Decimal,
}

impl Default for Qa {
    fn default() -> Self {
        Self {
            relative_tolerance: dec!(0.005),
            absolute_tolerance: dec!(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Kpi {
    /// Window of the moving averages (`*_ma3`).
    pub moving_average_window: usize,
    /// Lag used for the year-over-year comparison.
    pub yoy_lag: usize,
}

impl Default for Kpi {
    fn default() -> Self {
        Self {
            moving_average_window: 3,
            yoy_lag: 12,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Eda {
    pub reports_dir: PathBuf,
    /// An observation is an outlier when it deviates from its rolling mean by
    /// more than this many global standard deviations.
    pub outlier_sigma: f64,
    /// Trailing window of the rolling mean used by the outlier test.
    pub outlier_window: usize,
}

impl Default for Eda {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("reports/eda"),
            outlier_sigma: 2.0,
            outlier_window: 12,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

impl Server {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}
