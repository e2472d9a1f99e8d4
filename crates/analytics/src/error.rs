use thiserror::Error;

/// Undefined metrics (insufficient history, zero denominators) are `None`
/// values, never errors; these variants cover inputs nothing can be computed from.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Not enough data to perform calculation: {0}")]
    NotEnoughData(String),
}
