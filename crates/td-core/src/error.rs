use thiserror::Error;

pub type TdResult<T> = Result<T, TdError>;

/// Scalar precondition failures shared by the tank and simulation crates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TdError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("{what} must be positive, got {value}")]
    NonPositive { what: &'static str, value: f64 },

    #[error("{what} is {value}, above the limit {limit}")]
    AboveLimit {
        what: &'static str,
        value: f64,
        limit: f64,
    },
}
