//! Error types for the screener

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenerError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Exchange {exchange} error: {message}")]
    Exchange { exchange: String, message: String },

    #[error("Request timed out after {secs}s: {context}")]
    Timeout { context: String, secs: u64 },

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Indicator unavailable: {0}")]
    IndicatorUnavailable(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScreenerError {
    pub fn exchange(exchange: impl ToString, message: impl ToString) -> Self {
        Self::Exchange {
            exchange: exchange.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScreenerError>;
