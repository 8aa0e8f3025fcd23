//! Multi-exchange futures pump/dump screener
//!
//! Samples futures prices across exchanges, detects short-horizon moves that
//! exceed each user's threshold, enriches them with technical context and sends
//! per-user Telegram alerts.

pub mod alert;
pub mod buffer;
pub mod config;
pub mod error;
pub mod exchange;
pub mod indicators;
pub mod notify;
pub mod scanner;
pub mod storage;
pub mod testing;
pub mod types;

#[cfg(test)]
mod error_tests;
#[cfg(test)]
mod types_tests;

pub use error::{Result, ScreenerError};
