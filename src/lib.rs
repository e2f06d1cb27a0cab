#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod badge;
pub mod config;
pub mod error;
pub mod poller;
pub mod sound;
pub mod telemetry;
pub mod toast;
pub mod types;

pub type Result<T> = std::result::Result<T, error::Error>;
