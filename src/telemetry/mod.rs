//! Structured logging via `tracing`.

mod logging;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
