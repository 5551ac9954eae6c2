//! vlm-json
//!
//! A greedy, JSON-gated generation controller for a local GGUF language
//! model with an optional vision projector. A request combines a system
//! prompt, a user prompt and optional encoded image bytes; the controller
//! evaluates them into the model's incremental cache and decodes one token
//! at a time by argmax until the output forms exactly one complete JSON
//! value, the model emits end-of-generation, or the token budget runs out.
//!
//! # Layout
//!
//! - [`engine`]: the boundary to the inference engine ([`engine::Backend`],
//!   [`engine::TextEngine`], [`engine::VisionProjector`]) and, behind the
//!   `gguf` feature, the llama.cpp implementation.
//! - [`generation`]: prompt assembly, image priming, the decode loop and
//!   the JSON completeness detector.
//! - [`session`]: lifecycle (initialize, analyze, shutdown) under one lock.
//! - [`config`]: `VLM_JSON_*` environment configuration.
//! - [`cli`]: subcommands behind the `vlm-json` binary.
//! - [`telemetry`]: `tracing` subscriber setup.
//!
//! # Example
//!
//! ```ignore
//! use vlm_json::{global_session, SessionConfig};
//!
//! let session = global_session();
//! let config = SessionConfig::new("model.gguf").with_projector("mmproj.gguf");
//! if session.initialize(&config) {
//!     let json = session.analyze(Some("Describe as JSON"), Some("What is this?"), Some(&jpeg), 0.0, 128);
//!     println!("{json}");
//!     session.shutdown();
//! }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod generation;
pub mod session;
pub mod telemetry;

pub use engine::EngineError;
pub use generation::{extract_json, is_json_complete, FinishReason, GenerationOutcome};
pub use session::{Session, SessionConfig, SessionStatus};

#[cfg(feature = "gguf")]
pub use session::{global_session, GgufSession};

/// Crate version reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
