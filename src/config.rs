//! Runtime configuration loading from environment variables.
//!
//! All configuration values are loaded from `VLM_JSON_*` environment variables
//! with sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `VLM_JSON_MODEL_PATH` | unset | GGUF model file |
//! | `VLM_JSON_MMPROJ_PATH` | unset | Vision projector file (empty = none) |
//! | `VLM_JSON_CHAT_TEMPLATE` | unset | Chat template name stored on the session |
//! | `VLM_JSON_N_CTX` | 2048 | Context window size (0 = default) |
//! | `VLM_JSON_N_THREADS` | 0 | Inference threads (0 = auto) |
//! | `VLM_JSON_N_BATCH` | 512 | Batch-size limit for image chunk evaluation |
//! | `VLM_JSON_N_GPU_LAYERS` | 0 | Model layers offloaded to GPU |
//! | `VLM_JSON_MAX_TOKENS` | 128 | Default token budget |
//! | `VLM_JSON_LOG_LEVEL` | info | Log filter directive |
//! | `VLM_JSON_LOG_FORMAT` | pretty | `json` or `pretty` |
//! | `VLM_JSON_LOG_FILE` | unset | Write logs to this file instead of stderr |

use std::path::PathBuf;

use serde::Serialize;

use crate::engine::config::{DEFAULT_N_BATCH, DEFAULT_N_CTX};
use crate::telemetry::{LogConfig, LogFormat};

/// Default token budget for a request.
pub const DEFAULT_MAX_TOKENS: u32 = 128;

/// Smallest accepted context window.
const MIN_N_CTX: u32 = 128;

/// Effective runtime configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub model_path: Option<String>,
    pub mmproj_path: Option<String>,
    pub chat_template: Option<String>,
    pub n_ctx: u32,
    pub n_threads: u32,
    pub n_batch: u32,
    pub n_gpu_layers: u32,
    pub max_tokens: u32,
    pub log_level: String,
    pub log_format: String,
}

/// All runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub model_path: Option<PathBuf>,
    pub mmproj_path: Option<PathBuf>,
    pub chat_template: Option<String>,
    pub n_ctx: u32,
    pub n_threads: u32,
    pub n_batch: u32,
    pub n_gpu_layers: u32,
    pub max_tokens: u32,
    pub log: LogConfig,
}

/// Parse a `u32` env var, returning `default` on missing or invalid.
fn parse_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u32>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Read a non-empty string env var.
fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Context window: 0 means default, small values are raised to the floor.
fn load_n_ctx() -> u32 {
    match parse_u32("VLM_JSON_N_CTX", DEFAULT_N_CTX) {
        0 => DEFAULT_N_CTX,
        n => n.max(MIN_N_CTX),
    }
}

fn load_log_config() -> LogConfig {
    let format = match non_empty("VLM_JSON_LOG_FORMAT").as_deref() {
        Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    };
    LogConfig {
        format,
        level: non_empty("VLM_JSON_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        output_path: non_empty("VLM_JSON_LOG_FILE").map(PathBuf::from),
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    EnvConfig {
        model_path: non_empty("VLM_JSON_MODEL_PATH").map(PathBuf::from),
        mmproj_path: non_empty("VLM_JSON_MMPROJ_PATH").map(PathBuf::from),
        chat_template: non_empty("VLM_JSON_CHAT_TEMPLATE"),
        n_ctx: load_n_ctx(),
        n_threads: parse_u32("VLM_JSON_N_THREADS", 0),
        n_batch: parse_u32("VLM_JSON_N_BATCH", DEFAULT_N_BATCH).max(1),
        n_gpu_layers: parse_u32("VLM_JSON_N_GPU_LAYERS", 0),
        max_tokens: parse_u32("VLM_JSON_MAX_TOKENS", DEFAULT_MAX_TOKENS),
        log: load_log_config(),
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            model_path: self.model_path.as_ref().map(|p| p.display().to_string()),
            mmproj_path: self.mmproj_path.as_ref().map(|p| p.display().to_string()),
            chat_template: self.chat_template.clone(),
            n_ctx: self.n_ctx,
            n_threads: self.n_threads,
            n_batch: self.n_batch,
            n_gpu_layers: self.n_gpu_layers,
            max_tokens: self.max_tokens,
            log_level: self.log.level.clone(),
            log_format: match self.log.format {
                LogFormat::Json => "json".to_string(),
                LogFormat::Pretty => "pretty".to_string(),
            },
        }
    }
}
