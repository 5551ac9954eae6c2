// Copyright 2024-2026 vlm-json Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults.
//!
//! These commands read configuration directly from environment variables
//! without loading a model.

use crate::config::{self, EffectiveConfig, DEFAULT_MAX_TOKENS};
use crate::engine::config::{DEFAULT_N_BATCH, DEFAULT_N_CTX};

/// Print effective config as key-value pairs, or as JSON with `json`.
pub fn run_show(json: bool) -> i32 {
    let cfg = config::load().effective_config();
    if json {
        match serde_json::to_string_pretty(&cfg) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Failed to serialize config: {e}");
                return 1;
            }
        }
    } else {
        for line in render(&cfg) {
            println!("{line}");
        }
    }
    0
}

/// Print documented default values (no env overrides).
pub fn run_defaults() {
    println!("VLM_JSON_MODEL_PATH=");
    println!("VLM_JSON_MMPROJ_PATH=");
    println!("VLM_JSON_CHAT_TEMPLATE=");
    println!("VLM_JSON_N_CTX={DEFAULT_N_CTX}");
    println!("VLM_JSON_N_THREADS=0");
    println!("VLM_JSON_N_BATCH={DEFAULT_N_BATCH}");
    println!("VLM_JSON_N_GPU_LAYERS=0");
    println!("VLM_JSON_MAX_TOKENS={DEFAULT_MAX_TOKENS}");
    println!("VLM_JSON_LOG_LEVEL=info");
    println!("VLM_JSON_LOG_FORMAT=pretty");
}

fn render(cfg: &EffectiveConfig) -> Vec<String> {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    vec![
        format!("VLM_JSON_MODEL_PATH={}", opt(&cfg.model_path)),
        format!("VLM_JSON_MMPROJ_PATH={}", opt(&cfg.mmproj_path)),
        format!("VLM_JSON_CHAT_TEMPLATE={}", opt(&cfg.chat_template)),
        format!("VLM_JSON_N_CTX={}", cfg.n_ctx),
        format!("VLM_JSON_N_THREADS={}", cfg.n_threads),
        format!("VLM_JSON_N_BATCH={}", cfg.n_batch),
        format!("VLM_JSON_N_GPU_LAYERS={}", cfg.n_gpu_layers),
        format!("VLM_JSON_MAX_TOKENS={}", cfg.max_tokens),
        format!("VLM_JSON_LOG_LEVEL={}", cfg.log_level),
        format!("VLM_JSON_LOG_FORMAT={}", cfg.log_format),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_all_fields() {
        let cfg = EffectiveConfig {
            model_path: Some("/m/model.gguf".to_string()),
            mmproj_path: None,
            chat_template: None,
            n_ctx: 2048,
            n_threads: 0,
            n_batch: 512,
            n_gpu_layers: 0,
            max_tokens: 128,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        };
        let lines = render(&cfg);
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "VLM_JSON_MODEL_PATH=/m/model.gguf");
        assert_eq!(lines[1], "VLM_JSON_MMPROJ_PATH=");
        assert!(lines.contains(&"VLM_JSON_N_CTX=2048".to_string()));
    }
}
