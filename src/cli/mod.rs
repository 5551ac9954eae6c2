// Copyright 2024-2026 vlm-json Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommands for the `vlm-json` binary.
//!
//! ## Usage
//!
//! ```bash
//! vlm-json analyze --model m.gguf --mmproj p.gguf --image photo.jpg --user "Describe"
//! vlm-json config show      # Effective configuration
//! vlm-json config defaults  # Documented defaults
//! ```

pub mod analyze_cmd;
pub mod config_cmd;

pub use analyze_cmd::{AnalyzeArgs, CliError};
