//! Generation controller.
//!
//! Prompt assembly, optional image priming, the greedy decode loop and the
//! JSON completeness detector that gates early stopping.

pub mod decoder;
pub mod detector;
pub mod extract;
pub mod multimodal;
pub mod output;
pub mod prompt;

pub use decoder::{argmax, generate, DecodeStart};
pub use detector::{is_json_complete, JsonScanner};
pub use extract::{extract_json, parse_object};
pub use output::{FinishReason, GenerationOutcome, FALLBACK_JSON};
pub use prompt::{assemble, with_media_marker, OUTPUT_GRAMMAR};
