//! Generation output types.

use crate::engine::Position;

/// Returned to callers whenever generation produced no text.
pub const FALLBACK_JSON: &str = "{}";

/// Reason why greedy decoding stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The output became one complete JSON object or array.
    JsonComplete,
    /// The model selected an end-of-generation token.
    EndOfGeneration,
    /// The token budget ran out.
    MaxTokens,
    /// The engine had no logits for the last position.
    LogitsUnavailable,
    /// Tokenization, evaluation or detokenization failed.
    EngineFailure,
    /// The session was not initialized.
    NotReady,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JsonComplete => "json_complete",
            Self::EndOfGeneration => "end_of_generation",
            Self::MaxTokens => "max_tokens",
            Self::LogitsUnavailable => "logits_unavailable",
            Self::EngineFailure => "engine_failure",
            Self::NotReady => "not_ready",
        }
    }
}

/// Result of one generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    /// Accumulated text. May be empty or an incomplete JSON prefix.
    pub text: String,
    /// Number of token pieces appended to `text`.
    pub tokens_generated: u32,
    pub finish_reason: FinishReason,
    /// True when the prompt was evaluated through the vision projector.
    pub used_vision: bool,
    /// Cursor value when decoding stopped.
    pub final_position: Position,
}

impl GenerationOutcome {
    /// Outcome for a request that never reached the engine.
    pub fn not_ready() -> Self {
        Self {
            text: String::new(),
            tokens_generated: 0,
            finish_reason: FinishReason::NotReady,
            used_vision: false,
            final_position: 0,
        }
    }

    /// Caller-facing text: the generated text, or `{}` when empty.
    pub fn into_text(self) -> String {
        if self.text.is_empty() {
            FALLBACK_JSON.to_string()
        } else {
            self.text
        }
    }
}
