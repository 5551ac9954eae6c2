//! Engine error types.
//!
//! Every failure reported by the inference engine or the vision projector
//! maps to one variant here. None of them crosses the session boundary:
//! the session turns them into a `bool`, a fallback path, or a finish reason.

use thiserror::Error;

/// Errors raised by the engine and projector collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Context creation failed: {0}")]
    ContextCreate(String),

    #[error("Vision projector init failed: {0}")]
    ProjectorInit(String),

    #[error("Tokenization failed: {0}")]
    Tokenize(String),

    #[error("Batch construction failed: {0}")]
    Batch(String),

    #[error("Batch evaluation failed: {0}")]
    Decode(String),

    #[error("Mixed text/image tokenization failed: {0}")]
    MixedTokenize(String),

    #[error("Image decode failed: {0}")]
    Bitmap(String),

    #[error("Chunk evaluation failed: {0}")]
    ChunkEval(String),

    #[error("Detokenization failed for token {token}: {reason}")]
    Detokenize { token: i32, reason: String },

    #[error("Inference backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl EngineError {
    /// Returns true for failures confined to the image-conditioned path.
    ///
    /// These abandon vision for one request; the text path still runs.
    pub fn is_vision_failure(&self) -> bool {
        matches!(
            self,
            Self::Bitmap(_) | Self::MixedTokenize(_) | Self::ChunkEval(_) | Self::ProjectorInit(_)
        )
    }

    /// Returns true if the error leaves the session uninitialized.
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(
            self,
            Self::ModelLoad(_) | Self::ContextCreate(_) | Self::BackendUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_failures_are_not_fatal() {
        let err = EngineError::Bitmap("bad png".into());
        assert!(err.is_vision_failure());
        assert!(!err.is_fatal_for_session());

        let err = EngineError::ProjectorInit("missing mmproj".into());
        assert!(err.is_vision_failure());
        assert!(!err.is_fatal_for_session());

        assert!(EngineError::MixedTokenize("no marker".into()).is_vision_failure());
        assert!(!EngineError::Tokenize("x".into()).is_vision_failure());
    }

    #[test]
    fn test_load_failures_are_fatal() {
        assert!(EngineError::ModelLoad("x".into()).is_fatal_for_session());
        assert!(EngineError::ContextCreate("x".into()).is_fatal_for_session());
        assert!(!EngineError::Decode("x".into()).is_fatal_for_session());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = EngineError::Detokenize { token: 7, reason: "invalid".into() };
        assert_eq!(err.to_string(), "Detokenization failed for token 7: invalid");
    }
}
