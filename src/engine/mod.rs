//! Inference engine boundary.
//!
//! The generation controller never touches weights, tensors or vocabulary
//! storage directly. It drives three collaborators through the traits below:
//! a [`Backend`] that loads handles, a [`TextEngine`] that tokenizes and
//! evaluates against an incremental cache, and a [`VisionProjector`] that
//! turns image bytes into cache entries.

pub mod batch;
pub mod config;
pub mod error;
#[cfg(feature = "gguf")]
pub mod gguf;

use std::path::Path;

pub use batch::{BatchEntry, PositionCursor, TokenBatch, PRIMARY_SEQ};
pub use config::{resolve_threads, ContextParams, ModelParams, ProjectorParams};
pub use error::EngineError;

/// Vocabulary token id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub i32);

/// Absolute slot in the engine's incremental cache.
pub type Position = i32;

/// Sequence id inside the engine's cache.
pub type SeqId = i32;

/// Text side of the inference engine: one context bound to one model.
pub trait TextEngine {
    /// Drop every cached position for every sequence.
    fn clear_cache(&mut self);

    /// Tokenize `text`. `add_special` prepends markers such as BOS,
    /// `parse_special` lets special-token text map to special ids.
    fn tokenize(
        &self,
        text: &str,
        add_special: bool,
        parse_special: bool,
    ) -> Result<Vec<Token>, EngineError>;

    /// Evaluate a batch into the cache.
    fn evaluate(&mut self, batch: &TokenBatch) -> Result<(), EngineError>;

    /// Logits of the last evaluated position that requested them.
    fn logits(&self) -> Option<&[f32]>;

    fn vocab_size(&self) -> usize;

    fn is_end_of_generation(&self, token: Token) -> bool;

    /// Raw text bytes of a token. May be a partial UTF-8 sequence.
    fn token_bytes(&self, token: Token) -> Result<Vec<u8>, EngineError>;
}

/// Image side of the engine: a projector bound to the text model.
///
/// Bitmaps and chunk sequences are owned values, released when dropped.
pub trait VisionProjector {
    type Engine: TextEngine;
    type Bitmap;
    type Chunks;

    /// Substring marking where image chunks are spliced into the prompt.
    fn media_marker(&self) -> &str;

    fn decode_bitmap(&self, bytes: &[u8]) -> Result<Self::Bitmap, EngineError>;

    /// Tokenize text and bitmaps into an ordered chunk sequence.
    fn tokenize_mixed(
        &self,
        text: &str,
        bitmaps: &[&Self::Bitmap],
    ) -> Result<Self::Chunks, EngineError>;

    /// Evaluate chunks in order from `start`. Only the final token of the
    /// final chunk requests logits. Returns the next free position.
    fn evaluate_chunks(
        &self,
        engine: &mut Self::Engine,
        chunks: &Self::Chunks,
        start: Position,
        seq_id: SeqId,
        batch_limit: usize,
    ) -> Result<Position, EngineError>;
}

/// Loads the handles a session owns.
pub trait Backend {
    type Model;
    type Engine: TextEngine;
    type Projector: VisionProjector<Engine = Self::Engine>;

    fn load_model(&self, path: &Path, params: &ModelParams) -> Result<Self::Model, EngineError>;

    fn create_context(
        &self,
        model: &Self::Model,
        params: &ContextParams,
    ) -> Result<Self::Engine, EngineError>;

    fn init_projector(
        &self,
        path: &Path,
        model: &Self::Model,
        params: &ProjectorParams,
    ) -> Result<Self::Projector, EngineError>;
}
