//! llama-cpp-2 inference context.
//!
//! Tokenization, batch evaluation and logits access through the
//! llama-cpp-2 Rust bindings.

use std::num::NonZeroU32;
use std::sync::Arc;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::token::LlamaToken;

use crate::engine::{ContextParams, EngineError, TextEngine, Token, TokenBatch};

/// One inference context over a shared model.
pub struct GgufEngine {
    // Declared before `model`: the context must drop while the model is alive.
    ctx: LlamaContext<'static>,
    model: Arc<LlamaModel>,
    n_vocab: usize,
    logits_ready: bool,
}

// SAFETY: the context is only reached through the session mutex, so it is
// never used from two threads at once.
unsafe impl Send for GgufEngine {}

impl GgufEngine {
    pub(super) fn new(
        backend: &LlamaBackend,
        model: &Arc<LlamaModel>,
        params: &ContextParams,
    ) -> Result<Self, EngineError> {
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(params.n_ctx))
            .with_n_batch(params.n_batch)
            .with_n_threads(params.n_threads)
            .with_n_threads_batch(params.n_threads);
        // SAFETY: the Arc clone stored in `model` keeps the model at a stable
        // heap address for as long as `ctx` exists, and `ctx` drops first.
        let model_ref: &'static LlamaModel = unsafe { &*Arc::as_ptr(model) };
        let ctx = model_ref
            .new_context(backend, ctx_params)
            .map_err(|e| EngineError::ContextCreate(e.to_string()))?;
        let n_vocab = usize::try_from(model.n_vocab()).unwrap_or(0);
        Ok(Self { ctx, model: Arc::clone(model), n_vocab, logits_ready: false })
    }

    pub(super) fn context(&self) -> &LlamaContext<'static> {
        &self.ctx
    }

    /// Record that the last evaluation produced logits outside `evaluate`.
    pub(super) fn set_logits_ready(&mut self, ready: bool) {
        self.logits_ready = ready;
    }
}

impl TextEngine for GgufEngine {
    fn clear_cache(&mut self) {
        self.ctx.clear_kv_cache();
        self.logits_ready = false;
    }

    fn tokenize(
        &self,
        text: &str,
        add_special: bool,
        _parse_special: bool,
    ) -> Result<Vec<Token>, EngineError> {
        // str_to_token always parses special-token text.
        let add_bos = if add_special { AddBos::Always } else { AddBos::Never };
        let tokens = self
            .model
            .str_to_token(text, add_bos)
            .map_err(|e| EngineError::Tokenize(e.to_string()))?;
        Ok(tokens.into_iter().map(|t| Token(t.0)).collect())
    }

    fn evaluate(&mut self, batch: &TokenBatch) -> Result<(), EngineError> {
        self.logits_ready = false;
        let mut llama_batch = LlamaBatch::new(batch.len().max(1), 1);
        for entry in batch.entries() {
            llama_batch
                .add(LlamaToken(entry.token.0), entry.position, &[entry.seq_id], entry.logits)
                .map_err(|e| EngineError::Batch(e.to_string()))?;
        }
        self.ctx
            .decode(&mut llama_batch)
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        self.logits_ready = batch.logits_requested() > 0;
        Ok(())
    }

    fn logits(&self) -> Option<&[f32]> {
        if !self.logits_ready || self.n_vocab == 0 {
            return None;
        }
        Some(self.ctx.get_logits())
    }

    fn vocab_size(&self) -> usize {
        self.n_vocab
    }

    fn is_end_of_generation(&self, token: Token) -> bool {
        self.model.is_eog_token(LlamaToken(token.0))
    }

    fn token_bytes(&self, token: Token) -> Result<Vec<u8>, EngineError> {
        self.model
            .token_to_bytes(LlamaToken(token.0), Special::Tokenize)
            .map_err(|e| EngineError::Detokenize { token: token.0, reason: e.to_string() })
    }
}
