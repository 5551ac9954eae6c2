//! libmtmd vision projector via llama-cpp-2.

use std::path::Path;
use std::sync::Arc;

use llama_cpp_2::model::LlamaModel;
use llama_cpp_2::mtmd::{
    mtmd_default_marker, MtmdBitmap, MtmdContext, MtmdContextParams, MtmdInputChunks,
    MtmdInputText,
};

use super::GgufEngine;
use crate::engine::{EngineError, Position, ProjectorParams, SeqId, VisionProjector};

/// Decoded image, freed on drop.
pub struct GgufBitmap(MtmdBitmap);

/// Tokenized text+image chunks, freed on drop.
pub struct GgufChunks(MtmdInputChunks);

/// Vision projector bound to the session's text model.
pub struct GgufProjector {
    // Declared before `_model`: the projector references the model internally.
    ctx: MtmdContext,
    marker: String,
    _model: Arc<LlamaModel>,
}

// SAFETY: only reached through the session mutex.
unsafe impl Send for GgufProjector {}

impl GgufProjector {
    pub(super) fn init(
        path: &Path,
        model: &Arc<LlamaModel>,
        params: &ProjectorParams,
    ) -> Result<Self, EngineError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| EngineError::ProjectorInit("projector path is not UTF-8".into()))?;
        let mtmd_params = MtmdContextParams {
            use_gpu: params.use_gpu,
            print_timings: params.print_timings,
            n_threads: params.n_threads,
            ..MtmdContextParams::default()
        };
        let ctx = MtmdContext::init_from_file(path_str, model, &mtmd_params)
            .map_err(|e| EngineError::ProjectorInit(format!("{path_str}: {e}")))?;
        Ok(Self {
            ctx,
            marker: mtmd_default_marker().to_string(),
            _model: Arc::clone(model),
        })
    }
}

impl VisionProjector for GgufProjector {
    type Engine = GgufEngine;
    type Bitmap = GgufBitmap;
    type Chunks = GgufChunks;

    fn media_marker(&self) -> &str {
        &self.marker
    }

    fn decode_bitmap(&self, bytes: &[u8]) -> Result<Self::Bitmap, EngineError> {
        MtmdBitmap::from_buffer(&self.ctx, bytes)
            .map(GgufBitmap)
            .map_err(|e| EngineError::Bitmap(e.to_string()))
    }

    fn tokenize_mixed(
        &self,
        text: &str,
        bitmaps: &[&Self::Bitmap],
    ) -> Result<Self::Chunks, EngineError> {
        let input = MtmdInputText {
            text: text.to_string(),
            add_special: true,
            parse_special: true,
        };
        let refs: Vec<&MtmdBitmap> = bitmaps.iter().map(|b| &b.0).collect();
        self.ctx
            .tokenize(input, &refs)
            .map(GgufChunks)
            .map_err(|e| EngineError::MixedTokenize(e.to_string()))
    }

    fn evaluate_chunks(
        &self,
        engine: &mut GgufEngine,
        chunks: &Self::Chunks,
        start: Position,
        seq_id: SeqId,
        batch_limit: usize,
    ) -> Result<Position, EngineError> {
        engine.set_logits_ready(false);
        let n_batch = i32::try_from(batch_limit).unwrap_or(i32::MAX);
        let next = chunks
            .0
            .eval_chunks(&self.ctx, engine.context(), start, seq_id, n_batch, true)
            .map_err(|e| EngineError::ChunkEval(e.to_string()))?;
        engine.set_logits_ready(true);
        Ok(next)
    }
}
