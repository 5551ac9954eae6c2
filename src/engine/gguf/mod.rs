//! GGUF backend built on llama-cpp-2.
//!
//! Loads a GGUF text model, creates one inference context over it and,
//! when a projector file is supplied, a libmtmd vision context bound to
//! the same model.

mod backend;
mod projector;

use std::path::Path;
use std::sync::{Arc, OnceLock};

use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::LlamaModel;

use crate::engine::{Backend, ContextParams, EngineError, ModelParams, ProjectorParams};

pub use backend::GgufEngine;
pub use projector::{GgufBitmap, GgufChunks, GgufProjector};

static LLAMA_BACKEND: OnceLock<LlamaBackend> = OnceLock::new();

/// Process-wide llama.cpp backend, initialised on first use.
///
/// Callers are serialised by the session lock, so the check-then-init
/// sequence cannot race.
fn llama_backend() -> Result<&'static LlamaBackend, EngineError> {
    if let Some(backend) = LLAMA_BACKEND.get() {
        return Ok(backend);
    }
    llama_cpp_2::send_logs_to_tracing(llama_cpp_2::LogOptions::default());
    let backend = LlamaBackend::init()
        .map_err(|e| EngineError::BackendUnavailable(format!("backend init: {e}")))?;
    Ok(LLAMA_BACKEND.get_or_init(|| backend))
}

/// llama-cpp-2 implementation of [`Backend`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GgufBackend;

impl Backend for GgufBackend {
    type Model = Arc<LlamaModel>;
    type Engine = GgufEngine;
    type Projector = GgufProjector;

    fn load_model(&self, path: &Path, params: &ModelParams) -> Result<Self::Model, EngineError> {
        let backend = llama_backend()?;
        let model_params = LlamaModelParams::default().with_n_gpu_layers(params.n_gpu_layers);
        let model = LlamaModel::load_from_file(backend, path, &model_params)
            .map_err(|e| EngineError::ModelLoad(format!("{}: {e}", path.display())))?;
        Ok(Arc::new(model))
    }

    fn create_context(
        &self,
        model: &Self::Model,
        params: &ContextParams,
    ) -> Result<Self::Engine, EngineError> {
        GgufEngine::new(llama_backend()?, model, params)
    }

    fn init_projector(
        &self,
        path: &Path,
        model: &Self::Model,
        params: &ProjectorParams,
    ) -> Result<Self::Projector, EngineError> {
        GgufProjector::init(path, model, params)
    }
}
