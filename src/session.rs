//! Session lifecycle and the analyze entry point.
//!
//! A [`Session`] owns at most one loaded model, one inference context over
//! it and an optional vision projector. Every public operation takes the
//! session lock, so lifecycle changes and generation requests never
//! interleave.

use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{debug, error, info, info_span, warn};

use crate::config::EnvConfig;
use crate::engine::{
    Backend, ContextParams, EngineError, ModelParams, ProjectorParams, TextEngine,
};
use crate::generation::{
    assemble, generate, multimodal, DecodeStart, FinishReason, GenerationOutcome,
};

/// System prompt used by [`Session::warmup`].
pub const WARMUP_SYSTEM_PROMPT: &str = "Output only {}";
/// User prompt used by [`Session::warmup`].
pub const WARMUP_USER_PROMPT: &str = "Warmup";

/// Parameters for [`Session::initialize`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model_path: PathBuf,
    /// Vision projector file. `None` or an empty path means text-only.
    pub projector_path: Option<PathBuf>,
    /// Stored and reported; never applied to prompts.
    pub chat_template: Option<String>,
    /// Context window. Non-positive means the default.
    pub context_length: i32,
    /// Inference threads. Non-positive means automatic.
    pub thread_count: i32,
    /// Batch-size limit for image chunk evaluation.
    pub batch_limit: usize,
    pub n_gpu_layers: u32,
}

impl SessionConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            projector_path: None,
            chat_template: None,
            context_length: 0,
            thread_count: 0,
            batch_limit: crate::engine::config::DEFAULT_N_BATCH as usize,
            n_gpu_layers: 0,
        }
    }

    pub fn with_projector(mut self, path: impl Into<PathBuf>) -> Self {
        self.projector_path = Some(path.into());
        self
    }

    pub fn with_chat_template(mut self, template: impl Into<String>) -> Self {
        self.chat_template = Some(template.into());
        self
    }

    pub fn with_context_length(mut self, context_length: i32) -> Self {
        self.context_length = context_length;
        self
    }

    pub fn with_thread_count(mut self, thread_count: i32) -> Self {
        self.thread_count = thread_count;
        self
    }

    /// Build from environment configuration. `None` without a model path.
    pub fn from_env(env: &EnvConfig) -> Option<Self> {
        let model_path = env.model_path.clone()?;
        Some(Self {
            model_path,
            projector_path: env.mmproj_path.clone(),
            chat_template: env.chat_template.clone(),
            context_length: i32::try_from(env.n_ctx).unwrap_or(i32::MAX),
            thread_count: i32::try_from(env.n_threads).unwrap_or(0),
            batch_limit: env.n_batch.max(1) as usize,
            n_gpu_layers: env.n_gpu_layers,
        })
    }
}

/// Snapshot of session state for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SessionStatus {
    pub ready: bool,
    pub vision_enabled: bool,
    pub n_ctx: u32,
    pub n_threads: i32,
    pub n_batch: usize,
    pub chat_template: Option<String>,
}

/// Handles owned by a ready session.
///
/// Field order is drop order: projector, then context, then model.
struct Loaded<B: Backend> {
    projector: Option<B::Projector>,
    engine: B::Engine,
    model: B::Model,
    context: ContextParams,
    batch_limit: usize,
    chat_template: Option<String>,
}

impl<B: Backend> Loaded<B> {
    fn release(self) {
        let Loaded { projector, engine, model, .. } = self;
        if let Some(projector) = projector {
            drop(projector);
            info!("vision projector released");
        }
        drop(engine);
        info!("inference context released");
        drop(model);
        info!("model released");
    }
}

/// One model session guarded by a single lock.
pub struct Session<B: Backend> {
    backend: B,
    state: Mutex<Option<Loaded<B>>>,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B) -> Self {
        Self { backend, state: Mutex::new(None) }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load model, context and optional projector.
    ///
    /// Returns `true` when the session is ready. Calling this on a ready
    /// session does nothing and returns `true`. Projector failure is not
    /// fatal: the session continues text-only.
    pub fn initialize(&self, config: &SessionConfig) -> bool {
        let mut state = self.state.lock();
        if state.is_some() {
            debug!("session already initialized");
            return true;
        }
        match self.load(config) {
            Ok(loaded) => {
                info!(
                    model = %config.model_path.display(),
                    n_ctx = loaded.context.n_ctx,
                    n_threads = loaded.context.n_threads,
                    vision = loaded.projector.is_some(),
                    "session ready"
                );
                *state = Some(loaded);
                true
            }
            Err(e) => {
                error!(
                    error = %e,
                    fatal = e.is_fatal_for_session(),
                    model = %config.model_path.display(),
                    "session initialization failed"
                );
                false
            }
        }
    }

    fn load(&self, config: &SessionConfig) -> Result<Loaded<B>, EngineError> {
        let model_params = ModelParams { n_gpu_layers: config.n_gpu_layers };
        let model = self.backend.load_model(&config.model_path, &model_params)?;

        let context = ContextParams::new(config.context_length, config.thread_count);
        // On failure the model is dropped here, before returning.
        let engine = self.backend.create_context(&model, &context)?;

        let projector = match config
            .projector_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
        {
            Some(path) => {
                let params = ProjectorParams::for_threads(context.n_threads);
                match self.backend.init_projector(path, &model, &params) {
                    Ok(projector) => Some(projector),
                    Err(e) => {
                        warn!(
                            error = %e,
                            vision = e.is_vision_failure(),
                            projector = %path.display(),
                            "vision disabled, continuing text-only"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        Ok(Loaded {
            projector,
            engine,
            model,
            context,
            batch_limit: config.batch_limit.max(1),
            chat_template: config.chat_template.clone(),
        })
    }

    /// Release projector, context and model, in that order.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        match state.take() {
            Some(loaded) => {
                loaded.release();
                info!("session shut down");
            }
            None => debug!("shutdown on idle session"),
        }
    }

    /// True iff a model and context are loaded.
    pub fn is_alive(&self) -> bool {
        self.state.lock().is_some()
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.state.lock();
        match state.as_ref() {
            Some(loaded) => SessionStatus {
                ready: true,
                vision_enabled: loaded.projector.is_some(),
                n_ctx: loaded.context.n_ctx,
                n_threads: loaded.context.n_threads,
                n_batch: loaded.batch_limit,
                chat_template: loaded.chat_template.clone(),
            },
            None => SessionStatus {
                ready: false,
                vision_enabled: false,
                n_ctx: 0,
                n_threads: 0,
                n_batch: 0,
                chat_template: None,
            },
        }
    }

    /// Generate JSON text for the prompt and optional image.
    ///
    /// Never fails: returns the generated text, or `{}` when nothing was
    /// produced or the session is not ready. `temperature` is accepted for
    /// interface stability and has no effect; decoding is greedy.
    pub fn analyze(
        &self,
        system: Option<&str>,
        user: Option<&str>,
        image: Option<&[u8]>,
        temperature: f32,
        max_tokens: u32,
    ) -> String {
        self.analyze_detailed(system, user, image, temperature, max_tokens)
            .into_text()
    }

    /// [`Session::analyze`] with the finish reason and counters.
    pub fn analyze_detailed(
        &self,
        system: Option<&str>,
        user: Option<&str>,
        image: Option<&[u8]>,
        temperature: f32,
        max_tokens: u32,
    ) -> GenerationOutcome {
        let image = image.filter(|bytes| !bytes.is_empty());
        let span = info_span!(
            "analyze",
            max_tokens,
            temperature,
            has_image = image.is_some(),
            image_bytes = image.map_or(0, <[u8]>::len)
        );
        let _enter = span.enter();

        let mut state = self.state.lock();
        let Some(loaded) = state.as_mut() else {
            warn!("analyze called before initialize");
            return GenerationOutcome::not_ready();
        };

        let prompt = assemble(system, user);
        loaded.engine.clear_cache();

        let primed = match (loaded.projector.as_ref(), image) {
            (Some(projector), Some(bytes)) => {
                match multimodal::prime(projector, &mut loaded.engine, &prompt, bytes, loaded.batch_limit) {
                    Ok(next) => Some(next),
                    Err(e) => {
                        warn!(error = %e, vision = e.is_vision_failure(), "vision path failed, falling back to text");
                        loaded.engine.clear_cache();
                        None
                    }
                }
            }
            (None, Some(_)) => {
                debug!("image ignored: no vision projector");
                None
            }
            _ => None,
        };

        let outcome = match primed {
            Some(cursor) => {
                let mut outcome = generate(&mut loaded.engine, DecodeStart::Primed { cursor }, max_tokens);
                outcome.used_vision = true;
                outcome
            }
            None => generate(
                &mut loaded.engine,
                DecodeStart::Prompt { text: &prompt, cursor: 0 },
                max_tokens,
            ),
        };

        debug!(
            finish_reason = outcome.finish_reason.as_str(),
            tokens = outcome.tokens_generated,
            vision = outcome.used_vision,
            "analyze finished"
        );
        outcome
    }

    /// Run a one-token request to page in weights and warm caches.
    ///
    /// Returns `false` only when the session is not ready.
    pub fn warmup(&self, image: Option<&[u8]>) -> bool {
        let outcome = self.analyze_detailed(
            Some(WARMUP_SYSTEM_PROMPT),
            Some(WARMUP_USER_PROMPT),
            image,
            0.0,
            1,
        );
        outcome.finish_reason != FinishReason::NotReady
    }
}

#[cfg(feature = "gguf")]
pub use gguf_session::{global_session, GgufSession};

#[cfg(feature = "gguf")]
mod gguf_session {
    use std::sync::OnceLock;

    use super::Session;
    use crate::engine::gguf::GgufBackend;

    /// Session over the llama.cpp backend.
    pub type GgufSession = Session<GgufBackend>;

    /// The process-wide session.
    pub fn global_session() -> &'static GgufSession {
        static SESSION: OnceLock<GgufSession> = OnceLock::new();
        SESSION.get_or_init(|| Session::new(GgufBackend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::LogConfig;

    fn env_with_model(model: Option<&str>) -> EnvConfig {
        EnvConfig {
            model_path: model.map(PathBuf::from),
            mmproj_path: Some(PathBuf::from("/m/mmproj.gguf")),
            chat_template: Some("chatml".to_string()),
            n_ctx: 4096,
            n_threads: 3,
            n_batch: 256,
            n_gpu_layers: 0,
            max_tokens: 128,
            log: LogConfig::default(),
        }
    }

    #[test]
    fn test_from_env_requires_model_path() {
        assert!(SessionConfig::from_env(&env_with_model(None)).is_none());
    }

    #[test]
    fn test_from_env_copies_values() {
        let cfg = SessionConfig::from_env(&env_with_model(Some("/m/model.gguf"))).unwrap();
        assert_eq!(cfg.model_path, PathBuf::from("/m/model.gguf"));
        assert_eq!(cfg.projector_path, Some(PathBuf::from("/m/mmproj.gguf")));
        assert_eq!(cfg.context_length, 4096);
        assert_eq!(cfg.thread_count, 3);
        assert_eq!(cfg.batch_limit, 256);
        assert_eq!(cfg.chat_template.as_deref(), Some("chatml"));
    }

    #[test]
    fn test_builder_defaults() {
        let cfg = SessionConfig::new("/m/model.gguf").with_context_length(1024);
        assert!(cfg.projector_path.is_none());
        assert_eq!(cfg.context_length, 1024);
        assert_eq!(cfg.thread_count, 0);
        assert_eq!(cfg.batch_limit, 512);
    }
}
