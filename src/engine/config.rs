//! Handle-creation parameters passed to the backend.
//!
//! All fields have safe defaults. Values are normalised before use.

/// Context length applied when the caller passes zero.
pub const DEFAULT_N_CTX: u32 = 2048;

/// Batch-size limit used when evaluating image chunks.
pub const DEFAULT_N_BATCH: u32 = 512;

/// Upper bound for automatically chosen thread counts.
const MAX_AUTO_THREADS: usize = 16;

/// Parameters for loading model weights.
#[derive(Debug, Clone, Default)]
pub struct ModelParams {
    /// Layers offloaded to GPU (0 = CPU only).
    pub n_gpu_layers: u32,
}

/// Parameters for creating the inference context.
#[derive(Debug, Clone)]
pub struct ContextParams {
    /// Context window in tokens.
    pub n_ctx: u32,
    /// Threads for single-token and batch evaluation.
    pub n_threads: i32,
    /// Maximum tokens per evaluation call.
    pub n_batch: u32,
}

impl Default for ContextParams {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl ContextParams {
    /// Build context params from caller values.
    ///
    /// A non-positive context length falls back to [`DEFAULT_N_CTX`]. The
    /// batch capacity equals the context length so any prompt that fits the
    /// context is evaluated in a single call.
    pub fn new(context_length: i32, thread_count: i32) -> Self {
        let n_ctx = u32::try_from(context_length)
            .ok()
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_N_CTX);
        Self {
            n_ctx,
            n_threads: resolve_threads(thread_count),
            n_batch: n_ctx,
        }
    }
}

/// Parameters for the vision projector.
#[derive(Debug, Clone)]
pub struct ProjectorParams {
    pub use_gpu: bool,
    pub print_timings: bool,
    pub n_threads: i32,
}

impl ProjectorParams {
    /// CPU-only projector sharing the context's thread count.
    pub fn for_threads(n_threads: i32) -> Self {
        Self { use_gpu: false, print_timings: false, n_threads }
    }
}

/// Resolve a requested thread count. Non-positive means automatic.
pub fn resolve_threads(requested: i32) -> i32 {
    if requested > 0 {
        return requested;
    }
    // Inference is memory-bound; logical cores help hide latency up to a cap.
    let optimal = num_cpus::get().clamp(1, MAX_AUTO_THREADS);
    i32::try_from(optimal).unwrap_or(4)
}
