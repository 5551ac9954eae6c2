//! Image-conditioned cache priming.
//!
//! Decodes the image, tokenizes it together with the marker-augmented
//! prompt and evaluates the resulting chunks from position 0. On success the
//! cache holds the whole prompt and the returned position is where greedy
//! decoding continues. Any error means the caller falls back to the text
//! path with the original prompt.

use tracing::debug;

use super::prompt::with_media_marker;
use crate::engine::{EngineError, Position, VisionProjector, PRIMARY_SEQ};

/// Evaluate `prompt` and `image` into the engine cache.
///
/// Returns the next free cache position. The bitmap and chunk sequence are
/// released when this returns, on success and on every failure.
pub fn prime<P>(
    projector: &P,
    engine: &mut P::Engine,
    prompt: &str,
    image: &[u8],
    batch_limit: usize,
) -> Result<Position, EngineError>
where
    P: VisionProjector + ?Sized,
{
    let bitmap = projector.decode_bitmap(image)?;
    let marked = with_media_marker(prompt, projector.media_marker());
    let chunks = projector.tokenize_mixed(&marked, &[&bitmap])?;
    let next = projector.evaluate_chunks(engine, &chunks, 0, PRIMARY_SEQ, batch_limit.max(1))?;
    debug!(image_bytes = image.len(), next_position = next, "vision prompt evaluated");
    Ok(next)
}
