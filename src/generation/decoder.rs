//! Greedy decode loop.
//!
//! Deterministic argmax decoding against the engine's incremental cache,
//! stopped early by the JSON completeness detector. The loop never fails:
//! every engine error ends generation and returns what was produced.

use encoding_rs::{Decoder, UTF_8};
use tracing::{debug, warn};

use super::detector::JsonScanner;
use super::output::{FinishReason, GenerationOutcome};
use crate::engine::{Position, PositionCursor, TextEngine, Token, TokenBatch, PRIMARY_SEQ};

/// Output buffer pre-allocation is sized for at most this many pieces.
const MAX_PREALLOC_TOKENS: u32 = 1024;

/// Where decoding starts.
#[derive(Debug, Clone, Copy)]
pub enum DecodeStart<'a> {
    /// Prompt text not yet in the cache; evaluated at `cursor` first.
    Prompt { text: &'a str, cursor: Position },
    /// Prompt already evaluated (vision path); continue from `cursor`.
    Primed { cursor: Position },
}

/// Index of the largest logit. Ties go to the lowest index; NaN is skipped.
pub fn argmax(logits: &[f32]) -> Option<Token> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &value) in logits.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if value <= top => {}
            _ => best = Some((i, value)),
        }
    }
    best.and_then(|(i, _)| i32::try_from(i).ok()).map(Token)
}

/// Run greedy generation for at most `max_tokens` pieces.
pub fn generate<E>(engine: &mut E, start: DecodeStart<'_>, max_tokens: u32) -> GenerationOutcome
where
    E: TextEngine + ?Sized,
{
    let mut cursor = match start {
        DecodeStart::Primed { cursor } => PositionCursor::at(cursor),
        DecodeStart::Prompt { text, cursor } => {
            let mut cursor = PositionCursor::at(cursor);
            if let Err(reason) = evaluate_prompt(engine, text, &mut cursor) {
                return finished(String::new(), 0, reason, cursor);
            }
            cursor
        }
    };

    let mut decoder = UTF_8.new_decoder();
    let mut held = HeldBytes::default();
    let mut scanner = JsonScanner::new();
    let mut text = String::with_capacity(max_tokens.min(MAX_PREALLOC_TOKENS) as usize * 4);
    let mut generated = 0u32;
    let mut reason = FinishReason::MaxTokens;

    for _ in 0..max_tokens {
        let vocab = engine.vocab_size();
        let next = engine.logits().and_then(|l| argmax(&l[..vocab.min(l.len())]));
        let Some(token) = next else {
            reason = FinishReason::LogitsUnavailable;
            break;
        };
        if engine.is_end_of_generation(token) {
            reason = FinishReason::EndOfGeneration;
            break;
        }
        let bytes = match engine.token_bytes(token) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "token to text failed");
                reason = FinishReason::EngineFailure;
                break;
            }
        };

        let appended_at = text.len();
        push_piece(&mut decoder, &bytes, &mut text, false);
        generated += 1;
        let unfinished = held.feed(&bytes);
        // A held byte is trailing content; it cannot end the object.
        if scanner.push(&text[appended_at..]) && !unfinished {
            reason = FinishReason::JsonComplete;
            break;
        }

        let batch = TokenBatch::single(token, cursor.get(), PRIMARY_SEQ);
        if let Err(e) = engine.evaluate(&batch) {
            warn!(error = %e, position = cursor.get(), "continuation decode failed");
            reason = FinishReason::EngineFailure;
            break;
        }
        cursor.advance(batch.len());
    }

    if reason != FinishReason::JsonComplete {
        push_piece(&mut decoder, &[], &mut text, true);
    }
    debug!(
        json_depth = scanner.depth(),
        json_rejected = scanner.is_rejected(),
        "detector state at stop"
    );
    finished(text, generated, reason, cursor)
}

/// Phase A: tokenize the prompt and evaluate it as one batch.
fn evaluate_prompt<E>(
    engine: &mut E,
    prompt: &str,
    cursor: &mut PositionCursor,
) -> Result<(), FinishReason>
where
    E: TextEngine + ?Sized,
{
    let tokens = engine.tokenize(prompt, true, true).map_err(|e| {
        warn!(error = %e, "prompt tokenization failed");
        FinishReason::EngineFailure
    })?;
    if tokens.is_empty() {
        warn!("prompt tokenized to zero tokens");
        return Err(FinishReason::EngineFailure);
    }
    let batch = TokenBatch::prompt(&tokens, cursor.get(), PRIMARY_SEQ);
    engine.evaluate(&batch).map_err(|e| {
        warn!(error = %e, tokens = batch.len(), "prompt decode failed");
        FinishReason::EngineFailure
    })?;
    cursor.advance(batch.len());
    debug!(prompt_tokens = batch.len(), "prompt evaluated");
    Ok(())
}

/// Append decoded bytes, holding back an incomplete trailing character.
fn push_piece(decoder: &mut Decoder, bytes: &[u8], out: &mut String, last: bool) {
    if let Some(needed) = decoder.max_utf8_buffer_length(bytes.len()) {
        out.reserve(needed);
    }
    let _ = decoder.decode_to_string(bytes, out, last);
}

/// Mirrors the bytes the UTF-8 decoder keeps back between pieces.
#[derive(Debug, Default)]
struct HeldBytes {
    tail: Vec<u8>,
}

impl HeldBytes {
    /// Feed one piece. Returns true if it ends inside a character.
    fn feed(&mut self, bytes: &[u8]) -> bool {
        let mut buf = std::mem::take(&mut self.tail);
        buf.extend_from_slice(bytes);
        let mut rest = buf.as_slice();
        while let Err(e) = std::str::from_utf8(rest) {
            match e.error_len() {
                Some(invalid) => rest = &rest[e.valid_up_to() + invalid..],
                None => {
                    self.tail = rest[e.valid_up_to()..].to_vec();
                    break;
                }
            }
        }
        !self.tail.is_empty()
    }
}

fn finished(
    text: String,
    tokens_generated: u32,
    finish_reason: FinishReason,
    cursor: PositionCursor,
) -> GenerationOutcome {
    debug!(
        finish_reason = finish_reason.as_str(),
        tokens_generated,
        position = cursor.get(),
        "generation finished"
    );
    GenerationOutcome {
        text,
        tokens_generated,
        finish_reason,
        used_vision: false,
        final_position: cursor.get(),
    }
}
