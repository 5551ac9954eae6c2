//! Token batches and cache position bookkeeping.
//!
//! Prompt submission and single-token continuation share one batch shape:
//! every entry carries its token, absolute position, sequence id and a
//! logits-needed flag.

use super::{Position, SeqId, Token};

/// Sequence id used for every request. Only one sequence is ever live.
pub const PRIMARY_SEQ: SeqId = 0;

/// One slot of a batch submitted to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchEntry {
    pub token: Token,
    pub position: Position,
    pub seq_id: SeqId,
    pub logits: bool,
}

/// Ephemeral batch of tokens evaluated in one engine call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenBatch {
    entries: Vec<BatchEntry>,
}

impl TokenBatch {
    /// Build a prompt batch at `start, start + 1, ...`.
    ///
    /// Only the final entry requests logits.
    pub fn prompt(tokens: &[Token], start: Position, seq_id: SeqId) -> Self {
        let last = tokens.len().saturating_sub(1);
        let entries = tokens
            .iter()
            .enumerate()
            .map(|(i, &token)| BatchEntry {
                token,
                position: start + i as Position,
                seq_id,
                logits: i == last,
            })
            .collect();
        Self { entries }
    }

    /// Build a continuation batch holding one token with logits requested.
    pub fn single(token: Token, position: Position, seq_id: SeqId) -> Self {
        Self {
            entries: vec![BatchEntry { token, position, seq_id, logits: true }],
        }
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries with the logits flag set.
    pub fn logits_requested(&self) -> usize {
        self.entries.iter().filter(|e| e.logits).count()
    }
}

/// Next free absolute slot in the engine cache for the primary sequence.
///
/// Must equal the number of tokens already decoded into the cache. It only
/// moves forward, and only after an evaluation succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionCursor {
    next: Position,
}

impl PositionCursor {
    /// Cursor at the start of an empty cache.
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Cursor resuming at a position reported by the projector.
    pub fn at(position: Position) -> Self {
        Self { next: position.max(0) }
    }

    pub fn get(&self) -> Position {
        self.next
    }

    /// Record that `n` tokens were decoded into the cache.
    pub fn advance(&mut self, n: usize) -> Position {
        let n = Position::try_from(n).unwrap_or(Position::MAX);
        self.next = self.next.saturating_add(n);
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_batch_positions_are_absolute() {
        let batch = TokenBatch::prompt(&[Token(5), Token(6), Token(7)], 10, PRIMARY_SEQ);
        let positions: Vec<_> = batch.entries().iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![10, 11, 12]);
        assert!(batch.entries().iter().all(|e| e.seq_id == PRIMARY_SEQ));
    }

    #[test]
    fn test_prompt_batch_requests_logits_only_on_last() {
        let batch = TokenBatch::prompt(&[Token(1), Token(2), Token(3)], 0, PRIMARY_SEQ);
        let flags: Vec<_> = batch.entries().iter().map(|e| e.logits).collect();
        assert_eq!(flags, vec![false, false, true]);
        assert_eq!(batch.logits_requested(), 1);
    }

    #[test]
    fn test_single_batch_requests_logits() {
        let batch = TokenBatch::single(Token(9), 42, PRIMARY_SEQ);
        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch.entries()[0],
            BatchEntry { token: Token(9), position: 42, seq_id: 0, logits: true }
        );
    }

    #[test]
    fn test_empty_prompt_batch() {
        let batch = TokenBatch::prompt(&[], 0, PRIMARY_SEQ);
        assert!(batch.is_empty());
        assert_eq!(batch.logits_requested(), 0);
    }

    #[test]
    fn test_cursor_advances_by_submitted_count() {
        let mut cursor = PositionCursor::new();
        assert_eq!(cursor.advance(4), 4);
        assert_eq!(cursor.advance(1), 5);
        assert_eq!(PositionCursor::at(-3).get(), 0);
        assert_eq!(PositionCursor::at(17).get(), 17);
    }
}
