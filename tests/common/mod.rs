//! Scripted in-memory backend shared by integration tests.
//!
//! The mock engine emits a fixed sequence of tokens: every evaluation that
//! requests logits makes the next scripted token the argmax. Every call is
//! recorded so tests can assert on positions, batch shapes and release
//! order.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use vlm_json::engine::{
    Backend, ContextParams, EngineError, ModelParams, Position, ProjectorParams, SeqId,
    TextEngine, Token, TokenBatch, VisionProjector,
};

pub const BOS: i32 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    LoadModel,
    CreateContext { n_ctx: u32, n_threads: i32 },
    InitProjector,
    ClearCache,
    Tokenize(String),
    Evaluate { len: usize, start: Position, logits_last: bool },
    DecodeBitmap(usize),
    TokenizeMixed(String),
    EvalChunks { start: Position, batch_limit: usize },
    Released(&'static str),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// Behaviour of the mock backend.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Token id to raw bytes. The last entry is the end-of-generation token.
    pub vocab: Vec<Vec<u8>>,
    /// Token ids emitted in order, one per logits-producing evaluation.
    pub outputs: Vec<i32>,
    /// Zero-based `evaluate` call index that fails.
    pub fail_eval_at: Option<usize>,
    pub fail_tokenize: bool,
    pub empty_tokenize: bool,
    pub fail_model: bool,
    pub fail_context: bool,
    pub fail_projector: bool,
    pub fail_bitmap: bool,
    pub fail_tokenize_mixed: bool,
    pub fail_chunks: bool,
    /// Tokens the mock projector reports as evaluated.
    pub vision_tokens: Position,
}

impl Script {
    /// Emit `pieces` in order, then end-of-generation.
    pub fn pieces(pieces: &[&str]) -> Self {
        let mut vocab: Vec<Vec<u8>> = pieces.iter().map(|p| p.as_bytes().to_vec()).collect();
        vocab.push(b"<eos>".to_vec());
        let mut outputs: Vec<i32> = (0..pieces.len() as i32).collect();
        outputs.push(pieces.len() as i32);
        Self { vocab, outputs, vision_tokens: 40, ..Self::default() }
    }

    /// Emit raw byte pieces in order, then end-of-generation.
    pub fn byte_pieces(pieces: &[&[u8]]) -> Self {
        let mut vocab: Vec<Vec<u8>> = pieces.iter().map(|p| p.to_vec()).collect();
        vocab.push(b"<eos>".to_vec());
        let mut outputs: Vec<i32> = (0..pieces.len() as i32).collect();
        outputs.push(pieces.len() as i32);
        Self { vocab, outputs, vision_tokens: 40, ..Self::default() }
    }

    pub fn eog(&self) -> i32 {
        self.vocab.len() as i32 - 1
    }
}

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: &EventLog, event: Event) {
    log.lock().unwrap().push(event);
}

pub struct MockModel {
    log: EventLog,
}

impl Drop for MockModel {
    fn drop(&mut self) {
        record(&self.log, Event::Released("model"));
    }
}

pub struct MockEngine {
    script: Script,
    log: EventLog,
    eval_calls: usize,
    served: usize,
    logits: Vec<f32>,
    ready: bool,
}

impl MockEngine {
    pub fn new(script: Script, log: EventLog) -> Self {
        Self { script, log, eval_calls: 0, served: 0, logits: Vec::new(), ready: false }
    }

    /// Point the logits at the next scripted token, or none when exhausted.
    pub fn serve_next(&mut self) {
        let vocab = self.script.vocab.len();
        match self.script.outputs.get(self.served) {
            Some(&id) => {
                let mut logits = vec![0.0; vocab];
                logits[id as usize] = 10.0;
                self.logits = logits;
                self.ready = true;
            }
            None => self.ready = false,
        }
        self.served += 1;
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        record(&self.log, Event::Released("context"));
    }
}

impl TextEngine for MockEngine {
    fn clear_cache(&mut self) {
        self.ready = false;
        record(&self.log, Event::ClearCache);
    }

    fn tokenize(
        &self,
        text: &str,
        add_special: bool,
        _parse_special: bool,
    ) -> Result<Vec<Token>, EngineError> {
        record(&self.log, Event::Tokenize(text.to_string()));
        if self.script.fail_tokenize {
            return Err(EngineError::Tokenize("scripted failure".to_string()));
        }
        if self.script.empty_tokenize {
            return Ok(Vec::new());
        }
        let mut tokens = Vec::new();
        if add_special {
            tokens.push(Token(BOS));
        }
        tokens.extend(text.split_whitespace().enumerate().map(|(i, _)| Token(i as i32)));
        Ok(tokens)
    }

    fn evaluate(&mut self, batch: &TokenBatch) -> Result<(), EngineError> {
        let call = self.eval_calls;
        self.eval_calls += 1;
        let entries = batch.entries();
        record(
            &self.log,
            Event::Evaluate {
                len: entries.len(),
                start: entries.first().map_or(-1, |e| e.position),
                logits_last: entries.last().is_some_and(|e| e.logits),
            },
        );
        if self.script.fail_eval_at == Some(call) {
            self.ready = false;
            return Err(EngineError::Decode("scripted failure".to_string()));
        }
        if batch.logits_requested() > 0 {
            self.serve_next();
        }
        Ok(())
    }

    fn logits(&self) -> Option<&[f32]> {
        self.ready.then_some(self.logits.as_slice())
    }

    fn vocab_size(&self) -> usize {
        self.script.vocab.len()
    }

    fn is_end_of_generation(&self, token: Token) -> bool {
        token.0 == self.script.eog()
    }

    fn token_bytes(&self, token: Token) -> Result<Vec<u8>, EngineError> {
        self.script
            .vocab
            .get(token.0 as usize)
            .cloned()
            .ok_or_else(|| EngineError::Detokenize { token: token.0, reason: "out of vocab".into() })
    }
}

pub struct MockBitmap {
    log: EventLog,
}

impl Drop for MockBitmap {
    fn drop(&mut self) {
        record(&self.log, Event::Released("bitmap"));
    }
}

pub struct MockChunks {
    log: EventLog,
}

impl Drop for MockChunks {
    fn drop(&mut self) {
        record(&self.log, Event::Released("chunks"));
    }
}

pub struct MockProjector {
    script: Script,
    log: EventLog,
}

impl Drop for MockProjector {
    fn drop(&mut self) {
        record(&self.log, Event::Released("projector"));
    }
}

impl VisionProjector for MockProjector {
    type Engine = MockEngine;
    type Bitmap = MockBitmap;
    type Chunks = MockChunks;

    fn media_marker(&self) -> &str {
        "<__media__>"
    }

    fn decode_bitmap(&self, bytes: &[u8]) -> Result<MockBitmap, EngineError> {
        record(&self.log, Event::DecodeBitmap(bytes.len()));
        if self.script.fail_bitmap {
            return Err(EngineError::Bitmap("scripted failure".to_string()));
        }
        Ok(MockBitmap { log: self.log.clone() })
    }

    fn tokenize_mixed(&self, text: &str, _bitmaps: &[&MockBitmap]) -> Result<MockChunks, EngineError> {
        record(&self.log, Event::TokenizeMixed(text.to_string()));
        if self.script.fail_tokenize_mixed {
            return Err(EngineError::MixedTokenize("scripted failure".to_string()));
        }
        Ok(MockChunks { log: self.log.clone() })
    }

    fn evaluate_chunks(
        &self,
        engine: &mut MockEngine,
        _chunks: &MockChunks,
        start: Position,
        _seq_id: SeqId,
        batch_limit: usize,
    ) -> Result<Position, EngineError> {
        record(&self.log, Event::EvalChunks { start, batch_limit });
        if self.script.fail_chunks {
            return Err(EngineError::ChunkEval("scripted failure".to_string()));
        }
        engine.serve_next();
        Ok(start + self.script.vision_tokens)
    }
}

/// Backend producing mock handles that share one event log.
pub struct MockBackend {
    pub script: Script,
    pub log: EventLog,
}

impl MockBackend {
    pub fn new(script: Script) -> Self {
        Self { script, log: new_log() }
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl Backend for MockBackend {
    type Model = MockModel;
    type Engine = MockEngine;
    type Projector = MockProjector;

    fn load_model(&self, _path: &Path, _params: &ModelParams) -> Result<MockModel, EngineError> {
        record(&self.log, Event::LoadModel);
        if self.script.fail_model {
            return Err(EngineError::ModelLoad("scripted failure".to_string()));
        }
        Ok(MockModel { log: self.log.clone() })
    }

    fn create_context(
        &self,
        _model: &MockModel,
        params: &ContextParams,
    ) -> Result<MockEngine, EngineError> {
        record(
            &self.log,
            Event::CreateContext { n_ctx: params.n_ctx, n_threads: params.n_threads },
        );
        if self.script.fail_context {
            return Err(EngineError::ContextCreate("scripted failure".to_string()));
        }
        Ok(MockEngine::new(self.script.clone(), self.log.clone()))
    }

    fn init_projector(
        &self,
        _path: &Path,
        _model: &MockModel,
        _params: &ProjectorParams,
    ) -> Result<MockProjector, EngineError> {
        record(&self.log, Event::InitProjector);
        if self.script.fail_projector {
            return Err(EngineError::ProjectorInit("scripted failure".to_string()));
        }
        Ok(MockProjector { script: self.script.clone(), log: self.log.clone() })
    }
}
