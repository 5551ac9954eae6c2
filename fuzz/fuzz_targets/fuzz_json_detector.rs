//! Fuzz target for the streaming JSON detector.
//!
//! Arbitrary text split into arbitrary fragments must give the same verdict
//! as a single full scan, and extraction must never panic or return text
//! outside its input.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vlm_json::generation::{extract_json, is_json_complete, parse_object, JsonScanner};

#[derive(Debug, Arbitrary)]
struct Input {
    pieces: Vec<String>,
}

fuzz_target!(|input: Input| {
    let full: String = input.pieces.concat();

    let mut scanner = JsonScanner::new();
    let mut verdict = false;
    for piece in &input.pieces {
        verdict = scanner.push(piece);
    }
    assert_eq!(verdict, is_json_complete(&full), "incremental scan diverged");

    if let Some(found) = extract_json(&full) {
        assert!(full.contains(found), "extracted text not in input");
    }
    let _ = parse_object(&full);
});
