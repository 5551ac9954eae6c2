//! Streaming JSON completeness detection.
//!
//! Decides when greedy decoding has produced one whole top-level JSON
//! object or array. This is a shape check only: balanced brackets with
//! string and escape awareness, nothing but whitespace after the close.
//! Bracket kinds are not matched against each other.

/// Whitespace accepted around the top-level value.
#[inline]
fn is_json_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Returns true iff `s` holds exactly one complete top-level object or
/// array, optionally surrounded by whitespace.
pub fn is_json_complete(s: &str) -> bool {
    let mut scanner = JsonScanner::new();
    scanner.push(s);
    scanner.is_complete()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Only whitespace seen so far.
    Leading,
    /// Inside the top-level value.
    Body { depth: u32, in_string: bool, escaped: bool },
    /// Depth returned to zero; only whitespace since.
    Closed,
    /// Not an object/array, or content after the close. Terminal.
    Rejected,
}

/// Incremental form of [`is_json_complete`].
///
/// Feeding fragments one by one gives the same answer as rescanning the
/// concatenation, without revisiting earlier bytes.
#[derive(Debug, Clone)]
pub struct JsonScanner {
    state: ScanState,
}

impl Default for JsonScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonScanner {
    pub fn new() -> Self {
        Self { state: ScanState::Leading }
    }

    /// Scan one more fragment. Returns the completeness after it.
    pub fn push(&mut self, fragment: &str) -> bool {
        for &b in fragment.as_bytes() {
            if self.state == ScanState::Rejected {
                break;
            }
            self.state = step(self.state, b);
        }
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.state == ScanState::Closed
    }

    /// True once no continuation can make the text complete.
    pub fn is_rejected(&self) -> bool {
        self.state == ScanState::Rejected
    }

    /// Current nesting depth (zero outside the value).
    pub fn depth(&self) -> u32 {
        match self.state {
            ScanState::Body { depth, .. } => depth,
            _ => 0,
        }
    }
}

fn step(state: ScanState, b: u8) -> ScanState {
    match state {
        ScanState::Leading => match b {
            b if is_json_ws(b) => ScanState::Leading,
            b'{' | b'[' => ScanState::Body { depth: 1, in_string: false, escaped: false },
            _ => ScanState::Rejected,
        },
        ScanState::Body { depth, in_string: true, escaped } => {
            if escaped {
                ScanState::Body { depth, in_string: true, escaped: false }
            } else {
                match b {
                    b'\\' => ScanState::Body { depth, in_string: true, escaped: true },
                    b'"' => ScanState::Body { depth, in_string: false, escaped: false },
                    _ => state,
                }
            }
        }
        ScanState::Body { depth, in_string: false, .. } => match b {
            b'"' => ScanState::Body { depth, in_string: true, escaped: false },
            b'{' | b'[' => ScanState::Body { depth: depth + 1, in_string: false, escaped: false },
            b'}' | b']' if depth == 1 => ScanState::Closed,
            b'}' | b']' => ScanState::Body { depth: depth - 1, in_string: false, escaped: false },
            _ => state,
        },
        ScanState::Closed => {
            if is_json_ws(b) {
                ScanState::Closed
            } else {
                ScanState::Rejected
            }
        }
        ScanState::Rejected => ScanState::Rejected,
    }
}
