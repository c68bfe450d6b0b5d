//! Key symbols and escape-sequence decoding.
//!
//! Terminals send multi-byte escape sequences with no framing, so the
//! decoder runs a prefix state machine over a lookup table:
//! - While exactly one table entry matches the buffer exactly and nothing
//!   longer is still possible, the key is emitted immediately.
//! - While several entries remain reachable, bytes accumulate. No timers:
//!   ambiguity is resolved only by further input.
//! - On a dead end the longest exact match seen wins; if there is none,
//!   the first buffered byte is delivered as a literal character and the
//!   remainder is re-examined from scratch.

use std::sync::Arc;

// =============================================================================
// Key symbols
// =============================================================================

/// A decoded key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A literal character, including control bytes that match no sequence.
    Char(char),
    /// ESC-prefixed printable (Meta/Alt chord).
    Alt(char),
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    Enter,
    Tab,
    Backspace,
    /// Function key, 1-based.
    F(u8),
    /// An X10 mouse report follows on the byte stream. Consumed by the
    /// keyboard thread, never delivered to a window.
    MouseIntro,
}

// =============================================================================
// Key table
// =============================================================================

/// Byte-sequence to key lookup table.
///
/// The decoder never interprets escape grammar; every recognizable sequence
/// is spelled out here, so exotic terminals are a table edit away.
pub struct KeyTable {
    entries: Vec<(Vec<u8>, Key)>,
}

impl KeyTable {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// The stock table: CSI and SS3 sequences for navigation and function
    /// keys, the single-byte editing keys, the X10 mouse introducer, and
    /// ESC+printable for every Alt chord.
    pub fn standard() -> Self {
        let mut t = Self::empty();

        // Arrows, both encodings.
        t.add(b"\x1b[A", Key::Up);
        t.add(b"\x1b[B", Key::Down);
        t.add(b"\x1b[C", Key::Right);
        t.add(b"\x1b[D", Key::Left);
        t.add(b"\x1bOA", Key::Up);
        t.add(b"\x1bOB", Key::Down);
        t.add(b"\x1bOC", Key::Right);
        t.add(b"\x1bOD", Key::Left);

        // Navigation block.
        t.add(b"\x1b[H", Key::Home);
        t.add(b"\x1b[F", Key::End);
        t.add(b"\x1bOH", Key::Home);
        t.add(b"\x1bOF", Key::End);
        t.add(b"\x1b[1~", Key::Home);
        t.add(b"\x1b[2~", Key::Insert);
        t.add(b"\x1b[3~", Key::Delete);
        t.add(b"\x1b[4~", Key::End);
        t.add(b"\x1b[5~", Key::PageUp);
        t.add(b"\x1b[6~", Key::PageDown);

        // Function keys: SS3 for F1-F4, CSI tilde for the rest and for the
        // alternate F1-F4 encoding.
        t.add(b"\x1bOP", Key::F(1));
        t.add(b"\x1bOQ", Key::F(2));
        t.add(b"\x1bOR", Key::F(3));
        t.add(b"\x1bOS", Key::F(4));
        t.add(b"\x1b[11~", Key::F(1));
        t.add(b"\x1b[12~", Key::F(2));
        t.add(b"\x1b[13~", Key::F(3));
        t.add(b"\x1b[14~", Key::F(4));
        t.add(b"\x1b[15~", Key::F(5));
        t.add(b"\x1b[17~", Key::F(6));
        t.add(b"\x1b[18~", Key::F(7));
        t.add(b"\x1b[19~", Key::F(8));
        t.add(b"\x1b[20~", Key::F(9));
        t.add(b"\x1b[21~", Key::F(10));
        t.add(b"\x1b[23~", Key::F(11));
        t.add(b"\x1b[24~", Key::F(12));

        // Single-byte editing keys.
        t.add(b"\r", Key::Enter);
        t.add(b"\n", Key::Enter);
        t.add(b"\t", Key::Tab);
        t.add(b"\x7f", Key::Backspace);
        t.add(b"\x08", Key::Backspace);

        // X10 mouse report introducer.
        t.add(b"\x1b[M", Key::MouseIntro);

        // Alt over the whole printable range. `ESC [` and `ESC O` are also
        // sequence prefixes; the ambiguity machinery sorts that out.
        for b in 0x20u8..=0x7e {
            t.add(&[0x1b, b], Key::Alt(b as char));
        }

        t
    }

    /// Register one sequence. Later entries never shadow earlier ones for
    /// exact matches; keep the table free of duplicate sequences.
    pub fn add(&mut self, seq: &[u8], key: Key) {
        self.entries.push((seq.to_vec(), key));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Survey the table against a buffer prefix: how many sequences could
    /// still match, and which key matches it exactly.
    fn survey(&self, prefix: &[u8]) -> (usize, Option<Key>) {
        let mut reachable = 0;
        let mut exact = None;
        for (seq, key) in &self.entries {
            if seq.starts_with(prefix) {
                reachable += 1;
                if seq.len() == prefix.len() {
                    exact = Some(*key);
                }
            }
        }
        (reachable, exact)
    }
}

// =============================================================================
// Decoder
// =============================================================================

/// What one resolution pass over the buffer concluded.
enum Step {
    /// Still ambiguous; wait for more bytes.
    Pending,
    /// Emit this key, consuming the given number of buffered bytes.
    Emit(Key, usize),
    /// No sequence fits at all; the first byte is a literal.
    Literal,
}

/// Streaming escape-sequence decoder.
///
/// Feed raw bytes, get zero or more keys per byte. State is only the byte
/// buffer; a bare ESC with no continuation stays buffered until the next
/// byte arrives, which is exactly how the table says to treat it.
pub struct KeyDecoder {
    table: Arc<KeyTable>,
    buf: Vec<u8>,
}

impl KeyDecoder {
    pub fn new(table: Arc<KeyTable>) -> Self {
        Self { table, buf: Vec::with_capacity(8) }
    }

    /// Bytes currently held back waiting for disambiguation.
    #[inline]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Feed one byte; returns every key it completed.
    pub fn feed(&mut self, byte: u8) -> Vec<Key> {
        self.buf.push(byte);
        let mut out = Vec::new();
        while !self.buf.is_empty() {
            match self.resolve() {
                Step::Pending => break,
                Step::Emit(key, consumed) => {
                    self.buf.drain(..consumed);
                    out.push(key);
                }
                Step::Literal => {
                    let b = self.buf.remove(0);
                    out.push(Key::Char(b as char));
                }
            }
        }
        out
    }

    /// Feed a whole read at once.
    pub fn feed_all(&mut self, bytes: &[u8]) -> Vec<Key> {
        let mut out = Vec::new();
        for &b in bytes {
            out.extend(self.feed(b));
        }
        out
    }

    /// Resolve the buffer against the table.
    ///
    /// Walks every prefix length, tracking the longest exact match. An
    /// exact match that is also the only reachable entry wins immediately;
    /// a length with no reachable entries is a dead end and falls back to
    /// the longest exact match, or to a literal byte when there is none.
    fn resolve(&self) -> Step {
        let mut longest_exact: Option<(usize, Key)> = None;
        for len in 1..=self.buf.len() {
            let prefix = &self.buf[..len];
            let (reachable, exact) = self.table.survey(prefix);
            if reachable == 0 {
                return match longest_exact {
                    Some((n, key)) => Step::Emit(key, n),
                    None => Step::Literal,
                };
            }
            if let Some(key) = exact {
                if reachable == 1 {
                    return Step::Emit(key, len);
                }
                longest_exact = Some((len, key));
            }
        }
        Step::Pending
    }
}

// =============================================================================
// Tests
// =============================================================================
