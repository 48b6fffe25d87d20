//! Sentence-boundary chunking over a growing text stream.
//!
//! A boundary is one of `.`, `!`, `?` immediately followed by whitespace.
//! Each completed unit extends through its boundary punctuation and the
//! whitespace run after it, so concatenating consecutive units reproduces
//! the input byte-for-byte. The trailing fragment with no boundary is held
//! back: the stream may still extend it, and the caller's cursor simply
//! does not advance past it.

/// Result of scanning a fragment for completed units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Completed units in order, each ending after a boundary.
    pub units: Vec<String>,
    /// Bytes of the fragment covered by `units`. The remainder
    /// `fragment[consumed..]` is the held-back tail.
    pub consumed: usize,
}

impl ChunkOutcome {
    fn empty() -> Self {
        Self {
            units: Vec::new(),
            consumed: 0,
        }
    }
}

/// Split a fragment into completed sentence units and a held-back tail.
///
/// Empty input and input without any boundary yield no units; the whole
/// fragment is then the held-back tail.
pub fn split_completed(fragment: &str) -> ChunkOutcome {
    if fragment.is_empty() {
        return ChunkOutcome::empty();
    }

    let mut units = Vec::new();
    let mut unit_start = 0usize;
    let mut iter = fragment.char_indices().peekable();

    while let Some((index, ch)) = iter.next() {
        if !is_boundary_char(ch) {
            continue;
        }
        match iter.peek() {
            Some(&(_, next)) if next.is_whitespace() => {
                // Consume the whole whitespace run so units stay gap-free.
                let mut end = index + ch.len_utf8();
                while let Some(&(ws_index, ws)) = iter.peek() {
                    if ws.is_whitespace() {
                        end = ws_index + ws.len_utf8();
                        iter.next();
                    } else {
                        break;
                    }
                }
                units.push(fragment[unit_start..end].to_string());
                unit_start = end;
            }
            _ => {
                // Punctuation at end of input or mid-token ("3.14", "e.g.x")
                // is not a boundary; the stream may still extend it.
            }
        }
    }

    ChunkOutcome {
        units,
        consumed: unit_start,
    }
}

fn is_boundary_char(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}
