//! Sentence-boundary text chunker with character overlap.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters.
//! Consecutive chunks share up to `overlap` characters: each new chunk is
//! seeded with the tail of the chunk that was just closed.
//!
//! # Algorithm
//!
//! 1. Split text into sentences at terminal punctuation (`.`, `!`, `?`,
//!    `。`, `！`, `？`) followed by whitespace. The whitespace run stays
//!    attached to the sentence, so sentences concatenate back to the input.
//! 2. Accumulate sentences into a buffer until the next one would push the
//!    buffer past `chunk_size`.
//! 3. Close the buffer as a chunk and seed the next buffer with the closed
//!    chunk's last `overlap` characters, shortened if needed so that the
//!    seed plus the incoming sentence still fits in `chunk_size`.
//! 4. Any buffer longer than `chunk_size` (a single oversized sentence) is
//!    force-split: its first `chunk_size` characters become a chunk and the
//!    buffer continues from `chunk_size - overlap`.
//! 5. A non-empty trailing buffer becomes the final chunk.
//!
//! Lengths are counted in `char`s, never bytes. Whitespace-only input yields
//! zero chunks, and no emitted chunk is whitespace-only.
//!
//! # Example
//!
//! ```rust
//! use rag_harness_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("A cat sat on the mat. The cat was black and fast.", 30, 5);
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].index, 1);
//! assert!(chunks.iter().all(|c| c.text.chars().count() <= 30));
//! ```

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_OVERLAP: usize = 50;

const SENTENCE_TERMINATORS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// Split text into sentence-like units.
///
/// A unit ends after a terminator followed by a whitespace run; the
/// whitespace belongs to the unit it follows. Text without terminators is a
/// single unit.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((_, c)) = iter.next() {
        if !SENTENCE_TERMINATORS.contains(&c) {
            continue;
        }
        if !matches!(iter.peek(), Some((_, next)) if next.is_whitespace()) {
            continue;
        }
        let mut end = text.len();
        while let Some(&(i, next)) = iter.peek() {
            if !next.is_whitespace() {
                end = i;
                break;
            }
            iter.next();
        }
        sentences.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// `overlap` is clamped below `chunk_size`; a `chunk_size` of zero is treated
/// as one. Returned chunks have contiguous indices starting at 0 and ids
/// derived from those indices.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);

    let mut chunks = Vec::new();
    let mut buf: Vec<char> = Vec::new();
    let mut buf_start = 0usize;
    let mut pos = 0usize;

    for sentence in split_sentences(text) {
        let chars: Vec<char> = sentence.chars().collect();
        let len = chars.len();

        if !buf.is_empty() && buf.len() + len > chunk_size {
            push_chunk(&mut chunks, &buf, buf_start);
            let tail = if len <= chunk_size {
                overlap.min(chunk_size - len)
            } else {
                overlap
            }
            .min(buf.len());
            let cut = buf.len() - tail;
            buf.drain(..cut);
            buf_start += cut;
        } else if buf.is_empty() {
            buf_start = pos;
        }

        buf.extend_from_slice(&chars);
        pos += len;

        // Force-split anything still over the limit
        while buf.len() > chunk_size {
            push_chunk(&mut chunks, &buf[..chunk_size], buf_start);
            let step = chunk_size - overlap;
            buf.drain(..step);
            buf_start += step;
        }
    }

    if !buf.is_empty() {
        push_chunk(&mut chunks, &buf, buf_start);
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, chars: &[char], start: usize) {
    let text: String = chars.iter().collect();
    if text.trim().is_empty() {
        return;
    }
    let index = chunks.len();
    chunks.push(make_chunk(index, start, text));
}

/// Create a single [`Chunk`] with an index-derived id and SHA-256 content hash.
fn make_chunk(index: usize, start: usize, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: format!("chunk_{}", index),
        index,
        text,
        start,
        hash,
    }
}
