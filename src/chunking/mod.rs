//! Overlapping character-window chunking for long transcripts.
//!
//! Offsets are counted in Unicode scalar values, not bytes, so chunk sizes
//! mean the same thing for Japanese and English transcripts.

use crate::error::{Result, YtsumError};
use serde::{Deserialize, Serialize};

/// A contiguous window of the flattened transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of this chunk in the sequence, starting at 0.
    pub index: usize,
    /// Text content of this chunk.
    pub text: String,
    /// Inclusive start offset in characters.
    pub char_start: usize,
    /// Exclusive end offset in characters.
    pub char_end: usize,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

/// Configuration for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub max_chars: usize,
    /// Characters shared by consecutive chunks.
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 6000,
            overlap_chars: 300,
        }
    }
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        let config = Self {
            max_chars,
            overlap_chars,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(YtsumError::Config("chunk size must be at least 1 character".into()));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(YtsumError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }

    fn stride(&self) -> usize {
        self.max_chars - self.overlap_chars
    }
}

/// Lazily split `text` into overlapping chunks.
///
/// The returned iterator is `Clone`, so the same sequence can be replayed.
/// Empty input yields no chunks.
pub fn chunk_text<'a>(text: &'a str, config: &ChunkingConfig) -> Result<Chunks<'a>> {
    config.validate()?;
    Ok(Chunks {
        text,
        config: *config,
        next_byte: 0,
        next_char: 0,
        index: 0,
        done: text.is_empty(),
    })
}

/// Iterator over the chunks of one text.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    config: ChunkingConfig,
    next_byte: usize,
    next_char: usize,
    index: usize,
    done: bool,
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let rest = &self.text[self.next_byte..];
        let (window, char_len) = match rest.char_indices().nth(self.config.max_chars) {
            Some((end, _)) => (&rest[..end], self.config.max_chars),
            None => {
                // Final chunk: everything that is left.
                self.done = true;
                (rest, rest.chars().count())
            }
        };

        let chunk = Chunk {
            index: self.index,
            text: window.to_string(),
            char_start: self.next_char,
            char_end: self.next_char + char_len,
        };

        if !self.done {
            let stride = self.config.stride();
            // stride < max_chars, and rest has more than max_chars chars.
            let step_bytes = rest
                .char_indices()
                .nth(stride)
                .map(|(b, _)| b)
                .unwrap_or(rest.len());
            self.next_byte += step_bytes;
            self.next_char += stride;
        }
        self.index += 1;

        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(text: &str, max: usize, overlap: usize) -> Vec<Chunk> {
        chunk_text(text, &ChunkingConfig::new(max, overlap).unwrap())
            .unwrap()
            .collect()
    }

    /// Rebuild the source by dropping the shared prefix of every chunk after the first.
    fn reassemble(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_two_chunk_window() {
        let text = "a".repeat(100);
        let chunks = collect(&text, 60, 10);

        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].char_start, chunks[0].char_end), (0, 60));
        assert_eq!((chunks[1].char_start, chunks[1].char_end), (50, 100));
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_short_input_single_chunk() {
        let chunks = collect("hello", 60, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello");
        assert_eq!((chunks[0].char_start, chunks[0].char_end), (0, 5));
    }

    #[test]
    fn test_exact_size_input_single_chunk() {
        let text = "x".repeat(60);
        let chunks = collect(&text, 60, 10);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_empty_input_no_chunks() {
        assert!(collect("", 60, 10).is_empty());
    }

    #[test]
    fn test_invalid_config() {
        assert!(ChunkingConfig::new(10, 10).is_err());
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(chunk_text("abc", &ChunkingConfig { max_chars: 5, overlap_chars: 7 }).is_err());
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let text = "日本語のテキストです。とても長い文章。";
        let chunks = collect(text, 8, 2);

        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 8);
            let expected: String = text
                .chars()
                .skip(chunk.char_start)
                .take(chunk.char_len())
                .collect();
            assert_eq!(chunk.text, expected);
        }
        assert_eq!(reassemble(&chunks, 2), text);
    }

    #[test]
    fn test_reassembly_is_exact_for_all_shapes() {
        let alphabet: Vec<char> = "abcdefghijあいうえお0123456789 ".chars().collect();
        for len in 0..120 {
            let text: String = (0..len).map(|i| alphabet[(i * 7) % alphabet.len()]).collect();
            for max in 1..25 {
                for overlap in 0..max {
                    let chunks = collect(&text, max, overlap);
                    assert_eq!(reassemble(&chunks, overlap), text, "len={len} max={max} overlap={overlap}");

                    for pair in chunks.windows(2) {
                        assert_eq!(pair[0].char_end - pair[1].char_start, overlap);
                        assert_eq!(pair[0].char_len(), max);
                    }
                    if let Some(last) = chunks.last() {
                        assert_eq!(last.char_end, len);
                    }
                }
            }
        }
    }

    #[test]
    fn test_sequence_is_restartable_and_deterministic() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let config = ChunkingConfig::new(50, 5).unwrap();
        let iter = chunk_text(&text, &config).unwrap();

        let first: Vec<Chunk> = iter.clone().collect();
        let second: Vec<Chunk> = iter.collect();
        let third: Vec<Chunk> = chunk_text(&text, &config).unwrap().collect();

        assert_eq!(first, second);
        assert_eq!(first, third);
    }
}
