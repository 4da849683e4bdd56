// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Maps words to dense integer ids and back.
//
// Id layout (fixed once loaded, immutable afterwards):
//   0            → padding
//   1..=len      → words, in vocabulary-file order
//   len + 1      → unknown
//
// Every downstream shape — the embedding table's row count and
// the out_linear projection's output width — must equal
// total_slots() = len + 2. That invariant is checked once at
// model-build time, never at train time.
//
// Reference: Rust Book §8 (HashMaps), §9 (Error Handling)

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// An ordered, distinct word list with reserved padding and unknown slots.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    /// Words in file order; ids are positions + 1
    words: Vec<String>,

    /// Reverse lookup: word → id (1-based)
    index: HashMap<String, u32>,

    /// Fold words to lowercase before lookup
    lowercase: bool,
}

impl Vocabulary {
    /// Load the top `max_words` words from a newline-delimited
    /// word-frequency file. Only the first whitespace-separated
    /// field of each line is the word; anything after it
    /// (typically the frequency count) is ignored.
    pub fn load(path: impl AsRef<Path>, max_words: usize, lowercase: bool) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read vocabulary file '{}'", path.display()))?;

        let mut words = Vec::new();
        let mut index = HashMap::new();

        for line in text.lines() {
            if words.len() >= max_words {
                break;
            }
            let Some(word) = line.split_whitespace().next() else {
                continue; // blank line
            };
            let word = if lowercase { word.to_lowercase() } else { word.to_string() };
            if index.contains_key(&word) {
                continue; // already seen under this case folding
            }
            // ids are 1-based: slot 0 is reserved for padding
            index.insert(word.clone(), words.len() as u32 + 1);
            words.push(word);
        }

        anyhow::ensure!(
            !words.is_empty(),
            "Vocabulary file '{}' contains no words",
            path.display()
        );

        tracing::info!("Loaded vocabulary: {} words from '{}'", words.len(), path.display());
        Ok(Self { words, index, lowercase })
    }

    /// Number of distinct words (excluding padding and unknown slots)
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Width of every id-indexed table: words + padding + unknown
    pub fn total_slots(&self) -> usize {
        self.words.len() + 2
    }

    pub fn pad_id(&self) -> u32 {
        0
    }

    pub fn unknown_id(&self) -> u32 {
        self.words.len() as u32 + 1
    }

    /// Map a word to its id, folding case if configured.
    /// Words outside the vocabulary map to the unknown slot.
    pub fn id_of(&self, word: &str) -> u32 {
        let folded;
        let key = if self.lowercase {
            folded = word.to_lowercase();
            folded.as_str()
        } else {
            word
        };
        self.index.get(key).copied().unwrap_or_else(|| self.unknown_id())
    }

    /// Membership test under the configured case folding
    pub fn contains(&self, word: &str) -> bool {
        self.id_of(word) != self.unknown_id()
    }

    /// Map an id back to its word. Padding and unknown have no word.
    pub fn word_of(&self, id: u32) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.words.get(id as usize - 1).map(|s| s.as_str())
    }

    pub fn is_lowercase(&self) -> bool {
        self.lowercase
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_vocab(lines: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(lines.as_bytes()).unwrap();
        f
    }

    #[test]
    fn ids_are_one_based_with_reserved_slots() {
        let f = write_vocab("the 1000\nof 800\nand 600\n");
        let v = Vocabulary::load(f.path(), 100, true).unwrap();

        assert_eq!(v.len(), 3);
        assert_eq!(v.total_slots(), 5);
        assert_eq!(v.pad_id(), 0);
        assert_eq!(v.id_of("the"), 1);
        assert_eq!(v.id_of("and"), 3);
        assert_eq!(v.unknown_id(), 4);
        assert_eq!(v.id_of("zebra"), v.unknown_id());
    }

    #[test]
    fn truncates_to_top_n() {
        let f = write_vocab("a 5\nb 4\nc 3\nd 2\ne 1\n");
        let v = Vocabulary::load(f.path(), 2, true).unwrap();
        assert_eq!(v.len(), 2);
        assert!(v.contains("a"));
        assert!(!v.contains("c"));
    }

    #[test]
    fn case_folding_applies_to_lookup() {
        let f = write_vocab("hello 10\n");
        let folded = Vocabulary::load(f.path(), 10, true).unwrap();
        assert_eq!(folded.id_of("Hello"), 1);

        let exact = Vocabulary::load(f.path(), 10, false).unwrap();
        assert_eq!(exact.id_of("Hello"), exact.unknown_id());
    }

    #[test]
    fn word_of_round_trips() {
        let f = write_vocab("alpha 2\nbeta 1\n");
        let v = Vocabulary::load(f.path(), 10, true).unwrap();
        assert_eq!(v.word_of(1), Some("alpha"));
        assert_eq!(v.word_of(2), Some("beta"));
        assert_eq!(v.word_of(0), None);
        assert_eq!(v.word_of(v.unknown_id()), None);
    }
}
