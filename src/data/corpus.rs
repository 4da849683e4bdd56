// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads every text file under a directory (recursively), splits
// the text into word and punctuation tokens, and maps each token
// to a vocabulary id plus a small auxiliary feature vector.
//
// Auxiliary features per token (AUX_DIM = 2):
//   [0] unknown flag     — 1.0 if the word is outside the vocabulary
//   [1] capitalized flag — 1.0 if the original spelling starts uppercase
//
// Case folding for the id lookup loses exactly the information the
// aux features preserve, which is why the model both consumes them
// per input token and predicts them for the next token.
//
// The token stream is front-padded with `pad` padding ids so the
// first window predicts the first real token of the corpus.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::vocabulary::Vocabulary;

/// Width of the per-token auxiliary feature vector
pub const AUX_DIM: usize = 2;

/// The tokenized corpus: one id and one AUX_DIM-wide feature row
/// per token, aux stored flat in row-major order.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub token_ids: Vec<u32>,
    pub aux: Vec<f32>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Aux features of token `i`
    pub fn aux_row(&self, i: usize) -> &[f32] {
        &self.aux[i * AUX_DIM..(i + 1) * AUX_DIM]
    }
}

/// Load every file under `dir` recursively, in sorted path order
/// so runs are reproducible across filesystems.
pub fn load_corpus(dir: impl AsRef<Path>, vocab: &Vocabulary, pad: usize) -> Result<Corpus> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    collect_files(dir, &mut files)
        .with_context(|| format!("Cannot read training data dir '{}'", dir.display()))?;
    files.sort();

    anyhow::ensure!(
        !files.is_empty(),
        "No training files found under '{}'",
        dir.display()
    );

    let mut corpus = Corpus {
        token_ids: vec![0; pad],
        aux: vec![0.0; pad * AUX_DIM],
    };

    for path in &files {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read training file '{}'", path.display()))?;
        append_tokens(&text, vocab, &mut corpus);
    }

    tracing::info!(
        "Loaded corpus: {} tokens from {} files (plus {} padding)",
        corpus.len() - pad, files.len(), pad
    );
    Ok(corpus)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Tokenize `text` and append ids + aux features to the corpus.
/// Alphanumeric runs (with inner apostrophes) form word tokens;
/// any other non-whitespace character is a single-char token.
pub fn append_tokens(text: &str, vocab: &Vocabulary, corpus: &mut Corpus) {
    for raw in split_tokens(text) {
        let id = vocab.id_of(raw);
        let unknown = if id == vocab.unknown_id() { 1.0 } else { 0.0 };
        let capitalized = if raw.chars().next().is_some_and(|c| c.is_uppercase()) {
            1.0
        } else {
            0.0
        };
        corpus.token_ids.push(id);
        corpus.aux.push(unknown);
        corpus.aux.push(capitalized);
    }
}

fn split_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        if c.is_alphanumeric() || c == '\'' {
            if start.is_none() {
                start = Some(i);
            }
        } else {
            if let Some(s) = start.take() {
                tokens.push(&text[s..i]);
            }
            if !c.is_whitespace() {
                tokens.push(&text[i..i + c.len_utf8()]);
            }
        }
    }
    if let Some(s) = start {
        tokens.push(&text[s..]);
    }
    tokens
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vocab() -> Vocabulary {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"the 3\ncat 2\nsat 1\n").unwrap();
        Vocabulary::load(f.path(), 100, true).unwrap()
    }

    #[test]
    fn splits_words_and_punctuation() {
        assert_eq!(split_tokens("The cat, sat."), vec!["The", "cat", ",", "sat", "."]);
        assert_eq!(split_tokens("don't stop"), vec!["don't", "stop"]);
    }

    #[test]
    fn aux_flags_mark_unknown_and_capitalized() {
        let v = vocab();
        let mut c = Corpus { token_ids: vec![], aux: vec![] };
        append_tokens("The zebra sat", &v, &mut c);

        assert_eq!(c.token_ids[0], v.id_of("the"));
        assert_eq!(c.aux_row(0), &[0.0, 1.0]); // known, capitalized
        assert_eq!(c.token_ids[1], v.unknown_id());
        assert_eq!(c.aux_row(1), &[1.0, 0.0]); // unknown, lowercase
        assert_eq!(c.aux_row(2), &[0.0, 0.0]); // known, lowercase
    }

    #[test]
    fn front_padding_precedes_first_token() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "the cat").unwrap();

        let v = vocab();
        let c = load_corpus(dir.path(), &v, 4).unwrap();
        assert_eq!(&c.token_ids[..4], &[0, 0, 0, 0]);
        assert_eq!(c.token_ids[4], v.id_of("the"));
        assert_eq!(c.len(), 6);
    }

    #[test]
    fn reads_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "the").unwrap();
        fs::write(dir.path().join("sub").join("b.txt"), "cat").unwrap();

        let v = vocab();
        let c = load_corpus(dir.path(), &v, 0).unwrap();
        assert_eq!(c.len(), 2);
    }
}
