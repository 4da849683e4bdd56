use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::corpus::{Corpus, AUX_DIM};

/// One sliding-window training sample: a `seqlen` window of token
/// ids with their aux features, and the next token as the label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceSample {
    pub input_x: Vec<u32>,
    /// Flat [seqlen * AUX_DIM] row-major aux features
    pub input_aux: Vec<f32>,
    pub label: u32,
    /// Aux features of the label token — the out_aux training target
    pub label_aux: Vec<f32>,
}

/// Sliding windows over the corpus token stream. Window `i` covers
/// tokens `i..i+seqlen` and predicts token `i+seqlen`; the corpus
/// front padding means the first window is all padding ids.
pub struct SequenceDataset {
    corpus: Corpus,
    seqlen: usize,
}

impl SequenceDataset {
    pub fn new(corpus: Corpus, seqlen: usize) -> Self {
        Self { corpus, seqlen }
    }

    pub fn seqlen(&self) -> usize {
        self.seqlen
    }
}

impl Dataset<SequenceSample> for SequenceDataset {
    fn get(&self, index: usize) -> Option<SequenceSample> {
        let end = index + self.seqlen;
        if end >= self.corpus.len() {
            return None;
        }
        Some(SequenceSample {
            input_x: self.corpus.token_ids[index..end].to_vec(),
            input_aux: self.corpus.aux[index * AUX_DIM..end * AUX_DIM].to_vec(),
            label: self.corpus.token_ids[end],
            label_aux: self.corpus.aux_row(end).to_vec(),
        })
    }

    fn len(&self) -> usize {
        self.corpus.len().saturating_sub(self.seqlen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(ids: &[u32]) -> Corpus {
        let aux = ids.iter().flat_map(|&id| [id as f32, 0.0]).collect();
        Corpus { token_ids: ids.to_vec(), aux }
    }

    #[test]
    fn windows_predict_the_next_token() {
        let ds = SequenceDataset::new(corpus(&[0, 0, 5, 6, 7]), 2);
        assert_eq!(ds.len(), 3);

        let s = ds.get(1).unwrap();
        assert_eq!(s.input_x, vec![0, 5]);
        assert_eq!(s.label, 6);
        assert_eq!(s.label_aux, vec![6.0, 0.0]);
        assert_eq!(s.input_aux.len(), 2 * AUX_DIM);

        assert!(ds.get(3).is_none());
    }

    #[test]
    fn short_corpus_yields_no_samples() {
        let ds = SequenceDataset::new(corpus(&[1, 2]), 4);
        assert_eq!(ds.len(), 0);
        assert!(ds.get(0).is_none());
    }
}
