// ============================================================
// Layer 4 — Sequence Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<SequenceSample>
// into device tensors, and owns the negative-sampling
// candidate-selection policy.
//
// Candidate policy, per example:
//   - one slot, chosen uniformly at random, holds the true
//     next-word id (the positive candidate);
//   - every other slot holds a vocabulary id drawn uniformly from
//     1..total_slots (padding is never offered as a candidate).
//
// Each candidate is emitted as an explicit (example_row, vocab_id)
// coordinate pair. The model's sampling head gathers exactly those
// coordinates from the full-vocabulary logit matrix, preserving
// slot order, so the positive slot index recorded here is the
// cross-entropy target downstream.
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};
use rand::Rng;

use crate::data::corpus::AUX_DIM;
use crate::data::dataset::SequenceSample;

// ─── SequenceBatch ────────────────────────────────────────────────────────────
/// A batch of sequence samples ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct SequenceBatch<B: Backend> {
    /// Token id windows — shape: [batch_size, seqlen]
    pub input_x: Tensor<B, 2, Int>,

    /// Per-token aux features — shape: [batch_size, seqlen, AUX_DIM]
    pub input_aux: Tensor<B, 3>,

    /// Candidate coordinates — shape: [batch_size, sample_size, 2],
    /// each pair is (example_row, vocab_id)
    pub candidate_indices: Tensor<B, 3, Int>,

    /// Which candidate slot holds the true label — shape: [batch_size]
    pub positive_slot: Tensor<B, 1, Int>,

    /// Aux features of the label token — shape: [batch_size, AUX_DIM]
    pub aux_targets: Tensor<B, 2>,
}

// ─── SequenceBatcher ──────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct SequenceBatcher<B: Backend> {
    pub device: B::Device,
    pub sample_size: usize,
    /// Full output width: |vocab| + 2 (padding + unknown)
    pub vocab_slots: usize,
}

impl<B: Backend> SequenceBatcher<B> {
    /// Contract: `sample_size >= 1` (the positive candidate always
    /// takes one slot) and `vocab_slots >= 3` (at least one real
    /// word besides padding and unknown). The train use case
    /// validates the sample size before any data is loaded, and
    /// `Vocabulary::load` rejects empty vocabularies.
    pub fn new(device: B::Device, sample_size: usize, vocab_slots: usize) -> Self {
        debug_assert!(sample_size >= 1);
        debug_assert!(vocab_slots >= 3);
        Self { device, sample_size, vocab_slots }
    }
}

impl<B: Backend> Batcher<SequenceSample, SequenceBatch<B>> for SequenceBatcher<B> {
    fn batch(&self, items: Vec<SequenceSample>) -> SequenceBatch<B> {
        let batch_size = items.len();
        let seqlen = items[0].input_x.len();
        let mut rng = rand::thread_rng();

        let mut x_flat = Vec::with_capacity(batch_size * seqlen);
        let mut aux_flat = Vec::with_capacity(batch_size * seqlen * AUX_DIM);
        let mut cand_flat = Vec::with_capacity(batch_size * self.sample_size * 2);
        let mut slots = Vec::with_capacity(batch_size);
        let mut target_flat = Vec::with_capacity(batch_size * AUX_DIM);

        for (row, item) in items.iter().enumerate() {
            x_flat.extend(item.input_x.iter().map(|&id| id as i32));
            aux_flat.extend_from_slice(&item.input_aux);
            target_flat.extend_from_slice(&item.label_aux);

            let positive = rng.gen_range(0..self.sample_size);
            slots.push(positive as i32);

            for slot in 0..self.sample_size {
                let vocab_id = if slot == positive {
                    item.label
                } else {
                    rng.gen_range(1..self.vocab_slots as u32)
                };
                cand_flat.push(row as i32);
                cand_flat.push(vocab_id as i32);
            }
        }

        let input_x = Tensor::<B, 1, Int>::from_ints(x_flat.as_slice(), &self.device)
            .reshape([batch_size, seqlen]);

        let input_aux = Tensor::<B, 1>::from_floats(aux_flat.as_slice(), &self.device)
            .reshape([batch_size, seqlen, AUX_DIM]);

        let candidate_indices =
            Tensor::<B, 1, Int>::from_ints(cand_flat.as_slice(), &self.device)
                .reshape([batch_size, self.sample_size, 2]);

        let positive_slot = Tensor::<B, 1, Int>::from_ints(slots.as_slice(), &self.device);

        let aux_targets = Tensor::<B, 1>::from_floats(target_flat.as_slice(), &self.device)
            .reshape([batch_size, AUX_DIM]);

        SequenceBatch { input_x, input_aux, candidate_indices, positive_slot, aux_targets }
    }
}
