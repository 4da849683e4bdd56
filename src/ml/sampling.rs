// ============================================================
// Layer 5 — Negative-Sampling Head
// ============================================================
// Reduces the full-vocabulary classification problem to a small
// per-example candidate set. Instead of a dense softmax over
// |vocab|+2 logits, we gather the `sample_size` logits the feeder
// asked for and softmax over those — so backpropagation touches
// only `sample_size` columns of the output projection per example
// per step.
//
// The gather is pure and order-preserving: slot i of the output is
// exactly the logit at (example_row, vocab_id) = candidates[i].
// No sorting, no deduplication. Whatever slot the feeder put the
// positive candidate at is where its probability comes out, which
// is what makes the positive-slot index a valid loss target.
//
// Coordinates outside the batch or vocabulary range are a feeder
// contract violation; the gather result for such input is
// undefined (backend-dependent), not validated here.

use burn::prelude::*;
use burn::tensor::activation::softmax;

/// Gather per-example candidate logits from the full-vocabulary
/// logit matrix.
///
/// `logits`:     [batch, width] full-vocabulary logits
/// `candidates`: [batch, sample_size, 2] of (example_row, vocab_id)
///
/// Returns [batch, sample_size], caller order preserved.
///
/// Both coordinates are honored, so a pair may reference a row
/// other than its own: the pairs are flattened to `row * width +
/// col` and gathered from the flattened logit matrix.
pub fn gather_candidates<B: Backend>(
    logits: Tensor<B, 2>,
    candidates: Tensor<B, 3, Int>,
) -> Tensor<B, 2> {
    let [batch, width] = logits.dims();
    let [cand_batch, sample_size, _pair] = candidates.dims();

    let rows = candidates
        .clone()
        .slice([0..cand_batch, 0..sample_size, 0..1])
        .reshape([cand_batch, sample_size]);
    let cols = candidates
        .slice([0..cand_batch, 0..sample_size, 1..2])
        .reshape([cand_batch, sample_size]);

    let flat_indices = rows
        .mul_scalar(width as i64)
        .add(cols)
        .reshape([cand_batch * sample_size]);

    logits
        .reshape([batch * width])
        .gather(0, flat_indices)
        .reshape([cand_batch, sample_size])
}

/// Gather candidate logits and softmax over the `sample_size`
/// width. Each output row sums to 1 regardless of |vocab|.
pub fn candidate_softmax<B: Backend>(
    logits: Tensor<B, 2>,
    candidates: Tensor<B, 3, Int>,
) -> Tensor<B, 2> {
    softmax(gather_candidates(logits, candidates), 1)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn logits(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 2> {
        // 2 examples, vocabulary width 5; value encodes (row, col) as 10r + c
        Tensor::<TestBackend, 1>::from_floats(
            [0.0, 1.0, 2.0, 3.0, 4.0, 10.0, 11.0, 12.0, 13.0, 14.0].as_slice(),
            device,
        )
        .reshape([2, 5])
    }

    fn candidates(
        pairs: &[i32],
        sample_size: usize,
        device: &<TestBackend as Backend>::Device,
    ) -> Tensor<TestBackend, 3, Int> {
        Tensor::<TestBackend, 1, Int>::from_ints(pairs, device).reshape([2, sample_size, 2])
    }

    #[test]
    fn gather_preserves_coordinates_and_order() {
        let device = Default::default();
        // deliberately unsorted columns, with one cross-row reference
        let cand = candidates(
            &[0, 3, 0, 0, 1, 4, 1, 2, 1, 0, 0, 2],
            3,
            &device,
        );
        let out = gather_candidates(logits(&device), cand);

        assert_eq!(out.dims(), [2, 3]);
        let values: Vec<f32> = out.into_data().to_vec().unwrap();
        assert_eq!(values, vec![3.0, 0.0, 14.0, 12.0, 10.0, 2.0]);
    }

    #[test]
    fn gather_keeps_duplicate_slots() {
        let device = Default::default();
        let cand = candidates(&[0, 1, 0, 1, 1, 3, 1, 3], 2, &device);
        let out = gather_candidates(logits(&device), cand);
        let values: Vec<f32> = out.into_data().to_vec().unwrap();
        assert_eq!(values, vec![1.0, 1.0, 13.0, 13.0]);
    }

    #[test]
    fn candidate_softmax_rows_sum_to_one() {
        let device = Default::default();
        let cand = candidates(&[0, 0, 0, 2, 0, 4, 1, 1, 1, 3, 1, 0], 3, &device);
        let probs = candidate_softmax(logits(&device), cand);

        let sums: Vec<f32> = probs.sum_dim(1).into_data().to_vec().unwrap();
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5, "row sum {s} != 1");
        }
    }
}
