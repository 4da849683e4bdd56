// ============================================================
// Layer 5 — Language Model
// ============================================================
// Training graph:
//
//   input_x [b, seqlen] ──► frozen embedding ─┐
//                                             ├─► concat [b, seqlen, emb+aux]
//   input_aux [b, seqlen, aux] ───────────────┘
//        │
//        ▼
//   stacked LSTM layers (all but the last keep the sequence;
//   the last reduces to the final hidden step), each followed
//   by LayerNorm and Dropout
//        │
//        ▼
//   stacked dense ReLU layers, each followed by LayerNorm/Dropout
//        │
//        ├─► out_aux    (sigmoid, width aux_dim)
//        └─► out_linear (linear,  width |vocab|+2)
//                │
//                ▼ gather candidate coordinates, softmax, concat
//   training output [b, sample_size + aux_dim]
//
// out_linear is kept separate from the sampling head on purpose:
// training only ever backpropagates through the gathered candidate
// columns, yet the trained projection still covers the entire
// vocabulary, so InferenceModel can softmax it directly without
// any candidate inputs. The model exposes its sub-components as
// typed struct fields; nothing is looked up by layer name.
//
// Shape invariant, checked once at build time: the embedding
// table's row count and out_linear's output width must both equal
// |vocab| + 2 (slot 0 padding, slot |vocab|+1 unknown).
//
// Reference: Burn Book §3 (Modules)

use anyhow::{bail, Result};
use burn::{
    nn::{
        lstm::{Lstm, LstmConfig},
        Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{relu, sigmoid, softmax},
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::SequenceBatch;
use crate::ml::sampling::{candidate_softmax, gather_candidates};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct LanguageModelConfig {
    /// |vocab| + 2: padding slot plus unknown slot
    pub vocab_slots: usize,
    pub seqlen: usize,
    pub embedding_dim: usize,
    pub aux_dim: usize,
    /// Hidden width of each stacked recurrent layer, in order
    pub lstm_sizes: Vec<usize>,
    pub dense_size: usize,
    pub dense_layers: usize,
    pub dropout_rate: f64,
}

impl LanguageModelConfig {
    /// Build the training graph around a pretrained embedding table.
    ///
    /// Fails fast with a configuration error when the embedding
    /// shape disagrees with the vocabulary — this must never
    /// surface later as a train-time shape error.
    pub fn init<B: Backend>(
        &self,
        embeddings: Tensor<B, 2>,
        device: &B::Device,
    ) -> Result<LanguageModel<B>> {
        let [emb_rows, emb_cols] = embeddings.dims();
        if emb_rows != self.vocab_slots {
            bail!(
                "embedding table has {} rows but the vocabulary needs {} slots \
                 (|vocab| + padding + unknown)",
                emb_rows, self.vocab_slots
            );
        }
        if emb_cols != self.embedding_dim {
            bail!(
                "embedding table is {}-dimensional but embedding_dim is {}",
                emb_cols, self.embedding_dim
            );
        }
        if self.lstm_sizes.is_empty() {
            bail!("at least one recurrent layer is required");
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            bail!("dropout_rate {} is outside [0, 1)", self.dropout_rate);
        }

        let embedding = EmbeddingEncoder { weight: embeddings };

        let mut recurrent = Vec::with_capacity(self.lstm_sizes.len());
        let mut width = self.embedding_dim + self.aux_dim;
        for &size in &self.lstm_sizes {
            recurrent.push(RecurrentBlock {
                lstm: LstmConfig::new(width, size, true).init(device),
                norm: LayerNormConfig::new(size).init(device),
                dropout: DropoutConfig::new(self.dropout_rate).init(),
            });
            width = size;
        }

        let mut dense = Vec::with_capacity(self.dense_layers);
        for _ in 0..self.dense_layers {
            dense.push(DenseBlock {
                linear: LinearConfig::new(width, self.dense_size).init(device),
                norm: LayerNormConfig::new(self.dense_size).init(device),
                dropout: DropoutConfig::new(self.dropout_rate).init(),
            });
            width = self.dense_size;
        }

        let out_aux = LinearConfig::new(width, self.aux_dim).init(device);
        let out_linear = LinearConfig::new(width, self.vocab_slots).init(device);

        Ok(LanguageModel {
            embedding,
            recurrent,
            dense,
            out_aux,
            out_linear,
            vocab_slots: self.vocab_slots,
            aux_dim: self.aux_dim,
            seqlen: self.seqlen,
        })
    }
}

// ─── EmbeddingEncoder ─────────────────────────────────────────────────────────
/// Frozen pretrained embedding lookup. The table is a module
/// constant, not a Param: it receives no gradients and is not part
/// of the checkpoint record — inference rebuilds it from the same
/// embedding file.
#[derive(Module, Debug)]
pub struct EmbeddingEncoder<B: Backend> {
    pub weight: Tensor<B, 2>,
}

impl<B: Backend> EmbeddingEncoder<B> {
    /// ids: [batch, seqlen] → vectors: [batch, seqlen, embedding_dim]
    pub fn forward(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch, seqlen] = ids.dims();
        let [_, dim] = self.weight.dims();
        self.weight
            .clone()
            .select(0, ids.reshape([batch * seqlen]))
            .reshape([batch, seqlen, dim])
    }
}

// ─── RecurrentBlock ───────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct RecurrentBlock<B: Backend> {
    pub lstm: Lstm<B>,
    pub norm: LayerNorm<B>,
    pub dropout: Dropout,
}

impl<B: Backend> RecurrentBlock<B> {
    /// Keep the full hidden sequence — used by every layer that
    /// feeds another recurrent layer.
    pub fn forward_sequence(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let (hidden, _state) = self.lstm.forward(x, None);
        self.dropout.forward(self.norm.forward(hidden))
    }

    /// Reduce to the final hidden step — used by the last layer only.
    pub fn forward_final(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let (hidden, _state) = self.lstm.forward(x, None);
        let [batch, seqlen, width] = hidden.dims();
        let last = hidden
            .slice([0..batch, seqlen - 1..seqlen, 0..width])
            .reshape([batch, width]);
        self.dropout.forward(self.norm.forward(last))
    }
}

// ─── DenseBlock ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    pub linear: Linear<B>,
    pub norm: LayerNorm<B>,
    pub dropout: Dropout,
}

impl<B: Backend> DenseBlock<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.dropout.forward(self.norm.forward(relu(self.linear.forward(x))))
    }
}

// ─── LanguageModel ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct LanguageModel<B: Backend> {
    pub embedding: EmbeddingEncoder<B>,
    pub recurrent: Vec<RecurrentBlock<B>>,
    pub dense: Vec<DenseBlock<B>>,
    pub out_aux: Linear<B>,
    pub out_linear: Linear<B>,
    pub vocab_slots: usize,
    pub aux_dim: usize,
    pub seqlen: usize,
}

/// Pre-concatenation training outputs, kept separate so the loss
/// can use raw candidate logits while the training output contract
/// exposes probabilities.
pub struct TrainStepOutput<B: Backend> {
    /// Gathered candidate logits — [batch, sample_size]
    pub candidate_logits: Tensor<B, 2>,
    /// Sigmoid aux predictions — [batch, aux_dim]
    pub aux_probs: Tensor<B, 2>,
}

impl<B: Backend> LanguageModel<B> {
    /// Shared encoder path: embed, concat aux, recurrent stack,
    /// dense stack. Returns [batch, width] features.
    pub fn forward_features(
        &self,
        input_x: Tensor<B, 2, Int>,
        input_aux: Tensor<B, 3>,
    ) -> Tensor<B, 2> {
        let embedded = self.embedding.forward(input_x);
        let mut x = Tensor::cat(vec![embedded, input_aux], 2);

        let last = self.recurrent.len() - 1;
        for block in &self.recurrent[..last] {
            x = block.forward_sequence(x);
        }
        let mut features = self.recurrent[last].forward_final(x);

        for block in &self.dense {
            features = block.forward(features);
        }
        features
    }

    /// Full-vocabulary logits — [batch, |vocab|+2]
    pub fn full_vocab_logits(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.out_linear.forward(features)
    }

    /// Candidate logits and aux predictions for one training step.
    pub fn forward_step(
        &self,
        input_x: Tensor<B, 2, Int>,
        input_aux: Tensor<B, 3>,
        candidate_indices: Tensor<B, 3, Int>,
    ) -> TrainStepOutput<B> {
        let features = self.forward_features(input_x, input_aux);
        let logits = self.full_vocab_logits(features.clone());
        TrainStepOutput {
            candidate_logits: gather_candidates(logits, candidate_indices),
            aux_probs: sigmoid(self.out_aux.forward(features)),
        }
    }

    /// The training output contract: softmax over the gathered
    /// candidates (slot order as supplied by the feeder)
    /// concatenated with the aux sigmoid output.
    /// Width: sample_size + aux_dim.
    pub fn forward_train(
        &self,
        input_x: Tensor<B, 2, Int>,
        input_aux: Tensor<B, 3>,
        candidate_indices: Tensor<B, 3, Int>,
    ) -> Tensor<B, 2> {
        let out = self.forward_step(input_x, input_aux, candidate_indices);
        Tensor::cat(vec![softmax(out.candidate_logits, 1), out.aux_probs], 1)
    }

    /// Derive the inference view. The view clones the module tree,
    /// which shares (does not copy) the underlying parameter
    /// tensors — but it is a snapshot of the handles: derive it
    /// again after further training steps replace the parameters.
    pub fn inference_view(&self) -> InferenceModel<B> {
        InferenceModel { model: self.clone() }
    }

    /// Cross-entropy over the candidate logits against the positive
    /// slot, plus binary cross-entropy on the aux predictions.
    pub fn forward_loss(&self, batch: SequenceBatch<B>) -> Tensor<B, 1>
    where
        B: AutodiffBackend,
    {
        let out = self.forward_step(batch.input_x, batch.input_aux, batch.candidate_indices);

        let ce = burn::nn::loss::CrossEntropyLossConfig::new()
            .init(&out.candidate_logits.device());
        let candidate_loss = ce.forward(out.candidate_logits, batch.positive_slot);

        // BCE on probabilities, clamped away from 0/1 for finite logs
        let p = out.aux_probs.clamp(1e-7, 1.0 - 1e-7);
        let t = batch.aux_targets;
        let aux_loss = (t.clone() * p.clone().log()
            + (t.ones_like() - t) * (p.ones_like() - p).log())
        .mean()
        .neg();

        candidate_loss + aux_loss
    }
}

// ─── InferenceModel ───────────────────────────────────────────────────────────
/// Deployment view over a trained LanguageModel. Takes only the
/// two non-candidate inputs and softmaxes out_linear over the
/// entire vocabulary — no gather, no sampling. Output width is
/// |vocab| + 2 + aux_dim, independent of the training sample_size.
#[derive(Debug, Clone)]
pub struct InferenceModel<B: Backend> {
    model: LanguageModel<B>,
}

impl<B: Backend> InferenceModel<B> {
    pub fn forward(&self, input_x: Tensor<B, 2, Int>, input_aux: Tensor<B, 3>) -> Tensor<B, 2> {
        let features = self.model.forward_features(input_x, input_aux);
        let vocab_probs = softmax(self.model.full_vocab_logits(features.clone()), 1);
        let aux_probs = sigmoid(self.model.out_aux.forward(features));
        Tensor::cat(vec![vocab_probs, aux_probs], 1)
    }

    pub fn output_width(&self) -> usize {
        self.model.vocab_slots + self.model.aux_dim
    }

    pub fn seqlen(&self) -> usize {
        self.model.seqlen
    }

    pub fn aux_dim(&self) -> usize {
        self.model.aux_dim
    }
}
