// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `sample`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::sample_use_case::SampleConfig;
use crate::application::train_use_case::TrainConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the next-word model on a directory of text files
    Train(TrainArgs),

    /// Load a trained checkpoint and build the full-vocabulary inference model
    Sample(SampleArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Newline-delimited word-frequency file used to map words to integer ids
    #[arg(long)]
    pub vocab_file: String,

    /// Convert words to lowercase before vocabulary lookup
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub vocab_is_lowercase: bool,

    /// File with pretrained word embeddings, one "word f1 .. fD" line per word
    /// (e.g. one of the GloVe text files)
    #[arg(long)]
    pub embedding_file: String,

    /// Dimensionality of the pretrained embedding vectors.
    /// Must match the provided embedding file, e.g. 300 for glove.6B.300d.txt
    #[arg(long)]
    pub embedding_dim: usize,

    /// Length of the input sequence of words to predict from
    #[arg(long, default_value_t = 64)]
    pub seqlen: usize,

    /// Only use this many words from the top of the vocabulary file
    #[arg(long, default_value_t = 10000)]
    pub vocab_size: usize,

    /// Sample size for negative sampling. Includes the positive example.
    #[arg(long, default_value_t = 10)]
    pub sample_size: usize,

    /// Hidden width of each of the two stacked LSTM layers
    #[arg(long, default_value_t = 256)]
    pub lstm_size: usize,

    /// Width of each dense layer after the recurrent stack
    #[arg(long, default_value_t = 256)]
    pub dense_size: usize,

    /// Number of stacked dense layers
    #[arg(long, default_value_t = 5)]
    pub dense_layers: usize,

    /// Dropout probability — randomly zeroes activations during training
    /// to prevent overfitting
    #[arg(long, default_value_t = 0.1)]
    pub dropout_rate: f64,

    /// Learning rate before any decay is applied
    #[arg(long, default_value_t = 0.01)]
    pub learning_rate_initial: f64,

    /// Multiplicative decay applied every decay period
    #[arg(long, default_value_t = 0.97)]
    pub learning_rate_decay_rate: f64,

    /// Number of epochs between learning-rate decay steps
    #[arg(long, default_value_t = 10)]
    pub learning_rate_decay_period: usize,

    /// Number of samples processed together in one forward pass
    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    /// Directory (or scheme://-prefixed remote location) for checkpoints
    #[arg(long)]
    pub checkpoint_dir: String,

    /// Optional checkpoint file to resume training from
    #[arg(long)]
    pub starting_model_file: Option<String>,

    /// Dir containing training data as text files.
    /// All files under this dir will be read recursively.
    #[arg(long)]
    pub training_data_dir: String,

    /// Train until this epoch number is reached
    #[arg(long, default_value_t = 5)]
    pub num_epochs: usize,

    /// Epoch number to resume counting from (affects learning-rate decay)
    #[arg(long, default_value_t = 0)]
    pub starting_epoch: usize,

    /// How many passes over the dataset one epoch is worth
    #[arg(long, default_value_t = 32)]
    pub epochs_per_dataset: usize,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            vocab_file:                 a.vocab_file,
            vocab_is_lowercase:         a.vocab_is_lowercase,
            embedding_file:             a.embedding_file,
            embedding_dim:              a.embedding_dim,
            seqlen:                     a.seqlen,
            vocab_size:                 a.vocab_size,
            sample_size:                a.sample_size,
            lstm_size:                  a.lstm_size,
            dense_size:                 a.dense_size,
            dense_layers:               a.dense_layers,
            dropout_rate:               a.dropout_rate,
            learning_rate_initial:      a.learning_rate_initial,
            learning_rate_decay_rate:   a.learning_rate_decay_rate,
            learning_rate_decay_period: a.learning_rate_decay_period,
            batch_size:                 a.batch_size,
            checkpoint_dir:             a.checkpoint_dir,
            starting_model_file:        a.starting_model_file,
            training_data_dir:          a.training_data_dir,
            num_epochs:                 a.num_epochs,
            starting_epoch:             a.starting_epoch,
            epochs_per_dataset:         a.epochs_per_dataset,
        }
    }
}

/// All arguments for the `sample` command
#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Vocabulary file — must be the same one used during training
    #[arg(long)]
    pub vocab_file: String,

    /// Convert words to lowercase before vocabulary lookup
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub vocab_is_lowercase: bool,

    /// Pretrained embedding file — must be the same one used during training
    #[arg(long)]
    pub embedding_file: String,

    /// Dimensionality of the pretrained embedding vectors
    #[arg(long)]
    pub embedding_dim: usize,

    /// Directory where train_config.json was saved during training
    #[arg(long)]
    pub checkpoint_dir: String,

    /// Checkpoint file (without the .mpk.gz extension) to load weights from
    #[arg(long)]
    pub model_file: String,
}

impl From<SampleArgs> for SampleConfig {
    fn from(a: SampleArgs) -> Self {
        SampleConfig {
            vocab_file:         a.vocab_file,
            vocab_is_lowercase: a.vocab_is_lowercase,
            embedding_file:     a.embedding_file,
            embedding_dim:      a.embedding_dim,
            checkpoint_dir:     a.checkpoint_dir,
            model_file:         a.model_file,
        }
    }
}
