use std::path::PathBuf;

use arcparse_core::ArcParseError;
use thiserror::Error;

/// Errors raised while configuring, running or checkpointing training.
#[derive(Debug, Error)]
pub enum TrainError {
    /// Only stochastic singleton replacement is implemented.
    #[error("unsupported unknown-word strategy {0} (only 1, stochastic singleton replacement, is available)")]
    UnsupportedUnkStrategy(u32),

    /// The replacement probability is not a probability.
    #[error("unk_prob must lie in [0, 1], got {0}")]
    UnkProbOutOfRange(f64),

    /// A reporting or validation interval of zero.
    #[error("{name} must be at least 1")]
    InvalidInterval { name: &'static str },

    /// Training and testing both need a development corpus.
    #[error("{mode} mode requires --dev-data")]
    MissingDevData { mode: &'static str },

    /// There is nothing to train on.
    #[error("training corpus is empty")]
    EmptyTrainingCorpus,

    /// A sentence could not be processed.
    #[error("{split} sentence {sentence}: {source}")]
    Sentence {
        split: &'static str,
        sentence: usize,
        #[source]
        source: ArcParseError,
    },

    /// The scorer reported a negative or NaN loss, which no probability model can.
    #[error("invalid loss {loss} on training sentence {sentence}")]
    NegativeLoss { sentence: usize, loss: f64 },

    /// Reading or writing a checkpoint failed.
    #[error("checkpoint I/O error at {path}: {source}")]
    CheckpointIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A checkpoint file is truncated or otherwise unreadable.
    #[error("corrupt checkpoint {path}: {message}")]
    CorruptCheckpoint { path: PathBuf, message: String },

    /// Stored parameters do not fit the model built from this vocabulary.
    #[error("parameter mismatch: {0}")]
    ParameterMismatch(String),

    /// Candle ML framework error.
    #[error("ML backend error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error(transparent)]
    Core(#[from] ArcParseError),
}

/// Result type alias for trainer operations.
pub type Result<T> = std::result::Result<T, TrainError>;

impl TrainError {
    /// Attach a sentence position to a core error.
    pub(crate) fn in_sentence(split: &'static str, sentence: usize) -> impl Fn(ArcParseError) -> Self {
        move |source| Self::Sentence {
            split,
            sentence,
            source,
        }
    }
}
