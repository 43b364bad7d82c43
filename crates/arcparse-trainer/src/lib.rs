//! # Arcparse Trainer
//!
//! Trains a neural action scorer against oracle corpora loaded by
//! `arcparse-core`, checkpoints the best model by validation UAS and
//! decodes test data to CoNLL.

pub mod checkpoint;
pub mod error;
pub mod model;
pub mod options;
pub mod stop;
pub mod trainer;
pub mod unk;

pub use checkpoint::{link_latest, resolve_options, Checkpoint, Checkpointable, StoredTensor, LATEST_ALIAS};
pub use error::{Result, TrainError};
pub use model::{ModelDims, NeuralScorer};
pub use options::{ParserOptions, TrainConfig};
pub use stop::{StopRequest, StopToken};
pub use trainer::{EvalReport, TrainSummary, Trainer};
pub use unk::{UnkReplacer, VocabStats};
