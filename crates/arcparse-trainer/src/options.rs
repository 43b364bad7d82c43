//! Network hyperparameters and training-loop settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};

/// Hyperparameters of the scoring network.
///
/// Stored in every checkpoint; a loaded checkpoint's options win over the
/// ones requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserOptions {
    /// Make POS tags visible to the scorer.
    pub use_pos: bool,
    /// Number of hidden layers.
    pub layers: usize,
    /// Word embedding width.
    pub input_dim: usize,
    /// Hidden layer width.
    pub hidden_dim: usize,
    /// Previous-action embedding width.
    pub action_dim: usize,
    /// Width of the composed token representation.
    pub lstm_input_dim: usize,
    /// POS embedding width.
    pub pos_dim: usize,
    /// Relation embedding width.
    pub rel_dim: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            use_pos: false,
            layers: 2,
            input_dim: 32,
            hidden_dim: 64,
            action_dim: 16,
            lstm_input_dim: 60,
            pos_dim: 12,
            rel_dim: 10,
        }
    }
}

impl ParserOptions {
    /// Checkpoint file name for these options and process id, e.g.
    /// `parser_pos_2_32_64_16_60_12_10-pid4242.params`.
    pub fn checkpoint_name(&self, pid: u32) -> String {
        format!(
            "parser_{}_{}_{}_{}_{}_{}_{}_{}-pid{}.params",
            if self.use_pos { "pos" } else { "nopos" },
            self.layers,
            self.input_dim,
            self.hidden_dim,
            self.action_dim,
            self.lstm_input_dim,
            self.pos_dim,
            self.rel_dim,
            pid
        )
    }
}

/// Settings of the training loop itself.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Unknown-word strategy; only `1` is supported.
    pub unk_strategy: u32,
    /// Probability of replacing a singleton with `<UNK>`.
    pub unk_prob: f64,
    /// Sentences per status report (clamped to the training set size).
    pub status_every: usize,
    /// Validate on report 1 and every `validate_every` reports after it.
    pub validate_every: usize,
    pub learning_rate: f64,
    /// Learning rate becomes `learning_rate / (1 + epoch * eta_decay)`.
    pub eta_decay: f64,
    /// Seed for shuffling and unknown-word draws.
    pub seed: u64,
    /// Stop after this many epochs; `None` trains until interrupted.
    pub max_epochs: Option<usize>,
    /// Directory receiving checkpoints and the `latest_model.params` alias.
    pub output_dir: PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            unk_strategy: 1,
            unk_prob: 0.2,
            status_every: 100,
            validate_every: 25,
            learning_rate: 0.1,
            eta_decay: 0.08,
            seed: 0x5eed,
            max_epochs: None,
            output_dir: PathBuf::from("."),
        }
    }
}

impl TrainConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unk_strategy(mut self, strategy: u32) -> Self {
        self.unk_strategy = strategy;
        self
    }

    pub fn with_unk_prob(mut self, prob: f64) -> Self {
        self.unk_prob = prob;
        self
    }

    pub fn with_status_every(mut self, sentences: usize) -> Self {
        self.status_every = sentences;
        self
    }

    pub fn with_validate_every(mut self, reports: usize) -> Self {
        self.validate_every = reports;
        self
    }

    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    pub fn with_eta_decay(mut self, decay: f64) -> Self {
        self.eta_decay = decay;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_epochs(mut self, epochs: Option<usize>) -> Self {
        self.max_epochs = epochs;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.unk_strategy != 1 {
            return Err(TrainError::UnsupportedUnkStrategy(self.unk_strategy));
        }
        if !(0.0..=1.0).contains(&self.unk_prob) {
            return Err(TrainError::UnkProbOutOfRange(self.unk_prob));
        }
        if self.status_every == 0 {
            return Err(TrainError::InvalidInterval {
                name: "status_every",
            });
        }
        if self.validate_every == 0 {
            return Err(TrainError::InvalidInterval {
                name: "validate_every",
            });
        }
        if self.max_epochs == Some(0) {
            return Err(TrainError::InvalidInterval { name: "max_epochs" });
        }
        Ok(())
    }
}
