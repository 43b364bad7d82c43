//! # Arcparse
//!
//! Shift-reduce dependency parsing. [`core`] holds the transition system,
//! corpus loading and evaluation; [`trainer`] holds the neural scorer,
//! checkpoints and the training loop.

pub use arcparse_core as core;
pub use arcparse_trainer as trainer;

pub use arcparse_core::{
    compute_heads, compute_tree, parse_sentence, Action, ActionTable, ArcParseError, Corpus,
    DependencyTree, Scorer, Sentence, Vocabulary,
};
pub use arcparse_trainer::{
    Checkpoint, NeuralScorer, ParserOptions, StopToken, TrainConfig, TrainError, Trainer,
};
