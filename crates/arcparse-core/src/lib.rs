//! # Arcparse Core
//!
//! The transition system and bookkeeping behind a shift-reduce dependency
//! parser: vocabulary ids, the oracle corpus loader, arc-standard legality,
//! replay of action sequences into trees, the scorer contract, and
//! evaluation/CoNLL output.
//!
//! ## Quick Start
//!
//! ```rust
//! use arcparse_core::{compute_heads, Corpus, Vocabulary};
//!
//! let text = "[][Dogs-NNS, bark-VBP, ROOT-ROOT]\nSHIFT\nSHIFT\nLEFT-ARC(nsubj)\nSHIFT\nLEFT-ARC(root)\n";
//! let mut vocab = Vocabulary::new();
//! let corpus = Corpus::read_training(text.as_bytes(), &mut vocab).unwrap();
//!
//! let sentence = corpus.get(0).unwrap();
//! let heads = compute_heads(sentence.len(), &sentence.actions, vocab.actions()).unwrap();
//! assert_eq!(heads, vec![1, 2]);
//! ```
pub mod action;
pub mod conll;
pub mod corpus;
pub mod decode;
pub mod error;
pub mod eval;
pub mod scorer;
pub mod transition;
pub mod vocab;

// Re-export primary API
pub use action::{Action, ActionKind, ActionTable};
pub use corpus::{Corpus, Sentence, Split};
pub use decode::{compute_heads, compute_tree, DependencyTree};
pub use error::{ArcParseError, DecodeError, Result};
pub use eval::{count_correct, AttachmentScore, LossSummary};
pub use scorer::{parse_sentence, Choice, ParseOutcome, Scorer, ScoringContext};
pub use transition::Configuration;
pub use vocab::{Category, Lexicon, Vocabulary, UNK_WORD};
