//! Unknown-word handling: singleton replacement during training and
//! training-vocabulary restriction during evaluation.

use std::collections::{HashMap, HashSet};

use arcparse_core::{Corpus, UNK_WORD};

/// Word statistics gathered from the training corpus.
#[derive(Debug, Clone, Default)]
pub struct VocabStats {
    training_vocab: HashSet<u32>,
    singletons: HashSet<u32>,
}

impl VocabStats {
    /// Collect the word ids seen in `corpus`. Singletons (words occurring
    /// exactly once) are only tracked when `with_singletons` is set.
    pub fn from_corpus(corpus: &Corpus, with_singletons: bool) -> Self {
        let mut counts: HashMap<u32, usize> = HashMap::new();
        for sentence in corpus.iter() {
            for &word in &sentence.words[..sentence.content_len()] {
                *counts.entry(word).or_default() += 1;
            }
        }

        let singletons = if with_singletons {
            counts
                .iter()
                .filter(|&(_, &n)| n == 1)
                .map(|(&word, _)| word)
                .collect()
        } else {
            HashSet::new()
        };

        Self {
            training_vocab: counts.into_keys().collect(),
            singletons,
        }
    }

    pub fn is_singleton(&self, word: u32) -> bool {
        self.singletons.contains(&word)
    }

    pub fn in_training(&self, word: u32) -> bool {
        self.training_vocab.contains(&word)
    }

    pub fn singleton_count(&self) -> usize {
        self.singletons.len()
    }

    /// Map every content word not seen in training to `<UNK>`.
    /// The trailing root token is left alone.
    pub fn restrict(&self, words: &[u32]) -> Vec<u32> {
        let content = words.len().saturating_sub(1);
        words
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                if i < content && !self.in_training(w) {
                    UNK_WORD
                } else {
                    w
                }
            })
            .collect()
    }
}

/// Stochastic singleton replacement.
pub struct UnkReplacer {
    prob: f64,
    rng: oorandom::Rand64,
}

impl UnkReplacer {
    pub fn new(prob: f64, seed: u64) -> Self {
        Self {
            prob,
            rng: oorandom::Rand64::new(u128::from(seed)),
        }
    }

    /// Copy `words`, replacing each singleton with `<UNK>` with the
    /// configured probability.
    pub fn replace(&mut self, words: &[u32], stats: &VocabStats) -> Vec<u32> {
        words
            .iter()
            .map(|&w| {
                if stats.is_singleton(w) && self.rng.rand_float() < self.prob {
                    UNK_WORD
                } else {
                    w
                }
            })
            .collect()
    }
}
