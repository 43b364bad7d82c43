//! # Evaluation
//!
//! Attachment accuracy and loss summaries. Both aggregate raw counts across
//! a split; ratios are only taken at reporting time.

use crate::error::{ArcParseError, Result};

/// Number of tokens whose predicted head equals the gold head.
pub fn count_correct(gold: &[usize], predicted: &[usize]) -> Result<usize> {
    if gold.len() != predicted.len() {
        return Err(ArcParseError::LengthMismatch {
            gold: gold.len(),
            predicted: predicted.len(),
        });
    }
    Ok(gold.iter().zip(predicted).filter(|(g, p)| g == p).count())
}

/// Unlabeled attachment counts summed over sentences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachmentScore {
    pub correct: usize,
    pub total: usize,
}

impl AttachmentScore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sentence's heads (content tokens only).
    pub fn add_sentence(&mut self, gold: &[usize], predicted: &[usize]) -> Result<()> {
        self.correct += count_correct(gold, predicted)?;
        self.total += gold.len();
        Ok(())
    }

    /// Sum of correct over sum of total; 0 for an empty split.
    pub fn uas(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Running loss and action accuracy between two reports.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossSummary {
    /// Accumulated negative log-likelihood.
    pub llh: f64,
    /// Number of actions scored.
    pub actions: usize,
    /// Number of actions the scorer got right.
    pub right: usize,
}

impl LossSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, loss: f64, actions: usize, right: usize) {
        self.llh += loss;
        self.actions += actions;
        self.right += right;
    }

    /// `exp(llh / actions)`; 1 when nothing has been recorded.
    pub fn perplexity(&self) -> f64 {
        if self.actions == 0 {
            1.0
        } else {
            (self.llh / self.actions as f64).exp()
        }
    }

    /// Fraction of actions predicted wrongly.
    pub fn error_rate(&self) -> f64 {
        if self.actions == 0 {
            0.0
        } else {
            (self.actions - self.right.min(self.actions)) as f64 / self.actions as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
