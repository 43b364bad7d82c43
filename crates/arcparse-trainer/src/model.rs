//! # Neural Action Scorer
//!
//! A feed-forward network over the parser configuration:
//!
//! * three stack slots and two buffer slots, each a tanh projection of the
//!   word embedding (concatenated with the POS embedding when enabled);
//! * the relation of the rightmost dependent of the top two stack elements;
//! * the previously applied action.
//!
//! The features pass through `layers` ReLU layers and a final projection
//! to one logit per action. Logits are restricted to the legal actions
//! before the softmax, so the model never proposes an illegal transition.

use std::collections::BTreeMap;

use arcparse_core::vocab::{PAD_POS, PAD_WORD};
use arcparse_core::{ArcParseError, Choice, Configuration, Scorer, ScoringContext, Vocabulary};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Embedding, Linear, Module, Optimizer, VarBuilder, VarMap, SGD};
use tracing::debug;

use crate::checkpoint::{Checkpointable, StoredTensor};
use crate::error::{Result, TrainError};
use crate::options::ParserOptions;

const STACK_SLOTS: usize = 3;
const BUFFER_SLOTS: usize = 2;
const REL_SLOTS: usize = 2;

/// Table sizes the network is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDims {
    pub words: usize,
    pub pos: usize,
    pub actions: usize,
    pub relations: usize,
}

impl ModelDims {
    pub fn from_vocab(vocab: &Vocabulary) -> Self {
        Self {
            words: vocab.count_words(),
            pos: vocab.count_pos(),
            actions: vocab.count_actions(),
            relations: vocab.actions().relations().len(),
        }
    }
}

pub struct NeuralScorer {
    options: ParserOptions,
    device: Device,
    varmap: VarMap,
    word_emb: Embedding,
    pos_emb: Option<Embedding>,
    token_proj: Linear,
    rel_emb: Embedding,
    action_emb: Embedding,
    hidden: Vec<Linear>,
    output: Linear,
    optimizer: SGD,
    base_lr: f64,
    eta_decay: f64,
    epoch: usize,
    pending: Vec<Tensor>,
}

fn backend(e: candle_core::Error) -> ArcParseError {
    ArcParseError::Scorer(e.to_string())
}

impl NeuralScorer {
    /// Build a freshly initialised network on the CPU.
    pub fn new(options: ParserOptions, dims: ModelDims, learning_rate: f64, eta_decay: f64) -> Result<Self> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let word_emb = candle_nn::embedding(dims.words, options.input_dim, vb.pp("word_emb"))?;
        let (pos_emb, token_in) = if options.use_pos {
            let emb = candle_nn::embedding(dims.pos, options.pos_dim, vb.pp("pos_emb"))?;
            (Some(emb), options.input_dim + options.pos_dim)
        } else {
            (None, options.input_dim)
        };
        let token_proj = candle_nn::linear(token_in, options.lstm_input_dim, vb.pp("token_proj"))?;
        // Row 0 of both tables stands for "nothing".
        let rel_emb = candle_nn::embedding(dims.relations + 1, options.rel_dim, vb.pp("rel_emb"))?;
        let action_emb = candle_nn::embedding(dims.actions + 1, options.action_dim, vb.pp("action_emb"))?;

        let features = (STACK_SLOTS + BUFFER_SLOTS) * options.lstm_input_dim
            + REL_SLOTS * options.rel_dim
            + options.action_dim;
        let mut hidden = Vec::with_capacity(options.layers);
        let mut width = features;
        for layer in 0..options.layers {
            hidden.push(candle_nn::linear(width, options.hidden_dim, vb.pp(format!("hidden{layer}")))?);
            width = options.hidden_dim;
        }
        let output = candle_nn::linear(width, dims.actions, vb.pp("output"))?;

        let optimizer = SGD::new(varmap.all_vars(), learning_rate)?;
        debug!(?options, ?dims, features, "built neural scorer");

        Ok(Self {
            options,
            device,
            varmap,
            word_emb,
            pos_emb,
            token_proj,
            rel_emb,
            action_emb,
            hidden,
            output,
            optimizer,
            base_lr: learning_rate,
            eta_decay,
            epoch: 0,
            pending: Vec::new(),
        })
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    /// Log-probabilities over `ctx.legal`, in the same order.
    fn legal_log_probs(&self, ctx: &ScoringContext<'_>) -> candle_core::Result<Tensor> {
        let config = ctx.config;
        let slots: Vec<Option<usize>> = (0..STACK_SLOTS)
            .map(|d| config.stack_top(d))
            .chain((0..BUFFER_SLOTS).map(|o| config.buffer_front(o)))
            .collect();

        let word_ids: Vec<u32> = slots
            .iter()
            .map(|s| s.and_then(|i| ctx.words.get(i).copied()).unwrap_or(PAD_WORD))
            .collect();
        let mut tokens = self
            .word_emb
            .forward(&Tensor::new(word_ids.as_slice(), &self.device)?)?;
        if let Some(pos_emb) = &self.pos_emb {
            let pos_ids: Vec<u32> = slots
                .iter()
                .map(|s| s.and_then(|i| ctx.pos.get(i).copied()).unwrap_or(PAD_POS))
                .collect();
            let tags = pos_emb.forward(&Tensor::new(pos_ids.as_slice(), &self.device)?)?;
            tokens = Tensor::cat(&[&tokens, &tags], 1)?;
        }
        let tokens = self.token_proj.forward(&tokens)?.tanh()?.flatten_all()?;

        let rel_ids: Vec<u32> = (0..REL_SLOTS)
            .map(|d| rightmost_relation(config, d, ctx))
            .collect();
        let rels = self
            .rel_emb
            .forward(&Tensor::new(rel_ids.as_slice(), &self.device)?)?
            .flatten_all()?;

        let previous = ctx.previous.map_or(0, |a| a + 1);
        let action = self
            .action_emb
            .forward(&Tensor::new(&[previous], &self.device)?)?
            .flatten_all()?;

        let mut x = Tensor::cat(&[&tokens, &rels, &action], 0)?.unsqueeze(0)?;
        for layer in &self.hidden {
            x = layer.forward(&x)?.relu()?;
        }
        let logits = self.output.forward(&x)?.squeeze(0)?;

        let legal = Tensor::new(ctx.legal, &self.device)?;
        candle_nn::ops::log_softmax(&logits.index_select(&legal, 0)?, D::Minus1)
    }
}

/// Embedding id for the relation of the rightmost dependent attached to the
/// stack element at `depth`: relation index + 1, or 0 for none.
fn rightmost_relation(config: &Configuration, depth: usize, ctx: &ScoringContext<'_>) -> u32 {
    let Some(head) = config.stack_top(depth) else {
        return 0;
    };
    config
        .heads()
        .iter()
        .enumerate()
        .rev()
        .find(|&(_, h)| *h == Some(head))
        .and_then(|(dep, _)| config.relations()[dep])
        .and_then(|action| ctx.actions.relation_of(action))
        .map_or(0, |rel| rel + 1)
}

impl Scorer for NeuralScorer {
    fn score(&mut self, ctx: &ScoringContext<'_>, gold: Option<u32>) -> arcparse_core::Result<Choice> {
        let log_probs = self.legal_log_probs(ctx).map_err(backend)?;
        let values = log_probs.to_vec1::<f32>().map_err(backend)?;

        let best = values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .ok_or_else(|| ArcParseError::Scorer("no legal actions to score".into()))?;
        let action = ctx.legal[best];

        let loss = match gold.and_then(|g| ctx.legal.iter().position(|&a| a == g)) {
            Some(p) => {
                let loss = log_probs.get(p).and_then(|t| t.neg()).map_err(backend)?;
                let value = loss.to_scalar::<f32>().map_err(backend)?;
                self.pending.push(loss);
                f64::from(value)
            }
            None => 0.0,
        };

        Ok(Choice { action, loss })
    }

    fn update(&mut self) -> arcparse_core::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let total = Tensor::stack(&self.pending, 0)
            .and_then(|t| t.sum_all())
            .map_err(backend)?;
        self.pending.clear();
        self.optimizer.backward_step(&total).map_err(backend)
    }

    fn discard(&mut self) {
        self.pending.clear();
    }

    fn end_epoch(&mut self) {
        self.epoch += 1;
        let rate = self.base_lr / (1.0 + self.epoch as f64 * self.eta_decay);
        self.optimizer.set_learning_rate(rate);
        debug!(epoch = self.epoch, rate, "learning rate decayed");
    }
}

impl Checkpointable for NeuralScorer {
    fn parameters(&self) -> Result<BTreeMap<String, StoredTensor>> {
        let vars = self
            .varmap
            .data()
            .lock()
            .map_err(|_| TrainError::ParameterMismatch("parameter store is poisoned".into()))?;

        let mut out = BTreeMap::new();
        for (name, var) in vars.iter() {
            out.insert(
                name.clone(),
                StoredTensor {
                    shape: var.dims().to_vec(),
                    values: var.as_tensor().flatten_all()?.to_vec1::<f32>()?,
                },
            );
        }
        Ok(out)
    }

    fn load_parameters(&mut self, parameters: &BTreeMap<String, StoredTensor>) -> Result<()> {
        let vars = self
            .varmap
            .data()
            .lock()
            .map_err(|_| TrainError::ParameterMismatch("parameter store is poisoned".into()))?;

        if let Some(extra) = parameters.keys().find(|name| !vars.contains_key(name.as_str())) {
            return Err(TrainError::ParameterMismatch(format!(
                "checkpoint has unknown parameter {extra}"
            )));
        }

        for (name, var) in vars.iter() {
            let stored = parameters
                .get(name)
                .ok_or_else(|| TrainError::ParameterMismatch(format!("checkpoint lacks {name}")))?;
            if stored.shape != var.dims() {
                return Err(TrainError::ParameterMismatch(format!(
                    "{name}: checkpoint shape {:?}, model shape {:?}",
                    stored.shape,
                    var.dims()
                )));
            }
            let tensor = Tensor::from_vec(stored.values.clone(), stored.shape.clone(), &self.device)?;
            var.set(&tensor)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcparse_core::{parse_sentence, Corpus};

    const CORPUS: &str = "\
[][the-DT, cat-NN, sat-VBD, ROOT-ROOT]
SHIFT
SHIFT
LEFT-ARC(det)
SHIFT
LEFT-ARC(nsubj)
SHIFT
LEFT-ARC(root)
";

    fn small() -> ParserOptions {
        ParserOptions {
            use_pos: true,
            layers: 1,
            input_dim: 4,
            hidden_dim: 8,
            action_dim: 3,
            lstm_input_dim: 5,
            pos_dim: 2,
            rel_dim: 2,
        }
    }

    fn setup() -> (Vocabulary, Corpus, NeuralScorer) {
        let mut vocab = Vocabulary::new();
        let corpus = Corpus::read_training(CORPUS.as_bytes(), &mut vocab).unwrap();
        let scorer = NeuralScorer::new(small(), ModelDims::from_vocab(&vocab), 0.1, 0.08).unwrap();
        (vocab, corpus, scorer)
    }

    #[test]
    fn dims_follow_vocabulary() {
        let (vocab, _, _) = setup();
        let dims = ModelDims::from_vocab(&vocab);
        assert_eq!(dims.actions, 4);
        assert_eq!(dims.relations, 3);
        assert_eq!(dims.words, vocab.count_words());
    }

    #[test]
    fn prediction_always_completes() {
        let (vocab, corpus, mut scorer) = setup();
        let sentence = corpus.get(0).unwrap();
        let outcome =
            parse_sentence(&mut scorer, &sentence.words, &sentence.pos, None, vocab.actions()).unwrap();
        assert_eq!(outcome.actions.len(), 2 * sentence.len() - 1);
        assert_eq!(outcome.loss, 0.0);
    }

    #[test]
    fn gold_loss_is_positive_and_training_lowers_it() {
        let (vocab, corpus, mut scorer) = setup();
        let sentence = corpus.get(0).unwrap();
        let mut run = |scorer: &mut NeuralScorer| {
            let outcome = parse_sentence(
                scorer,
                &sentence.words,
                &sentence.pos,
                Some(&sentence.actions),
                vocab.actions(),
            )
            .unwrap();
            scorer.update().unwrap();
            outcome.loss
        };

        let first = run(&mut scorer);
        assert!(first > 0.0);
        let mut last = first;
        for _ in 0..60 {
            last = run(&mut scorer);
        }
        assert!(last < first, "loss did not fall: {first} -> {last}");
    }

    #[test]
    fn discard_drops_pending_loss() {
        let (vocab, corpus, mut scorer) = setup();
        let sentence = corpus.get(0).unwrap();
        let before = scorer.parameters().unwrap();
        parse_sentence(
            &mut scorer,
            &sentence.words,
            &sentence.pos,
            Some(&sentence.actions),
            vocab.actions(),
        )
        .unwrap();
        scorer.discard();
        scorer.update().unwrap();
        assert_eq!(scorer.parameters().unwrap(), before);
    }

    #[test]
    fn learning_rate_decays_per_epoch() {
        let (_, _, mut scorer) = setup();
        assert!((scorer.learning_rate() - 0.1).abs() < 1e-12);
        scorer.end_epoch();
        assert!((scorer.learning_rate() - 0.1 / 1.08).abs() < 1e-12);
        scorer.end_epoch();
        assert!((scorer.learning_rate() - 0.1 / 1.16).abs() < 1e-12);
    }

    #[test]
    fn parameters_transfer_between_models() {
        let (vocab, _, source) = setup();
        let params = source.parameters().unwrap();
        assert!(params.contains_key("pos_emb.weight"));
        assert!(params.contains_key("hidden0.weight"));

        let mut target = NeuralScorer::new(small(), ModelDims::from_vocab(&vocab), 0.1, 0.08).unwrap();
        target.load_parameters(&params).unwrap();
        assert_eq!(target.parameters().unwrap(), params);
    }

    #[test]
    fn mismatched_parameters_are_rejected() {
        let (vocab, _, source) = setup();
        let params = source.parameters().unwrap();

        let other = ParserOptions {
            hidden_dim: 6,
            ..small()
        };
        let mut target = NeuralScorer::new(other, ModelDims::from_vocab(&vocab), 0.1, 0.08).unwrap();
        let err = target.load_parameters(&params).unwrap_err();
        assert!(matches!(err, TrainError::ParameterMismatch(_)));

        let no_pos = ParserOptions {
            use_pos: false,
            ..small()
        };
        let mut target = NeuralScorer::new(no_pos, ModelDims::from_vocab(&vocab), 0.1, 0.08).unwrap();
        assert!(target.load_parameters(&params).is_err());
    }
}
