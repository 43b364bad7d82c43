//! Training loop and evaluation passes.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use arcparse_core::conll::write_sentence;
use arcparse_core::{
    compute_heads, compute_tree, parse_sentence, ArcParseError, AttachmentScore, Corpus,
    LossSummary, Scorer, Sentence, Vocabulary,
};
use tracing::{debug, info, warn};

use crate::checkpoint::{link_latest, Checkpoint, Checkpointable, LATEST_ALIAS};
use crate::error::{Result, TrainError};
use crate::options::{ParserOptions, TrainConfig};
use crate::stop::StopToken;
use crate::unk::{UnkReplacer, VocabStats};

/// How a training run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    /// Completed passes over the training set.
    pub epochs: usize,
    pub sentences: usize,
    pub reports: usize,
    /// Most correct validation heads seen so far.
    pub best_correct: usize,
    pub best_checkpoint: Option<PathBuf>,
    /// Whether the run ended on a stop request.
    pub stopped: bool,
}

/// Result of one pass over the development split.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    pub loss: LossSummary,
    pub attachment: AttachmentScore,
    pub sentences: usize,
    pub elapsed: Duration,
}

impl EvalReport {
    pub fn uas(&self) -> f64 {
        self.attachment.uas()
    }
}

pub struct Trainer<S> {
    scorer: S,
    options: ParserOptions,
    config: TrainConfig,
    vocab: Vocabulary,
    training: Corpus,
    dev: Option<Corpus>,
    stats: VocabStats,
}

impl<S: Scorer + Checkpointable> Trainer<S> {
    /// Check `config` and compute the training vocabulary statistics.
    pub fn new(
        scorer: S,
        options: ParserOptions,
        config: TrainConfig,
        vocab: Vocabulary,
        training: Corpus,
        dev: Option<Corpus>,
    ) -> Result<Self> {
        config.validate()?;
        let stats = VocabStats::from_corpus(&training, config.unk_prob > 0.0);
        debug!(
            training = training.len(),
            singletons = stats.singleton_count(),
            "computed training vocabulary"
        );

        Ok(Self {
            scorer,
            options,
            config,
            vocab,
            training,
            dev,
            stats,
        })
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    pub fn into_scorer(self) -> S {
        self.scorer
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Train until `stop` is requested or `max_epochs` passes are complete,
    /// validating periodically and checkpointing every improvement.
    pub fn train(&mut self, stop: &StopToken) -> Result<TrainSummary> {
        if self.training.is_empty() {
            return Err(TrainError::EmptyTrainingCorpus);
        }
        if self.dev.is_none() {
            return Err(TrainError::MissingDevData { mode: "training" });
        }
        std::fs::create_dir_all(&self.config.output_dir).map_err(|source| {
            TrainError::CheckpointIo {
                path: self.config.output_dir.clone(),
                source,
            }
        })?;

        let n = self.training.len();
        let status_every = self.config.status_every.min(n);
        let checkpoint_path = self
            .config
            .output_dir
            .join(self.options.checkpoint_name(std::process::id()));

        let mut shuffler = oorandom::Rand64::new(u128::from(self.config.seed));
        let mut replacer = UnkReplacer::new(self.config.unk_prob, self.config.seed.rotate_left(32));
        let mut order: Vec<usize> = (0..n).collect();
        let mut cursor = n;
        let mut started = false;

        let mut summary = TrainSummary {
            epochs: 0,
            sentences: 0,
            reports: 0,
            best_correct: 0,
            best_checkpoint: None,
            stopped: false,
        };
        let mut running = LossSummary::new();

        info!(
            sentences = n,
            status_every,
            validate_every = self.config.validate_every,
            "starting training"
        );

        'training: loop {
            if stop.is_requested() {
                info!("stop requested, ending training");
                summary.stopped = true;
                break;
            }

            let mut exhausted = false;
            for _ in 0..status_every {
                if cursor == n {
                    if started {
                        summary.epochs += 1;
                        self.scorer.end_epoch();
                        if self.config.max_epochs.is_some_and(|max| summary.epochs >= max) {
                            exhausted = true;
                            break;
                        }
                    }
                    started = true;
                    shuffle(&mut order, &mut shuffler);
                    cursor = 0;
                    debug!(epoch = summary.epochs, "shuffled training data");
                }

                let index = order[cursor];
                self.train_sentence(index, &mut replacer, &mut running)?;
                cursor += 1;
                summary.sentences += 1;
            }

            if running.actions > 0 {
                summary.reports += 1;
                info!(
                    "update #{} (epoch {:.3}) llh: {:.4} ppl: {:.4} err: {:.4}",
                    summary.reports,
                    summary.sentences as f64 / n as f64,
                    running.llh,
                    running.perplexity(),
                    running.error_rate()
                );
                running.reset();

                if (summary.reports - 1) % self.config.validate_every == 0 {
                    self.validate(&mut summary, &checkpoint_path)?;
                }
            }

            if exhausted {
                info!(epochs = summary.epochs, "reached epoch limit");
                break 'training;
            }
        }

        Ok(summary)
    }

    fn train_sentence(
        &mut self,
        index: usize,
        replacer: &mut UnkReplacer,
        running: &mut LossSummary,
    ) -> Result<()> {
        let sentence = &self.training.sentences()[index];
        let words = replacer.replace(&sentence.words, &self.stats);
        let in_sentence = TrainError::in_sentence("training", index);

        let outcome = parse_sentence(
            &mut self.scorer,
            &words,
            &sentence.pos,
            Some(&sentence.actions),
            self.vocab.actions(),
        )
        .map_err(&in_sentence)?;
        if outcome.loss.is_nan() || outcome.loss < 0.0 {
            self.scorer.discard();
            return Err(TrainError::NegativeLoss {
                sentence: index,
                loss: outcome.loss,
            });
        }
        self.scorer.update().map_err(&in_sentence)?;

        running.record(outcome.loss, outcome.actions.len(), outcome.correct);
        Ok(())
    }

    fn validate(&mut self, summary: &mut TrainSummary, checkpoint_path: &Path) -> Result<()> {
        let report = self.evaluate()?;
        info!(
            "dev (iter={} epoch={:.3}) llh: {:.4} ppl: {:.4} err: {:.4} uas: {:.4}\t[{} sents in {} ms]",
            summary.reports,
            summary.sentences as f64 / self.training.len() as f64,
            report.loss.llh,
            report.loss.perplexity(),
            report.loss.error_rate(),
            report.uas(),
            report.sentences,
            report.elapsed.as_millis()
        );

        if report.attachment.correct > summary.best_correct {
            summary.best_correct = report.attachment.correct;
            Checkpoint::capture(self.options, &self.scorer)?.save(checkpoint_path)?;
            info!(path = %checkpoint_path.display(), correct = summary.best_correct, "saved checkpoint");
            if summary.best_checkpoint.is_none() {
                if let Err(e) = link_latest(checkpoint_path) {
                    warn!(error = %e, alias = LATEST_ALIAS, "could not link the first checkpoint");
                }
            }
            summary.best_checkpoint = Some(checkpoint_path.to_path_buf());
        }
        Ok(())
    }

    /// One pass over the development split without parameter updates.
    pub fn evaluate(&mut self) -> Result<EvalReport> {
        self.dev_pass(None::<&mut std::io::Sink>, "evaluation")
    }

    /// Decode the development split, writing one CoNLL tree per sentence to `out`.
    pub fn test<W: Write>(&mut self, out: &mut W) -> Result<EvalReport> {
        let report = self.dev_pass(Some(out), "test")?;
        info!(
            "TEST llh={:.4} ppl: {:.4} err: {:.4} uas: {:.4}\t[{} sents in {} ms]",
            report.loss.llh,
            report.loss.perplexity(),
            report.loss.error_rate(),
            report.uas(),
            report.sentences,
            report.elapsed.as_millis()
        );
        Ok(report)
    }

    fn dev_pass<W: Write>(&mut self, mut out: Option<&mut W>, mode: &'static str) -> Result<EvalReport> {
        let dev = self.dev.as_ref().ok_or(TrainError::MissingDevData { mode })?;
        let table = self.vocab.actions();
        let start = Instant::now();

        let mut loss = LossSummary::new();
        let mut attachment = AttachmentScore::new();

        for (index, sentence) in dev.iter().enumerate() {
            let in_sentence = TrainError::in_sentence(mode, index);
            let words = self.stats.restrict(&sentence.words);

            let gold = parse_sentence(
                &mut self.scorer,
                &words,
                &sentence.pos,
                Some(&sentence.actions),
                table,
            );
            self.scorer.discard();
            let gold = gold.map_err(&in_sentence)?;
            loss.record(gold.loss, gold.actions.len(), gold.correct);

            let predicted = parse_sentence(&mut self.scorer, &words, &sentence.pos, None, table)
                .map_err(&in_sentence)?;

            let gold_heads = heads(sentence, &sentence.actions, table).map_err(&in_sentence)?;
            let predicted_heads = heads(sentence, &predicted.actions, table).map_err(&in_sentence)?;
            attachment
                .add_sentence(&gold_heads, &predicted_heads)
                .map_err(&in_sentence)?;

            if let Some(out) = out.as_deref_mut() {
                let tree = compute_tree(sentence.len(), &predicted.actions, table)
                    .map_err(|e| in_sentence(e.into()))?;
                write_sentence(out, sentence, &self.vocab, &tree).map_err(&in_sentence)?;
            }
        }

        Ok(EvalReport {
            loss,
            attachment,
            sentences: dev.len(),
            elapsed: start.elapsed(),
        })
    }
}

fn heads(
    sentence: &Sentence,
    actions: &[u32],
    table: &arcparse_core::ActionTable,
) -> std::result::Result<Vec<usize>, ArcParseError> {
    Ok(compute_heads(sentence.len(), actions, table)?)
}

/// Fisher-Yates over the full index list.
fn shuffle(order: &mut [usize], rng: &mut oorandom::Rand64) {
    for i in (1..order.len()).rev() {
        let j = rng.rand_range(0..(i as u64 + 1)) as usize;
        order.swap(i, j);
    }
}
