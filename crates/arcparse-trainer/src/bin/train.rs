//! Train or evaluate the arc-standard parser.
//!
//! Status lines go to standard error; CoNLL trees from `--test` go to
//! standard output.

use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use arcparse_core::{Corpus, Vocabulary};
use arcparse_trainer::{
    resolve_options, Checkpoint, Checkpointable, ModelDims, NeuralScorer, ParserOptions,
    StopRequest, StopToken, TrainConfig, TrainError, Trainer,
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CLI arguments
#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train and test a transition-based dependency parser")]
#[command(version)]
struct Cli {
    /// Training oracle corpus
    #[arg(short = 'T', long)]
    training_data: PathBuf,

    /// Development oracle corpus, used for validation and testing
    #[arg(short = 'd', long)]
    dev_data: Option<PathBuf>,

    /// Load parameters from this checkpoint
    #[arg(short = 'm', long)]
    model: Option<PathBuf>,

    /// Make POS tags visible to the scorer
    #[arg(short = 'P', long)]
    use_pos_tags: bool,

    /// Train the parser
    #[arg(short = 't', long)]
    train: bool,

    /// Decode the development corpus and print CoNLL trees
    #[arg(short = 'e', long)]
    test: bool,

    /// Unknown-word strategy (1 = stochastic singleton replacement)
    #[arg(short = 'o', long, default_value_t = 1)]
    unk_strategy: u32,

    /// Singleton replacement probability
    #[arg(short = 'u', long, default_value_t = 0.2)]
    unk_prob: f64,

    #[arg(short = 'l', long, default_value_t = 2)]
    layers: usize,

    #[arg(long, default_value_t = 32)]
    input_dim: usize,

    #[arg(long, default_value_t = 64)]
    hidden_dim: usize,

    #[arg(long, default_value_t = 16)]
    action_dim: usize,

    #[arg(long, default_value_t = 60)]
    lstm_input_dim: usize,

    #[arg(long, default_value_t = 12)]
    pos_dim: usize,

    #[arg(long, default_value_t = 10)]
    rel_dim: usize,

    /// Seed for shuffling and unknown-word draws
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,

    /// Sentences per status report
    #[arg(long, default_value_t = 100)]
    status_every: usize,

    /// Stop after this many epochs instead of running until interrupted
    #[arg(long)]
    max_epochs: Option<usize>,

    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,

    /// Directory for checkpoints
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

impl Cli {
    fn options(&self) -> ParserOptions {
        ParserOptions {
            use_pos: self.use_pos_tags,
            layers: self.layers,
            input_dim: self.input_dim,
            hidden_dim: self.hidden_dim,
            action_dim: self.action_dim,
            lstm_input_dim: self.lstm_input_dim,
            pos_dim: self.pos_dim,
            rel_dim: self.rel_dim,
        }
    }

    fn config(&self) -> TrainConfig {
        TrainConfig::new()
            .with_unk_strategy(self.unk_strategy)
            .with_unk_prob(self.unk_prob)
            .with_status_every(self.status_every)
            .with_learning_rate(self.learning_rate)
            .with_seed(self.seed)
            .with_max_epochs(self.max_epochs)
            .with_output_dir(&self.output_dir)
    }
}

/// Request a stop on every Ctrl-C; the second one exits immediately.
fn listen_for_interrupts(stop: StopToken) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match stop.request() {
                StopRequest::Graceful => {
                    warn!("interrupt received, stopping after the current reporting interval")
                }
                StopRequest::Forced => {
                    warn!("second interrupt, exiting now");
                    std::process::exit(1);
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    config.validate()?;
    if !cli.train && !cli.test {
        bail!("nothing to do: pass --train and/or --test");
    }
    let mode = if cli.train { "training" } else { "test" };
    let Some(dev_path) = cli.dev_data.as_ref() else {
        return Err(TrainError::MissingDevData { mode }.into());
    };

    let mut vocab = Vocabulary::new();
    let training = Corpus::load_training(&cli.training_data, &mut vocab)
        .with_context(|| format!("loading {}", cli.training_data.display()))?;
    let dev = Corpus::load_validation(dev_path, &vocab)
        .with_context(|| format!("loading {}", dev_path.display()))?;

    let stored = cli.model.as_ref().map(Checkpoint::load).transpose()?;
    let (options, overridden) =
        resolve_options(cli.options(), stored.as_ref().map(|c| &c.options));
    if overridden {
        warn!(
            ?options,
            "checkpoint options differ from the command line; using the checkpoint's"
        );
    }

    let mut scorer = NeuralScorer::new(
        options,
        ModelDims::from_vocab(&vocab),
        config.learning_rate,
        config.eta_decay,
    )?;
    if let Some(checkpoint) = &stored {
        scorer.load_parameters(&checkpoint.parameters)?;
        info!(parameters = checkpoint.parameters.len(), "loaded model parameters");
    }

    let mut trainer = Trainer::new(scorer, options, config, vocab, training, Some(dev))?;

    if cli.train {
        let stop = StopToken::new();
        listen_for_interrupts(stop.clone());

        let (returned, summary) = tokio::task::spawn_blocking(move || {
            let summary = trainer.train(&stop);
            (trainer, summary)
        })
        .await?;
        trainer = returned;
        let summary = summary?;
        info!(
            epochs = summary.epochs,
            sentences = summary.sentences,
            best_correct = summary.best_correct,
            checkpoint = ?summary.best_checkpoint,
            "training finished"
        );
    }

    if cli.test {
        let stdout = std::io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        trainer.test(&mut out)?;
        out.flush()?;
    }

    Ok(())
}
