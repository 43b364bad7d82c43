use thiserror::Error;

/// Faults raised while replaying or decoding a transition sequence.
///
/// The same variants are produced whether the actions came from a gold
/// corpus or from a scorer; callers decide which one they were looking at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// An action id does not index into the action table.
    #[error("action id {id} is outside the action table ({table_size} actions)")]
    UnknownAction { id: u32, table_size: usize },

    /// The action is not permitted in the current configuration.
    #[error("illegal action {action} at step {step} (stack {stack}, buffer {buffer})")]
    IllegalAction {
        action: String,
        step: usize,
        stack: usize,
        buffer: usize,
    },

    /// The sequence ended before the configuration was terminal.
    #[error("actions exhausted before termination (stack {stack}, buffer {buffer})")]
    Unterminated { stack: usize, buffer: usize },

    /// Decoding took more steps than a sentence of this length can need.
    #[error("action budget of {budget} exhausted without reaching a terminal configuration")]
    BudgetExhausted { budget: usize },

    /// A sentence must contain at least the root token.
    #[error("cannot decode an empty sentence")]
    EmptySentence,
}

/// Errors that can occur during arcparse core operations.
#[derive(Debug, Error)]
pub enum ArcParseError {
    /// Reading a corpus file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A corpus line does not match the oracle record shape.
    #[error("corpus format error at line {line}: {message}")]
    Format {
        /// 1-based line number in the corpus file.
        line: usize,
        message: String,
    },

    /// A gold action sequence does not replay cleanly.
    #[error("corrupt gold actions for sentence {sentence}: {source}")]
    CorruptCorpus {
        sentence: usize,
        #[source]
        source: DecodeError,
    },

    /// The scorer selected an action that the transition system forbids.
    #[error("scorer malfunction on sentence of length {len}: {source}")]
    ScorerMalfunction {
        len: usize,
        #[source]
        source: DecodeError,
    },

    /// The scorer backend itself failed.
    #[error("scorer error: {0}")]
    Scorer(String),

    /// Replay of an action sequence failed outside of corpus loading.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Gold and predicted trees cover different numbers of tokens.
    #[error("tree length mismatch: gold has {gold} tokens, predicted has {predicted}")]
    LengthMismatch { gold: usize, predicted: usize },
}

/// Result type alias for arcparse core operations.
pub type Result<T> = std::result::Result<T, ArcParseError>;
