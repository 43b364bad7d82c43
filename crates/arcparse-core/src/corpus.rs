//! # Oracle Corpus Loader
//!
//! Reads the oracle-action format: blank-line separated blocks, each
//! starting with the initial configuration line
//!
//! ```text
//! [][The-DT, cat-NN, sat-VBD, ROOT-ROOT]
//! SHIFT
//! [The-DT][cat-NN, sat-VBD, ROOT-ROOT]
//! SHIFT
//! ...
//! ```
//!
//! followed by one action per line. Lines that start with `[` after the
//! first are intermediate configurations and carry nothing we need.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use crate::action::{Action, ActionTable};
use crate::decode::compute_heads;
use crate::error::{ArcParseError, Result};
use crate::vocab::{Category, Vocabulary, BAD_CHAR, PAD_POS, UNK_WORD};

/// Which split a corpus file is loaded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// Grows the vocabulary.
    Training,
    /// Resolves against a frozen vocabulary.
    Validation,
}

/// One sentence of the corpus.
///
/// `words`, `pos`, `surface` and `chars` are parallel and include the root
/// token at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub words: Vec<u32>,
    pub pos: Vec<u32>,
    pub surface: Vec<String>,
    pub chars: Vec<Vec<u32>>,
    pub actions: Vec<u32>,
}

impl Sentence {
    /// Token count including the root.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Token count excluding the root.
    pub fn content_len(&self) -> usize {
        self.words.len().saturating_sub(1)
    }
}

/// Sentences of one split, indexed by their 0-based position in the file.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    sentences: Vec<Sentence>,
}

impl Corpus {
    /// Load `path` as `split`. Validation loading never inserts into `vocab`.
    pub fn load<P: AsRef<Path>>(path: P, split: Split, vocab: &mut Vocabulary) -> Result<Self> {
        match split {
            Split::Training => Self::load_training(path, vocab),
            Split::Validation => Self::load_validation(path, vocab),
        }
    }

    /// Load a training file, registering every new word, tag, character and action.
    pub fn load_training<P: AsRef<Path>>(path: P, vocab: &mut Vocabulary) -> Result<Self> {
        let path = path.as_ref();
        let corpus = Self::read_training(BufReader::new(File::open(path)?), vocab)?;
        info!(
            path = %path.display(),
            sentences = corpus.len(),
            words = vocab.count_words(),
            pos = vocab.count_pos(),
            actions = vocab.count_actions(),
            "loaded training corpus"
        );
        Ok(corpus)
    }

    /// Load a validation file against the vocabulary built from training.
    pub fn load_validation<P: AsRef<Path>>(path: P, vocab: &Vocabulary) -> Result<Self> {
        let path = path.as_ref();
        let corpus = Self::read_validation(BufReader::new(File::open(path)?), vocab)?;
        info!(
            path = %path.display(),
            sentences = corpus.len(),
            "loaded validation corpus"
        );
        Ok(corpus)
    }

    pub fn read_training<R: BufRead>(reader: R, vocab: &mut Vocabulary) -> Result<Self> {
        read_corpus(reader, &mut Growing(vocab))
    }

    pub fn read_validation<R: BufRead>(reader: R, vocab: &Vocabulary) -> Result<Self> {
        let mut frozen = Frozen {
            vocab,
            unknown_words: 0,
            unknown_tags: 0,
        };
        let corpus = read_corpus(reader, &mut frozen)?;
        debug!(
            unknown_words = frozen.unknown_words,
            unknown_tags = frozen.unknown_tags,
            "resolved validation tokens"
        );
        Ok(corpus)
    }

    pub fn get(&self, index: usize) -> Option<&Sentence> {
        self.sentences.get(index)
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sentence> {
        self.sentences.iter()
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }
}

/// How corpus strings become ids for one split.
trait Interner {
    fn word(&mut self, form: &str) -> u32;
    fn pos(&mut self, tag: &str) -> u32;
    fn char(&mut self, ch: &str) -> u32;
    fn action(&mut self, action: Action) -> Option<u32>;
    fn actions(&self) -> &ActionTable;
}

struct Growing<'a>(&'a mut Vocabulary);

impl Interner for Growing<'_> {
    fn word(&mut self, form: &str) -> u32 {
        self.0.add_or_get(form, Category::Word)
    }

    fn pos(&mut self, tag: &str) -> u32 {
        self.0.add_or_get(tag, Category::Pos)
    }

    fn char(&mut self, ch: &str) -> u32 {
        self.0.add_or_get(ch, Category::Char)
    }

    fn action(&mut self, action: Action) -> Option<u32> {
        Some(self.0.add_action(action))
    }

    fn actions(&self) -> &ActionTable {
        self.0.actions()
    }
}

struct Frozen<'a> {
    vocab: &'a Vocabulary,
    unknown_words: usize,
    unknown_tags: usize,
}

impl Interner for Frozen<'_> {
    fn word(&mut self, form: &str) -> u32 {
        let id = self.vocab.word_or_unk(form);
        if id == UNK_WORD {
            self.unknown_words += 1;
        }
        id
    }

    fn pos(&mut self, tag: &str) -> u32 {
        self.vocab.lookup(tag, Category::Pos).unwrap_or_else(|| {
            self.unknown_tags += 1;
            PAD_POS
        })
    }

    fn char(&mut self, ch: &str) -> u32 {
        self.vocab.lookup(ch, Category::Char).unwrap_or(BAD_CHAR)
    }

    fn action(&mut self, action: Action) -> Option<u32> {
        self.vocab.actions().id_of(&action)
    }

    fn actions(&self) -> &ActionTable {
        self.vocab.actions()
    }
}

/// Sentence being assembled from a block of lines.
struct Block {
    start_line: usize,
    sentence: Sentence,
}

fn read_corpus<R: BufRead, I: Interner>(reader: R, interner: &mut I) -> Result<Corpus> {
    let mut sentences = Vec::new();
    let mut block: Option<Block> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            if let Some(done) = block.take() {
                sentences.push(finish_block(done, sentences.len(), interner)?);
            }
            continue;
        }

        match block.as_mut() {
            None => {
                block = Some(Block {
                    start_line: line_no,
                    sentence: parse_initial_line(trimmed, line_no, interner)?,
                });
            }
            Some(_) if trimmed.starts_with('[') => {}
            Some(current) => {
                let action = Action::parse(trimmed).ok_or_else(|| ArcParseError::Format {
                    line: line_no,
                    message: format!("unrecognised action {trimmed:?}"),
                })?;
                let id = interner
                    .action(action)
                    .ok_or_else(|| ArcParseError::Format {
                        line: line_no,
                        message: format!("action {trimmed:?} does not occur in the training data"),
                    })?;
                current.sentence.actions.push(id);
            }
        }
    }

    if let Some(done) = block.take() {
        sentences.push(finish_block(done, sentences.len(), interner)?);
    }

    Ok(Corpus { sentences })
}

fn finish_block<I: Interner>(block: Block, index: usize, interner: &I) -> Result<Sentence> {
    let sentence = block.sentence;
    if sentence.actions.is_empty() {
        return Err(ArcParseError::Format {
            line: block.start_line,
            message: "sentence has no actions".into(),
        });
    }

    compute_heads(sentence.len(), &sentence.actions, interner.actions()).map_err(|source| {
        ArcParseError::CorruptCorpus {
            sentence: index,
            source,
        }
    })?;

    Ok(sentence)
}

fn parse_initial_line<I: Interner>(line: &str, line_no: usize, interner: &mut I) -> Result<Sentence> {
    let format_error = |message: String| ArcParseError::Format {
        line: line_no,
        message,
    };

    let line = line.replace("-RRB-", "_RRB_").replace("-LRB-", "_LRB_");
    let buffer = line
        .strip_prefix("[][")
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| format_error(format!("expected `[][tokens]`, found {line:?}")))?;

    let mut sentence = Sentence {
        words: Vec::new(),
        pos: Vec::new(),
        surface: Vec::new(),
        chars: Vec::new(),
        actions: Vec::new(),
    };

    for token in buffer.split_whitespace() {
        let token = token.strip_suffix(',').unwrap_or(token);
        if token.is_empty() {
            continue;
        }

        let (form, tag) = token
            .rsplit_once('-')
            .filter(|(form, tag)| !form.is_empty() && !tag.is_empty())
            .ok_or_else(|| format_error(format!("token {token:?} is not of the form word-TAG")))?;

        sentence.words.push(interner.word(form));
        sentence.pos.push(interner.pos(tag));
        sentence
            .chars
            .push(characters(form).map(|ch| interner.char(ch)).collect());
        sentence.surface.push(form.to_string());
    }

    if sentence.words.is_empty() {
        return Err(format_error("sentence has no tokens".into()));
    }

    Ok(sentence)
}

/// Split a surface form into whole UTF-8 characters.
///
/// Each item spans a lead byte and its continuation bytes, never a partial
/// sequence.
pub fn characters(form: &str) -> impl Iterator<Item = &str> {
    form.char_indices()
        .map(move |(start, ch)| &form[start..start + ch.len_utf8()])
}
