//! # Vocabulary
//!
//! Bidirectional id assignment for words, POS tags and characters, plus the
//! positional action table. Ids are dense, assigned in insertion order and
//! never reassigned.

use std::collections::HashMap;

use crate::action::{Action, ActionTable};

/// Unknown-word marker.
pub const UNK: &str = "<UNK>";
/// Padding marker for words and characters.
pub const BAD0: &str = "<BAD0>";

/// Word id of the padding sentinel.
pub const PAD_WORD: u32 = 0;
/// Word id of the unknown-word sentinel.
pub const UNK_WORD: u32 = 1;
/// POS id of the empty padding tag.
pub const PAD_POS: u32 = 0;
/// Character id of the empty padding entry.
pub const PAD_CHAR: u32 = 0;
/// Character id of the `<BAD0>` marker, also used for unseen characters.
pub const BAD_CHAR: u32 = 1;

/// The three string categories that carry their own id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Word,
    Pos,
    Char,
}

/// One insertion-ordered string <-> id mapping.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    ids: HashMap<String, u32>,
    entries: Vec<String>,
}

impl Lexicon {
    /// Create an empty lexicon.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, token: &str) -> u32 {
        let id = self.entries.len() as u32;
        self.ids.insert(token.to_string(), id);
        self.entries.push(token.to_string());
        id
    }

    /// Return the id of `token`, inserting it at the end if it is new.
    pub fn get_or_add(&mut self, token: &str) -> u32 {
        match self.ids.get(token) {
            Some(&id) => id,
            None => self.push(token),
        }
    }

    /// Look up an existing token.
    pub fn get(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    /// Recover the string for an id.
    pub fn token(&self, id: u32) -> Option<&str> {
        self.entries.get(id as usize).map(String::as_str)
    }

    /// Number of entries, sentinels included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been inserted (never the case for a
    /// [`Vocabulary`] lexicon, which always holds its sentinels).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The forward list, indexed by id.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// All id spaces used by the parser.
///
/// Owned by whoever loads the training corpus; collaborators only ever see
/// `&Vocabulary` (queries) or `&mut Vocabulary` (insertions) for the duration
/// of a call.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: Lexicon,
    pos: Lexicon,
    chars: Lexicon,
    actions: ActionTable,
}

impl Vocabulary {
    /// Create a vocabulary holding only the reserved sentinels.
    pub fn new() -> Self {
        let mut words = Lexicon::new();
        words.push(BAD0);
        words.push(UNK);

        let mut pos = Lexicon::new();
        pos.push("");

        let mut chars = Lexicon::new();
        chars.push("");
        chars.push(BAD0);

        Self {
            words,
            pos,
            chars,
            actions: ActionTable::new(),
        }
    }

    /// Return the id of `token` in `category`, creating it if necessary.
    ///
    /// New ids equal the size of the category before insertion, so calling
    /// this twice with the same arguments yields the same id.
    pub fn add_or_get(&mut self, token: &str, category: Category) -> u32 {
        self.lexicon_mut(category).get_or_add(token)
    }

    /// Look up `token` without inserting.
    pub fn lookup(&self, token: &str, category: Category) -> Option<u32> {
        self.lexicon(category).get(token)
    }

    /// Word id for `word`, or [`UNK_WORD`] if it was never inserted.
    pub fn word_or_unk(&self, word: &str) -> u32 {
        self.words.get(word).unwrap_or(UNK_WORD)
    }

    /// Register an action, reusing the existing id when the same label has
    /// been seen before.
    pub fn add_action(&mut self, action: Action) -> u32 {
        self.actions.add_or_get(action)
    }

    pub fn lexicon(&self, category: Category) -> &Lexicon {
        match category {
            Category::Word => &self.words,
            Category::Pos => &self.pos,
            Category::Char => &self.chars,
        }
    }

    fn lexicon_mut(&mut self, category: Category) -> &mut Lexicon {
        match category {
            Category::Word => &mut self.words,
            Category::Pos => &mut self.pos,
            Category::Char => &mut self.chars,
        }
    }

    pub fn words(&self) -> &Lexicon {
        &self.words
    }

    pub fn pos_tags(&self) -> &Lexicon {
        &self.pos
    }

    pub fn chars(&self) -> &Lexicon {
        &self.chars
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    pub fn count_words(&self) -> usize {
        self.words.len()
    }

    pub fn count_pos(&self) -> usize {
        self.pos.len()
    }

    pub fn count_chars(&self) -> usize {
        self.chars.len()
    }

    pub fn count_actions(&self) -> usize {
        self.actions.len()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}
