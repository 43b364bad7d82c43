//! # Transition Actions
//!
//! Structured form of the oracle action tokens `SHIFT`, `LEFT-ARC(rel)` and
//! `RIGHT-ARC(rel)`. The relation label is kept as its own field so nothing
//! downstream has to splice strings.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

fn action_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(SHIFT|LEFT-ARC|RIGHT-ARC)(?:\((.+)\))?$").expect("static action pattern")
    })
}

/// The transition an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Move the front of the buffer onto the stack.
    Shift,
    /// Top of stack becomes head of the element below it.
    LeftArc,
    /// Element below the top becomes head of the top.
    RightArc,
}

impl ActionKind {
    fn keyword(self) -> &'static str {
        match self {
            Self::Shift => "SHIFT",
            Self::LeftArc => "LEFT-ARC",
            Self::RightArc => "RIGHT-ARC",
        }
    }

    /// True for the two attach actions.
    pub fn is_attach(self) -> bool {
        !matches!(self, Self::Shift)
    }
}

/// One entry of the action vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action {
    pub kind: ActionKind,
    pub relation: Option<String>,
}

impl Action {
    pub fn shift() -> Self {
        Self {
            kind: ActionKind::Shift,
            relation: None,
        }
    }

    pub fn left_arc(relation: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::LeftArc,
            relation: Some(relation.into()),
        }
    }

    pub fn right_arc(relation: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::RightArc,
            relation: Some(relation.into()),
        }
    }

    /// Parse an oracle action token such as `RIGHT-ARC(nsubj)`.
    ///
    /// Returns `None` for unrecognised keywords and for a `SHIFT` carrying
    /// a relation.
    pub fn parse(token: &str) -> Option<Self> {
        let caps = action_pattern().captures(token.trim())?;
        let kind = match &caps[1] {
            "SHIFT" => ActionKind::Shift,
            "LEFT-ARC" => ActionKind::LeftArc,
            _ => ActionKind::RightArc,
        };
        let relation = caps.get(2).map(|m| m.as_str().to_string());

        if kind == ActionKind::Shift && relation.is_some() {
            return None;
        }

        Some(Self { kind, relation })
    }

    /// The relation as it appears in CoNLL output (`_` when unlabeled).
    pub fn relation_label(&self) -> &str {
        self.relation.as_deref().unwrap_or("_")
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(rel) => write!(f, "{}({})", self.kind.keyword(), rel),
            None => write!(f, "{}", self.kind.keyword()),
        }
    }
}

/// Positional action vocabulary: an action's id is its index.
#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    actions: Vec<Action>,
    ids: HashMap<Action, u32>,
    relations: Vec<String>,
    relation_ids: HashMap<String, u32>,
    action_relations: Vec<Option<u32>>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from actions in id order, deduplicating repeats.
    pub fn from_actions(actions: impl IntoIterator<Item = Action>) -> Self {
        let mut table = Self::new();
        for action in actions {
            table.add_or_get(action);
        }
        table
    }

    /// Return the id of `action`, appending it if unseen.
    pub fn add_or_get(&mut self, action: Action) -> u32 {
        if let Some(&id) = self.ids.get(&action) {
            return id;
        }

        let relation = action.relation.as_ref().map(|rel| {
            let next = self.relations.len() as u32;
            *self.relation_ids.entry(rel.clone()).or_insert_with(|| {
                self.relations.push(rel.clone());
                next
            })
        });

        let id = self.actions.len() as u32;
        self.ids.insert(action.clone(), id);
        self.actions.push(action);
        self.action_relations.push(relation);
        id
    }

    /// Id of an already registered action.
    pub fn id_of(&self, action: &Action) -> Option<u32> {
        self.ids.get(action).copied()
    }

    pub fn get(&self, id: u32) -> Option<&Action> {
        self.actions.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Action)> {
        self.actions.iter().enumerate().map(|(i, a)| (i as u32, a))
    }

    /// Distinct relation labels in order of first appearance.
    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    /// Index into [`relations`](Self::relations) of the label carried by an action.
    pub fn relation_of(&self, id: u32) -> Option<u32> {
        self.action_relations.get(id as usize).copied().flatten()
    }
}
