//! # Arc-Standard Transition System
//!
//! A configuration is a stack, a buffer and a partial arc set over the tokens
//! of one sentence. The last token of every sentence is the explicit virtual
//! root: it starts at the back of the buffer, is shifted last, and is the
//! single element left on the stack when parsing finishes.
//!
//! The legality rules here are the only ones in the crate. Gold replay and
//! scorer-guided decoding both go through [`Configuration::apply`].

use crate::action::{Action, ActionKind, ActionTable};
use crate::error::DecodeError;

/// Parser state for one sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    len: usize,
    stack: Vec<usize>,
    /// Remaining input, front of the buffer at the end of the vector.
    buffer: Vec<usize>,
    heads: Vec<Option<usize>>,
    relations: Vec<Option<u32>>,
    steps: usize,
}

impl Configuration {
    /// Start state for a sentence of `len` tokens, root included.
    pub fn new(len: usize) -> Result<Self, DecodeError> {
        if len == 0 {
            return Err(DecodeError::EmptySentence);
        }

        Ok(Self {
            len,
            stack: Vec::with_capacity(len),
            buffer: (0..len).rev().collect(),
            heads: vec![None; len],
            relations: vec![None; len],
            steps: 0,
        })
    }

    /// Number of tokens including the root.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; a configuration holds at least the root.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Position of the virtual root token.
    pub fn root(&self) -> usize {
        self.len - 1
    }

    /// Stack contents, bottom first.
    pub fn stack(&self) -> &[usize] {
        &self.stack
    }

    /// The `depth`-th element from the top of the stack (0 = top).
    pub fn stack_top(&self, depth: usize) -> Option<usize> {
        self.stack.iter().rev().nth(depth).copied()
    }

    /// The `offset`-th element of the buffer (0 = front).
    pub fn buffer_front(&self, offset: usize) -> Option<usize> {
        self.buffer.iter().rev().nth(offset).copied()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Head assigned so far to each token.
    pub fn heads(&self) -> &[Option<usize>] {
        &self.heads
    }

    /// Action id of the attach that gave each token its head.
    pub fn relations(&self) -> &[Option<u32>] {
        &self.relations
    }

    /// Number of actions applied so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Empty buffer and a single element (the root) on the stack.
    pub fn is_terminal(&self) -> bool {
        self.buffer.is_empty() && self.stack.len() == 1
    }

    /// Upper bound on the actions any legal parse of this sentence needs.
    ///
    /// A complete arc-standard parse of `n` tokens takes `n` shifts and
    /// `n - 1` attaches.
    pub fn action_budget(&self) -> usize {
        2 * self.len
    }

    /// Check whether an action of `kind` may be applied now.
    pub fn is_legal(&self, kind: ActionKind) -> bool {
        let stack = self.stack.len();
        let buffer = self.buffer.len();

        match kind {
            // The root is shifted only once everything else has been reduced
            // into a single subtree.
            ActionKind::Shift => buffer > 1 || (buffer == 1 && stack <= 1),
            ActionKind::LeftArc => {
                stack >= 2 && self.stack_top(1) != Some(self.root())
            }
            ActionKind::RightArc => {
                stack >= 2 && self.stack_top(0) != Some(self.root())
            }
        }
    }

    /// Ids of every action in `table` that is legal in this configuration.
    pub fn legal_actions(&self, table: &ActionTable) -> Vec<u32> {
        table
            .iter()
            .filter(|(_, action)| self.is_legal(action.kind))
            .map(|(id, _)| id)
            .collect()
    }

    /// Apply the action with id `id` from `table`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownAction`] for ids outside the table and
    /// [`DecodeError::IllegalAction`] when the legality rules forbid it. The
    /// configuration is left unchanged on error.
    pub fn apply(&mut self, id: u32, table: &ActionTable) -> Result<(), DecodeError> {
        let action = table.get(id).ok_or(DecodeError::UnknownAction {
            id,
            table_size: table.len(),
        })?;
        self.apply_action(id, action)
    }

    fn apply_action(&mut self, id: u32, action: &Action) -> Result<(), DecodeError> {
        if !self.is_legal(action.kind) {
            return Err(DecodeError::IllegalAction {
                action: action.to_string(),
                step: self.steps,
                stack: self.stack.len(),
                buffer: self.buffer.len(),
            });
        }

        match action.kind {
            ActionKind::Shift => {
                if let Some(token) = self.buffer.pop() {
                    self.stack.push(token);
                }
            }
            ActionKind::LeftArc | ActionKind::RightArc => {
                let (Some(top), Some(below)) = (self.stack.pop(), self.stack.pop()) else {
                    unreachable!("legality guarantees two stack elements");
                };
                let (head, dependent) = if action.kind == ActionKind::LeftArc {
                    (top, below)
                } else {
                    (below, top)
                };
                self.heads[dependent] = Some(head);
                self.relations[dependent] = Some(id);
                self.stack.push(head);
            }
        }

        self.steps += 1;
        Ok(())
    }

    /// Error describing why a finished sequence did not terminate.
    pub(crate) fn unterminated(&self) -> DecodeError {
        DecodeError::Unterminated {
            stack: self.stack.len(),
            buffer: self.buffer.len(),
        }
    }
}
