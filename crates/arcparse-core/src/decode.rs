//! # Head Computation
//!
//! Replays a finished action sequence into a head index per token.

use crate::action::ActionTable;
use crate::error::DecodeError;
use crate::transition::Configuration;

/// A decoded dependency tree over the content tokens of a sentence.
///
/// `heads[i]` is the 0-based head of token `i`; the value `heads.len()` is
/// the virtual root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyTree {
    pub heads: Vec<usize>,
    pub relations: Vec<String>,
}

impl DependencyTree {
    /// Number of content tokens (the root is not counted).
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Position that denotes the virtual root.
    pub fn root(&self) -> usize {
        self.heads.len()
    }

    /// Read the tree out of a terminal configuration.
    pub fn from_configuration(
        config: &Configuration,
        table: &ActionTable,
    ) -> Result<Self, DecodeError> {
        if !config.is_terminal() {
            return Err(config.unterminated());
        }

        let content = config.root();
        let mut heads = Vec::with_capacity(content);
        let mut relations = Vec::with_capacity(content);

        for token in 0..content {
            let (Some(head), Some(action_id)) = (config.heads()[token], config.relations()[token])
            else {
                return Err(config.unterminated());
            };
            let action = table.get(action_id).ok_or(DecodeError::UnknownAction {
                id: action_id,
                table_size: table.len(),
            })?;
            heads.push(head);
            relations.push(action.relation_label().to_string());
        }

        Ok(Self { heads, relations })
    }
}

/// Replay `actions` over a sentence of `sentence_len` tokens (root included)
/// and return the head of every content token.
pub fn compute_heads(
    sentence_len: usize,
    actions: &[u32],
    table: &ActionTable,
) -> Result<Vec<usize>, DecodeError> {
    compute_tree(sentence_len, actions, table).map(|tree| tree.heads)
}

/// Like [`compute_heads`], also recording the relation label of each token.
///
/// # Errors
///
/// Fails on an action id outside `table`, on any action the transition
/// system forbids at the point it appears, and when the sequence does not
/// end in the single-root terminal configuration.
pub fn compute_tree(
    sentence_len: usize,
    actions: &[u32],
    table: &ActionTable,
) -> Result<DependencyTree, DecodeError> {
    let mut config = Configuration::new(sentence_len)?;
    for &id in actions {
        config.apply(id, table)?;
    }
    DependencyTree::from_configuration(&config, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;

    const SHIFT: u32 = 0;
    const DET: u32 = 1;
    const NSUBJ: u32 = 2;
    const ROOT: u32 = 3;
    const OBJ: u32 = 4;

    fn table() -> ActionTable {
        ActionTable::from_actions([
            Action::shift(),
            Action::left_arc("det"),
            Action::left_arc("nsubj"),
            Action::left_arc("root"),
            Action::right_arc("obj"),
        ])
    }

    // the cat saw mice ROOT
    fn gold() -> Vec<u32> {
        vec![
            SHIFT, SHIFT, DET, SHIFT, NSUBJ, SHIFT, OBJ, SHIFT, ROOT,
        ]
    }

    #[test]
    fn replay_gold_sequence() {
        let tree = compute_tree(5, &gold(), &table()).unwrap();
        assert_eq!(tree.heads, vec![1, 2, 4, 2]);
        assert_eq!(tree.relations, vec!["det", "nsubj", "root", "obj"]);
        assert_eq!(tree.root(), 4);
    }

    #[test]
    fn every_content_token_gets_one_head() {
        let heads = compute_heads(5, &gold(), &table()).unwrap();
        assert_eq!(heads.len(), 4);
        assert_eq!(heads.iter().filter(|&&h| h == 4).count(), 1);
        for (token, &head) in heads.iter().enumerate() {
            assert_ne!(token, head);
            assert!(head <= 4);
        }
    }

    #[test]
    fn root_only_sentence() {
        let tree = compute_tree(1, &[SHIFT], &table()).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn out_of_table_action_fails() {
        let mut actions = gold();
        actions[2] = 99;
        let err = compute_heads(5, &actions, &table()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownAction {
                id: 99,
                table_size: 5
            }
        );
    }

    #[test]
    fn illegal_action_mid_replay_fails() {
        let err = compute_heads(5, &[SHIFT, DET], &table()).unwrap_err();
        assert!(matches!(err, DecodeError::IllegalAction { step: 1, .. }));
    }

    #[test]
    fn truncated_sequence_fails() {
        let actions = &gold()[..6];
        let err = compute_heads(5, actions, &table()).unwrap_err();
        assert!(matches!(err, DecodeError::Unterminated { .. }));
    }

    #[test]
    fn trailing_actions_after_termination_fail() {
        let mut actions = gold();
        actions.push(SHIFT);
        let err = compute_heads(5, &actions, &table()).unwrap_err();
        assert!(matches!(err, DecodeError::IllegalAction { step: 9, .. }));
    }
}
