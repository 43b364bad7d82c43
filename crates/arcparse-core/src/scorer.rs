//! # Scorer Contract
//!
//! The action-scoring model lives outside this crate. It is driven one
//! transition at a time through [`Scorer`], and [`parse_sentence`] is the
//! only place that runs a scorer against the transition system.

use crate::action::ActionTable;
use crate::error::{ArcParseError, DecodeError, Result};
use crate::transition::Configuration;

/// Everything a scorer may look at when choosing the next action.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub config: &'a Configuration,
    /// Word ids after unknown-word substitution.
    pub words: &'a [u32],
    pub pos: &'a [u32],
    /// Ids of the actions legal in `config`, in table order. Never empty.
    pub legal: &'a [u32],
    pub actions: &'a ActionTable,
    /// The action applied at the previous step.
    pub previous: Option<u32>,
}

/// A scorer's answer for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Choice {
    /// Highest scoring action; must be one of `ScoringContext::legal`.
    pub action: u32,
    /// Negative log-probability of the gold action, 0 without gold.
    pub loss: f64,
}

/// The model that assigns probabilities to transitions.
pub trait Scorer {
    /// Choose the next action. When `gold` is given, also accumulate its loss
    /// for the next [`update`](Self::update).
    fn score(&mut self, ctx: &ScoringContext<'_>, gold: Option<u32>) -> Result<Choice>;

    /// Adjust parameters from the loss accumulated since the last update.
    fn update(&mut self) -> Result<()>;

    /// Forget accumulated loss without touching parameters.
    fn discard(&mut self);

    /// Called at every epoch boundary after the first.
    fn end_epoch(&mut self) {}
}

/// Result of running a scorer over one sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    /// Actions applied: the gold ones when gold was given, the predicted ones otherwise.
    pub actions: Vec<u32>,
    /// Sum of per-step losses.
    pub loss: f64,
    /// Steps where the scorer's choice matched gold.
    pub correct: usize,
}

/// Drive `scorer` over a sentence.
///
/// With `gold`, the gold actions are applied (the scorer's choices are only
/// counted) and loss is accumulated. Without it, the scorer's choices are
/// applied until the configuration is terminal.
///
/// # Errors
///
/// * [`ArcParseError::ScorerMalfunction`] if the scorer picks an illegal action
///   or fails to finish within the action budget.
/// * [`ArcParseError::Decode`] if the gold sequence itself does not replay.
pub fn parse_sentence<S: Scorer + ?Sized>(
    scorer: &mut S,
    words: &[u32],
    pos: &[u32],
    gold: Option<&[u32]>,
    table: &ActionTable,
) -> Result<ParseOutcome> {
    let len = words.len();
    let mut config = Configuration::new(len)?;
    let mut outcome = ParseOutcome {
        actions: Vec::with_capacity(2 * len),
        loss: 0.0,
        correct: 0,
    };
    let malfunction = |source: DecodeError| ArcParseError::ScorerMalfunction { len, source };

    let mut step = 0;
    loop {
        let expected = match gold {
            Some(gold) => match gold.get(step) {
                Some(&id) => Some(id),
                None => break,
            },
            None if config.is_terminal() => break,
            None => None,
        };

        if expected.is_none() && step >= config.action_budget() {
            return Err(malfunction(DecodeError::BudgetExhausted {
                budget: config.action_budget(),
            }));
        }

        let legal = config.legal_actions(table);
        if legal.is_empty() {
            return Err(ArcParseError::Decode(DecodeError::IllegalAction {
                action: expected.map_or_else(|| "<none>".to_string(), |id| id.to_string()),
                step,
                stack: config.stack().len(),
                buffer: config.buffer_len(),
            }));
        }

        let ctx = ScoringContext {
            config: &config,
            words,
            pos,
            legal: &legal,
            actions: table,
            previous: outcome.actions.last().copied(),
        };
        let choice = scorer.score(&ctx, expected)?;

        if !legal.contains(&choice.action) {
            return Err(malfunction(DecodeError::IllegalAction {
                action: table
                    .get(choice.action)
                    .map_or_else(|| format!("#{}", choice.action), ToString::to_string),
                step,
                stack: config.stack().len(),
                buffer: config.buffer_len(),
            }));
        }

        let applied = match expected {
            Some(id) => {
                if choice.action == id {
                    outcome.correct += 1;
                }
                config.apply(id, table)?;
                id
            }
            None => {
                config.apply(choice.action, table).map_err(malfunction)?;
                choice.action
            }
        };

        outcome.loss += choice.loss;
        outcome.actions.push(applied);
        step += 1;
    }

    if !config.is_terminal() {
        return Err(ArcParseError::Decode(config.unterminated()));
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::decode::compute_heads;

    fn table() -> ActionTable {
        ActionTable::from_actions([
            Action::shift(),
            Action::left_arc("dep"),
            Action::right_arc("dep"),
            Action::left_arc("root"),
        ])
    }

    /// Picks the last legal action, costs one unit per step.
    #[derive(Default)]
    struct Greedy {
        seen: usize,
        updates: usize,
    }

    impl Scorer for Greedy {
        fn score(&mut self, ctx: &ScoringContext<'_>, gold: Option<u32>) -> Result<Choice> {
            self.seen += 1;
            Ok(Choice {
                action: *ctx.legal.last().unwrap(),
                loss: if gold.is_some() { 1.0 } else { 0.0 },
            })
        }

        fn update(&mut self) -> Result<()> {
            self.updates += 1;
            Ok(())
        }

        fn discard(&mut self) {}
    }

    /// Always answers with an action the table does not have.
    struct Broken;

    impl Scorer for Broken {
        fn score(&mut self, _ctx: &ScoringContext<'_>, _gold: Option<u32>) -> Result<Choice> {
            Ok(Choice {
                action: 77,
                loss: 0.0,
            })
        }

        fn update(&mut self) -> Result<()> {
            Ok(())
        }

        fn discard(&mut self) {}
    }

    #[test]
    fn predicted_sequence_terminates() {
        let words = [5, 6, 7, 8];
        let mut scorer = Greedy::default();
        let outcome = parse_sentence(&mut scorer, &words, &[0; 4], None, &table()).unwrap();

        assert_eq!(outcome.actions.len(), 2 * words.len() - 1);
        let heads = compute_heads(words.len(), &outcome.actions, &table()).unwrap();
        assert_eq!(heads.len(), 3);
        assert_eq!(outcome.loss, 0.0);
    }

    #[test]
    fn gold_sequence_is_followed_and_scored() {
        let gold = [0, 0, 1, 0, 3];
        let mut scorer = Greedy::default();
        let outcome =
            parse_sentence(&mut scorer, &[4, 5, 6], &[0; 3], Some(&gold), &table()).unwrap();

        assert_eq!(outcome.actions, gold.to_vec());
        assert_eq!(outcome.loss, 5.0);
        assert_eq!(scorer.seen, 5);
        // Greedy picks the last legal action; it agrees with gold on the
        // shifts and on the final root attachment.
        assert_eq!(outcome.correct, 4);
    }

    #[test]
    fn illegal_choice_is_a_scorer_malfunction() {
        let err = parse_sentence(&mut Broken, &[4, 5], &[0; 2], None, &table()).unwrap_err();
        assert!(matches!(
            err,
            ArcParseError::ScorerMalfunction {
                source: DecodeError::IllegalAction { step: 0, .. },
                ..
            }
        ));
    }

    #[test]
    fn corrupt_gold_is_a_decode_error() {
        let mut scorer = Greedy::default();
        let err = parse_sentence(&mut scorer, &[4, 5, 6], &[0; 3], Some(&[0, 2]), &table())
            .unwrap_err();
        assert!(matches!(err, ArcParseError::Decode(_)));

        let err = parse_sentence(&mut scorer, &[4, 5, 6], &[0; 3], Some(&[0, 0]), &table())
            .unwrap_err();
        assert!(matches!(
            err,
            ArcParseError::Decode(DecodeError::Unterminated { .. })
        ));
    }
}
