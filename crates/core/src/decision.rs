//! The human decision boundary.
//!
//! Every point where the workflow needs a human choice goes through
//! [`DecisionPort`]: a question plus a closed, enumerated set of labeled
//! options. The workflow blocks until a selection arrives and never parses
//! free text. Frontends implement the port (the CLI uses `dialoguer`);
//! tests use [`ScriptedDecisions`].

use std::collections::VecDeque;

use crate::errors::DecisionError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single selectable option presented to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOption {
    /// Short label shown in the selection list.
    pub label: String,
    /// Optional one-line detail (impact note, rationale).
    pub detail: Option<String>,
}

impl DecisionOption {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            detail: None,
        }
    }

    pub fn with_detail(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            detail: Some(detail.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Request/response boundary for human decisions.
///
/// Implementations block until a selection arrives; there is no timeout.
/// Cancellation surfaces as [`DecisionError::Aborted`], which the workflow
/// maps to an explicit abort.
pub trait DecisionPort {
    /// Ask a question with a closed set of options; returns the selected
    /// option's index into `options`.
    fn choose(&mut self, prompt: &str, options: &[DecisionOption]) -> Result<usize, DecisionError>;

    /// Yes/no confirmation.
    fn confirm(&mut self, prompt: &str) -> Result<bool, DecisionError>;
}

// ---------------------------------------------------------------------------
// Scripted port
// ---------------------------------------------------------------------------

/// A decision port answering from a pre-programmed script.
///
/// Used by tests and by non-interactive invocations that pre-select every
/// answer. Running out of scripted answers is treated as a closed input
/// stream, never as an implicit default.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    choices: VecDeque<usize>,
    confirms: VecDeque<bool>,
}

impl ScriptedDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the index to return from the next `choose` call.
    pub fn push_choice(&mut self, index: usize) -> &mut Self {
        self.choices.push_back(index);
        self
    }

    /// Queue the answer to return from the next `confirm` call.
    pub fn push_confirm(&mut self, answer: bool) -> &mut Self {
        self.confirms.push_back(answer);
        self
    }
}

impl DecisionPort for ScriptedDecisions {
    fn choose(&mut self, prompt: &str, options: &[DecisionOption]) -> Result<usize, DecisionError> {
        let index = self
            .choices
            .pop_front()
            .ok_or_else(|| DecisionError::InputClosed(format!("no scripted answer for: {prompt}")))?;
        if index >= options.len() {
            return Err(DecisionError::InputClosed(format!(
                "scripted answer {index} out of range for {} options",
                options.len()
            )));
        }
        Ok(index)
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool, DecisionError> {
        self.confirms
            .pop_front()
            .ok_or_else(|| DecisionError::InputClosed(format!("no scripted answer for: {prompt}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(labels: &[&str]) -> Vec<DecisionOption> {
        labels.iter().map(|l| DecisionOption::new(*l)).collect()
    }

    #[test]
    fn test_scripted_answers_in_order() {
        let mut port = ScriptedDecisions::new();
        port.push_choice(1).push_choice(0).push_confirm(true);

        let opts = options(&["keep base", "keep incoming"]);
        assert_eq!(port.choose("first?", &opts).unwrap(), 1);
        assert_eq!(port.choose("second?", &opts).unwrap(), 0);
        assert!(port.confirm("sure?").unwrap());
    }

    #[test]
    fn test_exhausted_script_is_an_error() {
        let mut port = ScriptedDecisions::new();
        let opts = options(&["only option"]);
        assert!(matches!(
            port.choose("anything?", &opts),
            Err(DecisionError::InputClosed(_))
        ));
        assert!(matches!(
            port.confirm("anything?"),
            Err(DecisionError::InputClosed(_))
        ));
    }

    #[test]
    fn test_out_of_range_answer_is_an_error() {
        let mut port = ScriptedDecisions::new();
        port.push_choice(5);
        let opts = options(&["a", "b"]);
        assert!(matches!(
            port.choose("pick", &opts),
            Err(DecisionError::InputClosed(_))
        ));
    }
}
