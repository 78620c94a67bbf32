//! Terminal implementation of the core decision port.
//!
//! Every workflow decision arrives here as a closed set of labeled
//! options and is answered with `dialoguer` selections. Free-text input
//! never reaches the engine.

use dialoguer::{Confirm, Select};

use mergeadvisor_core::decision::{DecisionOption, DecisionPort};
use mergeadvisor_core::errors::DecisionError;

/// Interactive decision port backed by the terminal.
#[derive(Debug, Default)]
pub struct CliDecisionPort;

impl CliDecisionPort {
    pub fn new() -> Self {
        Self
    }
}

impl DecisionPort for CliDecisionPort {
    fn choose(&mut self, prompt: &str, options: &[DecisionOption]) -> Result<usize, DecisionError> {
        let items: Vec<String> = options
            .iter()
            .map(|o| match &o.detail {
                Some(detail) => format!("{} ({})", o.label, detail),
                None => o.label.clone(),
            })
            .collect();
        Select::new()
            .with_prompt(prompt)
            .items(&items)
            .default(0)
            .interact()
            .map_err(map_dialoguer_error)
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool, DecisionError> {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(map_dialoguer_error)
    }
}

fn map_dialoguer_error(err: dialoguer::Error) -> DecisionError {
    let dialoguer::Error::IO(io_err) = err;
    if io_err.kind() == std::io::ErrorKind::Interrupted {
        DecisionError::Aborted
    } else {
        DecisionError::InputClosed(io_err.to_string())
    }
}
