//! Interactive build selection.

use dialoguer::{theme::ColorfulTheme, Select};

use crate::error::{LogsError, Result};

/// Lets a user choose one of several names.
pub trait Picker: Send + Sync {
    /// Pick one of `names`, with `default` preselected when present.
    fn pick(&self, names: &[String], prompt: &str, default: &str) -> Result<String>;
}

/// Terminal picker
pub struct TerminalPicker;

impl Picker for TerminalPicker {
    fn pick(&self, names: &[String], prompt: &str, default: &str) -> Result<String> {
        let default_idx = names.iter().position(|n| n == default).unwrap_or(0);
        let idx = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default_idx)
            .items(names)
            .interact()
            .map_err(|e| LogsError::Picker(e.to_string()))?;
        names
            .get(idx)
            .cloned()
            .ok_or_else(|| LogsError::Picker(format!("selection {idx} out of range")))
    }
}

/// Picker for batch mode: always refuses.
pub struct NoPicker;

impl Picker for NoPicker {
    fn pick(&self, _names: &[String], _prompt: &str, _default: &str) -> Result<String> {
        Err(LogsError::MissingArgument("pipeline"))
    }
}
