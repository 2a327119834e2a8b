//! Status change protection dialog.
//!
//! A protected status change walks the user through one of three confirmation rituals before
//! the caller's `on_confirm` runs:
//!
//! | level           | states                                         | confirming action |
//! |-----------------|------------------------------------------------|-------------------|
//! | `confirmation`  | `AwaitingConfirmation`                         | `Confirm`         |
//! | `delay`         | `DelayCountdown` then `DelayElapsed`           | `Apply`           |
//! | `double_confirm`| `DoubleConfirmFirst` then `DoubleConfirmFinal` | `Continue`, `Apply` |
//!
//! `Cancel` is available in every open state. Exactly one of `on_confirm` / `on_cancel` runs
//! per request, and only in response to a user action; the countdown timer only ever unlocks
//! `Apply`.
//!
//! [`ProtectionDialog`] is the state machine itself. [`DialogDriver`] owns one dialog on a
//! single task and feeds it user commands and countdown ticks, commands first.

mod driver;
mod machine;

pub use driver::{DialogDriver, DialogHandle};
pub use machine::{
    Callback, DialogSnapshot, DialogState, OpenOutcome, ProtectionDialog, StatusChangeRequest,
};

use serde::Serialize;
use std::fmt;

/// A button the user can press in the dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogAction {
    Confirm,
    Continue,
    Apply,
    Cancel,
}

impl DialogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogAction::Confirm => "confirm",
            DialogAction::Continue => "continue",
            DialogAction::Apply => "apply",
            DialogAction::Cancel => "cancel",
        }
    }
}

impl fmt::Display for DialogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DialogAction {
    type Err = DialogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirm" => Ok(DialogAction::Confirm),
            "continue" => Ok(DialogAction::Continue),
            "apply" => Ok(DialogAction::Apply),
            "cancel" => Ok(DialogAction::Cancel),
            other => Err(DialogError::UnknownAction(other.to_string())),
        }
    }
}

/// Rejected dialog interactions. None of these change dialog state or fire a callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DialogError {
    #[error("no status change is awaiting confirmation")]
    NoActiveRequest,
    #[error("'{action}' is not available while the dialog is {state}")]
    ActionUnavailable {
        action: DialogAction,
        state: DialogState,
    },
    #[error("unknown dialog action: {0}")]
    UnknownAction(String),
    #[error("dialog driver has stopped")]
    DriverStopped,
}
