use super::{DialogAction, DialogError};
use crate::status::ProtectionLevel;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Completion callback supplied by the caller. Runs at most once.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

/// A pending attempt to move one patient to a new status.
///
/// The request carries no patient id: the callbacks close over whatever context the caller
/// needs to commit or report.
pub struct StatusChangeRequest {
    target_status: String,
    patient_name: String,
    protection_level: ProtectionLevel,
    on_confirm: Callback,
    on_cancel: Callback,
}

impl StatusChangeRequest {
    pub fn new(
        target_status: impl Into<String>,
        patient_name: impl Into<String>,
        protection_level: ProtectionLevel,
        on_confirm: impl FnOnce() + Send + 'static,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            target_status: target_status.into(),
            patient_name: patient_name.into(),
            protection_level,
            on_confirm: Box::new(on_confirm),
            on_cancel: Box::new(on_cancel),
        }
    }

    pub fn target_status(&self) -> &str {
        &self.target_status
    }

    pub fn patient_name(&self) -> &str {
        &self.patient_name
    }

    pub fn protection_level(&self) -> ProtectionLevel {
        self.protection_level
    }

    /// Runs `on_confirm`, consuming the request so neither callback can run again.
    pub(crate) fn confirm(self) {
        (self.on_confirm)();
    }
}

impl fmt::Debug for StatusChangeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusChangeRequest")
            .field("target_status", &self.target_status)
            .field("patient_name", &self.patient_name)
            .field("protection_level", &self.protection_level)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    Closed,
    AwaitingConfirmation,
    DelayCountdown,
    DelayElapsed,
    DoubleConfirmFirst,
    DoubleConfirmFinal,
}

impl DialogState {
    /// Actions the user may take in this state.
    pub fn available_actions(&self) -> &'static [DialogAction] {
        match self {
            DialogState::Closed => &[],
            DialogState::AwaitingConfirmation => &[DialogAction::Confirm, DialogAction::Cancel],
            DialogState::DelayCountdown => &[DialogAction::Cancel],
            DialogState::DelayElapsed => &[DialogAction::Apply, DialogAction::Cancel],
            DialogState::DoubleConfirmFirst => &[DialogAction::Continue, DialogAction::Cancel],
            DialogState::DoubleConfirmFinal => &[DialogAction::Apply, DialogAction::Cancel],
        }
    }

    pub fn allows(&self, action: DialogAction) -> bool {
        self.available_actions().contains(&action)
    }

    fn initial_for(level: ProtectionLevel) -> Option<Self> {
        match level {
            ProtectionLevel::None => None,
            ProtectionLevel::Confirmation => Some(DialogState::AwaitingConfirmation),
            ProtectionLevel::Delay => Some(DialogState::DelayCountdown),
            ProtectionLevel::DoubleConfirm => Some(DialogState::DoubleConfirmFirst),
        }
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DialogState::Closed => "closed",
            DialogState::AwaitingConfirmation => "awaiting confirmation",
            DialogState::DelayCountdown => "counting down",
            DialogState::DelayElapsed => "ready to apply",
            DialogState::DoubleConfirmFirst => "awaiting first confirmation",
            DialogState::DoubleConfirmFinal => "awaiting final confirmation",
        };
        f.write_str(label)
    }
}

/// Result of handing a request to the dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Unprotected status: `on_confirm` already ran, no dialog was shown.
    Bypassed,
    /// The dialog is open in `state`. `replaced_previous` is set when an open request was
    /// torn down to make room; its callbacks did not run.
    Opened {
        state: DialogState,
        replaced_previous: bool,
    },
}

/// Point-in-time view of the dialog for rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DialogSnapshot {
    pub state: DialogState,
    pub is_open: bool,
    pub target_status: Option<String>,
    pub patient_name: Option<String>,
    pub protection_level: ProtectionLevel,
    pub countdown_seconds_remaining: u32,
    pub is_delay_elapsed: bool,
    pub has_passed_first_confirmation: bool,
    pub available_actions: Vec<DialogAction>,
}

impl DialogSnapshot {
    pub fn closed() -> Self {
        Self {
            state: DialogState::Closed,
            is_open: false,
            target_status: None,
            patient_name: None,
            protection_level: ProtectionLevel::None,
            countdown_seconds_remaining: 0,
            is_delay_elapsed: false,
            has_passed_first_confirmation: false,
            available_actions: Vec::new(),
        }
    }
}

/// Everything that lives only while a request is open. Dropping it drops the countdown timer
/// and both callbacks without running either.
struct DialogRuntimeState {
    request: StatusChangeRequest,
    state: DialogState,
    countdown_seconds_remaining: u32,
    is_delay_elapsed: bool,
    has_passed_first_confirmation: bool,
    countdown: Option<Interval>,
}

/// The protection dialog state machine. At most one request is open at a time.
pub struct ProtectionDialog {
    delay_seconds: u32,
    active: Option<DialogRuntimeState>,
}

impl ProtectionDialog {
    /// Creates a closed dialog whose `Delay` countdown starts at `delay_seconds`.
    pub fn new(delay_seconds: u32) -> Self {
        Self {
            delay_seconds: delay_seconds.max(1),
            active: None,
        }
    }

    /// Opens `request`, tearing down any request that is already open.
    ///
    /// Unprotected requests never open the dialog: `on_confirm` runs before this returns and
    /// any open request is left untouched.
    ///
    /// # Panics
    ///
    /// Opening a `Delay` request arms a Tokio timer and must happen inside a Tokio runtime.
    pub fn open(&mut self, request: StatusChangeRequest) -> OpenOutcome {
        let Some(state) = DialogState::initial_for(request.protection_level) else {
            tracing::debug!(
                status = request.target_status(),
                "unprotected status change, applying immediately"
            );
            request.confirm();
            return OpenOutcome::Bypassed;
        };

        let replaced_previous = match self.active.take() {
            Some(previous) => {
                tracing::info!(
                    replaced = previous.request.target_status(),
                    patient = previous.request.patient_name(),
                    "discarding open status change for a new request"
                );
                true
            }
            None => false,
        };

        let countdown = (state == DialogState::DelayCountdown).then(|| {
            let mut timer = interval_at(Instant::now() + COUNTDOWN_PERIOD, COUNTDOWN_PERIOD);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        tracing::info!(
            status = request.target_status(),
            patient = request.patient_name(),
            level = %request.protection_level,
            "protected status change awaiting confirmation"
        );

        self.active = Some(DialogRuntimeState {
            request,
            state,
            countdown_seconds_remaining: if countdown.is_some() {
                self.delay_seconds
            } else {
                0
            },
            is_delay_elapsed: false,
            has_passed_first_confirmation: false,
            countdown,
        });

        OpenOutcome::Opened {
            state,
            replaced_previous,
        }
    }

    /// Applies a user action and returns the resulting state.
    ///
    /// # Errors
    ///
    /// [`DialogError::NoActiveRequest`] when the dialog is closed, and
    /// [`DialogError::ActionUnavailable`] when the current state does not offer `action`.
    pub fn act(&mut self, action: DialogAction) -> Result<DialogState, DialogError> {
        let active = self.active.as_mut().ok_or(DialogError::NoActiveRequest)?;

        if !active.state.allows(action) {
            return Err(DialogError::ActionUnavailable {
                action,
                state: active.state,
            });
        }

        if action == DialogAction::Continue {
            active.has_passed_first_confirmation = true;
            active.state = DialogState::DoubleConfirmFinal;
            return Ok(active.state);
        }

        let Some(finished) = self.active.take() else {
            return Err(DialogError::NoActiveRequest);
        };
        let DialogRuntimeState {
            request,
            countdown,
            state,
            ..
        } = finished;
        drop(countdown);

        if action == DialogAction::Cancel {
            tracing::info!(
                status = request.target_status(),
                patient = request.patient_name(),
                from = %state,
                "protected status change cancelled"
            );
            (request.on_cancel)();
        } else {
            tracing::info!(
                status = request.target_status(),
                patient = request.patient_name(),
                "protected status change confirmed"
            );
            (request.on_confirm)();
        }

        Ok(DialogState::Closed)
    }

    /// Waits for the next countdown tick and applies it, returning the seconds remaining.
    ///
    /// Never resolves unless a countdown is running, so it can sit in a `select!` next to user
    /// input without spinning.
    pub async fn tick(&mut self) -> u32 {
        match self.active.as_mut().and_then(|a| a.countdown.as_mut()) {
            Some(countdown) => {
                countdown.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
        self.apply_tick()
    }

    fn apply_tick(&mut self) -> u32 {
        let Some(active) = self.active.as_mut() else {
            return 0;
        };
        if active.state != DialogState::DelayCountdown {
            active.countdown = None;
            return active.countdown_seconds_remaining;
        }

        active.countdown_seconds_remaining = active.countdown_seconds_remaining.saturating_sub(1);
        if active.countdown_seconds_remaining == 0 {
            active.state = DialogState::DelayElapsed;
            active.is_delay_elapsed = true;
            active.countdown = None;
            tracing::debug!(
                status = active.request.target_status(),
                "countdown elapsed, apply unlocked"
            );
        }
        active.countdown_seconds_remaining
    }

    /// Closes the dialog as if the user pressed Cancel. Returns whether a request was open.
    pub fn shutdown(&mut self) -> bool {
        if self.active.is_none() {
            return false;
        }
        self.act(DialogAction::Cancel).is_ok()
    }

    pub fn state(&self) -> DialogState {
        self.active
            .as_ref()
            .map_or(DialogState::Closed, |active| active.state)
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    pub fn countdown_seconds_remaining(&self) -> u32 {
        self.active
            .as_ref()
            .map_or(0, |active| active.countdown_seconds_remaining)
    }

    pub fn is_delay_elapsed(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.is_delay_elapsed)
    }

    pub fn has_passed_first_confirmation(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.has_passed_first_confirmation)
    }

    pub fn is_countdown_armed(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.countdown.is_some())
    }

    pub fn snapshot(&self) -> DialogSnapshot {
        let Some(active) = self.active.as_ref() else {
            return DialogSnapshot::closed();
        };
        DialogSnapshot {
            state: active.state,
            is_open: true,
            target_status: Some(active.request.target_status.clone()),
            patient_name: Some(active.request.patient_name.clone()),
            protection_level: active.request.protection_level,
            countdown_seconds_remaining: active.countdown_seconds_remaining,
            is_delay_elapsed: active.is_delay_elapsed,
            has_passed_first_confirmation: active.has_passed_first_confirmation,
            available_actions: active.state.available_actions().to_vec(),
        }
    }
}
