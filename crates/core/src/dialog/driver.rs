use super::machine::{
    DialogSnapshot, DialogState, OpenOutcome, ProtectionDialog, StatusChangeRequest,
};
use super::{DialogAction, DialogError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 16;

enum DialogCommand {
    Open {
        request: StatusChangeRequest,
        reply: oneshot::Sender<OpenOutcome>,
    },
    Act {
        action: DialogAction,
        reply: oneshot::Sender<Result<DialogState, DialogError>>,
    },
}

/// Cloneable front end to a running [`DialogDriver`].
#[derive(Clone)]
pub struct DialogHandle {
    commands: mpsc::Sender<DialogCommand>,
    snapshots: watch::Receiver<DialogSnapshot>,
}

impl DialogHandle {
    /// Hands `request` to the dialog, replacing any open request.
    pub async fn open(&self, request: StatusChangeRequest) -> Result<OpenOutcome, DialogError> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(DialogCommand::Open { request, reply })
            .await
            .map_err(|_| DialogError::DriverStopped)?;
        outcome.await.map_err(|_| DialogError::DriverStopped)
    }

    /// Presses a dialog button.
    pub async fn act(&self, action: DialogAction) -> Result<DialogState, DialogError> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(DialogCommand::Act { action, reply })
            .await
            .map_err(|_| DialogError::DriverStopped)?;
        outcome.await.map_err(|_| DialogError::DriverStopped)?
    }

    pub fn snapshot(&self) -> DialogSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that observes every state change, including countdown ticks.
    pub fn subscribe(&self) -> watch::Receiver<DialogSnapshot> {
        self.snapshots.clone()
    }
}

/// Owns the single [`ProtectionDialog`] and serialises everything that touches it.
///
/// User commands are polled before the countdown, so a Cancel queued alongside a due tick is
/// applied first and the tick never lands.
pub struct DialogDriver {
    dialog: ProtectionDialog,
    commands: mpsc::Receiver<DialogCommand>,
    snapshots: watch::Sender<DialogSnapshot>,
}

impl DialogDriver {
    pub fn new(dialog: ProtectionDialog) -> (Self, DialogHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(dialog.snapshot());

        let driver = Self {
            dialog,
            commands: command_rx,
            snapshots: snapshot_tx,
        };
        let handle = DialogHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (driver, handle)
    }

    /// Spawns the driver on the current runtime.
    pub fn spawn(dialog: ProtectionDialog) -> (DialogHandle, JoinHandle<()>) {
        let (driver, handle) = Self::new(dialog);
        (handle, tokio::spawn(driver.run()))
    }

    /// Runs until every [`DialogHandle`] has been dropped. A request still open at that point
    /// is cancelled.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                remaining = self.dialog.tick() => {
                    tracing::trace!(remaining, "countdown tick");
                }
            }
            self.publish();
        }

        if self.dialog.shutdown() {
            tracing::info!("dialog driver stopped with a request open, cancelled it");
        }
        self.publish();
    }

    fn handle(&mut self, command: DialogCommand) {
        match command {
            DialogCommand::Open { request, reply } => {
                let outcome = self.dialog.open(request);
                let _ = reply.send(outcome);
            }
            DialogCommand::Act { action, reply } => {
                let result = self.dialog.act(action);
                if let Err(err) = &result {
                    tracing::debug!(%action, error = %err, "dialog action rejected");
                }
                let _ = reply.send(result);
            }
        }
    }

    fn publish(&self) {
        let snapshot = self.dialog.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ProtectionLevel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    fn counted(
        status: &str,
        level: ProtectionLevel,
    ) -> (StatusChangeRequest, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let confirmed = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicUsize::new(0));
        let (c, x) = (confirmed.clone(), cancelled.clone());
        let request = StatusChangeRequest::new(
            status,
            "Pepper",
            level,
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                x.fetch_add(1, Ordering::SeqCst);
            },
        );
        (request, confirmed, cancelled)
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_runs_on_driver_and_unlocks_apply() {
        let (handle, _task) = DialogDriver::spawn(ProtectionDialog::new(5));
        let (request, confirmed, cancelled) = counted("In Surgery", ProtectionLevel::Delay);

        let outcome = handle.open(request).await.expect("open");
        assert!(matches!(
            outcome,
            OpenOutcome::Opened {
                state: DialogState::DelayCountdown,
                ..
            }
        ));

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(handle.snapshot().countdown_seconds_remaining, 3);
        assert!(handle.act(DialogAction::Apply).await.is_err());

        sleep(Duration::from_secs(3)).await;
        let snapshot = handle.snapshot();
        assert!(snapshot.is_delay_elapsed);
        assert_eq!(snapshot.state, DialogState::DelayElapsed);

        assert_eq!(
            handle.act(DialogAction::Apply).await,
            Ok(DialogState::Closed)
        );
        assert_eq!(confirmed.load(Ordering::SeqCst), 1);
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_countdown_freezes_snapshots() {
        let (handle, _task) = DialogDriver::spawn(ProtectionDialog::new(5));
        let mut updates = handle.subscribe();
        let (request, confirmed, cancelled) = counted("In Surgery", ProtectionLevel::Delay);

        handle.open(request).await.expect("open");
        sleep(Duration::from_millis(2_500)).await;
        handle.act(DialogAction::Cancel).await.expect("cancel");
        assert_eq!(handle.snapshot(), DialogSnapshot::closed());

        let _ = updates.borrow_and_update();
        sleep(Duration::from_secs(10)).await;
        assert!(!updates.has_changed().expect("driver alive"));
        assert_eq!(confirmed.load(Ordering::SeqCst), 0);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_commands_win_over_a_due_tick() {
        let (request, confirmed, cancelled) = counted("In Surgery", ProtectionLevel::Delay);
        let mut dialog = ProtectionDialog::new(1);
        dialog.open(request);

        // The only tick is due before the driver polls anything.
        tokio::time::advance(Duration::from_millis(1_500)).await;
        let (driver, handle) = DialogDriver::new(dialog);

        let (apply_reply, apply_result) = oneshot::channel();
        let (cancel_reply, cancel_result) = oneshot::channel();
        for (action, reply) in [
            (DialogAction::Apply, apply_reply),
            (DialogAction::Cancel, cancel_reply),
        ] {
            handle
                .commands
                .send(DialogCommand::Act { action, reply })
                .await
                .expect("queue command");
        }

        let mut updates = handle.subscribe();
        let task = tokio::spawn(driver.run());

        assert_eq!(
            apply_result.await.expect("apply reply"),
            Err(DialogError::ActionUnavailable {
                action: DialogAction::Apply,
                state: DialogState::DelayCountdown,
            })
        );
        assert_eq!(
            cancel_result.await.expect("cancel reply"),
            Ok(DialogState::Closed)
        );
        assert_eq!(handle.snapshot(), DialogSnapshot::closed());

        let _ = updates.borrow_and_update();
        sleep(Duration::from_secs(5)).await;
        assert!(!updates.has_changed().expect("driver alive"));

        drop(updates);
        drop(handle);
        task.await.expect("driver exits cleanly");
        assert_eq!(confirmed.load(Ordering::SeqCst), 0);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_cancels_open_request() {
        let (handle, task) = DialogDriver::spawn(ProtectionDialog::new(5));
        let (request, confirmed, cancelled) =
            counted("Emergency Care", ProtectionLevel::DoubleConfirm);
        handle.open(request).await.expect("open");

        drop(handle);
        task.await.expect("driver exits cleanly");
        assert_eq!(confirmed.load(Ordering::SeqCst), 0);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_driver_reports_stopped() {
        let (driver, handle) = DialogDriver::new(ProtectionDialog::new(5));
        drop(driver);
        assert_eq!(
            handle.act(DialogAction::Cancel).await,
            Err(DialogError::DriverStopped)
        );
    }
}
