//! Terminal rendering of the protection dialog.
//!
//! Reads one action per line from stdin and redraws whenever the dialog snapshot changes.
//! End of input counts as Cancel.

use tokio::sync::mpsc;
use vetrack_core::{DialogAction, DialogHandle, DialogSnapshot, DialogState};

pub async fn run(dialog: &DialogHandle) -> anyhow::Result<()> {
    let mut updates = dialog.subscribe();
    updates.wait_for(|snapshot| snapshot.is_open).await?;

    let mut last = updates.borrow_and_update().clone();
    println!("{}", render(&last));

    let mut lines = stdin_lines();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                changed?;
                let snapshot = updates.borrow_and_update().clone();
                if !snapshot.is_open {
                    break;
                }
                if snapshot != last {
                    println!("{}", render(&snapshot));
                    last = snapshot;
                }
            }
            line = lines.recv() => match line {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => match line.parse::<DialogAction>() {
                    Ok(action) => {
                        if let Err(err) = dialog.act(action).await {
                            eprintln!("{err}");
                        }
                    }
                    Err(err) => eprintln!("{err}"),
                },
                None => {
                    let _ = dialog.act(DialogAction::Cancel).await;
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Stdin is read on a detached thread so a pending read never holds up process exit.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Text shown for one dialog snapshot, ending with the actions the user may type.
pub fn render(snapshot: &DialogSnapshot) -> String {
    let status = snapshot.target_status.as_deref().unwrap_or_default();
    let patient = snapshot.patient_name.as_deref().unwrap_or_default();

    let message = match snapshot.state {
        DialogState::Closed => return String::new(),
        DialogState::AwaitingConfirmation => {
            format!("Change {patient} to '{status}'?")
        }
        DialogState::DelayCountdown => format!(
            "'{status}' is a critical status for {patient}. Apply unlocks in {}s.",
            snapshot.countdown_seconds_remaining
        ),
        DialogState::DelayElapsed => format!("Ready to move {patient} to '{status}'."),
        DialogState::DoubleConfirmFirst => {
            format!("Warning: '{status}' is a protected status. Continue with {patient}?")
        }
        DialogState::DoubleConfirmFinal => {
            format!(
                "FINAL WARNING: {patient} will be moved to '{status}'. Are you absolutely sure?"
            )
        }
    };

    let actions: Vec<&str> = snapshot
        .available_actions
        .iter()
        .map(DialogAction::as_str)
        .collect();
    format!("{message} [{}]", actions.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vetrack_core::ProtectionLevel;

    fn snapshot(state: DialogState, remaining: u32) -> DialogSnapshot {
        DialogSnapshot {
            state,
            is_open: true,
            target_status: Some("In Surgery".into()),
            patient_name: Some("Biscuit".into()),
            protection_level: ProtectionLevel::Delay,
            countdown_seconds_remaining: remaining,
            is_delay_elapsed: remaining == 0,
            has_passed_first_confirmation: false,
            available_actions: state.available_actions().to_vec(),
        }
    }

    #[test]
    fn countdown_offers_only_cancel() {
        let text = render(&snapshot(DialogState::DelayCountdown, 3));
        assert!(text.contains("unlocks in 3s"));
        assert!(text.ends_with("[cancel]"));
    }

    #[test]
    fn elapsed_countdown_offers_apply() {
        let text = render(&snapshot(DialogState::DelayElapsed, 0));
        assert!(text.ends_with("[apply/cancel]"));
    }

    #[test]
    fn closed_dialog_renders_nothing() {
        assert!(render(&DialogSnapshot::closed()).is_empty());
    }
}
