//! Wiring between the resolver, the dialog and the patient store.
//!
//! [`StatusChangeWorkflow::change_status`] resolves the protection level once, builds the
//! request whose `on_confirm` commits through a [`StatusCommitter`], and hands it to the
//! dialog. Unprotected changes never reach the dialog.

use crate::dialog::{DialogError, DialogHandle, DialogState, OpenOutcome, StatusChangeRequest};
use crate::ids::PatientId;
use crate::patient::{Patient, StatusCommitter};
use crate::protection::ProtectionPolicyResolver;
use crate::status::ProtectionLevel;
use crate::TrackerError;
use std::sync::Arc;
use tokio::sync::mpsc;

/// How a status change request ended.
#[derive(Debug)]
pub enum ChangeOutcome {
    Committed(Patient),
    CommitFailed(TrackerError),
    Cancelled,
    /// Another request replaced this one before it was answered.
    Superseded,
}

/// A request that has been handed to the dialog (or already applied, if unprotected).
#[derive(Debug)]
pub struct PendingChange {
    protection_level: ProtectionLevel,
    opened_in: Option<DialogState>,
    outcome: mpsc::UnboundedReceiver<ChangeOutcome>,
}

impl PendingChange {
    pub fn protection_level(&self) -> ProtectionLevel {
        self.protection_level
    }

    /// State the dialog opened in, or `None` when the change bypassed the dialog.
    pub fn opened_in(&self) -> Option<DialogState> {
        self.opened_in
    }

    /// Waits for the request to be confirmed, cancelled or replaced.
    pub async fn outcome(mut self) -> ChangeOutcome {
        self.outcome.recv().await.unwrap_or(ChangeOutcome::Superseded)
    }
}

#[derive(Clone)]
pub struct StatusChangeWorkflow {
    resolver: ProtectionPolicyResolver,
    dialog: DialogHandle,
    committer: Arc<dyn StatusCommitter>,
}

impl StatusChangeWorkflow {
    pub fn new(
        resolver: ProtectionPolicyResolver,
        dialog: DialogHandle,
        committer: Arc<dyn StatusCommitter>,
    ) -> Self {
        Self {
            resolver,
            dialog,
            committer,
        }
    }

    pub fn dialog(&self) -> &DialogHandle {
        &self.dialog
    }

    /// Starts moving `patient` to `target_status`.
    ///
    /// For an unprotected status the commit has already happened when this returns.
    ///
    /// The committer is synchronous and runs inline on whichever task fires `on_confirm`: the
    /// caller's for unprotected changes, the dialog driver's otherwise. A committer doing slow
    /// I/O stalls the countdown for that long.
    pub async fn change_status(
        &self,
        patient: &Patient,
        target_status: &str,
    ) -> Result<PendingChange, DialogError> {
        let protection_level = self.resolver.resolve(target_status);
        let (sender, outcome) = mpsc::unbounded_channel();
        let request = self.build_request(
            patient.id.clone(),
            &patient.name,
            target_status,
            protection_level,
            sender,
        );

        let opened_in = if protection_level == ProtectionLevel::None {
            request.confirm();
            None
        } else {
            match self.dialog.open(request).await? {
                OpenOutcome::Opened { state, .. } => Some(state),
                OpenOutcome::Bypassed => None,
            }
        };

        Ok(PendingChange {
            protection_level,
            opened_in,
            outcome,
        })
    }

    fn build_request(
        &self,
        patient_id: PatientId,
        patient_name: &str,
        target_status: &str,
        protection_level: ProtectionLevel,
        sender: mpsc::UnboundedSender<ChangeOutcome>,
    ) -> StatusChangeRequest {
        let committer = self.committer.clone();
        let status = target_status.to_string();
        let on_cancel_sender = sender.clone();

        StatusChangeRequest::new(
            target_status,
            patient_name,
            protection_level,
            move || {
                let outcome = match committer.commit(&patient_id, &status) {
                    Ok(patient) => ChangeOutcome::Committed(patient),
                    Err(err) => {
                        tracing::error!(
                            patient_id = %patient_id,
                            error = %err,
                            "status commit failed"
                        );
                        ChangeOutcome::CommitFailed(err)
                    }
                };
                let _ = sender.send(outcome);
            },
            move || {
                let _ = on_cancel_sender.send(ChangeOutcome::Cancelled);
            },
        )
    }
}
