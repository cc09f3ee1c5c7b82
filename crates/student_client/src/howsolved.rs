//! Per-assignment "how solved" status.
//!
//! Nothing is shown speculatively: a transition only flips `saving` until the
//! server answers, then adopts the server's value.

use std::sync::Arc;

use shared::domain::{AssignmentId, HowSolvedStatus, SolvedKind};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    bus::{NotificationBus, NotificationEvent},
    transport::{StudentTransport, TransportError},
};

pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred!";

/// Blocking, user-visible error surface of the page.
pub trait UserNotifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

pub struct LogNotifier;

impl UserNotifier for LogNotifier {
    fn notify_error(&self, message: &str) {
        error!("{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonTier {
    Default,
    Success,
    Warning,
}

impl ButtonTier {
    pub fn css_class(self) -> &'static str {
        match self {
            ButtonTier::Default => "btn-default",
            ButtonTier::Success => "btn-success",
            ButtonTier::Warning => "btn-warning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerTier {
    NotSolved,
    SolvedByMyself,
    SolvedWithHelp,
}

impl ContainerTier {
    pub fn css_class(self) -> &'static str {
        match self {
            ContainerTier::NotSolved => "trix-assignment-notsolved",
            ContainerTier::SolvedByMyself => "trix-assignment-solvedbymyself",
            ContainerTier::SolvedWithHelp => "trix-assignment-solvedwithhelp",
        }
    }
}

pub fn button_tier(status: HowSolvedStatus) -> ButtonTier {
    match status {
        HowSolvedStatus::SolvedByMyself => ButtonTier::Success,
        HowSolvedStatus::SolvedWithHelp => ButtonTier::Warning,
        HowSolvedStatus::NotSolved => ButtonTier::Default,
    }
}

pub fn container_tier(status: HowSolvedStatus) -> ContainerTier {
    match status {
        HowSolvedStatus::SolvedByMyself => ContainerTier::SolvedByMyself,
        HowSolvedStatus::SolvedWithHelp => ContainerTier::SolvedWithHelp,
        HowSolvedStatus::NotSolved => ContainerTier::NotSolved,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HowSolvedView {
    pub status: HowSolvedStatus,
    pub saving: bool,
    pub button: ButtonTier,
    pub container: ContainerTier,
}

#[derive(Debug, Error)]
pub enum HowSolvedError {
    #[error("assignment {0} is already saving a status change")]
    SaveInProgress(AssignmentId),
    #[error("failed to save status of assignment {assignment_id}: {source}")]
    Save {
        assignment_id: AssignmentId,
        #[source]
        source: TransportError,
    },
}

#[derive(Debug, Default)]
struct HowSolvedState {
    status: HowSolvedStatus,
    saving: bool,
}

pub struct HowSolvedWidget {
    assignment_id: AssignmentId,
    transport: Arc<dyn StudentTransport>,
    bus: NotificationBus,
    notifier: Arc<dyn UserNotifier>,
    state: Mutex<HowSolvedState>,
}

impl HowSolvedWidget {
    /// `initial` is the status the server rendered the assignment with.
    pub fn new(
        assignment_id: AssignmentId,
        initial: HowSolvedStatus,
        transport: Arc<dyn StudentTransport>,
        bus: NotificationBus,
        notifier: Arc<dyn UserNotifier>,
    ) -> Self {
        Self {
            assignment_id,
            transport,
            bus,
            notifier,
            state: Mutex::new(HowSolvedState {
                status: initial,
                saving: false,
            }),
        }
    }

    pub fn assignment_id(&self) -> AssignmentId {
        self.assignment_id
    }

    pub async fn view(&self) -> HowSolvedView {
        let state = self.state.lock().await;
        HowSolvedView {
            status: state.status,
            saving: state.saving,
            button: button_tier(state.status),
            container: container_tier(state.status),
        }
    }

    pub async fn solved_by_myself(&self) -> Result<HowSolvedStatus, HowSolvedError> {
        self.mark_solved(SolvedKind::ByMyself).await
    }

    pub async fn solved_with_help(&self) -> Result<HowSolvedStatus, HowSolvedError> {
        self.mark_solved(SolvedKind::WithHelp).await
    }

    /// Submits `kind`, also when the assignment is already solved the other
    /// way; the server decides the resulting status.
    pub async fn mark_solved(&self, kind: SolvedKind) -> Result<HowSolvedStatus, HowSolvedError> {
        self.begin_save().await?;
        match self.transport.set_howsolved(self.assignment_id, kind).await {
            Ok(status) => Ok(self.finish_save(status).await),
            Err(source) => Err(self.fail_save(source).await),
        }
    }

    /// Clears the status. A missing record on the server counts as cleared.
    pub async fn not_solved(&self) -> Result<HowSolvedStatus, HowSolvedError> {
        self.begin_save().await?;
        match self.transport.clear_howsolved(self.assignment_id).await {
            Ok(()) => Ok(self.finish_save(HowSolvedStatus::NotSolved).await),
            Err(source) if source.is_not_found() => {
                info!(
                    assignment_id = self.assignment_id.0,
                    "howsolved: nothing to clear on server"
                );
                Ok(self.finish_save(HowSolvedStatus::NotSolved).await)
            }
            Err(source) => Err(self.fail_save(source).await),
        }
    }

    async fn begin_save(&self) -> Result<(), HowSolvedError> {
        let mut state = self.state.lock().await;
        if state.saving {
            return Err(HowSolvedError::SaveInProgress(self.assignment_id));
        }
        state.saving = true;
        Ok(())
    }

    async fn finish_save(&self, status: HowSolvedStatus) -> HowSolvedStatus {
        let changed = {
            let mut state = self.state.lock().await;
            state.saving = false;
            let changed = state.status != status;
            state.status = status;
            changed
        };
        info!(
            assignment_id = self.assignment_id.0,
            %status,
            changed,
            "howsolved: saved"
        );
        if changed {
            self.bus.emit(NotificationEvent::ProgressChanged);
        }
        status
    }

    async fn fail_save(&self, source: TransportError) -> HowSolvedError {
        warn!(
            assignment_id = self.assignment_id.0,
            error = %source,
            "howsolved: save failed"
        );
        self.state.lock().await.saving = false;
        self.notifier.notify_error(GENERIC_ERROR_MESSAGE);
        HowSolvedError::Save {
            assignment_id: self.assignment_id,
            source,
        }
    }
}

#[cfg(test)]
#[path = "tests/howsolved_tests.rs"]
mod tests;
