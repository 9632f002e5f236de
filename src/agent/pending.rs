//! Single-slot pending action state machine.
//!
//! At most one action awaits confirmation at a time. A second proposal is
//! rejected until the first is confirmed or cancelled.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::OrchestratorError;

/// Turn-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// No pending action.
    Idle,
    /// One action is waiting for confirm or cancel.
    AwaitingConfirmation,
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingConfirmation => "awaiting_confirmation",
        };
        write!(f, "{s}")
    }
}

/// An action proposed to the user. `payload` is opaque to the slot.
#[derive(Debug, Clone, Serialize)]
pub struct PendingAction<P> {
    pub id: Uuid,
    pub description: String,
    pub payload: P,
    pub created_at: DateTime<Utc>,
}

/// Holds at most one pending action.
#[derive(Debug)]
pub struct ActionSlot<P> {
    pending: Option<PendingAction<P>>,
}

impl<P> Default for ActionSlot<P> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<P> ActionSlot<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TurnState {
        if self.pending.is_some() {
            TurnState::AwaitingConfirmation
        } else {
            TurnState::Idle
        }
    }

    pub fn current(&self) -> Option<&PendingAction<P>> {
        self.pending.as_ref()
    }

    /// Idle → AwaitingConfirmation. Leaves an existing action untouched on error.
    pub fn propose(
        &mut self,
        description: impl Into<String>,
        payload: P,
    ) -> Result<&PendingAction<P>, OrchestratorError> {
        if let Some(existing) = &self.pending {
            return Err(OrchestratorError::ActionAlreadyPending {
                description: existing.description.clone(),
            });
        }
        let action = PendingAction {
            id: Uuid::new_v4(),
            description: description.into(),
            payload,
            created_at: Utc::now(),
        };
        tracing::info!(
            action_id = %action.id,
            description = %action.description,
            "Action proposed"
        );
        Ok(self.pending.insert(action))
    }

    /// AwaitingConfirmation → Idle, handing back the action.
    pub fn take(&mut self) -> Result<PendingAction<P>, OrchestratorError> {
        self.pending.take().ok_or(OrchestratorError::NoPendingAction)
    }
}
