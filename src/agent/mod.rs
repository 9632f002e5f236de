//! Agent module: conversation state, pending actions, and the chat session.

pub mod conversation;
pub mod orchestrator;
pub mod pending;
pub mod session;
pub mod submission;

pub use orchestrator::{NextStep, Orchestrator, Reply, ReplySource};
pub use pending::{PendingAction, TurnState};
pub use session::{ChatSession, SessionOutcome};
pub use submission::Command;
