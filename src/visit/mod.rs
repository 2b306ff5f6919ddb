//! Telemedicine visit module.
//!
//! Creates the meeting through the credential gateway, starts local media
//! for one participant, and guarantees teardown on every exit path.

pub mod hook;
pub mod orchestrator;
pub mod state;

pub use hook::{MeetingEndedHook, MeetingEndedReport, ShellCommandHook};
pub use orchestrator::{EndOutcome, VisitOptions, VisitOrchestrator};
pub use state::{SessionState, VisitStatus};
