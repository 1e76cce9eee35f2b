//! Job scheduler.
//!
//! Expands a project into an ordered queue of (scene, copy) jobs and drives
//! each job through the state machine: credential acquisition (global
//! spacing) → submit → poll → download. Projects in a run-all execute
//! strictly one after another and share one credential pool.

mod error;
mod events;
mod execute;
mod plan;
mod run;
mod settings;

pub use error::{JobError, SchedulerError};
pub use events::{JobEvent, RunEvent};
pub use plan::{build_queue, QueuedJob, RunRequest};
pub use run::{RunSummary, Scheduler};
pub use settings::SchedulerSettings;

#[cfg(test)]
mod tests;
