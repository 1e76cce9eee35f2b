//! Retry policy for provider calls.
//!
//! Errors are classed as throttled, transient or fatal. Throttled submits
//! return to the credential pool; transient errors back off exponentially;
//! provider rejections and generation failures are never retried.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::classify;
pub use error::ClientError;
pub use policy::{FailureClass, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryFailure};
