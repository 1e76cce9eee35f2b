//! CLI command handlers, one file per command.

mod clear;
mod project;
mod run;
mod status;
mod verify;

pub use clear::run_clear;
pub use project::{run_project_create, run_project_list};
pub use run::run_projects;
pub use status::run_status;
pub use verify::run_verify;
