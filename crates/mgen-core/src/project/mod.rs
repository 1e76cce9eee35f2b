//! Projects, scenes, and generation jobs.
//!
//! A project decomposes into ordered scenes; each scene may request several
//! independent generation attempts ("copies") per artifact kind. Every
//! (scene, kind, copy) slot holds one `Job` whose status follows the state
//! machine in `status`.

mod layout;
mod scenes;
mod status;
mod types;

pub use layout::{artifact_path, project_dir_name, project_root};
pub use scenes::{load_scenes, parse_scenes, SceneInput};
pub use status::{JobStatus, TransitionError};
pub use types::{Job, JobKind, JobSlot, Project, Scene};
