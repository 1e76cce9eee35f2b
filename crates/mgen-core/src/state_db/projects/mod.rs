//! Project, scene, and job CRUD on `ProjectStateStore`.

mod read;
mod write;
