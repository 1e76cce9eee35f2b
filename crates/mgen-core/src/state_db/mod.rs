//! Persistent project state (SQLite via sqlx).
//!
//! Stores projects, their scenes, and one row per (scene, kind, copy) job so a
//! run can show progress and resume without re-generating downloaded artifacts.

pub mod db;
pub mod projects;
pub mod types;

pub use db::*;
pub use types::*;
