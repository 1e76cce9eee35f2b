pub mod config;
pub mod logging;

pub mod checksum;
pub mod control;
pub mod credentials;
pub mod downloader;
pub mod generation;
pub mod project;
pub mod retry;
pub mod scheduler;
pub mod state_db;
pub mod storage;
pub mod verifier;
