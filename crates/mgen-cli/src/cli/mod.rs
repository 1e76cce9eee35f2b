//! CLI for mgen batch media generation.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use mgen_core::config;
use mgen_core::project::JobKind;
use mgen_core::state_db::ProjectStateStore;
use std::path::PathBuf;

use commands::{
    run_clear, run_project_create, run_project_list, run_projects, run_status, run_verify,
};

/// Top-level CLI for mgen.
#[derive(Debug, Parser)]
#[command(name = "mgen")]
#[command(about = "mgen: batch media generation, download and source verification", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Create or list projects.
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Show per-scene job status of a project.
    Status {
        /// Project name.
        project: String,
    },

    /// Generate and download artifacts for one project.
    Run {
        /// Project name.
        project: String,
        #[command(flatten)]
        opts: RunOpts,
    },

    /// Run every project, one after another, sharing the credential spacing.
    RunAll {
        #[command(flatten)]
        opts: RunOpts,
    },

    /// Forget a project's state. Downloaded files are kept.
    Clear {
        /// Project name.
        project: String,
    },

    /// Audit a downloaded video against the provider.
    Verify {
        /// Path to the downloaded video.
        video_path: PathBuf,
        /// Provider operation name (e.g. operations/abc123).
        #[arg(long)]
        operation_name: Option<String>,
        /// Bearer token for the status lookup (default: first configured credential).
        #[arg(long)]
        token: Option<String>,
        /// Expected provider project id (default: `default_project_id` from config).
        #[arg(long)]
        project_id: Option<String>,
        /// Also print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProjectCommand {
    /// Create a project from a scenes JSON file.
    Create {
        /// Project name.
        name: String,
        /// Scenes file: [{"prompt": ..., "reference_image": ...}, ...].
        #[arg(long, value_name = "FILE")]
        scenes: PathBuf,
    },
    /// List projects with job counts.
    List,
}

/// Options shared by `run` and `run-all`.
#[derive(Debug, Clone, Args)]
pub struct RunOpts {
    /// Artifact kind to generate.
    #[arg(long, default_value = "video", value_parser = parse_kind)]
    pub kind: JobKind,
    /// Copies per scene.
    #[arg(long, default_value = "1", value_name = "N")]
    pub copies: u32,
    /// Model key (default from config).
    #[arg(long)]
    pub model: Option<String>,
    /// Aspect ratio, e.g. 16:9 (default from config).
    #[arg(long)]
    pub aspect_ratio: Option<String>,
}

fn parse_kind(s: &str) -> Result<JobKind, String> {
    JobKind::parse(s).ok_or_else(|| format!("unknown kind {:?} (expected image or video)", s))
}

impl CliCommand {
    /// Parse arguments, dispatch, and return the process exit code.
    pub async fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!(
            credentials = cfg.credentials.len(),
            min_spacing_secs = cfg.min_spacing_secs,
            "loaded config"
        );

        match cli.command {
            // Verification never touches project state.
            CliCommand::Verify {
                video_path,
                operation_name,
                token,
                project_id,
                json,
            } => run_verify(&cfg, &video_path, operation_name, token, project_id, json),
            command => {
                let store = ProjectStateStore::open_default().await?;
                command.dispatch(&store, &cfg).await
            }
        }
    }

    async fn dispatch(self, store: &ProjectStateStore, cfg: &config::MgenConfig) -> Result<i32> {
        match self {
            CliCommand::Project(ProjectCommand::Create { name, scenes }) => {
                run_project_create(store, &name, &scenes).await?
            }
            CliCommand::Project(ProjectCommand::List) => run_project_list(store).await?,
            CliCommand::Status { project } => run_status(store, &project).await?,
            CliCommand::Run { project, opts } => {
                return run_projects(store, cfg, Some(project), &opts).await
            }
            CliCommand::RunAll { opts } => return run_projects(store, cfg, None, &opts).await,
            CliCommand::Clear { project } => run_clear(store, &project).await?,
            CliCommand::Verify { .. } => anyhow::bail!("verify does not use the project store"),
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests;
