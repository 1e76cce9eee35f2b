//! Read operations: load a project, list projects.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::path::PathBuf;

use crate::project::{Job, JobKind, JobStatus, Project, Scene};
use crate::state_db::db::ProjectStateStore;
use crate::state_db::types::ProjectSummary;

const STATUS_ORDER: [JobStatus; 8] = [
    JobStatus::Pending,
    JobStatus::Submitted,
    JobStatus::Polling,
    JobStatus::Ready,
    JobStatus::Downloading,
    JobStatus::Downloaded,
    JobStatus::Failed,
    JobStatus::Cancelled,
];

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let kind_str: String = row.get("kind");
    let kind = JobKind::parse(&kind_str).with_context(|| format!("unknown job kind {:?}", kind_str))?;
    let status_str: String = row.get("status");
    let local_path: Option<String> = row.get("local_path");
    Ok(Job {
        project_id: row.get("project"),
        scene_index: row.get::<i64, _>("scene_index") as u32,
        copy_index: row.get::<i64, _>("copy_index") as u32,
        kind,
        status: JobStatus::from_str(&status_str),
        remote_operation_id: row.get("remote_operation_id"),
        remote_url: row.get("remote_url"),
        local_path: local_path.map(PathBuf::from),
        error_reason: row.get("error_reason"),
        completed_at: row.get("completed_at"),
    })
}

impl ProjectStateStore {
    /// Load a project with its scenes and jobs. `None` if it does not exist.
    pub async fn load_project(&self, name: &str) -> Result<Option<Project>> {
        let exists = sqlx::query("SELECT name FROM projects WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let scene_rows = sqlx::query(
            r#"
            SELECT scene_index, prompt_text, reference_image
            FROM scenes
            WHERE project = ?1
            ORDER BY scene_index ASC
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        let mut project = Project {
            name: name.to_string(),
            scenes: Vec::with_capacity(scene_rows.len()),
        };
        for row in scene_rows {
            let index = row.get::<i64, _>("scene_index") as u32;
            let mut scene = Scene::new(index, row.get::<String, _>("prompt_text"));
            scene.reference_image = row
                .get::<Option<String>, _>("reference_image")
                .map(PathBuf::from);
            project.scenes.push(scene);
        }

        let job_rows = sqlx::query(
            r#"
            SELECT project, scene_index, kind, copy_index, status,
                   remote_operation_id, remote_url, local_path, error_reason,
                   completed_at
            FROM jobs
            WHERE project = ?1
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        for row in &job_rows {
            project.put_job(job_from_row(row)?);
        }

        Ok(Some(project))
    }

    /// Names of all projects in creation order (run-all order).
    pub async fn project_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM projects ORDER BY created_at ASC, rowid ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("name")).collect())
    }

    /// List projects in creation order with scene and per-status job counts.
    pub async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT p.name AS name,
                   p.created_at AS created_at,
                   (SELECT COUNT(*) FROM scenes s WHERE s.project = p.name) AS scene_count
            FROM projects p
            ORDER BY p.created_at ASC, p.rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get("name");
            let counts = sqlx::query(
                r#"
                SELECT status, COUNT(*) AS n
                FROM jobs
                WHERE project = ?1
                GROUP BY status
                "#,
            )
            .bind(&name)
            .fetch_all(&self.pool)
            .await?;

            let mut job_counts: Vec<(JobStatus, u64)> = Vec::new();
            for c in &counts {
                let status = JobStatus::from_str(&c.get::<String, _>("status"));
                let n = c.get::<i64, _>("n") as u64;
                match job_counts.iter_mut().find(|(s, _)| *s == status) {
                    Some(entry) => entry.1 += n,
                    None => job_counts.push((status, n)),
                }
            }
            job_counts.sort_by_key(|(s, _)| STATUS_ORDER.iter().position(|o| o == s));

            out.push(ProjectSummary {
                name,
                scene_count: row.get::<i64, _>("scene_count") as u32,
                job_counts,
                created_at: row.get("created_at"),
            });
        }
        Ok(out)
    }
}
