//! Write operations: create, save job, clear, recover.

use anyhow::{bail, Result};
use crate::project::{project_dir_name, Job, JobStatus, Project};
use crate::state_db::db::{unix_timestamp, ProjectStateStore};

/// Statuses a crashed run can leave behind.
const IN_FLIGHT: [JobStatus; 4] = [
    JobStatus::Submitted,
    JobStatus::Polling,
    JobStatus::Ready,
    JobStatus::Downloading,
];

impl ProjectStateStore {
    /// Persist a new project with its scenes (and any jobs already attached).
    /// Fails if a project with the same name exists, or one whose artifacts
    /// would land in the same directory.
    pub async fn create_project(&self, project: &Project) -> Result<()> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM projects WHERE name = ?1")
            .bind(&project.name)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_some() {
            bail!("project {:?} already exists", project.name);
        }

        let dir = project_dir_name(&project.name);
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM projects")
            .fetch_all(&mut *tx)
            .await?;
        if let Some(other) = names.iter().find(|n| project_dir_name(n) == dir) {
            bail!(
                "project {:?} would share the download directory {:?} with project {:?}",
                project.name,
                dir,
                other
            );
        }

        sqlx::query(
            r#"
            INSERT INTO projects (name, created_at, updated_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(&project.name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for scene in &project.scenes {
            sqlx::query(
                r#"
                INSERT INTO scenes (project, scene_index, prompt_text, reference_image)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&project.name)
            .bind(scene.index as i64)
            .bind(&scene.prompt_text)
            .bind(
                scene
                    .reference_image
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            )
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        for job in project.jobs() {
            self.save_job(job).await?;
        }
        tracing::debug!(project = %project.name, scenes = project.scenes.len(), "project created");
        Ok(())
    }

    /// Insert or replace the row for the job's slot.
    pub async fn save_job(&self, job: &Job) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO jobs (
                project, scene_index, kind, copy_index, status,
                remote_operation_id, remote_url, local_path, error_reason,
                completed_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (project, scene_index, kind, copy_index) DO UPDATE SET
                status = excluded.status,
                remote_operation_id = excluded.remote_operation_id,
                remote_url = excluded.remote_url,
                local_path = excluded.local_path,
                error_reason = excluded.error_reason,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&job.project_id)
        .bind(job.scene_index as i64)
        .bind(job.kind.as_str())
        .bind(job.copy_index as i64)
        .bind(job.status.as_str())
        .bind(&job.remote_operation_id)
        .bind(&job.remote_url)
        .bind(
            job.local_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        )
        .bind(&job.error_reason)
        .bind(job.completed_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE projects SET updated_at = ?1 WHERE name = ?2")
            .bind(now)
            .bind(&job.project_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove the project and all its scene and job rows. Downloaded files are
    /// left on disk. Returns false if no such project existed.
    pub async fn clear_project(&self, name: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM jobs WHERE project = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM scenes WHERE project = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        let r = sqlx::query("DELETE FROM projects WHERE name = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(r.rows_affected() > 0)
    }

    /// Mark jobs a crashed run left mid-flight as CANCELLED ("interrupted").
    /// Call before scheduling the project. Returns the number of jobs changed.
    pub async fn recover_interrupted(&self, project: &str) -> Result<u64> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;
        for status in IN_FLIGHT {
            let r = sqlx::query(
                r#"
                UPDATE jobs
                SET status = ?1,
                    error_reason = 'interrupted',
                    completed_at = ?2,
                    updated_at = ?3
                WHERE project = ?4 AND status = ?5
                "#,
            )
            .bind(JobStatus::Cancelled.as_str())
            .bind(now)
            .bind(now)
            .bind(project)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;
            changed += r.rows_affected();
        }
        tx.commit().await?;
        tracing::info!(project, jobs = changed, "recovered interrupted jobs");
        Ok(changed)
    }
}
