// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use aegis_domain::entities::{PlaybookRunRecord, RunStatus};
use aegis_domain::error::AegisError;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Append-only persistence for [`PlaybookRunRecord`] rows, one per
/// action execution, backing the run-history query surface.
pub struct SqlitePlaybookRunLog {
    pool: SqlitePool,
}

impl SqlitePlaybookRunLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), AegisError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS playbook_runs (
                id TEXT PRIMARY KEY,
                playbook_id TEXT NOT NULL,
                alert_id TEXT NOT NULL,
                action_name TEXT NOT NULL,
                status TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                error TEXT,
                finished_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AegisError::internal(format!("playbook_runs migration failed: {e}")))?;
        Ok(())
    }

    pub async fn append(&self, record: &PlaybookRunRecord) -> Result<(), AegisError> {
        sqlx::query(
            "INSERT INTO playbook_runs (id, playbook_id, alert_id, action_name, status, duration_ms, error, finished_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.playbook_id)
        .bind(record.alert_id.to_string())
        .bind(&record.action_name)
        .bind(status_label(record.status))
        .bind(record.duration_ms as i64)
        .bind(&record.error)
        .bind(record.finished_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AegisError::internal(format!("playbook run insert failed: {e}")))?;
        Ok(())
    }

    pub async fn for_alert(&self, alert_id: Uuid) -> Result<Vec<PlaybookRunRecord>, AegisError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String, i64, Option<String>, String)>(
            "SELECT id, playbook_id, alert_id, action_name, status, duration_ms, error, finished_at FROM playbook_runs WHERE alert_id = ? ORDER BY finished_at ASC",
        )
        .bind(alert_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AegisError::internal(format!("playbook run query failed: {e}")))?;

        rows.into_iter()
            .map(|(id, playbook_id, alert_id, action_name, status, duration_ms, error, finished_at)| {
                Ok(PlaybookRunRecord {
                    id: Uuid::parse_str(&id).map_err(|e| AegisError::internal(e.to_string()))?,
                    playbook_id,
                    alert_id: Uuid::parse_str(&alert_id).map_err(|e| AegisError::internal(e.to_string()))?,
                    action_name,
                    status: parse_status(&status)?,
                    duration_ms: duration_ms as u64,
                    error,
                    finished_at: chrono::DateTime::parse_from_rfc3339(&finished_at).map_err(|e| AegisError::internal(e.to_string()))?.with_timezone(&chrono::Utc),
                })
            })
            .collect()
    }
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Ok => "ok",
        RunStatus::Skipped => "skipped",
        RunStatus::Error => "error",
        RunStatus::Timeout => "timeout",
    }
}

fn parse_status(label: &str) -> Result<RunStatus, AegisError> {
    match label {
        "ok" => Ok(RunStatus::Ok),
        "skipped" => Ok(RunStatus::Skipped),
        "error" => Ok(RunStatus::Error),
        "timeout" => Ok(RunStatus::Timeout),
        other => Err(AegisError::internal(format!("unknown playbook run status '{other}'"))),
    }
}
