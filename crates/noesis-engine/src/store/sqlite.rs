// crates/noesis-engine/src/store/sqlite.rs
// Production `SessionStore` backend: `rusqlite` behind a `deadpool-sqlite`
// connection pool. Every connection gets `PRAGMA journal_mode=WAL` and
// `busy_timeout` set on checkout so the rare writer/writer race between a
// step append and a checkpoint save resolves by waiting, not by surfacing
// `SQLITE_BUSY` to the caller.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_sqlite::{Config, Pool, Runtime};
use noesis_types::{SessionStep, WorkflowRun};
use rusqlite::Connection;
use uuid::Uuid;

use super::{next_step_number, ReadOptions, SessionStore};
use crate::error::{EngineError, Result};

pub struct SqliteSessionStore {
    pool: Pool,
}

impl SqliteSessionStore {
    /// Opens (creating if necessary) the database at `path` and runs
    /// migrations. `:memory:` is accepted for tests that want real SQL
    /// semantics without a file on disk.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let cfg = Config::new(path.as_ref().to_path_buf());
        let pool = cfg
            .create_pool(Runtime::Tokio1)
            .map_err(|e| EngineError::Config(format!("failed to create sqlite pool: {e}")))?;

        let store = SqliteSessionStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let conn = self.pool.get().await?;
        conn.interact(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA busy_timeout=5000;
                 CREATE TABLE IF NOT EXISTS session_steps (
                     session_id TEXT NOT NULL,
                     step_number INTEGER NOT NULL,
                     branch_id TEXT,
                     kind TEXT NOT NULL,
                     revises_step INTEGER,
                     branch_from_step INTEGER,
                     payload TEXT NOT NULL,
                     created_at TEXT NOT NULL,
                     vector_embedding TEXT,
                     PRIMARY KEY (session_id, branch_id, step_number)
                 );
                 CREATE TABLE IF NOT EXISTS workflow_runs (
                     run_id TEXT PRIMARY KEY,
                     status TEXT NOT NULL,
                     snapshot TEXT NOT NULL
                 );",
            )
        })
        .await
        .map_err(|e| EngineError::StoreUnavailable(e.to_string()))??;
        Ok(())
    }

    fn fetch_session_rows(conn: &Connection, session_id: &str) -> rusqlite::Result<Vec<SessionStep>> {
        let mut stmt = conn.prepare(
            "SELECT session_id, step_number, branch_id, kind, revises_step, branch_from_step,
                    payload, created_at, vector_embedding
             FROM session_steps WHERE session_id = ?1",
        )?;
        let rows = stmt.query_map([session_id], row_to_step)?;
        rows.collect()
    }
}

fn row_to_step(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionStep> {
    let kind_str: String = row.get(3)?;
    let payload_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    let embedding_str: Option<String> = row.get(8)?;

    Ok(SessionStep {
        session_id: row.get(0)?,
        step_number: row.get::<_, i64>(1)? as u64,
        branch_id: row.get(2)?,
        kind: serde_json::from_str(&format!("\"{kind_str}\"")).unwrap_or(noesis_types::StepKind::AnalyzerStep),
        revises_step: row.get::<_, Option<i64>>(4)?.map(|n| n as u64),
        branch_from_step: row.get::<_, Option<i64>>(5)?.map(|n| n as u64),
        payload: serde_json::from_str(&payload_str).unwrap_or(serde_json::Value::Null),
        created_at: created_at_str.parse().unwrap_or_else(|_| chrono::Utc::now()),
        vector_embedding: embedding_str.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn append_step(&self, mut step: SessionStep) -> Result<u64> {
        let conn = self.pool.get().await?;
        let session_id = step.session_id.clone();

        let assigned = conn
            .interact(move |conn| -> rusqlite::Result<std::result::Result<u64, String>> {
                let tx = conn.transaction()?;
                let existing = Self::fetch_session_rows(&tx, &session_id)?;
                let number = match next_step_number(&existing, &step) {
                    Ok(n) => n,
                    Err(e) => return Ok(Err(e.to_string())),
                };
                step.step_number = number;

                tx.execute(
                    "INSERT INTO session_steps
                         (session_id, step_number, branch_id, kind, revises_step,
                          branch_from_step, payload, created_at, vector_embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        step.session_id,
                        step.step_number as i64,
                        step.branch_id,
                        serde_json::to_string(&step.kind).unwrap_or_default().trim_matches('"'),
                        step.revises_step.map(|n| n as i64),
                        step.branch_from_step.map(|n| n as i64),
                        serde_json::to_string(&step.payload).unwrap_or_default(),
                        step.created_at.to_rfc3339(),
                        step.vector_embedding.as_ref().and_then(|v| serde_json::to_string(v).ok()),
                    ],
                )?;
                tx.commit()?;
                Ok(Ok(number))
            })
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))??;

        assigned.map_err(EngineError::NotFound)
    }

    async fn read_session(&self, session_id: &str, opts: ReadOptions) -> Result<Vec<SessionStep>> {
        let conn = self.pool.get().await?;
        let session_id = session_id.to_string();
        let mut steps = conn
            .interact(move |conn| Self::fetch_session_rows(conn, &session_id))
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))??;

        if let Some(branch) = opts.branch_id {
            steps.retain(|s| s.branch_id.as_deref() == Some(branch.as_str()));
        }
        steps.sort_by_key(|s| s.step_number);
        Ok(steps)
    }

    async fn save_run_snapshot(&self, run: &WorkflowRun) -> Result<()> {
        let conn = self.pool.get().await?;
        let run_id = run.run_id.to_string();
        let status = serde_json::to_string(&run.status)
            .unwrap_or_default()
            .trim_matches('"')
            .to_string();
        let snapshot = serde_json::to_string(run).map_err(EngineError::Json)?;

        conn.interact(move |conn| {
            // `INSERT ... ON CONFLICT` makes the overwrite atomic: either the
            // whole row lands or none of it does (§4.B "an interrupted save
            // must not leave a partial record observable").
            conn.execute(
                "INSERT INTO workflow_runs (run_id, status, snapshot) VALUES (?1, ?2, ?3)
                 ON CONFLICT(run_id) DO UPDATE SET status = excluded.status, snapshot = excluded.snapshot",
                rusqlite::params![run_id, status, snapshot],
            )
        })
        .await
        .map_err(|e| EngineError::StoreUnavailable(e.to_string()))??;
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<WorkflowRun>> {
        let conn = self.pool.get().await?;
        let id = run_id.to_string();
        let snapshot: Option<String> = conn
            .interact(move |conn| {
                conn.query_row(
                    "SELECT snapshot FROM workflow_runs WHERE run_id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .ok()
            })
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        match snapshot {
            Some(s) => Ok(Some(serde_json::from_str(&s).map_err(EngineError::Json)?)),
            None => Ok(None),
        }
    }

    async fn list_active_runs(&self) -> Result<Vec<Uuid>> {
        let conn = self.pool.get().await?;
        let ids: Vec<String> = conn
            .interact(|conn| -> rusqlite::Result<Vec<String>> {
                let mut stmt = conn.prepare(
                    "SELECT run_id FROM workflow_runs
                     WHERE status NOT IN ('succeeded', 'failed', 'cancelled', 'partial')",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))??;

        Ok(ids
            .into_iter()
            .filter_map(|id| Uuid::parse_str(&id).ok())
            .collect())
    }
}

/// Helper for tests and the CLI: an Arc-wrapped store opened against a
/// temp-file or explicit path.
pub async fn open_shared(path: impl AsRef<Path>) -> Result<Arc<SqliteSessionStore>> {
    Ok(Arc::new(SqliteSessionStore::open(path).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_types::StepKind;
    use serde_json::json;

    fn step(session_id: &str) -> SessionStep {
        SessionStep {
            session_id: session_id.to_string(),
            step_number: 0,
            kind: StepKind::AnalyzerStep,
            branch_id: None,
            revises_step: None,
            branch_from_step: None,
            payload: json!({"hello": "world"}),
            created_at: chrono::Utc::now(),
            vector_embedding: None,
        }
    }

    #[tokio::test]
    async fn append_then_read_round_trips_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::open(dir.path().join("test.db")).await.unwrap();
        let n = store.append_step(step("s1")).await.unwrap();
        assert_eq!(n, 1);
        let steps = store.read_session("s1", ReadOptions::default()).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].payload, json!({"hello": "world"}));
    }

    #[tokio::test]
    async fn step_numbers_increase_across_process_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        {
            let store = SqliteSessionStore::open(&db_path).await.unwrap();
            store.append_step(step("s1")).await.unwrap();
        }
        let store = SqliteSessionStore::open(&db_path).await.unwrap();
        let n = store.append_step(step("s1")).await.unwrap();
        assert_eq!(n, 2);
    }
}
