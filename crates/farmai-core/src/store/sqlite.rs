// SQLite persistence for farms, consulting sessions and key-value state.

use std::sync::{Mutex, MutexGuard};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{FarmStore, StoreError, StoreResult};
use crate::farm::{Farm, FarmUpdate, NewFarm};
use crate::session::{ConsultingSession, NewSession, SessionStatus};

const VISIT_DATE_FORMAT: &str = "%Y-%m-%d";

const FARM_COLUMNS: &str =
    "farm_id, name, location, owner_name, size, crop, created_at, updated_at";

const SESSION_COLUMNS: &str =
    "consulting_id, farm_id, consultant_id, visit_date, status, created_at, updated_at";

/// Local SQLite database. Holds farms and sessions when the local backend
/// is selected, and always holds the per-farm key-value state.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure all tables exist.
    /// Pass `":memory:"` for an ephemeral database.
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS farms (
                farm_id    TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                location   TEXT NOT NULL,
                owner_name TEXT NOT NULL,
                size       REAL,
                crop       TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS consulting_sessions (
                consulting_id TEXT PRIMARY KEY,
                farm_id       TEXT NOT NULL REFERENCES farms(farm_id) ON DELETE CASCADE,
                consultant_id TEXT,
                visit_date    TEXT NOT NULL,
                status        TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_farm ON consulting_sessions(farm_id);

            CREATE TABLE IF NOT EXISTS app_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Panics if the mutex is poisoned, which only happens after another
    /// thread panicked mid-query.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Key-value state
    // ------------------------------------------------------------------

    /// Persist a JSON value under `key`, replacing any previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        let json = serde_json::to_string(value).context("failed to serialize state value")?;
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO app_state (key, value) VALUES (?1, ?2)",
                params![key, json],
            )
            .with_context(|| format!("failed to save state `{key}`"))?;
        Ok(())
    }

    /// Load the JSON value stored under `key`, if any.
    pub fn load_state(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to load state `{key}`"))?;

        raw.map(|json| {
            serde_json::from_str(&json)
                .with_context(|| format!("state `{key}` is not valid JSON"))
        })
        .transpose()
    }

    pub fn save_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("failed to serialize state `{key}`"))?;
        self.save_state(key, &value)
    }

    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        self.load_state(key)?
            .map(|value| {
                serde_json::from_value(value)
                    .with_context(|| format!("state `{key}` has an unexpected shape"))
            })
            .transpose()
    }

    /// Remove the given keys in one transaction. Missing keys are ignored.
    pub fn delete_state(&self, keys: &[String]) -> anyhow::Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        for key in keys {
            tx.execute("DELETE FROM app_state WHERE key = ?1", params![key])
                .with_context(|| format!("failed to delete state `{key}`"))?;
        }
        tx.commit().context("failed to commit state deletion")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Row helpers
    // ------------------------------------------------------------------

    fn fetch_farm(conn: &Connection, farm_id: &str) -> StoreResult<Option<Farm>> {
        let farm = conn
            .query_row(
                &format!("SELECT {FARM_COLUMNS} FROM farms WHERE farm_id = ?1"),
                params![farm_id],
                farm_from_row,
            )
            .optional()
            .context("failed to query farm")?;
        Ok(farm)
    }

    fn fetch_session(
        conn: &Connection,
        consulting_id: &str,
    ) -> StoreResult<Option<ConsultingSession>> {
        let session = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM consulting_sessions WHERE consulting_id = ?1"),
                params![consulting_id],
                session_from_row,
            )
            .optional()
            .context("failed to query consulting session")?;
        Ok(session)
    }
}

/// Current time at the precision the database keeps.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn farm_from_row(row: &Row<'_>) -> rusqlite::Result<Farm> {
    Ok(Farm {
        farm_id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        owner_name: row.get(3)?,
        size: row.get(4)?,
        crop: row.get(5)?,
        created_at: ts_column(row, 6)?,
        updated_at: ts_column(row, 7)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<ConsultingSession> {
    let visit_raw: String = row.get(3)?;
    let visit_date = NaiveDate::parse_from_str(&visit_raw, VISIT_DATE_FORMAT)
        .map_err(|e| conversion_error(3, e))?;
    let status_raw: String = row.get(4)?;
    let status = status_raw
        .parse::<SessionStatus>()
        .map_err(|e| conversion_error(4, e))?;

    Ok(ConsultingSession {
        consulting_id: row.get(0)?,
        farm_id: row.get(1)?,
        consultant_id: row.get(2)?,
        visit_date,
        status,
        created_at: ts_column(row, 5)?,
        updated_at: ts_column(row, 6)?,
    })
}

// ---------------------------------------------------------------------------
// FarmStore
// ---------------------------------------------------------------------------

#[async_trait]
impl FarmStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn list_farms(&self) -> StoreResult<Vec<Farm>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {FARM_COLUMNS} FROM farms ORDER BY created_at DESC, rowid DESC"
            ))
            .context("failed to prepare list_farms query")?;
        let farms = stmt
            .query_map([], farm_from_row)
            .context("failed to query farms")?
            .collect::<Result<Vec<_>, _>>()
            .context("failed to map farm rows")?;
        Ok(farms)
    }

    async fn get_farm(&self, farm_id: &str) -> StoreResult<Option<Farm>> {
        Self::fetch_farm(&self.conn(), farm_id)
    }

    async fn create_farm(&self, input: NewFarm) -> StoreResult<Farm> {
        input.validate()?;
        let farm = input.into_farm(now());
        self.conn()
            .execute(
                &format!("INSERT INTO farms ({FARM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    farm.farm_id,
                    farm.name,
                    farm.location,
                    farm.owner_name,
                    farm.size,
                    farm.crop,
                    format_ts(&farm.created_at),
                    format_ts(&farm.updated_at),
                ],
            )
            .context("failed to insert farm")?;
        Ok(farm)
    }

    async fn update_farm(&self, update: FarmUpdate) -> StoreResult<Farm> {
        update.validate()?;
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let mut farm = Self::fetch_farm(&tx, &update.farm_id)?
            .ok_or_else(|| StoreError::farm_not_found(&update.farm_id))?;
        update.apply(&mut farm, now());

        tx.execute(
            "UPDATE farms
             SET name = ?2, location = ?3, owner_name = ?4, size = ?5, crop = ?6, updated_at = ?7
             WHERE farm_id = ?1",
            params![
                farm.farm_id,
                farm.name,
                farm.location,
                farm.owner_name,
                farm.size,
                farm.crop,
                format_ts(&farm.updated_at),
            ],
        )
        .context("failed to update farm")?;
        tx.commit().context("failed to commit farm update")?;
        Ok(farm)
    }

    async fn delete_farm(&self, farm_id: &str) -> StoreResult<()> {
        let deleted = self
            .conn()
            .execute("DELETE FROM farms WHERE farm_id = ?1", params![farm_id])
            .context("failed to delete farm")?;
        if deleted == 0 {
            return Err(StoreError::farm_not_found(farm_id));
        }
        Ok(())
    }

    async fn list_sessions(&self, farm_id: &str) -> StoreResult<Vec<ConsultingSession>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM consulting_sessions
                 WHERE farm_id = ?1
                 ORDER BY visit_date DESC, created_at DESC, rowid DESC"
            ))
            .context("failed to prepare list_sessions query")?;
        let sessions = stmt
            .query_map(params![farm_id], session_from_row)
            .context("failed to query consulting sessions")?
            .collect::<Result<Vec<_>, _>>()
            .context("failed to map consulting session rows")?;
        Ok(sessions)
    }

    async fn create_session(&self, input: NewSession) -> StoreResult<ConsultingSession> {
        input.validate()?;
        let conn = self.conn();
        if Self::fetch_farm(&conn, &input.farm_id)?.is_none() {
            return Err(StoreError::farm_not_found(&input.farm_id));
        }

        let session = input.into_session(now());
        conn.execute(
            &format!(
                "INSERT INTO consulting_sessions ({SESSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            params![
                session.consulting_id,
                session.farm_id,
                session.consultant_id,
                session.visit_date.format(VISIT_DATE_FORMAT).to_string(),
                session.status.as_str(),
                format_ts(&session.created_at),
                format_ts(&session.updated_at),
            ],
        )
        .context("failed to insert consulting session")?;
        Ok(session)
    }

    async fn update_session_status(
        &self,
        consulting_id: &str,
        status: SessionStatus,
    ) -> StoreResult<ConsultingSession> {
        let conn = self.conn();
        let updated = conn
            .execute(
                "UPDATE consulting_sessions SET status = ?2, updated_at = ?3 WHERE consulting_id = ?1",
                params![consulting_id, status.as_str(), format_ts(&now())],
            )
            .context("failed to update consulting session")?;
        if updated == 0 {
            return Err(StoreError::session_not_found(consulting_id));
        }
        Self::fetch_session(&conn, consulting_id)?
            .ok_or_else(|| StoreError::session_not_found(consulting_id))
    }

    async fn delete_session(&self, consulting_id: &str) -> StoreResult<()> {
        let deleted = self
            .conn()
            .execute(
                "DELETE FROM consulting_sessions WHERE consulting_id = ?1",
                params![consulting_id],
            )
            .context("failed to delete consulting session")?;
        if deleted == 0 {
            return Err(StoreError::session_not_found(consulting_id));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
