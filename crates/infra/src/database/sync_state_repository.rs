//! SQLite-backed [`SyncStateRepository`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use costsync_core::SyncStateRepository;
use costsync_domain::{CostSyncError, Environment, Result, SyncKey, SyncState, SyncStatus};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;

use crate::database::manager::{DbConnection, DbManager};
use crate::errors::conversions::{map_join_error, map_sql_error};

const SELECT_COLUMNS: &str =
    "service, environment, last_synced_hash, last_synced_at, status, last_error";

pub struct SqliteSyncStateRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncStateRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn fetch(conn: &DbConnection, key: &SyncKey) -> Result<Option<SyncState>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM sync_state WHERE service = ?1 AND environment = ?2"
        );
        let raw = conn
            .query_row(&sql, params![key.service, key.environment.as_str()], RawRow::from_row)
            .optional()
            .map_err(map_sql_error)?;
        raw.map(|raw| raw.into_state().map(|(_, state)| state)).transpose()
    }

    fn upsert(conn: &DbConnection, key: &SyncKey, state: &SyncState) -> Result<()> {
        conn.execute(
            "INSERT INTO sync_state (service, environment, last_synced_hash, last_synced_at, status, last_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(service, environment) DO UPDATE SET
                last_synced_hash = excluded.last_synced_hash,
                last_synced_at = excluded.last_synced_at,
                status = excluded.status,
                last_error = excluded.last_error",
            params![
                key.service,
                key.environment.as_str(),
                state.last_synced_hash,
                state.last_synced_at.to_rfc3339(),
                state.status.as_str(),
                state.last_error,
            ],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    fn fetch_all(conn: &DbConnection) -> Result<Vec<(SyncKey, SyncState)>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM sync_state ORDER BY service, environment");
        let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
        let rows = stmt
            .query_map([], RawRow::from_row)
            .map_err(map_sql_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_sql_error)?;
        rows.into_iter().map(RawRow::into_state).collect()
    }
}

/// Row as stored; decoded outside the rusqlite closure so bad values surface
/// as domain errors.
struct RawRow {
    service: String,
    environment: String,
    hash: String,
    synced_at: String,
    status: String,
    last_error: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            service: row.get(0)?,
            environment: row.get(1)?,
            hash: row.get(2)?,
            synced_at: row.get(3)?,
            status: row.get(4)?,
            last_error: row.get(5)?,
        })
    }

    fn into_state(self) -> Result<(SyncKey, SyncState)> {
        let environment: Environment = self.environment.parse().map_err(CostSyncError::Database)?;
        let status: SyncStatus = self.status.parse().map_err(CostSyncError::Database)?;
        let last_synced_at = DateTime::parse_from_rfc3339(&self.synced_at)
            .map_err(|e| CostSyncError::Database(format!("invalid last_synced_at: {e}")))?
            .with_timezone(&Utc);

        Ok((
            SyncKey::new(self.service, environment),
            SyncState {
                last_synced_hash: self.hash,
                last_synced_at,
                status,
                last_error: self.last_error,
            },
        ))
    }
}

#[async_trait]
impl SyncStateRepository for SqliteSyncStateRepository {
    async fn get(&self, key: &SyncKey) -> Result<Option<SyncState>> {
        let db = Arc::clone(&self.db);
        let key = key.clone();

        task::spawn_blocking(move || -> Result<Option<SyncState>> {
            let conn = db.get_connection()?;
            Self::fetch(&conn, &key)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn put(&self, key: &SyncKey, state: &SyncState) -> Result<()> {
        let db = Arc::clone(&self.db);
        let key = key.clone();
        let state = state.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            Self::upsert(&conn, &key, &state)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list(&self) -> Result<Vec<(SyncKey, SyncState)>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<(SyncKey, SyncState)>> {
            let conn = db.get_connection()?;
            Self::fetch_all(&conn)
        })
        .await
        .map_err(map_join_error)?
    }
}
