use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncLog {
    pub last_push_time: Option<DateTime<Utc>>,
    pub last_pull_time: Option<DateTime<Utc>>,
}

/// Bookkeeping for the last remote exchange, used by the sync status
/// surface. Never consulted to decide whether a push happens.
pub trait SyncLogRepository: Send + Sync {
    fn load(&self) -> Result<SyncLog, InfraError>;
    fn record_push(&self, at: DateTime<Utc>) -> Result<(), InfraError>;
    fn record_pull(&self, at: DateTime<Utc>) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSyncLogRepository {
    db_path: PathBuf,
}

impl SqliteSyncLogRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

fn parse_instant(raw: Option<String>, column: &str) -> Result<Option<DateTime<Utc>>, InfraError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let parsed = DateTime::parse_from_rfc3339(&raw).map_err(|error| {
        InfraError::InvalidInput(format!("invalid sync_log.{column} '{raw}': {error}"))
    })?;
    Ok(Some(parsed.with_timezone(&Utc)))
}

impl SyncLogRepository for SqliteSyncLogRepository {
    fn load(&self) -> Result<SyncLog, InfraError> {
        let connection = self.connect()?;
        let row: Option<(Option<String>, Option<String>)> = connection
            .query_row(
                "SELECT last_push_time, last_pull_time FROM sync_log WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((push_raw, pull_raw)) = row else {
            return Ok(SyncLog::default());
        };
        Ok(SyncLog {
            last_push_time: parse_instant(push_raw, "last_push_time")?,
            last_pull_time: parse_instant(pull_raw, "last_pull_time")?,
        })
    }

    fn record_push(&self, at: DateTime<Utc>) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO sync_log (id, last_push_time)
             VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET last_push_time = excluded.last_push_time",
            params![at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn record_pull(&self, at: DateTime<Utc>) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO sync_log (id, last_pull_time)
             VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET last_pull_time = excluded.last_pull_time",
            params![at.to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySyncLogRepository {
    log: Mutex<SyncLog>,
}

impl SyncLogRepository for InMemorySyncLogRepository {
    fn load(&self) -> Result<SyncLog, InfraError> {
        let log = self
            .log
            .lock()
            .map_err(|error| InfraError::InvalidInput(format!("sync log lock poisoned: {error}")))?;
        Ok(log.clone())
    }

    fn record_push(&self, at: DateTime<Utc>) -> Result<(), InfraError> {
        let mut log = self
            .log
            .lock()
            .map_err(|error| InfraError::InvalidInput(format!("sync log lock poisoned: {error}")))?;
        log.last_push_time = Some(at);
        Ok(())
    }

    fn record_pull(&self, at: DateTime<Utc>) -> Result<(), InfraError> {
        let mut log = self
            .log
            .lock()
            .map_err(|error| InfraError::InvalidInput(format!("sync log lock poisoned: {error}")))?;
        log.last_pull_time = Some(at);
        Ok(())
    }
}
