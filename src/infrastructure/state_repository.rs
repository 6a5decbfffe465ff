use crate::domain::models::PlannerDocument;
use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The on-device slot holding the last-known full planner document. One
/// fixed row; read once at startup, written on every state change. Local
/// state is authoritative during a session.
pub trait LocalStateRepository: Send + Sync {
    fn load(&self) -> Result<Option<PlannerDocument>, InfraError>;
    fn save(&self, document: &PlannerDocument) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteLocalStateRepository {
    db_path: PathBuf,
}

impl SqliteLocalStateRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl LocalStateRepository for SqliteLocalStateRepository {
    fn load(&self) -> Result<Option<PlannerDocument>, InfraError> {
        let connection = self.connect()?;
        let payload: Option<String> = connection
            .query_row("SELECT payload FROM local_state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        let document = serde_json::from_str(&payload)?;
        Ok(Some(document))
    }

    fn save(&self, document: &PlannerDocument) -> Result<(), InfraError> {
        let payload = serde_json::to_string(document)?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO local_state (id, payload, updated_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
               payload = excluded.payload,
               updated_at = excluded.updated_at",
            params![payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLocalStateRepository {
    document: Mutex<Option<PlannerDocument>>,
}

impl LocalStateRepository for InMemoryLocalStateRepository {
    fn load(&self) -> Result<Option<PlannerDocument>, InfraError> {
        let document = self.document.lock().map_err(|error| {
            InfraError::InvalidInput(format!("local state lock poisoned: {error}"))
        })?;
        Ok(document.clone())
    }

    fn save(&self, document: &PlannerDocument) -> Result<(), InfraError> {
        let mut slot = self.document.lock().map_err(|error| {
            InfraError::InvalidInput(format!("local state lock poisoned: {error}"))
        })?;
        *slot = Some(document.clone());
        Ok(())
    }
}
