use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
const SCHEMA_VERSION: u32 = 1;

/// Applies the schema and stamps the version pragma. Re-running against an
/// existing database is a no-op; a database from a newer build is refused
/// instead of silently reinterpreted.
pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    let version: u32 = connection.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(InfraError::InvalidInput(format!(
            "database schema version {version} is newer than supported {SCHEMA_VERSION}"
        )));
    }
    connection.execute_batch(SCHEMA_SQL)?;
    connection.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DB: AtomicUsize = AtomicUsize::new(0);

    fn temp_db_path() -> std::path::PathBuf {
        let sequence = NEXT_TEMP_DB.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "ritmo-storage-tests-{}-{}",
            std::process::id(),
            sequence
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir.join("ritmo.sqlite")
    }

    #[test]
    fn initialize_is_idempotent_and_stamps_version() {
        let path = temp_db_path();
        initialize_database(&path).expect("first initialize");
        initialize_database(&path).expect("second initialize");

        let connection = Connection::open(&path).expect("open database");
        let version: u32 = connection
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .expect("read version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn newer_database_version_is_refused() {
        let path = temp_db_path();
        initialize_database(&path).expect("initialize");
        {
            let connection = Connection::open(&path).expect("open database");
            connection
                .pragma_update(None, "user_version", 99)
                .expect("bump version");
        }
        assert!(initialize_database(&path).is_err());
    }
}
