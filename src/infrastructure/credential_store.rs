use crate::domain::models::SessionToken;
use crate::infrastructure::error::InfraError;
use std::sync::Mutex;

/// Storage for the signed-in account session. A missing entry reads as
/// signed out; deleting an absent entry is a no-op.
pub trait CredentialStore: Send + Sync {
    fn save_session(&self, session: &SessionToken) -> Result<(), InfraError>;
    fn load_session(&self) -> Result<Option<SessionToken>, InfraError>;
    fn delete_session(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("ritmo.session", "default")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_session(&self, session: &SessionToken) -> Result<(), InfraError> {
        let payload = serde_json::to_string(session)
            .map_err(|error| InfraError::Credential(error.to_string()))?;
        self.entry()?
            .set_password(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_session(&self) -> Result<Option<SessionToken>, InfraError> {
        let payload = match self.entry()?.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(error) => return Err(InfraError::Credential(error.to_string())),
        };

        let session = serde_json::from_str::<SessionToken>(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))?;
        Ok(Some(session))
    }

    fn delete_session(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    session: Mutex<Option<SessionToken>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_session(&self, session: &SessionToken) -> Result<(), InfraError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn load_session(&self) -> Result<Option<SessionToken>, InfraError> {
        let guard = self
            .session
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_session(&self) -> Result<(), InfraError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_session() -> SessionToken {
        SessionToken {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            user_id: "user-1".to_string(),
            email: "ana@example.com".to_string(),
            expires_at: fixed_time("2026-02-16T10:00:00Z"),
        }
    }

    #[test]
    fn in_memory_store_round_trips() {
        let store = InMemoryCredentialStore::default();
        assert!(store.load_session().expect("load").is_none());
        store.save_session(&sample_session()).expect("save");
        assert_eq!(store.load_session().expect("reload"), Some(sample_session()));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = InMemoryCredentialStore::default();
        store.delete_session().expect("delete on empty store");
        store.save_session(&sample_session()).expect("save");
        store.delete_session().expect("delete");
        store.delete_session().expect("second delete");
        assert!(store.load_session().expect("load").is_none());
    }

    fn token_pattern() -> impl Strategy<Value = String> {
        "[A-Za-z0-9._\\-]{1,64}".prop_map(|value| value.to_string())
    }

    proptest! {
        #[test]
        fn session_round_trip_preserves_every_field(
            access_token in token_pattern(),
            refresh_token in proptest::option::of(token_pattern()),
            user_id in token_pattern(),
            expires_in_seconds in 120i64..604800i64
        ) {
            let session = SessionToken {
                access_token,
                refresh_token,
                user_id,
                email: "ana@example.com".to_string(),
                expires_at: fixed_time("2026-02-16T00:00:00Z")
                    + chrono::Duration::seconds(expires_in_seconds),
            };
            let store = InMemoryCredentialStore::default();
            store.save_session(&session).expect("save session");
            let loaded = store.load_session().expect("load session").expect("session exists");
            prop_assert_eq!(loaded, session);
        }
    }
}
