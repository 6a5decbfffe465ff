use crate::domain::models::SessionToken;
use crate::infrastructure::account_client::{AccountClient, SessionGrant};
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

const SESSION_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureSessionResult {
    Active(SessionToken),
    Refreshed(SessionToken),
    SignedOut,
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Session lifecycle over the account provider: exchange credentials for a
/// session, keep it fresh via the refresh grant, expose the signed-in
/// identity that partitions remote state.
pub struct AccountManager<S, C>
where
    S: CredentialStore,
    C: AccountClient,
{
    credential_store: Arc<S>,
    account_client: Arc<C>,
    now_provider: NowProvider,
}

impl<S, C> AccountManager<S, C>
where
    S: CredentialStore,
    C: AccountClient,
{
    pub fn new(credential_store: Arc<S>, account_client: Arc<C>) -> Self {
        Self {
            credential_store,
            account_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn is_session_valid(&self, session: &SessionToken) -> bool {
        session.is_valid_at((self.now_provider)(), SESSION_LEEWAY_SECONDS)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SessionToken, InfraError> {
        let grant = self.account_client.sign_up(email, password).await?;
        let session = self.session_from_grant(grant, None);
        self.credential_store.save_session(&session)?;
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionToken, InfraError> {
        let grant = self.account_client.sign_in(email, password).await?;
        let session = self.session_from_grant(grant, None);
        self.credential_store.save_session(&session)?;
        Ok(session)
    }

    /// Valid stored session, a refreshed one, or signed-out. A rejected
    /// refresh means signed-out rather than an error; transport failures
    /// still propagate.
    pub async fn ensure_session(&self) -> Result<EnsureSessionResult, InfraError> {
        let Some(stored) = self.credential_store.load_session()? else {
            return Ok(EnsureSessionResult::SignedOut);
        };

        if self.is_session_valid(&stored) {
            return Ok(EnsureSessionResult::Active(stored));
        }

        let Some(refresh_token) = stored.refresh_token.clone() else {
            return Ok(EnsureSessionResult::SignedOut);
        };

        match self.account_client.refresh_session(&refresh_token).await {
            Ok(grant) => {
                let session = self.session_from_grant(grant, Some(refresh_token));
                self.credential_store.save_session(&session)?;
                Ok(EnsureSessionResult::Refreshed(session))
            }
            Err(InfraError::Remote(_)) => Ok(EnsureSessionResult::SignedOut),
            Err(error) => Err(error),
        }
    }

    /// The stored session, if any, without touching the network.
    pub fn current_session(&self) -> Result<Option<SessionToken>, InfraError> {
        self.credential_store.load_session()
    }

    pub fn current_user_email(&self) -> Result<Option<String>, InfraError> {
        Ok(self.current_session()?.map(|session| session.email))
    }

    /// Best-effort server revoke, then drop the stored credential. Remote
    /// failures never keep the user signed in locally.
    pub async fn sign_out(&self) -> Result<(), InfraError> {
        if let Some(session) = self.credential_store.load_session()? {
            let _ = self.account_client.sign_out(&session.access_token).await;
        }
        self.credential_store.delete_session()
    }

    fn session_from_grant(
        &self,
        grant: SessionGrant,
        fallback_refresh_token: Option<String>,
    ) -> SessionToken {
        let expires_at = (self.now_provider)() + Duration::seconds(grant.expires_in.max(0));
        SessionToken {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or(fallback_refresh_token),
            user_id: grant.user_id,
            email: grant.email,
            expires_at,
        }
    }
}
