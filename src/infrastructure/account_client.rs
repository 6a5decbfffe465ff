use crate::domain::models::PlannerDocument;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use url::Url;

const STATES_TABLE: &str = "ritmo_states";

/// Connection data for the hosted account/state service.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub base_url: String,
    pub anon_key: String,
}

impl AccountConfig {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            anon_key: anon_key.into(),
        }
    }
}

/// A granted session as the service reports it; the account manager turns
/// `expires_in` into an absolute instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub user_id: String,
    pub email: String,
}

#[async_trait]
pub trait AccountClient: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SessionGrant, InfraError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionGrant, InfraError>;
    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionGrant, InfraError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), InfraError>;
}

#[async_trait]
pub trait RemoteStateClient: Send + Sync {
    /// A missing record reads as `None`; only transport or protocol
    /// problems are errors.
    async fn load_state(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Option<PlannerDocument>, InfraError>;

    async fn upsert_state(
        &self,
        access_token: &str,
        user_id: &str,
        email: &str,
        document: &PlannerDocument,
        updated_at: DateTime<Utc>,
    ) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestAccountClient {
    config: AccountConfig,
    client: Client,
}

#[derive(Debug, serde::Deserialize)]
struct AuthUserPayload {
    id: String,
    email: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct AuthSessionPayload {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: Option<AuthUserPayload>,
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct StateRowPayload {
    state: PlannerDocument,
}

#[derive(Debug, serde::Serialize)]
struct StateUpsertPayload<'a> {
    user_id: &'a str,
    email: &'a str,
    state: &'a PlannerDocument,
    updated_at: String,
}

impl ReqwestAccountClient {
    pub fn new(config: AccountConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::InvalidInput(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|error| InfraError::Remote(format!("invalid service base url: {error}")))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| InfraError::Remote("service base URL cannot be a base".to_string()))?;
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("account service error: http {}", status.as_u16())
        } else {
            format!("account service error: http {}; body={body}", status.as_u16())
        };
        InfraError::Remote(message)
    }

    async fn auth_request(
        &self,
        url: Url,
        payload: serde_json::Value,
        operation: &str,
    ) -> Result<SessionGrant, InfraError> {
        let response = self
            .client
            .post(url)
            .header("apikey", &self.config.anon_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                InfraError::RemoteUnavailable(format!("network error while {operation}: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Remote(format!("failed reading {operation} response: {error}"))
        })?;

        let parsed = serde_json::from_str::<AuthSessionPayload>(&body).map_err(|error| {
            InfraError::Remote(format!("invalid {operation} payload: {error}; body={body}"))
        })?;

        if !status.is_success() || parsed.error.is_some() {
            let code = parsed
                .error
                .or(parsed.msg)
                .unwrap_or_else(|| format!("http_{}", status.as_u16()));
            let detail = parsed.error_description.unwrap_or_else(|| body.clone());
            return Err(InfraError::Remote(format!("{operation} failed: {code}; {detail}")));
        }

        let access_token = parsed
            .access_token
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                InfraError::Remote(format!("{operation} response did not include access token"))
            })?;
        let user = parsed
            .user
            .ok_or_else(|| InfraError::Remote(format!("{operation} response did not include user")))?;

        Ok(SessionGrant {
            access_token,
            refresh_token: parsed.refresh_token,
            expires_in: parsed.expires_in.unwrap_or(0).max(0),
            user_id: user.id,
            email: user.email.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl AccountClient for ReqwestAccountClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SessionGrant, InfraError> {
        Self::ensure_non_empty(email, "email")?;
        Self::ensure_non_empty(password, "password")?;
        let url = self.endpoint(&["auth", "v1", "signup"])?;
        self.auth_request(
            url,
            serde_json::json!({ "email": email.trim(), "password": password }),
            "signing up",
        )
        .await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionGrant, InfraError> {
        Self::ensure_non_empty(email, "email")?;
        Self::ensure_non_empty(password, "password")?;
        let mut url = self.endpoint(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        self.auth_request(
            url,
            serde_json::json!({ "email": email.trim(), "password": password }),
            "signing in",
        )
        .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionGrant, InfraError> {
        Self::ensure_non_empty(refresh_token, "refresh token")?;
        let mut url = self.endpoint(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");
        self.auth_request(
            url,
            serde_json::json!({ "refresh_token": refresh_token }),
            "refreshing session",
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        let url = self.endpoint(&["auth", "v1", "logout"])?;
        let response = self
            .client
            .post(url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| {
                InfraError::RemoteUnavailable(format!("network error while signing out: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStateClient for ReqwestAccountClient {
    async fn load_state(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Option<PlannerDocument>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(user_id, "user id")?;

        let mut url = self.endpoint(&["rest", "v1", STATES_TABLE])?;
        url.query_pairs_mut()
            .append_pair("user_id", &format!("eq.{user_id}"))
            .append_pair("select", "state");

        let response = self
            .client
            .get(url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| {
                InfraError::RemoteUnavailable(format!(
                    "network error while loading remote state: {error}"
                ))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Remote(format!("failed reading remote state response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }

        let mut rows = serde_json::from_str::<Vec<StateRowPayload>>(&body).map_err(|error| {
            InfraError::Remote(format!("invalid remote state payload: {error}; body={body}"))
        })?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.remove(0).state))
    }

    async fn upsert_state(
        &self,
        access_token: &str,
        user_id: &str,
        email: &str,
        document: &PlannerDocument,
        updated_at: DateTime<Utc>,
    ) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(user_id, "user id")?;

        let url = self.endpoint(&["rest", "v1", STATES_TABLE])?;
        let payload = StateUpsertPayload {
            user_id,
            email,
            state: document,
            updated_at: updated_at.to_rfc3339(),
        };

        let response = self
            .client
            .post(url)
            .header("apikey", &self.config.anon_key)
            .header("Prefer", "resolution=merge-duplicates")
            .bearer_auth(access_token)
            .json(&[payload])
            .send()
            .await
            .map_err(|error| {
                InfraError::RemoteUnavailable(format!(
                    "network error while saving remote state: {error}"
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ReqwestAccountClient {
        ReqwestAccountClient::new(AccountConfig::new(
            "https://example.supabase.co",
            "anon-key",
        ))
    }

    #[test]
    fn endpoints_are_built_from_base_url() {
        let client = client();
        let url = client.endpoint(&["auth", "v1", "signup"]).expect("endpoint");
        assert_eq!(url.as_str(), "https://example.supabase.co/auth/v1/signup");

        let url = client.endpoint(&["rest", "v1", STATES_TABLE]).expect("endpoint");
        assert_eq!(url.as_str(), "https://example.supabase.co/rest/v1/ritmo_states");
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let client = ReqwestAccountClient::new(AccountConfig::new("not a url", "anon-key"));
        assert!(client.endpoint(&["auth", "v1", "signup"]).is_err());
    }

    #[tokio::test]
    async fn blank_arguments_are_rejected_before_any_request() {
        let client = client();
        assert!(client.sign_in("", "secret").await.is_err());
        assert!(client.sign_in("ana@example.com", " ").await.is_err());
        assert!(client.refresh_session("  ").await.is_err());
        assert!(client.load_state("", "user-1").await.is_err());
    }

    #[test]
    fn auth_payload_parses_service_response() {
        let body = r#"{
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3600,
            "user": {"id": "user-1", "email": "ana@example.com"}
        }"#;
        let parsed = serde_json::from_str::<AuthSessionPayload>(body).expect("parse payload");
        assert_eq!(parsed.access_token.as_deref(), Some("at"));
        assert_eq!(parsed.expires_in, Some(3600));
        assert_eq!(parsed.user.expect("user").id, "user-1");
    }

    #[test]
    fn state_rows_parse_into_documents() {
        let document = PlannerDocument::starter("task-1".to_string());
        let body = serde_json::to_string(&[serde_json::json!({ "state": document })])
            .expect("serialize rows");
        let rows = serde_json::from_str::<Vec<StateRowPayload>>(&body).expect("parse rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state, document);
    }
}
