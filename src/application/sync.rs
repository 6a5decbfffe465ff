use crate::domain::models::PlannerDocument;
use crate::infrastructure::account_client::RemoteStateClient;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::state_repository::LocalStateRepository;
use crate::infrastructure::sync_log_repository::SyncLogRepository;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration as TokioDuration};

/// Quiet period after the last edit before the remote push fires. Bursts of
/// edits inside the window coalesce into one write.
pub const SYNC_DEBOUNCE_MS: u64 = 900;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The remote record existed and replaced the local document.
    AdoptedRemote,
    /// No remote record; the non-empty local document seeded it.
    SeededRemote,
    /// Nothing exchanged; the local document stands alone.
    LocalOnly,
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Best-effort exchange with the remote state record. The remote store is a
/// cache refresh, never the in-session source of truth: reads that fail
/// count as "no remote state yet" and pushes that fail leave local state
/// untouched.
pub struct SyncService<R, L, G>
where
    R: RemoteStateClient,
    L: LocalStateRepository,
    G: SyncLogRepository,
{
    remote_client: Arc<R>,
    local_repository: Arc<L>,
    sync_log: Arc<G>,
    retry_policy: RetryPolicy,
    now_provider: NowProvider,
}

impl<R, L, G> SyncService<R, L, G>
where
    R: RemoteStateClient,
    L: LocalStateRepository,
    G: SyncLogRepository,
{
    pub fn new(remote_client: Arc<R>, local_repository: Arc<L>, sync_log: Arc<G>) -> Self {
        Self {
            remote_client,
            local_repository,
            sync_log,
            retry_policy: RetryPolicy::default(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Startup exchange: adopt the remote record when it exists, otherwise
    /// seed it from a non-empty local document.
    pub async fn bootstrap(
        &self,
        access_token: &str,
        user_id: &str,
        email: &str,
        local_document: PlannerDocument,
    ) -> Result<(PlannerDocument, BootstrapOutcome), InfraError> {
        let remote_document = self
            .load_with_retry(access_token, user_id)
            .await
            .unwrap_or(None);

        if let Some(document) = remote_document {
            self.local_repository.save(&document)?;
            self.sync_log.record_pull((self.now_provider)())?;
            return Ok((document, BootstrapOutcome::AdoptedRemote));
        }

        if local_document.is_worth_seeding() {
            match self
                .push_with_retry(access_token, user_id, email, &local_document)
                .await
            {
                Ok(()) => {
                    self.sync_log.record_push((self.now_provider)())?;
                    return Ok((local_document, BootstrapOutcome::SeededRemote));
                }
                Err(_) => return Ok((local_document, BootstrapOutcome::LocalOnly)),
            }
        }

        Ok((local_document, BootstrapOutcome::LocalOnly))
    }

    pub async fn push(
        &self,
        access_token: &str,
        user_id: &str,
        email: &str,
        document: &PlannerDocument,
    ) -> Result<(), InfraError> {
        self.push_with_retry(access_token, user_id, email, document)
            .await?;
        self.sync_log.record_push((self.now_provider)())?;
        Ok(())
    }

    async fn load_with_retry(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Option<PlannerDocument>, InfraError> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match self.remote_client.load_state(access_token, user_id).await {
                Ok(found) => return Ok(found),
                Err(error) if Self::should_retry(&error) && attempt + 1 < max_attempts => {
                    self.backoff(attempt).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn push_with_retry(
        &self,
        access_token: &str,
        user_id: &str,
        email: &str,
        document: &PlannerDocument,
    ) -> Result<(), InfraError> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match self
                .remote_client
                .upsert_state(access_token, user_id, email, document, (self.now_provider)())
                .await
            {
                Ok(()) => return Ok(()),
                Err(error) if Self::should_retry(&error) && attempt + 1 < max_attempts => {
                    self.backoff(attempt).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn backoff(&self, attempt: u8) {
        let delay = self
            .retry_policy
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt as u32));
        sleep(TokioDuration::from_millis(delay)).await;
    }

    fn should_retry(error: &InfraError) -> bool {
        matches!(error, InfraError::RemoteUnavailable(_))
    }
}

/// Cancel-on-supersede countdown for the remote push: scheduling a new job
/// aborts any pending one and restarts the quiet period, so a burst of
/// edits becomes a single write.
pub struct SyncDebouncer {
    quiet_period: TokioDuration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl SyncDebouncer {
    pub fn new(quiet_period: TokioDuration) -> Self {
        Self {
            quiet_period,
            pending: Mutex::new(None),
        }
    }

    pub fn default_window() -> Self {
        Self::new(TokioDuration::from_millis(SYNC_DEBOUNCE_MS))
    }

    /// Supersedes any pending job and starts a fresh countdown. Without a
    /// running runtime there is nothing to arm; the caller's local write
    /// has already happened and the push stays best-effort.
    pub fn schedule<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let quiet_period = self.quiet_period;
        *pending = Some(runtime.spawn(async move {
            sleep(quiet_period).await;
            job.await;
        }));
    }

    /// Aborts the pending job, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        match pending.take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }
}
