use crate::application::account::{AccountManager, EnsureSessionResult};
use crate::application::bootstrap::bootstrap_workspace;
use crate::application::sync::{BootstrapOutcome, SyncDebouncer, SyncService};
use crate::domain::models::{
    DayKey, Goal, PlannerDocument, Priority, Profile, RepeatInfo, Settings, Task, Theme,
};
use crate::domain::repeat::{reconcile_group, GroupPatch};
use crate::domain::schedule::{
    compute_busy_minutes, compute_free_slots, compute_task_range, find_conflicts, minutes_label,
    range_label, sorted_day_tasks, suggest_free_slots, DayPeriod, SlotFilter,
};
use crate::infrastructure::account_client::{AccountConfig, ReqwestAccountClient};
use crate::infrastructure::credential_store::{CredentialStore, KeyringCredentialStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::state_repository::{LocalStateRepository, SqliteLocalStateRepository};
use crate::infrastructure::sync_log_repository::SqliteSyncLogRepository;
use chrono::{Datelike, Local, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub fn today_key() -> DayKey {
    DayKey::from_weekday(Local::now().weekday())
}

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    local_repository: Arc<SqliteLocalStateRepository>,
    sync_log: Arc<SqliteSyncLogRepository>,
    debouncer: SyncDebouncer,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let local_repository = Arc::new(SqliteLocalStateRepository::new(&bootstrap.database_path));
        let sync_log = Arc::new(SqliteSyncLogRepository::new(&bootstrap.database_path));

        let document = match local_repository.load()? {
            Some(document) => document,
            None => {
                let mut document = PlannerDocument::starter(next_id("task"));
                document.profile.quotes = Some(
                    crate::infrastructure::config::read_default_quotes(&bootstrap.config_dir)?,
                );
                local_repository.save(&document)?;
                document
            }
        };

        Ok(Self {
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            local_repository,
            sync_log,
            debouncer: SyncDebouncer::default_window(),
            runtime: Mutex::new(RuntimeState { document }),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        append_log_line(&self.logs_dir, level, command, message);
    }
}

fn append_log_line(logs_dir: &Path, level: &str, command: &str, message: &str) {
    let path = logs_dir.join("commands.log");
    let payload = serde_json::json!({
        "timestamp": Utc::now().to_rfc3339(),
        "level": level,
        "command": command,
        "message": message,
    });

    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", payload);
    }
}

#[derive(Debug)]
struct RuntimeState {
    document: PlannerDocument,
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidInput(format!("runtime lock poisoned: {error}")))
}

fn current_document(state: &AppState) -> Result<PlannerDocument, InfraError> {
    Ok(lock_runtime(state)?.document.clone())
}

/// Persists the replacement document: local slot first (authoritative),
/// then swap it into the runtime and arm the debounced remote push.
fn commit_document(state: &AppState, document: PlannerDocument) -> Result<(), InfraError> {
    state.local_repository.save(&document)?;
    lock_runtime(state)?.document = document;
    schedule_remote_push(state);
    Ok(())
}

fn schedule_remote_push(state: &AppState) {
    let local_repository = Arc::clone(&state.local_repository);
    let sync_log = Arc::clone(&state.sync_log);
    let logs_dir = state.logs_dir.clone();
    state.debouncer.schedule(async move {
        push_latest_state(local_repository, sync_log, logs_dir).await;
    });
}

/// The debounced push job. Reads the freshest local document at fire time
/// so a coalesced burst ships its final state. Every failure is swallowed
/// into the log; local state is already safe.
async fn push_latest_state(
    local_repository: Arc<SqliteLocalStateRepository>,
    sync_log: Arc<SqliteSyncLogRepository>,
    logs_dir: PathBuf,
) {
    let Ok(config) = load_account_config_from_env() else {
        return;
    };
    let client = Arc::new(ReqwestAccountClient::new(config));
    let manager = AccountManager::new(
        Arc::new(KeyringCredentialStore::default()),
        Arc::clone(&client),
    );

    let session = match manager.ensure_session().await {
        Ok(EnsureSessionResult::Active(session))
        | Ok(EnsureSessionResult::Refreshed(session)) => session,
        Ok(EnsureSessionResult::SignedOut) => return,
        Err(error) => {
            append_log_line(&logs_dir, "error", "remote_sync", &error.to_string());
            return;
        }
    };

    let document = match local_repository.load() {
        Ok(Some(document)) => document,
        _ => return,
    };

    let service = SyncService::new(client, local_repository, sync_log);
    if let Err(error) = service
        .push(&session.access_token, &session.user_id, &session.email, &document)
        .await
    {
        append_log_line(&logs_dir, "error", "remote_sync", &error.to_string());
    }
}

#[derive(Debug, Clone)]
pub struct NewTaskInput {
    pub title: String,
    pub day_key: DayKey,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_min: Option<u32>,
    pub tag: Option<String>,
    pub notify: bool,
    pub notify_min: Option<u32>,
    /// `Some(days)` creates one linked instance per day under a fresh group.
    pub repeat_days: Option<Vec<DayKey>>,
}

impl Default for NewTaskInput {
    fn default() -> Self {
        Self {
            title: String::new(),
            day_key: DayKey::Mon,
            start_time: None,
            end_time: None,
            duration_min: Some(30),
            tag: None,
            notify: true,
            notify_min: None,
            repeat_days: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateTaskInput {
    pub title: String,
    pub day_key: DayKey,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_min: Option<u32>,
    pub tag: Option<String>,
    pub notify: bool,
    pub notify_min: Option<u32>,
    /// For a fixed task: the new weekday set, `None` to stop repeating.
    pub repeat_days: Option<Vec<DayKey>>,
    /// Apply shared fields and the weekday set to the whole group.
    pub apply_to_group: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewGoalInput {
    pub title: String,
    pub tag: Option<String>,
    pub duration_min: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub theme: Option<Theme>,
    pub accent: Option<crate::domain::models::Accent>,
    pub quotes: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ConflictProbe {
    pub day_key: DayKey,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_min: Option<u32>,
    pub exclude_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictHit {
    pub task: Task,
    pub start_min: u32,
    pub end_min: u32,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FreeSlotItem {
    pub start_min: u32,
    pub end_min: u32,
    pub label: String,
    pub duration_label: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayOccupancy {
    pub day: DayKey,
    pub day_label: String,
    pub task_count: usize,
    pub busy_minutes: u32,
    pub busy_label: String,
    pub occupancy_pct: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SuggestionItem {
    pub day: DayKey,
    pub day_label: String,
    pub start_min: u32,
    pub end_min: u32,
    pub label: String,
    pub duration_label: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccountResponse {
    pub email: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncNowResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BootstrapStateResponse {
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

fn normalized_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn dedup_days(days: &[DayKey]) -> Vec<DayKey> {
    let mut unique = Vec::new();
    for day in days {
        if !unique.contains(day) {
            unique.push(*day);
        }
    }
    unique
}

fn validated(task: Task) -> Result<Task, InfraError> {
    task.validate().map_err(InfraError::InvalidInput)?;
    Ok(task)
}

fn assemble_task(
    id: String,
    day_key: DayKey,
    title: &str,
    start_time: Option<String>,
    end_time: Option<String>,
    duration_min: Option<u32>,
    tag: Option<String>,
    notify: bool,
    notify_min: Option<u32>,
    default_notify_min: u32,
    repeat: Option<RepeatInfo>,
) -> Task {
    // An explicit end time wins over a duration; a task without a start
    // time carries neither.
    let duration_min = if end_time.is_some() {
        None
    } else if start_time.is_some() {
        duration_min
    } else {
        None
    };
    Task {
        id,
        title: title.to_string(),
        day_key,
        start_time,
        end_time,
        duration_min,
        tag,
        priority: Priority::Medium,
        done: false,
        notify: Some(notify),
        notify_min: notify.then_some(notify_min.unwrap_or(default_notify_min)),
        repeat,
    }
}

pub fn create_task_impl(state: &AppState, input: NewTaskInput) -> Result<Vec<Task>, InfraError> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(InfraError::InvalidInput("task title must not be empty".to_string()));
    }

    let mut document = current_document(state)?;
    let default_notify_min = document.settings.default_notify_min;
    let start_time = normalized_text(&input.start_time);
    let end_time = normalized_text(&input.end_time);
    let tag = normalized_text(&input.tag);

    let created = match &input.repeat_days {
        Some(days) => {
            let days = dedup_days(days);
            if days.is_empty() {
                return Err(InfraError::InvalidInput(
                    "recurring task needs at least one selected day".to_string(),
                ));
            }
            let group_id = next_id("grp");
            days.iter()
                .map(|day| {
                    validated(assemble_task(
                        next_id("task"),
                        *day,
                        &title,
                        start_time.clone(),
                        end_time.clone(),
                        input.duration_min,
                        tag.clone(),
                        input.notify,
                        input.notify_min,
                        default_notify_min,
                        Some(RepeatInfo {
                            enabled: true,
                            days: days.clone(),
                            group_id: group_id.clone(),
                        }),
                    ))
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        None => vec![validated(assemble_task(
            next_id("task"),
            input.day_key,
            &title,
            start_time,
            end_time,
            input.duration_min,
            tag,
            input.notify,
            input.notify_min,
            default_notify_min,
            None,
        ))?],
    };

    let mut tasks = created.clone();
    tasks.extend(document.tasks);
    document.tasks = tasks;
    commit_document(state, document)?;
    Ok(created)
}

pub fn update_task_impl(
    state: &AppState,
    task_id: &str,
    input: UpdateTaskInput,
) -> Result<Vec<Task>, InfraError> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(InfraError::InvalidInput("task title must not be empty".to_string()));
    }

    let mut document = current_document(state)?;
    let existing = document
        .find_task(task_id)
        .cloned()
        .ok_or_else(|| InfraError::InvalidInput(format!("task not found: {task_id}")))?;

    let repeat_days = match &input.repeat_days {
        Some(days) => {
            let days = dedup_days(days);
            if days.is_empty() {
                return Err(InfraError::InvalidInput(
                    "recurring task needs at least one selected day".to_string(),
                ));
            }
            Some(days)
        }
        None => None,
    };

    let start_time = normalized_text(&input.start_time);
    let end_time = normalized_text(&input.end_time);
    let tag = normalized_text(&input.tag);
    let default_notify_min = document.settings.default_notify_min;

    if input.apply_to_group {
        if let Some(group_id) = existing.group_id().map(ToOwned::to_owned) {
            // Probe the shared fields once before rewriting the group.
            validated(assemble_task(
                existing.id.clone(),
                existing.day_key,
                &title,
                start_time.clone(),
                end_time.clone(),
                input.duration_min,
                tag.clone(),
                input.notify,
                input.notify_min,
                default_notify_min,
                None,
            ))?;

            let duration_min = if end_time.is_some() {
                None
            } else if start_time.is_some() {
                input.duration_min
            } else {
                None
            };
            let patch = GroupPatch {
                title: title.clone(),
                start_time,
                end_time,
                duration_min,
                tag,
                notify: Some(input.notify),
                notify_min: input.notify.then_some(input.notify_min.unwrap_or(default_notify_min)),
                days: repeat_days,
            };
            let member_ids = document
                .tasks
                .iter()
                .filter(|task| task.group_id() == Some(group_id.as_str()))
                .map(|task| task.id.clone())
                .collect::<HashSet<_>>();
            document.tasks = reconcile_group(document.tasks, &group_id, &patch, || next_id("task"));
            let affected = document
                .tasks
                .iter()
                .filter(|task| {
                    task.group_id() == Some(group_id.as_str()) || member_ids.contains(&task.id)
                })
                .cloned()
                .collect::<Vec<_>>();
            commit_document(state, document)?;
            return Ok(affected);
        }
    }

    // Plain by-id replacement. A task only keeps recurrence metadata it
    // already had; this path never mints a new group.
    let repeat = match (&existing.repeat, repeat_days) {
        (Some(repeat), Some(days)) => Some(RepeatInfo {
            enabled: true,
            days,
            group_id: repeat.group_id.clone(),
        }),
        _ => None,
    };

    let mut updated = assemble_task(
        existing.id.clone(),
        input.day_key,
        &title,
        start_time,
        end_time,
        input.duration_min,
        tag,
        input.notify,
        input.notify_min,
        default_notify_min,
        repeat,
    );
    updated.priority = existing.priority;
    updated.done = existing.done;
    let updated = validated(updated)?;

    document.replace_task(updated.clone());
    commit_document(state, document)?;
    Ok(vec![updated])
}

pub fn delete_task_impl(state: &AppState, task_id: &str) -> Result<bool, InfraError> {
    let mut document = current_document(state)?;
    if !document.remove_task(task_id) {
        return Ok(false);
    }
    commit_document(state, document)?;
    Ok(true)
}

pub fn toggle_task_done_impl(state: &AppState, task_id: &str) -> Result<Task, InfraError> {
    let mut document = current_document(state)?;
    let task = document
        .tasks
        .iter_mut()
        .find(|task| task.id == task_id)
        .ok_or_else(|| InfraError::InvalidInput(format!("task not found: {task_id}")))?;
    task.done = !task.done;
    let updated = task.clone();
    commit_document(state, document)?;
    Ok(updated)
}

pub fn toggle_pin_impl(
    state: &AppState,
    day: DayKey,
    task_id: &str,
) -> Result<Vec<String>, InfraError> {
    let mut document = current_document(state)?;
    if document.find_task(task_id).is_none() {
        return Err(InfraError::InvalidInput(format!("task not found: {task_id}")));
    }
    document.toggle_pin(day, task_id);
    let pins = document.top3_by_day.get(&day).cloned().unwrap_or_default();
    commit_document(state, document)?;
    Ok(pins)
}

pub fn pinned_tasks_impl(state: &AppState, day: DayKey) -> Result<Vec<Task>, InfraError> {
    let document = current_document(state)?;
    Ok(document.pinned_tasks(day).into_iter().cloned().collect())
}

pub fn list_tasks_impl(state: &AppState, day: Option<DayKey>) -> Result<Vec<Task>, InfraError> {
    let document = current_document(state)?;
    Ok(match day {
        Some(day) => sorted_day_tasks(&document.tasks, day)
            .into_iter()
            .cloned()
            .collect(),
        None => document.tasks,
    })
}

pub fn check_conflicts_impl(
    state: &AppState,
    probe: ConflictProbe,
) -> Result<Vec<ConflictHit>, InfraError> {
    let document = current_document(state)?;
    let candidate = Task {
        id: "probe".to_string(),
        title: "probe".to_string(),
        day_key: probe.day_key,
        start_time: normalized_text(&probe.start_time),
        end_time: normalized_text(&probe.end_time),
        duration_min: probe.duration_min,
        tag: None,
        priority: Priority::Medium,
        done: false,
        notify: None,
        notify_min: None,
        repeat: None,
    };
    let Some(range) = compute_task_range(&candidate) else {
        return Ok(Vec::new());
    };

    Ok(find_conflicts(
        range,
        &document.tasks,
        probe.day_key,
        probe.exclude_id.as_deref(),
    )
    .into_iter()
    .map(|(task, task_range)| ConflictHit {
        task: task.clone(),
        start_min: task_range.start,
        end_min: task_range.end,
        label: range_label(task_range),
    })
    .collect())
}

pub fn free_slots_impl(state: &AppState, day: DayKey) -> Result<Vec<FreeSlotItem>, InfraError> {
    let document = current_document(state)?;
    let (window_start, window_end) = document.settings.day_window();
    Ok(compute_free_slots(&document.tasks, day, window_start, window_end)
        .into_iter()
        .map(|slot| FreeSlotItem {
            start_min: slot.start,
            end_min: slot.end,
            label: range_label(slot),
            duration_label: minutes_label(slot.len()),
        })
        .collect())
}

pub fn busy_minutes_impl(state: &AppState, day: DayKey) -> Result<u32, InfraError> {
    let document = current_document(state)?;
    let window = document.settings.day_window();
    Ok(compute_busy_minutes(&document.tasks, day, Some(window)))
}

pub fn week_overview_impl(state: &AppState) -> Result<Vec<DayOccupancy>, InfraError> {
    let document = current_document(state)?;
    let (window_start, window_end) = document.settings.day_window();
    let window_total = window_end.saturating_sub(window_start).max(1);

    Ok(DayKey::ALL
        .into_iter()
        .map(|day| {
            let busy = compute_busy_minutes(&document.tasks, day, Some((window_start, window_end)));
            let occupancy_pct = ((busy * 100 + window_total / 2) / window_total).min(100);
            DayOccupancy {
                day,
                day_label: day.long_label().to_string(),
                task_count: document.tasks.iter().filter(|task| task.day_key == day).count(),
                busy_minutes: busy,
                busy_label: minutes_label(busy),
                occupancy_pct,
            }
        })
        .collect())
}

pub fn suggest_slots_impl(
    state: &AppState,
    min_duration_min: u32,
    period: DayPeriod,
) -> Result<Vec<SuggestionItem>, InfraError> {
    let document = current_document(state)?;
    let (window_start, window_end) = document.settings.day_window();
    let filter = SlotFilter {
        min_duration_min,
        period,
    };
    Ok(
        suggest_free_slots(&document.tasks, window_start, window_end, filter)
            .into_iter()
            .map(|suggestion| SuggestionItem {
                day: suggestion.day,
                day_label: suggestion.day.short_label().to_string(),
                start_min: suggestion.slot.start,
                end_min: suggestion.slot.end,
                label: range_label(suggestion.slot),
                duration_label: minutes_label(suggestion.slot.len()),
            })
            .collect(),
    )
}

pub fn add_goal_impl(state: &AppState, input: NewGoalInput) -> Result<Goal, InfraError> {
    let goal = Goal {
        id: next_id("goal"),
        title: input.title.trim().to_string(),
        tag: normalized_text(&input.tag),
        duration_min: input.duration_min,
        notes: normalized_text(&input.notes),
        created_at: Some(Utc::now()),
    };
    goal.validate().map_err(InfraError::InvalidInput)?;

    let mut document = current_document(state)?;
    document.goals.insert(0, goal.clone());
    commit_document(state, document)?;
    Ok(goal)
}

pub fn delete_goal_impl(state: &AppState, goal_id: &str) -> Result<bool, InfraError> {
    let mut document = current_document(state)?;
    let before = document.goals.len();
    document.goals.retain(|goal| goal.id != goal_id);
    if document.goals.len() == before {
        return Ok(false);
    }
    commit_document(state, document)?;
    Ok(true)
}

/// Turns a goal into a task on the chosen day (optionally at a time) and
/// removes it from the goal list, one atomic document swap.
pub fn allocate_goal_impl(
    state: &AppState,
    goal_id: &str,
    day: DayKey,
    start_time: Option<String>,
) -> Result<Task, InfraError> {
    let mut document = current_document(state)?;
    let goal = document
        .goals
        .iter()
        .find(|goal| goal.id == goal_id)
        .cloned()
        .ok_or_else(|| InfraError::InvalidInput(format!("goal not found: {goal_id}")))?;

    let start_time = normalized_text(&start_time);
    let task = Task {
        id: next_id("task"),
        title: goal.title.clone(),
        day_key: day,
        duration_min: start_time.is_some().then_some(goal.duration_min),
        start_time,
        end_time: None,
        tag: goal.tag.clone().or_else(|| Some("Pessoal".to_string())),
        priority: Priority::Medium,
        done: false,
        notify: Some(true),
        notify_min: Some(document.settings.default_notify_min),
        repeat: None,
    };
    let task = validated(task)?;

    document.goals.retain(|candidate| candidate.id != goal_id);
    document.tasks.insert(0, task.clone());
    commit_document(state, document)?;
    Ok(task)
}

pub fn update_settings_impl(state: &AppState, settings: Settings) -> Result<Settings, InfraError> {
    settings.validate().map_err(InfraError::InvalidInput)?;
    let normalized = settings.normalized();

    let mut document = current_document(state)?;
    document.settings = normalized.clone();
    commit_document(state, document)?;
    Ok(normalized)
}

pub fn update_profile_impl(state: &AppState, update: ProfileUpdate) -> Result<Profile, InfraError> {
    let mut document = current_document(state)?;
    if let Some(name) = update.name {
        document.profile.name = name.trim().to_string();
    }
    if let Some(theme) = update.theme {
        document.profile.theme = theme;
    }
    if let Some(accent) = update.accent {
        document.profile.accent = accent;
    }
    if let Some(quotes) = update.quotes {
        let quotes = quotes
            .into_iter()
            .map(|quote| quote.trim().to_string())
            .filter(|quote| !quote.is_empty())
            .collect::<Vec<_>>();
        // An emptied list stays stored; reads fall back to the defaults.
        document.profile.quotes = Some(quotes);
    }

    let profile = document.profile.clone();
    commit_document(state, document)?;
    Ok(profile)
}

pub fn set_notifications_enabled_impl(state: &AppState, enabled: bool) -> Result<bool, InfraError> {
    let mut document = current_document(state)?;
    document.notifications_enabled = enabled;
    commit_document(state, document)?;
    Ok(enabled)
}

pub fn daily_quote_impl(state: &AppState) -> Result<String, InfraError> {
    let document = current_document(state)?;
    Ok(document.profile.quote_for_date(Local::now().date_naive()))
}

pub fn reset_state_impl(state: &AppState) -> Result<PlannerDocument, InfraError> {
    let mut document = PlannerDocument::starter(next_id("task"));
    document.profile.quotes = Some(crate::infrastructure::config::read_default_quotes(
        &state.config_dir,
    )?);
    commit_document(state, document.clone())?;
    Ok(document)
}

fn load_account_config_from_env() -> Result<AccountConfig, InfraError> {
    load_account_config_from_lookup(|key| std::env::var(key).ok())
}

fn load_account_config_from_lookup<F>(lookup: F) -> Result<AccountConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let base_url = required_lookup_value(
        &lookup,
        &["RITMO_REMOTE_URL", "SUPABASE_URL"],
        "remote service url",
    )?;
    let anon_key = required_lookup_value(
        &lookup,
        &["RITMO_REMOTE_ANON_KEY", "SUPABASE_ANON_KEY"],
        "remote service anon key",
    )?;
    Ok(AccountConfig::new(base_url, anon_key))
}

fn required_lookup_value<F>(lookup: &F, keys: &[&str], field_name: &str) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Ok(normalized.to_string());
            }
        }
    }
    Err(InfraError::InvalidInput(format!(
        "missing {} (set one of: {})",
        field_name,
        keys.join(", ")
    )))
}

fn account_manager(
    config: AccountConfig,
) -> (
    Arc<ReqwestAccountClient>,
    AccountManager<KeyringCredentialStore, ReqwestAccountClient>,
) {
    let client = Arc::new(ReqwestAccountClient::new(config));
    let manager = AccountManager::new(
        Arc::new(KeyringCredentialStore::default()),
        Arc::clone(&client),
    );
    (client, manager)
}

pub async fn sign_up_impl(
    state: &AppState,
    email: String,
    password: String,
) -> Result<AccountResponse, InfraError> {
    let config = load_account_config_from_env()?;
    let (_, manager) = account_manager(config);
    let session = manager.sign_up(&email, &password).await?;
    state.log_info("sign_up", &format!("created account for {}", session.email));
    Ok(AccountResponse {
        email: session.email,
        user_id: session.user_id,
    })
}

pub async fn sign_in_impl(
    state: &AppState,
    email: String,
    password: String,
) -> Result<AccountResponse, InfraError> {
    let config = load_account_config_from_env()?;
    let (_, manager) = account_manager(config);
    let session = manager.sign_in(&email, &password).await?;
    state.log_info("sign_in", &format!("signed in as {}", session.email));
    Ok(AccountResponse {
        email: session.email,
        user_id: session.user_id,
    })
}

pub async fn sign_out_impl(state: &AppState) -> Result<(), InfraError> {
    match load_account_config_from_env() {
        Ok(config) => {
            let (_, manager) = account_manager(config);
            manager.sign_out().await?;
        }
        // No remote configured: just drop the stored credential.
        Err(_) => KeyringCredentialStore::default().delete_session()?,
    }
    state.log_info("sign_out", "cleared stored session");
    Ok(())
}

pub fn current_account_impl(_state: &AppState) -> Result<Option<AccountResponse>, InfraError> {
    let store = KeyringCredentialStore::default();
    Ok(store.load_session()?.map(|session| AccountResponse {
        email: session.email,
        user_id: session.user_id,
    }))
}

/// Startup sync: adopt the remote document when one exists, seed the
/// remote from a non-empty local one otherwise. Remote trouble of any kind
/// degrades to local-only; it never fails the launch.
pub async fn bootstrap_state_impl(state: &AppState) -> Result<BootstrapStateResponse, InfraError> {
    let local_document = current_document(state)?;

    let Ok(config) = load_account_config_from_env() else {
        return Ok(BootstrapStateResponse {
            outcome: "local_only".to_string(),
            email: None,
        });
    };
    let (client, manager) = account_manager(config);
    let session = match manager.ensure_session().await {
        Ok(EnsureSessionResult::Active(session))
        | Ok(EnsureSessionResult::Refreshed(session)) => session,
        Ok(EnsureSessionResult::SignedOut) => {
            return Ok(BootstrapStateResponse {
                outcome: "local_only".to_string(),
                email: None,
            });
        }
        Err(error) => {
            state.log_error("bootstrap_state", &error.to_string());
            return Ok(BootstrapStateResponse {
                outcome: "local_only".to_string(),
                email: None,
            });
        }
    };

    let service = SyncService::new(
        client,
        Arc::clone(&state.local_repository),
        Arc::clone(&state.sync_log),
    );
    let (document, outcome) = service
        .bootstrap(
            &session.access_token,
            &session.user_id,
            &session.email,
            local_document,
        )
        .await?;
    lock_runtime(state)?.document = document;

    let outcome = match outcome {
        BootstrapOutcome::AdoptedRemote => "adopted_remote",
        BootstrapOutcome::SeededRemote => "seeded_remote",
        BootstrapOutcome::LocalOnly => "local_only",
    };
    state.log_info("bootstrap_state", outcome);
    Ok(BootstrapStateResponse {
        outcome: outcome.to_string(),
        email: Some(session.email),
    })
}

/// Immediate push, superseding any pending debounced one. The outcome is a
/// boolean; failures are reported, never raised.
pub async fn sync_now_impl(state: &AppState) -> Result<SyncNowResponse, InfraError> {
    state.debouncer.cancel();

    let config = match load_account_config_from_env() {
        Ok(config) => config,
        Err(error) => {
            return Ok(SyncNowResponse {
                ok: false,
                detail: Some(error.to_string()),
            });
        }
    };
    let (client, manager) = account_manager(config);
    let session = match manager.ensure_session().await {
        Ok(EnsureSessionResult::Active(session))
        | Ok(EnsureSessionResult::Refreshed(session)) => session,
        Ok(EnsureSessionResult::SignedOut) => {
            return Ok(SyncNowResponse {
                ok: false,
                detail: Some("not signed in".to_string()),
            });
        }
        Err(error) => {
            state.log_error("sync_now", &error.to_string());
            return Ok(SyncNowResponse {
                ok: false,
                detail: Some(error.to_string()),
            });
        }
    };

    let document = current_document(state)?;
    let service = SyncService::new(
        client,
        Arc::clone(&state.local_repository),
        Arc::clone(&state.sync_log),
    );
    match service
        .push(&session.access_token, &session.user_id, &session.email, &document)
        .await
    {
        Ok(()) => Ok(SyncNowResponse {
            ok: true,
            detail: None,
        }),
        Err(error) => {
            state.log_error("sync_now", &error.to_string());
            Ok(SyncNowResponse {
                ok: false,
                detail: Some(error.to_string()),
            })
        }
    }
}
