use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Quotes shown on the header card when the profile has none of its own.
pub const DEFAULT_QUOTES: [&str; 5] = [
    "Devagar e sempre.",
    "Um passo por vez.",
    "Consistência vence.",
    "Hoje é um bom dia.",
    "Priorize o essencial.",
];

/// A day keeps at most this many pinned tasks; pinning another evicts the oldest.
pub const MAX_PINNED_PER_DAY: usize = 3;

/// Notification lead time is clamped to this many minutes.
pub const NOTIFY_LEAD_MAX_MIN: u32 = 240;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DayKey {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayKey {
    pub const ALL: [DayKey; 7] = [
        DayKey::Mon,
        DayKey::Tue,
        DayKey::Wed,
        DayKey::Thu,
        DayKey::Fri,
        DayKey::Sat,
        DayKey::Sun,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DayKey::Mon => "mon",
            DayKey::Tue => "tue",
            DayKey::Wed => "wed",
            DayKey::Thu => "thu",
            DayKey::Fri => "fri",
            DayKey::Sat => "sat",
            DayKey::Sun => "sun",
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            DayKey::Mon => "Seg",
            DayKey::Tue => "Ter",
            DayKey::Wed => "Qua",
            DayKey::Thu => "Qui",
            DayKey::Fri => "Sex",
            DayKey::Sat => "Sáb",
            DayKey::Sun => "Dom",
        }
    }

    pub fn long_label(self) -> &'static str {
        match self {
            DayKey::Mon => "Segunda-feira",
            DayKey::Tue => "Terça-feira",
            DayKey::Wed => "Quarta-feira",
            DayKey::Thu => "Quinta-feira",
            DayKey::Fri => "Sexta-feira",
            DayKey::Sat => "Sábado",
            DayKey::Sun => "Domingo",
        }
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayKey::Mon,
            Weekday::Tue => DayKey::Tue,
            Weekday::Wed => DayKey::Wed,
            Weekday::Thu => DayKey::Thu,
            Weekday::Fri => DayKey::Fri,
            Weekday::Sat => DayKey::Sat,
            Weekday::Sun => DayKey::Sun,
        }
    }
}

impl std::fmt::Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mon" | "monday" => Ok(DayKey::Mon),
            "tue" | "tuesday" => Ok(DayKey::Tue),
            "wed" | "wednesday" => Ok(DayKey::Wed),
            "thu" | "thursday" => Ok(DayKey::Thu),
            "fri" | "friday" => Ok(DayKey::Fri),
            "sat" | "saturday" => Ok(DayKey::Sat),
            "sun" | "sunday" => Ok(DayKey::Sun),
            other => Err(format!("unsupported day key: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Priority {
    #[serde(rename = "baixa")]
    Low,
    #[default]
    #[serde(rename = "media")]
    Medium,
    #[serde(rename = "alta")]
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepeatInfo {
    pub enabled: bool,
    pub days: Vec<DayKey>,
    pub group_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub day_key: DayKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub priority: Priority,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatInfo>,
}

impl Task {
    /// A task without a start time has no resolvable range and is skipped by
    /// every interval computation; it still shows up in plain listings.
    pub fn is_scheduled(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn group_id(&self) -> Option<&str> {
        self.repeat.as_ref().map(|repeat| repeat.group_id.as_str())
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.title, "task.title")?;
        if let Some(start_time) = &self.start_time {
            validate_hhmm(start_time, "task.startTime")?;
        }
        if let Some(end_time) = &self.end_time {
            validate_hhmm(end_time, "task.endTime")?;
            let Some(start_time) = &self.start_time else {
                return Err("task.endTime requires task.startTime".to_string());
            };
            if hhmm_ordinal(end_time) <= hhmm_ordinal(start_time) {
                return Err("task.endTime must be after task.startTime".to_string());
            }
        }
        if let Some(duration) = self.duration_min {
            if duration == 0 {
                return Err("task.durationMin must be > 0".to_string());
            }
        }
        if let Some(lead) = self.notify_min {
            if lead > NOTIFY_LEAD_MAX_MIN {
                return Err(format!("task.notifyMin must be <= {NOTIFY_LEAD_MAX_MIN}"));
            }
        }
        if let Some(repeat) = &self.repeat {
            if repeat.enabled && repeat.days.is_empty() {
                return Err("task.repeat.days must not be empty".to_string());
            }
            validate_non_empty(&repeat.group_id, "task.repeat.groupId")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub duration_min: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Goal {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "goal.id")?;
        validate_non_empty(&self.title, "goal.title")?;
        if self.duration_min == 0 {
            return Err("goal.durationMin must be > 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Accent {
    #[default]
    Orange,
    Blue,
    Green,
    Pink,
    Purple,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub theme: Theme,
    pub accent: Accent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quotes: Option<Vec<String>>,
}

impl Profile {
    pub fn quotes_or_default(&self) -> Vec<String> {
        match &self.quotes {
            Some(quotes) if !quotes.is_empty() => quotes.clone(),
            _ => DEFAULT_QUOTES.iter().map(|quote| quote.to_string()).collect(),
        }
    }

    /// Deterministic pick for the day: the formatted date's byte sum indexes
    /// the quote list, so every view of the same day shows the same quote.
    pub fn quote_for_date(&self, date: NaiveDate) -> String {
        let quotes = self.quotes_or_default();
        let seed: usize = date
            .format("%a %b %d %Y")
            .to_string()
            .bytes()
            .map(usize::from)
            .sum();
        quotes[seed % quotes.len()].clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub day_start: String,
    pub day_end: String,
    pub default_notify_min: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            day_start: "06:00".to_string(),
            day_end: "22:00".to_string(),
            default_notify_min: 10,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        validate_hhmm(&self.day_start, "settings.dayStart")?;
        validate_hhmm(&self.day_end, "settings.dayEnd")?;
        if hhmm_ordinal(&self.day_end) <= hhmm_ordinal(&self.day_start) {
            return Err("settings.dayEnd must be after settings.dayStart".to_string());
        }
        Ok(())
    }

    /// Copy with the notification lead clamped into range.
    pub fn normalized(&self) -> Self {
        Self {
            day_start: self.day_start.clone(),
            day_end: self.day_end.clone(),
            default_notify_min: self.default_notify_min.min(NOTIFY_LEAD_MAX_MIN),
        }
    }

    pub fn day_window(&self) -> (u32, u32) {
        (
            crate::domain::schedule::to_minutes(&self.day_start),
            crate::domain::schedule::to_minutes(&self.day_end),
        )
    }
}

/// The whole per-user application state: the unit of local persistence and
/// of remote sync. Commands never mutate it in place; they build a modified
/// copy and swap it in wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlannerDocument {
    pub profile: Profile,
    pub settings: Settings,
    pub tasks: Vec<Task>,
    pub goals: Vec<Goal>,
    #[serde(default)]
    pub top3_by_day: HashMap<DayKey, Vec<String>>,
    pub notifications_enabled: bool,
}

impl PlannerDocument {
    /// The seed document a fresh install starts from: default window and
    /// quotes plus one sample task, matching what first-run users see.
    pub fn starter(sample_task_id: String) -> Self {
        Self {
            profile: Profile {
                name: String::new(),
                theme: Theme::Light,
                accent: Accent::Orange,
                quotes: Some(DEFAULT_QUOTES.iter().map(|quote| quote.to_string()).collect()),
            },
            settings: Settings::default(),
            tasks: vec![Task {
                id: sample_task_id,
                title: "Conferir pedidos".to_string(),
                day_key: DayKey::Mon,
                start_time: Some("10:00".to_string()),
                end_time: None,
                duration_min: Some(30),
                tag: Some("Trabalho".to_string()),
                priority: Priority::Medium,
                done: false,
                notify: Some(true),
                notify_min: Some(10),
                repeat: None,
            }],
            goals: Vec::new(),
            top3_by_day: HashMap::new(),
            notifications_enabled: false,
        }
    }

    /// Whether this document is worth seeding into an empty remote record.
    pub fn is_worth_seeding(&self) -> bool {
        !self.tasks.is_empty()
            || !self.goals.is_empty()
            || !self.profile.name.trim().is_empty()
            || self
                .profile
                .quotes
                .as_ref()
                .is_some_and(|quotes| !quotes.is_empty())
    }

    pub fn find_task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn replace_task(&mut self, task: Task) -> bool {
        match self.tasks.iter_mut().find(|candidate| candidate.id == task.id) {
            Some(slot) => {
                *slot = task;
                true
            }
            None => false,
        }
    }

    /// Removes a task and scrubs its id from every day's pin list.
    pub fn remove_task(&mut self, task_id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != task_id);
        for pins in self.top3_by_day.values_mut() {
            pins.retain(|id| id != task_id);
        }
        self.tasks.len() != before
    }

    /// Pin toggle: unpin when already pinned, otherwise push to the front
    /// and cap the list, evicting the oldest pin beyond the limit.
    pub fn toggle_pin(&mut self, day: DayKey, task_id: &str) {
        let pins = self.top3_by_day.entry(day).or_default();
        if pins.iter().any(|id| id == task_id) {
            pins.retain(|id| id != task_id);
            return;
        }
        pins.insert(0, task_id.to_string());
        pins.truncate(MAX_PINNED_PER_DAY);
    }

    /// Pinned tasks for the day, newest first; stale ids are skipped.
    pub fn pinned_tasks(&self, day: DayKey) -> Vec<&Task> {
        self.top3_by_day
            .get(&day)
            .map(|pins| {
                pins.iter()
                    .filter_map(|id| self.find_task(id))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + chrono::Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    let mut split = value.split(':');
    let Some(hour_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    let Some(minute_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    if split.next().is_some() {
        return Err(format!("{field_name} must be HH:MM"));
    }

    let hour = hour_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    let minute = minute_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    if hour > 23 || minute > 59 {
        return Err(format!("{field_name} must be HH:MM"));
    }
    Ok(())
}

fn hhmm_ordinal(value: &str) -> u32 {
    crate::domain::schedule::to_minutes(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_task() -> Task {
        Task {
            id: "task-1".to_string(),
            title: "Conferir pedidos".to_string(),
            day_key: DayKey::Mon,
            start_time: Some("10:00".to_string()),
            end_time: None,
            duration_min: Some(30),
            tag: Some("Trabalho".to_string()),
            priority: Priority::Medium,
            done: false,
            notify: Some(true),
            notify_min: Some(10),
            repeat: None,
        }
    }

    fn sample_goal() -> Goal {
        Goal {
            id: "goal-1".to_string(),
            title: "Ler 20 páginas".to_string(),
            tag: Some("Pessoal".to_string()),
            duration_min: 30,
            notes: None,
            created_at: Some(fixed_time("2026-02-16T08:00:00Z")),
        }
    }

    fn sample_document() -> PlannerDocument {
        let mut document = PlannerDocument::starter("task-1".to_string());
        document.goals.push(sample_goal());
        document
    }

    #[test]
    fn task_validate_accepts_sample() {
        assert!(sample_task().validate().is_ok());
    }

    #[test]
    fn task_validate_rejects_blank_title() {
        let mut task = sample_task();
        task.title = "   ".to_string();
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_validate_rejects_reversed_range() {
        let mut task = sample_task();
        task.start_time = Some("10:00".to_string());
        task.end_time = Some("09:00".to_string());
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_validate_rejects_recurring_without_days() {
        let mut task = sample_task();
        task.repeat = Some(RepeatInfo {
            enabled: true,
            days: Vec::new(),
            group_id: "grp-1".to_string(),
        });
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_validate_rejects_excessive_notify_lead() {
        let mut task = sample_task();
        task.notify_min = Some(NOTIFY_LEAD_MAX_MIN + 1);
        assert!(task.validate().is_err());
    }

    #[test]
    fn settings_normalized_clamps_notify_lead() {
        let settings = Settings {
            default_notify_min: 999,
            ..Settings::default()
        };
        assert_eq!(settings.normalized().default_notify_min, NOTIFY_LEAD_MAX_MIN);
    }

    #[test]
    fn settings_day_window_resolves_minutes() {
        assert_eq!(Settings::default().day_window(), (360, 1320));
    }

    #[test]
    fn day_key_wire_names_round_trip() {
        for day in DayKey::ALL {
            let encoded = serde_json::to_string(&day).expect("serialize day key");
            assert_eq!(encoded, format!("\"{day}\""));
            let decoded: DayKey = serde_json::from_str(&encoded).expect("deserialize day key");
            assert_eq!(decoded, day);
            assert_eq!(day.as_str().parse::<DayKey>().expect("parse day key"), day);
        }
    }

    #[test]
    fn day_key_from_weekday_covers_week() {
        assert_eq!(DayKey::from_weekday(Weekday::Mon), DayKey::Mon);
        assert_eq!(DayKey::from_weekday(Weekday::Sun), DayKey::Sun);
    }

    #[test]
    fn quotes_fall_back_to_defaults_when_empty() {
        let profile = Profile {
            quotes: Some(Vec::new()),
            ..Profile::default()
        };
        assert_eq!(profile.quotes_or_default().len(), DEFAULT_QUOTES.len());
    }

    #[test]
    fn quote_for_date_is_deterministic() {
        let profile = Profile::default();
        let date = NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date");
        assert_eq!(profile.quote_for_date(date), profile.quote_for_date(date));
    }

    #[test]
    fn toggle_pin_caps_at_three_and_keeps_newest_first() {
        let mut document = sample_document();
        document.toggle_pin(DayKey::Mon, "a");
        document.toggle_pin(DayKey::Mon, "b");
        document.toggle_pin(DayKey::Mon, "c");
        document.toggle_pin(DayKey::Mon, "d");
        assert_eq!(
            document.top3_by_day.get(&DayKey::Mon).expect("pins"),
            &vec!["d".to_string(), "c".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn toggle_pin_unpins_existing_entry() {
        let mut document = sample_document();
        document.toggle_pin(DayKey::Tue, "a");
        document.toggle_pin(DayKey::Tue, "a");
        assert!(document.top3_by_day.get(&DayKey::Tue).expect("pins").is_empty());
    }

    #[test]
    fn remove_task_cascades_to_pins() {
        let mut document = sample_document();
        document.toggle_pin(DayKey::Mon, "task-1");
        assert!(document.remove_task("task-1"));
        assert!(document.find_task("task-1").is_none());
        assert!(document.top3_by_day.get(&DayKey::Mon).expect("pins").is_empty());
    }

    #[test]
    fn pinned_tasks_skip_stale_ids() {
        let mut document = sample_document();
        document.toggle_pin(DayKey::Mon, "task-1");
        document.toggle_pin(DayKey::Mon, "ghost");
        let pinned = document.pinned_tasks(DayKey::Mon);
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].id, "task-1");
    }

    #[test]
    fn starter_document_is_worth_seeding_and_empty_is_not() {
        assert!(sample_document().is_worth_seeding());
        let empty = PlannerDocument {
            profile: Profile::default(),
            settings: Settings::default(),
            tasks: Vec::new(),
            goals: Vec::new(),
            top3_by_day: HashMap::new(),
            notifications_enabled: false,
        };
        assert!(!empty.is_worth_seeding());
    }

    #[test]
    fn session_token_validity_honors_leeway() {
        let token = SessionToken {
            access_token: "access".to_string(),
            refresh_token: None,
            user_id: "user-1".to_string(),
            email: "a@b.c".to_string(),
            expires_at: fixed_time("2026-02-16T10:00:00Z"),
        };
        assert!(token.is_valid_at(fixed_time("2026-02-16T09:58:00Z"), 60));
        assert!(!token.is_valid_at(fixed_time("2026-02-16T09:59:30Z"), 60));
    }

    #[test]
    fn document_wire_format_matches_web_client() {
        let document = sample_document();
        let encoded = serde_json::to_value(&document).expect("serialize document");
        assert!(encoded.get("top3ByDay").is_some());
        assert!(encoded.get("notificationsEnabled").is_some());
        let task = &encoded["tasks"][0];
        assert_eq!(task["dayKey"], "mon");
        assert_eq!(task["startTime"], "10:00");
        assert_eq!(task["durationMin"], 30);
        assert_eq!(task["priority"], "media");
        let goal = &encoded["goals"][0];
        assert!(goal["createdAt"].is_number());
    }

    proptest! {
        #[test]
        fn document_serde_roundtrip(
            name in "[a-zA-Z ]{0,12}",
            task_count in 0usize..5,
            notify in proptest::option::of(0u32..=240u32)
        ) {
            let mut document = sample_document();
            document.profile.name = name;
            document.tasks = (0..task_count)
                .map(|index| {
                    let mut task = sample_task();
                    task.id = format!("task-{index}");
                    task.notify_min = notify;
                    task
                })
                .collect();

            let encoded = serde_json::to_string(&document).expect("serialize document");
            let decoded: PlannerDocument =
                serde_json::from_str(&encoded).expect("deserialize document");
            prop_assert_eq!(decoded, document);
        }
    }
}
