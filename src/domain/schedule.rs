use crate::domain::models::{DayKey, Task};
use std::str::FromStr;

/// Fallback length for a task that has a start time but neither an end time
/// nor an explicit duration.
pub const DEFAULT_TASK_DURATION_MIN: u32 = 30;

/// Free slots shorter than this are not actionable and are dropped by the
/// engine. Independent from the user-facing suggestion minimum below.
pub const MIN_FREE_SLOT_MIN: u32 = 10;

/// Cap on returned slot suggestions.
pub const SUGGESTION_LIMIT: usize = 16;

/// Half-open [start, end) span in minutes since local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: u32,
    pub end: u32,
}

impl TimeRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Strict half-open test: touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn clip(&self, window_start: u32, window_end: u32) -> Option<TimeRange> {
        let start = self.start.max(window_start);
        let end = self.end.min(window_end);
        (end > start).then_some(TimeRange { start, end })
    }
}

/// "HH:MM" to minutes since midnight. Fail-soft: a component that does not
/// parse counts as zero, so malformed input degrades instead of erroring.
pub fn to_minutes(hhmm: &str) -> u32 {
    let mut split = hhmm.split(':');
    let hours = split
        .next()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(0);
    let minutes = split
        .next()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(0);
    hours * 60 + minutes
}

/// Human duration label: "45min", "1h", "1h30".
pub fn minutes_label(minutes: u32) -> String {
    if minutes < 60 {
        return format!("{minutes}min");
    }
    let hours = minutes / 60;
    let remainder = minutes % 60;
    if remainder == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h{remainder:02}")
    }
}

/// Minutes since midnight rendered as "HH:MM".
pub fn format_clock(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn range_label(range: TimeRange) -> String {
    format!("{}–{}", format_clock(range.start), format_clock(range.end))
}

/// Resolves a task's effective range. Unscheduled tasks (no start time)
/// have none; an end time wins over a duration; otherwise the default
/// duration applies.
pub fn compute_task_range(task: &Task) -> Option<TimeRange> {
    let start_time = task.start_time.as_deref()?;
    let start = to_minutes(start_time);
    let end = match (&task.end_time, task.duration_min) {
        (Some(end_time), _) => to_minutes(end_time),
        (None, Some(duration)) => start + duration,
        (None, None) => start + DEFAULT_TASK_DURATION_MIN,
    };
    Some(TimeRange { start, end })
}

fn day_ranges(tasks: &[Task], day: DayKey) -> Vec<TimeRange> {
    tasks
        .iter()
        .filter(|task| task.day_key == day)
        .filter_map(compute_task_range)
        .filter(|range| !range.is_empty())
        .collect()
}

/// Sorts by start and coalesces overlapping or touching ranges into a
/// minimal disjoint set. The sort is what makes the single sweep correct.
pub fn merge_ranges(mut ranges: Vec<TimeRange>) -> Vec<TimeRange> {
    if ranges.is_empty() {
        return ranges;
    }

    ranges.sort_by_key(|range| range.start);
    let mut iter = ranges.into_iter();
    let mut merged = vec![iter.next().expect("ranges is non-empty")];
    for range in iter {
        let last = merged
            .last_mut()
            .expect("merged always contains at least one range");
        if range.start <= last.end {
            if range.end > last.end {
                last.end = range.end;
            }
            continue;
        }
        merged.push(range);
    }
    merged
}

/// Free slots of `day` inside the window: merged busy ranges subtracted from
/// [window_start, window_end), fragments under the noise floor dropped.
pub fn compute_free_slots(
    tasks: &[Task],
    day: DayKey,
    window_start: u32,
    window_end: u32,
) -> Vec<TimeRange> {
    let merged = merge_ranges(day_ranges(tasks, day));

    let mut slots = Vec::new();
    let mut cursor = window_start;
    for range in &merged {
        if range.start > cursor {
            slots.push(TimeRange {
                start: cursor,
                end: range.start.min(window_end),
            });
        }
        cursor = cursor.max(range.end);
        if cursor >= window_end {
            break;
        }
    }
    if cursor < window_end {
        slots.push(TimeRange {
            start: cursor,
            end: window_end,
        });
    }

    slots
        .into_iter()
        .filter(|slot| slot.len() >= MIN_FREE_SLOT_MIN)
        .collect()
}

/// Total minutes of `day` covered by merged ranges, clipped to the window
/// when one is given.
pub fn compute_busy_minutes(tasks: &[Task], day: DayKey, window: Option<(u32, u32)>) -> u32 {
    let merged = merge_ranges(day_ranges(tasks, day));
    merged
        .into_iter()
        .filter_map(|range| match window {
            Some((window_start, window_end)) => range.clip(window_start, window_end),
            None => Some(range),
        })
        .map(|range| range.len())
        .sum()
}

/// Same-day tasks whose resolved range overlaps the candidate, ordered by
/// start. Advisory: reporting a conflict never blocks a save.
pub fn find_conflicts<'a>(
    candidate: TimeRange,
    tasks: &'a [Task],
    day: DayKey,
    exclude_id: Option<&str>,
) -> Vec<(&'a Task, TimeRange)> {
    let mut hits = tasks
        .iter()
        .filter(|task| task.day_key == day)
        .filter(|task| exclude_id.is_none_or(|id| task.id != id))
        .filter_map(|task| {
            let range = compute_task_range(task)?;
            candidate.overlaps(&range).then_some((task, range))
        })
        .collect::<Vec<_>>();
    hits.sort_by_key(|(_, range)| range.start);
    hits
}

/// Listing order: by start time, unscheduled tasks last.
pub fn start_sort_key(task: &Task) -> u32 {
    compute_task_range(task).map_or(u32::MAX, |range| range.start)
}

pub fn sorted_day_tasks(tasks: &[Task], day: DayKey) -> Vec<&Task> {
    let mut day_tasks = tasks
        .iter()
        .filter(|task| task.day_key == day)
        .collect::<Vec<_>>();
    day_tasks.sort_by_key(|task| start_sort_key(task));
    day_tasks
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DayPeriod {
    #[default]
    All,
    Morning,
    Afternoon,
    Night,
}

impl DayPeriod {
    /// Morning ends at noon, afternoon at 18:00; a slot belongs to the
    /// period its start falls into.
    pub fn contains(self, start_min: u32) -> bool {
        match self {
            DayPeriod::All => true,
            DayPeriod::Morning => start_min < 12 * 60,
            DayPeriod::Afternoon => (12 * 60..18 * 60).contains(&start_min),
            DayPeriod::Night => start_min >= 18 * 60,
        }
    }
}

impl FromStr for DayPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(DayPeriod::All),
            "morning" => Ok(DayPeriod::Morning),
            "afternoon" => Ok(DayPeriod::Afternoon),
            "night" => Ok(DayPeriod::Night),
            other => Err(format!("unsupported period: {other}")),
        }
    }
}

/// User-facing suggestion filter. The minimum here is a separate knob from
/// the engine's noise floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotFilter {
    pub min_duration_min: u32,
    pub period: DayPeriod,
}

impl Default for SlotFilter {
    fn default() -> Self {
        Self {
            min_duration_min: 30,
            period: DayPeriod::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSuggestion {
    pub day: DayKey,
    pub slot: TimeRange,
}

/// Best free slots across the whole week: filtered by the user's minimum
/// duration and period, longest first then earliest, capped.
pub fn suggest_free_slots(
    tasks: &[Task],
    window_start: u32,
    window_end: u32,
    filter: SlotFilter,
) -> Vec<SlotSuggestion> {
    let mut suggestions = Vec::new();
    for day in DayKey::ALL {
        for slot in compute_free_slots(tasks, day, window_start, window_end) {
            if slot.len() < filter.min_duration_min {
                continue;
            }
            if !filter.period.contains(slot.start) {
                continue;
            }
            suggestions.push(SlotSuggestion { day, slot });
        }
    }

    suggestions.sort_by(|left, right| {
        right
            .slot
            .len()
            .cmp(&left.slot.len())
            .then(left.slot.start.cmp(&right.slot.start))
    });
    suggestions.truncate(SUGGESTION_LIMIT);
    suggestions
}
