use crate::domain::models::{DayKey, RepeatInfo, Task};

/// Shared fields applied to every member of a repeat group by an
/// "apply to all" edit. `days: None` disables recurrence: members keep
/// their current days as plain, no-longer-linked tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPatch {
    pub title: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_min: Option<u32>,
    pub tag: Option<String>,
    pub notify: Option<bool>,
    pub notify_min: Option<u32>,
    pub days: Option<Vec<DayKey>>,
}

/// Reconciles a repeat group against an "apply to all" edit and returns the
/// replacement task collection: shared fields patched on every member, the
/// weekday set diffed against the target (deselected days dropped, missing
/// days synthesized from a template member with a fresh id), unrelated
/// tasks untouched. Synthesized instances always start with `done` reset —
/// the clone must not depend on which member happens to serve as template.
pub fn reconcile_group(
    tasks: Vec<Task>,
    group_id: &str,
    patch: &GroupPatch,
    mut make_id: impl FnMut() -> String,
) -> Vec<Task> {
    let target_days = patch.days.as_ref().map(|days| dedup_days(days));

    let patched = tasks
        .into_iter()
        .map(|task| {
            if task.group_id() != Some(group_id) {
                return task;
            }
            Task {
                title: patch.title.clone(),
                start_time: patch.start_time.clone(),
                end_time: patch.end_time.clone(),
                duration_min: patch.duration_min,
                tag: patch.tag.clone(),
                notify: patch.notify,
                notify_min: patch.notify_min,
                repeat: target_days.as_ref().map(|days| RepeatInfo {
                    enabled: true,
                    days: days.clone(),
                    group_id: group_id.to_string(),
                }),
                ..task
            }
        })
        .collect::<Vec<_>>();

    let Some(target_days) = target_days else {
        return patched;
    };

    let (members, unrelated): (Vec<Task>, Vec<Task>) = patched
        .into_iter()
        .partition(|task| task.group_id() == Some(group_id));

    let Some(template) = members.first().cloned() else {
        return unrelated;
    };

    let current_days = members.iter().map(|task| task.day_key).collect::<Vec<_>>();
    let kept = members
        .into_iter()
        .filter(|task| target_days.contains(&task.day_key))
        .collect::<Vec<_>>();

    let synthesized = target_days
        .iter()
        .filter(|day| !current_days.contains(day))
        .map(|day| Task {
            id: make_id(),
            day_key: *day,
            done: false,
            ..template.clone()
        })
        .collect::<Vec<_>>();

    let mut result = synthesized;
    result.extend(kept);
    result.extend(unrelated);
    result
}

fn dedup_days(days: &[DayKey]) -> Vec<DayKey> {
    let mut seen = Vec::new();
    for day in days {
        if !seen.contains(day) {
            seen.push(*day);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Priority;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn member(id: &str, day: DayKey, group_id: &str, done: bool) -> Task {
        Task {
            id: id.to_string(),
            title: "Academia".to_string(),
            day_key: day,
            start_time: Some("07:00".to_string()),
            end_time: None,
            duration_min: Some(60),
            tag: Some("Saúde".to_string()),
            priority: Priority::Medium,
            done,
            notify: Some(true),
            notify_min: Some(10),
            repeat: Some(RepeatInfo {
                enabled: true,
                days: vec![DayKey::Mon, DayKey::Wed, DayKey::Fri],
                group_id: group_id.to_string(),
            }),
        }
    }

    fn plain_task(id: &str, day: DayKey) -> Task {
        Task {
            id: id.to_string(),
            title: "Almoço".to_string(),
            day_key: day,
            start_time: Some("12:00".to_string()),
            end_time: None,
            duration_min: Some(45),
            tag: None,
            priority: Priority::Medium,
            done: false,
            notify: None,
            notify_min: None,
            repeat: None,
        }
    }

    fn sample_patch(days: Option<Vec<DayKey>>) -> GroupPatch {
        GroupPatch {
            title: "Academia cedo".to_string(),
            start_time: Some("06:30".to_string()),
            end_time: None,
            duration_min: Some(45),
            tag: Some("Saúde".to_string()),
            notify: Some(true),
            notify_min: Some(15),
            days,
        }
    }

    fn sequential_ids() -> impl FnMut() -> String {
        let mut counter = 0;
        move || {
            counter += 1;
            format!("new-{counter}")
        }
    }

    #[test]
    fn retarget_drops_deselected_day_and_synthesizes_missing_one() {
        let tasks = vec![
            member("m1", DayKey::Mon, "grp-1", true),
            member("m2", DayKey::Wed, "grp-1", false),
            member("m3", DayKey::Fri, "grp-1", false),
            plain_task("p1", DayKey::Mon),
        ];
        let patch = sample_patch(Some(vec![DayKey::Wed, DayKey::Fri, DayKey::Sun]));
        let result = reconcile_group(tasks, "grp-1", &patch, sequential_ids());

        let group = result
            .iter()
            .filter(|task| task.group_id() == Some("grp-1"))
            .collect::<Vec<_>>();
        assert_eq!(group.len(), 3);

        let days = group.iter().map(|task| task.day_key).collect::<HashSet<_>>();
        assert_eq!(days, HashSet::from([DayKey::Wed, DayKey::Fri, DayKey::Sun]));

        for task in &group {
            assert_eq!(task.title, "Academia cedo");
            assert_eq!(task.start_time.as_deref(), Some("06:30"));
            assert_eq!(task.duration_min, Some(45));
            assert_eq!(task.notify_min, Some(15));
            let repeat = task.repeat.as_ref().expect("repeat kept");
            assert_eq!(repeat.days, vec![DayKey::Wed, DayKey::Fri, DayKey::Sun]);
        }

        let sunday = group
            .iter()
            .find(|task| task.day_key == DayKey::Sun)
            .expect("synthesized instance");
        assert_eq!(sunday.id, "new-1");
        assert!(!sunday.done, "synthesized clone starts not done");

        assert!(result.iter().any(|task| task.id == "p1"));
        assert!(!result.iter().any(|task| task.day_key == DayKey::Mon
            && task.group_id() == Some("grp-1")));
    }

    #[test]
    fn disabling_recurrence_unlinks_members_in_place() {
        let tasks = vec![
            member("m1", DayKey::Mon, "grp-1", false),
            member("m2", DayKey::Wed, "grp-1", true),
        ];
        let patch = sample_patch(None);
        let result = reconcile_group(tasks, "grp-1", &patch, sequential_ids());

        assert_eq!(result.len(), 2);
        for task in &result {
            assert!(task.repeat.is_none());
            assert_eq!(task.title, "Academia cedo");
        }
        // Members keep their own day and completion state.
        assert_eq!(result[0].day_key, DayKey::Mon);
        assert!(result[1].done);
    }

    #[test]
    fn identical_target_set_only_patches() {
        let tasks = vec![
            member("m1", DayKey::Mon, "grp-1", false),
            member("m2", DayKey::Wed, "grp-1", false),
            member("m3", DayKey::Fri, "grp-1", false),
        ];
        let patch = sample_patch(Some(vec![DayKey::Mon, DayKey::Wed, DayKey::Fri]));
        let result = reconcile_group(tasks, "grp-1", &patch, sequential_ids());

        assert_eq!(result.len(), 3);
        let ids = result.iter().map(|task| task.id.as_str()).collect::<HashSet<_>>();
        assert_eq!(ids, HashSet::from(["m1", "m2", "m3"]));
    }

    #[test]
    fn duplicate_target_days_are_deduplicated() {
        let tasks = vec![member("m1", DayKey::Mon, "grp-1", false)];
        let patch = sample_patch(Some(vec![DayKey::Tue, DayKey::Tue, DayKey::Mon]));
        let result = reconcile_group(tasks, "grp-1", &patch, sequential_ids());

        assert_eq!(result.len(), 2);
        let repeat = result[0].repeat.as_ref().expect("repeat");
        assert_eq!(repeat.days, vec![DayKey::Tue, DayKey::Mon]);
    }

    #[test]
    fn unknown_group_leaves_collection_untouched() {
        let tasks = vec![plain_task("p1", DayKey::Mon), plain_task("p2", DayKey::Tue)];
        let patch = sample_patch(Some(vec![DayKey::Sun]));
        let result = reconcile_group(tasks.clone(), "grp-missing", &patch, sequential_ids());
        assert_eq!(result, tasks);
    }

    #[test]
    fn other_groups_are_not_affected() {
        let tasks = vec![
            member("m1", DayKey::Mon, "grp-1", false),
            member("x1", DayKey::Tue, "grp-2", false),
        ];
        let patch = sample_patch(Some(vec![DayKey::Sat]));
        let result = reconcile_group(tasks, "grp-1", &patch, sequential_ids());

        let other = result.iter().find(|task| task.id == "x1").expect("other group");
        assert_eq!(other.title, "Academia");
        assert_eq!(other.day_key, DayKey::Tue);
        assert_eq!(other.group_id(), Some("grp-2"));
    }

    fn arb_day_set() -> impl Strategy<Value = Vec<DayKey>> {
        proptest::collection::vec(0usize..7, 1..7).prop_map(|indices| {
            let mut days = Vec::new();
            for index in indices {
                let day = DayKey::ALL[index];
                if !days.contains(&day) {
                    days.push(day);
                }
            }
            days
        })
    }

    proptest! {
        #[test]
        fn reconciled_group_matches_target_exactly(
            current in arb_day_set(),
            target in arb_day_set(),
            unrelated_count in 0usize..4
        ) {
            let mut tasks = current
                .iter()
                .enumerate()
                .map(|(index, day)| member(&format!("m{index}"), *day, "grp-1", index % 2 == 0))
                .collect::<Vec<_>>();
            for index in 0..unrelated_count {
                tasks.push(plain_task(&format!("p{index}"), DayKey::ALL[index % 7]));
            }

            let patch = sample_patch(Some(target.clone()));
            let result = reconcile_group(tasks, "grp-1", &patch, sequential_ids());

            let group_days = result
                .iter()
                .filter(|task| task.group_id() == Some("grp-1"))
                .map(|task| task.day_key)
                .collect::<HashSet<_>>();
            prop_assert_eq!(group_days, target.iter().copied().collect::<HashSet<_>>());

            let unrelated = result.iter().filter(|task| task.repeat.is_none()).count();
            prop_assert_eq!(unrelated, unrelated_count);

            let mut ids = result.iter().map(|task| task.id.clone()).collect::<Vec<_>>();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), result.len());
        }
    }
}
