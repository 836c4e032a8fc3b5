//! Collapses duplicate instances of a repeating Host reminder into the single instance
//! worth syncing.

use std::collections::HashMap;

use crate::task::UnifiedTask;

/// Groups `tasks` by trimmed, case-insensitive title; any group with more than one
/// member is collapsed to its single best representative. Returns the retained tasks
/// plus how many were dropped, so callers can log what was discarded.
pub fn dedupe_repeating(tasks: Vec<UnifiedTask>) -> (Vec<UnifiedTask>, usize) {
    let mut groups: HashMap<String, Vec<UnifiedTask>> = HashMap::new();
    for task in tasks {
        let key = task.title().trim().to_lowercase();
        groups.entry(key).or_default().push(task);
    }

    let mut dropped = 0;
    let mut kept = Vec::with_capacity(groups.len());
    for (_, mut group) in groups {
        if group.len() > 1 {
            dropped += group.len() - 1;
        }
        let best_index = best_index(&group);
        kept.push(group.swap_remove(best_index));
    }
    (kept, dropped)
}

/// Picks the index of the representative: incomplete before completed, then the latest
/// date (preferring `due_date`, falling back to `modified_at`), with no-date instances
/// sorting last.
fn best_index(group: &[UnifiedTask]) -> usize {
    group
        .iter()
        .enumerate()
        .max_by_key(|(_, task)| {
            let date = task.due_date().or_else(|| task.modified_at()).copied();
            (!task.completed(), date)
        })
        .map(|(index, _)| index)
        .unwrap_or(0)
}
