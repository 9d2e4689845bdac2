//! Health watchdog: periodically samples every registered Git sync engine
//! and escalates status events on repeated unhealthy observations, without
//! ever restarting an engine itself (spec.md §4.3 "Health watchdog"). The
//! Manager calls [`watchdog_tick`] on a timer sized by
//! [`crate::device::DeviceProfile::health_watchdog_interval_ms`].

use std::collections::HashMap;

use crate::adapters::git_repo::GitRepoSlot;
use crate::status::{StatusBus, StatusEventType};

/// Consecutive unhealthy observations before the first, soft warning.
const WARN_THRESHOLD: u32 = 2;
/// Consecutive unhealthy observations before a user-visible warning.
const USER_VISIBLE_THRESHOLD: u32 = 3;

pub fn watchdog_tick(git_slots: &HashMap<String, GitRepoSlot>, unhealthy_counts: &mut HashMap<String, u32>, status: &StatusBus) {
    for (slug, slot) in git_slots {
        if slot.mode() != crate::adapters::git_repo::GitMode::Engine {
            continue;
        }
        if slot.is_healthy() {
            unhealthy_counts.remove(slug);
            continue;
        }
        let count = unhealthy_counts.entry(slug.clone()).or_insert(0);
        *count += 1;
        if *count == WARN_THRESHOLD {
            status.emit(StatusEventType::Warning, format!("{slug}: Git sync engine unhealthy for {count} consecutive checks"));
        } else if *count >= USER_VISIBLE_THRESHOLD {
            status.emit(
                StatusEventType::Error,
                format!("{slug}: Git sync engine still unhealthy after {count} consecutive checks, manual attention needed"),
            );
        }
    }
}
