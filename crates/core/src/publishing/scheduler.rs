//! Evenly spaced publish times over the next 24 hours.

use chrono::{DateTime, Duration, DurationRound, Utc};

use crate::item::WorkItem;

/// Computes target publish instants. Pure: no side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartScheduler;

impl SmartScheduler {
    /// The first slot: one hour from `now`, rounded down to the top of the hour.
    pub fn first_slot(now: DateTime<Utc>) -> DateTime<Utc> {
        let ahead = now + Duration::hours(1);
        ahead
            .duration_trunc(Duration::hours(1))
            .unwrap_or(ahead)
    }

    /// `count` instants starting at the first slot, spaced by 24h / count.
    ///
    /// A single item gets only the first slot.
    pub fn slots(count: usize, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let first = Self::first_slot(now);
        let interval = if count > 1 {
            Duration::milliseconds(Duration::hours(24).num_milliseconds() / count as i64)
        } else {
            Duration::zero()
        };
        (0..count)
            .map(|i| first + interval * i as i32)
            .collect()
    }

    /// Assign slots to `items` in input order.
    pub fn schedule(items: &[WorkItem], now: DateTime<Utc>) -> Vec<(String, DateTime<Utc>)> {
        items
            .iter()
            .zip(Self::slots(items.len(), now))
            .map(|(item, at)| (item.id().to_string(), at))
            .collect()
    }
}
