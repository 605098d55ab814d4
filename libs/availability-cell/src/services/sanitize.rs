// libs/availability-cell/src/services/sanitize.rs
//
// Pure staleness filtering over an availability record. Persistence of the
// cleaned record is the caller's responsibility so these functions stay
// independently testable.

use chrono::{NaiveDateTime, NaiveTime};

use crate::models::{AvailabilityRecord, DateKey, NextAvailable, SlotTime};

/// Same-day slots are excluded from "next available" once the local clock
/// passes this hour, even when individual times are still in the future.
/// Product rule, distinct from the literal past-time filter below.
pub fn same_day_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap()
}

/// Removes fully past dates, and past times on the current day. A date whose
/// set empties is dropped entirely. Returns the cleaned record and whether
/// anything changed; idempotent for a fixed `now`.
pub fn sanitize(record: &AvailabilityRecord, now: NaiveDateTime) -> (AvailabilityRecord, bool) {
    let today = now.date();
    let mut cleaned = AvailabilityRecord::default();
    let mut changed = false;

    for (&date, times) in &record.slots_by_date {
        if date.0 < today {
            changed = true;
            continue;
        }

        if date.0 > today {
            cleaned.slots_by_date.insert(date, times.clone());
            continue;
        }

        // Current day: keep only strictly future times.
        let remaining: std::collections::BTreeSet<SlotTime> = times
            .iter()
            .copied()
            .filter(|time| date.0.and_time(time.0) > now)
            .collect();

        if remaining.len() != times.len() {
            changed = true;
        }
        if !remaining.is_empty() {
            cleaned.slots_by_date.insert(date, remaining);
        }
    }

    (cleaned, changed)
}

/// Earliest bookable slot for "next available" messaging. Applies the literal
/// past-time filter plus the end-of-workday cutoff: after 17:00 local, the
/// rest of today is skipped even though those times remain literally bookable.
pub fn next_available(record: &AvailabilityRecord, now: NaiveDateTime) -> Option<NextAvailable> {
    let today = now.date();
    let past_cutoff = now.time() >= same_day_cutoff();

    for (&date, times) in &record.slots_by_date {
        if date.0 < today {
            continue;
        }

        if date.0 == today {
            if past_cutoff {
                continue;
            }
            if let Some(&time) = times
                .iter()
                .find(|time| date.0.and_time(time.0) > now)
            {
                return Some(NextAvailable { date, time });
            }
            continue;
        }

        if let Some(&time) = times.iter().next() {
            return Some(NextAvailable { date, time });
        }
    }

    None
}
