// libs/availability-cell/src/models.rs
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Providers declare slots on a half-hour grid.
pub const SLOT_GRANULARITY_MINUTES: u32 = 30;

// ==============================================================================
// DATE / TIME KEYS
// ==============================================================================

/// Calendar date key, serialized `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(pub NaiveDate);

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map(DateKey)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Wall-clock time of day, serialized `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(pub NaiveTime);

impl SlotTime {
    /// Whether the time sits on the half-hour grid.
    pub fn is_on_grid(&self) -> bool {
        use chrono::Timelike;
        self.0.second() == 0 && self.0.minute() % SLOT_GRANULARITY_MINUTES == 0
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for SlotTime {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s, "%H:%M").map(SlotTime)
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ==============================================================================
// AVAILABILITY RECORD
// ==============================================================================

/// A provider's open slots, keyed by date. Invariant: every date maps to a
/// non-empty set; an emptied date is removed, and a fully emptied record is
/// deleted from the store rather than written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    #[serde(default)]
    pub slots_by_date: BTreeMap<DateKey, BTreeSet<SlotTime>>,
}

impl AvailabilityRecord {
    pub fn is_empty(&self) -> bool {
        self.slots_by_date.is_empty()
    }

    pub fn contains(&self, date: DateKey, time: SlotTime) -> bool {
        self.slots_by_date
            .get(&date)
            .is_some_and(|times| times.contains(&time))
    }

    pub fn slots_for(&self, date: DateKey) -> Option<&BTreeSet<SlotTime>> {
        self.slots_by_date.get(&date)
    }

    pub fn slot_count(&self, date: DateKey) -> usize {
        self.slots_by_date.get(&date).map_or(0, |times| times.len())
    }

    /// Earliest date with at least one slot, if any.
    pub fn earliest_date(&self) -> Option<DateKey> {
        self.slots_by_date.keys().next().copied()
    }

    pub fn insert_slot(&mut self, date: DateKey, time: SlotTime) {
        self.slots_by_date.entry(date).or_default().insert(time);
    }

    /// Removes a slot and elides the date key when its set empties.
    /// Returns false when the slot was not present.
    pub fn remove_slot(&mut self, date: DateKey, time: SlotTime) -> bool {
        let Some(times) = self.slots_by_date.get_mut(&date) else {
            return false;
        };
        if !times.remove(&time) {
            return false;
        }
        if times.is_empty() {
            self.slots_by_date.remove(&date);
        }
        true
    }

    /// Rejects empty per-date sets and off-grid times.
    pub fn validate(&self) -> Result<(), AvailabilityError> {
        for (date, times) in &self.slots_by_date {
            if times.is_empty() {
                return Err(AvailabilityError::InvalidSlot(format!(
                    "date {} has an empty slot set",
                    date
                )));
            }
            for time in times {
                if !time.is_on_grid() {
                    return Err(AvailabilityError::InvalidSlot(format!(
                        "slot {} {} is not on the {}-minute grid",
                        date, time, SLOT_GRANULARITY_MINUTES
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A record together with the store revision it was read at, for
/// optimistic-concurrency writes.
#[derive(Debug, Clone)]
pub struct VersionedAvailability {
    pub record: AvailabilityRecord,
    pub revision: i64,
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceAvailabilityRequest {
    pub slots_by_date: BTreeMap<DateKey, BTreeSet<SlotTime>>,
}

/// Provider edit of individual days: slots to add and slots to retract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSlotsRequest {
    #[serde(default)]
    pub add: BTreeMap<DateKey, BTreeSet<SlotTime>>,
    #[serde(default)]
    pub remove: BTreeMap<DateKey, BTreeSet<SlotTime>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextAvailable {
    pub date: DateKey,
    pub time: SlotTime,
}

/// What a viewer sees: sanitized slots, the paginated calendar strip
/// (empty days included) and the next bookable slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityView {
    pub doctor_id: String,
    pub slots_by_date: BTreeMap<DateKey, BTreeSet<SlotTime>>,
    pub window: Vec<DateKey>,
    pub next_available: Option<NextAvailable>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error("availability store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("availability was modified concurrently")]
    Contention,

    #[error("invalid slot: {0}")]
    InvalidSlot(String),

    #[error("malformed availability record: {0}")]
    Malformed(String),
}
