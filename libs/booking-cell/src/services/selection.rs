// libs/booking-cell/src/services/selection.rs
//
// Per-viewer slot selection. One instance per browsing session; nothing here
// touches the store. Sanitized availability is passed in by the caller, which
// keeps the ordering rule (sanitize before select) enforceable at the seam.
use chrono::{Duration, NaiveDateTime};

use availability_cell::models::{AvailabilityRecord, DateKey, SlotTime};

use crate::models::{BookingPrerequisites, PrerequisiteField, SelectionError};

/// How long a missing-field indicator stays visible after a blocked
/// date selection.
pub const PREREQUISITE_FLAG_SECONDS: i64 = 2;

/// Inline field-level indicators for an attempted selection with incomplete
/// prerequisites. Each field clears independently after the display window.
#[derive(Debug, Clone, Default)]
pub struct PrerequisiteFlags {
    reason_raised_at: Option<NaiveDateTime>,
    insurance_raised_at: Option<NaiveDateTime>,
    patient_type_raised_at: Option<NaiveDateTime>,
}

impl PrerequisiteFlags {
    pub fn raise(&mut self, fields: &[PrerequisiteField], now: NaiveDateTime) {
        for field in fields {
            match field {
                PrerequisiteField::Reason => self.reason_raised_at = Some(now),
                PrerequisiteField::Insurance => self.insurance_raised_at = Some(now),
                PrerequisiteField::PatientType => self.patient_type_raised_at = Some(now),
            }
        }
    }

    pub fn is_visible(&self, field: PrerequisiteField, now: NaiveDateTime) -> bool {
        let raised_at = match field {
            PrerequisiteField::Reason => self.reason_raised_at,
            PrerequisiteField::Insurance => self.insurance_raised_at,
            PrerequisiteField::PatientType => self.patient_type_raised_at,
        };
        match raised_at {
            Some(at) => now - at < Duration::seconds(PREREQUISITE_FLAG_SECONDS),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    NoDateSelected,
    DateSelected(DateKey),
    TimeSelected(DateKey, SlotTime),
    Committing(DateKey, SlotTime),
    Confirmed(DateKey, SlotTime),
}

#[derive(Debug, Clone)]
pub struct SlotSelection {
    state: SelectionState,
    pub prerequisites: BookingPrerequisites,
    pub flags: PrerequisiteFlags,
}

impl Default for SlotSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotSelection {
    pub fn new() -> Self {
        Self {
            state: SelectionState::NoDateSelected,
            prerequisites: BookingPrerequisites::default(),
            flags: PrerequisiteFlags::default(),
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// Picking a date. A date with no sanitized slots is inert regardless of
    /// prerequisites; incomplete prerequisites block the transition and raise
    /// the field indicators without changing state. Picking the
    /// already-selected date toggles back to no selection.
    pub fn toggle_date(
        &mut self,
        date: DateKey,
        record: &AvailabilityRecord,
        now: NaiveDateTime,
    ) -> Result<(), SelectionError> {
        if matches!(
            self.state,
            SelectionState::Committing(_, _) | SelectionState::Confirmed(_, _)
        ) {
            return Err(SelectionError::InvalidTransition("date selection"));
        }

        if record.slot_count(date) == 0 {
            return Err(SelectionError::NoSlotsOnDate);
        }

        match self.state {
            SelectionState::DateSelected(selected) | SelectionState::TimeSelected(selected, _)
                if selected == date =>
            {
                self.state = SelectionState::NoDateSelected;
                return Ok(());
            }
            _ => {}
        }

        let missing = self.prerequisites.missing_fields();
        if !missing.is_empty() {
            self.flags.raise(&missing, now);
            return Err(SelectionError::IncompletePrerequisites(missing));
        }

        self.state = SelectionState::DateSelected(date);
        Ok(())
    }

    pub fn pick_time(
        &mut self,
        time: SlotTime,
        record: &AvailabilityRecord,
    ) -> Result<(), SelectionError> {
        let date = match self.state {
            SelectionState::DateSelected(date) | SelectionState::TimeSelected(date, _) => date,
            _ => return Err(SelectionError::InvalidTransition("time selection")),
        };

        if !record.contains(date, time) {
            return Err(SelectionError::SlotNotOffered);
        }

        self.state = SelectionState::TimeSelected(date, time);
        Ok(())
    }

    /// The single gate before the irreversible commit: prerequisites are
    /// re-validated here, never trusted from the earlier transition. While a
    /// commit is in flight the confirm action is dead.
    pub fn begin_commit(&mut self) -> Result<(DateKey, SlotTime), SelectionError> {
        let (date, time) = match self.state {
            SelectionState::TimeSelected(date, time) => (date, time),
            SelectionState::Committing(_, _) => {
                return Err(SelectionError::InvalidTransition("commit while committing"))
            }
            _ => return Err(SelectionError::InvalidTransition("commit")),
        };

        let missing = self.prerequisites.missing_fields();
        if !missing.is_empty() {
            return Err(SelectionError::IncompletePrerequisites(missing));
        }

        self.state = SelectionState::Committing(date, time);
        Ok((date, time))
    }

    pub fn complete(&mut self) -> Result<(), SelectionError> {
        match self.state {
            SelectionState::Committing(date, time) => {
                self.state = SelectionState::Confirmed(date, time);
                Ok(())
            }
            _ => Err(SelectionError::InvalidTransition("complete")),
        }
    }

    /// A failed commit returns to `TimeSelected` with the viewer's selections
    /// intact, so a retry does not restart from date selection.
    pub fn fail(&mut self) -> Result<(), SelectionError> {
        match self.state {
            SelectionState::Committing(date, time) => {
                self.state = SelectionState::TimeSelected(date, time);
                Ok(())
            }
            _ => Err(SelectionError::InvalidTransition("fail")),
        }
    }

    /// Abandoning selection before commit has no side effects.
    pub fn reset(&mut self) {
        self.state = SelectionState::NoDateSelected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatientType;

    fn record(entries: &[(&str, &[&str])]) -> AvailabilityRecord {
        let mut record = AvailabilityRecord::default();
        for (date, times) in entries {
            for time in *times {
                record.insert_slot(date.parse().unwrap(), time.parse().unwrap());
            }
        }
        record
    }

    fn complete_prerequisites() -> BookingPrerequisites {
        BookingPrerequisites {
            reason: "Annual checkup".to_string(),
            insurance: "Acme Health".to_string(),
            patient_type: Some(PatientType::New),
        }
    }

    fn now() -> NaiveDateTime {
        "2025-06-10T08:00:00".parse().unwrap()
    }

    fn date(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    fn time(s: &str) -> SlotTime {
        s.parse().unwrap()
    }

    #[test]
    fn full_happy_path_reaches_confirmed() {
        let record = record(&[("2025-06-10", &["09:00", "09:30"])]);
        let mut selection = SlotSelection::new();
        selection.prerequisites = complete_prerequisites();

        selection.toggle_date(date("2025-06-10"), &record, now()).unwrap();
        selection.pick_time(time("09:00"), &record).unwrap();
        let (d, t) = selection.begin_commit().unwrap();
        assert_eq!((d, t), (date("2025-06-10"), time("09:00")));
        selection.complete().unwrap();

        assert_eq!(
            selection.state(),
            SelectionState::Confirmed(date("2025-06-10"), time("09:00"))
        );
    }

    #[test]
    fn date_with_no_slots_is_inert_even_with_incomplete_prerequisites() {
        let record = record(&[("2025-06-10", &["09:00"])]);
        let mut selection = SlotSelection::new();

        // No flags raised: the empty-date rejection wins.
        let err = selection.toggle_date(date("2025-06-11"), &record, now()).unwrap_err();
        assert_eq!(err, SelectionError::NoSlotsOnDate);
        assert!(!selection.flags.is_visible(PrerequisiteField::Reason, now()));
        assert_eq!(selection.state(), SelectionState::NoDateSelected);
    }

    #[test]
    fn incomplete_prerequisites_block_date_selection_and_raise_flags() {
        let record = record(&[("2025-06-10", &["09:00"])]);
        let mut selection = SlotSelection::new();
        selection.prerequisites.reason = "Annual checkup".to_string();

        let err = selection.toggle_date(date("2025-06-10"), &record, now()).unwrap_err();
        assert_eq!(
            err,
            SelectionError::IncompletePrerequisites(vec![
                PrerequisiteField::Insurance,
                PrerequisiteField::PatientType
            ])
        );
        assert_eq!(selection.state(), SelectionState::NoDateSelected);

        assert!(selection.flags.is_visible(PrerequisiteField::Insurance, now()));
        assert!(selection.flags.is_visible(PrerequisiteField::PatientType, now()));
        assert!(!selection.flags.is_visible(PrerequisiteField::Reason, now()));
    }

    #[test]
    fn flags_clear_after_display_window() {
        let record = record(&[("2025-06-10", &["09:00"])]);
        let mut selection = SlotSelection::new();

        let raised = now();
        selection.toggle_date(date("2025-06-10"), &record, raised).unwrap_err();

        let just_before = raised + Duration::milliseconds(1999);
        let just_after = raised + Duration::seconds(PREREQUISITE_FLAG_SECONDS);
        assert!(selection.flags.is_visible(PrerequisiteField::Reason, just_before));
        assert!(!selection.flags.is_visible(PrerequisiteField::Reason, just_after));
    }

    #[test]
    fn reselecting_same_date_toggles_off() {
        let record = record(&[("2025-06-10", &["09:00"])]);
        let mut selection = SlotSelection::new();
        selection.prerequisites = complete_prerequisites();

        selection.toggle_date(date("2025-06-10"), &record, now()).unwrap();
        selection.toggle_date(date("2025-06-10"), &record, now()).unwrap();
        assert_eq!(selection.state(), SelectionState::NoDateSelected);
    }

    #[test]
    fn picking_time_not_on_selected_date_is_rejected() {
        let record = record(&[("2025-06-10", &["09:00"])]);
        let mut selection = SlotSelection::new();
        selection.prerequisites = complete_prerequisites();

        selection.toggle_date(date("2025-06-10"), &record, now()).unwrap();
        let err = selection.pick_time(time("11:00"), &record).unwrap_err();
        assert_eq!(err, SelectionError::SlotNotOffered);
    }

    #[test]
    fn commit_revalidates_prerequisites() {
        let record = record(&[("2025-06-10", &["09:00"])]);
        let mut selection = SlotSelection::new();
        selection.prerequisites = complete_prerequisites();

        selection.toggle_date(date("2025-06-10"), &record, now()).unwrap();
        selection.pick_time(time("09:00"), &record).unwrap();

        // Prerequisites were cleared between selection and confirmation.
        selection.prerequisites.insurance.clear();
        let err = selection.begin_commit().unwrap_err();
        assert_eq!(
            err,
            SelectionError::IncompletePrerequisites(vec![PrerequisiteField::Insurance])
        );
        assert_eq!(
            selection.state(),
            SelectionState::TimeSelected(date("2025-06-10"), time("09:00"))
        );
    }

    #[test]
    fn committing_is_exclusive() {
        let record = record(&[("2025-06-10", &["09:00"])]);
        let mut selection = SlotSelection::new();
        selection.prerequisites = complete_prerequisites();

        selection.toggle_date(date("2025-06-10"), &record, now()).unwrap();
        selection.pick_time(time("09:00"), &record).unwrap();
        selection.begin_commit().unwrap();

        assert_eq!(
            selection.begin_commit().unwrap_err(),
            SelectionError::InvalidTransition("commit while committing")
        );
        assert_eq!(
            selection.toggle_date(date("2025-06-10"), &record, now()).unwrap_err(),
            SelectionError::InvalidTransition("date selection")
        );
    }

    #[test]
    fn failed_commit_returns_to_time_selected() {
        let record = record(&[("2025-06-10", &["09:00"])]);
        let mut selection = SlotSelection::new();
        selection.prerequisites = complete_prerequisites();

        selection.toggle_date(date("2025-06-10"), &record, now()).unwrap();
        selection.pick_time(time("09:00"), &record).unwrap();
        selection.begin_commit().unwrap();
        selection.fail().unwrap();

        assert_eq!(
            selection.state(),
            SelectionState::TimeSelected(date("2025-06-10"), time("09:00"))
        );
        // Retry is possible without reselecting.
        selection.begin_commit().unwrap();
    }
}
