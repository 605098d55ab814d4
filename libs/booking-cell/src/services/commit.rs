// libs/booking-cell/src/services/commit.rs
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use availability_cell::models::{AvailabilityRecord, DateKey, SlotTime};
use availability_cell::services::store::AVAILABILITY_COLLECTION;
use shared_database::{DocumentStore, StoreError, WriteBatch};
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentStatus, BookingError, DoctorInfo, PatientInfo, VisitDetails,
};

pub const APPOINTMENTS_COLLECTION: &str = "appointments";
pub const DOCTORS_COLLECTION: &str = "doctors";

/// The booking transaction: consume one availability slot and create one
/// appointment, atomically. The availability write carries the revision seen
/// at re-read, so a concurrent booking of the same record rejects the whole
/// batch and neither side lands partially.
pub struct BookingCommitService {
    store: Arc<dyn DocumentStore>,
}

impl BookingCommitService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn book(
        &self,
        doctor_id: &str,
        patient: &User,
        date: DateKey,
        time: SlotTime,
        visit_details: VisitDetails,
    ) -> Result<Appointment, BookingError> {
        // Re-read the live record at commit time, not any sanitized copy the
        // viewer was shown earlier.
        let doc = self
            .store
            .get(AVAILABILITY_COLLECTION, doctor_id)
            .await
            .map_err(store_error)?
            .ok_or(BookingError::SlotNoLongerAvailable)?;

        let mut record: AvailabilityRecord = serde_json::from_value(doc.body)
            .map_err(|e| BookingError::Malformed(e.to_string()))?;

        if !record.contains(date, time) {
            return Err(BookingError::SlotNoLongerAvailable);
        }
        record.remove_slot(date, time);

        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: doctor_id.to_string(),
            patient_id: patient.id.clone(),
            datetime: date.0.and_time(time.0),
            status: AppointmentStatus::Scheduled,
            visit_details,
            doctor_info: self.doctor_snapshot(doctor_id).await?,
            patient_info: PatientInfo::from_user(patient),
            created_at: Utc::now(),
        };
        let appointment_body = serde_json::to_value(&appointment)
            .map_err(|e| BookingError::Malformed(e.to_string()))?;

        let availability_write = if record.is_empty() {
            WriteBatch::new().delete_expecting(AVAILABILITY_COLLECTION, doctor_id, doc.revision)
        } else {
            let body = serde_json::to_value(&record)
                .map_err(|e| BookingError::Malformed(e.to_string()))?;
            WriteBatch::new().put_expecting(AVAILABILITY_COLLECTION, doctor_id, body, doc.revision)
        };
        let batch = availability_write.put(
            APPOINTMENTS_COLLECTION,
            &appointment.id.to_string(),
            appointment_body,
        );

        match self.store.commit(batch).await {
            Ok(()) => {
                info!(
                    "Booked {} with {} at {} for patient {}",
                    appointment.id, doctor_id, appointment.datetime, patient.id
                );
                Ok(appointment)
            }
            Err(StoreError::Conflict { .. }) => {
                warn!("Booking race on {} at {} {}", doctor_id, date, time);
                Err(self.classify_conflict(doctor_id, date, time).await)
            }
            Err(e) => Err(store_error(e)),
        }
    }

    /// A rejected batch means the availability record moved underneath us.
    /// Re-read once to tell "someone took that exact slot" apart from an
    /// unrelated concurrent edit.
    async fn classify_conflict(&self, doctor_id: &str, date: DateKey, time: SlotTime) -> BookingError {
        match self.store.get(AVAILABILITY_COLLECTION, doctor_id).await {
            Ok(Some(doc)) => match serde_json::from_value::<AvailabilityRecord>(doc.body) {
                Ok(record) if record.contains(date, time) => {
                    BookingError::SchedulingFailed("availability changed during commit".to_string())
                }
                Ok(_) => BookingError::SlotNoLongerAvailable,
                Err(e) => BookingError::Malformed(e.to_string()),
            },
            Ok(None) => BookingError::SlotNoLongerAvailable,
            Err(e) => store_error(e),
        }
    }

    async fn doctor_snapshot(&self, doctor_id: &str) -> Result<DoctorInfo, BookingError> {
        let doc = self
            .store
            .get(DOCTORS_COLLECTION, doctor_id)
            .await
            .map_err(store_error)?;

        match doc {
            Some(doc) => parse_doctor_info(doc.body)
                .map_err(|e| BookingError::Malformed(e.to_string())),
            // A schedule can exist before the profile does; book anyway with
            // an empty snapshot rather than failing the patient.
            None => Ok(DoctorInfo::default()),
        }
    }
}

fn parse_doctor_info(body: Value) -> Result<DoctorInfo, serde_json::Error> {
    serde_json::from_value(body)
}

fn store_error(e: StoreError) -> BookingError {
    BookingError::StoreUnavailable(e.to_string())
}
