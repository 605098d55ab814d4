// libs/booking-cell/src/services/appointments.rs
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use shared_database::{Document, DocumentStore, StoreError, WriteBatch};

use crate::models::{Appointment, AppointmentStatus, BookingError};
use crate::services::commit::APPOINTMENTS_COLLECTION;

/// Read and status-transition surface for appointments created by the booking
/// transaction. Appointments are never deleted here.
pub struct AppointmentService {
    store: Arc<dyn DocumentStore>,
}

impl AppointmentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: Uuid) -> Result<Appointment, BookingError> {
        let doc = self
            .store
            .get(APPOINTMENTS_COLLECTION, &id.to_string())
            .await
            .map_err(store_error)?
            .ok_or_else(|| BookingError::NotFound(id.to_string()))?;

        parse_appointment(doc)
    }

    pub async fn list_for_patient(&self, patient_id: &str) -> Result<Vec<Appointment>, BookingError> {
        self.list_by("patient_id", patient_id).await
    }

    pub async fn list_for_doctor(&self, doctor_id: &str) -> Result<Vec<Appointment>, BookingError> {
        self.list_by("doctor_id", doctor_id).await
    }

    async fn list_by(&self, field: &str, value: &str) -> Result<Vec<Appointment>, BookingError> {
        let docs = self
            .store
            .query_eq(APPOINTMENTS_COLLECTION, field, value)
            .await
            .map_err(store_error)?;

        let mut appointments = docs
            .into_iter()
            .map(parse_appointment)
            .collect::<Result<Vec<_>, _>>()?;
        appointments.sort_by_key(|a| a.datetime);
        Ok(appointments)
    }

    /// Status changes ride the revision seen at read, so two racing
    /// transitions cannot both land.
    pub async fn update_status(
        &self,
        id: Uuid,
        next: AppointmentStatus,
    ) -> Result<Appointment, BookingError> {
        let key = id.to_string();
        let doc = self
            .store
            .get(APPOINTMENTS_COLLECTION, &key)
            .await
            .map_err(store_error)?
            .ok_or_else(|| BookingError::NotFound(key.clone()))?;
        let revision = doc.revision;

        let mut appointment = parse_appointment(doc)?;
        if !appointment.status.can_transition_to(next) {
            return Err(BookingError::InvalidStatusTransition {
                from: appointment.status,
                to: next,
            });
        }
        appointment.status = next;

        let body = serde_json::to_value(&appointment)
            .map_err(|e| BookingError::Malformed(e.to_string()))?;
        let batch = WriteBatch::new().put_expecting(APPOINTMENTS_COLLECTION, &key, body, revision);

        match self.store.commit(batch).await {
            Ok(()) => {
                info!("Appointment {} is now {}", id, next);
                Ok(appointment)
            }
            Err(StoreError::Conflict { .. }) => Err(BookingError::SchedulingFailed(
                "appointment was modified concurrently".to_string(),
            )),
            Err(e) => Err(store_error(e)),
        }
    }
}

fn parse_appointment(doc: Document) -> Result<Appointment, BookingError> {
    serde_json::from_value(doc.body).map_err(|e| BookingError::Malformed(e.to_string()))
}

fn store_error(e: StoreError) -> BookingError {
    BookingError::StoreUnavailable(e.to_string())
}
