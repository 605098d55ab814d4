// libs/availability-cell/src/services/store.rs
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, warn};

use shared_database::{DocumentStore, StoreError, WriteBatch};

use crate::models::{
    AvailabilityError, AvailabilityRecord, DateKey, SlotTime, VersionedAvailability,
};
use crate::services::sanitize;

pub const AVAILABILITY_COLLECTION: &str = "availability";

/// Reads and writes a provider's availability record. Shape coercion only;
/// all invariants about slot contents are enforced by callers.
pub struct AvailabilityService {
    store: Arc<dyn DocumentStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn read(
        &self,
        doctor_id: &str,
    ) -> Result<Option<VersionedAvailability>, AvailabilityError> {
        let doc = self
            .store
            .get(AVAILABILITY_COLLECTION, doctor_id)
            .await
            .map_err(store_error)?;

        match doc {
            None => Ok(None),
            Some(doc) => {
                let record: AvailabilityRecord = serde_json::from_value(doc.body)
                    .map_err(|e| AvailabilityError::Malformed(e.to_string()))?;
                Ok(Some(VersionedAvailability {
                    record,
                    revision: doc.revision,
                }))
            }
        }
    }

    /// Replaces the whole record. An empty record is deleted, never written
    /// back as an empty mapping.
    pub async fn replace(
        &self,
        doctor_id: &str,
        record: &AvailabilityRecord,
    ) -> Result<(), AvailabilityError> {
        if record.is_empty() {
            debug!("Replacing availability for {} with empty record: deleting", doctor_id);
            return self.delete(doctor_id).await;
        }

        let body = to_body(record)?;
        self.store
            .put(AVAILABILITY_COLLECTION, doctor_id, body)
            .await
            .map_err(store_error)
    }

    pub async fn delete(&self, doctor_id: &str) -> Result<(), AvailabilityError> {
        self.store
            .delete(AVAILABILITY_COLLECTION, doctor_id)
            .await
            .map_err(store_error)
    }

    /// Provider edit of individual days: read-modify-write guarded by the
    /// record's revision so two concurrent edits cannot silently merge.
    pub async fn apply_update(
        &self,
        doctor_id: &str,
        add: &BTreeMap<DateKey, BTreeSet<SlotTime>>,
        remove: &BTreeMap<DateKey, BTreeSet<SlotTime>>,
    ) -> Result<AvailabilityRecord, AvailabilityError> {
        let current = self.read(doctor_id).await?;
        let (mut record, revision) = match current {
            Some(versioned) => (versioned.record, Some(versioned.revision)),
            None => (AvailabilityRecord::default(), None),
        };

        for (&date, times) in remove {
            for &time in times {
                record.remove_slot(date, time);
            }
        }
        for (&date, times) in add {
            for &time in times {
                record.insert_slot(date, time);
            }
        }
        record.validate()?;

        let batch = match (record.is_empty(), revision) {
            (true, Some(revision)) => {
                WriteBatch::new().delete_expecting(AVAILABILITY_COLLECTION, doctor_id, revision)
            }
            (true, None) => return Ok(record),
            (false, Some(revision)) => WriteBatch::new().put_expecting(
                AVAILABILITY_COLLECTION,
                doctor_id,
                to_body(&record)?,
                revision,
            ),
            (false, None) => {
                WriteBatch::new().put(AVAILABILITY_COLLECTION, doctor_id, to_body(&record)?)
            }
        };

        match self.store.commit(batch).await {
            Ok(()) => Ok(record),
            Err(StoreError::Conflict { .. }) => Err(AvailabilityError::Contention),
            Err(e) => Err(store_error(e)),
        }
    }

    /// Sanitized view for presentation. When sanitization removed anything the
    /// cleaned record is persisted first, so viewers never see a stale slot.
    pub async fn read_sanitized(
        &self,
        doctor_id: &str,
        now: NaiveDateTime,
    ) -> Result<AvailabilityRecord, AvailabilityError> {
        let Some(versioned) = self.read(doctor_id).await? else {
            return Ok(AvailabilityRecord::default());
        };

        let (cleaned, changed) = sanitize::sanitize(&versioned.record, now);
        if !changed {
            return Ok(cleaned);
        }

        debug!("Sanitization removed stale slots for {}, writing back", doctor_id);
        let batch = if cleaned.is_empty() {
            WriteBatch::new().delete_expecting(
                AVAILABILITY_COLLECTION,
                doctor_id,
                versioned.revision,
            )
        } else {
            WriteBatch::new().put_expecting(
                AVAILABILITY_COLLECTION,
                doctor_id,
                to_body(&cleaned)?,
                versioned.revision,
            )
        };

        match self.store.commit(batch).await {
            Ok(()) => Ok(cleaned),
            // Someone else wrote in between; the cleaned copy is still the
            // right thing to show this viewer.
            Err(StoreError::Conflict { .. }) => {
                warn!("Sanitization write-back for {} lost a revision race", doctor_id);
                Ok(cleaned)
            }
            Err(e) => Err(store_error(e)),
        }
    }
}

fn to_body(record: &AvailabilityRecord) -> Result<Value, AvailabilityError> {
    serde_json::to_value(record).map_err(|e| AvailabilityError::Malformed(e.to_string()))
}

fn store_error(e: StoreError) -> AvailabilityError {
    AvailabilityError::StoreUnavailable(e.to_string())
}
