// libs/booking-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use availability_cell::models::{DateKey, SlotTime};
use shared_models::auth::User;

// ==============================================================================
// CORE DOMAIN MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientType {
    New,
    Returning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Scheduled is the only live state; the other three are terminal.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (
                AppointmentStatus::Scheduled,
                AppointmentStatus::Completed
                    | AppointmentStatus::Cancelled
                    | AppointmentStatus::NoShow
            )
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        };
        write!(f, "{}", s)
    }
}

/// What the patient told us when booking. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitDetails {
    pub reason: String,
    pub insurance: String,
    pub patient_type: PatientType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Display snapshot of the doctor taken at booking time, so the confirmation
/// stays stable even if the profile changes later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: String,
    pub email: String,
}

impl PatientInfo {
    pub fn from_user(user: &User) -> Self {
        Self {
            name: user.display_name(),
            email: user.email.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: String,
    pub patient_id: String,
    /// Provider-local wall-clock instant of the consumed slot.
    pub datetime: NaiveDateTime,
    pub status: AppointmentStatus,
    pub visit_details: VisitDetails,
    pub doctor_info: DoctorInfo,
    pub patient_info: PatientInfo,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// BOOKING PREREQUISITES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrerequisiteField {
    Reason,
    Insurance,
    PatientType,
}

/// What the viewer must fill in before they may pick a date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingPrerequisites {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub insurance: String,
    #[serde(default)]
    pub patient_type: Option<PatientType>,
}

impl BookingPrerequisites {
    pub fn missing_fields(&self) -> Vec<PrerequisiteField> {
        let mut missing = Vec::new();
        if self.reason.trim().is_empty() {
            missing.push(PrerequisiteField::Reason);
        }
        if self.insurance.trim().is_empty() {
            missing.push(PrerequisiteField::Insurance);
        }
        if self.patient_type.is_none() {
            missing.push(PrerequisiteField::PatientType);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookSlotRequest {
    pub doctor_id: String,
    pub date: DateKey,
    pub time: SlotTime,
    pub reason: String,
    pub insurance: String,
    pub patient_type: Option<PatientType>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("booking store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("this time was just taken")]
    SlotNoLongerAvailable,

    #[error("scheduling failed: {0}")]
    SchedulingFailed(String),

    #[error("appointment not found: {0}")]
    NotFound(String),

    #[error("cannot change appointment status from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("stored appointment is malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("booking prerequisites are incomplete")]
    IncompletePrerequisites(Vec<PrerequisiteField>),

    #[error("no bookable slots on that date")]
    NoSlotsOnDate,

    #[error("that time is not offered on the selected date")]
    SlotNotOffered,

    #[error("selection is not in a state that allows {0}")]
    InvalidTransition(&'static str),
}
