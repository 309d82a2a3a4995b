use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{DoctorId, PatientId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PatientError {
    #[error("patient name cannot be empty")]
    EmptyName,

    #[error("patient code cannot be empty")]
    EmptyPatientCode,

    #[error("invalid gender: {0}")]
    InvalidGender(String),
}

//
// ─── GENDER ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = PatientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            "Other" => Ok(Gender::Other),
            other => Err(PatientError::InvalidGender(other.to_owned())),
        }
    }
}

//
// ─── PATIENT ───────────────────────────────────────────────────────────────────
//

/// A patient enrolled with a doctor.
///
/// `patient_code` is the clinic-facing identifier used to look patients up;
/// `id` is the registry key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patient {
    id: PatientId,
    full_name: String,
    patient_code: String,
    gender: Gender,
    doctor_id: DoctorId,
    first_clinic_date: NaiveDate,
}

impl Patient {
    /// Creates a new patient record.
    ///
    /// # Errors
    ///
    /// Returns `PatientError::EmptyName` or `PatientError::EmptyPatientCode`
    /// when the corresponding field is blank.
    pub fn new(
        id: PatientId,
        full_name: impl Into<String>,
        patient_code: impl Into<String>,
        gender: Gender,
        doctor_id: DoctorId,
        first_clinic_date: NaiveDate,
    ) -> Result<Self, PatientError> {
        let full_name = full_name.into().trim().to_owned();
        if full_name.is_empty() {
            return Err(PatientError::EmptyName);
        }
        let patient_code = patient_code.into().trim().to_owned();
        if patient_code.is_empty() {
            return Err(PatientError::EmptyPatientCode);
        }

        Ok(Self {
            id,
            full_name,
            patient_code,
            gender,
            doctor_id,
            first_clinic_date,
        })
    }

    #[must_use]
    pub fn id(&self) -> PatientId {
        self.id
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn patient_code(&self) -> &str {
        &self.patient_code
    }

    #[must_use]
    pub fn gender(&self) -> Gender {
        self.gender
    }

    #[must_use]
    pub fn doctor_id(&self) -> DoctorId {
        self.doctor_id
    }

    #[must_use]
    pub fn first_clinic_date(&self) -> NaiveDate {
        self.first_clinic_date
    }

    /// Returns true if the given doctor owns this patient.
    #[must_use]
    pub fn is_owned_by(&self, doctor_id: DoctorId) -> bool {
        self.doctor_id == doctor_id
    }
}
