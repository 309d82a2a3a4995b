use chrono::NaiveDate;
use thiserror::Error;

use crate::model::PatientId;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionEntryError {
    #[error("session score must be a finite number, got {0}")]
    NonFiniteScore(f64),
}

/// A whole practice sitting for a patient.
///
/// Sessions are not linked to words directly; the words practiced are
/// inferred from trials recorded on the same date.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHistoryEntry {
    patient_id: PatientId,
    date: NaiveDate,
    duration: String,
    score: f64,
}

impl SessionHistoryEntry {
    /// # Errors
    ///
    /// Returns `SessionEntryError::NonFiniteScore` for NaN or infinite scores.
    pub fn new(
        patient_id: PatientId,
        date: NaiveDate,
        duration: impl Into<String>,
        score: f64,
    ) -> Result<Self, SessionEntryError> {
        if !score.is_finite() {
            return Err(SessionEntryError::NonFiniteScore(score));
        }
        Ok(Self {
            patient_id,
            date,
            duration: duration.into(),
            score,
        })
    }

    #[must_use]
    pub fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Free-form duration text as recorded, e.g. `"45 min"`.
    #[must_use]
    pub fn duration(&self) -> &str {
        &self.duration
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }
}
