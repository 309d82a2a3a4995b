use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::model::ids::{PatientId, WordId};

/// Accuracy at or above this value marks a word as completed.
pub const COMPLETION_ACCURACY: f64 = 90.0;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum TrialError {
    #[error("trial accuracy must be a finite number, got {0}")]
    NonFiniteAccuracy(f64),
}

/// One pronunciation attempt of a word by a patient.
///
/// Trials are immutable once recorded. `trial_number` is assigned by the
/// caller and is not required to be contiguous; recency is decided by
/// `(date, time)` only.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    patient_id: PatientId,
    word_id: WordId,
    trial_number: u32,
    accuracy: f64,
    date: NaiveDate,
    time: NaiveTime,
}

impl Trial {
    /// # Errors
    ///
    /// Returns `TrialError::NonFiniteAccuracy` for NaN or infinite accuracy.
    /// Values outside 0-100 are accepted as-is.
    pub fn new(
        patient_id: PatientId,
        word_id: WordId,
        trial_number: u32,
        accuracy: f64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Self, TrialError> {
        if !accuracy.is_finite() {
            return Err(TrialError::NonFiniteAccuracy(accuracy));
        }
        Ok(Self {
            patient_id,
            word_id,
            trial_number,
            accuracy,
            date,
            time,
        })
    }

    #[must_use]
    pub fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    #[must_use]
    pub fn word_id(&self) -> WordId {
        self.word_id
    }

    #[must_use]
    pub fn trial_number(&self) -> u32 {
        self.trial_number
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// Ordering key for recency: date first, ties broken by time.
    #[must_use]
    pub fn recorded_at(&self) -> (NaiveDate, NaiveTime) {
        (self.date, self.time)
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.accuracy >= COMPLETION_ACCURACY
    }

    /// Total order used wherever trials are ranked by recency.
    ///
    /// Trials recorded at the same instant fall back to trial number and then
    /// accuracy, so the ranking never depends on input order.
    #[must_use]
    pub fn cmp_recency(&self, other: &Self) -> std::cmp::Ordering {
        self.recorded_at()
            .cmp(&other.recorded_at())
            .then(self.trial_number.cmp(&other.trial_number))
            .then(self.accuracy.total_cmp(&other.accuracy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    fn trial(number: u32, accuracy: f64, day: u32, hour: u32) -> Trial {
        Trial::new(
            PatientId::new(1),
            WordId::new(1),
            number,
            accuracy,
            NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn nan_accuracy_is_rejected() {
        let err = Trial::new(
            PatientId::new(1),
            WordId::new(1),
            1,
            f64::NAN,
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, TrialError::NonFiniteAccuracy(_)));
    }

    #[test]
    fn out_of_range_accuracy_is_kept() {
        assert_eq!(trial(1, 120.0, 1, 9).accuracy(), 120.0);
    }

    #[test]
    fn recency_prefers_date_over_trial_number() {
        let later_day = trial(1, 50.0, 2, 8);
        let higher_number = trial(9, 50.0, 1, 23);
        assert_eq!(later_day.cmp_recency(&higher_number), Ordering::Greater);
    }

    #[test]
    fn same_day_ties_break_by_time() {
        assert_eq!(
            trial(1, 50.0, 1, 10).cmp_recency(&trial(2, 50.0, 1, 9)),
            Ordering::Greater
        );
    }

    #[test]
    fn completion_threshold_is_inclusive() {
        assert!(trial(1, 90.0, 1, 9).is_completed());
        assert!(!trial(1, 89.9, 1, 9).is_completed());
    }
}
