use speech_core::model::{
    ChapterNumber, DoctorId, Gender, Patient, PatientId, SessionHistoryEntry, Trial, WordId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Stored row that no longer satisfies the domain constructors.
pub(crate) fn invalid<E: Into<speech_core::Error>>(e: E) -> StorageError {
    StorageError::Invalid(e.into())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Maps unique/primary key violations to `Conflict`, everything else to `Connection`.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    if e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        StorageError::Conflict
    } else {
        conn(e)
    }
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn patient_id_from_i64(v: i64) -> Result<PatientId, StorageError> {
    Ok(PatientId::new(i64_to_u64("patient_id", v)?))
}

pub(crate) fn word_id_from_i64(v: i64) -> Result<WordId, StorageError> {
    Ok(WordId::new(i64_to_u64("word_id", v)?))
}

pub(crate) fn chapter_number_from_i64(v: i64) -> Result<ChapterNumber, StorageError> {
    Ok(ChapterNumber::new(u32_from_i64("chapter_number", v)?))
}

pub(crate) fn map_patient_row(row: &SqliteRow) -> Result<Patient, StorageError> {
    let gender: String = row.try_get("gender").map_err(ser)?;
    let gender: Gender = gender.parse().map_err(invalid)?;
    let doctor_id = DoctorId::new(i64_to_u64(
        "doctor_id",
        row.try_get::<i64, _>("doctor_id").map_err(ser)?,
    )?);

    Patient::new(
        patient_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("full_name").map_err(ser)?,
        row.try_get::<String, _>("patient_code").map_err(ser)?,
        gender,
        doctor_id,
        row.try_get("first_clinic_date").map_err(ser)?,
    )
    .map_err(invalid)
}

pub(crate) fn map_trial_row(row: &SqliteRow) -> Result<Trial, StorageError> {
    Trial::new(
        patient_id_from_i64(row.try_get::<i64, _>("patient_id").map_err(ser)?)?,
        word_id_from_i64(row.try_get::<i64, _>("word_id").map_err(ser)?)?,
        u32_from_i64(
            "trial_number",
            row.try_get::<i64, _>("trial_number").map_err(ser)?,
        )?,
        row.try_get("accuracy").map_err(ser)?,
        row.try_get("date").map_err(ser)?,
        row.try_get("time").map_err(ser)?,
    )
    .map_err(invalid)
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<SessionHistoryEntry, StorageError> {
    SessionHistoryEntry::new(
        patient_id_from_i64(row.try_get::<i64, _>("patient_id").map_err(ser)?)?,
        row.try_get("date").map_err(ser)?,
        row.try_get::<String, _>("duration").map_err(ser)?,
        row.try_get("score").map_err(ser)?,
    )
    .map_err(invalid)
}

/// `?start, ?start+1, ...` placeholder list for an `IN (...)` clause.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_from_start() {
        assert_eq!(placeholders(2, 3), "?2, ?3, ?4");
        assert_eq!(placeholders(1, 0), "");
    }

    #[test]
    fn negative_ids_are_rejected() {
        assert!(matches!(
            patient_id_from_i64(-1),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn domain_errors_keep_their_kind() {
        let err = invalid(speech_core::model::ChapterError::EmptyName);
        assert!(matches!(
            err,
            StorageError::Invalid(speech_core::Error::Chapter(_))
        ));
        assert_eq!(err.to_string(), "invalid stored record: chapter name cannot be empty");
    }

    #[test]
    fn chapter_number_must_fit_u32() {
        assert!(chapter_number_from_i64(i64::from(u32::MAX) + 1).is_err());
        assert_eq!(chapter_number_from_i64(4).unwrap(), ChapterNumber::new(4));
    }
}
