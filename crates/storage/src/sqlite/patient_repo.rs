use speech_core::model::{DoctorId, Patient};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_patient_row, write_err};
use crate::repository::{PatientRepository, StorageError};

#[async_trait::async_trait]
impl PatientRepository for SqliteRepository {
    async fn upsert_patient(&self, patient: &Patient) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO patients (id, full_name, patient_code, gender, doctor_id, first_clinic_date)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    full_name = excluded.full_name,
                    patient_code = excluded.patient_code,
                    gender = excluded.gender,
                    doctor_id = excluded.doctor_id,
                    first_clinic_date = excluded.first_clinic_date
            ",
        )
        .bind(id_i64("patient_id", patient.id().value())?)
        .bind(patient.full_name())
        .bind(patient.patient_code())
        .bind(patient.gender().as_str())
        .bind(id_i64("doctor_id", patient.doctor_id().value())?)
        .bind(patient.first_clinic_date())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }

    async fn find_patient(
        &self,
        doctor_id: DoctorId,
        patient_code: &str,
    ) -> Result<Option<Patient>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, full_name, patient_code, gender, doctor_id, first_clinic_date
                FROM patients
                WHERE doctor_id = ?1 AND patient_code = ?2
            ",
        )
        .bind(id_i64("doctor_id", doctor_id.value())?)
        .bind(patient_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_patient_row).transpose()
    }
}
