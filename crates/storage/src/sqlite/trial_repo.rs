use chrono::NaiveDate;
use speech_core::model::{PatientId, Trial, WordId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_trial_row, placeholders};
use crate::repository::{StorageError, TrialRepository};

const TRIAL_COLUMNS: &str = "patient_id, word_id, trial_number, accuracy, date, time";

#[async_trait::async_trait]
impl TrialRepository for SqliteRepository {
    async fn append_trial(&self, trial: &Trial) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO trials (patient_id, word_id, trial_number, accuracy, date, time)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_i64("patient_id", trial.patient_id().value())?)
        .bind(id_i64("word_id", trial.word_id().value())?)
        .bind(i64::from(trial.trial_number()))
        .bind(trial.accuracy())
        .bind(trial.date())
        .bind(trial.time())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn list_trials_for_words(
        &self,
        patient_id: PatientId,
        word_ids: &[WordId],
    ) -> Result<Vec<Trial>, StorageError> {
        if word_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {TRIAL_COLUMNS} FROM trials WHERE patient_id = ?1 AND word_id IN ({}) \
             ORDER BY date ASC, time ASC, id ASC",
            placeholders(2, word_ids.len())
        );
        let mut query = sqlx::query(&sql).bind(id_i64("patient_id", patient_id.value())?);
        for word_id in word_ids {
            query = query.bind(id_i64("word_id", word_id.value())?);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
        rows.iter().map(map_trial_row).collect()
    }

    async fn list_trials_on_dates(
        &self,
        patient_id: PatientId,
        dates: &[NaiveDate],
    ) -> Result<Vec<Trial>, StorageError> {
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {TRIAL_COLUMNS} FROM trials WHERE patient_id = ?1 AND date IN ({}) \
             ORDER BY date ASC, time ASC, id ASC",
            placeholders(2, dates.len())
        );
        let mut query = sqlx::query(&sql).bind(id_i64("patient_id", patient_id.value())?);
        for date in dates {
            query = query.bind(*date);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
        rows.iter().map(map_trial_row).collect()
    }

    async fn list_trials(&self, patient_id: PatientId) -> Result<Vec<Trial>, StorageError> {
        let sql = format!(
            "SELECT {TRIAL_COLUMNS} FROM trials WHERE patient_id = ?1 \
             ORDER BY date ASC, time ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("patient_id", patient_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_trial_row).collect()
    }
}
