use speech_core::model::{PatientId, SessionHistoryEntry};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_session_row};
use crate::repository::{SessionHistoryRepository, StorageError};

#[async_trait::async_trait]
impl SessionHistoryRepository for SqliteRepository {
    async fn append_session(&self, session: &SessionHistoryEntry) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO session_history (patient_id, date, duration, score)
                VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_i64("patient_id", session.patient_id().value())?)
        .bind(session.date())
        .bind(session.duration())
        .bind(session.score())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn list_recent_sessions(
        &self,
        patient_id: PatientId,
        limit: u32,
    ) -> Result<Vec<SessionHistoryEntry>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT patient_id, date, duration, score
                FROM session_history
                WHERE patient_id = ?1
                ORDER BY date DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(id_i64("patient_id", patient_id.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_session_row).collect()
    }
}
