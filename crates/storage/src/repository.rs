use async_trait::async_trait;
use chrono::NaiveDate;
use speech_core::model::{
    Chapter, ChapterNumber, DoctorId, Patient, PatientId, SessionHistoryEntry, Trial, WordId,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid stored record: {0}")]
    Invalid(#[from] speech_core::Error),
}

/// Patient registry scoped by owning doctor.
#[async_trait]
pub trait PatientRepository: Send + Sync {
    /// Persist or update a patient.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the patient code is already used by
    /// another patient, or other storage errors.
    async fn upsert_patient(&self, patient: &Patient) -> Result<(), StorageError>;

    /// Look up a patient by clinic code, visible only to its doctor.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures. A missing or foreign
    /// patient is `Ok(None)`.
    async fn find_patient(
        &self,
        doctor_id: DoctorId,
        patient_code: &str,
    ) -> Result<Option<Patient>, StorageError>;
}

/// Curriculum catalog: chapters and their ordered words.
#[async_trait]
pub trait CurriculumRepository: Send + Sync {
    /// Persist a chapter, replacing its word list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if one of the words is already bound
    /// to a different chapter, or other storage errors.
    async fn upsert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError>;

    /// All chapters ordered by chapter number, words ordered by `order`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_chapters(&self) -> Result<Vec<Chapter>, StorageError>;

    /// Fetch a chapter by number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_chapter(&self, number: ChapterNumber) -> Result<Option<Chapter>, StorageError>;
}

/// Append-only store of trial records.
#[async_trait]
pub trait TrialRepository: Send + Sync {
    /// Append a trial and return its storage id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the trial cannot be stored.
    async fn append_trial(&self, trial: &Trial) -> Result<i64, StorageError>;

    /// Trials of a patient for any of the given words, in one round trip.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_trials_for_words(
        &self,
        patient_id: PatientId,
        word_ids: &[WordId],
    ) -> Result<Vec<Trial>, StorageError>;

    /// Trials of a patient recorded on any of the given dates.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_trials_on_dates(
        &self,
        patient_id: PatientId,
        dates: &[NaiveDate],
    ) -> Result<Vec<Trial>, StorageError>;

    /// Every trial of a patient.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_trials(&self, patient_id: PatientId) -> Result<Vec<Trial>, StorageError>;
}

/// Append-only store of practice sessions.
#[async_trait]
pub trait SessionHistoryRepository: Send + Sync {
    /// Append a session and return its storage id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn append_session(&self, session: &SessionHistoryEntry) -> Result<i64, StorageError>;

    /// Sessions of a patient, newest date first, at most `limit`.
    ///
    /// Sessions sharing a date are returned most recently stored first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_recent_sessions(
        &self,
        patient_id: PatientId,
        limit: u32,
    ) -> Result<Vec<SessionHistoryEntry>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    patients: Arc<Mutex<HashMap<PatientId, Patient>>>,
    chapters: Arc<Mutex<BTreeMap<ChapterNumber, Chapter>>>,
    trials: Arc<Mutex<Vec<(i64, Trial)>>>,
    sessions: Arc<Mutex<Vec<(i64, SessionHistoryEntry)>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn next_id<T>(rows: &[(i64, T)]) -> i64 {
    rows.last().map_or(1, |(id, _)| id + 1)
}

#[async_trait]
impl PatientRepository for InMemoryRepository {
    async fn upsert_patient(&self, patient: &Patient) -> Result<(), StorageError> {
        let mut guard = self.patients.lock().map_err(poisoned)?;
        let taken = guard
            .values()
            .any(|p| p.patient_code() == patient.patient_code() && p.id() != patient.id());
        if taken {
            return Err(StorageError::Conflict);
        }
        guard.insert(patient.id(), patient.clone());
        Ok(())
    }

    async fn find_patient(
        &self,
        doctor_id: DoctorId,
        patient_code: &str,
    ) -> Result<Option<Patient>, StorageError> {
        let guard = self.patients.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .find(|p| p.patient_code() == patient_code && p.is_owned_by(doctor_id))
            .cloned())
    }
}

#[async_trait]
impl CurriculumRepository for InMemoryRepository {
    async fn upsert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError> {
        let mut guard = self.chapters.lock().map_err(poisoned)?;
        let incoming: HashSet<WordId> = chapter.word_ids().into_iter().collect();
        let stolen = guard
            .values()
            .filter(|c| c.number() != chapter.number())
            .flat_map(|c| c.words())
            .any(|w| incoming.contains(&w.id()));
        if stolen {
            return Err(StorageError::Conflict);
        }
        guard.insert(chapter.number(), chapter.clone());
        Ok(())
    }

    async fn list_chapters(&self) -> Result<Vec<Chapter>, StorageError> {
        let guard = self.chapters.lock().map_err(poisoned)?;
        Ok(guard.values().cloned().collect())
    }

    async fn get_chapter(&self, number: ChapterNumber) -> Result<Option<Chapter>, StorageError> {
        let guard = self.chapters.lock().map_err(poisoned)?;
        Ok(guard.get(&number).cloned())
    }
}

#[async_trait]
impl TrialRepository for InMemoryRepository {
    async fn append_trial(&self, trial: &Trial) -> Result<i64, StorageError> {
        let mut guard = self.trials.lock().map_err(poisoned)?;
        let id = next_id(&guard);
        guard.push((id, trial.clone()));
        Ok(id)
    }

    async fn list_trials_for_words(
        &self,
        patient_id: PatientId,
        word_ids: &[WordId],
    ) -> Result<Vec<Trial>, StorageError> {
        let wanted: HashSet<WordId> = word_ids.iter().copied().collect();
        let guard = self.trials.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .map(|(_, t)| t)
            .filter(|t| t.patient_id() == patient_id && wanted.contains(&t.word_id()))
            .cloned()
            .collect())
    }

    async fn list_trials_on_dates(
        &self,
        patient_id: PatientId,
        dates: &[NaiveDate],
    ) -> Result<Vec<Trial>, StorageError> {
        let wanted: HashSet<NaiveDate> = dates.iter().copied().collect();
        let guard = self.trials.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .map(|(_, t)| t)
            .filter(|t| t.patient_id() == patient_id && wanted.contains(&t.date()))
            .cloned()
            .collect())
    }

    async fn list_trials(&self, patient_id: PatientId) -> Result<Vec<Trial>, StorageError> {
        let guard = self.trials.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .map(|(_, t)| t)
            .filter(|t| t.patient_id() == patient_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionHistoryRepository for InMemoryRepository {
    async fn append_session(&self, session: &SessionHistoryEntry) -> Result<i64, StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        let id = next_id(&guard);
        guard.push((id, session.clone()));
        Ok(id)
    }

    async fn list_recent_sessions(
        &self,
        patient_id: PatientId,
        limit: u32,
    ) -> Result<Vec<SessionHistoryEntry>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let mut rows: Vec<&(i64, SessionHistoryEntry)> = guard
            .iter()
            .filter(|(_, s)| s.patient_id() == patient_id)
            .collect();
        rows.sort_by(|(a_id, a), (b_id, b)| b.date().cmp(&a.date()).then(b_id.cmp(a_id)));
        Ok(rows
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|(_, s)| s.clone())
            .collect())
    }
}

/// Aggregates the collaborator repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub patients: Arc<dyn PatientRepository>,
    pub curriculum: Arc<dyn CurriculumRepository>,
    pub trials: Arc<dyn TrialRepository>,
    pub sessions: Arc<dyn SessionHistoryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wires every repository role to clones of one backend.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: PatientRepository
            + CurriculumRepository
            + TrialRepository
            + SessionHistoryRepository
            + Clone
            + 'static,
    {
        Self {
            patients: Arc::new(repo.clone()),
            curriculum: Arc::new(repo.clone()),
            trials: Arc::new(repo.clone()),
            sessions: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use speech_core::model::{Gender, Word};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn patient(id: u64, code: &str, doctor: u64) -> Patient {
        Patient::new(
            PatientId::new(id),
            format!("Patient {id}"),
            code,
            Gender::Other,
            DoctorId::new(doctor),
            date(1),
        )
        .unwrap()
    }

    fn chapter(number: u32, word_ids: &[u64]) -> Chapter {
        let n = ChapterNumber::new(number);
        let words = word_ids
            .iter()
            .map(|id| Word::new(WordId::new(*id), n, format!("w{id}"), 0).unwrap())
            .collect();
        Chapter::new(n, format!("Chapter {number}"), words).unwrap()
    }

    fn trial(patient: u64, word: u64, day: u32) -> Trial {
        Trial::new(
            PatientId::new(patient),
            WordId::new(word),
            1,
            50.0,
            date(day),
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn find_patient_is_scoped_to_doctor() {
        let repo = InMemoryRepository::new();
        repo.upsert_patient(&patient(1, "P-1", 7)).await.unwrap();

        assert!(repo.find_patient(DoctorId::new(7), "P-1").await.unwrap().is_some());
        assert!(repo.find_patient(DoctorId::new(8), "P-1").await.unwrap().is_none());
        assert!(repo.find_patient(DoctorId::new(7), "P-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_patient_code_conflicts() {
        let repo = InMemoryRepository::new();
        repo.upsert_patient(&patient(1, "P-1", 7)).await.unwrap();
        let err = repo.upsert_patient(&patient(2, "P-1", 7)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn chapters_list_in_number_order() {
        let repo = InMemoryRepository::new();
        repo.upsert_chapter(&chapter(3, &[30])).await.unwrap();
        repo.upsert_chapter(&chapter(1, &[10])).await.unwrap();

        let numbers: Vec<_> = repo
            .list_chapters()
            .await
            .unwrap()
            .iter()
            .map(|c| c.number().value())
            .collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[tokio::test]
    async fn word_cannot_move_between_chapters() {
        let repo = InMemoryRepository::new();
        repo.upsert_chapter(&chapter(1, &[10])).await.unwrap();
        let err = repo.upsert_chapter(&chapter(2, &[10])).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn trial_queries_filter_by_patient() {
        let repo = InMemoryRepository::new();
        repo.append_trial(&trial(1, 10, 2)).await.unwrap();
        repo.append_trial(&trial(1, 11, 3)).await.unwrap();
        repo.append_trial(&trial(2, 10, 2)).await.unwrap();

        let by_word = repo
            .list_trials_for_words(PatientId::new(1), &[WordId::new(10)])
            .await
            .unwrap();
        assert_eq!(by_word.len(), 1);

        let by_date = repo
            .list_trials_on_dates(PatientId::new(1), &[date(2), date(3)])
            .await
            .unwrap();
        assert_eq!(by_date.len(), 2);

        assert_eq!(repo.list_trials(PatientId::new(2)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn recent_sessions_are_newest_first_and_limited() {
        let repo = InMemoryRepository::new();
        for day in [3, 9, 1, 5] {
            let entry =
                SessionHistoryEntry::new(PatientId::new(1), date(day), "10 min", 60.0).unwrap();
            repo.append_session(&entry).await.unwrap();
        }

        let sessions = repo.list_recent_sessions(PatientId::new(1), 3).await.unwrap();
        let days: Vec<_> = sessions.iter().map(|s| s.date()).collect();
        assert_eq!(days, vec![date(9), date(5), date(3)]);
    }

    #[tokio::test]
    async fn same_date_sessions_list_latest_stored_first() {
        let repo = InMemoryRepository::new();
        for score in [61.0, 62.0, 63.0] {
            let entry =
                SessionHistoryEntry::new(PatientId::new(1), date(4), "10 min", score).unwrap();
            repo.append_session(&entry).await.unwrap();
        }

        let sessions = repo.list_recent_sessions(PatientId::new(1), 2).await.unwrap();
        let scores: Vec<_> = sessions.iter().map(SessionHistoryEntry::score).collect();
        assert_eq!(scores, vec![63.0, 62.0]);
    }
}
