use chrono::{NaiveDate, NaiveTime};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use speech_core::model::{
    Chapter, ChapterNumber, DoctorId, Patient, SessionHistoryEntry, Trial, Word, WordId,
};
use speech_core::progress::{
    ChapterProgress, ChapterWords, GraphPoint, RECENT_SESSION_LIMIT, WordTrialHistory,
    chronological, graph_points, summarize_progress,
};
use storage::repository::{
    CurriculumRepository, PatientRepository, SessionHistoryRepository, Storage, TrialRepository,
};

use super::view::{PatientSummaryReport, SessionRecord, TrialRecord};
use crate::error::ProgressError;

/// Read-side facade over the progress engine.
///
/// Resolves patients within a doctor's scope, loads the records the engine
/// needs in bulk, and returns dashboard-ready structures. Every call reads
/// current repository state; nothing is cached.
#[derive(Clone)]
pub struct ProgressService {
    patients: Arc<dyn PatientRepository>,
    curriculum: Arc<dyn CurriculumRepository>,
    trials: Arc<dyn TrialRepository>,
    sessions: Arc<dyn SessionHistoryRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        patients: Arc<dyn PatientRepository>,
        curriculum: Arc<dyn CurriculumRepository>,
        trials: Arc<dyn TrialRepository>,
        sessions: Arc<dyn SessionHistoryRepository>,
    ) -> Self {
        Self {
            patients,
            curriculum,
            trials,
            sessions,
        }
    }

    #[must_use]
    pub fn from_storage(storage: &Storage) -> Self {
        Self::new(
            Arc::clone(&storage.patients),
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.trials),
            Arc::clone(&storage.sessions),
        )
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_storage(&Storage::in_memory())
    }

    async fn patient(&self, doctor_id: DoctorId, patient_code: &str) -> Result<Patient, ProgressError> {
        self.patients
            .find_patient(doctor_id, patient_code)
            .await?
            .ok_or(ProgressError::PatientNotFound)
    }

    async fn chapter(&self, number: ChapterNumber) -> Result<Chapter, ProgressError> {
        self.curriculum
            .get_chapter(number)
            .await?
            .ok_or(ProgressError::ChapterNotFound(number))
    }

    /// Build the full progress dashboard for a patient.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::PatientNotFound` if the patient does not exist
    /// for this doctor, or `ProgressError::Storage` on repository failures.
    pub async fn summarize_patient(
        &self,
        doctor_id: DoctorId,
        patient_code: &str,
    ) -> Result<PatientSummaryReport, ProgressError> {
        let patient = self.patient(doctor_id, patient_code).await?;
        let chapters = self.curriculum.list_chapters().await?;

        let word_ids: Vec<WordId> = chapters.iter().flat_map(Chapter::word_ids).collect();
        let chapter_trials = self
            .trials
            .list_trials_for_words(patient.id(), &word_ids)
            .await?;

        let limit = u32::try_from(RECENT_SESSION_LIMIT).unwrap_or(u32::MAX);
        let sessions = self
            .sessions
            .list_recent_sessions(patient.id(), limit)
            .await?;
        let dates: Vec<NaiveDate> = sessions
            .iter()
            .map(SessionHistoryEntry::date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let session_trials = self
            .trials
            .list_trials_on_dates(patient.id(), &dates)
            .await?;

        let summary = summarize_progress(&chapters, &chapter_trials, &sessions, &session_trials);
        tracing::debug!(
            patient = %patient.patient_code(),
            chapters = summary.chapters.len(),
            sessions = summary.recent_sessions.len(),
            trials = chapter_trials.len(),
            "built patient progress summary"
        );

        Ok(PatientSummaryReport::new(&patient, summary))
    }

    /// Progress for a single chapter.
    ///
    /// A chapter without words yields the zero result rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::PatientNotFound` or
    /// `ProgressError::ChapterNotFound` when a lookup does not resolve, or
    /// `ProgressError::Storage` on repository failures.
    pub async fn chapter_progress(
        &self,
        doctor_id: DoctorId,
        patient_code: &str,
        number: ChapterNumber,
    ) -> Result<ChapterProgress, ProgressError> {
        let patient = self.patient(doctor_id, patient_code).await?;
        let chapter = self.chapter(number).await?;
        let trials = self
            .trials
            .list_trials_for_words(patient.id(), &chapter.word_ids())
            .await?;
        Ok(ChapterProgress::compute(&chapter, &trials))
    }

    /// Chronological trial history for one word of a chapter.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::PatientNotFound`,
    /// `ProgressError::ChapterNotFound` or `ProgressError::WordNotFound` when
    /// a lookup does not resolve, or `ProgressError::Storage` on repository
    /// failures.
    pub async fn word_trials(
        &self,
        doctor_id: DoctorId,
        patient_code: &str,
        number: ChapterNumber,
        word_text: &str,
    ) -> Result<WordTrialHistory, ProgressError> {
        let patient = self.patient(doctor_id, patient_code).await?;
        let chapter = self.chapter(number).await?;
        let word = chapter
            .find_word(word_text)
            .ok_or_else(|| ProgressError::WordNotFound {
                chapter: number,
                word: word_text.to_owned(),
            })?;
        let trials = self
            .trials
            .list_trials_for_words(patient.id(), &[word.id()])
            .await?;
        Ok(WordTrialHistory::build(&chapter, word, &trials))
    }

    /// Word list and phoneme label of a chapter.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ChapterNotFound` if the chapter does not exist,
    /// or `ProgressError::Storage` on repository failures.
    pub async fn chapter_words(&self, number: ChapterNumber) -> Result<ChapterWords, ProgressError> {
        let chapter = self.chapter(number).await?;
        Ok(ChapterWords::from(&chapter))
    }

    /// Every trial of a patient as accuracy graph points, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::PatientNotFound` if the patient does not exist
    /// for this doctor, or `ProgressError::Storage` on repository failures.
    pub async fn graph_data(
        &self,
        doctor_id: DoctorId,
        patient_code: &str,
    ) -> Result<Vec<GraphPoint>, ProgressError> {
        let patient = self.patient(doctor_id, patient_code).await?;
        let chapters = self.curriculum.list_chapters().await?;
        let trials = self.trials.list_trials(patient.id()).await?;

        let points = graph_points(&chapters, &trials);
        if points.len() < trials.len() {
            tracing::warn!(
                patient = %patient.patient_code(),
                skipped = trials.len() - points.len(),
                "trials reference words missing from the curriculum"
            );
        }
        Ok(points)
    }

    /// Every stored trial of a patient, oldest first, with the word it
    /// refers to when that word is still in the curriculum.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::PatientNotFound` if the patient does not exist
    /// for this doctor, or `ProgressError::Storage` on repository failures.
    pub async fn list_trials(
        &self,
        doctor_id: DoctorId,
        patient_code: &str,
    ) -> Result<Vec<TrialRecord>, ProgressError> {
        let patient = self.patient(doctor_id, patient_code).await?;
        let chapters = self.curriculum.list_chapters().await?;
        let trials = self.trials.list_trials(patient.id()).await?;

        let words: HashMap<WordId, &Word> = chapters
            .iter()
            .flat_map(Chapter::words)
            .map(|w| (w.id(), w))
            .collect();
        Ok(chronological(&trials)
            .into_iter()
            .map(|trial| TrialRecord::new(trial, words.get(&trial.word_id()).copied()))
            .collect())
    }

    /// Full session history of a patient, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::PatientNotFound` if the patient does not exist
    /// for this doctor, or `ProgressError::Storage` on repository failures.
    pub async fn session_history(
        &self,
        doctor_id: DoctorId,
        patient_code: &str,
    ) -> Result<Vec<SessionRecord>, ProgressError> {
        let patient = self.patient(doctor_id, patient_code).await?;
        let sessions = self
            .sessions
            .list_recent_sessions(patient.id(), u32::MAX)
            .await?;
        Ok(sessions.iter().map(SessionRecord::from).collect())
    }

    /// Record a pronunciation attempt for a patient.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::PatientNotFound`, `ProgressError::UnknownWord`,
    /// `ProgressError::Model` for a non-finite accuracy, or
    /// `ProgressError::Storage` on repository failures.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_trial(
        &self,
        doctor_id: DoctorId,
        patient_code: &str,
        word_id: WordId,
        trial_number: u32,
        accuracy: f64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<i64, ProgressError> {
        let patient = self.patient(doctor_id, patient_code).await?;
        let known = self
            .curriculum
            .list_chapters()
            .await?
            .iter()
            .any(|c| c.words().iter().any(|w| w.id() == word_id));
        if !known {
            return Err(ProgressError::UnknownWord(word_id));
        }

        let trial = Trial::new(patient.id(), word_id, trial_number, accuracy, date, time)
            .map_err(speech_core::Error::from)?;
        let id = self.trials.append_trial(&trial).await?;
        tracing::debug!(patient = %patient.patient_code(), word = %word_id, trial_number, "recorded trial");
        Ok(id)
    }

    /// Record a completed practice session for a patient.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::PatientNotFound`, `ProgressError::Model` for
    /// a non-finite score, or `ProgressError::Storage` on repository failures.
    pub async fn record_session(
        &self,
        doctor_id: DoctorId,
        patient_code: &str,
        date: NaiveDate,
        duration: &str,
        score: f64,
    ) -> Result<i64, ProgressError> {
        let patient = self.patient(doctor_id, patient_code).await?;
        let entry = SessionHistoryEntry::new(patient.id(), date, duration, score)
            .map_err(speech_core::Error::from)?;
        let id = self.sessions.append_session(&entry).await?;
        tracing::debug!(patient = %patient.patient_code(), %date, "recorded session");
        Ok(id)
    }
}
