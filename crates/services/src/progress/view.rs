use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use speech_core::model::{
    ChapterNumber, Gender, Patient, PatientId, SessionHistoryEntry, Trial, Word, WordId,
};
use speech_core::progress::{
    ChapterProgress, ProgressSummary, SessionDigest, SummaryStatistics, round1,
};

/// Identity block shown at the top of a patient dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientInfo {
    pub id: PatientId,
    pub full_name: String,
    /// Clinic-facing patient code.
    pub patient_id: String,
    pub gender: Gender,
    pub first_clinic_date: NaiveDate,
}

impl From<&Patient> for PatientInfo {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id(),
            full_name: patient.full_name().to_owned(),
            patient_id: patient.patient_code().to_owned(),
            gender: patient.gender(),
            first_clinic_date: patient.first_clinic_date(),
        }
    }
}

/// Full progress dashboard for one patient.
///
/// Field names are consumed as-is by the dashboard client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummaryReport {
    pub patient: PatientInfo,
    pub phoneme_progress: Vec<ChapterProgress>,
    pub recent_sessions: Vec<SessionDigest>,
    pub statistics: SummaryStatistics,
}

impl PatientSummaryReport {
    #[must_use]
    pub fn new(patient: &Patient, summary: ProgressSummary) -> Self {
        Self {
            patient: PatientInfo::from(patient),
            phoneme_progress: summary.chapters,
            recent_sessions: summary.recent_sessions,
            statistics: summary.statistics,
        }
    }
}

/// A stored session as listed in the session history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub date: NaiveDate,
    pub duration: String,
    pub score: f64,
}

impl From<&SessionHistoryEntry> for SessionRecord {
    fn from(entry: &SessionHistoryEntry) -> Self {
        Self {
            date: entry.date(),
            duration: entry.duration().to_owned(),
            score: round1(entry.score()),
        }
    }
}

/// A stored trial as listed in the raw per-patient trial list.
///
/// `word` and `chapter` are `None` once the word has left the curriculum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRecord {
    pub word_id: WordId,
    pub word: Option<String>,
    pub chapter: Option<ChapterNumber>,
    pub trial_number: u32,
    pub accuracy: f64,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl TrialRecord {
    #[must_use]
    pub fn new(trial: &Trial, word: Option<&Word>) -> Self {
        Self {
            word_id: trial.word_id(),
            word: word.map(|w| w.text().to_owned()),
            chapter: word.map(Word::chapter),
            trial_number: trial.trial_number(),
            accuracy: round1(trial.accuracy()),
            date: trial.date(),
            time: trial.time(),
        }
    }
}
