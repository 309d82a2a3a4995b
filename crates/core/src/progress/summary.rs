use serde::Serialize;

use crate::model::{Chapter, SessionHistoryEntry, Trial};

use super::chapter::{ChapterProgress, ChapterStatus, ChapterTally, representative_trials};
use super::round1;
use super::sessions::{SessionDigest, phoneme_lookup, session_digests};

/// Running totals folded over the chapters of one patient.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressTotals {
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    accuracy_sum: f64,
    accuracy_chapters: usize,
}

impl ProgressTotals {
    /// Adds one chapter. Only chapters with at least one representative trial
    /// contribute to the accuracy average.
    #[must_use]
    pub fn record(mut self, tally: &ChapterTally) -> Self {
        match tally.status() {
            ChapterStatus::Completed => self.completed += 1,
            ChapterStatus::InProgress => self.in_progress += 1,
            ChapterStatus::NotStarted => self.not_started += 1,
        }
        if let Some(accuracy) = tally.chapter_accuracy() {
            self.accuracy_sum += accuracy;
            self.accuracy_chapters += 1;
        }
        self
    }

    /// Unrounded mean of chapter accuracies; 0 when no chapter qualifies.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_accuracy(&self) -> f64 {
        if self.accuracy_chapters == 0 {
            0.0
        } else {
            self.accuracy_sum / self.accuracy_chapters as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStatistics {
    /// Number of sessions in the digest, not the full history.
    pub total_sessions: usize,
    pub average_accuracy: f64,
    pub completed_phonemes: usize,
    pub in_progress_phonemes: usize,
    pub not_started_phonemes: usize,
}

impl SummaryStatistics {
    #[must_use]
    pub fn new(totals: &ProgressTotals, total_sessions: usize) -> Self {
        Self {
            total_sessions,
            average_accuracy: round1(totals.average_accuracy()),
            completed_phonemes: totals.completed,
            in_progress_phonemes: totals.in_progress,
            not_started_phonemes: totals.not_started,
        }
    }
}

/// Engine output for one patient, without identity fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub chapters: Vec<ChapterProgress>,
    pub recent_sessions: Vec<SessionDigest>,
    pub statistics: SummaryStatistics,
}

/// Aggregates chapter progress and recent sessions for one patient.
///
/// - `chapter_trials`: the patient's trials for curriculum words
/// - `session_trials`: the patient's trials on the session dates
///
/// Chapters are processed in ascending number; chapters without words are
/// left out of the report entirely.
#[must_use]
pub fn summarize_progress(
    chapters: &[Chapter],
    chapter_trials: &[Trial],
    sessions: &[SessionHistoryEntry],
    session_trials: &[Trial],
) -> ProgressSummary {
    let mut ordered: Vec<&Chapter> = chapters.iter().filter(|c| !c.is_empty()).collect();
    ordered.sort_by_key(|c| c.number());

    let latest = representative_trials(chapter_trials);
    let (entries, totals) = ordered.into_iter().fold(
        (Vec::new(), ProgressTotals::default()),
        |(mut entries, totals), chapter| {
            let tally = ChapterTally::from_representatives(chapter, &latest);
            let totals = totals.record(&tally);
            entries.push(ChapterProgress::from_tally(chapter, tally));
            (entries, totals)
        },
    );

    let recent_sessions = session_digests(sessions, session_trials, &phoneme_lookup(chapters));
    let statistics = SummaryStatistics::new(&totals, recent_sessions.len());

    ProgressSummary {
        chapters: entries,
        recent_sessions,
        statistics,
    }
}
