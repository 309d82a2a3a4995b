use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{COMPLETION_ACCURACY, Chapter, ChapterNumber, PhonemeLabel, Trial, WordId};

use super::round1;

/// Number of words shown as examples for a chapter.
pub const EXAMPLE_WORD_LIMIT: usize = 3;

/// Percentage given to any chapter with at least one attempt.
const IN_PROGRESS_FLOOR: f64 = 10.0;
/// Highest percentage an unfinished chapter may report.
const IN_PROGRESS_CAP: f64 = 90.0;
const ATTEMPT_WEIGHT: f64 = 20.0;
const ATTEMPT_CREDIT: f64 = 0.25;
const HIGH_ACCURACY_MULTIPLIER: f64 = 2.0;
const AVERAGE_ACCURACY_CREDIT: f64 = 0.15;

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChapterStatus {
    Completed,
    InProgress,
    NotStarted,
}

impl ChapterStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChapterStatus::Completed => "completed",
            ChapterStatus::InProgress => "in-progress",
            ChapterStatus::NotStarted => "not-started",
        }
    }
}

//
// ─── REPRESENTATIVE TRIALS ─────────────────────────────────────────────────────
//

/// Picks the most recent trial per word.
///
/// Recency is `(date, time)`; see [`Trial::cmp_recency`] for exact ties. The
/// result does not depend on the order of `trials`.
pub fn representative_trials<'a, I>(trials: I) -> HashMap<WordId, &'a Trial>
where
    I: IntoIterator<Item = &'a Trial>,
{
    let mut latest: HashMap<WordId, &'a Trial> = HashMap::new();
    for trial in trials {
        latest
            .entry(trial.word_id())
            .and_modify(|current| {
                if trial.cmp_recency(current).is_gt() {
                    *current = trial;
                }
            })
            .or_insert(trial);
    }
    latest
}

//
// ─── TALLY ─────────────────────────────────────────────────────────────────────
//

/// Unrounded per-chapter metrics derived from representative trials.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterTally {
    word_count: usize,
    completed_words: usize,
    attempted_words: usize,
    highest_accuracy: f64,
    accuracy_sum: f64,
    last_practiced: Option<NaiveDate>,
}

impl ChapterTally {
    /// Tally for a chapter using a bulk slice of trials.
    ///
    /// Trials for words outside the chapter are ignored.
    #[must_use]
    pub fn from_trials(chapter: &Chapter, trials: &[Trial]) -> Self {
        Self::from_representatives(chapter, &representative_trials(trials))
    }

    /// Tally for a chapter from an already computed word → latest trial map.
    #[must_use]
    pub fn from_representatives(chapter: &Chapter, latest: &HashMap<WordId, &Trial>) -> Self {
        let mut tally = Self::empty(chapter.word_count());
        for trial in chapter.words().iter().filter_map(|w| latest.get(&w.id())) {
            let accuracy = trial.accuracy();
            tally.attempted_words += 1;
            if trial.is_completed() {
                tally.completed_words += 1;
            }
            if accuracy > tally.highest_accuracy {
                tally.highest_accuracy = accuracy;
            }
            tally.accuracy_sum += accuracy;
            if tally.last_practiced.is_none_or(|d| trial.date() > d) {
                tally.last_practiced = Some(trial.date());
            }
        }
        tally
    }

    fn empty(word_count: usize) -> Self {
        Self {
            word_count,
            completed_words: 0,
            attempted_words: 0,
            highest_accuracy: 0.0,
            accuracy_sum: 0.0,
            last_practiced: None,
        }
    }

    #[must_use]
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    #[must_use]
    pub fn completed_words(&self) -> usize {
        self.completed_words
    }

    #[must_use]
    pub fn attempted_words(&self) -> usize {
        self.attempted_words
    }

    #[must_use]
    pub fn has_progress(&self) -> bool {
        self.attempted_words > 0
    }

    /// Highest representative accuracy, or 0 when nothing was attempted.
    #[must_use]
    pub fn highest_accuracy(&self) -> f64 {
        self.highest_accuracy
    }

    #[must_use]
    pub fn last_practiced(&self) -> Option<NaiveDate> {
        self.last_practiced
    }

    /// Mean representative accuracy over attempted words.
    ///
    /// `None` when no word has a trial.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn chapter_accuracy(&self) -> Option<f64> {
        (self.attempted_words > 0).then(|| self.accuracy_sum / self.attempted_words as f64)
    }

    #[must_use]
    pub fn status(&self) -> ChapterStatus {
        if self.word_count > 0 && self.completed_words == self.word_count {
            ChapterStatus::Completed
        } else if self.has_progress() {
            ChapterStatus::InProgress
        } else {
            ChapterStatus::NotStarted
        }
    }

    /// Unrounded progress percentage.
    ///
    /// Completed chapters report 100. In-progress chapters combine completion,
    /// attempt coverage, high-accuracy credit and average accuracy, with a
    /// floor of 10 and a cap of 90. Untouched chapters report 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percentage(&self) -> f64 {
        match self.status() {
            ChapterStatus::Completed => 100.0,
            ChapterStatus::NotStarted => 0.0,
            ChapterStatus::InProgress => {
                let words = self.word_count as f64;
                let completion = self.completed_words as f64 / words * 100.0;
                let attempts = self.attempted_words as f64 / words * ATTEMPT_WEIGHT;
                let high_accuracy = if self.highest_accuracy > COMPLETION_ACCURACY {
                    (self.highest_accuracy - COMPLETION_ACCURACY) * HIGH_ACCURACY_MULTIPLIER
                } else {
                    0.0
                };
                let average = self.chapter_accuracy().unwrap_or(0.0) * AVERAGE_ACCURACY_CREDIT;

                let raw = IN_PROGRESS_FLOOR
                    .max(completion + attempts * ATTEMPT_CREDIT + high_accuracy + average);
                if raw > IN_PROGRESS_CAP && self.completed_words < self.word_count {
                    IN_PROGRESS_CAP
                } else {
                    raw
                }
            }
        }
    }
}

//
// ─── OUTPUT ────────────────────────────────────────────────────────────────────
//

/// Dashboard entry for one chapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgress {
    pub id: ChapterNumber,
    pub phoneme: PhonemeLabel,
    pub example_words: Vec<String>,
    pub status: ChapterStatus,
    pub progress: f64,
    pub accuracy: f64,
    pub last_practiced: Option<NaiveDate>,
    #[serde(skip)]
    tally: ChapterTally,
}

impl ChapterProgress {
    /// Computes progress for one chapter from the patient's trials.
    ///
    /// A chapter without words yields the zero result (`not-started`, 0.0)
    /// without dividing by its word count.
    #[must_use]
    pub fn compute(chapter: &Chapter, trials: &[Trial]) -> Self {
        Self::from_tally(chapter, ChapterTally::from_trials(chapter, trials))
    }

    #[must_use]
    pub fn from_tally(chapter: &Chapter, tally: ChapterTally) -> Self {
        Self {
            id: chapter.number(),
            phoneme: chapter.phoneme_label(),
            example_words: chapter.example_words(EXAMPLE_WORD_LIMIT),
            status: tally.status(),
            progress: round1(tally.progress_percentage()),
            accuracy: round1(tally.chapter_accuracy().unwrap_or(0.0)),
            last_practiced: tally.last_practiced(),
            tally,
        }
    }

    /// Raw metrics this entry was built from.
    #[must_use]
    pub fn tally(&self) -> &ChapterTally {
        &self.tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PatientId, Word};
    use chrono::NaiveTime;

    fn chapter(word_count: u64) -> Chapter {
        let number = ChapterNumber::new(1);
        let words = (1..=word_count)
            .map(|id| {
                Word::new(
                    WordId::new(id),
                    number,
                    format!("word{id}"),
                    i32::try_from(id).unwrap(),
                )
                .unwrap()
            })
            .collect();
        Chapter::new(number, "P Sound", words).unwrap()
    }

    fn trial(word: u64, accuracy: f64, day: u32, hour: u32) -> Trial {
        Trial::new(
            PatientId::new(1),
            WordId::new(word),
            1,
            accuracy,
            NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn chapter_without_trials_is_not_started() {
        let progress = ChapterProgress::compute(&chapter(4), &[]);
        assert_eq!(progress.status, ChapterStatus::NotStarted);
        assert_eq!(progress.progress, 0.0);
        assert_eq!(progress.accuracy, 0.0);
        assert_eq!(progress.last_practiced, None);
    }

    #[test]
    fn all_words_mastered_is_completed() {
        let trials = vec![trial(1, 90.0, 1, 9), trial(2, 99.0, 2, 9), trial(3, 91.5, 3, 9)];
        let progress = ChapterProgress::compute(&chapter(3), &trials);
        assert_eq!(progress.status, ChapterStatus::Completed);
        assert_eq!(progress.progress, 100.0);
        assert_eq!(progress.accuracy, 93.5);
        assert_eq!(progress.last_practiced, NaiveDate::from_ymd_opt(2024, 4, 3));
    }

    #[test]
    fn in_progress_percentage_combines_all_factors() {
        // completion 33.33 + attempts 0.25*13.33 + high accuracy 10 + average 12
        let trials = vec![trial(1, 95.0, 1, 9), trial(2, 65.0, 1, 10)];
        let progress = ChapterProgress::compute(&chapter(3), &trials);
        assert_eq!(progress.status, ChapterStatus::InProgress);
        assert_eq!(progress.progress, 58.7);
        assert_eq!(progress.accuracy, 80.0);
    }

    #[test]
    fn in_progress_percentage_has_a_floor() {
        let progress = ChapterProgress::compute(&chapter(10), &[trial(1, 10.0, 1, 9)]);
        assert_eq!(progress.status, ChapterStatus::InProgress);
        assert_eq!(progress.progress, 10.0);
    }

    #[test]
    fn unfinished_chapter_is_capped_at_ninety() {
        let trials: Vec<_> = (1..=9).map(|w| trial(w, 100.0, 1, 9)).collect();
        let progress = ChapterProgress::compute(&chapter(10), &trials);
        assert!(progress.tally().completed_words() < progress.tally().word_count());
        assert_eq!(progress.progress, 90.0);
    }

    #[test]
    fn latest_trial_decides_word_state() {
        // an older mastered attempt does not count once a newer one drops below 90
        let trials = vec![trial(1, 98.0, 1, 9), trial(1, 40.0, 2, 9)];
        let tally = ChapterTally::from_trials(&chapter(1), &trials);
        assert_eq!(tally.completed_words(), 0);
        assert_eq!(tally.highest_accuracy(), 40.0);
    }

    #[test]
    fn representative_selection_ignores_input_order() {
        let a = trial(1, 70.0, 3, 8);
        let b = trial(1, 80.0, 3, 17);
        let c = trial(1, 90.0, 2, 23);

        let forward = [a.clone(), b.clone(), c.clone()];
        let backward = [c, b.clone(), a];
        assert_eq!(representative_trials(&forward)[&WordId::new(1)], &b);
        assert_eq!(representative_trials(&backward)[&WordId::new(1)], &b);
    }

    #[test]
    fn zero_word_chapter_yields_zero_result() {
        let progress = ChapterProgress::compute(&chapter(0), &[trial(1, 95.0, 1, 9)]);
        assert_eq!(progress.status, ChapterStatus::NotStarted);
        assert_eq!(progress.progress, 0.0);
        assert!(progress.example_words.is_empty());
    }

    #[test]
    fn trials_for_other_words_are_ignored() {
        let progress = ChapterProgress::compute(&chapter(2), &[trial(7, 95.0, 1, 9)]);
        assert_eq!(progress.status, ChapterStatus::NotStarted);
    }

    #[test]
    fn serializes_dashboard_field_names() {
        let progress = ChapterProgress::compute(&chapter(4), &[trial(1, 50.0, 5, 9)]);
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["phoneme"], "/p/");
        assert_eq!(json["exampleWords"].as_array().unwrap().len(), 3);
        assert_eq!(json["status"], "in-progress");
        assert_eq!(json["lastPracticed"], "2024-04-05");
        assert!(json.get("tally").is_none());
    }
}
