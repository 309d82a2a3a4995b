use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

use crate::model::{Chapter, ChapterNumber, PhonemeLabel, Trial, Word, WordId};

use super::round1;

/// Sorts trials oldest first by `(date, time)`.
///
/// This is the reverse of the ordering used to pick representative trials.
#[must_use]
pub fn chronological<'a, I>(trials: I) -> Vec<&'a Trial>
where
    I: IntoIterator<Item = &'a Trial>,
{
    let mut ordered: Vec<&Trial> = trials.into_iter().collect();
    ordered.sort_by(|a, b| a.cmp_recency(b));
    ordered
}

//
// ─── WORD HISTORY ──────────────────────────────────────────────────────────────
//

/// One point of a per-word history chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialPoint {
    pub year: i32,
    /// English month name, e.g. `"April"`.
    pub month: String,
    /// Day of month.
    pub date: u32,
    pub trial: u32,
    pub accuracy: f64,
}

impl TrialPoint {
    #[must_use]
    pub fn from_trial(trial: &Trial) -> Self {
        let date = trial.date();
        Self {
            year: date.year(),
            month: date.format("%B").to_string(),
            date: date.day(),
            trial: trial.trial_number(),
            accuracy: round1(trial.accuracy()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordTrialHistory {
    pub chapter: ChapterNumber,
    pub word: String,
    pub trials: Vec<TrialPoint>,
}

impl WordTrialHistory {
    /// Chronological trial list for one word. Trials for other words are
    /// ignored; the list may be empty.
    #[must_use]
    pub fn build(chapter: &Chapter, word: &Word, trials: &[Trial]) -> Self {
        let points = chronological(trials.iter().filter(|t| t.word_id() == word.id()))
            .into_iter()
            .map(TrialPoint::from_trial)
            .collect();
        Self {
            chapter: chapter.number(),
            word: word.text().to_owned(),
            trials: points,
        }
    }
}

//
// ─── CHAPTER WORDS ─────────────────────────────────────────────────────────────
//

/// Word list of a chapter with its phoneme label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterWords {
    pub chapter: ChapterNumber,
    pub phoneme: PhonemeLabel,
    pub words: Vec<String>,
}

impl From<&Chapter> for ChapterWords {
    fn from(chapter: &Chapter) -> Self {
        Self {
            chapter: chapter.number(),
            phoneme: chapter.phoneme_label(),
            words: chapter.words().iter().map(|w| w.text().to_owned()).collect(),
        }
    }
}

//
// ─── GRAPH FEED ────────────────────────────────────────────────────────────────
//

/// One trial in the patient-wide accuracy graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphPoint {
    pub date: NaiveDate,
    pub accuracy: f64,
    pub word: String,
    pub chapter: ChapterNumber,
}

/// All trials of a patient as graph points, oldest first.
///
/// Trials whose word is not part of `chapters` are skipped.
#[must_use]
pub fn graph_points(chapters: &[Chapter], trials: &[Trial]) -> Vec<GraphPoint> {
    let words: HashMap<WordId, &Word> = chapters
        .iter()
        .flat_map(Chapter::words)
        .map(|w| (w.id(), w))
        .collect();

    chronological(trials)
        .into_iter()
        .filter_map(|trial| {
            let word = words.get(&trial.word_id())?;
            Some(GraphPoint {
                date: trial.date(),
                accuracy: round1(trial.accuracy()),
                word: word.text().to_owned(),
                chapter: word.chapter(),
            })
        })
        .collect()
}
