use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::model::{Chapter, PhonemeLabel, SessionHistoryEntry, Trial, WordId};

use super::round1;

/// Maximum number of sessions included in a patient summary.
pub const RECENT_SESSION_LIMIT: usize = 10;

/// One recent session with the phonemes inferred from same-day trials.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDigest {
    pub date: NaiveDate,
    pub duration: String,
    pub phonemes_practiced: Vec<PhonemeLabel>,
    pub words_attempted: usize,
    pub accuracy: f64,
}

impl SessionDigest {
    /// Joins a session with the trials recorded on its date.
    ///
    /// Every trial counts toward `words_attempted`; trials whose word has no
    /// entry in `phonemes` add no label.
    #[must_use]
    pub fn build<'a, I>(
        session: &SessionHistoryEntry,
        same_day: I,
        phonemes: &HashMap<WordId, PhonemeLabel>,
    ) -> Self
    where
        I: IntoIterator<Item = &'a Trial>,
    {
        let mut labels = BTreeSet::new();
        let mut words_attempted = 0;
        for trial in same_day {
            words_attempted += 1;
            if let Some(label) = phonemes.get(&trial.word_id()) {
                labels.insert(label.clone());
            }
        }

        Self {
            date: session.date(),
            duration: session.duration().to_owned(),
            phonemes_practiced: labels.into_iter().collect(),
            words_attempted,
            accuracy: round1(session.score()),
        }
    }
}

/// Maps every word in the curriculum to its chapter's phoneme label.
#[must_use]
pub fn phoneme_lookup(chapters: &[Chapter]) -> HashMap<WordId, PhonemeLabel> {
    let mut lookup = HashMap::new();
    for chapter in chapters {
        let label = chapter.phoneme_label();
        for word in chapter.words() {
            lookup.insert(word.id(), label.clone());
        }
    }
    lookup
}

/// Digests for the most recent sessions, newest first.
///
/// `sessions` may arrive in any order and may exceed the limit; only the
/// [`RECENT_SESSION_LIMIT`] newest are kept. `trials` must cover at least the
/// dates of those sessions; trials on other dates are ignored.
#[must_use]
pub fn session_digests(
    sessions: &[SessionHistoryEntry],
    trials: &[Trial],
    phonemes: &HashMap<WordId, PhonemeLabel>,
) -> Vec<SessionDigest> {
    let mut recent: Vec<&SessionHistoryEntry> = sessions.iter().collect();
    // stable: same-day sessions keep the order storage returned them in
    recent.sort_by(|a, b| b.date().cmp(&a.date()));
    recent.truncate(RECENT_SESSION_LIMIT);

    let mut by_date: HashMap<NaiveDate, Vec<&Trial>> = HashMap::new();
    for trial in trials {
        by_date.entry(trial.date()).or_default().push(trial);
    }

    recent
        .into_iter()
        .map(|session| {
            let same_day = by_date.get(&session.date()).into_iter().flatten().copied();
            SessionDigest::build(session, same_day, phonemes)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChapterNumber, PatientId, Word};
    use chrono::NaiveTime;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn chapters() -> Vec<Chapter> {
        let p = ChapterNumber::new(1);
        let s = ChapterNumber::new(2);
        vec![
            Chapter::new(p, "P Sound", vec![Word::new(WordId::new(1), p, "pig", 1).unwrap()])
                .unwrap(),
            Chapter::new(s, "S Sound", vec![Word::new(WordId::new(2), s, "sun", 1).unwrap()])
                .unwrap(),
        ]
    }

    fn trial(word: u64, day: u32) -> Trial {
        Trial::new(PatientId::new(1), WordId::new(word), 1, 75.0, date(day), NaiveTime::from_hms_opt(0, 0, 0).unwrap())
            .unwrap()
    }

    fn session(day: u32, score: f64) -> SessionHistoryEntry {
        SessionHistoryEntry::new(PatientId::new(1), date(day), "30 min", score).unwrap()
    }

    #[test]
    fn digest_joins_trials_on_the_same_date() {
        let lookup = phoneme_lookup(&chapters());
        let trials = vec![trial(1, 3), trial(2, 3), trial(1, 3), trial(2, 4), trial(99, 3)];
        let digests = session_digests(&[session(3, 72.46)], &trials, &lookup);

        assert_eq!(digests.len(), 1);
        let digest = &digests[0];
        assert_eq!(digest.words_attempted, 4);
        let labels: Vec<_> = digest.phonemes_practiced.iter().map(PhonemeLabel::as_str).collect();
        assert_eq!(labels, vec!["/p/", "/s/"]);
        assert_eq!(digest.accuracy, 72.5);
        assert_eq!(digest.duration, "30 min");
    }

    #[test]
    fn session_without_trials_has_no_phonemes() {
        let digests = session_digests(&[session(5, 60.0)], &[], &phoneme_lookup(&chapters()));
        assert!(digests[0].phonemes_practiced.is_empty());
        assert_eq!(digests[0].words_attempted, 0);
    }

    #[test]
    fn only_the_ten_newest_sessions_are_kept() {
        let sessions: Vec<_> = (1..=14).map(|day| session(day, 50.0)).collect();
        let digests = session_digests(&sessions, &[], &HashMap::new());

        assert_eq!(digests.len(), RECENT_SESSION_LIMIT);
        assert_eq!(digests[0].date, date(14));
        assert_eq!(digests[9].date, date(5));
    }

    #[test]
    fn same_date_sessions_keep_storage_order() {
        // storage hands same-day sessions back latest stored first
        let sessions = vec![session(6, 63.0), session(7, 50.0), session(6, 62.0), session(6, 61.0)];
        let digests = session_digests(&sessions, &[], &HashMap::new());

        let scores: Vec<_> = digests.iter().map(|d| d.accuracy).collect();
        assert_eq!(scores, vec![50.0, 63.0, 62.0, 61.0]);
    }

    #[test]
    fn digest_serializes_camel_case_fields() {
        let digests = session_digests(&[session(2, 88.0)], &[trial(1, 2)], &phoneme_lookup(&chapters()));
        let json = serde_json::to_value(&digests[0]).unwrap();
        assert_eq!(json["date"], "2024-04-02");
        assert_eq!(json["phonemesPracticed"][0], "/p/");
        assert_eq!(json["wordsAttempted"], 1);
    }
}
