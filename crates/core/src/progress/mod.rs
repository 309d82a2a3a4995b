//! Progress aggregation over trial history.
//!
//! Everything in this module is pure: callers hand in materialized chapters,
//! trials and sessions, and get derived values back. Raw values are kept at
//! full precision until an output structure is built; [`round1`] is applied
//! exactly once, at that point.

mod chapter;
mod history;
mod sessions;
mod summary;

pub use chapter::{ChapterProgress, ChapterStatus, ChapterTally, EXAMPLE_WORD_LIMIT, representative_trials};
pub use history::{ChapterWords, GraphPoint, TrialPoint, WordTrialHistory, chronological, graph_points};
pub use sessions::{RECENT_SESSION_LIMIT, SessionDigest, phoneme_lookup, session_digests};
pub use summary::{ProgressSummary, ProgressTotals, SummaryStatistics, summarize_progress};

/// Rounds to one decimal place.
///
/// Works on the exact binary value, so `0.35` (stored just below) rounds
/// down; true ties such as `72.25` go to the even digit.
#[must_use]
pub fn round1(value: f64) -> f64 {
    format!("{value:.1}").parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::round1;

    #[test]
    fn round1_keeps_one_decimal() {
        assert_eq!(round1(58.666_666), 58.7);
        assert_eq!(round1(80.0), 80.0);
        assert_eq!(round1(0.04), 0.0);
        assert_eq!(round1(-1.26), -1.3);
    }

    #[test]
    fn round1_sends_ties_to_even_digit() {
        assert_eq!(round1(72.25), 72.2);
        assert_eq!(round1(72.75), 72.8);
        assert_eq!(round1(76.75), 76.8);
    }

    #[test]
    fn round1_uses_the_stored_binary_value() {
        assert_eq!(round1(0.35), 0.3);
        assert_eq!(round1(58.65), 58.6);
    }
}
