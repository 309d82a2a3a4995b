use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::ids::{ChapterNumber, WordId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChapterError {
    #[error("chapter name cannot be empty")]
    EmptyName,

    #[error("word text cannot be empty")]
    EmptyWord,

    #[error("word {word} belongs to chapter {found}, not chapter {expected}")]
    ForeignWord {
        word: WordId,
        expected: ChapterNumber,
        found: ChapterNumber,
    },

    #[error("word {0} appears more than once")]
    DuplicateWord(WordId),
}

//
// ─── PHONEME LABEL ─────────────────────────────────────────────────────────────
//

/// Display tag for a chapter, formatted as `/x/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhonemeLabel(String);

impl PhonemeLabel {
    /// Derives the label from the first character of a chapter name,
    /// lower-cased (`"P Sound"` → `/p/`).
    ///
    /// Returns `None` for an empty name.
    #[must_use]
    pub fn from_chapter_name(name: &str) -> Option<Self> {
        let first = name.chars().next()?;
        Some(Self(format!("/{}/", first.to_lowercase())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhonemeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── WORD ──────────────────────────────────────────────────────────────────────
//

/// A practice word. `order` gives its position inside the chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    id: WordId,
    chapter: ChapterNumber,
    text: String,
    order: i32,
}

impl Word {
    /// # Errors
    ///
    /// Returns `ChapterError::EmptyWord` if the text is blank.
    pub fn new(
        id: WordId,
        chapter: ChapterNumber,
        text: impl Into<String>,
        order: i32,
    ) -> Result<Self, ChapterError> {
        let text = text.into().trim().to_owned();
        if text.is_empty() {
            return Err(ChapterError::EmptyWord);
        }
        Ok(Self {
            id,
            chapter,
            text,
            order,
        })
    }

    #[must_use]
    pub fn id(&self) -> WordId {
        self.id
    }

    #[must_use]
    pub fn chapter(&self) -> ChapterNumber {
        self.chapter
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn order(&self) -> i32 {
        self.order
    }
}

//
// ─── CHAPTER ───────────────────────────────────────────────────────────────────
//

/// A themed unit of practice words, usually one phoneme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    number: ChapterNumber,
    name: String,
    words: Vec<Word>,
}

impl Chapter {
    /// Builds a chapter and sorts its words by `order`, then by id.
    ///
    /// # Errors
    ///
    /// Returns `ChapterError::EmptyName` for a blank name,
    /// `ChapterError::ForeignWord` when a word points at another chapter, and
    /// `ChapterError::DuplicateWord` when the same word id is given twice.
    pub fn new(
        number: ChapterNumber,
        name: impl Into<String>,
        mut words: Vec<Word>,
    ) -> Result<Self, ChapterError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(ChapterError::EmptyName);
        }
        if let Some(word) = words.iter().find(|w| w.chapter != number) {
            return Err(ChapterError::ForeignWord {
                word: word.id,
                expected: number,
                found: word.chapter,
            });
        }

        words.sort_by_key(|w| (w.order, w.id));
        if let Some(id) = first_duplicate(&words) {
            return Err(ChapterError::DuplicateWord(id));
        }

        Ok(Self {
            number,
            name,
            words,
        })
    }

    #[must_use]
    pub fn number(&self) -> ChapterNumber {
        self.number
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Words in chapter order.
    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    #[must_use]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    #[must_use]
    pub fn word_ids(&self) -> Vec<WordId> {
        self.words.iter().map(Word::id).collect()
    }

    #[must_use]
    pub fn find_word(&self, text: &str) -> Option<&Word> {
        self.words.iter().find(|w| w.text == text)
    }

    /// Phoneme label derived from the chapter name.
    #[must_use]
    pub fn phoneme_label(&self) -> PhonemeLabel {
        // name is validated non-empty on construction
        PhonemeLabel::from_chapter_name(&self.name)
            .unwrap_or_else(|| PhonemeLabel(String::from("//")))
    }

    /// The first `limit` words, in chapter order.
    #[must_use]
    pub fn example_words(&self, limit: usize) -> Vec<String> {
        self.words
            .iter()
            .take(limit)
            .map(|w| w.text.clone())
            .collect()
    }
}

fn first_duplicate(words: &[Word]) -> Option<WordId> {
    let mut seen = HashSet::with_capacity(words.len());
    words.iter().map(Word::id).find(|id| !seen.insert(*id))
}
