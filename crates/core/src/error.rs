use thiserror::Error;

use crate::model::{ChapterError, PatientError, SessionEntryError, TrialError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Patient(#[from] PatientError),
    #[error(transparent)]
    Chapter(#[from] ChapterError),
    #[error(transparent)]
    Trial(#[from] TrialError),
    #[error(transparent)]
    Session(#[from] SessionEntryError),
}
