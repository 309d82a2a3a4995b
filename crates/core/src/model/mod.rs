mod chapter;
mod ids;
mod patient;
mod session;
mod trial;

pub use ids::{ChapterNumber, DoctorId, ParseIdError, PatientId, WordId};

pub use chapter::{Chapter, ChapterError, PhonemeLabel, Word};
pub use patient::{Gender, Patient, PatientError};
pub use session::{SessionEntryError, SessionHistoryEntry};
pub use trial::{COMPLETION_ACCURACY, Trial, TrialError};
