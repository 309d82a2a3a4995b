mod service;
mod view;

// Public API of the progress subsystem.
pub use crate::error::ProgressError;
pub use service::ProgressService;
pub use view::{PatientInfo, PatientSummaryReport, SessionRecord, TrialRecord};
