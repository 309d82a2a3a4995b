use std::sync::Arc;

use storage::repository::Storage;

use crate::error::AppServicesError;
use crate::progress::ProgressService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage) -> Self {
        Self {
            progress: Arc::new(ProgressService::from_storage(storage)),
        }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}
