use super::Archive;
use crate::error::{ArchiveError, ArchiveResult};
use crate::storage::WipeResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetOutcome {
    pub files: WipeResult,
}

impl ResetOutcome {
    /// One-line message for the user
    pub fn notice(&self) -> String {
        let mut notice = format!(
            "Archive reset. Deleted {} file(s).",
            self.files.files_deleted
        );
        if self.files.files_failed > 0 {
            notice.push_str(&format!(
                " {} file(s) could not be deleted.",
                self.files.files_failed
            ));
        }
        notice
    }
}

impl Archive {
    /// Delete every record and every stored file.
    ///
    /// The database file is removed and recreated empty. Asset deletion is
    /// best effort: files that cannot be removed are counted, not fatal.
    pub fn reset(&self) -> ArchiveResult<ResetOutcome> {
        {
            let mut db = self.db()?;
            db.reset()
                .map_err(|e| ArchiveError::Storage(format!("could not recreate database: {}", e)))?;
        }

        let files = self.store.wipe();
        self.store
            .ensure_dirs()
            .map_err(|e| ArchiveError::Storage(format!("could not recreate asset directories: {}", e)))?;

        tracing::warn!(
            files_deleted = files.files_deleted,
            files_failed = files.files_failed,
            "Archive reset"
        );
        Ok(ResetOutcome { files })
    }
}
