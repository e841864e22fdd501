mod schema;
pub mod faces;
pub mod images;
pub mod search;

use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::error::ArchiveResult;

pub use faces::{BoundingBox, Face, NewFace, Person};
pub use images::ImageRecord;
pub use schema::SCHEMA;
pub use search::SearchFilter;

/// Handle to the archive database.
///
/// Owns a single SQLite connection. File-backed databases remember their
/// path so they can be wiped and recreated by [`Database::reset`].
pub struct Database {
    pub(crate) conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    pub fn open(path: &Path) -> ArchiveResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> ArchiveResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, path: None })
    }

    pub fn initialize(&self) -> ArchiveResult<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Drop the database file and start over with an empty schema.
    ///
    /// In-memory databases are simply replaced by a fresh one. When a file
    /// cannot be removed the handle is still reopened with the schema in
    /// place before the error is returned.
    pub fn reset(&mut self) -> ArchiveResult<()> {
        let placeholder = Connection::open_in_memory()?;
        let old = std::mem::replace(&mut self.conn, placeholder);
        if let Err((conn, e)) = old.close() {
            self.conn = conn;
            return Err(e.into());
        }

        let Some(path) = self.path.clone() else {
            return self.initialize();
        };

        let mut removal = Ok(());
        for candidate in [path.clone(), sidecar(&path, "-journal"), sidecar(&path, "-wal"), sidecar(&path, "-shm")] {
            if !candidate.exists() {
                continue;
            }
            match std::fs::remove_file(&candidate) {
                Ok(()) => tracing::debug!(path = ?candidate, "Removed database file"),
                Err(e) => {
                    tracing::error!(path = ?candidate, error = %e, "Failed to remove database file");
                    if removal.is_ok() {
                        removal = Err(e);
                    }
                }
            }
        }

        match Connection::open(&path) {
            Ok(conn) => self.conn = conn,
            Err(e) => {
                // Keep serving from the in-memory placeholder
                self.initialize()?;
                return Err(e.into());
            }
        }
        self.initialize()?;
        removal.map_err(Into::into)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn memory_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    pub fn image(id: &str, uploaded_at: &str) -> ImageRecord {
        ImageRecord {
            id: id.to_string(),
            filename: format!("{}_photo.jpg", id),
            date_taken: None,
            place_taken: None,
            description: None,
            uploaded_at: uploaded_at.to_string(),
            width: Some(640),
            height: Some(480),
        }
    }

    pub fn face(index: u32) -> NewFace {
        NewFace {
            bbox: BoundingBox { x: index * 10, y: 5, width: 20, height: 20 },
            asset_path: format!("face{}.jpg", index),
        }
    }
}
