//! The photo archive service.
//!
//! Every user-facing operation lives here as a plain synchronous method on
//! [`Archive`]. The web layer only parses requests, hands them to these
//! methods on a blocking thread and renders what comes back.

mod query;
mod reset;
mod tagging;
mod upload;

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::Config;
use crate::db::{BoundingBox, Database, Face};
use crate::error::{ArchiveError, ArchiveResult};
use crate::faces::{FaceDetector, FaceProcessor};
use crate::storage::AssetStore;

pub use query::{ImageDetail, ImageSummary, SearchOutcome};
pub use reset::ResetOutcome;
pub use upload::{UploadOutcome, UploadRequest, UploadedFile};

pub struct Archive {
    config: Config,
    db: Mutex<Database>,
    store: AssetStore,
    processor: FaceProcessor,
}

/// A face as shown to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaceView {
    pub id: i64,
    pub bbox: BoundingBox,
    pub asset_url: String,
}

impl From<&Face> for FaceView {
    fn from(face: &Face) -> Self {
        Self {
            id: face.id,
            bbox: face.bbox,
            asset_url: face_url(&face.asset_path),
        }
    }
}

pub fn upload_url(filename: &str) -> String {
    format!("/uploads/{}", filename)
}

pub fn face_url(filename: &str) -> String {
    format!("/faces/{}", filename)
}

impl Archive {
    /// Open the database and asset directories described by `config`.
    pub fn open(config: Config, detector: Arc<dyn FaceDetector>) -> ArchiveResult<Self> {
        let db = Database::open(&config.db_path)?;
        db.initialize()?;

        let store = AssetStore::new(&config.storage);
        store.ensure_dirs()?;

        tracing::info!(
            db = ?db.path(),
            uploads = ?config.storage.upload_dir,
            faces = ?config.storage.faces_dir,
            "Archive opened"
        );

        Ok(Self {
            processor: FaceProcessor::new(detector, store.clone()),
            db: Mutex::new(db),
            store,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    fn db(&self) -> ArchiveResult<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| ArchiveError::Storage("database lock poisoned".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;
    use std::sync::Arc;

    use super::*;
    use crate::faces::processor::test_support::ScriptedDetector;

    pub fn archive_with(dir: &std::path::Path, detector: Arc<dyn FaceDetector>) -> Archive {
        Archive::open(Config::rooted_at(dir), detector).unwrap()
    }

    pub fn archive_detecting(dir: &std::path::Path, boxes: Vec<BoundingBox>) -> Archive {
        archive_with(dir, Arc::new(ScriptedDetector(boxes)))
    }

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::new_rgb8(width, height)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    pub fn upload(filename: &str, place: Option<&str>, date: Option<&str>) -> UploadRequest {
        UploadRequest {
            file: Some(UploadedFile {
                filename: filename.to_string(),
                bytes: png_bytes(64, 48),
            }),
            date_taken: date.map(str::to_string),
            place_taken: place.map(str::to_string),
            description: None,
        }
    }

    pub fn bbox(x: u32, y: u32, width: u32, height: u32) -> BoundingBox {
        BoundingBox { x, y, width, height }
    }
}
