use chrono::{SecondsFormat, Utc};
use image::ImageReader;
use serde::Serialize;
use uuid::Uuid;

use super::{upload_url, Archive, FaceView};
use crate::db::ImageRecord;
use crate::error::{ArchiveError, ArchiveResult};
use crate::metadata;
use crate::storage::AssetStore;

/// The file part of an upload form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A parsed upload form
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub file: Option<UploadedFile>,
    pub date_taken: Option<String>,
    pub place_taken: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub image: ImageRecord,
    pub image_url: String,
    pub faces: Vec<FaceView>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Archive {
    /// Store an uploaded photo, detect its faces and store one crop per face.
    ///
    /// The image row is committed before the file is decoded. If decoding
    /// or detection fails the row and the original stay behind as an image
    /// without faces.
    pub fn upload(&self, request: UploadRequest) -> ArchiveResult<UploadOutcome> {
        let file = request
            .file
            .ok_or_else(|| ArchiveError::Validation("no file part in the request".to_string()))?;
        if file.filename.trim().is_empty() {
            return Err(ArchiveError::Validation("no file selected".to_string()));
        }
        if file.bytes.is_empty() {
            return Err(ArchiveError::Validation(format!("{} is empty", file.filename)));
        }

        let image_id = Uuid::new_v4().simple().to_string();
        let stored_name = AssetStore::original_name(&image_id, &file.filename);
        let path = self.store.save_original(&stored_name, &file.bytes)?;

        let mut date_taken = non_blank(request.date_taken);
        if date_taken.is_none() && self.config.metadata.exif_date_fallback {
            date_taken = metadata::exif_date_taken(&file.bytes);
        }

        // Header only; the full decode happens after the row is committed
        let dimensions = ImageReader::open(&path)
            .and_then(|reader| reader.with_guessed_format())
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());

        let record = ImageRecord {
            id: image_id.clone(),
            filename: stored_name,
            date_taken,
            place_taken: non_blank(request.place_taken),
            description: non_blank(request.description),
            uploaded_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
        };

        self.db()?.insert_image(&record)?;
        tracing::info!(
            image_id = %image_id,
            filename = %record.filename,
            dimensions = ?dimensions,
            "Stored upload"
        );

        let img = ImageReader::open(&path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| {
                tracing::warn!(image_id = %image_id, error = %e, "Upload could not be decoded; image kept without faces");
                ArchiveError::Image(e)
            })?;

        let new_faces = self.processor.process_image(&image_id, &img).map_err(|e| {
            tracing::warn!(image_id = %image_id, error = %e, "Face processing failed; image kept without faces");
            e
        })?;
        let faces = self.db()?.insert_faces(&image_id, &new_faces)?;
        tracing::info!(image_id = %image_id, faces = faces.len(), "Stored detected faces");

        Ok(UploadOutcome {
            image_url: upload_url(&record.filename),
            image: record,
            faces: faces.iter().map(FaceView::from).collect(),
        })
    }
}
