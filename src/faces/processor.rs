use image::{DynamicImage, GenericImageView, ImageFormat};
use std::sync::Arc;

use super::detector::FaceDetector;
use crate::db::{BoundingBox, NewFace};
use crate::error::{ArchiveError, ArchiveResult};
use crate::storage::{AssetKind, AssetStore};

/// Runs detection on an uploaded image and writes one crop per face.
pub struct FaceProcessor {
    detector: Arc<dyn FaceDetector>,
    store: AssetStore,
}

impl FaceProcessor {
    pub fn new(detector: Arc<dyn FaceDetector>, store: AssetStore) -> Self {
        Self { detector, store }
    }

    /// Detect faces in `img`.
    /// Boxes are clipped to the image; boxes entirely outside it are dropped.
    pub fn detect(&self, img: &DynamicImage) -> ArchiveResult<Vec<(usize, BoundingBox)>> {
        let (width, height) = img.dimensions();
        let boxes = self.detector.detect(img).map_err(ArchiveError::Detection)?;

        Ok(boxes
            .into_iter()
            .enumerate()
            .filter_map(|(index, bbox)| match bbox.clamp_to(width, height) {
                Some(clamped) => Some((index, clamped)),
                None => {
                    tracing::warn!(index, ?bbox, width, height, "Dropping face outside image bounds");
                    None
                }
            })
            .collect())
    }

    /// Detect faces and write one crop per face, in detection order.
    ///
    /// Returns the faces ready to be stored; the caller commits them once
    /// every crop is on disk.
    pub fn process_image(&self, image_id: &str, img: &DynamicImage) -> ArchiveResult<Vec<NewFace>> {
        let detected = self.detect(img)?;
        let mut new_faces = Vec::with_capacity(detected.len());

        for (index, bbox) in detected {
            let name = AssetStore::face_name(image_id, index);
            let crop = img.crop_imm(bbox.x, bbox.y, bbox.width, bbox.height);

            // JPEG has no alpha channel
            DynamicImage::ImageRgb8(crop.to_rgb8())
                .save_with_format(self.store.path_of(AssetKind::Face, &name), ImageFormat::Jpeg)?;

            new_faces.push(NewFace { bbox, asset_path: name });
        }

        tracing::debug!(image_id, faces = new_faces.len(), "Wrote face crops");
        Ok(new_faces)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use anyhow::{anyhow, Result};
    use image::DynamicImage;

    use super::FaceDetector;
    use crate::db::BoundingBox;

    /// Detector returning a fixed list of boxes for every image
    pub struct ScriptedDetector(pub Vec<BoundingBox>);

    impl FaceDetector for ScriptedDetector {
        fn detect(&self, _img: &DynamicImage) -> Result<Vec<BoundingBox>> {
            Ok(self.0.clone())
        }
    }

    /// Detector that always fails
    pub struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&self, _img: &DynamicImage) -> Result<Vec<BoundingBox>> {
            Err(anyhow!("model crashed"))
        }
    }
}
