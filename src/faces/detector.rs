use anyhow::{anyhow, Result};
use image::{DynamicImage, GenericImageView};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use crate::config::DetectorConfig;
use crate::db::BoundingBox;

/// Finds face rectangles in an image.
///
/// Implementations are synchronous and may be slow; callers run them off
/// the async executor. Rectangles are returned in detection order.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, img: &DynamicImage) -> Result<Vec<BoundingBox>>;
}

/// UltraFace (RFB-320) detector running on ONNX Runtime.
///
/// The model session is created on first use, downloading the model file
/// when it is not present yet.
pub struct UltraFaceDetector {
    config: DetectorConfig,
    session: OnceLock<Mutex<Session>>,
}

impl UltraFaceDetector {
    const INPUT_WIDTH: u32 = 320;
    const INPUT_HEIGHT: u32 = 240;

    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            session: OnceLock::new(),
        }
    }

    fn session(&self) -> Result<&Mutex<Session>> {
        if let Some(session) = self.session.get() {
            return Ok(session);
        }

        let model_path = ensure_model(&self.config.resolved_model_path(), &self.config.model_url)?;
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.config.intra_threads)?
            .commit_from_file(&model_path)?;
        tracing::info!(model = ?model_path, "Face detection model loaded");

        // A concurrent first call may have won the race; either session is fine
        let _ = self.session.set(Mutex::new(session));
        self.session
            .get()
            .ok_or_else(|| anyhow!("Detection model not initialized"))
    }

    fn run(&self, session: &mut Session, img: &DynamicImage) -> Result<Vec<(BoundingBox, f32)>> {
        let (orig_width, orig_height) = img.dimensions();
        let (w, h) = (Self::INPUT_WIDTH as usize, Self::INPUT_HEIGHT as usize);

        let resized = img.resize_exact(
            Self::INPUT_WIDTH,
            Self::INPUT_HEIGHT,
            image::imageops::FilterType::Triangle,
        );
        let rgb = resized.to_rgb8();

        // NCHW, normalized to roughly [-1, 1]
        let mut input_data = vec![0.0f32; 3 * h * w];
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let idx = y as usize * w + x as usize;
            input_data[idx] = (pixel[0] as f32 - 127.0) / 128.0;
            input_data[h * w + idx] = (pixel[1] as f32 - 127.0) / 128.0;
            input_data[2 * h * w + idx] = (pixel[2] as f32 - 127.0) / 128.0;
        }

        let input_tensor = Tensor::from_array(([1usize, 3, h, w], input_data.into_boxed_slice()))?;
        let outputs = session.run(ort::inputs!["input" => input_tensor])?;

        let scores_value = outputs.get("scores")
            .ok_or_else(|| anyhow!("No scores output"))?;
        let boxes_value = outputs.get("boxes")
            .ok_or_else(|| anyhow!("No boxes output"))?;

        let (scores_shape, scores_data) = scores_value.try_extract_tensor::<f32>()?;
        let (_boxes_shape, boxes_data) = boxes_value.try_extract_tensor::<f32>()?;

        // scores: [1, anchors, 2] (background, face)
        // boxes:  [1, anchors, 4] (x1, y1, x2, y2 normalized)
        let num_anchors = scores_shape[1] as usize;
        let mut candidates = Vec::new();

        for i in 0..num_anchors {
            let confidence = scores_data[i * 2 + 1];
            if confidence <= self.config.confidence_threshold {
                continue;
            }

            let x1 = (boxes_data[i * 4] * orig_width as f32).max(0.0);
            let y1 = (boxes_data[i * 4 + 1] * orig_height as f32).max(0.0);
            let x2 = (boxes_data[i * 4 + 2] * orig_width as f32).max(0.0);
            let y2 = (boxes_data[i * 4 + 3] * orig_height as f32).max(0.0);

            let bbox = BoundingBox {
                x: x1 as u32,
                y: y1 as u32,
                width: ((x2 - x1) as u32).max(1),
                height: ((y2 - y1) as u32).max(1),
            };

            if let Some(bbox) = bbox.clamp_to(orig_width, orig_height) {
                candidates.push((bbox, confidence));
            }
        }

        Ok(nms(candidates, self.config.nms_threshold))
    }
}

impl FaceDetector for UltraFaceDetector {
    fn detect(&self, img: &DynamicImage) -> Result<Vec<BoundingBox>> {
        let mut session = self.session()?
            .lock()
            .map_err(|e| anyhow!("Failed to lock detection model: {}", e))?;

        let faces = self.run(&mut *session, img)?;
        tracing::debug!(count = faces.len(), "Faces detected");

        Ok(faces.into_iter().map(|(bbox, _)| bbox).collect())
    }
}

/// Download the model file if it doesn't exist
fn ensure_model(model_path: &Path, url: &str) -> Result<PathBuf> {
    if !model_path.exists() {
        if let Some(parent) = model_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(url = %url, "Downloading face detection model...");
        let response = ureq::get(url)
            .call()
            .map_err(|e| anyhow!("Failed to download model: {}", e))?;

        let mut file = std::fs::File::create(model_path)?;
        std::io::copy(&mut response.into_reader(), &mut file)?;
        tracing::info!(path = ?model_path, "Model downloaded");
    }

    Ok(model_path.to_path_buf())
}

/// Non-maximum suppression. Keeps the most confident of each group of
/// overlapping boxes; output is ordered by descending confidence.
fn nms(mut boxes: Vec<(BoundingBox, f32)>, threshold: f32) -> Vec<(BoundingBox, f32)> {
    boxes.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep: Vec<(BoundingBox, f32)> = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(boxes[i]);

        for j in (i + 1)..boxes.len() {
            if !suppressed[j] && compute_iou(&boxes[i].0, &boxes[j].0) > threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Intersection over Union of two boxes
fn compute_iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x) as i64;
    let y1 = a.y.max(b.y) as i64;
    let x2 = (a.x + a.width).min(b.x + b.width) as i64;
    let y2 = (a.y + a.height).min(b.y + b.height) as i64;

    let intersection = ((x2 - x1).max(0) * (y2 - y1).max(0)) as f32;
    let union = a.area() as f32 + b.area() as f32 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: u32, y: u32, width: u32, height: u32) -> BoundingBox {
        BoundingBox { x, y, width, height }
    }

    #[test]
    fn test_iou() {
        let a = bbox(0, 0, 10, 10);
        assert!((compute_iou(&a, &a) - 1.0).abs() < 0.001);

        let c = bbox(20, 20, 10, 10);
        assert!((compute_iou(&a, &c) - 0.0).abs() < 0.001);

        let half = bbox(5, 0, 10, 10);
        assert!((compute_iou(&a, &half) - 50.0 / 150.0).abs() < 0.001);
    }

    #[test]
    fn test_nms_keeps_best_of_overlap() {
        let boxes = vec![
            (bbox(0, 0, 10, 10), 0.8),
            (bbox(1, 1, 10, 10), 0.95),
            (bbox(50, 50, 10, 10), 0.75),
        ];

        let kept = nms(boxes, 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].0, bbox(1, 1, 10, 10));
        assert_eq!(kept[1].0, bbox(50, 50, 10, 10));
    }

    #[test]
    fn test_ensure_model_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"weights").unwrap();

        // An unreachable URL proves no download is attempted
        let resolved = ensure_model(&path, "http://127.0.0.1:9/never").unwrap();
        assert_eq!(resolved, path);
        assert_eq!(std::fs::read(&path).unwrap(), b"weights");
    }
}
