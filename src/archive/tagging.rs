use std::collections::HashMap;

use super::Archive;
use crate::error::{ArchiveError, ArchiveResult};

/// Split a comma separated list of names, dropping blanks.
pub(crate) fn parse_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

impl Archive {
    /// Replace the people tagged on every face of an image.
    ///
    /// `form` maps a face id (as decimal text) to a comma separated list of
    /// names. Faces of the image missing from the form lose all their tags.
    /// Returns the number of associations written.
    pub fn tag_faces(&self, image_id: &str, form: &HashMap<String, String>) -> ArchiveResult<usize> {
        let db = self.db()?;
        if db.get_image(image_id)?.is_none() {
            return Err(ArchiveError::NotFound(format!("image {}", image_id)));
        }

        let faces = db.get_faces_for_image(image_id)?;
        let assignments: Vec<(i64, Vec<String>)> = faces
            .iter()
            .map(|face| {
                let names = form
                    .get(&face.id.to_string())
                    .map(|raw| parse_names(raw))
                    .unwrap_or_default();
                (face.id, names)
            })
            .collect();

        for key in form.keys() {
            if !faces.iter().any(|face| face.id.to_string() == *key) {
                tracing::debug!(image_id, field = %key, "Ignoring form field that names no face of this image");
            }
        }

        let written = db.replace_face_tags(image_id, &assignments)?;
        tracing::info!(image_id, faces = faces.len(), associations = written, "Updated face tags");
        Ok(written)
    }
}
