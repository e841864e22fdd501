//! Archive search over people, dates and places.

use rusqlite::params;
use serde::Serialize;
use std::collections::HashSet;

use super::images::image_from_row;
use super::{Database, ImageRecord};
use crate::error::ArchiveResult;

/// Normalized search filters. `None` means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchFilter {
    pub person_name: Option<String>,
    pub date_taken: Option<String>,
    pub place_taken: Option<String>,
}

impl SearchFilter {
    /// Build a filter from raw form values; blank values are treated as absent.
    pub fn from_form(
        person_name: Option<&str>,
        date_taken: Option<&str>,
        place_taken: Option<&str>,
    ) -> Self {
        fn clean(value: Option<&str>) -> Option<String> {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        Self {
            person_name: clean(person_name),
            date_taken: clean(date_taken),
            place_taken: clean(place_taken),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.person_name.is_none() && self.date_taken.is_none() && self.place_taken.is_none()
    }
}

impl Database {
    /// Images matching the date and place parts of `filter`, newest upload first.
    pub fn images_matching(&self, filter: &SearchFilter) -> ArchiveResult<Vec<ImageRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, filename, date_taken, place_taken, description, uploaded_at, width, height
            FROM images
            WHERE (?1 IS NULL OR date_taken = ?1)
              AND (?2 IS NULL OR instr(LOWER(COALESCE(place_taken, '')), LOWER(?2)) > 0)
            ORDER BY uploaded_at DESC, rowid DESC
            "#,
        )?;

        let images = stmt
            .query_map(params![filter.date_taken, filter.place_taken], image_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(images)
    }

    /// Ids of images with at least one face associated with any of `person_ids`.
    pub fn image_ids_with_people(&self, person_ids: &[i64]) -> ArchiveResult<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT f.image_id
            FROM faces f
            JOIN face_people fp ON fp.face_id = f.id
            WHERE fp.person_id = ?
            "#,
        )?;

        let mut ids = HashSet::new();
        for person_id in person_ids {
            let rows = stmt.query_map([person_id], |row| row.get::<_, String>(0))?;
            for row in rows {
                ids.insert(row?);
            }
        }

        Ok(ids)
    }
}
