//! Image rows.

use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use super::Database;
use crate::error::ArchiveResult;

/// One uploaded original and its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub id: String,
    pub filename: String,
    pub date_taken: Option<String>,
    pub place_taken: Option<String>,
    pub description: Option<String>,
    pub uploaded_at: String,
    /// Pixel size read from the file header; unknown for unreadable files
    pub width: Option<u32>,
    pub height: Option<u32>,
}

const IMAGE_COLUMNS: &str =
    "id, filename, date_taken, place_taken, description, uploaded_at, width, height";

pub(crate) fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        date_taken: row.get(2)?,
        place_taken: row.get(3)?,
        description: row.get(4)?,
        uploaded_at: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
    })
}

impl Database {
    pub fn insert_image(&self, image: &ImageRecord) -> ArchiveResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO images (id, filename, date_taken, place_taken, description, uploaded_at, width, height)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                image.id,
                image.filename,
                image.date_taken,
                image.place_taken,
                image.description,
                image.uploaded_at,
                image.width,
                image.height,
            ],
        )?;
        Ok(())
    }

    pub fn get_image(&self, image_id: &str) -> ArchiveResult<Option<ImageRecord>> {
        let sql = format!("SELECT {} FROM images WHERE id = ?", IMAGE_COLUMNS);
        let image = self
            .conn
            .query_row(&sql, [image_id], image_from_row)
            .optional()?;
        Ok(image)
    }

    /// All images, newest upload first.
    pub fn list_images(&self) -> ArchiveResult<Vec<ImageRecord>> {
        let sql = format!(
            "SELECT {} FROM images ORDER BY uploaded_at DESC, rowid DESC",
            IMAGE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let images = stmt
            .query_map([], image_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }

    pub fn count_images(&self) -> ArchiveResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;

    #[test]
    fn test_insert_and_get() {
        let db = memory_db();
        let mut record = image("abc", "2024-03-01T10:00:00.000000Z");
        record.place_taken = Some("Bergen".to_string());
        db.insert_image(&record).unwrap();

        assert_eq!(db.get_image("abc").unwrap(), Some(record));
        assert_eq!(db.get_image("missing").unwrap(), None);
    }

    #[test]
    fn test_list_newest_first() {
        let db = memory_db();
        db.insert_image(&image("old", "2024-01-01T00:00:00.000000Z")).unwrap();
        db.insert_image(&image("new", "2024-06-01T00:00:00.000000Z")).unwrap();
        db.insert_image(&image("mid", "2024-03-01T00:00:00.000000Z")).unwrap();

        let ids: Vec<String> = db.list_images().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_same_timestamp_keeps_insertion_order_reversed() {
        let db = memory_db();
        db.insert_image(&image("first", "2024-01-01T00:00:00.000000Z")).unwrap();
        db.insert_image(&image("second", "2024-01-01T00:00:00.000000Z")).unwrap();

        let ids: Vec<String> = db.list_images().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["second", "first"]);
    }
}
