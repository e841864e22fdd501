//! Database functions for faces, people and the face/person associations.

use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;

use super::Database;
use crate::error::ArchiveResult;

/// Bounding box for a detected face, in source image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Clip the box to an image of the given size. Returns `None` when
    /// nothing of the box remains inside the image.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<BoundingBox> {
        if self.x >= image_width || self.y >= image_height {
            return None;
        }
        let width = self.width.min(image_width - self.x);
        let height = self.height.min(image_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(BoundingBox { x: self.x, y: self.y, width, height })
    }
}

/// A detected face in an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Face {
    pub id: i64,
    pub image_id: String,
    pub bbox: BoundingBox,
    pub asset_path: String,
}

/// A face about to be stored
#[derive(Debug, Clone)]
pub struct NewFace {
    pub bbox: BoundingBox,
    pub asset_path: String,
}

/// A named person
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
}

impl Database {
    // ========================================================================
    // People management
    // ========================================================================

    /// Create a new person
    pub fn create_person(&self, name: &str) -> ArchiveResult<i64> {
        self.conn.execute("INSERT INTO people (name) VALUES (?)", params![name])?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Find a person by exact (case-sensitive) name. The oldest row wins
    /// if duplicates exist.
    pub fn find_person_by_name(&self, name: &str) -> ArchiveResult<Option<Person>> {
        let person = self
            .conn
            .query_row(
                "SELECT id, name FROM people WHERE name = ? ORDER BY id LIMIT 1",
                [name],
                |row| Ok(Person { id: row.get(0)?, name: row.get(1)? }),
            )
            .optional()?;
        Ok(person)
    }

    /// Find an existing person by exact name, or create a new one
    pub fn find_or_create_person(&self, name: &str) -> ArchiveResult<i64> {
        if let Some(person) = self.find_person_by_name(name)? {
            Ok(person.id)
        } else {
            let id = self.create_person(name)?;
            tracing::debug!(person_id = id, name = %name, "Created person");
            Ok(id)
        }
    }

    pub fn get_person(&self, person_id: i64) -> ArchiveResult<Option<Person>> {
        let person = self
            .conn
            .query_row(
                "SELECT id, name FROM people WHERE id = ?",
                [person_id],
                |row| Ok(Person { id: row.get(0)?, name: row.get(1)? }),
            )
            .optional()?;
        Ok(person)
    }

    /// People whose name contains `fragment`, ignoring case
    pub fn find_people_matching(&self, fragment: &str) -> ArchiveResult<Vec<Person>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name
            FROM people
            WHERE instr(LOWER(name), LOWER(?)) > 0
            ORDER BY id
            "#,
        )?;

        let people = stmt
            .query_map([fragment], |row| {
                Ok(Person { id: row.get(0)?, name: row.get(1)? })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(people)
    }

    pub fn count_people(&self) -> ArchiveResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))?;
        Ok(count)
    }

    // ========================================================================
    // Face management
    // ========================================================================

    /// Store all faces of one image in a single transaction, keeping the
    /// given order. Returns the stored faces with their ids.
    pub fn insert_faces(&self, image_id: &str, faces: &[NewFace]) -> ArchiveResult<Vec<Face>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut stored = Vec::with_capacity(faces.len());

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO faces (image_id, bbox_x, bbox_y, bbox_w, bbox_h, asset_path)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )?;

            for face in faces {
                stmt.execute(params![
                    image_id,
                    face.bbox.x,
                    face.bbox.y,
                    face.bbox.width,
                    face.bbox.height,
                    face.asset_path,
                ])?;
                stored.push(Face {
                    id: tx.last_insert_rowid(),
                    image_id: image_id.to_string(),
                    bbox: face.bbox,
                    asset_path: face.asset_path.clone(),
                });
            }
        }

        tx.commit()?;
        Ok(stored)
    }

    /// Get all faces for an image, in detection order
    pub fn get_faces_for_image(&self, image_id: &str) -> ArchiveResult<Vec<Face>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, image_id, bbox_x, bbox_y, bbox_w, bbox_h, asset_path
            FROM faces
            WHERE image_id = ?
            ORDER BY id
            "#,
        )?;

        let faces = stmt
            .query_map([image_id], |row| {
                Ok(Face {
                    id: row.get(0)?,
                    image_id: row.get(1)?,
                    bbox: BoundingBox {
                        x: row.get(2)?,
                        y: row.get(3)?,
                        width: row.get(4)?,
                        height: row.get(5)?,
                    },
                    asset_path: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(faces)
    }

    pub fn count_faces_for_image(&self, image_id: &str) -> ArchiveResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM faces WHERE image_id = ?",
            [image_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_faces(&self) -> ArchiveResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM faces", [], |row| row.get(0))?;
        Ok(count)
    }

    // ========================================================================
    // Face/person associations
    // ========================================================================

    /// Replace every association of the image's faces with `assignments`.
    ///
    /// `assignments` pairs a face id with the names to attach to it; names
    /// must already be trimmed and non-empty. Face ids that do not belong
    /// to the image are skipped. Runs in one transaction.
    pub fn replace_face_tags(
        &self,
        image_id: &str,
        assignments: &[(i64, Vec<String>)],
    ) -> ArchiveResult<usize> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            r#"
            DELETE FROM face_people
            WHERE face_id IN (SELECT id FROM faces WHERE image_id = ?)
            "#,
            [image_id],
        )?;

        let mut associations = 0;
        for (face_id, names) in assignments {
            let owned: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM faces WHERE id = ? AND image_id = ?)",
                params![face_id, image_id],
                |row| row.get(0),
            )?;
            if !owned {
                tracing::debug!(face_id, image_id, "Skipping tags for face of another image");
                continue;
            }

            for name in names {
                // Same connection, so lookups see rows created earlier in this transaction
                let person_id = self.find_or_create_person(name)?;
                associations += tx.execute(
                    "INSERT OR IGNORE INTO face_people (face_id, person_id) VALUES (?, ?)",
                    params![face_id, person_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(associations)
    }

    /// Person names per face of an image, each list sorted by name.
    /// Faces without associations are absent from the map.
    pub fn names_by_face(&self, image_id: &str) -> ArchiveResult<BTreeMap<i64, Vec<String>>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT f.id, p.name
            FROM faces f
            JOIN face_people fp ON fp.face_id = f.id
            JOIN people p ON p.id = fp.person_id
            WHERE f.image_id = ?
            ORDER BY f.id, p.name
            "#,
        )?;

        let mut map: BTreeMap<i64, Vec<String>> = BTreeMap::new();
        let rows = stmt.query_map([image_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (face_id, name) = row?;
            map.entry(face_id).or_default().push(name);
        }

        Ok(map)
    }

    /// Sorted distinct person names appearing anywhere on an image
    pub fn people_names_for_image(&self, image_id: &str) -> ArchiveResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT p.name
            FROM faces f
            JOIN face_people fp ON fp.face_id = f.id
            JOIN people p ON p.id = fp.person_id
            WHERE f.image_id = ?
            ORDER BY p.name
            "#,
        )?;

        let names = stmt
            .query_map([image_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(names)
    }

    /// Faces of an image associated with the given person
    pub fn face_ids_for_person(&self, image_id: &str, person_id: i64) -> ArchiveResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT f.id
            FROM faces f
            JOIN face_people fp ON fp.face_id = f.id
            WHERE f.image_id = ? AND fp.person_id = ?
            ORDER BY f.id
            "#,
        )?;

        let ids = stmt
            .query_map(params![image_id, person_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;

        Ok(ids)
    }

    pub fn count_associations(&self) -> ArchiveResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM face_people", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn seeded() -> (Database, Vec<Face>) {
        let db = memory_db();
        db.insert_image(&image("img", "2024-01-01T00:00:00.000000Z")).unwrap();
        let faces = db.insert_faces("img", &[face(0), face(1)]).unwrap();
        (db, faces)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_faces_keeps_order() {
        let (db, faces) = seeded();
        let loaded = db.get_faces_for_image("img").unwrap();
        assert_eq!(loaded, faces);
        assert_eq!(loaded[0].bbox.x, 0);
        assert_eq!(loaded[1].bbox.x, 10);
        assert_eq!(db.count_faces_for_image("img").unwrap(), 2);
    }

    #[test]
    fn test_find_or_create_person_is_exact() {
        let db = memory_db();
        let alice = db.find_or_create_person("Alice").unwrap();
        assert_eq!(db.find_or_create_person("Alice").unwrap(), alice);
        assert_ne!(db.find_or_create_person("alice").unwrap(), alice);
        assert_eq!(db.count_people().unwrap(), 2);
    }

    #[test]
    fn test_find_people_matching_ignores_case() {
        let db = memory_db();
        db.create_person("Alice Smith").unwrap();
        db.create_person("Bob").unwrap();

        let found = db.find_people_matching("SMI").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Alice Smith");
        assert!(db.find_people_matching("zed").unwrap().is_empty());
    }

    #[test]
    fn test_replace_face_tags_is_full_replace() {
        let (db, faces) = seeded();

        db.replace_face_tags("img", &[(faces[0].id, names(&["Alice", "Bob"]))]).unwrap();
        assert_eq!(db.names_by_face("img").unwrap()[&faces[0].id], names(&["Alice", "Bob"]));

        db.replace_face_tags("img", &[(faces[0].id, names(&["Alice"]))]).unwrap();
        let map = db.names_by_face("img").unwrap();
        assert_eq!(map[&faces[0].id], names(&["Alice"]));
        assert_eq!(db.count_associations().unwrap(), 1);
    }

    #[test]
    fn test_replace_face_tags_dedups_within_face() {
        let (db, faces) = seeded();
        let added = db
            .replace_face_tags("img", &[(faces[0].id, names(&["Alice", "Alice"]))])
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(db.count_people().unwrap(), 1);
    }

    #[test]
    fn test_replace_face_tags_ignores_foreign_faces() {
        let (db, _) = seeded();
        db.insert_image(&image("other", "2024-01-02T00:00:00.000000Z")).unwrap();
        let other = db.insert_faces("other", &[face(0)]).unwrap();

        db.replace_face_tags("img", &[(other[0].id, names(&["Mallory"]))]).unwrap();
        assert!(db.names_by_face("other").unwrap().is_empty());
        assert_eq!(db.count_people().unwrap(), 0);
    }

    #[test]
    fn test_people_names_and_highlight() {
        let (db, faces) = seeded();
        db.replace_face_tags(
            "img",
            &[
                (faces[0].id, names(&["Carol", "Alice"])),
                (faces[1].id, names(&["Alice"])),
            ],
        )
        .unwrap();

        assert_eq!(db.people_names_for_image("img").unwrap(), names(&["Alice", "Carol"]));

        let alice = db.find_person_by_name("Alice").unwrap().unwrap();
        assert_eq!(
            db.face_ids_for_person("img", alice.id).unwrap(),
            vec![faces[0].id, faces[1].id]
        );
    }

    #[test]
    fn test_clamp_to_image() {
        let bbox = BoundingBox { x: 90, y: 10, width: 30, height: 30 };
        assert_eq!(
            bbox.clamp_to(100, 100),
            Some(BoundingBox { x: 90, y: 10, width: 10, height: 30 })
        );
        assert_eq!(bbox.clamp_to(90, 100), None);
        assert_eq!(BoundingBox { x: 0, y: 0, width: 0, height: 5 }.clamp_to(10, 10), None);
    }
}
