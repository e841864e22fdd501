pub const SCHEMA: &str = r#"
-- Images: one row per uploaded original
CREATE TABLE IF NOT EXISTS images (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,       -- Stored file name inside the upload directory
    date_taken TEXT,              -- Free text, matched exactly by search
    place_taken TEXT,             -- Free text, matched by substring
    description TEXT,
    uploaded_at TEXT NOT NULL,    -- RFC 3339, UTC, fixed precision so it sorts lexically
    width INTEGER,
    height INTEGER
);

CREATE INDEX IF NOT EXISTS idx_images_uploaded_at ON images(uploaded_at);
CREATE INDEX IF NOT EXISTS idx_images_date_taken ON images(date_taken);

-- Faces: detected regions, each with its own cropped asset
CREATE TABLE IF NOT EXISTS faces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    image_id TEXT NOT NULL,
    bbox_x INTEGER NOT NULL,
    bbox_y INTEGER NOT NULL,
    bbox_w INTEGER NOT NULL,
    bbox_h INTEGER NOT NULL,
    asset_path TEXT NOT NULL,     -- File name inside the faces directory
    FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_faces_image ON faces(image_id);

-- People: named individuals, created lazily while tagging
CREATE TABLE IF NOT EXISTS people (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_people_name ON people(name);

-- Face to person mapping (many-to-many)
CREATE TABLE IF NOT EXISTS face_people (
    face_id INTEGER NOT NULL,
    person_id INTEGER NOT NULL,
    PRIMARY KEY (face_id, person_id),
    FOREIGN KEY (face_id) REFERENCES faces(id) ON DELETE CASCADE,
    FOREIGN KEY (person_id) REFERENCES people(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_face_people_person ON face_people(person_id);
"#;
