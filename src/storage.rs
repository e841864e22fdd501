use std::fs;
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::error::{ArchiveError, ArchiveResult};

/// Manages the two asset directories: uploaded originals and face crops
#[derive(Debug, Clone)]
pub struct AssetStore {
    upload_dir: PathBuf,
    faces_dir: PathBuf,
}

/// Result of wiping the asset directories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WipeResult {
    pub files_deleted: usize,
    pub files_failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Original,
    Face,
}

impl AssetStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            faces_dir: config.faces_dir.clone(),
        }
    }

    /// Ensure both asset directories exist
    pub fn ensure_dirs(&self) -> ArchiveResult<()> {
        fs::create_dir_all(&self.upload_dir)?;
        fs::create_dir_all(&self.faces_dir)?;
        Ok(())
    }

    fn dir(&self, kind: AssetKind) -> &Path {
        match kind {
            AssetKind::Original => &self.upload_dir,
            AssetKind::Face => &self.faces_dir,
        }
    }

    /// Stored name of an uploaded original
    pub fn original_name(image_id: &str, client_filename: &str) -> String {
        format!("{}_{}", image_id, sanitize_filename(client_filename))
    }

    /// Stored name of the crop for the `index`-th detected face
    pub fn face_name(image_id: &str, index: usize) -> String {
        format!("{}_face{}.jpg", image_id, index)
    }

    pub fn path_of(&self, kind: AssetKind, name: &str) -> PathBuf {
        self.dir(kind).join(name)
    }

    /// Write an uploaded original, returning its full path
    pub fn save_original(&self, name: &str, bytes: &[u8]) -> ArchiveResult<PathBuf> {
        fs::create_dir_all(&self.upload_dir)?;
        let path = self.path_of(AssetKind::Original, name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Look up a stored asset by exact file name.
    ///
    /// Only a single plain path component is accepted, so requests can
    /// never reach outside the asset directory.
    pub fn resolve(&self, kind: AssetKind, name: &str) -> ArchiveResult<PathBuf> {
        let mut components = Path::new(name).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(std::path::Component::Normal(c)), None) if c == name
        );
        if !plain || name.contains('\\') {
            return Err(ArchiveError::NotFound(format!("file {}", name)));
        }

        let path = self.path_of(kind, name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ArchiveError::NotFound(format!("file {}", name)))
        }
    }

    /// Delete every regular file in both asset directories.
    /// Failures are logged and counted; they never abort the wipe.
    pub fn wipe(&self) -> WipeResult {
        let mut result = WipeResult::default();

        for dir in [&self.upload_dir, &self.faces_dir] {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(dir = ?dir, error = %e, "Failed to list asset directory");
                    result.files_failed += 1;
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(_) => result.files_deleted += 1,
                    Err(e) => {
                        tracing::warn!(path = ?path, error = %e, "Failed to delete asset");
                        result.files_failed += 1;
                    }
                }
            }
        }

        result
    }
}

/// Reduce a client-supplied file name to a safe, flat ASCII name.
///
/// Path separators become word breaks, whitespace runs become `_`, and
/// anything outside `[A-Za-z0-9_.-]` is dropped. Non-ASCII letters are
/// dropped as well, not transliterated. Leading and trailing
/// dots and underscores are stripped. Falls back to `image`.
pub fn sanitize_filename(filename: &str) -> String {
    let spaced: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .filter(|c| c.is_ascii())
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path) -> AssetStore {
        AssetStore::new(&StorageConfig {
            upload_dir: root.join("uploads"),
            faces_dir: root.join("faces"),
        })
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My cool photo.jpg"), "My_cool_photo.jpg");
        assert_eq!(sanitize_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\pic.png"), "C_Users_me_pic.png");
        assert_eq!(sanitize_filename("bad<>|name?.jpg"), "badname.jpg");
        assert_eq!(sanitize_filename("blåbær.jpg"), "blbr.jpg");
        assert_eq!(sanitize_filename("..."), "image");
    }

    #[test]
    fn test_asset_names() {
        assert_eq!(AssetStore::original_name("abc", "a b.jpg"), "abc_a_b.jpg");
        assert_eq!(AssetStore::face_name("abc", 2), "abc_face2.jpg");
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_dirs().unwrap();
        store.save_original("x_photo.jpg", b"data").unwrap();

        assert!(store.resolve(AssetKind::Original, "x_photo.jpg").is_ok());
        assert!(matches!(
            store.resolve(AssetKind::Original, "../uploads/x_photo.jpg"),
            Err(ArchiveError::NotFound(_))
        ));
        assert!(matches!(
            store.resolve(AssetKind::Original, ".."),
            Err(ArchiveError::NotFound(_))
        ));
        assert!(matches!(
            store.resolve(AssetKind::Face, "x_photo.jpg"),
            Err(ArchiveError::NotFound(_))
        ));
    }

    #[test]
    fn test_wipe_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_dirs().unwrap();
        store.save_original("a.jpg", b"1").unwrap();
        fs::write(store.path_of(AssetKind::Face, "a_face0.jpg"), b"2").unwrap();

        let result = store.wipe();
        assert_eq!(result, WipeResult { files_deleted: 2, files_failed: 0 });
        assert!(store.resolve(AssetKind::Original, "a.jpg").is_err());
        assert!(dir.path().join("uploads").is_dir());
    }

    #[test]
    fn test_wipe_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let result = store(&dir.path().join("never-created")).wipe();
        assert_eq!(result, WipeResult::default());
    }
}
