use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding uploaded originals.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Directory holding cropped face assets.
    #[serde(default = "default_faces_dir")]
    pub faces_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    data_root().join("uploads")
}

fn default_faces_dir() -> PathBuf {
    data_root().join("faces")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            faces_dir: default_faces_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Largest accepted request body, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_listen_address() -> String {
    "127.0.0.1:5005".to_string()
}

fn default_max_upload_bytes() -> usize {
    32 * 1024 * 1024 // 32MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Local UltraFace model. When unset the model is downloaded into the
    /// data directory on first use.
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_model_url")]
    pub model_url: String,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    #[serde(default = "default_nms_threshold")]
    pub nms_threshold: f32,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_model_url() -> String {
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx".to_string()
}

fn default_confidence_threshold() -> f32 {
    0.7
}

fn default_nms_threshold() -> f32 {
    0.3
}

fn default_intra_threads() -> usize {
    4
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            model_url: default_model_url(),
            confidence_threshold: default_confidence_threshold(),
            nms_threshold: default_nms_threshold(),
            intra_threads: default_intra_threads(),
        }
    }
}

impl DetectorConfig {
    /// Where the detection model lives (or will be downloaded to).
    pub fn resolved_model_path(&self) -> PathBuf {
        self.model_path
            .clone()
            .unwrap_or_else(|| data_root().join("models").join("ultraface-320.onnx"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Fill a blank "date taken" from the EXIF DateTimeOriginal tag.
    #[serde(default = "default_exif_date_fallback")]
    pub exif_date_fallback: bool,
}

fn default_exif_date_fallback() -> bool {
    true
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            exif_date_fallback: default_exif_date_fallback(),
        }
    }
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bildarkiv")
}

fn default_db_path() -> PathBuf {
    data_root().join("bildarkiv.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            detector: DetectorConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bildarkiv")
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("BILDARKIV_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Configuration rooted in a single directory, used by tests and by
    /// throwaway instances.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            db_path: root.join("bildarkiv.db"),
            storage: StorageConfig {
                upload_dir: root.join("uploads"),
                faces_dir: root.join("faces"),
            },
            ..Self::default()
        }
    }
}
