//! Export job specification and report.
//!
//! A job spec is a JSON document describing one export: where the stroke
//! input lives, where assets go, and how textures and degenerate geometry are
//! handled. The report records what an export produced.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset_store::AssetRecord;
use crate::error::{ExportError, Result};
use crate::ribbon::GeometryMode;
use crate::texture::DEFAULT_FETCH_TIMEOUT;

/// Default export file name prefix.
fn default_file_prefix() -> String {
    "wrap".to_string()
}

fn default_first_file_number() -> u32 {
    1
}

fn default_use_textures() -> bool {
    true
}

fn default_fetch_timeout_secs() -> f32 {
    DEFAULT_FETCH_TIMEOUT.as_secs_f32()
}

/// Timeout for the whole texture upload join in seconds.
fn default_upload_timeout_secs() -> f32 {
    60.0
}

/// Specification for a single export job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobSpec {
    /// JSON file with either stroke records or polyline entities.
    pub strokes_path: PathBuf,

    /// Directory that receives the OBJ, MTL and textures.
    pub output_dir: PathBuf,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Number used for the first exported file name.
    #[serde(default = "default_first_file_number")]
    pub first_file_number: u32,

    /// Write a material library and re-host stroke textures.
    #[serde(default = "default_use_textures")]
    pub use_textures: bool,

    #[serde(default)]
    pub geometry_mode: GeometryMode,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: f32,

    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: f32,
}

impl ExportJobSpec {
    /// Create a job spec with required fields only.
    pub fn new(strokes_path: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            strokes_path,
            output_dir,
            file_prefix: default_file_prefix(),
            first_file_number: default_first_file_number(),
            use_textures: default_use_textures(),
            geometry_mode: GeometryMode::default(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            upload_timeout_secs: default_upload_timeout_secs(),
        }
    }

    /// Load a job spec from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Validate the job specification.
    pub fn validate(&self) -> Result<()> {
        if !self.strokes_path.exists() {
            return Err(ExportError::InvalidJob(format!(
                "Stroke file not found: {:?}",
                self.strokes_path
            )));
        }
        if self.file_prefix.is_empty() || self.file_prefix.contains(['/', '\\']) {
            return Err(ExportError::InvalidJob(format!(
                "Invalid file prefix: {:?}",
                self.file_prefix
            )));
        }
        parse_timeout("fetchTimeoutSecs", self.fetch_timeout_secs)?;
        parse_timeout("uploadTimeoutSecs", self.upload_timeout_secs)?;
        Ok(())
    }

    /// Per-request fetch timeout. Falls back to the default when out of range.
    pub fn fetch_timeout(&self) -> Duration {
        parse_timeout("fetchTimeoutSecs", self.fetch_timeout_secs).unwrap_or(DEFAULT_FETCH_TIMEOUT)
    }

    /// Upload join timeout. Falls back to the default when out of range.
    pub fn upload_timeout(&self) -> Duration {
        parse_timeout("uploadTimeoutSecs", self.upload_timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f32(default_upload_timeout_secs()))
    }
}

/// Seconds as a non-zero `Duration`; rejects values `Duration` cannot hold.
fn parse_timeout(field: &str, secs: f32) -> Result<Duration> {
    match Duration::try_from_secs_f32(secs) {
        Ok(timeout) if !timeout.is_zero() => Ok(timeout),
        Ok(_) => Err(ExportError::InvalidJob(format!("{} must be positive", field))),
        Err(e) => Err(ExportError::InvalidJob(format!("{} = {}: {}", field, secs, e))),
    }
}

/// Summary of a completed export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    /// Base name, e.g. `wrap3`.
    pub name: String,

    /// Stored OBJ record.
    pub obj: AssetRecord,

    /// Stored MTL record, when textures were enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtl: Option<AssetRecord>,

    /// Stored texture records in stroke order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<AssetRecord>,

    /// Strokes that contributed geometry.
    pub stroke_count: usize,

    pub vertex_count: usize,

    pub face_count: usize,

    /// Indices of strokes dropped for degenerate geometry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_strokes: Vec<usize>,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,
}

impl ExportReport {
    /// Save the report as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
