//! ArtifactStore: per-step output files for audit and debugging.
//!
//! Storage path: `<output_dir>/<run id>/[<label>/]<filename>`
//!
//! The extension decides the format: `.json` is pretty-printed JSON,
//! `.md` and `.txt` are written literally. Artifacts are a side channel;
//! nothing here is read back by the flow.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tokio::fs;

/// Payload of one artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Structured(Value),
    Text(String),
}

impl Artifact {
    /// Normalize a serializable record to plain key-value form.
    pub fn structured<T: Serialize>(value: &T) -> Result<Self, ArtifactError> {
        serde_json::to_value(value)
            .map(Artifact::Structured)
            .map_err(|e| ArtifactError::Serialization(e.to_string()))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Artifact::Text(text.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtifactFormat {
    Json,
    Text,
}

impl ArtifactFormat {
    fn from_filename(filename: &str) -> Result<Self, ArtifactError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(ArtifactFormat::Json),
            "md" | "txt" => Ok(ArtifactFormat::Text),
            _ => Err(ArtifactError::UnsupportedExtension(ext)),
        }
    }
}

/// Replace characters that would break a path segment.
pub fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().to_string();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Store scoped to one run, so concurrent runs never share a directory.
    pub fn for_run(&self, run_id: &str) -> Self {
        Self {
            base_dir: self.base_dir.join(sanitize_segment(run_id)),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Write an artifact and return its path.
    pub async fn save(
        &self,
        filename: &str,
        label: Option<&str>,
        artifact: &Artifact,
    ) -> Result<PathBuf, ArtifactError> {
        let format = ArtifactFormat::from_filename(filename)?;

        let dir = match label {
            Some(label) => self.base_dir.join(sanitize_segment(label)),
            None => self.base_dir.clone(),
        };
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ArtifactError::Io(format!("Failed to create artifact dir: {}", e)))?;

        let body = render(format, artifact)?;
        let path = dir.join(sanitize_segment(filename));
        fs::write(&path, body)
            .await
            .map_err(|e| ArtifactError::Io(e.to_string()))?;

        tracing::debug!("[ArtifactStore] Wrote {}", path.display());
        Ok(path)
    }

    /// Write an artifact, logging errors but never failing.
    pub async fn save_safe(
        &self,
        filename: &str,
        label: Option<&str>,
        artifact: &Artifact,
    ) -> Option<PathBuf> {
        match self.save(filename, label, artifact).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("[ArtifactStore] Failed to save {}: {}", filename, e);
                None
            }
        }
    }

    /// Serialize `value` and write it, logging errors but never failing.
    pub async fn save_record<T: Serialize>(
        &self,
        filename: &str,
        label: Option<&str>,
        value: &T,
    ) -> Option<PathBuf> {
        match Artifact::structured(value) {
            Ok(artifact) => self.save_safe(filename, label, &artifact).await,
            Err(e) => {
                tracing::warn!("[ArtifactStore] Failed to save {}: {}", filename, e);
                None
            }
        }
    }
}

fn render(format: ArtifactFormat, artifact: &Artifact) -> Result<String, ArtifactError> {
    let pretty = |v: &Value| {
        serde_json::to_string_pretty(v).map_err(|e| ArtifactError::Serialization(e.to_string()))
    };
    match (format, artifact) {
        (ArtifactFormat::Json, Artifact::Structured(value)) => pretty(value),
        (ArtifactFormat::Json, Artifact::Text(text)) => {
            match serde_json::from_str::<Value>(text) {
                Ok(value) => pretty(&value),
                Err(_) => pretty(&Value::String(text.clone())),
            }
        }
        (ArtifactFormat::Text, Artifact::Text(text)) => Ok(text.clone()),
        (ArtifactFormat::Text, Artifact::Structured(Value::String(text))) => Ok(text.clone()),
        (ArtifactFormat::Text, Artifact::Structured(value)) => pretty(value),
    }
}

/// Error type for artifact writing operations.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Unsupported file extension: '{0}'")]
    UnsupportedExtension(String),
}
