//! Artifact store layout.
//!
//! ```text
//! <root>/uploads/<job_id>/<sanitized input name>   uploaded DEM
//! <root>/outputs/<job_id>/...                      files written by the pipeline
//! <root>/logs/errors.log                           derivative failure log
//! ```
//!
//! `outputs/` is served read-only under `/outputs`. File names inside a job
//! directory are a convention of the pipeline; the store only lists them and
//! reads the optional image manifest.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::JobId;

pub const UPLOADS_DIR: &str = "uploads";
pub const OUTPUTS_DIR: &str = "outputs";
pub const LOGS_DIR: &str = "logs";

/// Manifest written by the full analysis next to its images.
pub const MANIFEST_FILE: &str = "analysis_images.json";

/// Used when the upload has no usable file name.
pub const DEFAULT_INPUT_NAME: &str = "input.tif";

/// URL prefix the output directory is served under.
pub const PUBLIC_OUTPUTS_PREFIX: &str = "/outputs";

static UNSAFE_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid regex"));

/// Reduce an uploaded file name to a safe single path component.
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_`, and leading dots are removed so the result is never hidden or `..`.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned = UNSAFE_CHARS_RE.replace_all(base.trim(), "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        DEFAULT_INPUT_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// One file in a job's output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactEntry {
    pub name: String,
    pub size_bytes: u64,
    pub public_path: String,
}

/// One image entry of the analysis manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestImage {
    pub filename: String,
    #[serde(default)]
    pub public_path: Option<String>,
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub units: Vec<String>,
    #[serde(default)]
    pub descriptions: Vec<String>,
}

/// The `analysis_images.json` manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisManifest {
    #[serde(rename = "processId")]
    pub process_id: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub original_file_name: Option<String>,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub images: Vec<ManifestImage>,
}

/// Filesystem-backed artifact store rooted at one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn outputs_root(&self) -> PathBuf {
        self.root.join(OUTPUTS_DIR)
    }

    pub fn logs_root(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    /// Output directory of one job.
    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.outputs_root().join(id.as_str())
    }

    /// Upload directory of one job.
    pub fn upload_dir(&self, id: &JobId) -> PathBuf {
        self.root.join(UPLOADS_DIR).join(id.as_str())
    }

    /// Public URL path of a file in a job's output directory.
    pub fn public_path(id: &JobId, file_name: &str) -> String {
        format!("{PUBLIC_OUTPUTS_PREFIX}/{id}/{file_name}")
    }

    /// Create the top-level directories.
    pub async fn init(&self) -> Result<(), CoreError> {
        for dir in [self.root.join(UPLOADS_DIR), self.outputs_root(), self.logs_root()] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Create the output directory of a new job.
    ///
    /// The directory must not exist yet: a collision fails with
    /// [`CoreError::Conflict`] instead of sharing the directory.
    pub async fn create_job_dir(&self, id: &JobId) -> Result<PathBuf, CoreError> {
        tokio::fs::create_dir_all(self.outputs_root()).await?;
        let dir = self.job_dir(id);
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(CoreError::Conflict(format!(
                "Artifact directory for job {id} already exists"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the output directory of a job if missing, reusing an existing one.
    pub async fn ensure_job_dir(&self, id: &JobId) -> Result<PathBuf, CoreError> {
        let dir = self.job_dir(id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Write the uploaded input for a job and return its path.
    pub async fn persist_input(
        &self,
        id: &JobId,
        file_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<PathBuf, CoreError> {
        if bytes.is_empty() {
            return Err(CoreError::Validation("Uploaded file is empty".into()));
        }
        let dir = self.upload_dir(id);
        tokio::fs::create_dir_all(&dir).await?;
        let name = file_name
            .map(sanitize_file_name)
            .unwrap_or_else(|| DEFAULT_INPUT_NAME.to_string());
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(job_id = %id, path = %path.display(), size = bytes.len(), "Persisted input");
        Ok(path)
    }

    /// List the regular files in a job's output directory, sorted by name.
    pub async fn list_artifacts(&self, id: &JobId) -> Result<Vec<ArtifactEntry>, CoreError> {
        let dir = self.job_dir(id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CoreError::NotFound {
                    entity: "artifact directory",
                    id: id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            artifacts.push(ArtifactEntry {
                public_path: Self::public_path(id, &name),
                name,
                size_bytes: metadata.len(),
            });
        }
        artifacts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(artifacts)
    }

    /// Read the analysis manifest of a job, if the pipeline wrote one.
    ///
    /// A manifest that is present but unreadable is logged and treated as
    /// absent.
    pub async fn read_manifest(&self, id: &JobId) -> Result<Option<AnalysisManifest>, CoreError> {
        let path = self.job_dir(id).join(MANIFEST_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Ignoring malformed analysis manifest");
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn sanitize_strips_directories_and_unsafe_chars() {
        assert_eq!(sanitize_file_name("etna 2024.tif"), "etna_2024.tif");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\dem\\vesuvio.tif"), "vesuvio.tif");
        assert_eq!(sanitize_file_name("..hidden"), "hidden");
        assert_eq!(sanitize_file_name(".."), DEFAULT_INPUT_NAME);
        assert_eq!(sanitize_file_name(""), DEFAULT_INPUT_NAME);
    }

    #[test]
    fn public_path_layout() {
        let id = JobId::parse("abc").unwrap();
        assert_eq!(ArtifactStore::public_path(&id, "triplet_01.png"), "/outputs/abc/triplet_01.png");
    }

    #[tokio::test]
    async fn create_job_dir_is_exclusive() {
        let root = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(root.path());
        let id = JobId::generate();

        let dir = store.create_job_dir(&id).await.expect("first create");
        assert!(dir.is_dir());
        let err = store.create_job_dir(&id).await.unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));

        // The reuse path accepts an existing directory.
        assert_eq!(store.ensure_job_dir(&id).await.expect("ensure"), dir);
    }

    #[tokio::test]
    async fn persist_input_writes_under_job_upload_dir() {
        let root = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(root.path());
        let id = JobId::generate();

        let path = store
            .persist_input(&id, Some("my dem.tif"), b"GeoTIFF")
            .await
            .expect("persist");
        assert_eq!(path, store.upload_dir(&id).join("my_dem.tif"));
        assert_eq!(std::fs::read(&path).unwrap(), b"GeoTIFF");
    }

    #[tokio::test]
    async fn persist_input_rejects_empty_bytes() {
        let root = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(root.path());
        let err = store
            .persist_input(&JobId::generate(), None, b"")
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[tokio::test]
    async fn list_artifacts_sorted_files_only() {
        let root = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(root.path());
        let id = JobId::generate();
        let dir = store.create_job_dir(&id).await.unwrap();
        std::fs::write(dir.join("b.png"), b"12").unwrap();
        std::fs::write(dir.join("a.png"), b"1").unwrap();
        std::fs::create_dir(dir.join("nested")).unwrap();

        let artifacts = store.list_artifacts(&id).await.expect("list");
        let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["a.png", "b.png"]);
        assert_eq!(artifacts[1].size_bytes, 2);
        assert_eq!(artifacts[0].public_path, format!("/outputs/{id}/a.png"));
    }

    #[tokio::test]
    async fn list_artifacts_unknown_job() {
        let root = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(root.path());
        let err = store.list_artifacts(&JobId::generate()).await.unwrap_err();
        assert_matches!(err, CoreError::NotFound { .. });
    }

    #[tokio::test]
    async fn read_manifest_present_absent_and_malformed() {
        let root = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(root.path());
        let id = JobId::generate();
        let dir = store.create_job_dir(&id).await.unwrap();

        assert_eq!(store.read_manifest(&id).await.unwrap(), None);

        std::fs::write(
            dir.join(MANIFEST_FILE),
            format!(
                r#"{{"processId":"{id}","source":"complete_dem_analysis","images":[{{"filename":"dem.png","public_path":"/outputs/{id}/dem.png"}}]}}"#
            ),
        )
        .unwrap();
        let manifest = store.read_manifest(&id).await.unwrap().expect("manifest");
        assert_eq!(manifest.process_id, id.as_str());
        assert_eq!(manifest.images.len(), 1);
        assert_eq!(manifest.images[0].filename, "dem.png");

        std::fs::write(dir.join(MANIFEST_FILE), b"{not json").unwrap();
        assert_eq!(store.read_manifest(&id).await.unwrap(), None);
    }
}
