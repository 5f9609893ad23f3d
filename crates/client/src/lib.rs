//! HTTP client for the DEM analysis server.
//!
//! Wraps job submission, status polling, completion reporting, and artifact
//! retrieval using [`reqwest`]. [`DemscopeClient::wait_for_completion`]
//! implements the polling contract: check status at a fixed interval, collect
//! results once the job is completed, and give up on the first transport
//! error.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

/// Interval between status polls unless overridden.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Header the server checks on completion callbacks.
pub const COMPLETION_TOKEN_HEADER: &str = "x-completion-token";

/// Errors from the client layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Server error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The pipeline exited without reporting completion.
    #[error("Job {0} failed")]
    JobFailed(String),
}

/// Lifecycle state reported by `/processStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

/// One file produced by a job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactFile {
    pub name: String,
    pub size_bytes: u64,
    pub public_path: String,
}

/// Body of `/processResults/{processId}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobResults {
    #[serde(rename = "processId")]
    pub process_id: String,
    pub status: JobStatus,
    pub files: Vec<ArtifactFile>,
    /// The analysis manifest, left untyped.
    #[serde(default)]
    pub manifest: Option<serde_json::Value>,
}

/// Body of `/calculateVolume`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VolumeResult {
    /// Whatever JSON value the volume script reported.
    pub result: serde_json::Value,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

/// A DEM file to upload.
#[derive(Debug, Clone)]
pub struct DemUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// Sent as `originalFileName`.
    pub display_name: Option<String>,
}

impl DemUpload {
    fn into_form(self) -> Form {
        let part = Part::bytes(self.bytes).file_name(self.file_name);
        let form = Form::new().part("demFile", part);
        match self.display_name {
            Some(name) => form.text("originalFileName", name),
            None => form,
        }
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(rename = "processId")]
    process_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: JobStatus,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// HTTP client for one server.
#[derive(Debug, Clone)]
pub struct DemscopeClient {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

impl DemscopeClient {
    /// * `base_url` - e.g. `http://localhost:5000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Upload a DEM to `POST /process` and return its `processId`.
    pub async fn submit(&self, upload: DemUpload) -> Result<String, ClientError> {
        let response = self
            .client
            .post(self.url("/process"))
            .multipart(upload.into_form())
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        tracing::debug!(process_id = %submitted.process_id, "Submitted job");
        Ok(submitted.process_id)
    }

    /// `GET /processStatus/{processId}`.
    pub async fn status(&self, process_id: &str) -> Result<JobStatus, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/processStatus/{process_id}")))
            .send()
            .await?;

        let body: StatusResponse = Self::parse_response(response).await?;
        Ok(body.status)
    }

    /// Poll until the job completes, then return its results.
    ///
    /// There is no retry: the first transport or server error is returned.
    pub async fn wait_for_completion(&self, process_id: &str) -> Result<JobResults, ClientError> {
        loop {
            match self.status(process_id).await? {
                JobStatus::Completed => return self.results(process_id).await,
                JobStatus::Failed => return Err(ClientError::JobFailed(process_id.to_string())),
                JobStatus::Processing => {
                    tracing::trace!(process_id, "Job still processing");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// `POST /processComplete/{processId}`, as a pipeline would call it.
    pub async fn report_completion(
        &self,
        process_id: &str,
        token: Option<&str>,
    ) -> Result<JobStatus, ClientError> {
        let mut request = self
            .client
            .post(self.url(&format!("/processComplete/{process_id}")));
        if let Some(token) = token {
            request = request.header(COMPLETION_TOKEN_HEADER, token);
        }
        let response = request.send().await?;

        let body: StatusResponse = Self::parse_response(response).await?;
        Ok(body.status)
    }

    /// `GET /processResults/{processId}`.
    pub async fn results(&self, process_id: &str) -> Result<JobResults, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/processResults/{process_id}")))
            .send()
            .await?;

        let envelope: DataEnvelope<JobResults> = Self::parse_response(response).await?;
        Ok(envelope.data)
    }

    /// Download one artifact by its public path (`/outputs/...`).
    pub async fn fetch_artifact(&self, public_path: &str) -> Result<Vec<u8>, ClientError> {
        let response = self.client.get(self.url(public_path)).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// `POST /calculateVolume`, waiting for the pipeline to finish.
    ///
    /// With a `process_id`, the run writes its images into that job's
    /// output directory instead of a fresh one.
    pub async fn calculate_volume(
        &self,
        upload: DemUpload,
        volume_type: &str,
        approximation_type: &str,
        process_id: Option<&str>,
    ) -> Result<VolumeResult, ClientError> {
        let mut form = upload
            .into_form()
            .text("volumeType", volume_type.to_string())
            .text("approximationType", approximation_type.to_string());
        if let Some(id) = process_id {
            form = form.text("processId", id.to_string());
        }
        let response = self
            .client
            .post(self.url("/calculateVolume"))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Ensure the response has a success status code, or turn it into a
    /// [`ClientError::Api`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
