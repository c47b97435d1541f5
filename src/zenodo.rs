use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::LyraError;

/// Archive-record service: GET-only access to the raw bytes of a named file
/// inside a repository record.
pub trait ArchiveClient: Send + Sync {
    fn fetch_file(&self, repository_id: &str, dataset: &str) -> Result<Vec<u8>, LyraError>;
}

#[derive(Clone)]
pub struct ZenodoHttpClient {
    client: Client,
    base_url: String,
}

impl ZenodoHttpClient {
    pub fn new() -> Result<Self, LyraError> {
        Self::with_base_url("https://zenodo.org")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, LyraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("lyra-dm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| LyraError::ClientUnavailable(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| LyraError::ClientUnavailable(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn record_url(&self, repository_id: &str, dataset: &str) -> String {
        format!(
            "{}/records/{}/files/{}",
            self.base_url, repository_id, dataset
        )
    }
}

impl ArchiveClient for ZenodoHttpClient {
    fn fetch_file(&self, repository_id: &str, dataset: &str) -> Result<Vec<u8>, LyraError> {
        let url = self.record_url(repository_id, dataset);
        // Single attempt, whole body buffered. Usually fails because the
        // caller is offline.
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| LyraError::ConnectionFailure {
                dataset: dataset.to_string(),
                cause: err.to_string(),
            })?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "archive request failed".to_string());
            return Err(LyraError::RemoteRequestFailure { status, message });
        }
        let bytes = response
            .bytes()
            .map_err(|err| LyraError::ConnectionFailure {
                dataset: dataset.to_string(),
                cause: err.to_string(),
            })?;
        Ok(bytes.to_vec())
    }
}
