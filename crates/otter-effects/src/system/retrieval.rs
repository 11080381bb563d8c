//! Source retrieval for rendered files.
//!
//! Supported sources: `http://`, `https://`, `file://` and plain absolute
//! paths. Anything else is an unsupported source.

use async_trait::async_trait;
use otter_core::effects::{CapabilityError, RetrievalEffects};
use reqwest::Client;

/// Retrieval handler for HTTP(S) and local sources
#[derive(Debug, Clone, Default)]
pub struct SourceRetrievalHandler {
    client: Client,
}

impl SourceRetrievalHandler {
    /// Create a new retrieval handler
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch_http(&self, location: &str) -> Result<Vec<u8>, CapabilityError> {
        let failed = |reason: String| CapabilityError::Retrieval {
            location: location.to_string(),
            reason,
        };
        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")));
        }
        let body = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        Ok(body.to_vec())
    }

    async fn fetch_local(&self, location: &str, path: &str) -> Result<Vec<u8>, CapabilityError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| CapabilityError::Retrieval {
                location: location.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl RetrievalEffects for SourceRetrievalHandler {
    async fn retrieve(&self, location: &str) -> Result<Vec<u8>, CapabilityError> {
        tracing::debug!(source = %location, "retrieving");
        if location.starts_with("http://") || location.starts_with("https://") {
            self.fetch_http(location).await
        } else if let Some(path) = location.strip_prefix("file://") {
            self.fetch_local(location, path).await
        } else if location.starts_with('/') {
            self.fetch_local(location, location).await
        } else {
            Err(CapabilityError::UnsupportedSource {
                location: location.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_schemes_are_unsupported() {
        let handler = SourceRetrievalHandler::new();
        let err = handler.retrieve("s3://bucket/key").await.unwrap_err();
        assert!(matches!(err, CapabilityError::UnsupportedSource { .. }));
    }

    #[tokio::test]
    async fn file_sources_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.txt");
        std::fs::write(&path, b"content").unwrap();
        let handler = SourceRetrievalHandler::new();

        let uri = format!("file://{}", path.display());
        assert_eq!(handler.retrieve(&uri).await.unwrap(), b"content");
        let plain = path.display().to_string();
        assert_eq!(handler.retrieve(&plain).await.unwrap(), b"content");
    }
}
