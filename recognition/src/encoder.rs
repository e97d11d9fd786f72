//! Boundary to the external face-encoding provider.
//!
//! The provider detects zero or more faces in an image and returns one
//! descriptor per face. It is treated as a bounded external call: slow or
//! failed calls are reported per image so the caller can skip that image
//! without failing the rest of the batch.

use crate::descriptor::Descriptor;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("encoder call timed out after {0:?}")]
    Timeout(Duration),
    #[error("encoder request failed: {0}")]
    Request(String),
    #[error("encoder returned an unusable payload: {0}")]
    Payload(String),
}

/// Capability that turns raw image bytes into probe descriptors.
///
/// An image containing no detectable face yields an empty vector, which is a
/// normal outcome rather than an error.
#[async_trait]
pub trait FaceEncoder: Send + Sync {
    async fn detect_and_encode(&self, image: &[u8]) -> Result<Vec<Descriptor>, EncodeError>;
}

/// HTTP-backed encoder client.
///
/// Posts the image to the provider's `/encode` endpoint and expects a JSON
/// array of descriptor arrays. The configured per-image timeout is enforced
/// here so the reconciler can treat a slow provider as a per-image skip.
pub struct HttpFaceEncoder {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpFaceEncoder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    fn encode_url(&self) -> String {
        format!("{}/encode", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl FaceEncoder for HttpFaceEncoder {
    async fn detect_and_encode(&self, image: &[u8]) -> Result<Vec<Descriptor>, EncodeError> {
        let request = self
            .client
            .post(self.encode_url())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| EncodeError::Timeout(self.timeout))?
            .map_err(|e| EncodeError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| EncodeError::Request(e.to_string()))?;

        let raw: Vec<Vec<f64>> = tokio::time::timeout(self.timeout, response.json())
            .await
            .map_err(|_| EncodeError::Timeout(self.timeout))?
            .map_err(|e| EncodeError::Payload(e.to_string()))?;

        raw.into_iter()
            .map(|values| {
                Descriptor::new(values).map_err(|e| EncodeError::Payload(e.to_string()))
            })
            .collect()
    }
}
