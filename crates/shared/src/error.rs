use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body shape every relay failure path serializes to. Clients can rely on
/// `error` always being present; `detail` carries raw backend text or a
/// stringified transport error when one is available.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProxyErrorBody {
    pub fn no_image() -> Self {
        Self {
            error: "no image".to_string(),
            detail: None,
        }
    }

    pub fn proxy_error(detail: impl Into<String>) -> Self {
        Self {
            error: "proxy error".to_string(),
            detail: Some(detail.into()),
        }
    }
}

/// Internal relay failure, mapped to a `ProxyErrorBody` with a status code at
/// the HTTP boundary.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upload contains no image part")]
    MissingImage,
    #[error("failed to read upload: {0}")]
    Upload(String),
    #[error("failed to reach denoising backend: {0}")]
    Transport(String),
}
