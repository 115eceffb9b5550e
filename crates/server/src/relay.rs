use reqwest::multipart::{Form, Part};
use shared::{
    error::RelayError,
    protocol::{BackendBody, DENOISE_ROUTE, IMAGE_FIELD, UPLOAD_FILENAME},
};

/// What the backend answered, before status mapping at the HTTP boundary.
#[derive(Debug)]
pub struct BackendReply {
    pub status: u16,
    pub body: BackendBody,
}

/// Stateless handle to the denoising backend. Built once at startup from the
/// resolved settings and shared by every request; holds no mutable state.
#[derive(Clone)]
pub struct RelayContext {
    http: reqwest::Client,
    backend_url: String,
}

impl RelayContext {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            backend_url: backend_url.into(),
        }
    }

    /// Forwards one upload to the backend as a single multipart part named
    /// `image`, under a synthetic filename, and reads the reply as text so a
    /// non-JSON body never aborts the round trip.
    pub async fn forward_image(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<BackendReply, RelayError> {
        let part = Part::bytes(bytes)
            .file_name(UPLOAD_FILENAME)
            .mime_str(content_type)
            .map_err(|e| RelayError::Upload(e.to_string()))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .http
            .post(format!("{}{DENOISE_ROUTE}", self.backend_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        Ok(BackendReply {
            status,
            body: BackendBody::parse(text),
        })
    }
}
