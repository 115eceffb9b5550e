use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Multipart field name carrying the image bytes, on both hops.
pub const IMAGE_FIELD: &str = "image";

/// Synthetic filename the relay assigns on the outbound hop.
pub const UPLOAD_FILENAME: &str = "upload.png";

/// Route served by the relay and exposed by the denoising backend.
pub const DENOISE_ROUTE: &str = "/api/denoise";

/// Success payload returned by the denoising backend and forwarded to
/// clients unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenoiseOutput {
    pub image_base64: String,
}

/// One parse attempt over a backend response body. The backend is not
/// trusted to return JSON, so the relay reads text first and branches on
/// this instead of catching a parse failure mid-flight.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendBody {
    Json(Value),
    Raw(String),
}

impl BackendBody {
    pub fn parse(text: String) -> Self {
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(text),
        }
    }
}
