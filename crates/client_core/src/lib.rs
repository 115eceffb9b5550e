use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use shared::protocol::{DenoiseOutput, DENOISE_ROUTE, IMAGE_FIELD};
use tracing::{debug, warn};

pub mod state;

pub use state::{
    SessionEvent, SessionState, SubmissionResult, UploadCandidate, IMAGE_DATA_URI_PREFIX,
};

/// Shown when a transport error produces no text of its own.
const FETCH_FALLBACK_MESSAGE: &str = "Failed to fetch";

/// Client-side controller for the select → preview → submit → result flow.
/// One logical thread of control; the only suspension point is the network
/// round trip inside [`UploadSession::submit`].
pub struct UploadSession {
    http: Client,
    relay_url: String,
    state: SessionState,
    drag_active: bool,
    generation: u64,
}

impl UploadSession {
    pub fn new(relay_url: impl Into<String>) -> Self {
        let relay_url = relay_url.into();
        Self {
            http: Client::new(),
            relay_url: relay_url.trim_end_matches('/').to_string(),
            state: SessionState::Idle,
            drag_active: false,
            generation: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Picker intake. Only the first file counts; an empty selection changes
    /// nothing. Staging clears any previous result or error.
    pub fn select_files(&mut self, files: Vec<UploadCandidate>) {
        self.apply_event(SessionEvent::FilesChosen(files));
    }

    /// Drop intake; same normalization as the picker, and completing a drop
    /// always clears the visual drag flag.
    pub fn drop_files(&mut self, files: Vec<UploadCandidate>) {
        self.drag_active = false;
        self.apply_event(SessionEvent::FilesChosen(files));
    }

    pub fn drag_entered(&mut self) {
        self.drag_active = true;
    }

    pub fn drag_over(&mut self) {
        self.drag_active = true;
    }

    pub fn drag_left(&mut self) {
        self.drag_active = false;
    }

    /// Purely presentational; never consulted by the state machine.
    pub fn drag_active(&self) -> bool {
        self.drag_active
    }

    /// Derived, not stored: a file is staged and nothing is in flight.
    pub fn can_submit(&self) -> bool {
        matches!(
            self.state,
            SessionState::FileStaged { .. }
                | SessionState::Resolved { .. }
                | SessionState::Failed { .. }
        )
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, SessionState::Submitting { .. })
    }

    pub fn staged_file(&self) -> Option<&UploadCandidate> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::FileStaged { file }
            | SessionState::Submitting { file, .. }
            | SessionState::Resolved { file, .. }
            | SessionState::Failed { file, .. } => Some(file),
        }
    }

    /// The displayable `data:` URI of the denoised image, once resolved.
    pub fn result_image(&self) -> Option<&str> {
        match &self.state {
            SessionState::Resolved { image_src, .. } => Some(image_src),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            SessionState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Decodes the resolved data URI back to raw PNG bytes, for saving the
    /// "after" image to disk.
    pub fn result_png_bytes(&self) -> Result<Option<Vec<u8>>> {
        let Some(image_src) = self.result_image() else {
            return Ok(None);
        };
        let encoded = image_src
            .strip_prefix(IMAGE_DATA_URI_PREFIX)
            .unwrap_or(image_src);
        Ok(Some(STANDARD.decode(encoded)?))
    }

    /// Submits the staged file to the relay. Inert when no file is staged or
    /// a submission is already in flight. The session always leaves
    /// `Submitting` once the round trip settles, whatever happened on the
    /// wire.
    pub async fn submit(&mut self) {
        if !self.can_submit() {
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        self.apply_event(SessionEvent::SubmitStarted { generation });

        let SessionState::Submitting { file, .. } = &self.state else {
            return;
        };
        let file = file.clone();

        debug!(file = %file.display_name, generation, "submitting staged image");
        let result = self.round_trip(&file).await;
        if let SubmissionResult::Failure { message, .. } = &result {
            warn!(%message, "submission failed");
        }
        self.apply_event(SessionEvent::Settled { generation, result });
    }

    /// Never escapes with an error; every failure becomes a `Failure`
    /// outcome so the settle step runs on all exit paths.
    async fn round_trip(&self, file: &UploadCandidate) -> SubmissionResult {
        match self.request_denoise(file).await {
            Ok(result) => result,
            Err(err) => {
                let mut message = err.to_string();
                if message.trim().is_empty() {
                    message = FETCH_FALLBACK_MESSAGE.to_string();
                }
                SubmissionResult::Failure {
                    message,
                    raw_detail: None,
                }
            }
        }
    }

    async fn request_denoise(&self, file: &UploadCandidate) -> Result<SubmissionResult> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.display_name.clone())
            .mime_str(&file.media_type)?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .http
            .post(format!("{}{DENOISE_ROUTE}", self.relay_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("API error: {} {text}", status.as_u16());
            return Ok(SubmissionResult::Failure {
                message,
                raw_detail: Some(text),
            });
        }

        let output: DenoiseOutput = response.json().await?;
        Ok(SubmissionResult::Success {
            image_base64: output.image_base64,
        })
    }

    fn apply_event(&mut self, event: SessionEvent) {
        self.state = state::apply(std::mem::take(&mut self.state), event);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
