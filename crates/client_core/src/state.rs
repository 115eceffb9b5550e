//! The session state machine: one tagged state value and pure transitions,
//! so a result can never coexist with a spinner or a stale error.

use std::path::Path;

use anyhow::{Context, Result};

/// The file currently staged for submission. Replaced wholesale by a later
/// selection; owned exclusively by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub bytes: Vec<u8>,
    pub media_type: String,
    pub display_name: String,
}

impl UploadCandidate {
    pub fn new(
        bytes: Vec<u8>,
        media_type: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
            display_name: display_name.into(),
        }
    }

    /// Stages a file from disk, guessing the media type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read image '{}'", path.display()))?;
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(bytes, media_type_for(path), display_name))
    }
}

fn media_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Outcome of one relay round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Success {
        image_base64: String,
    },
    Failure {
        message: String,
        raw_detail: Option<String>,
    },
}

/// Scheme prefix turning the backend's base64 payload into a displayable
/// image source.
pub const IMAGE_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// The session is always in exactly one of these states. Every state past
/// `Idle` keeps the staged file so the before/after view has its "before"
/// half.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    FileStaged {
        file: UploadCandidate,
    },
    Submitting {
        file: UploadCandidate,
        generation: u64,
    },
    Resolved {
        file: UploadCandidate,
        image_src: String,
    },
    Failed {
        file: UploadCandidate,
        message: String,
    },
}

/// Inputs that drive the session state machine.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Picker or drop intake; only index 0 of a multi-file selection counts.
    FilesChosen(Vec<UploadCandidate>),
    SubmitStarted {
        generation: u64,
    },
    Settled {
        generation: u64,
        result: SubmissionResult,
    },
}

/// Applies one event, returning the next state. Events that are not legal in
/// the current state leave it unchanged, which is also what discards a
/// settle arriving for a superseded submission.
pub fn apply(state: SessionState, event: SessionEvent) -> SessionState {
    match event {
        SessionEvent::FilesChosen(mut files) => {
            if files.is_empty() {
                return state;
            }
            SessionState::FileStaged {
                file: files.swap_remove(0),
            }
        }
        SessionEvent::SubmitStarted { generation } => match state {
            SessionState::FileStaged { file }
            | SessionState::Resolved { file, .. }
            | SessionState::Failed { file, .. } => SessionState::Submitting { file, generation },
            other => other,
        },
        SessionEvent::Settled { generation, result } => match state {
            SessionState::Submitting {
                file,
                generation: current,
            } if current == generation => match result {
                SubmissionResult::Success { image_base64 } => SessionState::Resolved {
                    file,
                    image_src: format!("{IMAGE_DATA_URI_PREFIX}{image_base64}"),
                },
                SubmissionResult::Failure { message, .. } => {
                    SessionState::Failed { file, message }
                }
            },
            other => other,
        },
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
