// Error module: every way a run can fail, as one enum. The binary only
// has to print it; the console layer asks it for remediation hints.

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Scopes a personal access token needs for the deposit workflow.
pub const REQUIRED_SCOPES: [&str; 3] = ["deposit:write", "deposit:actions", "user:email"];

/// Errors produced while driving a deposition through to publication.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Missing credential or an unusable endpoint/client configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The token was rejected as lacking the required scopes.
    #[error("token doesn't have the required permissions (status {status})")]
    Authorization {
        status: StatusCode,
        /// Page where a new token can be created.
        token_url: String,
    },

    /// Local input problem, detected before any request is made.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The service answered a call with an unexpected status.
    #[error("{stage} failed with status {status}: {body}")]
    Service {
        stage: &'static str,
        status: StatusCode,
        body: String,
    },

    /// The service answered with something the client cannot use.
    #[error("{stage}: unexpected response: {detail}")]
    UnexpectedResponse { stage: &'static str, detail: String },

    /// The deposition could not be published as it stands.
    #[error("cannot publish deposition {id}: {detail}")]
    Publish { id: u64, detail: String },

    /// The deposition still holds no files after uploading.
    #[error("deposition {id} has no attached files: No files were uploaded successfully")]
    NoFilesAttached { id: u64 },

    /// A stored file does not match what was read locally.
    #[error("{file} differs from the stored copy: local {local}, server reported {remote}")]
    Integrity {
        file: String,
        local: String,
        remote: String,
    },

    #[error("{stage} request failed")]
    Transport {
        stage: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, UploadError>;

impl UploadError {
    pub fn transport(stage: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Transport { stage, source }
    }

    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    /// The workflow stage the error belongs to, when it came from a request.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Authorization { .. } => Some("verify token"),
            Self::Service { stage, .. }
            | Self::Transport { stage, .. }
            | Self::UnexpectedResponse { stage, .. } => Some(*stage),
            Self::Publish { .. } => Some("publish"),
            Self::Integrity { .. } | Self::NoFilesAttached { .. } => Some("verify upload"),
            _ => None,
        }
    }

    /// Lines telling the user how to get past this error, if there is
    /// anything to tell.
    pub fn hints(&self) -> Vec<String> {
        match self {
            Self::Authorization { token_url, .. } => {
                let mut lines = vec!["Please create a new token with these scopes:".to_string()];
                lines.extend(REQUIRED_SCOPES.iter().map(|scope| format!("- {scope}")));
                lines.push(format!("Go to: {token_url}"));
                lines
            }
            Self::Publish { .. } | Self::NoFilesAttached { .. } => vec![
                "Please verify:".to_string(),
                "1. All required metadata is present".to_string(),
                "2. Files were uploaded successfully".to_string(),
                "3. The deposit is ready to publish".to_string(),
            ],
            Self::Integrity { .. } => {
                vec!["The deposition was left unpublished; re-run the upload.".to_string()]
            }
            _ => Vec::new(),
        }
    }
}
