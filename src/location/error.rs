use thiserror::Error;

use super::ReporterId;

/// Per-frame rejection. The session reports it to the reporter and keeps reading.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed location frame: {0}")]
    Malformed(String),
    #[error("frame claims reporter {claimed} but connection is authenticated as {authenticated}")]
    IdentityMismatch {
        claimed: ReporterId,
        authenticated: ReporterId,
    },
}

impl From<serde_json::Error> for FrameError {
    fn from(err: serde_json::Error) -> Self {
        FrameError::Malformed(err.to_string())
    }
}
