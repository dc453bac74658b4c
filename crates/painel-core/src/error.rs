use thiserror::Error;

use crate::identifiers::{RecordKey, SessionScope};

const UNREACHABLE_MESSAGE: &str = "Unable to reach the server. Check the connection and try again.";
const UNAUTHORIZED_MESSAGE: &str = "Your session has expired. Sign in again to continue.";
const MALFORMED_MESSAGE: &str = "The server returned an unexpected response.";
const CLOSED_MESSAGE: &str = "This screen is no longer active.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("cannot reach server: {0}")]
    Unreachable(String),
    #[error("authorization failed for the {scope} session")]
    Unauthorized { scope: SessionScope },
    #[error("server rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("record `{0}` is not present in the collection")]
    UnknownRecord(RecordKey),
    #[error("synchronizer is closed")]
    Closed,
}

impl CoreError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Unreachable(_) => UNREACHABLE_MESSAGE.to_owned(),
            Self::Unauthorized { .. } => UNAUTHORIZED_MESSAGE.to_owned(),
            Self::Rejected { message, .. } => message.clone(),
            Self::MalformedResponse(_) => MALFORMED_MESSAGE.to_owned(),
            Self::Configuration(message) => message.clone(),
            Self::UnknownRecord(key) => format!("Record {key} is no longer listed."),
            Self::Closed => CLOSED_MESSAGE.to_owned(),
        }
    }

    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::MalformedResponse(_) | Self::Closed)
    }
}
