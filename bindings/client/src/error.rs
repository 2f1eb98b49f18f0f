use std::fmt;

/// The calls that the client makes, used to describe failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapeOperation {
    Stage,
    Status,
    Cancel,
    ArchiveInfo,
}

impl fmt::Display for TapeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TapeOperation::Stage => "Stage",
            TapeOperation::Status => "Status",
            TapeOperation::Cancel => "Cancel",
            TapeOperation::ArchiveInfo => "Archive info",
        })
    }
}

/// Errors from calls to the tape service.
///
/// The messages end up in the failures report, so they are kept stable.
#[derive(Debug, thiserror::Error)]
pub enum TapeError {
    /// The request did not complete, for example the connection was refused or timed out.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("{operation} failed with status {status}")]
    UnexpectedStatus {
        operation: TapeOperation,
        status: u16,
    },

    #[error("No requestId in response")]
    MissingRequestId,

    #[error("JSON parse error: {0}")]
    MalformedResponse(String),

    #[error("Invalid tape service URL: {0}")]
    InvalidUrl(String),
}

impl TapeError {
    pub(crate) fn unexpected_status(operation: TapeOperation, status: reqwest::StatusCode) -> Self {
        TapeError::UnexpectedStatus {
            operation,
            status: status.as_u16(),
        }
    }

    /// Whether the service answered, but not in the way that the protocol expects.
    pub fn is_protocol_error(&self) -> bool {
        !matches!(self, TapeError::Transport(_) | TapeError::InvalidUrl(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages() {
        assert_eq!(
            "Stage failed with status 503",
            TapeError::UnexpectedStatus {
                operation: TapeOperation::Stage,
                status: 503
            }
            .to_string()
        );
        assert_eq!(
            "No requestId in response",
            TapeError::MissingRequestId.to_string()
        );
        assert_eq!(
            "JSON parse error: expected value at line 1 column 1",
            TapeError::MalformedResponse("expected value at line 1 column 1".to_string())
                .to_string()
        );
        assert!(TapeError::MissingRequestId.is_protocol_error());
    }
}
