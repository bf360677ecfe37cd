use thiserror::Error;

/// Failures that never reached the recording service or whose reply was
/// lost on the way back. A channel that produced one must be discarded.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request cancelled by shutdown")]
    Cancelled,

    #[error("command channel already closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The service answered, but not in the shape the command expects.
    #[error("{command}: unexpected response ({reason}); body: {raw}")]
    Protocol {
        command: String,
        reason: String,
        raw: String,
    },

    /// Well-formed refusal from the service (non-2xx or negative status).
    #[error("{command} [{request_id}] rejected ({status}): {message}")]
    Application {
        command: String,
        request_id: String,
        status: i32,
        message: String,
    },

    #[error("client url discovery failed: {0}")]
    Discovery(String),

    #[error("client configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the session that produced this error must be dropped and
    /// reconnected before the next command.
    pub fn invalidates_session(&self) -> bool {
        match self {
            ClientError::Transport(_)
            | ClientError::Protocol { .. }
            | ClientError::Discovery(_) => true,
            ClientError::Application { .. } | ClientError::Config(_) => false,
        }
    }

    /// Backend said the named recording or archive does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ClientError::Application { status, .. } if *status == -404
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(TransportError::Request(e))
    }
}
