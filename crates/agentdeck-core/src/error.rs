use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed ({status}): {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Chat stream did not open within {0:?}")]
    OpenTimedOut(std::time::Duration),

    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("A turn is already streaming")]
    TurnInFlight,

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Save rejected for {path}: {detail}")]
    SaveRejected { path: String, detail: String },
}

impl DeckError {
    /// Errors caused by the network or the remote side rather than local misuse.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DeckError::Http(_)
                | DeckError::Status { .. }
                | DeckError::Decode(_)
                | DeckError::OpenTimedOut(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;
