use agentdeck_wire::{FileNode, Mode, SaveFileRequest, TraceEvent};
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

/// What the chat stream yields after framing and decoding, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    Event(TraceEvent),
    /// A frame whose payload is not a TraceEvent. The stream itself is still healthy.
    Malformed { payload: String, reason: String },
    /// The connection failed mid-stream. Nothing follows this signal.
    Failed(String),
}

pub type SignalStream = BoxStream<'static, StreamSignal>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub message: String,
    pub mode: Mode,
    pub thread_id: Option<String>,
}

/// Opens one unidirectional event stream per user turn. The returned stream ends
/// (`None`) when the server closes the connection.
#[async_trait]
pub trait TraceTransport: Send + Sync {
    async fn open_stream(&self, request: &StreamRequest) -> Result<SignalStream>;
}

/// Request/response contract of the remote file store.
#[async_trait]
pub trait WorkspaceBackend: Send + Sync {
    async fn fetch_tree(&self) -> Result<Vec<FileNode>>;

    async fn fetch_content(&self, path: &str) -> Result<String>;

    async fn save_file(&self, request: &SaveFileRequest) -> Result<()>;
}
