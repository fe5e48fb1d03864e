pub mod chat;
pub mod trace;
pub mod workspace;

pub use chat::{ChatRequest, ChatResponse, HealthResponse, StreamQuery, TraceStep};
pub use trace::{Mode, ParseModeError, TraceEvent};
pub use workspace::{FileContentResponse, FileKind, FileNode, SaveFileRequest, SaveFileResponse};
