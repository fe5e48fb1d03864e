pub mod config;
pub mod error;
pub mod http;
pub mod language;
pub mod messages;
pub mod normalize;
pub mod session;
pub mod sse;
pub mod transport;
pub mod workspace;

pub use config::{load_client_config, ClientConfig, ConfigLayers, DEFAULT_BASE_URL};
pub use error::{DeckError, Result};
pub use http::HttpBackend;
pub use language::EditorLanguage;
pub use messages::{ChatMessage, MessageLog, Role};
pub use normalize::normalize;
pub use session::{
    SessionController, SessionCore, SessionFlags, SessionPhase, TurnEnd, TurnInput, TurnStream,
    Update,
};
pub use sse::{SseDecoder, SseFrame};
pub use transport::{SignalStream, StreamRequest, StreamSignal, TraceTransport, WorkspaceBackend};
pub use workspace::{
    AlreadyConfirmed, DiscardGate, SaveOutcome, SelectOutcome, WorkspaceManager, WorkspaceState,
};
