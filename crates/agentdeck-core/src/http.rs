use std::time::Duration;

use agentdeck_wire::{
    ChatRequest, ChatResponse, FileContentResponse, FileNode, HealthResponse, SaveFileRequest,
    SaveFileResponse, StreamQuery, TraceEvent,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::{DeckError, Result};
use crate::sse::{SseDecoder, SseFrame};
use crate::transport::{SignalStream, StreamRequest, StreamSignal, TraceTransport, WorkspaceBackend};

fn build_http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

// No overall timeout here: a turn may legitimately stream for a long time.
// Only connecting is bounded; waiting for headers is bounded by the session.
fn build_stream_client(connect_timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .http1_only()
        .connect_timeout(connect_timeout)
        .tcp_keepalive(Duration::from_secs(60))
        .build()?)
}

/// reqwest-backed client for both the agent stream and the file store.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    client: Client,
    stream_client: Client,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            client: build_http_client(config.request_timeout())?,
            stream_client: build_stream_client(config.request_timeout())?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn check_health(&self) -> Result<HealthResponse> {
        let response = self.client.get(self.url("/health")).send().await?;
        self.handle_response(response).await
    }

    /// Non-streaming chat: the whole trace arrives in one response.
    pub async fn chat_once(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!("Request to {} failed ({}): {}", url, status, preview(&body, 500));
            return Err(DeckError::Status {
                url,
                status: status.as_u16(),
                body: preview(&body, 200),
            });
        }

        tracing::debug!("Response from {}: {}", url, preview(&body, 500));
        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!("Failed to parse response from {}: {}", url, e);
            DeckError::Decode(e)
        })
    }
}

#[async_trait]
impl TraceTransport for HttpBackend {
    async fn open_stream(&self, request: &StreamRequest) -> Result<SignalStream> {
        let url = self.url("/api/chat/stream");
        let query = StreamQuery {
            message: request.message.clone(),
            mode: request.mode,
            thread_id: request.thread_id.clone(),
        };
        tracing::debug!("Opening chat stream at {} (mode={})", url, request.mode);

        let response = self
            .stream_client
            .get(&url)
            .header("Accept", "text/event-stream")
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeckError::Status {
                url,
                status: status.as_u16(),
                body: preview(&body, 200),
            });
        }

        let bytes = response.bytes_stream();
        let signals = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            futures::pin_mut!(bytes);

            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for frame in decoder.push(&chunk) {
                            yield decode_frame(frame);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Chat stream transport error: {}", e);
                        yield StreamSignal::Failed(e.to_string());
                        break;
                    }
                }
            }
            if decoder.pending() > 0 {
                tracing::debug!("Chat stream closed with {} undelimited bytes", decoder.pending());
            }
        };
        Ok(signals.boxed())
    }
}

#[async_trait]
impl WorkspaceBackend for HttpBackend {
    async fn fetch_tree(&self) -> Result<Vec<FileNode>> {
        let response = self.client.get(self.url("/api/files/tree")).send().await?;
        self.handle_response(response).await
    }

    async fn fetch_content(&self, path: &str) -> Result<String> {
        let response = self
            .client
            .get(self.url("/api/files/content"))
            .query(&[("path", path)])
            .send()
            .await?;
        let body: FileContentResponse = self.handle_response(response).await?;
        Ok(body.content)
    }

    async fn save_file(&self, request: &SaveFileRequest) -> Result<()> {
        let url = self.url("/api/files/save");
        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(DeckError::Status {
                url,
                status: status.as_u16(),
                body: preview(&body, 200),
            });
        }

        // The acknowledgement body is optional; only an explicit rejection counts.
        if let Ok(ack) = serde_json::from_str::<SaveFileResponse>(&body) {
            if ack.is_rejection() {
                return Err(DeckError::SaveRejected {
                    path: request.path.clone(),
                    detail: ack.detail.unwrap_or_else(|| "rejected".to_string()),
                });
            }
        }
        Ok(())
    }
}

fn decode_frame(frame: SseFrame) -> StreamSignal {
    match serde_json::from_str::<TraceEvent>(&frame.data) {
        Ok(event) => StreamSignal::Event(event),
        Err(e) => StreamSignal::Malformed {
            reason: e.to_string(),
            payload: frame.data,
        },
    }
}

fn preview(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}
