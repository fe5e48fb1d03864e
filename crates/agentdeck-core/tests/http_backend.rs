use std::sync::Arc;
use std::time::Duration;

use agentdeck_core::{
    ClientConfig, DeckError, HttpBackend, SaveOutcome, SelectOutcome, SessionController, TurnEnd,
    WorkspaceBackend, WorkspaceManager,
};
use agentdeck_wire::{ChatRequest, FileNode, Mode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

struct Canned {
    status: &'static str,
    content_type: &'static str,
    chunks: Vec<String>,
}

impl Canned {
    fn json(status: &'static str, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            chunks: vec![body.to_string()],
        }
    }

    fn sse(chunks: &[&str]) -> Self {
        Self {
            status: "200 OK",
            content_type: "text/event-stream",
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.expect("read");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serves the canned responses in order, one connection each, and reports every
/// raw request it saw.
async fn spawn_server(responses: Vec<Canned>) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        for canned in responses {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let request = read_request(&mut socket).await;
            let _ = tx.send(request);

            let streaming = canned.content_type == "text/event-stream";
            let mut head = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nConnection: close\r\n",
                canned.status, canned.content_type
            );
            if !streaming {
                let len: usize = canned.chunks.iter().map(|c| c.len()).sum();
                head.push_str(&format!("Content-Length: {}\r\n", len));
            }
            head.push_str("\r\n");
            socket.write_all(head.as_bytes()).await.expect("write head");

            for chunk in &canned.chunks {
                socket.write_all(chunk.as_bytes()).await.expect("write chunk");
                socket.flush().await.expect("flush");
                if streaming {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
            let _ = socket.shutdown().await;
        }
    });
    (format!("http://{}", addr), rx)
}

fn backend(base_url: &str) -> Arc<HttpBackend> {
    let config = ClientConfig {
        base_url: base_url.to_string(),
        ..ClientConfig::default()
    };
    Arc::new(HttpBackend::new(&config).expect("backend"))
}

fn request_line(request: &str) -> &str {
    request.lines().next().unwrap_or("")
}

#[tokio::test]
async fn silent_server_times_out_the_open() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let _request = read_request(&mut socket).await;
        // Keep the connection open without ever answering.
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    let mut session = SessionController::new(backend(&format!("http://{}", addr)))
        .with_open_timeout(Some(Duration::from_millis(200)));
    let err = session.send("hello", Mode::Autonomy).await.unwrap_err();
    assert!(matches!(err, DeckError::OpenTimedOut(_)));
    assert!(!session.is_active());
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn streamed_turn_lands_in_message_log() {
    let (base, mut requests) = spawn_server(vec![Canned::sse(&[
        ": keep-alive\n\n",
        "data: {\"type\":\"message\",\"node\":\"planner\",",
        "\"content\":\"AIMessage(content='Listing...')\"}\n\n",
        "data: {\"type\":\"end\"}\n\n",
    ])])
    .await;
    let mut session = SessionController::new(backend(&base));

    session.send("list files", Mode::Plan).await.expect("send");
    assert_eq!(session.run_to_idle().await, Some(TurnEnd::Completed));

    let log = session.messages().as_slice();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].content(), "list files");
    assert_eq!(log[1].agent(), Some("planner"));
    assert_eq!(log[1].content(), "Listing...");
    assert!(!session.flags().loading && !session.flags().streaming);

    let request = requests.recv().await.expect("request");
    let line = request_line(&request);
    assert!(line.starts_with("GET /api/chat/stream?"), "{line}");
    assert!(line.contains("message=list+files"), "{line}");
    assert!(line.contains("mode=plan"), "{line}");
    assert!(line.contains(&format!("thread_id={}", session.thread_id())), "{line}");
    assert!(request
        .to_ascii_lowercase()
        .contains("accept: text/event-stream"));
}

#[tokio::test]
async fn agent_error_event_is_shown_and_ends_turn() {
    let (base, _requests) = spawn_server(vec![Canned::sse(&[
        "data: {\"type\":\"error\",\"message\":\"model overloaded\"}\n\n",
        "data: {\"type\":\"message\",\"node\":\"coder\",\"content\":\"late\"}\n\n",
    ])])
    .await;
    let mut session = SessionController::new(backend(&base));

    session.send("go", Mode::Build).await.expect("send");
    assert_eq!(session.run_to_idle().await, Some(TurnEnd::AgentError));
    let log = session.messages().as_slice();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].content(), "Error: model overloaded");
}

#[tokio::test]
async fn stream_closed_without_end_is_transport_failure() {
    let (base, _requests) = spawn_server(vec![Canned::sse(&[
        "data: not json\n\n",
        "data: {\"type\":\"message\",\"node\":\"coder\",\"content\":\"partial\"}\n\n",
    ])])
    .await;
    let mut session = SessionController::new(backend(&base));

    session.send("go", Mode::Autonomy).await.expect("send");
    assert_eq!(session.run_to_idle().await, Some(TurnEnd::TransportFailed));
    assert_eq!(session.messages().len(), 2);
    assert!(!session.is_active());
}

#[tokio::test]
async fn rejected_stream_open_returns_status_error() {
    let (base, _requests) =
        spawn_server(vec![Canned::json("503 Service Unavailable", "{\"detail\":\"down\"}")]).await;
    let mut session = SessionController::new(backend(&base));

    let err = session.send("go", Mode::Autonomy).await.unwrap_err();
    assert!(matches!(err, DeckError::Status { status: 503, .. }));
    assert!(!session.is_active());
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn workspace_round_trip_over_http() {
    let (base, mut requests) = spawn_server(vec![
        Canned::json(
            "200 OK",
            r#"[{"name":"a b.py","path":"/a b.py","type":"file"}]"#,
        ),
        Canned::json("200 OK", r#"{"content":"print(1)\n"}"#),
        Canned::json("200 OK", ""),
    ])
    .await;
    let mut workspace = WorkspaceManager::new(backend(&base));

    let tree = workspace.refresh_tree().await.expect("tree").to_vec();
    assert_eq!(tree, vec![FileNode::file("a b.py", "/a b.py")]);
    let outcome = workspace
        .select_file(&tree[0], &mut |_: &FileNode, _: &FileNode| true)
        .await
        .expect("select");
    assert_eq!(outcome, SelectOutcome::Loaded);
    assert_eq!(workspace.content(), "print(1)\n");

    assert!(workspace.edit("print(2)\n"));
    assert_eq!(workspace.save().await.expect("save"), SaveOutcome::Saved);
    assert!(!workspace.is_dirty());

    let tree_request = requests.recv().await.expect("tree request");
    assert!(request_line(&tree_request).starts_with("GET /api/files/tree "));
    let content_request = requests.recv().await.expect("content request");
    assert!(request_line(&content_request).contains("/api/files/content?path=%2Fa+b.py"));
    let save_request = requests.recv().await.expect("save request");
    assert!(request_line(&save_request).starts_with("POST /api/files/save "));
    let body = save_request.split("\r\n\r\n").nth(1).unwrap_or("");
    let body: serde_json::Value = serde_json::from_str(body).expect("save body");
    assert_eq!(
        body,
        serde_json::json!({ "path": "/a b.py", "content": "print(2)\n" })
    );
}

#[tokio::test]
async fn save_acknowledged_as_error_is_a_failure() {
    let (base, _requests) = spawn_server(vec![
        Canned::json("200 OK", r#"{"content":"x"}"#),
        Canned::json("200 OK", r#"{"status":"error","detail":"read-only"}"#),
    ])
    .await;
    let mut workspace = WorkspaceManager::new(backend(&base));
    let node = FileNode::file("x.txt", "/x.txt");
    workspace
        .select_file(&node, &mut |_: &FileNode, _: &FileNode| true)
        .await
        .expect("select");
    workspace.edit("y");

    let err = workspace.save().await.unwrap_err();
    assert!(matches!(err, DeckError::SaveRejected { ref detail, .. } if detail == "read-only"));
    assert!(workspace.is_dirty());
}

#[tokio::test]
async fn content_fetch_failure_is_reported() {
    let (base, _requests) =
        spawn_server(vec![Canned::json("404 Not Found", r#"{"detail":"missing"}"#)]).await;
    let http = backend(&base);
    let err = http.fetch_content("/missing.py").await.unwrap_err();
    assert!(matches!(err, DeckError::Status { status: 404, .. }));
}

#[tokio::test]
async fn health_and_one_shot_chat() {
    let (base, mut requests) = spawn_server(vec![
        Canned::json("200 OK", r#"{"status":"ok","version":"1.0.0"}"#),
        Canned::json(
            "200 OK",
            r#"{"status":"success","thread_id":"t-1","trace":[{"node":"coder","content":"done"}]}"#,
        ),
    ])
    .await;
    let http = backend(&base);

    let health = http.check_health().await.expect("health");
    assert_eq!(health.status, "ok");

    let response = http
        .chat_once(&ChatRequest {
            message: "hi".to_string(),
            mode: Mode::Build,
            thread_id: Some("t-1".to_string()),
        })
        .await
        .expect("chat");
    assert_eq!(response.trace.len(), 1);
    assert_eq!(response.trace[0].node, "coder");

    let _health_request = requests.recv().await.expect("health request");
    let chat_request = requests.recv().await.expect("chat request");
    assert!(request_line(&chat_request).starts_with("POST /api/chat "));
    assert!(chat_request.contains("\"mode\":\"build\""));
}
