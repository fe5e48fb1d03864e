use std::sync::Arc;

use agentdeck_core::{
    normalize, ChatMessage, ClientConfig, HttpBackend, SessionController, TurnEnd, Update,
};
use agentdeck_observability::ProcessKind;
use agentdeck_wire::{ChatRequest, ChatResponse, Mode};
use anyhow::Context;

pub fn format_message(message: &ChatMessage) -> String {
    match (message.is_user(), message.agent()) {
        (true, _) => format!("> {}", message.content()),
        (false, Some(agent)) => format!("[{}] {}", agent, message.content()),
        (false, None) => message.content().to_string(),
    }
}

/// Streams one turn to stdout. Ctrl-C cancels the turn.
pub async fn run_prompt(config: &ClientConfig, prompt: &str, mode: Mode) -> anyhow::Result<TurnEnd> {
    let backend = Arc::new(HttpBackend::new(config).context("invalid client configuration")?);
    let mut session = SessionController::new(backend)
        .with_stall_timeout(config.stall_timeout())
        .with_open_timeout(Some(config.request_timeout()))
        .with_process(ProcessKind::Cli);

    // Dropping the pending send ends the turn, so Ctrl-C works before the
    // stream is up too.
    let opened = tokio::select! {
        opened = session.send(prompt, mode) => opened,
        Ok(()) = tokio::signal::ctrl_c() => {
            eprintln!("Cancelled.");
            return Ok(TurnEnd::Cancelled);
        }
    };
    opened.with_context(|| format!("failed to open chat stream at {}", config.base_url))?;

    let cancel = session.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if let Some(cancel) = cancel {
                cancel.cancel();
            }
        }
    });

    let end = loop {
        match session.next_update().await {
            Some(Update::Appended(index)) => {
                if let Some(message) = session.messages().get(index) {
                    println!("{}", format_message(message));
                }
            }
            Some(Update::Finished(end)) => {
                if end == TurnEnd::AgentError {
                    if let Some(notice) = session.messages().last() {
                        eprintln!("{}", format_message(notice));
                    }
                }
                break end;
            }
            Some(Update::Skipped) | Some(Update::Ignored) => {}
            None => break TurnEnd::TransportFailed,
        }
    };
    interrupt.abort();

    match end {
        TurnEnd::TransportFailed => eprintln!("Connection to the agent was lost."),
        TurnEnd::Stalled => eprintln!("The agent stopped responding."),
        TurnEnd::Cancelled => eprintln!("Cancelled."),
        TurnEnd::Completed | TurnEnd::AgentError => {}
    }
    Ok(end)
}

/// Trace steps of a one-shot reply, in the same shape the stream produces.
pub fn trace_messages(response: &ChatResponse) -> Vec<ChatMessage> {
    response
        .trace
        .iter()
        .map(|step| ChatMessage::assistant(step.node.clone(), normalize(&step.content)))
        .collect()
}

/// Runs one turn through the non-streaming endpoint and prints the whole trace
/// once it is done.
pub async fn run_once(config: &ClientConfig, prompt: &str, mode: Mode) -> anyhow::Result<()> {
    if prompt.trim().is_empty() {
        anyhow::bail!("prompt is empty");
    }
    let backend = HttpBackend::new(config).context("invalid client configuration")?;
    let response = backend
        .chat_once(&ChatRequest {
            message: prompt.to_string(),
            mode,
            thread_id: None,
        })
        .await
        .with_context(|| format!("chat request to {} failed", backend.base_url()))?;

    println!("{}", format_message(&ChatMessage::user(prompt)));
    for message in trace_messages(&response) {
        println!("{}", format_message(&message));
    }
    if response.status != "success" {
        anyhow::bail!("agent reported status {}", response.status);
    }
    Ok(())
}

pub async fn check_health(config: &ClientConfig) -> anyhow::Result<()> {
    let backend = HttpBackend::new(config).context("invalid client configuration")?;
    let health = backend
        .check_health()
        .await
        .with_context(|| format!("agent backend at {} is unreachable", backend.base_url()))?;
    match health.version {
        Some(version) => println!("{}: {} (version {})", backend.base_url(), health.status, version),
        None => println!("{}: {}", backend.base_url(), health.status),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_message_kind() {
        assert_eq!(format_message(&ChatMessage::user("list files")), "> list files");
        assert_eq!(
            format_message(&ChatMessage::assistant("planner", "Listing...")),
            "[planner] Listing..."
        );
        assert_eq!(
            format_message(&ChatMessage::assistant_notice("Error: boom")),
            "Error: boom"
        );
    }

    #[test]
    fn one_shot_trace_is_normalized_per_step() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"status":"success","thread_id":null,"trace":[
                {"node":"planner","content":"AIMessage(content='Plan:\\n1. ls')"},
                {"node":"coder","content":"done"}
            ]}"#,
        )
        .expect("chat response");
        let lines: Vec<String> = trace_messages(&response).iter().map(format_message).collect();
        assert_eq!(lines, vec!["[planner] Plan:\n1. ls", "[coder] done"]);
    }
}
