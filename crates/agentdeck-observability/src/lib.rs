use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_PREFIX: &str = "agentdeck";

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    Tui,
    Cli,
}

impl ProcessKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessKind::Tui => "tui",
            ProcessKind::Cli => "cli",
        }
    }

    /// The full-screen TUI owns the terminal, so only the headless CLI logs to it.
    pub fn wants_console(self) -> bool {
        matches!(self, ProcessKind::Cli)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggingInitInfo {
    pub process: String,
    pub logs_dir: String,
    pub prefix: String,
    pub retention_days: u64,
    pub console: bool,
    pub initialized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ObservabilityEvent<'a> {
    pub event: &'a str,
    pub component: &'a str,
    pub thread_id: Option<&'a str>,
    pub turn_id: Option<&'a str>,
    pub node: Option<&'a str>,
    pub status: Option<&'a str>,
    pub error_code: Option<&'a str>,
    pub detail: Option<&'a str>,
}

pub fn redact_text(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!(
        "[redacted len={} hash={}]",
        trimmed.len(),
        short_hash(trimmed)
    )
}

pub fn short_hash(input: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    input.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

pub fn emit_event(level: Level, process: ProcessKind, event: ObservabilityEvent<'_>) {
    macro_rules! obs {
        ($mac:ident) => {
            tracing::$mac!(
                target: "agentdeck.obs",
                process = process.as_str(),
                component = event.component,
                event = event.event,
                thread_id = event.thread_id.unwrap_or(""),
                turn_id = event.turn_id.unwrap_or(""),
                node = event.node.unwrap_or(""),
                status = event.status.unwrap_or(""),
                error_code = event.error_code.unwrap_or(""),
                detail = event.detail.unwrap_or(""),
                "observability_event"
            )
        };
    }

    match level {
        Level::ERROR => obs!(error),
        Level::WARN => obs!(warn),
        Level::DEBUG | Level::TRACE => obs!(debug),
        _ => obs!(info),
    }
}

pub fn init_process_logging(
    process: ProcessKind,
    logs_dir: &Path,
    retention_days: u64,
) -> anyhow::Result<(WorkerGuard, LoggingInitInfo)> {
    fs::create_dir_all(logs_dir)?;
    cleanup_old_jsonl(logs_dir, process.as_str(), retention_days)?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(format!("{}.{}", LOG_PREFIX, process.as_str()))
        .filename_suffix("jsonl")
        .build(logs_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_current_span(false)
        .with_span_list(false);

    let console = process.wants_console();
    let console_layer = console.then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_ansi(true)
            .with_writer(std::io::stderr)
            .boxed()
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    let info = LoggingInitInfo {
        process: process.as_str().to_string(),
        logs_dir: logs_dir.display().to_string(),
        prefix: format!("{}.{}", LOG_PREFIX, process.as_str()),
        retention_days,
        console,
        initialized_at: Utc::now(),
    };

    Ok((guard, info))
}

fn cleanup_old_jsonl(logs_dir: &Path, process: &str, retention_days: u64) -> anyhow::Result<()> {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
    let prefix = format!("{}.{}.", LOG_PREFIX, process);

    for entry in fs::read_dir(logs_dir)? {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if !name.starts_with(&prefix) || !name.ends_with(".jsonl") {
            continue;
        }

        // agentdeck.<proc>.YYYY-MM-DD.jsonl
        let date_part = name.trim_start_matches(&prefix).trim_end_matches(".jsonl");

        let Ok(date) = chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d") else {
            continue;
        };

        let Some(dt) = date.and_hms_opt(0, 0, 0) else {
            continue;
        };

        if DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc) < cutoff {
            let _ = fs::remove_file(path);
        }
    }

    Ok(())
}

pub fn canonical_logs_dir_from_root(root: &Path) -> PathBuf {
    root.join("logs")
}

/// `<data dir>/agentdeck/logs`, falling back to a relative `.agentdeck/logs`.
pub fn default_logs_dir() -> PathBuf {
    let root = dirs::data_local_dir()
        .map(|d| d.join(LOG_PREFIX))
        .unwrap_or_else(|| PathBuf::from(".agentdeck"));
    canonical_logs_dir_from_root(&root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_text_masks_content() {
        let raw = "refactor the billing module";
        let redacted = redact_text(raw);
        assert!(redacted.contains("[redacted len="));
        assert!(!redacted.contains("billing"));
        assert_eq!(redact_text("   "), "");
    }

    #[test]
    fn canonical_logs_dir_joins_logs_folder() {
        let root = PathBuf::from("/tmp/agentdeck");
        assert_eq!(
            canonical_logs_dir_from_root(&root),
            PathBuf::from("/tmp/agentdeck").join("logs")
        );
    }

    #[test]
    fn cleanup_removes_only_expired_files_for_process() {
        let dir = tempfile::tempdir().expect("tempdir");
        let old = dir.path().join("agentdeck.tui.2001-01-01.jsonl");
        let fresh_name = format!("agentdeck.tui.{}.jsonl", Utc::now().format("%Y-%m-%d"));
        let fresh = dir.path().join(fresh_name);
        let other_process = dir.path().join("agentdeck.cli.2001-01-01.jsonl");
        for path in [&old, &fresh, &other_process] {
            fs::write(path, "{}\n").expect("write log fixture");
        }

        cleanup_old_jsonl(dir.path(), "tui", 7).expect("cleanup");

        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(other_process.exists());
    }

    #[test]
    fn only_cli_logs_to_console() {
        assert!(ProcessKind::Cli.wants_console());
        assert!(!ProcessKind::Tui.wants_console());
    }
}
