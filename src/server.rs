//! Command receiver: the Unix-domain-socket endpoint the agent talks to.
//!
//! One JSON command per line in, one acknowledgement per line out. Every
//! accepted command completes with an ack; failures fold into
//! `{status:"error"}` rather than hanging the connection or propagating.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use crate::config;
use crate::engine::RuleEngine;
use crate::error::AppError;
use crate::protocol::{self, Ack, Command};

pub struct CommandServer {
    listener: UnixListener,
    engine: Arc<RuleEngine>,
}

impl CommandServer {
    /// Bind the command socket, replacing a stale socket file left by a
    /// previous run.
    pub fn bind(path: &Path, engine: Arc<RuleEngine>) -> Result<Self, AppError> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        info!("Command socket listening at {}", path.display());
        Ok(Self { listener, engine })
    }

    /// Accept agent connections until the listener fails.
    pub async fn run(self) -> Result<(), AppError> {
        loop {
            let (stream, _) = self.listener.accept().await?;
            let engine = Arc::clone(&self.engine);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, engine).await {
                    debug!("Agent connection closed: {e}");
                }
            });
        }
    }
}

async fn handle_connection(stream: UnixStream, engine: Arc<RuleEngine>) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let ack = dispatch(&line, &engine).await;
        let payload = match serde_json::to_string(&ack) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode ack: {e}");
                continue;
            }
        };
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    Ok(())
}

/// Map one command line to its acknowledgement. Never fails: every error
/// becomes an error ack.
async fn dispatch(line: &str, engine: &Arc<RuleEngine>) -> Ack {
    let command = match protocol::parse_command(line) {
        Ok(command) => command,
        Err(e) => {
            warn!("Rejected command: {e}");
            return Ack::error(e);
        }
    };

    let result = match command {
        Command::EnableBlocking { domains } => engine
            .enable_blocking(domains)
            .await
            .map(|added| Ack::success().rules_added(added)),
        Command::DisableBlocking => engine.disable_blocking().await.map(|()| Ack::success()),
        Command::UpdateBlocklist { domains } => engine
            .update_blocklist(domains)
            .await
            .map(|total| Ack::success().total_domains(total)),
        Command::PauseProtection { minutes } => engine
            .pause_for(minutes.unwrap_or(config::DEFAULT_PAUSE_MINUTES))
            .await
            .map(|delay| Ack::success().resume_in_secs(delay.as_secs())),
        Command::WhitelistDomain { domain } => engine
            .add_to_whitelist(domain)
            .await
            .map(|size| Ack::success().whitelist_size(size)),
        Command::GetStatus => engine.status().await.map(|status| Ack {
            enabled: Some(status.enabled),
            total_domains: Some(status.domains.len()),
            whitelist_size: Some(status.whitelist_size),
            blocks_today: Some(status.blocks_today),
            resume_in_secs: status.pause_remaining.map(|d| d.as_secs()),
            ..Ack::success()
        }),
    };

    result.unwrap_or_else(|e| {
        warn!("Command failed: {e}");
        Ack::error(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{InMemoryRuleSink, Indicator, LogIndicator, RuleSink};
    use crate::store::StateStore;

    fn make_engine() -> (Arc<RuleEngine>, Arc<InMemoryRuleSink>) {
        let sink = Arc::new(InMemoryRuleSink::new());
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        let engine = RuleEngine::new(
            Arc::clone(&sink) as Arc<dyn RuleSink>,
            store,
            Arc::new(LogIndicator) as Arc<dyn Indicator>,
        );
        (engine, sink)
    }

    #[tokio::test]
    async fn test_dispatch_enable_acks_rule_count() {
        let (engine, sink) = make_engine();
        let ack = dispatch(
            r#"{"cmd":"enable_blocking","domains":["youtube.com","reddit.com"]}"#,
            &engine,
        )
        .await;

        assert_eq!(ack.status, protocol::AckStatus::Success);
        assert_eq!(ack.rules_added, Some(2));
        assert_eq!(sink.rule_count(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_update_acks_total_domains() {
        let (engine, _) = make_engine();
        let ack = dispatch(r#"{"cmd":"update_blocklist","domains":["x.com"]}"#, &engine).await;
        assert_eq!(ack.status, protocol::AckStatus::Success);
        assert_eq!(ack.total_domains, Some(1));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_command_acks_error() {
        let (engine, sink) = make_engine();
        let ack = dispatch(r#"{"cmd":"reboot"}"#, &engine).await;

        assert_eq!(ack.status, protocol::AckStatus::Error);
        let err = ack.error.unwrap();
        assert_eq!(err.kind(), "InvalidInput");
        assert!(err.to_string().contains("reboot"));
        assert_eq!(sink.rule_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_validation_failure_leaves_state_alone() {
        let (engine, sink) = make_engine();
        let ack = dispatch(r#"{"cmd":"enable_blocking","domains":["bad domain"]}"#, &engine).await;

        assert_eq!(ack.status, protocol::AckStatus::Error);
        assert_eq!(sink.rule_count(), 0);
        assert!(!engine.status().await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_dispatch_status_snapshot() {
        let (engine, _) = make_engine();
        dispatch(r#"{"cmd":"enable_blocking","domains":["a.com"]}"#, &engine).await;

        let ack = dispatch(r#"{"cmd":"get_status"}"#, &engine).await;
        assert_eq!(ack.enabled, Some(true));
        assert_eq!(ack.total_domains, Some(1));
        assert_eq!(ack.blocks_today, Some(0));
    }

    #[tokio::test]
    async fn test_socket_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("flowguard.sock");

        let (engine, _) = make_engine();
        let server = CommandServer::bind(&socket_path, engine).unwrap();
        let server_task = tokio::spawn(server.run());

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer
            .write_all(b"{\"cmd\":\"enable_blocking\",\"domains\":[\"youtube.com\"]}\n")
            .await
            .unwrap();
        let ack: serde_json::Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(ack["status"], "success");
        assert_eq!(ack["rules_added"], 1);

        // A second command on the same connection gets its own ack.
        writer.write_all(b"{\"cmd\":\"get_status\"}\n").await.unwrap();
        let ack: serde_json::Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(ack["enabled"], true);

        server_task.abort();
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("flowguard.sock");
        std::fs::write(&socket_path, b"stale").unwrap();

        let (engine, _) = make_engine();
        let server = CommandServer::bind(&socket_path, engine);
        assert!(server.is_ok());
    }
}
