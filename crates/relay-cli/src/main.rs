//! # relay-cli
//!
//! Room relay server binary: loads settings, wires the server, and runs it
//! until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relay_server::{ServerConfig, TrackedTask};
use relay_settings::RelaySettings;

/// Room relay server.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "Real-time chat room relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.relay/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Load the settings file and apply command-line overrides on top.
    fn resolve_settings(&self) -> Result<RelaySettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(relay_settings::settings_path);
        let mut settings = relay_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.resolve_settings()?;

    relay_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);
    let metrics = relay_server::metrics::install_recorder();

    let mut server = relay_server::build(&settings, ServerConfig::from(&settings), Some(metrics))
        .context("Failed to build server")?;
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("relay listening on http://{addr} (websocket at ws://{addr}/ws)");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    let mut tasks = vec![TrackedTask::new("http", handle)];
    if let Some(hub_task) = server.take_hub_task() {
        tasks.push(TrackedTask::new("hub", hub_task));
    }
    let aborted = server.shutdown().graceful_shutdown(tasks).await;
    if !aborted.is_empty() {
        tracing::warn!(?aborted, "forced shutdown");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["relay"]);
        assert_eq!(cli.host, None);
        assert_eq!(cli.port, None);
        assert_eq!(cli.config, None);
        assert!(!cli.json_logs);
    }

    #[test]
    fn cli_custom_port_and_host() {
        let cli = Cli::parse_from(["relay", "--host", "127.0.0.1", "--port", "9000"]);
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(cli.port, Some(9000));
    }

    #[test]
    fn cli_rejects_bad_port() {
        assert!(Cli::try_parse_from(["relay", "--port", "99999"]).is_err());
    }

    #[test]
    fn overrides_apply_over_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"host": "10.0.0.1", "port": 7000}, "messages": {"maxLength": 280}}"#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "relay",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "7100",
            "--log-level",
            "debug",
        ]);
        let settings = cli.resolve_settings().unwrap();
        assert_eq!(settings.server.host, "10.0.0.1");
        assert_eq!(settings.server.port, 7100);
        assert_eq!(settings.messages.max_length, 280);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn missing_settings_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let cli = Cli::parse_from(["relay", "--config", path.to_str().unwrap()]);
        let settings = cli.resolve_settings().unwrap();
        assert_eq!(settings.messages.max_length, RelaySettings::default().messages.max_length);
    }

    #[test]
    fn invalid_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let cli = Cli::parse_from(["relay", "--config", path.to_str().unwrap()]);
        assert!(cli.resolve_settings().is_err());
    }
}
