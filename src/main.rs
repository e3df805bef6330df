// MIT License - Copyright (c) 2026 Peter Wright
// Interactive panel simulator

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};

use synthetic_alarm::{
    AlarmPanel, ArmMode, BinaryState, InvocationMode, LoggingInvoker, PanelConfig, PanelEvent,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "synthetic-alarm")]
#[command(about = "Run a virtual alarm panel driven by JSON commands on stdin")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    panel: PanelToml,
}

#[derive(Debug, Deserialize)]
struct PanelToml {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    code_arm_required: bool,
    #[serde(default = "default_delay_time")]
    delay_time: u64,
    #[serde(default = "default_trigger_time")]
    trigger_time: u64,
    #[serde(default)]
    action_arm_home: Option<String>,
    #[serde(default)]
    action_disarm_home: Option<String>,
    #[serde(default)]
    action_arm_away: Option<String>,
    #[serde(default)]
    action_disarm_away: Option<String>,
    #[serde(default)]
    sensor_armed: Option<String>,
    #[serde(default)]
    sensor_alarm: Option<String>,
    #[serde(default)]
    armed_indicator: Option<String>,
    #[serde(default)]
    alarm_indicator: Option<String>,
    #[serde(default = "default_invoke_before")]
    invoke_before_transition: bool,
    #[serde(default = "default_arm_mode")]
    default_arm_mode: String,
    #[serde(default = "default_action_mode")]
    action_mode: String,
}

fn default_name() -> String {
    "Synthetic Alarm".to_string()
}
fn default_delay_time() -> u64 {
    30
}
fn default_trigger_time() -> u64 {
    600
}
fn default_invoke_before() -> bool {
    true
}
fn default_arm_mode() -> String {
    "away".to_string()
}
fn default_action_mode() -> String {
    "fire_and_forget".to_string()
}

fn parse_arm_mode(s: &str) -> Result<ArmMode> {
    match s.to_lowercase().as_str() {
        "home" => Ok(ArmMode::Home),
        "away" => Ok(ArmMode::Away),
        other => anyhow::bail!("Unknown arm mode: {other}"),
    }
}

fn parse_action_mode(s: &str) -> Result<InvocationMode> {
    match s.to_lowercase().as_str() {
        "fire_and_forget" => Ok(InvocationMode::FireAndForget),
        "blocking" => Ok(InvocationMode::Blocking),
        other => anyhow::bail!("Unknown action mode: {other}"),
    }
}

fn build_panel_config(toml: &PanelToml) -> Result<PanelConfig> {
    let mut builder = PanelConfig::builder()
        .name(&toml.name)
        .code(&toml.code)
        .code_arm_required(toml.code_arm_required)
        .delay_time(toml.delay_time)
        .trigger_time(toml.trigger_time)
        .invoke_before_transition(toml.invoke_before_transition)
        .default_arm_mode(parse_arm_mode(&toml.default_arm_mode)?)
        .action_mode(parse_action_mode(&toml.action_mode)?);

    if let Some(a) = &toml.action_arm_home {
        builder = builder.action_arm_home(a);
    }
    if let Some(a) = &toml.action_disarm_home {
        builder = builder.action_disarm_home(a);
    }
    if let Some(a) = &toml.action_arm_away {
        builder = builder.action_arm_away(a);
    }
    if let Some(a) = &toml.action_disarm_away {
        builder = builder.action_disarm_away(a);
    }
    if let Some(s) = &toml.sensor_armed {
        builder = builder.sensor_armed(s);
    }
    if let Some(s) = &toml.sensor_alarm {
        builder = builder.sensor_alarm(s);
    }
    if let Some(i) = &toml.armed_indicator {
        builder = builder.armed_indicator(i);
    }
    if let Some(i) = &toml.alarm_indicator {
        builder = builder.alarm_indicator(i);
    }
    Ok(builder.build())
}

// ---------------------------------------------------------------------------
// Stdin commands
// ---------------------------------------------------------------------------

// Inbound commands — flat {op, ...} JSON objects, one per line:
//   {"op": "ARM_HOME", "code": "1234"}
//   {"op": "SENSOR", "entity": "binary_sensor.alarm_armed", "state": "on"}
#[derive(Deserialize)]
struct Command {
    op: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    entity: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

async fn handle_command(cmd: Command, panel: &AlarmPanel) {
    match cmd.op.as_str() {
        "ARM_HOME" => {
            let outcome = panel.arm_home(cmd.code.as_deref()).await;
            info!("ARM_HOME: {outcome:?}");
        }

        "ARM_AWAY" => {
            let outcome = panel.arm_away(cmd.code.as_deref()).await;
            info!("ARM_AWAY: {outcome:?}");
        }

        "DISARM" => {
            let outcome = panel.disarm(cmd.code.as_deref()).await;
            info!("DISARM: {outcome:?}");
        }

        "TRIGGER" => {
            let outcome = panel.trigger(cmd.code.as_deref()).await;
            info!("TRIGGER: {outcome:?}");
        }

        "SENSOR" => {
            let (Some(entity), Some(raw)) = (cmd.entity, cmd.state) else {
                warn!("SENSOR: missing entity or state");
                return;
            };
            let Some(value) = BinaryState::parse(&raw) else {
                warn!("SENSOR: unparseable state {raw:?} for {entity}");
                return;
            };
            panel.sensor_changed(&entity, value).await;
        }

        "STATE" => {
            info!("Current state: {}", panel.current_state().await);
        }

        "PING" => {
            info!("PONG");
        }

        other => {
            warn!("Unknown command: {other}");
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=synthetic_alarm=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    let config_text =
        std::fs::read_to_string(&cli.config).context("Failed to read config file")?;
    let config: Config = toml::from_str(&config_text).context("Failed to parse config file")?;
    let panel_config = build_panel_config(&config.panel)?;

    info!("Starting panel {:?}", panel_config.name);
    let panel = Arc::new(AlarmPanel::new(panel_config, Arc::new(LoggingInvoker))?);

    // Task 1: event printer
    let mut events = panel.subscribe();
    let event_handle = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PanelEvent::StateChanged { old, new }) => {
                    info!("State changed: {old} -> {new}");
                }
                Ok(PanelEvent::CommandRejected { command }) => {
                    warn!("Command rejected (invalid code): {command}");
                }
                Ok(PanelEvent::ActionFailed { action }) => {
                    warn!("External action failed: {action}");
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event receiver lagged, missed {n} events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    info!("Event channel closed");
                    break;
                }
            }
        }
    });

    // Task 2: stdin command loop
    let panel_cmds = Arc::clone(&panel);
    let stdin_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Command>(line) {
                        Ok(cmd) => handle_command(cmd, &panel_cmds).await,
                        Err(e) => warn!("Failed to parse command: {e}"),
                    }
                }
                Ok(None) => {
                    info!("stdin closed");
                    break;
                }
                Err(e) => {
                    warn!("Error reading stdin: {e}");
                    break;
                }
            }
        }
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    info!("Panel running. Send SIGINT/SIGTERM to stop.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    event_handle.abort();
    stdin_handle.abort();
    info!("Shutdown complete");
    Ok(())
}
