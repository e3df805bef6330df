// MIT License - Copyright (c) 2026 Peter Wright
//
//! # synthetic-alarm
//!
//! A virtual security-alarm panel. The panel owns no hardware: arming and
//! disarming are delegated to named external actions (scripts), ground truth
//! comes back from external armed/alarm sensors, and the panel reconciles
//! the two into a single authoritative state machine with arming-delay and
//! trigger auto-reset timers.
//!
//! No external dependencies beyond tokio, thiserror, tracing, and
//! async-trait.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use synthetic_alarm::{AlarmPanel, BinaryState, LoggingInvoker, PanelConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PanelConfig::builder()
//!         .name("House")
//!         .code("1234")
//!         .delay_time(30)
//!         .trigger_time(600)
//!         .action_arm_away("script.alarm_arm_away")
//!         .action_disarm_away("script.alarm_disarm_away")
//!         .sensor_armed("binary_sensor.alarm_armed")
//!         .build();
//!
//!     let panel = AlarmPanel::new(config, Arc::new(LoggingInvoker))?;
//!
//!     let mut events = panel.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     panel.arm_away(None).await;
//!     // External confirmation resolves the arming sequence early.
//!     panel.sensor_changed("binary_sensor.alarm_armed", BinaryState::On).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod invoker;
pub mod panel;
pub mod state;

// Re-exports for convenience
pub use config::{ArmMode, InvocationMode, PanelConfig, PanelConfigBuilder};
pub use error::{AlarmError, Result};
pub use event::{EventReceiver, PanelEvent, event_channel};
pub use invoker::{ActionInvoker, LoggingInvoker, NullInvoker, RecordingInvoker};
pub use panel::{AlarmPanel, CommandOutcome};
pub use state::{BinaryState, PanelState};
