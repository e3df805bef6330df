// MIT License - Copyright (c) 2026 Peter Wright
// Outbound action/indicator collaborator

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::error::{AlarmError, Result};

/// Outbound collaborator the panel uses to effect real-world changes.
///
/// The host platform's entity/service registry sits behind this trait: the
/// panel only knows bindings by identifier. Inject a fake implementation to
/// test the state machine in isolation.
#[async_trait]
pub trait ActionInvoker: Send + Sync {
    /// Invoke a named external action (e.g., a script entity).
    async fn invoke_action(&self, action: &str) -> Result<()>;

    /// Turn a named indicator output on or off.
    async fn set_indicator(&self, indicator: &str, on: bool) -> Result<()>;
}

/// Invoker that logs every call and always succeeds.
///
/// Used by the simulator binary, where no real host platform exists.
pub struct LoggingInvoker;

#[async_trait]
impl ActionInvoker for LoggingInvoker {
    async fn invoke_action(&self, action: &str) -> Result<()> {
        info!("Invoking action {action}");
        Ok(())
    }

    async fn set_indicator(&self, indicator: &str, on: bool) -> Result<()> {
        info!("Setting indicator {indicator} {}", if on { "on" } else { "off" });
        Ok(())
    }
}

/// Invoker that silently discards every call.
pub struct NullInvoker;

#[async_trait]
impl ActionInvoker for NullInvoker {
    async fn invoke_action(&self, _action: &str) -> Result<()> {
        Ok(())
    }

    async fn set_indicator(&self, _indicator: &str, _on: bool) -> Result<()> {
        Ok(())
    }
}

/// Invoker that records every call, for tests.
///
/// Optionally fails all action invocations to exercise the containment
/// policy (a failed external action never blocks a local transition), or
/// delays them to exercise interleavings around slow external calls.
#[derive(Default)]
pub struct RecordingInvoker {
    actions: Mutex<Vec<String>>,
    indicators: Mutex<Vec<(String, bool)>>,
    fail_actions: Mutex<bool>,
    action_delay: Mutex<Option<std::time::Duration>>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `invoke_action` fail with `ActionInvocation`.
    pub fn fail_actions(&self, fail: bool) {
        *self.fail_actions.lock().unwrap() = fail;
    }

    /// Make every subsequent `invoke_action` sleep this long before
    /// returning.
    pub fn set_action_delay(&self, delay: std::time::Duration) {
        *self.action_delay.lock().unwrap() = Some(delay);
    }

    /// Actions invoked so far, in call order.
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    /// Indicator updates so far, in call order.
    pub fn indicators(&self) -> Vec<(String, bool)> {
        self.indicators.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionInvoker for RecordingInvoker {
    async fn invoke_action(&self, action: &str) -> Result<()> {
        self.actions.lock().unwrap().push(action.to_string());
        let delay = *self.action_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_actions.lock().unwrap() {
            return Err(AlarmError::ActionInvocation {
                action: action.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    async fn set_indicator(&self, indicator: &str, on: bool) -> Result<()> {
        self.indicators.lock().unwrap().push((indicator.to_string(), on));
        Ok(())
    }
}
