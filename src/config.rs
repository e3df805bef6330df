// MIT License - Copyright (c) 2026 Peter Wright
// Panel configuration

use crate::error::{AlarmError, Result};
use crate::state::PanelState;

/// Maximum arming delay in seconds.
pub const MAX_DELAY_TIME: u64 = 300;
/// Maximum trigger auto-reset time in seconds.
pub const MAX_TRIGGER_TIME: u64 = 3600;

/// Which resting state an arm command works toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmMode {
    /// Partial/home arm
    Home,
    /// Full/away arm
    Away,
}

impl ArmMode {
    /// The resting state this mode resolves to.
    pub fn target_state(&self) -> PanelState {
        match self {
            Self::Home => PanelState::ArmedHome,
            Self::Away => PanelState::ArmedAway,
        }
    }
}

/// How arm/disarm actions are invoked.
///
/// Indicators are always fire-and-forget regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// Spawn the invocation and continue immediately (default). A slow
    /// external script never blocks the state machine.
    FireAndForget,
    /// Await the invocation before proceeding. The panel lock is not held
    /// while waiting.
    Blocking,
}

/// Configuration for a virtual alarm panel. Immutable after creation.
///
/// Every action, sensor, and indicator binding is optional; an absent
/// binding simply makes the corresponding invocation or feedback path a
/// no-op.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Display name of the panel
    pub name: String,
    /// Arm/disarm code. Empty string disables code checks entirely.
    pub code: String,
    /// Whether arm commands require the code (disarm always does when a
    /// code is set)
    pub code_arm_required: bool,
    /// Arming delay in seconds (0-300). 0 skips the Arming state.
    pub delay_time: u64,
    /// Trigger auto-reset time in seconds (0-3600). 0 disables auto-reset.
    pub trigger_time: u64,
    /// External action invoked by arm-home
    pub action_arm_home: Option<String>,
    /// External action invoked by disarm while armed-home
    pub action_disarm_home: Option<String>,
    /// External action invoked by arm-away
    pub action_arm_away: Option<String>,
    /// External action invoked by disarm while armed-away
    pub action_disarm_away: Option<String>,
    /// Binary sensor reporting ground-truth armed status
    pub sensor_armed: Option<String>,
    /// Binary sensor reporting ground-truth alarm status
    pub sensor_alarm: Option<String>,
    /// Indicator output mirroring armed status
    pub armed_indicator: Option<String>,
    /// Indicator output mirroring triggered status
    pub alarm_indicator: Option<String>,
    /// Invoke the external action before applying the local state change
    /// (default). When false, the local transition is applied first.
    pub invoke_before_transition: bool,
    /// Resting state assumed when the armed sensor confirms during Arming
    /// and no pending intent is recorded
    pub default_arm_mode: ArmMode,
    /// Invocation mode for arm/disarm actions
    pub action_mode: InvocationMode,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            name: "Synthetic Alarm".to_string(),
            code: String::new(),
            code_arm_required: false,
            delay_time: 30,
            trigger_time: 600,
            action_arm_home: None,
            action_disarm_home: None,
            action_arm_away: None,
            action_disarm_away: None,
            sensor_armed: None,
            sensor_alarm: None,
            armed_indicator: None,
            alarm_indicator: None,
            invoke_before_transition: true,
            default_arm_mode: ArmMode::Away,
            action_mode: InvocationMode::FireAndForget,
        }
    }
}

impl PanelConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> PanelConfigBuilder {
        PanelConfigBuilder::default()
    }

    /// Validate timing ranges.
    pub fn validate(&self) -> Result<()> {
        if self.delay_time > MAX_DELAY_TIME {
            return Err(AlarmError::InvalidConfig {
                field: "delay_time",
                reason: format!("{} exceeds maximum of {MAX_DELAY_TIME}", self.delay_time),
            });
        }
        if self.trigger_time > MAX_TRIGGER_TIME {
            return Err(AlarmError::InvalidConfig {
                field: "trigger_time",
                reason: format!("{} exceeds maximum of {MAX_TRIGGER_TIME}", self.trigger_time),
            });
        }
        Ok(())
    }

    /// Code entry format expected by the UI, or `None` when no code is set.
    pub fn code_format(&self) -> Option<&'static str> {
        if self.code.is_empty() { None } else { Some("number") }
    }

    /// The action bound to an arm command.
    pub fn arm_action(&self, mode: ArmMode) -> Option<&str> {
        match mode {
            ArmMode::Home => self.action_arm_home.as_deref(),
            ArmMode::Away => self.action_arm_away.as_deref(),
        }
    }

    /// The disarm action matching the panel's *current* state.
    ///
    /// Disarming from any state other than the two armed resting states
    /// invokes nothing.
    pub fn disarm_action(&self, state: PanelState) -> Option<&str> {
        match state {
            PanelState::ArmedHome => self.action_disarm_home.as_deref(),
            PanelState::ArmedAway => self.action_disarm_away.as_deref(),
            _ => None,
        }
    }
}

/// Builder for PanelConfig.
#[derive(Debug, Clone, Default)]
pub struct PanelConfigBuilder {
    config: PanelConfig,
}

impl PanelConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.config.code = code.into();
        self
    }

    pub fn code_arm_required(mut self, required: bool) -> Self {
        self.config.code_arm_required = required;
        self
    }

    pub fn delay_time(mut self, seconds: u64) -> Self {
        self.config.delay_time = seconds;
        self
    }

    pub fn trigger_time(mut self, seconds: u64) -> Self {
        self.config.trigger_time = seconds;
        self
    }

    pub fn action_arm_home(mut self, action: impl Into<String>) -> Self {
        self.config.action_arm_home = Some(action.into());
        self
    }

    pub fn action_disarm_home(mut self, action: impl Into<String>) -> Self {
        self.config.action_disarm_home = Some(action.into());
        self
    }

    pub fn action_arm_away(mut self, action: impl Into<String>) -> Self {
        self.config.action_arm_away = Some(action.into());
        self
    }

    pub fn action_disarm_away(mut self, action: impl Into<String>) -> Self {
        self.config.action_disarm_away = Some(action.into());
        self
    }

    pub fn sensor_armed(mut self, entity: impl Into<String>) -> Self {
        self.config.sensor_armed = Some(entity.into());
        self
    }

    pub fn sensor_alarm(mut self, entity: impl Into<String>) -> Self {
        self.config.sensor_alarm = Some(entity.into());
        self
    }

    pub fn armed_indicator(mut self, entity: impl Into<String>) -> Self {
        self.config.armed_indicator = Some(entity.into());
        self
    }

    pub fn alarm_indicator(mut self, entity: impl Into<String>) -> Self {
        self.config.alarm_indicator = Some(entity.into());
        self
    }

    pub fn invoke_before_transition(mut self, invoke_first: bool) -> Self {
        self.config.invoke_before_transition = invoke_first;
        self
    }

    pub fn default_arm_mode(mut self, mode: ArmMode) -> Self {
        self.config.default_arm_mode = mode;
        self
    }

    pub fn action_mode(mut self, mode: InvocationMode) -> Self {
        self.config.action_mode = mode;
        self
    }

    pub fn build(self) -> PanelConfig {
        self.config
    }
}
