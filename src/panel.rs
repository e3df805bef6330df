// MIT License - Copyright (c) 2026 Peter Wright
// Alarm panel state machine

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::config::{ArmMode, InvocationMode, PanelConfig};
use crate::error::Result;
use crate::event::{EventReceiver, EventSender, PanelEvent, event_channel};
use crate::invoker::ActionInvoker;
use crate::state::{BinaryState, PanelState};

/// Outcome of a panel command.
///
/// An invalid code is a rejection, not a hard error: the command returns
/// normally, the state is unchanged, and a warning is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted,
    InvalidCode,
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// A virtual alarm control panel.
///
/// The panel delegates real-world arming to external actions and reconciles
/// its local state with ground-truth sensor feedback. Commands and sensor
/// notifications are serialized on an internal lock; external invocations
/// happen outside that lock so a slow action can never stall a transition.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use synthetic_alarm::{AlarmPanel, BinaryState, LoggingInvoker, PanelConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = PanelConfig::builder()
///         .name("House")
///         .delay_time(30)
///         .action_arm_away("script.arm_away")
///         .sensor_armed("binary_sensor.alarm_armed")
///         .build();
///
///     let panel = AlarmPanel::new(config, Arc::new(LoggingInvoker))?;
///
///     let mut events = panel.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             println!("Event: {:?}", event);
///         }
///     });
///
///     panel.arm_away(None).await;
///     panel.sensor_changed("binary_sensor.alarm_armed", BinaryState::On).await;
///     Ok(())
/// }
/// ```
pub struct AlarmPanel {
    inner: Arc<PanelInner>,
}

struct PanelInner {
    config: PanelConfig,
    invoker: Arc<dyn ActionInvoker>,
    event_tx: EventSender,
    core: Mutex<Core>,
}

/// Mutable panel state, guarded by the panel lock. Every transition is
/// applied and published while this lock is held, so observers see
/// transitions in order and none is coalesced.
struct Core {
    state: PanelState,
    /// Target of the in-flight arming sequence. At most one exists; a new
    /// arm command replaces it.
    pending: Option<ArmMode>,
    /// Bumped whenever an arming sequence is superseded; an outstanding
    /// delay timer compares it before resolving.
    arming_seq: u64,
    /// Same, for the trigger auto-reset timer.
    trigger_seq: u64,
    arming_timer: Option<JoinHandle<()>>,
    trigger_timer: Option<JoinHandle<()>>,
}

impl Core {
    fn new() -> Self {
        Self {
            state: PanelState::Disarmed,
            pending: None,
            arming_seq: 0,
            trigger_seq: 0,
            arming_timer: None,
            trigger_timer: None,
        }
    }

    /// Invalidate any outstanding arming-delay timer.
    fn cancel_arming_timer(&mut self) {
        self.arming_seq += 1;
        if let Some(h) = self.arming_timer.take() {
            h.abort();
        }
    }

    /// Invalidate any outstanding trigger auto-reset timer.
    fn cancel_trigger_timer(&mut self) {
        self.trigger_seq += 1;
        if let Some(h) = self.trigger_timer.take() {
            h.abort();
        }
    }
}

impl AlarmPanel {
    /// Create a panel in the Disarmed state.
    pub fn new(config: PanelConfig, invoker: Arc<dyn ActionInvoker>) -> Result<Self> {
        config.validate()?;
        debug!("Creating alarm panel {:?}", config.name);
        let (event_tx, _event_rx) = event_channel(64);
        Ok(Self {
            inner: Arc::new(PanelInner {
                config,
                invoker,
                event_tx,
                core: Mutex::new(Core::new()),
            }),
        })
    }

    /// Subscribe to panel events.
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.event_tx.subscribe()
    }

    pub fn config(&self) -> &PanelConfig {
        &self.inner.config
    }

    /// Current panel state.
    pub async fn current_state(&self) -> PanelState {
        self.inner.core.lock().await.state
    }

    /// Disarm the panel.
    ///
    /// The disarm action is chosen from the state *before* the transition:
    /// armed-home invokes the disarm-home action, armed-away the disarm-away
    /// action, and any other state invokes nothing.
    pub async fn disarm(&self, code: Option<&str>) -> CommandOutcome {
        if !self.code_ok_for_disarm(code) {
            warn!("Invalid code provided for disarming");
            self.inner.send_event(PanelEvent::CommandRejected { command: "disarm" });
            return CommandOutcome::InvalidCode;
        }

        let inner = &self.inner;
        let (action, seq) = {
            let mut core = inner.core.lock().await;
            let action = inner.config.disarm_action(core.state).map(str::to_string);
            core.cancel_arming_timer();
            core.cancel_trigger_timer();
            core.pending = None;
            if !inner.config.invoke_before_transition {
                inner.apply_transition(&mut core, PanelState::Disarmed);
            }
            (action, core.arming_seq)
        };

        inner.dispatch_action(action.as_deref()).await;

        if inner.config.invoke_before_transition {
            let mut core = inner.core.lock().await;
            // Skip if a newer command took over while the action ran.
            if core.arming_seq == seq {
                inner.apply_transition(&mut core, PanelState::Disarmed);
            }
        }
        CommandOutcome::Accepted
    }

    /// Arm the panel for home mode.
    pub async fn arm_home(&self, code: Option<&str>) -> CommandOutcome {
        self.arm(ArmMode::Home, code).await
    }

    /// Arm the panel for away mode.
    pub async fn arm_away(&self, code: Option<&str>) -> CommandOutcome {
        self.arm(ArmMode::Away, code).await
    }

    /// Arm the panel toward the given mode.
    ///
    /// With a non-zero delay the panel enters Arming and resolves when the
    /// delay elapses or the armed sensor confirms, whichever comes first.
    /// With zero delay it resolves immediately. Either way the resolution
    /// assumes success when no sensor feedback has arrived.
    pub async fn arm(&self, mode: ArmMode, code: Option<&str>) -> CommandOutcome {
        let command = match mode {
            ArmMode::Home => "arm_home",
            ArmMode::Away => "arm_away",
        };
        if !self.code_ok_for_arm(code) {
            warn!("Invalid code provided for arming ({command})");
            self.inner.send_event(PanelEvent::CommandRejected { command });
            return CommandOutcome::InvalidCode;
        }

        let inner = &self.inner;
        let action = inner.config.arm_action(mode).map(str::to_string);

        let seq = {
            let mut core = inner.core.lock().await;
            // A new arm command supersedes any in-flight arming sequence.
            core.cancel_arming_timer();
            core.pending = Some(mode);
            if !inner.config.invoke_before_transition {
                PanelInner::enter_arming(inner, &mut core);
            }
            core.arming_seq
        };

        inner.dispatch_action(action.as_deref()).await;

        if inner.config.invoke_before_transition {
            let mut core = inner.core.lock().await;
            // Skip if a newer command took over while the action ran.
            if core.arming_seq == seq {
                PanelInner::enter_arming(inner, &mut core);
            }
        }
        CommandOutcome::Accepted
    }

    /// Trigger the alarm.
    ///
    /// Unconditional: the code is accepted for interface symmetry but not
    /// validated. With a non-zero trigger time the panel auto-resets to
    /// Disarmed after that long, unless the state changed meanwhile.
    pub async fn trigger(&self, _code: Option<&str>) -> CommandOutcome {
        info!("Trigger command received");
        let mut core = self.inner.core.lock().await;
        PanelInner::enter_triggered(&self.inner, &mut core);
        CommandOutcome::Accepted
    }

    /// Handle an asynchronous state change from a bound sensor.
    ///
    /// The armed sensor is authoritative: "on" during Arming resolves the
    /// pending intent early, "off" while armed disarms the panel without a
    /// disarm command. The alarm sensor triggers and clears the alarm; when
    /// one entity is bound as both sensors, an alarm-sensor Triggered
    /// transition wins over the armed-sensor resolution of the same reading.
    pub async fn sensor_changed(&self, entity: &str, value: BinaryState) {
        let inner = &self.inner;
        let is_armed_sensor = inner.config.sensor_armed.as_deref() == Some(entity);
        let is_alarm_sensor = inner.config.sensor_alarm.as_deref() == Some(entity);
        if !is_armed_sensor && !is_alarm_sensor {
            debug!("Ignoring change from unbound sensor {entity}");
            return;
        }

        let mut core = inner.core.lock().await;
        debug!("Sensor {entity} changed to {value} (state: {})", core.state);

        // Armed-sensor logic first; the alarm sensor may override below.
        let mut next: Option<PanelState> = None;
        if is_armed_sensor {
            match value {
                BinaryState::On if core.state == PanelState::Arming => {
                    let mode = core.pending.unwrap_or(inner.config.default_arm_mode);
                    next = Some(mode.target_state());
                }
                BinaryState::Off if core.state.is_armed() => {
                    next = Some(PanelState::Disarmed);
                }
                _ => {}
            }
        }
        if is_alarm_sensor {
            match value {
                BinaryState::On if core.state != PanelState::Triggered => {
                    next = Some(PanelState::Triggered);
                }
                BinaryState::Off if core.state == PanelState::Triggered => {
                    next = Some(PanelState::Disarmed);
                }
                _ => {}
            }
        }

        match next {
            Some(PanelState::Triggered) => {
                info!("Alarm sensor reports on, triggering");
                PanelInner::enter_triggered(inner, &mut core);
            }
            Some(new) => {
                core.cancel_arming_timer();
                if new == PanelState::Disarmed {
                    core.cancel_trigger_timer();
                }
                inner.apply_transition(&mut core, new);
            }
            None => {}
        }
    }

    fn code_ok_for_disarm(&self, code: Option<&str>) -> bool {
        let config = &self.inner.config;
        config.code.is_empty() || code == Some(config.code.as_str())
    }

    fn code_ok_for_arm(&self, code: Option<&str>) -> bool {
        let config = &self.inner.config;
        if !config.code_arm_required || config.code.is_empty() {
            return true;
        }
        code == Some(config.code.as_str())
    }
}

impl Drop for AlarmPanel {
    fn drop(&mut self) {
        if let Ok(mut core) = self.inner.core.try_lock() {
            if let Some(h) = core.arming_timer.take() {
                h.abort();
            }
            if let Some(h) = core.trigger_timer.take() {
                h.abort();
            }
        }
    }
}

impl PanelInner {
    fn send_event(&self, event: PanelEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Apply a state transition, publish it, and update any indicator whose
    /// meaning changed. A transition into the current state is a no-op: no
    /// duplicate notification is ever published.
    fn apply_transition(&self, core: &mut Core, new: PanelState) {
        let old = core.state;
        if old == new {
            return;
        }
        core.state = new;
        if new != PanelState::Arming {
            core.pending = None;
        }
        info!("Panel state: {old} -> {new}");
        self.send_event(PanelEvent::StateChanged { old, new });

        // Indicators are always fire-and-forget.
        if old.is_armed() != new.is_armed()
            && let Some(indicator) = &self.config.armed_indicator
        {
            self.spawn_indicator(indicator.clone(), new.is_armed());
        }
        if old.is_triggered() != new.is_triggered()
            && let Some(indicator) = &self.config.alarm_indicator
        {
            self.spawn_indicator(indicator.clone(), new.is_triggered());
        }
    }

    fn spawn_indicator(&self, indicator: String, on: bool) {
        let invoker = Arc::clone(&self.invoker);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = invoker.set_indicator(&indicator, on).await {
                warn!("Failed to set indicator {indicator}: {e}");
                let _ = event_tx.send(PanelEvent::ActionFailed { action: indicator });
            }
        });
    }

    /// Invoke an external action per the configured invocation mode. An
    /// absent binding is a no-op; a failed invocation is logged and
    /// published, never propagated.
    async fn dispatch_action(&self, action: Option<&str>) {
        let Some(action) = action else { return };
        match self.config.action_mode {
            InvocationMode::FireAndForget => {
                let action = action.to_string();
                let invoker = Arc::clone(&self.invoker);
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = invoker.invoke_action(&action).await {
                        warn!("Action {action} failed: {e}");
                        let _ = event_tx.send(PanelEvent::ActionFailed { action });
                    }
                });
            }
            InvocationMode::Blocking => {
                if let Err(e) = self.invoker.invoke_action(action).await {
                    warn!("Action {action} failed: {e}");
                    let _ = self.event_tx.send(PanelEvent::ActionFailed {
                        action: action.to_string(),
                    });
                }
            }
        }
    }

    /// Begin the arming sequence: enter Arming and start the delay timer,
    /// or resolve immediately when the delay is zero.
    fn enter_arming(inner: &Arc<Self>, core: &mut Core) {
        if inner.config.delay_time > 0 {
            inner.apply_transition(core, PanelState::Arming);
            Self::start_arming_timer(inner, core);
        } else {
            inner.resolve_arming(core);
        }
    }

    /// Resolve the arming sequence to its resting state.
    ///
    /// Sensor feedback that already arrived was applied by `sensor_changed`,
    /// so at this point we assume success and resolve to the pending intent
    /// whether or not the armed sensor has confirmed.
    fn resolve_arming(&self, core: &mut Core) {
        let mode = core.pending.unwrap_or(self.config.default_arm_mode);
        self.apply_transition(core, mode.target_state());
    }

    fn start_arming_timer(inner: &Arc<Self>, core: &mut Core) {
        let seq = core.arming_seq;
        let delay = Duration::from_secs(inner.config.delay_time);
        let task_inner = Arc::clone(inner);
        core.arming_timer = Some(tokio::spawn(async move {
            sleep(delay).await;
            let mut core = task_inner.core.lock().await;
            // Superseded by a newer command, or already resolved by sensor
            // feedback: this timer's fallback no longer applies.
            if core.arming_seq != seq || core.state != PanelState::Arming {
                return;
            }
            debug!("Arming delay elapsed without sensor confirmation, assuming success");
            task_inner.resolve_arming(&mut core);
        }));
    }

    /// Enter Triggered and (re)start the auto-reset timer.
    ///
    /// The timer is restarted on every entry, including repeat trigger
    /// commands and sensor-driven triggers. On expiry the panel resets to
    /// Disarmed if still Triggered, without re-checking the alarm sensor.
    fn enter_triggered(inner: &Arc<Self>, core: &mut Core) {
        core.cancel_arming_timer();
        core.cancel_trigger_timer();
        core.pending = None;
        inner.apply_transition(core, PanelState::Triggered);

        if inner.config.trigger_time == 0 {
            return;
        }
        let seq = core.trigger_seq;
        let delay = Duration::from_secs(inner.config.trigger_time);
        let task_inner = Arc::clone(inner);
        core.trigger_timer = Some(tokio::spawn(async move {
            sleep(delay).await;
            let mut core = task_inner.core.lock().await;
            if core.trigger_seq != seq || core.state != PanelState::Triggered {
                return;
            }
            info!("Trigger time elapsed, resetting to disarmed");
            task_inner.apply_transition(&mut core, PanelState::Disarmed);
        }));
    }
}
