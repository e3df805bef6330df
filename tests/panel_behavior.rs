// Behavioral tests for the alarm panel state machine.
//
// All tests run on a paused tokio clock so arming delays and trigger
// auto-resets are exercised deterministically, with a recording fake
// invoker standing in for the host platform.

use std::sync::Arc;

use tokio::time::{Duration, sleep};

use synthetic_alarm::{
    AlarmPanel, BinaryState, EventReceiver, InvocationMode, PanelConfig, PanelEvent, PanelState,
    RecordingInvoker,
};

const ARMED_SENSOR: &str = "binary_sensor.alarm_armed";
const ALARM_SENSOR: &str = "binary_sensor.alarm_active";

fn full_config() -> PanelConfig {
    PanelConfig::builder()
        .name("Test Panel")
        .delay_time(30)
        .trigger_time(600)
        .action_arm_home("script.arm_home")
        .action_disarm_home("script.disarm_home")
        .action_arm_away("script.arm_away")
        .action_disarm_away("script.disarm_away")
        .sensor_armed(ARMED_SENSOR)
        .sensor_alarm(ALARM_SENSOR)
        .armed_indicator("switch.armed_led")
        .alarm_indicator("switch.alarm_led")
        .build()
}

fn panel_with(config: PanelConfig) -> (AlarmPanel, Arc<RecordingInvoker>) {
    let invoker = Arc::new(RecordingInvoker::new());
    let panel = AlarmPanel::new(config, invoker.clone()).unwrap();
    (panel, invoker)
}

/// Let spawned fire-and-forget invocations run.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

/// Drain all state-change events received so far.
fn drain_transitions(rx: &mut EventReceiver) -> Vec<(PanelState, PanelState)> {
    let mut transitions = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let PanelEvent::StateChanged { old, new } = event {
            transitions.push((old, new));
        }
    }
    transitions
}

// =========================================================================
// Disarm action selection
// =========================================================================

#[tokio::test(start_paused = true)]
async fn disarm_from_armed_home_invokes_only_home_action() {
    let (panel, invoker) = panel_with(full_config());

    panel.arm_home(None).await;
    sleep(Duration::from_secs(31)).await;
    assert_eq!(panel.current_state().await, PanelState::ArmedHome);

    panel.disarm(None).await;
    settle().await;

    assert_eq!(panel.current_state().await, PanelState::Disarmed);
    assert_eq!(invoker.actions(), vec!["script.arm_home", "script.disarm_home"]);
}

#[tokio::test(start_paused = true)]
async fn disarm_from_armed_away_invokes_only_away_action() {
    let (panel, invoker) = panel_with(full_config());

    panel.arm_away(None).await;
    sleep(Duration::from_secs(31)).await;
    assert_eq!(panel.current_state().await, PanelState::ArmedAway);

    panel.disarm(None).await;
    settle().await;

    assert_eq!(invoker.actions(), vec!["script.arm_away", "script.disarm_away"]);
}

#[tokio::test(start_paused = true)]
async fn disarm_from_disarmed_or_triggered_invokes_no_action() {
    let (panel, invoker) = panel_with(full_config());

    panel.disarm(None).await;
    settle().await;
    assert!(invoker.actions().is_empty());

    panel.trigger(None).await;
    panel.disarm(None).await;
    settle().await;
    assert!(invoker.actions().is_empty());
    assert_eq!(panel.current_state().await, PanelState::Disarmed);
}

// =========================================================================
// Arming delay and optimistic fallback
// =========================================================================

#[tokio::test(start_paused = true)]
async fn arming_resolves_optimistically_when_sensor_never_confirms() {
    // The armed sensor is bound but silent: the delay timer still resolves
    // to the intended target ("assume success").
    let (panel, _) = panel_with(full_config());

    panel.arm_away(None).await;
    assert_eq!(panel.current_state().await, PanelState::Arming);

    sleep(Duration::from_secs(31)).await;
    assert_eq!(panel.current_state().await, PanelState::ArmedAway);
}

#[tokio::test(start_paused = true)]
async fn new_arm_command_supersedes_outstanding_timer() {
    let (panel, _) = panel_with(full_config());

    panel.arm_away(None).await;
    sleep(Duration::from_secs(15)).await;

    // A second command replaces the pending intent and restarts the delay.
    panel.arm_home(None).await;
    sleep(Duration::from_secs(16)).await;
    // The first command's timer would have fired by now; it must not.
    assert_eq!(panel.current_state().await, PanelState::Arming);

    sleep(Duration::from_secs(15)).await;
    assert_eq!(panel.current_state().await, PanelState::ArmedHome);
}

#[tokio::test(start_paused = true)]
async fn sensor_resolution_suppresses_timer_fallback() {
    let (panel, _) = panel_with(full_config());
    let mut rx = panel.subscribe();

    panel.arm_away(None).await;
    sleep(Duration::from_secs(5)).await;
    panel.sensor_changed(ARMED_SENSOR, BinaryState::On).await;
    assert_eq!(panel.current_state().await, PanelState::ArmedAway);

    panel.disarm(None).await;
    assert_eq!(panel.current_state().await, PanelState::Disarmed);

    // Past the original delay: the superseded timer must not resurrect
    // the arming sequence.
    sleep(Duration::from_secs(60)).await;
    assert_eq!(panel.current_state().await, PanelState::Disarmed);

    let transitions = drain_transitions(&mut rx);
    assert_eq!(
        transitions,
        vec![
            (PanelState::Disarmed, PanelState::Arming),
            (PanelState::Arming, PanelState::ArmedAway),
            (PanelState::ArmedAway, PanelState::Disarmed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn slow_blocking_disarm_does_not_override_newer_arm() {
    // With a blocking invoker, a disarm can still be awaiting its external
    // action when a newer arm command completes. The older disarm's
    // deferred transition is superseded and must not apply.
    let invoker = Arc::new(RecordingInvoker::new());
    invoker.set_action_delay(Duration::from_secs(1));
    let config = PanelConfig::builder()
        .delay_time(30)
        .action_mode(InvocationMode::Blocking)
        .action_disarm_away("script.disarm_away")
        .sensor_armed(ARMED_SENSOR)
        .build();
    let panel = Arc::new(AlarmPanel::new(config, invoker.clone()).unwrap());

    panel.arm_away(None).await;
    panel.sensor_changed(ARMED_SENSOR, BinaryState::On).await;
    assert_eq!(panel.current_state().await, PanelState::ArmedAway);

    // The disarm stalls on its slow disarm-away action.
    let disarming = tokio::spawn({
        let panel = Arc::clone(&panel);
        async move { panel.disarm(None).await }
    });
    settle().await;
    assert_eq!(invoker.actions(), vec!["script.disarm_away"]);

    // A newer arm command lands while the disarm is still in flight.
    panel.arm_away(None).await;
    assert_eq!(panel.current_state().await, PanelState::Arming);

    assert!(disarming.await.unwrap().is_accepted());
    assert_eq!(panel.current_state().await, PanelState::Arming);

    sleep(Duration::from_secs(31)).await;
    assert_eq!(panel.current_state().await, PanelState::ArmedAway);
}

// =========================================================================
// Armed-sensor reconciliation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn pending_intent_wins_over_default_away() {
    let (panel, _) = panel_with(full_config());

    panel.arm_home(None).await;
    assert_eq!(panel.current_state().await, PanelState::Arming);

    panel.sensor_changed(ARMED_SENSOR, BinaryState::On).await;
    assert_eq!(panel.current_state().await, PanelState::ArmedHome);
}

#[tokio::test(start_paused = true)]
async fn sensor_confirmation_resolves_away_intent() {
    let (panel, _) = panel_with(full_config());

    panel.arm_away(None).await;
    panel.sensor_changed(ARMED_SENSOR, BinaryState::On).await;
    assert_eq!(panel.current_state().await, PanelState::ArmedAway);
}

#[tokio::test(start_paused = true)]
async fn sensor_off_while_armed_disarms_without_command() {
    let (panel, invoker) = panel_with(full_config());

    panel.arm_home(None).await;
    sleep(Duration::from_secs(31)).await;
    assert_eq!(panel.current_state().await, PanelState::ArmedHome);
    let actions_before = invoker.actions().len();

    panel.sensor_changed(ARMED_SENSOR, BinaryState::Off).await;
    settle().await;

    assert_eq!(panel.current_state().await, PanelState::Disarmed);
    // Ground truth changed externally; no disarm action is invoked.
    assert_eq!(invoker.actions().len(), actions_before);
}

#[tokio::test(start_paused = true)]
async fn armed_sensor_is_idempotent() {
    let (panel, _) = panel_with(full_config());
    let mut rx = panel.subscribe();

    panel.arm_home(None).await;
    panel.sensor_changed(ARMED_SENSOR, BinaryState::On).await;
    panel.sensor_changed(ARMED_SENSOR, BinaryState::On).await;
    panel.sensor_changed(ARMED_SENSOR, BinaryState::On).await;

    assert_eq!(panel.current_state().await, PanelState::ArmedHome);
    let transitions = drain_transitions(&mut rx);
    assert_eq!(
        transitions,
        vec![
            (PanelState::Disarmed, PanelState::Arming),
            (PanelState::Arming, PanelState::ArmedHome),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn sensor_off_while_disarmed_is_a_no_op() {
    let (panel, _) = panel_with(full_config());
    let mut rx = panel.subscribe();

    panel.sensor_changed(ARMED_SENSOR, BinaryState::Off).await;

    assert_eq!(panel.current_state().await, PanelState::Disarmed);
    assert!(drain_transitions(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn unbound_sensor_is_ignored() {
    let (panel, _) = panel_with(full_config());

    panel.arm_away(None).await;
    panel.sensor_changed("binary_sensor.unrelated", BinaryState::On).await;
    assert_eq!(panel.current_state().await, PanelState::Arming);
}

// =========================================================================
// Trigger and auto-reset
// =========================================================================

#[tokio::test(start_paused = true)]
async fn trigger_sets_triggered_from_every_state() {
    for arm_first in [false, true] {
        let (panel, _) = panel_with(full_config());
        if arm_first {
            panel.arm_away(None).await;
            sleep(Duration::from_secs(31)).await;
        }
        panel.trigger(None).await;
        assert_eq!(panel.current_state().await, PanelState::Triggered);
    }
}

#[tokio::test(start_paused = true)]
async fn trigger_auto_resets_after_trigger_time() {
    let (panel, _) = panel_with(full_config());

    panel.trigger(None).await;
    sleep(Duration::from_secs(599)).await;
    assert_eq!(panel.current_state().await, PanelState::Triggered);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(panel.current_state().await, PanelState::Disarmed);
}

#[tokio::test(start_paused = true)]
async fn disarm_cancels_pending_auto_reset() {
    let (panel, _) = panel_with(full_config());
    let mut rx = panel.subscribe();

    panel.trigger(None).await;
    sleep(Duration::from_secs(10)).await;
    panel.disarm(None).await;

    sleep(Duration::from_secs(700)).await;
    assert_eq!(panel.current_state().await, PanelState::Disarmed);

    let transitions = drain_transitions(&mut rx);
    assert_eq!(
        transitions,
        vec![
            (PanelState::Disarmed, PanelState::Triggered),
            (PanelState::Triggered, PanelState::Disarmed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn zero_trigger_time_disables_auto_reset() {
    let (panel, _) = panel_with(
        PanelConfig::builder().delay_time(0).trigger_time(0).build(),
    );

    panel.trigger(None).await;
    sleep(Duration::from_secs(7200)).await;
    assert_eq!(panel.current_state().await, PanelState::Triggered);
}

// Known edge case: the auto-reset fires after trigger_time even when the
// alarm sensor still reads "on" at that moment. The sensor is not
// re-checked at expiry.
#[tokio::test(start_paused = true)]
async fn auto_reset_fires_even_if_alarm_sensor_still_on() {
    let (panel, _) = panel_with(full_config());

    panel.sensor_changed(ALARM_SENSOR, BinaryState::On).await;
    assert_eq!(panel.current_state().await, PanelState::Triggered);

    sleep(Duration::from_secs(601)).await;
    assert_eq!(panel.current_state().await, PanelState::Disarmed);
}

// =========================================================================
// Alarm-sensor reconciliation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn alarm_sensor_on_triggers_from_armed() {
    let (panel, _) = panel_with(full_config());

    panel.arm_away(None).await;
    sleep(Duration::from_secs(31)).await;

    panel.sensor_changed(ALARM_SENSOR, BinaryState::On).await;
    assert_eq!(panel.current_state().await, PanelState::Triggered);
}

#[tokio::test(start_paused = true)]
async fn alarm_sensor_off_clears_triggered() {
    let (panel, _) = panel_with(full_config());

    panel.trigger(None).await;
    panel.sensor_changed(ALARM_SENSOR, BinaryState::Off).await;
    assert_eq!(panel.current_state().await, PanelState::Disarmed);

    // The auto-reset timer was cancelled along with the trigger; nothing
    // fires later.
    sleep(Duration::from_secs(700)).await;
    assert_eq!(panel.current_state().await, PanelState::Disarmed);
}

#[tokio::test(start_paused = true)]
async fn alarm_sensor_off_while_disarmed_is_a_no_op() {
    let (panel, _) = panel_with(full_config());
    let mut rx = panel.subscribe();

    panel.sensor_changed(ALARM_SENSOR, BinaryState::Off).await;
    assert!(drain_transitions(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn alarm_trigger_wins_over_armed_resolution_in_same_pass() {
    // One entity bound as both the armed and the alarm sensor: a single
    // "on" reading during Arming matches both rules, and the alarm
    // sensor's Triggered transition takes precedence.
    let (panel, _) = panel_with(
        PanelConfig::builder()
            .delay_time(30)
            .trigger_time(600)
            .sensor_armed("binary_sensor.combined")
            .sensor_alarm("binary_sensor.combined")
            .build(),
    );

    panel.arm_away(None).await;
    panel.sensor_changed("binary_sensor.combined", BinaryState::On).await;
    assert_eq!(panel.current_state().await, PanelState::Triggered);
}

// =========================================================================
// Indicators
// =========================================================================

#[tokio::test(start_paused = true)]
async fn indicators_follow_armed_and_triggered_status() {
    let (panel, invoker) = panel_with(full_config());

    panel.arm_away(None).await;
    sleep(Duration::from_secs(31)).await;
    settle().await;
    assert_eq!(invoker.indicators(), vec![("switch.armed_led".to_string(), true)]);

    panel.trigger(None).await;
    settle().await;
    assert_eq!(
        invoker.indicators(),
        vec![
            ("switch.armed_led".to_string(), true),
            ("switch.armed_led".to_string(), false),
            ("switch.alarm_led".to_string(), true),
        ]
    );

    panel.disarm(None).await;
    settle().await;
    assert_eq!(
        invoker.indicators().last(),
        Some(&("switch.alarm_led".to_string(), false))
    );
}

// =========================================================================
// Notification ordering
// =========================================================================

#[tokio::test(start_paused = true)]
async fn observers_see_every_transition_in_order() {
    let (panel, _) = panel_with(full_config());
    let mut rx = panel.subscribe();

    panel.arm_away(None).await;
    sleep(Duration::from_secs(31)).await;
    panel.trigger(None).await;
    panel.disarm(None).await;

    let transitions = drain_transitions(&mut rx);
    assert_eq!(
        transitions,
        vec![
            (PanelState::Disarmed, PanelState::Arming),
            (PanelState::Arming, PanelState::ArmedAway),
            (PanelState::ArmedAway, PanelState::Triggered),
            (PanelState::Triggered, PanelState::Disarmed),
        ]
    );
}
