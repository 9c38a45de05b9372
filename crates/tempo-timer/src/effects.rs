/*
[INPUT]:  (previous, next) TaskState pair after a reduce step
[OUTPUT]: Ordered list of side-effect commands for the orchestrator
[POS]:    Domain layer - side-effect planning, no I/O
[UPDATE]: When changing the effect set or their fixed execution order
*/

use crate::model::TaskState;

/// Side effects the orchestrator executes after every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Overwrite the persisted state.
    Persist,
    /// Tear down the counting worker; no task is active.
    StopCountdown,
    /// Refresh the ambient status display.
    UpdateDisplay,
    /// Push the latest snapshot to the countdown coordinator.
    ForwardSnapshot,
    /// Prepare the completion cue so it can play with no latency at zero.
    ArmCue,
    /// Drop the prepared cue so it can never fire for a finished task.
    DisarmCue,
}

/// Plan the effect sequence for one transition.
///
/// The first four entries keep a fixed order: persist, stop-if-idle, display,
/// forward. Forwarding last means a worker recreated after the stop receives
/// the freshest snapshot. Cue arming follows the none->present edge of
/// `active_task`, disarming the reverse edge.
pub fn plan_effects(prev: &TaskState, next: &TaskState) -> Vec<Effect> {
    let mut effects = vec![Effect::Persist];

    if next.active_task.is_none() {
        effects.push(Effect::StopCountdown);
    }
    effects.push(Effect::UpdateDisplay);
    effects.push(Effect::ForwardSnapshot);

    match (prev.active_task.is_some(), next.active_task.is_some()) {
        (false, true) => effects.push(Effect::ArmCue),
        (true, false) => effects.push(Effect::DisarmCue),
        _ => {}
    }

    effects
}
