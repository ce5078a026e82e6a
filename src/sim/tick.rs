//! Fixed timestep simulation tick
//!
//! One call advances the run by one frame in a fixed order:
//! one-shot actions, input, answer, timers, motion, off-screen cleanup,
//! collisions.

use serde::{Deserialize, Serialize};

use super::question::{AnswerChoice, PresentationTicket};
use super::run::Run;
use super::state::{EntityKind, RunPhase};

/// An answer selection carried by the input for one tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerInput {
    pub ticket: PresentationTicket,
    pub choice: AnswerChoice,
}

/// Input sampled for a single tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickInput {
    /// Pointer/touch x in screen pixels
    pub pointer_x: Option<f32>,
    /// Keyboard steering, -1 (left) to 1 (right)
    pub steer: f32,
    /// Start from the title screen
    pub start: bool,
    /// Restart from any phase
    pub restart: bool,
    pub answer: Option<AnswerInput>,
    /// Victory screen link button
    pub open_feedback_link: bool,
    /// Demo mode - steer automatically
    pub autopilot: bool,
}

/// Advance the run by one fixed timestep
pub fn tick(run: &mut Run, input: &TickInput, dt: f32) {
    if input.restart {
        run.restart();
    }
    if input.start || (input.autopilot && run.phase() == RunPhase::NotStarted) {
        run.start();
    }
    if input.open_feedback_link {
        run.trigger_feedback_link();
    }

    match run.phase() {
        RunPhase::NotStarted | RunPhase::Victory | RunPhase::Defeated => return,
        _ => {}
    }

    let pointer_x = if input.autopilot {
        autopilot_target(run).or(input.pointer_x)
    } else {
        input.pointer_x
    };
    if let Some(x) = pointer_x {
        run.apply_pointer(x);
    }
    run.apply_steer(input.steer);

    if let Some(answer) = &input.answer
        && let Err(err) = run.submit_answer(answer.ticket, &answer.choice)
    {
        log::debug!("Answer ignored: {}", err);
    }

    run.step(dt);
}

/// Pick a pointer x for demo play: chase the lowest bonus, sidestep
/// obstacles that are about to land on the vessel.
pub fn autopilot_target(run: &Run) -> Option<f32> {
    let config = run.config();
    let vessel_x = run.vessel().position_x;
    let vessel_y = config.vessel_y();

    let mut target = run
        .entities()
        .iter()
        .filter(|e| e.kind == EntityKind::Bonus && e.pos.y < vessel_y)
        .max_by(|a, b| a.pos.y.total_cmp(&b.pos.y))
        .map(|b| b.pos.x)
        .unwrap_or(vessel_x);

    let clearance = config.vessel_radius + config.obstacle_radius + 10.0;
    let threat = run
        .entities()
        .iter()
        .filter(|e| e.kind == EntityKind::Obstacle)
        .filter(|e| e.pos.y < vessel_y && vessel_y - e.pos.y < 150.0)
        .find(|e| (e.pos.x - target).abs() < clearance);

    if let Some(obstacle) = threat {
        let dodge = if target >= obstacle.pos.x { clearance } else { -clearance };
        target = obstacle.pos.x + dodge;
        if target < 0.0 || target > config.screen_width {
            target = obstacle.pos.x - dodge;
        }
    }

    Some(target.clamp(0.0, config.screen_width))
}
