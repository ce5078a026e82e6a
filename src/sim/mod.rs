//! Deterministic run simulation
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID, then timer creation order)
//! - No rendering or platform dependencies

pub mod bank;
pub mod collision;
pub mod question;
pub mod run;
pub mod spawner;
pub mod state;
pub mod tick;
pub mod timer;

pub use bank::{QuestionRecord, RunQuestionQueue, load, select_for_run};
pub use collision::{BoxOverlap, CircleOverlap, CollisionRouter, Contact, OverlapTest};
pub use question::{AnswerChoice, Outcome, PresentationTicket, QuestionFlow, QuestionView};
pub use run::{Run, RunView};
pub use spawner::EntitySpawner;
pub use state::{
    EntityKind, GameEvent, LiveEntity, RunContext, RunPhase, RunProgress, VesselState,
};
pub use tick::{AnswerInput, TickInput, autopilot_target, tick};
pub use timer::{FiredTimer, Scheduler, TimerHandle, TimerKind};
