//! Run state and core simulation types
//!
//! Everything a single run mutates lives in [`RunContext`]; a restart
//! throws the whole context away and builds a fresh one.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::bank::RunQuestionQueue;
use super::question::{QuestionFlow, QuestionView};
use super::spawner::EntitySpawner;
use super::timer::{Scheduler, TimerHandle, TimerKind};
use crate::settings::GameConfig;

/// Coarse state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Title screen, waiting for the start action
    NotStarted,
    /// Vessel moving, entities falling
    Playing,
    /// Motion suspended while a question is on screen
    Answering,
    /// Pass threshold reached
    Victory,
    /// Question budget used up without passing
    Defeated,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Victory | RunPhase::Defeated)
    }
}

/// The player's vessel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselState {
    pub position_x: f32,
    /// Keyboard steering velocity (pixels/sec)
    pub velocity_x: f32,
    /// Spin angle in degrees
    pub angle: f32,
    /// Degrees per second
    pub angular_velocity: f32,
    pub is_spinning: bool,
}

impl VesselState {
    pub fn new(position_x: f32) -> Self {
        Self {
            position_x,
            velocity_x: 0.0,
            angle: 0.0,
            angular_velocity: 0.0,
            is_spinning: false,
        }
    }

    /// Knocked by an obstacle: stop and start spinning
    pub fn stun(&mut self, spin_rate_deg: f32) {
        self.velocity_x = 0.0;
        self.angular_velocity = spin_rate_deg;
        self.is_spinning = true;
    }

    /// Stun elapsed: upright again
    pub fn recover(&mut self) {
        self.angular_velocity = 0.0;
        self.angle = 0.0;
        self.is_spinning = false;
    }

    /// Integrate velocity and spin, keeping the vessel on screen
    pub fn integrate(&mut self, dt: f32, screen_width: f32) {
        self.position_x = (self.position_x + self.velocity_x * dt).clamp(0.0, screen_width);
        if self.is_spinning {
            self.angle = (self.angle + self.angular_velocity * dt).rem_euclid(360.0);
        }
    }
}

/// Falling entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// Stuns the vessel on contact
    Obstacle,
    /// Triggers a question on contact
    Bonus,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Obstacle, EntityKind::Bonus];

    pub fn fall_speed(&self, config: &GameConfig) -> f32 {
        match self {
            EntityKind::Obstacle => config.effective_obstacle_speed(),
            EntityKind::Bonus => config.effective_bonus_speed(),
        }
    }

    pub fn radius(&self, config: &GameConfig) -> f32 {
        match self {
            EntityKind::Obstacle => config.obstacle_radius,
            EntityKind::Bonus => config.bonus_radius,
        }
    }

    /// Spawn height, just above the visible area
    pub fn spawn_y(&self) -> f32 {
        match self {
            EntityKind::Obstacle => -50.0,
            EntityKind::Bonus => -40.0,
        }
    }

    pub fn spawn_interval_ms(&self, config: &GameConfig) -> u32 {
        match self {
            EntityKind::Obstacle => config.effective_obstacle_interval_ms(),
            EntityKind::Bonus => config.effective_bonus_interval_ms(),
        }
    }

    pub fn timer_kind(&self) -> TimerKind {
        match self {
            EntityKind::Obstacle => TimerKind::ObstacleSpawn,
            EntityKind::Bonus => TimerKind::BonusSpawn,
        }
    }
}

/// An obstacle or bonus currently on screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEntity {
    pub id: u32,
    pub kind: EntityKind,
    pub pos: Vec2,
    pub vertical_speed: f32,
}

/// Score and question budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    pub correct_count: usize,
    pub questions_asked: usize,
    pub pass_threshold: usize,
    pub total_questions: usize,
}

impl RunProgress {
    pub fn new(pass_threshold: usize, total_questions: usize) -> Self {
        Self {
            correct_count: 0,
            questions_asked: 0,
            pass_threshold,
            total_questions,
        }
    }

    /// Count one answered question
    pub fn record(&mut self, correct: bool) {
        self.questions_asked += 1;
        if correct {
            self.correct_count += 1;
        }
    }

    pub fn is_passed(&self) -> bool {
        self.correct_count >= self.pass_threshold
    }

    pub fn is_budget_spent(&self) -> bool {
        self.questions_asked >= self.total_questions
    }

    /// correct <= asked <= total
    pub fn is_consistent(&self) -> bool {
        self.correct_count <= self.questions_asked && self.questions_asked <= self.total_questions
    }
}

/// Notifications for the presentation layer, drained once per frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    PhaseChanged { from: RunPhase, to: RunPhase },
    /// Non-fatal setup problem
    Warning { code: String, message: String },
    ObstacleHit { id: u32 },
    StunEnded,
    BonusCollected { id: u32 },
    QuestionPresented(QuestionView),
    AnswerJudged { correct: bool, message: String },
    ScoreChanged { correct: usize, pass_threshold: usize },
    QuestionClosed,
    Victory { elapsed_secs: u64 },
    Defeat,
    OpenLink { url: String },
}

/// All mutable state of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub phase: RunPhase,
    pub vessel: VesselState,
    /// Live entities (sorted by id)
    pub entities: Vec<LiveEntity>,
    pub progress: RunProgress,
    pub queue: RunQuestionQueue,
    pub flow: QuestionFlow,
    pub scheduler: Scheduler,
    pub spawner: EntitySpawner,
    pub stun_timer: Option<TimerHandle>,
    /// Entity and vessel motion suspended
    pub motion_paused: bool,
    /// Keyboard steering ignored for the rest of the run
    pub keyboard_locked: bool,
    /// Tick at which `start` ran
    pub started_at: Option<u64>,
    pub rng: Pcg32,
    pub events: Vec<GameEvent>,
    next_id: u32,
}

impl RunContext {
    pub fn new(config: &GameConfig, seed: u64, epoch: u32) -> Self {
        Self {
            phase: RunPhase::NotStarted,
            vessel: VesselState::new(config.screen_width / 2.0),
            entities: Vec::new(),
            progress: RunProgress::new(config.pass_threshold, config.total_questions),
            queue: RunQuestionQueue::default(),
            flow: QuestionFlow::new(epoch),
            scheduler: Scheduler::new(epoch),
            spawner: EntitySpawner::default(),
            stun_timer: None,
            motion_paused: false,
            keyboard_locked: false,
            started_at: None,
            rng: Pcg32::seed_from_u64(seed),
            events: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stun_and_recover() {
        let mut vessel = VesselState::new(100.0);
        vessel.velocity_x = 250.0;
        vessel.stun(200.0);
        assert_eq!(vessel.velocity_x, 0.0);
        assert!(vessel.is_spinning);

        vessel.integrate(0.5, 800.0);
        assert!((vessel.angle - 100.0).abs() < 0.001);
        assert_eq!(vessel.position_x, 100.0);

        vessel.recover();
        assert_eq!(vessel.angle, 0.0);
        assert_eq!(vessel.angular_velocity, 0.0);
        assert!(!vessel.is_spinning);
    }

    #[test]
    fn test_integrate_clamps_to_screen() {
        let mut vessel = VesselState::new(790.0);
        vessel.velocity_x = 400.0;
        vessel.integrate(1.0, 800.0);
        assert_eq!(vessel.position_x, 800.0);
        vessel.velocity_x = -2000.0;
        vessel.integrate(1.0, 800.0);
        assert_eq!(vessel.position_x, 0.0);
    }

    #[test]
    fn test_progress_record() {
        let mut progress = RunProgress::new(2, 3);
        progress.record(true);
        progress.record(false);
        assert_eq!(progress.correct_count, 1);
        assert_eq!(progress.questions_asked, 2);
        assert!(!progress.is_passed());
        assert!(!progress.is_budget_spent());
        progress.record(true);
        assert!(progress.is_passed());
        assert!(progress.is_budget_spent());
        assert!(progress.is_consistent());
    }

    #[test]
    fn test_obstacles_fall_faster_than_bonuses() {
        let config = GameConfig::default();
        assert!(EntityKind::Obstacle.fall_speed(&config) > EntityKind::Bonus.fall_speed(&config));
        assert!(EntityKind::Obstacle.spawn_y() < 0.0);
        assert!(EntityKind::Bonus.spawn_y() < 0.0);
    }
}
