//! Run state machine
//!
//! `NotStarted -> Playing <-> Answering -> (Victory | Defeated)`
//!
//! [`Run`] owns the question bank, the collision capability and the current
//! [`RunContext`]. Restart cancels every pending timer, bumps the epoch and
//! replaces the context wholesale, so nothing from the old run can touch
//! the new one.

use serde::Serialize;

use super::bank::{self, QuestionRecord};
use super::collision::{CollisionRouter, Contact, OverlapTest};
use super::question::{AnswerChoice, Outcome, PresentationTicket, QuestionView};
use super::spawner;
use super::state::{GameEvent, LiveEntity, RunContext, RunPhase, RunProgress, VesselState};
use super::timer::{FiredTimer, TimerKind};
use crate::error::GameError;
use crate::settings::GameConfig;
use crate::{ms_to_ticks, ticks_to_rounded_secs};

/// Per-frame snapshot for the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct RunView {
    pub phase: RunPhase,
    pub vessel: VesselState,
    pub vessel_y: f32,
    pub entities: Vec<LiveEntity>,
    pub progress: RunProgress,
    pub question: Option<QuestionView>,
    pub elapsed_secs: u64,
}

/// One game instance: config, question bank and the live run
#[derive(Debug)]
pub struct Run {
    config: GameConfig,
    bank: Vec<QuestionRecord>,
    router: CollisionRouter,
    epoch: u32,
    seed: u64,
    pub(crate) ctx: RunContext,
}

/// Seed for the run after `seed` (splitmix64 step)
fn next_seed(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl Run {
    /// Create a run with the default circle-overlap collisions
    pub fn new(config: GameConfig, bank: Vec<QuestionRecord>, seed: u64) -> Result<Self, GameError> {
        Self::with_router(config, bank, seed, CollisionRouter::default())
    }

    /// Create a run with a caller-supplied overlap test
    pub fn with_detector(
        config: GameConfig,
        bank: Vec<QuestionRecord>,
        seed: u64,
        detector: Box<dyn OverlapTest>,
    ) -> Result<Self, GameError> {
        Self::with_router(config, bank, seed, CollisionRouter::new(detector))
    }

    fn with_router(
        config: GameConfig,
        bank: Vec<QuestionRecord>,
        seed: u64,
        router: CollisionRouter,
    ) -> Result<Self, GameError> {
        config.validate()?;
        let ctx = RunContext::new(&config, seed, 0);
        Ok(Self {
            config,
            bank,
            router,
            epoch: 0,
            seed,
            ctx,
        })
    }

    /// Parse a question table and create a run. Malformed tables start no run.
    pub fn from_table(config: GameConfig, raw: &str, seed: u64) -> Result<Self, GameError> {
        let bank = bank::load(raw)?;
        Self::new(config, bank, seed)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn bank(&self) -> &[QuestionRecord] {
        &self.bank
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn phase(&self) -> RunPhase {
        self.ctx.phase
    }

    pub fn progress(&self) -> &RunProgress {
        &self.ctx.progress
    }

    pub fn vessel(&self) -> &VesselState {
        &self.ctx.vessel
    }

    pub fn entities(&self) -> &[LiveEntity] {
        &self.ctx.entities
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn active_question(&self) -> Option<&QuestionView> {
        self.ctx.flow.active_view()
    }

    pub fn now(&self) -> u64 {
        self.ctx.scheduler.now()
    }

    /// Whole seconds since `start`, rounded
    pub fn elapsed_secs(&self) -> u64 {
        self.ctx
            .started_at
            .map(|t| ticks_to_rounded_secs(self.ctx.scheduler.now() - t))
            .unwrap_or(0)
    }

    /// Horizontal control is honored (playing, not stunned, no question up)
    pub fn input_allowed(&self) -> bool {
        self.ctx.phase == RunPhase::Playing
            && !self.ctx.vessel.is_spinning
            && !self.ctx.flow.is_presenting()
    }

    /// Take the events produced since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.ctx.events)
    }

    pub fn view(&self) -> RunView {
        RunView {
            phase: self.ctx.phase,
            vessel: self.ctx.vessel.clone(),
            vessel_y: self.config.vessel_y(),
            entities: self.ctx.entities.clone(),
            progress: self.ctx.progress,
            question: self.ctx.flow.active_view().cloned(),
            elapsed_secs: self.elapsed_secs(),
        }
    }

    fn set_phase(&mut self, to: RunPhase) {
        let from = self.ctx.phase;
        if from == to {
            return;
        }
        log::info!("Run phase {:?} -> {:?} (epoch {})", from, to, self.epoch);
        self.ctx.phase = to;
        self.ctx.emit(GameEvent::PhaseChanged { from, to });
    }

    /// Title screen -> playing. Returns false if not on the title screen.
    pub fn start(&mut self) -> bool {
        if self.ctx.phase != RunPhase::NotStarted {
            log::debug!("Start ignored in phase {:?}", self.ctx.phase);
            return false;
        }

        self.ctx.queue = bank::select_for_run(&self.bank, self.config.total_questions, &mut self.ctx.rng);
        if let Some(warning) = self.ctx.queue.shortfall() {
            self.ctx.emit(GameEvent::Warning {
                code: warning.code().to_string(),
                message: warning.to_string(),
            });
        }
        if self.ctx.queue.len() < self.config.pass_threshold {
            log::warn!(
                "Only {} questions queued, pass threshold {} is unreachable",
                self.ctx.queue.len(),
                self.config.pass_threshold
            );
        }

        let ctx = &mut self.ctx;
        ctx.spawner.start(&mut ctx.scheduler, &self.config);
        ctx.started_at = Some(ctx.scheduler.now());
        ctx.motion_paused = false;
        log::info!(
            "Run started (seed {}, {} questions, pass at {})",
            self.seed,
            ctx.queue.len(),
            self.config.pass_threshold
        );
        self.set_phase(RunPhase::Playing);
        true
    }

    /// Throw the run away and return to the title screen (any phase)
    pub fn restart(&mut self) {
        let seed = next_seed(self.seed);
        self.restart_with_seed(seed);
    }

    pub fn restart_with_seed(&mut self, seed: u64) {
        let from = self.ctx.phase;
        self.ctx.scheduler.cancel_all();
        self.epoch = self.epoch.wrapping_add(1);
        self.seed = seed;
        self.ctx = RunContext::new(&self.config, seed, self.epoch);
        log::info!("Run restarted from {:?} (epoch {}, seed {})", from, self.epoch, seed);
        if from != RunPhase::NotStarted {
            self.ctx.emit(GameEvent::PhaseChanged {
                from,
                to: RunPhase::NotStarted,
            });
        }
    }

    /// Answer the question on screen
    pub fn submit_answer(
        &mut self,
        ticket: PresentationTicket,
        choice: &AnswerChoice,
    ) -> Result<Outcome, GameError> {
        if ticket.epoch != self.epoch {
            return Err(GameError::StaleCallback {
                epoch: ticket.epoch,
                current: self.epoch,
            });
        }
        if self.ctx.phase != RunPhase::Answering {
            return Err(GameError::NoActiveQuestion);
        }

        let ctx = &mut self.ctx;
        let outcome = ctx.flow.submit(
            ticket,
            choice,
            &mut ctx.progress,
            &mut ctx.scheduler,
            ms_to_ticks(self.config.feedback_delay_ms),
        )?;
        debug_assert!(ctx.progress.is_consistent());

        log::info!(
            "Answer {} ({}/{} correct, {} asked)",
            if outcome.correct { "correct" } else { "wrong" },
            ctx.progress.correct_count,
            ctx.progress.pass_threshold,
            ctx.progress.questions_asked
        );
        ctx.emit(GameEvent::AnswerJudged {
            correct: outcome.correct,
            message: outcome.feedback().to_string(),
        });
        if outcome.correct {
            let (correct, pass_threshold) = (ctx.progress.correct_count, ctx.progress.pass_threshold);
            ctx.emit(GameEvent::ScoreChanged {
                correct,
                pass_threshold,
            });
        }
        Ok(outcome)
    }

    /// Handle a timer that came due. Stale or unknown handles are rejected.
    pub fn dispatch(&mut self, fired: FiredTimer) -> Result<(), GameError> {
        let stale = GameError::StaleCallback {
            epoch: fired.handle.epoch(),
            current: self.epoch,
        };
        if fired.handle.epoch() != self.epoch {
            return Err(stale);
        }

        match fired.kind {
            TimerKind::ObstacleSpawn | TimerKind::BonusSpawn => {
                let kind = self.ctx.spawner.kind_for(fired.handle).ok_or(stale)?;
                if self.ctx.phase == RunPhase::Playing {
                    let id = self.ctx.next_entity_id();
                    let entity = spawner::spawn(kind, id, &self.config, &mut self.ctx.rng);
                    self.ctx.entities.push(entity);
                }
            }
            TimerKind::StunRecovery => {
                if self.ctx.stun_timer != Some(fired.handle) {
                    return Err(stale);
                }
                self.ctx.stun_timer = None;
                self.ctx.vessel.recover();
                self.ctx.emit(GameEvent::StunEnded);
            }
            TimerKind::FeedbackDelay => {
                let (_, outcome) = self.ctx.flow.complete(fired.handle)?;
                self.ctx.emit(GameEvent::QuestionClosed);
                self.finish_question(outcome);
            }
        }
        Ok(())
    }

    /// Route a contact reported by the collision router
    fn handle_contact(&mut self, contact: Contact) {
        match contact {
            Contact::Obstacle { id } => self.hit_obstacle(id),
            Contact::Bonus { id } => self.collect_bonus(id),
        }
    }

    fn hit_obstacle(&mut self, id: u32) {
        let ctx = &mut self.ctx;
        if let Some(old) = ctx.stun_timer.take() {
            ctx.scheduler.cancel(old);
        }
        ctx.vessel.stun(self.config.spin_rate_deg);
        ctx.stun_timer = Some(
            ctx.scheduler
                .after(TimerKind::StunRecovery, ms_to_ticks(self.config.stun_duration_ms)),
        );
        log::debug!("Obstacle {} hit, vessel stunned", id);
        ctx.emit(GameEvent::ObstacleHit { id });
    }

    fn collect_bonus(&mut self, id: u32) {
        if self.ctx.phase != RunPhase::Playing {
            log::debug!("Bonus {} ignored in phase {:?}", id, self.ctx.phase);
            return;
        }
        self.ctx.emit(GameEvent::BonusCollected { id });

        let Some(record) = self.ctx.queue.next_question() else {
            let err = GameError::QuestionUnavailable {
                asked: self.ctx.progress.questions_asked,
                queued: self.ctx.queue.len(),
            };
            self.fail_run(err);
            return;
        };

        let ctx = &mut self.ctx;
        ctx.motion_paused = true;
        ctx.spawner.pause(&mut ctx.scheduler);
        let view = ctx.flow.present(record, &mut ctx.rng);
        ctx.emit(GameEvent::QuestionPresented(view));
        self.set_phase(RunPhase::Answering);
    }

    fn finish_question(&mut self, outcome: Outcome) {
        if self.config.lock_keyboard_after_first_question && !self.ctx.keyboard_locked {
            log::debug!("Keyboard steering locked after first question");
            self.ctx.keyboard_locked = true;
            self.ctx.vessel.velocity_x = 0.0;
        }

        let progress = self.ctx.progress;
        if progress.is_passed() {
            self.end_run(RunPhase::Victory);
        } else if progress.is_budget_spent() || self.ctx.queue.is_exhausted() {
            self.end_run(RunPhase::Defeated);
        } else {
            let ctx = &mut self.ctx;
            ctx.motion_paused = false;
            ctx.spawner.resume(&mut ctx.scheduler);
            log::debug!("Question closed (correct: {}), back to play", outcome.correct);
            self.set_phase(RunPhase::Playing);
        }
    }

    /// Missing collaborator capability: the run cannot continue
    fn fail_run(&mut self, err: GameError) {
        log::warn!("Run failed: {err}");
        self.ctx.emit(GameEvent::Warning {
            code: err.code().to_string(),
            message: err.to_string(),
        });
        self.end_run(RunPhase::Defeated);
    }

    fn end_run(&mut self, phase: RunPhase) {
        if self.ctx.phase.is_terminal() {
            return;
        }
        let ctx = &mut self.ctx;
        ctx.motion_paused = true;
        ctx.spawner.pause(&mut ctx.scheduler);
        ctx.vessel.velocity_x = 0.0;
        self.set_phase(phase);

        match phase {
            RunPhase::Victory => {
                let elapsed_secs = self.elapsed_secs();
                log::info!(
                    "Victory in {}s ({}/{} correct)",
                    elapsed_secs,
                    self.ctx.progress.correct_count,
                    self.ctx.progress.questions_asked
                );
                self.ctx.emit(GameEvent::Victory { elapsed_secs });
            }
            _ => {
                log::info!(
                    "Defeat ({}/{} correct)",
                    self.ctx.progress.correct_count,
                    self.ctx.progress.questions_asked
                );
                self.ctx.emit(GameEvent::Defeat);
            }
        }
    }

    /// Victory screen link hook. Returns the URL if one was emitted.
    pub fn trigger_feedback_link(&mut self) -> Option<String> {
        if self.ctx.phase != RunPhase::Victory {
            return None;
        }
        let url = self.config.feedback_url.clone()?;
        self.ctx.emit(GameEvent::OpenLink { url: url.clone() });
        Some(url)
    }

    /// Apply a pointer x (clamped) if control is allowed
    pub(crate) fn apply_pointer(&mut self, x: f32) {
        if self.input_allowed() {
            self.ctx.vessel.position_x = x.clamp(0.0, self.config.screen_width);
        }
    }

    /// Apply keyboard steering in [-1, 1] if control is allowed
    pub(crate) fn apply_steer(&mut self, steer: f32) {
        if !self.input_allowed() || self.ctx.keyboard_locked {
            return;
        }
        self.ctx.vessel.velocity_x = steer.clamp(-1.0, 1.0) * self.config.keyboard_speed;
    }

    /// Frame-ordered simulation step after input has been applied
    pub(crate) fn step(&mut self, dt: f32) {
        self.ctx.scheduler.advance_clock();
        while let Some(fired) = self.ctx.scheduler.pop_due() {
            if let Err(err) = self.dispatch(fired) {
                log::debug!("Timer {:?} ignored: {}", fired.kind, err);
            }
        }

        if !self.ctx.motion_paused {
            spawner::advance_entities(&mut self.ctx.entities, dt);
            self.ctx.vessel.integrate(dt, self.config.screen_width);
        }

        // Retire before collisions so nothing is both gone and hit
        spawner::retire_offscreen(&mut self.ctx.entities, self.config.screen_height);

        if self.ctx.phase == RunPhase::Playing {
            let vessel_pos = glam::Vec2::new(self.ctx.vessel.position_x, self.config.vessel_y());
            let contacts = self
                .router
                .route(vessel_pos, &mut self.ctx.entities, &self.config, true);
            for contact in contacts {
                self.handle_contact(contact);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::bank::tests::sample_table;
    use crate::sim::collision::BoxOverlap;
    use crate::sim::state::{EntityKind, LiveEntity};
    use glam::Vec2;

    fn new_run(questions: usize) -> Run {
        Run::from_table(GameConfig::default(), &sample_table(questions), 42).expect("valid run")
    }

    /// Drop a bonus on the vessel and step until the question appears
    fn collect_bonus(run: &mut Run) -> QuestionView {
        let id = run.ctx.next_entity_id();
        let pos = Vec2::new(run.ctx.vessel.position_x, run.config.vessel_y());
        run.ctx.entities.push(LiveEntity {
            id,
            kind: EntityKind::Bonus,
            pos,
            vertical_speed: 0.0,
        });
        run.step(crate::consts::SIM_DT);
        assert_eq!(run.phase(), RunPhase::Answering);
        run.active_question().cloned().expect("question shown")
    }

    fn answer(run: &mut Run, view: &QuestionView, correct: bool) {
        let text = if correct { "right" } else { "wrong a" };
        run.submit_answer(view.ticket, &AnswerChoice::Text(text.into()))
            .expect("accepted");
    }

    fn wait_feedback(run: &mut Run) {
        for _ in 0..ms_to_ticks(run.config.feedback_delay_ms) {
            run.step(crate::consts::SIM_DT);
        }
    }

    #[test]
    fn test_start_only_from_title() {
        let mut run = new_run(10);
        assert_eq!(run.phase(), RunPhase::NotStarted);
        assert!(run.start());
        assert_eq!(run.phase(), RunPhase::Playing);
        assert!(!run.start());
        assert_eq!(run.context().queue.len(), 10);
        assert_eq!(run.context().scheduler.pending_count(), 2);
    }

    #[test]
    fn test_malformed_table_starts_no_run() {
        let raw = format!("{}Q1,A,B,C\n", sample_table(3));
        let err = Run::from_table(GameConfig::default(), &raw, 1).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_RECORD");
    }

    #[test]
    fn test_bonus_pauses_motion_and_spawners() {
        let mut run = new_run(10);
        run.start();
        let view = collect_bonus(&mut run);
        assert_eq!(view.options.len(), 4);
        assert!(run.ctx.motion_paused);
        for kind in EntityKind::ALL {
            let handle = run.ctx.spawner.timer(kind).expect("spawner running");
            assert!(run.ctx.scheduler.is_paused(handle));
        }
        assert!(!run.input_allowed());

        // Nothing spawns or moves while answering
        let before = run.entities().len();
        for _ in 0..1000 {
            run.step(crate::consts::SIM_DT);
        }
        assert_eq!(run.entities().len(), before);
    }

    #[test]
    fn test_victory_after_threshold() {
        let mut run = new_run(10);
        run.start();
        for i in 0..5 {
            let view = collect_bonus(&mut run);
            answer(&mut run, &view, true);
            assert_eq!(run.phase(), RunPhase::Answering);
            wait_feedback(&mut run);
            if i < 4 {
                assert_eq!(run.phase(), RunPhase::Playing);
            }
        }
        assert_eq!(run.phase(), RunPhase::Victory);
        assert_eq!(run.progress().correct_count, 5);
        assert_eq!(run.progress().questions_asked, 5);

        let events = run.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::Victory { .. })));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::Defeat)));
    }

    #[test]
    fn test_defeat_after_budget() {
        let mut run = new_run(10);
        run.start();
        for _ in 0..10 {
            let view = collect_bonus(&mut run);
            answer(&mut run, &view, false);
            wait_feedback(&mut run);
        }
        assert_eq!(run.phase(), RunPhase::Defeated);
        assert_eq!(run.progress().correct_count, 0);
        assert_eq!(run.progress().questions_asked, 10);
    }

    #[test]
    fn test_short_bank_ends_when_queue_exhausted() {
        let mut run = new_run(3);
        run.start();
        let events = run.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::Warning { code, .. } if code == "INSUFFICIENT_QUESTIONS"
        )));
        for _ in 0..3 {
            let view = collect_bonus(&mut run);
            answer(&mut run, &view, true);
            wait_feedback(&mut run);
        }
        assert_eq!(run.phase(), RunPhase::Defeated);
    }

    #[test]
    fn test_empty_bank_bonus_forces_defeat() {
        let mut run = Run::new(GameConfig::default(), Vec::new(), 5).expect("valid");
        run.start();
        let id = run.ctx.next_entity_id();
        let pos = Vec2::new(run.ctx.vessel.position_x, run.config.vessel_y());
        run.ctx.entities.push(LiveEntity {
            id,
            kind: EntityKind::Bonus,
            pos,
            vertical_speed: 0.0,
        });
        run.step(crate::consts::SIM_DT);
        assert_eq!(run.phase(), RunPhase::Defeated);
        assert!(run.ctx.motion_paused);
    }

    #[test]
    fn test_stale_timer_rejected_after_restart() {
        let mut run = new_run(10);
        run.start();
        let old = run.ctx.spawner.timer(EntityKind::Obstacle).expect("running");
        run.restart();
        assert_eq!(run.phase(), RunPhase::NotStarted);
        assert_eq!(run.context().scheduler.pending_count(), 0);

        let err = run
            .dispatch(FiredTimer {
                handle: old,
                kind: TimerKind::ObstacleSpawn,
            })
            .unwrap_err();
        assert_eq!(err.code(), "STALE_CALLBACK");
        assert!(run.entities().is_empty());
    }

    #[test]
    fn test_feedback_link_only_on_victory() {
        let config = GameConfig {
            feedback_url: Some("https://example.com/form".into()),
            pass_threshold: 1,
            ..GameConfig::default()
        };
        let mut run = Run::from_table(config, &sample_table(10), 9).expect("valid");
        assert!(run.trigger_feedback_link().is_none());
        run.start();
        let view = collect_bonus(&mut run);
        answer(&mut run, &view, true);
        wait_feedback(&mut run);
        assert_eq!(run.phase(), RunPhase::Victory);
        assert_eq!(run.trigger_feedback_link().as_deref(), Some("https://example.com/form"));
    }

    #[test]
    fn test_restart_reseeds() {
        let mut run = new_run(10);
        assert_eq!(run.seed(), 42);
        run.restart();
        assert_ne!(run.seed(), 42);
        assert_eq!(run.seed(), next_seed(42));

        run.restart_with_seed(7);
        assert_eq!(run.seed(), 7);
        assert_eq!(run.epoch(), 2);
    }

    #[test]
    fn test_supplied_overlap_test_decides_contacts() {
        // Diagonal offset: outside the circle reach, inside the box reach
        fn corner_bonus(run: &mut Run) {
            let id = run.ctx.next_entity_id();
            let pos = Vec2::new(run.ctx.vessel.position_x + 40.0, run.config.vessel_y() - 40.0);
            run.ctx.entities.push(LiveEntity {
                id,
                kind: EntityKind::Bonus,
                pos,
                vertical_speed: 0.0,
            });
        }

        let bank = bank::load(&sample_table(10)).expect("valid");
        let mut circle = Run::new(GameConfig::default(), bank.clone(), 5).expect("valid");
        let mut boxed =
            Run::with_detector(GameConfig::default(), bank, 5, Box::new(BoxOverlap)).expect("valid");
        for run in [&mut circle, &mut boxed] {
            run.start();
            corner_bonus(run);
            run.step(crate::consts::SIM_DT);
        }

        assert_eq!(circle.phase(), RunPhase::Playing);
        assert_eq!(circle.entities().len(), 1);
        assert_eq!(boxed.phase(), RunPhase::Answering);
        assert!(boxed.entities().is_empty());
    }

    #[test]
    fn test_next_seed_changes() {
        assert_ne!(next_seed(1), 1);
        assert_ne!(next_seed(1), next_seed(2));
    }
}
