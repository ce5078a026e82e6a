//! Periodic obstacle/bonus creation and the shared entity lifecycle
//!
//! Both kinds go through the same spawn, fall and retire routines; only
//! the per-kind lookups on [`EntityKind`] differ.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::state::{EntityKind, LiveEntity};
use super::timer::{Scheduler, TimerHandle};
use crate::ms_to_ticks;
use crate::settings::GameConfig;

/// The two spawn timers of a run
#[derive(Debug, Clone, Default)]
pub struct EntitySpawner {
    obstacle_timer: Option<TimerHandle>,
    bonus_timer: Option<TimerHandle>,
}

impl EntitySpawner {
    /// Schedule both repeating spawn timers
    pub fn start(&mut self, scheduler: &mut Scheduler, config: &GameConfig) {
        for kind in EntityKind::ALL {
            let period = ms_to_ticks(kind.spawn_interval_ms(config));
            let handle = scheduler.every(kind.timer_kind(), period);
            match kind {
                EntityKind::Obstacle => self.obstacle_timer = Some(handle),
                EntityKind::Bonus => self.bonus_timer = Some(handle),
            }
        }
    }

    pub fn timer(&self, kind: EntityKind) -> Option<TimerHandle> {
        match kind {
            EntityKind::Obstacle => self.obstacle_timer,
            EntityKind::Bonus => self.bonus_timer,
        }
    }

    /// Which kind a fired timer spawns, if it belongs to this spawner
    pub fn kind_for(&self, handle: TimerHandle) -> Option<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| self.timer(*kind) == Some(handle))
    }

    pub fn pause_kind(&self, scheduler: &mut Scheduler, kind: EntityKind) {
        if let Some(handle) = self.timer(kind) {
            scheduler.pause(handle);
        }
    }

    pub fn resume_kind(&self, scheduler: &mut Scheduler, kind: EntityKind) {
        if let Some(handle) = self.timer(kind) {
            scheduler.resume(handle);
        }
    }

    /// Pause both spawn timers
    pub fn pause(&self, scheduler: &mut Scheduler) {
        for kind in EntityKind::ALL {
            self.pause_kind(scheduler, kind);
        }
    }

    /// Resume both spawn timers
    pub fn resume(&self, scheduler: &mut Scheduler) {
        for kind in EntityKind::ALL {
            self.resume_kind(scheduler, kind);
        }
    }
}

/// Create an entity of `kind` just above the screen at a random x
pub fn spawn(kind: EntityKind, id: u32, config: &GameConfig, rng: &mut Pcg32) -> LiveEntity {
    let min_x = config.spawn_margin.round() as i32;
    let max_x = (config.screen_width - config.spawn_margin).round() as i32;
    let x = if max_x > min_x {
        rng.random_range(min_x..=max_x)
    } else {
        min_x
    };

    LiveEntity {
        id,
        kind,
        pos: Vec2::new(x as f32, kind.spawn_y()),
        vertical_speed: kind.fall_speed(config),
    }
}

/// Move every entity down by its own speed
pub fn advance_entities(entities: &mut [LiveEntity], dt: f32) {
    for entity in entities.iter_mut() {
        entity.pos.y += entity.vertical_speed * dt;
    }
}

/// Discard entities below the bottom edge. Returns how many were removed.
pub fn retire_offscreen(entities: &mut Vec<LiveEntity>, screen_height: f32) -> usize {
    let before = entities.len();
    entities.retain(|e| e.pos.y <= screen_height);
    before - entities.len()
}
