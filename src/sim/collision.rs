//! Contact routing between the vessel and falling entities
//!
//! The overlap test itself is a pluggable capability; the router only
//! decides which contacts are reported and removes what it reports.

use glam::Vec2;

use super::state::{EntityKind, LiveEntity};
use crate::settings::GameConfig;

/// Overlap capability supplied by the physics collaborator
pub trait OverlapTest {
    /// Whether two bodies at `a` and `b` overlap
    fn overlaps(&self, a: Vec2, a_radius: f32, b: Vec2, b_radius: f32) -> bool;
}

/// Circle-vs-circle overlap (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct CircleOverlap;

impl OverlapTest for CircleOverlap {
    fn overlaps(&self, a: Vec2, a_radius: f32, b: Vec2, b_radius: f32) -> bool {
        let reach = a_radius + b_radius;
        a.distance_squared(b) < reach * reach
    }
}

/// Axis-aligned box overlap, treating each radius as a half-extent
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxOverlap;

impl OverlapTest for BoxOverlap {
    fn overlaps(&self, a: Vec2, a_radius: f32, b: Vec2, b_radius: f32) -> bool {
        let delta = (a - b).abs();
        let reach = a_radius + b_radius;
        delta.x < reach && delta.y < reach
    }
}

/// A reported vessel contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    Obstacle { id: u32 },
    Bonus { id: u32 },
}

/// Reports each contact once and removes the contacted entity
pub struct CollisionRouter {
    detector: Box<dyn OverlapTest>,
}

impl Default for CollisionRouter {
    fn default() -> Self {
        Self::new(Box::new(CircleOverlap))
    }
}

impl std::fmt::Debug for CollisionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionRouter").finish_non_exhaustive()
    }
}

impl CollisionRouter {
    pub fn new(detector: Box<dyn OverlapTest>) -> Self {
        Self { detector }
    }

    /// Find and remove contacted entities.
    ///
    /// Obstacles are always reported. At most one bonus is taken per call,
    /// and none when `accept_bonus` is false (those stay on screen).
    pub fn route(
        &self,
        vessel_pos: Vec2,
        entities: &mut Vec<LiveEntity>,
        config: &GameConfig,
        accept_bonus: bool,
    ) -> Vec<Contact> {
        let mut contacts = Vec::new();
        let mut bonus_taken = !accept_bonus;

        entities.retain(|entity| {
            if !self.detector.overlaps(
                vessel_pos,
                config.vessel_radius,
                entity.pos,
                entity.kind.radius(config),
            ) {
                return true;
            }
            match entity.kind {
                EntityKind::Obstacle => {
                    contacts.push(Contact::Obstacle { id: entity.id });
                    false
                }
                EntityKind::Bonus if !bonus_taken => {
                    bonus_taken = true;
                    contacts.push(Contact::Bonus { id: entity.id });
                    false
                }
                EntityKind::Bonus => true,
            }
        });

        contacts
    }
}
