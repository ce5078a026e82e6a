//! Game tuning and run rules
//!
//! Loaded from JSON by the binaries; every field has a default so partial
//! files are accepted.

use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Difficulty preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "normal" | "med" | "medium" => Some(Difficulty::Normal),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Multiplier on falling speeds
    pub fn speed_scale(&self) -> f32 {
        match self {
            Difficulty::Easy => 0.8,
            Difficulty::Normal => 1.0,
            Difficulty::Hard => 1.25,
        }
    }

    /// Multiplier on spawn intervals (lower = denser)
    pub fn interval_scale(&self) -> f32 {
        match self {
            Difficulty::Easy => 1.25,
            Difficulty::Normal => 1.0,
            Difficulty::Hard => 0.8,
        }
    }
}

/// Run rules and tuning constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub difficulty: Difficulty,

    // === Screen ===
    pub screen_width: f32,
    pub screen_height: f32,
    /// Vessel y is `screen_height - vessel_bottom_offset`
    pub vessel_bottom_offset: f32,
    /// Horizontal margin kept clear of spawns on both sides
    pub spawn_margin: f32,

    // === Entities ===
    pub vessel_radius: f32,
    pub obstacle_radius: f32,
    pub bonus_radius: f32,
    /// Pixels per second
    pub obstacle_speed: f32,
    pub bonus_speed: f32,
    pub obstacle_interval_ms: u32,
    pub bonus_interval_ms: u32,
    /// Keyboard steering speed (pixels per second)
    pub keyboard_speed: f32,

    // === Stun ===
    pub stun_duration_ms: u32,
    /// Spin rate while stunned (degrees per second)
    pub spin_rate_deg: f32,

    // === Questions ===
    pub total_questions: usize,
    pub pass_threshold: usize,
    /// Delay between answering and the question closing
    pub feedback_delay_ms: u32,
    /// Optional link offered on the victory screen
    pub feedback_url: Option<String>,
    /// Ignore keyboard steering once the first question has been answered
    pub lock_keyboard_after_first_question: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Normal,

            screen_width: 800.0,
            screen_height: 600.0,
            vessel_bottom_offset: 100.0,
            spawn_margin: 50.0,

            vessel_radius: 30.0,
            obstacle_radius: 22.0,
            bonus_radius: 20.0,
            obstacle_speed: 300.0,
            bonus_speed: 200.0,
            obstacle_interval_ms: 500,
            bonus_interval_ms: 3000,
            keyboard_speed: 400.0,

            stun_duration_ms: 1500,
            spin_rate_deg: 200.0,

            total_questions: 10,
            pass_threshold: 5,
            feedback_delay_ms: 500,
            feedback_url: None,
            lock_keyboard_after_first_question: false,
        }
    }
}

impl GameConfig {
    /// Create a config from a difficulty preset
    pub fn from_preset(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, GameError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, GameError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), GameError> {
        if self.total_questions == 0 {
            return Err(GameError::InvalidConfig("total_questions must be at least 1".into()));
        }
        if self.pass_threshold == 0 || self.pass_threshold > self.total_questions {
            return Err(GameError::InvalidConfig(format!(
                "pass_threshold must be within 1..={}, got {}",
                self.total_questions, self.pass_threshold
            )));
        }
        if self.screen_width <= 2.0 * self.spawn_margin || self.screen_height <= 0.0 {
            return Err(GameError::InvalidConfig(format!(
                "screen {}x{} too small for spawn margin {}",
                self.screen_width, self.screen_height, self.spawn_margin
            )));
        }
        if self.obstacle_speed <= 0.0 || self.bonus_speed <= 0.0 {
            return Err(GameError::InvalidConfig("fall speeds must be positive".into()));
        }
        if self.obstacle_interval_ms == 0 || self.bonus_interval_ms == 0 {
            return Err(GameError::InvalidConfig("spawn intervals must be positive".into()));
        }
        Ok(())
    }

    /// Obstacle fall speed after difficulty scaling
    pub fn effective_obstacle_speed(&self) -> f32 {
        self.obstacle_speed * self.difficulty.speed_scale()
    }

    pub fn effective_bonus_speed(&self) -> f32 {
        self.bonus_speed * self.difficulty.speed_scale()
    }

    /// Obstacle spawn interval after difficulty scaling
    pub fn effective_obstacle_interval_ms(&self) -> u32 {
        scale_ms(self.obstacle_interval_ms, self.difficulty.interval_scale())
    }

    pub fn effective_bonus_interval_ms(&self) -> u32 {
        scale_ms(self.bonus_interval_ms, self.difficulty.interval_scale())
    }

    /// Fixed vertical position of the vessel
    pub fn vessel_y(&self) -> f32 {
        self.screen_height - self.vessel_bottom_offset
    }
}

fn scale_ms(ms: u32, scale: f32) -> u32 {
    ((ms as f32 * scale).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.obstacle_speed > config.bonus_speed);
        assert_eq!(config.effective_obstacle_interval_ms(), 500);
        assert_eq!(config.vessel_y(), 500.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GameConfig::from_json(r#"{ "pass_threshold": 3, "difficulty": "Hard" }"#)
            .expect("valid config");
        assert_eq!(config.pass_threshold, 3);
        assert_eq!(config.total_questions, 10);
        assert_eq!(config.difficulty, Difficulty::Hard);
        assert_eq!(config.effective_obstacle_interval_ms(), 400);
        assert!((config.effective_obstacle_speed() - 375.0).abs() < 0.001);
    }

    #[test]
    fn test_threshold_above_total_rejected() {
        let err = GameConfig::from_json(r#"{ "pass_threshold": 11 }"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_json_round_trip() {
        let config = GameConfig {
            feedback_url: Some("https://example.com/form".into()),
            lock_keyboard_after_first_question: true,
            ..GameConfig::from_preset(Difficulty::Easy)
        };
        let json = config.to_json().expect("serializes");
        assert!(json.contains("\"difficulty\": \"Easy\""));
        assert_eq!(GameConfig::from_json(&json).expect("valid config"), config);
    }

    #[test]
    fn test_bad_json_rejected() {
        let err = GameConfig::from_json("{ not json").unwrap_err();
        assert_eq!(err.code(), "CONFIG_PARSE");
    }

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!(Difficulty::from_str("EASY"), Some(Difficulty::Easy));
        assert_eq!(Difficulty::from_str("medium"), Some(Difficulty::Normal));
        assert_eq!(Difficulty::from_str("nightmare"), None);
        assert_eq!(Difficulty::Hard.as_str(), "Hard");
    }
}
