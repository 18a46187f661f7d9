use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Named AI/physics tuning level, selected once at game start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// The knobs a difficulty level bundles together. Immutable after game
/// start; the four AI knobs compose the easy/medium/hard feel without
/// separate code paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    /// Width of the uniform noise added to each AI prediction.
    pub randomness: f32,
    /// Probability that the AI discards its prediction for a random target.
    pub miss_chance: f32,
    /// Delay before a fresh AI decision takes effect.
    pub reaction_delay: Duration,
    /// Per-axis ball speed in court units per tick.
    pub ball_speed: f32,
    /// Paddle speed in court units per tick.
    pub paddle_speed: f32,
}

const EASY: DifficultyProfile = DifficultyProfile {
    randomness: 40.0,
    miss_chance: 0.18,
    reaction_delay: Duration::from_millis(320),
    ball_speed: 5.0,
    paddle_speed: 6.0,
};

const MEDIUM: DifficultyProfile = DifficultyProfile {
    randomness: 24.0,
    miss_chance: 0.10,
    reaction_delay: Duration::from_millis(180),
    ball_speed: 7.0,
    paddle_speed: 8.0,
};

const HARD: DifficultyProfile = DifficultyProfile {
    randomness: 12.0,
    miss_chance: 0.04,
    reaction_delay: Duration::from_millis(90),
    ball_speed: 9.0,
    paddle_speed: 10.0,
};

impl Difficulty {
    pub const fn profile(self) -> DifficultyProfile {
        match self {
            Difficulty::Easy => EASY,
            Difficulty::Medium => MEDIUM,
            Difficulty::Hard => HARD,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn next(self) -> Difficulty {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium => Difficulty::Hard,
            Difficulty::Hard => Difficulty::Easy,
        }
    }

    pub fn previous(self) -> Difficulty {
        match self {
            Difficulty::Easy => Difficulty::Hard,
            Difficulty::Medium => Difficulty::Easy,
            Difficulty::Hard => Difficulty::Medium,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medium_ball_speed_is_seven() {
        assert_eq!(Difficulty::Medium.profile().ball_speed, 7.0);
    }

    #[test]
    fn levels_scale_monotonically() {
        let (easy, medium, hard) = (
            Difficulty::Easy.profile(),
            Difficulty::Medium.profile(),
            Difficulty::Hard.profile(),
        );
        assert!(easy.randomness > medium.randomness && medium.randomness > hard.randomness);
        assert!(easy.miss_chance > medium.miss_chance && medium.miss_chance > hard.miss_chance);
        assert!(easy.reaction_delay > medium.reaction_delay);
        assert!(medium.reaction_delay > hard.reaction_delay);
        assert!(easy.ball_speed < medium.ball_speed && medium.ball_speed < hard.ball_speed);
        assert!(easy.paddle_speed < medium.paddle_speed);
    }
}
