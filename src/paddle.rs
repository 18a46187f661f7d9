use serde::{Deserialize, Serialize};

use crate::ball::Vec2;

pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_HEIGHT: f32 = 100.0;

/// Which half of the court a paddle (or player) occupies. Also the wire
/// representation used by the game channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Wire snapshot of a paddle, as published in `game_state` frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleState {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub score: u32,
}

#[derive(Debug, Clone)]
pub struct Paddle {
    pub position: Vec2,
    pub width: f32,
    pub height: f32,
    pub score: u32,
    pub speed: f32,
    pub side: Side,
}

impl Paddle {
    pub fn new(side: Side, x: f32, y: f32, speed: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            width: PADDLE_WIDTH,
            height: PADDLE_HEIGHT,
            score: 0,
            speed,
            side,
        }
    }

    /// Apply one tick of directional input: -1 up, 0 hold, 1 down.
    pub fn apply_input(&mut self, direction: i8) {
        self.position.y += f32::from(direction) * self.speed;
    }

    /// Clamp back into the court after any movement.
    pub fn constrain_to_court(&mut self, court_height: f32) {
        self.position.y = self.position.y.clamp(0.0, court_height - self.height);
    }

    pub fn center_y(&self) -> f32 {
        self.position.y + self.height / 2.0
    }

    pub fn score_point(&mut self) {
        self.score += 1;
    }

    pub fn state(&self) -> PaddleState {
        PaddleState {
            x: self.position.x,
            y: self.position.y,
            width: self.width,
            height: self.height,
            score: self.score,
        }
    }

    /// Overwrite position and score from a server snapshot (remote mode).
    pub fn apply_state(&mut self, state: &PaddleState) {
        self.position = Vec2::new(state.x, state.y);
        self.width = state.width;
        self.height = state.height;
        self.score = state.score;
    }
}
