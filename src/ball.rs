use serde::{Deserialize, Serialize};

use crate::paddle::Paddle;

/// Maximum deflection off a paddle face, measured from straight-back.
pub const MAX_BOUNCE_ANGLE: f32 = std::f32::consts::FRAC_PI_3;

pub const DEFAULT_BALL_RADIUS: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f32 {
        self.x.hypot(self.y)
    }
}

/// Wire snapshot of the ball, as published in `game_state` frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallState {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

#[derive(Debug, Clone)]
pub struct Ball {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
}

impl Ball {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            velocity: Vec2::default(),
            radius: DEFAULT_BALL_RADIUS,
        }
    }

    pub fn set_speed(&mut self, vx: f32, vy: f32) {
        self.velocity = Vec2::new(vx, vy);
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    /// Advance one fixed tick. No delta-time scaling; the simulation runs at
    /// a fixed logical rate.
    pub fn update(&mut self) {
        self.position.x += self.velocity.x;
        self.position.y += self.velocity.y;
    }

    /// Bounce off the top and bottom court edges. Horizontal exits are
    /// scoring events and belong to the simulation, not the ball.
    pub fn collide_with_edges(&mut self, court_height: f32) {
        if self.position.y - self.radius <= 0.0 {
            self.position.y = self.radius;
            self.velocity.y = -self.velocity.y;
        } else if self.position.y + self.radius >= court_height {
            self.position.y = court_height - self.radius;
            self.velocity.y = -self.velocity.y;
        }
    }

    /// AABB-vs-circle test against a paddle. On contact the rebound angle is
    /// a pure function of where the ball struck the paddle face: center hits
    /// go straight back, edge hits deflect up to [`MAX_BOUNCE_ANGLE`].
    /// Returns `true` when a rebound happened.
    pub fn collide_with_paddle(&mut self, paddle: &Paddle) -> bool {
        let closest_x = self
            .position
            .x
            .clamp(paddle.position.x, paddle.position.x + paddle.width);
        let closest_y = self
            .position
            .y
            .clamp(paddle.position.y, paddle.position.y + paddle.height);
        let dx = self.position.x - closest_x;
        let dy = self.position.y - closest_y;
        if dx * dx + dy * dy > self.radius * self.radius {
            return false;
        }

        let speed = self.velocity.magnitude();
        let half_height = paddle.height / 2.0;
        let paddle_center_y = paddle.position.y + half_height;
        let relative_intersect = paddle_center_y - self.position.y;
        let normalized = (relative_intersect / half_height).clamp(-1.0, 1.0);
        let bounce_angle = normalized * MAX_BOUNCE_ANGLE;

        self.velocity.x = -self.velocity.x;
        self.velocity.y = -speed * bounce_angle.sin();
        true
    }

    pub fn state(&self) -> BallState {
        BallState {
            x: self.position.x,
            y: self.position.y,
            radius: self.radius,
        }
    }
}
