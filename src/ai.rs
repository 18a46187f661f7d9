use std::time::{Duration, Instant};

use rand::random;
use tracing::warn;

use crate::ball::Ball;
use crate::difficulty::DifficultyProfile;
use crate::paddle::Paddle;

/// Uniform noise applied to every trajectory prediction, independent of
/// difficulty. Keeps even the hard AI beatable on edge hits.
pub const PREDICTION_FUZZ: f32 = 15.0;

/// The paddle holds once its center is within this band of the target.
const CHASE_DEADBAND: f32 = 5.0;

/// How often the AI re-reads the ball. Movement keeps chasing the last
/// target between decisions.
const DECISION_INTERVAL: Duration = Duration::from_millis(1000);

/// Step ceiling for the forward simulation. A near-stalled horizontal
/// velocity would otherwise never reach the paddle plane.
const MAX_PREDICTION_STEPS: u32 = 10_000;

/// Imperfect controller for the CPU paddle: a periodic prediction with
/// difficulty-scaled noise, adopted only after a reaction delay, chased
/// continuously with a small deadband.
#[derive(Debug)]
pub struct AiController {
    profile: DifficultyProfile,
    court_height: f32,
    target_y: f32,
    pending: Option<PendingDecision>,
    last_decision: Instant,
}

#[derive(Debug, Clone, Copy)]
struct PendingDecision {
    target_y: f32,
    ready_at: Instant,
}

impl AiController {
    pub fn new(profile: DifficultyProfile, court_height: f32, now: Instant) -> Self {
        Self {
            profile,
            court_height,
            target_y: court_height / 2.0,
            pending: None,
            // Backdate so the first decide() fires immediately.
            last_decision: now - DECISION_INTERVAL,
        }
    }

    /// Periodic re-read of the ball. Between calls the paddle keeps chasing
    /// the previously adopted target.
    pub fn decide(&mut self, ball: &Ball, paddle: &Paddle, now: Instant) {
        if now.duration_since(self.last_decision) < DECISION_INTERVAL {
            return;
        }
        self.last_decision = now;

        let mut target = self.predict_ball_y(ball, paddle);
        target += (random::<f32>() - 0.5) * self.profile.randomness;
        if random::<f32>() < self.profile.miss_chance {
            // Missed read: chase a random spot instead of the ball.
            target = random::<f32>() * self.court_height;
        }
        self.pending = Some(PendingDecision {
            target_y: target.clamp(0.0, self.court_height),
            ready_at: now + self.profile.reaction_delay,
        });
    }

    /// Per-tick directional input for the AI paddle.
    pub fn input(&mut self, paddle: &Paddle, now: Instant) -> i8 {
        if let Some(pending) = self.pending {
            if now >= pending.ready_at {
                self.target_y = pending.target_y;
                self.pending = None;
            }
        }

        let distance = self.target_y - paddle.center_y();
        if distance.abs() <= CHASE_DEADBAND {
            0
        } else if distance > 0.0 {
            1
        } else {
            -1
        }
    }

    /// Predicted ball y at the paddle plane, fuzzed by ±[`PREDICTION_FUZZ`]
    /// and clamped to the court.
    pub fn predict_ball_y(&self, ball: &Ball, paddle: &Paddle) -> f32 {
        let exact = projected_intercept_y(ball, paddle.position.x, self.court_height);
        let fuzz = (random::<f32>() - 0.5) * 2.0 * PREDICTION_FUZZ;
        (exact + fuzz).clamp(0.0, self.court_height)
    }
}

/// Forward-simulate a positional copy of the ball (paddles ignored) until it
/// reaches `paddle_x`, reflecting off the top and bottom walls exactly as
/// the real ball does. A ball not heading toward the plane yields its
/// current y.
fn projected_intercept_y(ball: &Ball, paddle_x: f32, court_height: f32) -> f32 {
    let heading_toward = (ball.velocity.x > 0.0 && ball.position.x < paddle_x)
        || (ball.velocity.x < 0.0 && ball.position.x > paddle_x);
    if !heading_toward {
        return ball.position.y;
    }

    let mut x = ball.position.x;
    let mut y = ball.position.y;
    let vx = ball.velocity.x;
    let mut vy = ball.velocity.y;

    for _ in 0..MAX_PREDICTION_STEPS {
        x += vx;
        y += vy;
        if y < 0.0 {
            y = -y;
            vy = -vy;
        } else if y > court_height {
            y = 2.0 * court_height - y;
            vy = -vy;
        }
        let reached = (vx > 0.0 && x >= paddle_x) || (vx < 0.0 && x <= paddle_x);
        if reached {
            return y;
        }
    }

    warn!(paddle_x, vx, "ball trajectory prediction hit its step ceiling");
    y
}
