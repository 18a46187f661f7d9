use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use rand::random;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
    Frame,
};

use crate::ai::AiController;
use crate::ball::Ball;
use crate::difficulty::{Difficulty, DifficultyProfile};
use crate::game_theme::GameTheme;
use crate::helpers::centered_rect;
use crate::messages::{Countdown, GameStateSnapshot, GameStatus, PaddlePair};
use crate::paddle::{Paddle, Side, PADDLE_HEIGHT};

/// Physics space dimensions. All simulation and network coordinates are in
/// this space; the terminal grid is only a projection at draw time.
pub const COURT_WIDTH: f32 = 1000.0;
pub const COURT_HEIGHT: f32 = 600.0;

const LEFT_PADDLE_X: f32 = 20.0;
const RIGHT_PADDLE_X: f32 = 970.0;

pub const DEFAULT_MAX_POINTS: u32 = 5;

/// Fixed logical tick. The draw rate may drift from this; the physics rate
/// does not.
const TICK: Duration = Duration::from_millis(16);

/// Informational overlays (opponent presence, reconnect progress) expire on
/// their own.
const OVERLAY_TTL: Duration = Duration::from_secs(5);

const COUNTDOWN_SECS: u64 = 3;
const GO_FLASH: Duration = Duration::from_millis(700);

/// Where a game's inputs come from. The three variants share every other
/// part of the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameMode {
    /// Local keys drive the left paddle, the AI drives the right.
    SinglePlayer,
    /// Two key sets on one keyboard.
    LocalMultiplayer,
    /// No local physics at all: state is replicated from server snapshots
    /// and local keys only emit `move_paddle` commands.
    Remote { side: Side },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameResult {
    pub left_score: u32,
    pub right_score: u32,
    pub winner: Side,
}

pub struct Game {
    mode: GameMode,
    status: GameStatus,
    ball: Ball,
    left: Paddle,
    right: Paddle,
    ai: Option<AiController>,
    profile: DifficultyProfile,
    max_points: u32,
    player_names: [String; 2],
    theme: GameTheme,
    area: Rect,

    paused: bool,
    should_exit: bool,
    last_tick: Instant,
    countdown_until: Option<Instant>,
    countdown: Option<Countdown>,
    play_sound: bool,
    /// Remote mode: nothing is drawn for the ball until the first snapshot.
    has_remote_state: bool,

    overlay: Option<(String, Instant)>,
    latency_ms: Option<u64>,
    pending_inputs: Vec<i8>,

    result: Option<GameResult>,
    on_end: Option<Box<dyn FnMut(&GameResult) + Send>>,
}

impl Game {
    pub fn new(
        mode: GameMode,
        player_names: [String; 2],
        difficulty: Difficulty,
        theme: GameTheme,
        now: Instant,
    ) -> Self {
        let profile = difficulty.profile();
        let paddle_y = (COURT_HEIGHT - PADDLE_HEIGHT) / 2.0;
        let left = Paddle::new(Side::Left, LEFT_PADDLE_X, paddle_y, profile.paddle_speed);
        let right = Paddle::new(Side::Right, RIGHT_PADDLE_X, paddle_y, profile.paddle_speed);

        let mut ball = Ball::new(COURT_WIDTH / 2.0, COURT_HEIGHT / 2.0);
        if !matches!(mode, GameMode::Remote { .. }) {
            let horizontal = if random::<bool>() { 1.0 } else { -1.0 };
            let vertical = if random::<bool>() { 1.0 } else { -1.0 };
            ball.set_speed(horizontal * profile.ball_speed, vertical * profile.ball_speed);
        }

        let ai = match mode {
            GameMode::SinglePlayer => Some(AiController::new(profile, COURT_HEIGHT, now)),
            _ => None,
        };

        Self {
            mode,
            status: GameStatus::Playing,
            ball,
            left,
            right,
            ai,
            profile,
            max_points: DEFAULT_MAX_POINTS,
            player_names,
            theme,
            area: Rect::default(),
            paused: false,
            should_exit: false,
            last_tick: now,
            countdown_until: None,
            countdown: None,
            play_sound: false,
            has_remote_state: false,
            overlay: None,
            latency_ms: None,
            pending_inputs: Vec::new(),
            result: None,
            on_end: None,
        }
    }

    pub fn with_max_points(mut self, max_points: u32) -> Self {
        self.max_points = max_points.max(1);
        self
    }

    /// Register the one-shot end-of-game hook.
    pub fn on_end(&mut self, callback: Box<dyn FnMut(&GameResult) + Send>) {
        self.on_end = Some(callback);
    }

    pub fn theme(&self) -> GameTheme {
        self.theme
    }

    pub fn set_area(&mut self, area: Rect) {
        self.area = area;
    }

    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    pub fn scores(&self) -> (u32, u32) {
        (self.left.score, self.right.score)
    }

    /// Arm the pre-serve countdown. Physics holds until it elapses.
    pub fn start_countdown(&mut self, now: Instant) {
        self.countdown_until = Some(now + Duration::from_secs(COUNTDOWN_SECS));
    }

    /// Show a transient informational overlay (reconnect progress, opponent
    /// presence). Expires after [`OVERLAY_TTL`].
    pub fn set_overlay(&mut self, text: String, now: Instant) {
        self.overlay = Some((text, now));
    }

    pub fn clear_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn set_latency(&mut self, ms: u64) {
        self.latency_ms = Some(ms);
    }

    /// Directional commands queued by key events in remote mode, drained by
    /// the app shell into the game channel.
    pub fn take_pending_inputs(&mut self) -> Vec<i8> {
        std::mem::take(&mut self.pending_inputs)
    }

    /// Adopt the names announced by `game_info`/`game_start`.
    pub fn set_player_names(&mut self, names: [String; 2]) {
        self.player_names = names;
    }

    /// Terminal event pushed by the server (`game_finished`).
    pub fn finish_remote(&mut self, left_score: u32, right_score: u32) {
        self.left.score = left_score;
        self.right.score = right_score;
        let winner = if right_score > left_score {
            Side::Right
        } else {
            Side::Left
        };
        self.finish(winner);
    }

    /// Replicate an authoritative server snapshot (remote mode).
    pub fn apply_snapshot(&mut self, snapshot: &GameStateSnapshot) {
        self.left.apply_state(&snapshot.paddles.left);
        self.right.apply_state(&snapshot.paddles.right);
        self.ball.set_position(snapshot.ball.x, snapshot.ball.y);
        self.ball.radius = snapshot.ball.radius;
        self.countdown = snapshot.countdown.clone();
        self.play_sound = snapshot.play_sound;
        self.has_remote_state = true;
        if snapshot.status == GameStatus::Finished {
            let winner = if self.right.score > self.left.score {
                Side::Right
            } else {
                Side::Left
            };
            self.finish(winner);
        }
    }

    /// Snapshot of the local simulation in the wire format.
    pub fn snapshot(&self) -> GameStateSnapshot {
        GameStateSnapshot {
            status: self.status,
            countdown: self.countdown.clone(),
            play_sound: self.play_sound,
            paddles: PaddlePair {
                left: self.left.state(),
                right: self.right.state(),
            },
            ball: self.ball.state(),
        }
    }

    /// One pass of the cooperative loop: drain input events, then advance
    /// the fixed-rate physics if due. Returns `false` when the player left
    /// the game screen.
    pub fn game_loop(&mut self) -> io::Result<bool> {
        if self.paused {
            self.handle_pause_events()?;
            return Ok(!self.should_exit);
        }

        self.handle_events()?;
        if self.should_exit {
            return Ok(false);
        }

        if !matches!(self.mode, GameMode::Remote { .. })
            && self.last_tick.elapsed() >= TICK
        {
            let now = Instant::now();
            self.update(now);
            self.last_tick = now;
        }

        Ok(true)
    }

    /// One fixed physics tick.
    fn update(&mut self, now: Instant) {
        if self.paused || self.status == GameStatus::Finished {
            return;
        }
        if matches!(self.mode, GameMode::Remote { .. }) {
            return;
        }
        if self.countdown_gate(now) {
            return;
        }

        self.play_sound = false;

        if let Some(ai) = &mut self.ai {
            ai.decide(&self.ball, &self.right, now);
            let direction = ai.input(&self.right, now);
            self.right.apply_input(direction);
        }

        self.ball.update();
        self.ball.collide_with_edges(COURT_HEIGHT);
        if self.ball.collide_with_paddle(&self.left) || self.ball.collide_with_paddle(&self.right)
        {
            self.play_sound = true;
        }

        self.left.constrain_to_court(COURT_HEIGHT);
        self.right.constrain_to_court(COURT_HEIGHT);

        if self.ball.position.x <= 0.0 {
            self.right.score_point();
            self.respawn_ball();
        } else if self.ball.position.x >= COURT_WIDTH {
            self.left.score_point();
            self.respawn_ball();
        }

        if self.left.score >= self.max_points {
            self.finish(Side::Left);
        } else if self.right.score >= self.max_points {
            self.finish(Side::Right);
        }
    }

    /// Returns `true` while the pre-serve countdown is holding physics.
    fn countdown_gate(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.countdown_until else {
            return false;
        };
        if now < deadline {
            let remaining = (deadline - now).as_secs_f32().ceil() as u32;
            self.countdown = Some(Countdown::Seconds(remaining.max(1)));
            true
        } else if now < deadline + GO_FLASH {
            self.countdown = Some(Countdown::Label("GO!".into()));
            false
        } else {
            self.countdown = None;
            self.countdown_until = None;
            false
        }
    }

    /// Center respawn after a score: horizontal direction reversed, 50 %
    /// chance to flip vertical, difficulty speed re-applied per axis.
    fn respawn_ball(&mut self) {
        self.play_sound = true;
        let speed = self.profile.ball_speed;
        let horizontal = -self.ball.velocity.x.signum();
        let mut vertical = self.ball.velocity.y.signum();
        if random::<bool>() {
            vertical = -vertical;
        }
        self.ball.set_position(COURT_WIDTH / 2.0, COURT_HEIGHT / 2.0);
        self.ball.set_speed(horizontal * speed, vertical * speed);
    }

    fn finish(&mut self, winner: Side) {
        if self.result.is_some() {
            return;
        }
        self.status = GameStatus::Finished;
        let result = GameResult {
            left_score: self.left.score,
            right_score: self.right.score,
            winner,
        };
        if let Some(callback) = &mut self.on_end {
            callback(&result);
        }
        self.result = Some(result);
    }

    fn move_local(&mut self, side: Side, direction: i8) {
        let paddle = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        paddle.apply_input(direction);
        paddle.constrain_to_court(COURT_HEIGHT);
    }

    fn handle_key_event(&mut self, key_event: KeyEvent) {
        let code = key_event.code;
        match code {
            KeyCode::Esc | KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Char('p') => {
                // Pause never crosses the network; the remote game keeps
                // running on the server regardless.
                if !matches!(self.mode, GameMode::Remote { .. }) {
                    self.paused = true;
                }
            }
            _ => match self.mode {
                GameMode::SinglePlayer => match code {
                    KeyCode::Up | KeyCode::Char('w') => self.move_local(Side::Left, -1),
                    KeyCode::Down | KeyCode::Char('s') => self.move_local(Side::Left, 1),
                    _ => {}
                },
                GameMode::LocalMultiplayer => match code {
                    KeyCode::Char('w') => self.move_local(Side::Left, -1),
                    KeyCode::Char('s') => self.move_local(Side::Left, 1),
                    KeyCode::Up => self.move_local(Side::Right, -1),
                    KeyCode::Down => self.move_local(Side::Right, 1),
                    _ => {}
                },
                GameMode::Remote { .. } => match code {
                    KeyCode::Up | KeyCode::Char('w') => self.pending_inputs.push(-1),
                    KeyCode::Down | KeyCode::Char('s') => self.pending_inputs.push(1),
                    _ => {}
                },
            },
        }
    }

    fn handle_events(&mut self) -> io::Result<()> {
        // Process all pending events for better responsiveness
        while event::poll(Duration::from_millis(5))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    self.handle_key_event(key_event);
                }
            }
        }
        Ok(())
    }

    fn handle_pause_events(&mut self) -> io::Result<()> {
        while event::poll(Duration::from_millis(5))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    match key_event.code {
                        KeyCode::Char('p') | KeyCode::Enter => self.paused = false,
                        KeyCode::Esc => self.should_exit = true,
                        KeyCode::Char('d') => self.theme = self.theme.next(),
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    // --- Rendering -------------------------------------------------------

    pub fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let colors = self.theme.colors();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Fill(1), Constraint::Length(3)])
            .split(area);

        let game_area = layout[0];
        self.set_area(game_area);

        let block = Block::default()
            .title(self.title_line())
            .borders(Borders::ALL)
            .border_type(BorderType::Thick)
            .style(Style::default().fg(colors.border).bg(colors.background))
            .title_alignment(Alignment::Center);
        frame.render_widget(block, game_area);

        self.draw_court(frame);
        self.draw_footer(frame, layout[1]);

        if let Some(countdown) = &self.countdown {
            let text = match countdown {
                Countdown::Seconds(n) => n.to_string(),
                Countdown::Label(label) => label.clone(),
            };
            let popup = Paragraph::new(text)
                .style(Style::default().fg(colors.accent))
                .alignment(Alignment::Center);
            frame.render_widget(popup, centered_rect(12, 1, area.width, area.height));
        }

        let overlay_expired =
            matches!(&self.overlay, Some((_, since)) if since.elapsed() >= OVERLAY_TTL);
        if overlay_expired {
            self.overlay = None;
        }
        if let Some((text, _)) = &self.overlay {
            let width = (text.len() as u16 + 4).min(area.width);
            let overlay_area = Rect::new(
                area.x + area.width.saturating_sub(width) / 2,
                area.y + 1,
                width,
                3,
            );
            let popup = Paragraph::new(text.as_str())
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded),
                )
                .style(Style::default().fg(colors.accent))
                .alignment(Alignment::Center);
            frame.render_widget(Clear, overlay_area);
            frame.render_widget(popup, overlay_area);
        }

        if let Some(result) = self.result {
            self.draw_finished_popup(frame, &result);
        } else if self.paused {
            self.draw_pause_popup(frame);
        }
    }

    fn draw_court(&self, frame: &mut Frame) {
        let colors = self.theme.colors();
        let game_area = self.area;
        if game_area.width <= 2 || game_area.height <= 2 {
            tracing::debug!("draw area degenerate, skipping court render");
            return;
        }
        let inner = Rect::new(
            game_area.x + 1,
            game_area.y + 1,
            game_area.width - 2,
            game_area.height - 2,
        );

        // Wipe the play field every frame: ratatui double-buffers, and any
        // cell not written this frame would bleed content from two frames
        // ago back in as ghost objects.
        frame.render_widget(Clear, inner);

        // Dashed center line.
        let net_x = inner.x + inner.width / 2;
        for row in (0..inner.height).step_by(2) {
            let cell = Rect::new(net_x, inner.y + row, 1, 1);
            frame.render_widget(
                Paragraph::new("╎").style(Style::default().fg(colors.net)),
                cell,
            );
        }

        for paddle in [&self.left, &self.right] {
            let x = project(paddle.position.x, COURT_WIDTH, inner.width);
            let y = project(paddle.position.y, COURT_HEIGHT, inner.height);
            let height = project(paddle.height, COURT_HEIGHT, inner.height).max(1);
            let bar = Rect::new(
                inner.x + x.min(inner.width.saturating_sub(1)),
                inner.y + y.min(inner.height.saturating_sub(1)),
                1,
                height.min(inner.height),
            );
            frame.render_widget(
                Block::default().style(Style::default().bg(colors.paddle)),
                bar,
            );
        }

        let draw_ball = !matches!(self.mode, GameMode::Remote { .. }) || self.has_remote_state;
        if draw_ball {
            let x = project(self.ball.position.x, COURT_WIDTH, inner.width);
            let y = project(self.ball.position.y, COURT_HEIGHT, inner.height);
            let ball_area = Rect::new(
                inner.x + x.min(inner.width.saturating_sub(2)),
                inner.y + y.min(inner.height.saturating_sub(1)),
                2,
                1,
            );
            frame.render_widget(
                Paragraph::new("██").style(Style::default().fg(colors.ball)),
                ball_area,
            );
        }
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let colors = self.theme.colors();
        let controls = match self.mode {
            GameMode::SinglePlayer => " ↑/W up  ↓/S down  P pause  Esc quit ".to_string(),
            GameMode::LocalMultiplayer => {
                " P1: W/S   P2: ↑/↓   P pause   Esc quit ".to_string()
            }
            GameMode::Remote { side } => {
                let latency = match self.latency_ms {
                    Some(ms) => format!("{ms} ms"),
                    None => "--".to_string(),
                };
                format!(" you play {side}  ↑/W up  ↓/S down  Esc quit  |  ping {latency} ")
            }
        };
        let footer = Paragraph::new(controls)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .style(Style::default().fg(colors.border)),
            )
            .style(Style::default().fg(colors.text))
            .alignment(Alignment::Center);
        frame.render_widget(footer, area);
    }

    fn draw_pause_popup(&self, frame: &mut Frame) {
        let colors = self.theme.colors();
        let area = frame.area();
        let popup_area = centered_rect(46, 8, area.width, area.height);
        let popup = Paragraph::new(format!(
            "\nPaused\n[P/Enter] Resume  [D] Theme ({})  [Esc] Quit",
            self.theme.label()
        ))
        .block(
            Block::default()
                .title("Paused")
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .title_alignment(Alignment::Center),
        )
        .style(Style::default().fg(colors.accent))
        .alignment(Alignment::Center);
        frame.render_widget(Clear, popup_area);
        frame.render_widget(popup, popup_area);
    }

    fn draw_finished_popup(&self, frame: &mut Frame, result: &GameResult) {
        let colors = self.theme.colors();
        let area = frame.area();
        let winner_name = match result.winner {
            Side::Left => &self.player_names[0],
            Side::Right => &self.player_names[1],
        };
        let popup_area = centered_rect(44, 7, area.width, area.height);
        let popup = Paragraph::new(format!(
            "\n{} wins {} - {}\n[Esc] Back to menu",
            winner_name, result.left_score, result.right_score
        ))
        .block(
            Block::default()
                .title("Game over")
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .title_alignment(Alignment::Center),
        )
        .style(Style::default().fg(colors.accent))
        .alignment(Alignment::Center);
        frame.render_widget(Clear, popup_area);
        frame.render_widget(popup, popup_area);
    }

    fn title_line(&self) -> String {
        format!(
            " {} ({})  pong.arena  ({}) {} ",
            self.player_names[0], self.left.score, self.right.score, self.player_names[1]
        )
    }
}

fn project(value: f32, court_extent: f32, cells: u16) -> u16 {
    let scaled = (value / court_extent) * f32::from(cells);
    (scaled.round().max(0.0) as u16).min(cells.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::ball::{BallState as WireBall, Vec2};
    use crate::paddle::PaddleState;

    fn single_player(now: Instant) -> Game {
        Game::new(
            GameMode::SinglePlayer,
            ["ada".into(), "cpu".into()],
            Difficulty::Medium,
            GameTheme::Monokai,
            now,
        )
    }

    #[test]
    fn wall_bounce_then_right_miss_scores_left_and_respawns() {
        let now = Instant::now();
        let mut game = single_player(now);

        // Medium profile serves at 7 units/tick per axis.
        game.ball.set_position(500.0, 12.0);
        game.ball.set_speed(7.0, -7.0);
        game.update(now);
        assert_eq!(game.ball.velocity, Vec2::new(7.0, 7.0));

        // Park the AI paddle where it cannot save, then run the ball out.
        game.right.position.y = 0.0;
        game.ball.set_position(995.0, 450.0);
        game.ball.set_speed(7.0, 0.0);
        game.update(now);

        assert_eq!(game.scores(), (1, 0));
        assert_eq!(game.ball.position, Vec2::new(500.0, 300.0));
        assert_eq!(game.ball.velocity.x, -7.0);
        assert_eq!(game.ball.velocity.y.abs(), 7.0);
    }

    #[test]
    fn left_exit_scores_right_and_serves_rightward() {
        let now = Instant::now();
        let mut game = single_player(now);
        game.ball.set_position(5.0, 300.0);
        game.ball.set_speed(-7.0, 0.0);
        game.update(now);

        assert_eq!(game.scores(), (0, 1));
        assert_eq!(game.ball.velocity.x, 7.0);
        assert_eq!(game.ball.velocity.y.abs(), 7.0);
    }

    #[test]
    fn exactly_one_end_callback_and_no_ticks_after_finish() {
        let now = Instant::now();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();

        let mut game = single_player(now).with_max_points(1);
        game.on_end(Box::new(move |result| {
            assert_eq!(result.winner, Side::Left);
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        game.right.position.y = 0.0;
        game.ball.set_position(995.0, 450.0);
        game.ball.set_speed(7.0, 0.0);
        game.update(now);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(game.scores(), (1, 0));

        // Terminal state: further ticks change nothing.
        game.ball.set_position(995.0, 450.0);
        game.ball.set_speed(7.0, 0.0);
        game.update(now);
        game.update(now);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(game.scores(), (1, 0));
    }

    #[test]
    fn pause_suspends_physics_without_resetting_state() {
        let now = Instant::now();
        let mut game = single_player(now);
        game.ball.set_position(400.0, 300.0);
        game.ball.set_speed(7.0, 0.0);
        game.paused = true;
        game.update(now);
        assert_eq!(game.ball.position, Vec2::new(400.0, 300.0));

        game.paused = false;
        game.update(now);
        assert_eq!(game.ball.position.x, 407.0);
    }

    #[test]
    fn countdown_holds_physics_until_it_elapses() {
        let now = Instant::now();
        let mut game = single_player(now);
        game.start_countdown(now);
        game.ball.set_position(400.0, 300.0);
        game.ball.set_speed(7.0, 0.0);

        game.update(now + Duration::from_secs(1));
        assert_eq!(game.ball.position.x, 400.0);
        assert!(matches!(game.countdown, Some(Countdown::Seconds(_))));

        game.update(now + Duration::from_millis(3100));
        assert_eq!(game.ball.position.x, 407.0);
        assert_eq!(game.countdown, Some(Countdown::Label("GO!".into())));
    }

    #[test]
    fn remote_game_replicates_snapshots_verbatim() {
        let now = Instant::now();
        let mut game = Game::new(
            GameMode::Remote { side: Side::Left },
            ["ada".into(), "grace".into()],
            Difficulty::Medium,
            GameTheme::Monokai,
            now,
        );
        // Remote mode never runs physics on its own.
        game.update(now);
        assert_eq!(game.ball.velocity, Vec2::new(0.0, 0.0));

        let snapshot = GameStateSnapshot {
            status: GameStatus::Playing,
            countdown: None,
            play_sound: true,
            paddles: PaddlePair {
                left: PaddleState {
                    x: 20.0,
                    y: 111.0,
                    width: 10.0,
                    height: 100.0,
                    score: 3,
                },
                right: PaddleState {
                    x: 970.0,
                    y: 222.0,
                    width: 10.0,
                    height: 100.0,
                    score: 4,
                },
            },
            ball: WireBall {
                x: 640.0,
                y: 480.0,
                radius: 8.0,
            },
        };
        game.apply_snapshot(&snapshot);

        assert_eq!(game.left.position.y, 111.0);
        assert_eq!(game.right.position.y, 222.0);
        assert_eq!(game.scores(), (3, 4));
        assert_eq!(game.ball.position, Vec2::new(640.0, 480.0));
        assert!(game.has_remote_state);
    }

    #[test]
    fn finished_snapshot_ends_the_remote_game_once() {
        let now = Instant::now();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let mut game = Game::new(
            GameMode::Remote { side: Side::Right },
            ["ada".into(), "grace".into()],
            Difficulty::Medium,
            GameTheme::Monokai,
            now,
        );
        game.on_end(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let mut snapshot = GameStateSnapshot {
            status: GameStatus::Finished,
            countdown: None,
            play_sound: false,
            paddles: PaddlePair {
                left: PaddleState {
                    x: 20.0,
                    y: 0.0,
                    width: 10.0,
                    height: 100.0,
                    score: 5,
                },
                right: PaddleState {
                    x: 970.0,
                    y: 0.0,
                    width: 10.0,
                    height: 100.0,
                    score: 2,
                },
            },
            ball: WireBall {
                x: 500.0,
                y: 300.0,
                radius: 8.0,
            },
        };
        game.apply_snapshot(&snapshot);
        snapshot.play_sound = true;
        game.apply_snapshot(&snapshot);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(game.result().unwrap().winner, Side::Left);
    }

    #[test]
    fn local_snapshot_reports_the_simulation() {
        let now = Instant::now();
        let mut game = single_player(now);
        game.ball.set_position(321.0, 123.0);
        let snapshot = game.snapshot();
        assert_eq!(snapshot.status, GameStatus::Playing);
        assert_eq!(snapshot.ball.x, 321.0);
        assert_eq!(snapshot.paddles.left.x, 20.0);
        assert_eq!(snapshot.paddles.right.x, 970.0);
    }
}
