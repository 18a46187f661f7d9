use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Flex, Layout, Margin, Rect},
    style::{Color, Style, Stylize},
    widgets::{Block, BorderType, Borders, Paragraph},
    DefaultTerminal, Frame,
};
use tracing::{info, warn};
use tui_big_text::{BigText, PixelSize};

mod ai;
mod ball;
mod difficulty;
mod game;
mod game_theme;
mod helpers;
mod matchmaking;
mod messages;
mod network;
mod paddle;
mod session;
mod storage;

use crate::difficulty::Difficulty;
use crate::game::{Game, GameMode};
use crate::game_theme::GameTheme;
use crate::helpers::{centered_rect_with_percentage, now_ms};
use crate::matchmaking::{open_matchmaking, MatchmakingChannel, MatchmakingConfig, MatchmakingEvent};
use crate::network::{open_game_channel, GameChannel, GameChannelConfig, SessionCommand};
use crate::paddle::Side;
use crate::session::SessionEvent;
use crate::storage::{load_json, save_json, FileStore, PendingMatch, SessionStore, THEME_KEY};

const MAX_NAME_LEN: usize = 16;

const MAIN_MENU_OPTIONS: [&str; 5] = [
    "Play vs. AI",
    "Local Multiplayer",
    "Online Match",
    "Settings",
    "Exit",
];

#[derive(Parser, Debug)]
#[command(name = "pong-arena", about = "Terminal Pong with networked matchmaking")]
struct Cli {
    /// Backend base URL for the online mode (ws:// or wss://).
    #[arg(long, default_value = "ws://127.0.0.1:8000")]
    server: String,
    /// Player identifier presented to the backend. Derived from the player
    /// name when omitted.
    #[arg(long)]
    player_id: Option<String>,
    /// Directory for persisted state (reconnection records, theme).
    #[arg(long, default_value = ".pong-arena")]
    data_dir: PathBuf,
    /// Log file. The terminal itself belongs to the game.
    #[arg(long, default_value = "pong-arena.log")]
    log_file: PathBuf,
}

#[derive(Debug)]
struct MainMenu {
    options: Vec<&'static str>,
    selected: usize,
}

#[derive(Debug)]
enum AppScreen {
    MainMenu,
    PlayerNameInput {
        current: usize,
        max: usize,
        online: bool,
    },
    Matchmaking,
    Game,
    Settings,
}

struct App {
    cli: Cli,
    store: Arc<dyn SessionStore>,
    exit: bool,
    main_menu: MainMenu,
    screen: AppScreen,
    name_input: String,
    player_names: [String; 2],
    difficulty: Difficulty,
    selected_theme: GameTheme,
    settings_selected: usize,
    current_game: Option<Game>,
    game_channel: Option<GameChannel>,
    matchmaking: Option<MatchmakingChannel>,
    matchmaking_status: String,
    network_failed: bool,
}

impl App {
    fn new(cli: Cli) -> Self {
        let store: Arc<dyn SessionStore> = Arc::new(FileStore::new(cli.data_dir.clone()));
        let selected_theme = load_json::<GameTheme>(&*store, THEME_KEY).unwrap_or_default();

        Self {
            cli,
            store,
            exit: false,
            main_menu: MainMenu {
                options: MAIN_MENU_OPTIONS.to_vec(),
                selected: 0,
            },
            screen: AppScreen::MainMenu,
            name_input: String::new(),
            player_names: [String::new(), String::new()],
            difficulty: Difficulty::Medium,
            selected_theme,
            settings_selected: 0,
            current_game: None,
            game_channel: None,
            matchmaking: None,
            matchmaking_status: String::new(),
            network_failed: false,
        }
    }

    fn player_id(&self) -> String {
        match &self.cli.player_id {
            Some(id) => id.clone(),
            None => format!(
                "{}-{}",
                self.player_names[0].to_lowercase().replace(' ', "-"),
                now_ms() % 100_000
            ),
        }
    }

    pub fn run(&mut self, mut terminal: DefaultTerminal) -> io::Result<()> {
        let mut last_size: u8 = 0; // 0 -> too small | 1 -> normal

        while !self.exit {
            let min_width = 100;
            let min_height = 28;

            let size = terminal.size()?;
            if size.width < min_width || size.height < min_height {
                if last_size == 1 {
                    sleep(Duration::from_millis(100));
                    last_size = 0;
                }
                self.handle_menu_events()?;
                terminal.draw(|frame| self.show_terminal_resize_warning(frame))?;
                continue;
            }
            if last_size == 0 {
                sleep(Duration::from_millis(100));
                last_size = 1;
            }

            match self.screen {
                AppScreen::MainMenu => {
                    self.handle_menu_events()?;
                    let _ = terminal.draw(|frame| self.draw_menu(frame));
                }
                AppScreen::PlayerNameInput {
                    current,
                    max,
                    online,
                } => {
                    self.handle_player_name_input_events(current, max, online)?;
                    let _ = terminal.draw(|frame| self.draw_player_name_input(frame, current));
                }
                AppScreen::Matchmaking => {
                    self.pump_matchmaking();
                    self.handle_matchmaking_events()?;
                    let _ = terminal.draw(|frame| self.draw_matchmaking(frame));
                }
                AppScreen::Game => {
                    self.pump_game_channel();
                    let continue_game = match self.current_game.as_mut() {
                        Some(game) => game.game_loop()?,
                        None => false,
                    };
                    if !continue_game {
                        self.leave_game();
                    } else {
                        self.forward_game_inputs();
                        if let Some(game) = self.current_game.as_mut() {
                            let _ = terminal.draw(|frame| game.draw(frame));
                        }
                    }
                }
                AppScreen::Settings => {
                    self.handle_settings_events()?;
                    let _ = terminal.draw(|frame| self.draw_settings(frame));
                }
            }
        }

        Ok(())
    }

    // --- Game wiring -----------------------------------------------------

    fn start_local_game(&mut self, mode: GameMode) {
        let mut game = Game::new(
            mode,
            [self.player_names[0].clone(), self.player_names[1].clone()],
            self.difficulty,
            self.selected_theme,
            Instant::now(),
        );
        game.start_countdown(Instant::now());
        self.current_game = Some(game);
        self.screen = AppScreen::Game;
    }

    fn start_matchmaking(&mut self) {
        let config = MatchmakingConfig {
            server_url: self.cli.server.clone(),
            player_id: self.player_id(),
            username: self.player_names[0].clone(),
        };
        info!(server = %config.server_url, "starting matchmaking");
        self.matchmaking = Some(open_matchmaking(config, self.store.clone()));
        self.matchmaking_status = "Contacting the matchmaker...".into();
        self.screen = AppScreen::Matchmaking;
    }

    fn start_online_game(&mut self, pending: PendingMatch) {
        let username = self.player_names[0].clone();
        let names = match pending.side {
            Side::Left => [username, pending.opponent.clone()],
            Side::Right => [pending.opponent.clone(), username],
        };
        let mut game = Game::new(
            GameMode::Remote { side: pending.side },
            names,
            self.difficulty,
            self.selected_theme,
            Instant::now(),
        );
        game.set_overlay("Waiting for the server...".into(), Instant::now());
        self.current_game = Some(game);

        let channel = open_game_channel(
            GameChannelConfig {
                server_url: self.cli.server.clone(),
                game_id: pending.game_id,
                player_id: self.player_id(),
            },
            self.store.clone(),
        );
        channel.send(SessionCommand::ReadyForCountdown);
        self.game_channel = Some(channel);
        self.network_failed = false;
        self.matchmaking = None;
        self.screen = AppScreen::Game;
    }

    fn leave_game(&mut self) {
        if let Some(channel) = self.game_channel.take() {
            // Cancel any residual paddle motion the server may still be
            // applying, then tear down for good.
            channel.send(SessionCommand::ForceStop { critical: true });
            channel.disconnect();
        }
        if let Some(game) = self.current_game.take() {
            // Theme may have been cycled from the pause menu.
            if game.theme() != self.selected_theme {
                self.selected_theme = game.theme();
                save_json(&*self.store, THEME_KEY, &self.selected_theme);
            }
        }
        self.screen = AppScreen::MainMenu;
    }

    /// Apply queued session events to the remote game.
    fn pump_game_channel(&mut self) {
        let Some(channel) = &self.game_channel else {
            return;
        };
        let events: Vec<SessionEvent> = channel.events.try_iter().collect();
        let Some(game) = self.current_game.as_mut() else {
            return;
        };
        let now = Instant::now();

        for event in events {
            match event {
                SessionEvent::Opened { reconnecting } => {
                    if reconnecting {
                        game.set_overlay("Reconnecting to your match...".into(), now);
                    } else {
                        game.clear_overlay();
                    }
                }
                SessionEvent::StateUpdate(snapshot) => game.apply_snapshot(&snapshot),
                SessionEvent::SideAssigned(side) => {
                    info!(%side, "server assigned side");
                }
                SessionEvent::GameInfo {
                    player1, player2, ..
                }
                | SessionEvent::GameStart {
                    player1, player2, ..
                } => {
                    game.set_player_names([player1, player2]);
                }
                SessionEvent::Reconnecting { attempt, max } => {
                    game.set_overlay(format!("Reconnecting... (attempt {attempt}/{max})"), now);
                }
                SessionEvent::ReconnectFailed => {
                    self.network_failed = true;
                    game.set_overlay("Connection lost for good — Esc to leave".into(), now);
                }
                SessionEvent::ConnectionDead => {
                    game.set_overlay("Connection unresponsive...".into(), now);
                }
                SessionEvent::OpponentPresence {
                    username,
                    connected,
                    ..
                } => {
                    let verb = if connected {
                        "reconnected"
                    } else {
                        "disconnected"
                    };
                    game.set_overlay(format!("{username} {verb}"), now);
                }
                SessionEvent::Latency { round_trip_ms } => game.set_latency(round_trip_ms),
                SessionEvent::GameFinished { final_score, .. } => {
                    game.finish_remote(final_score.player1, final_score.player2);
                }
            }
        }
    }

    /// Relay key presses from the remote game into `move_paddle` commands.
    fn forward_game_inputs(&mut self) {
        let Some(game) = self.current_game.as_mut() else {
            return;
        };
        let inputs = game.take_pending_inputs();
        if inputs.is_empty() || self.network_failed {
            return;
        }
        if let Some(channel) = &self.game_channel {
            for direction in inputs {
                channel.send(SessionCommand::Move { direction });
            }
        }
    }

    fn pump_matchmaking(&mut self) {
        let Some(channel) = &self.matchmaking else {
            return;
        };
        let events: Vec<MatchmakingEvent> = channel.events.try_iter().collect();
        for event in events {
            match event {
                MatchmakingEvent::Waiting(message) => {
                    self.matchmaking_status =
                        message.unwrap_or_else(|| "Waiting for an opponent...".into());
                }
                MatchmakingEvent::Searching(message) => {
                    self.matchmaking_status =
                        message.unwrap_or_else(|| "Searching for an opponent...".into());
                }
                MatchmakingEvent::Matched(pending) => {
                    self.matchmaking_status = format!("Matched against {}!", pending.opponent);
                    self.start_online_game(pending);
                    return;
                }
                MatchmakingEvent::Error(message) => {
                    self.matchmaking_status = format!("{message} — Esc to go back");
                }
            }
        }
    }

    // --- Event handling --------------------------------------------------

    fn handle_menu_events(&mut self) -> io::Result<()> {
        // Non-blocking event polling with short timeout
        if event::poll(Duration::from_millis(10))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    match key_event.code {
                        KeyCode::Char('q') => self.exit = true,
                        KeyCode::Up => {
                            if self.main_menu.selected > 0 {
                                self.main_menu.selected -= 1;
                            } else {
                                self.main_menu.selected = MAIN_MENU_OPTIONS.len() - 1;
                            }
                        }
                        KeyCode::Down => {
                            if self.main_menu.selected < MAIN_MENU_OPTIONS.len() - 1 {
                                self.main_menu.selected += 1;
                            } else {
                                self.main_menu.selected = 0;
                            }
                        }
                        KeyCode::Enter => match self.main_menu.selected {
                            0 => {
                                self.name_input.clear();
                                self.player_names = [String::new(), "Computer".into()];
                                self.screen = AppScreen::PlayerNameInput {
                                    current: 0,
                                    max: 0,
                                    online: false,
                                };
                            }
                            1 => {
                                self.name_input.clear();
                                self.player_names = [String::new(), String::new()];
                                self.screen = AppScreen::PlayerNameInput {
                                    current: 0,
                                    max: 1,
                                    online: false,
                                };
                            }
                            2 => {
                                self.name_input.clear();
                                self.player_names = [String::new(), String::new()];
                                self.screen = AppScreen::PlayerNameInput {
                                    current: 0,
                                    max: 0,
                                    online: true,
                                };
                            }
                            3 => {
                                self.settings_selected = 0;
                                self.screen = AppScreen::Settings;
                            }
                            4 => self.exit = true,
                            _ => {}
                        },
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_player_name_input_events(
        &mut self,
        current: usize,
        max: usize,
        online: bool,
    ) -> io::Result<()> {
        if event::poll(Duration::from_millis(10))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    match key_event.code {
                        KeyCode::Enter => {
                            let default_names = ["Player 1", "Player 2"];
                            let name = if self.name_input.trim().is_empty() {
                                default_names[current]
                            } else {
                                self.name_input.trim()
                            };
                            self.player_names[current] = name.to_string();
                            self.name_input.clear();
                            if current < max {
                                self.screen = AppScreen::PlayerNameInput {
                                    current: current + 1,
                                    max,
                                    online,
                                };
                            } else if online {
                                self.start_matchmaking();
                            } else if max == 0 {
                                self.start_local_game(GameMode::SinglePlayer);
                            } else {
                                self.start_local_game(GameMode::LocalMultiplayer);
                            }
                        }
                        KeyCode::Esc => self.screen = AppScreen::MainMenu,
                        KeyCode::Backspace => {
                            self.name_input.pop();
                        }
                        KeyCode::Char(c) => {
                            if self.name_input.len() < MAX_NAME_LEN && c.is_ascii_graphic() {
                                self.name_input.push(c);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_matchmaking_events(&mut self) -> io::Result<()> {
        if event::poll(Duration::from_millis(10))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    if let KeyCode::Esc = key_event.code {
                        if let Some(channel) = self.matchmaking.take() {
                            channel.cancel();
                        }
                        self.screen = AppScreen::MainMenu;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_settings_events(&mut self) -> io::Result<()> {
        if event::poll(Duration::from_millis(10))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    match key_event.code {
                        KeyCode::Up => {
                            if self.settings_selected > 0 {
                                self.settings_selected -= 1;
                            } else {
                                self.settings_selected = 2;
                            }
                        }
                        KeyCode::Down => {
                            if self.settings_selected < 2 {
                                self.settings_selected += 1;
                            } else {
                                self.settings_selected = 0;
                            }
                        }
                        KeyCode::Left => match self.settings_selected {
                            0 => self.difficulty = self.difficulty.previous(),
                            1 => self.set_theme(self.selected_theme.previous()),
                            _ => {}
                        },
                        KeyCode::Right => match self.settings_selected {
                            0 => self.difficulty = self.difficulty.next(),
                            1 => self.set_theme(self.selected_theme.next()),
                            _ => {}
                        },
                        KeyCode::Enter => {
                            if self.settings_selected == 2 {
                                self.screen = AppScreen::MainMenu;
                            }
                        }
                        KeyCode::Esc => self.screen = AppScreen::MainMenu,
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn set_theme(&mut self, theme: GameTheme) {
        self.selected_theme = theme;
        save_json(&*self.store, THEME_KEY, &theme);
    }

    // --- Drawing ---------------------------------------------------------

    fn show_terminal_resize_warning(&mut self, frame: &mut Frame) {
        let colors = self.selected_theme.colors();
        let area = frame.area();
        let popup_area = centered_rect_with_percentage(60, 20, area.width, area.height);
        let popup = Paragraph::new("Terminal too small!\nPlease resize.")
            .block(
                Block::default()
                    .title("Warning")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Thick),
            )
            .style(Style::default().fg(colors.ball))
            .alignment(Alignment::Center);
        frame.render_widget(popup, popup_area);
    }

    fn draw_menu(&mut self, frame: &mut Frame) {
        let vertical_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![
                Constraint::Length(12),
                Constraint::Length(13),
                Constraint::Max(5),
            ])
            .flex(Flex::Center)
            .split(frame.area());

        let big_text = BigText::builder()
            .pixel_size(PixelSize::Sextant)
            .style(Style::new().blue())
            .lines(vec![
                "".into(),
                "pong".cyan().into(),
                "ARENA".white().into(),
                "~~~~~".light_green().into(),
            ])
            .alignment(Alignment::Center)
            .build();
        frame.render_widget(big_text, vertical_layout[0]);

        let options_block_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Percentage(30)])
            .flex(Flex::Center)
            .split(vertical_layout[1]);
        frame.render_widget(
            Block::default()
                .style(Style::default().fg(Color::Cyan))
                .borders(Borders::ALL)
                .border_type(BorderType::Double),
            options_block_layout[0],
        );

        let options_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Percentage(90)])
            .flex(Flex::Center)
            .split(options_block_layout[0]);

        let inner_options_layout = options_layout[0].inner(Margin::new(1, 0));
        let rows_stored = inner_options_layout.height.clamp(5, 15) as usize;

        let option_constraints = vec![Constraint::Max(1); rows_stored];
        let option_areas = Layout::vertical(option_constraints)
            .flex(Flex::Center)
            .split(inner_options_layout);

        for (i, &option) in self.main_menu.options.iter().enumerate() {
            let mut option_widget = Paragraph::new(option)
                .style(Style::default().fg(Color::Green).bold())
                .alignment(Alignment::Center);

            if i == self.main_menu.selected {
                option_widget = option_widget.style(
                    Style::default()
                        .bg(Color::Reset)
                        .fg(Color::White)
                        .bold()
                        .italic(),
                );
            }

            frame.render_widget(option_widget, option_areas[(i + 1) * 2]);
        }
    }

    fn draw_player_name_input(&mut self, frame: &mut Frame, current: usize) {
        let area = frame.area();
        let popup_area = centered_rect_with_percentage(60, 20, area.width, area.height);
        let label = if current == 0 {
            "Enter your name (max 16 chars):"
        } else {
            "Enter Player 2 name (max 16 chars):"
        };
        let input = format!("{}\n> {}", label, self.name_input);
        let popup = Paragraph::new(input)
            .block(
                Block::default()
                    .title("Player Names")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Thick),
            )
            .style(Style::default().fg(Color::Green))
            .alignment(Alignment::Center);
        frame.render_widget(popup, popup_area);
    }

    fn draw_matchmaking(&mut self, frame: &mut Frame) {
        let colors = self.selected_theme.colors();
        let area = frame.area();
        let popup_area = centered_rect_with_percentage(60, 25, area.width, area.height);
        let popup = Paragraph::new(format!(
            "\n{}\n\n[Esc] Cancel",
            self.matchmaking_status
        ))
        .block(
            Block::default()
                .title("Online Match")
                .borders(Borders::ALL)
                .border_type(BorderType::Thick)
                .title_alignment(Alignment::Center),
        )
        .style(Style::default().fg(colors.accent))
        .alignment(Alignment::Center);
        frame.render_widget(popup, popup_area);
    }

    fn draw_settings(&mut self, frame: &mut Frame) {
        let colors = self.selected_theme.colors();
        let area = frame.area();
        let settings = [
            format!("Difficulty: {}", self.difficulty.label()),
            format!("Theme: {}", self.selected_theme.label()),
            "Back".to_string(),
        ];

        let [settings_area] = Layout::horizontal([Constraint::Percentage(50)])
            .flex(Flex::Center)
            .areas(area);
        let [settings_block_area, preview_area] =
            Layout::vertical([Constraint::Length(10), Constraint::Length(3)])
                .flex(Flex::Center)
                .areas(settings_area);
        let settings_block = Block::default()
            .title("Settings")
            .borders(Borders::ALL)
            .border_type(BorderType::Thick)
            .style(Style::default().fg(colors.accent));
        frame.render_widget(settings_block, settings_block_area);

        let line_height = 2;
        let total_height = settings.len() * line_height;
        let start_y = settings_block_area.y
            + (settings_block_area
                .height
                .saturating_sub(total_height as u16)
                / 2);
        for (i, text) in settings.iter().enumerate() {
            let styled = if i == self.settings_selected {
                Paragraph::new(format!("> {} <", text))
                    .style(Style::default().fg(Color::White).bold())
                    .alignment(Alignment::Center)
            } else {
                Paragraph::new(format!("  {}  ", text))
                    .style(Style::default().fg(colors.text))
                    .alignment(Alignment::Center)
            };
            let line_area = Rect {
                x: settings_block_area.x + 2,
                y: start_y + (i as u16) * line_height as u16,
                width: settings_block_area.width.saturating_sub(4),
                height: 1,
            };
            frame.render_widget(styled, line_area);
        }

        // Palette preview bar for the selected theme.
        let preview_colors = [
            ("Paddle", colors.paddle),
            ("Ball", colors.ball),
            ("Text", colors.text),
            ("Accent", colors.accent),
            ("Border", colors.border),
        ];
        let color_bar_width = preview_area.width.saturating_sub(4);
        let color_block_width = color_bar_width / preview_colors.len() as u16;
        for (i, (_, color)) in preview_colors.iter().enumerate() {
            let color_rect = Rect {
                x: preview_area.x + 2 + (i as u16) * color_block_width,
                y: preview_area.y + 1,
                width: color_block_width.max(1),
                height: 1,
            };
            frame.render_widget(
                Paragraph::new("").style(Style::default().bg(*color)),
                color_rect,
            );
        }
        let label_text = preview_colors
            .iter()
            .map(|(label, _)| format!("{:^width$}", label, width = color_block_width as usize))
            .collect::<Vec<_>>()
            .join("");
        let label_area = Rect {
            x: preview_area.x + 2,
            y: preview_area.y + 2,
            width: color_bar_width,
            height: 1,
        };
        frame.render_widget(
            Paragraph::new(label_text).style(Style::default().fg(colors.text)),
            label_area,
        );
    }
}

fn init_logging(path: &Path) {
    // The terminal belongs to ratatui; diagnostics go to a file.
    match std::fs::File::create(path) {
        Ok(file) => {
            let subscriber = tracing_subscriber::fmt()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_max_level(tracing::Level::DEBUG)
                .finish();
            if tracing::subscriber::set_global_default(subscriber).is_err() {
                eprintln!("logging already initialized");
            }
        }
        Err(err) => eprintln!("cannot open log file {}: {err}", path.display()),
    }
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_file);

    let terminal = ratatui::init();
    let mut app = App::new(cli);
    let app_result = app.run(terminal);
    ratatui::restore();

    match &app_result {
        Ok(()) => {
            println!("Thanks for playing pong-arena! 🏓");
            if let Some(game) = app.current_game.as_ref() {
                let (left, right) = game.scores();
                println!("Final Score: {left} - {right}");
            }
        }
        Err(err) => {
            warn!(%err, "app exited with error");
            eprintln!("Game ended with error: {err}");
        }
    }

    app_result
}
