//! The game-channel session state machine: fast reconnect, health checks,
//! retry accounting and command de-duplication.
//!
//! [`GameSession`] does no I/O. The transport runner in `network.rs` feeds
//! it socket lifecycle calls and inbound frames, then drains an outbox of
//! [`ClientMessage`]s and a queue of [`SessionEvent`]s. Keeping the protocol
//! out of the socket loop is what makes every timing rule below testable.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::random;
use tracing::{debug, info, warn};

use crate::helpers::now_ms;
use crate::messages::{ClientMessage, FinalScore, GameStateSnapshot, ServerMessage};
use crate::paddle::Side;
use crate::storage::{load_json, reconnection_key, save_json, ReconnectionRecord, SessionStore};

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);
pub const NORMAL_CLOSE_CODE: u16 = 1000;

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);
const STALE_WARN_AFTER: Duration = Duration::from_secs(15);
const DEAD_AFTER: Duration = Duration::from_secs(30);
const PING_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const FORCE_STOP_DEDUP_WINDOW: Duration = Duration::from_millis(50);
const CRITICAL_RETRANSMIT_DELAY: Duration = Duration::from_millis(25);
const LEGACY_STATE_REQUEST_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

/// What the runner should do after the transport closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Normal close or caller-initiated teardown; no retry.
    Deliberate,
    /// Unexpected close below the attempt cap: wait `delay`, then redial.
    Retry { attempt: u32, max: u32, delay: Duration },
    /// Attempt cap reached; the session is dead for good.
    GiveUp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Socket opened. `reconnecting` is already accurate here, before any
    /// server reply, so the UI can show resume progress immediately.
    Opened { reconnecting: bool },
    StateUpdate(GameStateSnapshot),
    SideAssigned(Side),
    GameInfo {
        player1: String,
        player2: String,
        player1_id: String,
        player2_id: String,
    },
    GameStart {
        player1: String,
        player2: String,
        player1_id: String,
        player2_id: String,
    },
    Reconnecting { attempt: u32, max: u32 },
    ReconnectFailed,
    /// No inbound traffic for too long; the runner must force-close the
    /// socket instead of waiting for the transport to notice.
    ConnectionDead,
    OpponentPresence {
        side: Side,
        username: String,
        connected: bool,
    },
    Latency { round_trip_ms: u64 },
    GameFinished {
        winner: String,
        final_score: FinalScore,
    },
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub game_id: String,
    pub player_id: String,
}

#[derive(Debug, Clone, Copy)]
struct PingProbe {
    client_timestamp: u64,
    sent_at: Instant,
}

pub struct GameSession {
    config: SessionConfig,
    store: Arc<dyn SessionStore>,

    state: SessionState,
    reconnecting: bool,
    reconnect_attempts: u32,
    connection_id: String,
    player_side: Option<Side>,
    record: Option<ReconnectionRecord>,

    last_message_time: Instant,
    last_health_check: Instant,
    stale_warned: bool,
    dead_fired: bool,
    outstanding_ping: Option<PingProbe>,

    last_force_stop: Option<Instant>,
    retransmit: Option<(ClientMessage, Instant)>,
    legacy_request_due: Option<Instant>,

    failed_fired: bool,
    deliberate: bool,

    outbox: VecDeque<ClientMessage>,
    events: VecDeque<SessionEvent>,
}

impl GameSession {
    /// Set up a session for one game id. A persisted [`ReconnectionRecord`]
    /// flips the session into resume mode before the socket even opens.
    pub fn new(config: SessionConfig, store: Arc<dyn SessionStore>, now: Instant) -> Self {
        let mut session = Self {
            config,
            store,
            state: SessionState::Disconnected,
            reconnecting: false,
            reconnect_attempts: 0,
            connection_id: String::new(),
            player_side: None,
            record: None,
            last_message_time: now,
            last_health_check: now,
            stale_warned: false,
            dead_fired: false,
            outstanding_ping: None,
            last_force_stop: None,
            retransmit: None,
            legacy_request_due: None,
            failed_fired: false,
            deliberate: false,
            outbox: VecDeque::new(),
            events: VecDeque::new(),
        };

        let key = reconnection_key(&session.config.game_id);
        if let Some(record) = load_json::<ReconnectionRecord>(&*session.store, &key) {
            info!(
                game_id = %session.config.game_id,
                side = %record.player_side,
                "found reconnection record, resuming session"
            );
            session.reconnecting = true;
            session.player_side = Some(record.player_side);
            session.record = Some(record);
        }
        session.derive_connection_id();
        session
    }

    pub fn reconnecting(&self) -> bool {
        self.reconnecting
    }

    pub fn attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn player_side(&self) -> Option<Side> {
        self.player_side
    }

    /// Start one dial attempt. Each attempt gets a fresh connection
    /// identifier so late frames from an abandoned attempt cannot be
    /// mistaken for the current one.
    pub fn begin_attempt(&mut self, now: Instant) {
        self.state = SessionState::Connecting;
        self.derive_connection_id();
        self.last_message_time = now;
        self.last_health_check = now;
        self.stale_warned = false;
        self.dead_fired = false;
        self.outstanding_ping = None;
        self.retransmit = None;
        self.legacy_request_due = None;
    }

    pub fn on_open(&mut self, now: Instant) {
        self.state = SessionState::Open;
        self.last_message_time = now;
        self.last_health_check = now;
        self.events.push_back(SessionEvent::Opened {
            reconnecting: self.reconnecting,
        });

        if self.reconnecting {
            let side = self.player_side.unwrap_or(Side::Left);
            self.outbox.push_back(ClientMessage::FastReconnect {
                player_id: self.config.player_id.clone(),
                game_id: self.config.game_id.clone(),
                side,
                connection_id: self.connection_id.clone(),
                timestamp: now_ms(),
                critical: true,
            });
            // Fallback in case the fast path is not honored.
            self.legacy_request_due = Some(now + LEGACY_STATE_REQUEST_DELAY);
            debug!(connection_id = %self.connection_id, "sent fast_reconnect");
        }
    }

    pub fn handle_message(&mut self, message: ServerMessage, now: Instant) {
        self.last_message_time = now;
        self.stale_warned = false;

        match message {
            ServerMessage::FastState { player_side, .. } => {
                self.complete_reconnect(Some(player_side), now);
            }
            ServerMessage::GameState {
                state,
                is_reconnection,
            } => {
                if is_reconnection || self.reconnecting {
                    self.complete_reconnect(None, now);
                }
                self.events.push_back(SessionEvent::StateUpdate(state));
            }
            ServerMessage::GameInfo {
                player1_id,
                player2_id,
                player1,
                player2,
            } => {
                self.persist_record(player1.clone(), player2.clone(), player1_id.clone(), player2_id.clone());
                self.events.push_back(SessionEvent::GameInfo {
                    player1,
                    player2,
                    player1_id,
                    player2_id,
                });
            }
            ServerMessage::GameStart {
                player1,
                player2,
                player1_id,
                player2_id,
            } => {
                self.persist_record(player1.clone(), player2.clone(), player1_id.clone(), player2_id.clone());
                self.events.push_back(SessionEvent::GameStart {
                    player1,
                    player2,
                    player1_id,
                    player2_id,
                });
            }
            ServerMessage::Pong {
                client_timestamp, ..
            } => {
                match self.outstanding_ping {
                    Some(probe) if probe.client_timestamp == client_timestamp => {
                        let round_trip_ms =
                            now.duration_since(probe.sent_at).as_millis() as u64;
                        debug!(round_trip_ms, "pong received");
                        self.events
                            .push_back(SessionEvent::Latency { round_trip_ms });
                        self.outstanding_ping = None;
                    }
                    _ => debug!(client_timestamp, "pong without a matching probe, ignoring"),
                }
            }
            ServerMessage::PlayerDisconnected { side, username, .. } => {
                self.events.push_back(SessionEvent::OpponentPresence {
                    side,
                    username,
                    connected: false,
                });
            }
            ServerMessage::PlayerReconnected { side, username, .. } => {
                self.events.push_back(SessionEvent::OpponentPresence {
                    side,
                    username,
                    connected: true,
                });
            }
            ServerMessage::GameFinished {
                winner,
                final_score,
            } => {
                self.events.push_back(SessionEvent::GameFinished {
                    winner,
                    final_score,
                });
            }
            ServerMessage::Waiting { .. }
            | ServerMessage::Searching { .. }
            | ServerMessage::Matched { .. } => {
                warn!("matchmaking frame on the game channel, dropping");
            }
            ServerMessage::Error { message } => {
                warn!(%message, "server error on game channel");
            }
        }
    }

    /// Periodic duties: the delayed legacy state request, the critical
    /// retransmit slot, and the health check (staleness tiers + ping probe).
    pub fn poll(&mut self, now: Instant) {
        if self.state != SessionState::Open {
            return;
        }

        if let Some(due) = self.legacy_request_due {
            if now >= due {
                self.legacy_request_due = None;
                if self.reconnecting {
                    debug!("fast path unanswered, sending legacy state request");
                    self.outbox.push_back(ClientMessage::RequestGameState {
                        player_id: self.config.player_id.clone(),
                        game_id: self.config.game_id.clone(),
                        connection_id: self.connection_id.clone(),
                    });
                }
            }
        }

        if let Some((message, due)) = &self.retransmit {
            if now >= *due {
                self.outbox.push_back(message.clone());
                self.retransmit = None;
            }
        }

        if now.duration_since(self.last_health_check) < HEALTH_CHECK_INTERVAL {
            return;
        }
        self.last_health_check = now;

        let silent_for = now.duration_since(self.last_message_time);
        if silent_for >= DEAD_AFTER {
            if !self.dead_fired {
                warn!(
                    silent_secs = silent_for.as_secs(),
                    "no traffic on game channel, treating connection as dead"
                );
                self.dead_fired = true;
                self.events.push_back(SessionEvent::ConnectionDead);
            }
            return;
        }
        if silent_for >= STALE_WARN_AFTER && !self.stale_warned {
            warn!(
                silent_secs = silent_for.as_secs(),
                "game channel is stale"
            );
            self.stale_warned = true;
        }

        // Single outstanding probe; it self-clears on the matching pong or
        // after a hard timeout, whichever first.
        if let Some(probe) = self.outstanding_ping {
            if now.duration_since(probe.sent_at) >= PING_PROBE_TIMEOUT {
                debug!("ping probe expired unanswered");
                self.outstanding_ping = None;
            }
        }
        if self.outstanding_ping.is_none() {
            let client_timestamp = now_ms();
            self.outstanding_ping = Some(PingProbe {
                client_timestamp,
                sent_at: now,
            });
            self.outbox.push_back(ClientMessage::Ping {
                timestamp: client_timestamp,
            });
        }
    }

    /// Plain movement command for the local paddle.
    pub fn push_move(&mut self, direction: i8) {
        self.outbox.push_back(ClientMessage::MovePaddle {
            direction,
            side: self.player_side.unwrap_or(Side::Left),
            player_id: self.config.player_id.clone(),
            force_stop: None,
            critical: None,
            message_id: None,
        });
    }

    /// Idempotent zero-direction stop. Duplicates inside the 50 ms window
    /// are dropped; a critical stop outside the reconnect handshake is
    /// re-sent once 25 ms later under a derived message id.
    pub fn push_force_stop(&mut self, now: Instant, critical: bool, from_handshake: bool) {
        if let Some(previous) = self.last_force_stop {
            if now.duration_since(previous) < FORCE_STOP_DEDUP_WINDOW {
                debug!("dropping duplicate force stop");
                return;
            }
        }
        self.last_force_stop = Some(now);

        let message_id = format!("stop-{}-{:06x}", now_ms(), random::<u32>() & 0xff_ffff);
        let side = self.player_side.unwrap_or(Side::Left);
        self.outbox.push_back(ClientMessage::MovePaddle {
            direction: 0,
            side,
            player_id: self.config.player_id.clone(),
            force_stop: Some(true),
            critical: Some(critical),
            message_id: Some(message_id.clone()),
        });

        if critical && !from_handshake {
            let repeat = ClientMessage::MovePaddle {
                direction: 0,
                side,
                player_id: self.config.player_id.clone(),
                force_stop: Some(true),
                critical: Some(critical),
                message_id: Some(format!("{message_id}-r1")),
            };
            self.retransmit = Some((repeat, now + CRITICAL_RETRANSMIT_DELAY));
        }
    }

    pub fn push_ready_for_countdown(&mut self) {
        self.outbox.push_back(ClientMessage::ReadyForCountdown);
    }

    /// Deliberate teardown. The runner closes the socket with the normal
    /// code; no further attempts will be scheduled.
    pub fn disconnect(&mut self) {
        self.deliberate = true;
    }

    /// The transport closed (or failed to open; `close_code` is `None`
    /// then). Decides between retrying and giving up.
    pub fn handle_close(&mut self, close_code: Option<u16>, _now: Instant) -> CloseDisposition {
        self.outstanding_ping = None;
        self.retransmit = None;
        self.legacy_request_due = None;

        if self.deliberate || close_code == Some(NORMAL_CLOSE_CODE) {
            self.state = SessionState::Closed;
            info!(game_id = %self.config.game_id, "game channel closed");
            return CloseDisposition::Deliberate;
        }

        self.reconnect_attempts += 1;
        self.reconnecting = true;
        if self.reconnect_attempts < MAX_RECONNECT_ATTEMPTS {
            self.state = SessionState::Reconnecting;
            warn!(
                attempt = self.reconnect_attempts,
                max = MAX_RECONNECT_ATTEMPTS,
                close_code,
                "game channel lost, scheduling reconnect"
            );
            self.events.push_back(SessionEvent::Reconnecting {
                attempt: self.reconnect_attempts,
                max: MAX_RECONNECT_ATTEMPTS,
            });
            CloseDisposition::Retry {
                attempt: self.reconnect_attempts,
                max: MAX_RECONNECT_ATTEMPTS,
                delay: RECONNECT_DELAY,
            }
        } else {
            self.state = SessionState::Closed;
            if !self.failed_fired {
                self.failed_fired = true;
                warn!(
                    attempts = self.reconnect_attempts,
                    "reconnect attempts exhausted, giving up"
                );
                self.events.push_back(SessionEvent::ReconnectFailed);
            }
            CloseDisposition::GiveUp
        }
    }

    pub fn drain_outbox(&mut self) -> Vec<ClientMessage> {
        self.outbox.drain(..).collect()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    // --- internals -------------------------------------------------------

    fn derive_connection_id(&mut self) {
        self.connection_id = format!(
            "{}-{}-{}-{:08x}",
            self.config.player_id,
            now_ms(),
            self.reconnect_attempts,
            random::<u32>()
        );
    }

    /// Shared tail of the fast and legacy resume paths: reset the attempt
    /// counter, adopt the authoritative side, send one stop command to
    /// cancel residual movement, persist the refreshed record.
    fn complete_reconnect(&mut self, server_side: Option<Side>, now: Instant) {
        self.reconnect_attempts = 0;
        if let Some(side) = server_side {
            if self.player_side != Some(side) {
                self.events.push_back(SessionEvent::SideAssigned(side));
            }
            self.player_side = Some(side);
        }
        let was_reconnecting = self.reconnecting;
        self.reconnecting = false;
        self.push_force_stop(now, true, true);

        if let Some(record) = &mut self.record {
            if let Some(side) = self.player_side {
                record.player_side = side;
            }
            record.last_reconnection_ms = now_ms();
            save_json(
                &*self.store,
                &reconnection_key(&self.config.game_id),
                record,
            );
        }
        if was_reconnecting {
            info!(game_id = %self.config.game_id, "reconnect confirmed by server");
        }
    }

    fn persist_record(
        &mut self,
        player1: String,
        player2: String,
        player1_id: String,
        player2_id: String,
    ) {
        let side = if player1_id == self.config.player_id {
            Side::Left
        } else if player2_id == self.config.player_id {
            Side::Right
        } else {
            self.player_side.unwrap_or(Side::Left)
        };
        if self.player_side != Some(side) {
            self.player_side = Some(side);
            self.events.push_back(SessionEvent::SideAssigned(side));
        }

        let record = ReconnectionRecord {
            player_side: side,
            player1,
            player2,
            player1_id,
            player2_id,
            last_reconnection_ms: now_ms(),
        };
        save_json(
            &*self.store,
            &reconnection_key(&self.config.game_id),
            &record,
        );
        self.record = Some(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ball::BallState;
    use crate::messages::{GameStatus, PaddlePair};
    use crate::paddle::PaddleState;
    use crate::storage::MemoryStore;

    fn config() -> SessionConfig {
        SessionConfig {
            game_id: "42".into(),
            player_id: "p1".into(),
        }
    }

    fn store_with_record(side: Side) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::default());
        let record = ReconnectionRecord {
            player_side: side,
            player1: "ada".into(),
            player2: "grace".into(),
            player1_id: "p1".into(),
            player2_id: "p2".into(),
            last_reconnection_ms: 1,
        };
        save_json(&*store, &reconnection_key("42"), &record);
        store
    }

    fn snapshot() -> GameStateSnapshot {
        GameStateSnapshot {
            status: GameStatus::Playing,
            countdown: None,
            play_sound: false,
            paddles: PaddlePair {
                left: PaddleState {
                    x: 20.0,
                    y: 250.0,
                    width: 10.0,
                    height: 100.0,
                    score: 0,
                },
                right: PaddleState {
                    x: 970.0,
                    y: 250.0,
                    width: 10.0,
                    height: 100.0,
                    score: 0,
                },
            },
            ball: BallState {
                x: 500.0,
                y: 300.0,
                radius: 8.0,
            },
        }
    }

    fn force_stops(outbox: &[ClientMessage]) -> Vec<&ClientMessage> {
        outbox
            .iter()
            .filter(|msg| {
                matches!(
                    msg,
                    ClientMessage::MovePaddle {
                        force_stop: Some(true),
                        ..
                    }
                )
            })
            .collect()
    }

    #[test]
    fn persisted_record_resumes_before_any_server_reply() {
        let now = Instant::now();
        let store = store_with_record(Side::Left);
        let mut session = GameSession::new(config(), store, now);

        assert!(session.reconnecting());
        assert_eq!(session.player_side(), Some(Side::Left));

        session.begin_attempt(now);
        session.on_open(now);
        let events = session.drain_events();
        assert_eq!(events[0], SessionEvent::Opened { reconnecting: true });

        let outbox = session.drain_outbox();
        match &outbox[0] {
            ClientMessage::FastReconnect {
                game_id,
                side,
                connection_id,
                critical,
                ..
            } => {
                assert_eq!(game_id, "42");
                assert_eq!(*side, Side::Left);
                assert_eq!(connection_id, session.connection_id());
                assert!(*critical);
            }
            other => panic!("expected fast_reconnect, got {other:?}"),
        }
    }

    #[test]
    fn fresh_session_opens_without_a_handshake() {
        let now = Instant::now();
        let mut session = GameSession::new(config(), Arc::new(MemoryStore::default()), now);
        session.begin_attempt(now);
        session.on_open(now);

        assert_eq!(
            session.drain_events(),
            vec![SessionEvent::Opened {
                reconnecting: false
            }]
        );
        assert!(session.drain_outbox().is_empty());
    }

    #[test]
    fn fast_state_confirms_resets_and_persists() {
        let now = Instant::now();
        let store = store_with_record(Side::Left);
        let mut session = GameSession::new(config(), store.clone(), now);
        session.begin_attempt(now);
        session.on_open(now);
        session.drain_outbox();

        // A couple of failed attempts beforehand.
        session.reconnect_attempts = 3;

        session.handle_message(
            ServerMessage::FastState {
                player_side: Side::Right,
                timestamp: 0,
            },
            now + Duration::from_millis(40),
        );

        assert_eq!(session.attempts(), 0);
        assert!(!session.reconnecting());
        assert_eq!(session.player_side(), Some(Side::Right));

        let outbox = session.drain_outbox();
        assert_eq!(force_stops(&outbox).len(), 1);

        let events = session.drain_events();
        assert!(events.contains(&SessionEvent::SideAssigned(Side::Right)));

        // Record now carries the authoritative side.
        let record: ReconnectionRecord =
            load_json(&*store, &reconnection_key("42")).unwrap();
        assert_eq!(record.player_side, Side::Right);
    }

    #[test]
    fn reconnection_flagged_game_state_takes_the_legacy_path() {
        let now = Instant::now();
        let store = store_with_record(Side::Left);
        let mut session = GameSession::new(config(), store, now);
        session.begin_attempt(now);
        session.on_open(now);
        session.drain_outbox();

        session.handle_message(
            ServerMessage::GameState {
                state: snapshot(),
                is_reconnection: true,
            },
            now + Duration::from_millis(100),
        );

        assert!(!session.reconnecting());
        let outbox = session.drain_outbox();
        assert_eq!(force_stops(&outbox).len(), 1);
        let events = session.drain_events();
        assert!(matches!(events.last(), Some(SessionEvent::StateUpdate(_))));
    }

    #[test]
    fn legacy_fallback_fires_only_while_still_unconfirmed() {
        let now = Instant::now();
        let store = store_with_record(Side::Left);
        let mut session = GameSession::new(config(), store, now);
        session.begin_attempt(now);
        session.on_open(now);
        session.drain_outbox();

        // Unconfirmed: fallback goes out after the fixed delay.
        session.poll(now + Duration::from_millis(350));
        let outbox = session.drain_outbox();
        assert!(outbox
            .iter()
            .any(|msg| matches!(msg, ClientMessage::RequestGameState { .. })));

        // Confirmed before the delay: no fallback.
        let mut session = GameSession::new(config(), store_with_record(Side::Left), now);
        session.begin_attempt(now);
        session.on_open(now);
        session.handle_message(
            ServerMessage::FastState {
                player_side: Side::Left,
                timestamp: 0,
            },
            now + Duration::from_millis(50),
        );
        session.drain_outbox();
        session.poll(now + Duration::from_millis(350));
        assert!(!session
            .drain_outbox()
            .iter()
            .any(|msg| matches!(msg, ClientMessage::RequestGameState { .. })));
    }

    #[test]
    fn duplicate_force_stop_inside_the_window_sends_one_frame() {
        let now = Instant::now();
        let mut session = GameSession::new(config(), Arc::new(MemoryStore::default()), now);
        session.begin_attempt(now);
        session.on_open(now);
        session.drain_outbox();

        session.push_force_stop(now, false, false);
        session.push_force_stop(now + Duration::from_millis(30), false, false);
        assert_eq!(force_stops(&session.drain_outbox()).len(), 1);

        // Outside the window it goes through again.
        session.push_force_stop(now + Duration::from_millis(90), false, false);
        assert_eq!(force_stops(&session.drain_outbox()).len(), 1);
    }

    #[test]
    fn critical_stop_retransmits_once_with_a_derived_id() {
        let now = Instant::now();
        let mut session = GameSession::new(config(), Arc::new(MemoryStore::default()), now);
        session.begin_attempt(now);
        session.on_open(now);
        session.drain_outbox();

        session.push_force_stop(now, true, false);
        let first = session.drain_outbox();
        let ClientMessage::MovePaddle {
            message_id: Some(original_id),
            ..
        } = &first[0]
        else {
            panic!("expected a stop command");
        };

        // Not due yet.
        session.poll(now + Duration::from_millis(10));
        assert!(session.drain_outbox().is_empty());

        session.poll(now + Duration::from_millis(26));
        let repeat = session.drain_outbox();
        let ClientMessage::MovePaddle {
            message_id: Some(repeat_id),
            force_stop: Some(true),
            ..
        } = &repeat[0]
        else {
            panic!("expected the retransmitted stop");
        };
        assert_eq!(*repeat_id, format!("{original_id}-r1"));

        // One repeat only.
        session.poll(now + Duration::from_millis(60));
        assert!(force_stops(&session.drain_outbox()).is_empty());
    }

    #[test]
    fn handshake_stop_is_not_retransmitted() {
        let now = Instant::now();
        let store = store_with_record(Side::Left);
        let mut session = GameSession::new(config(), store, now);
        session.begin_attempt(now);
        session.on_open(now);
        session.handle_message(
            ServerMessage::FastState {
                player_side: Side::Left,
                timestamp: 0,
            },
            now,
        );
        session.drain_outbox();

        session.poll(now + Duration::from_millis(30));
        assert!(force_stops(&session.drain_outbox()).is_empty());
    }

    #[test]
    fn attempt_cap_gives_up_exactly_once() {
        let now = Instant::now();
        let mut session = GameSession::new(config(), Arc::new(MemoryStore::default()), now);

        let mut dispositions = Vec::new();
        for _ in 0..MAX_RECONNECT_ATTEMPTS {
            session.begin_attempt(now);
            dispositions.push(session.handle_close(Some(1006), now));
        }

        let retries = dispositions
            .iter()
            .filter(|d| matches!(d, CloseDisposition::Retry { .. }))
            .count();
        assert_eq!(retries, (MAX_RECONNECT_ATTEMPTS - 1) as usize);
        assert_eq!(dispositions.last(), Some(&CloseDisposition::GiveUp));

        let failures = session
            .drain_events()
            .into_iter()
            .filter(|event| *event == SessionEvent::ReconnectFailed)
            .count();
        assert_eq!(failures, 1);

        // A straggler close cannot re-fire the failure.
        assert_eq!(
            session.handle_close(Some(1006), now),
            CloseDisposition::GiveUp
        );
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn consecutive_attempts_never_reuse_a_connection_id() {
        let now = Instant::now();
        let mut session = GameSession::new(config(), Arc::new(MemoryStore::default()), now);
        session.begin_attempt(now);
        let first = session.connection_id().to_owned();
        session.handle_close(Some(1006), now);
        session.begin_attempt(now);
        let second = session.connection_id().to_owned();
        assert_ne!(first, second);
    }

    #[test]
    fn successful_reconnect_resets_the_attempt_counter() {
        let now = Instant::now();
        let store = store_with_record(Side::Left);
        let mut session = GameSession::new(config(), store, now);

        session.begin_attempt(now);
        assert!(matches!(
            session.handle_close(Some(1006), now),
            CloseDisposition::Retry { attempt: 1, .. }
        ));
        session.begin_attempt(now);
        session.on_open(now);
        session.handle_message(
            ServerMessage::FastState {
                player_side: Side::Left,
                timestamp: 0,
            },
            now,
        );
        assert_eq!(session.attempts(), 0);

        // The next outage starts counting from scratch.
        assert!(matches!(
            session.handle_close(Some(1006), now),
            CloseDisposition::Retry { attempt: 1, .. }
        ));
    }

    #[test]
    fn normal_close_never_retries() {
        let now = Instant::now();
        let mut session = GameSession::new(config(), Arc::new(MemoryStore::default()), now);
        session.begin_attempt(now);
        session.on_open(now);
        assert_eq!(
            session.handle_close(Some(NORMAL_CLOSE_CODE), now),
            CloseDisposition::Deliberate
        );
        assert!(session
            .drain_events()
            .iter()
            .all(|event| !matches!(event, SessionEvent::Reconnecting { .. })));
    }

    #[test]
    fn deliberate_disconnect_wins_over_abnormal_codes() {
        let now = Instant::now();
        let mut session = GameSession::new(config(), Arc::new(MemoryStore::default()), now);
        session.begin_attempt(now);
        session.on_open(now);
        session.disconnect();
        assert_eq!(
            session.handle_close(None, now),
            CloseDisposition::Deliberate
        );
    }

    #[test]
    fn health_check_pings_then_escalates_to_dead() {
        let now = Instant::now();
        let mut session = GameSession::new(config(), Arc::new(MemoryStore::default()), now);
        session.begin_attempt(now);
        session.on_open(now);
        session.drain_outbox();

        // First cadence tick: quiet channel, ping goes out.
        session.poll(now + Duration::from_secs(6));
        let outbox = session.drain_outbox();
        assert!(outbox
            .iter()
            .any(|msg| matches!(msg, ClientMessage::Ping { .. })));
        assert!(!session.stale_warned);

        // Past the warning tier.
        session.poll(now + Duration::from_secs(17));
        assert!(session.stale_warned);
        assert!(session
            .drain_events()
            .iter()
            .all(|event| !matches!(event, SessionEvent::ConnectionDead)));

        // Past the dead tier: one ConnectionDead, no more pings.
        session.poll(now + Duration::from_secs(31));
        let events = session.drain_events();
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, SessionEvent::ConnectionDead))
                .count(),
            1
        );
        session.poll(now + Duration::from_secs(37));
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn inbound_traffic_keeps_the_channel_healthy() {
        let now = Instant::now();
        let mut session = GameSession::new(config(), Arc::new(MemoryStore::default()), now);
        session.begin_attempt(now);
        session.on_open(now);
        session.drain_outbox();

        session.handle_message(
            ServerMessage::GameState {
                state: snapshot(),
                is_reconnection: false,
            },
            now + Duration::from_secs(28),
        );
        session.poll(now + Duration::from_secs(31));
        assert!(session
            .drain_events()
            .iter()
            .all(|event| !matches!(event, SessionEvent::ConnectionDead)));
    }

    #[test]
    fn matching_pong_measures_latency_and_clears_the_probe() {
        let now = Instant::now();
        let mut session = GameSession::new(config(), Arc::new(MemoryStore::default()), now);
        session.begin_attempt(now);
        session.on_open(now);

        session.poll(now + Duration::from_secs(6));
        let outbox = session.drain_outbox();
        let ClientMessage::Ping { timestamp } = outbox
            .iter()
            .find(|msg| matches!(msg, ClientMessage::Ping { .. }))
            .unwrap()
        else {
            unreachable!()
        };

        // A foreign pong is ignored.
        session.handle_message(
            ServerMessage::Pong {
                client_timestamp: timestamp.wrapping_add(1),
                server_timestamp: 0,
            },
            now + Duration::from_secs(6),
        );
        assert!(session.outstanding_ping.is_some());

        session.handle_message(
            ServerMessage::Pong {
                client_timestamp: *timestamp,
                server_timestamp: 0,
            },
            now + Duration::from_millis(6120),
        );
        assert!(session.outstanding_ping.is_none());
        let events = session.drain_events();
        assert!(events
            .iter()
            .any(|event| matches!(event, SessionEvent::Latency { round_trip_ms } if *round_trip_ms >= 100)));
    }

    #[test]
    fn unanswered_probe_self_expires_and_is_replaced() {
        let now = Instant::now();
        let mut session = GameSession::new(config(), Arc::new(MemoryStore::default()), now);
        session.begin_attempt(now);
        session.on_open(now);

        session.poll(now + Duration::from_secs(6));
        session.drain_outbox();
        let first = session.outstanding_ping.unwrap().client_timestamp;

        // Probe younger than its timeout: no replacement ping.
        session.poll(now + Duration::from_secs(12));
        assert!(session.drain_outbox().is_empty());
        assert_eq!(session.outstanding_ping.unwrap().client_timestamp, first);

        // Past the probe timeout a new ping goes out.
        session.poll(now + Duration::from_secs(17));
        assert!(session
            .drain_outbox()
            .iter()
            .any(|msg| matches!(msg, ClientMessage::Ping { .. })));
    }

    #[test]
    fn game_info_assigns_the_side_and_writes_the_record() {
        let now = Instant::now();
        let store = Arc::new(MemoryStore::default());
        let mut session = GameSession::new(config(), store.clone(), now);
        session.begin_attempt(now);
        session.on_open(now);

        session.handle_message(
            ServerMessage::GameInfo {
                player1_id: "p1".into(),
                player2_id: "p2".into(),
                player1: "ada".into(),
                player2: "grace".into(),
            },
            now,
        );

        assert_eq!(session.player_side(), Some(Side::Left));
        let record: ReconnectionRecord =
            load_json(&*store, &reconnection_key("42")).unwrap();
        assert_eq!(record.player_side, Side::Left);
        assert_eq!(record.player2, "grace");

        let events = session.drain_events();
        assert!(events.contains(&SessionEvent::SideAssigned(Side::Left)));
    }

    #[test]
    fn presence_frames_are_informational_only() {
        let now = Instant::now();
        let mut session = GameSession::new(config(), Arc::new(MemoryStore::default()), now);
        session.begin_attempt(now);
        session.on_open(now);
        session.drain_events();

        session.handle_message(
            ServerMessage::PlayerDisconnected {
                side: Side::Right,
                username: "grace".into(),
                player_id: "p2".into(),
            },
            now,
        );
        assert_eq!(
            session.drain_events(),
            vec![SessionEvent::OpponentPresence {
                side: Side::Right,
                username: "grace".into(),
                connected: false,
            }]
        );
        // The local reconnection machinery is untouched.
        assert_eq!(session.attempts(), 0);
        assert!(!session.reconnecting());
    }
}
