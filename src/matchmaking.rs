//! Pre-game matchmaking channel.
//!
//! A much simpler single-purpose session than the game channel: dial once,
//! announce `find_match`, relay status updates, and on a match persist the
//! handoff metadata and stop. The only recovery behavior is a single
//! immediate redial-and-resume when the connection drops mid-search.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use futures_util::StreamExt;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::messages::{ClientMessage, ServerMessage};
use crate::network::{send_frame, WsStream};
use crate::storage::{
    load_json, save_json, PendingMatch, SessionStore, PENDING_MATCH_KEY, SEARCHING_KEY,
};

#[derive(Debug, Clone, PartialEq)]
pub enum MatchmakingEvent {
    Waiting(Option<String>),
    Searching(Option<String>),
    /// Opponent found; metadata is already persisted for the game channel.
    Matched(PendingMatch),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchmakingCommand {
    Cancel,
}

#[derive(Debug, Clone)]
pub struct MatchmakingConfig {
    pub server_url: String,
    pub player_id: String,
    pub username: String,
}

impl MatchmakingConfig {
    fn url(&self) -> String {
        format!("{}/ws/matchmaking/", self.server_url.trim_end_matches('/'))
    }
}

pub struct MatchmakingChannel {
    pub events: mpsc::Receiver<MatchmakingEvent>,
    commands: UnboundedSender<MatchmakingCommand>,
}

impl MatchmakingChannel {
    pub fn cancel(&self) {
        let _ = self.commands.send(MatchmakingCommand::Cancel);
    }
}

/// Transport-free search state: what to announce, what to relay, whether a
/// drop is worth one more dial.
struct Search {
    store: Arc<dyn SessionStore>,
    player_id: String,
    username: String,
    searching: bool,
    resume_used: bool,
}

impl Search {
    fn new(store: Arc<dyn SessionStore>, player_id: String, username: String) -> Self {
        let resuming = load_json::<bool>(&*store, SEARCHING_KEY).unwrap_or(false);
        if resuming {
            info!("resuming an interrupted matchmaking search");
        }
        Self {
            store,
            player_id,
            username,
            searching: resuming,
            resume_used: false,
        }
    }

    /// The announcement to send on (re)open; flags the search as active so
    /// a reload can resume it.
    fn begin(&mut self) -> ClientMessage {
        self.searching = true;
        save_json(&*self.store, SEARCHING_KEY, &true);
        ClientMessage::FindMatch {
            player_id: self.player_id.clone(),
            username: self.username.clone(),
        }
    }

    /// Relay decision for one inbound frame. `Matched` persists the game
    /// metadata and ends the search.
    fn on_frame(&mut self, message: ServerMessage) -> Option<MatchmakingEvent> {
        match message {
            ServerMessage::Waiting { message } => Some(MatchmakingEvent::Waiting(message)),
            ServerMessage::Searching { message } => Some(MatchmakingEvent::Searching(message)),
            ServerMessage::Matched {
                game_id,
                side,
                opponent,
                opponent_id,
            } => {
                let pending = PendingMatch {
                    game_id,
                    side,
                    opponent,
                    opponent_id,
                };
                save_json(&*self.store, PENDING_MATCH_KEY, &pending);
                self.store.clear(SEARCHING_KEY);
                self.searching = false;
                info!(game_id = %pending.game_id, opponent = %pending.opponent, "matched");
                Some(MatchmakingEvent::Matched(pending))
            }
            ServerMessage::Error { message } => Some(MatchmakingEvent::Error(message)),
            other => {
                debug!(?other, "ignoring frame on matchmaking channel");
                None
            }
        }
    }

    fn cancel(&mut self) {
        self.searching = false;
        self.store.clear(SEARCHING_KEY);
    }

    /// At most one immediate redial after an unexpected drop mid-search.
    fn should_resume_after_close(&mut self) -> bool {
        if self.searching && !self.resume_used {
            self.resume_used = true;
            true
        } else {
            false
        }
    }
}

pub fn open_matchmaking(
    config: MatchmakingConfig,
    store: Arc<dyn SessionStore>,
) -> MatchmakingChannel {
    let (event_tx, event_rx) = mpsc::channel::<MatchmakingEvent>();
    let (command_tx, command_rx) = unbounded_channel::<MatchmakingCommand>();

    let spawned = thread::Builder::new()
        .name("matchmaking".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    warn!(%err, "cannot build matchmaking runtime");
                    return;
                }
            };
            runtime.block_on(run(config, store, command_rx, event_tx));
        });
    if let Err(err) = spawned {
        warn!(%err, "cannot spawn matchmaking thread");
    }

    MatchmakingChannel {
        events: event_rx,
        commands: command_tx,
    }
}

enum Outcome {
    /// Matched or cancelled; nothing left to do.
    Done,
    /// Unexpected drop.
    Lost,
}

async fn run(
    config: MatchmakingConfig,
    store: Arc<dyn SessionStore>,
    mut commands: UnboundedReceiver<MatchmakingCommand>,
    events: mpsc::Sender<MatchmakingEvent>,
) {
    let mut search = Search::new(store, config.player_id.clone(), config.username.clone());
    let url = config.url();

    loop {
        info!(%url, "dialing matchmaking channel");
        let socket = match connect_async(url.as_str()).await {
            Ok((socket, _response)) => socket,
            Err(err) => {
                warn!(%err, "matchmaking dial failed");
                if search.should_resume_after_close() {
                    continue;
                }
                let _ = events.send(MatchmakingEvent::Error(
                    "matchmaking is unavailable".into(),
                ));
                return;
            }
        };

        match drive(socket, &mut search, &mut commands, &events).await {
            Outcome::Done => return,
            Outcome::Lost => {
                if search.should_resume_after_close() {
                    info!("matchmaking dropped mid-search, resuming once");
                    continue;
                }
                let _ = events.send(MatchmakingEvent::Error(
                    "matchmaking connection lost".into(),
                ));
                return;
            }
        }
    }
}

async fn drive(
    mut socket: WsStream,
    search: &mut Search,
    commands: &mut UnboundedReceiver<MatchmakingCommand>,
    events: &mpsc::Sender<MatchmakingEvent>,
) -> Outcome {
    let announce = search.begin();
    if let Err(err) = send_frame(&mut socket, &announce).await {
        warn!(%err, "could not announce find_match");
        return Outcome::Lost;
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(MatchmakingCommand::Cancel) | None => {
                    search.cancel();
                    let _ = socket
                        .close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        }))
                        .await;
                    return Outcome::Done;
                }
            },
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => {
                            let matched = matches!(message, ServerMessage::Matched { .. });
                            if let Some(event) = search.on_frame(message) {
                                if events.send(event).is_err() {
                                    search.cancel();
                                    let _ = socket.close(None).await;
                                    return Outcome::Done;
                                }
                            }
                            if matched {
                                // One-time handoff; the caller opens the
                                // game channel from the persisted metadata.
                                let _ = socket
                                    .close(Some(CloseFrame {
                                        code: CloseCode::Normal,
                                        reason: "".into(),
                                    }))
                                    .await;
                                return Outcome::Done;
                            }
                        }
                        Err(err) => warn!(%err, "dropping malformed matchmaking frame"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("matchmaking channel closed by server");
                    return Outcome::Lost;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(%err, "matchmaking transport error");
                    return Outcome::Lost;
                }
            }
        }
    }
}
