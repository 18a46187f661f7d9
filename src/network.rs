//! Transport runner for the game channel.
//!
//! Mirrors the session handle shape the UI loop expects: a background
//! thread owns the socket (and a current-thread tokio runtime to drive it),
//! the game loop reads [`SessionEvent`]s from a plain mpsc receiver and
//! pushes [`SessionCommand`]s the other way. The protocol itself lives in
//! [`GameSession`]; this module only moves frames.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::messages::ServerMessage;
use crate::session::{
    CloseDisposition, GameSession, SessionConfig, SessionEvent, NORMAL_CLOSE_CODE,
};
use crate::storage::SessionStore;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Interval at which the session's timers (health check, retransmit slots)
/// are polled while the socket is up.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum NetError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("bad outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Serialize and send one outbound frame. Encoding failures are local bugs
/// and do not warrant tearing the socket down; transport failures do.
pub(crate) async fn send_frame(
    socket: &mut WsStream,
    message: &crate::messages::ClientMessage,
) -> Result<(), NetError> {
    let json = serde_json::to_string(message)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}

/// Commands the UI pushes into the game channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Move { direction: i8 },
    ForceStop { critical: bool },
    ReadyForCountdown,
    Disconnect,
}

#[derive(Debug, Clone)]
pub struct GameChannelConfig {
    /// Base `ws(s)://host[:port]` URL of the backend.
    pub server_url: String,
    pub game_id: String,
    pub player_id: String,
}

impl GameChannelConfig {
    fn game_url(&self) -> String {
        format!(
            "{}/ws/game/{}/",
            self.server_url.trim_end_matches('/'),
            self.game_id
        )
    }
}

/// Handle held by the UI loop. Dropping it tears the session down.
pub struct GameChannel {
    pub events: mpsc::Receiver<SessionEvent>,
    commands: UnboundedSender<SessionCommand>,
}

impl GameChannel {
    pub fn send(&self, command: SessionCommand) {
        let _ = self.commands.send(command);
    }

    pub fn disconnect(&self) {
        self.send(SessionCommand::Disconnect);
    }
}

/// Open the authoritative game channel for `game_id` and drive it until a
/// deliberate disconnect, a normal server close, or retry exhaustion.
pub fn open_game_channel(config: GameChannelConfig, store: Arc<dyn SessionStore>) -> GameChannel {
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>();
    let (command_tx, command_rx) = unbounded_channel::<SessionCommand>();

    let spawned = thread::Builder::new()
        .name("game-channel".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    warn!(%err, "cannot build game channel runtime");
                    return;
                }
            };
            runtime.block_on(run_session(config, store, command_rx, event_tx));
        });
    if let Err(err) = spawned {
        warn!(%err, "cannot spawn game channel thread");
    }

    GameChannel {
        events: event_rx,
        commands: command_tx,
    }
}

async fn run_session(
    config: GameChannelConfig,
    store: Arc<dyn SessionStore>,
    mut commands: UnboundedReceiver<SessionCommand>,
    events: mpsc::Sender<SessionEvent>,
) {
    let mut session = GameSession::new(
        SessionConfig {
            game_id: config.game_id.clone(),
            player_id: config.player_id.clone(),
        },
        store,
        Instant::now(),
    );
    let url = config.game_url();

    loop {
        session.begin_attempt(Instant::now());
        info!(
            %url,
            attempt = session.attempts(),
            connection_id = session.connection_id(),
            "dialing game channel"
        );

        let disposition = match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                session.on_open(Instant::now());
                drive(socket, &mut session, &mut commands, &events).await
            }
            Err(err) => {
                warn!(%err, "game channel dial failed");
                session.handle_close(None, Instant::now())
            }
        };

        // Surface whatever the close decision queued (reconnect progress,
        // the terminal failure) before sleeping or exiting.
        forward_events(&mut session, &events);

        match disposition {
            CloseDisposition::Deliberate | CloseDisposition::GiveUp => break,
            CloseDisposition::Retry { delay, attempt, max } => {
                debug!(attempt, max, "waiting before redial");
                tokio::time::sleep(delay).await;
            }
        }
    }
    debug!("game channel task exiting");
}

/// Drive one live socket until it closes, returning the session's verdict.
async fn drive(
    mut socket: WsStream,
    session: &mut GameSession,
    commands: &mut UnboundedReceiver<SessionCommand>,
    events: &mpsc::Sender<SessionEvent>,
) -> CloseDisposition {
    let mut poll_tick = tokio::time::interval(POLL_INTERVAL);
    poll_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = poll_tick.tick() => {
                session.poll(Instant::now());
            }
            command = commands.recv() => match command {
                Some(SessionCommand::Move { direction }) => session.push_move(direction),
                Some(SessionCommand::ForceStop { critical }) => {
                    session.push_force_stop(Instant::now(), critical, false);
                }
                Some(SessionCommand::ReadyForCountdown) => session.push_ready_for_countdown(),
                Some(SessionCommand::Disconnect) | None => {
                    session.disconnect();
                    let _ = socket
                        .close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        }))
                        .await;
                    return session.handle_close(Some(NORMAL_CLOSE_CODE), Instant::now());
                }
            },
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => session.handle_message(message, Instant::now()),
                        Err(err) => warn!(%err, "dropping malformed frame"),
                    }
                }
                Some(Ok(Message::Close(close_frame))) => {
                    let code = close_frame.map(|frame| u16::from(frame.code));
                    debug!(code, "server closed the game channel");
                    return session.handle_close(code, Instant::now());
                }
                Some(Ok(_)) => {} // transport-level ping/pong/binary: not ours
                Some(Err(err)) => {
                    warn!(%err, "game channel transport error");
                    return session.handle_close(None, Instant::now());
                }
                None => {
                    debug!("game channel stream ended");
                    return session.handle_close(None, Instant::now());
                }
            }
        }

        for message in session.drain_outbox() {
            if let Err(err) = send_frame(&mut socket, &message).await {
                warn!(%err, "send failed on game channel");
                if matches!(err, NetError::WebSocket(_)) {
                    return session.handle_close(None, Instant::now());
                }
            }
        }

        for event in session.drain_events() {
            let dead = matches!(event, SessionEvent::ConnectionDead);
            if events.send(event).is_err() {
                // UI is gone; tear down quietly.
                session.disconnect();
                let _ = socket.close(None).await;
                return session.handle_close(Some(NORMAL_CLOSE_CODE), Instant::now());
            }
            if dead {
                // Do not wait for the transport to notice on its own.
                let _ = socket.close(None).await;
                return session.handle_close(None, Instant::now());
            }
        }
    }
}

fn forward_events(session: &mut GameSession, events: &mpsc::Sender<SessionEvent>) {
    for event in session.drain_events() {
        if events.send(event).is_err() {
            session.disconnect();
            return;
        }
    }
}
