//! Wire catalog for the game and matchmaking channels.
//!
//! Every frame is a JSON object with a `type` discriminator. The two enums
//! below are the exhaustive dispatch tables for outbound and inbound
//! traffic; an unknown or malformed frame fails deserialization and is
//! logged and dropped by the transport layer, never propagated.

use serde::{Deserialize, Serialize};

use crate::ball::BallState;
use crate::paddle::{PaddleState, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Playing,
    Finished,
}

/// Countdown overlay value: a number of seconds or the final `"GO!"` label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Countdown {
    Seconds(u32),
    Label(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddlePair {
    pub left: PaddleState,
    pub right: PaddleState,
}

/// Authoritative snapshot of a running game, produced by the local
/// simulation or received verbatim from the server in remote mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub status: GameStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown: Option<Countdown>,
    #[serde(default)]
    pub play_sound: bool,
    pub paddles: PaddlePair,
    pub ball: BallState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub player1: u32,
    pub player2: u32,
}

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Low-latency resume request, sent immediately on reopening a channel
    /// for a game this client already has a reconnection record for.
    FastReconnect {
        player_id: String,
        game_id: String,
        side: Side,
        #[serde(rename = "connectionId")]
        connection_id: String,
        timestamp: u64,
        critical: bool,
    },
    /// Legacy resume fallback, sent shortly after `fast_reconnect` in case
    /// the fast path is not honored.
    RequestGameState {
        player_id: String,
        game_id: String,
        #[serde(rename = "connectionId")]
        connection_id: String,
    },
    MovePaddle {
        direction: i8,
        side: Side,
        player_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        force_stop: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        critical: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    Ping {
        timestamp: u64,
    },
    ReadyForCountdown,
    FindMatch {
        player_id: String,
        username: String,
    },
}

/// Server → client frames, across both channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms a `fast_reconnect`; carries the authoritative side.
    FastState {
        player_side: Side,
        #[serde(default)]
        timestamp: u64,
    },
    GameState {
        state: GameStateSnapshot,
        #[serde(default)]
        is_reconnection: bool,
    },
    /// Side assignment before match start.
    GameInfo {
        player1_id: String,
        player2_id: String,
        player1: String,
        player2: String,
    },
    GameStart {
        player1: String,
        player2: String,
        player1_id: String,
        player2_id: String,
    },
    Pong {
        client_timestamp: u64,
        #[serde(default)]
        server_timestamp: u64,
    },
    PlayerDisconnected {
        side: Side,
        username: String,
        player_id: String,
    },
    PlayerReconnected {
        side: Side,
        username: String,
        player_id: String,
    },
    GameFinished {
        winner: String,
        final_score: FinalScore,
    },
    // Matchmaking channel statuses.
    Waiting {
        #[serde(default)]
        message: Option<String>,
    },
    Searching {
        #[serde(default)]
        message: Option<String>,
    },
    Matched {
        game_id: String,
        side: Side,
        opponent: String,
        #[serde(default)]
        opponent_id: String,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_reconnect_uses_the_camel_case_connection_field() {
        let msg = ClientMessage::FastReconnect {
            player_id: "p1".into(),
            game_id: "42".into(),
            side: Side::Left,
            connection_id: "c-1".into(),
            timestamp: 1000,
            critical: true,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "fast_reconnect");
        assert_eq!(json["connectionId"], "c-1");
        assert_eq!(json["side"], "left");
        assert_eq!(json["critical"], true);
    }

    #[test]
    fn move_paddle_omits_absent_optional_fields() {
        let msg = ClientMessage::MovePaddle {
            direction: -1,
            side: Side::Right,
            player_id: "p2".into(),
            force_stop: None,
            critical: None,
            message_id: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "move_paddle");
        assert!(json.get("force_stop").is_none());
        assert!(json.get("message_id").is_none());
    }

    #[test]
    fn countdown_accepts_numbers_and_the_go_label() {
        let frame: ServerMessage = serde_json::from_str(
            r#"{"type":"game_state","state":{
                "status":"playing","countdown":"GO!","play_sound":true,
                "paddles":{
                    "left":{"x":10.0,"y":250.0,"width":10.0,"height":100.0,"score":0},
                    "right":{"x":980.0,"y":250.0,"width":10.0,"height":100.0,"score":2}
                },
                "ball":{"x":500.0,"y":300.0,"radius":8.0}}}"#,
        )
        .unwrap();
        let ServerMessage::GameState {
            state,
            is_reconnection,
        } = frame
        else {
            panic!("wrong variant");
        };
        assert!(!is_reconnection);
        assert_eq!(state.countdown, Some(Countdown::Label("GO!".into())));
        assert_eq!(state.paddles.right.score, 2);

        let numeric: Countdown = serde_json::from_str("3").unwrap();
        assert_eq!(numeric, Countdown::Seconds(3));
    }

    #[test]
    fn reconnection_flagged_state_round_trips() {
        let frame = r#"{"type":"fast_state","player_side":"right"}"#;
        let msg: ServerMessage = serde_json::from_str(frame).unwrap();
        assert_eq!(
            msg,
            ServerMessage::FastState {
                player_side: Side::Right,
                timestamp: 0
            }
        );
    }

    #[test]
    fn unknown_frame_type_is_a_parse_error() {
        let err = serde_json::from_str::<ServerMessage>(r#"{"type":"chat_message"}"#);
        assert!(err.is_err());
    }
}
