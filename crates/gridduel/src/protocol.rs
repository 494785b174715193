//! Inter-peer message protocol.
//!
//! Messages are JSON objects tagged by a `type` field:
//!
//! ```json
//! {"type":"MOVE","index":4,"player":"O"}
//! {"type":"RESET","startingPlayer":"O"}
//! {"type":"HANDSHAKE","name":"Ana","gridSize":4,"winCondition":4}
//! ```
//!
//! Unrecognized types decode to [`PeerMessage::Unknown`] and are ignored by
//! the session.

use derive_more::{Display, Error, From};
use gridduel_game::{GameState, Player};
use serde::{Deserialize, Serialize};

/// One message on the peer channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum PeerMessage {
    /// A move by the sender.
    Move {
        /// Board index.
        index: usize,
        /// The mover.
        player: Player,
    },

    /// Start a new game.
    Reset {
        /// Who moves first in the new game.
        starting_player: Player,
    },

    /// Replace the receiver's game state wholesale.
    SyncState {
        /// Authoritative state.
        full_state: GameState,
    },

    /// Introduces the sender. Only the host includes the board geometry.
    Handshake {
        /// Sender's display name.
        name: String,
        /// Host's grid size.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grid_size: Option<usize>,
        /// Host's win condition.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        win_condition: Option<usize>,
    },

    /// Emoji reaction.
    Emoji {
        /// The emoji text.
        emoji: String,
    },

    /// Chat line.
    Chat(ChatPayload),

    /// Attention request.
    Nudge,

    /// Keepalive.
    Ping,

    /// Keepalive answer.
    Pong,

    /// Any message type this build does not know.
    #[serde(other)]
    Unknown,
}

/// Body of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatPayload {
    /// Current shape.
    Full(ChatMessage),
    /// Older clients send the text alone.
    Legacy {
        /// Message text.
        text: String,
    },
}

/// A chat line with its sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message id.
    pub id: String,
    /// Sender's peer identifier.
    pub from: String,
    /// Sender's display name.
    pub name: String,
    /// Message text.
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub ts: u64,
}

/// Failure to encode or decode a peer message.
#[derive(Debug, Display, Error, From)]
#[display("Protocol error: {}", _0)]
pub struct ProtocolError(serde_json::Error);

impl PeerMessage {
    /// Encodes the message as JSON text.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes JSON text from the peer.
    pub fn decode(payload: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Wire name of the message type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::Move { .. } => "MOVE",
            PeerMessage::Reset { .. } => "RESET",
            PeerMessage::SyncState { .. } => "SYNC_STATE",
            PeerMessage::Handshake { .. } => "HANDSHAKE",
            PeerMessage::Emoji { .. } => "EMOJI",
            PeerMessage::Chat(_) => "CHAT",
            PeerMessage::Nudge => "NUDGE",
            PeerMessage::Ping => "PING",
            PeerMessage::Pong => "PONG",
            PeerMessage::Unknown => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridduel_game::GameConfig;

    #[test]
    fn test_move_wire_shape() {
        let json = PeerMessage::Move {
            index: 4,
            player: Player::O,
        }
        .encode()
        .unwrap();
        assert_eq!(json, r#"{"type":"MOVE","index":4,"player":"O"}"#);
    }

    #[test]
    fn test_reset_uses_camel_case_fields() {
        let msg = PeerMessage::decode(r#"{"type":"RESET","startingPlayer":"O"}"#).unwrap();
        assert_eq!(
            msg,
            PeerMessage::Reset {
                starting_player: Player::O
            }
        );
    }

    #[test]
    fn test_sync_state_is_camel_case_throughout() {
        let state = GameState::new(GameConfig::new(4, 3).unwrap(), Player::O);
        let json = PeerMessage::SyncState {
            full_state: state.clone(),
        }
        .encode()
        .unwrap();
        for key in ["fullState", "currentPlayer", "winningLine", "gridSize", "winCondition"] {
            assert!(json.contains(&format!("\"{key}\"")), "{key} missing from {json}");
        }
        for key in ["full_state", "current_player", "winning_line", "grid_size"] {
            assert!(!json.contains(key), "{key} leaked into {json}");
        }

        let PeerMessage::SyncState { full_state } = PeerMessage::decode(&json).unwrap() else {
            panic!("expected SYNC_STATE");
        };
        assert_eq!(full_state, state);
    }

    #[test]
    fn test_joiner_handshake_omits_geometry() {
        let json = PeerMessage::Handshake {
            name: "Bo".into(),
            grid_size: None,
            win_condition: None,
        }
        .encode()
        .unwrap();
        assert_eq!(json, r#"{"type":"HANDSHAKE","name":"Bo"}"#);
    }

    #[test]
    fn test_chat_full_and_legacy() {
        let full = PeerMessage::decode(
            r#"{"type":"CHAT","id":"a-1","from":"a","name":"Ana","text":"gg","ts":17}"#,
        )
        .unwrap();
        assert!(matches!(full, PeerMessage::Chat(ChatPayload::Full(ref m)) if m.name == "Ana"));

        let legacy = PeerMessage::decode(r#"{"type":"CHAT","text":"hi"}"#).unwrap();
        assert_eq!(
            legacy,
            PeerMessage::Chat(ChatPayload::Legacy { text: "hi".into() })
        );
    }

    #[test]
    fn test_unit_messages_and_unknown() {
        assert_eq!(PeerMessage::decode(r#"{"type":"NUDGE"}"#).unwrap(), PeerMessage::Nudge);
        assert_eq!(PeerMessage::decode(r#"{"type":"PING"}"#).unwrap(), PeerMessage::Ping);
        assert_eq!(
            PeerMessage::decode(r#"{"type":"CONFETTI","amount":3}"#).unwrap(),
            PeerMessage::Unknown
        );
        assert!(PeerMessage::decode("not json").is_err());
    }

    #[test]
    fn test_sync_state_carries_board() {
        let state = GameState::new(GameConfig::new(4, 4).unwrap(), Player::X);
        let msg = PeerMessage::SyncState {
            full_state: state.clone(),
        };
        let json = msg.encode().unwrap();
        assert!(json.contains(r#""fullState""#));
        assert_eq!(PeerMessage::decode(&json).unwrap(), msg);
    }
}
