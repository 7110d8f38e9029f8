// Protocol messages for client-server communication.
//
// Two enums define the full protocol vocabulary:
// - `ClientMessage`: sent by participants to the game server.
// - `ServerMessage`: sent by the game server to participants.
//
// Every message is a JSON object tagged by a `"type"` field, one message per
// newline-terminated line (see `framing.rs`). The enums are closed unions:
// an unrecognized tag or a missing field is a deserialization error, never a
// silently ignored key.
//
// `StateSnapshot` is the full `game_state` payload. The server builds one
// from its authoritative state for every broadcast; the client keeps one as
// its local mirror and merges incoming snapshots into it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Choice, PlayerSlot, Score};

/// Messages sent by a participant to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Toggle this participant's readiness for the next round.
    Ready,
    /// Submit (or overwrite) this participant's choice for the current round.
    Choice { choice: Choice },
}

/// Messages sent by the server to participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Identity handshake, the first message on every accepted connection.
    Welcome {
        player_id: PlayerSlot,
        message: String,
    },
    /// Authoritative shared state, broadcast after every mutation.
    GameState(StateSnapshot),
    /// Round outcome, broadcast once both choices are in.
    #[serde(rename = "result")]
    RoundResult {
        message: String,
        choices: BTreeMap<PlayerSlot, Choice>,
        scores: BTreeMap<PlayerSlot, Score>,
    },
    /// Protocol-level rejection (currently only "Server is full").
    Error { message: String },
}

/// The complete `game_state` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub players_connected: u8,
    pub ready_players: Vec<PlayerSlot>,
    pub game_started: bool,
    pub countdown_active: bool,
    pub round_in_progress: bool,
    pub scores: BTreeMap<PlayerSlot, Score>,
    pub choices: BTreeMap<PlayerSlot, Choice>,
}

impl Default for StateSnapshot {
    /// Empty session: nobody connected, zeroed tallies for both slots.
    fn default() -> Self {
        Self {
            players_connected: 0,
            ready_players: Vec::new(),
            game_started: false,
            countdown_active: false,
            round_in_progress: false,
            scores: PlayerSlot::BOTH
                .iter()
                .map(|&slot| (slot, Score::default()))
                .collect(),
            choices: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_wire_shape() {
        let json = serde_json::to_string(&ClientMessage::Ready).unwrap();
        assert_eq!(json, r#"{"type":"ready"}"#);
    }

    #[test]
    fn choice_wire_shape() {
        let json = serde_json::to_string(&ClientMessage::Choice {
            choice: Choice::Rock,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"choice","choice":"rock"}"#);

        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back,
            ClientMessage::Choice {
                choice: Choice::Rock
            }
        );
    }

    #[test]
    fn welcome_wire_shape() {
        let json = serde_json::to_string(&ServerMessage::Welcome {
            player_id: PlayerSlot::One,
            message: "Welcome Player 1".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"welcome","player_id":1,"message":"Welcome Player 1"}"#
        );
    }

    #[test]
    fn game_state_fields_inline_with_tag() {
        let snapshot = StateSnapshot {
            players_connected: 2,
            ready_players: vec![PlayerSlot::One, PlayerSlot::Two],
            round_in_progress: true,
            choices: BTreeMap::from([(PlayerSlot::One, Choice::Paper)]),
            ..StateSnapshot::default()
        };

        let json = serde_json::to_string(&ServerMessage::GameState(snapshot.clone())).unwrap();
        assert!(json.contains(r#""type":"game_state""#), "{json}");
        assert!(json.contains(r#""players_connected":2"#), "{json}");
        assert!(json.contains(r#""ready_players":[1,2]"#), "{json}");
        assert!(json.contains(r#""choices":{"1":"paper"}"#), "{json}");
        assert!(
            json.contains(r#""scores":{"1":{"wins":0,"losses":0,"draws":0}"#),
            "{json}"
        );

        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ServerMessage::GameState(snapshot));
    }

    #[test]
    fn result_uses_result_tag() {
        let msg = ServerMessage::RoundResult {
            message: "Player 1 Wins".into(),
            choices: BTreeMap::from([
                (PlayerSlot::One, Choice::Rock),
                (PlayerSlot::Two, Choice::Scissors),
            ]),
            scores: BTreeMap::from([
                (
                    PlayerSlot::One,
                    Score {
                        wins: 1,
                        losses: 0,
                        draws: 0,
                    },
                ),
                (
                    PlayerSlot::Two,
                    Score {
                        wins: 0,
                        losses: 1,
                        draws: 0,
                    },
                ),
            ]),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"result""#), "{json}");
        assert!(json.contains(r#""message":"Player 1 Wins""#), "{json}");

        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn unknown_type_rejected() {
        let err = serde_json::from_str::<ClientMessage>(r#"{"type":"quit"}"#);
        assert!(err.is_err());
        let err = serde_json::from_str::<ServerMessage>(r#"{"type":"pong"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn missing_field_rejected() {
        // A choice message without its choice is malformed, not a default.
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"choice"}"#).is_err());
    }

    #[test]
    fn default_snapshot_has_both_tallies() {
        let snapshot = StateSnapshot::default();
        assert_eq!(snapshot.scores.len(), 2);
        assert_eq!(snapshot.scores[&PlayerSlot::One], Score::default());
        assert_eq!(snapshot.scores[&PlayerSlot::Two], Score::default());
        assert!(snapshot.choices.is_empty());
    }
}
