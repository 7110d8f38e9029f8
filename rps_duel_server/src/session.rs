// Authoritative session state for the duel server.
//
// `GameSession` is the central data structure that `server.rs` drives. It
// owns the shared game state: connected participants, readiness, submitted
// choices, running scores, and the round-phase flags. All mutation happens
// through methods called from the server's single-threaded main loop — no
// internal locking.
//
// Key responsibilities:
// - Registration: assign the first free slot (One, then Two), send the
//   `welcome` handshake before anything else, reject overflow.
// - Round gating: readiness is a toggle while idle; two ready + two
//   connected starts a round.
// - Resolution: once both choices are in, compute the outcome, update both
//   tallies, broadcast the `result`, then reset to idle and broadcast the
//   reset state.
// - Disconnect cleanup: free the slot, drop its readiness and any pending
//   choice, force the round off, tell whoever remains.
//
// Writing to client streams: `GameSession` holds each connection's
// `TcpStream` wrapped in `BufWriter`. The `send_to`/`broadcast` helpers
// serialize a `ServerMessage` to JSON, frame it, and write it out. The slot
// list is snapshotted before a broadcast iterates, so a failure discovered
// mid-broadcast never aborts delivery to the other slot; failed slots go
// through the normal disconnect path afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufWriter};
use std::net::TcpStream;
use std::time::Duration;

use log::{info, warn};
use rps_duel_protocol::framing::write_line;
use rps_duel_protocol::message::{ServerMessage, StateSnapshot};
use rps_duel_protocol::types::{Choice, PlayerSlot, Score};

/// How long a single client write may stall before that connection is
/// treated as dead.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of comparing the two submitted choices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RoundOutcome {
    Draw,
    Win(PlayerSlot),
}

/// Total resolution over the 9 possible pairs: equal draws, otherwise the
/// dominance cycle decides.
fn resolve_round(one: Choice, two: Choice) -> RoundOutcome {
    if one == two {
        RoundOutcome::Draw
    } else if one.beats(two) {
        RoundOutcome::Win(PlayerSlot::One)
    } else {
        RoundOutcome::Win(PlayerSlot::Two)
    }
}

fn outcome_message(outcome: RoundOutcome) -> String {
    match outcome {
        RoundOutcome::Draw => "Draw".into(),
        RoundOutcome::Win(slot) => format!("Player {slot} Wins"),
    }
}

struct ClientConn {
    writer: BufWriter<TcpStream>,
}

/// The single authoritative game session.
pub struct GameSession {
    clients: BTreeMap<PlayerSlot, ClientConn>,
    ready: BTreeSet<PlayerSlot>,
    choices: BTreeMap<PlayerSlot, Choice>,
    scores: BTreeMap<PlayerSlot, Score>,
    game_started: bool,
    countdown_active: bool,
    round_in_progress: bool,
}

impl GameSession {
    pub fn new() -> Self {
        Self {
            clients: BTreeMap::new(),
            ready: BTreeSet::new(),
            choices: BTreeMap::new(),
            scores: PlayerSlot::BOTH
                .iter()
                .map(|&slot| (slot, Score::default()))
                .collect(),
            game_started: false,
            countdown_active: false,
            round_in_progress: false,
        }
    }

    /// Attempt to register a connection. Assigns the first free slot, sends
    /// the `welcome` handshake to the new connection before any other
    /// traffic, then broadcasts the updated state to everyone.
    ///
    /// Returns the assigned slot, or an error reason string when both slots
    /// are taken (the caller sends it as an `error` message and closes).
    pub fn register(&mut self, stream: TcpStream) -> Result<PlayerSlot, String> {
        let slot = PlayerSlot::BOTH
            .iter()
            .copied()
            .find(|slot| !self.clients.contains_key(slot))
            .ok_or_else(|| String::from("Server is full"))?;

        // A stalled peer must not wedge the main loop mid-broadcast.
        stream.set_write_timeout(Some(WRITE_TIMEOUT)).ok();

        self.clients.insert(
            slot,
            ClientConn {
                writer: BufWriter::new(stream),
            },
        );

        let welcome = ServerMessage::Welcome {
            player_id: slot,
            message: format!("Welcome Player {slot}"),
        };
        self.send_to(slot, &welcome);
        info!("player {slot} registered");

        self.broadcast_state();
        Ok(slot)
    }

    /// Free a slot after its connection died or closed. Drops the slot's
    /// readiness and any pending choice (a round cannot survive a missing
    /// participant) and tells whoever remains.
    pub fn remove(&mut self, slot: PlayerSlot) {
        if self.clients.remove(&slot).is_none() {
            return;
        }
        self.ready.remove(&slot);
        self.choices.remove(&slot);
        self.round_in_progress = false;
        self.countdown_active = false;
        info!("player {slot} disconnected");
        self.broadcast_state();
    }

    /// Toggle a participant's readiness. Ignored while a round is running.
    /// Two ready and two connected starts the round.
    pub fn toggle_ready(&mut self, slot: PlayerSlot) {
        if self.round_in_progress {
            return;
        }
        if !self.ready.remove(&slot) {
            self.ready.insert(slot);
        }
        if self.ready.len() == 2 && self.clients.len() == 2 {
            self.game_started = true;
            self.countdown_active = true;
            self.round_in_progress = true;
            info!("both players ready, round starting");
        }
        self.broadcast_state();
    }

    /// Store (or overwrite) a participant's choice for the current round.
    /// Once both slots hold a choice the round resolves: tallies update, the
    /// `result` goes out, and the session resets to idle.
    pub fn submit_choice(&mut self, slot: PlayerSlot, choice: Choice) {
        self.choices.insert(slot, choice);

        let (Some(&one), Some(&two)) = (
            self.choices.get(&PlayerSlot::One),
            self.choices.get(&PlayerSlot::Two),
        ) else {
            return;
        };

        let outcome = resolve_round(one, two);
        self.apply_outcome(outcome);

        let message = outcome_message(outcome);
        info!("round resolved: {message} ({one} vs {two})");
        let result = ServerMessage::RoundResult {
            message,
            choices: self.choices.clone(),
            scores: self.scores.clone(),
        };
        self.broadcast(&result);

        self.choices.clear();
        self.ready.clear();
        self.game_started = false;
        self.countdown_active = false;
        self.round_in_progress = false;
        self.broadcast_state();
    }

    fn apply_outcome(&mut self, outcome: RoundOutcome) {
        match outcome {
            RoundOutcome::Draw => {
                for slot in PlayerSlot::BOTH {
                    self.scores.entry(slot).or_default().draws += 1;
                }
            }
            RoundOutcome::Win(winner) => {
                self.scores.entry(winner).or_default().wins += 1;
                self.scores.entry(winner.other()).or_default().losses += 1;
            }
        }
    }

    /// Build the full `game_state` payload from the authoritative state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            players_connected: self.clients.len() as u8,
            ready_players: self.ready.iter().copied().collect(),
            game_started: self.game_started,
            countdown_active: self.countdown_active,
            round_in_progress: self.round_in_progress,
            scores: self.scores.clone(),
            choices: self.choices.clone(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.clients.len()
    }

    /// Broadcast the current state to every connected participant.
    pub fn broadcast_state(&mut self) {
        let msg = ServerMessage::GameState(self.snapshot());
        self.broadcast(&msg);
    }

    /// Broadcast a message to all connected participants. The slot list is
    /// snapshotted first; slots whose send fails are cleaned up through the
    /// normal disconnect path after delivery to the others completes.
    pub fn broadcast(&mut self, msg: &ServerMessage) {
        let slots: Vec<PlayerSlot> = self.clients.keys().copied().collect();
        let mut failed = Vec::new();
        for slot in slots {
            if !self.send_to(slot, msg) {
                failed.push(slot);
            }
        }
        for slot in failed {
            warn!("dropping player {slot} after failed send");
            self.remove(slot);
        }
    }

    /// Send a message to one participant. Returns false on a write failure
    /// (the caller decides whether that costs the connection).
    fn send_to(&mut self, slot: PlayerSlot, msg: &ServerMessage) -> bool {
        let Some(conn) = self.clients.get_mut(&slot) else {
            return true;
        };
        match send_message(&mut conn.writer, msg) {
            Ok(()) => true,
            Err(err) => {
                warn!("write to player {slot} failed: {err}");
                false
            }
        }
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a `ServerMessage` to JSON and write it as one framed line.
fn send_message(writer: &mut BufWriter<TcpStream>, msg: &ServerMessage) -> io::Result<()> {
    let json = serde_json::to_vec(msg)?;
    write_line(writer, &json)
}
