// Test-only duel client for multiplayer integration tests.
//
// Wraps the real `GameClient` (from `rps_duel_server::client`) to provide a
// synchronous, test-friendly API for exercising the full multiplayer
// pipeline: connect → ready → choice → result → reset.
//
// The only test-specific code here is the synchronous waiting wrappers:
// `wait_for_state` polls the real mirrored state, and the message helpers
// drain an mpsc inbox fed by the real subscriber callback. All networking
// and state-merge logic uses the same code paths as a live participant.
//
// See also: `tests/full_pipeline.rs` for the integration test scenarios.

use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use rps_duel_protocol::message::{ServerMessage, StateSnapshot};
use rps_duel_protocol::types::{Choice, PlayerSlot};
use rps_duel_server::client::{ConnectError, GameClient, SendError};

/// Default timeout for blocking wait operations.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A test participant wrapping a real `GameClient`.
pub struct TestGameClient {
    client: GameClient,
    inbox: Receiver<ServerMessage>,
}

impl TestGameClient {
    /// Connect to a duel server, wiring the real subscriber callback into a
    /// drainable inbox.
    pub fn try_connect(addr: SocketAddr) -> Result<Self, ConnectError> {
        let client = GameClient::connect(&addr.ip().to_string(), addr.port())?;
        let (tx, rx) = mpsc::channel();
        client.set_callback(move |msg: &ServerMessage| {
            let _ = tx.send(msg.clone());
        });
        Ok(Self { client, inbox: rx })
    }

    /// Connect, panicking on failure.
    pub fn connect(addr: SocketAddr) -> Self {
        match Self::try_connect(addr) {
            Ok(client) => client,
            Err(err) => panic!("connect to {addr} failed: {err}"),
        }
    }

    pub fn slot(&self) -> PlayerSlot {
        self.client.player_slot()
    }

    pub fn state(&self) -> StateSnapshot {
        self.client.state()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn send_ready(&mut self) -> Result<(), SendError> {
        self.client.send_ready()
    }

    pub fn send_choice(&mut self, choice: Choice) -> Result<(), SendError> {
        self.client.send_choice(choice)
    }

    pub fn disconnect(&mut self) {
        self.client.disconnect();
    }

    /// Block until the mirrored state satisfies `pred`, returning that
    /// state. Panics with `desc` after the timeout.
    pub fn wait_for_state<F>(&self, desc: &str, pred: F) -> StateSnapshot
    where
        F: Fn(&StateSnapshot) -> bool,
    {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let state = self.state();
            if pred(&state) {
                return state;
            }
            if Instant::now() > deadline {
                panic!("timed out waiting for {desc}; last state: {state:?}");
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Block until the subscriber callback delivers a message satisfying
    /// `pred`, returning it. Other messages are discarded.
    pub fn wait_for_message<F>(&self, desc: &str, pred: F) -> ServerMessage
    where
        F: Fn(&ServerMessage) -> bool,
    {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inbox.recv_timeout(remaining) {
                Ok(msg) if pred(&msg) => return msg,
                Ok(_) => continue,
                Err(err) => panic!("timed out waiting for {desc}: {err}"),
            }
        }
    }

    /// Block until the next `result` broadcast arrives.
    pub fn wait_for_result(&self) -> ServerMessage {
        self.wait_for_message("a result broadcast", |msg| {
            matches!(msg, ServerMessage::RoundResult { .. })
        })
    }
}
