// TCP client for joining a duel server.
//
// `GameClient` keeps a participant-local mirror of the authoritative game
// state and exposes the two send operations. Architecture:
// - `connect()` performs TCP connect + welcome handshake on the calling
//   thread, then spawns a background reader thread.
// - The reader thread reads raw bytes, splits them into lines with
//   `FrameBuffer`, deserializes `ServerMessage`, merges each message into
//   the mirror, and invokes the subscriber callback.
// - The calling thread holds a `BufWriter<TcpStream>` for sending.
//
// The mirror is merged field-by-field, never replaced wholesale: a
// `game_state` carries every field, a `result` only updates scores and
// choices. Consumers read it with `state()` (a clone under the mutex) or
// subscribe with `set_callback`; the callback fires on the reader thread,
// so it must not block for long.
//
// A closed or erroring socket is terminal for the session: there is no
// retry or resume. Rejoining is a fresh `connect()` and a fresh slot.

use std::io::{self, BufWriter, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::warn;
use rps_duel_protocol::framing::{FrameBuffer, write_line};
use rps_duel_protocol::message::{ClientMessage, ServerMessage, StateSnapshot};
use rps_duel_protocol::types::{Choice, PlayerSlot};
use thiserror::Error;

/// How long the welcome handshake may take before `connect` gives up.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Subscriber invoked with every parsed server message, on the reader thread.
pub type MessageCallback = Box<dyn FnMut(&ServerMessage) + Send>;

/// Failure to establish a session.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connection failed: {0}")]
    Io(#[from] io::Error),
    #[error("server rejected connection: {0}")]
    Rejected(String),
    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Failure to send on an established session (the transport is closed or
/// otherwise unwritable).
#[derive(Debug, Error)]
#[error("send failed: {0}")]
pub struct SendError(#[from] io::Error);

/// A connected duel participant.
pub struct GameClient {
    writer: BufWriter<TcpStream>,
    slot: PlayerSlot,
    mirror: Arc<Mutex<StateSnapshot>>,
    callback: Arc<Mutex<Option<MessageCallback>>>,
    running: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
}

impl GameClient {
    /// Connect to a duel server and perform the welcome handshake. Blocks
    /// until the server assigns a slot, then spawns the reader thread.
    ///
    /// Fails with `Rejected` when the server is full, `Handshake` when the
    /// first message is missing or malformed, and `Io` on transport errors.
    pub fn connect(host: &str, port: u16) -> Result<Self, ConnectError> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

        let mut read_stream = stream.try_clone()?;
        let writer = BufWriter::new(stream);

        // Read frames until the first complete message arrives. It must be
        // the welcome; anything the server sent right behind it (the join
        // broadcast) is handed to the reader loop, not lost.
        let mut frames = FrameBuffer::new();
        let mut chunk = [0u8; 2048];
        let (slot, pending) = loop {
            let n = read_stream.read(&mut chunk)?;
            if n == 0 {
                return Err(ConnectError::Handshake(
                    "connection closed before welcome".into(),
                ));
            }
            let mut lines = frames.feed(&chunk[..n])?.into_iter();
            let Some(first) = lines.next() else {
                continue;
            };
            let msg: ServerMessage = serde_json::from_slice(&first)
                .map_err(|err| ConnectError::Handshake(format!("malformed welcome: {err}")))?;
            match msg {
                ServerMessage::Welcome { player_id, .. } => {
                    break (player_id, lines.collect::<Vec<_>>());
                }
                ServerMessage::Error { message } => {
                    return Err(ConnectError::Rejected(message));
                }
                other => {
                    return Err(ConnectError::Handshake(format!(
                        "expected welcome, got {other:?}"
                    )));
                }
            }
        };

        // Clear the handshake timeout for the long-lived reader loop.
        read_stream.set_read_timeout(None)?;

        let mirror = Arc::new(Mutex::new(StateSnapshot::default()));
        let callback: Arc<Mutex<Option<MessageCallback>>> = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));

        let reader_thread = {
            let mirror = mirror.clone();
            let callback = callback.clone();
            let running = running.clone();
            thread::spawn(move || {
                reader_loop(read_stream, frames, pending, &mirror, &callback, &running);
            })
        };

        Ok(Self {
            writer,
            slot,
            mirror,
            callback,
            running,
            reader_thread: Some(reader_thread),
        })
    }

    /// The slot the server assigned during the handshake.
    pub fn player_slot(&self) -> PlayerSlot {
        self.slot
    }

    /// A copy of the mirrored game state as of the latest server message.
    pub fn state(&self) -> StateSnapshot {
        self.mirror
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    /// True until the transport closes or `disconnect` is called.
    pub fn is_connected(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Register the subscriber invoked with every parsed server message.
    /// Replaces any previous subscriber.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: FnMut(&ServerMessage) + Send + 'static,
    {
        if let Ok(mut slot) = self.callback.lock() {
            *slot = Some(Box::new(callback));
        }
    }

    /// Toggle this participant's readiness.
    pub fn send_ready(&mut self) -> Result<(), SendError> {
        self.send(&ClientMessage::Ready)
    }

    /// Submit this participant's choice for the current round.
    pub fn send_choice(&mut self, choice: Choice) -> Result<(), SendError> {
        self.send(&ClientMessage::Choice { choice })
    }

    fn send(&mut self, msg: &ClientMessage) -> Result<(), SendError> {
        let json = serde_json::to_vec(msg).map_err(io::Error::from)?;
        write_line(&mut self.writer, &json)?;
        Ok(())
    }

    /// Stop the reader loop and close the transport. Safe to call more than
    /// once; also runs on drop.
    pub fn disconnect(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Unblocks the reader thread's pending read.
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Reader thread: frame, parse, merge, and notify until EOF or shutdown.
fn reader_loop(
    mut stream: TcpStream,
    mut frames: FrameBuffer,
    pending: Vec<Vec<u8>>,
    mirror: &Arc<Mutex<StateSnapshot>>,
    callback: &Arc<Mutex<Option<MessageCallback>>>,
    running: &Arc<AtomicBool>,
) {
    for line in pending {
        handle_line(&line, mirror, callback);
    }

    let mut chunk = [0u8; 2048];
    while running.load(Ordering::SeqCst) {
        let n = match stream.read(&mut chunk) {
            Ok(0) => break, // server closed
            Ok(n) => n,
            Err(_) => break,
        };
        let lines = match frames.feed(&chunk[..n]) {
            Ok(lines) => lines,
            Err(err) => {
                warn!("server overran the frame buffer: {err}");
                break;
            }
        };
        for line in lines {
            handle_line(&line, mirror, callback);
        }
    }
    running.store(false, Ordering::SeqCst);
}

/// Parse one line, merge it into the mirror, and notify the subscriber.
/// A malformed line is logged and dropped.
fn handle_line(
    line: &[u8],
    mirror: &Arc<Mutex<StateSnapshot>>,
    callback: &Arc<Mutex<Option<MessageCallback>>>,
) {
    let msg: ServerMessage = match serde_json::from_slice(line) {
        Ok(msg) => msg,
        Err(err) => {
            warn!("dropping malformed server message: {err}");
            return;
        }
    };

    if let Ok(mut state) = mirror.lock() {
        merge_message(&mut state, &msg);
    }
    if let Ok(mut slot) = callback.lock()
        && let Some(cb) = slot.as_mut()
    {
        cb(&msg);
    }
}

/// Field-wise merge of a server message into the mirror. A `game_state`
/// carries every field; a `result` only updates scores and choices; nothing
/// else touches the mirror.
fn merge_message(state: &mut StateSnapshot, msg: &ServerMessage) {
    match msg {
        ServerMessage::GameState(snapshot) => {
            state.players_connected = snapshot.players_connected;
            state.ready_players = snapshot.ready_players.clone();
            state.game_started = snapshot.game_started;
            state.countdown_active = snapshot.countdown_active;
            state.round_in_progress = snapshot.round_in_progress;
            state.scores = snapshot.scores.clone();
            state.choices = snapshot.choices.clone();
        }
        ServerMessage::RoundResult {
            choices, scores, ..
        } => {
            state.choices = choices.clone();
            state.scores = scores.clone();
        }
        ServerMessage::Welcome { .. } | ServerMessage::Error { .. } => {}
    }
}
