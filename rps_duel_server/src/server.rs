// TCP server and main event loop for the duel coordinator.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Listener thread** (`TcpListener::accept()` loop): accepts new TCP
//   connections and sends `InternalEvent::NewConnection` to the main thread.
// - **Reader threads** (one per participant): read raw bytes, split them
//   into lines with `FrameBuffer`, deserialize `ClientMessage`, and send
//   `InternalEvent::MessageFrom` to the main thread. On error/EOF, send
//   `InternalEvent::Disconnected`. A line that fails to parse is logged and
//   dropped; it never costs the connection.
// - **Main thread**: owns the `GameSession`, receives events from the
//   channel, and dispatches them. Every state mutation happens here, so the
//   shared state needs no locking and two participants' messages can never
//   interleave inside a round resolution.
//
// The main thread is the only writer to client TCP streams (via
// `GameSession::broadcast`/`send_to`). Reader threads only read from
// streams. This avoids concurrent read/write on the same `TcpStream`, which
// is safe on most platforms but fragile.
//
// Shutdown: the main thread checks a `keep_running` flag (set to false by
// `ServerHandle::stop`) and breaks out of the event loop.

use std::io::{BufWriter, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rps_duel_protocol::framing::{FrameBuffer, write_line};
use rps_duel_protocol::message::{ClientMessage, ServerMessage};
use rps_duel_protocol::types::PlayerSlot;

use crate::session::GameSession;

/// Events sent from listener/reader threads to the main thread.
enum InternalEvent {
    NewConnection {
        stream: TcpStream,
    },
    MessageFrom {
        slot: PlayerSlot,
        message: ClientMessage,
    },
    Disconnected {
        slot: PlayerSlot,
    },
}

/// Handle returned by `start_server` to control the running server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// Signal the server to stop and wait for it to shut down.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread {
            let _ = handle.join();
        }
    }
}

/// Configuration for starting a duel server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5555,
        }
    }
}

/// Start the server on a background thread. Returns a handle for stopping it
/// and the actual bound address (useful when port 0 is used to let the OS
/// pick a free port).
pub fn start_server(config: &ServerConfig) -> std::io::Result<(ServerHandle, SocketAddr)> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))?;
    let addr = listener.local_addr()?;
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();

    info!("duel server listening on {addr}");
    let thread = thread::spawn(move || {
        run_server(listener, keep_running_clone);
    });

    Ok((
        ServerHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Main event loop. Runs until `keep_running` is set to false.
fn run_server(listener: TcpListener, keep_running: Arc<AtomicBool>) {
    let mut session = GameSession::new();

    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    // Set the listener to non-blocking so the accept thread can check
    // keep_running periodically.
    listener.set_nonblocking(true).ok();

    // Listener thread: accepts new connections.
    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        while keep_running_listener.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(false).ok();
                    let _ = tx_listener.send(InternalEvent::NewConnection { stream });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(_) => break,
            }
        }
    });

    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                handle_event(&mut session, event, &tx, &keep_running);
                // Drain any additional events that arrived during handling.
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut session, event, &tx, &keep_running);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Dispatch a single event to the session.
fn handle_event(
    session: &mut GameSession,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    match event {
        InternalEvent::NewConnection { stream } => {
            handle_new_connection(session, stream, tx, keep_running);
        }
        InternalEvent::MessageFrom { slot, message } => {
            handle_message(session, slot, message);
        }
        InternalEvent::Disconnected { slot } => {
            session.remove(slot);
        }
    }
}

/// Handle a new TCP connection: register it with the session (which sends
/// the welcome handshake) and spawn its reader thread, or send a framed
/// `error` and close when both slots are taken.
fn handle_new_connection(
    session: &mut GameSession,
    stream: TcpStream,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    // The session owns the write half; the reader thread owns this clone.
    let read_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(err) => {
            warn!("dropping connection, clone failed: {err}");
            return;
        }
    };

    match session.register(stream) {
        Ok(slot) => {
            let tx_reader = tx.clone();
            let keep_running_reader = keep_running.clone();
            thread::spawn(move || {
                reader_loop(read_stream, slot, tx_reader, keep_running_reader);
            });
        }
        Err(reason) => {
            // Overflow: tell the peer why, then close without registering.
            info!("rejecting connection: {reason}");
            let msg = ServerMessage::Error { message: reason };
            if let Ok(json) = serde_json::to_vec(&msg) {
                let mut writer = BufWriter::new(read_stream);
                let _ = write_line(&mut writer, &json);
            }
        }
    }
}

/// Reader loop for a single participant. Runs in its own thread.
fn reader_loop(
    mut stream: TcpStream,
    slot: PlayerSlot,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) {
    let mut frames = FrameBuffer::new();
    let mut chunk = [0u8; 2048];

    while keep_running.load(Ordering::SeqCst) {
        let n = match stream.read(&mut chunk) {
            Ok(0) => break, // clean close
            Ok(n) => n,
            Err(_) => break, // read error
        };

        let lines = match frames.feed(&chunk[..n]) {
            Ok(lines) => lines,
            Err(err) => {
                warn!("player {slot} overran the frame buffer: {err}");
                break;
            }
        };

        for line in lines {
            match serde_json::from_slice::<ClientMessage>(&line) {
                Ok(message) => {
                    if tx.send(InternalEvent::MessageFrom { slot, message }).is_err() {
                        return; // main loop is gone
                    }
                }
                Err(err) => {
                    // Malformed line: drop it, keep the connection.
                    warn!("dropping malformed message from player {slot}: {err}");
                }
            }
        }
    }

    let _ = tx.send(InternalEvent::Disconnected { slot });
}

/// Route a decoded client message into the session.
fn handle_message(session: &mut GameSession, slot: PlayerSlot, message: ClientMessage) {
    debug!("player {slot}: {message:?}");
    match message {
        ClientMessage::Ready => session.toggle_ready(slot),
        ClientMessage::Choice { choice } => session.submit_choice(slot, choice),
    }
}
