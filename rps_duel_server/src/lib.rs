// rps_duel_server — authoritative coordinator for two-player duels.
//
// This crate implements the game server for networked rock-paper-scissors:
// it assigns each participant one of exactly two slots, gates round entry on
// mutual readiness, collects the simultaneous choices, resolves the outcome,
// and keeps every participant's view of the shared state consistent through
// `game_state` broadcasts. It never renders, captures gestures, or picks
// choices — those collaborators live on the client side and talk to this
// crate through `GameClient`.
//
// Module overview:
// - `session.rs`: `GameSession` — slot registry, readiness/choice state
//                 machine, score tallies, and broadcast. The core data
//                 structure that `server.rs` drives.
// - `server.rs`:  TCP listener, reader threads (one per participant), and
//                 the main event loop. Uses `std::net` with a
//                 thread-per-reader architecture and an `mpsc` channel to
//                 funnel events into the single-threaded `GameSession`.
// - `client.rs`:  `GameClient` — the participant-side synchronizer: welcome
//                 handshake, background reader, field-wise-merged state
//                 mirror, subscriber callback, send operations.
//
// Dependencies: `rps_duel_protocol` (shared message types and framing).
//
// The server can run as a standalone binary (`main.rs`) or be embedded in a
// game process via the library API (`start_server`).

pub mod client;
pub mod server;
pub mod session;

pub use client::{ConnectError, GameClient, SendError};
pub use server::{ServerConfig, ServerHandle, start_server};
pub use session::GameSession;
