// rps_duel_protocol — wire protocol for the rock-paper-scissors duel.
//
// This crate defines the message types, framing, and serialization used by
// the game server (`rps_duel_server`) and participants to communicate over
// TCP. It is shared between both sides and has no dependency on any I/O or
// rendering code.
//
// Module overview:
// - `types.rs`:    Core vocabulary — `PlayerSlot`, `Choice`, `Score`.
// - `message.rs`:  Client-to-server and server-to-client message enums, plus
//                  `StateSnapshot`, the shared `game_state` payload.
// - `framing.rs`:  Newline-delimited framing over any `Read`/`Write` stream:
//                  one JSON message per `\n`-terminated UTF-8 line.
//
// Design decisions:
// - **JSON serialization, tagged by a `"type"` field.** Closed enums on both
//   directions: an unknown tag or missing field is a hard error, not a
//   silently ignored key.
// - **Framing is format-agnostic.** `write_line`/`FrameBuffer` move raw
//   bytes; callers serialize and parse, and decide what a malformed line
//   costs (the server drops it, nothing more).
// - **No async runtime.** Uses `std::io::Read`/`Write`, compatible with
//   blocking TCP streams and buffered wrappers.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{FrameBuffer, MAX_LINE_LEN, write_line};
pub use message::{ClientMessage, ServerMessage, StateSnapshot};
pub use types::{Choice, PlayerSlot, Score};
