//! WebSocket Session Management
//!
//! One presentation connection drives one voice conversation:
//!
//! - `protocol`: JSON messages exchanged with the browser.
//! - `session`: the socket lifecycle, from upgrade to close.
//! - `driver`: executes the commands of the session core.
//! - `audio`: the local audio output the playback gate acts on.

pub mod audio;
pub mod driver;
pub mod protocol;
pub mod session;

pub use session::ws_handler;
