//! Tutor-ia API Library Crate
//!
//! The host of the session core: configuration, the credential client, the
//! realtime transport, preference persistence, the HTTP/WebSocket surface
//! and the driver that executes core commands. The `api` binary is a thin
//! wrapper around this library.

pub mod audio_utils;
pub mod config;
pub mod credential;
pub mod handlers;
pub mod models;
pub mod preferences;
pub mod router;
pub mod state;
pub mod transport;
pub mod ws;
