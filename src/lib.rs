//! Drawing edit-lock relay.
//!
//! The server half hands out edit locks on drawings and pushes
//! `drawing_locked` / `drawing_unlocked` frames to every connection that
//! subscribed to a drawing, over WebSocket or HTTP long-polling. The client
//! half, [`clients::DrawingLockNotifier`], keeps one connection to the relay
//! and fans those frames out to per-drawing handlers.

pub mod clients;
pub mod config;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
pub mod websocket;
pub mod ws;

pub use clients::DrawingLockNotifier;
pub use config::{Config, NotifierConfig};
pub use models::DrawingLockEvent;
pub use state::AppState;
