pub mod handler;
pub mod msg_subscribe_handler;
pub mod polling;

pub use handler::websocket_handler;
pub use polling::{poll_close, poll_open, poll_receive, poll_send};
