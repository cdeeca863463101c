pub mod hub;
pub mod poll_sessions;
pub mod subscriptions;

pub use hub::LockHub;
pub use poll_sessions::{PollSession, PollSessions};
pub use subscriptions::ConnectionSubscriptions;
