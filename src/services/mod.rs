pub mod lock_service;

pub use lock_service::{LockError, LockService};
