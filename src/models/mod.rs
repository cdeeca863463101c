pub mod diagnostics;
pub mod error;
pub mod events;
pub mod health;
pub mod lock;
pub mod messages;
pub mod poll;

pub use diagnostics::*;
pub use error::*;
pub use events::*;
pub use health::*;
pub use lock::*;
pub use messages::*;
pub use poll::*;
