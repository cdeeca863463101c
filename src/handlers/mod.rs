pub mod diagnostics;
pub mod health;
pub mod locks;

pub use diagnostics::*;
pub use health::*;
pub use locks::*;
