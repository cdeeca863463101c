pub mod notifier;
pub mod socket;
pub mod transport;

pub use notifier::{DrawingLockNotifier, LockHandler, NotifierError};
pub use socket::SocketConnector;
pub use transport::{Connection, ConnectionState, Connector, TransportError, TransportEvent, TransportKind};
