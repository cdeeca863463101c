//! Drawing lock notifier.
//!
//! Bridges one shared connection to the lock relay and the UI-level code that
//! wants to hear about edit locks on particular drawings. Handlers are
//! registered per drawing id and called, in registration order, for every
//! `drawing_locked` / `drawing_unlocked` frame the server pushes for that id.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::socket::SocketConnector;
use super::transport::{Connection, ConnectionState, Connector, TransportError, TransportEvent};
use crate::config::NotifierConfig;
use crate::models::{ClientMessage, DrawingLockEvent, DrawingRef, ServerMessage};

/// Callback invoked with lock notifications for one drawing
pub type LockHandler = Arc<dyn Fn(&DrawingLockEvent) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Drawing id must not be empty")]
    EmptyDrawingId,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Default)]
struct NotifierInner {
    connection: Option<Box<dyn Connection>>,
    pump: Option<JoinHandle<()>>,
    subscribers: HashMap<String, Vec<LockHandler>>,
}

/// Shared handle to the drawing lock notifier.
///
/// Cloning is cheap and every clone talks to the same connection and
/// registry. Build one per process or session and hand it to whoever needs it.
#[derive(Clone)]
pub struct DrawingLockNotifier {
    connector: Arc<dyn Connector>,
    inner: Arc<Mutex<NotifierInner>>,
}

impl DrawingLockNotifier {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            inner: Arc::new(Mutex::new(NotifierInner::default())),
        }
    }

    /// Notifier backed by a real WebSocket / long-polling connection
    pub fn from_config(config: NotifierConfig) -> Result<Self, NotifierError> {
        let connector = SocketConnector::new(config)?;
        Ok(Self::new(Arc::new(connector)))
    }

    /// Open the connection unless one is already connected or connecting.
    ///
    /// Returns as soon as the transport has been started; the connection
    /// itself comes up in the background.
    pub async fn connect(&self) {
        let mut inner = self.inner.lock().await;
        self.connect_locked(&mut inner);
    }

    /// Close the connection and forget every subscription.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        if inner.connection.is_some() {
            info!("Disconnecting drawing lock notifier");
        }
        close_connection(&mut inner);
        inner.subscribers.clear();
    }

    /// Register `handler` for lock notifications on `drawing_id`.
    ///
    /// Connects first when there is no live connection. Handlers are not
    /// deduplicated: registering the same handler twice calls it twice per
    /// event. Every call also tells the server about the interest.
    pub async fn subscribe_drawing<F>(
        &self,
        drawing_id: impl Into<String>,
        handler: F,
    ) -> Result<(), NotifierError>
    where
        F: Fn(&DrawingLockEvent) + Send + Sync + 'static,
    {
        let drawing_id = drawing_id.into();
        if drawing_id.trim().is_empty() {
            return Err(NotifierError::EmptyDrawingId);
        }

        let mut inner = self.inner.lock().await;
        self.connect_locked(&mut inner);

        inner
            .subscribers
            .entry(drawing_id.clone())
            .or_default()
            .push(Arc::new(handler));

        debug!("Subscribed to drawing {}", drawing_id);
        if let Some(connection) = &inner.connection {
            connection.emit(ClientMessage::SubscribeDrawing(DrawingRef::new(drawing_id)));
        }
        Ok(())
    }

    /// Drop every handler registered for `drawing_id`.
    pub async fn unsubscribe_drawing(&self, drawing_id: &str) {
        let mut inner = self.inner.lock().await;
        if inner.subscribers.remove(drawing_id).is_none() {
            return;
        }

        debug!("Unsubscribed from drawing {}", drawing_id);
        if let Some(connection) = &inner.connection {
            connection.emit(ClientMessage::UnsubscribeDrawing(DrawingRef::new(drawing_id)));
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection_state().await == ConnectionState::Connected
    }

    pub async fn connection_state(&self) -> ConnectionState {
        let inner = self.inner.lock().await;
        inner
            .connection
            .as_ref()
            .map(|connection| connection.state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Number of handlers registered for `drawing_id`
    pub async fn subscriber_count(&self, drawing_id: &str) -> usize {
        let inner = self.inner.lock().await;
        inner.subscribers.get(drawing_id).map_or(0, Vec::len)
    }

    /// Route one server frame to the handlers of its drawing.
    pub async fn dispatch(&self, message: ServerMessage) {
        dispatch(&self.inner, message).await;
    }

    fn connect_locked(&self, inner: &mut NotifierInner) {
        if let Some(connection) = &inner.connection {
            if connection.state() != ConnectionState::Disconnected {
                return;
            }
            debug!("Replacing connection that gave up reconnecting");
        }
        close_connection(inner);

        info!("Connecting drawing lock notifier");
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        inner.connection = Some(self.connector.open(events_tx));
        inner.pump = Some(tokio::spawn(pump(Arc::downgrade(&self.inner), events_rx)));
    }
}

fn close_connection(inner: &mut NotifierInner) {
    if let Some(connection) = inner.connection.take() {
        connection.close();
    }
    if let Some(pump) = inner.pump.take() {
        pump.abort();
    }
}

/// Drain connection events until the connection or the notifier goes away.
async fn pump(
    inner: Weak<Mutex<NotifierInner>>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(shared) = inner.upgrade() else {
            return;
        };

        match event {
            TransportEvent::Message(message) => dispatch(&shared, message).await,
            TransportEvent::Connected { kind, reconnect } => {
                info!("Drawing lock notifier connected over {}", kind);
                if reconnect {
                    resubscribe(&shared).await;
                }
            }
            TransportEvent::Disconnected { reason } => {
                info!("Drawing lock notifier disconnected: {}", reason);
            }
            TransportEvent::ConnectError { error } => {
                warn!("Drawing lock notifier failed to connect: {}", error);
            }
            TransportEvent::ReconnectFailed => {
                warn!("Drawing lock notifier stopped reconnecting");
            }
        }
    }
}

async fn dispatch(inner: &Mutex<NotifierInner>, message: ServerMessage) {
    let event = match DrawingLockEvent::try_from(message) {
        Ok(event) => event,
        Err(err) => {
            warn!("Lock relay reported an error: {:?}", err);
            return;
        }
    };

    // Handlers run outside the lock so they may call back into the notifier.
    let handlers = {
        let inner = inner.lock().await;
        inner.subscribers.get(event.drawing_id()).cloned()
    };

    match handlers {
        Some(handlers) => {
            for handler in handlers {
                handler(&event);
            }
        }
        None => debug!("No subscribers for drawing {}, dropping event", event.drawing_id()),
    }
}

/// The server forgets subscriptions with the old session.
async fn resubscribe(inner: &Mutex<NotifierInner>) {
    let inner = inner.lock().await;
    let Some(connection) = &inner.connection else {
        return;
    };
    for drawing_id in inner.subscribers.keys() {
        connection.emit(ClientMessage::SubscribeDrawing(DrawingRef::new(drawing_id.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::transport::TransportKind;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Shared log of what the notifier asked of its transport
    #[derive(Default)]
    struct Recorder {
        log: StdMutex<Vec<String>>,
        state: StdMutex<Option<ConnectionState>>,
        events: StdMutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    }

    impl Recorder {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn opened(&self) -> usize {
            self.log().iter().filter(|entry| *entry == "open").count()
        }

        fn set_state(&self, state: ConnectionState) {
            *self.state.lock().unwrap() = Some(state);
        }

        fn push(&self, event: TransportEvent) {
            let events = self.events.lock().unwrap();
            events.as_ref().unwrap().send(event).unwrap();
        }
    }

    struct FakeConnector(Arc<Recorder>);

    impl Connector for FakeConnector {
        fn open(&self, events: mpsc::UnboundedSender<TransportEvent>) -> Box<dyn Connection> {
            self.0.log.lock().unwrap().push("open".to_string());
            self.0.set_state(ConnectionState::Connected);
            *self.0.events.lock().unwrap() = Some(events);
            Box::new(FakeConnection(self.0.clone()))
        }
    }

    struct FakeConnection(Arc<Recorder>);

    impl Connection for FakeConnection {
        fn state(&self) -> ConnectionState {
            self.0.state.lock().unwrap().unwrap_or(ConnectionState::Disconnected)
        }

        fn emit(&self, message: ClientMessage) {
            let entry = match message {
                ClientMessage::SubscribeDrawing(r) => format!("subscribe {}", r.drawing_id),
                ClientMessage::UnsubscribeDrawing(r) => format!("unsubscribe {}", r.drawing_id),
            };
            self.0.log.lock().unwrap().push(entry);
        }

        fn close(self: Box<Self>) {
            self.0.log.lock().unwrap().push("close".to_string());
            self.0.set_state(ConnectionState::Disconnected);
        }
    }

    fn notifier() -> (DrawingLockNotifier, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let notifier = DrawingLockNotifier::new(Arc::new(FakeConnector(recorder.clone())));
        (notifier, recorder)
    }

    fn collecting_handler(
        name: &'static str,
        seen: &Arc<StdMutex<Vec<(String, DrawingLockEvent)>>>,
    ) -> impl Fn(&DrawingLockEvent) + Send + Sync + 'static {
        let seen = seen.clone();
        move |event: &DrawingLockEvent| seen.lock().unwrap().push((name.to_string(), event.clone()))
    }

    #[tokio::test]
    async fn locked_event_reaches_subscriber() {
        let (notifier, _) = notifier();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        notifier
            .subscribe_drawing("drawing-42", collecting_handler("h", &seen))
            .await
            .unwrap();

        notifier.dispatch(ServerMessage::locked("drawing-42", "alice")).await;

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(
                "h".to_string(),
                DrawingLockEvent::Locked {
                    drawing_id: "drawing-42".to_string(),
                    locked_by: "alice".to_string(),
                }
            )]
        );
    }

    #[tokio::test]
    async fn handlers_run_once_each_in_registration_order() {
        let (notifier, _) = notifier();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            notifier
                .subscribe_drawing("d", collecting_handler(name, &seen))
                .await
                .unwrap();
        }

        notifier.dispatch(ServerMessage::locked("d", "bob")).await;

        let names: Vec<String> = seen.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn handlers_only_see_their_own_drawing() {
        let (notifier, _) = notifier();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        notifier.subscribe_drawing("a", collecting_handler("a", &seen)).await.unwrap();
        notifier.subscribe_drawing("b", collecting_handler("b", &seen)).await.unwrap();

        notifier.dispatch(ServerMessage::unlocked("b")).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "b");
        assert_eq!(
            seen[0].1,
            DrawingLockEvent::Unlocked {
                drawing_id: "b".to_string()
            }
        );
    }

    #[tokio::test]
    async fn events_without_subscribers_are_dropped() {
        let (notifier, _) = notifier();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        notifier.subscribe_drawing("a", collecting_handler("a", &seen)).await.unwrap();

        notifier.dispatch(ServerMessage::locked("nobody", "carol")).await;
        notifier.dispatch(ServerMessage::unlocked("nobody")).await;
        notifier.dispatch(ServerMessage::error("boom")).await;

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_removes_every_handler() {
        let (notifier, recorder) = notifier();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        notifier.subscribe_drawing("drawing-7", collecting_handler("h1", &seen)).await.unwrap();
        notifier.subscribe_drawing("drawing-7", collecting_handler("h2", &seen)).await.unwrap();

        notifier.unsubscribe_drawing("drawing-7").await;
        notifier.dispatch(ServerMessage::unlocked("drawing-7")).await;

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(notifier.subscriber_count("drawing-7").await, 0);
        assert_eq!(recorder.log().last().unwrap(), "unsubscribe drawing-7");
    }

    #[tokio::test]
    async fn unsubscribing_unknown_drawing_sends_nothing() {
        let (notifier, recorder) = notifier();
        notifier.connect().await;

        notifier.unsubscribe_drawing("never-subscribed").await;

        assert_eq!(recorder.log(), vec!["open"]);
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let (notifier, recorder) = notifier();

        notifier.connect().await;
        notifier.connect().await;

        assert_eq!(recorder.opened(), 1);
        assert!(notifier.is_connected().await);
    }

    #[tokio::test]
    async fn connect_replaces_a_connection_that_gave_up() {
        let (notifier, recorder) = notifier();
        notifier.connect().await;
        recorder.set_state(ConnectionState::Disconnected);

        notifier.connect().await;

        assert_eq!(recorder.opened(), 2);
    }

    #[tokio::test]
    async fn subscribe_connects_before_notifying_server() {
        let (notifier, recorder) = notifier();
        assert!(!notifier.is_connected().await);

        notifier.subscribe_drawing("drawing-42", |_| {}).await.unwrap();

        assert_eq!(recorder.log(), vec!["open", "subscribe drawing-42"]);
        assert!(notifier.is_connected().await);
    }

    #[tokio::test]
    async fn subscribe_while_connected_does_not_reconnect() {
        let (notifier, recorder) = notifier();
        notifier.connect().await;

        notifier.subscribe_drawing("d", |_| {}).await.unwrap();
        notifier.subscribe_drawing("d", |_| {}).await.unwrap();

        assert_eq!(recorder.log(), vec!["open", "subscribe d", "subscribe d"]);
    }

    #[tokio::test]
    async fn same_handler_twice_is_called_twice() {
        let (notifier, _) = notifier();
        let calls = Arc::new(StdMutex::new(0));
        let handler: LockHandler = {
            let calls = calls.clone();
            Arc::new(move |_: &DrawingLockEvent| *calls.lock().unwrap() += 1)
        };
        for _ in 0..2 {
            let handler = handler.clone();
            notifier
                .subscribe_drawing("d", move |event: &DrawingLockEvent| handler(event))
                .await
                .unwrap();
        }

        notifier.dispatch(ServerMessage::locked("d", "dave")).await;

        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_drawing_id_is_rejected() {
        let (notifier, recorder) = notifier();

        let result = notifier.subscribe_drawing("  ", |_| {}).await;

        assert!(matches!(result, Err(NotifierError::EmptyDrawingId)));
        assert!(recorder.log().is_empty());
    }

    #[tokio::test]
    async fn disconnect_closes_and_clears_registry() {
        let (notifier, recorder) = notifier();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        notifier.subscribe_drawing("d", collecting_handler("old", &seen)).await.unwrap();

        notifier.disconnect().await;

        assert!(!notifier.is_connected().await);
        assert_eq!(notifier.subscriber_count("d").await, 0);
        assert!(recorder.log().contains(&"close".to_string()));

        notifier.subscribe_drawing("d", collecting_handler("new", &seen)).await.unwrap();
        notifier.dispatch(ServerMessage::locked("d", "erin")).await;

        let names: Vec<String> = seen.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["new"]);
        assert_eq!(recorder.opened(), 2);
    }

    #[tokio::test]
    async fn disconnect_when_disconnected_is_a_noop() {
        let (notifier, recorder) = notifier();

        notifier.disconnect().await;

        assert!(!notifier.is_connected().await);
        assert!(recorder.log().is_empty());
    }

    #[tokio::test]
    async fn transport_messages_are_dispatched_by_the_pump() {
        let (notifier, recorder) = notifier();
        let (tx, mut rx) = mpsc::unbounded_channel();
        notifier
            .subscribe_drawing("drawing-42", move |event: &DrawingLockEvent| {
                let _ = tx.send(event.clone());
            })
            .await
            .unwrap();

        recorder.push(TransportEvent::Connected {
            kind: TransportKind::WebSocket,
            reconnect: false,
        });
        recorder.push(TransportEvent::Message(ServerMessage::locked("drawing-42", "alice")));

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            DrawingLockEvent::Locked {
                drawing_id: "drawing-42".to_string(),
                locked_by: "alice".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn reconnect_resubscribes_registered_drawings() {
        let (notifier, recorder) = notifier();
        notifier.subscribe_drawing("d", |_| {}).await.unwrap();

        recorder.push(TransportEvent::Disconnected {
            reason: "test".to_string(),
        });
        recorder.push(TransportEvent::Connected {
            kind: TransportKind::Polling,
            reconnect: true,
        });

        tokio::time::timeout(Duration::from_secs(1), async {
            while recorder.log().iter().filter(|e| *e == "subscribe d").count() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(recorder.opened(), 1);
    }
}
