//! Connection manager for the tutor WebSocket link.
//!
//! Owns the single physical socket: connect, open/error/close handling,
//! fixed-interval reconnect with an attempt cap, and outbound sends gated on
//! the socket being open.
//!
//! Every state transition happens under one mutex. Socket events for a given
//! socket are handled in order by that socket's driver task; events from a
//! socket that has already been discarded never change state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use socrates_protocol::{MessagePayload, OutboundMessage};
use tokio::sync::{mpsc, oneshot};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::messaging::{
    ClientEvent, ConnectionState, EventData, EventRegistry, FaultKind, MessageRouter,
};

use super::core::FixedBackoff;
use super::transport::{Connector, SocketCommand, SocketEvent, SocketLink};

type ReadySender = oneshot::Sender<Result<(), ClientError>>;

/// The live socket, replaced wholesale on every (re)connect.
struct SocketHandle {
    generation: u64,
    commands: mpsc::UnboundedSender<SocketCommand>,
}

struct ConnectionInner {
    state: ConnectionState,
    socket: Option<SocketHandle>,
    backoff: FixedBackoff,
    /// Cleared by `disconnect()`; gates scheduled reconnects
    should_reconnect: bool,
    generation: u64,
}

impl ConnectionInner {
    fn is_current(&self, generation: u64) -> bool {
        self.socket
            .as_ref()
            .is_some_and(|socket| socket.generation == generation)
    }
}

/// What to do after the current socket closed.
enum AfterClose {
    Idle,
    Reconnect {
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },
    Exhausted,
}

#[derive(Clone)]
pub struct ConnectionManager {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    registry: EventRegistry,
    router: MessageRouter,
    inner: Arc<Mutex<ConnectionInner>>,
}

impl ConnectionManager {
    pub fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        registry: EventRegistry,
    ) -> Self {
        let backoff = FixedBackoff::from_config(&config);
        Self {
            router: MessageRouter::new(registry.clone()),
            registry,
            connector,
            inner: Arc::new(Mutex::new(ConnectionInner {
                state: ConnectionState::Closed,
                socket: None,
                backoff,
                should_reconnect: true,
                generation: 0,
            })),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Reconnect attempts made since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.lock().backoff.attempts()
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the connection.
    ///
    /// Resolves immediately if a socket is already connecting or open.
    /// Otherwise re-arms auto-reconnect with a fresh attempt budget and
    /// resolves once the new socket opens or fails.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let ready = {
            let mut inner = self.lock();
            if inner.state.is_live() {
                tracing::debug!("connect() ignored, connection already {}", inner.state);
                return Ok(());
            }
            inner.should_reconnect = true;
            inner.backoff.reset();
            self.open_socket(&mut inner)
        };

        ready
            .await
            .unwrap_or(Err(ClientError::ConnectionInterrupted))
    }

    /// Close the connection and stop auto-reconnect.
    ///
    /// A reconnect that is already scheduled will find the flag cleared and
    /// do nothing.
    pub fn disconnect(&self) {
        let mut inner = self.lock();
        inner.should_reconnect = false;
        if let Some(socket) = inner.socket.take() {
            tracing::info!("Disconnecting from {}", self.config.url);
            let _ = socket.commands.send(SocketCommand::Close);
        }
        inner.state = ConnectionState::Closed;
    }

    /// Send one envelope.
    ///
    /// Returns true if the frame was handed to an open socket. There is no
    /// acknowledgement, so true does not mean the server received it.
    pub fn send(&self, kind: &str, payload: impl Into<MessagePayload>) -> bool {
        let inner = self.lock();
        let socket = match (&inner.socket, inner.state) {
            (Some(socket), ConnectionState::Open) => socket,
            _ => {
                tracing::error!(
                    kind,
                    state = %inner.state,
                    "WebSocket not connected, cannot send message"
                );
                return false;
            }
        };

        let frame = match OutboundMessage::new(kind, payload).and_then(|msg| msg.to_json()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to serialize WebSocket message: {}", e);
                return false;
            }
        };

        tracing::debug!(kind, "Sending message");
        if socket.commands.send(SocketCommand::Text(frame)).is_err() {
            tracing::error!("Failed to send message: socket task has stopped");
            return false;
        }
        true
    }

    /// Create a new socket and its driver task. Caller holds the lock.
    fn open_socket(
        &self,
        inner: &mut ConnectionInner,
    ) -> oneshot::Receiver<Result<(), ClientError>> {
        inner.generation += 1;
        let generation = inner.generation;

        tracing::info!(generation, "Connecting to {}", self.config.url);
        let SocketLink { commands, events } = self.connector.open(&self.config.url);
        inner.socket = Some(SocketHandle {
            generation,
            commands,
        });
        inner.state = ConnectionState::Connecting;

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(self.clone().drive(generation, events, ready_tx));
        ready_rx
    }

    /// Forward one socket's events into the state machine, in order.
    async fn drive(
        self,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<SocketEvent>,
        ready: ReadySender,
    ) {
        let mut ready = Some(ready);

        while let Some(event) = events.recv().await {
            match event {
                SocketEvent::Open => {
                    let outcome = if self.handle_open(generation) {
                        Ok(())
                    } else {
                        Err(ClientError::ConnectionInterrupted)
                    };
                    if let Some(tx) = ready.take() {
                        let _ = tx.send(outcome);
                    }
                }
                SocketEvent::Message(text) => self.handle_message(generation, &text),
                SocketEvent::Error(cause) => {
                    self.handle_error(generation, &cause);
                    if let Some(tx) = ready.take() {
                        let _ = tx.send(Err(ClientError::Connection(cause)));
                    }
                }
                SocketEvent::Closing => self.handle_closing(generation),
                SocketEvent::Closed => break,
            }
        }

        // Reached on `Closed` or when the socket side went away without one
        self.handle_close(generation);
    }

    fn handle_open(&self, generation: u64) -> bool {
        {
            let mut inner = self.lock();
            if !inner.is_current(generation) {
                tracing::debug!(generation, "Ignoring open from discarded socket");
                return false;
            }
            inner.state = ConnectionState::Open;
            inner.backoff.reset();
        }

        tracing::info!("Connected to {}", self.config.url);
        self.registry.emit(ClientEvent::Open, &EventData::None);
        true
    }

    fn handle_message(&self, generation: u64, text: &str) {
        let current = self.lock().is_current(generation);
        if !current {
            tracing::debug!(generation, "Dropping frame from discarded socket");
            return;
        }
        self.router.route_text(text);
    }

    fn handle_error(&self, generation: u64, cause: &str) {
        let current = self.lock().is_current(generation);
        if !current {
            return;
        }
        tracing::error!("WebSocket error: {}", cause);
        self.registry.emit(
            ClientEvent::Error,
            &EventData::fault(FaultKind::ConnectionError, cause),
        );
    }

    fn handle_closing(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.is_current(generation) && inner.state == ConnectionState::Open {
            inner.state = ConnectionState::Closing;
        }
    }

    fn handle_close(&self, generation: u64) {
        let after = {
            let mut inner = self.lock();
            if !inner.is_current(generation) {
                // Already discarded by disconnect(); nothing to schedule
                AfterClose::Idle
            } else {
                inner.socket = None;
                inner.state = ConnectionState::Closed;
                if !inner.should_reconnect {
                    AfterClose::Idle
                } else {
                    match inner.backoff.next_delay_and_advance() {
                        Some(delay) => AfterClose::Reconnect {
                            attempt: inner.backoff.attempts(),
                            max_attempts: inner.backoff.max_attempts(),
                            delay,
                        },
                        None => AfterClose::Exhausted,
                    }
                }
            }
        };

        tracing::info!(generation, "WebSocket connection closed");
        self.registry.emit(ClientEvent::Close, &EventData::None);

        match after {
            AfterClose::Idle => {}
            AfterClose::Reconnect {
                attempt,
                max_attempts,
                delay,
            } => {
                tracing::info!(
                    "Reconnection attempt {} of {}, waiting {}ms",
                    attempt,
                    max_attempts,
                    delay.as_millis()
                );
                self.schedule_reconnect(generation, delay);
            }
            AfterClose::Exhausted => {
                tracing::error!("Max reconnection attempts reached, giving up");
                self.registry
                    .emit(ClientEvent::MaxReconnectReached, &EventData::None);
            }
        }
    }

    /// Reconnect after `delay`, on behalf of the socket `closed` that just
    /// went away.
    fn schedule_reconnect(&self, closed: u64, delay: Duration) {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.reconnect(closed);
        });
    }

    fn reconnect(&self, closed: u64) {
        let mut inner = self.lock();
        // A newer socket was opened since; its own close owns the next retry
        if inner.generation != closed {
            tracing::debug!(
                closed,
                current = inner.generation,
                "Dropping stale reconnect timer"
            );
            return;
        }
        if !inner.should_reconnect {
            tracing::info!("Reconnection cancelled - intentional disconnect");
            return;
        }
        if inner.state.is_live() {
            tracing::debug!("Reconnection skipped, connection already {}", inner.state);
            return;
        }
        // The outcome is reported through events; nobody awaits it here
        drop(self.open_socket(&mut inner));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::listener;
    use crate::websocket::transport::{socket_channel, MockConnector, SocketEndpoint};

    const INTERVAL: Duration = Duration::from_millis(3000);

    struct Harness {
        manager: ConnectionManager,
        sockets: Arc<Mutex<Vec<SocketEndpoint>>>,
        events: Arc<Mutex<Vec<(ClientEvent, EventData)>>>,
    }

    impl Harness {
        fn new(config: ClientConfig) -> Self {
            let sockets = Arc::new(Mutex::new(Vec::new()));
            let mut connector = MockConnector::new();
            let sockets_clone = Arc::clone(&sockets);
            connector.expect_open().returning(move |_| {
                let (link, endpoint) = socket_channel();
                sockets_clone.lock().expect("sockets lock").push(endpoint);
                link
            });

            let registry = EventRegistry::new();
            let events = Arc::new(Mutex::new(Vec::new()));
            for event in ClientEvent::ALL {
                let events = Arc::clone(&events);
                registry.on(
                    event,
                    listener(move |data| {
                        events.lock().expect("events lock").push((event, data.clone()))
                    }),
                );
            }

            Self {
                manager: ConnectionManager::new(config, Arc::new(connector), registry),
                sockets,
                events,
            }
        }

        fn socket_count(&self) -> usize {
            self.sockets.lock().expect("sockets lock").len()
        }

        /// Push an event from the socket side of socket `index`.
        fn push(&self, index: usize, event: SocketEvent) {
            let sockets = self.sockets.lock().expect("sockets lock");
            sockets[index].events.send(event).expect("driver alive");
        }

        fn next_command(&self, index: usize) -> Option<SocketCommand> {
            let mut sockets = self.sockets.lock().expect("sockets lock");
            sockets[index].commands.try_recv().ok()
        }

        fn event_names(&self) -> Vec<ClientEvent> {
            self.events
                .lock()
                .expect("events lock")
                .iter()
                .map(|(event, _)| *event)
                .collect()
        }

        fn count(&self, wanted: ClientEvent) -> usize {
            self.event_names().into_iter().filter(|e| *e == wanted).count()
        }

        fn spawn_connect(&self) -> tokio::task::JoinHandle<Result<(), ClientError>> {
            let manager = self.manager.clone();
            tokio::spawn(async move { manager.connect().await })
        }
    }

    fn config(max_attempts: u32) -> ClientConfig {
        ClientConfig::default()
            .with_reconnect_interval(INTERVAL)
            .with_max_reconnect_attempts(max_attempts)
    }

    /// Let spawned driver and timer tasks run.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_while_connecting_creates_one_socket() {
        let h = Harness::new(config(5));

        let first = h.spawn_connect();
        settle().await;
        assert_eq!(h.manager.state(), ConnectionState::Connecting);
        assert_eq!(h.socket_count(), 1);

        h.manager.connect().await.expect("second connect is a no-op");
        assert_eq!(h.socket_count(), 1);

        h.push(0, SocketEvent::Open);
        settle().await;
        first.await.expect("join").expect("connect succeeds");

        assert_eq!(h.manager.state(), ConnectionState::Open);
        assert!(h.manager.is_connected());
        assert_eq!(h.event_names(), vec![ClientEvent::Open]);

        // Also a no-op once open
        h.manager.connect().await.expect("connect while open");
        assert_eq!(h.socket_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_fails_with_connection_error() {
        let h = Harness::new(config(5));

        let pending = h.spawn_connect();
        settle().await;
        h.push(0, SocketEvent::Error("connection refused".to_string()));
        h.push(0, SocketEvent::Closed);
        settle().await;

        let err = pending.await.expect("join").expect_err("connect fails");
        assert!(matches!(err, ClientError::Connection(cause) if cause == "connection refused"));

        let events = h.events.lock().expect("events lock").clone();
        assert_eq!(events[0].0, ClientEvent::Error);
        let fault = events[0].1.as_fault().expect("fault");
        assert_eq!(fault.kind, FaultKind::ConnectionError);
        assert_eq!(events[1].0, ClientEvent::Close);
        assert_eq!(h.manager.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_schedules_one_reconnect_after_interval() {
        let h = Harness::new(config(5));

        let pending = h.spawn_connect();
        settle().await;
        h.push(0, SocketEvent::Open);
        settle().await;
        pending.await.expect("join").expect("connect");

        h.push(0, SocketEvent::Closed);
        settle().await;
        assert_eq!(h.manager.state(), ConnectionState::Closed);
        assert_eq!(h.manager.reconnect_attempts(), 1);
        assert_eq!(h.socket_count(), 1);

        tokio::time::advance(INTERVAL - Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(h.socket_count(), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(h.socket_count(), 2);
        assert_eq!(h.manager.state(), ConnectionState::Connecting);

        // Nothing else was scheduled
        tokio::time::advance(INTERVAL * 3).await;
        settle().await;
        assert_eq!(h.socket_count(), 2);

        h.push(1, SocketEvent::Open);
        settle().await;
        assert_eq!(h.manager.state(), ConnectionState::Open);
        assert_eq!(h.manager.reconnect_attempts(), 0);
        assert_eq!(
            h.event_names(),
            vec![ClientEvent::Open, ClientEvent::Close, ClientEvent::Open]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_capped_and_exhaustion_fires_once() {
        let max_attempts = 3;
        let h = Harness::new(config(max_attempts));

        let _pending = h.spawn_connect();
        settle().await;

        for socket in 0..=max_attempts as usize {
            assert_eq!(h.socket_count(), socket + 1);
            h.push(socket, SocketEvent::Error("unreachable".to_string()));
            h.push(socket, SocketEvent::Closed);
            settle().await;

            let expected_attempts = (socket as u32 + 1).min(max_attempts);
            assert_eq!(h.manager.reconnect_attempts(), expected_attempts);

            tokio::time::advance(INTERVAL).await;
            settle().await;
        }

        assert_eq!(h.socket_count(), max_attempts as usize + 1);
        assert_eq!(h.count(ClientEvent::MaxReconnectReached), 1);
        assert_eq!(h.count(ClientEvent::Close), max_attempts as usize + 1);

        tokio::time::advance(INTERVAL * 10).await;
        settle().await;
        assert_eq!(h.socket_count(), max_attempts as usize + 1);
        assert_eq!(h.count(ClientEvent::MaxReconnectReached), 1);
        assert_eq!(h.manager.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_connect_after_exhaustion_restores_budget() {
        let h = Harness::new(config(1));

        let _pending = h.spawn_connect();
        settle().await;
        h.push(0, SocketEvent::Closed);
        settle().await;
        tokio::time::advance(INTERVAL).await;
        settle().await;
        h.push(1, SocketEvent::Closed);
        settle().await;
        assert_eq!(h.count(ClientEvent::MaxReconnectReached), 1);

        let _pending = h.spawn_connect();
        settle().await;
        assert_eq!(h.socket_count(), 3);
        assert_eq!(h.manager.reconnect_attempts(), 0);

        h.push(2, SocketEvent::Closed);
        settle().await;
        assert_eq!(h.manager.reconnect_attempts(), 1);
        tokio::time::advance(INTERVAL).await;
        settle().await;
        assert_eq!(h.socket_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let h = Harness::new(config(5));

        let pending = h.spawn_connect();
        settle().await;
        h.push(0, SocketEvent::Open);
        settle().await;
        pending.await.expect("join").expect("connect");

        h.push(0, SocketEvent::Closed);
        settle().await;
        assert_eq!(h.manager.reconnect_attempts(), 1);

        h.manager.disconnect();
        tokio::time::advance(INTERVAL * 2).await;
        settle().await;

        assert_eq!(h.socket_count(), 1);
        assert_eq!(h.manager.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_timer_from_replaced_socket_is_dropped() {
        let h = Harness::new(config(5));

        let pending = h.spawn_connect();
        settle().await;
        h.push(0, SocketEvent::Open);
        settle().await;
        pending.await.expect("join").expect("connect");

        // First close at t=0 schedules a retry for t=3000
        h.push(0, SocketEvent::Closed);
        settle().await;

        tokio::time::advance(Duration::from_millis(1000)).await;
        h.manager.disconnect();
        let _pending = h.spawn_connect();
        settle().await;
        assert_eq!(h.socket_count(), 2);

        // The new socket fails at t=1000, its retry is due at t=4000
        h.push(1, SocketEvent::Closed);
        settle().await;
        assert_eq!(h.manager.reconnect_attempts(), 1);

        tokio::time::advance(Duration::from_millis(2000)).await;
        settle().await;
        assert_eq!(h.socket_count(), 2);

        tokio::time::advance(Duration::from_millis(1000)).await;
        settle().await;
        assert_eq!(h.socket_count(), 3);
        assert_eq!(h.manager.reconnect_attempts(), 1);

        tokio::time::advance(INTERVAL * 3).await;
        settle().await;
        assert_eq!(h.socket_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_closes_socket_without_reconnect() {
        let h = Harness::new(config(5));

        let pending = h.spawn_connect();
        settle().await;
        h.push(0, SocketEvent::Open);
        settle().await;
        pending.await.expect("join").expect("connect");

        h.manager.disconnect();
        assert_eq!(h.manager.state(), ConnectionState::Closed);
        assert_eq!(h.next_command(0), Some(SocketCommand::Close));

        h.push(0, SocketEvent::Closed);
        settle().await;
        tokio::time::advance(INTERVAL * 2).await;
        settle().await;

        assert_eq!(h.socket_count(), 1);
        assert_eq!(h.event_names(), vec![ClientEvent::Open, ClientEvent::Close]);
        assert_eq!(h.count(ClientEvent::MaxReconnectReached), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_while_connecting_interrupts_connect() {
        let h = Harness::new(config(5));

        let pending = h.spawn_connect();
        settle().await;
        h.manager.disconnect();

        // The socket finishes its handshake after being discarded
        h.push(0, SocketEvent::Open);
        settle().await;

        let err = pending.await.expect("join").expect_err("interrupted");
        assert!(matches!(err, ClientError::ConnectionInterrupted));
        assert_eq!(h.manager.state(), ConnectionState::Closed);
        assert_eq!(h.count(ClientEvent::Open), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_open_socket() {
        let h = Harness::new(config(5));
        assert!(!h.manager.send("chat", "too early"));

        let pending = h.spawn_connect();
        settle().await;
        assert!(!h.manager.send("chat", "still connecting"));
        assert_eq!(h.next_command(0), None);

        h.push(0, SocketEvent::Open);
        settle().await;
        pending.await.expect("join").expect("connect");

        assert!(h.manager.send("chat", "hello"));
        let Some(SocketCommand::Text(frame)) = h.next_command(0) else {
            panic!("expected a text frame");
        };
        let wire: serde_json::Value = serde_json::from_str(&frame).expect("json frame");
        assert_eq!(wire, serde_json::json!({"type": "chat", "message": "hello"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_frames_are_routed() {
        let h = Harness::new(config(5));

        let pending = h.spawn_connect();
        settle().await;
        h.push(0, SocketEvent::Open);
        h.push(
            0,
            SocketEvent::Message(r#"{"type":"system","message":"welcome"}"#.to_string()),
        );
        h.push(0, SocketEvent::Message("garbage".to_string()));
        h.push(0, SocketEvent::Message(r#"{"type":"quiz","q":1}"#.to_string()));
        settle().await;
        pending.await.expect("join").expect("connect");

        assert_eq!(
            h.event_names(),
            vec![
                ClientEvent::Open,
                ClientEvent::System,
                ClientEvent::Error,
                ClientEvent::Message,
            ]
        );
        let events = h.events.lock().expect("events lock");
        assert_eq!(
            events[2].1.as_fault().map(|f| f.kind),
            Some(FaultKind::ParseError)
        );
        assert_eq!(h.manager.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_handshake_passes_through_closing() {
        let h = Harness::new(config(0));

        let pending = h.spawn_connect();
        settle().await;
        h.push(0, SocketEvent::Open);
        settle().await;
        pending.await.expect("join").expect("connect");

        h.push(0, SocketEvent::Closing);
        settle().await;
        assert_eq!(h.manager.state(), ConnectionState::Closing);
        assert!(!h.manager.send("chat", "during close"));

        h.push(0, SocketEvent::Closed);
        settle().await;
        assert_eq!(h.manager.state(), ConnectionState::Closed);
        // Zero attempts allowed: exhausted straight away
        assert_eq!(h.count(ClientEvent::MaxReconnectReached), 1);
    }
}
