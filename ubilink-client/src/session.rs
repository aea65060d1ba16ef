//! The device session: connection lifecycle, subscriptions, publishing,
//! keep-alive and event dispatch on top of a [`ProtocolEngine`].

use std::fmt::Write;
use std::time::Duration;

use bytes::Bytes;
use tracing::{info, warn};
use ubilink_core::{qos::QoS, return_code::ConnectReturnCode};

use crate::countdown::{Delay, TokioDelay};
use crate::engine::{MqttEngine, ProtocolEngine};
use crate::error::{EngineError, Result, SessionError};
use crate::event::{EventDispatch, EventKind};
use crate::message::{Message, MessageHandler};
use crate::options::{ConnectOptions, SessionConfig, DEFAULT_TRANSPORT_TIMEOUT};
use crate::subscription::{self, Subscription, SubscriptionTable, Topic};
use crate::transport::{NetTransport, Transport};

/// Attempts per connection stage before giving up.
pub const MAX_RETRIES: u8 = 3;
/// Pause after every failed attempt.
pub const RETRY_DELAY_MS: u64 = 5000;
pub const MSG_MAX_LEN: usize = 1000;

const SERVICE_YIELD: Duration = Duration::from_millis(100);
const LIVENESS_YIELD: Duration = Duration::from_millis(10);

pub type Payload = heapless::String<MSG_MAX_LEN>;

/// Render `{"<variable>": <value>}` with two decimals.
///
/// ```
/// use ubilink_client::format_payload;
///
/// assert_eq!(format_payload("demo", 2.0).unwrap(), "{\"demo\": 2.00}");
/// ```
pub fn format_payload(variable: &str, value: f32) -> Result<Payload> {
    let mut payload = Payload::new();

    write!(payload, "{{\"{}\": {:.2}}}", variable, value)
        .map_err(|_| SessionError::InvalidArgument)?;

    Ok(payload)
}

/// A single device session with the broker.
///
/// The transport variant is chosen once, at construction. Nothing runs in the
/// background: the application is expected to poll [`Session::is_connected`],
/// call [`Session::connect`] while it is false, and otherwise publish and
/// call [`Session::keep_alive`] periodically.
pub struct Session<E, D = TokioDelay> {
    engine: E,
    delay: D,
    config: SessionConfig,
    connect_options: ConnectOptions,
    base_topic: Topic,
    connected: bool,
    retries: u8,
    subscriptions: SubscriptionTable,
    events: EventDispatch,
}

impl Session<MqttEngine<NetTransport>> {
    /// Build a session over TCP, or TLS when the config asks for encryption.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let transport = if config.is_encrypted() {
            NetTransport::tls(config.tls_options().clone())
        } else {
            NetTransport::plain()
        };

        Self::with_engine(config, MqttEngine::new(transport), TokioDelay)
    }
}

impl<E: ProtocolEngine, D: Delay> Session<E, D> {
    pub fn with_engine(config: SessionConfig, engine: E, delay: D) -> Result<Self> {
        let base_topic = subscription::base_topic(config.device_id())?;
        let connect_options = ConnectOptions::from(&config);

        if config.logging_enabled() {
            info!(
                device = config.device_id(),
                encrypted = config.is_encrypted(),
                "Session created"
            );
        }

        Ok(Self {
            engine,
            delay,
            config,
            connect_options,
            base_topic,
            connected: false,
            retries: 0,
            subscriptions: SubscriptionTable::default(),
            events: EventDispatch::default(),
        })
    }

    fn logging(&self) -> bool {
        self.config.logging_enabled()
    }

    /// Replace the callback for `kind`.
    pub fn register_callback<F>(&mut self, kind: EventKind, callback: F)
    where
        F: FnMut(Option<SessionError>) + Send + 'static,
    {
        self.events.register(kind, Box::new(callback));
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn device_name(&self) -> &str {
        self.config.device_id()
    }

    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    pub fn subscriptions(&self) -> &SubscriptionTable {
        &self.subscriptions
    }

    /// Attempts made so far in the connection stage in progress.
    pub fn retries(&self) -> u8 {
        self.retries
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Open the transport and perform the MQTT handshake, each with bounded retries.
    ///
    /// Every failure is also reported to the [`EventKind::Error`] callback.
    pub async fn connect(&mut self) -> Result<()> {
        match self.establish().await {
            Ok(()) => {
                self.connected = true;
                if self.logging() {
                    info!("Broker session established");
                }
                self.events.dispatch(EventKind::Connected, None);
                Ok(())
            }
            Err(err) => {
                if self.logging() {
                    warn!("Connect failed: {}", err);
                }
                self.events.dispatch(EventKind::Error, Some(err));
                Err(err)
            }
        }
    }

    async fn establish(&mut self) -> Result<()> {
        if self.connected {
            return Err(SessionError::AlreadyConnected);
        }

        // A handle left over from a dropped session must be released with reset().
        if self.engine.transport().is_open() {
            return Err(SessionError::SocketNotAvailable);
        }

        if let Err(err) = self.open_transport().await {
            self.engine.transport_mut().disconnect().await;
            return Err(err);
        }

        if let Err(err) = self.handshake().await {
            self.engine.transport_mut().disconnect().await;
            return Err(err);
        }

        Ok(())
    }

    async fn open_transport(&mut self) -> Result<()> {
        let port = self.config.port();
        self.retries = 0;

        let result = loop {
            self.retries += 1;

            let attempt = self
                .engine
                .transport_mut()
                .connect(&self.config.host, port, DEFAULT_TRANSPORT_TIMEOUT)
                .await;

            match attempt {
                Ok(()) => break Ok(()),
                Err(e) => {
                    if self.config.logging {
                        warn!(
                            attempt = self.retries,
                            "Error connecting socket, retrying in {} ms: {}",
                            RETRY_DELAY_MS,
                            e
                        );
                    }
                    self.delay.delay_ms(RETRY_DELAY_MS).await;

                    if self.retries >= MAX_RETRIES {
                        break Err(SessionError::SocketError);
                    }
                }
            }
        };

        self.retries = 0;

        if result.is_ok() && self.logging() {
            info!(
                host = %self.config.host,
                port,
                "{} socket connected",
                if self.config.is_encrypted() { "TLS" } else { "TCP" }
            );
        }

        result
    }

    async fn handshake(&mut self) -> Result<()> {
        self.retries = 0;

        let result = loop {
            self.retries += 1;

            match self.engine.connect(&self.connect_options).await {
                Ok(()) => break Ok(()),
                Err(e) => {
                    if self.config.logging {
                        warn!(
                            attempt = self.retries,
                            "Error connecting to broker, retrying in {} ms: {}",
                            RETRY_DELAY_MS,
                            e
                        );
                    }
                    self.delay.delay_ms(RETRY_DELAY_MS).await;

                    if matches!(e, EngineError::Refused(ConnectReturnCode::NotAuthorized)) {
                        break Err(SessionError::NotAuthorized);
                    }

                    if self.retries >= MAX_RETRIES {
                        break Err(SessionError::ProtocolSocketError);
                    }
                }
            }
        };

        self.retries = 0;
        result
    }

    /// Subscribe to `<base_topic>/<variable>/lv`, routing updates to `handler`.
    pub async fn subscribe(&mut self, variable: &str, handler: MessageHandler) -> Result<()> {
        let topic = subscription::subscribe_topic(&self.base_topic, variable)?;

        if self.subscriptions.is_full() {
            if self.logging() {
                warn!(%topic, "No subscription slots left");
            }
            return Err(SessionError::CapacityExceeded);
        }

        if let Err(e) = self
            .engine
            .subscribe(&topic, QoS::AtMostOnce, Some(handler))
            .await
        {
            if self.logging() {
                warn!(%topic, "Subscribe failed: {}", e);
            }
            return Err(SessionError::SubscribeError);
        }

        if self.logging() {
            info!(%topic, "Subscribed");
        }

        self.subscriptions.push(Subscription::new(topic, handler))?;
        self.events.dispatch(EventKind::Subscribed, None);

        Ok(())
    }

    /// Publish `{"<variable>": <value>}` to the base topic.
    pub async fn publish(&mut self, variable: &str, value: f32) -> Result<()> {
        if variable.is_empty() {
            return Err(SessionError::InvalidArgument);
        }

        let payload = format_payload(variable, value)?;

        if !self.connected {
            return Err(SessionError::NotConnected);
        }

        let message = Message {
            qos: QoS::AtMostOnce,
            retained: false,
            dup: false,
            id: 0,
            payload: Bytes::copy_from_slice(payload.as_bytes()),
        };

        match self.engine.publish(&self.base_topic, &message).await {
            Ok(()) => {
                if self.logging() {
                    info!(topic = %self.base_topic, %payload, "Published");
                }
                self.events.dispatch(EventKind::Published, None);
                Ok(())
            }
            Err(e) => {
                if self.logging() {
                    warn!(topic = %self.base_topic, "Publish failed: {}", e);
                }
                self.events
                    .dispatch(EventKind::Error, Some(SessionError::PublishError));
                Err(SessionError::PublishError)
            }
        }
    }

    /// Service inbound messages and check that the session is still alive.
    ///
    /// Returns [`SessionError::NotConnected`] without touching the transport
    /// when the engine has no session, and [`SessionError::ConnectionLost`]
    /// after tearing everything down when the liveness check fails.
    pub async fn keep_alive(&mut self) -> Result<()> {
        if self.engine.is_connected() {
            // Only services pending traffic; liveness is judged by the second yield.
            if let Err(e) = self.engine.yield_for(SERVICE_YIELD).await {
                if self.logging() {
                    warn!("Yield failed: {}", e);
                }
            }
        }

        if !self.engine.is_connected() {
            self.connected = false;
            return Err(SessionError::NotConnected);
        }

        if let Err(e) = self.engine.yield_for(LIVENESS_YIELD).await {
            if self.logging() {
                warn!("Connection lost: {}", e);
            }

            self.connected = false;
            self.events.dispatch(EventKind::Disconnected, None);
            self.engine.disconnect().await;
            self.engine.transport_mut().disconnect().await;

            return Err(SessionError::ConnectionLost);
        }

        Ok(())
    }

    /// Tear down the MQTT session and release the transport handle.
    pub async fn reset(&mut self) {
        self.engine.disconnect().await;
        self.engine.transport_mut().disconnect().await;
        self.connected = false;
        self.retries = 0;

        if self.logging() {
            info!("Session reset");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::TransportError;
    use crate::message::MessageData;
    use crate::testing::ScriptedTransport;

    #[derive(Default)]
    struct FakeEngine {
        transport: ScriptedTransport,
        connected: bool,
        connect_results: VecDeque<std::result::Result<(), EngineError>>,
        connect_calls: usize,
        subscribed: Vec<String>,
        fail_subscribe: bool,
        published: Vec<(String, Message)>,
        fail_publish: bool,
        yield_results: VecDeque<std::result::Result<(), EngineError>>,
        yields: Vec<Duration>,
        disconnect_calls: usize,
    }

    impl ProtocolEngine for FakeEngine {
        type Transport = ScriptedTransport;

        fn transport(&self) -> &ScriptedTransport {
            &self.transport
        }

        fn transport_mut(&mut self) -> &mut ScriptedTransport {
            &mut self.transport
        }

        async fn connect(
            &mut self,
            _options: &ConnectOptions,
        ) -> std::result::Result<(), EngineError> {
            self.connect_calls += 1;
            self.connect_results.pop_front().unwrap_or(Ok(()))?;
            self.connected = true;
            Ok(())
        }

        async fn subscribe(
            &mut self,
            topic_filter: &str,
            _qos: QoS,
            _handler: Option<MessageHandler>,
        ) -> std::result::Result<(), EngineError> {
            self.subscribed.push(topic_filter.to_string());

            if !self.connected {
                return Err(EngineError::NotConnected);
            }

            if self.fail_subscribe {
                return Err(EngineError::SubscribeRejected);
            }

            Ok(())
        }

        async fn publish(
            &mut self,
            topic: &str,
            message: &Message,
        ) -> std::result::Result<(), EngineError> {
            if self.fail_publish {
                return Err(EngineError::Transport(TransportError::Closed));
            }

            self.published.push((topic.to_string(), message.clone()));
            Ok(())
        }

        async fn yield_for(&mut self, budget: Duration) -> std::result::Result<(), EngineError> {
            self.yields.push(budget);

            let result = self.yield_results.pop_front().unwrap_or(Ok(()));
            if result.is_err() {
                self.connected = false;
            }

            result
        }

        async fn disconnect(&mut self) {
            self.disconnect_calls += 1;
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    #[derive(Default)]
    struct RecordingDelay {
        sleeps: Vec<u64>,
    }

    impl Delay for RecordingDelay {
        async fn delay_ms(&mut self, ms: u64) {
            self.sleeps.push(ms);
        }
    }

    type Events = Arc<Mutex<Vec<(EventKind, Option<SessionError>)>>>;

    fn session() -> (Session<FakeEngine, RecordingDelay>, Events) {
        let config = SessionConfig::new("BBFF-token", "D1").logging(false);
        let mut session =
            Session::with_engine(config, FakeEngine::default(), RecordingDelay::default())
                .expect("valid config");

        let events: Events = Arc::new(Mutex::new(Vec::new()));
        for kind in [
            EventKind::Connected,
            EventKind::Disconnected,
            EventKind::Subscribed,
            EventKind::Published,
            EventKind::Error,
        ] {
            let sink = events.clone();
            session.register_callback(kind, move |status| {
                sink.lock().unwrap().push((kind, status));
            });
        }

        (session, events)
    }

    async fn connected_session() -> (Session<FakeEngine, RecordingDelay>, Events) {
        let (mut session, events) = session();
        session.connect().await.expect("connect");
        events.lock().unwrap().clear();
        (session, events)
    }

    fn count(events: &Events, kind: EventKind) -> usize {
        events
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    fn ignore(_: &MessageData<'_>) {}

    #[test]
    fn test_payload_format() {
        assert_eq!(format_payload("demo", 2.0).unwrap(), "{\"demo\": 2.00}");
        assert_eq!(format_payload("demo", 2.345).unwrap(), "{\"demo\": 2.35}");
        assert_eq!(format_payload("demo", 2.344).unwrap(), "{\"demo\": 2.34}");
        assert_eq!(format_payload("t", -0.5).unwrap(), "{\"t\": -0.50}");
    }

    #[test]
    fn test_payload_overflow() {
        let variable = "v".repeat(MSG_MAX_LEN);

        assert_eq!(
            format_payload(&variable, 1.0),
            Err(SessionError::InvalidArgument)
        );
    }

    #[test]
    fn test_identity() {
        let (session, _) = session();

        assert_eq!(session.device_name(), "D1");
        assert_eq!(session.base_topic(), "/v1.6/devices/D1");
        assert_eq!(session.config().port(), 1883);
        assert!(!session.is_connected());
        assert!(session.subscriptions().is_empty());
        assert_eq!(session.retries(), 0);
    }

    #[test]
    fn test_connect_options_for_empty_device() {
        let config = SessionConfig::new("BBFF-token", "");
        let session =
            Session::with_engine(config, FakeEngine::default(), RecordingDelay::default())
                .unwrap();

        assert_eq!(session.connect_options.client_id, "ubilink");
        assert_eq!(session.base_topic(), "/v1.6/devices/");
    }

    #[tokio::test]
    async fn test_connect_success() {
        let (mut session, events) = session();

        session.connect().await.unwrap();

        assert!(session.is_connected());
        assert_eq!(session.engine.transport.connect_calls, 1);
        assert_eq!(
            session.engine.transport.connect_timeout,
            Some(DEFAULT_TRANSPORT_TIMEOUT)
        );
        assert_eq!(session.engine.connect_calls, 1);
        assert!(session.delay.sleeps.is_empty());
        assert_eq!(session.retries(), 0);
        assert_eq!(
            *events.lock().unwrap(),
            vec![(EventKind::Connected, None)]
        );
    }

    #[tokio::test]
    async fn test_connect_when_already_connected() {
        let (mut session, events) = connected_session().await;

        assert_eq!(session.connect().await, Err(SessionError::AlreadyConnected));

        assert_eq!(session.engine.transport.connect_calls, 1);
        assert_eq!(session.engine.transport.disconnect_calls, 0);
        assert_eq!(session.engine.connect_calls, 1);
        assert_eq!(
            *events.lock().unwrap(),
            vec![(EventKind::Error, Some(SessionError::AlreadyConnected))]
        );
    }

    #[tokio::test]
    async fn test_connect_with_stale_socket_then_reset() {
        let (mut session, events) = session();
        session.engine.transport.open = true;

        assert_eq!(
            session.connect().await,
            Err(SessionError::SocketNotAvailable)
        );
        assert_eq!(session.engine.transport.connect_calls, 0);
        assert_eq!(
            *events.lock().unwrap(),
            vec![(EventKind::Error, Some(SessionError::SocketNotAvailable))]
        );

        session.reset().await;
        assert!(!session.engine.transport.is_open());

        session.connect().await.unwrap();
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_transport_retries_exhausted() {
        let (mut session, events) = session();
        session.engine.transport.failing_connects = 5;

        assert_eq!(session.connect().await, Err(SessionError::SocketError));

        assert_eq!(
            session.engine.transport.connect_calls,
            MAX_RETRIES as usize
        );
        assert_eq!(session.delay.sleeps, vec![RETRY_DELAY_MS; 3]);
        assert_eq!(session.engine.connect_calls, 0);
        assert!(!session.engine.transport.is_open());
        assert!(!session.is_connected());
        assert_eq!(session.retries(), 0);
        assert_eq!(
            *events.lock().unwrap(),
            vec![(EventKind::Error, Some(SessionError::SocketError))]
        );
    }

    #[tokio::test]
    async fn test_transport_recovers_within_retries() {
        let (mut session, _) = session();
        session.engine.transport.failing_connects = 2;

        session.connect().await.unwrap();

        assert_eq!(session.engine.transport.connect_calls, 3);
        assert_eq!(session.delay.sleeps, vec![RETRY_DELAY_MS; 2]);
    }

    #[tokio::test]
    async fn test_not_authorized_stops_immediately() {
        let (mut session, events) = session();
        session
            .engine
            .connect_results
            .push_back(Err(EngineError::Refused(ConnectReturnCode::NotAuthorized)));

        assert_eq!(session.connect().await, Err(SessionError::NotAuthorized));

        assert_eq!(session.engine.connect_calls, 1);
        assert_eq!(session.delay.sleeps, vec![RETRY_DELAY_MS]);
        assert!(!session.engine.transport.is_open());
        assert!(!session.is_connected());
        assert_eq!(
            *events.lock().unwrap(),
            vec![(EventKind::Error, Some(SessionError::NotAuthorized))]
        );
    }

    #[tokio::test]
    async fn test_handshake_retries_exhausted() {
        let (mut session, events) = session();
        for _ in 0..MAX_RETRIES {
            session
                .engine
                .connect_results
                .push_back(Err(EngineError::Timeout(ubilink_packets::PacketType::ConnAck)));
        }

        assert_eq!(
            session.connect().await,
            Err(SessionError::ProtocolSocketError)
        );

        assert_eq!(session.engine.connect_calls, MAX_RETRIES as usize);
        assert_eq!(session.delay.sleeps, vec![RETRY_DELAY_MS; 3]);
        assert_eq!(session.engine.transport.disconnect_calls, 1);
        assert!(!session.engine.transport.is_open());
        assert_eq!(count(&events, EventKind::Error), 1);
        assert_eq!(count(&events, EventKind::Connected), 0);
    }

    #[tokio::test]
    async fn test_handshake_recovers_after_refusal() {
        let (mut session, _) = session();
        session
            .engine
            .connect_results
            .push_back(Err(EngineError::Refused(ConnectReturnCode::ServerUnavailable)));

        session.connect().await.unwrap();

        assert_eq!(session.engine.connect_calls, 2);
        assert_eq!(session.delay.sleeps, vec![RETRY_DELAY_MS]);
    }

    #[tokio::test]
    async fn test_subscribe_topic_construction() {
        let (mut session, events) = connected_session().await;

        session.subscribe("leds", ignore).await.unwrap();

        assert_eq!(session.engine.subscribed, vec!["/v1.6/devices/D1/leds/lv"]);
        let topics: Vec<&str> = session.subscriptions().iter().map(|s| s.topic()).collect();
        assert_eq!(topics, vec!["/v1.6/devices/D1/leds/lv"]);
        assert_eq!(
            *events.lock().unwrap(),
            vec![(EventKind::Subscribed, None)]
        );
    }

    #[tokio::test]
    async fn test_subscribe_duplicates_are_distinct_entries() {
        let (mut session, _) = connected_session().await;

        session.subscribe("leds", ignore).await.unwrap();
        session.subscribe("leds", ignore).await.unwrap();

        assert_eq!(session.subscriptions().len(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_invalid_variable() {
        let (mut session, events) = connected_session().await;
        let long = "v".repeat(100);

        for variable in ["", "le+ds", "#", "a/b", long.as_str()] {
            assert_eq!(
                session.subscribe(variable, ignore).await,
                Err(SessionError::InvalidArgument)
            );
        }

        assert!(session.engine.subscribed.is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_capacity() {
        let (mut session, _) = connected_session().await;

        for i in 0..subscription::MAX_SUBSCRIPTIONS {
            session.subscribe(&format!("v{}", i), ignore).await.unwrap();
        }

        assert_eq!(
            session.subscribe("overflow", ignore).await,
            Err(SessionError::CapacityExceeded)
        );
        assert_eq!(
            session.subscriptions().len(),
            subscription::MAX_SUBSCRIPTIONS
        );
        assert_eq!(
            session.engine.subscribed.len(),
            subscription::MAX_SUBSCRIPTIONS
        );
    }

    #[tokio::test]
    async fn test_subscribe_engine_failure() {
        let (mut session, events) = connected_session().await;
        session.engine.fail_subscribe = true;

        assert_eq!(
            session.subscribe("leds", ignore).await,
            Err(SessionError::SubscribeError)
        );

        assert!(session.subscriptions().is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_while_disconnected_reaches_engine() {
        let (mut session, _) = session();

        assert_eq!(
            session.subscribe("leds", ignore).await,
            Err(SessionError::SubscribeError)
        );

        assert_eq!(session.engine.subscribed.len(), 1);
        assert!(session.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_publish_after_connect() {
        let (mut session, events) = connected_session().await;

        session.publish("demo", 2.0).await.unwrap();
        session.publish("demo", 2.345).await.unwrap();

        let published = &session.engine.published;
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "/v1.6/devices/D1");
        assert_eq!(published[0].1.payload_str(), Some("{\"demo\": 2.00}"));
        assert_eq!(published[1].1.payload_str(), Some("{\"demo\": 2.35}"));
        assert_eq!(published[0].1.qos, QoS::AtMostOnce);
        assert!(!published[0].1.retained);
        assert!(!published[0].1.dup);
        assert_eq!(count(&events, EventKind::Published), 2);
    }

    #[tokio::test]
    async fn test_publish_while_disconnected() {
        let (mut session, events) = session();

        assert_eq!(
            session.publish("demo", 1.0).await,
            Err(SessionError::NotConnected)
        );

        assert!(session.engine.published.is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_invalid_variable() {
        let (mut session, _) = connected_session().await;

        assert_eq!(
            session.publish("", 1.0).await,
            Err(SessionError::InvalidArgument)
        );
        assert_eq!(
            session.publish(&"v".repeat(MSG_MAX_LEN), 1.0).await,
            Err(SessionError::InvalidArgument)
        );
        assert!(session.engine.published.is_empty());
    }

    #[tokio::test]
    async fn test_publish_engine_failure() {
        let (mut session, events) = connected_session().await;
        session.engine.fail_publish = true;

        assert_eq!(
            session.publish("demo", 1.0).await,
            Err(SessionError::PublishError)
        );

        assert_eq!(
            *events.lock().unwrap(),
            vec![(EventKind::Error, Some(SessionError::PublishError))]
        );
    }

    #[tokio::test]
    async fn test_keep_alive_healthy() {
        let (mut session, events) = connected_session().await;

        session.keep_alive().await.unwrap();

        assert_eq!(
            session.engine.yields,
            vec![Duration::from_millis(100), Duration::from_millis(10)]
        );
        assert!(session.is_connected());
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keep_alive_detects_lost_connection() {
        let (mut session, events) = connected_session().await;
        session.engine.yield_results.push_back(Ok(()));
        session
            .engine
            .yield_results
            .push_back(Err(EngineError::KeepAliveTimeout));

        assert_eq!(
            session.keep_alive().await,
            Err(SessionError::ConnectionLost)
        );

        assert!(!session.is_connected());
        assert_eq!(count(&events, EventKind::Disconnected), 1);
        assert_eq!(session.engine.disconnect_calls, 1);
        assert!(!session.engine.transport.is_open());

        assert_eq!(session.keep_alive().await, Err(SessionError::NotConnected));
        assert_eq!(count(&events, EventKind::Disconnected), 1);
        assert_eq!(session.engine.yields.len(), 2);
    }

    #[tokio::test]
    async fn test_keep_alive_when_first_yield_drops_session() {
        let (mut session, events) = connected_session().await;
        session
            .engine
            .yield_results
            .push_back(Err(EngineError::Transport(TransportError::Closed)));

        assert_eq!(session.keep_alive().await, Err(SessionError::NotConnected));

        assert!(!session.is_connected());
        assert_eq!(session.engine.yields, vec![Duration::from_millis(100)]);
        assert_eq!(count(&events, EventKind::Disconnected), 0);

        // The transport handle is still held until reset.
        assert_eq!(
            session.connect().await,
            Err(SessionError::SocketNotAvailable)
        );
        session.reset().await;
        session.connect().await.unwrap();
    }

    #[tokio::test]
    async fn test_keep_alive_without_engine_session() {
        let (mut session, _) = session();

        assert_eq!(session.keep_alive().await, Err(SessionError::NotConnected));
        assert!(session.engine.yields.is_empty());
    }

    fn wired_session() -> Session<MqttEngine<ScriptedTransport>, RecordingDelay> {
        let mut transport = ScriptedTransport::default();
        transport.push_inbound(&[0x20, 0x02, 0x00, 0x00]);

        let config = SessionConfig::new("BBFF-token", "D1").logging(false);
        Session::with_engine(config, MqttEngine::new(transport), RecordingDelay::default())
            .expect("valid config")
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_over_mqtt_engine() {
        let mut session = wired_session();

        session.connect().await.unwrap();
        assert!(session.is_connected());
        assert_eq!(session.engine.transport().written[0][0], 0x10);

        session.publish("demo", 2.0).await.unwrap();

        let mut publish = vec![0x30, 0x20, 0x00, 0x10];
        publish.extend_from_slice(b"/v1.6/devices/D1");
        publish.extend_from_slice(b"{\"demo\": 2.00}");
        assert_eq!(session.engine.transport().written.last(), Some(&publish));

        let start = tokio::time::Instant::now();
        session.keep_alive().await.unwrap();

        assert!(start.elapsed() <= Duration::from_millis(110));
        assert!(session.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_bounded_by_stalled_packet() {
        let mut session = wired_session();
        session.connect().await.unwrap();

        // A PUBLISH header whose body never arrives
        session.engine.transport_mut().push_inbound(&[0x30, 0x0a]);

        let start = tokio::time::Instant::now();
        assert_eq!(session.keep_alive().await, Err(SessionError::NotConnected));

        assert!(start.elapsed() <= Duration::from_millis(110));
        assert!(!session.is_connected());

        session.reset().await;
        session
            .engine
            .transport_mut()
            .push_inbound(&[0x20, 0x02, 0x00, 0x00]);
        session.connect().await.unwrap();
    }
}
