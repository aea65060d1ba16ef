//! Ubilink device session library
//!
//! This crate keeps a single device connected to the Ubidots industrial MQTT
//! broker: it opens a TCP or TLS transport with bounded retries, publishes
//! variable values as JSON, subscribes to variable updates and reports session
//! events through registered callbacks.
//!
//! # Example
//!
//! ```no_run
//! use ubilink_client::{EventKind, MessageData, Session, SessionConfig, SessionError};
//!
//! fn on_leds(data: &MessageData<'_>) {
//!     println!("{} -> {:?}", data.topic_name, data.message.payload_str());
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SessionError> {
//!     let config = SessionConfig::new("BBFF-token", "pump").encrypted(true);
//!     let mut session = Session::new(config)?;
//!
//!     session.register_callback(EventKind::Error, |status| {
//!         eprintln!("session error: {:?}", status);
//!     });
//!
//!     session.connect().await?;
//!     session.subscribe("leds", on_leds).await?;
//!
//!     loop {
//!         session.publish("demo", 21.5).await?;
//!         session.keep_alive().await?;
//!         tokio::time::sleep(std::time::Duration::from_secs(2)).await;
//!     }
//! }
//! ```

mod countdown;
mod engine;
mod error;
mod event;
mod message;
mod options;
mod session;
mod subscription;
mod tls;
mod transport;

#[cfg(test)]
mod testing;

pub use countdown::{Countdown, Delay, TokioDelay};
pub use engine::{
    MqttEngine, ProtocolEngine, DEFAULT_COMMAND_TIMEOUT, MAX_MESSAGE_HANDLERS, MAX_PACKET_SIZE,
};
pub use error::{EngineError, Result, SessionError, TransportError};
pub use event::{EventCallback, EventKind};
pub use message::{Message, MessageData, MessageHandler};
pub use options::{
    ConnectOptions, SessionConfig, TlsOptions, DEFAULT_CLIENT_ID, DEFAULT_HOST,
    DEFAULT_KEEP_ALIVE_SECS, DEFAULT_TRANSPORT_TIMEOUT, PLAIN_PORT, TLS_PORT,
};
pub use session::{format_payload, Payload, Session, MAX_RETRIES, MSG_MAX_LEN, RETRY_DELAY_MS};
pub use subscription::{
    Subscription, SubscriptionTable, Topic, BROKER_PATH, LAST_VALUE_SUFFIX, MAX_SUBSCRIPTIONS,
    TOPIC_MAX_LEN,
};
pub use transport::{NetTransport, Transport};

// Re-export commonly used types from ubilink-core
pub use ubilink_core::protocol::ProtocolVersion;
pub use ubilink_core::qos::QoS;
pub use ubilink_core::return_code::ConnectReturnCode;
