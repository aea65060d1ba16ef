use thiserror::Error;
use ubilink_core::{qos::QoS, return_code::ConnectReturnCode, topic::TopicValidationError};
use ubilink_packets::PacketType;

/// Failures reported by a byte transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out")]
    Timeout,

    #[error("Connection closed by peer")]
    Closed,

    #[error("Transport is not open")]
    NotOpen,

    #[error("Transport is already open")]
    AlreadyOpen,

    #[error("TLS error: {0}")]
    Tls(String),
}

/// Failures reported by the MQTT protocol engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Packet error: {0}")]
    Packet(#[from] ubilink_core::error::Error),

    #[error("Connection refused: {0}")]
    Refused(ConnectReturnCode),

    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Timed out waiting for {0:?}")]
    Timeout(PacketType),

    #[error("Subscription rejected by broker")]
    SubscribeRejected,

    #[error("Message handler table is full")]
    HandlerTableFull,

    #[error("Packet of {0} bytes exceeds the read buffer")]
    PacketTooLarge(usize),

    #[error("Keep-alive ping was not answered")]
    KeepAliveTimeout,

    #[error("Unexpected {0:?} packet")]
    UnexpectedPacket(PacketType),

    #[error("Publishing with {0:?} is not supported")]
    UnsupportedQoS(QoS),

    #[error("Invalid topic: {0}")]
    InvalidTopic(#[from] TopicValidationError),
}

/// Status of a session operation, also handed to event callbacks.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("already connected")]
    AlreadyConnected,

    #[error("socket not available")]
    SocketNotAvailable,

    #[error("socket error")]
    SocketError,

    #[error("mqtt socket error")]
    ProtocolSocketError,

    #[error("not authorized")]
    NotAuthorized,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("capacity exceeded")]
    CapacityExceeded,

    #[error("subscribe error")]
    SubscribeError,

    #[error("not connected")]
    NotConnected,

    #[error("publish error")]
    PublishError,

    #[error("connection lost")]
    ConnectionLost,
}

pub type Result<T> = std::result::Result<T, SessionError>;
