//! MQTT 3.x return codes carried by CONNACK and SUBACK.

use core::fmt;

/// CONNACK return code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ConnectReturnCode {
    #[default]
    Accepted,
    UnacceptableProtocolVersion,
    IdentifierRejected,
    ServerUnavailable,
    BadUsernameOrPassword,
    NotAuthorized,
    /// Any value the 3.1.1 table does not define.
    Reserved(u8),
}

impl ConnectReturnCode {
    pub fn as_u8(&self) -> u8 {
        match self {
            ConnectReturnCode::Accepted => 0x00,
            ConnectReturnCode::UnacceptableProtocolVersion => 0x01,
            ConnectReturnCode::IdentifierRejected => 0x02,
            ConnectReturnCode::ServerUnavailable => 0x03,
            ConnectReturnCode::BadUsernameOrPassword => 0x04,
            ConnectReturnCode::NotAuthorized => 0x05,
            ConnectReturnCode::Reserved(code) => *code,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ConnectReturnCode::Accepted)
    }
}

impl From<u8> for ConnectReturnCode {
    fn from(code: u8) -> Self {
        match code {
            0x00 => ConnectReturnCode::Accepted,
            0x01 => ConnectReturnCode::UnacceptableProtocolVersion,
            0x02 => ConnectReturnCode::IdentifierRejected,
            0x03 => ConnectReturnCode::ServerUnavailable,
            0x04 => ConnectReturnCode::BadUsernameOrPassword,
            0x05 => ConnectReturnCode::NotAuthorized,
            other => ConnectReturnCode::Reserved(other),
        }
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectReturnCode::Accepted => write!(f, "connection accepted"),
            ConnectReturnCode::UnacceptableProtocolVersion => {
                write!(f, "unacceptable protocol version")
            }
            ConnectReturnCode::IdentifierRejected => write!(f, "identifier rejected"),
            ConnectReturnCode::ServerUnavailable => write!(f, "server unavailable"),
            ConnectReturnCode::BadUsernameOrPassword => write!(f, "bad user name or password"),
            ConnectReturnCode::NotAuthorized => write!(f, "not authorized"),
            ConnectReturnCode::Reserved(code) => write!(f, "reserved return code {}", code),
        }
    }
}

/// SUBACK return code for a single topic filter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SubscribeReturnCode {
    Granted(crate::qos::QoS),
    Failure,
}

impl From<u8> for SubscribeReturnCode {
    fn from(code: u8) -> Self {
        match code {
            0x00..=0x02 => SubscribeReturnCode::Granted(code.into()),
            _ => SubscribeReturnCode::Failure,
        }
    }
}

impl SubscribeReturnCode {
    pub fn as_u8(&self) -> u8 {
        match self {
            SubscribeReturnCode::Granted(qos) => *qos as u8,
            SubscribeReturnCode::Failure => 0x80,
        }
    }
}
