//! Delivery guarantees carried in PUBLISH headers and SUBSCRIBE options.

use core::fmt;

/// Quality of service level. The device session itself only ever uses
/// [`QoS::AtMostOnce`]; the other levels exist so inbound packets decode.
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
    /// The reserved wire value 3, or anything wider than two bits.
    Invalid = 0xff,
}

impl QoS {
    pub fn is_valid(&self) -> bool {
        *self != QoS::Invalid
    }
}

impl From<u8> for QoS {
    fn from(n: u8) -> Self {
        match n {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::Invalid,
        }
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QoS::Invalid => write!(f, "invalid qos"),
            qos => write!(f, "qos {}", *qos as u8),
        }
    }
}
