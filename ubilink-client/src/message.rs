use bytes::Bytes;
use ubilink_core::qos::QoS;

/// An application message as published or delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub qos: QoS,
    pub retained: bool,
    pub dup: bool,
    /// Packet identifier, zero for QoS 0.
    pub id: u16,
    pub payload: Bytes,
}

impl Message {
    /// Payload as UTF-8 text, if it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// What a subscription handler receives for each inbound message.
#[derive(Debug, Clone, Copy)]
pub struct MessageData<'a> {
    pub topic_name: &'a str,
    pub message: &'a Message,
}

/// Callback invoked for each message that matches a subscription.
pub type MessageHandler = fn(&MessageData<'_>);
