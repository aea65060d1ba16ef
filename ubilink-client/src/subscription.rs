//! Topic construction and the fixed-capacity subscription table.

use std::fmt;

use ubilink_core::topic::{validate_publish_topic, validate_topic_level};

use crate::error::{Result, SessionError};
use crate::message::MessageHandler;

/// Prefix of every device topic on the Ubidots broker.
pub const BROKER_PATH: &str = "/v1.6/devices/";
/// Suffix selecting the last value of a variable.
pub const LAST_VALUE_SUFFIX: &str = "/lv";
pub const TOPIC_MAX_LEN: usize = 100;
pub const MAX_SUBSCRIPTIONS: usize = 20;

pub type Topic = heapless::String<TOPIC_MAX_LEN>;

fn append(topic: &mut Topic, part: &str) -> Result<()> {
    topic
        .push_str(part)
        .map_err(|_| SessionError::InvalidArgument)
}

/// `/v1.6/devices/<device_id>`, the topic values are published to.
pub fn base_topic(device_id: &str) -> Result<Topic> {
    let mut topic = Topic::new();
    append(&mut topic, BROKER_PATH)?;
    append(&mut topic, device_id)?;

    validate_publish_topic(&topic).map_err(|_| SessionError::InvalidArgument)?;

    Ok(topic)
}

/// `<base_topic>/<variable>/lv`, the topic a variable's updates arrive on.
pub fn subscribe_topic(base_topic: &str, variable: &str) -> Result<Topic> {
    validate_topic_level(variable).map_err(|_| SessionError::InvalidArgument)?;

    let mut topic = Topic::new();
    append(&mut topic, base_topic)?;
    append(&mut topic, "/")?;
    append(&mut topic, variable)?;
    append(&mut topic, LAST_VALUE_SUFFIX)?;

    Ok(topic)
}

pub struct Subscription {
    topic: Topic,
    handler: MessageHandler,
}

impl Subscription {
    pub fn new(topic: Topic, handler: MessageHandler) -> Self {
        Self { topic, handler }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic.as_str())
            .field("handler", &(self.handler as *const ()))
            .finish()
    }
}

/// Append-only list of the subscriptions made during the session's lifetime.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    entries: heapless::Vec<Subscription, MAX_SUBSCRIPTIONS>,
}

impl SubscriptionTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    pub fn push(&mut self, subscription: Subscription) -> Result<()> {
        self.entries
            .push(subscription)
            .map_err(|_| SessionError::CapacityExceeded)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageData;

    fn ignore(_: &MessageData<'_>) {}

    #[test]
    fn test_base_topic() {
        assert_eq!(base_topic("D1").unwrap(), "/v1.6/devices/D1");
        assert_eq!(
            base_topic(&"d".repeat(TOPIC_MAX_LEN)),
            Err(SessionError::InvalidArgument)
        );
        assert_eq!(base_topic("pump/+"), Err(SessionError::InvalidArgument));
    }

    #[test]
    fn test_subscribe_topic() {
        assert_eq!(
            subscribe_topic("/v1.6/devices/D1", "leds").unwrap(),
            "/v1.6/devices/D1/leds/lv"
        );
    }

    #[test]
    fn test_subscribe_topic_rejections() {
        let base = "/v1.6/devices/D1";

        assert_eq!(subscribe_topic(base, ""), Err(SessionError::InvalidArgument));
        assert_eq!(subscribe_topic(base, "#"), Err(SessionError::InvalidArgument));
        assert_eq!(subscribe_topic(base, "a\0b"), Err(SessionError::InvalidArgument));
        assert_eq!(subscribe_topic(base, "a/b"), Err(SessionError::InvalidArgument));

        // 16 bytes of base, "/" and "/lv" leave room for 80 bytes of variable
        assert!(subscribe_topic(base, &"v".repeat(80)).is_ok());
        assert_eq!(
            subscribe_topic(base, &"v".repeat(81)),
            Err(SessionError::InvalidArgument)
        );
    }

    #[test]
    fn test_table_capacity() {
        let mut table = SubscriptionTable::default();

        for i in 0..MAX_SUBSCRIPTIONS {
            let topic = subscribe_topic("/v1.6/devices/D1", &format!("v{}", i)).unwrap();
            table.push(Subscription::new(topic, ignore)).unwrap();
        }

        assert!(table.is_full());
        assert_eq!(
            table.push(Subscription::new(Topic::new(), ignore)),
            Err(SessionError::CapacityExceeded)
        );
        assert_eq!(table.len(), MAX_SUBSCRIPTIONS);
        assert_eq!(
            table.iter().next().map(Subscription::topic),
            Some("/v1.6/devices/D1/v0/lv")
        );
    }
}
