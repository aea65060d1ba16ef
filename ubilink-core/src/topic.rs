//! MQTT topic validation and filter matching.
//!
//! Validation follows the MQTT rules for topic names and topic filters.
//! Matching is used by the client engine to route an inbound PUBLISH to the
//! handler registered for a subscription filter.

use core::fmt;

/// Maximum topic name/filter length in bytes (UTF-8 encoded).
pub const MAX_TOPIC_LENGTH: usize = 65535;

/// Error type for topic validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicValidationError {
    /// Topic is empty (zero length).
    Empty,
    /// Topic exceeds maximum length.
    TooLong,
    /// Topic contains null character (U+0000).
    ContainsNullChar,
    /// Wildcard characters not allowed in publish topics.
    WildcardInPublishTopic,
    /// Single-level wildcard (+) must occupy entire level.
    InvalidSingleLevelWildcard,
    /// Multi-level wildcard (#) must be at end and occupy entire level.
    InvalidMultiLevelWildcard,
    /// A single level contains the `/` separator.
    ContainsLevelSeparator,
}

impl fmt::Display for TopicValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicValidationError::Empty => write!(f, "topic name cannot be empty"),
            TopicValidationError::TooLong => {
                write!(
                    f,
                    "topic name exceeds maximum length of {} bytes",
                    MAX_TOPIC_LENGTH
                )
            }
            TopicValidationError::ContainsNullChar => {
                write!(f, "topic name cannot contain null character")
            }
            TopicValidationError::WildcardInPublishTopic => {
                write!(
                    f,
                    "wildcard characters (+, #) not allowed in publish topics"
                )
            }
            TopicValidationError::InvalidSingleLevelWildcard => {
                write!(
                    f,
                    "single-level wildcard (+) must occupy entire topic level"
                )
            }
            TopicValidationError::InvalidMultiLevelWildcard => {
                write!(
                    f,
                    "multi-level wildcard (#) must be at end and occupy entire level"
                )
            }
            TopicValidationError::ContainsLevelSeparator => {
                write!(f, "topic level cannot contain '/'")
            }
        }
    }
}

impl std::error::Error for TopicValidationError {}

/// Validate a topic name for publishing.
///
/// # Examples
///
/// ```
/// use ubilink_core::topic::validate_publish_topic;
///
/// assert!(validate_publish_topic("/v1.6/devices/pump").is_ok());
/// assert!(validate_publish_topic("/v1.6/devices/+").is_err());
/// ```
pub fn validate_publish_topic(topic: &str) -> Result<(), TopicValidationError> {
    validate_common(topic)?;

    if topic.contains('+') || topic.contains('#') {
        return Err(TopicValidationError::WildcardInPublishTopic);
    }

    Ok(())
}

/// Validate a topic filter for subscribing.
///
/// # Examples
///
/// ```
/// use ubilink_core::topic::validate_subscribe_filter;
///
/// assert!(validate_subscribe_filter("/v1.6/devices/pump/leds/lv").is_ok());
/// assert!(validate_subscribe_filter("/v1.6/devices/+/leds/lv").is_ok());
/// assert!(validate_subscribe_filter("/v1.6/devices/#/lv").is_err());
/// ```
pub fn validate_subscribe_filter(filter: &str) -> Result<(), TopicValidationError> {
    validate_common(filter)?;

    let level_count = filter.split('/').count();

    for (i, level) in filter.split('/').enumerate() {
        if level.contains('+') && level != "+" {
            return Err(TopicValidationError::InvalidSingleLevelWildcard);
        }

        if level.contains('#') && (level != "#" || i != level_count - 1) {
            return Err(TopicValidationError::InvalidMultiLevelWildcard);
        }
    }

    Ok(())
}

/// Validate a single topic level supplied by the application, such as a
/// variable label that gets spliced into a longer topic.
pub fn validate_topic_level(level: &str) -> Result<(), TopicValidationError> {
    validate_publish_topic(level)?;

    if level.contains('/') {
        return Err(TopicValidationError::ContainsLevelSeparator);
    }

    Ok(())
}

/// Check whether `topic` is matched by the subscription `filter`.
///
/// ```
/// use ubilink_core::topic::topic_matches;
///
/// assert!(topic_matches("/v1.6/devices/pump/+/lv", "/v1.6/devices/pump/leds/lv"));
/// assert!(topic_matches("/v1.6/devices/#", "/v1.6/devices/pump/leds/lv"));
/// assert!(!topic_matches("/v1.6/devices/pump/leds/lv", "/v1.6/devices/pump/fan/lv"));
/// ```
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    // Wildcards at the first level never match $-prefixed system topics.
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

fn validate_common(topic: &str) -> Result<(), TopicValidationError> {
    if topic.is_empty() {
        return Err(TopicValidationError::Empty);
    }

    if topic.len() > MAX_TOPIC_LENGTH {
        return Err(TopicValidationError::TooLong);
    }

    if topic.contains('\0') {
        return Err(TopicValidationError::ContainsNullChar);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_publish_topics() {
        assert!(validate_publish_topic("a").is_ok());
        assert!(validate_publish_topic("/v1.6/devices/D1").is_ok());
        assert!(validate_publish_topic("trailing/slash/").is_ok());
        assert!(validate_publish_topic("//double//slash").is_ok());
    }

    #[test]
    fn test_publish_topic_rejections() {
        assert_eq!(validate_publish_topic(""), Err(TopicValidationError::Empty));
        assert_eq!(
            validate_publish_topic("foo\0bar"),
            Err(TopicValidationError::ContainsNullChar)
        );
        assert_eq!(
            validate_publish_topic("sensors/+/room1"),
            Err(TopicValidationError::WildcardInPublishTopic)
        );
        assert_eq!(
            validate_publish_topic("#"),
            Err(TopicValidationError::WildcardInPublishTopic)
        );

        let long_topic = "a".repeat(MAX_TOPIC_LENGTH + 1);
        assert_eq!(
            validate_publish_topic(&long_topic),
            Err(TopicValidationError::TooLong)
        );
    }

    #[test]
    fn test_valid_subscribe_filters() {
        assert!(validate_subscribe_filter("a/b/c").is_ok());
        assert!(validate_subscribe_filter("+").is_ok());
        assert!(validate_subscribe_filter("+/+/+").is_ok());
        assert!(validate_subscribe_filter("#").is_ok());
        assert!(validate_subscribe_filter("sensors/+/#").is_ok());
        assert!(validate_subscribe_filter("/#").is_ok());
    }

    #[test]
    fn test_invalid_subscribe_filters() {
        assert_eq!(
            validate_subscribe_filter("sensors/temp+/room1"),
            Err(TopicValidationError::InvalidSingleLevelWildcard)
        );
        assert_eq!(
            validate_subscribe_filter("sensors/#/room1"),
            Err(TopicValidationError::InvalidMultiLevelWildcard)
        );
        assert_eq!(
            validate_subscribe_filter("sensors/temp#"),
            Err(TopicValidationError::InvalidMultiLevelWildcard)
        );
        assert_eq!(
            validate_subscribe_filter(""),
            Err(TopicValidationError::Empty)
        );
    }

    #[test]
    fn test_topic_level_validation() {
        assert!(validate_topic_level("leds").is_ok());
        assert!(validate_topic_level("").is_err());
        assert!(validate_topic_level("le+ds").is_err());
        assert!(validate_topic_level("nul\0").is_err());
        assert_eq!(
            validate_topic_level("a/b"),
            Err(TopicValidationError::ContainsLevelSeparator)
        );
    }

    #[test]
    fn test_exact_match() {
        assert!(topic_matches("a/b/c", "a/b/c"));
        assert!(!topic_matches("a/b/c", "a/b"));
        assert!(!topic_matches("a/b", "a/b/c"));
        assert!(!topic_matches("a/b/c", "a/b/d"));
    }

    #[test]
    fn test_single_level_wildcard_match() {
        assert!(topic_matches("a/+/c", "a/b/c"));
        assert!(topic_matches("a/+/c", "a//c"));
        assert!(!topic_matches("a/+", "a/b/c"));
        assert!(topic_matches("+/+", "/x"));
    }

    #[test]
    fn test_multi_level_wildcard_match() {
        assert!(topic_matches("#", "a/b/c"));
        assert!(topic_matches("a/#", "a/b/c"));
        assert!(topic_matches("a/#", "a"));
        assert!(!topic_matches("b/#", "a/b"));
    }

    #[test]
    fn test_system_topics_not_matched_by_leading_wildcards() {
        assert!(!topic_matches("#", "$SYS/broker"));
        assert!(!topic_matches("+/broker", "$SYS/broker"));
        assert!(topic_matches("$SYS/#", "$SYS/broker"));
    }
}
