// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Utility functions for topic names.

use crate::constants::{MAX_TOPIC_LEN, OUTPUT_FILE_DELIMITER, OUTPUT_FILE_EXTENSION};
use crate::errors::ControlError;

/// Parses a control-topic payload into the topic name it announces.
///
/// A valid announcement:
/// - is UTF-8 and not empty
/// - has no leading or trailing whitespace, since the payload is taken verbatim
/// - contains no MQTT wildcard (`+`, `#`) and no NUL character
/// - fits in an MQTT topic name
/// - is not the control topic itself
///
/// # Examples
///
/// ```
/// use telemetry_relay::util::parse_announced_topic;
///
/// assert_eq!(parse_announced_topic(b"cpu/usage", "topics"), Ok("cpu/usage".to_string()));
/// assert!(parse_announced_topic(b"cpu/#", "topics").is_err());
/// assert!(parse_announced_topic(b"topics", "topics").is_err());
/// assert!(parse_announced_topic(b"cpu/usage\n", "topics").is_err());
/// ```
pub fn parse_announced_topic(payload: &[u8], control_topic: &str) -> Result<String, ControlError> {
    let topic = std::str::from_utf8(payload).map_err(|_| ControlError::NotUtf8)?;

    if topic.is_empty() {
        return Err(ControlError::Empty);
    }
    if topic.trim() != topic {
        return Err(ControlError::SurroundingWhitespace(topic.to_string()));
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(ControlError::TooLong(topic.len()));
    }
    if topic.contains(['+', '#', '\0']) {
        return Err(ControlError::InvalidCharacter(topic.to_string()));
    }
    if topic == control_topic {
        return Err(ControlError::ControlTopic);
    }

    Ok(topic.to_string())
}

/// File name holding the messages of `topic`: path separators become `-` and the
/// `.txt` extension is appended.
///
/// ```
/// use telemetry_relay::util::output_file_name;
///
/// assert_eq!(output_file_name("cpu/load/one"), "cpu-load-one.txt");
/// ```
pub fn output_file_name(topic: &str) -> String {
    let stem: String = topic
        .chars()
        .map(|ch| match ch {
            '/' | '\\' => OUTPUT_FILE_DELIMITER,
            other => other,
        })
        .collect();
    format!("{stem}.{OUTPUT_FILE_EXTENSION}")
}

/// Turns an arbitrary label (a sensor name, a mount point) into a single topic segment.
///
/// Separators and wildcards become `_`, whitespace runs collapse into one `_`, and the
/// result is lowercased. Returns `None` when nothing usable is left.
pub fn sanitize_topic_segment(label: &str) -> Option<String> {
    let mut segment = String::with_capacity(label.len());
    let mut pending_underscore = false;
    for ch in label.trim().chars() {
        if ch.is_whitespace() || matches!(ch, '/' | '\\' | '+' | '#' | '\0') {
            pending_underscore = true;
            continue;
        }
        if pending_underscore && !segment.is_empty() {
            segment.push('_');
        }
        pending_underscore = false;
        segment.extend(ch.to_lowercase());
    }

    if segment.is_empty() {
        tracing::debug!("Label {label:?} has no usable characters for a topic segment");
        None
    } else {
        Some(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROL: &str = "topics";

    #[test]
    fn test_parse_announced_topic_valid() {
        assert_eq!(
            parse_announced_topic(b"a/b", CONTROL),
            Ok("a/b".to_string())
        );
        assert_eq!(
            parse_announced_topic(b"apache/access log", CONTROL),
            Ok("apache/access log".to_string())
        );
    }

    #[test]
    fn test_parse_announced_topic_invalid() {
        assert_eq!(
            parse_announced_topic(b"\xff\xfe", CONTROL),
            Err(ControlError::NotUtf8)
        );
        assert_eq!(parse_announced_topic(b"", CONTROL), Err(ControlError::Empty));
        assert_eq!(
            parse_announced_topic(b" \t ", CONTROL),
            Err(ControlError::SurroundingWhitespace(" \t ".to_string()))
        );
        assert_eq!(
            parse_announced_topic(b"a/+/c", CONTROL),
            Err(ControlError::InvalidCharacter("a/+/c".to_string()))
        );
        assert_eq!(
            parse_announced_topic(b"#", CONTROL),
            Err(ControlError::InvalidCharacter("#".to_string()))
        );
        assert_eq!(
            parse_announced_topic(b"topics", CONTROL),
            Err(ControlError::ControlTopic)
        );
        let long = vec![b'a'; MAX_TOPIC_LEN + 1];
        assert_eq!(
            parse_announced_topic(&long, CONTROL),
            Err(ControlError::TooLong(MAX_TOPIC_LEN + 1))
        );
    }

    #[test]
    fn test_parse_announced_topic_is_not_normalized() {
        for payload in [&b" x"[..], b"x ", b"  apache/access\n", b"cpu/usage\r\n"] {
            let topic = std::str::from_utf8(payload).unwrap().to_string();
            assert_eq!(
                parse_announced_topic(payload, CONTROL),
                Err(ControlError::SurroundingWhitespace(topic))
            );
        }
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("disk"), "disk.txt");
        assert_eq!(output_file_name("apache/access"), "apache-access.txt");
        assert_eq!(output_file_name("a\\b/c"), "a-b-c.txt");
    }

    #[test]
    fn test_sanitize_topic_segment() {
        assert_eq!(
            sanitize_topic_segment("Core 0"),
            Some("core_0".to_string())
        );
        assert_eq!(
            sanitize_topic_segment("acpitz temp1"),
            Some("acpitz_temp1".to_string())
        );
        assert_eq!(
            sanitize_topic_segment("/dev/sda1"),
            Some("dev_sda1".to_string())
        );
        assert_eq!(sanitize_topic_segment(" / "), None);
        assert_eq!(sanitize_topic_segment(""), None);
    }
}
