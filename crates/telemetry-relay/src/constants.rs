// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Well-known topic carrying one topic name per payload.
pub const CONTROL_TOPIC: &str = "topics";

pub const ACCESS_LOG_TOPIC: &str = "apache/access";
pub const ERROR_LOG_TOPIC: &str = "apache/error";

pub const ACCESS_LOG_PATTERN: &str = "access.*";
pub const ERROR_LOG_PATTERN: &str = "error.*";

pub const TOPIC_SEPARATOR: char = '/';

// MQTT topic names are length-prefixed with a u16
pub const MAX_TOPIC_LEN: usize = 65_535;

pub const ANNOUNCE_GRACE: Duration = Duration::from_secs(2);
pub const PUBLISH_INTERVAL: Duration = Duration::from_secs(1);
pub const RUN_DURATION: Duration = Duration::from_secs(60);

pub const OUTPUT_FILE_EXTENSION: &str = "txt";
pub const OUTPUT_FILE_DELIMITER: char = '-';
pub const RUN_DIR_FORMAT: &str = "%Y-%m-%d %H-%M-%S";
