// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Access-log parsing for the Apache Combined Log Format.
//!
//! A line has the shape
//!
//! ```text
//! HOST IDENTITY USER [DATETIME] "METHOD TARGET PROTOCOL" STATUS BYTES "REFERRER" "USER-AGENT"
//! ```
//!
//! Lines that do not match the grammar are skipped. Lines that match but carry a
//! non-integer status or byte count fail the parsing run with a [`ParseError`].

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::ParseError;
use crate::log_source::LogLine;

const COMBINED_LOG_PATTERN: &str = concat!(
    r#"^(\S+) (\S+) (\S+) \[([^\]]*)\] "#,
    r#""(\S+) (\S+) (\S+)" "#,
    r#"(\S+) (\S+) "#,
    r#""((?:[^"\\]|\\.)*)" "((?:[^"\\]|\\.)*)"$"#,
);

// Apache writes this in place of a byte count when no body was sent
const BYTES_PLACEHOLDER: &str = "-";

static COMBINED_LOG_REGEX: OnceLock<Regex> = OnceLock::new();

#[allow(clippy::expect_used)]
fn combined_log_regex() -> &'static Regex {
    COMBINED_LOG_REGEX
        .get_or_init(|| Regex::new(COMBINED_LOG_PATTERN).expect("combined log pattern is valid"))
}

/// One request from the access log. Field values are kept as written in the log,
/// apart from the two integer fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub host: String,
    pub identity: String,
    pub user: String,
    #[serde(rename = "datetime")]
    pub timestamp: String,
    pub method: String,
    #[serde(rename = "request")]
    pub request_target: String,
    #[serde(rename = "proto")]
    pub protocol_version: String,
    #[serde(rename = "status")]
    pub status_code: u32,
    #[serde(rename = "bytes")]
    pub bytes_sent: u64,
    pub referrer: String,
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

/// Parses a single line. The line's path and number are only used for error reporting.
///
/// Returns `Ok(None)` when the line does not match the grammar.
pub fn parse_line(line: &LogLine) -> Result<Option<LogRecord>, ParseError> {
    let Some(captures) = combined_log_regex().captures(line.text.trim()) else {
        trace!(
            "Skipping non-matching access log line {}:{}",
            line.path.display(),
            line.number
        );
        return Ok(None);
    };

    let field = |index: usize| {
        captures
            .get(index)
            .map_or_else(String::new, |m| m.as_str().to_string())
    };
    let invalid = |field: &'static str, value: String| ParseError::InvalidInteger {
        path: line.path.clone(),
        line: line.number,
        field,
        value,
    };

    let status = field(8);
    let status_code = status
        .parse::<u32>()
        .map_err(|_| invalid("status", status.clone()))?;

    let bytes = field(9);
    let bytes_sent = if bytes == BYTES_PLACEHOLDER {
        0
    } else {
        bytes
            .parse::<u64>()
            .map_err(|_| invalid("bytes", bytes.clone()))?
    };

    Ok(Some(LogRecord {
        host: field(1),
        identity: field(2),
        user: field(3),
        timestamp: field(4),
        method: field(5),
        request_target: field(6),
        protocol_version: field(7),
        status_code,
        bytes_sent,
        referrer: field(10),
        user_agent: field(11),
    }))
}

/// Lazily parses `lines`, yielding one item per matching line in input order.
///
/// The iterator is single-pass. Non-matching lines are skipped. The first error, from
/// the underlying source or from parsing, is yielded and iteration should stop there.
pub fn parse_lines<I, E>(lines: I) -> Records<I::IntoIter>
where
    I: IntoIterator<Item = Result<LogLine, E>>,
    E: From<ParseError>,
{
    Records {
        lines: lines.into_iter(),
    }
}

pub struct Records<I> {
    lines: I,
}

impl<I, E> Iterator for Records<I>
where
    I: Iterator<Item = Result<LogLine, E>>,
    E: From<ParseError>,
{
    type Item = Result<LogRecord, E>;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            match parse_line(&line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }
}
