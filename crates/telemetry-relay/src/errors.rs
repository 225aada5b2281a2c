// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Failure to coerce a field of a line that did match the access-log grammar.
///
/// Lines that do not match the grammar at all never produce this error; they are skipped.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("{}:{line}: field `{field}` is not a valid integer: {value:?}", path.display())]
    InvalidInteger {
        path: PathBuf,
        line: usize,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LogSourceError {
    #[error("invalid log file pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to open log file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read log file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while building a log bundle for publication.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error(transparent)]
    Source(#[from] LogSourceError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("failed to serialize log bundle: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from the publish/subscribe transport. All of them are fatal to the caller.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to broker at {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("timed out connecting to broker at {0}")]
    ConnectTimeout(String),

    #[error("failed to subscribe to {topic:?}: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("failed to publish to {topic:?}: {reason}")]
    Publish { topic: String, reason: String },

    #[error("connection to broker lost: {0}")]
    Connection(String),

    #[error("transport disconnected")]
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write message for topic {topic:?} to {}: {source}", path.display())]
    Write {
        topic: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A control-topic payload that does not name a subscribable topic.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("control payload is not valid UTF-8")]
    NotUtf8,

    #[error("control payload is empty")]
    Empty,

    #[error("control payload {0:?} has leading or trailing whitespace")]
    SurroundingWhitespace(String),

    #[error("control payload {0:?} contains a wildcard or NUL character")]
    InvalidCharacter(String),

    #[error("control payload is {0} bytes, longer than the topic limit")]
    TooLong(usize),

    #[error("control payload names the control topic itself")]
    ControlTopic,
}

/// Failure to handle one message on the subscriber side.
///
/// Only the `Transport` variant stops the dispatch loop.
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors that end a publisher run.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Bundle(#[from] BundleError),
}
