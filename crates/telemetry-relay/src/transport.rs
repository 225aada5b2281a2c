// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::errors::TransportError;

/// A message delivered on a subscribed topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Publish/subscribe client used by both roles.
///
/// Connecting is the job of the implementation's constructor. Every error returned here
/// is fatal to the caller; implementations do not reconnect.
#[async_trait]
pub trait Transport: Send {
    /// Requests delivery of messages published on `topic`.
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Fire-and-forget publication; no acknowledgment is awaited.
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Waits for the next delivered message. Returns an error once the connection is gone.
    async fn next_message(&mut self) -> Result<Message, TransportError>;

    /// Flushes queued publications and closes the connection.
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
