// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock implementations of relay components for testing

use std::collections::VecDeque;

use telemetry_relay::{
    errors::{SinkError, TransportError},
    sink::MessageSink,
    snapshot::{MetricsSampler, MetricsSnapshot},
    transport::{Message, Transport},
};
use tokio::time::Instant;

/// Everything a [`MockTransport`] was asked to do, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Subscribe(String),
    Publish(String, Vec<u8>),
    Disconnect,
}

/// In-memory transport. Delivers the queued inbound messages in order, then reports the
/// connection as gone.
#[derive(Default)]
pub struct MockTransport {
    inbound: VecDeque<Message>,
    pub calls: Vec<(Instant, Call)>,
    pub fail_subscribe_to: Option<String>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn with_inbound(messages: impl IntoIterator<Item = Message>) -> Self {
        Self {
            inbound: messages.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|(_, call)| match call {
                Call::Subscribe(topic) => Some(topic.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn publishes(&self) -> Vec<(String, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|(_, call)| match call {
                Call::Publish(topic, payload) => Some((topic.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    /// Publishes as `(topic, payload as text)`.
    pub fn published_text(&self) -> Vec<(String, String)> {
        self.publishes()
            .into_iter()
            .map(|(topic, payload)| (topic, String::from_utf8_lossy(&payload).into_owned()))
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if self.fail_subscribe_to.as_deref() == Some(topic) {
            return Err(TransportError::Subscribe {
                topic: topic.to_string(),
                reason: "refused".to_string(),
            });
        }
        self.calls
            .push((Instant::now(), Call::Subscribe(topic.to_string())));
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.calls
            .push((Instant::now(), Call::Publish(topic.to_string(), payload)));
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Message, TransportError> {
        self.inbound.pop_front().ok_or(TransportError::Disconnected)
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.calls.push((Instant::now(), Call::Disconnect));
        Ok(())
    }
}

/// Sink that keeps every write in memory.
#[derive(Default)]
pub struct RecordingSink {
    pub writes: Vec<(String, Vec<u8>)>,
    pub fail_topic: Option<String>,
}

impl MessageSink for RecordingSink {
    fn write(&mut self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
        if self.fail_topic.as_deref() == Some(topic) {
            return Err(SinkError::Write {
                topic: topic.to_string(),
                path: format!("{topic}.txt").into(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.writes.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

/// Sampler returning the same snapshot every time, counting calls.
pub struct FixedSampler {
    snapshot: MetricsSnapshot,
    pub samples: usize,
}

#[allow(dead_code)]
impl FixedSampler {
    pub fn new(snapshot: MetricsSnapshot) -> Self {
        Self {
            snapshot,
            samples: 0,
        }
    }
}

impl MetricsSampler for FixedSampler {
    fn sample(&mut self) -> MetricsSnapshot {
        self.samples += 1;
        self.snapshot.clone()
    }
}
