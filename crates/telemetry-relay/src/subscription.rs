// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Subscriber side of the topic discovery protocol.
//!
//! The manager subscribes to the control topic, then treats every control message as the
//! name of a further topic to subscribe to. Messages on any other topic are handed to the
//! sink. Messages are handled one at a time, to completion, so the subscription set and
//! the sink need no locking.

use fnv::FnvBuildHasher;
use hashbrown::HashSet;
use tracing::{debug, error, info, warn};
use ustr::Ustr;

use crate::errors::{HandleError, TransportError};
use crate::sink::MessageSink;
use crate::transport::{Message, Transport};
use crate::util::parse_announced_topic;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Not yet subscribed to the control topic.
    AwaitingControl,
    /// Subscribed to the control topic and routing messages.
    Routing,
}

/// What handling one message did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Subscribed(String),
    AlreadySubscribed(String),
    Persisted(String),
}

/// Topics subscribed to during this run. Only ever grows.
#[derive(Debug)]
pub struct SubscriptionSet {
    topics: HashSet<Ustr, FnvBuildHasher>,
}

impl Default for SubscriptionSet {
    fn default() -> Self {
        Self {
            topics: HashSet::with_hasher(FnvBuildHasher::default()),
        }
    }
}

impl SubscriptionSet {
    /// Looks `topic` up without interning it.
    pub fn contains(&self, topic: &str) -> bool {
        Ustr::from_existing(topic).is_some_and(|topic| self.topics.contains(&topic))
    }

    /// Returns `false` if the topic was already present.
    pub fn insert(&mut self, topic: &str) -> bool {
        self.topics.insert(Ustr::from(topic))
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Subscriber context: the subscription set and the sink, owned for the whole run.
pub struct SubscriptionManager<K> {
    control_topic: String,
    state: SubscriptionState,
    subscriptions: SubscriptionSet,
    sink: K,
}

impl<K: MessageSink> SubscriptionManager<K> {
    pub fn new(control_topic: impl Into<String>, sink: K) -> Self {
        Self {
            control_topic: control_topic.into(),
            state: SubscriptionState::AwaitingControl,
            subscriptions: SubscriptionSet::default(),
            sink,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Subscribes to the control topic. Calling it again once routing is a no-op.
    pub async fn start<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), TransportError> {
        if self.state == SubscriptionState::Routing {
            return Ok(());
        }
        transport.subscribe(&self.control_topic).await?;
        info!("Subscribed to control topic {}", self.control_topic);
        self.state = SubscriptionState::Routing;
        Ok(())
    }

    /// Handles one delivered message.
    pub async fn handle_message<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        message: &Message,
    ) -> Result<Dispatch, HandleError> {
        debug!(
            "Message from {}: {}",
            message.topic,
            String::from_utf8_lossy(&message.payload)
        );

        if message.topic == self.control_topic {
            let topic = parse_announced_topic(&message.payload, &self.control_topic)?;
            if self.subscriptions.contains(&topic) {
                debug!("Already subscribed to {topic}");
                return Ok(Dispatch::AlreadySubscribed(topic));
            }
            transport.subscribe(&topic).await?;
            self.subscriptions.insert(&topic);
            info!("Subscribed to {topic}");
            Ok(Dispatch::Subscribed(topic))
        } else {
            self.sink.write(&message.topic, &message.payload)?;
            Ok(Dispatch::Persisted(message.topic.clone()))
        }
    }

    /// Runs the dispatch loop until the transport fails.
    ///
    /// A message whose handling fails is logged and skipped; only transport errors end the
    /// loop, and they are returned.
    pub async fn run<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), TransportError> {
        self.start(transport).await?;

        loop {
            let message = transport.next_message().await?;
            match self.handle_message(transport, &message).await {
                Ok(_) => {}
                Err(HandleError::Transport(e)) => {
                    error!("Transport failed while handling {}: {e}", message.topic);
                    return Err(e);
                }
                Err(HandleError::Control(e)) => {
                    warn!("Ignoring control message: {e}");
                }
                Err(HandleError::Sink(e)) => {
                    error!("Failed to persist message: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use tracing_test::traced_test;

    use super::*;
    use crate::errors::{ControlError, SinkError};

    #[derive(Default)]
    struct QueueTransport {
        inbound: VecDeque<Message>,
        subscribed: Vec<String>,
    }

    #[async_trait]
    impl Transport for QueueTransport {
        async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
            self.subscribed.push(topic.to_string());
            Ok(())
        }

        async fn publish(&mut self, _topic: &str, _payload: Vec<u8>) -> Result<(), TransportError> {
            Ok(())
        }

        async fn next_message(&mut self) -> Result<Message, TransportError> {
            self.inbound.pop_front().ok_or(TransportError::Disconnected)
        }

        async fn disconnect(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct VecSink(Vec<(String, Vec<u8>)>);

    impl MessageSink for VecSink {
        fn write(&mut self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
            self.0.push((topic.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handle_message_dispatch() {
        let mut transport = QueueTransport::default();
        let mut manager = SubscriptionManager::new("topics", VecSink::default());
        manager.start(&mut transport).await.unwrap();
        manager.start(&mut transport).await.unwrap();

        let announce = Message::new("topics", "cpu/usage");
        assert_eq!(
            manager.handle_message(&mut transport, &announce).await.unwrap(),
            Dispatch::Subscribed("cpu/usage".to_string())
        );
        assert_eq!(
            manager.handle_message(&mut transport, &announce).await.unwrap(),
            Dispatch::AlreadySubscribed("cpu/usage".to_string())
        );
        assert_eq!(
            manager
                .handle_message(&mut transport, &Message::new("cpu/usage", "7"))
                .await
                .unwrap(),
            Dispatch::Persisted("cpu/usage".to_string())
        );
        assert!(matches!(
            manager
                .handle_message(&mut transport, &Message::new("topics", "#"))
                .await,
            Err(HandleError::Control(_))
        ));
        assert!(matches!(
            manager
                .handle_message(&mut transport, &Message::new("topics", " cpu/usage\n"))
                .await,
            Err(HandleError::Control(ControlError::SurroundingWhitespace(_)))
        ));

        assert_eq!(transport.subscribed, vec!["topics", "cpu/usage"]);
        assert_eq!(manager.sink().0, vec![("cpu/usage".to_string(), b"7".to_vec())]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_run_logs_rejected_announcements() {
        let mut transport = QueueTransport {
            inbound: VecDeque::from([Message::new("topics", "a/#")]),
            ..QueueTransport::default()
        };
        let mut manager = SubscriptionManager::new("topics", VecSink::default());

        let result = manager.run(&mut transport).await;

        assert!(matches!(result, Err(TransportError::Disconnected)));
        assert!(logs_contain("Subscribed to control topic topics"));
        assert!(logs_contain("Ignoring control message"));
    }

    #[test]
    fn test_subscription_set_grows_once_per_topic() {
        let mut set = SubscriptionSet::default();
        assert!(set.is_empty());
        assert!(set.insert("a/b"));
        assert!(!set.insert("a/b"));
        assert!(set.insert("c"));
        assert_eq!(set.len(), 2);
        assert!(set.contains("a/b"));
        assert!(!set.contains("a"));
    }

    #[test]
    fn test_subscription_set_lookup_does_not_intern() {
        let set = SubscriptionSet::default();
        let topic = "lookup/only/7f3a9c1e";
        assert!(!set.contains(topic));
        assert!(!set.contains(topic));
        assert!(Ustr::from_existing(topic).is_none());
    }
}
