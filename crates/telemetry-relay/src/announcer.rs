// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Publisher side of the topic discovery protocol.
//!
//! Before any data is published, every topic the run will use is announced once on the
//! control topic, then the announcer waits a grace delay so subscribers can subscribe.
//! Nothing is acknowledged: this is announce-then-wait, not a handshake.

use std::time::Duration;

use fnv::FnvBuildHasher;
use hashbrown::HashSet;
use tracing::{debug, info};

use crate::constants::{ANNOUNCE_GRACE, CONTROL_TOPIC};
use crate::errors::TransportError;
use crate::snapshot::MetricsSnapshot;
use crate::transport::Transport;

#[derive(Clone, Debug)]
pub struct TopicAnnouncer {
    control_topic: String,
    grace: Duration,
}

impl Default for TopicAnnouncer {
    fn default() -> Self {
        Self::new(CONTROL_TOPIC, ANNOUNCE_GRACE)
    }
}

impl TopicAnnouncer {
    pub fn new(control_topic: impl Into<String>, grace: Duration) -> Self {
        Self {
            control_topic: control_topic.into(),
            grace,
        }
    }

    pub fn control_topic(&self) -> &str {
        &self.control_topic
    }

    /// Every topic of `snapshot` followed by `extra_topics`, first occurrence kept.
    pub fn topics_for<'a>(
        snapshot: &MetricsSnapshot,
        extra_topics: impl IntoIterator<Item = &'a str>,
    ) -> Vec<String> {
        let mut seen: HashSet<String, FnvBuildHasher> =
            HashSet::with_hasher(FnvBuildHasher::default());
        snapshot
            .topic_paths()
            .map(String::from)
            .chain(extra_topics.into_iter().map(str::to_string))
            .filter(|topic| seen.insert(topic.clone()))
            .collect()
    }

    /// Publishes each topic name on the control topic, then waits the grace delay.
    ///
    /// Returns the number of topics announced.
    pub async fn announce<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        topics: &[String],
    ) -> Result<usize, TransportError> {
        for topic in topics {
            debug!("Announcing topic {topic}");
            transport
                .publish(&self.control_topic, topic.as_bytes().to_vec())
                .await?;
        }
        info!(
            "Announced {} topics on {}, waiting {:?} for subscribers",
            topics.len(),
            self.control_topic,
            self.grace
        );
        tokio::time::sleep(self.grace).await;
        Ok(topics.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ACCESS_LOG_TOPIC, ERROR_LOG_TOPIC};

    #[test]
    fn test_topics_for_appends_extras_and_dedupes() {
        let snapshot = MetricsSnapshot::new()
            .with("cpu", MetricsSnapshot::new().with("usage", 1.0))
            .with("disk", 80i64);
        let topics = TopicAnnouncer::topics_for(
            &snapshot,
            [ACCESS_LOG_TOPIC, ERROR_LOG_TOPIC, "disk"],
        );
        assert_eq!(
            topics,
            vec!["cpu/usage", "disk", "apache/access", "apache/error"]
        );
    }

    #[test]
    fn test_default_uses_well_known_control_topic() {
        assert_eq!(TopicAnnouncer::default().control_topic(), "topics");
    }
}
