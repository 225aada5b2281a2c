// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use host_metrics_collector::HostSampler;
use telemetry_relay::errors::TransportError;
use telemetry_relay::publisher::Publisher;
use telemetry_relay::transport::{Message, Transport};
use telemetry_relay_agent::{PublisherAgentConfig, SubscriberAgentConfig};
use tokio_util::sync::CancellationToken;

/// Transport that records publications and has nothing to deliver
#[derive(Default)]
struct RecordingTransport {
    published: Vec<(String, Vec<u8>)>,
    disconnected: bool,
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn subscribe(&mut self, _topic: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.published.push((topic.to_string(), payload));
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Message, TransportError> {
        Err(TransportError::Disconnected)
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.disconnected = true;
        Ok(())
    }
}

#[test]
fn test_subscriber_config_from_process_environment() {
    std::env::set_var("RELAY_BROKER_HOST", "broker.local");
    std::env::set_var("RELAY_BROKER_PORT", "1885");
    std::env::set_var("RELAY_OUTPUT_DIR", "/srv/relay");

    let config = SubscriberAgentConfig::from_env().unwrap();

    assert_eq!(config.broker.host, "broker.local");
    assert_eq!(config.broker.port, 1885);
    assert_eq!(config.broker.client_id, "telemetry-subscriber");
    assert_eq!(config.output_dir, PathBuf::from("/srv/relay"));
}

#[tokio::test(start_paused = true)]
async fn test_host_sampler_publish_run() {
    let logs = tempfile::tempdir().unwrap();
    let config = PublisherAgentConfig {
        run_seconds: 1,
        apache_log_dir: logs.path().to_path_buf(),
        ..PublisherAgentConfig::default()
    };
    let mut transport = RecordingTransport::default();
    let mut publisher = Publisher::new(
        config.publisher_config(),
        HostSampler::default(),
        CancellationToken::new(),
    );

    let summary = publisher.run(&mut transport).await.unwrap();

    let announced: Vec<String> = transport
        .published
        .iter()
        .take(summary.announced)
        .map(|(topic, payload)| {
            assert_eq!(topic, "topics");
            String::from_utf8(payload.clone()).unwrap()
        })
        .collect();
    assert!(announced.iter().any(|t| t == "cpu/usage"));
    assert!(announced.iter().any(|t| t == "memory/percent"));
    assert_eq!(
        &announced[announced.len() - 2..],
        &["apache/access".to_string(), "apache/error".to_string()]
    );

    // every data topic was announced first
    for (topic, _) in &transport.published[summary.announced..] {
        assert!(announced.contains(topic), "{topic} was not announced");
    }
    assert!(transport.disconnected);
}
