// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use host_metrics_collector::HostSampler;
use telemetry_relay::mqtt::MqttTransport;
use telemetry_relay::publisher::Publisher;
use telemetry_relay_agent::{logging::init_tracing, AgentError, PublisherAgentConfig};

#[tokio::main]
pub async fn main() -> ExitCode {
    let config = match PublisherAgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("telemetry-publisher: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_tracing(&config.log_level) {
        eprintln!("telemetry-publisher: {e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Publisher stopped: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: PublisherAgentConfig) -> Result<(), AgentError> {
    let mqtt_config = config.broker.mqtt_config()?;
    info!(
        "Connecting to broker at {}:{} as {}",
        mqtt_config.host, mqtt_config.port, mqtt_config.client_id
    );
    let mut transport = MqttTransport::connect(&mqtt_config).await?;

    let cancel_token = CancellationToken::new();
    let interrupt_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing the run early");
            interrupt_token.cancel();
        }
    });

    let mut publisher = Publisher::new(
        config.publisher_config(),
        HostSampler::default(),
        cancel_token,
    );
    let summary = publisher.run(&mut transport).await?;
    info!(
        "Announced {} topics and published {} messages over {} ticks",
        summary.announced, summary.published, summary.ticks
    );
    Ok(())
}
