// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use std::process::ExitCode;

use tracing::{error, info};

use telemetry_relay::constants::CONTROL_TOPIC;
use telemetry_relay::mqtt::MqttTransport;
use telemetry_relay::sink::PersistentSink;
use telemetry_relay::subscription::SubscriptionManager;
use telemetry_relay::transport::Transport;
use telemetry_relay_agent::{logging::init_tracing, AgentError, SubscriberAgentConfig};

#[tokio::main]
pub async fn main() -> ExitCode {
    let config = match SubscriberAgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("telemetry-subscriber: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_tracing(&config.log_level) {
        eprintln!("telemetry-subscriber: {e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Subscriber stopped: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: SubscriberAgentConfig) -> Result<(), AgentError> {
    let sink = PersistentSink::create(&config.output_dir)?;
    let mqtt_config = config.broker.mqtt_config()?;
    info!(
        "Connecting to broker at {}:{} as {}",
        mqtt_config.host, mqtt_config.port, mqtt_config.client_id
    );
    let mut transport = MqttTransport::connect(&mqtt_config).await?;

    let mut manager = SubscriptionManager::new(CONTROL_TOPIC, sink);
    tokio::select! {
        result = manager.run(&mut transport) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    info!(
        "Received messages on {} topics in {}",
        manager.subscriptions().len(),
        manager.sink().run_dir().display()
    );
    transport.disconnect().await?;
    Ok(())
}
