// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! MQTT implementation of [`Transport`].
//!
//! The MQTT client needs its event loop polled for anything to reach the network, so
//! [`MqttTransport::connect`] spawns a task that drives it. Delivered publications are
//! forwarded to the transport through a bounded channel; a lost connection is recorded
//! and reported by the next call on the transport.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::errors::TransportError;
use crate::transport::{Message, Transport};

pub const DEFAULT_PORT: u16 = 1883;

/// Maps an MQTT QoS level (0, 1 or 2) to the client's representation.
pub fn qos_from_level(level: u8) -> Option<QoS> {
    match level {
        0 => Some(QoS::AtMostOnce),
        1 => Some(QoS::AtLeastOnce),
        2 => Some(QoS::ExactlyOnce),
        _ => None,
    }
}

#[derive(Clone, Debug)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub qos: QoS,
    pub keep_alive: Duration,
    /// Largest packet accepted or sent; log bundles are published as one message.
    pub max_packet_size: usize,
    pub connect_timeout: Duration,
    /// Capacity of both the request queue and the inbound message queue.
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            client_id: "telemetry-relay".to_string(),
            qos: QoS::AtMostOnce,
            keep_alive: Duration::from_secs(60),
            max_packet_size: 64 * 1024 * 1024,
            connect_timeout: Duration::from_secs(10),
            channel_capacity: 1024,
        }
    }
}

pub struct MqttTransport {
    client: AsyncClient,
    qos: QoS,
    address: String,
    disconnect_timeout: Duration,
    inbound: mpsc::Receiver<Message>,
    connection_lost: watch::Receiver<Option<String>>,
    event_loop_task: Option<JoinHandle<()>>,
}

impl MqttTransport {
    /// Connects to the broker, waiting for its CONNACK so that an unreachable broker is
    /// reported here rather than on the first publish.
    pub async fn connect(config: &MqttConfig) -> Result<Self, TransportError> {
        let address = format!("{}:{}", config.host, config.port);

        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_max_packet_size(config.max_packet_size, config.max_packet_size);

        let (client, event_loop) = AsyncClient::new(options, config.channel_capacity);
        let (inbound_tx, inbound) = mpsc::channel(config.channel_capacity);
        let (lost_tx, connection_lost) = watch::channel(None);
        let (connected_tx, connected_rx) = oneshot::channel();

        let event_loop_task = tokio::spawn(drive_event_loop(
            event_loop,
            inbound_tx,
            lost_tx,
            connected_tx,
        ));

        match timeout(config.connect_timeout, connected_rx).await {
            Ok(Ok(Ok(()))) => {
                info!("Connected to broker at {address}");
            }
            Ok(Ok(Err(reason))) => {
                event_loop_task.abort();
                return Err(TransportError::Connect { address, reason });
            }
            Ok(Err(_)) => {
                return Err(TransportError::Connect {
                    address,
                    reason: "event loop stopped before the broker answered".to_string(),
                });
            }
            Err(_) => {
                event_loop_task.abort();
                return Err(TransportError::ConnectTimeout(address));
            }
        }

        Ok(Self {
            client,
            qos: config.qos,
            address,
            disconnect_timeout: config.connect_timeout,
            inbound,
            connection_lost,
            event_loop_task: Some(event_loop_task),
        })
    }

    fn check_connection(&self) -> Result<(), TransportError> {
        match self.connection_lost.borrow().as_ref() {
            Some(reason) => Err(TransportError::Connection(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.check_connection()?;
        self.client
            .subscribe(topic, self.qos)
            .await
            .map_err(|e| TransportError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.check_connection()?;
        self.client
            .publish(topic, self.qos, false, payload)
            .await
            .map_err(|e| TransportError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn next_message(&mut self) -> Result<Message, TransportError> {
        match self.inbound.recv().await {
            Some(message) => Ok(message),
            None => {
                self.check_connection()?;
                Err(TransportError::Disconnected)
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(task) = self.event_loop_task.take() else {
            return Ok(());
        };

        if let Err(e) = self.client.disconnect().await {
            task.abort();
            return Err(TransportError::Connection(e.to_string()));
        }

        match timeout(self.disconnect_timeout, task).await {
            Ok(Ok(())) => {
                debug!("Disconnected from broker at {}", self.address);
                Ok(())
            }
            Ok(Err(e)) => Err(TransportError::Connection(e.to_string())),
            Err(_) => {
                warn!(
                    "Timed out flushing to broker at {}, dropping pending messages",
                    self.address
                );
                Err(TransportError::Disconnected)
            }
        }
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(task) = self.event_loop_task.take() {
            task.abort();
        }
    }
}

async fn drive_event_loop(
    mut event_loop: EventLoop,
    inbound: mpsc::Sender<Message>,
    connection_lost: watch::Sender<Option<String>>,
    connected: oneshot::Sender<Result<(), String>>,
) {
    let mut connected = Some(connected);
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                debug!("Broker accepted connection: {:?}", ack.code);
                if let Some(tx) = connected.take() {
                    if tx.send(Ok(())).is_err() {
                        debug!("Connection waiter dropped before CONNACK");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = Message {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                if inbound.send(message).await.is_err() {
                    trace!("Dropping inbound message, transport is gone");
                }
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                debug!("Subscription acknowledged: {:?}", ack.return_codes);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("Disconnect sent to broker");
                break;
            }
            Ok(event) => trace!("MQTT event: {event:?}"),
            Err(e) => {
                match connected.take() {
                    Some(tx) => {
                        if tx.send(Err(e.to_string())).is_err() {
                            debug!("Connection waiter dropped: {e}");
                        }
                    }
                    None => {
                        error!("Connection to broker lost: {e}");
                        connection_lost.send_replace(Some(e.to_string()));
                    }
                }
                break;
            }
        }
    }
}
