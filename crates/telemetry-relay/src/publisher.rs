// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The publisher run: announce topics, publish metric samples at a fixed cadence for the
//! configured duration, then publish the access and error log bundles.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::announcer::TopicAnnouncer;
use crate::bundle::{access_bundle, error_bundle};
use crate::constants::{
    ACCESS_LOG_PATTERN, ACCESS_LOG_TOPIC, ERROR_LOG_PATTERN, ERROR_LOG_TOPIC, PUBLISH_INTERVAL,
    RUN_DURATION,
};
use crate::errors::PublishError;
use crate::log_source::LogSource;
use crate::snapshot::MetricsSampler;
use crate::transport::Transport;

#[derive(Clone, Debug)]
pub struct PublisherConfig {
    pub run_duration: Duration,
    pub publish_interval: Duration,
    pub announcer: TopicAnnouncer,
    /// Directory searched recursively for web server logs.
    pub log_root: PathBuf,
    pub access_log_topic: String,
    pub error_log_topic: String,
    pub access_log_pattern: String,
    pub error_log_pattern: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            run_duration: RUN_DURATION,
            publish_interval: PUBLISH_INTERVAL,
            announcer: TopicAnnouncer::default(),
            log_root: PathBuf::from("/var/log/apache2"),
            access_log_topic: ACCESS_LOG_TOPIC.to_string(),
            error_log_topic: ERROR_LOG_TOPIC.to_string(),
            access_log_pattern: ACCESS_LOG_PATTERN.to_string(),
            error_log_pattern: ERROR_LOG_PATTERN.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub announced: usize,
    pub ticks: u64,
    pub published: u64,
}

pub struct Publisher<S> {
    config: PublisherConfig,
    sampler: S,
    cancel_token: CancellationToken,
}

impl<S: MetricsSampler> Publisher<S> {
    pub fn new(config: PublisherConfig, sampler: S, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            sampler,
            cancel_token,
        }
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Runs the whole publisher sequence over `transport` and disconnects it at the end.
    ///
    /// Cancellation is checked once per tick; it cuts the sampling loop short but the log
    /// bundles are still published.
    pub async fn run<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<RunSummary, PublishError> {
        let mut summary = RunSummary::default();

        let initial = self.sampler.sample();
        let topics = TopicAnnouncer::topics_for(
            &initial,
            [
                self.config.access_log_topic.as_str(),
                self.config.error_log_topic.as_str(),
            ],
        );
        summary.announced = self.config.announcer.announce(transport, &topics).await?;

        info!("Running for {:?}", self.config.run_duration);
        let start = Instant::now();
        loop {
            let tick_start = Instant::now();
            let snapshot = self.sampler.sample();
            for (path, value) in snapshot.flatten() {
                transport
                    .publish(path.as_str(), value.to_string().into_bytes())
                    .await?;
                info!("{:15}: {}", path.as_str(), value);
                summary.published += 1;
            }
            summary.ticks += 1;

            if tick_start.duration_since(start) > self.config.run_duration {
                break;
            }
            tokio::select! {
                () = sleep(self.config.publish_interval) => {}
                () = self.cancel_token.cancelled() => {
                    info!("Publishing cancelled after {} ticks", summary.ticks);
                    break;
                }
            }
        }

        self.publish_log_bundles(transport).await?;
        summary.published += 2;

        transport.disconnect().await?;
        debug!("Publisher run finished: {summary:?}");
        Ok(summary)
    }

    async fn publish_log_bundles<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
    ) -> Result<(), PublishError> {
        let access = LogSource::new(&self.config.log_root, &self.config.access_log_pattern);
        let payload = access_bundle(&access)?;
        info!(
            "Publishing {} bytes of access logs on {}",
            payload.len(),
            self.config.access_log_topic
        );
        transport
            .publish(&self.config.access_log_topic, payload)
            .await?;

        let errors = LogSource::new(&self.config.log_root, &self.config.error_log_pattern);
        let payload = error_bundle(&errors)?;
        info!(
            "Publishing {} bytes of error logs on {}",
            payload.len(),
            self.config.error_log_topic
        );
        transport
            .publish(&self.config.error_log_topic, payload)
            .await?;
        Ok(())
    }
}
