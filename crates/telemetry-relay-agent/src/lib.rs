// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process wiring for the telemetry relay: environment configuration, logging setup and
//! the error type shared by the `telemetry-publisher` and `telemetry-subscriber` binaries.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{BrokerConfig, PublisherAgentConfig, SubscriberAgentConfig};
pub use error::AgentError;
