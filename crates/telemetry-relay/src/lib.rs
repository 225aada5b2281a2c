// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Telemetry Relay
//!
//! Building blocks for relaying host telemetry and web server logs over an MQTT broker.
//!
//! Topics are discovered dynamically: the publisher announces every topic it will use on
//! a well-known control topic, and the subscriber subscribes to whatever is announced,
//! appending each received message to a per-topic file.
//!
//! - [`publisher`]: announce, sample-and-publish loop, log bundles
//! - [`subscription`]: control-topic handling and message routing
//! - [`sink`]: per-topic append-only files
//! - [`access_log`]: Apache Combined Log Format parser
//! - [`mqtt`]: [`transport::Transport`] over `rumqttc`

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod access_log;
pub mod announcer;
pub mod bundle;
pub mod constants;
pub mod errors;
pub mod log_source;
pub mod mqtt;
pub mod publisher;
pub mod sink;
pub mod snapshot;
pub mod subscription;
pub mod transport;
pub mod util;
