// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::AgentError;

/// Filter directives for `log_level`, with the MQTT client's own logging capped at warn.
pub fn env_filter_directives(log_level: &str) -> String {
    format!("rumqttc=warn,{log_level}")
}

/// Installs the global `fmt` subscriber.
pub fn init_tracing(log_level: &str) -> Result<(), AgentError> {
    let env_filter = EnvFilter::try_new(env_filter_directives(log_level))
        .map_err(|e| AgentError::Logging(e.to_string()))?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AgentError::Logging(e.to_string()))?;

    debug!("Logging subsystem enabled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_directives() {
        assert_eq!(env_filter_directives("debug"), "rumqttc=warn,debug");
        assert!(EnvFilter::try_new(env_filter_directives("info")).is_ok());
    }
}
