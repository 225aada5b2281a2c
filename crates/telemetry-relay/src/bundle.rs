// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log bundles: whole log files serialized into a single message payload.

use tracing::debug;

use crate::access_log::{parse_lines, LogRecord};
use crate::errors::{BundleError, LogSourceError};
use crate::log_source::{LogLine, LogSource};

/// Parses every access-log line from `lines`, stopping at the first source or parse
/// failure. Non-matching lines are skipped.
pub fn collect_access_records<I>(lines: I) -> Result<Vec<LogRecord>, BundleError>
where
    I: IntoIterator<Item = Result<LogLine, LogSourceError>>,
{
    parse_lines(lines.into_iter().map(|line| line.map_err(BundleError::from))).collect()
}

/// JSON array of the access-log records found by `source`.
pub fn access_bundle(source: &LogSource) -> Result<Vec<u8>, BundleError> {
    let records = collect_access_records(source.lines()?)?;
    debug!(
        "Parsed {} access log records under {}",
        records.len(),
        source.root().display()
    );
    Ok(serde_json::to_vec(&records)?)
}

/// JSON array of the raw error-log lines found by `source`.
pub fn error_bundle(source: &LogSource) -> Result<Vec<u8>, BundleError> {
    let lines = source
        .lines()?
        .map(|line| line.map(|line| line.text))
        .collect::<Result<Vec<String>, _>>()?;
    debug!(
        "Read {} error log lines under {}",
        lines.len(),
        source.root().display()
    );
    Ok(serde_json::to_vec(&lines)?)
}
