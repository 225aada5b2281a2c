// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! CPU limit computation from control group settings.
//!
//! The limit is expressed as a percentage of one core: a process allowed two full
//! CPUs has a limit of 200.

use std::io;

use tracing::debug;

/// Raw control group CPU settings, normalized to nanoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CgroupStats {
    pub cpu_count: Option<u64>,        // Logical CPUs in the cpuset
    pub scheduler_period: Option<u64>, // CFS scheduler period in nanoseconds
    pub scheduler_quota: Option<u64>,  // CFS scheduler quota in nanoseconds, None when unlimited
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CpuLimit {
    pub percent: f64,
    /// True when no limit was found and the host CPU count was used instead.
    pub defaulted: bool,
}

pub trait CpuLimitReader: Send {
    fn read(&self) -> CpuLimit;
}

/// Counts the CPUs of a cpuset list such as `0-2,16` (four CPUs).
pub fn parse_cpuset(contents: &str) -> Result<u64, io::Error> {
    let cpuset = contents.trim();
    if cpuset.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "cpuset is empty"));
    }

    let invalid = |part: &str, e: std::num::ParseIntError| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse cpuset entry {part:?}: {e}"),
        )
    };

    let mut cpu_count: u64 = 0;
    for part in cpuset.split(',') {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: u64 = start.trim().parse().map_err(|e| invalid(part, e))?;
                let end: u64 = end.trim().parse().map_err(|e| invalid(part, e))?;
                if end < start {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("Descending cpuset range {part:?}"),
                    ));
                }
                cpu_count += end - start + 1;
            }
            None => {
                part.trim().parse::<u64>().map_err(|e| invalid(part, e))?;
                cpu_count += 1;
            }
        }
    }
    Ok(cpu_count)
}

/// Parses cgroup v2 `cpu.max` (`"<quota> <period>"` in microseconds, quota may be
/// `max`) into `(quota, period)` in nanoseconds.
pub fn parse_cpu_max(contents: &str) -> (Option<u64>, Option<u64>) {
    let mut fields = contents.split_whitespace();
    let quota = fields
        .next()
        .filter(|quota| *quota != "max")
        .and_then(|quota| quota.parse::<u64>().ok())
        .map(|us| us * 1000);
    let period = fields
        .next()
        .and_then(|period| period.parse::<u64>().ok())
        .map(|us| us * 1000);
    (quota, period)
}

/// Limit from cgroup settings: the smaller of the cpuset size and the CFS quota.
///
/// A cpuset covering every host CPU is not a limit.
pub fn compute_cgroup_cpu_limit_pct(stats: &CgroupStats, host_cpu_count: u64) -> Option<f64> {
    let mut limit_pct = stats
        .cpu_count
        .filter(|count| *count != host_cpu_count)
        .map(|count| count as f64 * 100.0);
    if let Some(pct) = limit_pct {
        debug!("CPU limit from cpuset: {pct}%");
    }

    if let (Some(quota), Some(period)) = (stats.scheduler_quota, stats.scheduler_period) {
        if period > 0 {
            let quota_pct = 100.0 * (quota as f64 / period as f64);
            match limit_pct {
                Some(current) if current <= quota_pct => {
                    debug!("Keeping cpuset limit {current}% over CFS quota {quota_pct}%");
                }
                _ => {
                    debug!("CPU limit from CFS quota: {quota_pct}%");
                    limit_pct = Some(quota_pct);
                }
            }
        }
    }
    limit_pct
}

pub fn compute_cpu_limit(stats: &CgroupStats, host_cpu_count: u64) -> CpuLimit {
    match compute_cgroup_cpu_limit_pct(stats, host_cpu_count) {
        Some(percent) => CpuLimit {
            percent,
            defaulted: false,
        },
        None => {
            debug!("No CPU limit found, defaulting to host CPU count: {host_cpu_count} CPUs");
            CpuLimit {
                percent: host_cpu_count as f64 * 100.0,
                defaulted: true,
            }
        }
    }
}
