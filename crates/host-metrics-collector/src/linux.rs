// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Readers for Linux pseudo-files: control group CPU settings and thermal zones.
//!
//! Missing or unreadable files are not errors; the value is simply absent.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cpu::{compute_cpu_limit, parse_cpu_max, parse_cpuset, CgroupStats, CpuLimit, CpuLimitReader};

const CGROUP_ROOT: &str = "/sys/fs/cgroup";
// cgroup v1, relative to the root
const CGROUP_V1_CPUSET_CPUS: &str = "cpuset/cpuset.cpus";
const CGROUP_V1_CPU_PERIOD: &str = "cpu/cpu.cfs_period_us";
const CGROUP_V1_CPU_QUOTA: &str = "cpu/cpu.cfs_quota_us";
// cgroup v2, relative to the root
const CGROUP_V2_CPU_MAX: &str = "cpu.max";
const CGROUP_V2_CPUSET_CPUS: &str = "cpuset.cpus.effective";

pub const THERMAL_ZONE_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

pub struct LinuxCpuLimitReader {
    root: PathBuf,
    host_cpu_count: u64,
}

impl Default for LinuxCpuLimitReader {
    fn default() -> Self {
        Self::new(CGROUP_ROOT, num_cpus::get() as u64)
    }
}

impl LinuxCpuLimitReader {
    pub fn new(root: impl Into<PathBuf>, host_cpu_count: u64) -> Self {
        Self {
            root: root.into(),
            host_cpu_count,
        }
    }

    fn read_cgroup_stats(&self) -> CgroupStats {
        let cpu_max = self.root.join(CGROUP_V2_CPU_MAX);
        if let Ok(contents) = fs::read_to_string(&cpu_max) {
            debug!("Reading cgroup v2 CPU settings from {}", self.root.display());
            let (scheduler_quota, scheduler_period) = parse_cpu_max(&contents);
            return CgroupStats {
                cpu_count: read_cpuset(&self.root.join(CGROUP_V2_CPUSET_CPUS)),
                scheduler_period,
                scheduler_quota,
            };
        }

        let scheduler_period = read_u64(&self.root.join(CGROUP_V1_CPU_PERIOD)).map(|us| us * 1000);
        let scheduler_quota = fs::read_to_string(self.root.join(CGROUP_V1_CPU_QUOTA))
            .ok()
            .and_then(|contents| contents.trim().parse::<i64>().ok())
            .and_then(|quota| {
                // -1 means no quota
                u64::try_from(quota).ok().map(|us| us * 1000)
            });
        CgroupStats {
            cpu_count: read_cpuset(&self.root.join(CGROUP_V1_CPUSET_CPUS)),
            scheduler_period,
            scheduler_quota,
        }
    }
}

impl CpuLimitReader for LinuxCpuLimitReader {
    fn read(&self) -> CpuLimit {
        compute_cpu_limit(&self.read_cgroup_stats(), self.host_cpu_count)
    }
}

fn read_u64(path: &Path) -> Option<u64> {
    let value = fs::read_to_string(path)
        .ok()
        .and_then(|contents| contents.trim().parse::<u64>().ok());
    if value.is_none() {
        debug!("Could not read integer from {}", path.display());
    }
    value
}

fn read_cpuset(path: &Path) -> Option<u64> {
    match fs::read_to_string(path).and_then(|contents| parse_cpuset(&contents)) {
        Ok(count) => Some(count),
        Err(e) => {
            debug!("Could not read CPU count from {}: {e}", path.display());
            None
        }
    }
}

/// Temperature from a thermal zone file, which holds millidegrees Celsius.
pub fn read_thermal_zone(path: &Path) -> Option<f64> {
    let millidegrees = fs::read_to_string(path)
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()?;
    Some(millidegrees as f64 / 1000.0)
}
