// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Host metrics sampler.
//!
//! Produces the same tree shape on every sample of a host:
//!
//! ```text
//! cpu/{usage,count,frequency,limit}, cpu/load/{one,five,fifteen}
//! memory/{total,used,available,percent}, swap/{total,used}
//! disk/{total,used,available,percent}
//! uptime
//! temperature/<sensor>
//! ```

use std::path::PathBuf;

use sysinfo::{Components, Disks, System};
use telemetry_relay::snapshot::{MetricsSampler, MetricsSnapshot};
use telemetry_relay::util::sanitize_topic_segment;
use tracing::debug;

use crate::cpu::CpuLimitReader;
use crate::linux::{read_thermal_zone, LinuxCpuLimitReader, THERMAL_ZONE_PATH};

const THERMAL_ZONE_SENSOR: &str = "thermal_zone0";

pub struct HostSampler {
    system: System,
    disks: Disks,
    components: Components,
    cpu_limit: Box<dyn CpuLimitReader>,
    thermal_zone: PathBuf,
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new(Box::new(LinuxCpuLimitReader::default()))
    }
}

impl HostSampler {
    pub fn new(cpu_limit: Box<dyn CpuLimitReader>) -> Self {
        let mut system = System::new();
        // CPU usage is a delta between two refreshes
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            components: Components::new_with_refreshed_list(),
            cpu_limit,
            thermal_zone: PathBuf::from(THERMAL_ZONE_PATH),
        }
    }

    #[must_use]
    pub fn with_thermal_zone(mut self, path: impl Into<PathBuf>) -> Self {
        self.thermal_zone = path.into();
        self
    }

    fn cpu(&self) -> MetricsSnapshot {
        let load = System::load_average();
        let frequency = self.system.cpus().first().map_or(0, |cpu| cpu.frequency());
        let limit = self.cpu_limit.read();
        if limit.defaulted {
            debug!(
                "No cgroup CPU limit found, reporting the host CPU count as {}%",
                limit.percent
            );
        }
        MetricsSnapshot::new()
            .with(
                "usage",
                round2(f64::from(self.system.global_cpu_info().cpu_usage())),
            )
            .with("count", num_cpus::get())
            .with("frequency", frequency)
            .with("limit", round2(limit.percent))
            .with(
                "load",
                MetricsSnapshot::new()
                    .with("one", round2(load.one))
                    .with("five", round2(load.five))
                    .with("fifteen", round2(load.fifteen)),
            )
    }

    fn memory(&self) -> MetricsSnapshot {
        let total = self.system.total_memory();
        let available = self.system.available_memory();
        MetricsSnapshot::new()
            .with("total", total)
            .with("used", self.system.used_memory())
            .with("available", available)
            .with("percent", percent(total.saturating_sub(available), total))
    }

    fn swap(&self) -> MetricsSnapshot {
        MetricsSnapshot::new()
            .with("total", self.system.total_swap())
            .with("used", self.system.used_swap())
    }

    fn disk(&self) -> MetricsSnapshot {
        let (total, available) = self.disks.iter().fold((0u64, 0u64), |(t, a), disk| {
            (
                t.saturating_add(disk.total_space()),
                a.saturating_add(disk.available_space()),
            )
        });
        let used = total.saturating_sub(available);
        MetricsSnapshot::new()
            .with("total", total)
            .with("used", used)
            .with("available", available)
            .with("percent", percent(used, total))
    }

    fn temperature(&self) -> MetricsSnapshot {
        let mut sensors = MetricsSnapshot::new();
        for component in self.components.iter() {
            if let Some(name) = sanitize_topic_segment(component.label()) {
                sensors.insert(name, round2(f64::from(component.temperature())));
            }
        }
        if sensors.is_empty() {
            match read_thermal_zone(&self.thermal_zone) {
                Some(celsius) => sensors.insert(THERMAL_ZONE_SENSOR, round2(celsius)),
                None => debug!("No temperature sensors found"),
            }
        }
        sensors
    }
}

impl MetricsSampler for HostSampler {
    fn sample(&mut self) -> MetricsSnapshot {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.disks.refresh();
        self.components.refresh();

        let mut snapshot = MetricsSnapshot::new()
            .with("cpu", self.cpu())
            .with("memory", self.memory())
            .with("swap", self.swap())
            .with("disk", self.disk())
            .with("uptime", System::uptime());
        let temperature = self.temperature();
        if !temperature.is_empty() {
            snapshot.insert("temperature", temperature);
        }
        snapshot
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(part as f64 / total as f64 * 100.0)
}
