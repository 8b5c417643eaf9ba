// SPDX-License-Identifier: GPL-3.0-only

//! Host health metrics for dashboard health reports
//!
//! Every reading is optional; a missing file or unexpected format yields `None`.

use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::debug;

const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";
const MEMINFO: &str = "/proc/meminfo";
const UPTIME: &str = "/proc/uptime";
const CPUINFO: &str = "/proc/cpuinfo";
const WIRELESS: &str = "/proc/net/wireless";

/// Interface whose signal level is reported
const WIFI_INTERFACE: &str = "wlan0";

/// Snapshot of host health
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// CPU temperature in °C
    pub temperature: Option<f64>,
    pub storage_used_percent: Option<f64>,
    pub memory_usage_percent: Option<f64>,
    pub uptime_seconds: Option<u64>,
    /// WiFi signal level in dBm
    pub signal_strength: Option<i32>,
}

impl SystemMetrics {
    /// Read all metrics; `storage_root` selects the filesystem to measure
    pub fn collect(storage_root: &Path) -> Self {
        let metrics = Self {
            temperature: read(THERMAL_ZONE).as_deref().and_then(parse_thermal),
            storage_used_percent: storage_used_percent(storage_root),
            memory_usage_percent: read(MEMINFO).as_deref().and_then(parse_meminfo),
            uptime_seconds: read(UPTIME).as_deref().and_then(parse_uptime),
            signal_strength: read(WIRELESS)
                .as_deref()
                .and_then(|content| parse_wireless(content, WIFI_INTERFACE)),
        };
        debug!(?metrics, "Collected system metrics");
        metrics
    }
}

fn read(path: &str) -> Option<String> {
    std::fs::read_to_string(path)
        .inspect_err(|e| debug!(path, error = %e, "Metric source unavailable"))
        .ok()
}

/// Millidegrees → degrees
fn parse_thermal(content: &str) -> Option<f64> {
    content.trim().parse::<i64>().ok().map(|m| m as f64 / 1000.0)
}

/// `(MemTotal - MemAvailable) / MemTotal` in percent
fn parse_meminfo(content: &str) -> Option<f64> {
    let field = |name: &str| {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            rest.split_whitespace().next()?.parse::<u64>().ok()
        })
    };
    let total = field("MemTotal")?;
    let available = field("MemAvailable")?;
    if total == 0 {
        return None;
    }
    Some(total.saturating_sub(available) as f64 / total as f64 * 100.0)
}

fn parse_uptime(content: &str) -> Option<u64> {
    let seconds: f64 = content.split_whitespace().next()?.parse().ok()?;
    Some(seconds as u64)
}

/// Signal level column of `interface` in `/proc/net/wireless`
///
/// ```text
///  face | tus | link level noise | ...
///  wlan0: 0000   54.  -56.  -256  ...
/// ```
fn parse_wireless(content: &str, interface: &str) -> Option<i32> {
    content.lines().find_map(|line| {
        let rest = line.trim_start().strip_prefix(interface)?.strip_prefix(':')?;
        let level = rest.split_whitespace().nth(2)?;
        let dbm: f64 = level.trim_end_matches('.').parse().ok()?;
        Some(dbm.round() as i32)
    })
}

/// `Serial` line of `/proc/cpuinfo` (Raspberry Pi board serial)
fn parse_cpu_serial(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "Serial")
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Board serial number, or `unknown-hardware`
pub fn hardware_id() -> String {
    read(CPUINFO)
        .as_deref()
        .and_then(parse_cpu_serial)
        .unwrap_or_else(|| "unknown-hardware".to_string())
}

/// Used space of the filesystem holding `path`, via statvfs(3)
fn storage_used_percent(path: &Path) -> Option<f64> {
    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    // SAFETY: statvfs only writes into the zeroed struct we own
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        debug!(path = %path.display(), error = %std::io::Error::last_os_error(), "statvfs failed");
        return None;
    }

    let block = stat.f_frsize as u64;
    let total = stat.f_blocks as u64 * block;
    let free = stat.f_bfree as u64 * block;
    if total == 0 {
        return None;
    }
    Some(total.saturating_sub(free) as f64 / total as f64 * 100.0)
}
