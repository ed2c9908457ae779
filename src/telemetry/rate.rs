//! Bandwidth rate estimation from cumulative counters.

use std::time::Instant;

use serde::Serialize;

use crate::controller::TrafficCounters;

/// Cumulative totals plus per-second rates, as handed to the traffic observer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficStats {
    /// Total bytes uploaded.
    pub upload: u64,
    /// Total bytes downloaded.
    pub download: u64,
    /// Upload rate in bytes per second.
    pub upload_speed: u64,
    /// Download rate in bytes per second.
    pub download_speed: u64,
}

impl TrafficStats {
    /// Totals with zero rates.
    pub fn from_counters(counters: TrafficCounters) -> Self {
        Self {
            upload: counters.up,
            download: counters.down,
            upload_speed: 0,
            download_speed: 0,
        }
    }
}

/// Turns successive counter samples into rates.
#[derive(Debug, Default)]
pub struct RateMeter {
    previous: Option<(TrafficCounters, Instant)>,
}

impl RateMeter {
    /// Create a meter with no prior sample.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample taken at `now`.
    ///
    /// Returns stats only when a prior sample exists and time has advanced.
    /// The stored sample always moves forward. A counter that went backwards
    /// (engine restarted) reports a rate of zero.
    pub fn sample(&mut self, counters: TrafficCounters, now: Instant) -> Option<TrafficStats> {
        let stats = self.previous.and_then(|(prev, at)| {
            let elapsed = now.checked_duration_since(at)?.as_secs_f64();
            if elapsed <= 0.0 {
                return None;
            }
            Some(TrafficStats {
                upload: counters.up,
                download: counters.down,
                upload_speed: per_second(counters.up.saturating_sub(prev.up), elapsed),
                download_speed: per_second(counters.down.saturating_sub(prev.down), elapsed),
            })
        });

        self.previous = Some((counters, now));
        stats
    }
}

fn per_second(delta: u64, elapsed_secs: f64) -> u64 {
    (delta as f64 / elapsed_secs) as u64
}
