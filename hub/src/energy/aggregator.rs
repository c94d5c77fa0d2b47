//! Energy aggregation
//!
//! Pure functions over a device snapshot. Nothing is cached; callers load
//! the current collection and recompute on every read.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::HubError;
use crate::models::device::Device;
use crate::models::room::Room;
use crate::utils::millis_to_datetime;

const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Time-series resolution for charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// 24 hourly buckets ending with the current hour
    Daily,
    /// 7 daily buckets ending with today
    Weekly,
    /// 30 daily buckets ending with today
    Monthly,
}

impl Granularity {
    pub fn bucket_count(&self) -> usize {
        match self {
            Granularity::Daily => 24,
            Granularity::Weekly => 7,
            Granularity::Monthly => 30,
        }
    }

    fn bucket_ms(&self) -> i64 {
        match self {
            Granularity::Daily => HOUR_MS,
            Granularity::Weekly | Granularity::Monthly => DAY_MS,
        }
    }

    fn label_format(&self) -> &'static str {
        match self {
            Granularity::Daily => "%H:00",
            Granularity::Weekly => "%a",
            Granularity::Monthly => "%m-%d",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

impl FromStr for Granularity {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            _ => Err(HubError::ValidationError(format!("unknown granularity: {}", s))),
        }
    }
}

/// One chart bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsagePoint {
    pub label: String,
    /// Bucket start, epoch millis
    pub start: i64,
    /// kWh attributed to the bucket
    pub usage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomEnergy {
    pub room: String,
    pub energy: f64,
    pub device_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceEnergy {
    pub device_id: String,
    pub name: String,
    pub room: String,
    pub energy: f64,
}

/// Live kWh of the devices whose `room` equals `room` exactly
pub fn calculate_room_energy(devices: &[Device], room: &str, now: i64) -> f64 {
    devices
        .iter()
        .filter(|d| d.room == room)
        .map(|d| d.live_energy(now))
        .sum()
}

/// Live kWh of every device
pub fn house_total(devices: &[Device], now: i64) -> f64 {
    devices.iter().map(|d| d.live_energy(now)).sum()
}

/// Per-room totals sorted by room name.
///
/// Includes every known room (zero when empty) and every room name a device
/// references, so the totals always add up to [`house_total`].
pub fn room_breakdown(devices: &[Device], rooms: &[Room], now: i64) -> Vec<RoomEnergy> {
    let mut totals: BTreeMap<&str, RoomEnergy> = BTreeMap::new();

    for room in rooms {
        totals.entry(room.name.as_str()).or_insert_with(|| RoomEnergy {
            room: room.name.clone(),
            energy: 0.0,
            device_count: 0,
        });
    }

    for device in devices {
        let entry = totals.entry(device.room.as_str()).or_insert_with(|| RoomEnergy {
            room: device.room.clone(),
            energy: 0.0,
            device_count: 0,
        });
        entry.energy += device.live_energy(now);
        entry.device_count += 1;
    }

    totals.into_values().collect()
}

/// Per-device live kWh, largest consumer first
pub fn device_breakdown(devices: &[Device], now: i64) -> Vec<DeviceEnergy> {
    let mut breakdown: Vec<DeviceEnergy> = devices
        .iter()
        .map(|d| DeviceEnergy {
            device_id: d.id.clone(),
            name: d.name.clone(),
            room: d.room.clone(),
            energy: d.live_energy(now),
        })
        .collect();
    breakdown.sort_by(|a, b| b.energy.total_cmp(&a.energy));
    breakdown
}

/// Fixed-length usage series ending with the bucket containing `now`.
///
/// Buckets are aligned to whole hours or days in `offset`. Each usage
/// interval contributes its draw over the part of the bucket it overlaps;
/// open intervals are projected up to `now`. Empty buckets report `0.0`.
pub fn usage_series(
    devices: &[Device],
    granularity: Granularity,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<UsagePoint> {
    let now_ms = now.timestamp_millis();
    let span = granularity.bucket_ms();
    let count = granularity.bucket_count() as i64;

    let offset_ms = offset.local_minus_utc() as i64 * 1000;
    let local_now = now_ms + offset_ms;
    let current_start = local_now - local_now.rem_euclid(span) - offset_ms;

    (0..count)
        .map(|i| {
            let start = current_start - (count - 1 - i) * span;
            let end = start + span;
            let usage = devices
                .iter()
                .flat_map(|d| d.usage_history.iter())
                .map(|interval| interval.energy_between(start, end, now_ms))
                .sum();
            let label = millis_to_datetime(start)
                .with_timezone(&offset)
                .format(granularity.label_format())
                .to_string();
            UsagePoint { label, start, usage }
        })
        .collect()
}
