//! Device records and usage-interval bookkeeping

use serde::{Deserialize, Serialize};

use crate::errors::HubError;

/// Milliseconds per hour
pub const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Convert a power draw held over a span of milliseconds into kWh.
///
/// Negative power and inverted spans both contribute zero.
pub fn energy_kwh(power_watts: f64, start_ms: i64, end_ms: i64) -> f64 {
    let power = clamp_power(power_watts);
    let span = end_ms.saturating_sub(start_ms).max(0) as f64;
    power * span / MILLIS_PER_HOUR / 1000.0
}

/// Negative or non-finite power draws are treated as zero
pub fn clamp_power(power_watts: f64) -> f64 {
    if power_watts.is_finite() && power_watts > 0.0 {
        power_watts
    } else {
        0.0
    }
}

/// Device category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Light,
    Thermostat,
    Fan,
    Tv,
    AirConditioner,
    Speaker,
    Camera,
    Lock,
    Plug,
    Appliance,
    #[serde(other)]
    Other,
}

/// Power state of a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    On,
    #[default]
    Off,
}

impl DeviceStatus {
    pub fn flipped(self) -> Self {
        match self {
            DeviceStatus::On => DeviceStatus::Off,
            DeviceStatus::Off => DeviceStatus::On,
        }
    }
}

/// A span during which the device was continuously powered on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageInterval {
    /// Epoch millis the device was switched on
    pub start_time: i64,

    /// Epoch millis the device was switched off; absent while still on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,

    /// Nominal draw in watts for the whole interval
    #[serde(default)]
    pub power_consumption: f64,

    /// kWh consumed; only meaningful once the interval is closed
    #[serde(default)]
    pub energy_consumed: f64,
}

impl UsageInterval {
    pub fn open(start_time: i64, power_consumption: f64) -> Self {
        Self {
            start_time,
            end_time: None,
            power_consumption: clamp_power(power_consumption),
            energy_consumed: 0.0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Close the interval at `end_time`, returning the kWh it accrued.
    ///
    /// Closed intervals are always at least one millisecond long.
    fn close(&mut self, end_time: i64) -> f64 {
        let end_time = end_time.max(self.start_time.saturating_add(1));
        self.end_time = Some(end_time);
        self.energy_consumed = energy_kwh(self.power_consumption, self.start_time, end_time);
        self.energy_consumed
    }

    /// kWh accrued inside `[from, to)`, projecting open intervals up to `now`
    pub fn energy_between(&self, from: i64, to: i64, now: i64) -> f64 {
        let start = self.start_time.max(from);
        let end = self.end_time.unwrap_or(now).min(to);
        energy_kwh(self.power_consumption, start, end)
    }
}

/// One controllable smart-home endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    /// Room name this device belongs to
    pub room: String,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<u8>,
    /// Instantaneous draw in watts
    #[serde(default)]
    pub power_consumption: f64,
    /// Cumulative kWh over closed intervals
    #[serde(default)]
    pub total_energy_consumed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status_change: Option<i64>,
    #[serde(default)]
    pub usage_history: Vec<UsageInterval>,
}

/// Mode-specific attribute changes
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeUpdate {
    pub brightness: Option<u8>,
    pub temperature: Option<f64>,
    pub speed: Option<u8>,
    pub power_consumption: Option<f64>,
}

impl Device {
    /// Create a new switched-off device with no history
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        device_type: DeviceType,
        room: impl Into<String>,
        power_consumption: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device_type,
            room: room.into(),
            status: DeviceStatus::Off,
            brightness: None,
            temperature: None,
            speed: None,
            power_consumption,
            total_energy_consumed: 0.0,
            last_status_change: None,
            usage_history: Vec::new(),
        }
    }

    /// Reject records that could not have come from [`Device::new`].
    ///
    /// Usage history and accrued energy are owned by the hub, so a newly
    /// registered device must arrive switched off with nothing accrued.
    pub fn check_registration(&self) -> Result<(), HubError> {
        if self.id.trim().is_empty() {
            return Err(HubError::ValidationError("device id must not be empty".to_string()));
        }
        if !self.usage_history.is_empty() {
            return Err(HubError::ValidationError(format!(
                "device {} must be registered without usage history",
                self.id
            )));
        }
        if self.total_energy_consumed != 0.0 {
            return Err(HubError::ValidationError(format!(
                "device {} must be registered with no accrued energy",
                self.id
            )));
        }
        if self.is_on() {
            return Err(HubError::ValidationError(format!(
                "device {} must be registered switched off",
                self.id
            )));
        }
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.status == DeviceStatus::On
    }

    /// The currently open usage interval, if any
    pub fn open_interval(&self) -> Option<&UsageInterval> {
        self.usage_history.iter().rev().find(|i| i.is_open())
    }

    /// Switch the device on at `now`, opening a usage interval
    pub fn turn_on(&mut self, now: i64) {
        self.repair_open_intervals();
        if self.is_on() && self.open_interval().is_some() {
            return;
        }
        self.usage_history
            .push(UsageInterval::open(now, self.power_consumption));
        self.status = DeviceStatus::On;
        self.last_status_change = Some(now);
    }

    /// Switch the device off at `now`, closing the open usage interval
    pub fn turn_off(&mut self, now: i64) {
        self.repair_open_intervals();
        if let Some(interval) = self.usage_history.iter_mut().rev().find(|i| i.is_open()) {
            self.total_energy_consumed += interval.close(now);
        }
        if self.is_on() {
            self.last_status_change = Some(now);
        }
        self.status = DeviceStatus::Off;
    }

    /// Flip the power state at `now`, returning the new status
    pub fn toggle(&mut self, now: i64) -> DeviceStatus {
        match self.status {
            DeviceStatus::On => self.turn_off(now),
            DeviceStatus::Off => self.turn_on(now),
        }
        self.status
    }

    /// Apply mode-specific attribute changes.
    ///
    /// A power change while on splits the open interval so each span is
    /// charged at the draw that was active during it.
    pub fn update_attributes(&mut self, update: &AttributeUpdate, now: i64) {
        if let Some(brightness) = update.brightness {
            self.brightness = Some(brightness.min(100));
        }
        if let Some(temperature) = update.temperature {
            self.temperature = Some(temperature);
        }
        if let Some(speed) = update.speed {
            self.speed = Some(speed);
        }
        if let Some(power) = update.power_consumption {
            let was_on = self.is_on() && self.open_interval().is_some();
            if was_on {
                self.turn_off(now);
            }
            self.power_consumption = power;
            if was_on {
                self.turn_on(now);
            }
        }
    }

    /// Cumulative kWh including the live contribution of an open interval
    pub fn live_energy(&self, now: i64) -> f64 {
        let live = self
            .open_interval()
            .map(|i| energy_kwh(i.power_consumption, i.start_time, now))
            .unwrap_or(0.0);
        self.total_energy_consumed.max(0.0) + live
    }

    /// Close every open interval except the newest, each at the start of the
    /// interval that follows it.
    fn repair_open_intervals(&mut self) {
        let open: Vec<usize> = self
            .usage_history
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_open())
            .map(|(idx, _)| idx)
            .collect();
        if open.len() <= 1 {
            return;
        }
        tracing::warn!(
            device_id = %self.id,
            open = open.len(),
            "Device has overlapping open usage intervals, closing stale ones"
        );
        for idx in &open[..open.len() - 1] {
            let next_start = self.usage_history[idx + 1].start_time;
            self.total_energy_consumed += self.usage_history[*idx].close(next_start);
        }
    }
}
