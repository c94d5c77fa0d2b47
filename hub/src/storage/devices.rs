//! Device repository
//!
//! The only writer of the `devices` and `rooms` keys. Aggregation and
//! permission checks read through [`DeviceRepo::load`] and never write.

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::HubError;
use crate::models::device::{AttributeUpdate, Device, DeviceStatus};
use crate::models::room::Room;
use crate::storage::store::{Store, StoreKey};

pub struct DeviceRepo {
    store: Arc<Store>,
}

impl DeviceRepo {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// All devices; an absent key is an empty collection
    pub async fn load(&self) -> Result<Vec<Device>, HubError> {
        self.store.get_or_default(StoreKey::Devices).await
    }

    /// Replace the whole device collection
    pub async fn save(&self, devices: &[Device]) -> Result<(), HubError> {
        self.store.put(StoreKey::Devices, &devices).await
    }

    pub async fn get(&self, device_id: &str) -> Result<Option<Device>, HubError> {
        Ok(self.load().await?.into_iter().find(|d| d.id == device_id))
    }

    /// Add a new device; ids must be unique
    pub async fn register(&self, device: Device) -> Result<(), HubError> {
        info!(device_id = %device.id, room = %device.room, "Registering device");
        self.store
            .update(StoreKey::Devices, |devices: &mut Vec<Device>| {
                if devices.iter().any(|d| d.id == device.id) {
                    return Err(HubError::ValidationError(format!(
                        "device {} already exists",
                        device.id
                    )));
                }
                devices.push(device);
                Ok(())
            })
            .await
    }

    pub async fn remove(&self, device_id: &str) -> Result<Device, HubError> {
        info!(device_id = %device_id, "Removing device");
        self.store
            .update(StoreKey::Devices, |devices: &mut Vec<Device>| {
                let idx = devices
                    .iter()
                    .position(|d| d.id == device_id)
                    .ok_or_else(|| HubError::NotFound(format!("device {}", device_id)))?;
                Ok(devices.remove(idx))
            })
            .await
    }

    /// Flip the device's power state at `now`
    pub async fn toggle(&self, device_id: &str, now: i64) -> Result<Device, HubError> {
        self.modify(device_id, |device| {
            let status = device.toggle(now);
            debug!(device_id = %device.id, ?status, "Toggled device");
        })
        .await
    }

    /// Drive the device to `status`; a no-op when already there
    pub async fn set_status(
        &self,
        device_id: &str,
        status: DeviceStatus,
        now: i64,
    ) -> Result<Device, HubError> {
        self.modify(device_id, |device| match status {
            DeviceStatus::On => device.turn_on(now),
            DeviceStatus::Off => device.turn_off(now),
        })
        .await
    }

    pub async fn update_attributes(
        &self,
        device_id: &str,
        update: &AttributeUpdate,
        now: i64,
    ) -> Result<Device, HubError> {
        self.modify(device_id, |device| device.update_attributes(update, now))
            .await
    }

    pub async fn rooms(&self) -> Result<Vec<Room>, HubError> {
        self.store.get_or_default(StoreKey::Rooms).await
    }

    pub async fn save_rooms(&self, rooms: &[Room]) -> Result<(), HubError> {
        self.store.put(StoreKey::Rooms, &rooms).await
    }

    /// Rename a room and cascade the new name to every device in it.
    ///
    /// Returns the number of devices moved.
    pub async fn rename_room(&self, old_name: &str, new_name: &str) -> Result<usize, HubError> {
        if new_name.trim().is_empty() {
            return Err(HubError::ValidationError("room name must not be empty".to_string()));
        }

        let renamed_room = self
            .store
            .update(StoreKey::Rooms, |rooms: &mut Vec<Room>| {
                let mut found = false;
                for room in rooms.iter_mut().filter(|r| r.name == old_name) {
                    room.name = new_name.to_string();
                    found = true;
                }
                Ok(found)
            })
            .await?;

        let moved = self
            .store
            .update(StoreKey::Devices, |devices: &mut Vec<Device>| {
                let mut moved = 0;
                for device in devices.iter_mut().filter(|d| d.room == old_name) {
                    device.room = new_name.to_string();
                    moved += 1;
                }
                Ok(moved)
            })
            .await?;

        if !renamed_room && moved == 0 {
            return Err(HubError::NotFound(format!("room {}", old_name)));
        }

        info!(from = %old_name, to = %new_name, devices = moved, "Renamed room");
        Ok(moved)
    }

    async fn modify<F>(&self, device_id: &str, f: F) -> Result<Device, HubError>
    where
        F: FnOnce(&mut Device),
    {
        self.store
            .update(StoreKey::Devices, |devices: &mut Vec<Device>| {
                let device = devices
                    .iter_mut()
                    .find(|d| d.id == device_id)
                    .ok_or_else(|| HubError::NotFound(format!("device {}", device_id)))?;
                f(device);
                Ok(device.clone())
            })
            .await
    }
}
