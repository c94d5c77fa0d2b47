//! Energy usage derived from the device collection

pub mod aggregator;

pub use aggregator::{
    calculate_room_energy, device_breakdown, house_total, room_breakdown, usage_series,
    DeviceEnergy, Granularity, RoomEnergy, UsagePoint,
};
