//! Domain models shared by the store, aggregator, gate and notifier

pub mod device;
pub mod identity;
pub mod room;
pub mod suggestion;
