//! Persistent state: on-disk layout, settings and the versioned key-value store

pub mod devices;
pub mod layout;
pub mod session;
pub mod settings;
pub mod store;
