//! homehub library
//!
//! Core modules for the smart-home energy hub.

pub mod app;
pub mod energy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod notifier;
pub mod permissions;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
