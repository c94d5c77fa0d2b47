//! Local HTTP API and backend proxy

pub mod handlers;
pub mod proxy;
pub mod serve;
pub mod state;
