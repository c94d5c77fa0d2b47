//! Backend HTTP client

pub mod client;
