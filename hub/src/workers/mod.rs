//! Background workers

pub mod access_requests;
pub mod suggestions;
