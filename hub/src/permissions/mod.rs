//! Feature gating against the resident identity

pub mod access;
pub mod gate;
