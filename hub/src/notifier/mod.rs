//! Energy-saving suggestion polling and novelty alerts

pub mod alerts;
pub mod poll;
pub mod source;
