//! Integration tests

mod common;
mod test_api;
mod test_proxy;
mod test_store;
