//! Shared harness for the bridge integration tests
//!
//! Builds an in-memory host with the integration set up, opens fake
//! connections, and drives raw JSON frames through the gateway.

#![allow(dead_code)]

mod frames;
mod test_bridge;

pub use frames::*;
pub use test_bridge::*;
