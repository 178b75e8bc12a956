//! Testing utilities and mock implementations
//!
//! Doubles for every supervisor collaborator so the state machine can be
//! exercised without a network, a broker or a sensor.

pub mod mocks;

pub use mocks::*;
