//! Shared value types for the `sendkit` delivery core.

pub mod access;
pub mod address;
pub mod device;
pub mod recipient;
pub mod transport;
