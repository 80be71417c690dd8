//! Recipient directory records.
//!
//! The directory stores a recipient's devices as raw integers. Nothing at
//! this layer validates them; consumers interpret the list when they
//! capture it.

use serde::{Deserialize, Serialize};

use crate::address::ServiceAddress;

/// A recipient as seen by the sending pipeline.
///
/// External recipient directories implement this trait to hand their
/// records to a delivery attempt.
pub trait Recipient: Send + Sync {
    /// The recipient's service address.
    fn address(&self) -> &ServiceAddress;

    /// The recipient's currently known devices, as stored.
    fn raw_devices(&self) -> &[i64];
}

/// A directory row describing one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRecord {
    /// The recipient's address.
    pub address: ServiceAddress,
    /// Registered device identifiers, unvalidated.
    pub devices: Vec<i64>,
}

impl RecipientRecord {
    /// Creates a record from an address and its raw device list.
    #[must_use]
    pub const fn new(address: ServiceAddress, devices: Vec<i64>) -> Self {
        Self { address, devices }
    }
}

impl Recipient for RecipientRecord {
    fn address(&self) -> &ServiceAddress {
        &self.address
    }

    fn raw_devices(&self) -> &[i64] {
        &self.devices
    }
}
