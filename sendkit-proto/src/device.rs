//! Device identifiers for a recipient's registered endpoints.

use serde::{Deserialize, Serialize};

/// Errors that can occur when interpreting a raw device identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceIdError {
    /// The raw value is zero, negative, or wider than 32 bits.
    #[error("device id {0} is out of range")]
    OutOfRange(i64),
}

/// Non-zero identifier of one device registered to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct DeviceId(u32);

impl DeviceId {
    /// The account's primary device.
    pub const PRIMARY: Self = Self(1);

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for DeviceId {
    type Error = DeviceIdError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match u32::try_from(raw) {
            Ok(0) | Err(_) => Err(DeviceIdError::OutOfRange(raw)),
            Ok(id) => Ok(Self(id)),
        }
    }
}

impl From<DeviceId> for i64 {
    fn from(id: DeviceId) -> Self {
        Self::from(id.0)
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
