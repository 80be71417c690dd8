//! Service addresses identifying accounts on the messaging service.
//!
//! An address carries a service UUID, a phone number, or both. Two
//! addresses refer to the same account when they share either identifier.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur when constructing a [`ServiceAddress`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Neither a UUID nor a phone number was supplied.
    #[error("address must carry a uuid or a phone number")]
    Empty,

    /// The phone number was present but blank.
    #[error("phone number must not be blank")]
    BlankPhoneNumber,
}

/// Identifies an account by service UUID and/or phone number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceAddress {
    uuid: Option<Uuid>,
    phone_number: Option<String>,
}

impl ServiceAddress {
    /// Creates an address from its optional parts.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Empty`] if both parts are absent, or
    /// [`AddressError::BlankPhoneNumber`] if the phone number is blank.
    pub fn new(uuid: Option<Uuid>, phone_number: Option<String>) -> Result<Self, AddressError> {
        if let Some(phone) = &phone_number
            && phone.trim().is_empty()
        {
            return Err(AddressError::BlankPhoneNumber);
        }
        if uuid.is_none() && phone_number.is_none() {
            return Err(AddressError::Empty);
        }
        Ok(Self { uuid, phone_number })
    }

    /// Creates a UUID-only address.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid: Some(uuid),
            phone_number: None,
        }
    }

    /// Returns the service UUID, if known.
    #[must_use]
    pub const fn uuid(&self) -> Option<&Uuid> {
        self.uuid.as_ref()
    }

    /// Returns the phone number, if known.
    #[must_use]
    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    /// Returns `true` if both addresses refer to the same account.
    ///
    /// Matching succeeds when the UUIDs are both present and equal, or the
    /// phone numbers are both present and equal.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (&self.uuid, &other.uuid)
            && a == b
        {
            return true;
        }
        matches!(
            (&self.phone_number, &other.phone_number),
            (Some(a), Some(b)) if a == b
        )
    }
}

impl std::fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.uuid, &self.phone_number) {
            (Some(uuid), _) => write!(f, "{uuid}"),
            (None, Some(phone)) => write!(f, "{phone}"),
            (None, None) => write!(f, "<unknown>"),
        }
    }
}
