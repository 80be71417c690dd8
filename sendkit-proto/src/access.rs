//! Sealed-sender (unidentified delivery) credentials.
//!
//! A [`SendingAccess`] lets the sender deliver without revealing its
//! identity to the service. It pairs the recipient's access key with the
//! sender's certificate.

use serde::{Deserialize, Serialize};

/// Length of an unidentified access key in bytes.
pub const ACCESS_KEY_LEN: usize = 16;

/// How the recipient accepts unidentified deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnidentifiedAccessMode {
    /// Access is gated by the recipient's profile-derived key.
    Enabled,
    /// The recipient accepts unidentified deliveries from anyone.
    Unrestricted,
}

/// Key derived from the recipient's profile key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKey([u8; ACCESS_KEY_LEN]);

impl AccessKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn new(bytes: [u8; ACCESS_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ACCESS_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessKey(<redacted>)")
    }
}

/// Server-issued certificate vouching for the sender. Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderCertificate(Vec<u8>);

impl SenderCertificate {
    /// Wraps serialized certificate bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the serialized certificate.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Credential that enables sealed-sender delivery to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendingAccess {
    /// Recipient's access mode.
    pub mode: UnidentifiedAccessMode,
    /// Recipient's access key.
    pub access_key: AccessKey,
    /// Sender certificate presented with each sealed delivery.
    pub sender_certificate: SenderCertificate,
}

impl SendingAccess {
    /// Creates a sending access credential.
    #[must_use]
    pub const fn new(
        mode: UnidentifiedAccessMode,
        access_key: AccessKey,
        sender_certificate: SenderCertificate,
    ) -> Self {
        Self {
            mode,
            access_key,
            sender_certificate,
        }
    }
}
