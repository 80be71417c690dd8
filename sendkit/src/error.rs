//! Error types for delivery attempts.
//!
//! [`SendError`] is the terminal failure a driver reports through
//! [`DeliveryAttempt::fail`](crate::attempt::DeliveryAttempt::fail). The
//! attempt never inspects it. [`AttemptError`] covers misuse of the
//! attempt's contract by its caller.

use sendkit_proto::device::DeviceId;
use sendkit_proto::transport::TransportKind;

/// Terminal failure of a delivery attempt, classified by the driver.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The send did not complete in time.
    #[error("send timed out")]
    Timeout,

    /// A transport rejected or dropped the send.
    #[error("{0} transport failed: {1}")]
    Transport(TransportKind, String),

    /// The service rejected the sealed-sender credential.
    #[error("unidentified access was rejected")]
    UnidentifiedAuthFailed,

    /// The retry budget ran out with devices still undelivered.
    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        /// Number of rounds the driver made.
        attempts: u32,
    },

    /// The recipient had no valid devices to deliver to.
    #[error("recipient has no devices")]
    NoDevices,

    /// The attempt was dropped before anyone resolved it.
    #[error("delivery attempt abandoned before completion")]
    Abandoned,

    /// Any other driver-specific failure.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Violations of the delivery attempt's calling contract.
///
/// These indicate bookkeeping bugs in the caller, not delivery failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    /// The device is not (or no longer) in the working set.
    #[error("device {0} is not tracked by this attempt")]
    UnknownDevice(DeviceId),

    /// The attempt's completion was already resolved.
    #[error("delivery attempt already resolved")]
    AlreadyResolved,
}
