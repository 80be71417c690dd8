//! Transport and delivery-mode selectors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Network channel used for a device send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Low-latency authenticated websocket.
    Websocket,
    /// Request/response fallback over REST.
    Rest,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Websocket => write!(f, "websocket"),
            Self::Rest => write!(f, "rest"),
        }
    }
}

/// Whether the sender's identity is revealed to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Sealed-sender delivery using a [`SendingAccess`](crate::access::SendingAccess).
    Sealed,
    /// Standard identified delivery.
    Identified,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sealed => write!(f, "sealed"),
            Self::Identified => write!(f, "identified"),
        }
    }
}
