//! `sendkit` — per-recipient delivery attempt state for a messaging client.
//!
//! [`attempt::DeliveryAttempt`] holds the state a sending driver shares
//! between its per-device tasks: the devices still to reach, the retry
//! budget, the transport and sealed-sender fallbacks, and a one-shot
//! completion that observers await.

pub mod attempt;
pub mod completion;
pub mod config;
pub mod error;
pub mod sim;
