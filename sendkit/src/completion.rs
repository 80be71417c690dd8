//! One-shot completion channel for delivery attempts.
//!
//! [`channel`] returns a [`Resolver`] owned by the attempt and a cloneable
//! [`CompletionHandle`] for observers. The resolver publishes exactly one
//! [`DeliveryOutcome`]; every handle clone sees that same value. Handles can
//! peek without blocking ([`CompletionHandle::outcome`]) or await it
//! ([`CompletionHandle::wait`]).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::error::{AttemptError, SendError};

/// Final result of a delivery attempt as seen by observers.
pub type DeliveryOutcome = Result<(), Arc<SendError>>;

/// Creates a connected resolver/handle pair.
#[must_use]
pub fn channel() -> (Resolver, CompletionHandle) {
    let (tx, rx) = watch::channel(None);
    (
        Resolver {
            resolved: AtomicBool::new(false),
            tx,
        },
        CompletionHandle { rx },
    )
}

/// Publishing side of the completion channel.
///
/// Dropping an unresolved resolver wakes observers with
/// [`SendError::Abandoned`].
#[derive(Debug)]
pub struct Resolver {
    resolved: AtomicBool,
    tx: watch::Sender<Option<DeliveryOutcome>>,
}

impl Resolver {
    /// Claims the right to resolve. Only the first caller gets a [`Claim`].
    ///
    /// Separated from [`Claim::publish`] so callers can run side effects
    /// between winning the claim and waking observers.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError::AlreadyResolved`] if the claim was taken.
    pub fn claim(&self) -> Result<Claim<'_>, AttemptError> {
        self.resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Claim { tx: Some(&self.tx) })
            .map_err(|_| AttemptError::AlreadyResolved)
    }

    /// Claims and publishes in one step.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError::AlreadyResolved`] on every call after the
    /// first; the published outcome is left untouched.
    pub fn resolve(&self, outcome: DeliveryOutcome) -> Result<(), AttemptError> {
        self.claim()?.publish(outcome);
        Ok(())
    }

    /// Returns `true` once the resolver has been claimed.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }
}

/// The single right to publish an outcome, won by [`Resolver::claim`].
///
/// Dropping a claim without publishing (including while unwinding from a
/// panic) publishes [`SendError::Abandoned`], so observers never wait on a
/// claimed but unpublished resolver.
#[must_use = "dropping a claim publishes an abandoned outcome"]
#[derive(Debug)]
pub struct Claim<'a> {
    tx: Option<&'a watch::Sender<Option<DeliveryOutcome>>>,
}

impl Claim<'_> {
    /// Publishes the outcome to every observer.
    pub fn publish(mut self, outcome: DeliveryOutcome) {
        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(outcome));
        }
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(Err(Arc::new(SendError::Abandoned))));
        }
    }
}

/// Observing side of the completion channel.
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    rx: watch::Receiver<Option<DeliveryOutcome>>,
}

impl CompletionHandle {
    /// Returns the outcome if it has been published, without waiting.
    #[must_use]
    pub fn outcome(&self) -> Option<DeliveryOutcome> {
        self.rx.borrow().clone()
    }

    /// Waits until the outcome is published.
    ///
    /// Returns [`SendError::Abandoned`] if the resolver is dropped first.
    pub async fn wait(&mut self) -> DeliveryOutcome {
        let published = match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        // The sender may have published right before dropping.
        published
            .or_else(|| self.outcome())
            .unwrap_or_else(|| Err(Arc::new(SendError::Abandoned)))
    }
}
