//! Per-recipient delivery attempt state.
//!
//! A [`DeliveryAttempt`] tracks one effort to deliver one message to one
//! recipient across that recipient's devices and across retries. The
//! driver that performs the actual sends shares it between per-device
//! tasks; every field is guarded so each accessor is linearizable.
//!
//! Two fallbacks only ever move in one direction within an attempt:
//! - once any websocket send fails, remaining sends use REST;
//! - once sealed-sender access is rejected, remaining sends are identified.
//!
//! The attempt resolves exactly once, through [`succeed`](DeliveryAttempt::succeed)
//! or [`fail`](DeliveryAttempt::fail), which run the caller's hooks and then
//! publish the outcome on the [`CompletionHandle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use sendkit_proto::access::SendingAccess;
use sendkit_proto::address::ServiceAddress;
use sendkit_proto::device::DeviceId;
use sendkit_proto::recipient::Recipient;
use sendkit_proto::transport::{DeliveryMode, TransportKind};

use crate::completion::{self, Claim, CompletionHandle, Resolver};
use crate::error::{AttemptError, SendError};

/// Default retry budget for a single recipient.
pub const MAX_RETRIES_PER_RECIPIENT: u32 = 3;

/// Tunables applied when an attempt is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptConfig {
    /// Initial value of the retry budget.
    pub max_retries: u32,
}

impl Default for AttemptConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES_PER_RECIPIENT,
        }
    }
}

/// Inputs to [`DeliveryAttempt::new`].
pub struct AttemptParams<M, T, R> {
    /// The outgoing message.
    pub message: Arc<M>,
    /// The thread the message belongs to.
    pub thread: Arc<T>,
    /// The recipient being delivered to.
    pub recipient: Arc<R>,
    /// Sealed-sender credential, if sealed delivery is possible.
    pub sending_access: Option<SendingAccess>,
    /// Address of the sending account.
    pub local_address: ServiceAddress,
}

type SuccessHook = Box<dyn FnOnce() + Send>;
type FailureHook = Box<dyn FnOnce(&SendError) + Send>;

#[derive(Default)]
struct Hooks {
    on_success: Option<SuccessHook>,
    on_failure: Option<FailureHook>,
    on_send_error: Option<FailureHook>,
}

/// State of one message's delivery to one recipient.
pub struct DeliveryAttempt<M, T, R: Recipient> {
    message: Arc<M>,
    thread: Arc<T>,
    recipient: Arc<R>,
    local_address: ServiceAddress,
    is_local_address: bool,
    /// Devices still awaiting delivery. Never holds duplicates.
    device_ids: Mutex<Vec<DeviceId>>,
    remaining_attempts: AtomicU32,
    /// Only ever transitions false -> true.
    has_websocket_send_failed: AtomicBool,
    /// Only ever transitions Some -> None.
    sending_access: Mutex<Option<Arc<SendingAccess>>>,
    hooks: Mutex<Hooks>,
    resolver: Resolver,
    completion: CompletionHandle,
}

impl<M, T, R: Recipient> DeliveryAttempt<M, T, R> {
    /// Creates an attempt with the default retry budget.
    ///
    /// The recipient's device list is captured as the working set, with
    /// repeated ids kept once. A list that holds an invalid id is logged and
    /// replaced by an empty set; construction never fails.
    #[must_use]
    pub fn new(params: AttemptParams<M, T, R>) -> Self {
        Self::with_config(params, AttemptConfig::default())
    }

    /// Creates an attempt using the given configuration.
    #[must_use]
    pub fn with_config(params: AttemptParams<M, T, R>, config: AttemptConfig) -> Self {
        let AttemptParams {
            message,
            thread,
            recipient,
            sending_access,
            local_address,
        } = params;

        let is_local_address = recipient.address().matches(&local_address);
        let device_ids = capture_devices(recipient.address(), recipient.raw_devices());
        let (resolver, completion) = completion::channel();

        Self {
            message,
            thread,
            recipient,
            local_address,
            is_local_address,
            device_ids: Mutex::new(device_ids),
            remaining_attempts: AtomicU32::new(config.max_retries),
            has_websocket_send_failed: AtomicBool::new(false),
            sending_access: Mutex::new(sending_access.map(Arc::new)),
            hooks: Mutex::new(Hooks::default()),
            resolver,
            completion,
        }
    }

    /// Sets the hook run by [`succeed`](Self::succeed).
    #[must_use]
    pub fn on_success(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.hooks.get_mut().on_success = Some(Box::new(hook));
        self
    }

    /// Sets the hook run by [`fail`](Self::fail).
    #[must_use]
    pub fn on_failure(mut self, hook: impl FnOnce(&SendError) + Send + 'static) -> Self {
        self.hooks.get_mut().on_failure = Some(Box::new(hook));
        self
    }

    /// Sets an observer that sees the terminal error before the failure hook.
    #[must_use]
    pub fn on_send_error(mut self, observer: impl FnOnce(&SendError) + Send + 'static) -> Self {
        self.hooks.get_mut().on_send_error = Some(Box::new(observer));
        self
    }

    /// The outgoing message.
    #[must_use]
    pub fn message(&self) -> &Arc<M> {
        &self.message
    }

    /// The message's thread.
    #[must_use]
    pub fn thread(&self) -> &Arc<T> {
        &self.thread
    }

    /// The recipient.
    #[must_use]
    pub fn recipient(&self) -> &Arc<R> {
        &self.recipient
    }

    /// Address of the sending account.
    #[must_use]
    pub const fn local_address(&self) -> &ServiceAddress {
        &self.local_address
    }

    /// Whether the recipient is the sending account itself.
    #[must_use]
    pub const fn is_local_address(&self) -> bool {
        self.is_local_address
    }

    // --- Devices ---

    /// Snapshot of the devices still awaiting delivery.
    #[must_use]
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.device_ids.lock().clone()
    }

    /// Number of devices still awaiting delivery.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.device_ids.lock().len()
    }

    /// Removes a delivered device from the working set.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError::UnknownDevice`] if `device` is not in the
    /// set. This is a caller bookkeeping bug; the set is left unchanged.
    pub fn remove_device_id(&self, device: DeviceId) -> Result<(), AttemptError> {
        let mut devices = self.device_ids.lock();
        let Some(index) = devices.iter().position(|d| *d == device) else {
            drop(devices);
            tracing::error!(
                recipient = %self.recipient.address(),
                device = %device,
                "attempted to remove a device that is not tracked"
            );
            return Err(AttemptError::UnknownDevice(device));
        };
        devices.remove(index);
        Ok(())
    }

    // --- Retry budget ---

    /// Current retry budget.
    #[must_use]
    pub fn remaining_attempts(&self) -> u32 {
        self.remaining_attempts.load(Ordering::Acquire)
    }

    /// Overwrites the retry budget.
    pub fn set_remaining_attempts(&self, remaining: u32) {
        self.remaining_attempts.store(remaining, Ordering::Release);
    }

    /// Decrements the budget (saturating at zero) and returns the new value.
    pub fn consume_attempt(&self) -> u32 {
        let previous = match self.remaining_attempts.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |n| Some(n.saturating_sub(1)),
        ) {
            Ok(n) | Err(n) => n,
        };
        previous.saturating_sub(1)
    }

    // --- Transport fallback ---

    /// Whether any websocket send in this attempt has failed.
    #[must_use]
    pub fn has_websocket_send_failed(&self) -> bool {
        self.has_websocket_send_failed.load(Ordering::Acquire)
    }

    /// Records a websocket failure. Remaining sends fall back to REST.
    pub fn mark_websocket_send_failed(&self) {
        if !self.has_websocket_send_failed.swap(true, Ordering::AcqRel) {
            tracing::debug!(
                recipient = %self.recipient.address(),
                "websocket send failed, falling back to rest"
            );
        }
    }

    /// Transport the next device send should use.
    #[must_use]
    pub fn preferred_transport(&self) -> TransportKind {
        if self.has_websocket_send_failed() {
            TransportKind::Rest
        } else {
            TransportKind::Websocket
        }
    }

    // --- Sealed-sender fallback ---

    /// Current sealed-sender credential, if still enabled.
    #[must_use]
    pub fn sending_access(&self) -> Option<Arc<SendingAccess>> {
        self.sending_access.lock().clone()
    }

    /// Whether sends are still sealed.
    #[must_use]
    pub fn is_ud_send(&self) -> bool {
        self.sending_access.lock().is_some()
    }

    /// Delivery mode the next device send should use.
    #[must_use]
    pub fn delivery_mode(&self) -> DeliveryMode {
        if self.is_ud_send() {
            DeliveryMode::Sealed
        } else {
            DeliveryMode::Identified
        }
    }

    /// Drops the sealed-sender credential for the rest of the attempt.
    pub fn disable_ud(&self) {
        let previous = self.sending_access.lock().take();
        tracing::debug!(
            recipient = %self.recipient.address(),
            was_enabled = previous.is_some(),
            "disabling unidentified delivery"
        );
    }

    /// Records that the service rejected sealed-sender access for this
    /// recipient. Remaining sends are identified.
    pub fn set_has_ud_auth_failed(&self) {
        tracing::debug!(
            recipient = %self.recipient.address(),
            "unidentified access rejected"
        );
        self.disable_ud();
    }

    // --- Completion ---

    /// Handle for observing the attempt's outcome.
    #[must_use]
    pub fn completion(&self) -> CompletionHandle {
        self.completion.clone()
    }

    /// Whether [`succeed`](Self::succeed) or [`fail`](Self::fail) has run.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolver.is_resolved()
    }

    /// Runs the success hook, then resolves the completion with success.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError::AlreadyResolved`] if the attempt was already
    /// resolved. No hook runs in that case.
    ///
    /// # Panics
    ///
    /// Propagates a panic from the success hook. The attempt stays resolved
    /// and observers see [`SendError::Abandoned`].
    pub fn succeed(&self) -> Result<(), AttemptError> {
        let claim = self.claim()?;
        let hooks = std::mem::take(&mut *self.hooks.lock());
        if let Some(hook) = hooks.on_success {
            hook();
        }
        tracing::info!(recipient = %self.recipient.address(), "delivery attempt succeeded");
        claim.publish(Ok(()));
        Ok(())
    }

    /// Runs the error observer and the failure hook, then resolves the
    /// completion with `error`.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError::AlreadyResolved`] if the attempt was already
    /// resolved. No hook runs and `error` is discarded in that case.
    ///
    /// # Panics
    ///
    /// Propagates a panic from either hook. The attempt stays resolved and
    /// observers see [`SendError::Abandoned`].
    pub fn fail(&self, error: SendError) -> Result<(), AttemptError> {
        let claim = self.claim()?;
        let hooks = std::mem::take(&mut *self.hooks.lock());
        if let Some(observer) = hooks.on_send_error {
            observer(&error);
        }
        if let Some(hook) = hooks.on_failure {
            hook(&error);
        }
        tracing::info!(
            recipient = %self.recipient.address(),
            error = %error,
            "delivery attempt failed"
        );
        claim.publish(Err(Arc::new(error)));
        Ok(())
    }

    fn claim(&self) -> Result<Claim<'_>, AttemptError> {
        self.resolver.claim().inspect_err(|_| {
            tracing::error!(
                recipient = %self.recipient.address(),
                "delivery attempt resolved more than once"
            );
        })
    }
}

/// Interprets a recipient's raw device list.
///
/// Repeated ids are logged and kept once. Returns an empty set, after
/// logging, if any entry is not a valid device id.
fn capture_devices(address: &ServiceAddress, raw: &[i64]) -> Vec<DeviceId> {
    let mut devices = Vec::with_capacity(raw.len());
    for &value in raw {
        match DeviceId::try_from(value) {
            Ok(id) if !devices.contains(&id) => devices.push(id),
            Ok(id) => {
                tracing::warn!(
                    recipient = %address,
                    device = %id,
                    "skipping duplicate device id"
                );
            }
            Err(e) => {
                tracing::warn!(recipient = %address, error = %e, "invalid device id");
                return Vec::new();
            }
        }
    }
    devices
}
