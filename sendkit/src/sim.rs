//! Scripted reference driver for delivery attempts.
//!
//! [`SimulatedService`] stands in for the messaging service: each device
//! accepts sends unless a failure has been scripted for it. [`run_attempt`]
//! drives a [`DeliveryAttempt`] against it in rounds, one task per pending
//! device, feeding each failure back into the attempt's fallbacks.
//!
//! There is no timing here. Each round is immediately followed by the next
//! until the devices are exhausted or the retry budget runs out.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;

use sendkit_proto::device::DeviceId;
use sendkit_proto::recipient::Recipient;
use sendkit_proto::transport::{DeliveryMode, TransportKind};

use crate::attempt::DeliveryAttempt;
use crate::completion::DeliveryOutcome;
use crate::config::SimConfig;
use crate::error::{AttemptError, SendError};

/// Failure of a single device send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeviceSendError {
    /// The transport could not deliver to the device.
    #[error("{0} send failed")]
    Transport(TransportKind),

    /// The service rejected the sealed-sender credential.
    #[error("unidentified access rejected")]
    UnidentifiedAuth,
}

/// One accepted device send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Device that accepted the message.
    pub device: DeviceId,
    /// Transport it arrived on.
    pub transport: TransportKind,
    /// Whether it was sealed.
    pub mode: DeliveryMode,
}

/// In-process messaging service with scripted failures.
#[derive(Debug, Default)]
pub struct SimulatedService {
    /// Pending one-shot transport failures.
    transport_failures: Mutex<HashMap<(DeviceId, TransportKind), u32>>,
    /// Devices whose next sealed send is rejected.
    sealed_rejections: Mutex<HashSet<DeviceId>>,
    /// Devices that fail on every transport.
    unreachable: HashSet<DeviceId>,
    /// Devices whose send task panics.
    crashing: HashSet<DeviceId>,
    /// Accepted sends, in arrival order.
    deliveries: Mutex<Vec<Delivery>>,
}

impl SimulatedService {
    /// Creates a service that accepts every send.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a service from the `[sim]` configuration section.
    #[must_use]
    pub fn from_config(config: &SimConfig) -> Self {
        let mut service = Self::new();
        for &device in &config.websocket_failures {
            service = service.fail_once(device, TransportKind::Websocket);
        }
        for &device in &config.rest_failures {
            service = service.fail_once(device, TransportKind::Rest);
        }
        for &device in &config.ud_auth_failures {
            service = service.reject_sealed_once(device);
        }
        for &device in &config.unreachable_devices {
            service = service.unreachable(device);
        }
        service
    }

    /// Scripts one failure of `transport` for `device`. Repeated calls stack.
    #[must_use]
    pub fn fail_once(mut self, device: DeviceId, transport: TransportKind) -> Self {
        *self
            .transport_failures
            .get_mut()
            .entry((device, transport))
            .or_insert(0) += 1;
        self
    }

    /// Scripts a rejection of the next sealed send to `device`.
    #[must_use]
    pub fn reject_sealed_once(mut self, device: DeviceId) -> Self {
        self.sealed_rejections.get_mut().insert(device);
        self
    }

    /// Makes every send to `device` fail.
    #[must_use]
    pub fn unreachable(mut self, device: DeviceId) -> Self {
        self.unreachable.insert(device);
        self
    }

    /// Makes the send to `device` panic, as a crashed worker would.
    #[must_use]
    pub fn crash_on(mut self, device: DeviceId) -> Self {
        self.crashing.insert(device);
        self
    }

    /// Attempts to deliver to one device.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceSendError`] if a failure is scripted for this send.
    ///
    /// # Panics
    ///
    /// Panics if `device` was scripted with [`crash_on`](Self::crash_on).
    pub async fn deliver(
        &self,
        device: DeviceId,
        transport: TransportKind,
        mode: DeliveryMode,
    ) -> Result<(), DeviceSendError> {
        // Let concurrent device sends interleave.
        tokio::task::yield_now().await;

        assert!(
            !self.crashing.contains(&device),
            "scripted crash sending to device {device}"
        );

        if self.unreachable.contains(&device) {
            return Err(DeviceSendError::Transport(transport));
        }
        if mode == DeliveryMode::Sealed && self.sealed_rejections.lock().remove(&device) {
            return Err(DeviceSendError::UnidentifiedAuth);
        }
        {
            let mut failures = self.transport_failures.lock();
            if let Some(remaining) = failures.get_mut(&(device, transport)) {
                *remaining -= 1;
                if *remaining == 0 {
                    failures.remove(&(device, transport));
                }
                return Err(DeviceSendError::Transport(transport));
            }
        }

        self.deliveries.lock().push(Delivery {
            device,
            transport,
            mode,
        });
        Ok(())
    }

    /// Accepted sends so far.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }
}

/// Drives `attempt` to completion against `service`.
///
/// Each round sends to every pending device concurrently. Successful
/// devices are removed; websocket and sealed-sender failures trip the
/// attempt's fallbacks for later sends. After a round with devices left
/// over, one attempt is consumed from the budget. An attempt that starts
/// with no devices fails with [`SendError::NoDevices`]. If a device task
/// panics, the round is finished and the attempt fails with the task's
/// [`JoinError`](tokio::task::JoinError) as [`SendError::Other`].
///
/// # Errors
///
/// Returns [`AttemptError`] if the attempt's bookkeeping is violated,
/// e.g. it was already resolved by someone else.
pub async fn run_attempt<M, T, R>(
    attempt: Arc<DeliveryAttempt<M, T, R>>,
    service: Arc<SimulatedService>,
) -> Result<DeliveryOutcome, AttemptError>
where
    M: Send + Sync + 'static,
    T: Send + Sync + 'static,
    R: Recipient + 'static,
{
    let mut completion = attempt.completion();

    if attempt.device_count() == 0 {
        attempt.fail(SendError::NoDevices)?;
        return Ok(completion.wait().await);
    }

    let mut rounds = 0;
    loop {
        rounds += 1;
        let devices = attempt.device_ids();
        tracing::debug!(
            round = rounds,
            pending = devices.len(),
            transport = %attempt.preferred_transport(),
            mode = %attempt.delivery_mode(),
            "starting send round"
        );

        let sends = devices.into_iter().map(|device| {
            let attempt = Arc::clone(&attempt);
            let service = Arc::clone(&service);
            tokio::spawn(async move { send_to_device(&attempt, &service, device).await })
        });
        let mut crashed = None;
        for joined in join_all(sends).await {
            match joined {
                Ok(result) => result?,
                Err(e) => {
                    tracing::error!(error = %e, "device send task failed to complete");
                    crashed.get_or_insert(e);
                }
            }
        }

        if let Some(e) = crashed {
            attempt.fail(SendError::Other(Box::new(e)))?;
            break;
        }

        if attempt.device_count() == 0 {
            attempt.succeed()?;
            break;
        }
        if attempt.consume_attempt() == 0 {
            attempt.fail(SendError::RetriesExhausted { attempts: rounds })?;
            break;
        }
    }

    Ok(completion.wait().await)
}

async fn send_to_device<M, T, R: Recipient>(
    attempt: &DeliveryAttempt<M, T, R>,
    service: &SimulatedService,
    device: DeviceId,
) -> Result<(), AttemptError> {
    let transport = attempt.preferred_transport();
    let mode = attempt.delivery_mode();

    match service.deliver(device, transport, mode).await {
        Ok(()) => attempt.remove_device_id(device),
        Err(DeviceSendError::Transport(TransportKind::Websocket)) => {
            attempt.mark_websocket_send_failed();
            Ok(())
        }
        Err(DeviceSendError::Transport(TransportKind::Rest)) => {
            tracing::debug!(device = %device, "rest send failed");
            Ok(())
        }
        Err(DeviceSendError::UnidentifiedAuth) => {
            attempt.set_has_ud_auth_failed();
            Ok(())
        }
    }
}
