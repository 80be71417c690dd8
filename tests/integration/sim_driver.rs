//! Integration tests for the scripted reference driver.
//!
//! Each scenario combines failures across devices and checks the
//! transports and delivery modes the service saw, plus the final outcome.

use std::sync::Arc;

use sendkit::attempt::{AttemptConfig, AttemptParams, DeliveryAttempt};
use sendkit::config::SimConfig;
use sendkit::error::SendError;
use sendkit::sim::{self, Delivery, SimulatedService};
use sendkit_proto::access::{AccessKey, SenderCertificate, SendingAccess, UnidentifiedAccessMode};
use sendkit_proto::address::ServiceAddress;
use sendkit_proto::device::DeviceId;
use sendkit_proto::recipient::RecipientRecord;
use sendkit_proto::transport::{DeliveryMode, TransportKind};
use uuid::Uuid;

type Attempt = DeliveryAttempt<String, (), RecipientRecord>;

fn device(n: i64) -> DeviceId {
    DeviceId::try_from(n).unwrap()
}

fn attempt(devices: Vec<i64>, sealed: bool, max_retries: u32) -> Arc<Attempt> {
    let access = sealed.then(|| {
        SendingAccess::new(
            UnidentifiedAccessMode::Enabled,
            AccessKey::new([2; 16]),
            SenderCertificate::new(vec![4, 2]),
        )
    });
    Arc::new(DeliveryAttempt::with_config(
        AttemptParams {
            message: Arc::new("status update".to_string()),
            thread: Arc::new(()),
            recipient: Arc::new(RecipientRecord::new(
                ServiceAddress::from_uuid(Uuid::from_u128(0xcafe)),
                devices,
            )),
            sending_access: access,
            local_address: ServiceAddress::from_uuid(Uuid::from_u128(0xbeef)),
        },
        AttemptConfig { max_retries },
    ))
}

fn delivery_for(deliveries: &[Delivery], n: i64) -> Delivery {
    *deliveries.iter().find(|d| d.device == device(n)).unwrap()
}

#[tokio::test]
async fn both_fallbacks_in_one_attempt() {
    let a = attempt(vec![1, 2, 3], true, 3);
    let service = Arc::new(
        SimulatedService::new()
            .fail_once(device(1), TransportKind::Websocket)
            .reject_sealed_once(device(3)),
    );

    let outcome = sim::run_attempt(Arc::clone(&a), Arc::clone(&service))
        .await
        .unwrap();

    assert!(outcome.is_ok());
    assert!(a.has_websocket_send_failed());
    assert!(!a.is_ud_send());
    assert_eq!(a.remaining_attempts(), 2);

    let deliveries = service.deliveries();
    assert_eq!(deliveries.len(), 3);
    let retried_one = delivery_for(&deliveries, 1);
    assert_eq!(retried_one.transport, TransportKind::Rest);
    assert_eq!(retried_one.mode, DeliveryMode::Identified);
    let retried_three = delivery_for(&deliveries, 3);
    assert_eq!(retried_three.mode, DeliveryMode::Identified);
}

#[tokio::test]
async fn rest_failure_after_fallback_uses_another_round() {
    let a = attempt(vec![1], false, 3);
    let service = Arc::new(
        SimulatedService::new()
            .fail_once(device(1), TransportKind::Websocket)
            .fail_once(device(1), TransportKind::Rest),
    );

    let outcome = sim::run_attempt(Arc::clone(&a), Arc::clone(&service))
        .await
        .unwrap();

    assert!(outcome.is_ok());
    assert_eq!(a.remaining_attempts(), 1);
    assert_eq!(service.deliveries()[0].transport, TransportKind::Rest);
}

#[tokio::test]
async fn single_retry_budget_fails_after_one_round() {
    let a = attempt(vec![1, 2], false, 1);
    let service = Arc::new(SimulatedService::new().fail_once(device(2), TransportKind::Websocket));

    let err = sim::run_attempt(Arc::clone(&a), Arc::clone(&service))
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(*err, SendError::RetriesExhausted { attempts: 1 }));
    assert_eq!(a.device_ids(), vec![device(2)]);
    assert_eq!(service.deliveries().len(), 1);
}

#[tokio::test]
async fn scenario_from_config() {
    let config = SimConfig {
        devices: vec![1, 2],
        sealed_sender: true,
        websocket_failures: vec![device(2)],
        rest_failures: Vec::new(),
        ud_auth_failures: vec![device(1)],
        unreachable_devices: Vec::new(),
    };
    let a = attempt(config.devices.clone(), config.sealed_sender, 3);
    let service = Arc::new(SimulatedService::from_config(&config));

    let outcome = sim::run_attempt(Arc::clone(&a), Arc::clone(&service))
        .await
        .unwrap();

    assert!(outcome.is_ok());
    assert!(a.has_websocket_send_failed());
    assert!(!a.is_ud_send());
}

#[tokio::test]
async fn failure_hooks_fire_once_on_exhaustion() {
    let fired = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let log = Arc::clone(&fired);
    let a = Arc::new(
        Arc::into_inner(attempt(vec![1], false, 2))
            .unwrap()
            .on_failure(move |e| log.lock().push(e.to_string())),
    );
    let service = Arc::new(SimulatedService::new().unreachable(device(1)));

    let outcome = sim::run_attempt(a, service).await.unwrap();

    assert!(outcome.is_err());
    assert_eq!(
        *fired.lock(),
        vec!["retries exhausted after 2 attempts".to_string()]
    );
}
