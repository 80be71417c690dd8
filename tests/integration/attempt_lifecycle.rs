//! Integration tests for the delivery attempt lifecycle.
//!
//! Walks an attempt through device removal, both fallbacks and terminal
//! resolution, checking what observers and hooks see.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sendkit::attempt::{AttemptParams, DeliveryAttempt, MAX_RETRIES_PER_RECIPIENT};
use sendkit::error::{AttemptError, SendError};
use sendkit_proto::access::{AccessKey, SenderCertificate, SendingAccess, UnidentifiedAccessMode};
use sendkit_proto::address::ServiceAddress;
use sendkit_proto::device::DeviceId;
use sendkit_proto::recipient::RecipientRecord;
use sendkit_proto::transport::{DeliveryMode, TransportKind};
use uuid::Uuid;

type Attempt = DeliveryAttempt<String, String, RecipientRecord>;

fn device(n: i64) -> DeviceId {
    DeviceId::try_from(n).unwrap()
}

fn sealed_access() -> SendingAccess {
    SendingAccess::new(
        UnidentifiedAccessMode::Enabled,
        AccessKey::new([3; 16]),
        SenderCertificate::new(vec![9, 9, 9]),
    )
}

fn new_attempt(devices: Vec<i64>) -> Attempt {
    DeliveryAttempt::new(AttemptParams {
        message: Arc::new("hi bob".to_string()),
        thread: Arc::new("alice-bob".to_string()),
        recipient: Arc::new(RecipientRecord::new(
            ServiceAddress::from_uuid(Uuid::from_u128(0xb0b)),
            devices,
        )),
        sending_access: Some(sealed_access()),
        local_address: ServiceAddress::from_uuid(Uuid::from_u128(0xa11ce)),
    })
}

#[tokio::test]
async fn full_failure_scenario() {
    let failures = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::new(Mutex::new(Vec::new()));
    let failure_log = Arc::clone(&failures);
    let observer_log = Arc::clone(&observed);

    let attempt = new_attempt(vec![1, 2, 3])
        .on_send_error(move |e| observer_log.lock().push(e.to_string()))
        .on_failure(move |e| failure_log.lock().push(e.to_string()))
        .on_success(|| panic!("success hook must not run"));
    let mut completion = attempt.completion();

    assert_eq!(attempt.remaining_attempts(), MAX_RETRIES_PER_RECIPIENT);
    assert!(attempt.is_ud_send());

    attempt.remove_device_id(device(2)).unwrap();
    assert_eq!(attempt.device_ids(), vec![device(1), device(3)]);

    attempt.set_has_ud_auth_failed();
    assert!(!attempt.is_ud_send());

    attempt.mark_websocket_send_failed();
    assert!(attempt.has_websocket_send_failed());
    assert_eq!(attempt.preferred_transport(), TransportKind::Rest);
    assert_eq!(attempt.delivery_mode(), DeliveryMode::Identified);

    attempt.fail(SendError::Timeout).unwrap();

    let err = completion.wait().await.unwrap_err();
    assert!(matches!(*err, SendError::Timeout));
    assert_eq!(*failures.lock(), vec!["send timed out".to_string()]);
    assert_eq!(*observed.lock(), vec!["send timed out".to_string()]);

    assert_eq!(attempt.succeed(), Err(AttemptError::AlreadyResolved));
    assert_eq!(failures.lock().len(), 1);
    assert!(matches!(
        completion.outcome(),
        Some(Err(e)) if matches!(*e, SendError::Timeout)
    ));
}

#[tokio::test]
async fn waiter_blocks_until_another_task_succeeds() {
    let attempt = Arc::new(new_attempt(vec![1]));
    let mut completion = attempt.completion();

    let resolver = Arc::clone(&attempt);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        resolver.remove_device_id(device(1)).unwrap();
        resolver.succeed().unwrap();
    });

    assert!(completion.outcome().is_none());
    let outcome = tokio::time::timeout(Duration::from_secs(5), completion.wait())
        .await
        .expect("completion timed out");
    assert!(outcome.is_ok());
    assert_eq!(attempt.device_count(), 0);
}

#[tokio::test]
async fn dropping_unresolved_attempt_wakes_waiters() {
    let attempt = new_attempt(vec![1]);
    let mut completion = attempt.completion();
    drop(attempt);

    let err = completion.wait().await.unwrap_err();
    assert!(matches!(*err, SendError::Abandoned));
}

#[test]
fn opaque_error_passes_through_unchanged() {
    let attempt = new_attempt(vec![1]);
    let completion = attempt.completion();

    let source: Box<dyn std::error::Error + Send + Sync> = "server said 508".into();
    attempt.fail(SendError::Other(source)).unwrap();

    let err = completion.outcome().unwrap().unwrap_err();
    assert_eq!(err.to_string(), "server said 508");
}

#[test]
fn sending_to_self_is_flagged() {
    let me = ServiceAddress::new(Some(Uuid::from_u128(5)), Some("+15550005".into())).unwrap();
    let attempt: Attempt = DeliveryAttempt::new(AttemptParams {
        message: Arc::new(String::new()),
        thread: Arc::new(String::new()),
        recipient: Arc::new(RecipientRecord::new(
            ServiceAddress::new(None, Some("+15550005".into())).unwrap(),
            vec![1, 2],
        )),
        sending_access: None,
        local_address: me.clone(),
    });

    assert!(attempt.is_local_address());
    assert_eq!(attempt.local_address(), &me);
    assert!(!attempt.is_ud_send());
}
