//! Tests for Peripheral
//!
//! These tests run a peripheral against the simulated driver on a real
//! event loop and verify:
//! - Blocking requests complete through the event context
//! - Failure, rejection and timeout map to distinct errors
//! - Broadcast completions
//! - MTU-bounded long reads and prepared writes from a peer
//! - Disconnect cleanup and unknown handles

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gattkit::driver::{
    event_queue, EventLoop, HardwareEvent, Operation, SimBehavior, SimulatedDriver,
};
use gattkit::gatt::{AttResponse, AttStatus, ExecWriteRequest, ReadRequest, WriteRequest};
use gattkit::{Config, GattError, Peripheral, RequestMode};

const CONN: u16 = 3;
const HANDLE: u16 = 0x0030;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_peripheral(timeout_ms: u64) -> (Arc<Peripheral<SimulatedDriver>>, EventLoop) {
    let config = Config::builder()
        .completion_timeout_ms(timeout_ms)
        .event_thread_name("test-events")
        .build();

    let (events, queue) = event_queue();
    let peripheral = Arc::new(Peripheral::new(config, SimulatedDriver::new(events)).unwrap());
    let event_loop = EventLoop::spawn("test-events", queue, Arc::clone(&peripheral)).unwrap();

    (peripheral, event_loop)
}

fn connect(peripheral: &Peripheral<SimulatedDriver>, mtu: u16) {
    let sim = peripheral.driver();
    sim.inject(HardwareEvent::Connected {
        conn: CONN,
        addr: [1, 2, 3, 4, 5, 6],
    })
    .unwrap();
    sim.inject(HardwareEvent::MtuChanged { conn: CONN, mtu }).unwrap();
}

fn next_response(peripheral: &Peripheral<SimulatedDriver>) -> AttResponse {
    peripheral
        .driver()
        .responses()
        .recv_timeout(Duration::from_secs(2))
        .expect("response")
}

fn read(trans_id: u32, is_long: bool) -> HardwareEvent {
    HardwareEvent::Read(ReadRequest {
        conn: CONN,
        trans_id,
        handle: HANDLE,
        offset: 0,
        is_long,
        need_rsp: true,
    })
}

fn prepared(trans_id: u32, offset: u16, value: &[u8]) -> HardwareEvent {
    HardwareEvent::Write(WriteRequest {
        conn: CONN,
        trans_id,
        handle: HANDLE,
        offset,
        is_prep: true,
        need_rsp: true,
        value: Bytes::copy_from_slice(value),
    })
}

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_blocking_request_succeeds() {
    let (peripheral, _event_loop) = setup_peripheral(2000);

    peripheral
        .request(Operation::AppRegister, 1, RequestMode::Blocking)
        .unwrap();

    assert_eq!(peripheral.correlator().stats().completed(), 1);
    assert_eq!(peripheral.correlator().pending_count(), 0);
}

#[test]
fn test_blocking_request_reports_failure() {
    let (peripheral, _event_loop) = setup_peripheral(2000);
    peripheral
        .driver()
        .set_behavior(Operation::ServiceCreate, SimBehavior::Complete(false));

    let result = peripheral.request(Operation::ServiceCreate, 0x28, RequestMode::Blocking);

    assert!(matches!(
        result,
        Err(GattError::Failed {
            operation: Operation::ServiceCreate,
            key: 0x28
        })
    ));
}

#[test]
fn test_rejected_request_fails_without_waiting() {
    let (peripheral, _event_loop) = setup_peripheral(60_000);
    peripheral
        .driver()
        .set_behavior(Operation::ServiceStart, SimBehavior::Reject);

    let start = std::time::Instant::now();
    let result = peripheral.request(Operation::ServiceStart, 0x28, RequestMode::Blocking);

    assert!(matches!(result, Err(GattError::Failed { .. })));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_silent_stack_times_out() {
    let (peripheral, _event_loop) = setup_peripheral(50);
    peripheral
        .driver()
        .set_behavior(Operation::AdvertisingStart, SimBehavior::Silent);

    let result = peripheral.request(Operation::AdvertisingStart, 0, RequestMode::Blocking);

    assert!(matches!(result, Err(GattError::OutcomeUnknown { .. })));
    assert_eq!(peripheral.correlator().pending_count(), 0);
}

#[test]
fn test_non_blocking_request_skips_registration() {
    let (peripheral, event_loop) = setup_peripheral(2000);

    peripheral
        .request(Operation::ServiceStart, 0x28, RequestMode::NonBlocking)
        .unwrap();
    event_loop.shutdown().unwrap();

    // The completion arrived with nobody waiting
    assert_eq!(peripheral.correlator().stats().registered(), 0);
    assert_eq!(peripheral.correlator().stats().dropped(), 1);
}

#[test]
fn test_non_blocking_request_surfaces_rejection() {
    let (peripheral, _event_loop) = setup_peripheral(2000);
    peripheral
        .driver()
        .set_behavior(Operation::ServiceDelete, SimBehavior::Reject);

    let result = peripheral.request(Operation::ServiceDelete, 0x28, RequestMode::NonBlocking);
    assert!(matches!(result, Err(GattError::Driver(_))));
}

#[test]
fn test_broadcast_completion_wakes_unregister() {
    let (peripheral, _event_loop) = setup_peripheral(2000);

    peripheral
        .request(Operation::AppUnregister, 7, RequestMode::Blocking)
        .unwrap();
}

// =============================================================================
// Attribute Table Tests
// =============================================================================

#[test]
fn test_duplicate_attribute_rejected() {
    let (peripheral, _event_loop) = setup_peripheral(2000);

    peripheral.attribute_add(HANDLE, vec![1]).unwrap();
    assert!(matches!(
        peripheral.attribute_add(HANDLE, vec![2]),
        Err(GattError::DuplicateAttribute(HANDLE))
    ));

    peripheral.attribute_remove(HANDLE).unwrap();
    assert!(matches!(
        peripheral.attribute_remove(HANDLE),
        Err(GattError::UnknownAttribute(HANDLE))
    ));
}

// =============================================================================
// Peer Transfer Tests
// =============================================================================

#[test]
fn test_long_read_uses_negotiated_mtu() {
    let (peripheral, _event_loop) = setup_peripheral(2000);
    let value: Vec<u8> = (0..120).collect();
    peripheral.attribute_add(HANDLE, value.clone()).unwrap();
    connect(&peripheral, 50);

    let sim = peripheral.driver();
    let mut received = Vec::new();
    let mut rounds = 0;
    loop {
        sim.inject(read(rounds, rounds > 0)).unwrap();
        let response = next_response(&peripheral);
        assert_eq!(response.status, AttStatus::Ok);
        received.extend_from_slice(&response.value);
        rounds += 1;
        if response.value.len() < 49 {
            break;
        }
    }

    assert_eq!(rounds, 3);
    assert_eq!(received, value);
}

#[test]
fn test_peer_mtu_capped_at_local_mtu() {
    let config = Config::builder()
        .completion_timeout_ms(2000)
        .local_mtu(64)
        .build();
    let (events, queue) = event_queue();
    let peripheral = Arc::new(Peripheral::new(config, SimulatedDriver::new(events)).unwrap());
    let _event_loop = EventLoop::spawn("test-events", queue, Arc::clone(&peripheral)).unwrap();

    peripheral.attribute_add(HANDLE, vec![0x5A; 300]).unwrap();
    connect(&peripheral, 247);

    peripheral.driver().inject(read(1, false)).unwrap();

    assert_eq!(next_response(&peripheral).value.len(), 63);
    assert_eq!(peripheral.connections().mtu(CONN), Some(64));
}

#[test]
fn test_read_before_mtu_exchange_uses_default() {
    let (peripheral, _event_loop) = setup_peripheral(2000);
    peripheral.attribute_add(HANDLE, vec![0xAB; 40]).unwrap();
    peripheral
        .driver()
        .inject(HardwareEvent::Connected {
            conn: CONN,
            addr: [0; 6],
        })
        .unwrap();

    peripheral.driver().inject(read(1, false)).unwrap();

    assert_eq!(next_response(&peripheral).value.len(), 22);
}

#[test]
fn test_prepared_write_from_peer() {
    let (peripheral, _event_loop) = setup_peripheral(2000);
    let handler = peripheral.attribute_add(HANDLE, vec![0]).unwrap();
    connect(&peripheral, 23);

    let sim = peripheral.driver();
    sim.inject(prepared(1, 0, &[1, 2, 3])).unwrap();
    sim.inject(prepared(2, 3, &[4, 5])).unwrap();
    assert_eq!(next_response(&peripheral).offset, 0);
    assert_eq!(next_response(&peripheral).offset, 3);

    sim.inject(HardwareEvent::ExecWrite(ExecWriteRequest {
        conn: CONN,
        trans_id: 3,
        commit: true,
    }))
    .unwrap();

    let exec = next_response(&peripheral);
    assert_eq!(exec.trans_id, 3);
    assert!(exec.is_ok());
    assert_eq!(handler.value().to_raw(), Bytes::from_static(&[1, 2, 3, 4, 5]));
}

#[test]
fn test_disconnect_aborts_transfers() {
    let (peripheral, event_loop) = setup_peripheral(2000);
    let handler = peripheral.attribute_add(HANDLE, vec![9; 100]).unwrap();
    connect(&peripheral, 23);

    let sim = peripheral.driver();
    sim.inject(read(1, false)).unwrap();
    sim.inject(prepared(2, 0, &[1])).unwrap();
    sim.inject(HardwareEvent::Disconnected { conn: CONN }).unwrap();
    event_loop.shutdown().unwrap();

    assert!(!handler.value().read_ongoing(CONN));
    assert!(!handler.value().write_ongoing(CONN));
    assert!(!peripheral.connections().contains(CONN));
    assert_eq!(handler.value().to_raw(), Bytes::from(vec![9; 100]));
}

#[test]
fn test_unknown_handle_answers_invalid_handle() {
    let (peripheral, _event_loop) = setup_peripheral(2000);
    connect(&peripheral, 23);

    peripheral.driver().inject(read(1, false)).unwrap();

    let response = next_response(&peripheral);
    assert_eq!(response.status, AttStatus::InvalidHandle);
    assert_eq!(response.handle, HANDLE);
}

#[test]
fn test_mtu_for_unknown_connection_is_ignored() {
    let (peripheral, event_loop) = setup_peripheral(2000);

    peripheral
        .driver()
        .inject(HardwareEvent::MtuChanged { conn: 99, mtu: 200 })
        .unwrap();
    event_loop.shutdown().unwrap();

    assert!(peripheral.connections().is_empty());
}

#[test]
fn test_invalid_config_rejected() {
    let (events, _queue) = event_queue();
    let config = Config::builder().completion_timeout_ms(0).build();

    assert!(matches!(
        Peripheral::new(config, SimulatedDriver::new(events)),
        Err(GattError::Config(_))
    ));
}
