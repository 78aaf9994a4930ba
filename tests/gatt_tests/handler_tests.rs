//! AttributeHandler Tests
//!
//! Tests verify:
//! - Long reads bounded by the payload limit
//! - Unprepared writes commit immediately
//! - Prepared writes commit on execute-write
//! - Callbacks fire once per finished transfer
//! - Disconnect drops in-flight transactions

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use gattkit::attribute::AttributeValue;
use gattkit::gatt::{AttStatus, AttributeHandler, ExecWriteRequest, ReadRequest, WriteRequest};

const HANDLE: u16 = 0x002a;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup(initial: Vec<u8>) -> AttributeHandler {
    AttributeHandler::new(HANDLE, Arc::new(AttributeValue::new(initial)))
}

fn read(conn: u16, is_long: bool) -> ReadRequest {
    ReadRequest {
        conn,
        trans_id: 1,
        handle: HANDLE,
        offset: 0,
        is_long,
        need_rsp: true,
    }
}

fn write(conn: u16, offset: u16, is_prep: bool, value: Vec<u8>) -> WriteRequest {
    WriteRequest {
        conn,
        trans_id: 2,
        handle: HANDLE,
        offset,
        is_prep,
        need_rsp: true,
        value: Bytes::from(value),
    }
}

fn counter() -> (Arc<AtomicUsize>, impl Fn(u16) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&count);
    (count, move |_conn| {
        inner.fetch_add(1, Ordering::SeqCst);
    })
}

// =============================================================================
// Read Tests
// =============================================================================

#[test]
fn test_short_value_read_in_one_response() {
    let handler = setup(vec![1, 2, 3]);

    let response = handler.handle_read(&read(1, false), 22).unwrap();

    assert_eq!(response.status, AttStatus::Ok);
    assert_eq!(response.handle, HANDLE);
    assert_eq!(response.value, Bytes::from_static(&[1, 2, 3]));
    assert!(!handler.value().read_ongoing(1));
}

#[test]
fn test_long_read_spans_requests() {
    let value: Vec<u8> = (0..50).collect();
    let handler = setup(value.clone());
    let (reads, on_read) = counter();
    handler.set_on_read(on_read);

    let first = handler.handle_read(&read(1, false), 22).unwrap();
    let second = handler.handle_read(&read(1, true), 22).unwrap();
    let third = handler.handle_read(&read(1, true), 22).unwrap();

    assert_eq!(first.value.len(), 22);
    assert_eq!(second.value.len(), 22);
    assert_eq!(third.value.len(), 6);

    let joined: Vec<u8> = [first.value, second.value, third.value].concat();
    assert_eq!(joined, value);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_non_long_read_restarts_transfer() {
    let handler = setup((0..50).collect());

    handler.handle_read(&read(1, false), 22).unwrap();
    let restarted = handler.handle_read(&read(1, false), 22).unwrap();

    assert_eq!(restarted.value[0], 0);
}

#[test]
fn test_read_without_response_needed() {
    let handler = setup(vec![1, 2, 3]);
    let mut request = read(1, false);
    request.need_rsp = false;

    assert!(handler.handle_read(&request, 22).is_none());
    assert!(!handler.value().read_ongoing(1));
}

// =============================================================================
// Write Tests
// =============================================================================

#[test]
fn test_unprepared_write_commits_and_echoes() {
    let handler = setup(vec![0]);
    let (writes, on_write) = counter();
    handler.set_on_write(on_write);

    let response = handler.handle_write(&write(1, 0, false, vec![7, 8, 9])).unwrap();

    assert_eq!(response.status, AttStatus::Ok);
    assert_eq!(response.value, Bytes::from_static(&[7, 8, 9]));
    assert_eq!(handler.value().to_raw(), Bytes::from_static(&[7, 8, 9]));
    assert!(!handler.value().write_ongoing(1));
    assert_eq!(writes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_prepared_write_waits_for_execute() {
    let handler = setup(vec![0]);
    let (writes, on_write) = counter();
    handler.set_on_write(on_write);

    let first = handler.handle_write(&write(1, 0, true, vec![1, 2])).unwrap();
    let second = handler.handle_write(&write(1, 2, true, vec![3])).unwrap();
    assert_eq!(first.offset, 0);
    assert_eq!(second.offset, 2);

    // Nothing applied yet
    assert_eq!(handler.value().to_raw(), Bytes::from_static(&[0]));
    assert_eq!(writes.load(Ordering::SeqCst), 0);

    let exec = ExecWriteRequest {
        conn: 1,
        trans_id: 3,
        commit: true,
    };
    assert!(handler.handle_exec_write(&exec));

    assert_eq!(handler.value().to_raw(), Bytes::from_static(&[1, 2, 3]));
    assert_eq!(writes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_exec_write_without_transaction() {
    let handler = setup(vec![5]);
    let exec = ExecWriteRequest {
        conn: 1,
        trans_id: 3,
        commit: true,
    };

    assert!(!handler.handle_exec_write(&exec));
    assert_eq!(handler.value().to_raw(), Bytes::from_static(&[5]));
}

#[test]
fn test_write_without_response_needed() {
    let handler = setup(vec![0]);
    let mut request = write(1, 0, false, vec![4]);
    request.need_rsp = false;

    assert!(handler.handle_write(&request).is_none());
    assert_eq!(handler.value().to_raw(), Bytes::from_static(&[4]));
}

#[test]
fn test_callback_may_replace_itself() {
    let handler = Arc::new(setup(vec![0]));
    let (replaced, on_write) = counter();

    let weak = Arc::downgrade(&handler);
    let slot = Arc::new(parking_lot::Mutex::new(Some(on_write)));
    handler.set_on_write(move |_conn| {
        if let (Some(handler), Some(next)) = (weak.upgrade(), slot.lock().take()) {
            handler.set_on_write(next);
        }
    });

    handler.handle_write(&write(1, 0, false, vec![1])).unwrap();
    assert_eq!(replaced.load(Ordering::SeqCst), 0);

    handler.handle_write(&write(1, 0, false, vec![2])).unwrap();
    assert_eq!(replaced.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Disconnect Tests
// =============================================================================

#[test]
fn test_disconnect_drops_transactions() {
    let handler = setup((0..50).collect());

    handler.handle_read(&read(1, false), 22).unwrap();
    handler.handle_write(&write(1, 0, true, vec![1]));
    handler.handle_write(&write(2, 0, true, vec![2]));

    handler.handle_disconnect(1);

    assert!(!handler.value().read_ongoing(1));
    assert!(!handler.value().write_ongoing(1));
    assert!(handler.value().write_ongoing(2));

    // A continuation after disconnect has nothing to continue
    let response = handler.handle_read(&read(1, true), 22).unwrap();
    assert!(response.value.is_empty());
}
