//! Multi-node behavior: two stores sharing one fabric.
//!
//! The requester and the acknowledger are different nodes here, which is the
//! normal shape in a cluster — the node mastering a device programs it and
//! reports back, while the node that took the API call owns the handle.

mod common;

use common::{device, features, test_meter, RecordingDelegate};
use metron::allocator::ReuseStrategy;
use metron::error::FailReason;
use metron::events::MeterEventType;
use metron::fabric::StorageFabric;
use metron::handle::StoreResult;
use metron::key::MeterId;
use metron::record::MeterState;
use metron::store::MeterStore;
use std::collections::HashSet;
use std::sync::Arc;

struct Node {
    store: MeterStore,
    delegate: Arc<RecordingDelegate>,
}

fn node(fabric: &StorageFabric) -> Node {
    let store = MeterStore::new(fabric, ReuseStrategy::FirstFit, None, None);
    store.start();
    let delegate = Arc::new(RecordingDelegate::new());
    store.set_delegate(delegate.clone());
    Node { store, delegate }
}

fn two_nodes() -> (StorageFabric, Node, Node) {
    let fabric = StorageFabric::new();
    let a = node(&fabric);
    let b = node(&fabric);
    (fabric, a, b)
}

// ============================================================================
// Event fan-out
// ============================================================================

#[test]
fn request_events_reach_every_node() {
    let (_fabric, a, b) = two_nodes();
    a.store.store_meter(test_meter(device(1), 0));

    assert_eq!(a.delegate.count(MeterEventType::AddRequested), 1);
    assert_eq!(b.delegate.count(MeterEventType::AddRequested), 1);
}

#[test]
fn only_the_requesting_node_resolves_the_handle() {
    let (_fabric, a, b) = two_nodes();
    let meter = test_meter(device(1), 0);

    let mut handle = a.store.store_meter(meter.clone());
    assert_eq!(a.store.pending_operations(), 1);
    assert_eq!(b.store.pending_operations(), 0);

    // Node B masters the device: it observes the request, programs the
    // meter, and reports the acknowledgement.
    let mut observed = meter.clone();
    observed.state = MeterState::Added;
    observed.reference_count = 1;
    b.store.update_meter_state(&observed);

    assert_eq!(handle.try_result(), Some(StoreResult::success()));
    assert_eq!(a.store.pending_operations(), 0);
    assert_eq!(b.store.pending_operations(), 0);
    // Lifecycle notifications still reach both nodes.
    assert_eq!(a.delegate.count(MeterEventType::Added), 1);
    assert_eq!(b.delegate.count(MeterEventType::Added), 1);
}

#[test]
fn failure_reported_on_another_node_reaches_the_owner() {
    let (_fabric, a, b) = two_nodes();
    let meter = test_meter(device(1), 0);

    let mut handle = a.store.store_meter(meter.clone());
    b.store.mark_failed(&meter, FailReason::OutOfMeters);

    assert_eq!(
        handle.try_result(),
        Some(StoreResult::fail(FailReason::OutOfMeters))
    );
    // Both nodes still see the failed record.
    assert!(b.store.meter(&meter.key()).is_some());
}

#[test]
fn removal_ack_from_the_other_node_completes_the_delete() {
    let (_fabric, a, b) = two_nodes();
    let meter = test_meter(device(1), 0);

    let mut add = a.store.store_meter(meter.clone());
    let mut observed = meter.clone();
    observed.state = MeterState::Added;
    observed.reference_count = 1;
    b.store.update_meter_state(&observed);
    assert_eq!(add.try_result(), Some(StoreResult::success()));

    let mut del = a.store.delete_meter(&meter);
    assert_eq!(b.delegate.count(MeterEventType::RemoveRequested), 1);

    b.store.remove_now(&meter);
    assert_eq!(del.try_result(), Some(StoreResult::success()));
    assert_eq!(a.delegate.count(MeterEventType::Removed), 1);
    assert_eq!(b.delegate.count(MeterEventType::Removed), 1);
    assert!(a.store.meter(&meter.key()).is_none());
}

#[test]
fn deletes_racing_on_two_nodes_both_complete() {
    let (_fabric, a, b) = two_nodes();
    let meter = test_meter(device(1), 0);

    let mut add = a.store.store_meter(meter.clone());
    let mut observed = meter.clone();
    observed.state = MeterState::Added;
    observed.reference_count = 1;
    b.store.update_meter_state(&observed);
    add.try_result();

    // Each node takes a delete request for the same meter; the second one
    // finds the record already in PendingRemove and leaves it there.
    let mut del_a = a.store.delete_meter(&meter);
    let mut del_b = b.store.delete_meter(&meter);
    assert_eq!(
        a.store.meter(&meter.key()).map(|m| m.state),
        Some(MeterState::PendingRemove)
    );

    b.store.remove_now(&meter);
    assert_eq!(del_a.try_result(), Some(StoreResult::success()));
    assert_eq!(del_b.try_result(), Some(StoreResult::success()));
}

#[test]
fn purge_on_one_node_resolves_handles_elsewhere() {
    let (_fabric, a, b) = two_nodes();
    let meter = test_meter(device(1), 0);

    let mut pending = a.store.store_meter(meter.clone());
    b.store.purge_device(&device(1));

    assert_eq!(pending.try_result(), Some(StoreResult::success()));
    assert!(a.store.meters(&device(1)).is_empty());
}

// ============================================================================
// Shared identifier space
// ============================================================================

#[test]
fn freed_ids_are_visible_to_other_nodes() {
    let (_fabric, a, b) = two_nodes();
    let dev = device(1);
    a.store.store_features(features(dev.clone(), 4));

    assert_eq!(a.store.allocate_meter_id(&dev), Some(MeterId(0)));
    assert_eq!(b.store.allocate_meter_id(&dev), Some(MeterId(1)));

    a.store.free_meter_id(&dev, MeterId(0));
    assert_eq!(b.store.allocate_meter_id(&dev), Some(MeterId(0)));
}

#[test]
fn capability_records_are_shared() {
    let (_fabric, a, b) = two_nodes();
    let dev = device(1);

    a.store.store_features(features(dev.clone(), 4));
    assert_eq!(b.store.max_meters(&dev), 4);
    // Write-once holds cluster-wide.
    b.store.store_features(features(dev.clone(), 9));
    assert_eq!(a.store.max_meters(&dev), 4);
}

#[test]
fn concurrent_allocation_across_nodes_is_distinct() {
    let fabric = StorageFabric::new();
    let a = Arc::new({
        let n = node(&fabric);
        n.store
    });
    let b = Arc::new({
        let n = node(&fabric);
        n.store
    });
    let dev = device(1);
    a.store_features(features(dev.clone(), 8));

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let store = if i % 2 == 0 { Arc::clone(&a) } else { Arc::clone(&b) };
            let dev = dev.clone();
            std::thread::spawn(move || store.allocate_meter_id(&dev))
        })
        .collect();

    let ids: HashSet<u64> = workers
        .into_iter()
        .map(|w| w.join().unwrap().expect("allocation under capacity").index())
        .collect();

    assert_eq!(ids.len(), 8);
    assert_eq!(a.allocate_meter_id(&dev), None);
    assert_eq!(b.allocate_meter_id(&dev), None);
}
