//! Replication primitive tests: tables, sets, counters, fault injection.

use metron::fabric::{StorageFabric, TableEvent, TableListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records a compact rendering of every event it sees.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn seen(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl TableListener<String, u32> for Recorder {
    fn on_event(&self, event: &TableEvent<String, u32>) {
        let rendered = match event {
            TableEvent::Insert { key, value } => format!("insert {key}={value}"),
            TableEvent::Update { key, old, new } => format!("update {key} {old}->{new}"),
            TableEvent::Remove { key, old } => format!("remove {key}={old}"),
        };
        self.events.lock().unwrap().push(rendered);
    }
}

// ============================================================================
// Table semantics
// ============================================================================

#[test]
fn table_emits_events_in_mutation_order() {
    let fabric = StorageFabric::new();
    let table = fabric.table::<String, u32>("t");
    let recorder = Arc::new(Recorder::default());
    table.subscribe(recorder.clone());

    table.put("k".to_string(), 1).unwrap();
    table.put("k".to_string(), 2).unwrap();
    table.remove(&"k".to_string()).unwrap();

    assert_eq!(
        recorder.seen(),
        vec!["insert k=1", "update k 1->2", "remove k=2"]
    );
}

#[test]
fn put_if_absent_does_not_replace_or_notify() {
    let fabric = StorageFabric::new();
    let table = fabric.table::<String, u32>("t");
    let recorder = Arc::new(Recorder::default());
    table.subscribe(recorder.clone());

    assert_eq!(table.put_if_absent("k".to_string(), 1).unwrap(), None);
    assert_eq!(table.put_if_absent("k".to_string(), 9).unwrap(), Some(1));

    assert_eq!(table.get(&"k".to_string()), Some(1));
    assert_eq!(recorder.seen(), vec!["insert k=1"]);
}

#[test]
fn compute_if_present_skips_absent_keys() {
    let fabric = StorageFabric::new();
    let table = fabric.table::<String, u32>("t");

    let result = table.compute_if_present(&"nope".to_string(), |v| v + 1).unwrap();
    assert_eq!(result, None);
    assert!(table.is_empty());

    table.put("k".to_string(), 1).unwrap();
    let result = table.compute_if_present(&"k".to_string(), |v| v + 1).unwrap();
    assert_eq!(result, Some(2));
}

#[test]
fn remove_of_absent_key_is_silent() {
    let fabric = StorageFabric::new();
    let table = fabric.table::<String, u32>("t");
    let recorder = Arc::new(Recorder::default());
    table.subscribe(recorder.clone());

    assert_eq!(table.remove(&"k".to_string()).unwrap(), None);
    assert!(recorder.seen().is_empty());
}

#[test]
fn handles_of_the_same_name_share_state() {
    let fabric = StorageFabric::new();
    let one = fabric.table::<String, u32>("shared");
    let two = fabric.table::<String, u32>("shared");

    one.put("k".to_string(), 7).unwrap();
    assert_eq!(two.get(&"k".to_string()), Some(7));

    // Events reach subscribers regardless of which handle mutates.
    let recorder = Arc::new(Recorder::default());
    two.subscribe(recorder.clone());
    one.put("k".to_string(), 8).unwrap();
    assert_eq!(recorder.seen(), vec!["update k 7->8"]);
}

#[test]
fn tables_of_different_names_are_independent() {
    let fabric = StorageFabric::new();
    let one = fabric.table::<String, u32>("one");
    let two = fabric.table::<String, u32>("two");

    one.put("k".to_string(), 1).unwrap();
    assert_eq!(two.get(&"k".to_string()), None);
}

#[test]
fn unsubscribe_stops_delivery() {
    let fabric = StorageFabric::new();
    let table = fabric.table::<String, u32>("t");
    let recorder = Arc::new(Recorder::default());
    let listener: Arc<dyn TableListener<String, u32>> = recorder.clone();
    table.subscribe(listener.clone());

    table.put("k".to_string(), 1).unwrap();
    table.unsubscribe(&listener);
    table.put("k".to_string(), 2).unwrap();

    assert_eq!(recorder.seen(), vec!["insert k=1"]);
}

/// A listener may write back into the table it observes; the nested event is
/// queued behind the current one rather than delivered recursively.
#[test]
fn listener_writeback_is_ordered_not_recursive() {
    struct Chainer {
        table: metron::fabric::ReplicatedTable<String, u32>,
        log: Arc<Recorder>,
    }

    impl TableListener<String, u32> for Chainer {
        fn on_event(&self, event: &TableEvent<String, u32>) {
            self.log.on_event(event);
            if let TableEvent::Insert { key, value } = event {
                if key == "trigger" {
                    self.table.put("chained".to_string(), *value + 1).unwrap();
                }
            }
        }
    }

    let fabric = StorageFabric::new();
    let table = fabric.table::<String, u32>("t");
    let log = Arc::new(Recorder::default());
    table.subscribe(Arc::new(Chainer {
        table: table.clone(),
        log: log.clone(),
    }));

    table.put("trigger".to_string(), 1).unwrap();

    assert_eq!(log.seen(), vec!["insert trigger=1", "insert chained=2"]);
}

// ============================================================================
// Set semantics
// ============================================================================

#[test]
fn set_add_and_remove_report_membership_changes() {
    let fabric = StorageFabric::new();
    let set = fabric.set::<u32>("s");

    assert!(set.add(1).unwrap());
    assert!(!set.add(1).unwrap());
    assert!(set.contains(&1));
    assert!(set.remove(&1).unwrap());
    assert!(!set.remove(&1).unwrap());
    assert!(set.is_empty());
}

#[test]
fn set_concurrent_removal_has_exactly_one_winner() {
    let fabric = StorageFabric::new();
    let set = fabric.set::<u32>("s");
    set.add(42).unwrap();

    let wins = Arc::new(AtomicUsize::new(0));
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let set = set.clone();
            let wins = Arc::clone(&wins);
            std::thread::spawn(move || {
                if set.remove(&42).unwrap() {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(wins.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Counter semantics
// ============================================================================

#[test]
fn counter_advances_only_below_the_ceiling() {
    let fabric = StorageFabric::new();
    let counters = fabric.counter_map::<String>("c");
    let key = "dev".to_string();

    assert_eq!(counters.increment_if_below(&key, 3).unwrap(), Some(0));
    assert_eq!(counters.increment_if_below(&key, 3).unwrap(), Some(1));
    assert_eq!(counters.increment_if_below(&key, 3).unwrap(), Some(2));
    // At the ceiling: denied, and the counter stays put.
    assert_eq!(counters.increment_if_below(&key, 3).unwrap(), None);
    assert_eq!(counters.get(&key), 3);

    // A raised ceiling resumes from where the counter stopped.
    assert_eq!(counters.increment_if_below(&key, 5).unwrap(), Some(3));
}

#[test]
fn counter_clear_resets_a_key() {
    let fabric = StorageFabric::new();
    let counters = fabric.counter_map::<String>("c");
    let key = "dev".to_string();

    counters.increment_if_below(&key, 10).unwrap();
    counters.increment_if_below(&key, 10).unwrap();
    assert_eq!(counters.clear(&key).unwrap(), 2);
    assert_eq!(counters.get(&key), 0);
    assert!(counters.is_empty());
}

// ============================================================================
// Fault injection
// ============================================================================

#[test]
fn armed_faults_fail_exactly_that_many_writes() {
    let fabric = StorageFabric::new();
    let table = fabric.table::<String, u32>("t");
    let set = fabric.set::<u32>("s");

    fabric.fail_next_writes(2);
    assert!(table.put("k".to_string(), 1).is_err());
    assert!(set.add(1).is_err());
    // Faults exhausted; writes succeed again.
    assert!(table.put("k".to_string(), 1).is_ok());
    assert!(set.add(1).is_ok());
}

#[test]
fn reads_are_unaffected_by_armed_faults() {
    let fabric = StorageFabric::new();
    let table = fabric.table::<String, u32>("t");
    table.put("k".to_string(), 1).unwrap();

    fabric.fail_next_writes(1);
    assert_eq!(table.get(&"k".to_string()), Some(1));
    assert_eq!(table.len(), 1);
    // The armed fault is still pending for the next write.
    assert!(table.put("k".to_string(), 2).is_err());
}
