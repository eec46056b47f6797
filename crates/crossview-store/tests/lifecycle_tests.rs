//! Integration tests for store lifecycle behavior.
//!
//! Each test wires a store, a recording subscriber and an attached stats
//! aggregate to one bus, the way the viewer does, and checks what the
//! subscribers observe.

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::f64::consts::PI;
use std::rc::Rc;

use crossview_store::{EntityStore, EventBus, LifecycleStats, StatsHandle};
use crossview_types::{EntityKind, Placement, PoseUpdate, SignalColor, SyncEvent};

struct Harness {
    store: EntityStore,
    stats: StatsHandle,
    log: Rc<RefCell<Vec<SyncEvent>>>,
}

fn harness() -> Harness {
    let bus = EventBus::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    bus.subscribe(move |event| sink.borrow_mut().push(event.clone()))
        .unwrap();
    let stats = LifecycleStats::attach(&bus).unwrap();
    Harness {
        store: EntityStore::new(bus),
        stats,
        log,
    }
}

fn count(log: &[SyncEvent], pred: impl Fn(&SyncEvent) -> bool) -> usize {
    log.iter().filter(|e| pred(e)).count()
}

#[test]
fn idempotent_create_announces_once() {
    let mut h = harness();
    h.store
        .create_vehicle("car-1", &Placement::at(1.0, 1.0, 0.0, 0.1));
    h.store
        .create_vehicle("car-1", &Placement::at(7.0, 8.0, 0.5, 0.2));

    assert_eq!(h.store.vehicle_count(), 1);
    let v = h.store.vehicle("car-1").unwrap();
    assert!((v.position.x - 7.0).abs() < f64::EPSILON);
    assert!((v.position.y - 8.0).abs() < f64::EPSILON);
    assert!((v.heading - 0.2).abs() < f64::EPSILON);

    let created = count(&h.log.borrow(), |e| {
        matches!(e, SyncEvent::EntityCreated { kind: EntityKind::Vehicle, .. })
    });
    assert_eq!(created, 1);
    assert_eq!(h.stats.snapshot().vehicles_in, 1);
}

#[test]
fn unknown_ids_are_no_ops() {
    let mut h = harness();
    assert!(!h.store.move_vehicle("missing", &PoseUpdate::position(1.0, 1.0)));
    assert!(!h.store.delete_vehicle("missing"));
    assert!(!h.store.set_color("missing", "red"));
    assert!(h.log.borrow().is_empty());
}

#[test]
fn degrees_and_radians_are_told_apart() {
    let mut h = harness();
    h.store
        .create_vehicle("car-1", &Placement::at(0.0, 0.0, 0.0, 450.0));
    let heading = h.store.vehicle("car-1").unwrap().heading;
    assert!((heading - 450.0 * PI / 180.0).abs() < 1e-12);

    h.store
        .create_vehicle("car-2", &Placement::at(0.0, 0.0, 0.0, 1.2));
    let heading = h.store.vehicle("car-2").unwrap().heading;
    assert!((heading - 1.2).abs() < f64::EPSILON);
}

#[test]
fn unknown_color_names_are_refused() {
    let mut h = harness();
    h.store
        .create_signal("tl-1", &Placement::default(), Some(SignalColor::Red));

    assert!(!h.store.set_color("tl-1", "purple"));
    assert_eq!(h.store.signal("tl-1").unwrap().color, SignalColor::Red);

    assert!(h.store.set_color("tl-1", "green"));
    assert_eq!(h.store.signal("tl-1").unwrap().color, SignalColor::Green);
}

#[test]
fn lifetimes_average_over_deletions() {
    let mut h = harness();

    h.store.create_vehicle("car-1", &Placement::default());
    assert!(h.store.set_clock(10.0));
    assert!(h.store.delete_vehicle("car-1"));

    let snap = h.stats.snapshot();
    assert_eq!(snap.samples, 1);
    assert!((snap.average_lifetime - 10.0).abs() < 1e-12);

    h.store.create_vehicle("car-2", &Placement::default());
    assert!(h.store.set_clock(14.0));
    assert!(h.store.delete_vehicle("car-2"));

    let snap = h.stats.snapshot();
    assert_eq!(snap.samples, 2);
    assert!((snap.average_lifetime - 7.0).abs() < 1e-12);

    let lifetimes: Vec<f64> = h
        .log
        .borrow()
        .iter()
        .filter_map(|e| match e {
            SyncEvent::EntityDeleted { lifetime, .. } => Some(*lifetime),
            _ => None,
        })
        .collect();
    assert_eq!(lifetimes.len(), 2);
    assert!((lifetimes[0] - 10.0).abs() < 1e-12);
    assert!((lifetimes[1] - 4.0).abs() < 1e-12);
}

#[test]
fn reset_clears_vehicles_and_average_only() {
    let mut h = harness();
    for id in ["car-1", "car-2", "car-3"] {
        h.store.create_vehicle(id, &Placement::default());
    }
    assert!(h.store.set_clock(3.0));
    assert!(h.store.delete_vehicle("car-2"));
    h.log.borrow_mut().clear();

    assert_eq!(h.store.reset_vehicles(), 2);
    assert_eq!(h.store.vehicle_count(), 0);

    let log = h.log.borrow();
    assert_eq!(*log, vec![SyncEvent::EntitiesReset { remaining: 0 }]);

    let snap = h.stats.snapshot();
    assert_eq!(snap.samples, 0);
    assert!(snap.average_lifetime.abs() < f64::EPSILON);
    assert_eq!(snap.vehicles_in, 3);
    assert_eq!(snap.vehicles_out, 1);
}

#[test]
fn subscribers_see_mutations_synchronously() {
    let mut h = harness();
    h.store.create_vehicle("car-1", &Placement::default());
    assert_eq!(h.log.borrow().len(), 1);
    assert!(h.store.delete_vehicle("car-1"));
    assert_eq!(h.log.borrow().len(), 2);
    assert!(matches!(
        h.log.borrow().last(),
        Some(SyncEvent::EntityDeleted { remaining: 0, .. })
    ));
}
