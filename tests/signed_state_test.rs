/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests for the reservation lifecycle of [SignedState]s, and for the [SignedStateNexus].

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use hashgraph_integrity::signed_state::{
    ReservationAction, ReservationError, ReservedSignedState, SignedState, SignedStateNexus,
    DESTROYED,
};
use hashgraph_integrity::types::data_types::{CryptoHash, Round};
use log::LevelFilter;
use rand::Rng;

use common::logging::setup_logger;
use common::snapshot::*;

#[test]
fn reservation_count_balances_reserves_and_closes() {
    setup_logger(LevelFilter::Info);

    let counter = ReleaseCounter::new();
    let state = signed_state(1, &counter);
    assert_eq!(state.reservation_count(), 0);

    // The first handle is only given back at the end, so the count never drops to zero before.
    let anchor = SignedState::reserve(&state, "anchor").unwrap();
    let mut rng = rand::thread_rng();
    let mut handles = Vec::new();
    let mut reserves = 1;
    let mut closes = 0;
    for _ in 0..500 {
        if handles.is_empty() || rng.gen_bool(0.6) {
            handles.push(anchor.get_and_reserve("random").unwrap());
            reserves += 1;
        } else {
            let index = rng.gen_range(0, handles.len());
            let handle: ReservedSignedState<CountingSnapshot> = handles.swap_remove(index);
            handle.close().unwrap();
            closes += 1;
        }
        assert_eq!(state.reservation_count(), reserves - closes);
    }

    for handle in handles.drain(..) {
        handle.close().unwrap();
    }
    assert_eq!(state.reservation_count(), 1);
    assert_eq!(counter.releases(), 0);

    anchor.close().unwrap();
    assert_eq!(state.reservation_count(), DESTROYED);
    assert!(state.is_destroyed());
    assert!(state.is_torn_down());
    assert_eq!(counter.releases(), 1);
}

#[test]
fn destroyed_state_cannot_be_reserved_again() {
    setup_logger(LevelFilter::Info);

    let counter = ReleaseCounter::new();
    let state = signed_state(7, &counter);
    let handle = SignedState::reserve(&state, "first").unwrap();
    handle.close().unwrap();
    assert!(state.is_destroyed());

    match SignedState::reserve(&state, "too late") {
        Err(ReservationError::ReferenceCountViolation {
            round,
            action,
            reservation_count,
        }) => {
            assert_eq!(round, Round::new(7));
            assert_eq!(action, ReservationAction::Reserve);
            assert_eq!(reservation_count, DESTROYED);
        }
        other => panic!("expected a reference count violation, got {:?}", other),
    }
    assert!(SignedState::try_reserve(&state, "too late").is_none());
    assert!(ReservedSignedState::try_create_and_reserve(Arc::clone(&state), "too late").is_none());

    assert_eq!(state.reservation_count(), DESTROYED);
    assert_eq!(counter.releases(), 1);
}

#[test]
fn dropping_a_handle_releases_its_reservation() {
    setup_logger(LevelFilter::Info);

    let counter = ReleaseCounter::new();
    let state = signed_state(2, &counter);
    {
        let first = SignedState::reserve(&state, "scoped").unwrap();
        let _second = first.get_and_reserve("scoped too").unwrap();
        assert_eq!(state.reservation_count(), 2);
    }
    assert!(state.is_destroyed());
    assert_eq!(counter.releases(), 1);
}

#[test]
fn handles_on_the_same_state_are_distinct() {
    setup_logger(LevelFilter::Info);

    let counter = ReleaseCounter::new();
    let state = signed_state(3, &counter);
    let first = SignedState::reserve(&state, "first").unwrap();
    let second = first.get_and_reserve("second").unwrap();

    assert_ne!(first, second);
    assert_ne!(first.reservation_id(), second.reservation_id());
    assert_eq!(first.reason(), "first");
    assert_eq!(second.reason(), "second");
    assert!(Arc::ptr_eq(first.get().unwrap(), second.get().unwrap()));
    assert_eq!(
        first.get().unwrap().with_snapshot(|snapshot| snapshot.value),
        Some(3)
    );
}

#[test]
fn null_reservation_holds_nothing() {
    setup_logger(LevelFilter::Info);

    let null = ReservedSignedState::<CountingSnapshot>::create_null_reservation();
    assert!(null.is_null());
    assert!(!null.is_not_null());
    assert_eq!(null.reason(), "");
    assert!(matches!(null.get(), Err(ReservationError::NullReservation)));
    assert!(null.get_nullable().is_none());

    let another = null.get_and_reserve("copy").unwrap();
    assert!(another.is_null());
    assert_ne!(null, another);
    assert!(null.try_get_and_reserve("copy").unwrap().is_null());

    another.close().unwrap();
    null.close().unwrap();
}

#[test]
fn concurrent_releases_tear_down_exactly_once() {
    setup_logger(LevelFilter::Info);

    for round in 0..20 {
        let counter = ReleaseCounter::new();
        let state = signed_state(round, &counter);
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| SignedState::reserve(&state, "worker").unwrap())
            .collect();

        let workers: Vec<_> = handles
            .into_iter()
            .map(|handle| {
                let barrier = Arc::clone(&barrier);
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    barrier.wait();
                    handle.close().unwrap();
                    // Races with the last release: either succeeds or observes the destroyed state.
                    if let Some(late) = SignedState::try_reserve(&state, "late") {
                        late.close().unwrap();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert!(state.is_destroyed());
        assert_eq!(counter.releases(), 1);
    }
}

#[test]
fn reservation_history_tracks_outstanding_reasons() {
    setup_logger(LevelFilter::Info);

    let counter = ReleaseCounter::new();
    let state = Arc::new(
        SignedState::builder()
            .round(Round::new(4))
            .state_hash(CryptoHash::new([4; 32]))
            .snapshot(counter.snapshot(4))
            .state_to_save(true)
            .reservation_history(true)
            .build(),
    );
    assert!(state.is_state_to_save());

    let hashing = SignedState::reserve(&state, "hashing").unwrap();
    let saving = hashing.get_and_reserve("saving").unwrap();
    assert_eq!(
        state.outstanding_reservations().unwrap(),
        vec![
            (hashing.reservation_id(), "hashing".to_string()),
            (saving.reservation_id(), "saving".to_string()),
        ]
    );

    hashing.close().unwrap();
    let outstanding = state.outstanding_reservations().unwrap();
    assert_eq!(outstanding.len(), 1);
    assert_eq!(outstanding[0].1, "saving");

    saving.close().unwrap();
    assert!(state.outstanding_reservations().unwrap().is_empty());

    // States built without a history don't record one.
    assert!(signed_state(5, &counter).outstanding_reservations().is_none());
}

#[test]
fn nexus_hands_out_reservations_on_the_latest_state() {
    setup_logger(LevelFilter::Info);

    let counter = ReleaseCounter::new();
    let nexus = SignedStateNexus::new();
    assert!(nexus.get_state("empty").is_null());
    assert_eq!(nexus.round(), None);

    let first = signed_state(10, &counter);
    nexus
        .set_state(SignedState::reserve(&first, "nexus").unwrap())
        .unwrap();
    assert_eq!(nexus.round(), Some(Round::new(10)));

    let reader = nexus.get_state("reader");
    assert_eq!(reader.get().unwrap().round(), Round::new(10));
    assert_eq!(first.reservation_count(), 2);

    // Replacing the state gives back the nexus' reservation on the previous one, which survives
    // as long as the reader holds on to it.
    let second = signed_state(11, &counter);
    nexus
        .set_state(SignedState::reserve(&second, "nexus").unwrap())
        .unwrap();
    assert_eq!(first.reservation_count(), 1);
    assert_eq!(counter.releases(), 0);

    reader.close().unwrap();
    assert!(first.is_destroyed());
    assert_eq!(counter.releases(), 1);

    nexus.clear().unwrap();
    assert!(second.is_destroyed());
    assert_eq!(counter.releases(), 2);
    assert!(nexus.get_state("cleared").is_null());
}
