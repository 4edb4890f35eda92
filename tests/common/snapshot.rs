use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use hashgraph_integrity::signed_state::{SignedState, StateSnapshot};
use hashgraph_integrity::types::data_types::{CryptoHash, Round};

/// A snapshot that counts how many times snapshots sharing its counter were released.
pub(crate) struct CountingSnapshot {
    pub(crate) value: u64,
    releases: Arc<AtomicUsize>,
}

impl StateSnapshot for CountingSnapshot {
    fn release(self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub(crate) struct ReleaseCounter(Arc<AtomicUsize>);

impl ReleaseCounter {
    pub(crate) fn new() -> ReleaseCounter {
        Self::default()
    }

    pub(crate) fn releases(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn snapshot(&self, value: u64) -> CountingSnapshot {
        CountingSnapshot {
            value,
            releases: Arc::clone(&self.0),
        }
    }
}

/// An unreserved signed state for `round`, whose snapshot reports releases to `counter`.
pub(crate) fn signed_state(round: u64, counter: &ReleaseCounter) -> Arc<SignedState<CountingSnapshot>> {
    Arc::new(
        SignedState::builder()
            .round(Round::new(round))
            .state_hash(CryptoHash::new([round as u8; 32]))
            .snapshot(counter.snapshot(round))
            .build(),
    )
}
