//! Property-based tests for s3upload
//!
//! These tests use proptest to verify the upload session invariants hold
//! across random file sets and event interleavings.
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;
use s3upload::model::command::ItemCommand;
use s3upload::model::item_state::ItemState;
use s3upload::model::session_state::SessionState;
use s3upload::model::upload_file::ItemId;
use s3upload::model::upload_session::{percentage, ItemRef, UploadSession};
use std::cell::RefCell;
use std::rc::Rc;

/// In-process item whose state the test sets directly
#[derive(Clone)]
struct FakeItem {
    id: ItemId,
    size: u64,
    state: Rc<RefCell<ItemState>>,
    received: Rc<RefCell<Vec<ItemCommand>>>,
}

impl FakeItem {
    fn new(id: u64, size: u64, state: ItemState) -> Self {
        FakeItem {
            id: ItemId::from(id),
            size,
            state: Rc::new(RefCell::new(state)),
            received: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn set(&self, state: ItemState) {
        *self.state.borrow_mut() = state;
    }
}

impl ItemRef for FakeItem {
    fn id(&self) -> ItemId {
        self.id
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn state(&self) -> ItemState {
        self.state.borrow().clone()
    }

    fn send(&self, command: ItemCommand) {
        self.received.borrow_mut().push(command);
    }
}

fn session_with(sizes: &[u64]) -> (UploadSession<FakeItem>, Vec<FakeItem>) {
    let items: Vec<FakeItem> = sizes
        .iter()
        .enumerate()
        .map(|(i, size)| FakeItem::new(i as u64 + 1, *size, ItemState::Idle))
        .collect();
    let mut session = UploadSession::new();
    session.add(items.clone());
    (session, items)
}

/// Strategy to generate item states an added item can be in
fn item_state_strategy() -> impl Strategy<Value = ItemState> {
    prop_oneof![
        Just(ItemState::Idle),
        Just(ItemState::Uploading),
        Just(ItemState::Uploaded),
        "[a-z ]{1,12}".prop_map(ItemState::Error),
        Just(ItemState::Stopped),
    ]
}

/// Strategy to generate file sizes split into progress chunks, in a shuffled
/// delivery order. Each entry is (item index, chunk size).
fn chunked_progress_strategy() -> impl Strategy<Value = (Vec<u64>, Vec<(usize, u64)>)> {
    prop::collection::vec((1u64..100_000, 1u64..6), 1..8).prop_flat_map(|files| {
        let sizes: Vec<u64> = files.iter().map(|(size, _)| *size).collect();
        let mut chunks = Vec::new();
        for (index, (size, parts)) in files.iter().enumerate() {
            let part = size / parts;
            for _ in 1..*parts {
                chunks.push((index, part));
            }
            chunks.push((index, size - part * (parts - 1)));
        }
        (Just(sizes), Just(chunks).prop_shuffle())
    })
}

/// Strategy to generate per-file outcomes (true = uploaded) and a finish order
fn outcomes_strategy() -> impl Strategy<Value = (Vec<bool>, Vec<usize>)> {
    prop::collection::vec(any::<bool>(), 1..10).prop_flat_map(|outcomes| {
        let order: Vec<usize> = (0..outcomes.len()).collect();
        (Just(outcomes), Just(order).prop_shuffle())
    })
}

proptest! {
    /// Percentage is bounded and follows round-half-up
    #[test]
    fn test_percentage_matches_rounded_ratio(total in 1u64..1_000_000, ratio in 0.0..=1.0f64) {
        let loaded = ((total as f64) * ratio) as u64;
        let expected = ((loaded as f64) * 100.0 / (total as f64)).round() as u8;
        prop_assert_eq!(percentage(loaded, total), expected);
    }

    /// Over-reporting transports never push progress past 100
    #[test]
    fn test_percentage_never_exceeds_100(loaded in any::<u64>(), total in any::<u64>()) {
        prop_assert!(percentage(loaded, total) <= 100);
    }

    /// Total at upload start counts every item not already uploaded
    #[test]
    fn test_total_excludes_uploaded_items(
        existing in prop::collection::vec((1u64..10_000, item_state_strategy()), 0..10),
        fresh in prop::collection::vec(1u64..10_000, 1..5),
    ) {
        let mut session = UploadSession::new();
        let mut next_id = 1;
        let mut expected = 0;
        for (size, state) in existing {
            if !state.is_uploaded() {
                expected += size;
            }
            session.add(vec![FakeItem::new(next_id, size, state)]);
            next_id += 1;
        }
        for size in fresh {
            expected += size;
            session.add(vec![FakeItem::new(next_id, size, ItemState::Idle)]);
            next_id += 1;
        }

        prop_assert!(session.start_upload(None, None));
        prop_assert_eq!(session.total(), expected);
        prop_assert_eq!(session.loaded(), 0);
        prop_assert_eq!(session.progress(), Some(0));
    }

    /// Progress summing to the total reaches 100 in any interleaving
    #[test]
    fn test_full_progress_reaches_100((sizes, chunks) in chunked_progress_strategy()) {
        let (mut session, _items) = session_with(&sizes);
        prop_assert!(session.start_upload(None, None));
        let cycle = session.cycle();

        let mut previous = 0;
        for (_, additions) in chunks {
            session.record_progress(cycle, additions);
            let progress = session.progress().unwrap_or_default();
            prop_assert!(progress >= previous, "progress went backwards");
            prop_assert!(progress <= 100);
            previous = progress;
        }

        prop_assert_eq!(session.loaded(), session.total());
        prop_assert_eq!(session.progress(), Some(100));
    }

    /// The session outcome depends only on the set of item outcomes
    #[test]
    fn test_outcome_is_order_independent((outcomes, order) in outcomes_strategy()) {
        let sizes = vec![10; outcomes.len()];
        let (mut session, items) = session_with(&sizes);
        prop_assert!(session.start_upload(None, None));
        let cycle = session.cycle();
        for item in &items {
            item.set(ItemState::Uploading);
        }

        for (step, index) in order.iter().enumerate() {
            if outcomes[*index] {
                items[*index].set(ItemState::Uploaded);
            } else {
                items[*index].set(ItemState::Error("boom".into()));
            }
            session.item_finished(cycle);

            if step + 1 < order.len() {
                prop_assert_eq!(session.state(), SessionState::Uploading);
            }
        }

        let expected = if outcomes.iter().all(|ok| *ok) {
            SessionState::Uploaded
        } else {
            SessionState::Error
        };
        prop_assert_eq!(session.state(), expected);
        if expected == SessionState::Uploaded {
            prop_assert_eq!(session.progress(), Some(100));
        }
    }

    /// Cancel always resets the counters, however many items completed
    #[test]
    fn test_cancel_resets_counters(
        sizes in prop::collection::vec(1u64..10_000, 1..10),
        completed in 0usize..10,
    ) {
        let (mut session, items) = session_with(&sizes);
        prop_assert!(session.start_upload(None, None));
        let cycle = session.cycle();
        for item in &items {
            item.set(ItemState::Uploading);
        }
        for item in items.iter().take(completed.min(items.len() - 1)) {
            session.record_progress(cycle, item.size);
            item.set(ItemState::Uploaded);
            session.item_finished(cycle);
        }

        prop_assert!(session.cancel());
        prop_assert_eq!(session.state(), SessionState::Idle);
        prop_assert_eq!(session.progress(), None);
        prop_assert_eq!(session.loaded(), 0);
        prop_assert_eq!(session.total(), 0);
        for item in &items {
            let received = item.received.borrow();
            prop_assert_eq!(received.last(), Some(&ItemCommand::Cancel));
        }
    }

    /// Remove only ever drops stopped items
    #[test]
    fn test_remove_only_drops_stopped(states in prop::collection::vec(item_state_strategy(), 0..12)) {
        let mut session = UploadSession::new();
        let items: Vec<FakeItem> = states
            .iter()
            .enumerate()
            .map(|(i, state)| FakeItem::new(i as u64 + 1, 1, state.clone()))
            .collect();
        session.add(items);

        let removed = session.remove_stopped();
        prop_assert!(removed.iter().all(|item| item.state().is_stopped()));
        prop_assert!(session.items().iter().all(|item| !item.state().is_stopped()));
        prop_assert_eq!(removed.len() + session.items().len(), states.len());
    }
}
