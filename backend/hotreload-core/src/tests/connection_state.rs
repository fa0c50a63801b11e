// Unit tests for the packed state/generation cell.

use crate::hotreload::{ConnectionState, StateCell};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// **VALUE**: Walks one full lifecycle through every transition.
#[test]
fn given_idle_cell_when_cycling_then_states_follow_lifecycle() {
    // GIVEN: A fresh cell
    let cell = StateCell::new();
    assert_eq!(cell.get(), ConnectionState::Idle);

    // WHEN / THEN: Each transition lands in the expected state
    let generation = cell.begin_start().expect("idle cell should start");
    assert_eq!(cell.get(), ConnectionState::Starting);

    assert!(cell.mark_running(generation));
    assert_eq!(cell.get(), ConnectionState::Running);

    assert_eq!(cell.begin_stop(), Some(generation));
    assert_eq!(cell.get(), ConnectionState::Stopping);

    cell.finish(generation);
    assert_eq!(cell.get(), ConnectionState::Idle);
}

/// **VALUE**: Verifies that transitions from the wrong state are refused.
///
/// **BUG THIS CATCHES**: Would catch a `stop` that acts on a starting connection or a `start`
/// that spawns a second worker while one is running.
#[test]
fn given_wrong_state_when_transitioning_then_nothing_changes() {
    let cell = StateCell::new();

    // Stop while idle
    assert_eq!(cell.begin_stop(), None);
    assert_eq!(cell.get(), ConnectionState::Idle);

    // Start twice
    let generation = cell.begin_start().expect("first start wins");
    assert_eq!(cell.begin_start(), None);

    // Stop while still starting
    assert_eq!(cell.begin_stop(), None);
    assert_eq!(cell.get(), ConnectionState::Starting);

    // Running twice
    assert!(cell.mark_running(generation));
    assert!(!cell.mark_running(generation));
}

/// **VALUE**: Verifies that each cycle gets a new generation.
///
/// **WHY THIS MATTERS**: The generation is what keeps a late stop request for an old session
/// from interrupting the next one.
#[test]
fn given_finished_cycle_when_started_again_then_generation_increases() {
    let cell = StateCell::new();

    let first = cell.begin_start().expect("start");
    assert!(cell.mark_running(first));
    cell.finish(first);

    let second = cell.begin_start().expect("restart");
    assert!(second > first, "Generation should increase across cycles");

    // A stale generation cannot mark the new cycle running
    assert!(!cell.mark_running(first));
    assert!(cell.mark_running(second));
}

/// **VALUE**: Verifies that concurrent starts from many threads produce exactly one winner.
#[test]
fn given_many_threads_when_starting_concurrently_then_exactly_one_wins() {
    // GIVEN: A shared idle cell
    let cell = Arc::new(StateCell::new());
    let winners = Arc::new(AtomicUsize::new(0));

    // WHEN: Sixteen threads race to start
    let threads: Vec<_> = (0..16)
        .map(|_| {
            let cell = Arc::clone(&cell);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                if cell.begin_start().is_some() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in threads {
        handle.join().expect("thread should not panic");
    }

    // THEN: One winner, state Starting
    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert_eq!(cell.get(), ConnectionState::Starting);
}
