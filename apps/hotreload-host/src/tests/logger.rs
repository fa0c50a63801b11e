// Unit tests for logger initialization
// Only one global logger can exist per process, so both calls live in one test.

use crate::logger::initialize;

use tempfile::TempDir;

/// **VALUE**: Verifies that calling initialize() repeatedly is harmless and that the
/// log file appears.
///
/// **BUG THIS CATCHES**: Would catch if the Once or AtomicBool guards are removed,
/// causing fern to fail when trying to set a global logger twice.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN: A temporary log directory
    let dir = TempDir::new().unwrap();

    // WHEN: Initializing twice
    let first = initialize(dir.path());
    let second = initialize(dir.path());

    // THEN: Both Ok, and hotreload.log exists
    assert!(first.is_ok(), "First initialization should succeed: {first:?}");
    assert!(second.is_ok(), "Second initialization should be a no-op");
    assert!(dir.path().join("hotreload.log").exists());
}
