//! Installs a process-global subscriber, so it runs in its own test binary.

use matriz::observability::init_tracing;

#[test]
fn test_init_tracing_is_idempotent() {
    let _ = init_tracing(false);
    // A second install always fails quietly.
    assert!(!init_tracing(true));
}
