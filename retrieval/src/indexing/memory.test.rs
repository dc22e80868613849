use super::*;
use pretty_assertions::assert_eq;

#[test]
fn explicit_worker_count_is_clamped() {
    assert_eq!(auto_worker_count(Some(0)), 1);
    assert_eq!(auto_worker_count(Some(3)), 3);
    assert_eq!(auto_worker_count(Some(64)), 8);
}

#[test]
fn auto_worker_count_stays_in_bounds() {
    let workers = auto_worker_count(None);
    assert!((1..=8).contains(&workers));
}

#[test]
fn available_memory_reports_something() {
    // Exact value is host-dependent; it just must not be zero on any
    // machine capable of running the test suite.
    assert!(available_memory_mb() > 0);
}

#[test]
fn release_to_os_is_callable_everywhere() {
    // A hint, not an operation with observable output; it must simply be
    // safe to call on every platform, glibc or not.
    release_to_os();
    release_to_os();
}
