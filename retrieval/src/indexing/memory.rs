//! Memory-budget heuristics for worker sizing.
//!
//! Reads available RAM from the OS rather than allocator statistics, which
//! under-report on every platform worth supporting.

use sysinfo::MemoryRefreshKind;
use sysinfo::RefreshKind;
use sysinfo::System;

/// Estimated resident cost of one file worker (language servers included).
const WORKER_BUDGET_MB: u64 = 500;
/// Worker count bounds.
const MIN_WORKERS: usize = 1;
const MAX_WORKERS: usize = 8;

/// Available system memory in megabytes.
pub fn available_memory_mb() -> u64 {
    let system = System::new_with_specifics(
        RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram()),
    );
    system.available_memory() / (1024 * 1024)
}

/// Worker count: half of available RAM divided by the per-worker budget,
/// clamped to `[1, 8]`. An explicit override wins but is still clamped.
pub fn auto_worker_count(explicit: Option<usize>) -> usize {
    if let Some(workers) = explicit {
        return workers.clamp(MIN_WORKERS, MAX_WORKERS);
    }
    let budget = available_memory_mb() / 2 / WORKER_BUDGET_MB;
    (budget as usize).clamp(MIN_WORKERS, MAX_WORKERS)
}

/// Ask the allocator to hand freed pages back to the OS.
///
/// glibc hoards freed chunks until told otherwise; `malloc_trim` is that
/// hint. Other allocators release on their own schedule, so elsewhere this
/// is a no-op.
pub fn release_to_os() {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    unsafe {
        libc::malloc_trim(0);
    }
}

/// Log a memory datapoint when `ZROK_PROFILE_MEMORY` is set.
pub fn profile_point(context: &str) {
    if crate::config::profile_memory() {
        tracing::info!(context, available_mb = available_memory_mb(), "memory profile");
    }
}

#[cfg(test)]
#[path = "memory.test.rs"]
mod tests;
