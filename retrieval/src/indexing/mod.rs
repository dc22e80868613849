//! Indexing: file discovery, orchestration, watch mode, memory budget.

mod indexer;
pub mod memory;
mod walker;
mod watcher;

pub use indexer::BuildReport;
pub use indexer::Indexer;
pub use indexer::IndexStats;
pub use walker::FileWalker;
pub use watcher::watch;
