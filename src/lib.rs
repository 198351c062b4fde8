//! oxicache - A bounded, crash-tolerant, on-disk LRU cache
//!
//! Each entry is identified by a string key and holds a fixed number of
//! independent byte-stream values. The cache keeps a total byte budget;
//! when it is exceeded, entries are evicted least-recently-used first by a
//! background cleanup task. State survives restarts through an append-only
//! journal plus per-value files on disk.
//!
//! # Features
//!
//! - Atomic multi-value commits through exclusive, transactional editors
//! - Snapshots that stay readable across later edits and evictions
//! - Crash-safe journal compaction via temp-file plus atomic rename
//! - Open-time recovery that replays the journal and reconciles it with
//!   the filesystem, wiping and starting fresh on corruption
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use oxicache::DiskLruCache;
//!
//! let cache = DiskLruCache::open("/tmp/cache", 1, 2, 10 * oxicache::size::MIB)?;
//!
//! let mut editor = cache.edit("greeting")?.expect("no concurrent editor");
//! editor.set(0, "hello")?;
//! editor.set(1, "world")?;
//! editor.commit()?;
//!
//! if let Some(snapshot) = cache.get("greeting")? {
//!     assert_eq!(snapshot.string(0)?, "hello");
//! }
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod editor;
pub mod error;
pub mod journal;
pub mod runner;
pub mod snapshot;
pub mod stats;

mod entry;
mod index;

// Re-exports for convenience
pub use cache::DiskLruCache;
pub use config::CacheConfig;
pub use editor::{Editor, ValueWriter};
pub use error::{CacheError, Result};
pub use snapshot::Snapshot;
pub use stats::CacheStats;

/// Utility for size literals (e.g., 10 * MIB)
pub mod size {
    /// 1 KiB in bytes
    pub const KIB: u64 = 1024;
    /// 1 MiB in bytes
    pub const MIB: u64 = 1024 * KIB;
    /// 1 GiB in bytes
    pub const GIB: u64 = 1024 * MIB;
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::cache::DiskLruCache;
    pub use crate::config::CacheConfig;
    pub use crate::editor::Editor;
    pub use crate::error::{CacheError, Result};
    pub use crate::snapshot::Snapshot;
}
