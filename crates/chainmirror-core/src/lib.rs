//! chainmirror-core: foundation for mirroring a remote block feed into a local store.
//!
//! # Architecture
//!
//! ```text
//! SyncEngine ──┬── BlockSource   (remote tip / height / hash lookups)
//!              ├── BlockStore    (idempotent durable cache)
//!              └── HeightCursor  (monotonic lastKnownHeight)
//!
//! BlockReader ─── store first, remote on miss, write-back on fill
//! ```

pub mod builder;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod reader;
pub mod source;
pub mod store;
pub mod types;

pub use builder::SyncConfigBuilder;
pub use config::{SyncConfig, SyncState, SyncStatus, MAX_RECENT};
pub use cursor::HeightCursor;
pub use engine::{BackfillReport, SyncEngine, TickReport};
pub use error::MirrorError;
pub use reader::{BlockReader, Origin, Resolved, WriteBack};
pub use source::{BlockSource, MemoryBlockSource};
pub use store::{BlockStore, MemoryBlockStore};
pub use types::{Block, BlockKey, ParentRef, Transaction};
