// creatio-fs: remote-backed virtual filesystem over a Creatio instance.
//
// Packages appear as directories and schemas as files. Bodies are fetched on
// demand through one serialized request queue per connection and persisted
// in a per-host disk cache.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod index;
pub mod inheritance;
pub mod notify;
pub mod queue;
pub mod session;

pub use cache::{CacheScope, DiskCache};
pub use config::GlobalConfig;
pub use context::FsContext;
pub use error::{FsError, FsResult};
pub use host::SchemaFileSystem;
pub use index::{
    CachePackageReport, Conflict, ConflictHandler, ConflictResolution, DirEntry, Entry, EntryKind,
    IndexOptions, ReloadSummary, RemoteFs, WriteOptions,
};
pub use inheritance::{get_ancestor_chain, AncestorChain};
pub use notify::{ChangeEvent, ChangeKind, ChangeSubscription};
pub use queue::{QueueError, RequestQueue};
pub use session::{ConnectionInfo, SessionClient};
