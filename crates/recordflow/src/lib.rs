pub mod config;
pub mod metadata;
pub mod storage;
pub mod sync;
pub mod testing;

pub use config::SyncSettings;
pub use metadata::{ColumnMapping, ColumnType, EntityMetadataCache, MetadataError};
pub use sync::{Clock, Coordinator, ManualClock, SyncStats, SyncWorker, SystemClock};
