//! The incremental file database.
//!
//! - `data` - immutable snapshot types ([`FileDatabaseSnapshot`],
//!   [`FileData`], [`ContentPiece`]) and the [`FileDatabase`] holder
//! - `builder` - the snapshot-to-snapshot build pipeline
//! - `partition` - byte-weight balancing of search work

mod builder;
mod data;
mod partition;

pub use builder::FileDatabaseBuilder;
pub use data::{ContentPiece, DirectoryData, FileData, FileDatabase, FileDatabaseSnapshot};
pub use partition::partition_by_weight;
