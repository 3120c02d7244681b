//! Error conditions for the attribute store and snapshot ring.
//!
//! All conditions are synchronous caller-side failures; there is no
//! recovery layer. Allocation failure during pool growth is not caught.

use orrery_foundation::{AttrId, NodeId};
use thiserror::Error;

/// Runtime result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the store, the frame and the snapshot ring.
#[derive(Debug, Error)]
pub enum Error {
    /// A composite key is not mapped to any cell.
    #[error("no attribute mapped at the given key")]
    BadAttributeIndexing,

    /// Overwrite was attempted on a tick other than the latest one.
    #[error("invalid tick to take snapshot, only the latest tick can be overwritten")]
    InvalidSnapshotTick,

    /// The ring capacity is unset or zero.
    #[error("snapshot list max size must be larger than 0")]
    InvalidSnapshotSize,

    /// `query` was called without a preceding `prepare`.
    #[error("query must be called after prepare")]
    SnapshotQueryNotPrepared,

    /// `prepare` was called with an empty attribute list.
    #[error("attribute list for query must contain at least 1")]
    SnapshotQueryNoAttributes,

    /// A frame-dependent operation ran before a frame was bound.
    #[error("no frame bound before snapshot operations")]
    SnapshotInvalidFrameState,

    /// The query output slice cannot hold the prepared result shape.
    #[error("query result buffer is too small for the prepared shape")]
    SnapshotQueryResultTooSmall,

    /// A node id outside the frame's registered range.
    #[error("node id out of range: {0}")]
    InvalidNodeId(NodeId),

    /// An attribute id outside the frame's registered range.
    #[error("attribute id out of range: {0}")]
    InvalidAttrId(AttrId),

    /// Configuration validation failure.
    #[error("invalid backend config: {0}")]
    InvalidConfig(String),

    /// I/O failure while dumping snapshots.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
