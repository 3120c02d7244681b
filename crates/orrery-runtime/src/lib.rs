//! Orrery Runtime
//!
//! In-memory state backend for a discrete-event simulation: a dense
//! attribute cell pool addressed by packed keys, a schema frame over it,
//! and a bounded ring of per-tick snapshots with multidimensional query
//! and CSV export.
//!
//! # Architecture
//!
//! - [`storage`] - [`AttributeStore`]: dense cell pool, hole tracking, compaction
//! - [`frame`] - [`Frame`]: node/attribute schema over the live store
//! - [`snapshot`] - [`SnapshotList`]: bounded tick history, query protocol, CSV dump
//! - [`backend`] - [`Backend`]: a frame and its ring wired together
//! - [`config`] - sizing knobs
//! - [`error`] - error conditions
//!
//! # Example
//!
//! ```
//! use orrery_runtime::{Backend, BackendConfig};
//!
//! let mut backend = Backend::new(BackendConfig::default())?;
//! let frame = backend.frame();
//! let (city, population) = {
//!     let mut frame = frame.borrow_mut();
//!     let city = frame.add_node("city", 4);
//!     let population = frame.add_attr(city, "population", 1)?;
//!     (city, population)
//! };
//! backend.setup();
//!
//! frame.borrow_mut().set_value(city, 0, population, 0, 1250.0)?;
//! backend.take_snapshot(0)?;
//!
//! let cell = backend.snapshots().get(0, city, 0, population, 0);
//! assert_eq!(cell.value(), 1250.0);
//! # Ok::<(), orrery_runtime::Error>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod frame;
pub mod snapshot;
pub mod storage;

pub use backend::Backend;
pub use config::BackendConfig;
pub use error::{Error, Result};
pub use frame::{AttrDef, Frame, NodeDef};
pub use snapshot::{ResultShape, SnapshotList};
pub use storage::AttributeStore;

// Re-export the foundation value types for downstream convenience.
pub use orrery_foundation::{AttrId, AttrKey, Attribute, Bitset, NodeId, NodeIndex, SlotIndex, Tick};
