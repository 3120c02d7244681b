//! Orrery Foundation
//!
//! Leaf value types shared across the Orrery simulation state backend:
//! packed cell keys, the NaN-tagged [`Attribute`] cell, and the
//! fixed-capacity [`Bitset`] used to track free cells.
//!
//! ```
//! use orrery_foundation::{AttrKey, Attribute};
//!
//! let key = AttrKey::new(2, 7, 1, 0);
//! assert_eq!(key.node_index(), 7);
//! assert!(Attribute::default().is_nan());
//! ```

pub mod attribute;
pub mod bitset;
pub mod ids;

pub use attribute::Attribute;
pub use bitset::{Bitset, BITS_PER_WORD};
pub use ids::{AttrId, AttrKey, NodeId, NodeIndex, SlotIndex, Tick};
