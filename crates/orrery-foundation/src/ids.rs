//! Identifier types and attribute key packing.
//!
//! Every cell in the store is addressed by a 4-tuple of small unsigned
//! identifiers. The tuple is packed into a single 64-bit [`AttrKey`] so
//! it can be hashed, compared and copied as one word.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Id of a node type, assigned by the frame at registration.
pub type NodeId = u16;

/// Instance index within a node type, `[0, node.number)`.
pub type NodeIndex = u16;

/// Id of an attribute definition, assigned by the frame.
pub type AttrId = u16;

/// Slot position within a slotted attribute, `[0, max_slots)`.
pub type SlotIndex = u16;

/// Simulation timestamp.
pub type Tick = u64;

/// Bits occupied by each identifier part inside an [`AttrKey`].
const BITS_PER_PART: u32 = 16;

/// Packed `(node_id, node_index, attr_id, slot_index)` cell address.
///
/// The four 16-bit parts are concatenated high-to-low, so the packing is
/// a bijection over the full identifier domain and keys of the same node
/// sort together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttrKey(u64);

impl AttrKey {
    pub fn new(
        node_id: NodeId,
        node_index: NodeIndex,
        attr_id: AttrId,
        slot_index: SlotIndex,
    ) -> Self {
        Self(
            (node_id as u64) << (BITS_PER_PART * 3)
                | (node_index as u64) << (BITS_PER_PART * 2)
                | (attr_id as u64) << BITS_PER_PART
                | slot_index as u64,
        )
    }

    pub fn node_id(&self) -> NodeId {
        (self.0 >> (BITS_PER_PART * 3)) as NodeId
    }

    pub fn node_index(&self) -> NodeIndex {
        (self.0 >> (BITS_PER_PART * 2)) as NodeIndex
    }

    pub fn attr_id(&self) -> AttrId {
        (self.0 >> BITS_PER_PART) as AttrId
    }

    pub fn slot_index(&self) -> SlotIndex {
        self.0 as SlotIndex
    }

    /// The raw packed word.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.node_id(),
            self.node_index(),
            self.attr_id(),
            self.slot_index()
        )
    }
}
