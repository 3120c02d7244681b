//! Dense attribute cell pool with sparse key addressing.
//!
//! [`AttributeStore`] keeps every live cell in one dense vector and
//! addresses it through packed [`AttrKey`]s. Removing cells punches
//! holes that are flagged in an empty-cell bitset; [`arrange`] slides
//! live cells down to close the holes without renumbering keys, so
//! handles held by the simulation stay valid across compaction.
//!
//! Invariants maintained by every operation:
//!
//! - `mapping` and `index_to_key` are inverses of each other
//! - bit `i` of `empty_mask` is set iff `cells[i]` is unused
//! - every live cell lies below `last_index`
//! - `dirty` iff an empty bit exists below `last_index`
//!
//! [`arrange`]: AttributeStore::arrange

use std::collections::HashMap;

use orrery_foundation::{
    AttrId, AttrKey, Attribute, Bitset, NodeId, NodeIndex, SlotIndex, BITS_PER_WORD,
};
use tracing::{debug, trace};

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct AttributeStore {
    /// Key -> cell index.
    mapping: HashMap<AttrKey, usize>,
    /// Cell index -> key, consulted when compaction relocates cells.
    index_to_key: HashMap<usize, AttrKey>,
    cells: Vec<Attribute>,
    /// Bit set iff the cell at that index is unused.
    empty_mask: Bitset,
    /// Exclusive upper bound of the region holding live cells.
    last_index: usize,
    /// Holes exist below `last_index`.
    dirty: bool,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to `initial_cells` capacity, rounded up to the bitset word
    /// width. All cells start empty.
    pub fn setup(&mut self, initial_cells: usize) {
        let capacity = initial_cells.div_ceil(BITS_PER_WORD) * BITS_PER_WORD;

        self.mapping.clear();
        self.index_to_key.clear();
        self.cells.clear();
        self.cells.resize(capacity, Attribute::EMPTY);
        self.empty_mask.resize(capacity);
        self.empty_mask.set_all();
        self.last_index = 0;
        self.dirty = false;
    }

    /// Number of live cells.
    pub fn size(&self) -> usize {
        self.mapping.len()
    }

    /// Total cell capacity, live or not.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Exclusive upper bound of the live region. Equals [`size`] right
    /// after [`arrange`]; larger whenever holes exist.
    ///
    /// [`size`]: AttributeStore::size
    /// [`arrange`]: AttributeStore::arrange
    pub fn last_index(&self) -> usize {
        self.last_index
    }

    /// True iff at least one hole lies below [`last_index`].
    ///
    /// [`last_index`]: AttributeStore::last_index
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, key: AttrKey) -> Result<&Attribute> {
        let index = *self.mapping.get(&key).ok_or(Error::BadAttributeIndexing)?;
        Ok(&self.cells[index])
    }

    pub fn get_mut(&mut self, key: AttrKey) -> Result<&mut Attribute> {
        let index = *self.mapping.get(&key).ok_or(Error::BadAttributeIndexing)?;
        Ok(&mut self.cells[index])
    }

    /// Map every `(node_index in [start, stop), slot in [0, slot_num))`
    /// key to a cell. Free cells are reused lowest-first; the pool grows
    /// when none remain. Already-mapped keys are left alone.
    pub fn add_nodes(
        &mut self,
        node_id: NodeId,
        start: NodeIndex,
        stop: NodeIndex,
        attr_id: AttrId,
        slot_num: SlotIndex,
    ) {
        for node_index in start..stop {
            for slot_index in 0..slot_num {
                let key = AttrKey::new(node_id, node_index, attr_id, slot_index);
                if self.mapping.contains_key(&key) {
                    continue;
                }

                let index = self.claim_empty_cell();
                self.cells[index] = Attribute::EMPTY;
                self.mapping.insert(key, index);
                self.index_to_key.insert(index, key);
                self.empty_mask.clear(index);
                if index >= self.last_index {
                    self.last_index = index + 1;
                }
            }
        }
        self.refresh_dirty();
    }

    /// Unmap every slot of one node instance's attribute.
    pub fn remove_node(
        &mut self,
        node_id: NodeId,
        node_index: NodeIndex,
        attr_id: AttrId,
        slot_num: SlotIndex,
    ) {
        for slot_index in 0..slot_num {
            self.release(AttrKey::new(node_id, node_index, attr_id, slot_index));
        }
        self.refresh_dirty();
    }

    /// Unmap the slot range `[from, stop)` for every instance in
    /// `[0, node_num)`.
    pub fn remove_attr_slots(
        &mut self,
        node_id: NodeId,
        node_num: NodeIndex,
        attr_id: AttrId,
        from: SlotIndex,
        stop: SlotIndex,
    ) {
        for node_index in 0..node_num {
            for slot_index in from..stop {
                self.release(AttrKey::new(node_id, node_index, attr_id, slot_index));
            }
        }
        self.refresh_dirty();
    }

    /// Close every hole below `last_index` by sliding live cells down,
    /// preserving their relative order. Keys keep addressing the same
    /// values; only the underlying indices change.
    pub fn arrange(&mut self) {
        if !self.dirty {
            return;
        }

        let mut moved = 0usize;
        let mut dest = self.empty_mask.first_set_from(0);
        while dest < self.last_index {
            let src = self.empty_mask.first_clear_from(dest + 1);
            if src >= self.last_index {
                break;
            }

            let key = self
                .index_to_key
                .remove(&src)
                .expect("live cell without a key mapping");
            self.cells[dest] = self.cells[src];
            self.cells[src] = Attribute::EMPTY;
            self.empty_mask.clear(dest);
            self.empty_mask.set(src);
            self.index_to_key.insert(dest, key);
            self.mapping.insert(key, dest);
            moved += 1;

            dest = self.empty_mask.first_set_from(dest + 1);
        }

        self.last_index = self.mapping.len();
        self.dirty = false;
        trace!(moved, live = self.last_index, "attribute pool compacted");
    }

    /// Arrange, then copy the live prefix into `dest`. When
    /// `mapping_out` is given it receives a copy of the current key map.
    pub fn copy_to(
        &mut self,
        dest: &mut [Attribute],
        mapping_out: Option<&mut HashMap<AttrKey, usize>>,
    ) {
        self.arrange();
        dest[..self.last_index].copy_from_slice(&self.cells[..self.last_index]);
        if let Some(mapping_out) = mapping_out {
            mapping_out.clone_from(&self.mapping);
        }
    }

    /// Clear all cells and mappings. Capacity is kept.
    pub fn reset(&mut self) {
        self.mapping.clear();
        self.index_to_key.clear();
        self.cells.fill(Attribute::EMPTY);
        self.empty_mask.set_all();
        self.last_index = 0;
        self.dirty = false;
    }

    /// Lowest free cell index, growing the pool when every cell is in
    /// use.
    fn claim_empty_cell(&mut self) -> usize {
        let index = self.empty_mask.first_set_from(0);
        if index < self.capacity() {
            index
        } else {
            self.grow()
        }
    }

    /// Double the pool; returns the first index of the new free region.
    fn grow(&mut self) -> usize {
        let old_capacity = self.capacity();
        let new_capacity = (old_capacity * 2).max(BITS_PER_WORD);

        self.cells.resize(new_capacity, Attribute::EMPTY);
        self.empty_mask.resize(new_capacity);
        self.empty_mask.set_range(old_capacity, new_capacity);
        debug!(old_capacity, new_capacity, "attribute pool grown");

        old_capacity
    }

    /// Unmap one key: the cell is cleared and flagged free. Freeing the
    /// topmost live cell walks `last_index` left over trailing empties.
    fn release(&mut self, key: AttrKey) {
        let Some(index) = self.mapping.remove(&key) else {
            return;
        };
        self.index_to_key.remove(&index);
        self.cells[index] = Attribute::EMPTY;
        self.empty_mask.set(index);

        if index + 1 == self.last_index {
            while self.last_index > 0 && self.empty_mask.get(self.last_index - 1) {
                self.last_index -= 1;
            }
        }
    }

    /// Recompute the hole flag with one bitset scan.
    fn refresh_dirty(&mut self) {
        self.dirty = self.empty_mask.first_set_from(0) < self.last_index;
    }
}
