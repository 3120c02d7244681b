//! Bounded snapshot ring over the attribute store.
//!
//! [`SnapshotList`] freezes the live [`AttributeStore`] at tick
//! boundaries into one flat backing vector. Snapshots are immutable once
//! written; only the newest tick may be overwritten in place. When the
//! ring is full the oldest tick is evicted and its region is recycled as
//! a single contiguous hole, so the union of live regions plus the hole
//! always tiles `[0, end_index)`.
//!
//! Reads go through `(tick, key)` lookups or the two-step
//! [`prepare`]/[`query`] protocol that extracts a dense
//! `[tick x node x attr x slot]` tensor, and [`dump`] exports every
//! stored tick to CSV.
//!
//! [`prepare`]: SnapshotList::prepare
//! [`query`]: SnapshotList::query
//! [`dump`]: SnapshotList::dump

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, trace};

use orrery_foundation::{AttrId, AttrKey, Attribute, NodeId, NodeIndex, SlotIndex, Tick};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::storage::AttributeStore;

/// Dimensions of a query result tensor, slot axis fastest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultShape {
    pub tick_number: usize,
    pub max_node_number: usize,
    pub attr_number: usize,
    /// Largest `max_slots` across the queried attributes.
    pub max_slot_number: usize,
}

impl ResultShape {
    /// Element count of the flattened tensor.
    pub fn len(&self) -> usize {
        self.tick_number * self.max_node_number * self.attr_number * self.max_slot_number
    }

    /// True when any dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parameters captured by `prepare` for the following `query`. Defaults
/// (all stored ticks, all instances of the node) are resolved when they
/// are captured.
#[derive(Debug, Clone)]
struct QueryParameters {
    node_id: NodeId,
    ticks: Vec<Tick>,
    node_indices: Vec<NodeIndex>,
    attributes: Vec<AttrId>,
}

#[derive(Default)]
pub struct SnapshotList {
    frame: Option<Rc<RefCell<Frame>>>,
    /// Flat backing vector; snapshot regions are carved out of it.
    attr_store: Vec<Attribute>,
    /// Tick -> region start offset, iterated in ascending tick order.
    tick_to_index: BTreeMap<Tick, usize>,
    /// Tick -> region length.
    tick_to_size: BTreeMap<Tick, usize>,
    /// Tick -> index into `mappings`.
    tick_to_mapping: BTreeMap<Tick, usize>,
    /// Append-only key -> offset maps. Consecutive ticks share one map
    /// while the source store keeps its shape.
    mappings: Vec<HashMap<AttrKey, usize>>,
    /// Start of the hole left by evicting non-tail snapshots.
    first_empty_slot_index: usize,
    /// Length of the hole; zero when none exists.
    empty_slots_length: usize,
    /// First unused offset past the tail snapshot.
    end_index: usize,
    /// Live count; transiently exceeds `max_size` during bookkeeping.
    cur_snapshot_num: usize,
    last_tick: Option<Tick>,
    max_size: usize,
    /// Single-slot state machine for the prepare/query handshake.
    prepared: Option<QueryParameters>,
}

impl SnapshotList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the frame whose live store feeds [`take_snapshot`] and whose
    /// schema drives [`prepare`] and [`dump`].
    ///
    /// [`take_snapshot`]: SnapshotList::take_snapshot
    /// [`prepare`]: SnapshotList::prepare
    /// [`dump`]: SnapshotList::dump
    pub fn set_frame(&mut self, frame: Rc<RefCell<Frame>>) {
        self.frame = Some(frame);
    }

    /// Set the ring capacity. The first successful call wins; later
    /// calls are silently ignored.
    pub fn set_max_size(&mut self, max_size: usize) -> Result<()> {
        if max_size == 0 {
            return Err(Error::InvalidSnapshotSize);
        }
        if self.max_size == 0 {
            self.max_size = max_size;
        }
        Ok(())
    }

    /// Number of stored snapshots.
    pub fn size(&self) -> usize {
        self.cur_snapshot_num.min(self.max_size)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Stored ticks in ascending order.
    pub fn ticks(&self) -> Vec<Tick> {
        self.tick_to_index.keys().copied().collect()
    }

    /// Freeze the bound frame's live store under `tick`.
    pub fn take_snapshot(&mut self, tick: Tick) -> Result<()> {
        let frame = self.frame.clone().ok_or(Error::SnapshotInvalidFrameState)?;
        let mut frame = frame.borrow_mut();
        self.take_snapshot_from(tick, frame.attr_store_mut())
    }

    /// Freeze an explicit store under `tick`.
    ///
    /// Overwrite is legal only for the most recent tick: its record is
    /// retracted (either rolling `end_index` back or merging the region
    /// into the hole) and the new copy goes through the normal placement
    /// decision. Any other existing tick fails
    /// [`Error::InvalidSnapshotTick`].
    pub fn take_snapshot_from(&mut self, tick: Tick, store: &mut AttributeStore) -> Result<()> {
        self.ensure_max_size()?;
        self.prepare_memory(store);

        let snapshot_size = store.size();

        // True once an existing record of this tick has been retracted;
        // the eviction step is skipped in that case.
        let mut skip_oldest_erase = false;

        let existing = self.tick_to_index.get(&tick).copied();
        if let Some(exist_index) = existing {
            if self.last_tick != Some(tick) {
                return Err(Error::InvalidSnapshotTick);
            }

            let exist_length = self.tick_to_size[&tick];
            self.tick_to_index.remove(&tick);
            self.tick_to_size.remove(&tick);
            self.tick_to_mapping.remove(&tick);

            if exist_index + exist_length == self.end_index {
                self.end_index = exist_index;
            } else {
                // The tail snapshot sat right before the hole; grow the
                // hole leftwards to swallow it.
                self.first_empty_slot_index = exist_index;
                self.empty_slots_length += exist_length;
            }

            self.cur_snapshot_num -= 1;
            skip_oldest_erase = true;
            trace!(tick, "retracted tail snapshot for overwrite");
        }

        self.cur_snapshot_num += 1;

        if self.cur_snapshot_num > self.max_size {
            if !skip_oldest_erase {
                self.evict_oldest();
            }
            if self.empty_slots_length >= snapshot_size {
                self.write_to_empty_slots(store, tick);
            } else {
                self.append_to_end(store, tick);
            }
        } else {
            self.append_to_end(store, tick);
        }

        self.last_tick = Some(tick);
        Ok(())
    }

    /// Cell at `(tick, key)`; [`Attribute::EMPTY`] when the tick or the
    /// key is not recorded.
    pub fn get(
        &self,
        tick: Tick,
        node_id: NodeId,
        node_index: NodeIndex,
        attr_id: AttrId,
        slot_index: SlotIndex,
    ) -> Attribute {
        let Some(&start) = self.tick_to_index.get(&tick) else {
            return Attribute::EMPTY;
        };
        let mapping = &self.mappings[self.tick_to_mapping[&tick]];
        let key = AttrKey::new(node_id, node_index, attr_id, slot_index);
        match mapping.get(&key) {
            Some(&offset) => self.attr_store[start + offset],
            None => Attribute::EMPTY,
        }
    }

    /// Validate and capture query parameters; returns the result tensor
    /// shape so the caller can size its buffer before [`query`].
    ///
    /// `ticks` defaults to every stored tick and `node_indices` to every
    /// instance of the node.
    ///
    /// [`query`]: SnapshotList::query
    pub fn prepare(
        &mut self,
        node_id: NodeId,
        ticks: Option<&[Tick]>,
        node_indices: Option<&[NodeIndex]>,
        attributes: &[AttrId],
    ) -> Result<ResultShape> {
        if attributes.is_empty() {
            return Err(Error::SnapshotQueryNoAttributes);
        }
        self.ensure_max_size()?;
        let frame = self.frame.clone().ok_or(Error::SnapshotInvalidFrameState)?;
        let frame = frame.borrow();
        frame.ensure_node_id(node_id)?;

        let mut max_slot_number = 0;
        for &attr_id in attributes {
            max_slot_number = max_slot_number.max(frame.attr(attr_id)?.max_slots as usize);
        }

        let node_indices: Vec<NodeIndex> = match node_indices {
            Some(indices) => indices.to_vec(),
            None => (0..frame.node(node_id)?.number).collect(),
        };
        let ticks: Vec<Tick> = match ticks {
            Some(ticks) => ticks.to_vec(),
            None => self.ticks(),
        };

        let shape = ResultShape {
            tick_number: ticks.len(),
            max_node_number: node_indices.len(),
            attr_number: attributes.len(),
            max_slot_number,
        };

        self.prepared = Some(QueryParameters {
            node_id,
            ticks,
            node_indices,
            attributes: attributes.to_vec(),
        });

        Ok(shape)
    }

    /// Extract the prepared tensor into `result`, tick axis slowest and
    /// slot axis fastest.
    ///
    /// Empty cells leave their destination element untouched, so callers
    /// pre-fill the buffer with whatever "missing" value they need. A
    /// successful extraction consumes the prepared state.
    pub fn query(&mut self, result: &mut [f64], shape: ResultShape) -> Result<()> {
        let Some(params) = self.prepared.take() else {
            return Err(Error::SnapshotQueryNotPrepared);
        };

        // A zero dimension means nothing to extract; the handshake stays
        // armed, as does a buffer that cannot hold the shape.
        if shape.is_empty() {
            self.prepared = Some(params);
            return Ok(());
        }
        if result.len() < shape.len() {
            self.prepared = Some(params);
            return Err(Error::SnapshotQueryResultTooSmall);
        }

        let mut result_index = 0;
        for &tick in &params.ticks {
            for &node_index in &params.node_indices {
                for &attr_id in &params.attributes {
                    for slot_index in 0..shape.max_slot_number {
                        let attr = self.get(
                            tick,
                            params.node_id,
                            node_index,
                            attr_id,
                            slot_index as SlotIndex,
                        );
                        if !attr.is_nan() {
                            result[result_index] = attr.value();
                        }
                        result_index += 1;
                    }
                }
            }
        }

        Ok(())
    }

    /// Dump every stored tick to CSV, one `snapshots_<node>.csv` per
    /// node type under `dir`.
    ///
    /// Single-slot attributes print the value or `nan`; slotted
    /// attributes print a quoted `"[v0,v1,...,]"` list. The trailing
    /// comma inside the brackets is kept for compatibility with existing
    /// consumers.
    pub fn dump(&self, dir: &Path) -> Result<()> {
        let frame = self.frame.clone().ok_or(Error::SnapshotInvalidFrameState)?;
        let frame = frame.borrow();

        for node in frame.nodes() {
            let path = dir.join(format!("snapshots_{}.csv", node.name));
            let mut file = BufWriter::new(File::create(&path)?);

            write!(file, "tick,node_index")?;
            for &attr_id in frame.node_attrs(node.id) {
                write!(file, ",{}", frame.attr(attr_id)?.name)?;
            }
            writeln!(file)?;

            for &tick in self.tick_to_index.keys() {
                for node_index in 0..node.number {
                    write!(file, "{},{}", tick, node_index)?;
                    for &attr_id in frame.node_attrs(node.id) {
                        let max_slots = frame.attr(attr_id)?.max_slots;
                        if max_slots == 1 {
                            write!(file, ",")?;
                            self.write_cell(&mut file, tick, node.id, node_index, attr_id, 0)?;
                        } else {
                            write!(file, ",\"[")?;
                            for slot_index in 0..max_slots {
                                self.write_cell(
                                    &mut file, tick, node.id, node_index, attr_id, slot_index,
                                )?;
                                write!(file, ",")?;
                            }
                            write!(file, "]\"")?;
                        }
                    }
                    writeln!(file)?;
                }
            }

            file.flush()?;
            debug!(path = %path.display(), node = %node.name, "snapshot csv written");
        }

        Ok(())
    }

    /// Clear all history. The backing vector is re-filled with empty
    /// cells rather than merely unmapped, so stale reads keep their NaN
    /// semantics; capacity is kept.
    pub fn reset(&mut self) {
        self.tick_to_index.clear();
        self.tick_to_size.clear();
        self.tick_to_mapping.clear();
        self.mappings.clear();
        self.attr_store.fill(Attribute::EMPTY);
        self.first_empty_slot_index = 0;
        self.empty_slots_length = 0;
        self.end_index = 0;
        self.cur_snapshot_num = 0;
        self.last_tick = None;
        self.prepared = None;
    }

    fn ensure_max_size(&self) -> Result<()> {
        if self.max_size == 0 {
            Err(Error::InvalidSnapshotSize)
        } else {
            Ok(())
        }
    }

    /// Size the backing vector eagerly on first use so steady-state
    /// snapshots avoid reallocation.
    fn prepare_memory(&mut self, store: &AttributeStore) {
        if self.attr_store.is_empty() {
            self.attr_store
                .resize(store.capacity() * self.max_size, Attribute::EMPTY);
        }
    }

    /// Drop the smallest tick and merge its region into the hole. The
    /// evicted region is always adjacent to the existing hole, if any.
    fn evict_oldest(&mut self) {
        let Some((&oldest_tick, &oldest_index)) = self.tick_to_index.iter().next() else {
            return;
        };
        let oldest_size = self.tick_to_size[&oldest_tick];

        self.tick_to_index.remove(&oldest_tick);
        self.tick_to_size.remove(&oldest_tick);
        self.tick_to_mapping.remove(&oldest_tick);

        if self.empty_slots_length == 0 {
            self.first_empty_slot_index = oldest_index;
            self.empty_slots_length = oldest_size;
        } else {
            self.empty_slots_length += oldest_size;
        }
        debug!(tick = oldest_tick, "evicted oldest snapshot");
    }

    /// Copy the store into the backing vector at `start`, sharing the
    /// latest mapping when the store shape has not changed since it was
    /// recorded.
    fn copy_from_store(&mut self, store: &mut AttributeStore, tick: Tick, start: usize) {
        let last_mapping = self.tick_to_mapping.iter().next_back().map(|(_, &m)| m);
        match last_mapping {
            Some(mapping_id)
                if !store.is_dirty() && self.mappings[mapping_id].len() == store.size() =>
            {
                store.copy_to(&mut self.attr_store[start..], None);
                self.tick_to_mapping.insert(tick, mapping_id);
                trace!(tick, mapping_id, "snapshot reuses previous mapping");
            }
            _ => {
                let mut mapping = HashMap::new();
                store.copy_to(&mut self.attr_store[start..], Some(&mut mapping));
                self.mappings.push(mapping);
                self.tick_to_mapping.insert(tick, self.mappings.len() - 1);
            }
        }
    }

    fn append_to_end(&mut self, store: &mut AttributeStore, tick: Tick) {
        let snapshot_size = store.size();
        if self.end_index + snapshot_size > self.attr_store.len() {
            self.attr_store
                .resize((self.end_index + snapshot_size) * 2, Attribute::EMPTY);
        }

        let start = self.end_index;
        self.copy_from_store(store, tick, start);
        self.tick_to_size.insert(tick, snapshot_size);
        self.tick_to_index.insert(tick, start);
        self.end_index += snapshot_size;
        debug!(tick, start, size = snapshot_size, "snapshot appended");
    }

    fn write_to_empty_slots(&mut self, store: &mut AttributeStore, tick: Tick) {
        let snapshot_size = store.size();
        let start = self.first_empty_slot_index;

        self.copy_from_store(store, tick, start);
        self.tick_to_index.insert(tick, start);
        self.tick_to_size.insert(tick, snapshot_size);
        self.first_empty_slot_index += snapshot_size;
        self.empty_slots_length -= snapshot_size;
        debug!(tick, start, size = snapshot_size, "snapshot wrote into hole");
    }

    fn write_cell<W: Write>(
        &self,
        file: &mut W,
        tick: Tick,
        node_id: NodeId,
        node_index: NodeIndex,
        attr_id: AttrId,
        slot_index: SlotIndex,
    ) -> Result<()> {
        let attr = self.get(tick, node_id, node_index, attr_id, slot_index);
        if attr.is_nan() {
            write!(file, "nan")?;
        } else {
            write!(file, "{}", attr.value())?;
        }
        Ok(())
    }
}
