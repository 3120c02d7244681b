//! Schema registry: node types, attribute definitions, and the live
//! attribute store they address.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use orrery_foundation::{AttrId, AttrKey, NodeId, NodeIndex, SlotIndex};

use crate::error::{Error, Result};
use crate::storage::AttributeStore;

/// A registered node type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: NodeId,
    pub name: String,
    /// Number of instances materialized for this type.
    pub number: NodeIndex,
}

/// A registered attribute definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttrDef {
    pub id: AttrId,
    pub node_id: NodeId,
    pub name: String,
    /// 1 for plain scalars, larger for slotted attributes.
    pub max_slots: SlotIndex,
}

/// Node and attribute schema plus the live cell pool.
///
/// Registration happens up front with [`add_node`] / [`add_attr`], then
/// [`setup`] materializes one cell per `(node, instance, attribute,
/// slot)`. Populations may still change afterwards through
/// [`append_nodes`] and [`remove_node_instance`]; the schema itself is
/// fixed once snapshots reference it.
///
/// [`add_node`]: Frame::add_node
/// [`add_attr`]: Frame::add_attr
/// [`setup`]: Frame::setup
/// [`append_nodes`]: Frame::append_nodes
/// [`remove_node_instance`]: Frame::remove_node_instance
#[derive(Debug, Default)]
pub struct Frame {
    nodes: Vec<NodeDef>,
    attributes: Vec<AttrDef>,
    /// Node id -> attribute ids, in registration order.
    node_attrs: IndexMap<NodeId, Vec<AttrId>>,
    attr_store: AttributeStore,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type with `number` initial instances.
    pub fn add_node(&mut self, name: impl Into<String>, number: NodeIndex) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(NodeDef {
            id,
            name: name.into(),
            number,
        });
        self.node_attrs.insert(id, Vec::new());
        id
    }

    /// Register an attribute under a node type.
    pub fn add_attr(
        &mut self,
        node_id: NodeId,
        name: impl Into<String>,
        max_slots: SlotIndex,
    ) -> Result<AttrId> {
        self.ensure_node_id(node_id)?;

        let id = self.attributes.len() as AttrId;
        self.attributes.push(AttrDef {
            id,
            node_id,
            name: name.into(),
            max_slots,
        });
        self.node_attrs.entry(node_id).or_default().push(id);
        Ok(id)
    }

    /// Materialize cells for every registered `(node, attribute)` pair.
    pub fn setup(&mut self, initial_cells: usize) {
        self.attr_store.setup(initial_cells);
        for node in &self.nodes {
            for &attr_id in self.node_attrs.get(&node.id).into_iter().flatten() {
                let attr = &self.attributes[attr_id as usize];
                self.attr_store
                    .add_nodes(node.id, 0, node.number, attr.id, attr.max_slots);
            }
        }
        debug!(
            nodes = self.nodes.len(),
            attrs = self.attributes.len(),
            cells = self.attr_store.size(),
            "frame set up"
        );
    }

    /// Extend a node type's population by `count` instances, mapping
    /// cells for every attribute of the type.
    pub fn append_nodes(&mut self, node_id: NodeId, count: NodeIndex) -> Result<()> {
        self.ensure_node_id(node_id)?;

        let start = self.nodes[node_id as usize].number;
        let stop = start + count;
        let attr_ids = self.node_attrs.get(&node_id).cloned().unwrap_or_default();
        for attr_id in attr_ids {
            let max_slots = self.attributes[attr_id as usize].max_slots;
            self.attr_store.add_nodes(node_id, start, stop, attr_id, max_slots);
        }
        self.nodes[node_id as usize].number = stop;
        Ok(())
    }

    /// Free one instance's cells across all attributes of its type.
    ///
    /// The instance index is not renumbered: later reads of the freed
    /// cells fail until the index is repopulated.
    pub fn remove_node_instance(&mut self, node_id: NodeId, node_index: NodeIndex) -> Result<()> {
        self.ensure_node_id(node_id)?;

        let attr_ids = self.node_attrs.get(&node_id).cloned().unwrap_or_default();
        for attr_id in attr_ids {
            let max_slots = self.attributes[attr_id as usize].max_slots;
            self.attr_store.remove_node(node_id, node_index, attr_id, max_slots);
        }
        Ok(())
    }

    pub fn ensure_node_id(&self, node_id: NodeId) -> Result<()> {
        self.node(node_id).map(|_| ())
    }

    pub fn ensure_attr_id(&self, attr_id: AttrId) -> Result<()> {
        self.attr(attr_id).map(|_| ())
    }

    pub fn node(&self, node_id: NodeId) -> Result<&NodeDef> {
        self.nodes
            .get(node_id as usize)
            .ok_or(Error::InvalidNodeId(node_id))
    }

    pub fn attr(&self, attr_id: AttrId) -> Result<&AttrDef> {
        self.attributes
            .get(attr_id as usize)
            .ok_or(Error::InvalidAttrId(attr_id))
    }

    /// Attribute ids registered under a node, in registration order.
    pub fn node_attrs(&self, node_id: NodeId) -> &[AttrId] {
        self.node_attrs
            .get(&node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All registered node types.
    pub fn nodes(&self) -> &[NodeDef] {
        &self.nodes
    }

    pub fn attr_store(&self) -> &AttributeStore {
        &self.attr_store
    }

    pub fn attr_store_mut(&mut self) -> &mut AttributeStore {
        &mut self.attr_store
    }

    /// Read one scalar through the live store.
    pub fn value(
        &self,
        node_id: NodeId,
        node_index: NodeIndex,
        attr_id: AttrId,
        slot_index: SlotIndex,
    ) -> Result<f64> {
        Ok(self
            .attr_store
            .get(AttrKey::new(node_id, node_index, attr_id, slot_index))?
            .value())
    }

    /// Write one scalar through the live store.
    pub fn set_value(
        &mut self,
        node_id: NodeId,
        node_index: NodeIndex,
        attr_id: AttrId,
        slot_index: SlotIndex,
        value: f64,
    ) -> Result<()> {
        self.attr_store
            .get_mut(AttrKey::new(node_id, node_index, attr_id, slot_index))?
            .set(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city_frame() -> (Frame, NodeId, AttrId, AttrId) {
        let mut frame = Frame::new();
        let city = frame.add_node("city", 3);
        let population = frame.add_attr(city, "population", 1).unwrap();
        let traffic = frame.add_attr(city, "traffic", 2).unwrap();
        frame.setup(64);
        (frame, city, population, traffic)
    }

    #[test]
    fn test_registration_and_setup() {
        let (frame, city, population, traffic) = city_frame();

        assert_eq!(frame.node(city).unwrap().name, "city");
        assert_eq!(frame.node(city).unwrap().number, 3);
        assert_eq!(frame.node_attrs(city), &[population, traffic]);
        assert_eq!(frame.attr(traffic).unwrap().max_slots, 2);
        // 3 instances x (1 + 2) slots.
        assert_eq!(frame.attr_store().size(), 9);
    }

    #[test]
    fn test_unknown_ids_are_rejected() {
        let (frame, ..) = city_frame();

        assert!(matches!(frame.ensure_node_id(9), Err(Error::InvalidNodeId(9))));
        assert!(matches!(frame.ensure_attr_id(9), Err(Error::InvalidAttrId(9))));

        let mut frame = Frame::new();
        assert!(frame.add_attr(0, "orphan", 1).is_err());
    }

    #[test]
    fn test_value_round_trip() {
        let (mut frame, city, population, _) = city_frame();

        frame.set_value(city, 1, population, 0, 1250.0).unwrap();
        assert_eq!(frame.value(city, 1, population, 0).unwrap(), 1250.0);
        assert!(frame.value(city, 1, population, 1).is_err());
    }

    #[test]
    fn test_append_nodes_extends_population() {
        let (mut frame, city, population, _) = city_frame();

        frame.append_nodes(city, 2).unwrap();
        assert_eq!(frame.node(city).unwrap().number, 5);
        assert_eq!(frame.attr_store().size(), 15);

        frame.set_value(city, 4, population, 0, 7.0).unwrap();
        assert_eq!(frame.value(city, 4, population, 0).unwrap(), 7.0);
    }

    #[test]
    fn test_remove_node_instance_frees_cells() {
        let (mut frame, city, population, traffic) = city_frame();

        frame.remove_node_instance(city, 1).unwrap();
        assert_eq!(frame.attr_store().size(), 6);
        assert!(frame.value(city, 1, population, 0).is_err());
        assert!(frame.value(city, 1, traffic, 0).is_err());
        assert!(frame.value(city, 0, population, 0).is_ok());
    }
}
