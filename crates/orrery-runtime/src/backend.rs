//! Top-level wiring of a frame and its snapshot ring.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

use orrery_foundation::Tick;

use crate::config::BackendConfig;
use crate::error::Result;
use crate::frame::Frame;
use crate::snapshot::SnapshotList;

/// A frame plus the ring that records it, owned together.
///
/// Simulations register their schema on the frame, mutate attribute
/// values through it every tick, and call [`take_snapshot`] at tick
/// boundaries. History is read back through [`snapshots`].
///
/// [`take_snapshot`]: Backend::take_snapshot
/// [`snapshots`]: Backend::snapshots
pub struct Backend {
    config: BackendConfig,
    frame: Rc<RefCell<Frame>>,
    snapshots: SnapshotList,
}

impl Backend {
    /// Build an empty backend. The frame still needs its schema
    /// registered and [`setup`] called before the first snapshot.
    ///
    /// [`setup`]: Backend::setup
    pub fn new(config: BackendConfig) -> Result<Self> {
        config.validate()?;

        let frame = Rc::new(RefCell::new(Frame::new()));
        let mut snapshots = SnapshotList::new();
        snapshots.set_frame(Rc::clone(&frame));
        snapshots.set_max_size(config.max_snapshots)?;

        info!(
            initial_cells = config.initial_cells,
            max_snapshots = config.max_snapshots,
            "backend created"
        );
        Ok(Self {
            config,
            frame,
            snapshots,
        })
    }

    /// Shared handle to the frame.
    pub fn frame(&self) -> Rc<RefCell<Frame>> {
        Rc::clone(&self.frame)
    }

    /// Materialize the registered schema into the live store.
    pub fn setup(&self) {
        self.frame.borrow_mut().setup(self.config.initial_cells);
    }

    /// Freeze the live store under `tick`.
    pub fn take_snapshot(&mut self, tick: Tick) -> Result<()> {
        self.snapshots.take_snapshot(tick)
    }

    pub fn snapshots(&self) -> &SnapshotList {
        &self.snapshots
    }

    pub fn snapshots_mut(&mut self) -> &mut SnapshotList {
        &mut self.snapshots
    }

    /// Clear both the live store and the recorded history. Capacity is
    /// kept on both sides.
    pub fn reset(&mut self) {
        self.frame.borrow_mut().attr_store_mut().reset();
        self.snapshots.reset();
    }
}
