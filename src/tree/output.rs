use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::shell::{Layer, LayerSurface};
use crate::tree::node::{DirtyNodes, Node, TreeNodeWeak};
use crate::utils::Rect;

/// Mutation-visible state of an [`Output`].
#[derive(Clone, Debug, Default)]
pub struct OutputState {
    pub rect: Rect,
}

/// A physical (or headless) display with a pixel rectangle in layout coordinates.
#[derive(Debug)]
pub struct Output {
    pub node: Node,
    name: String,
    pub pending: RefCell<OutputState>,
    pub current: RefCell<OutputState>,
    /// Layer-shell surfaces anchored to this output, one list per layer, back to front within
    /// each list.
    layers: [RefCell<Vec<Rc<LayerSurface>>>; 4],
    /// Bumped whenever a region of this output needs repainting. The presenter consumes it.
    damage_counter: Cell<u64>,
}

impl PartialEq for Output {
    fn eq(&self, other: &Self) -> bool {
        self.node.id() == other.node.id()
    }
}

impl Output {
    pub fn new(dirty_nodes: DirtyNodes, name: impl Into<String>, rect: Rect) -> Rc<Self> {
        let output = Rc::new(Self {
            node: Node::new(dirty_nodes),
            name: name.into(),
            pending: RefCell::new(OutputState { rect }),
            current: RefCell::new(OutputState::default()),
            layers: Default::default(),
            damage_counter: Cell::new(0),
        });
        output
            .node
            .set_this(TreeNodeWeak::Output(Rc::downgrade(&output)));
        output.node.set_dirty();
        output
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this output is a laptop panel. Touch and tablet devices auto-map to the single
    /// built-in output when there is exactly one.
    pub fn is_builtin(&self) -> bool {
        ["eDP", "LVDS", "DSI"]
            .iter()
            .any(|prefix| self.name.starts_with(prefix))
    }

    pub fn rect(&self) -> Rect {
        self.pending.borrow().rect
    }

    pub fn current_rect(&self) -> Rect {
        self.current.borrow().rect
    }

    pub fn set_rect(&self, rect: Rect) {
        self.pending.borrow_mut().rect = rect;
        self.node.set_dirty();
    }

    pub fn contains(&self, lx: f64, ly: f64) -> bool {
        self.pending.borrow().rect.contains(lx, ly)
    }

    pub fn damage_whole(&self) {
        self.damage_counter.set(self.damage_counter.get() + 1);
    }

    pub fn damage_counter(&self) -> u64 {
        self.damage_counter.get()
    }

    pub fn add_layer_surface(&self, layer_surface: Rc<LayerSurface>) {
        let layer = layer_surface.layer();
        self.layers[layer_index(layer)]
            .borrow_mut()
            .push(layer_surface);
        self.damage_whole();
    }

    pub fn remove_layer_surface(&self, layer_surface: &LayerSurface) {
        for list in &self.layers {
            list.borrow_mut().retain(|other| &**other != layer_surface);
        }
        self.damage_whole();
    }

    /// Snapshot of the layer list, back to front.
    pub fn layers_on(&self, layer: Layer) -> Vec<Rc<LayerSurface>> {
        self.layers[layer_index(layer)].borrow().clone()
    }

    pub(crate) fn begin_destroy(&self) {
        self.node.begin_destroy();
    }

    /// Free the output. Only the transaction engine calls this, once nothing references the
    /// node anymore.
    pub(crate) fn destroy(&self) {
        assert!(
            self.node.is_destroying(),
            "tried to free output which wasn't marked as destroying"
        );
        assert!(
            self.node.ntxnrefs() == 0,
            "tried to free output which is still referenced by transactions"
        );
        for list in &self.layers {
            list.borrow_mut().clear();
        }
    }
}

fn layer_index(layer: Layer) -> usize {
    match layer {
        Layer::Background => 0,
        Layer::Bottom => 1,
        Layer::Top => 2,
        Layer::Overlay => 3,
    }
}
