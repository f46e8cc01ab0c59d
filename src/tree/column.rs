use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::tree::node::{Node, TreeNode, TreeNodeWeak};
use crate::tree::output::Output;
use crate::tree::root::Root;
use crate::tree::window::Window;
use crate::tree::workspace::Workspace;
use crate::utils::Rect;

/// How a column lays out its children.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColumnLayout {
    /// Stack children along the column's length; all of them are shown.
    #[default]
    Split,
    /// Show a titlebar for every child but only render the active child's content.
    Stacked,
}

/// Mutation-visible state of a [`Column`].
#[derive(Clone, Debug, Default)]
pub struct ColumnState {
    pub rect: Rect,
    pub layout: ColumnLayout,
    pub workspace: Option<Weak<Workspace>>,
    pub output: Option<Weak<Output>>,
    pub children: Vec<Rc<Window>>,
    /// Child used for focus restoration and as the rendered tab of a stacked column.
    pub active_child: Option<Rc<Window>>,
    pub focused: bool,
}

impl ColumnState {
    pub fn workspace(&self) -> Option<Rc<Workspace>> {
        self.workspace.as_ref().and_then(Weak::upgrade)
    }

    pub fn output(&self) -> Option<Rc<Output>> {
        self.output.as_ref().and_then(Weak::upgrade)
    }
}

/// A vertical container holding one or more windows.
#[derive(Debug)]
pub struct Column {
    pub node: Node,
    root: Weak<Root>,
    pub pending: RefCell<ColumnState>,
    pub current: RefCell<ColumnState>,
    /// Fraction of the workspace width this column occupies. Zero until the arrangement
    /// normalizer hands out a slice.
    pub width_fraction: Cell<f64>,
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.node.id() == other.node.id()
    }
}

impl Column {
    pub fn new(root: &Rc<Root>) -> Rc<Self> {
        let column = Rc::new(Self {
            node: Node::new(root.dirty_nodes()),
            root: Rc::downgrade(root),
            pending: RefCell::new(ColumnState::default()),
            current: RefCell::new(ColumnState::default()),
            width_fraction: Cell::new(0.0),
        });
        column
            .node
            .set_this(TreeNodeWeak::Column(Rc::downgrade(&column)));
        root.events
            .new_node
            .emit(&TreeNode::Column(Rc::clone(&column)));
        column
    }

    pub fn root(&self) -> Rc<Root> {
        self.root.upgrade().expect("column outlived the root")
    }

    pub fn workspace(&self) -> Option<Rc<Workspace>> {
        self.pending.borrow().workspace()
    }

    pub fn output(&self) -> Option<Rc<Output>> {
        self.pending.borrow().output()
    }

    pub fn get_box(&self) -> Rect {
        self.pending.borrow().rect
    }

    // {{{ Lifetime

    pub fn begin_destroy(self: &Rc<Self>) {
        self.node.begin_destroy();
        if self.workspace().is_some() {
            self.detach();
        }
    }

    /// Free the column. Only the transaction engine calls this.
    pub(crate) fn destroy(&self) {
        assert!(
            self.node.is_destroying(),
            "tried to free column which wasn't marked as destroying"
        );
        assert!(
            self.node.ntxnrefs() == 0,
            "tried to free column which is still referenced by transactions"
        );
    }

    /// Destroy this column if it has no children left, then give its workspace the same
    /// chance.
    pub fn consider_destroy(self: &Rc<Self>) {
        let workspace = self.workspace();
        if !self.pending.borrow().children.is_empty() {
            return;
        }
        if let Some(workspace) = &workspace {
            workspace.remove_tiling(self);
        }
        self.node.begin_destroy();
        if let Some(workspace) = workspace {
            workspace.consider_destroy();
        }
    }

    pub fn detach(self: &Rc<Self>) {
        let workspace = self.workspace();
        if let Some(workspace) = &workspace {
            workspace.remove_tiling(self);
            workspace.node.set_dirty();
        }
        self.node.set_dirty();
    }

    // }}}

    // {{{ Children

    pub fn find_child(
        &self,
        predicate: impl Fn(&Rc<Window>) -> bool,
    ) -> Option<Rc<Window>> {
        self.pending
            .borrow()
            .children
            .iter()
            .find(|child| predicate(child))
            .cloned()
    }

    pub fn insert_child(self: &Rc<Self>, child: &Rc<Window>, index: usize) {
        debug_assert!(
            child.workspace().is_none() && child.column().is_none(),
            "windows must be detached before they can be added to a column"
        );
        {
            let mut pending = self.pending.borrow_mut();
            let index = index.min(pending.children.len());
            pending.children.insert(index, Rc::clone(child));
            if pending.active_child.is_none() {
                pending.active_child = Some(Rc::clone(child));
            }
        }
        child.reconcile_tiling(self);
        child.handle_fullscreen_reparent();
        self.node.set_dirty();
        child.node.set_dirty();
    }

    pub fn add_child(self: &Rc<Self>, child: &Rc<Window>) {
        let index = self.pending.borrow().children.len();
        self.insert_child(child, index);
    }

    /// Insert `window` next to `fixed` in the same column.
    pub fn add_sibling(fixed: &Rc<Window>, window: &Rc<Window>, after: bool) {
        debug_assert!(
            window.workspace().is_none() && window.column().is_none(),
            "windows must be detached before they can be added to a column"
        );
        let column = fixed.column().expect("expected a tiled window");
        let index = {
            let pending = column.pending.borrow();
            pending
                .children
                .iter()
                .position(|child| child == fixed)
                .expect("window missing from its column")
        };
        column.insert_child(window, index + usize::from(after));
    }

    pub fn remove_child(self: &Rc<Self>, child: &Rc<Window>) {
        let next_active = {
            let mut pending = self.pending.borrow_mut();
            let index = pending
                .children
                .iter()
                .position(|other| other == child)
                .expect("window missing from its column");
            pending.children.remove(index);

            let mut next_active = None;
            if pending
                .active_child
                .as_ref()
                .is_some_and(|active| active == child)
            {
                // The child that slid into the removed slot, or the new last one.
                let replacement = index.min(pending.children.len().saturating_sub(1));
                next_active = pending.children.get(replacement).cloned();
                pending.active_child.clone_from(&next_active);
            }
            next_active
        };

        if let Some(next_active) = next_active {
            next_active.reconcile_tiling(self);
            next_active.node.set_dirty();
        }

        child.reconcile_detached();
        self.node.set_dirty();
        child.node.set_dirty();
    }

    pub fn for_each_child(&self, mut callback: impl FnMut(&Rc<Window>)) {
        let children = self.pending.borrow().children.clone();
        for child in &children {
            callback(child);
        }
    }

    pub fn has_urgent_child(&self) -> bool {
        self.find_child(|child| child.is_urgent()).is_some()
    }

    // }}}

    // {{{ Reconciliation

    /// Rewrite derived fields after this column moved between workspaces or outputs.
    pub fn reconcile(self: &Rc<Self>, workspace: &Rc<Workspace>, output: &Rc<Output>) {
        {
            let mut pending = self.pending.borrow_mut();
            pending.workspace = Some(Rc::downgrade(workspace));
            pending.output = Some(Rc::downgrade(output));
        }
        let focused = {
            let workspace_pending = workspace.pending.borrow();
            workspace_pending.focused
                && workspace_pending
                    .active_column
                    .as_ref()
                    .is_some_and(|active| active == self)
        };
        self.pending.borrow_mut().focused = focused;

        let children = self.pending.borrow().children.clone();
        for child in &children {
            child.reconcile_tiling(self);
        }
    }

    pub fn reconcile_detached(self: &Rc<Self>) {
        {
            let mut pending = self.pending.borrow_mut();
            pending.workspace = None;
            pending.output = None;
            pending.focused = false;
        }
        let children = self.pending.borrow().children.clone();
        for child in &children {
            child.reconcile_tiling(self);
        }
    }

    // }}}

    // {{{ Siblings

    pub fn get_siblings(&self) -> Vec<Rc<Column>> {
        self.workspace()
            .map(|workspace| workspace.pending.borrow().tiling.clone())
            .unwrap_or_default()
    }

    pub fn sibling_index(self: &Rc<Self>) -> Option<usize> {
        self.get_siblings()
            .iter()
            .position(|sibling| sibling == self)
    }

    pub fn get_previous_sibling(self: &Rc<Self>) -> Option<Rc<Column>> {
        let siblings = self.get_siblings();
        let index = siblings.iter().position(|sibling| sibling == self)?;
        index.checked_sub(1).map(|index| Rc::clone(&siblings[index]))
    }

    pub fn get_next_sibling(self: &Rc<Self>) -> Option<Rc<Column>> {
        let siblings = self.get_siblings();
        let index = siblings.iter().position(|sibling| sibling == self)?;
        siblings.get(index + 1).cloned()
    }

    // }}}

    pub fn set_resizing(&self, resizing: bool) {
        for child in self.pending.borrow().children.iter() {
            child.set_resizing(resizing);
        }
    }

    pub fn set_layout(self: &Rc<Self>, layout: ColumnLayout) {
        self.pending.borrow_mut().layout = layout;
        self.node.set_dirty();
    }
}

// vim: foldmethod=marker
