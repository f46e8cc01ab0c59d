use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::tree::{Column, Output, Root, Window, Workspace};
use crate::utils::Signal;

static NODE_IDS: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a tree node.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn unique() -> Self {
        Self(NODE_IDS.fetch_add(1, Ordering::SeqCst))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// The queue of nodes whose pending state changed since the last commit.
///
/// Shared between the [`Root`] (which hands it to every entity it creates) and the transaction
/// manager (which drains it). Holds strong references: a node marked dirty stays alive at least
/// until the next commit picks it up.
pub type DirtyNodes = Rc<RefCell<Vec<TreeNode>>>;

/// A typed strong handle to any tree entity.
#[derive(Clone, Debug)]
pub enum TreeNode {
    Root(Rc<Root>),
    Output(Rc<Output>),
    Workspace(Rc<Workspace>),
    Column(Rc<Column>),
    Window(Rc<Window>),
}

impl TreeNode {
    pub fn node(&self) -> &Node {
        match self {
            TreeNode::Root(root) => &root.node,
            TreeNode::Output(output) => &output.node,
            TreeNode::Workspace(workspace) => &workspace.node,
            TreeNode::Column(column) => &column.node,
            TreeNode::Window(window) => &window.node,
        }
    }

    pub fn id(&self) -> NodeId {
        self.node().id()
    }

    /// Whether this node carries a client view.
    pub fn is_view(&self) -> bool {
        matches!(self, TreeNode::Window(_))
    }

    pub fn as_window(&self) -> Option<&Rc<Window>> {
        match self {
            TreeNode::Window(window) => Some(window),
            _ => None,
        }
    }
}

/// A typed weak handle to any tree entity.
#[derive(Clone, Debug)]
pub enum TreeNodeWeak {
    Root(Weak<Root>),
    Output(Weak<Output>),
    Workspace(Weak<Workspace>),
    Column(Weak<Column>),
    Window(Weak<Window>),
}

impl TreeNodeWeak {
    pub fn upgrade(&self) -> Option<TreeNode> {
        match self {
            TreeNodeWeak::Root(root) => root.upgrade().map(TreeNode::Root),
            TreeNodeWeak::Output(output) => output.upgrade().map(TreeNode::Output),
            TreeNodeWeak::Workspace(workspace) => workspace.upgrade().map(TreeNode::Workspace),
            TreeNodeWeak::Column(column) => column.upgrade().map(TreeNode::Column),
            TreeNodeWeak::Window(window) => window.upgrade().map(TreeNode::Window),
        }
    }
}

/// Identity and transaction bookkeeping embedded in every tree entity.
pub struct Node {
    id: NodeId,
    dirty: Cell<bool>,
    destroying: Cell<bool>,
    ntxnrefs: Cell<u32>,
    this: RefCell<Option<TreeNodeWeak>>,
    dirty_nodes: DirtyNodes,
    pub events: NodeEvents,
}

impl std::fmt::Debug for Node {
    // The dirty queue holds strong handles back into the tree; a derived Debug would chase
    // them forever.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("dirty", &self.dirty.get())
            .field("destroying", &self.destroying.get())
            .field("ntxnrefs", &self.ntxnrefs.get())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct NodeEvents {
    /// Emitted exactly once, when destruction of the entity begins. The entity stays allocated
    /// until every transaction referencing it has been destroyed.
    pub destroy: Signal<TreeNode>,
}

impl Node {
    pub fn new(dirty_nodes: DirtyNodes) -> Self {
        Self {
            id: NodeId::unique(),
            dirty: Cell::new(false),
            destroying: Cell::new(false),
            ntxnrefs: Cell::new(0),
            this: RefCell::new(None),
            dirty_nodes,
            events: NodeEvents {
                destroy: Signal::new(),
            },
        }
    }

    /// Install the back-handle to the owning entity. Must run before the first `set_dirty`.
    pub(crate) fn set_this(&self, this: TreeNodeWeak) {
        *self.this.borrow_mut() = Some(this);
    }

    pub fn this(&self) -> Option<TreeNode> {
        self.this.borrow().as_ref().and_then(TreeNodeWeak::upgrade)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Queue this node for the next transaction commit.
    pub fn set_dirty(&self) {
        if self.dirty.get() {
            return;
        }
        self.dirty.set(true);
        let this = self
            .this()
            .expect("node marked dirty before its entity handle was installed");
        self.dirty_nodes.borrow_mut().push(this);
    }

    pub(crate) fn clear_dirty(&self) {
        self.dirty.set(false);
    }

    pub fn is_destroying(&self) -> bool {
        self.destroying.get()
    }

    /// Mark this node as being destroyed and emit the destroy signal.
    ///
    /// The entity is freed later, by the transaction engine, once `ntxnrefs` drops to zero.
    pub(crate) fn begin_destroy(&self) {
        assert!(
            !self.destroying.get(),
            "node destruction must only begin once"
        );
        if let Some(this) = self.this() {
            self.events.destroy.emit(&this);
        }
        self.destroying.set(true);
        self.set_dirty();
    }

    pub fn ntxnrefs(&self) -> u32 {
        self.ntxnrefs.get()
    }

    pub(crate) fn txn_ref(&self) {
        self.ntxnrefs.set(self.ntxnrefs.get() + 1);
    }

    pub(crate) fn txn_unref(&self) -> u32 {
        let refs = self.ntxnrefs.get();
        debug_assert!(refs > 0, "transaction reference count underflow");
        self.ntxnrefs.set(refs - 1);
        refs - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let dirty: DirtyNodes = Rc::new(RefCell::new(Vec::new()));
        let a = Node::new(Rc::clone(&dirty));
        let b = Node::new(Rc::clone(&dirty));
        assert_ne!(a.id(), b.id());
    }
}
