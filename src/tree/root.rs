use std::cell::{Cell, RefCell};
use std::rc::Rc;

use hayward_config::Config;
use hayward_ipc::{WindowChange, WorkspaceChange};

use crate::shell::{Popup, Surface};
use crate::tree::node::{DirtyNodes, Node, TreeNode, TreeNodeWeak};
use crate::tree::output::Output;
use crate::tree::window::Window;
use crate::tree::workspace::Workspace;
use crate::utils::{Rect, Signal};

/// Mutation-visible state of the [`Root`]. The root needs no resize acknowledgments, so it only
/// carries pending and current copies.
#[derive(Clone, Debug, Default)]
pub struct RootState {
    /// Ordered, named workspaces.
    pub workspaces: Vec<Rc<Workspace>>,
    pub active_workspace: Option<Rc<Workspace>>,
}

/// An IPC event queued by a tree mutation, drained and broadcast after dispatch.
#[derive(Clone, Debug)]
pub enum IpcEvent {
    Window {
        change: WindowChange,
        window: Option<Rc<Window>>,
    },
    Workspace {
        change: WorkspaceChange,
        workspace: Option<Rc<Workspace>>,
        old: Option<Rc<Workspace>>,
    },
}

impl IpcEvent {
    pub fn window(change: WindowChange, window: &Rc<Window>) -> Self {
        IpcEvent::Window {
            change,
            window: Some(Rc::clone(window)),
        }
    }

    pub fn workspace(
        change: WorkspaceChange,
        workspace: Option<&Rc<Workspace>>,
        old: Option<&Rc<Workspace>>,
    ) -> Self {
        IpcEvent::Workspace {
            change,
            workspace: workspace.map(Rc::clone),
            old: old.map(Rc::clone),
        }
    }
}

#[derive(Debug)]
pub struct RootEvents {
    /// Emitted whenever any tree entity is created. Seats use this to track windows for their
    /// focus stacks.
    pub new_node: Signal<TreeNode>,
}

/// An override-redirect surface that positions itself (rendered above the workspaces).
#[derive(Debug)]
pub struct UnmanagedSurface {
    pub surface: Rc<Surface>,
    pub rect: Cell<Rect>,
}

/// The top of the tree: owns outputs (unordered, discovered via the backend) and workspaces
/// (ordered, named), plus the non-workspace scene layers used for hit testing.
#[derive(Debug)]
pub struct Root {
    pub node: Node,
    dirty_nodes: DirtyNodes,
    config: Rc<RefCell<Config>>,
    pub pending: RefCell<RootState>,
    pub current: RefCell<RootState>,
    outputs: RefCell<Vec<Rc<Output>>>,
    active_output: RefCell<Option<Rc<Output>>>,
    pub events: RootEvents,
    ipc_queue: RefCell<Vec<IpcEvent>>,
    /// Popups, bottom to top. Hit-tested before everything else.
    pub popups: RefCell<Vec<Rc<Popup>>>,
    /// Client-positioned top-levels, hit-tested between the overlay and the workspaces.
    pub unmanaged: RefCell<Vec<Rc<UnmanagedSurface>>>,
}

impl Root {
    pub fn new(config: Config) -> Rc<Self> {
        let dirty_nodes: DirtyNodes = Rc::new(RefCell::new(Vec::new()));
        let root = Rc::new(Self {
            node: Node::new(Rc::clone(&dirty_nodes)),
            dirty_nodes,
            config: Rc::new(RefCell::new(config)),
            pending: RefCell::new(RootState::default()),
            current: RefCell::new(RootState::default()),
            outputs: RefCell::new(Vec::new()),
            active_output: RefCell::new(None),
            events: RootEvents {
                new_node: Signal::new(),
            },
            ipc_queue: RefCell::new(Vec::new()),
            popups: RefCell::new(Vec::new()),
            unmanaged: RefCell::new(Vec::new()),
        });
        root.node.set_this(TreeNodeWeak::Root(Rc::downgrade(&root)));
        root
    }

    pub fn dirty_nodes(&self) -> DirtyNodes {
        Rc::clone(&self.dirty_nodes)
    }

    pub fn config(&self) -> Rc<RefCell<Config>> {
        Rc::clone(&self.config)
    }

    pub fn titlebar_height(&self) -> f64 {
        f64::from(self.config.borrow().decorations.titlebar_height)
    }

    pub fn queue_ipc_event(&self, event: IpcEvent) {
        self.ipc_queue.borrow_mut().push(event);
    }

    pub fn drain_ipc_events(&self) -> Vec<IpcEvent> {
        std::mem::take(&mut *self.ipc_queue.borrow_mut())
    }

    // {{{ Outputs

    pub fn outputs(&self) -> Vec<Rc<Output>> {
        self.outputs.borrow().clone()
    }

    pub fn output_by_name(&self, name: &str) -> Option<Rc<Output>> {
        self.outputs
            .borrow()
            .iter()
            .find(|output| output.name() == name)
            .cloned()
    }

    /// The output containing the layout point, if any.
    pub fn output_at(&self, lx: f64, ly: f64) -> Option<Rc<Output>> {
        self.outputs
            .borrow()
            .iter()
            .find(|output| output.contains(lx, ly))
            .cloned()
    }

    /// Register a hotplugged output, placing it to the right of the current layout.
    pub fn add_output(self: &Rc<Self>, name: impl Into<String>, width: f64, height: f64) -> Rc<Output> {
        let x = self
            .outputs
            .borrow()
            .iter()
            .map(|output| {
                let rect = output.rect();
                rect.x + rect.width
            })
            .fold(0.0, f64::max);
        let output = Output::new(self.dirty_nodes(), name, Rect::new(x, 0.0, width, height));
        self.outputs.borrow_mut().push(Rc::clone(&output));
        self.events
            .new_node
            .emit(&TreeNode::Output(Rc::clone(&output)));
        if self.active_output.borrow().is_none() {
            *self.active_output.borrow_mut() = Some(Rc::clone(&output));
        }
        self.node.set_dirty();
        output
    }

    /// Unregister an output, evacuating its columns and floaters to the remaining outputs.
    pub fn remove_output(self: &Rc<Self>, output: &Rc<Output>) {
        self.outputs
            .borrow_mut()
            .retain(|other| other.node.id() != output.node.id());

        if self
            .active_output
            .borrow()
            .as_ref()
            .is_some_and(|active| active == output)
        {
            let replacement = self.outputs.borrow().first().cloned();
            *self.active_output.borrow_mut() = replacement;
        }

        if let Some(fallback) = self.outputs.borrow().first().cloned() {
            let workspaces = self.pending.borrow().workspaces.clone();
            for workspace in &workspaces {
                let columns = workspace.pending.borrow().tiling.clone();
                for column in &columns {
                    if column
                        .output()
                        .is_some_and(|column_output| &column_output == output)
                    {
                        column.reconcile(workspace, &fallback);
                        column.node.set_dirty();
                    }
                }
                let floating = workspace.pending.borrow().floating.clone();
                for window in &floating {
                    if window
                        .output()
                        .is_some_and(|window_output| &window_output == output)
                    {
                        window.pending.borrow_mut().output = Some(Rc::downgrade(&fallback));
                        window.floating_resize_and_center();
                    }
                }
            }
        }

        output.begin_destroy();
        self.node.set_dirty();
    }

    pub fn active_output(&self) -> Option<Rc<Output>> {
        self.active_output.borrow().clone()
    }

    pub fn set_active_output(&self, output: &Rc<Output>) {
        *self.active_output.borrow_mut() = Some(Rc::clone(output));
    }

    /// Bounding box of the whole output layout.
    pub fn layout_box(&self) -> Rect {
        let outputs = self.outputs.borrow();
        let mut iter = outputs.iter();
        let Some(first) = iter.next() else {
            return Rect::default();
        };
        let mut rect = first.rect();
        for output in iter {
            let other = output.rect();
            let right = (rect.x + rect.width).max(other.x + other.width);
            let bottom = (rect.y + rect.height).max(other.y + other.height);
            rect.x = rect.x.min(other.x);
            rect.y = rect.y.min(other.y);
            rect.width = right - rect.x;
            rect.height = bottom - rect.y;
        }
        rect
    }

    // }}}

    // {{{ Workspaces

    pub fn workspaces(&self) -> Vec<Rc<Workspace>> {
        self.pending.borrow().workspaces.clone()
    }

    pub fn workspace_by_name(&self, name: &str) -> Option<Rc<Workspace>> {
        self.pending
            .borrow()
            .workspaces
            .iter()
            .find(|workspace| workspace.name() == name)
            .cloned()
    }

    pub(crate) fn attach_workspace(self: &Rc<Self>, workspace: &Rc<Workspace>) {
        self.pending
            .borrow_mut()
            .workspaces
            .push(Rc::clone(workspace));
        if self.pending.borrow().active_workspace.is_none() {
            self.set_active_workspace(Some(workspace));
        }
        self.node.set_dirty();
    }

    /// Remove a workspace from the ordered list. When it was the active workspace, activate its
    /// predecessor (or successor at the front of the list).
    pub(crate) fn detach_workspace(self: &Rc<Self>, workspace: &Rc<Workspace>) {
        let (index, was_active) = {
            let mut pending = self.pending.borrow_mut();
            let index = pending
                .workspaces
                .iter()
                .position(|other| other == workspace);
            if let Some(index) = index {
                pending.workspaces.remove(index);
            }
            let was_active = pending
                .active_workspace
                .as_ref()
                .is_some_and(|active| active == workspace);
            (index, was_active)
        };

        if was_active {
            let index = index.expect("workspace is active but not attached");
            let next_index = index.saturating_sub(1);
            let next_focus = self.pending.borrow().workspaces.get(next_index).cloned();
            self.set_active_workspace(next_focus.as_ref());
        }

        self.node.set_dirty();
    }

    pub fn get_active_workspace(&self) -> Option<Rc<Workspace>> {
        self.pending.borrow().active_workspace.clone()
    }

    pub fn set_active_workspace(self: &Rc<Self>, workspace: Option<&Rc<Workspace>>) {
        let previous = self.pending.borrow().active_workspace.clone();
        if previous.as_ref().map(|workspace| workspace.node.id())
            == workspace.map(|workspace| workspace.node.id())
        {
            return;
        }
        self.pending.borrow_mut().active_workspace = workspace.map(Rc::clone);
        if let Some(previous) = &previous {
            previous.node.set_dirty();
        }
        if let Some(workspace) = workspace {
            workspace.node.set_dirty();
            if let Some(output) = workspace.get_active_output() {
                self.set_active_output(&output);
            }
        }
        self.node.set_dirty();
    }

    // }}}

    // {{{ Windows

    pub fn for_each_window(&self, mut callback: impl FnMut(&Rc<Window>)) {
        let workspaces = self.pending.borrow().workspaces.clone();
        for workspace in &workspaces {
            workspace.for_each_window(&mut callback);
        }
    }

    pub fn find_window(&self, predicate: impl Fn(&Rc<Window>) -> bool) -> Option<Rc<Window>> {
        let mut found = None;
        self.for_each_window(|window| {
            if found.is_none() && predicate(window) {
                found = Some(Rc::clone(window));
            }
        });
        found
    }

    pub fn window_by_mark(&self, mark: &str) -> Option<Rc<Window>> {
        self.find_window(|window| window.has_mark(mark))
    }

    // }}}
}

// vim: foldmethod=marker
