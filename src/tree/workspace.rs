use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use hayward_config::SmartGaps;
use hayward_ipc::WorkspaceChange;

use crate::tree::column::{Column, ColumnLayout};
use crate::tree::node::{Node, TreeNode, TreeNodeWeak};
use crate::tree::output::Output;
use crate::tree::root::{IpcEvent, Root};
use crate::tree::window::Window;
use crate::utils::Rect;

/// Smallest sane workspace working area. Gaps are clamped so at least this much remains.
pub const MIN_SANE_WIDTH: f64 = 100.0;
pub const MIN_SANE_HEIGHT: f64 = 60.0;

/// Which surface population owns the active window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FocusMode {
    #[default]
    Tiling,
    Floating,
}

/// Gaps applied around the workspace working area during the last arrange.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Gaps {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// Mutation-visible state of a [`Workspace`].
#[derive(Clone, Debug, Default)]
pub struct WorkspaceState {
    pub rect: Rect,
    /// The window occupying the whole output, if any. At most one per workspace.
    pub fullscreen: Option<Rc<Window>>,
    /// Floating windows, bottom to top. The last entry is the active floater.
    pub floating: Vec<Rc<Window>>,
    /// Tiling columns, left to right.
    pub tiling: Vec<Rc<Column>>,
    pub active_column: Option<Rc<Column>>,
    pub focus_mode: FocusMode,
    pub focused: bool,
}

/// A named collection of columns and floating windows.
#[derive(Debug)]
pub struct Workspace {
    pub node: Node,
    root: Weak<Root>,
    name: String,
    pub pending: RefCell<WorkspaceState>,
    pub current: RefCell<WorkspaceState>,
    urgent: Cell<bool>,
    /// Gaps subtracted from the output rectangle during the last arrange.
    pub current_gaps: Cell<Gaps>,
    /// Names of outputs that prefer to show this workspace, best first.
    output_priority: RefCell<Vec<String>>,
}

impl PartialEq for Workspace {
    fn eq(&self, other: &Self) -> bool {
        self.node.id() == other.node.id()
    }
}

impl Workspace {
    /// Create a workspace and attach it to the root's workspace list.
    pub fn new(root: &Rc<Root>, name: impl Into<String>) -> Rc<Self> {
        let workspace = Rc::new(Self {
            node: Node::new(root.dirty_nodes()),
            root: Rc::downgrade(root),
            name: name.into(),
            pending: RefCell::new(WorkspaceState::default()),
            current: RefCell::new(WorkspaceState::default()),
            urgent: Cell::new(false),
            current_gaps: Cell::new(Gaps::default()),
            output_priority: RefCell::new(Vec::new()),
        });
        workspace
            .node
            .set_this(TreeNodeWeak::Workspace(Rc::downgrade(&workspace)));

        root.attach_workspace(&workspace);
        root.events
            .new_node
            .emit(&TreeNode::Workspace(Rc::clone(&workspace)));
        root.queue_ipc_event(IpcEvent::workspace(
            WorkspaceChange::Init,
            Some(&workspace),
            None,
        ));
        workspace
    }

    pub fn root(&self) -> Rc<Root> {
        self.root.upgrade().expect("workspace outlived the root")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // {{{ Lifetime

    pub fn begin_destroy(self: &Rc<Self>) {
        let root = self.root();
        root.queue_ipc_event(IpcEvent::workspace(WorkspaceChange::Empty, Some(self), None));
        self.node.begin_destroy();
        self.detach();
    }

    /// Free the workspace. Only the transaction engine calls this.
    pub(crate) fn destroy(&self) {
        assert!(
            self.node.is_destroying(),
            "tried to free workspace which wasn't marked as destroying"
        );
        assert!(
            self.node.ntxnrefs() == 0,
            "tried to free workspace which is still referenced by transactions"
        );
    }

    /// Destroy this workspace if it is empty and no longer visible.
    pub fn consider_destroy(self: &Rc<Self>) {
        if self.node.is_destroying() {
            return;
        }
        if !self.is_empty() {
            return;
        }
        if self.root().get_active_workspace().is_some_and(|active| &active == self) {
            return;
        }
        self.begin_destroy();
    }

    /// Remove this workspace from the root's ordered list, moving the active workspace onto a
    /// neighbour when needed.
    pub fn detach(self: &Rc<Self>) {
        let root = self.root();
        root.detach_workspace(self);
        self.node.set_dirty();
        root.node.set_dirty();
    }

    pub fn is_empty(&self) -> bool {
        let pending = self.pending.borrow();
        pending.tiling.is_empty() && pending.floating.is_empty()
    }

    /// A workspace is visible while it is the root's active workspace.
    pub fn is_visible(self: &Rc<Self>) -> bool {
        self.root()
            .get_active_workspace()
            .is_some_and(|active| &active == self)
    }

    // }}}

    // {{{ Floating children

    pub fn add_floating(self: &Rc<Self>, window: &Rc<Window>) {
        debug_assert!(
            window.workspace().is_none() && window.column().is_none(),
            "window must be detached before it can be attached"
        );

        let prev_active_floating = self.get_active_floating_window();

        self.pending.borrow_mut().floating.push(Rc::clone(window));

        window.reconcile_floating(self);

        if let Some(prev) = prev_active_floating {
            prev.reconcile_floating(self);
            prev.node.set_dirty();
        }

        self.node.set_dirty();
        window.node.set_dirty();
    }

    pub fn remove_floating(self: &Rc<Self>, window: &Rc<Window>) {
        debug_assert!(
            window.workspace().is_some_and(|workspace| &workspace == self),
            "window is not a child of this workspace"
        );
        debug_assert!(window.column().is_none(), "window is not floating");

        let now_empty = {
            let mut pending = self.pending.borrow_mut();
            let index = pending
                .floating
                .iter()
                .position(|other| other == window)
                .expect("window missing from floating list");
            pending.floating.remove(index);
            pending.floating.is_empty()
        };

        if now_empty {
            // Switch back to tiling mode.
            self.pending.borrow_mut().focus_mode = FocusMode::Tiling;
            if let Some(next_active) = self.get_active_tiling_window() {
                let column = next_active.column().expect("tiling window has a column");
                next_active.reconcile_tiling(&column);
            }
        } else if let Some(next_active) = self.get_active_floating_window() {
            next_active.reconcile_floating(self);
        }

        window.reconcile_detached();
    }

    // }}}

    // {{{ Tiling children

    pub fn insert_tiling(self: &Rc<Self>, output: &Rc<Output>, column: &Rc<Column>, index: usize) {
        debug_assert!(
            column.workspace().is_none() && column.output().is_none(),
            "column is already attached"
        );

        {
            let mut pending = self.pending.borrow_mut();
            let index = index.min(pending.tiling.len());
            pending.tiling.insert(index, Rc::clone(column));
            if pending.active_column.is_none() {
                pending.active_column = Some(Rc::clone(column));
            }
        }

        column.reconcile(self, output);

        self.node.set_dirty();
        column.node.set_dirty();
    }

    pub fn remove_tiling(self: &Rc<Self>, column: &Rc<Column>) {
        debug_assert!(
            column.workspace().is_some_and(|workspace| &workspace == self),
            "column is not a child of this workspace"
        );
        let output = column.output();

        let (index, was_active) = {
            let mut pending = self.pending.borrow_mut();
            let index = pending
                .tiling
                .iter()
                .position(|other| other == column)
                .expect("column is missing from workspace column list");
            pending.tiling.remove(index);
            let was_active = pending
                .active_column
                .as_ref()
                .is_some_and(|active| active == column);
            (index, was_active)
        };

        if was_active {
            // Prefer the column just before the removed one, on the same output.
            let next_active = {
                let pending = self.pending.borrow();
                let mut next_active: Option<Rc<Column>> = None;
                for (candidate_index, candidate) in pending.tiling.iter().enumerate() {
                    if candidate.output().map(|o| o.node.id()) != output.as_ref().map(|o| o.node.id())
                    {
                        continue;
                    }
                    if next_active.is_some() && candidate_index >= index {
                        break;
                    }
                    next_active = Some(Rc::clone(candidate));
                }
                next_active
            };

            self.pending.borrow_mut().active_column.clone_from(&next_active);

            if let Some(next_active) = next_active {
                if let Some(output) = next_active.output() {
                    next_active.reconcile(self, &output);
                }
                next_active.node.set_dirty();
            }
        }

        column.reconcile_detached();

        self.node.set_dirty();
        column.node.set_dirty();
    }

    /// The column new tiling windows on `output` should land in: the active column when it is
    /// on that output, else the first column on that output.
    pub fn preferred_column_on_output(&self, output: Option<&Rc<Output>>) -> Option<Rc<Column>> {
        let pending = self.pending.borrow();
        let matches_output = |column: &Rc<Column>| match output {
            Some(output) => column
                .output()
                .is_some_and(|column_output| &column_output == output),
            None => true,
        };
        if let Some(active) = pending.active_column.as_ref() {
            if matches_output(active) {
                return Some(Rc::clone(active));
            }
        }
        pending.tiling.iter().find(|column| matches_output(column)).cloned()
    }

    // }}}

    // {{{ Gaps

    /// Exactly one container visible: a lone column that is stacked or holds a single child.
    pub fn has_single_visible_container(&self) -> bool {
        let pending = self.pending.borrow();
        if pending.tiling.len() != 1 {
            return false;
        }
        let column = &pending.tiling[0];
        let column_pending = column.pending.borrow();
        column_pending.layout == ColumnLayout::Stacked || column_pending.children.len() == 1
    }

    /// Shrink the pending rectangle by the configured gaps, clamping so a minimum sane working
    /// area remains.
    pub fn add_gaps(self: &Rc<Self>) {
        let config = self.root().config();
        let (inner, outer, smart) = {
            let config = config.borrow();
            (
                f64::from(config.gaps.inner),
                f64::from(config.gaps.outer),
                config.gaps.smart,
            )
        };

        if smart == SmartGaps::On && self.has_single_visible_container() {
            self.current_gaps.set(Gaps::default());
            return;
        }

        let mut gaps = if smart == SmartGaps::Inverse && !self.has_single_visible_container() {
            Gaps::default()
        } else {
            Gaps {
                top: outer,
                right: outer,
                bottom: outer,
                left: outer,
            }
        };

        // Add inner gaps and make sure we don't turn out negative.
        gaps.top = (gaps.top + inner).max(0.0);
        gaps.right = (gaps.right + inner).max(0.0);
        gaps.bottom = (gaps.bottom + inner).max(0.0);
        gaps.left = (gaps.left + inner).max(0.0);

        // Now that we have the total gaps we may need to clamp them in case they've made the
        // available area too small.
        let mut pending = self.pending.borrow_mut();
        if pending.rect.width - gaps.left - gaps.right < MIN_SANE_WIDTH
            && gaps.left + gaps.right > 0.0
        {
            let total_gap = (pending.rect.width - MIN_SANE_WIDTH).max(0.0);
            let left_fraction = gaps.left / (gaps.left + gaps.right);
            gaps.left = left_fraction * total_gap;
            gaps.right = total_gap - gaps.left;
        }
        if pending.rect.height - gaps.top - gaps.bottom < MIN_SANE_HEIGHT
            && gaps.top + gaps.bottom > 0.0
        {
            let total_gap = (pending.rect.height - MIN_SANE_HEIGHT).max(0.0);
            let top_fraction = gaps.top / (gaps.top + gaps.bottom);
            gaps.top = top_fraction * total_gap;
            gaps.bottom = total_gap - gaps.top;
        }

        pending.rect.x += gaps.left;
        pending.rect.y += gaps.top;
        pending.rect.width -= gaps.left + gaps.right;
        pending.rect.height -= gaps.top + gaps.bottom;
        drop(pending);

        self.current_gaps.set(gaps);
    }

    pub fn get_box(&self) -> Rect {
        self.pending.borrow().rect
    }

    // }}}

    // {{{ Active window

    pub fn get_active_tiling_window(&self) -> Option<Rc<Window>> {
        let active_column = self.pending.borrow().active_column.clone()?;
        let active = active_column.pending.borrow().active_child.clone();
        active
    }

    pub fn get_active_floating_window(&self) -> Option<Rc<Window>> {
        self.pending.borrow().floating.last().cloned()
    }

    pub fn get_active_window(&self) -> Option<Rc<Window>> {
        match self.pending.borrow().focus_mode {
            FocusMode::Tiling => self.get_active_tiling_window(),
            FocusMode::Floating => self.get_active_floating_window(),
        }
    }

    /// Make `window` the active window of this workspace, updating the floating MRU order or
    /// the active column as appropriate.
    pub fn set_active_window(self: &Rc<Self>, window: &Rc<Window>) {
        debug_assert!(
            window.workspace().is_some_and(|workspace| &workspace == self),
            "window attached to wrong workspace"
        );

        let prev_active = self.get_active_window();
        if prev_active.as_ref().is_some_and(|prev| prev == window) {
            return;
        }

        if window.is_floating() {
            {
                let mut pending = self.pending.borrow_mut();
                let index = pending
                    .floating
                    .iter()
                    .position(|other| other == window)
                    .expect("window missing from list of floating windows");
                let window = pending.floating.remove(index);
                pending.floating.push(window);
                pending.focus_mode = FocusMode::Floating;
            }
            window.reconcile_floating(self);
        } else {
            let column = window.column().expect("tiled window has a column");
            debug_assert!(
                column.workspace().is_some_and(|workspace| &workspace == self),
                "column attached to wrong workspace"
            );

            column.pending.borrow_mut().active_child = Some(Rc::clone(window));
            {
                let mut pending = self.pending.borrow_mut();
                pending.active_column = Some(Rc::clone(&column));
                pending.focus_mode = FocusMode::Tiling;
            }
            let root = self.root();
            if root.get_active_workspace().is_some_and(|active| &active == self) {
                if let Some(output) = column.output() {
                    root.set_active_output(&output);
                }
            }

            window.reconcile_tiling(&column);
        }

        if let Some(prev) = prev_active {
            if prev.is_floating() {
                prev.reconcile_floating(self);
            } else if let Some(column) = prev.column() {
                prev.reconcile_tiling(&column);
            }
        }

        self.node.set_dirty();
        window.node.set_dirty();
    }

    pub fn get_active_output(&self) -> Option<Rc<Output>> {
        self.pending
            .borrow()
            .active_column
            .as_ref()
            .and_then(|column| column.output())
    }

    // }}}

    // {{{ Queries

    pub fn for_each_window(&self, mut callback: impl FnMut(&Rc<Window>)) {
        let (tiling, floating) = {
            let pending = self.pending.borrow();
            (pending.tiling.clone(), pending.floating.clone())
        };
        for column in &tiling {
            column.for_each_child(&mut callback);
        }
        for window in &floating {
            callback(window);
        }
    }

    pub fn find_window(
        &self,
        predicate: impl Fn(&Rc<Window>) -> bool,
    ) -> Option<Rc<Window>> {
        let mut found = None;
        self.for_each_window(|window| {
            if found.is_none() && predicate(window) {
                found = Some(Rc::clone(window));
            }
        });
        found
    }

    pub fn num_tiling_windows(&self) -> usize {
        let pending = self.pending.borrow();
        pending
            .tiling
            .iter()
            .map(|column| column.pending.borrow().children.len())
            .sum()
    }

    pub fn num_sticky_windows(&self) -> usize {
        let pending = self.pending.borrow();
        pending
            .floating
            .iter()
            .filter(|window| window.is_sticky())
            .count()
    }

    // }}}

    // {{{ Urgency

    pub fn is_urgent(&self) -> bool {
        self.urgent.get()
    }

    /// Recompute the workspace urgency flag from its windows, emitting an IPC event on change.
    pub fn detect_urgent(self: &Rc<Self>) {
        let new_urgent = self.find_window(|window| window.is_urgent()).is_some();
        if new_urgent != self.urgent.get() {
            self.urgent.set(new_urgent);
            self.root().queue_ipc_event(IpcEvent::workspace(
                WorkspaceChange::Urgent,
                Some(self),
                None,
            ));
            self.node.set_dirty();
        }
    }

    // }}}

    // {{{ Output priority

    pub fn output_priority(&self) -> Vec<String> {
        self.output_priority.borrow().clone()
    }

    pub fn output_add_priority(&self, output_name: &str) {
        let mut priority = self.output_priority.borrow_mut();
        if !priority.iter().any(|name| name == output_name) {
            priority.push(output_name.to_string());
        }
    }

    pub fn output_raise_priority(&self, output_name: &str) {
        let mut priority = self.output_priority.borrow_mut();
        if let Some(index) = priority.iter().position(|name| name == output_name) {
            let name = priority.remove(index);
            priority.insert(0, name);
        } else {
            priority.insert(0, output_name.to_string());
        }
    }

    /// The connected output this workspace most prefers.
    pub fn output_get_highest_available(self: &Rc<Self>) -> Option<Rc<Output>> {
        let root = self.root();
        for name in self.output_priority.borrow().iter() {
            if let Some(output) = root.output_by_name(name) {
                return Some(output);
            }
        }
        root.outputs().into_iter().next()
    }

    // }}}

    pub fn damage_whole(&self) {
        for column in self.pending.borrow().tiling.iter() {
            if let Some(output) = column.output() {
                output.damage_whole();
            }
        }
    }
}

// vim: foldmethod=marker
