use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

pub use hayward_config::BorderKind;
use hayward_ipc::WindowChange;

use crate::shell::Surface;
use crate::tree::column::Column;
use crate::tree::node::{Node, TreeNode, TreeNodeWeak};
use crate::tree::output::Output;
use crate::tree::root::{IpcEvent, Root};
use crate::tree::view::View;
use crate::tree::workspace::Workspace;
use crate::utils::{Direction, Rect};

/// Fallback floating sizes when the configuration requests "automatic" limits.
pub const FLOATING_MIN_WIDTH: f64 = 75.0;
pub const FLOATING_MIN_HEIGHT: f64 = 50.0;

/// Mutation-visible state of a [`Window`].
#[derive(Clone, Debug, Default)]
pub struct WindowState {
    /// Bounding rectangle, borders included.
    pub rect: Rect,
    /// Rectangle handed to the client surface.
    pub content: Rect,
    pub workspace: Option<Weak<Workspace>>,
    /// Owning column. `None` while the window floats (or is detached).
    pub parent: Option<Weak<Column>>,
    pub output: Option<Weak<Output>>,
    pub fullscreen: bool,
    pub focused: bool,
    pub border: BorderKind,
    pub border_thickness: f64,
    pub border_top: bool,
    pub border_bottom: bool,
    pub border_left: bool,
    pub border_right: bool,
}

impl WindowState {
    pub fn workspace(&self) -> Option<Rc<Workspace>> {
        self.workspace.as_ref().and_then(Weak::upgrade)
    }

    pub fn parent(&self) -> Option<Rc<Column>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn output(&self) -> Option<Rc<Output>> {
        self.output.as_ref().and_then(Weak::upgrade)
    }
}

/// A visible rectangle bound to exactly one client surface.
#[derive(Debug)]
pub struct Window {
    pub node: Node,
    root: Weak<Root>,
    view: Rc<View>,
    pub pending: RefCell<WindowState>,
    pub current: RefCell<WindowState>,
    /// Fraction of the column height this window occupies when tiled in a split column. Zero
    /// until the arrangement normalizer hands out a slice.
    pub height_fraction: Cell<f64>,
    /// Geometry to restore when leaving fullscreen.
    saved_rect: Cell<Rect>,
    saved_border: Cell<BorderKind>,
    /// Layout position of the surface's top-left corner, kept centered within the content
    /// rectangle while a resize is in flight.
    pub surface_x: Cell<f64>,
    pub surface_y: Cell<f64>,
    sticky: Cell<bool>,
    marks: RefCell<Vec<String>>,
    /// Outputs this window currently intersects.
    outputs: RefCell<Vec<Weak<Output>>>,
}

impl PartialEq for Window {
    fn eq(&self, other: &Self) -> bool {
        self.node.id() == other.node.id()
    }
}

impl Window {
    pub fn new(root: &Rc<Root>, view: Rc<View>) -> Rc<Self> {
        let (border, border_thickness) = {
            let config = root.config();
            let config = config.borrow();
            (
                config.decorations.border,
                f64::from(config.decorations.border_thickness),
            )
        };
        let window = Rc::new(Self {
            node: Node::new(root.dirty_nodes()),
            root: Rc::downgrade(root),
            view: Rc::clone(&view),
            pending: RefCell::new(WindowState {
                border,
                border_thickness,
                border_top: true,
                border_bottom: true,
                border_left: true,
                border_right: true,
                ..WindowState::default()
            }),
            current: RefCell::new(WindowState::default()),
            height_fraction: Cell::new(0.0),
            saved_rect: Cell::new(Rect::default()),
            saved_border: Cell::new(border),
            surface_x: Cell::new(0.0),
            surface_y: Cell::new(0.0),
            sticky: Cell::new(false),
            marks: RefCell::new(Vec::new()),
            outputs: RefCell::new(Vec::new()),
        });
        window
            .node
            .set_this(TreeNodeWeak::Window(Rc::downgrade(&window)));
        view.set_window(&window);
        root.events.new_node.emit(&TreeNode::Window(Rc::clone(&window)));
        window
    }

    pub fn root(&self) -> Rc<Root> {
        self.root.upgrade().expect("window outlived the root")
    }

    pub fn view(&self) -> &Rc<View> {
        &self.view
    }

    pub fn surface(&self) -> Option<Rc<Surface>> {
        self.view.surface()
    }

    pub fn title(&self) -> Option<String> {
        self.view.title()
    }

    // {{{ Lifetime

    /// Start destroying this window. The entity is freed by the transaction engine once no
    /// transaction references it anymore.
    pub fn begin_destroy(self: &Rc<Self>) {
        self.node.begin_destroy();
        if self.workspace().is_some() {
            self.detach();
        }
    }

    /// Free the window. Only the transaction engine calls this.
    pub(crate) fn destroy(&self) {
        assert!(
            self.node.is_destroying(),
            "tried to free window which wasn't marked as destroying"
        );
        assert!(
            self.node.ntxnrefs() == 0,
            "tried to free window which is still referenced by transactions"
        );
        self.view.remove_saved_buffers();
        self.outputs.borrow_mut().clear();
    }

    // }}}

    // {{{ Containment

    pub fn workspace(&self) -> Option<Rc<Workspace>> {
        self.pending.borrow().workspace()
    }

    pub fn column(&self) -> Option<Rc<Column>> {
        self.pending.borrow().parent()
    }

    pub fn output(&self) -> Option<Rc<Output>> {
        self.pending.borrow().output()
    }

    pub fn is_floating(&self) -> bool {
        let pending = self.pending.borrow();
        pending.workspace.is_some() && pending.parent.is_none()
    }

    pub fn is_current_floating(&self) -> bool {
        let current = self.current.borrow();
        current.workspace.is_some() && current.parent.is_none()
    }

    pub fn is_tiling(&self) -> bool {
        self.pending.borrow().parent.is_some()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.pending.borrow().fullscreen
    }

    pub fn is_sticky(&self) -> bool {
        self.sticky.get() && self.is_floating()
    }

    pub fn set_sticky(&self, sticky: bool) {
        self.sticky.set(sticky);
    }

    /// Remove this window from its column or workspace. Afterwards it is reachable only from
    /// the caller's handle, with back-pointers cleared and its node dirty.
    pub fn detach(self: &Rc<Self>) {
        let Some(workspace) = self.workspace() else {
            return;
        };

        if self.pending.borrow().fullscreen {
            workspace.pending.borrow_mut().fullscreen = None;
            workspace.node.set_dirty();
        }

        if let Some(column) = self.column() {
            column.remove_child(self);
            column.node.set_dirty();
        } else {
            workspace.remove_floating(self);
            workspace.node.set_dirty();
        }

        self.node.set_dirty();
    }

    // }}}

    // {{{ Reconciliation

    /// Rewrite derived fields after this window was attached to a workspace floating list.
    pub fn reconcile_floating(self: &Rc<Self>, workspace: &Rc<Workspace>) {
        {
            let mut pending = self.pending.borrow_mut();
            pending.workspace = Some(Rc::downgrade(workspace));
            if pending.output.as_ref().and_then(Weak::upgrade).is_none() {
                pending.output = self
                    .root()
                    .active_output()
                    .as_ref()
                    .map(Rc::downgrade);
            }
            pending.parent = None;
        }

        let focused = workspace.is_visible()
            && workspace
                .get_active_window()
                .is_some_and(|active| &active == self);
        self.pending.borrow_mut().focused = focused;
    }

    /// Rewrite derived fields after this window was attached to a column.
    pub fn reconcile_tiling(self: &Rc<Self>, column: &Rc<Column>) {
        let (workspace, output, column_focused, active_child) = {
            let column_pending = column.pending.borrow();
            (
                column_pending.workspace.clone(),
                column_pending.output.clone(),
                column_pending.focused,
                column_pending.active_child.clone(),
            )
        };

        let mut pending = self.pending.borrow_mut();
        pending.workspace = workspace;
        pending.output = output;
        pending.parent = Some(Rc::downgrade(column));
        pending.focused = column_focused && active_child.is_some_and(|active| &active == self);
    }

    /// Rewrite derived fields after this window was detached from the tree.
    pub fn reconcile_detached(&self) {
        let mut pending = self.pending.borrow_mut();
        pending.workspace = None;
        pending.output = None;
        pending.parent = None;
        pending.focused = false;
    }

    // }}}

    // {{{ Floating

    pub fn set_floating(self: &Rc<Self>, enable: bool) {
        if self.is_floating() == enable {
            return;
        }

        let workspace = self
            .workspace()
            .expect("window not attached to a workspace");
        let had_focus = workspace.get_active_window().is_some();

        if enable {
            let old_parent = self.column();
            self.detach();
            workspace.add_floating(self);
            self.view.set_tiled(false);
            if self.view.using_csd() {
                let mut pending = self.pending.borrow_mut();
                self.saved_border.set(pending.border);
                pending.border = BorderKind::Csd;
            }
            self.floating_set_default_size();
            self.floating_resize_and_center();
            if let Some(old_parent) = old_parent {
                old_parent.consider_destroy();
            }
        } else {
            // Returning to tiled.
            let output = self.output();
            self.detach();
            self.view.set_tiled(true);
            if self.view.using_csd() {
                self.pending.borrow_mut().border = self.saved_border.get();
            }
            {
                let mut pending = self.pending.borrow_mut();
                pending.rect.width = 0.0;
                pending.rect.height = 0.0;
            }
            self.height_fraction.set(0.0);

            let column = workspace.preferred_column_on_output(output.as_ref());
            let column = match column {
                Some(column) => column,
                None => {
                    let column = Column::new(&self.root());
                    let output = output
                        .or_else(|| self.root().active_output())
                        .expect("no output to tile on");
                    workspace.insert_tiling(&output, &column, 0);
                    column
                }
            };

            self.move_to_column(&column);
        }

        if had_focus {
            workspace.set_active_window(self);
        }

        self.root()
            .queue_ipc_event(IpcEvent::window(WindowChange::Floating, self));
    }

    /// Clamp limits for floating windows: `(min_width, max_width, min_height, max_height)`.
    ///
    /// A configured value of 0 means automatic (75x50 minimum, output-layout maximum) and -1
    /// means unconstrained.
    pub fn floating_constraints(root: &Root) -> (f64, f64, f64, f64) {
        let config = root.config();
        let config = config.borrow();
        let layout_box = root.layout_box();

        let min_width = match config.floating.minimum_width {
            -1 => 0.0,
            0 => FLOATING_MIN_WIDTH,
            width => f64::from(width),
        };
        let min_height = match config.floating.minimum_height {
            -1 => 0.0,
            0 => FLOATING_MIN_HEIGHT,
            height => f64::from(height),
        };
        let max_width = match config.floating.maximum_width {
            -1 => f64::MAX,
            0 => layout_box.width,
            width => f64::from(width),
        };
        let max_height = match config.floating.maximum_height {
            -1 => f64::MAX,
            0 => layout_box.height,
            height => f64::from(height),
        };

        (min_width, max_width, min_height, max_height)
    }

    fn floating_natural_resize(self: &Rc<Self>) {
        let (min_width, max_width, min_height, max_height) =
            Self::floating_constraints(&self.root());
        let (natural_width, natural_height) = self.view.natural_size();
        {
            // A client with no preferred size keeps whatever size it has.
            let mut pending = self.pending.borrow_mut();
            let width = if natural_width > 0.0 {
                natural_width
            } else {
                pending.content.width
            };
            let height = if natural_height > 0.0 {
                natural_height
            } else {
                pending.content.height
            };
            pending.content.width = width.clamp(min_width, max_width);
            pending.content.height = height.clamp(min_height, max_height);
        }
        self.set_geometry_from_content();
    }

    pub fn floating_set_default_size(self: &Rc<Self>) {
        let workspace = self
            .workspace()
            .expect("expected a window on a workspace");
        let (min_width, max_width, min_height, max_height) =
            Self::floating_constraints(&self.root());
        let workspace_box = workspace.get_box();

        let width = (workspace_box.width * 0.5).clamp(min_width, max_width);
        let height = (workspace_box.height * 0.75).clamp(min_height, max_height);

        {
            let mut pending = self.pending.borrow_mut();
            pending.content.width = width;
            pending.content.height = height;
        }
        self.set_geometry_from_content();
    }

    pub fn floating_resize_and_center(self: &Rc<Self>) {
        let Some(output) = self.output() else {
            return;
        };
        let output_box = output.rect();
        if output_box.is_empty() {
            // On a noop output; this runs again once the window lands on a real one.
            let mut pending = self.pending.borrow_mut();
            pending.rect = Rect::default();
            return;
        }

        self.floating_natural_resize();

        {
            let mut pending = self.pending.borrow_mut();
            let content = pending.content;
            pending.content.x = output_box.x + (output_box.width - content.width) / 2.0;
            pending.content.y = output_box.y + (output_box.height - content.height) / 2.0;

            // If the border is BorderKind::None these are ignored.
            pending.border_top = true;
            pending.border_bottom = true;
            pending.border_left = true;
            pending.border_right = true;
        }
        self.set_geometry_from_content();
        self.node.set_dirty();
    }

    /// Choose an output for the floating window's position: the one containing its center, or
    /// failing that the closest one.
    pub fn floating_find_output(&self) -> Option<Rc<Output>> {
        let (center_x, center_y) = self.pending.borrow().rect.center();
        let root = self.root();
        let mut closest: Option<(Rc<Output>, f64)> = None;
        for output in root.outputs() {
            let rect = output.rect();
            let (closest_x, closest_y) = rect.closest_point(center_x, center_y);
            if closest_x == center_x && closest_y == center_y {
                return Some(output);
            }
            let distance =
                (closest_x - center_x).powi(2) + (closest_y - center_y).powi(2);
            if closest.as_ref().is_none_or(|(_, best)| distance < *best) {
                closest = Some((output, distance));
            }
        }
        closest.map(|(output, _)| output)
    }

    pub fn floating_move_to(self: &Rc<Self>, lx: f64, ly: f64) {
        debug_assert!(self.is_floating(), "expected a floating window");
        {
            let mut pending = self.pending.borrow_mut();
            let dx = lx - pending.rect.x;
            let dy = ly - pending.rect.y;
            pending.rect.x = lx;
            pending.rect.y = ly;
            pending.content.x += dx;
            pending.content.y += dy;
        }
        let new_output = self.floating_find_output();
        self.pending.borrow_mut().output = new_output.as_ref().map(Rc::downgrade);
        self.node.set_dirty();
    }

    pub fn floating_move_to_center(self: &Rc<Self>) {
        debug_assert!(self.is_floating(), "expected a floating window");
        let Some(output) = self.output() else {
            return;
        };
        let output_box = output.rect();
        let rect = self.pending.borrow().rect;
        let lx = output_box.x + (output_box.width - rect.width) / 2.0;
        let ly = output_box.y + (output_box.height - rect.height) / 2.0;
        self.floating_move_to(lx, ly);
    }

    pub fn raise_floating(self: &Rc<Self>) {
        let Some(workspace) = self.workspace() else {
            return;
        };
        if !self.is_floating() {
            return;
        }
        let mut pending = workspace.pending.borrow_mut();
        if let Some(index) = pending.floating.iter().position(|other| other == self) {
            let window = pending.floating.remove(index);
            pending.floating.push(window);
        }
        workspace.node.set_dirty();
    }

    // }}}

    // {{{ Fullscreen

    pub fn set_fullscreen(self: &Rc<Self>, enable: bool) {
        if enable {
            self.fullscreen_enable();
        } else {
            self.fullscreen_disable();
        }
    }

    fn fullscreen_enable(self: &Rc<Self>) {
        let workspace = self
            .workspace()
            .expect("window must be attached to a workspace");
        if self.pending.borrow().fullscreen {
            return;
        }

        self.view.set_fullscreen(true);

        {
            let mut pending = self.pending.borrow_mut();
            pending.fullscreen = true;
            self.saved_rect.set(pending.rect);
        }
        workspace.pending.borrow_mut().fullscreen = Some(Rc::clone(self));
        workspace.node.set_dirty();
        self.node.set_dirty();

        self.root()
            .queue_ipc_event(IpcEvent::window(WindowChange::FullscreenMode, self));
    }

    fn fullscreen_disable(self: &Rc<Self>) {
        let workspace = self
            .workspace()
            .expect("window must be attached to a workspace");
        if !self.pending.borrow().fullscreen {
            return;
        }

        self.view.set_fullscreen(false);

        let floating = self.is_floating();
        {
            let mut pending = self.pending.borrow_mut();
            if floating {
                pending.rect = self.saved_rect.get();
            }
            pending.fullscreen = false;
        }

        // A window mapped fullscreen and floated by request never had a floating geometry, give
        // it one now.
        if floating && self.pending.borrow().rect.is_empty() {
            self.floating_resize_and_center();
        }

        {
            let mut workspace_pending = workspace.pending.borrow_mut();
            if workspace_pending
                .fullscreen
                .as_ref()
                .is_some_and(|fullscreen| fullscreen == self)
            {
                workspace_pending.fullscreen = None;
            }
        }
        workspace.node.set_dirty();
        self.node.set_dirty();

        self.root()
            .queue_ipc_event(IpcEvent::window(WindowChange::FullscreenMode, self));
    }

    /// A fullscreen window moved to another workspace takes the fullscreen slot there,
    /// kicking out any previous occupant.
    pub fn handle_fullscreen_reparent(self: &Rc<Self>) {
        let Some(workspace) = self.workspace() else {
            return;
        };
        if !self.pending.borrow().fullscreen {
            return;
        }
        let previous = workspace.pending.borrow().fullscreen.clone();
        if previous.as_ref().is_some_and(|previous| previous == self) {
            return;
        }
        if let Some(previous) = previous {
            previous.fullscreen_disable();
        }
        workspace.pending.borrow_mut().fullscreen = Some(Rc::clone(self));
        workspace.node.set_dirty();
    }

    /// The fullscreen window hiding this one, if any.
    pub fn obstructing_fullscreen_window(self: &Rc<Self>) -> Option<Rc<Window>> {
        let workspace = self.workspace()?;
        let fullscreen = workspace.pending.borrow().fullscreen.clone()?;
        if self.pending.borrow().fullscreen {
            return None;
        }
        if self.is_transient_for(&fullscreen) {
            return None;
        }
        Some(fullscreen)
    }

    // }}}

    // {{{ Movement

    fn move_to_column_from_maybe_direction(
        self: &Rc<Self>,
        column: &Rc<Column>,
        direction: Option<Direction>,
    ) {
        if self.column().is_some_and(|parent| &parent == column) {
            return;
        }

        let old_workspace = self.workspace();

        match direction {
            Some(direction @ (Direction::Up | Direction::Down)) => {
                let index = if direction == Direction::Down {
                    0
                } else {
                    column.pending.borrow().children.len()
                };
                self.detach();
                column.insert_child(self, index);
                {
                    let mut pending = self.pending.borrow_mut();
                    pending.rect.width = 0.0;
                    pending.rect.height = 0.0;
                }
                self.height_fraction.set(0.0);
            }
            _ => {
                let target_sibling = column.pending.borrow().active_child.clone();
                self.detach();
                match target_sibling {
                    Some(sibling) => Column::add_sibling(&sibling, self, true),
                    None => column.add_child(self),
                }
            }
        }

        self.root()
            .queue_ipc_event(IpcEvent::window(WindowChange::Move, self));

        if let Some(workspace) = column.workspace() {
            workspace.detect_urgent();
        }
        if let Some(old_workspace) = old_workspace {
            if column
                .workspace()
                .is_none_or(|new_workspace| new_workspace != old_workspace)
            {
                old_workspace.detect_urgent();
            }
        }
    }

    pub fn move_to_column(self: &Rc<Self>, column: &Rc<Column>) {
        self.move_to_column_from_maybe_direction(column, None);
    }

    pub fn move_to_column_from_direction(
        self: &Rc<Self>,
        column: &Rc<Column>,
        direction: Direction,
    ) {
        self.move_to_column_from_maybe_direction(column, Some(direction));
    }

    pub fn move_to_workspace(self: &Rc<Self>, workspace: &Rc<Workspace>) {
        if self
            .workspace()
            .is_some_and(|current| &current == workspace)
        {
            return;
        }

        if self.is_floating() {
            self.detach();
            workspace.add_floating(self);
            self.handle_fullscreen_reparent();
        } else {
            let output = self
                .column()
                .and_then(|column| column.output())
                .or_else(|| self.root().active_output());
            let column = workspace.preferred_column_on_output(output.as_ref());
            let column = match column {
                Some(column) => column,
                None => {
                    let column = Column::new(&self.root());
                    let output = output.expect("no output to tile on");
                    workspace.insert_tiling(&output, &column, 0);
                    column
                }
            };

            {
                let mut pending = self.pending.borrow_mut();
                pending.rect.width = 0.0;
                pending.rect.height = 0.0;
            }
            self.height_fraction.set(0.0);

            self.move_to_column(&column);
        }
    }

    pub fn move_to_output_from_direction(
        self: &Rc<Self>,
        output: &Rc<Output>,
        direction: Direction,
    ) {
        let workspace = self
            .workspace()
            .expect("window is not attached to a workspace");

        if self.is_floating() {
            let old_output = workspace.get_active_output();
            if old_output.is_none_or(|old| &old != output) && !self.pending.borrow().fullscreen {
                self.floating_move_to_center();
            }
            return;
        }

        let mut column = None;
        for candidate in workspace.pending.borrow().tiling.iter() {
            if candidate
                .output()
                .is_none_or(|candidate_output| &candidate_output != output)
            {
                continue;
            }
            if direction == Direction::Left || column.is_none() {
                column = Some(Rc::clone(candidate));
            }
        }
        let active_column = workspace.pending.borrow().active_column.clone();
        if let Some(active_column) = active_column {
            if active_column
                .output()
                .is_some_and(|active_output| &active_output == output)
                && matches!(direction, Direction::Up | Direction::Down)
            {
                column = Some(active_column);
            }
        }
        let column = match column {
            Some(column) => column,
            None => {
                let column = Column::new(&self.root());
                workspace.insert_tiling(output, &column, 0);
                column
            }
        };

        {
            let mut pending = self.pending.borrow_mut();
            pending.rect.width = 0.0;
            pending.rect.height = 0.0;
        }
        self.height_fraction.set(0.0);

        self.move_to_column_from_direction(&column, direction);
    }

    // }}}

    // {{{ Geometry

    pub fn get_box(&self) -> Rect {
        self.pending.borrow().rect
    }

    pub fn contains_point(&self, lx: f64, ly: f64) -> bool {
        self.pending.borrow().rect.contains(lx, ly)
    }

    pub fn contents_contain_point(&self, lx: f64, ly: f64) -> bool {
        self.pending.borrow().content.contains(lx, ly)
    }

    pub fn current_contains_point(&self, lx: f64, ly: f64) -> bool {
        self.current.borrow().rect.contains(lx, ly)
    }

    /// Insets between the bounding rectangle and the content rectangle:
    /// `(top, right, bottom, left)`.
    pub fn content_insets(&self) -> (f64, f64, f64, f64) {
        let pending = self.pending.borrow();
        if pending.fullscreen {
            return (0.0, 0.0, 0.0, 0.0);
        }
        let thickness = pending.border_thickness;
        let titlebar_height = self.root().titlebar_height();
        match pending.border {
            BorderKind::None | BorderKind::Csd => (0.0, 0.0, 0.0, 0.0),
            BorderKind::Pixel => (
                if pending.border_top { thickness } else { 0.0 },
                if pending.border_right { thickness } else { 0.0 },
                if pending.border_bottom { thickness } else { 0.0 },
                if pending.border_left { thickness } else { 0.0 },
            ),
            BorderKind::Normal => (
                titlebar_height,
                if pending.border_right { thickness } else { 0.0 },
                if pending.border_bottom { thickness } else { 0.0 },
                if pending.border_left { thickness } else { 0.0 },
            ),
        }
    }

    /// Recompute the bounding rectangle from the content rectangle.
    pub fn set_geometry_from_content(self: &Rc<Self>) {
        let (top, right, bottom, left) = self.content_insets();
        let mut pending = self.pending.borrow_mut();
        pending.rect = Rect::new(
            pending.content.x - left,
            pending.content.y - top,
            pending.content.width + left + right,
            pending.content.height + top + bottom,
        );
        drop(pending);
        self.node.set_dirty();
    }

    /// Recompute the content rectangle from the bounding rectangle.
    pub fn set_content_from_geometry(self: &Rc<Self>) {
        let (top, right, bottom, left) = self.content_insets();
        let mut pending = self.pending.borrow_mut();
        pending.content = Rect::new(
            pending.rect.x + left,
            pending.rect.y + top,
            (pending.rect.width - left - right).max(0.0),
            (pending.rect.height - top - bottom).max(0.0),
        );
    }

    /// Center the surface within the current content rectangle. Important for fullscreen views
    /// which refuse to resize to the size of the output.
    pub fn center_surface(&self) {
        let Some(surface) = self.surface() else {
            return;
        };
        let current = self.current.borrow();
        let (surface_width, surface_height) = surface.size();
        self.surface_x
            .set(current.content.x + (current.content.width - surface_width) / 2.0);
        self.surface_y
            .set(current.content.y + (current.content.height - surface_height) / 2.0);
    }

    /// The surface under `(lx, ly)`, with surface-local coordinates.
    pub fn surface_at(&self, lx: f64, ly: f64) -> Option<(Rc<Surface>, f64, f64)> {
        let surface = self.surface()?;
        let geometry = self.view.geometry.get();
        let sx = lx - self.surface_x.get() + geometry.x;
        let sy = ly - self.surface_y.get() + geometry.y;
        let (width, height) = surface.size();
        if sx < 0.0 || sy < 0.0 || sx >= width || sy >= height {
            return None;
        }
        Some((surface, sx, sy))
    }

    // }}}

    // {{{ Siblings and layout queries

    pub fn get_siblings(&self) -> Vec<Rc<Window>> {
        if let Some(column) = self.column() {
            return column.pending.borrow().children.clone();
        }
        if let Some(workspace) = self.workspace() {
            if self.is_floating() {
                return workspace.pending.borrow().floating.clone();
            }
        }
        Vec::new()
    }

    pub fn sibling_index(self: &Rc<Self>) -> Option<usize> {
        self.get_siblings()
            .iter()
            .position(|sibling| sibling == self)
    }

    pub fn get_current_siblings(&self) -> Vec<Rc<Window>> {
        if let Some(column) = self.current.borrow().parent() {
            return column.current.borrow().children.clone();
        }
        if let Some(workspace) = self.current.borrow().workspace() {
            return workspace.current.borrow().floating.clone();
        }
        Vec::new()
    }

    pub fn get_previous_sibling(self: &Rc<Self>) -> Option<Rc<Window>> {
        let siblings = self.get_siblings();
        let index = siblings.iter().position(|sibling| sibling == self)?;
        index.checked_sub(1).map(|index| Rc::clone(&siblings[index]))
    }

    pub fn get_next_sibling(self: &Rc<Self>) -> Option<Rc<Window>> {
        let siblings = self.get_siblings();
        let index = siblings.iter().position(|sibling| sibling == self)?;
        siblings.get(index + 1).cloned()
    }

    pub fn parent_layout(&self) -> Option<crate::tree::ColumnLayout> {
        self.column().map(|column| column.pending.borrow().layout)
    }

    pub fn is_transient_for(self: &Rc<Self>, ancestor: &Rc<Window>) -> bool {
        let mut cursor = self.view.transient_parent();
        while let Some(parent) = cursor {
            if &parent == ancestor {
                return true;
            }
            cursor = parent.view().transient_parent();
        }
        false
    }

    // }}}

    // {{{ Visibility

    /// Whether any part of this window can currently be seen.
    pub fn is_visible(self: &Rc<Self>) -> bool {
        if self.node.is_destroying() {
            return false;
        }
        let Some(workspace) = self.workspace() else {
            return false;
        };
        if !self.is_sticky() && !workspace.is_visible() {
            return false;
        }

        // Windows on an inactive tab of a stacked column are hidden.
        if let Some(column) = self.column() {
            let column_pending = column.pending.borrow();
            if column_pending.layout == crate::tree::ColumnLayout::Stacked
                && column_pending
                    .active_child
                    .as_ref()
                    .is_none_or(|active| active != self)
            {
                return false;
            }
        }

        // Hidden by another fullscreen window?
        let fullscreen = workspace.pending.borrow().fullscreen.clone();
        if let Some(fullscreen) = fullscreen {
            if !self.pending.borrow().fullscreen && !self.is_transient_for(&fullscreen) {
                return false;
            }
        }

        true
    }

    /// Record which outputs the window intersects and notify the client surface.
    pub fn discover_outputs(self: &Rc<Self>) {
        let rect = self.current.borrow().rect;
        let root = self.root();
        let mut entered = Vec::new();
        for output in root.outputs() {
            let intersects = output.current_rect().intersection(&rect).is_some();
            let was_entered = self
                .outputs
                .borrow()
                .iter()
                .any(|weak| weak.upgrade().is_some_and(|other| other == output));
            if intersects && !was_entered {
                if let Some(surface) = self.surface() {
                    surface.send_enter(output.node.id().get());
                }
            } else if !intersects && was_entered {
                if let Some(surface) = self.surface() {
                    surface.send_leave(output.node.id().get());
                }
            }
            if intersects {
                entered.push(Rc::downgrade(&output));
            }
        }
        *self.outputs.borrow_mut() = entered;
    }

    pub fn damage_whole(&self) {
        for output in self.outputs.borrow().iter().filter_map(Weak::upgrade) {
            output.damage_whole();
        }
    }

    // }}}

    // {{{ Marks and urgency

    pub fn marks(&self) -> Vec<String> {
        self.marks.borrow().clone()
    }

    pub fn has_mark(&self, mark: &str) -> bool {
        self.marks.borrow().iter().any(|other| other == mark)
    }

    pub fn add_mark(self: &Rc<Self>, mark: impl Into<String>) {
        self.marks.borrow_mut().push(mark.into());
        self.root()
            .queue_ipc_event(IpcEvent::window(WindowChange::Mark, self));
    }

    pub fn clear_marks(self: &Rc<Self>) {
        self.marks.borrow_mut().clear();
        self.root()
            .queue_ipc_event(IpcEvent::window(WindowChange::Mark, self));
    }

    pub fn is_urgent(&self) -> bool {
        self.view.is_urgent()
    }

    // }}}

    pub fn set_resizing(&self, resizing: bool) {
        self.view.set_resizing(resizing);
    }

    pub fn close(&self) {
        self.view.close();
    }
}

// vim: foldmethod=marker
