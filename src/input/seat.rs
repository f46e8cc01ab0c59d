//! Seats and the focus engine.
//!
//! A seat owns the per-seat focus stacks (windows and workspaces in most-recently-used order),
//! the cursor, its input devices and the active seatop. The focus transition rules live in the
//! `impl Server` block below: they touch the tree, the seat stacks and the IPC queue together.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use calloop::timer::{TimeoutAction, Timer};
use hayward_ipc::{WindowChange, WorkspaceChange};

use crate::input::cursor::Cursor;
use crate::input::seatop::{self, SeatOp};
use crate::input::InputDevice;
use crate::shell::{ClientId, Layer, LayerSurface, Surface};
use crate::state::{Server, State};
use crate::tree::arrange;
use crate::tree::root::IpcEvent;
use crate::tree::{Root, TreeNode, Window, Workspace};

bitflags::bitflags! {
    /// Capabilities advertised to clients, the union over the seat's devices.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        const KEYBOARD = 1 << 0;
        const POINTER = 1 << 1;
        const TOUCH = 1 << 2;
        const TABLET_TOOL = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Input kinds for idle bookkeeping.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct IdleSource: u8 {
        const KEYBOARD = 1 << 0;
        const POINTER = 1 << 1;
        const TOUCH = 1 << 2;
        const TABLET_TOOL = 1 << 3;
        const TABLET_PAD = 1 << 4;
        const SWITCH = 1 << 5;
    }
}

/// Keyboard state of a seat.
#[derive(Debug, Default)]
pub struct Keyboard {
    focused_surface: RefCell<Option<Rc<Surface>>>,
    /// Keycodes currently held down. Re-sent on focus enter so interactive grabs survive a
    /// focus switch.
    pressed: RefCell<Vec<u32>>,
}

impl Keyboard {
    pub fn focused_surface(&self) -> Option<Rc<Surface>> {
        self.focused_surface.borrow().clone()
    }

    /// Give a surface the keyboard, re-sending the held keycodes so interactive grabs survive.
    pub fn notify_enter(&self, surface: &Rc<Surface>) {
        let previous = self.focused_surface.borrow().clone();
        if previous.as_ref().is_some_and(|previous| previous == surface) {
            return;
        }
        if let Some(previous) = previous {
            previous.send_event(crate::shell::SurfaceEvent::KeyboardLeave);
        }
        surface.send_event(crate::shell::SurfaceEvent::KeyboardEnter {
            pressed: self.pressed_keycodes(),
        });
        *self.focused_surface.borrow_mut() = Some(Rc::clone(surface));
    }

    pub fn clear_focus(&self) {
        if let Some(previous) = self.focused_surface.borrow_mut().take() {
            previous.send_event(crate::shell::SurfaceEvent::KeyboardLeave);
        }
    }

    pub fn pressed_keycodes(&self) -> Vec<u32> {
        self.pressed.borrow().clone()
    }

    pub fn key_pressed(&self, keycode: u32) {
        let mut pressed = self.pressed.borrow_mut();
        if !pressed.contains(&keycode) {
            pressed.push(keycode);
        }
    }

    pub fn key_released(&self, keycode: u32) {
        self.pressed.borrow_mut().retain(|other| *other != keycode);
    }
}

/// Touch-specific transient state, including pointer emulation for clients that do not bind
/// the touch protocol.
#[derive(Debug, Default)]
pub struct TouchState {
    pub touch_id: Cell<i32>,
    pub touch_x: Cell<f64>,
    pub touch_y: Cell<f64>,
    pub simulating_pointer_from_touch: Cell<bool>,
    pub pointer_touch_id: Cell<Option<i32>>,
    /// Surface of the active native touch sequence.
    pub touch_surface: RefCell<Option<Rc<crate::shell::Surface>>>,
}

/// Tablet-tool transient state, including pointer emulation for surfaces that do not accept
/// tablet-v2 events.
#[derive(Debug, Default)]
pub struct TabletState {
    pub simulating_pointer_from_tool_tip: Cell<bool>,
    /// Number of tool buttons currently held.
    pub tool_buttons: Cell<u32>,
    /// Surface a tablet drag started on. Events keep flowing there until tip-up, even when the
    /// tool strays off the surface.
    pub down_surface: RefCell<Option<Rc<crate::shell::Surface>>>,
}

#[derive(Debug)]
struct SeatWindow {
    window: Weak<Window>,
}

#[derive(Debug)]
struct SeatWorkspace {
    workspace: Weak<Workspace>,
}

/// A set of input devices that share focus and a cursor.
pub struct Seat {
    name: String,
    root: Weak<Root>,
    capabilities: Cell<Capabilities>,
    /// True if the window at the top of the active window stack has focus.
    pub has_focus: Cell<bool>,
    /// Windows in focus order, most recent first.
    active_window_stack: RefCell<Vec<SeatWindow>>,
    /// Workspaces in focus order. When the seat has a focused window, the top entry matches
    /// that window's workspace.
    active_workspace_stack: RefCell<Vec<SeatWorkspace>>,
    /// While set, views cannot receive keyboard focus.
    focused_layer: RefCell<Option<Rc<LayerSurface>>>,
    /// While set, no other client receives input events.
    exclusive_client: Cell<Option<ClientId>>,
    pub keyboard: Keyboard,
    pub cursor: Cursor,
    pub touch: TouchState,
    pub tablet: TabletState,
    seatop: RefCell<Option<Box<dyn SeatOp>>>,
    devices: RefCell<Vec<Rc<InputDevice>>>,
    idle_inhibit_sources: Cell<IdleSource>,
    idle_wake_sources: Cell<IdleSource>,
    last_activity: Cell<Duration>,
    pub last_button_serial: Cell<u32>,
}

impl std::fmt::Debug for Seat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seat")
            .field("name", &self.name)
            .field("has_focus", &self.has_focus.get())
            .field("capabilities", &self.capabilities.get())
            .finish_non_exhaustive()
    }
}

impl Seat {
    pub fn new(name: impl Into<String>, root: &Rc<Root>) -> Rc<Self> {
        let seat = Rc::new(Self {
            name: name.into(),
            root: Rc::downgrade(root),
            capabilities: Cell::new(Capabilities::empty()),
            has_focus: Cell::new(false),
            active_window_stack: RefCell::new(Vec::new()),
            active_workspace_stack: RefCell::new(Vec::new()),
            focused_layer: RefCell::new(None),
            exclusive_client: Cell::new(None),
            keyboard: Keyboard::default(),
            cursor: Cursor::new(),
            touch: TouchState::default(),
            tablet: TabletState::default(),
            seatop: RefCell::new(Some(Box::new(seatop::default::SeatopDefault::new()))),
            devices: RefCell::new(Vec::new()),
            idle_inhibit_sources: Cell::new(IdleSource::all()),
            idle_wake_sources: Cell::new(IdleSource::all()),
            last_activity: Cell::new(Duration::ZERO),
            last_button_serial: Cell::new(0),
        });

        // Track every window and workspace, existing and future, at the bottom of the focus
        // stacks.
        for workspace in root.workspaces() {
            seat.on_new_node(&TreeNode::Workspace(workspace));
        }
        root.for_each_window(|window| {
            seat.on_new_node(&TreeNode::Window(Rc::clone(window)));
        });
        let weak = Rc::downgrade(&seat);
        root.events.new_node.subscribe(move |node| {
            if let Some(seat) = weak.upgrade() {
                seat.on_new_node(node);
            }
        });

        seat
    }

    fn on_new_node(self: &Rc<Self>, node: &TreeNode) {
        match node {
            TreeNode::Window(window) => {
                self.active_window_stack.borrow_mut().push(SeatWindow {
                    window: Rc::downgrade(window),
                });
                let weak = Rc::downgrade(self);
                window.node.events.destroy.subscribe(move |node| {
                    if let (Some(seat), TreeNode::Window(window)) = (weak.upgrade(), node) {
                        seat.on_window_destroy(window);
                    }
                });
            }
            TreeNode::Workspace(workspace) => {
                self.active_workspace_stack
                    .borrow_mut()
                    .push(SeatWorkspace {
                        workspace: Rc::downgrade(workspace),
                    });
                let weak = Rc::downgrade(self);
                workspace.node.events.destroy.subscribe(move |node| {
                    if let (Some(seat), TreeNode::Workspace(workspace)) = (weak.upgrade(), node) {
                        seat.on_workspace_destroy(workspace);
                    }
                });
            }
            _ => {}
        }
    }

    fn on_window_destroy(&self, window: &Rc<Window>) {
        let was_focused = self
            .focused_window_unchecked()
            .is_some_and(|focused| &focused == window);
        self.active_window_stack
            .borrow_mut()
            .retain(|entry| entry.window.upgrade().is_some_and(|other| &other != window));
        if was_focused {
            // The next focus is chosen by the focus-replacement rules, not here.
            self.has_focus.set(false);
        }
    }

    fn on_workspace_destroy(&self, workspace: &Rc<Workspace>) {
        self.active_workspace_stack.borrow_mut().retain(|entry| {
            entry
                .workspace
                .upgrade()
                .is_some_and(|other| &other != workspace)
        });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Rc<Root> {
        self.root.upgrade().expect("seat outlived the root")
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities.get()
    }

    pub(crate) fn set_capabilities(&self, capabilities: Capabilities) {
        self.capabilities.set(capabilities);
    }

    // {{{ Devices

    pub fn devices(&self) -> Vec<Rc<InputDevice>> {
        self.devices.borrow().clone()
    }

    pub(crate) fn add_device(&self, device: &Rc<InputDevice>) {
        self.devices.borrow_mut().push(Rc::clone(device));
    }

    pub(crate) fn remove_device(&self, device: &Rc<InputDevice>) {
        self.devices
            .borrow_mut()
            .retain(|other| other.identifier() != device.identifier());
    }

    // }}}

    // {{{ Focus stacks

    /// Top of the window stack without the `has_focus` check.
    fn focused_window_unchecked(&self) -> Option<Rc<Window>> {
        self.windows_in_focus_order().into_iter().next()
    }

    /// The focused window: top of the stack, but only while `has_focus` is set.
    pub fn focused_window(&self) -> Option<Rc<Window>> {
        if !self.has_focus.get() {
            return None;
        }
        self.focused_window_unchecked()
    }

    pub fn focused_workspace(&self) -> Option<Rc<Workspace>> {
        self.workspaces_in_focus_order().into_iter().next()
    }

    /// Windows in most-recently-used order, skipping entries whose windows are going away.
    pub fn windows_in_focus_order(&self) -> Vec<Rc<Window>> {
        self.active_window_stack
            .borrow()
            .iter()
            .filter_map(|entry| entry.window.upgrade())
            .filter(|window| !window.node.is_destroying())
            .collect()
    }

    pub fn workspaces_in_focus_order(&self) -> Vec<Rc<Workspace>> {
        self.active_workspace_stack
            .borrow()
            .iter()
            .filter_map(|entry| entry.workspace.upgrade())
            .filter(|workspace| !workspace.node.is_destroying())
            .collect()
    }

    /// Move a window to the top of the focus stack without any of the focus side effects.
    pub fn set_raw_focus(&self, window: &Rc<Window>) {
        let mut stack = self.active_window_stack.borrow_mut();
        if let Some(index) = stack
            .iter()
            .position(|entry| entry.window.upgrade().is_some_and(|other| &other == window))
        {
            let entry = stack.remove(index);
            stack.insert(0, entry);
        }
        drop(stack);
        window.node.set_dirty();
        if let Some(column) = window.column() {
            column.node.set_dirty();
        }
    }

    fn set_raw_workspace_focus(&self, workspace: &Rc<Workspace>) {
        let mut stack = self.active_workspace_stack.borrow_mut();
        if let Some(index) = stack.iter().position(|entry| {
            entry
                .workspace
                .upgrade()
                .is_some_and(|other| &other == workspace)
        }) {
            let entry = stack.remove(index);
            stack.insert(0, entry);
        }
    }

    /// Most recent workspace in the stack shown on `output`. A workspace with no columns has
    /// no output of its own and counts as shown there while it is the active workspace.
    pub fn active_workspace_for_output(
        &self,
        output: &Rc<crate::tree::Output>,
    ) -> Option<Rc<Workspace>> {
        let root_active = self.root().get_active_workspace();
        self.workspaces_in_focus_order().into_iter().find(|workspace| {
            match workspace.get_active_output() {
                Some(active) => &active == output,
                None => root_active.as_ref().is_some_and(|active| active == workspace),
            }
        })
    }

    // }}}

    // {{{ Layers and exclusivity

    pub fn focused_layer(&self) -> Option<Rc<LayerSurface>> {
        self.focused_layer.borrow().clone()
    }

    pub fn exclusive_client(&self) -> Option<ClientId> {
        self.exclusive_client.get()
    }

    // }}}

    // {{{ Seatop slot

    pub(crate) fn take_seatop(&self) -> Option<Box<dyn SeatOp>> {
        self.seatop.borrow_mut().take()
    }

    pub(crate) fn put_seatop(&self, op: Box<dyn SeatOp>) {
        *self.seatop.borrow_mut() = Some(op);
    }

    pub(crate) fn seatop_installed(&self) -> bool {
        self.seatop.borrow().is_some()
    }

    pub fn seatop_allows_set_cursor(&self) -> bool {
        self.seatop
            .borrow()
            .as_ref()
            .is_some_and(|op| op.allows_set_cursor())
    }

    // }}}

    // {{{ Idle

    pub fn set_idle_inhibit_sources(&self, sources: IdleSource) {
        self.idle_inhibit_sources.set(sources);
    }

    pub fn idle_inhibit_sources(&self) -> IdleSource {
        self.idle_inhibit_sources.get()
    }

    pub fn set_idle_wake_sources(&self, sources: IdleSource) {
        self.idle_wake_sources.set(sources);
    }

    pub fn idle_wake_sources(&self) -> IdleSource {
        self.idle_wake_sources.get()
    }

    /// Whether activity of this kind holds back idle notifications.
    pub fn idle_activity_inhibits(&self, source: IdleSource) -> bool {
        self.idle_inhibit_sources.get().contains(source)
    }

    /// Record activity of the given kind, unless masked out for this seat.
    pub fn idle_notify_activity(&self, source: IdleSource) {
        if self.idle_wake_sources.get().contains(source) {
            self.last_activity.set(crate::utils::get_monotonic_time());
        }
    }

    pub fn last_activity(&self) -> Duration {
        self.last_activity.get()
    }

    // }}}
}

impl Server {
    /// Whether `window`'s client may receive input right now.
    pub fn seat_input_allowed(&self, seat: &Rc<Seat>, window: &Rc<Window>) -> bool {
        let Some(surface) = window.surface() else {
            return false;
        };
        if self.is_locked() {
            return self.lock_surface_ids().contains(&surface.id());
        }
        match seat.exclusive_client() {
            Some(client) => surface.client() == client,
            None => true,
        }
    }

    /// Set focus to a particular window. `None` clears the window focus but leaves the current
    /// workspace unchanged.
    pub fn seat_set_focus_window(&mut self, seat: &Rc<Seat>, new_window: Option<Rc<Window>>) {
        let new_workspace = new_window
            .as_ref()
            .and_then(|window| window.workspace())
            .or_else(|| seat.focused_workspace());
        self.seat_set_focus_internal(seat, new_workspace, new_window);
    }

    /// Set focus to the active window on a workspace, or to the workspace itself if empty.
    pub fn seat_set_focus_workspace(&mut self, seat: &Rc<Seat>, workspace: &Rc<Workspace>) {
        let window = workspace.get_active_window();
        self.seat_set_focus_internal(seat, Some(Rc::clone(workspace)), window);
    }

    pub fn seat_clear_focus(&mut self, seat: &Rc<Seat>) {
        self.seat_set_focus_window(seat, None);
    }

    fn seat_set_focus_internal(
        &mut self,
        seat: &Rc<Seat>,
        new_workspace: Option<Rc<Workspace>>,
        new_window: Option<Rc<Window>>,
    ) {
        let Some(new_workspace) = new_workspace else {
            // No workspace exists yet; nothing can take focus.
            return;
        };
        debug_assert!(
            new_window
                .as_ref()
                .and_then(|window| window.workspace())
                .is_none_or(|workspace| workspace == new_workspace),
            "window workspace does not match expected"
        );

        // While a layer surface owns the keyboard, update internal focus underneath it, then
        // give the keyboard back.
        if let Some(layer) = seat.focused_layer() {
            self.seat_set_focus_layer(seat, None);
            self.seat_set_focus_internal(seat, Some(new_workspace), new_window);
            self.seat_set_focus_layer(seat, Some(layer));
            return;
        }

        let last_window = seat.focused_window();
        let last_workspace = seat.focused_workspace();

        // Deny focusing a window hidden by a fullscreen window.
        if let Some(window) = &new_window {
            if window.obstructing_fullscreen_window().is_some() {
                return;
            }
            // Deny focus when an input grab or lockscreen is active.
            if !self.seat_input_allowed(seat, window) {
                return;
            }
        }

        let new_output = new_workspace
            .get_active_output()
            .or_else(|| self.root.active_output());
        let new_output_last_workspace = new_output
            .as_ref()
            .and_then(|output| seat.active_workspace_for_output(output));

        let workspace_changed = last_workspace
            .as_ref()
            .is_none_or(|last| last != &new_workspace);

        if workspace_changed {
            seat.set_raw_workspace_focus(&new_workspace);
            self.root.set_active_workspace(Some(&new_workspace));

            // Sticky floaters follow the active workspace across outputs.
            if let Some(previous) = &new_output_last_workspace {
                if *previous != new_workspace {
                    let floating = previous.pending.borrow().floating.clone();
                    for floater in floating {
                        if floater.is_sticky() {
                            floater.detach();
                            new_workspace.add_floating(&floater);
                        }
                    }
                }
            }

            if let Some(last) = &last_workspace {
                last.node.set_dirty();
                if let Some(output) = last.get_active_output() {
                    output.node.set_dirty();
                }
            }
            new_workspace.node.set_dirty();
            if let Some(output) = new_workspace.get_active_output() {
                output.node.set_dirty();
            }
        }

        let window_changed = new_window != last_window;

        if let Some(last) = &last_window {
            if window_changed {
                // The old window loses activation before the new one gains it.
                last.view().set_activated(false);
                last.view().close_popups();
                last.node.set_dirty();
                if let Some(column) = last.column() {
                    column.node.set_dirty();
                }
            }
        }

        if let Some(window) = &new_window {
            if window_changed {
                seat.set_raw_focus(window);
                if let Some(workspace) = window.workspace() {
                    workspace.set_active_window(window);
                }

                // Keyboard enter re-uses the held keycodes so interactive grabs survive the
                // switch.
                if let Some(surface) = window.surface() {
                    seat.keyboard.notify_enter(&surface);
                }
                window.view().set_activated(true);

                // A newly focused urgent window clears its urgency now, or after a grace
                // period when it changed workspaces.
                if window.view().is_urgent() && window.view().urgent_timer.borrow().is_none() {
                    let urgent_timeout = self.config.borrow().general.urgent_timeout_ms;
                    let crossed_workspace = last_workspace
                        .as_ref()
                        .is_some_and(|last| *last != new_workspace);
                    if crossed_workspace && urgent_timeout > 0 {
                        self.arm_urgent_timer(window, Duration::from_millis(u64::from(urgent_timeout)));
                    } else {
                        self.view_set_urgent(window, false);
                    }
                }

                window.node.set_dirty();
                if let Some(column) = window.column() {
                    column.node.set_dirty();
                }
            }
        }

        if window_changed {
            self.root.queue_ipc_event(IpcEvent::Window {
                change: WindowChange::Focus,
                window: new_window.clone(),
            });
        }
        if workspace_changed {
            self.root.queue_ipc_event(IpcEvent::workspace(
                WorkspaceChange::Focus,
                Some(&new_workspace),
                last_workspace.as_ref(),
            ));
        }

        seat.has_focus.set(new_window.is_some());

        // Workspaces left behind disappear once empty.
        if let Some(previous) = &new_output_last_workspace {
            if *previous != new_workspace {
                previous.consider_destroy();
            }
        }
        if let Some(last) = &last_workspace {
            if Some(last) != new_output_last_workspace.as_ref() && *last != new_workspace {
                last.consider_destroy();
            }
        }

        // Smart gaps may change when focus changes.
        if self.config.borrow().gaps.smart != hayward_config::SmartGaps::Off {
            arrange::arrange_workspace(&new_workspace);
        }
    }

    /// Give or take the keyboard from a layer surface. Internal window focus is kept while a
    /// layer holds the keyboard and restored when it lets go.
    pub fn seat_set_focus_layer(&mut self, seat: &Rc<Seat>, layer: Option<Rc<LayerSurface>>) {
        match layer {
            None => {
                if seat.focused_layer.borrow_mut().take().is_none() {
                    return;
                }
                let previous = seat.focused_window_unchecked();
                // Re-focus the window that held internal focus.
                self.seat_set_focus_window(seat, None);
                if let Some(previous) = previous {
                    self.seat_set_focus_window(seat, Some(previous));
                }
            }
            Some(layer) => {
                if seat
                    .focused_layer()
                    .is_some_and(|focused| focused == layer)
                {
                    return;
                }
                debug_assert!(layer.mapped());
                if seat.has_focus.get() {
                    if let Some(window) = seat.focused_window() {
                        window.view().set_activated(false);
                    }
                    seat.has_focus.set(false);
                }
                seat.keyboard.notify_enter(layer.surface());
                if layer.layer() >= Layer::Top {
                    *seat.focused_layer.borrow_mut() = Some(layer);
                }
            }
        }
    }

    /// Restrict input delivery to one client, or lift the restriction.
    pub fn seat_set_exclusive_client(&mut self, seat: &Rc<Seat>, client: Option<ClientId>) {
        if let (Some(client), Some(layer)) = (client, seat.focused_layer()) {
            if layer.surface().client() != client {
                self.seat_set_focus_layer(seat, None);
            }
        }
        seat.exclusive_client.set(client);
        if let Some(client) = client {
            if let Some(focused) = seat.focused_window() {
                if focused
                    .surface()
                    .is_none_or(|surface| surface.client() != client)
                {
                    self.seat_clear_focus(seat);
                }
            }
        }
    }

    /// Choose the next focus after `destroyed` goes away, ranging over the seat's MRU stack.
    pub fn focus_replacement(
        &self,
        seat: &Rc<Seat>,
        destroyed: &Rc<Window>,
        was_fullscreen: bool,
        was_floating: bool,
    ) -> Option<Rc<Window>> {
        let stack: Vec<Rc<Window>> = seat
            .windows_in_focus_order()
            .into_iter()
            .filter(|window| window != destroyed && window.workspace().is_some())
            .collect();
        let on_visible_workspace =
            |window: &Rc<Window>| window.workspace().is_some_and(|workspace| workspace.is_visible());

        if was_fullscreen {
            return stack.iter().find(|window| on_visible_workspace(window)).cloned();
        }

        if was_floating {
            if let Some(window) = stack
                .iter()
                .find(|window| window.is_floating() && on_visible_workspace(window))
            {
                return Some(Rc::clone(window));
            }
            return stack
                .iter()
                .find(|window| {
                    !window.is_floating() && !window.is_fullscreen() && on_visible_workspace(window)
                })
                .cloned();
        }

        // Tiling: same column first.
        let column = destroyed.column();
        if let Some(column) = column {
            if let Some(window) = stack.iter().find(|window| {
                window
                    .column()
                    .is_some_and(|other| other == column)
            }) {
                return Some(Rc::clone(window));
            }
        }
        // Then the same workspace, neither floating nor fullscreen.
        let workspace = destroyed.workspace();
        if let Some(workspace) = workspace {
            if let Some(window) = stack.iter().find(|window| {
                window
                    .workspace()
                    .is_some_and(|other| other == workspace)
                    && !window.is_floating()
                    && !window.is_fullscreen()
            }) {
                return Some(Rc::clone(window));
            }
        }
        // Finally anything tiled on a visible workspace.
        stack
            .iter()
            .find(|window| {
                !window.is_floating() && !window.is_fullscreen() && on_visible_workspace(window)
            })
            .cloned()
    }

    pub(crate) fn arm_urgent_timer(&mut self, window: &Rc<Window>, timeout: Duration) {
        let weak = Rc::downgrade(window);
        let timer = Timer::from_duration(timeout);
        let token = self
            .loop_handle
            .insert_source(timer, move |_, _, state: &mut State| {
                if let Some(window) = weak.upgrade() {
                    *window.view().urgent_timer.borrow_mut() = None;
                    state.server.view_set_urgent(&window, false);
                    state.server.flush();
                }
                TimeoutAction::Drop
            });
        match token {
            Ok(token) => {
                *window.view().urgent_timer.borrow_mut() = Some(token);
            }
            Err(err) => {
                error!(?err, "Unable to create urgency timer");
                self.view_set_urgent(window, false);
            }
        }
    }

    /// Flip a view's urgency flag, with the matching IPC event and workspace bookkeeping.
    pub fn view_set_urgent(&mut self, window: &Rc<Window>, urgent: bool) {
        let seat = self.input.current_seat();
        if window.view().is_urgent() == urgent {
            return;
        }
        if urgent && seat.focused_window().is_some_and(|focused| &focused == window) {
            return;
        }
        window.view().set_urgent_flag(urgent);
        if !urgent {
            if let Some(token) = window.view().urgent_timer.borrow_mut().take() {
                self.loop_handle.remove(token);
            }
        }
        window.damage_whole();
        self.root
            .queue_ipc_event(IpcEvent::window(WindowChange::Urgent, window));
        if let Some(workspace) = window.workspace() {
            workspace.detect_urgent();
        }
    }
}
