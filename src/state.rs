use std::collections::HashMap;
use std::rc::Rc;

use calloop::timer::{TimeoutAction, Timer};
use calloop::{LoopHandle, LoopSignal, RegistrationToken};
use hayward_config::Config;
use hayward_ipc::WindowChange;

use crate::backend::Backend;
use crate::input::constraints::PointerConstraint;
use crate::input::InputManager;
use crate::shell::{Serial, Surface};
use crate::tree::arrange;
use crate::tree::root::IpcEvent;
use crate::tree::{Column, Output, Root, TransactionManager, View, Window, Workspace};

pub struct State {
    pub backend: Backend,
    pub server: Server,
}

impl State {
    pub fn new(
        loop_handle: LoopHandle<'static, State>,
        loop_signal: LoopSignal,
        config: Config,
        ipc: Option<crate::ipc::IpcServer>,
    ) -> Self {
        let mut server = Server::new(loop_handle, loop_signal, config, ipc);
        let backend = Backend::new_headless(&mut server);
        server.finish_init();
        Self { backend, server }
    }

    /// Work run between event-loop dispatches: commit accumulated tree changes and flush IPC.
    pub fn dispatch(&mut self) {
        self.server.flush();
    }
}

/// Session lock state. While locked, only lock surfaces receive input.
#[derive(Debug, Default)]
pub struct LockState {
    locked: bool,
    /// Lock surface per output, keyed by output node id.
    surfaces: HashMap<u64, Rc<Surface>>,
}

/// The compositor context handle threaded through every subsystem. At most one exists per
/// process, since backend sockets are singletons.
pub struct Server {
    pub root: Rc<Root>,
    pub config: Rc<std::cell::RefCell<Config>>,
    pub transactions: TransactionManager,
    pub input: InputManager,
    pub ipc: Option<crate::ipc::IpcServer>,
    pub loop_handle: LoopHandle<'static, State>,
    pub loop_signal: LoopSignal,
    pub stop: bool,
    pub lock: LockState,
    pub(crate) pointer_constraints: Vec<Rc<PointerConstraint>>,
    txn_timer: Option<(RegistrationToken, u64)>,
    last_applies: u64,
}

impl Server {
    pub fn new(
        loop_handle: LoopHandle<'static, State>,
        loop_signal: LoopSignal,
        config: Config,
        ipc: Option<crate::ipc::IpcServer>,
    ) -> Self {
        let root = Root::new(config);
        let config = root.config();
        let transactions = TransactionManager::new(root.dirty_nodes(), Rc::clone(&config));
        let input = InputManager::new(&root);

        let workspace_names = config.borrow().workspaces.names.clone();
        for name in workspace_names {
            Workspace::new(&root, name);
        }

        Self {
            root,
            config,
            transactions,
            input,
            ipc,
            loop_handle,
            loop_signal,
            stop: false,
            lock: LockState::default(),
            pointer_constraints: Vec::new(),
            txn_timer: None,
            last_applies: 0,
        }
    }

    /// Runs once the backend created its outputs: arrange everything and seed focus.
    pub fn finish_init(&mut self) {
        arrange::arrange_root(&self.root);
        let seat = self.input.current_seat();
        if let Some(workspace) = self.root.get_active_workspace() {
            self.seat_set_focus_workspace(&seat, &workspace);
        }
        if let Some(output) = self.root.active_output() {
            let rect = output.rect();
            let (cx, cy) = rect.center();
            seat.cursor.warp(cx, cy);
        }
        self.transaction_commit_dirty();
    }

    // {{{ Outputs

    pub fn add_output(&mut self, name: &str, width: f64, height: f64) -> Rc<Output> {
        let output = self.root.add_output(name, width, height);
        arrange::arrange_root(&self.root);
        output
    }

    pub fn remove_output(&mut self, output: &Rc<Output>) {
        self.root.remove_output(output);
        arrange::arrange_root(&self.root);
        self.transaction_commit_dirty();
    }

    // }}}

    // {{{ Transactions

    pub fn transaction_commit_dirty(&mut self) {
        self.transactions.commit_dirty();
        self.after_transaction();
    }

    pub fn transaction_commit_dirty_client(&mut self) {
        self.transactions.commit_dirty_client();
        self.after_transaction();
    }

    pub fn transaction_notify_ready_by_serial(&mut self, window: &Rc<Window>, serial: Serial) {
        self.transactions.notify_ready_by_serial(window, serial);
        self.after_transaction();
    }

    pub fn transaction_notify_ready_by_geometry(
        &mut self,
        window: &Rc<Window>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) {
        self.transactions
            .notify_ready_by_geometry(window, x, y, width, height);
        self.after_transaction();
    }

    pub(crate) fn transaction_handle_timeout(&mut self, transaction_id: u64) {
        // The firing timer consumed its own token.
        self.txn_timer = None;
        self.transactions.handle_timeout(transaction_id);
        self.after_transaction();
    }

    fn after_transaction(&mut self) {
        self.sync_transaction_timer();
        if self.transactions.applies() != self.last_applies {
            self.last_applies = self.transactions.applies();
            self.cursor_rebase_all(0);
        }
    }

    /// Keep the event-loop timer in lockstep with the queued transaction.
    fn sync_transaction_timer(&mut self) {
        let waiting = self.transactions.queued_waiting();

        if let Some((token, id)) = self.txn_timer.take() {
            if waiting == Some(id) {
                self.txn_timer = Some((token, id));
                return;
            }
            self.loop_handle.remove(token);
        }

        let Some(id) = waiting else {
            return;
        };
        let timer = Timer::from_duration(self.transactions.timeout());
        let inserted = self
            .loop_handle
            .insert_source(timer, move |_, _, state: &mut State| {
                state.server.transaction_handle_timeout(id);
                TimeoutAction::Drop
            });
        match inserted {
            Ok(token) => self.txn_timer = Some((token, id)),
            Err(err) => {
                // Without a timer an unresponsive client would stall the pipeline forever;
                // stop waiting instead. Some imperfect frames may be rendered.
                error!(?err, "Unable to create transaction timer");
                self.transactions.handle_timeout(id);
                self.sync_transaction_timer();
            }
        }
    }

    // }}}

    // {{{ View lifecycle

    /// A client surface became ready to be shown: build a window around it and put it in the
    /// tree.
    pub fn handle_view_map(&mut self, view: Rc<View>) -> Rc<Window> {
        let root = Rc::clone(&self.root);
        let workspace = match root.get_active_workspace() {
            Some(workspace) => workspace,
            None => Workspace::new(&root, "1"),
        };

        let window = Window::new(&root, Rc::clone(&view));

        if view.wants_floating() {
            workspace.add_floating(&window);
            window.floating_set_default_size();
            window.floating_resize_and_center();
        } else {
            let output = root.active_output();
            let column = match workspace.preferred_column_on_output(output.as_ref()) {
                Some(column) => column,
                None => {
                    let column = Column::new(&root);
                    let output = output.expect("mapping a view with no output connected");
                    let index = workspace.pending.borrow().tiling.len();
                    workspace.insert_tiling(&output, &column, index);
                    column
                }
            };
            let active = column.pending.borrow().active_child.clone();
            match active {
                Some(active) => Column::add_sibling(&active, &window, true),
                None => column.add_child(&window),
            }
        }

        root.queue_ipc_event(IpcEvent::window(WindowChange::New, &window));

        let seat = self.input.current_seat();
        if workspace.is_visible() && window.obstructing_fullscreen_window().is_none() {
            self.seat_set_focus_window(&seat, Some(Rc::clone(&window)));
        }

        arrange::arrange_workspace(&workspace);
        self.transaction_commit_dirty();
        window
    }

    /// A client surface went away. Destruction of the window is deferred until no transaction
    /// references it; focus moves on immediately.
    pub fn handle_view_unmap(&mut self, window: &Rc<Window>) {
        let seat = self.input.current_seat();
        let was_focused = seat
            .focused_window()
            .is_some_and(|focused| &focused == window);
        let was_fullscreen = window.is_fullscreen();
        let was_floating = window.is_floating();
        let workspace = window.workspace();
        let column = window.column();

        self.root
            .queue_ipc_event(IpcEvent::window(WindowChange::Close, window));
        self.end_mouse_operation(window);

        window.begin_destroy();

        if let Some(column) = column {
            if !column.node.is_destroying() {
                column.consider_destroy();
            }
        }

        if was_focused {
            let next = self.focus_replacement(&seat, window, was_fullscreen, was_floating);
            self.seat_set_focus_window(&seat, next);
        }

        if let Some(workspace) = workspace {
            if !workspace.node.is_destroying() {
                workspace.detect_urgent();
                arrange::arrange_workspace(&workspace);
            }
        }

        self.transaction_commit_dirty();
    }

    /// A client committed a buffer, possibly acknowledging a configure.
    pub fn handle_view_commit(&mut self, window: &Rc<Window>, acked_serial: Option<Serial>) {
        match acked_serial {
            Some(serial) => self.transaction_notify_ready_by_serial(window, serial),
            None => {
                // Clients that do not echo serials are matched by the geometry they committed.
                if let Some(surface) = window.surface() {
                    let (width, height) = surface.size();
                    let content = window.pending.borrow().content;
                    self.transaction_notify_ready_by_geometry(
                        window, content.x, content.y, width, height,
                    );
                }
            }
        }
    }

    /// A view's title changed.
    pub fn handle_view_title(&mut self, window: &Rc<Window>, title: Option<String>) {
        window.view().set_title(title);
        self.root
            .queue_ipc_event(IpcEvent::window(WindowChange::Title, window));
    }

    /// A client asked for attention (xdg-activation and friends).
    pub fn handle_view_request_activate(&mut self, window: &Rc<Window>) {
        let policy = self.config.borrow().general.focus_on_window_activation;
        let seat = self.input.current_seat();
        match policy {
            hayward_config::FocusOnWindowActivation::Focus => {
                self.seat_set_focus_window(&seat, Some(Rc::clone(window)));
            }
            hayward_config::FocusOnWindowActivation::Smart => {
                // Steal focus only when the window is already visible, nag otherwise.
                if window
                    .workspace()
                    .is_some_and(|workspace| workspace.is_visible())
                {
                    self.seat_set_focus_window(&seat, Some(Rc::clone(window)));
                } else {
                    self.view_set_urgent(window, true);
                }
            }
            hayward_config::FocusOnWindowActivation::Urgent => {
                self.view_set_urgent(window, true);
            }
            hayward_config::FocusOnWindowActivation::None => {}
        }
    }

    /// A floating client resized itself. The change is client-initiated, so no configure goes
    /// back out.
    pub fn handle_view_resize_request(&mut self, window: &Rc<Window>, width: f64, height: f64) {
        if !window.is_floating() {
            return;
        }
        {
            let mut pending = window.pending.borrow_mut();
            pending.content.width = width;
            pending.content.height = height;
        }
        window.set_geometry_from_content();
        self.transaction_commit_dirty_client();
    }

    // }}}

    // {{{ Window operations

    pub fn window_set_floating(&mut self, window: &Rc<Window>, enable: bool) {
        if window.is_floating() == enable {
            return;
        }
        window.set_floating(enable);
        self.end_mouse_operation(window);
        if let Some(workspace) = window.workspace() {
            arrange::arrange_workspace(&workspace);
        }
    }

    pub fn window_set_fullscreen(&mut self, window: &Rc<Window>, enable: bool) {
        if window.is_fullscreen() == enable {
            return;
        }
        window.set_fullscreen(enable);
        self.end_mouse_operation(window);
        if let Some(workspace) = window.workspace() {
            arrange::arrange_workspace(&workspace);
        }
    }

    // }}}

    // {{{ Session lock

    pub fn is_locked(&self) -> bool {
        self.lock.locked
    }

    pub fn lock_surface_ids(&self) -> Vec<u64> {
        self.lock
            .surfaces
            .values()
            .map(|surface| surface.id())
            .collect()
    }

    pub fn lock_session(&mut self) {
        if self.lock.locked {
            return;
        }
        self.lock.locked = true;
        let seat = self.input.current_seat();
        if let Some(focused) = seat.focused_window() {
            focused.view().set_activated(false);
        }
        seat.has_focus.set(false);
        seat.keyboard.clear_focus();
    }

    pub fn set_lock_surface(&mut self, output: &Rc<Output>, surface: Rc<Surface>) {
        let seat = self.input.current_seat();
        seat.keyboard.notify_enter(&surface);
        self.lock.surfaces.insert(output.node.id().get(), surface);
    }

    pub fn unlock_session(&mut self) {
        if !self.lock.locked {
            return;
        }
        self.lock.locked = false;
        self.lock.surfaces.clear();
        let seat = self.input.current_seat();
        seat.keyboard.clear_focus();
        if let Some(workspace) = self.root.get_active_workspace() {
            self.seat_set_focus_workspace(&seat, &workspace);
        }
    }

    // }}}

    /// Commit accumulated tree changes and broadcast queued IPC events.
    pub fn flush(&mut self) {
        self.transaction_commit_dirty();
        self.dispatch_ipc_events();
    }

    fn dispatch_ipc_events(&mut self) {
        let events = self.root.drain_ipc_events();
        if events.is_empty() {
            return;
        }
        let Some(ipc) = &self.ipc else {
            return;
        };
        for event in events {
            let event = crate::ipc::describe_event(&self.root, &event);
            ipc.broadcast(&event);
        }
    }
}

// vim: foldmethod=marker
