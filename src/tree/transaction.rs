//! The transaction engine: the only mechanism that promotes pending tree state to current.
//!
//! A commit snapshots every dirty node into per-node instructions, asks views whose content
//! rectangle changed to resize, then waits until every acknowledgment arrived or a timer
//! expired before applying all instructions atomically. While a transaction is in flight the
//! presenter keeps drawing saved buffers, so clients never show half-applied layouts.
//!
//! At most two transactions exist at any moment: the queued one (committing or waiting) and
//! the pending one accumulating follow-up changes. Repeated commits while the queued
//! transaction waits coalesce into the single pending transaction.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use hayward_config::Config;

use crate::shell::Serial;
use crate::tree::column::ColumnState;
use crate::tree::node::{DirtyNodes, TreeNode};
use crate::tree::output::OutputState;
use crate::tree::root::RootState;
use crate::tree::view::ViewKind;
use crate::tree::window::{Window, WindowState};
use crate::tree::workspace::WorkspaceState;
use crate::utils::get_monotonic_time;

/// Snapshot of one node's pending state, held until the transaction applies.
#[derive(Debug)]
enum InstructionState {
    Root(RootState),
    Output(OutputState),
    Workspace(WorkspaceState),
    Column(ColumnState),
    Window(WindowState),
}

/// One record per dirty node per transaction.
#[derive(Debug)]
struct Instruction {
    node: TreeNode,
    state: InstructionState,
    serial: Option<Serial>,
    /// True when the change originated server-side rather than from the client. Only such
    /// changes produce configure requests.
    server_request: bool,
    waiting: bool,
}

impl Instruction {
    fn copy_state(&mut self) {
        self.state = snapshot_state(&self.node);
    }
}

fn snapshot_state(node: &TreeNode) -> InstructionState {
    // Child lists are cloned, not shared: the instruction must stay untouched by later pending
    // mutations.
    match node {
        TreeNode::Root(root) => InstructionState::Root(root.pending.borrow().clone()),
        TreeNode::Output(output) => InstructionState::Output(output.pending.borrow().clone()),
        TreeNode::Workspace(workspace) => {
            InstructionState::Workspace(workspace.pending.borrow().clone())
        }
        TreeNode::Column(column) => InstructionState::Column(column.pending.borrow().clone()),
        TreeNode::Window(window) => InstructionState::Window(window.pending.borrow().clone()),
    }
}

#[derive(Debug)]
struct Transaction {
    id: u64,
    instructions: Vec<Instruction>,
    num_waiting: usize,
    num_configures: usize,
    commit_time: Duration,
}

impl Transaction {
    fn new(id: u64) -> Self {
        Self {
            id,
            instructions: Vec::new(),
            num_waiting: 0,
            num_configures: 0,
            commit_time: Duration::ZERO,
        }
    }

    fn add_node(&mut self, node: TreeNode, server_request: bool) {
        // Check if we have an instruction for this node already, in which case we update that
        // instead of creating a new one.
        let existing = if node.node().ntxnrefs() > 0 {
            self.instructions
                .iter_mut()
                .find(|instruction| instruction.node.id() == node.id())
        } else {
            None
        };

        match existing {
            Some(instruction) => {
                if server_request {
                    instruction.server_request = true;
                }
                instruction.copy_state();
            }
            None => {
                node.node().txn_ref();
                let state = snapshot_state(&node);
                self.instructions.push(Instruction {
                    node,
                    state,
                    serial: None,
                    server_request,
                    waiting: false,
                });
            }
        }
    }
}

/// Owns the dirty-node queue and the two-deep transaction pipeline.
#[derive(Debug)]
pub struct TransactionManager {
    dirty_nodes: DirtyNodes,
    config: Rc<RefCell<Config>>,
    pending: Option<Transaction>,
    queued: Option<Transaction>,
    next_id: u64,
    /// Bumped on every apply; the input layer rebases cursors when it changes.
    applies: u64,
}

impl TransactionManager {
    pub fn new(dirty_nodes: DirtyNodes, config: Rc<RefCell<Config>>) -> Self {
        Self {
            dirty_nodes,
            config,
            pending: None,
            queued: None,
            next_id: 1,
            applies: 0,
        }
    }

    /// Commit every dirty node into the pending transaction; the change is attributed to the
    /// server, so views whose content rectangle changed will be asked to resize.
    pub fn commit_dirty(&mut self) {
        self.commit_dirty_inner(true);
    }

    /// Like [`Self::commit_dirty`] for changes initiated by a client, which already knows its
    /// new size and must not be configured again.
    pub fn commit_dirty_client(&mut self) {
        self.commit_dirty_inner(false);
    }

    fn commit_dirty_inner(&mut self, server_request: bool) {
        if self.dirty_nodes.borrow().is_empty() {
            return;
        }

        let pending = self.pending.get_or_insert_with(|| {
            let id = self.next_id;
            self.next_id += 1;
            Transaction::new(id)
        });

        let nodes = std::mem::take(&mut *self.dirty_nodes.borrow_mut());
        for node in nodes {
            pending.add_node(node.clone(), server_request);
            node.node().clear_dirty();
        }

        self.commit_pending();
    }

    /// Promote the pending transaction to queued, unless one is already in flight.
    fn commit_pending(&mut self) {
        if self.queued.is_some() {
            return;
        }
        let Some(transaction) = self.pending.take() else {
            return;
        };
        self.queued = Some(transaction);
        self.commit();
        self.progress();
    }

    /// Send configures for every instruction that needs one and count the acknowledgments we
    /// will wait for.
    fn commit(&mut self) {
        let debug = self.config.borrow().debug;
        let transaction = self.queued.as_mut().expect("commit without a transaction");
        trace!(
            transaction = transaction.id,
            instructions = transaction.instructions.len(),
            "Committing transaction"
        );
        transaction.num_waiting = 0;

        for instruction in &mut transaction.instructions {
            let Some(window) = instruction.node.as_window().cloned() else {
                continue;
            };
            let destroying = window.node.is_destroying();
            let hidden = !destroying && !window.is_visible();

            if should_configure(&window, instruction) {
                if let InstructionState::Window(state) = &instruction.state {
                    instruction.serial = Some(window.view().configure(
                        state.content.x,
                        state.content.y,
                        state.content.width,
                        state.content.height,
                    ));
                }
                if !hidden {
                    instruction.waiting = true;
                    transaction.num_waiting += 1;
                }

                // From here on the presenter shows a saved buffer of the view, so a frame-done
                // event makes the client redraw as soon as possible.
                window.view().send_frame_done();
            }

            if !hidden && !window.view().has_saved_buffers() {
                window
                    .view()
                    .save_buffer(window.surface_x.get(), window.surface_y.get());
            }
        }

        transaction.num_configures = transaction.num_waiting;
        if debug.txn_timings {
            transaction.commit_time = get_monotonic_time();
        }
        if debug.noatomic {
            transaction.num_waiting = 0;
        } else if debug.txn_wait {
            // Force the transaction to time out even if all views are ready, by inflating the
            // waiting counter.
            transaction.num_waiting += 1_000_000;
        }
    }

    /// Apply the queued transaction once nothing is waiting, then chain the follow-up.
    fn progress(&mut self) {
        loop {
            match &self.queued {
                Some(transaction) if transaction.num_waiting == 0 => {}
                _ => return,
            }

            let transaction = self.queued.take().expect("checked above");
            self.apply(&transaction);
            self.destroy_transaction(transaction);

            if self.pending.is_none() {
                return;
            }
            let transaction = self.pending.take().expect("checked above");
            self.queued = Some(transaction);
            self.commit();
            // Loop: the follow-up may already be ready (every view hidden or unchanged).
        }
    }

    /// Apply every instruction to its node's current state.
    fn apply(&mut self, transaction: &Transaction) {
        let debug = self.config.borrow().debug;
        trace!(transaction = transaction.id, "Applying transaction");
        if debug.txn_timings {
            let elapsed = get_monotonic_time() - transaction.commit_time;
            let ms = elapsed.as_secs_f64() * 1000.0;
            debug!(
                transaction = transaction.id,
                "Transaction: {ms:.1}ms waiting ({:.1} frames if 60Hz)",
                ms / (1000.0 / 60.0)
            );
        }

        for instruction in &transaction.instructions {
            match (&instruction.node, &instruction.state) {
                (TreeNode::Root(root), InstructionState::Root(state)) => {
                    if let Some(workspace) = &root.current.borrow().active_workspace {
                        workspace.damage_whole();
                    }
                    *root.current.borrow_mut() = state.clone();
                    if let Some(workspace) = &root.current.borrow().active_workspace {
                        workspace.damage_whole();
                    }
                }
                (TreeNode::Output(output), InstructionState::Output(state)) => {
                    output.damage_whole();
                    *output.current.borrow_mut() = state.clone();
                    output.damage_whole();
                }
                (TreeNode::Workspace(workspace), InstructionState::Workspace(state)) => {
                    workspace.damage_whole();
                    *workspace.current.borrow_mut() = state.clone();
                    workspace.damage_whole();
                }
                (TreeNode::Column(column), InstructionState::Column(state)) => {
                    *column.current.borrow_mut() = state.clone();
                }
                (TreeNode::Window(window), InstructionState::Window(state)) => {
                    apply_window_state(window, state);
                }
                _ => unreachable!("instruction state does not match its node"),
            }
        }

        self.applies += 1;
    }

    /// Release the instructions. Nodes whose destruction was deferred on transaction
    /// references are freed here, nowhere else.
    fn destroy_transaction(&mut self, transaction: Transaction) {
        for instruction in transaction.instructions {
            let node = instruction.node;
            let refs = node.node().txn_unref();
            if node.node().is_destroying() && refs == 0 {
                match &node {
                    TreeNode::Root(_) => unreachable!("the root is never destroyed"),
                    TreeNode::Output(output) => output.destroy(),
                    TreeNode::Workspace(workspace) => workspace.destroy(),
                    TreeNode::Column(column) => column.destroy(),
                    TreeNode::Window(window) => window.destroy(),
                }
            }
        }
    }

    /// A view acknowledged the configure with `serial`.
    pub fn notify_ready_by_serial(&mut self, window: &Rc<Window>, serial: Serial) {
        let Some(transaction) = self.queued.as_mut() else {
            return;
        };
        let instruction = transaction.instructions.iter_mut().find(|instruction| {
            instruction.node.id() == window.node.id() && instruction.serial == Some(serial)
        });
        let Some(instruction) = instruction else {
            return;
        };
        if set_instruction_ready(instruction, &mut transaction.num_waiting) {
            self.log_ready(window);
            self.progress();
        }
    }

    /// A view committed a buffer whose geometry matches what the queued transaction asked of
    /// it. Used by clients that do not echo serials.
    pub fn notify_ready_by_geometry(
        &mut self,
        window: &Rc<Window>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) {
        let Some(transaction) = self.queued.as_mut() else {
            return;
        };
        let instruction = transaction.instructions.iter_mut().find(|instruction| {
            if instruction.node.id() != window.node.id() {
                return false;
            }
            let InstructionState::Window(state) = &instruction.state else {
                return false;
            };
            state.content.x as i32 == x as i32
                && state.content.y as i32 == y as i32
                && state.content.width == width
                && state.content.height == height
        });
        let Some(instruction) = instruction else {
            return;
        };
        if set_instruction_ready(instruction, &mut transaction.num_waiting) {
            self.log_ready(window);
            self.progress();
        }
    }

    fn log_ready(&self, window: &Rc<Window>) {
        if !self.config.borrow().debug.txn_timings {
            return;
        }
        let Some(transaction) = self.queued.as_ref() else {
            return;
        };
        let elapsed = get_monotonic_time() - transaction.commit_time;
        debug!(
            transaction = transaction.id,
            title = ?window.title(),
            "Transaction: {}/{} ready in {:.1}ms",
            transaction.num_configures - transaction.num_waiting,
            transaction.num_configures,
            elapsed.as_secs_f64() * 1000.0,
        );
    }

    /// The per-transaction timer expired: apply with whatever state clients managed to attach.
    pub fn handle_timeout(&mut self, transaction_id: u64) {
        let Some(transaction) = self.queued.as_mut() else {
            return;
        };
        if transaction.id != transaction_id {
            return;
        }
        debug!(
            transaction = transaction.id,
            waiting = transaction.num_waiting,
            "Transaction timed out"
        );
        transaction.num_waiting = 0;
        self.progress();
    }

    /// Id of the queued transaction if it is waiting on acknowledgments. The event loop owns
    /// the actual timer and keeps it in sync with this.
    pub fn queued_waiting(&self) -> Option<u64> {
        self.queued
            .as_ref()
            .filter(|transaction| transaction.num_waiting > 0)
            .map(|transaction| transaction.id)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(
            self.config.borrow().general.transaction_timeout_ms,
        ))
    }

    /// Number of applies so far. The input layer watches this to know when to rebase cursors.
    pub fn applies(&self) -> u64 {
        self.applies
    }

    pub fn has_queued(&self) -> bool {
        self.queued.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Mark an instruction ready, returning whether the bookkeeping changed.
fn set_instruction_ready(instruction: &mut Instruction, num_waiting: &mut usize) -> bool {
    // If the transaction has timed out its waiting counter is already zero.
    if instruction.waiting && *num_waiting > 0 {
        instruction.waiting = false;
        *num_waiting -= 1;
        true
    } else {
        false
    }
}

fn should_configure(window: &Rc<Window>, instruction: &Instruction) -> bool {
    if window.node.is_destroying() {
        return false;
    }
    if !instruction.server_request {
        return false;
    }
    let InstructionState::Window(state) = &instruction.state else {
        return false;
    };
    let current = window.current.borrow();

    // Position-aware clients truncate coordinates to integers and ignore configures that look
    // identical from their point of view, which would stall the transaction.
    if window.view().kind() == ViewKind::X11
        && (current.content.x as i32 != state.content.x as i32
            || current.content.y as i32 != state.content.y as i32)
    {
        return true;
    }

    current.content.width != state.content.width || current.content.height != state.content.height
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::backend::headless::{headless_view, HeadlessClient};
    use crate::shell::ClientId;
    use crate::tree::arrange;
    use crate::tree::{Column, Output, Root, Window, Workspace};

    fn fixture() -> (Rc<Root>, TransactionManager, Rc<Workspace>, Rc<Output>) {
        let root = Root::new(hayward_config::Config::default());
        let manager = TransactionManager::new(root.dirty_nodes(), root.config());
        let output = root.add_output("headless-0", 1920.0, 1080.0);
        let workspace = Workspace::new(&root, "1");
        (root, manager, workspace, output)
    }

    fn tile_window(
        root: &Rc<Root>,
        workspace: &Rc<Workspace>,
        output: &Rc<Output>,
    ) -> (Rc<Window>, Rc<HeadlessClient>) {
        let (view, client, _surface) = headless_view(ClientId(0));
        let window = Window::new(root, view);
        let column = match workspace.preferred_column_on_output(Some(output)) {
            Some(column) => column,
            None => {
                let column = Column::new(root);
                workspace.insert_tiling(output, &column, 0);
                column
            }
        };
        column.add_child(&window);
        arrange::arrange_workspace(workspace);
        (window, client)
    }

    fn ack(manager: &mut TransactionManager, window: &Rc<Window>, client: &HeadlessClient) {
        for configure in client.configures() {
            manager.notify_ready_by_serial(window, configure.serial);
        }
    }

    #[test]
    fn commit_configures_and_waits_for_ack() {
        let (root, mut manager, workspace, output) = fixture();
        let (window, client) = tile_window(&root, &workspace, &output);

        manager.commit_dirty();

        let configure = client.last_configure().expect("view was configured");
        assert_eq!(configure.rect, window.pending.borrow().content);
        assert!(manager.queued_waiting().is_some());
        // A frame-done was sent so the client repaints promptly.
        assert_eq!(window.surface().unwrap().frame_done_count(), 1);
        // The old content keeps showing from the saved buffer.
        assert!(window.view().has_saved_buffers());
        assert_eq!(window.view().saved_buffers().len(), 1);
        assert_eq!(window.current.borrow().content.width, 0.0);

        manager.notify_ready_by_serial(&window, configure.serial);

        assert!(manager.queued_waiting().is_none());
        assert!(!manager.has_queued());
        assert_eq!(window.current.borrow().content, configure.rect);
        assert!(!window.view().has_saved_buffers());
        // The apply pass damaged the output.
        assert!(output.damage_counter() > 0);
    }

    #[test]
    fn ready_by_geometry_matches_truncated_position() {
        let (root, mut manager, workspace, output) = fixture();
        let (window, _client) = tile_window(&root, &workspace, &output);

        manager.commit_dirty();
        let content = window.pending.borrow().content;
        // Sub-pixel offsets are invisible to position-aware clients.
        manager.notify_ready_by_geometry(
            &window,
            content.x + 0.4,
            content.y + 0.4,
            content.width,
            content.height,
        );

        assert!(!manager.has_queued());
        assert_eq!(window.current.borrow().content, content);
    }

    #[test]
    fn timeout_applies_with_stale_buffers() {
        let (root, mut manager, workspace, output) = fixture();
        let (window, client) = tile_window(&root, &workspace, &output);

        manager.commit_dirty();
        let id = manager.queued_waiting().expect("transaction waits");
        assert!(window.view().has_saved_buffers());

        manager.handle_timeout(id);

        // Promoted anyway; the saved buffer is released and the pipeline is free again.
        assert!(!manager.has_queued());
        assert_eq!(
            window.current.borrow().content,
            client.last_configure().unwrap().rect
        );
        assert!(!window.view().has_saved_buffers());

        // The next commit proceeds normally.
        window.node.set_dirty();
        manager.commit_dirty();
        assert!(!manager.has_queued());
    }

    #[test]
    fn commits_coalesce_into_one_follow_up() {
        let (root, mut manager, workspace, output) = fixture();
        let (window, client) = tile_window(&root, &workspace, &output);
        let (other, other_client) = tile_window(&root, &workspace, &output);

        manager.commit_dirty();
        assert!(manager.has_queued());

        // Keep mutating while the first transaction waits: everything lands in one follow-up.
        for fraction in [0.3, 0.4, 0.5] {
            window.height_fraction.set(fraction);
            other.height_fraction.set(1.0 - fraction);
            arrange::arrange_workspace(&workspace);
            manager.commit_dirty();
        }
        assert!(manager.has_queued());
        assert!(manager.has_pending());

        ack(&mut manager, &window, &client);
        ack(&mut manager, &other, &other_client);
        // First apply chains the follow-up, which reconfigures the views again.
        ack(&mut manager, &window, &client);
        ack(&mut manager, &other, &other_client);

        assert!(!manager.has_queued());
        assert!(!manager.has_pending());
        assert_eq!(manager.applies(), 2);
    }

    #[test]
    fn destroyed_nodes_are_freed_by_the_last_transaction() {
        let (root, mut manager, workspace, output) = fixture();
        let (window, client) = tile_window(&root, &workspace, &output);

        manager.commit_dirty();
        ack(&mut manager, &window, &client);

        window.begin_destroy();
        assert!(window.node.is_destroying());

        let weak = Rc::downgrade(&window);
        drop(window);
        // Still alive: the destroy transaction holds the last reference.
        let window = weak.upgrade().expect("kept alive by the dirty queue");

        manager.commit_dirty();
        assert!(!manager.has_queued());
        assert_eq!(window.node.ntxnrefs(), 0);

        drop(window);
        assert!(weak.upgrade().is_none(), "no reference survives the apply");
    }

    #[test]
    fn noatomic_skips_waiting() {
        let (root, mut manager, workspace, output) = fixture();
        root.config().borrow_mut().debug.noatomic = true;
        let (window, client) = tile_window(&root, &workspace, &output);

        manager.commit_dirty();

        assert!(client.last_configure().is_some());
        assert!(!manager.has_queued());
        assert_eq!(
            window.current.borrow().content,
            window.pending.borrow().content
        );
    }

    #[test]
    fn txn_wait_forces_the_timeout() {
        let (root, mut manager, workspace, output) = fixture();
        root.config().borrow_mut().debug.txn_wait = true;
        let (window, client) = tile_window(&root, &workspace, &output);

        manager.commit_dirty();
        ack(&mut manager, &window, &client);
        // Every view acked and the transaction still waits for its timer.
        let id = manager.queued_waiting().expect("forced to wait");

        manager.handle_timeout(id);
        assert!(!manager.has_queued());
    }

    #[test]
    fn client_initiated_commits_do_not_reconfigure() {
        let (root, mut manager, workspace, output) = fixture();
        let (window, client) = tile_window(&root, &workspace, &output);

        manager.commit_dirty_client();

        assert!(client.configures().is_empty());
        assert!(!manager.has_queued());
        assert_eq!(
            window.current.borrow().content,
            window.pending.borrow().content
        );
    }
}

fn apply_window_state(window: &Rc<Window>, state: &WindowState) {
    let view = window.view();

    // Damage the old location.
    window.damage_whole();

    *window.current.borrow_mut() = state.clone();

    if view.has_saved_buffers() {
        let destroying = window.node.is_destroying();
        if !destroying || window.node.ntxnrefs() == 1 {
            view.remove_saved_buffers();
        }
    }

    // If the view hasn't responded to the configure, center it within the window. Important
    // for fullscreen views which refuse to resize to the size of the output.
    if window.surface().is_some() {
        window.center_surface();
    }

    // Damage the new location.
    window.damage_whole();

    if !window.node.is_destroying() {
        window.discover_outputs();
    }
}
