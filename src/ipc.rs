//! The IPC server.
//!
//! Listens on a Unix socket (`$XDG_RUNTIME_DIR/hayward-<pid>.sock`, exported as
//! `HAYWARDSOCK`). The protocol is line-delimited JSON using the types from [`hayward_ipc`];
//! clients that subscribe keep their connection and receive the event stream.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use calloop::generic::Generic;
use calloop::{Interest, LoopHandle, Mode, PostAction};
use hayward_ipc::{Event, Node, NodeKind, Request, Response, WorkspaceChange};

use crate::state::State;
use crate::tree::root::IpcEvent;
use crate::tree::{Column, Output, Root, Window, Workspace};
use crate::utils::Rect;

struct IpcClient {
    stream: UnixStream,
    subscribed: bool,
}

#[derive(Clone)]
pub struct IpcServer {
    socket_path: PathBuf,
    clients: Rc<RefCell<HashMap<u64, IpcClient>>>,
}

impl std::fmt::Debug for IpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcServer")
            .field("socket_path", &self.socket_path)
            .field("clients", &self.clients.borrow().len())
            .finish()
    }
}

impl IpcServer {
    /// Bind the socket and register the accept source on the event loop.
    pub fn start(loop_handle: &LoopHandle<'static, State>) -> anyhow::Result<Self> {
        let runtime_dir =
            std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| String::from("/tmp"));
        let socket_path =
            PathBuf::from(format!("{runtime_dir}/hayward-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&socket_path);

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind IPC socket at {}", socket_path.display()))?;
        listener.set_nonblocking(true)?;
        std::env::set_var(hayward_ipc::SOCKET_ENV, &socket_path);
        info!(socket_path = %socket_path.display(), "Listening for IPC connections");

        let server = Self {
            socket_path,
            clients: Rc::new(RefCell::new(HashMap::new())),
        };

        loop_handle
            .insert_source(
                Generic::new(listener, Interest::READ, Mode::Level),
                |_, listener, state: &mut State| {
                    loop {
                        match listener.accept() {
                            Ok((stream, _)) => accept_client(state, stream),
                            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                            Err(err) => {
                                warn!(?err, "Failed to accept IPC client");
                                break;
                            }
                        }
                    }
                    Ok(PostAction::Continue)
                },
            )
            .map_err(|err| anyhow::anyhow!("Failed to register the IPC listener: {err}"))?;

        Ok(server)
    }

    /// Send an event to every subscribed client, dropping clients whose connection broke.
    pub fn broadcast(&self, event: &Event) {
        let Ok(mut line) = serde_json::to_string(event) else {
            return;
        };
        line.push('\n');

        let mut dead = Vec::new();
        for (id, client) in self.clients.borrow_mut().iter_mut() {
            if !client.subscribed {
                continue;
            }
            if client.stream.write_all(line.as_bytes()).is_err() {
                dead.push(*id);
            }
        }
        if !dead.is_empty() {
            let mut clients = self.clients.borrow_mut();
            for id in dead {
                clients.remove(&id);
            }
        }
    }

    fn register(&self, id: u64, stream: UnixStream) {
        self.clients.borrow_mut().insert(
            id,
            IpcClient {
                stream,
                subscribed: false,
            },
        );
    }

    fn set_subscribed(&self, id: u64) {
        if let Some(client) = self.clients.borrow_mut().get_mut(&id) {
            client.subscribed = true;
        }
    }

    fn remove(&self, id: u64) {
        self.clients.borrow_mut().remove(&id);
    }
}

fn accept_client(state: &mut State, stream: UnixStream) {
    static CLIENT_IDS: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let id = CLIENT_IDS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    if stream.set_nonblocking(true).is_err() {
        return;
    }
    let Ok(write_half) = stream.try_clone() else {
        return;
    };
    let Some(ipc) = state.server.ipc.clone() else {
        return;
    };
    ipc.register(id, write_half);

    let mut buffer = Vec::new();
    let source = Generic::new(stream, Interest::READ, Mode::Level);
    let inserted = state.server.loop_handle.insert_source(source, move |_, stream, state| {
        let mut chunk = [0u8; 4096];
        loop {
            match unsafe { stream.get_mut() }.read(&mut chunk) {
                Ok(0) => {
                    if let Some(ipc) = state.server.ipc.clone() {
                        ipc.remove(id);
                    }
                    return Ok(PostAction::Remove);
                }
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => {
                    if let Some(ipc) = state.server.ipc.clone() {
                        ipc.remove(id);
                    }
                    return Ok(PostAction::Remove);
                }
            }
        }

        while let Some(newline) = buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline).collect();
            let response = match serde_json::from_slice::<Request>(&line) {
                Ok(request) => handle_request(state, id, &request),
                Err(err) => Response::Error(format!("invalid request: {err}")),
            };
            let mut encoded = serde_json::to_string(&response).expect("responses serialize");
            encoded.push('\n');
            if unsafe { stream.get_mut() }.write_all(encoded.as_bytes()).is_err() {
                if let Some(ipc) = state.server.ipc.clone() {
                    ipc.remove(id);
                }
                return Ok(PostAction::Remove);
            }
        }

        Ok(PostAction::Continue)
    });

    if inserted.is_err() {
        warn!("Failed to register IPC client source");
        ipc.remove(id);
    }
}

fn handle_request(state: &mut State, client_id: u64, request: &Request) -> Response {
    match request {
        Request::Version => Response::Version(String::from(env!("CARGO_PKG_VERSION"))),
        Request::GetTree => Response::Tree(describe_tree(&state.server.root)),
        Request::GetWorkspaces => {
            let root = &state.server.root;
            Response::Workspaces(
                root.workspaces()
                    .iter()
                    .map(|workspace| describe_workspace(root, workspace))
                    .collect(),
            )
        }
        Request::GetOutputs => {
            let root = &state.server.root;
            Response::Outputs(root.outputs().iter().map(|output| describe_output(root, output)).collect())
        }
        Request::Command(argv) => {
            let result = crate::commands::execute(&mut state.server, argv);
            state.server.flush();
            Response::Command(result)
        }
        Request::Subscribe => {
            if let Some(ipc) = &state.server.ipc {
                ipc.set_subscribed(client_id);
            }
            Response::Subscribed
        }
    }
}

fn ipc_rect(rect: Rect) -> hayward_ipc::Rect {
    hayward_ipc::Rect {
        x: rect.x,
        y: rect.y,
        width: rect.width,
        height: rect.height,
    }
}

pub fn describe_window(window: &Rc<Window>) -> Node {
    let pending = window.pending.borrow();
    Node {
        id: window.node.id().get(),
        kind: NodeKind::Window,
        name: window.title(),
        rect: ipc_rect(pending.rect),
        focused: pending.focused,
        urgent: window.is_urgent(),
        children: Vec::new(),
    }
}

fn describe_column(column: &Rc<Column>) -> Node {
    let pending = column.pending.borrow();
    Node {
        id: column.node.id().get(),
        kind: NodeKind::Column,
        name: None,
        rect: ipc_rect(pending.rect),
        focused: pending.focused,
        urgent: column.has_urgent_child(),
        children: pending.children.iter().map(describe_window).collect(),
    }
}

fn describe_workspace_node(workspace: &Rc<Workspace>) -> Node {
    let pending = workspace.pending.borrow();
    let mut children: Vec<Node> = pending.tiling.iter().map(describe_column).collect();
    children.extend(pending.floating.iter().map(describe_window));
    Node {
        id: workspace.node.id().get(),
        kind: NodeKind::Workspace,
        name: Some(workspace.name().to_string()),
        rect: ipc_rect(pending.rect),
        focused: pending.focused,
        urgent: workspace.is_urgent(),
        children,
    }
}

pub fn describe_tree(root: &Rc<Root>) -> Node {
    let outputs: Vec<Node> = root
        .outputs()
        .iter()
        .map(|output| Node {
            id: output.node.id().get(),
            kind: NodeKind::Output,
            name: Some(output.name().to_string()),
            rect: ipc_rect(output.rect()),
            focused: root
                .active_output()
                .is_some_and(|active| &active == output),
            urgent: false,
            children: root
                .workspaces()
                .iter()
                .filter(|workspace| {
                    workspace
                        .get_active_output()
                        .is_none_or(|workspace_output| &workspace_output == output)
                })
                .map(describe_workspace_node)
                .collect(),
        })
        .collect();

    Node {
        id: root.node.id().get(),
        kind: NodeKind::Root,
        name: Some(String::from("root")),
        rect: ipc_rect(root.layout_box()),
        focused: false,
        urgent: false,
        children: outputs,
    }
}

pub fn describe_workspace(root: &Rc<Root>, workspace: &Rc<Workspace>) -> hayward_ipc::Workspace {
    hayward_ipc::Workspace {
        id: workspace.node.id().get(),
        name: workspace.name().to_string(),
        visible: root
            .get_active_workspace()
            .is_some_and(|active| &active == workspace),
        focused: workspace.pending.borrow().focused,
        urgent: workspace.is_urgent(),
        rect: ipc_rect(workspace.get_box()),
        output: workspace
            .get_active_output()
            .map(|output| output.name().to_string()),
    }
}

pub fn describe_output(root: &Rc<Root>, output: &Rc<Output>) -> hayward_ipc::Output {
    hayward_ipc::Output {
        id: output.node.id().get(),
        name: output.name().to_string(),
        rect: ipc_rect(output.rect()),
        focused: root
            .active_output()
            .is_some_and(|active| &active == output),
    }
}

/// Translate a queued tree event into its wire form.
pub fn describe_event(root: &Rc<Root>, event: &IpcEvent) -> Event {
    match event {
        IpcEvent::Window { change, window } => Event::Window {
            change: *change,
            window: window.as_ref().map(describe_window),
        },
        IpcEvent::Workspace {
            change,
            workspace,
            old,
        } => Event::Workspace {
            change: *change,
            workspace: workspace.as_ref().map(|workspace| describe_workspace(root, workspace)),
            old: old.as_ref().map(|workspace| describe_workspace(root, workspace)),
        },
    }
}

/// Emitting helper used by command handlers.
pub fn workspace_event(root: &Rc<Root>, change: WorkspaceChange, workspace: Option<&Rc<Workspace>>) {
    root.queue_ipc_event(IpcEvent::workspace(change, workspace, None));
}
