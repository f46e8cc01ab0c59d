//! Inter-process communication for `hayward`
//!
//! The compositor listens on a Unix socket whose path is exported through the `HAYWARDSOCK`
//! environment variable. The protocol is line-delimited JSON: every [`Request`] and [`Response`]
//! is serialized on a single line.
//!
//! Clients that send [`Request::Subscribe`] keep their connection open and receive a stream of
//! [`Event`]s, one per line, as compositor state changes.

use std::os::unix::net::UnixStream;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const SOCKET_ENV: &str = "HAYWARDSOCK";

/// Connect to the `hayward` IPC socket.
///
/// You are responsible for managing the returned [`UnixStream`], IE. writing [`Request`]s
/// serialized into JSON lines and reading out JSON lines to deserialize into [`Response`]s.
pub fn connect() -> anyhow::Result<(std::path::PathBuf, UnixStream)> {
    let socket_path = std::env::var(SOCKET_ENV).context("Missing HAYWARDSOCK environment variable")?;
    let socket_path = std::path::PathBuf::from(socket_path);
    let socket = UnixStream::connect(&socket_path).context("Missing IPC socket")?;
    Ok((socket_path, socket))
}

/// A request you send to the compositor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Request {
    /// Request the version of the running `hayward` instance.
    Version,
    /// Request information about the window tree.
    GetTree,
    /// Request information about every workspace.
    GetWorkspaces,
    /// Request information about the connected outputs.
    GetOutputs,
    /// Run a command, expressed as an argument vector.
    Command(Vec<String>),
    /// Subscribe this connection to the event stream.
    Subscribe,
}

/// A response from the compositor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum Response {
    Version(String),
    Tree(Node),
    Workspaces(Vec<Workspace>),
    Outputs(Vec<Output>),
    Command(CommandResult),
    Subscribed,
    Error(String),
}

/// Outcome of a command dispatched through the IPC.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CommandResult {
    pub status: CommandStatus,
    /// Human readable explanation for [`CommandStatus::Failure`] and [`CommandStatus::Invalid`].
    pub message: Option<String>,
}

impl CommandResult {
    pub fn success() -> Self {
        Self {
            status: CommandStatus::Success,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Failure,
            message: Some(message.into()),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Invalid,
            message: Some(message.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CommandStatus {
    Success,
    Failure,
    Invalid,
    /// The command cannot run right now and has been queued, for example during a config reload.
    Defer,
}

/// A node of the serialized window tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Node {
    pub id: u64,
    pub kind: NodeKind,
    pub name: Option<String>,
    pub rect: Rect,
    pub focused: bool,
    pub urgent: bool,
    pub children: Vec<Node>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Root,
    Output,
    Workspace,
    Column,
    Window,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Workspace {
    pub id: u64,
    pub name: String,
    pub visible: bool,
    pub focused: bool,
    pub urgent: bool,
    pub rect: Rect,
    pub output: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Output {
    pub id: u64,
    pub name: String,
    pub rect: Rect,
    pub focused: bool,
}

/// An event broadcast to subscribed clients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "event")]
pub enum Event {
    Window {
        change: WindowChange,
        /// Snapshot of the window the change applies to. `None` only for
        /// [`WindowChange::Focus`] events reporting that focus was cleared.
        window: Option<Node>,
    },
    Workspace {
        change: WorkspaceChange,
        workspace: Option<Workspace>,
        /// Previously focused workspace, for [`WorkspaceChange::Focus`] events.
        old: Option<Workspace>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WindowChange {
    New,
    Close,
    Focus,
    Title,
    Urgent,
    Mark,
    Move,
    Floating,
    FullscreenMode,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceChange {
    Init,
    Empty,
    Focus,
    Urgent,
    Reload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trip() {
        let request = Request::Command(vec![String::from("focus"), String::from("left")]);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(serde_json::from_str::<Request>(&json).unwrap(), request);
    }

    #[test]
    fn event_tag_names() {
        let event = Event::Window {
            change: WindowChange::FullscreenMode,
            window: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"window\""));
        assert!(json.contains("fullscreen_mode"));
    }
}
