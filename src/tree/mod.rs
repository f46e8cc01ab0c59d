//! The window tree.
//!
//! Five entity types form the tree: [`Root`] owns [`Output`]s (unordered, discovered by the
//! backend) and [`Workspace`]s (ordered, named); a workspace owns tiling [`Column`]s and
//! floating [`Window`]s; a column owns windows. Every entity embeds a [`Node`] carrying its
//! identity and transaction bookkeeping.
//!
//! Mutations touch the `pending` copy of entity state and mark nodes dirty; the
//! [`transaction`] engine is the only code that promotes pending state to `current`.

pub mod arrange;
pub mod column;
pub mod node;
pub mod output;
pub mod root;
pub mod transaction;
pub mod view;
pub mod window;
pub mod workspace;

pub use column::{Column, ColumnLayout, ColumnState};
pub use node::{DirtyNodes, Node, NodeId, TreeNode, TreeNodeWeak};
pub use output::{Output, OutputState};
pub use root::{IpcEvent, Root, RootState};
pub use transaction::TransactionManager;
pub use view::{View, ViewImpl, ViewKind};
pub use window::{BorderKind, Window, WindowState};
pub use workspace::{FocusMode, Workspace, WorkspaceState};
