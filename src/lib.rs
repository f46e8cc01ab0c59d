//! Core of the hayward compositor: the window tree with atomic transactions and the
//! input/seat/focus engine.
//!
//! Rendering, wire protocols and hardware backends belong to the compositor toolkit; this
//! crate consumes them through the seams in [`shell`], [`tree::view`] and [`input`].

// Tracing since it's used project wide for logging
#[macro_use]
extern crate tracing;

pub mod backend;
pub mod cli;
pub mod commands;
pub mod input;
pub mod ipc;
pub mod shell;
pub mod state;
pub mod tree;
pub mod utils;
