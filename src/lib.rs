//! Tool-invocation core for the deckhand coding assistant.
//!
//! The model collaborator streams text and tool-call requests; this crate
//! owns everything on the host side of that contract:
//!
//! - [`PathSandbox`] confines every filesystem access to the workspace root.
//! - [`tools`] implements the six built-in tools behind the [`Tool`] trait.
//! - [`ToolRegistry`] exposes tool schemas and is the dispatch boundary.
//! - [`ShellCommandGate`] decides whether a shell command may run unattended.
//! - [`ConversationState`] holds the bounded message log and token usage.
//! - [`AgentLoop`] drives user input, model invocation and tool dispatch.
//!
//! Terminal rendering and argument parsing live in the `deckhand_cli` crate and
//! reach the core through the [`Ui`] and [`InputSource`] traits.

pub mod agent_loop;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gate;
pub mod logging;
pub mod prompt;
pub mod registry;
pub mod sandbox;
pub mod tools;
pub mod ui;

pub use agent_loop::{AgentError, AgentLoop, LoopState};
pub use commands::{parse_slash_command, SlashCommand};
pub use config::{AgentConfig, ConfigError, ConfigOverrides};
pub use conversation::{ConversationState, Message};
pub use error::{ToolError, ToolResult};
pub use gate::{Approval, ShellCommandGate};
pub use registry::ToolRegistry;
pub use sandbox::PathSandbox;
pub use tools::{ParameterSpec, Tool, ToolContext};
pub use ui::{InputSource, MessageKind, Ui};

use std::sync::{Mutex, MutexGuard};

/// Locks `mutex`, recovering the guard when a previous holder panicked.
pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
