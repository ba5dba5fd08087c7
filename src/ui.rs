//! Output and input collaborators.
//!
//! The core never styles text. It hands each message to a [`Ui`] together
//! with its [`MessageKind`] and lets the implementation decide how to draw it.

/// Semantic category of a rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    User,
    Assistant,
    /// Tool activity line, emitted before a tool acts.
    Tool,
    Info,
    Error,
    Hint,
    Warning,
}

/// Output sink shared by the agent loop and every tool.
pub trait Ui: Send + Sync {
    fn render(&self, message: &str, kind: MessageKind);

    /// Surfaces one streamed assistant text delta as soon as it arrives.
    fn stream_delta(&self, delta: &str);

    /// Called once a streamed assistant reply is complete.
    fn end_stream(&self) {}

    /// Asks the user to approve `prompt`. Implementations must return `false`
    /// when no answer can be obtained.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Line-oriented source of user input for the interactive loop.
pub trait InputSource {
    /// Next line without its terminator, or `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> Option<String>;
}
