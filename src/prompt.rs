use std::path::Path;

use crate::registry::ToolRegistry;

pub const DEFAULT_BASE_PROMPT: &str = "You are deckhand, a careful coding assistant working \
inside a single project workspace. Accomplish the user's request with the tools provided, keep \
changes minimal, and explain what you changed. When a tool fails, read its error and hint and \
adjust the next call instead of repeating it.";

const CALL_SEQUENCE_GUIDANCE: &str = "\
Tool use:
- Discover before acting: call list_files or search_files before read_file.
- Always read_file before edit_file, and copy old_str exactly, including whitespace.
- To create a file, call edit_file with an empty old_str.
- If old_str occurs more than once, add surrounding lines until it is unique.
- Shell commands may need the user's approval; if declined, ask the user instead of retrying.
- Paths are relative to the workspace root; paths outside it are always rejected.";

/// Builds the system prompt: base instructions (or an override), the
/// workspace root, the tool inventory and call-sequence guidance.
pub fn system_prompt(base_override: Option<&str>, workspace: &Path, registry: &ToolRegistry) -> String {
    let base = base_override
        .map(str::trim)
        .filter(|base| !base.is_empty())
        .unwrap_or(DEFAULT_BASE_PROMPT);

    let inventory: Vec<String> = registry
        .definitions()
        .into_iter()
        .map(|definition| format!("- {}: {}", definition.name, definition.description))
        .collect();

    format!(
        "{base}\n\nWorkspace root: {}\n\nAvailable tools:\n{}\n\n{CALL_SEQUENCE_GUIDANCE}",
        workspace.display(),
        inventory.join("\n"),
    )
}
