use std::path::{Path, PathBuf};

pub const HISTORY_DIR: &str = ".deckhand";
pub const HISTORY_FILE_NAME: &str = "history.json";

#[must_use]
pub fn history_root(workspace: &Path) -> PathBuf {
    workspace.join(HISTORY_DIR)
}

/// `<workspace>/.deckhand/history.json`
#[must_use]
pub fn default_history_path(workspace: &Path) -> PathBuf {
    history_root(workspace).join(HISTORY_FILE_NAME)
}
