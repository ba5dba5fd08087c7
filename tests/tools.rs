mod support;

use std::fs;
use std::sync::Arc;

use deckhand::{MessageKind, ToolError, ToolRegistry};
use serde_json::json;
use support::{call, config_for, tool_context, RecordingUi};
use tempfile::tempdir;

fn registry_for(workspace: &std::path::Path, ui: Arc<RecordingUi>) -> ToolRegistry {
    ToolRegistry::builtin(tool_context(workspace, config_for(workspace), ui))
}

#[test]
fn every_path_taking_tool_rejects_escapes() {
    let outer = tempdir().expect("outer dir");
    let workspace = outer.path().join("project");
    fs::create_dir(&workspace).expect("workspace");
    fs::write(outer.path().join("secret.txt"), "top secret").expect("secret");

    let ui = Arc::new(RecordingUi::declining());
    let registry = registry_for(&workspace, Arc::clone(&ui));

    let attempts = [
        call("read_file", json!({"path": "../secret.txt"})),
        call("read_file", json!({"path": "/etc/passwd"})),
        call("list_files", json!({"path": ".."})),
        call("edit_file", json!({"path": "../planted.txt", "old_str": "", "new_str": "x"})),
        call("search_files", json!({"pattern": "secret", "path": "../"})),
        call("git_operation", json!({"operation": "add", "args": "../secret.txt"})),
        call("git_operation", json!({"operation": "diff", "args": "-- ../secret.txt"})),
        call("git_operation", json!({"operation": "log", "args": "/etc/passwd"})),
    ];
    for attempt in &attempts {
        let error = registry.dispatch(attempt).expect_err("escape must fail");
        assert!(
            matches!(error, ToolError::OutsideWorkspace { .. }),
            "{}: {error}",
            attempt.tool_name
        );
    }

    assert!(!outer.path().join("planted.txt").exists());
    assert!(ui.messages(MessageKind::Tool).is_empty(), "no tool acted");

    let error = registry
        .dispatch(&call(
            "git_operation",
            json!({"operation": "diff", "args": "--output=../escaped.txt"}),
        ))
        .expect_err("diff output outside the workspace");
    assert!(matches!(error, ToolError::InvalidArguments { .. }));
    assert!(!outer.path().join("escaped.txt").exists());
    assert!(ui.confirmations().is_empty());
}

#[test]
fn create_then_create_again_is_rejected() {
    let workspace = tempdir().expect("workspace");
    let registry = registry_for(workspace.path(), Arc::new(RecordingUi::declining()));

    let created = registry
        .dispatch(&call(
            "edit_file",
            json!({"path": "src/new.rs", "old_str": "", "new_str": "fn main() {}\n"}),
        ))
        .expect("create");
    assert_eq!(created["action"], "created");
    assert_eq!(
        fs::read_to_string(workspace.path().join("src/new.rs")).expect("created file"),
        "fn main() {}\n"
    );

    let error = registry
        .dispatch(&call(
            "edit_file",
            json!({"path": "src/new.rs", "old_str": "", "new_str": "other"}),
        ))
        .expect_err("second create");
    assert!(matches!(error, ToolError::AlreadyExists { .. }));
    assert_eq!(
        fs::read_to_string(workspace.path().join("src/new.rs")).expect("unchanged"),
        "fn main() {}\n"
    );
}

#[test]
fn successful_edit_changes_length_by_the_replacement_delta() {
    let workspace = tempdir().expect("workspace");
    let original = "alpha\nbeta\ngamma\n";
    fs::write(workspace.path().join("list.txt"), original).expect("seed");
    let registry = registry_for(workspace.path(), Arc::new(RecordingUi::declining()));

    let old_str = "beta\n";
    let new_str = "beta\nbeta prime\n";
    registry
        .dispatch(&call(
            "edit_file",
            json!({"path": "list.txt", "old_str": old_str, "new_str": new_str}),
        ))
        .expect("edit");

    let edited = fs::read_to_string(workspace.path().join("list.txt")).expect("edited");
    assert_eq!(edited.len(), original.len() - old_str.len() + new_str.len());
    assert_eq!(edited.matches(new_str).count(), 1);
}

#[test]
fn ambiguous_edit_leaves_the_file_untouched() {
    let workspace = tempdir().expect("workspace");
    let original = "let x = 1;\nlet x = 1;\n";
    fs::write(workspace.path().join("dup.rs"), original).expect("seed");
    let registry = registry_for(workspace.path(), Arc::new(RecordingUi::declining()));

    let error = registry
        .dispatch(&call(
            "edit_file",
            json!({"path": "dup.rs", "old_str": "let x = 1;", "new_str": "let x = 2;"}),
        ))
        .expect_err("ambiguous");
    assert!(matches!(error, ToolError::NotUnique { occurrences: 2, .. }));
    assert!(error.hint().expect("hint").contains("context"));
    assert_eq!(
        fs::read_to_string(workspace.path().join("dup.rs")).expect("unchanged"),
        original
    );
}

#[test]
fn search_reports_matches_per_file_with_line_numbers() {
    let workspace = tempdir().expect("workspace");
    fs::create_dir(workspace.path().join("src")).expect("src");
    fs::write(workspace.path().join("src/a.rs"), "fn a() {}\n// TODO: tidy\n").expect("a");
    fs::write(workspace.path().join("src/b.rs"), "// todo later\nfn b() {}\n").expect("b");
    fs::write(workspace.path().join("src/c.rs"), "fn c() {}\n").expect("c");
    fs::write(workspace.path().join("blob.bin"), b"TODO\0binary").expect("bin");
    let registry = registry_for(workspace.path(), Arc::new(RecordingUi::declining()));

    let found = registry
        .dispatch(&call("search_files", json!({"pattern": "TODO"})))
        .expect("search");
    assert_eq!(found["count"], 2);
    assert_eq!(found["truncated"], false);

    let matches = found["matches"].as_array().expect("matches");
    let located: Vec<(String, u64)> = matches
        .iter()
        .map(|entry| {
            (
                entry["file"].as_str().expect("file").to_string(),
                entry["line_number"].as_u64().expect("line"),
            )
        })
        .collect();
    assert_eq!(
        located,
        vec![("src/a.rs".to_string(), 2), ("src/b.rs".to_string(), 1)]
    );
}

#[test]
fn search_glob_narrows_files() {
    let workspace = tempdir().expect("workspace");
    fs::write(workspace.path().join("notes.md"), "TODO docs\n").expect("md");
    fs::write(workspace.path().join("main.rs"), "// TODO code\n").expect("rs");
    let registry = registry_for(workspace.path(), Arc::new(RecordingUi::declining()));

    let found = registry
        .dispatch(&call("search_files", json!({"pattern": "todo", "glob": "*.rs"})))
        .expect("search");
    assert_eq!(found["count"], 1);
    assert_eq!(found["matches"][0]["file"], "main.rs");
}

#[cfg(unix)]
#[test]
fn declined_shell_command_never_runs() {
    let workspace = tempdir().expect("workspace");
    let ui = Arc::new(RecordingUi::declining());
    let registry = registry_for(workspace.path(), Arc::clone(&ui));

    let error = registry
        .dispatch(&call("run_shell_command", json!({"command": "touch marker.txt"})))
        .expect_err("declined");
    assert!(matches!(error, ToolError::UserDeclined { .. }));
    assert_eq!(ui.confirmations().len(), 1);
    assert!(!workspace.path().join("marker.txt").exists());
}

#[cfg(unix)]
#[test]
fn destructive_find_is_not_auto_executed() {
    let workspace = tempdir().expect("workspace");
    fs::write(workspace.path().join("precious.rs"), "fn main() {}\n").expect("precious");
    let ui = Arc::new(RecordingUi::declining());
    let config = deckhand::AgentConfig {
        auto_execute_safe_commands: true,
        ..config_for(workspace.path())
    };
    let registry = ToolRegistry::builtin(tool_context(workspace.path(), config, Arc::clone(&ui)));

    let error = registry
        .dispatch(&call(
            "run_shell_command",
            json!({"command": "find . -name precious.rs -delete"}),
        ))
        .expect_err("declined");
    assert!(matches!(error, ToolError::UserDeclined { .. }));
    assert_eq!(ui.confirmations().len(), 1);
    assert!(workspace.path().join("precious.rs").exists());

    let listed = registry
        .dispatch(&call("run_shell_command", json!({"command": "find . -name precious.rs"})))
        .expect("plain find runs without asking");
    assert_eq!(listed["success"], true);
    assert_eq!(ui.confirmations().len(), 1);
}

#[cfg(unix)]
#[test]
fn approved_shell_command_runs_in_the_workspace() {
    let workspace = tempdir().expect("workspace");
    let ui = Arc::new(RecordingUi::approving());
    let registry = registry_for(workspace.path(), Arc::clone(&ui));

    let output = registry
        .dispatch(&call("run_shell_command", json!({"command": "touch marker.txt && echo done"})))
        .expect("approved");
    assert_eq!(output["success"], true);
    assert_eq!(output["stdout"].as_str().map(str::trim), Some("done"));
    assert!(workspace.path().join("marker.txt").exists());
}

#[test]
fn disallowed_git_operation_lists_the_allowed_ones() {
    let workspace = tempdir().expect("workspace");
    let registry = registry_for(workspace.path(), Arc::new(RecordingUi::declining()));

    let error = registry
        .dispatch(&call("git_operation", json!({"operation": "push"})))
        .expect_err("push is not allowed");
    assert!(matches!(error, ToolError::NotAllowed { .. }));
    let payload = error.to_payload();
    assert_eq!(payload["allowed"], json!(["status", "diff", "log", "add", "commit", "branch"]));
}

#[test]
fn create_read_edit_read_round_trip() {
    let workspace = tempdir().expect("workspace");
    let ui = Arc::new(RecordingUi::declining());
    let registry = registry_for(workspace.path(), Arc::clone(&ui));

    let source = "class Calculator\n  def add(a, b)\n    a + b\n  end\nend\n";
    registry
        .dispatch(&call(
            "edit_file",
            json!({"path": "calculator.rb", "old_str": "", "new_str": source}),
        ))
        .expect("create calculator.rb");

    let listed = registry
        .dispatch(&call("list_files", json!({})))
        .expect("list");
    assert_eq!(listed["entries"], json!(["calculator.rb"]));

    let read = registry
        .dispatch(&call("read_file", json!({"path": "calculator.rb"})))
        .expect("read");
    assert_eq!(read["content"], source);

    let addition = "  end\n\n  def subtract(a, b)\n    a - b\n  end\nend\n";
    let edited = registry
        .dispatch(&call(
            "edit_file",
            json!({"path": "calculator.rb", "old_str": "  end\nend\n", "new_str": addition}),
        ))
        .expect("add subtract");
    assert_eq!(edited["action"], "edited");
    assert_eq!(edited["line_delta"], 4);

    let reread = registry
        .dispatch(&call("read_file", json!({"path": "calculator.rb"})))
        .expect("reread");
    let content = reread["content"].as_str().expect("content");
    assert!(content.contains("def add(a, b)"));
    assert!(content.contains("def subtract(a, b)"));

    let found = registry
        .dispatch(&call("search_files", json!({"pattern": "def "})))
        .expect("search");
    assert!(found["count"].as_u64().expect("count") >= 2);
    let matches = found["matches"].as_array().expect("matches");
    assert!(matches.iter().all(|entry| entry["file"] == "calculator.rb"));
    assert_eq!(matches[0]["line_number"], 2);
    assert_eq!(matches[1]["line_number"], 6);

    let activity = ui.messages(MessageKind::Tool);
    assert_eq!(
        activity,
        vec![
            "edit_file calculator.rb (create)",
            "list_files .",
            "read_file calculator.rb",
            "edit_file calculator.rb",
            "read_file calculator.rb",
            "search_files /def / in .",
        ]
    );
}
