use std::fs;
use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use walkdir::{DirEntry, WalkDir};

use super::{decode_args, ParameterSpec, Tool, ToolContext};
use crate::error::{ToolError, ToolResult};

/// Directories never searched: VCS metadata and the session's own state.
const SKIPPED_DIRS: &[&str] = &[".git", session_store::HISTORY_DIR];

pub struct SearchFilesTool {
    ctx: ToolContext,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchFilesArgs {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    glob: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchMatch {
    file: String,
    line_number: usize,
    line: String,
    context_before: Vec<String>,
    context_after: Vec<String>,
}

impl SearchFilesTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    fn compile_pattern(&self, pattern: &str) -> Result<Regex, ToolError> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|error| ToolError::InvalidArguments {
                message: format!("invalid regex '{pattern}': {error}"),
                hint: "use valid regex syntax and escape special characters".to_string(),
            })
    }

    fn compile_glob(&self, glob: &str) -> Result<GlobMatcher, ToolError> {
        GlobBuilder::new(glob)
            .literal_separator(true)
            .build()
            .map(|glob| glob.compile_matcher())
            .map_err(|error| ToolError::InvalidArguments {
                message: format!("invalid glob '{glob}': {error}"),
                hint: "use a file glob such as '*.rs' or 'src/**/*.rb'".to_string(),
            })
    }

    /// Lines of one file matching `regex`, or `None` when the file is binary
    /// or unreadable.
    fn search_file(&self, path: &Path, relative: &str, regex: &Regex) -> Option<Vec<SearchMatch>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(file = relative, %error, "skipping unreadable file");
                return None;
            }
        };

        let sniff = bytes.len().min(self.ctx.config.search.binary_sniff_bytes);
        if bytes[..sniff].contains(&0) {
            return None;
        }

        let content = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = content.lines().collect();
        let context = self.ctx.config.search.context_lines;

        let matches = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| regex.is_match(line))
            .map(|(index, line)| SearchMatch {
                file: relative.to_string(),
                line_number: index + 1,
                line: (*line).to_string(),
                context_before: lines[index.saturating_sub(context)..index]
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                context_after: lines[index + 1..lines.len().min(index + 1 + context)]
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            })
            .collect();
        Some(matches)
    }
}

pub(super) fn build(ctx: ToolContext) -> Box<dyn Tool> {
    Box::new(SearchFilesTool::new(ctx))
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

impl Tool for SearchFilesTool {
    fn name(&self) -> &'static str {
        "search_files"
    }

    fn description(&self) -> &'static str {
        "Search workspace files for a case-insensitive regex. Returns each matching line with its \
         file, 1-based line number and surrounding context. Use it to locate code before calling \
         read_file or edit_file. Binary files are skipped; results are capped."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("pattern", "Regular expression, matched case-insensitively."),
            ParameterSpec::optional(
                "path",
                "Directory or file to search, relative to the workspace root. Defaults to the root.",
            ),
            ParameterSpec::optional(
                "glob",
                "Only search files matching this glob, e.g. '*.rb'. Matched against the file \
                 name, or the relative path when it contains '/'.",
            ),
        ]
    }

    fn call(&self, arguments: &Map<String, Value>) -> ToolResult {
        let args: SearchFilesArgs = decode_args(self, arguments)?;
        let regex = self.compile_pattern(&args.pattern)?;
        let glob = args
            .glob
            .as_deref()
            .filter(|glob| !glob.trim().is_empty())
            .map(|glob| self.compile_glob(glob))
            .transpose()?;
        let glob_has_separator = args.glob.as_deref().is_some_and(|glob| glob.contains('/'));

        let base = self
            .ctx
            .sandbox
            .resolve(args.path.as_deref().unwrap_or("."))?;
        let base_relative = self.ctx.sandbox.relative(&base);
        self.ctx
            .emit(&format!("search_files /{}/ in {base_relative}", args.pattern));
        if !base.exists() {
            return Err(ToolError::NotFound {
                path: base_relative,
                hint: "use list_files to find the directory to search",
            });
        }

        let mut matches = Vec::new();
        let walker = WalkDir::new(&base)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::warn!(%error, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = self.ctx.sandbox.relative(entry.path());
            if let Some(glob) = &glob {
                let candidate = if glob_has_separator {
                    relative.as_str()
                } else {
                    entry.file_name().to_str().unwrap_or_default()
                };
                if !glob.is_match(candidate) {
                    continue;
                }
            }

            if let Some(found) = self.search_file(entry.path(), &relative, &regex) {
                matches.extend(found);
            }
        }

        let total_matches = matches.len();
        let cap = self.ctx.config.search.max_results;
        matches.truncate(cap);

        tracing::debug!(pattern = %args.pattern, total_matches, "search finished");
        Ok(json!({
            "pattern": args.pattern,
            "count": matches.len(),
            "total_matches": total_matches,
            "truncated": total_matches > cap,
            "matches": matches,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use super::*;
    use crate::config::AgentConfig;
    use crate::tools::test_support::{context, context_with, CapturingUi};

    fn search(tool: &SearchFilesTool, pairs: &[(&str, &str)]) -> ToolResult {
        let arguments = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), json!(value)))
            .collect();
        tool.call(&arguments)
    }

    fn files_of(payload: &Value) -> BTreeSet<String> {
        payload["matches"]
            .as_array()
            .expect("matches array")
            .iter()
            .map(|entry| entry["file"].as_str().expect("file").to_string())
            .collect()
    }

    #[test]
    fn finds_matches_case_insensitively_with_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.rs"), "one\ntwo\n// todo: three\nfour\nfive\nsix\n")
            .expect("write");
        let (ctx, _ui) = context(dir.path());

        let payload = search(&SearchFilesTool::new(ctx), &[("pattern", "TODO")]).expect("search");
        assert_eq!(payload["count"], 1);
        let found = &payload["matches"][0];
        assert_eq!(found["file"], "a.rs");
        assert_eq!(found["line_number"], 3);
        assert_eq!(found["line"], "// todo: three");
        assert_eq!(found["context_before"], json!(["one", "two"]));
        assert_eq!(found["context_after"], json!(["four", "five"]));
    }

    #[test]
    fn skips_binary_files_and_git_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("text.txt"), "needle\n").expect("write");
        fs::write(dir.path().join("blob.bin"), b"needle\0\x01").expect("write");
        fs::create_dir(dir.path().join(".git")).expect("mkdir");
        fs::write(dir.path().join(".git/config"), "needle\n").expect("write");
        let (ctx, _ui) = context(dir.path());

        let payload = search(&SearchFilesTool::new(ctx), &[("pattern", "needle")]).expect("search");
        assert_eq!(files_of(&payload), BTreeSet::from(["text.txt".to_string()]));
    }

    #[test]
    fn glob_filters_by_file_name_or_relative_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("lib/nested")).expect("mkdir");
        fs::write(dir.path().join("lib/calc.rb"), "def add\n").expect("write");
        fs::write(dir.path().join("lib/nested/deep.rb"), "def sub\n").expect("write");
        fs::write(dir.path().join("notes.md"), "def nothing\n").expect("write");
        let (ctx, _ui) = context(dir.path());
        let tool = SearchFilesTool::new(ctx);

        let by_name = search(&tool, &[("pattern", "def "), ("glob", "*.rb")]).expect("search");
        assert_eq!(
            files_of(&by_name),
            BTreeSet::from(["lib/calc.rb".to_string(), "lib/nested/deep.rb".to_string()])
        );

        let by_path = search(&tool, &[("pattern", "def "), ("glob", "lib/*.rb")]).expect("search");
        assert_eq!(files_of(&by_path), BTreeSet::from(["lib/calc.rb".to_string()]));
    }

    #[test]
    fn results_are_capped_after_collection_in_walk_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.txt"), "hit\nhit\nhit\n").expect("write");
        fs::write(dir.path().join("b.txt"), "hit\n").expect("write");
        let mut config = AgentConfig::default();
        config.search.max_results = 2;
        let ctx = context_with(dir.path(), config, Arc::new(CapturingUi::default()));

        let payload = search(&SearchFilesTool::new(ctx), &[("pattern", "hit")]).expect("search");
        assert_eq!(payload["count"], 2);
        assert_eq!(payload["total_matches"], 4);
        assert_eq!(payload["truncated"], true);
        assert_eq!(payload["matches"][1]["file"], "a.txt");
        assert_eq!(payload["matches"][1]["line_number"], 2);
    }

    #[test]
    fn invalid_regex_is_an_argument_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (ctx, _ui) = context(dir.path());
        let error =
            search(&SearchFilesTool::new(ctx), &[("pattern", "(unclosed")]).expect_err("bad regex");
        assert!(matches!(error, ToolError::InvalidArguments { .. }));
        assert!(error.hint().is_some());
    }

    #[test]
    fn searching_outside_the_workspace_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (ctx, _ui) = context(dir.path());
        let error = search(
            &SearchFilesTool::new(ctx),
            &[("pattern", "root"), ("path", "../..")],
        )
        .expect_err("escape");
        assert!(matches!(error, ToolError::OutsideWorkspace { .. }));
    }
}
