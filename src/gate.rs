use crate::config::AgentConfig;

/// Substrings that chain, redirect or substitute commands.
const CONTROL_OPERATORS: &[&str] = &[";", "&&", "||", "|", ">", "<", "`", "$(", "&", "\n"];

/// `find` actions that delete, run programs or write files.
const FIND_ACTIONS: &[&str] = &["-delete", "-exec", "-execdir", "-ok", "-okdir", "-fls"];

/// `git branch` flags that only list branches.
const BRANCH_LISTING_FLAGS: &[&str] = &[
    "-a",
    "--all",
    "-r",
    "--remotes",
    "-v",
    "-vv",
    "--verbose",
    "-l",
    "--list",
    "--show-current",
    "--no-color",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    /// Run without asking.
    Auto,
    /// Ask the user; declining is the default.
    NeedsConfirmation,
}

/// Decides whether a shell command may run without user confirmation.
///
/// A command is auto-approved only when auto-execution is enabled, the command
/// contains no control operators, it splits cleanly into shell words, its
/// leading words match an allow-list entry, and none of its arguments turn a
/// read-only program into one that writes, deletes or runs other programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommandGate {
    auto_execute: bool,
    allow_list: Vec<Vec<String>>,
}

impl ShellCommandGate {
    pub fn new<I, S>(auto_execute: bool, allow_list: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allow_list = allow_list
            .into_iter()
            .filter_map(|entry| shell_words::split(entry.as_ref()).ok())
            .filter(|words| !words.is_empty())
            .collect();
        Self {
            auto_execute,
            allow_list,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.auto_execute_safe_commands, &config.safe_commands)
    }

    pub fn evaluate(&self, command: &str) -> Approval {
        if !self.auto_execute || !self.is_allow_listed(command) {
            return Approval::NeedsConfirmation;
        }
        Approval::Auto
    }

    /// Whether `command` is a plain invocation of an allow-listed program.
    pub fn is_allow_listed(&self, command: &str) -> bool {
        if CONTROL_OPERATORS
            .iter()
            .any(|operator| command.contains(operator))
        {
            return false;
        }
        let Ok(words) = shell_words::split(command) else {
            return false;
        };
        if words.is_empty() {
            return false;
        }
        self.allow_list
            .iter()
            .any(|entry| words.len() >= entry.len() && words[..entry.len()] == entry[..])
            && !has_side_effects(&words)
    }
}

fn has_side_effects(words: &[String]) -> bool {
    let args = &words[1..];
    match words[0].as_str() {
        "find" => args
            .iter()
            .any(|arg| FIND_ACTIONS.contains(&arg.as_str()) || arg.starts_with("-fprint")),
        "tree" => args.iter().any(|arg| arg == "-o"),
        "rg" => args
            .iter()
            .any(|arg| arg == "--pre" || arg.starts_with("--pre=")),
        "git" => match args.first().map(String::as_str) {
            Some("diff" | "log" | "show") => args.iter().any(|arg| {
                arg == "--output" || arg.starts_with("--output=") || arg == "--no-index"
            }),
            Some("branch") => args[1..]
                .iter()
                .any(|arg| !BRANCH_LISTING_FLAGS.contains(&arg.as_str())),
            _ => false,
        },
        _ => false,
    }
}
