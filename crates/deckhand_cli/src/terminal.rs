//! Line-mode terminal front end: ANSI-styled output on stdout, prompts and
//! confirmations read from stdin.

use std::env;
use std::io::{self, BufRead, IsTerminal, Write};

use deckhand::{InputSource, MessageKind, Ui};

const RESET: &str = "\x1b[0m";

fn style_for(kind: MessageKind) -> (&'static str, &'static str) {
    match kind {
        MessageKind::User => ("\x1b[1;36m", ""),
        MessageKind::Assistant => ("", ""),
        MessageKind::Tool => ("\x1b[2;34m", "  > "),
        MessageKind::Info => ("\x1b[2m", ""),
        MessageKind::Error => ("\x1b[31m", "  x "),
        MessageKind::Hint => ("\x1b[33m", "    hint: "),
        MessageKind::Warning => ("\x1b[1;33m", "  ! "),
    }
}

/// Formats one rendered line, with colour only when `color` is set.
pub fn styled(message: &str, kind: MessageKind, color: bool) -> String {
    let (ansi, prefix) = style_for(kind);
    if color && !ansi.is_empty() {
        format!("{ansi}{prefix}{message}{RESET}")
    } else {
        format!("{prefix}{message}")
    }
}

/// True when the affirmative answer was given. Anything else declines.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub struct TerminalUi {
    color: bool,
}

impl TerminalUi {
    /// Colour follows whether stdout is a terminal and `NO_COLOR` is unset.
    pub fn detect() -> Self {
        Self {
            color: io::stdout().is_terminal() && env::var_os("NO_COLOR").is_none(),
        }
    }
}

impl Ui for TerminalUi {
    fn render(&self, message: &str, kind: MessageKind) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", styled(message, kind, self.color));
        let _ = stdout.flush();
    }

    fn stream_delta(&self, delta: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(delta.as_bytes());
        let _ = stdout.flush();
    }

    fn end_stream(&self) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout);
        let _ = stdout.flush();
    }

    fn confirm(&self, prompt: &str) -> bool {
        {
            let mut stdout = io::stdout().lock();
            let _ = write!(stdout, "{} [y/N] ", styled(prompt, MessageKind::Warning, self.color));
            let _ = stdout.flush();
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => {
                tracing::debug!("no answer to confirmation prompt; declining");
                false
            }
            Ok(_) => is_affirmative(&answer),
        }
    }
}

/// Reads chat lines from stdin.
pub struct StdinInput;

impl InputSource for StdinInput {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        {
            let mut stdout = io::stdout().lock();
            let _ = write!(stdout, "{prompt}");
            let _ = stdout.flush();
        }
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(error) => {
                tracing::warn!(%error, "failed to read input");
                None
            }
        }
    }
}
