use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wait_timeout::ChildExt;

use super::truncate_to_byte_limit;

/// Captured result of one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProcessOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs `command` in `cwd`, draining both pipes on their own threads so a
/// chatty child cannot block on a full pipe.
pub(crate) fn run(
    mut command: Command,
    cwd: &Path,
    timeout: Option<Duration>,
    max_output_bytes: usize,
) -> io::Result<ProcessOutput> {
    let mut child = command
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let (status, timed_out) = wait(&mut child, timeout)?;

    let stdout = join_output(stdout);
    let stderr = join_output(stderr);

    Ok(ProcessOutput {
        exit_code: status.code(),
        stdout: truncate_to_byte_limit(stdout, max_output_bytes),
        stderr: truncate_to_byte_limit(stderr, max_output_bytes),
        timed_out,
    })
}

fn wait(child: &mut Child, timeout: Option<Duration>) -> io::Result<(ExitStatus, bool)> {
    let Some(timeout) = timeout else {
        return Ok((child.wait()?, false));
    };

    match child.wait_timeout(timeout) {
        Ok(Some(status)) => Ok((status, false)),
        Ok(None) => {
            let _ = child.kill();
            Ok((child.wait()?, true))
        }
        Err(error) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(error)
        }
    }
}

fn drain(pipe: Option<impl Read + Send + 'static>) -> Option<JoinHandle<Vec<u8>>> {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = pipe.read_to_end(&mut bytes);
        bytes
    }))
}

fn join_output(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn bash(script: &str) -> Command {
        let mut command = Command::new("bash");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    fn captures_stdout_stderr_and_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = run(bash("echo out; echo err >&2; exit 3"), dir.path(), None, 1024)
            .expect("process should run");
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
    }

    #[test]
    fn runs_in_the_given_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = run(bash("pwd"), dir.path(), None, 1024).expect("process should run");
        let reported = std::path::PathBuf::from(output.stdout.trim());
        assert_eq!(
            reported.canonicalize().expect("canonical pwd"),
            dir.path().canonicalize().expect("canonical tempdir")
        );
    }

    #[test]
    fn output_is_truncated_at_the_byte_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output =
            run(bash("printf 'abcdefghij'"), dir.path(), None, 4).expect("process should run");
        assert_eq!(output.stdout, "abcd\n[truncated]");
        assert!(output.success());
    }

    #[test]
    fn timeout_kills_the_child() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = run(
            bash("sleep 5"),
            dir.path(),
            Some(Duration::from_millis(100)),
            1024,
        )
        .expect("process should run");
        assert!(output.timed_out);
        assert!(!output.success());
    }
}
