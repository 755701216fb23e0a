//! Child-process execution with an explicit stdio policy.
//!
//! Every external tool goes through [`run`]. The caller is responsible
//! for making the child non-interactive (engines get
//! `-interaction=nonstopmode`); the runner guarantees the child is fully
//! reaped before returning and never treats a non-zero exit as an error;
//! callers inspect [`RunOutcome::code`].

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};

/// What happens to the child's stdout/stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioPolicy {
    /// Pass output through to the terminal.
    Verbose,
    /// Discard all output.
    Quiet,
    /// Pipe through a log-filtering wrapper when one is available,
    /// otherwise discard.
    Filtered,
}

/// Outcome of one child invocation.
#[derive(Debug, Clone, Copy)]
pub struct RunOutcome {
    /// Exit code; `None` means the child was killed by a signal.
    pub code: Option<i32>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// True when the child died to a signal, treated as an interrupt.
    pub fn interrupted(&self) -> bool {
        self.code.is_none()
    }
}

/// Run `program args...` in `cwd` under the given stdio policy.
///
/// `filter` is the optional pass-through wrapper (e.g. `texfot`) used by
/// the `Filtered` policy; when absent, `Filtered` degrades to `Quiet`.
pub fn run(
    program: &Path,
    args: &[&str],
    cwd: &Path,
    policy: StdioPolicy,
    filter: Option<&Path>,
) -> Result<RunOutcome> {
    let mut command = match (policy, filter) {
        (StdioPolicy::Filtered, Some(filter)) => {
            let mut c = Command::new(filter);
            c.arg("--quiet").arg(program);
            c
        }
        _ => Command::new(program),
    };
    command.args(args).current_dir(cwd).stdin(Stdio::null());

    match (policy, filter) {
        (StdioPolicy::Verbose, _) | (StdioPolicy::Filtered, Some(_)) => {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        _ => {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
    }

    tracing::debug!(program = %program.display(), ?args, cwd = %cwd.display(), "spawning");
    let status = command
        .status()
        .with_context(|| format!("failed to run {}", program.display()))?;
    tracing::debug!(program = %program.display(), code = ?status.code(), "child exited");

    Ok(RunOutcome { code: status.code() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh() -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    #[test]
    fn captures_zero_exit() {
        let out = run(&sh(), &["-c", "true"], Path::new("/tmp"), StdioPolicy::Quiet, None)
            .unwrap();
        assert!(out.success());
        assert!(!out.interrupted());
    }

    #[test]
    fn nonzero_exit_is_not_an_error() {
        let out = run(&sh(), &["-c", "exit 3"], Path::new("/tmp"), StdioPolicy::Quiet, None)
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert!(!out.success());
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = run(
            Path::new("/nonexistent/texbuild_no_such_tool"),
            &[],
            Path::new("/tmp"),
            StdioPolicy::Quiet,
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn signal_kill_reports_interrupted() {
        let out = run(
            &sh(),
            &["-c", "kill -TERM $$"],
            Path::new("/tmp"),
            StdioPolicy::Quiet,
            None,
        )
        .unwrap();
        assert!(out.interrupted());
    }

    #[test]
    fn runs_in_given_cwd() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = run(
            &sh(),
            &["-c", "touch marker"],
            dir.path(),
            StdioPolicy::Quiet,
            None,
        )
        .unwrap();
        assert!(out.success());
        assert!(dir.path().join("marker").exists());
    }
}
