//! Multi-pass build orchestration.
//!
//! Drives the engine the right number of times, interleaving the
//! bibliography/index/glossary passes, until cross-references settle:
//!
//! ```text
//! PREPARE → PASS1 → FIX? → AUX → PASS2 → FINAL? → DONE
//!                     └──────┘ (auto-fix re-pass, at most once)
//! ```
//!
//! When any pre-compile transform is requested the whole source directory
//! is copied into a temporary working tree first, so relative
//! `\includegraphics` and bibliography paths keep resolving; the original
//! source is never mutated. The working tree is a [`TempDir`] and is
//! removed on every exit path.

use crate::analyse::{analyse_log, overfull_count, Diagnostic};
use crate::clean::clean;
use crate::floats::fix_floats;
use crate::microtype::inject_microtype;
use crate::pdfa::inject_pdfa;
use crate::resolve::{resolve, BuildPlan, Engine};
use crate::runner::{run, RunOutcome, StdioPolicy};
use crate::scan::scan;
use crate::tools::{find_tool, require_tool};
use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Exit code reported when a child is killed by a signal.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Working tree the interrupt handler must remove when SIGINT hits the
/// driver itself (rather than a child).
static ACTIVE_WORKDIR: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Install the SIGINT handler. The handler removes any registered working
/// tree and exits with [`EXIT_INTERRUPTED`]; without it a terminal
/// interrupt would kill the process before the `TempDir` guard unwinds.
pub fn install_interrupt_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        remove_registered_workdir();
        std::process::exit(EXIT_INTERRUPTED);
    })
    .context("failed to install interrupt handler")
}

fn remove_registered_workdir() {
    let Ok(mut guard) = ACTIVE_WORKDIR.lock() else {
        return;
    };
    if let Some(path) = guard.take() {
        let _ = std::fs::remove_dir_all(path);
    }
}

/// Registers a working tree with the interrupt handler for the duration of
/// a build; deregisters on drop.
struct InterruptScope;

impl InterruptScope {
    fn register(path: &Path) -> Self {
        if let Ok(mut guard) = ACTIVE_WORKDIR.lock() {
            *guard = Some(path.to_path_buf());
        }
        InterruptScope
    }
}

impl Drop for InterruptScope {
    fn drop(&mut self) {
        if let Ok(mut guard) = ACTIVE_WORKDIR.lock() {
            guard.take();
        }
    }
}

/// The document under build: primary file, its directory, and the base
/// name all auxiliary file names derive from.
#[derive(Debug, Clone)]
pub struct SourceDoc {
    pub path: PathBuf,
    pub dir: PathBuf,
    pub base: String,
    file_name: OsString,
}

impl SourceDoc {
    /// Resolve `path` to an absolute descriptor. Fails when the file does
    /// not exist or has no usable stem.
    pub fn locate(path: &Path) -> Result<Self> {
        let path = std::fs::canonicalize(path)
            .with_context(|| format!("no such source file: {}", path.display()))?;
        if !path.is_file() {
            bail!("{} is not a file", path.display());
        }
        let dir = path
            .parent()
            .context("source file has no parent directory")?
            .to_path_buf();
        let base = path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("source file name is not valid UTF-8")?
            .to_string();
        let file_name = path.file_name().unwrap_or_default().to_os_string();
        Ok(SourceDoc { path, dir, base, file_name })
    }

    /// Canonical output location: `dir/base.pdf`.
    pub fn pdf_path(&self) -> PathBuf {
        self.dir.join(format!("{}.pdf", self.base))
    }
}

/// Caller-supplied build options.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub forced_engine: Option<Engine>,
    pub auto_fix: bool,
    pub pdfa: bool,
    pub use_latexmk: bool,
    pub policy: StdioPolicy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            forced_engine: None,
            auto_fix: false,
            pdfa: false,
            use_latexmk: false,
            policy: StdioPolicy::Filtered,
        }
    }
}

/// What the driver hands back to the CLI.
#[derive(Debug)]
pub struct BuildOutcome {
    /// Canonical PDF location, when one was produced.
    pub pdf: Option<PathBuf>,
    /// Classified diagnostics from the log of the final pass.
    pub diagnostics: Vec<Diagnostic>,
    /// 0 when a PDF exists, 1 otherwise, 130 on interrupt.
    pub exit_code: i32,
}

/// Build states. Terminal states are `Done` and `Abort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Prepare,
    Pass1,
    Fix,
    Aux,
    Pass2,
    Final,
    Done,
    Abort,
}

/// Events observed by the driver loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Prepared,
    PassSucceeded,
    PassFailed,
    Refix,
    NoFix,
    AuxFinished,
    NeedsFinalPass,
    NoFinalPass,
    FinalFinished,
}

/// Pure transition function; anything unexpected aborts.
pub fn next(state: State, event: Event) -> State {
    use Event::*;
    use State::*;
    match (state, event) {
        (Prepare, Prepared) => Pass1,
        (Pass1, PassSucceeded) => Fix,
        (Pass1, PassFailed) => Abort,
        (Fix, Refix) => Pass1,
        (Fix, NoFix) => Aux,
        (Aux, AuxFinished) => Pass2,
        (Pass2, NeedsFinalPass) => Final,
        (Pass2, NoFinalPass) => Done,
        (Final, FinalFinished) => Done,
        _ => Abort,
    }
}

/// Outcome of one engine invocation.
struct PassResult {
    outcome: RunOutcome,
    pdf_exists: bool,
}

/// Everything an in-flight build needs to run passes.
struct BuildContext<'a> {
    doc: &'a SourceDoc,
    plan: BuildPlan,
    engine: PathBuf,
    filter: Option<PathBuf>,
    policy: StdioPolicy,
    /// Interrupt-handler registration; dropped before the tree itself.
    _interrupt: Option<InterruptScope>,
    /// Working tree guard; `None` when building in the source directory.
    workdir: Option<TempDir>,
    /// Directory all passes run in.
    cwd: PathBuf,
}

impl BuildContext<'_> {
    fn working_file(&self) -> PathBuf {
        self.cwd.join(&self.doc.file_name)
    }

    fn working_pdf(&self) -> PathBuf {
        self.cwd.join(format!("{}.pdf", self.doc.base))
    }

    fn working_log(&self) -> PathBuf {
        self.cwd.join(format!("{}.log", self.doc.base))
    }

    fn engine_pass(&self) -> Result<PassResult> {
        let file = self.doc.file_name.to_string_lossy().into_owned();
        let outcome = run(
            &self.engine,
            &["-interaction=nonstopmode", &file],
            &self.cwd,
            self.policy,
            self.filter.as_deref(),
        )?;
        Ok(PassResult { outcome, pdf_exists: self.working_pdf().exists() })
    }

    /// Read the current pass log; empty string when the engine wrote none.
    fn read_log(&self) -> String {
        std::fs::read_to_string(self.working_log()).unwrap_or_default()
    }

    /// Run one auxiliary tool; failures (including a missing binary) are
    /// noted and swallowed; a skipped bibliography pass just leaves
    /// citation placeholders in the PDF.
    fn aux_pass(&self, program: &str, arg: &str) {
        let Some(path) = find_tool(program) else {
            eprintln!("note: {program} not found, skipping (output may have placeholders)");
            return;
        };
        match run(&path, &[arg], &self.cwd, self.policy, None) {
            Ok(outcome) if outcome.success() => {
                tracing::info!(tool = program, "auxiliary pass finished");
            }
            Ok(outcome) => {
                eprintln!("note: {program} exited with {:?}, continuing", outcome.code);
            }
            Err(e) => {
                eprintln!("note: {program} could not be run ({e}), continuing");
            }
        }
    }
}

/// Run the whole build for `doc`.
pub fn build(doc: &SourceDoc, opts: &BuildOptions) -> Result<BuildOutcome> {
    let report = scan(&doc.path)?;
    let plan = resolve(&report, opts.forced_engine);
    tracing::info!(engine = plan.engine.program(), ?plan, "build plan resolved");

    let engine_name = if opts.use_latexmk { "latexmk" } else { plan.engine.program() };
    let engine = require_tool(engine_name)?;
    let filter = match opts.policy {
        StdioPolicy::Filtered => find_tool("texfot"),
        _ => None,
    };

    // PREPARE: materialise the working tree when any transform is requested.
    let workdir = if opts.auto_fix || opts.pdfa {
        let tmp = TempDir::new().context("failed to create working tree")?;
        copy_dir_recursive(&doc.dir, tmp.path())?;
        Some(tmp)
    } else {
        None
    };
    let cwd = workdir
        .as_ref()
        .map(|t| t.path().to_path_buf())
        .unwrap_or_else(|| doc.dir.clone());
    let interrupt = workdir
        .as_ref()
        .map(|t| InterruptScope::register(t.path()));

    let ctx = BuildContext {
        doc,
        plan,
        engine,
        filter,
        policy: opts.policy,
        _interrupt: interrupt,
        workdir,
        cwd,
    };

    if opts.auto_fix {
        apply_transform(&ctx.working_file(), |s| fix_floats(s))?;
    }
    if opts.pdfa {
        apply_transform(&ctx.working_file(), |s| inject_pdfa(s).0)?;
    }

    if opts.use_latexmk {
        return latexmk_build(&ctx);
    }

    let mut state = next(State::Prepare, Event::Prepared);
    let mut microtype_done = false;

    loop {
        match state {
            State::Pass1 => {
                let pass = ctx.engine_pass()?;
                if pass.outcome.interrupted() {
                    return Ok(interrupted());
                }
                if !pass.pdf_exists && !pass.outcome.success() {
                    state = next(state, Event::PassFailed);
                    continue;
                }
                if !pass.outcome.success() {
                    eprintln!(
                        "warning: {} reported errors but produced a PDF, continuing",
                        ctx.plan.engine.program()
                    );
                }
                state = next(state, Event::PassSucceeded);
            }
            State::Fix => {
                let event = if opts.auto_fix && try_microtype_fix(&ctx, &mut microtype_done)? {
                    Event::Refix
                } else {
                    Event::NoFix
                };
                state = next(state, event);
            }
            State::Aux => {
                if let Some(bib) = ctx.plan.bib {
                    ctx.aux_pass(bib.program(), &ctx.doc.base);
                }
                if ctx.plan.index {
                    ctx.aux_pass("makeindex", &format!("{}.idx", ctx.doc.base));
                }
                if ctx.plan.glossary {
                    ctx.aux_pass("makeglossaries", &ctx.doc.base);
                }
                state = next(state, Event::AuxFinished);
            }
            State::Pass2 => {
                let pass = ctx.engine_pass()?;
                if pass.outcome.interrupted() {
                    return Ok(interrupted());
                }
                if !pass.pdf_exists {
                    state = next(state, Event::PassFailed);
                    continue;
                }
                let event = if ctx.plan.needs_final_pass() {
                    Event::NeedsFinalPass
                } else {
                    Event::NoFinalPass
                };
                state = next(state, event);
            }
            State::Final => {
                let pass = ctx.engine_pass()?;
                if pass.outcome.interrupted() {
                    return Ok(interrupted());
                }
                state = next(state, Event::FinalFinished);
            }
            State::Done => return finish(&ctx),
            State::Abort => return abort(&ctx),
            State::Prepare => unreachable!("prepare handled before the loop"),
        }
    }
}

/// The `--use-latexmk` short-circuit: latexmk runs its own fixpoint; we
/// still own working-tree setup, transforms, copy-out and cleanup.
fn latexmk_build(ctx: &BuildContext) -> Result<BuildOutcome> {
    let file = ctx.doc.file_name.to_string_lossy().into_owned();
    let outcome = run(
        &ctx.engine,
        &[
            ctx.plan.engine.latexmk_flag(),
            "-interaction=nonstopmode",
            &file,
        ],
        &ctx.cwd,
        ctx.policy,
        ctx.filter.as_deref(),
    )?;
    if outcome.interrupted() {
        return Ok(interrupted());
    }
    if ctx.working_pdf().exists() {
        finish(ctx)
    } else {
        abort(ctx)
    }
}

/// The auto-fix feedback branch: when the first pass logged overfull
/// lines, load microtype and signal a re-pass. Bounded to one round;
/// injection is a no-op once the package is present.
fn try_microtype_fix(ctx: &BuildContext, already_done: &mut bool) -> Result<bool> {
    if *already_done {
        return Ok(false);
    }
    let diagnostics = analyse_log(&ctx.read_log());
    if overfull_count(&diagnostics) == 0 {
        return Ok(false);
    }
    let file = ctx.working_file();
    let source = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let (patched, inserted) = inject_microtype(&source);
    if !inserted {
        return Ok(false);
    }
    std::fs::write(&file, patched)
        .with_context(|| format!("failed to write {}", file.display()))?;
    *already_done = true;
    tracing::info!("injected microtype after overfull warnings, re-running first pass");
    Ok(true)
}

/// Success path: diagnostics from the final log, PDF copy-out when a
/// working tree was used, then best-effort cleanup of the source
/// directory.
fn finish(ctx: &BuildContext) -> Result<BuildOutcome> {
    let diagnostics = analyse_log(&ctx.read_log());
    let canonical = ctx.doc.pdf_path();
    if ctx.workdir.is_some() {
        std::fs::copy(ctx.working_pdf(), &canonical).with_context(|| {
            format!("failed to copy PDF back to {}", canonical.display())
        })?;
    }
    clean(&ctx.doc.dir, &ctx.doc.base);
    Ok(BuildOutcome {
        pdf: Some(canonical),
        diagnostics,
        exit_code: 0,
    })
}

/// Fatal path: no PDF; classify whatever log exists so the user gets a
/// suggestion, not just an exit code.
fn abort(ctx: &BuildContext) -> Result<BuildOutcome> {
    let diagnostics = analyse_log(&ctx.read_log());
    Ok(BuildOutcome { pdf: None, diagnostics, exit_code: 1 })
}

fn interrupted() -> BuildOutcome {
    BuildOutcome {
        pdf: None,
        diagnostics: Vec::new(),
        exit_code: EXIT_INTERRUPTED,
    }
}

/// Read-transform-write one file in place.
fn apply_transform(file: &Path, transform: impl Fn(&str) -> String) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    std::fs::write(file, transform(&source))
        .with_context(|| format!("failed to write {}", file.display()))?;
    Ok(())
}

/// Copy a directory tree. Follows the source layout exactly so relative
/// includes keep resolving inside the working tree.
fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    for entry in std::fs::read_dir(src)
        .with_context(|| format!("failed to read {}", src.display()))?
    {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
            copy_dir_recursive(&entry.path(), &target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("failed to copy {}", entry.path().display()))?;
        }
        // Symlinks are skipped; a build input behind a symlink would
        // escape the working-tree lifetime guarantees.
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn transitions_follow_the_table() {
        use Event::*;
        use State::*;
        assert_eq!(next(Prepare, Prepared), Pass1);
        assert_eq!(next(Pass1, PassSucceeded), Fix);
        assert_eq!(next(Pass1, PassFailed), Abort);
        assert_eq!(next(Fix, Refix), Pass1);
        assert_eq!(next(Fix, NoFix), Aux);
        assert_eq!(next(Aux, AuxFinished), Pass2);
        assert_eq!(next(Pass2, NeedsFinalPass), Final);
        assert_eq!(next(Pass2, NoFinalPass), Done);
        assert_eq!(next(Final, FinalFinished), Done);
    }

    #[test]
    fn unexpected_event_aborts() {
        assert_eq!(next(State::Aux, Event::PassSucceeded), State::Abort);
        assert_eq!(next(State::Done, Event::Prepared), State::Abort);
    }

    #[test]
    fn locate_derives_descriptor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("thesis.tex");
        fs::write(&path, "\\documentclass{book}\n").unwrap();
        let doc = SourceDoc::locate(&path).unwrap();
        assert_eq!(doc.base, "thesis");
        assert!(doc.pdf_path().ends_with("thesis.pdf"));
        assert_eq!(doc.dir, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn locate_missing_file_fails() {
        assert!(SourceDoc::locate(Path::new("/no/such/file.tex")).is_err());
    }

    #[test]
    fn copy_dir_preserves_layout() {
        let src = TempDir::new().unwrap();
        fs::write(src.path().join("main.tex"), "x").unwrap();
        fs::create_dir(src.path().join("figures")).unwrap();
        fs::write(src.path().join("figures/plot.pdf"), "img").unwrap();

        let dst = TempDir::new().unwrap();
        copy_dir_recursive(src.path(), dst.path()).unwrap();
        assert!(dst.path().join("main.tex").exists());
        assert!(dst.path().join("figures/plot.pdf").exists());
    }

    #[test]
    fn apply_transform_rewrites_in_place() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("doc.tex");
        fs::write(&file, "\\begin{figure}\n").unwrap();
        apply_transform(&file, |s| fix_floats(s)).unwrap();
        let out = fs::read_to_string(&file).unwrap();
        assert!(out.contains("[htbp]"), "Got: {out}");
    }

    #[test]
    fn interrupt_cleanup_removes_registered_tree() {
        let dir = TempDir::new().unwrap();
        let doomed = dir.path().join("working-tree");
        fs::create_dir(&doomed).unwrap();
        fs::write(doomed.join("doc.tex"), "x").unwrap();

        let scope = InterruptScope::register(&doomed);
        remove_registered_workdir();
        assert!(!doomed.exists());

        // a second sweep after deregistration is a no-op
        drop(scope);
        remove_registered_workdir();
    }

    #[test]
    fn default_options_use_filtered_policy() {
        let opts = BuildOptions::default();
        assert_eq!(opts.policy, StdioPolicy::Filtered);
        assert!(!opts.auto_fix);
    }
}
