//! External tool discovery.
//!
//! Resolves the engine and auxiliary binaries on `PATH` and turns a
//! missing binary into a one-line failure naming the package to install.
//! texbuild never invokes an installer itself; the hint is the whole
//! install hook.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Locate `name` on `PATH`. Returns the first executable candidate.
pub fn find_tool(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Locate `name` on `PATH` or fail with an install hint.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    match find_tool(name) {
        Some(path) => {
            tracing::debug!(tool = name, path = %path.display(), "resolved tool");
            Ok(path)
        }
        None => bail!(
            "{name} not found on PATH, install it first (e.g. {})",
            install_hint(name)
        ),
    }
}

/// Debian-flavoured package hint for a missing tool.
fn install_hint(name: &str) -> &'static str {
    match name {
        "pdflatex" | "bibtex" | "makeindex" | "latexmk" => "apt install texlive-latex-base latexmk",
        "xelatex" => "apt install texlive-xetex",
        "lualatex" => "apt install texlive-luatex",
        "biber" => "apt install biber",
        "makeglossaries" => "apt install texlive-extra-utils",
        "pdftoppm" => "apt install poppler-utils",
        _ => "check your TeX distribution",
    }
}
