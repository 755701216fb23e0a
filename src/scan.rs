//! Lexical scan of a LaTeX source for the directives that drive
//! engine and auxiliary-tool selection.
//!
//! Runs before we know which engine can even parse the document, so this
//! is deliberately a comment-stripping pre-pass plus literal prefix
//! matching, not a parser.

use anyhow::{Context, Result};
use std::path::Path;

/// Facts about a LaTeX source, computed with all comments stripped.
///
/// A commented-out directive never sets a field; that is an invariant,
/// not an optimisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// `\usepackage{fontspec}`: system-font shaping, needs xelatex/lualatex.
    pub fontspec: bool,
    /// `\usepackage{xeCJK}`: CJK shaping.
    pub cjk: bool,
    /// `\usepackage{polyglossia}`: multilingual/RTL shaping.
    pub polyglossia: bool,
    /// `\usepackage{luacode}`, `\usepackage{luatextra}` or `\directlua`.
    pub luatex: bool,
    /// `\bibliography{`: classic bibtex workflow.
    pub bibtex: bool,
    /// `\addbibresource{`: biblatex/biber workflow.
    pub biber: bool,
    /// `\makeindex` / `\printindex`.
    pub index: bool,
    /// `\makeglossaries`, `\printglossary`, `\printglossaries`, `\newacronym`.
    pub glossary: bool,
}

/// Remove LaTeX comments: everything from the first unescaped `%` to end
/// of line. Lines that become blank are dropped.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        let kept = match comment_start(line) {
            Some(pos) => &line[..pos],
            None => line,
        };
        if kept.trim().is_empty() {
            continue;
        }
        out.push_str(kept);
        out.push('\n');
    }
    out
}

/// Byte offset of the first unescaped `%` on a line, if any.
/// `\%` is a literal percent sign, and `\\%` is a comment after a
/// line break command.
pub(crate) fn comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2, // skip the escaped character
            b'%' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Scan already-loaded source text. Pure; the file-reading wrapper is
/// [`scan`].
pub fn scan_source(source: &str) -> ScanReport {
    let text = strip_comments(source);
    let has = |needle: &str| text.contains(needle);
    let loads = |package: &str| loads_package(&text, package);

    ScanReport {
        fontspec: loads("fontspec"),
        cjk: loads("xeCJK"),
        polyglossia: loads("polyglossia"),
        luatex: loads("luacode") || loads("luatextra") || has("\\directlua"),
        bibtex: has("\\bibliography{"),
        biber: has("\\addbibresource{"),
        index: has("\\makeindex") || has("\\printindex"),
        glossary: has("\\makeglossaries")
            || has("\\printglossary")
            || has("\\printglossaries")
            || has("\\newacronym"),
    }
}

/// True when `text` (already comment-stripped) loads `package` through any
/// `\usepackage` form: plain, with options, or inside a comma-separated
/// package list.
pub(crate) fn loads_package(text: &str, package: &str) -> bool {
    text.match_indices("\\usepackage").any(|(pos, _)| {
        let rest = &text[pos + "\\usepackage".len()..];
        let rest = match rest.strip_prefix('[') {
            Some(after) => match after.find(']') {
                Some(close) => &after[close + 1..],
                None => return false,
            },
            None => rest,
        };
        let Some(rest) = rest.strip_prefix('{') else {
            return false;
        };
        let Some(end) = rest.find('}') else {
            return false;
        };
        rest[..end].split(',').any(|p| p.trim() == package)
    })
}

/// Read and scan a source file.
pub fn scan(path: &Path) -> Result<ScanReport> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(scan_source(&source))
}
