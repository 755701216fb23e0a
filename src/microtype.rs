//! Micro-typography injection for the auto-fix feedback loop.
//!
//! When a first engine pass reports overfull lines, loading `microtype`
//! (character protrusion + font expansion) often absorbs the overflow
//! without touching the text. This transform adds the `\usepackage` line
//! at the right spot in the preamble.

use crate::scan::{loads_package, strip_comments};
use regex::Regex;
use std::sync::LazyLock;

const DIRECTIVE: &str = "\\usepackage{microtype}";

static RE_USEPACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*\\usepackage\b").unwrap());

static RE_DOCUMENTCLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*\\documentclass\b").unwrap());

/// Insert `\usepackage{microtype}` into the preamble.
///
/// Placement: after the last `\usepackage` line; failing that, after the
/// `\documentclass` line; failing that, the source is returned unchanged.
/// If microtype is already loaded anywhere (comma lists count, commented
/// loads do not) the source is returned byte-identical. Returns
/// `(output, inserted)`; the driver re-runs the first pass only when an
/// insertion actually happened.
pub fn inject_microtype(source: &str) -> (String, bool) {
    if loads_package(&strip_comments(source), "microtype") {
        return (source.to_string(), false);
    }
    match insertion_line(source) {
        Some(after) => (insert_after_line(source, after, DIRECTIVE), true),
        None => (source.to_string(), false),
    }
}

/// Index of the line the directive should be inserted after.
fn insertion_line(source: &str) -> Option<usize> {
    let mut last_usepackage = None;
    let mut documentclass = None;
    for (i, line) in source.lines().enumerate() {
        if RE_USEPACKAGE.is_match(line) {
            last_usepackage = Some(i);
        } else if documentclass.is_none() && RE_DOCUMENTCLASS.is_match(line) {
            documentclass = Some(i);
        }
    }
    last_usepackage.or(documentclass)
}

/// Rebuild `source` with `directive` on its own line after line `after`.
pub(crate) fn insert_after_line(source: &str, after: usize, directive: &str) -> String {
    let mut out = String::with_capacity(source.len() + directive.len() + 1);
    for (i, line) in source.lines().enumerate() {
        out.push_str(line);
        out.push('\n');
        if i == after {
            out.push_str(directive);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_after_last_usepackage() {
        let input = "\\documentclass{article}\n\\usepackage{graphicx}\n\\usepackage{amsmath}\n\\begin{document}\n";
        let (out, inserted) = inject_microtype(input);
        assert!(inserted);
        assert!(
            out.contains("\\usepackage{amsmath}\n\\usepackage{microtype}\n\\begin{document}"),
            "Got: {out}"
        );
    }

    #[test]
    fn inserts_after_documentclass_when_no_usepackage() {
        let input = "\\documentclass{article}\n\\begin{document}\nhi\n\\end{document}\n";
        let (out, inserted) = inject_microtype(input);
        assert!(inserted);
        assert!(
            out.starts_with("\\documentclass{article}\n\\usepackage{microtype}\n"),
            "Got: {out}"
        );
    }

    #[test]
    fn no_preamble_copies_unchanged() {
        let input = "just some text\nno preamble here\n";
        let (out, inserted) = inject_microtype(input);
        assert!(!inserted);
        assert_eq!(out, input);
    }

    #[test]
    fn already_loaded_is_byte_identical() {
        let input = "\\documentclass{article}\n\\usepackage{microtype}\n\\begin{document}\n";
        let (out, inserted) = inject_microtype(input);
        assert!(!inserted);
        assert_eq!(out, input);
    }

    #[test]
    fn loaded_with_options_counts() {
        let input = "\\documentclass{article}\n\\usepackage[protrusion=true]{microtype}\n";
        let (_, inserted) = inject_microtype(input);
        assert!(!inserted);
    }

    #[test]
    fn loaded_in_comma_list_counts() {
        let input = "\\documentclass{article}\n\\usepackage{microtype,xcolor}\n";
        let (_, inserted) = inject_microtype(input);
        assert!(!inserted);
    }

    #[test]
    fn commented_load_does_not_count() {
        let input = "\\documentclass{article}\n% \\usepackage{microtype}\n";
        let (out, inserted) = inject_microtype(input);
        assert!(inserted);
        assert!(out.contains("\n\\usepackage{microtype}\n"), "Got: {out}");
    }

    #[test]
    fn idempotent() {
        let input = "\\documentclass{article}\n\\usepackage{graphicx}\n";
        let (once, _) = inject_microtype(input);
        let (twice, inserted) = inject_microtype(&once);
        assert!(!inserted);
        assert_eq!(once, twice);
    }
}
