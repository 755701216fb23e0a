//! Archival (PDF/A) output profile injection.
//!
//! The `pdfx` package must be loaded before anything that touches the PDF
//! stream, so the directive goes immediately after `\documentclass`.

use crate::scan::{loads_package, strip_comments};
use regex::Regex;
use std::sync::LazyLock;

const DIRECTIVE: &str = "\\usepackage[a-2b]{pdfx}";

static RE_DOCUMENTCLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*\\documentclass\b").unwrap());

/// Insert the PDF/A profile directive after `\documentclass`, unless pdfx
/// is already loaded (comma lists count, commented loads do not) or there
/// is no `\documentclass` line.
pub fn inject_pdfa(source: &str) -> (String, bool) {
    if loads_package(&strip_comments(source), "pdfx") {
        return (source.to_string(), false);
    }
    let documentclass = source
        .lines()
        .position(|line| RE_DOCUMENTCLASS.is_match(line));
    match documentclass {
        Some(line) => (
            crate::microtype::insert_after_line(source, line, DIRECTIVE),
            true,
        ),
        None => (source.to_string(), false),
    }
}
