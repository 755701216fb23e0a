//! Default float placement for naked `figure`/`table` environments.
//!
//! LaTeX floats without a placement specifier tend to drift to the end of
//! the document; `[htbp]` ("here, top, bottom, or a float page") is the
//! conventional default. This transform adds it to every float opener that
//! does not already carry one.

use regex::Regex;
use std::sync::LazyLock;

/// Placement appended to naked float openers.
const DEFAULT_PLACEMENT: &str = "[htbp]";

/// Matches `\begin{figure}`, `\begin{table}` and their starred forms.
static RE_FLOAT_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\begin\{(?:figure|table)\*?\}").unwrap());

/// Add `[htbp]` to every naked float opener. Idempotent: openers already
/// followed by `[` are left alone. The character after each opener is
/// inspected outside the pattern so adjacent openers (`...figure}\begin{table}`)
/// are all handled in a single invocation.
pub fn fix_floats(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        let mut copied = 0;
        for m in RE_FLOAT_OPENER.find_iter(line) {
            out.push_str(&line[copied..m.end()]);
            copied = m.end();
            if !line[copied..].starts_with('[') {
                out.push_str(DEFAULT_PLACEMENT);
            }
        }
        out.push_str(&line[copied..]);
        out.push('\n');
    }
    out
}
