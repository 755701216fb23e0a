//! Engine log classification.
//!
//! Scans the `.log` file of the final pass and turns the recognisable
//! problem lines into structured [`Diagnostic`]s, each with a short
//! actionable suggestion. Diagnostics are warnings; they are emitted
//! even when the build produced a PDF.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// The recognised problem classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A `\usepackage` referenced a `.sty` the distribution lacks.
    MissingPackage,
    /// Math material outside `$...$` / `\[...\]`.
    MathOutsideDelims,
    /// Undefined control sequence.
    UnknownCommand,
    /// Content before `\begin{document}`.
    MissingDocumentBegin,
    /// Brace surplus or deficit.
    UnbalancedBraces,
    /// `\begin{...}` of an environment no loaded package defines.
    UnknownEnvironment,
    /// Overfull horizontal boxes; one diagnostic carries the count.
    OverfullHbox,
    /// `\cite` key with no bibliography entry resolved yet.
    UndefinedCitation,
}

/// One classified item from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Source line, when the log names one.
    pub line: Option<u32>,
    /// The offending name or symbol, when the log names one.
    pub subject: Option<String>,
    /// Number of occurrences folded into this diagnostic (always 1 except
    /// for [`DiagnosticKind::OverfullHbox`]).
    pub count: usize,
}

impl Diagnostic {
    fn new(kind: DiagnosticKind) -> Self {
        Diagnostic { kind, line: None, subject: None, count: 1 }
    }

    /// Human-readable fix suggestion for this diagnostic.
    pub fn suggestion(&self) -> String {
        match self.kind {
            DiagnosticKind::MissingPackage => format!(
                "package '{}' is not installed: try `tlmgr install {}` or the \
                 matching texlive package from your platform package manager",
                self.subject.as_deref().unwrap_or("?"),
                self.subject.as_deref().unwrap_or("?"),
            ),
            DiagnosticKind::MathOutsideDelims => {
                "math-mode material outside math delimiters: wrap it in $...$ or \\[...\\]"
                    .to_string()
            }
            DiagnosticKind::UnknownCommand => format!(
                "unknown command {}: check the spelling or load the package that defines it",
                self.subject.as_deref().unwrap_or("(unnamed)"),
            ),
            DiagnosticKind::MissingDocumentBegin => {
                "content appears before \\begin{document}: add the document body wrapper"
                    .to_string()
            }
            DiagnosticKind::UnbalancedBraces => {
                "unbalanced braces: count { and } around the reported line".to_string()
            }
            DiagnosticKind::UnknownEnvironment => format!(
                "environment '{}' is not defined: load the package that provides it",
                self.subject.as_deref().unwrap_or("?"),
            ),
            DiagnosticKind::OverfullHbox => format!(
                "{} overfull line(s): consider \\usepackage{{microtype}} or rewording \
                 (texbuild --auto-fix does the former)",
                self.count,
            ),
            DiagnosticKind::UndefinedCitation => format!(
                "citation '{}' is undefined: check the key and that the bibliography ran",
                self.subject.as_deref().unwrap_or("?"),
            ),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {line}: ")?;
        }
        write!(f, "{}", self.suggestion())
    }
}

static RE_MISSING_STY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"! LaTeX Error: File `([^']+)\.sty' not found").unwrap());

static RE_MISSING_DOLLAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"! Missing \$ inserted").unwrap());

static RE_UNDEFINED_CS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"! Undefined control sequence").unwrap());

static RE_MISSING_BEGIN_DOC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"! LaTeX Error: Missing \\begin\{document\}").unwrap());

static RE_BRACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"! (Too many \}'s|Missing [{}] inserted)").unwrap());

static RE_UNKNOWN_ENV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"! LaTeX Error: Environment (\S+) undefined").unwrap());

static RE_OVERFULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Overfull \\hbox").unwrap());

static RE_CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"LaTeX Warning: Citation `([^']+)' .*undefined").unwrap()
});

/// The `l.<n> <context>` line TeX prints under an error; the trailing
/// control word is the usual culprit.
static RE_ERROR_CONTEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^l\.(\d+)\s?(.*)$").unwrap());

static RE_INPUT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"on input line (\d+)").unwrap());

static RE_TRAILING_CS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\\[a-zA-Z@]+)\s*$").unwrap());

/// Classify the whole log text.
pub fn analyse_log(log: &str) -> Vec<Diagnostic> {
    let lines: Vec<&str> = log.lines().collect();
    let mut diagnostics = Vec::new();
    let mut overfull = 0usize;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if let Some(caps) = RE_MISSING_STY.captures(line) {
            let mut d = Diagnostic::new(DiagnosticKind::MissingPackage);
            d.subject = Some(caps[1].to_string());
            d.line = context_line(&lines, i).0;
            diagnostics.push(d);
        } else if RE_MISSING_DOLLAR.is_match(line) {
            let mut d = Diagnostic::new(DiagnosticKind::MathOutsideDelims);
            d.line = context_line(&lines, i).0;
            diagnostics.push(d);
        } else if RE_UNDEFINED_CS.is_match(line) {
            let mut d = Diagnostic::new(DiagnosticKind::UnknownCommand);
            let (line_no, subject) = context_line(&lines, i);
            d.line = line_no;
            d.subject = subject;
            diagnostics.push(d);
        } else if RE_MISSING_BEGIN_DOC.is_match(line) {
            diagnostics.push(Diagnostic::new(DiagnosticKind::MissingDocumentBegin));
        } else if RE_BRACES.is_match(line) {
            let mut d = Diagnostic::new(DiagnosticKind::UnbalancedBraces);
            d.line = context_line(&lines, i).0;
            diagnostics.push(d);
        } else if let Some(caps) = RE_UNKNOWN_ENV.captures(line) {
            let mut d = Diagnostic::new(DiagnosticKind::UnknownEnvironment);
            d.subject = Some(caps[1].to_string());
            d.line = context_line(&lines, i).0;
            diagnostics.push(d);
        } else if RE_OVERFULL.is_match(line) {
            overfull += 1;
        } else if let Some(caps) = RE_CITATION.captures(line) {
            let mut d = Diagnostic::new(DiagnosticKind::UndefinedCitation);
            d.subject = Some(caps[1].to_string());
            d.line = RE_INPUT_LINE
                .captures(line)
                .and_then(|c| c[1].parse().ok());
            diagnostics.push(d);
        }
        i += 1;
    }

    if overfull > 0 {
        let mut d = Diagnostic::new(DiagnosticKind::OverfullHbox);
        d.count = overfull;
        diagnostics.push(d);
    }
    diagnostics
}

/// Number of overfull lines folded into the analysis, for the auto-fix
/// feedback branch.
pub fn overfull_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::OverfullHbox)
        .map(|d| d.count)
        .unwrap_or(0)
}

/// Look a few lines ahead for TeX's `l.<n>` context line; returns the
/// source line number and the trailing control word, when present.
fn context_line(lines: &[&str], from: usize) -> (Option<u32>, Option<String>) {
    for line in lines.iter().skip(from + 1).take(6) {
        if let Some(caps) = RE_ERROR_CONTEXT.captures(line) {
            let line_no = caps[1].parse().ok();
            let subject = RE_TRAILING_CS
                .captures(&caps[2])
                .map(|c| c[1].to_string());
            return (line_no, subject);
        }
    }
    (None, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_missing_package() {
        let log = "! LaTeX Error: File `tikz-foo.sty' not found.\n\nl.4 \\usepackage{tikz-foo}\n";
        let diags = analyse_log(log);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::MissingPackage);
        assert_eq!(diags[0].subject.as_deref(), Some("tikz-foo"));
        assert_eq!(diags[0].line, Some(4));
        assert!(diags[0].suggestion().contains("tikz-foo"));
    }

    #[test]
    fn classifies_undefined_control_sequence() {
        let log = "! Undefined control sequence.\nl.12 \\foobar\n";
        let diags = analyse_log(log);
        assert_eq!(diags[0].kind, DiagnosticKind::UnknownCommand);
        assert_eq!(diags[0].line, Some(12));
        assert_eq!(diags[0].subject.as_deref(), Some("\\foobar"));
    }

    #[test]
    fn classifies_missing_dollar() {
        let log = "! Missing $ inserted.\n<inserted text>\n$\nl.7 x^2\n";
        let diags = analyse_log(log);
        assert_eq!(diags[0].kind, DiagnosticKind::MathOutsideDelims);
        assert_eq!(diags[0].line, Some(7));
    }

    #[test]
    fn classifies_missing_begin_document() {
        let log = "! LaTeX Error: Missing \\begin{document}.\n";
        let diags = analyse_log(log);
        assert_eq!(diags[0].kind, DiagnosticKind::MissingDocumentBegin);
    }

    #[test]
    fn classifies_brace_errors() {
        let diags = analyse_log("! Too many }'s.\nl.3 }\n");
        assert_eq!(diags[0].kind, DiagnosticKind::UnbalancedBraces);
        let diags = analyse_log("! Missing } inserted.\n");
        assert_eq!(diags[0].kind, DiagnosticKind::UnbalancedBraces);
    }

    #[test]
    fn classifies_unknown_environment() {
        let log = "! LaTeX Error: Environment tikzcd undefined.\n\nl.9 \\begin{tikzcd}\n";
        let diags = analyse_log(log);
        assert_eq!(diags[0].kind, DiagnosticKind::UnknownEnvironment);
        assert_eq!(diags[0].subject.as_deref(), Some("tikzcd"));
    }

    #[test]
    fn overfull_boxes_are_counted_not_listed() {
        let log = "Overfull \\hbox (9.5pt too wide) in paragraph at lines 10--12\n\
                   Overfull \\hbox (1.2pt too wide) in paragraph at lines 30--31\n";
        let diags = analyse_log(log);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::OverfullHbox);
        assert_eq!(diags[0].count, 2);
        assert_eq!(overfull_count(&diags), 2);
        assert!(diags[0].suggestion().contains("2 overfull"));
    }

    #[test]
    fn classifies_undefined_citation() {
        let log = "LaTeX Warning: Citation `knuth84' on page 1 undefined on input line 5.\n";
        let diags = analyse_log(log);
        assert_eq!(diags[0].kind, DiagnosticKind::UndefinedCitation);
        assert_eq!(diags[0].subject.as_deref(), Some("knuth84"));
        assert_eq!(diags[0].line, Some(5));
    }

    #[test]
    fn clean_log_yields_nothing() {
        let log = "This is pdfTeX\nOutput written on doc.pdf (1 page, 12345 bytes).\n";
        assert!(analyse_log(log).is_empty());
        assert_eq!(overfull_count(&[]), 0);
    }

    #[test]
    fn display_includes_line_number() {
        let diags = analyse_log("! Undefined control sequence.\nl.12 \\foobar\n");
        let rendered = diags[0].to_string();
        assert!(rendered.starts_with("line 12:"), "Got: {rendered}");
    }
}
