//! Pre-compile source validation.
//!
//! Catches the structural mistakes that produce the most opaque engine
//! errors: unbalanced environments, stray alignment characters, TikZ
//! material outside `tikzpicture`, and floats nested inside theorem-like
//! boxes. Runs on the comment-stripped source, line by line, before any
//! engine is invoked.

use crate::scan::comment_start;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Theorem-like tcolorbox environments that cannot contain floats.
const BOX_ENVS: &[&str] = &[
    "theorem", "lemma", "corollary", "proposition",
    "definition", "example", "remark", "notebox", "proof",
];

/// Environments where `&` is a column or alignment separator.
const AMPERSAND_ENVS: &[&str] = &[
    "tabular", "tabularx", "longtable", "array",
    "align", "align*", "aligned", "alignat", "alignat*",
    "gather", "gather*", "gathered",
    "split", "cases", "matrix", "pmatrix", "bmatrix",
    "vmatrix", "Vmatrix", "smallmatrix",
    "eqnarray", "eqnarray*", "flalign", "flalign*",
    "multiline", "multiline*",
];

static RE_BEGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\begin\{([^}]+)\}").unwrap());

static RE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\end\{([^}]+)\}").unwrap());

/// TikZ drawing commands that only make sense inside `tikzpicture`.
static RE_TIKZ_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(node|draw|fill|path|coordinate|filldraw|shade|clip)\s*[\[({]").unwrap()
});

static RE_NODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\node\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCategory {
    EnvMismatch,
    EnvUnclosed,
    FloatInBox,
    TikzOutside,
    TikzNodeLabel,
    StrayAmpersand,
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueCategory::EnvMismatch => "ENV_MISMATCH",
            IssueCategory::EnvUnclosed => "ENV_UNCLOSED",
            IssueCategory::FloatInBox => "FLOAT_IN_BOX",
            IssueCategory::TikzOutside => "TIKZ_OUTSIDE",
            IssueCategory::TikzNodeLabel => "TIKZ_NODE_LABEL",
            IssueCategory::StrayAmpersand => "STRAY_AMPERSAND",
        };
        f.write_str(name)
    }
}

/// One finding from the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub line: usize,
    pub category: IssueCategory,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: [{}] {}", self.line, self.category, self.message)
    }
}

/// Validate a full LaTeX source. Returns all findings, in source order
/// grouped by check.
pub fn check_source(source: &str) -> Vec<Issue> {
    let lines: Vec<(usize, String)> = source
        .lines()
        .enumerate()
        .map(|(i, line)| {
            let kept = match comment_start(line) {
                Some(pos) => &line[..pos],
                None => line,
            };
            (i + 1, kept.to_string())
        })
        .collect();

    let mut issues = Vec::new();
    check_environment_balance(&lines, &mut issues);
    check_floats_in_boxes(&lines, &mut issues);
    check_tikz(&lines, &mut issues);
    check_ampersands(&lines, &mut issues);
    issues
}

/// Balanced `\begin{}`/`\end{}` tracking with mismatch recovery: when an
/// `\end` does not match the innermost open environment but matches one
/// deeper in the stack, everything in between is reported as unclosed.
fn check_environment_balance(lines: &[(usize, String)], issues: &mut Vec<Issue>) {
    let mut stack: Vec<(String, usize)> = Vec::new();

    for (line_no, text) in lines {
        for caps in RE_BEGIN.captures_iter(text) {
            stack.push((caps[1].to_string(), *line_no));
        }
        for caps in RE_END.captures_iter(text) {
            let env = &caps[1];
            match stack.last() {
                None => issues.push(Issue {
                    line: *line_no,
                    category: IssueCategory::EnvMismatch,
                    message: format!("\\end{{{env}}} without matching \\begin{{{env}}}"),
                }),
                Some((top, _)) if top == env => {
                    stack.pop();
                }
                Some((top, top_line)) => {
                    issues.push(Issue {
                        line: *line_no,
                        category: IssueCategory::EnvMismatch,
                        message: format!(
                            "\\end{{{env}}} does not match \\begin{{{top}}} at line {top_line}"
                        ),
                    });
                    if let Some(pos) = stack.iter().rposition(|(name, _)| name == env) {
                        for (name, opened) in stack.drain(pos..).skip(1).rev() {
                            issues.push(Issue {
                                line: opened,
                                category: IssueCategory::EnvUnclosed,
                                message: format!(
                                    "\\begin{{{name}}} opened but never closed \
                                     (interrupted by \\end{{{env}}} at line {line_no})"
                                ),
                            });
                        }
                    }
                }
            }
        }
    }

    for (env, line) in stack {
        issues.push(Issue {
            line,
            category: IssueCategory::EnvUnclosed,
            message: format!("\\begin{{{env}}} opened but never closed (reached end of file)"),
        });
    }
}

fn check_floats_in_boxes(lines: &[(usize, String)], issues: &mut Vec<Issue>) {
    let mut box_stack: Vec<(String, usize)> = Vec::new();

    for (line_no, text) in lines {
        for caps in RE_BEGIN.captures_iter(text) {
            if BOX_ENVS.contains(&&caps[1]) {
                box_stack.push((caps[1].to_string(), *line_no));
            }
        }
        if let Some((parent, opened)) = box_stack.last() {
            for float in ["figure", "table"] {
                if text.contains(&format!("\\begin{{{float}}}")) {
                    issues.push(Issue {
                        line: *line_no,
                        category: IssueCategory::FloatInBox,
                        message: format!(
                            "\\begin{{{float}}} inside \\begin{{{parent}}} (opened at line \
                             {opened}); floats cannot live in theorem boxes"
                        ),
                    });
                }
            }
        }
        for caps in RE_END.captures_iter(text) {
            if BOX_ENVS.contains(&&caps[1]) {
                box_stack.pop();
            }
        }
    }
}

fn check_tikz(lines: &[(usize, String)], issues: &mut Vec<Issue>) {
    let mut depth = 0usize;

    for (line_no, text) in lines {
        if text.contains("\\begin{tikzpicture}") {
            depth += 1;
        }

        if depth == 0 && RE_TIKZ_COMMAND.is_match(text) {
            issues.push(Issue {
                line: *line_no,
                category: IssueCategory::TikzOutside,
                message: format!(
                    "TikZ command outside \\begin{{tikzpicture}}: {}",
                    snippet(text)
                ),
            });
        }

        if depth > 0 {
            for m in RE_NODE.find_iter(text) {
                let after = &text[m.end()..];
                // A node needs a label group, even empty, before the `;`.
                if let Some(semi) = after.find(';') {
                    if !after[..semi].contains('{') {
                        issues.push(Issue {
                            line: *line_no,
                            category: IssueCategory::TikzNodeLabel,
                            message: format!(
                                "\\node without label braces {{}}: {}",
                                snippet(text)
                            ),
                        });
                    }
                }
            }
        }

        if text.contains("\\end{tikzpicture}") {
            depth = depth.saturating_sub(1);
        }
    }
}

fn check_ampersands(lines: &[(usize, String)], issues: &mut Vec<Issue>) {
    let mut depth = 0usize;

    for (line_no, text) in lines {
        let mut opened_here = false;
        for caps in RE_BEGIN.captures_iter(text) {
            if AMPERSAND_ENVS.contains(&&caps[1]) {
                depth += 1;
                opened_here = true;
            }
        }

        // `opened_here` handles single-line environments like
        // \begin{aligned}a&b\end{aligned}.
        if depth == 0 && !opened_here && has_unescaped_ampersand(text) {
            issues.push(Issue {
                line: *line_no,
                category: IssueCategory::StrayAmpersand,
                message: format!(
                    "unescaped '&' outside tabular/align environment, use '\\&' in text: {}",
                    snippet(text)
                ),
            });
        }

        for caps in RE_END.captures_iter(text) {
            if AMPERSAND_ENVS.contains(&&caps[1]) {
                depth = depth.saturating_sub(1);
            }
        }
    }
}

fn has_unescaped_ampersand(line: &str) -> bool {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'&' => return true,
            _ => i += 1,
        }
    }
    false
}

fn snippet(line: &str) -> String {
    let trimmed = line.trim();
    let mut cut = trimmed.len().min(80);
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    trimmed[..cut].to_string()
}
