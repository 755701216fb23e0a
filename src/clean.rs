//! Auxiliary artifact removal.
//!
//! A LaTeX build scatters sidecar files next to the source. [`clean`]
//! removes exactly the enumerated set for one base name and touches
//! nothing else. Removal is best-effort: I/O errors are logged and never
//! fail the build.

use std::path::Path;

/// Single-extension auxiliary artifacts, keyed by base name.
const AUX_EXTENSIONS: &[&str] = &[
    "aux", // cross-reference sidecar
    "log", // engine pass log
    "toc", "lof", "lot", // table of contents / figures / tables
    "nav", "snm", "vrb", // beamer navigation / notes / overlay verbatim
    "bbl", "blg", // bibtex output and log
    "idx", "ilg", "ind", // index raw entries, log, processed index
    "bcf", // biblatex control file
    "glo", "gls", "glg", // glossary raw, processed, log
    "ist", // index style
    "acn", "acr", "alg", // acronym raw, processed, log
    "fls", // file list
    "fdb_latexmk", // latexmk fingerprint
    "xdv", // xelatex intermediate DVI
];

/// Multi-dot suffixes that `Path::set_extension` would mangle.
const AUX_SUFFIXES: &[&str] = &["run.xml", "synctex.gz"];

/// Remove the auxiliary artifacts for `base` from `dir`. Returns the
/// number of files removed. Idempotent.
pub fn clean(dir: &Path, base: &str) -> usize {
    let mut removed = 0;
    let names = AUX_EXTENSIONS
        .iter()
        .chain(AUX_SUFFIXES.iter())
        .map(|suffix| format!("{base}.{suffix}"));
    for name in names {
        let path = dir.join(&name);
        if !path.is_file() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed auxiliary file");
                removed += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not remove");
            }
        }
    }
    removed
}
