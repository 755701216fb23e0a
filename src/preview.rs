//! Page-image previews via `pdftoppm`.
//!
//! One PNG per page, longer edge bounded by the caller's max dimension.
//! All the logic here is output-path construction; the rasterising is
//! poppler's job.

use crate::runner::{run, RunOutcome, StdioPolicy};
use crate::tools::require_tool;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Rasterise `pdf` into `out_dir`, one `base-<page>.png` per page, each
/// scaled so its longer edge is at most `max_pixel`. Returns the produced
/// image paths in page order.
pub fn rasterise(pdf: &Path, out_dir: &Path, max_pixel: u32) -> Result<Vec<PathBuf>> {
    let pdftoppm = require_tool("pdftoppm")?;
    let base = pdf
        .file_stem()
        .and_then(|s| s.to_str())
        .context("PDF path has no usable file name")?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    // A longer previous document leaves trailing page images behind;
    // sweep them so the collected set matches this PDF exactly.
    remove_stale_pages(out_dir, base)?;

    let prefix = out_dir.join(base);
    let scale = max_pixel.to_string();
    let args = [
        "-png",
        "-scale-to",
        scale.as_str(),
        pdf.to_str().context("PDF path is not valid UTF-8")?,
        prefix.to_str().context("output path is not valid UTF-8")?,
    ];
    let outcome: RunOutcome = run(&pdftoppm, &args, out_dir, StdioPolicy::Quiet, None)?;
    if !outcome.success() {
        bail!("pdftoppm failed on {}", pdf.display());
    }

    collect_pages(out_dir, base)
}

fn page_pattern(base: &str) -> Result<Regex> {
    Regex::new(&format!("^{}-(\\d+)\\.png$", regex::escape(base)))
        .context("invalid preview file pattern")
}

/// Delete existing `base-<page>.png` files from `out_dir`.
fn remove_stale_pages(out_dir: &Path, base: &str) -> Result<()> {
    let pattern = page_pattern(base)?;
    for entry in std::fs::read_dir(out_dir)
        .with_context(|| format!("failed to read {}", out_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if pattern.is_match(name) {
            std::fs::remove_file(entry.path())
                .with_context(|| format!("failed to remove {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Gather `base-<page>.png` files and sort them numerically; pdftoppm
/// zero-pads page indices only when the document is long enough.
fn collect_pages(out_dir: &Path, base: &str) -> Result<Vec<PathBuf>> {
    let pattern = page_pattern(base)?;

    let mut pages: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(out_dir)
        .with_context(|| format!("failed to read {}", out_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = pattern.captures(name) {
            let page: u32 = caps[1].parse().unwrap_or(0);
            pages.push((page, entry.path()));
        }
    }

    if pages.is_empty() {
        bail!("pdftoppm produced no page images in {}", out_dir.display());
    }
    pages.sort_by_key(|(page, _)| *page);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn collects_pages_in_numeric_order() {
        let dir = TempDir::new().unwrap();
        for name in ["doc-10.png", "doc-2.png", "doc-1.png"] {
            fs::write(dir.path().join(name), "png").unwrap();
        }
        fs::write(dir.path().join("other-1.png"), "png").unwrap();
        fs::write(dir.path().join("doc-1.jpg"), "jpg").unwrap();

        let pages = collect_pages(dir.path(), "doc").unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["doc-1.png", "doc-2.png", "doc-10.png"]);
    }

    #[test]
    fn zero_padded_pages_sort_correctly() {
        let dir = TempDir::new().unwrap();
        for name in ["doc-01.png", "doc-02.png", "doc-11.png"] {
            fs::write(dir.path().join(name), "png").unwrap();
        }
        let pages = collect_pages(dir.path(), "doc").unwrap();
        assert_eq!(pages.len(), 3);
        assert!(pages[0].ends_with("doc-01.png"));
        assert!(pages[2].ends_with("doc-11.png"));
    }

    #[test]
    fn empty_output_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(collect_pages(dir.path(), "doc").is_err());
    }

    #[test]
    fn stale_pages_are_swept_before_rasterising() {
        let dir = TempDir::new().unwrap();
        for name in ["doc-1.png", "doc-2.png", "doc-7.png"] {
            fs::write(dir.path().join(name), "old").unwrap();
        }
        fs::write(dir.path().join("other-1.png"), "keep").unwrap();

        remove_stale_pages(dir.path(), "doc").unwrap();
        assert!(!dir.path().join("doc-1.png").exists());
        assert!(!dir.path().join("doc-7.png").exists());
        assert!(dir.path().join("other-1.png").exists());
    }

    #[test]
    fn base_with_regex_metacharacters() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("my.doc-1.png"), "png").unwrap();
        let pages = collect_pages(dir.path(), "my.doc").unwrap();
        assert_eq!(pages.len(), 1);
    }
}
