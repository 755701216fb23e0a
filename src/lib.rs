//! texbuild: LaTeX build orchestration.
//!
//! Turns a `.tex` source into a finished PDF, handling the decisions a
//! human normally makes by hand:
//!
//! - **engine selection**: pdflatex, or xelatex/lualatex when the source
//!   asks for system fonts, CJK/RTL shaping, or Lua extensions;
//! - **auxiliary passes**: bibtex/biber, makeindex, makeglossaries,
//!   interleaved with the extra engine passes cross-references need;
//! - **auto-fix**: default float placement up front, microtype injection
//!   when the first pass reports overfull lines;
//! - **log triage**: the final log classified into actionable diagnostics;
//! - **previews**: optional per-page PNG rasterisation;
//! - **cleanup**: the auxiliary artifact family removed afterwards.
//!
//! All rewriting happens in a throwaway working tree; the original source
//! is never touched. The CLI in `main.rs` is a thin shell over this
//! library.

pub mod analyse;
pub mod check;
pub mod clean;
pub mod driver;
pub mod floats;
pub mod microtype;
pub mod pdfa;
pub mod preview;
pub mod resolve;
pub mod runner;
pub mod scan;
pub mod tools;
