//! Engine and auxiliary-tool resolution.
//!
//! Maps a [`ScanReport`](crate::scan::ScanReport) plus an optional user
//! override to a [`BuildPlan`]: which engine binary to drive, which
//! bibliography tool, and whether index/glossary passes are needed.

use crate::scan::ScanReport;
use clap::ValueEnum;

/// The three engine families texbuild can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    /// Classic engine, no system-font access.
    Pdflatex,
    /// System fonts, CJK and RTL shaping (fontspec/xeCJK/polyglossia).
    Xelatex,
    /// Lua extensions (luacode/luatextra/\directlua).
    Lualatex,
}

impl Engine {
    /// Name of the engine binary.
    pub fn program(self) -> &'static str {
        match self {
            Engine::Pdflatex => "pdflatex",
            Engine::Xelatex => "xelatex",
            Engine::Lualatex => "lualatex",
        }
    }

    /// The latexmk flag selecting this engine.
    pub fn latexmk_flag(self) -> &'static str {
        match self {
            Engine::Pdflatex => "-pdf",
            Engine::Xelatex => "-xelatex",
            Engine::Lualatex => "-lualatex",
        }
    }
}

/// Which bibliography processor to run between engine passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BibTool {
    Bibtex,
    Biber,
}

impl BibTool {
    pub fn program(self) -> &'static str {
        match self {
            BibTool::Bibtex => "bibtex",
            BibTool::Biber => "biber",
        }
    }
}

/// The resolved plan for one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildPlan {
    pub engine: Engine,
    pub bib: Option<BibTool>,
    pub index: bool,
    pub glossary: bool,
}

impl BuildPlan {
    /// Whether a third engine pass is needed after PASS2 to settle
    /// numbering moved by bibliography/index/glossary material.
    pub fn needs_final_pass(&self) -> bool {
        self.bib.is_some() || self.index || self.glossary
    }
}

/// Resolve the build plan from scanner facts and an optional forced engine.
///
/// Engine priority: override > system-font signals (fontspec, xeCJK,
/// polyglossia) > Lua extensions > pdflatex. The system-font check comes
/// first deliberately: a source using both fontspec and luacode gets
/// xelatex.
pub fn resolve(report: &ScanReport, forced: Option<Engine>) -> BuildPlan {
    let engine = match forced {
        Some(engine) => engine,
        None if report.fontspec || report.cjk || report.polyglossia => Engine::Xelatex,
        None if report.luatex => Engine::Lualatex,
        None => Engine::Pdflatex,
    };

    // Historical precedence: the classic \bibliography{} workflow wins over
    // \addbibresource{} when a source carries both.
    let bib = if report.bibtex {
        Some(BibTool::Bibtex)
    } else if report.biber {
        Some(BibTool::Biber)
    } else {
        None
    };

    BuildPlan {
        engine,
        bib,
        index: report.index,
        glossary: report.glossary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ScanReport {
        ScanReport::default()
    }

    #[test]
    fn plain_source_gets_pdflatex() {
        let plan = resolve(&report(), None);
        assert_eq!(plan.engine, Engine::Pdflatex);
        assert_eq!(plan.bib, None);
        assert!(!plan.needs_final_pass());
    }

    #[test]
    fn fontspec_gets_xelatex() {
        let plan = resolve(&ScanReport { fontspec: true, ..report() }, None);
        assert_eq!(plan.engine, Engine::Xelatex);
    }

    #[test]
    fn cjk_gets_xelatex() {
        let plan = resolve(&ScanReport { cjk: true, ..report() }, None);
        assert_eq!(plan.engine, Engine::Xelatex);
    }

    #[test]
    fn polyglossia_gets_xelatex() {
        let plan = resolve(&ScanReport { polyglossia: true, ..report() }, None);
        assert_eq!(plan.engine, Engine::Xelatex);
    }

    #[test]
    fn luatex_gets_lualatex() {
        let plan = resolve(&ScanReport { luatex: true, ..report() }, None);
        assert_eq!(plan.engine, Engine::Lualatex);
    }

    #[test]
    fn system_font_beats_luatex_when_both_present() {
        let plan = resolve(
            &ScanReport { fontspec: true, luatex: true, ..report() },
            None,
        );
        assert_eq!(plan.engine, Engine::Xelatex);
    }

    #[test]
    fn override_always_wins() {
        let plan = resolve(
            &ScanReport { fontspec: true, cjk: true, ..report() },
            Some(Engine::Pdflatex),
        );
        assert_eq!(plan.engine, Engine::Pdflatex);
    }

    #[test]
    fn bibtex_beats_biber() {
        let plan = resolve(
            &ScanReport { bibtex: true, biber: true, ..report() },
            None,
        );
        assert_eq!(plan.bib, Some(BibTool::Bibtex));
    }

    #[test]
    fn biber_alone_selected() {
        let plan = resolve(&ScanReport { biber: true, ..report() }, None);
        assert_eq!(plan.bib, Some(BibTool::Biber));
    }

    #[test]
    fn final_pass_from_any_auxiliary() {
        assert!(resolve(&ScanReport { bibtex: true, ..report() }, None).needs_final_pass());
        assert!(resolve(&ScanReport { index: true, ..report() }, None).needs_final_pass());
        assert!(resolve(&ScanReport { glossary: true, ..report() }, None).needs_final_pass());
    }
}
