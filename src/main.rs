//! texbuild CLI, a thin shell over the library in `lib.rs`.
//!
//! Exit codes: 0 when a PDF exists at the canonical location (or
//! `--clean`/`--check` succeeded), 1 otherwise, 130 on interrupt.
//! Everything user-facing goes to stderr; stdout stays silent.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use texbuild::check::check_source;
use texbuild::clean::clean;
use texbuild::driver::{build, install_interrupt_handler, BuildOptions, SourceDoc};
use texbuild::preview::rasterise;
use texbuild::resolve::Engine;
use texbuild::runner::StdioPolicy;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "texbuild",
    about = "Compile a LaTeX source to PDF with automatic engine and pass selection"
)]
struct Cli {
    /// The LaTeX source file
    source: PathBuf,

    /// Rasterise one PNG per page after a successful build
    #[arg(long)]
    preview: bool,

    /// Output directory for previews (default: the source directory)
    #[arg(long, value_name = "DIR")]
    preview_dir: Option<PathBuf>,

    /// Maximum pixel dimension of preview images
    #[arg(long, default_value_t = 1200, value_name = "N")]
    scale: u32,

    /// Force an engine instead of auto-detecting one
    #[arg(long, value_enum)]
    engine: Option<Engine>,

    /// Add default float placement, and load microtype when the first
    /// pass reports overfull lines
    #[arg(long)]
    auto_fix: bool,

    /// Request the PDF/A archival output profile
    #[arg(long)]
    pdfa: bool,

    /// Defer the multi-pass logic to latexmk
    #[arg(long)]
    use_latexmk: bool,

    /// Pass child-process output through
    #[arg(long, conflicts_with = "quiet")]
    verbose: bool,

    /// Discard all child-process output and artifact notes
    #[arg(long)]
    quiet: bool,

    /// Remove auxiliary build artifacts and exit
    #[arg(long)]
    clean: bool,

    /// Validate the source (environments, stray '&', TikZ placement)
    /// without compiling
    #[arg(long)]
    check: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "texbuild=debug"
    } else if quiet {
        "texbuild=error"
    } else {
        "texbuild=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    install_interrupt_handler()?;
    let doc = SourceDoc::locate(&cli.source)?;

    if cli.clean {
        let removed = clean(&doc.dir, &doc.base);
        tracing::info!(removed, "cleaned auxiliary artifacts");
        return Ok(0);
    }

    if cli.check {
        return check_mode(&doc);
    }

    let policy = if cli.verbose {
        StdioPolicy::Verbose
    } else if cli.quiet {
        StdioPolicy::Quiet
    } else {
        StdioPolicy::Filtered
    };

    let opts = BuildOptions {
        forced_engine: cli.engine,
        auto_fix: cli.auto_fix,
        pdfa: cli.pdfa,
        use_latexmk: cli.use_latexmk,
        policy,
    };

    let outcome = build(&doc, &opts)?;

    for diagnostic in &outcome.diagnostics {
        eprintln!("{diagnostic}");
    }

    if let Some(pdf) = &outcome.pdf {
        if !cli.quiet {
            eprintln!("PDF: {}", pdf.display());
        }
        if cli.preview {
            let out_dir = cli.preview_dir.as_deref().unwrap_or(&doc.dir);
            let images = rasterise(pdf, out_dir, cli.scale)?;
            if !cli.quiet {
                for image in &images {
                    eprintln!("preview: {}", image.display());
                }
            }
        }
    } else if outcome.exit_code != 0 {
        eprintln!("build failed: no PDF produced");
    }

    Ok(outcome.exit_code)
}

fn check_mode(doc: &SourceDoc) -> Result<i32> {
    let source = std::fs::read_to_string(&doc.path)?;
    let issues = check_source(&source);
    if issues.is_empty() {
        eprintln!("OK: no problems found in {}", doc.path.display());
        return Ok(0);
    }
    for issue in &issues {
        eprintln!("{}: {issue}", doc.path.display());
    }
    eprintln!("{} problem(s) found", issues.len());
    Ok(1)
}
