use anyhow::{Context, Result};
use clap::Parser;
use coruscant::cli::{Cli, OutputFormat};
use coruscant::{analysis, report, summary::DependencySummary};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Text output: summary, score table or details depending on verbosity
fn print_text(
    args: &Cli,
    summary: &DependencySummary,
    results: &analysis::AnalysisReport,
) -> Result<()> {
    match args.verbose {
        0 => print!("{}", report::render_summary(results)),
        1 => print!("{}", report::render_scores(results)),
        _ => print!("{}", report::render_details(results)),
    }

    if let Some(span) = &args.mc {
        let view = report::render_span(summary, results, span)?;
        print!("{}", view);
    }

    if args.print_fault {
        print!("{}", report::render_fault_probabilities(summary, &args.spans));
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let config = args.analysis_config()?;
    let summary = DependencySummary::from_jsonl_file(&args.path)
        .with_context(|| format!("Failed to load summary {}", args.path.display()))?;

    let results = analysis::analyze(&summary, &config).context("Analysis failed")?;

    match args.format {
        OutputFormat::Json => println!("{}", report::render_json(&results)?),
        OutputFormat::Text => print_text(&args, &summary, &results)?,
    }
    Ok(())
}
