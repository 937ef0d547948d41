use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use charted_loan_risk::export;
use charted_loan_risk::ingest;
use charted_loan_risk::models::{ProgramAggregate, SourceKind, Table};
use charted_loan_risk::report;
use charted_loan_risk::risk::RiskScorer;
use charted_loan_risk::session::Session;

#[derive(Parser)]
#[command(name = "loan-risk")]
#[command(about = "Student loan delinquency risk pipeline for financial aid teams", long_about = None)]
struct Cli {
    /// Verbose diagnostics on stderr
    #[arg(long, global = true)]
    verbose: bool,
    /// Errors only
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one upload and summarize its canonical columns
    Inspect {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_enum)]
        source: SourceKind,
    },
    /// Score a delinquent borrower report and list the riskiest borrowers
    Score {
        #[arg(long)]
        nslds: PathBuf,
        /// Seed for reproducible scoring
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Run the full pipeline and write CSV exports
    Analyze {
        #[arg(long)]
        nslds: PathBuf,
        #[arg(long)]
        sis: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "exports")]
        out_dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Run the full pipeline and write a markdown report
    Report {
        #[arg(long)]
        nslds: PathBuf,
        #[arg(long)]
        sis: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

fn build_scorer(seed: Option<u64>) -> RiskScorer<rand::rngs::StdRng> {
    match seed {
        Some(seed) => RiskScorer::seeded(seed),
        None => RiskScorer::from_entropy(),
    }
}

fn run_pipeline(
    nslds: &Path,
    sis: &Path,
    seed: Option<u64>,
) -> anyhow::Result<(Session, Option<Vec<ProgramAggregate>>)> {
    let mut session = Session::new();
    let mut scorer = build_scorer(seed);

    session
        .load_nslds(nslds, &mut scorer)
        .with_context(|| format!("failed to process NSLDS file {}", nslds.display()))?;
    session
        .load_sis(sis)
        .with_context(|| format!("failed to process SIS file {}", sis.display()))?;
    session.merge().context("failed to merge data")?;

    // Aggregation degrades to "no analysis" when no program column exists.
    let analysis = session.program_analysis().ok();
    Ok((session, analysis))
}

fn print_score_listing(table: &Table, limit: usize) {
    let mut records: Vec<_> = table.records.iter().collect();
    records.sort_by(|a, b| {
        let a_score = a.risk.map(|r| r.risk_score).unwrap_or_default();
        let b_score = b.risk.map(|r| r.risk_score).unwrap_or_default();
        b_score
            .partial_cmp(&a_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    println!("Top borrowers by risk score:");
    for record in records.iter().take(limit) {
        let Some(risk) = record.risk else { continue };
        println!(
            "- {} ({}) score {:.2} [{}], {} days delinquent, ${:.2} outstanding",
            record.display_name(),
            record.student_id.as_deref().unwrap_or("no id"),
            risk.risk_score,
            risk.risk_tier,
            record.days_delinquent,
            record.outstanding_balance
        );
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Inspect { file, source } => {
            let table = ingest::ingest_path(&file, source)
                .with_context(|| format!("failed to process {}", file.display()))?;

            println!("{} file {}: {} rows", table.source, file.display(), table.len());
            println!("Canonical columns: {}", table.present_columns().join(", "));
            if !table.extra_columns.is_empty() {
                println!("Pass-through columns: {}", table.extra_columns.join(", "));
            }
        }
        Commands::Score {
            nslds,
            seed,
            limit,
            json,
        } => {
            let mut session = Session::new();
            let mut scorer = build_scorer(seed);
            let table = session
                .load_nslds(&nslds, &mut scorer)
                .with_context(|| format!("failed to process NSLDS file {}", nslds.display()))?;

            if table.is_empty() {
                println!("No borrower records found.");
                return Ok(());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&table.records)?);
            } else {
                print_score_listing(table, limit);
            }
        }
        Commands::Analyze {
            nslds,
            sis,
            seed,
            out_dir,
            json,
        } => {
            let (session, analysis) = run_pipeline(&nslds, &sis, seed)?;
            let merged = session.merged().context("pipeline produced no merged table")?;

            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;

            export::write_table_csv(merged, &out_dir.join("merged.csv"))?;
            export::write_table_csv(&session.high_risk()?, &out_dir.join("high_risk.csv"))?;
            if let Some(analysis) = &analysis {
                export::write_program_csv(analysis, &out_dir.join("program_analysis.csv"))?;
            }

            println!(
                "Merged {} student records; exports written to {}.",
                merged.len(),
                out_dir.display()
            );

            match (&analysis, json) {
                (Some(analysis), true) => {
                    println!("{}", serde_json::to_string_pretty(analysis)?)
                }
                (Some(analysis), false) => {
                    println!("Program risk rankings:");
                    for aggregate in analysis {
                        println!(
                            "- {}: avg risk {:.2} ({}) across {} students",
                            aggregate.program,
                            aggregate.avg_risk,
                            aggregate.risk_tier,
                            aggregate.student_count
                        );
                    }
                }
                (None, _) => {
                    println!("No program analysis available - ensure the SIS data includes academic program information.");
                }
            }
        }
        Commands::Report {
            nslds,
            sis,
            seed,
            out,
        } => {
            let (session, analysis) = run_pipeline(&nslds, &sis, seed)?;
            let merged = session.merged().context("pipeline produced no merged table")?;

            let report = report::build_report(
                merged,
                analysis.as_deref(),
                &session.cdr_projection()?,
                chrono::Utc::now().date_naive(),
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
