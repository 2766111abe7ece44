//! sqamark CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sqamark", version, about = "SQA-style exam validation, marking and grading")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check exam (and optionally submission) documents against the exam contract
    Validate {
        /// Exam JSON file or directory of exams
        #[arg(long)]
        exam: PathBuf,

        /// Submission JSON to check against the exam
        #[arg(long)]
        submission: Option<PathBuf>,
    },

    /// Mark one submission, or a directory of submissions, against an exam
    Evaluate {
        /// Exam JSON file
        #[arg(long)]
        exam: PathBuf,

        /// Submission JSON file or directory
        #[arg(long)]
        submission: PathBuf,

        /// Judge name from the config (default: the config's default_judge)
        #[arg(long)]
        judge: Option<String>,

        /// Model override for LLM judges
        #[arg(long)]
        model: Option<String>,

        /// Output file (single submission) or directory (batch)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Emit a recommendation for every topic, not only weak ones
        #[arg(long)]
        full_coverage: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Resolve a percentage to a grade
    Grade {
        /// Percentage score (0-100)
        #[arg(long)]
        percentage: f64,

        /// Qualification level whose band table to use
        #[arg(long)]
        level: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two evaluation results for the same submission
    Compare {
        /// Baseline evaluation JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current evaluation JSON
        #[arg(long)]
        current: PathBuf,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,

        /// Exit code 1 if any mark or grade changed
        #[arg(long)]
        fail_on_change: bool,
    },

    /// Cohort statistics over a directory of evaluation results
    Stats {
        /// Exam JSON file the results were graded against
        #[arg(long)]
        exam: PathBuf,

        /// Directory of evaluation result JSON files
        #[arg(long)]
        evaluations: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List configured judges
    ListJudges {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config and example documents
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sqamark=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { exam, submission } => commands::validate::execute(exam, submission),
        Commands::Evaluate {
            exam,
            submission,
            judge,
            model,
            output,
            full_coverage,
            config,
        } => {
            commands::evaluate::execute(commands::evaluate::EvaluateArgs {
                exam,
                submission,
                judge,
                model,
                output,
                full_coverage,
                config,
            })
            .await
        }
        Commands::Grade {
            percentage,
            level,
            config,
        } => commands::grade::execute(percentage, level, config),
        Commands::Compare {
            baseline,
            current,
            format,
            fail_on_change,
        } => commands::compare::execute(baseline, current, format, fail_on_change),
        Commands::Stats {
            exam,
            evaluations,
            format,
        } => commands::stats::execute(exam, evaluations, format),
        Commands::ListJudges { config } => commands::list_judges::execute(config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
