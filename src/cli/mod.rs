//! Command-line interface for rust_stager

use clap::{Parser, Subcommand};

use crate::error::{Result, StageRError};

#[derive(Parser)]
#[command(name = "rust_stager")]
#[command(version)]
#[command(about = "Stage-wise multiple testing correction in Rust")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the screening and confirmation stages
    #[command(
        about = "Run stage-wise adjustment",
        long_about = "Run stage-wise adjustment\n\n\
            Screening p-values (one per gene) are BH-adjusted and genes are selected\n\
            at the target OFDR. Within each selected gene, confirmation p-values are\n\
            corrected for the family-wise error rate at the screening-adjusted level.\n\n\
            Without --tx2gene the confirmation file holds one column per hypothesis\n\
            (e.g. contrasts). With --tx2gene it holds one row per transcript and the\n\
            map assigns transcripts to genes.",
        after_long_help = "\
Examples:
  # Multiple contrasts per gene, Holm within genes
  rust_stager adjust -s screen.tsv -c contrasts.tsv --method holm -o padj.tsv

  # Differential transcript usage
  rust_stager adjust -s genes.tsv -c transcripts.tsv --tx2gene tx2gene.tsv \\
    --method dtu --alpha 0.05 -o dtu_padj.tsv

  # User-specified multipliers for three contrasts
  rust_stager adjust -s screen.tsv -c contrasts.tsv --method user --adjustment 2,1,1"
    )]
    Adjust {
        /// Path to screening p-values
        #[arg(short, long,
            long_help = "Path to screening p-values.\n\
                Format: first column = gene IDs, second column = screening p-value.\n\
                Supports both CSV (comma) and TSV (tab) delimiters (auto-detected).")]
        screen: String,

        /// Path to confirmation p-values
        #[arg(short, long,
            long_help = "Path to confirmation p-values.\n\
                Format: first column = gene IDs (or transcript IDs with --tx2gene),\n\
                remaining columns = p-values. NA marks an untested hypothesis.")]
        confirmation: String,

        /// Transcript to gene map
        #[arg(short = 'm', long, value_name = "PATH",
            long_help = "Two-column map of transcript IDs to gene IDs.\n\
                Switches to the variable-hypothesis (transcript-level) analysis.")]
        tx2gene: Option<String>,

        /// Confirmation method [default: holm]
        #[arg(long, default_value = "holm",
            long_help = "Within-gene correction for the confirmation stage.\n\
                none: no correction (only when at most one null can remain true)\n\
                holm: Holm step-down\n\
                dtu:  Holm-Shaffer for transcript usage; genes with one transcript are not tested\n\
                user: multipliers given by --adjustment")]
        method: String,

        /// Rank multipliers for --method user
        #[arg(long, value_delimiter = ',', value_name = "M1,M2,...",
            long_help = "Comma-separated multipliers for --method user.\n\
                The first applies to the smallest p-value within a gene,\n\
                the second to the next smallest, and so on.")]
        adjustment: Vec<f64>,

        /// Target OFDR [default: 0.05]
        #[arg(short, long, default_value = "0.05")]
        alpha: f64,

        /// Screening p-values are already FDR-adjusted
        #[arg(long)]
        screen_adjusted: bool,

        /// Allow NA confirmation p-values
        #[arg(long)]
        allow_na: bool,

        /// Only report genes passing the screening stage
        #[arg(long)]
        only_significant: bool,

        /// Sort output by screening adjusted p-value
        #[arg(long)]
        order: bool,

        /// Output file path [default: stager_results.tsv]
        #[arg(short, long, default_value = "stager_results.tsv")]
        output: String,

        /// Also write the binary significance table
        #[arg(long, value_name = "PATH")]
        significance: Option<String>,

        /// Output format [default: tsv]
        #[arg(long, default_value = "tsv",
            long_help = "Output format.\n\
                tsv:  adjusted p-value table\n\
                json: full results including per-hypothesis outcomes\n\
                      (not combined with --only-significant or --order)")]
        format: String,

        /// Number of threads (0 = auto) [default: 0]
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,
    },
}

/// Check the output format and the table options that apply to it
///
/// `--only-significant` and `--order` shape the adjusted p-value table, which
/// only the TSV output writes.
pub fn check_output_options(format: &str, only_significant: bool, order: bool) -> Result<()> {
    match format {
        "tsv" => Ok(()),
        "json" if only_significant || order => Err(StageRError::InvalidInput {
            reason: "--only-significant and --order apply to TSV output only".to_string(),
        }),
        "json" => Ok(()),
        other => Err(StageRError::InvalidInput {
            reason: format!("Unknown output format '{}'. Use 'tsv' or 'json'.", other),
        }),
    }
}
