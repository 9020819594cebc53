//! rust_stager command-line interface

use std::fs::File;
use std::io::BufWriter;

use clap::Parser;
use log::{info, LevelFilter};

use rust_stager::cli::{check_output_options, Cli, Commands};
use rust_stager::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["adjust", "help"];
    let has_subcommand = first_positional.map_or(false, |a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help") {
            print_long_help();
            return;
        }
        if args.iter().any(|a| a == "-h") {
            print_short_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("rust_stager {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Adjust {
            screen,
            confirmation,
            tx2gene,
            method,
            adjustment,
            alpha,
            screen_adjusted,
            allow_na,
            only_significant,
            order,
            output,
            significance,
            format,
            threads,
        }) => run_adjust(
            &screen,
            &confirmation,
            tx2gene.as_deref(),
            &method,
            adjustment,
            alpha,
            screen_adjusted,
            allow_na,
            only_significant,
            order,
            &output,
            significance.as_deref(),
            &format,
            threads,
        ),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Custom help output
// ---------------------------------------------------------------------------

fn print_no_args() {
    println!("rust_stager v{}", VERSION);
    println!("Run `rust_stager -h` for usage or `rust_stager --help` for detailed information.");
}

fn print_short_help() {
    println!("rust_stager v{}", VERSION);
    println!();
    println!("Usage: rust_stager <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  adjust     Run stage-wise adjustment");
    println!();
    println!("Run `rust_stager <COMMAND> -h` for command-specific options.");
}

fn print_long_help() {
    println!("rust_stager v{}", VERSION);
    println!("Stage-wise multiple testing correction for gene-level screening and confirmation");
    println!();
    println!("Usage: rust_stager <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  adjust     Run stage-wise adjustment");
    println!("               - BH screening across genes at the target OFDR");
    println!("               - Within-gene FWER correction: none, holm, dtu, user");
    println!("               - Fixed hypotheses per gene or transcripts via --tx2gene");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -h               Print short help");
    println!("      --help       Print detailed help");
    println!("  -V, --version    Print version");
    println!();
    println!("Examples:");
    println!("  rust_stager adjust -s screen.tsv -c contrasts.tsv --method holm -o padj.tsv");
    println!();
    println!("  rust_stager adjust -s genes.tsv -c transcripts.tsv --tx2gene tx2gene.tsv \\");
    println!("    --method dtu -o dtu_padj.tsv");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn run_adjust(
    screen_path: &str,
    confirmation_path: &str,
    tx2gene_path: Option<&str>,
    method_name: &str,
    adjustment: Vec<f64>,
    alpha: f64,
    screen_adjusted: bool,
    allow_na: bool,
    only_significant: bool,
    order: bool,
    output_path: &str,
    significance_path: Option<&str>,
    format: &str,
    threads: usize,
) -> Result<()> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }

    check_output_options(format, only_significant, order)?;

    let adjustment = if adjustment.is_empty() { None } else { Some(adjustment) };
    let method = ConfirmationMethod::from_name(method_name, adjustment)?;
    let params = StageWiseParams::new(method, alpha);
    params.validate()?;

    info!("Loading screening p-values from: {}", screen_path);
    let screen = read_screening(screen_path)?;
    info!("  {} units", screen.ids.len());

    info!("Loading confirmation p-values from: {}", confirmation_path);
    let confirmation = read_confirmation(confirmation_path)?;

    let builder = StageWiseProblem::builder()
        .screening(screen.ids, screen.pvalues)
        .screen_adjusted(screen_adjusted)
        .allow_missing(allow_na);

    let problem = match tx2gene_path {
        Some(map_path) => {
            info!("Loading transcript to gene map from: {}", map_path);
            let map = read_sub_unit_map(map_path)?;
            if confirmation.column_names.len() > 1 {
                log::warn!(
                    "Confirmation file has {} p-value columns; using '{}' for transcripts",
                    confirmation.column_names.len(),
                    confirmation.column_names[0]
                );
            }
            let pvalues = confirmation.pvalues.column(0).to_vec();
            builder
                .sub_units(confirmation.row_ids, pvalues, map)
                .build()?
        }
        None => builder
            .confirmation(
                confirmation.row_ids,
                confirmation.pvalues,
                confirmation.column_names,
            )
            .build()?,
    };
    info!(
        "  {} hypotheses across {} units",
        problem.n_hypotheses(),
        problem.n_units()
    );

    let results = stage_wise_adjustment(&problem, &params)?;

    info!("Writing results to: {}", output_path);
    match format {
        "json" => {
            let writer = BufWriter::new(File::create(output_path)?);
            serde_json::to_writer_pretty(writer, &results)?;
        }
        _ => {
            let table = results.adjusted_pvalues(only_significant, order);
            write_adjusted_pvalues(output_path, &table)?;
        }
    }

    if let Some(path) = significance_path {
        info!("Writing significance table to: {}", path);
        write_significance(path, &results.significance())?;
    }

    println!("{}", results.summary());
    Ok(())
}
