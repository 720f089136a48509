use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use klib_commonizer::model::DeclKindTag;
use klib_commonizer::{CommonizationOutput, CommonizationStats, commonize, io, tracing_config};
use std::path::{Path, PathBuf};

/// Commonize two platform-specific klib declaration trees.
///
/// Inputs are JSON declaration trees, one per platform. Declarations both
/// platforms agree on become `expect` declarations of the common forest; the
/// platform forests mark them `actual`.
#[derive(Parser, Debug)]
#[command(name = "klc", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Declaration tree of the first platform.
    #[arg(long)]
    first: PathBuf,

    /// Declaration tree of the second platform.
    #[arg(long)]
    second: PathBuf,

    /// Commonizer options as JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Merge packages in parallel.
    #[arg(long)]
    parallel: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write first.json, common.json and second.json into a directory
    Commonize {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory, created if missing.
        #[arg(long)]
        out: PathBuf,

        /// Print the stats summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print every declaration that found no partner, with the reasons
    Diff {
        #[command(flatten)]
        input: InputArgs,
    },
}

fn main() -> Result<()> {
    // Only active when KLC_LOG or RUST_LOG is set.
    tracing_config::init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Commonize { input, out, json } => run_commonize(&input, &out, json),
        Command::Diff { input } => run_diff(&input),
    }
}

fn run(input: &InputArgs) -> Result<CommonizationOutput> {
    let mut options = io::read_options(input.config.as_deref())?;
    options.parallel |= input.parallel;
    let first = io::read_tree(&input.first)?;
    let second = io::read_tree(&input.second)?;
    commonize(&first, &second, &options).context("commonization failed")
}

fn run_commonize(input: &InputArgs, out: &Path, json: bool) -> Result<()> {
    let output = run(input)?;
    io::write_output(out, &output)?;
    if json {
        let stats = serde_json::to_string_pretty(&output.stats).context("failed to serialize stats")?;
        println!("{stats}");
    } else {
        print_stats(&output.stats);
    }
    Ok(())
}

fn run_diff(input: &InputArgs) -> Result<()> {
    let output = run(input)?;
    for record in &output.mismatches {
        println!("{record}");
    }
    Ok(())
}

fn print_stats(stats: &CommonizationStats) {
    println!("{:<12} {:>8} {:>11} {:>12}", "kind", "common", "first-only", "second-only");
    for kind in DeclKindTag::ALL {
        let count = |counts: &std::collections::BTreeMap<DeclKindTag, usize>| {
            counts.get(&kind).copied().unwrap_or(0)
        };
        let (common, first, second) = (
            count(&stats.common),
            count(&stats.first_only),
            count(&stats.second_only),
        );
        if common + first + second > 0 {
            println!("{:<12} {common:>8} {first:>11} {second:>12}", kind.as_str());
        }
    }
    println!(
        "{:<12} {:>8} {:>11} {:>12}",
        "total",
        stats.total_common(),
        stats.total_first_only(),
        stats.total_second_only()
    );
    println!(
        "mismatched pairs: {}, cached classifier pairs: {} ({} hits)",
        stats.mismatches, stats.cache.entries, stats.cache.hits
    );
}
