//! Command-line parsing for the RKI series builder.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fetch/reconcile code.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "epi", version, about = "SARS-CoV-2 daily series builder (RKI data)")]
pub struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the reconciled daily series, print summary/tail, and optionally plot/export.
    Run(RunArgs),
    /// Print the feed's current aggregate totals (no workbook involved).
    Totals,
    /// Plot a previously exported series JSON.
    Plot(PlotArgs),
}

/// Options for a full run.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Directory for the cached workbook (defaults to $EPI_CACHE_DIR, then ".").
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Do not consult the bulletin page for a fresher day.
    #[arg(long)]
    pub skip_bulletin: bool,

    /// Do not consult the feature-service aggregates.
    #[arg(long)]
    pub skip_feed: bool,

    /// Days of the series tail to print.
    #[arg(long, default_value_t = 7)]
    pub tail: usize,

    /// Disable the terminal plot (enabled by default).
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Write an SVG chart of the derived signals.
    #[arg(long, value_name = "SVG")]
    pub chart: Option<PathBuf>,

    /// Export the series and signals to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the series and signals to JSON.
    #[arg(long = "export-series")]
    pub export_series: Option<PathBuf>,
}

/// Options for plotting a saved series.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Series JSON file produced by `epi run --export-series`.
    #[arg(long, value_name = "JSON")]
    pub series: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Write an SVG chart instead of the terminal plot.
    #[arg(long, value_name = "SVG")]
    pub chart: Option<PathBuf>,
}
