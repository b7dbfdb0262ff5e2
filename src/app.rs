//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - fetches the workbook, bulletin, and feed aggregates
//! - reconciles them into one daily series
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, PlotArgs, RunArgs};
use crate::data::DEFAULT_USER_AGENT;
use crate::domain::RunConfig;
use crate::error::PipelineError;

pub mod pipeline;

/// Entry point for the `epi` binary.
pub fn run() -> Result<(), PipelineError> {
    dotenvy::dotenv().ok();

    // We want `epi` and `epi -v` to behave like `epi run ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing. This preserves a clean clap structure while
    // retaining the requested UX.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    init_logging(cli.verbose);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Totals => handle_totals(),
        Command::Plot(args) => handle_plot(args),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .init();
}

fn handle_run(args: RunArgs) -> Result<(), PipelineError> {
    let config = run_config_from_args(&args);
    let run = pipeline::run_pipeline(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.series, &run.signals, &run.sources)
    );
    if let Some(evidence) = &run.evidence {
        println!("{}", crate::report::format_totals(evidence));
    }
    println!(
        "{}",
        crate::report::format_tail(&run.series, &run.signals, config.tail)
    );

    if config.plot {
        let plot = crate::plot::render_signal_plot(
            &run.series.dates(),
            &run.signals.daily_new,
            &run.signals.daily_new_mean7,
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    // Optional exports.
    if let Some(path) = &config.chart {
        crate::plot::write_signal_chart(path, &run.series.dates(), &run.signals)?;
    }
    if let Some(path) = &config.export_csv {
        crate::io::export::write_series_csv(path, &run.series, &run.signals)?;
    }
    if let Some(path) = &config.export_series {
        crate::io::export::write_series_json(path, &run.series, &run.signals)?;
    }

    Ok(())
}

fn handle_totals() -> Result<(), PipelineError> {
    let client = crate::data::feature::FeatureClient::new(&user_agent_from_env())?;
    let evidence = crate::data::aggregates::fetch_evidence(&client)?;

    println!("{}", crate::report::format_totals(&evidence));
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), PipelineError> {
    let (series, signals) = crate::io::export::read_series_json(&args.series)?;

    if let Some(path) = &args.chart {
        crate::plot::write_signal_chart(path, &series.dates(), &signals)?;
        return Ok(());
    }

    let plot = crate::plot::render_signal_plot(
        &series.dates(),
        &signals.daily_new,
        &signals.daily_new_mean7,
        args.width,
        args.height,
    );
    println!("{plot}");
    Ok(())
}

pub fn run_config_from_args(args: &RunArgs) -> RunConfig {
    let cache_dir = args
        .cache_dir
        .clone()
        .or_else(|| std::env::var_os("EPI_CACHE_DIR").map(Into::into))
        .unwrap_or_else(|| ".".into());

    RunConfig {
        cache_dir,
        user_agent: user_agent_from_env(),
        use_bulletin: !args.skip_bulletin,
        use_feed: !args.skip_feed,
        tail: args.tail,
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        chart: args.chart.clone(),
        export_csv: args.export.clone(),
        export_series: args.export_series.clone(),
    }
}

fn user_agent_from_env() -> String {
    std::env::var("EPI_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string())
}

/// Rewrite argv so `epi` defaults to `epi run`.
///
/// Rules:
/// - `epi`                      -> `epi run`
/// - `epi --tail 14 ...`        -> `epi run --tail 14 ...`
/// - `epi --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "totals" | "plot");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "run flags".
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}
