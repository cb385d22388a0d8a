use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use clover_merge::cli::{Invocation, Options, Style};
use clover_merge::telemetry;

/// clover-merge — Merge Clover XML coverage reports into a single report.
#[derive(Parser)]
#[command(name = "clover-merge", version, about)]
struct Cli {
    /// Path to write the merged report to.
    #[arg(short, long, env = "CLOVER_MERGE_OUTPUT")]
    output: PathBuf,

    /// Merge mode: additive, exclusive or inclusive.
    #[arg(short, long, env = "CLOVER_MERGE_MODE", default_value = "inclusive")]
    mode: String,

    /// Exit with failure unless final coverage is above this percentage.
    #[arg(short, long, default_value_t = 0.0)]
    enforce: f64,

    /// Summary output style.
    #[arg(long, value_enum, default_value = "text")]
    format: Style,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,

    /// Clover XML files to merge, in merge order.
    paths: Vec<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    telemetry::init(cli.quiet);

    let invocation = Invocation::new(Options {
        output: cli.output,
        mode: cli.mode,
        enforce: cli.enforce,
        paths: cli.paths,
    })
    .context("Invalid invocation")?;

    let outcome = invocation.execute().context("Merge failed")?;
    print!("{}", outcome.render(cli.format));

    Ok(if outcome.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
