use crate::collision::Movement;
use crate::config::load_config;
use crate::dump::write_resolution_dump;
use crate::ir::{ChartSpec, build_chart};
use crate::render::{write_output_png, write_output_svg};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "declutter",
    version,
    about = "Render a chart description to SVG/PNG with overlapping labels moved apart"
)]
pub struct Args {
    /// Chart description (.json / .json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Write the resolved label placement as JSON
    #[arg(long = "dump")]
    pub dump: Option<PathBuf>,

    /// Draw the label and obstacle boxes the resolver used
    #[arg(long = "debug-overlay")]
    pub debug_overlay: bool,

    /// Cap on resolution sweeps
    #[arg(long = "max-iterations", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_iterations: Option<u32>,

    /// Axes labels may move along: x, y or xy
    #[arg(long = "movement")]
    pub movement: Option<Movement>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if args.debug_overlay {
        config.resolution.debug_overlay = true;
    }
    if let Some(max) = args.max_iterations {
        config.resolution.max_iterations = max as usize;
    }
    if let Some(movement) = args.movement {
        config.resolution.movement = movement;
    }
    config.resolution.validate()?;

    let input = read_input(args.input.as_deref())?;
    let spec = ChartSpec::from_json5(&input).context("invalid chart description")?;
    let render_cfg = config.render.clone();
    let mut chart = build_chart(&spec, config)?;

    let reports = chart.resolve();
    for report in &reports {
        info!(
            iterations = report.iterations,
            displacements = report.displacements,
            converged = report.converged,
            "labels resolved"
        );
        for label in report.unresolved() {
            warn!(element = label.element.0, "label still overlaps after resolution");
        }
    }
    if let Some(path) = &args.dump {
        write_resolution_dump(path, chart.figure(), &reports)?;
    }

    let svg = chart.render_svg();
    match args.output_format {
        OutputFormat::Svg => {
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_output_png(&svg, &output, &render_cfg)?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
