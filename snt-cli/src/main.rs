//! `snt-trace`: a thin demonstration binary over `snt-core`. Parses a
//! subset of the library's configuration structs into `clap`-derived
//! arguments and forwards them unchanged; all tracing/filling logic lives in
//! the library.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use snt_core::{
    BitDepth, Calibration, CostFunction, DenseVolume, FillConfig, FillEngine, HessianConfig, HessianEngine,
    MaxScalingCost, ReciprocalCost, ResponseKind, SearchConfig, SearchEngine, Voxel,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CostVariant {
    Reciprocal,
    MaxScaling,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    UnidirectionalAstar,
    BidirectionalAstar,
    Dijkstra,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResponseVariant {
    Tubeness,
    Frangi,
}

impl From<ResponseVariant> for ResponseKind {
    fn from(v: ResponseVariant) -> Self {
        match v {
            ResponseVariant::Tubeness => ResponseKind::Tubeness,
            ResponseVariant::Frangi => ResponseKind::Frangi,
        }
    }
}

/// Run a search or a fill over a scalar volume.
#[derive(Parser, Debug)]
#[command(name = "snt-trace", version, about)]
struct Cli {
    #[arg(long)]
    width: i64,
    #[arg(long)]
    height: i64,
    #[arg(long, default_value_t = 1)]
    depth: i64,

    /// Raw little-endian f64 volume file, `width*height*depth` values in
    /// row-major order. Omit to synthesize a flat test volume.
    #[arg(long)]
    input: Option<PathBuf>,

    #[arg(long, default_value = "1,1,1")]
    spacing: String,

    #[arg(long, value_enum, default_value_t = Mode::BidirectionalAstar)]
    mode: Mode,

    #[arg(long, value_enum, default_value_t = CostVariant::Reciprocal)]
    cost: CostVariant,
    #[arg(long, default_value_t = 256.0)]
    max_scale: f64,

    #[arg(long, value_parser = parse_voxel)]
    start: Voxel,
    #[arg(long, value_parser = parse_voxel)]
    goal: Option<Voxel>,

    #[arg(long, default_value_t = 0)]
    timeout_seconds: u64,
    #[arg(long, default_value_t = 250)]
    report_every_millis: u64,
    #[arg(long, default_value_t = f64::INFINITY)]
    draw_threshold: f64,

    /// Write the resulting path as SWC to this file instead of just
    /// printing a summary.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pre-filter the input volume through the Hessian engine before search
    /// or fill, loading a `HessianConfig` from this JSON file.
    #[arg(long)]
    hessian_config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = ResponseVariant::Tubeness)]
    hessian_response: ResponseVariant,
}

fn parse_voxel(s: &str) -> std::result::Result<Voxel, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected \"x,y,z\", got \"{s}\""));
    }
    let parse_one = |p: &str| p.trim().parse::<i64>().map_err(|_| format!("not an integer: {p}"));
    Ok(Voxel::new(parse_one(parts[0])?, parse_one(parts[1])?, parse_one(parts[2])?))
}

fn parse_spacing(s: &str) -> Result<(f64, f64, f64)> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        bail!("expected \"sx,sy,sz\", got \"{s}\"");
    }
    Ok((parts[0].trim().parse()?, parts[1].trim().parse()?, parts[2].trim().parse()?))
}

fn load_volume(cli: &Cli) -> Result<Arc<DenseVolume>> {
    let (sx, sy, sz) = parse_spacing(&cli.spacing)?;
    let calibration = Calibration::new(sx, sy, sz, "um");
    let len = (cli.width * cli.height * cli.depth) as usize;

    let data = match &cli.input {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("reading volume file {}", path.display()))?;
            if bytes.len() != len * 8 {
                bail!("volume file has {} bytes, expected {} for {}x{}x{}", bytes.len(), len * 8, cli.width, cli.height, cli.depth);
            }
            bytes.chunks_exact(8).map(|c| f64::from_le_bytes(c.try_into().unwrap())).collect()
        }
        None => vec![128.0; len],
    };

    Ok(Arc::new(DenseVolume::from_data(cli.width, cli.height, cli.depth, calibration, BitDepth::Eight, data)))
}

/// Loads a `HessianConfig` from JSON and runs it over `volume`, returning
/// the filtered response volume in place of the raw input.
fn apply_hessian_filter(path: &PathBuf, response: ResponseVariant, volume: Arc<DenseVolume>) -> Result<Arc<DenseVolume>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading hessian config {}", path.display()))?;
    let config: HessianConfig = serde_json::from_str(&text).with_context(|| format!("parsing hessian config {}", path.display()))?;
    let engine = HessianEngine::new(volume, config)?;
    let outcome = engine.run(response.into())?;
    Ok(Arc::new(outcome.volume))
}

fn build_cost(cli: &Cli, volume: Arc<DenseVolume>) -> Arc<dyn CostFunction> {
    match cli.cost {
        CostVariant::Reciprocal => Arc::new(ReciprocalCost::new(volume)),
        CostVariant::MaxScaling => Arc::new(MaxScalingCost::new(volume, cli.max_scale)),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let volume = load_volume(&cli)?;
    let volume = match &cli.hessian_config {
        Some(path) => apply_hessian_filter(path, cli.hessian_response, volume)?,
        None => volume,
    };
    let cost_fn = build_cost(&cli, volume.clone());

    let timeout = if cli.timeout_seconds == 0 { None } else { Some(Duration::from_secs(cli.timeout_seconds)) };
    let report_interval = Duration::from_millis(cli.report_every_millis);

    match cli.mode {
        Mode::Dijkstra => {
            let config = FillConfig {
                seeds: vec![cli.start],
                draw_threshold: cli.draw_threshold,
                timeout,
                report_interval,
            };
            let engine = FillEngine::new(volume, cost_fn, config)?;
            let outcome = engine.run_with_progress(|p| {
                tracing::info!(open = p.open_count, closed = p.closed_count, "progress");
            });
            println!("exit_reason={:?} reached={}", outcome.exit_reason, outcome.reached_count());
        }
        mode => {
            let goal = cli.goal.context("--goal is required for A* modes")?;
            let config = SearchConfig {
                bidirectional: matches!(mode, Mode::BidirectionalAstar),
                defined_goal: true,
                start: cli.start,
                goal: Some(goal),
                timeout,
                report_interval,
                draw_threshold: cli.draw_threshold,
            };
            let engine = SearchEngine::new(volume, cost_fn, config)?;
            let outcome = engine.run_with_progress(|p| {
                tracing::info!(open = p.open_count, closed = p.closed_count, "progress");
            });

            println!(
                "exit_reason={:?} closed_start={} closed_goal={}",
                outcome.exit_reason, outcome.closed_start, outcome.closed_goal
            );

            if outcome.exit_reason.is_success() {
                if let Some(path) = &outcome.path {
                    println!("path_len={}", path.len());
                    if let Some(out) = &cli.output {
                        fs::write(out, snt_core::io::swc::write(path)).with_context(|| format!("writing {}", out.display()))?;
                    }
                }
            }
        }
    }

    Ok(())
}
