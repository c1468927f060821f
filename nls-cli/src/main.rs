mod ic;

use clap::{Parser, ValueEnum};
use ic::{IcType, perturb};
use log::{LevelFilter, info};
use nls_core::{
    Animation, FrameSink, ModelKind, PhysicalParameters, Problem, Profiles, Pumping, ScenarioConfig,
    SweepKind,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Scenario JSON; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model to build (1d|2d|default)
    #[arg(long)]
    model: Option<ModelKind>,

    /// Nodes per axis
    #[arg(long)]
    num_nodes: Option<usize>,

    /// Iteration budget of a single solve
    #[arg(long)]
    num_iters: Option<usize>,

    /// Stencil width (3, 5 or 7)
    #[arg(long)]
    order: Option<usize>,

    /// Time step
    #[arg(long)]
    dt: Option<f64>,

    /// Spatial step
    #[arg(long)]
    dx: Option<f64>,

    /// Output directory (solution.json, and frame files when sweeping)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Run a frame-by-frame sweep instead of a single solve
    #[arg(long, value_enum)]
    sweep: Option<Sweep>,

    /// Number of sweep frames (frame 0 included, so frames + 1 are written)
    #[arg(long, default_value_t = 10)]
    frames: usize,

    /// Per-frame increment: iterations, spot offset or pumping power
    #[arg(long)]
    step: Option<f64>,

    /// Initial condition perturbation
    #[arg(long, value_enum, default_value = "flat")]
    ic: IcType,

    /// Amplitude of the initial perturbation
    #[arg(long, default_value_t = 1.0e-3)]
    noise: f64,

    /// RNG seed (reproducibility)
    #[arg(long, default_value_t = 123)]
    seed: u64,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Sweep {
    Iterations,
    Radius,
    Power,
}

impl Sweep {
    fn kind(self, step: Option<f64>) -> SweepKind {
        match self {
            Sweep::Iterations => SweepKind::IterationIncrease {
                step: step.map_or(1000, |s| s.max(0.0) as usize),
            },
            Sweep::Radius => SweepKind::PumpingRadiusIncrease { step: step.unwrap_or(0.5) },
            Sweep::Power => SweepKind::PumpingPowerIncrease { step: step.unwrap_or(0.5) },
        }
    }
}

/// Two-dimensional scenario with a single wide spot at the center.
fn reference_config() -> ScenarioConfig {
    let originals =
        PhysicalParameters { r: 0.05, gamma: 0.566, g: 1.0e-3, tilde_g: 0.011, gamma_r: 10.0 };
    let mut config = ScenarioConfig::new(ModelKind::TwoD, originals);
    config.dx = Some(1.0e-1);
    config.dt = Some(1.0e-3);
    config.order = Some(5);
    config.num_nodes = Some(40);
    config.num_iters = Some(10_000);
    config.pumping = Some(Pumping::gaussian(3.0, 0.0, 6.84931506849));
    config
}

fn scenario(args: &Args) -> Result<ScenarioConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ScenarioConfig::from_json_path(path)?,
        None => reference_config(),
    };
    if args.model.is_some() {
        config.model = args.model;
    }
    if args.num_nodes.is_some() {
        config.num_nodes = args.num_nodes;
    }
    if args.num_iters.is_some() {
        config.num_iters = args.num_iters;
    }
    if args.order.is_some() {
        config.order = args.order;
    }
    if args.dt.is_some() {
        config.dt = args.dt;
    }
    if args.dx.is_some() {
        config.dx = args.dx;
    }
    Ok(config)
}

#[derive(Serialize)]
struct FrameRow {
    frame: usize,
    dimension: &'static str,
    n: usize,
    peak_pumping: f64,
    max_density: f64,
    total_density: f64,
    max_reservoir: f64,
}

/// Writes one JSONL row per frame plus the density and reservoir profiles as
/// little-endian f32.
struct FrameWriter {
    meta: BufWriter<File>,
    density: BufWriter<File>,
    reservoir: BufWriter<File>,
    rows: usize,
}

impl FrameWriter {
    fn create(dir: &Path) -> std::io::Result<Self> {
        Ok(FrameWriter {
            meta: BufWriter::new(File::create(dir.join("frames.jsonl"))?),
            density: BufWriter::new(File::create(dir.join("density.bin"))?),
            reservoir: BufWriter::new(File::create(dir.join("reservoir.bin"))?),
            rows: 0,
        })
    }

    fn finish(mut self) -> std::io::Result<usize> {
        self.meta.flush()?;
        self.density.flush()?;
        self.reservoir.flush()?;
        Ok(self.rows)
    }
}

impl FrameSink for FrameWriter {
    fn grab_frame(&mut self, frame: usize, profiles: &Profiles) -> nls_core::Result<()> {
        write_f32_vec(&mut self.density, &profiles.condensate_density)?;
        write_f32_vec(&mut self.reservoir, &profiles.reservoir_density)?;

        let row = FrameRow {
            frame,
            dimension: profiles.dimension.as_str(),
            n: profiles.coordinates.len(),
            peak_pumping: profiles.pumping.iter().copied().fold(0.0, f64::max),
            max_density: profiles.condensate_density.iter().copied().fold(0.0, f64::max),
            total_density: profiles.condensate_density.iter().sum(),
            max_reservoir: profiles.reservoir_density.iter().copied().fold(0.0, f64::max),
        };
        serde_json::to_writer(&mut self.meta, &row)?;
        self.meta.write_all(b"\n")?;

        self.rows += 1;
        Ok(())
    }
}

/// Drops every frame; used when no output directory is given.
struct Discard;

impl FrameSink for Discard {
    fn grab_frame(&mut self, _frame: usize, _profiles: &Profiles) -> nls_core::Result<()> {
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        level,
        ConfigBuilder::new().set_time_level(LevelFilter::Off).build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let mut model = Problem::model(scenario(&args)?)?;

    if args.ic != IcType::Flat {
        let solution = model.solution_mut();
        let mut field = solution.initial_solution().to_vec();
        let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
        perturb(
            &mut rng,
            &mut field,
            solution.number_of_nodes(),
            solution.grid().dimension(),
            args.ic,
            args.noise,
        );
        solution.set_initial_solution(field)?;
        info!(
            "initial condition: {} (amplitude {}, seed {})",
            args.ic.as_str(),
            args.noise,
            args.seed
        );
    }

    if let Some(out) = &args.out {
        fs::create_dir_all(out)?;
    }

    match args.sweep {
        None => {
            let solution = model.solve(None)?;
            println!("{}", solution.report());
        }
        Some(sweep) => {
            let mut animation = Animation::new(sweep.kind(args.step), args.frames);
            match &args.out {
                Some(out) => {
                    let mut writer = FrameWriter::create(out)?;
                    animation.animate(&mut model, &mut writer)?;
                    let rows = writer.finish()?;
                    println!("Wrote {} frames to: {}", rows, out.display());
                }
                None => animation.animate(&mut model, &mut Discard)?,
            }
            println!("{}", animation.report());
        }
    }

    if let Some(out) = &args.out {
        let path = out.join("solution.json");
        model.solution().store_to_path(&path)?;
        println!("Stored solution to: {}", path.display());
    }

    Ok(())
}

fn write_f32_vec<W: Write>(w: &mut W, v: &[f64]) -> std::io::Result<()> {
    for &x in v {
        w.write_all(&(x as f32).to_le_bytes())?;
    }
    Ok(())
}
