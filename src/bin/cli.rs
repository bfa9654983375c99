//! CLI application for body measurement estimation.
//!
//! Usage:
//!   percent-body measure --front f.jpg --side s.jpg --height 180             # Human-readable output
//!   percent-body measure --front f.jpg --side s.jpg --height 70 --units imperial --json
//!   percent-body measure ... -o measurements.txt                             # Save text export
//!   percent-body export-model --out model.bin                                # Write built-in model
//!   percent-body export-config --out config.json                             # Write default config

use clap::{Parser, Subcommand, ValueEnum};
use percent_body::{
    report, BodyImage, BodyModel, ConfidenceLevel, Estimate, Gender, MeasurementPipeline,
    MeasurementSet, PipelineConfig, UnitSystem, ValidationMode,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::{Path, PathBuf};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "percent-body")]
#[command(author, version, about = "Body measurement estimation from photos", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Estimate measurements from a front and a side photo.
    Measure(MeasureArgs),

    /// Write the built-in statistical model to a bincode file.
    ExportModel {
        #[arg(long)]
        out: PathBuf,
    },

    /// Write the default pipeline config as JSON.
    ExportConfig {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct MeasureArgs {
    /// Front-facing full body photo
    #[arg(long)]
    front: PathBuf,

    /// Side-facing full body photo
    #[arg(long)]
    side: PathBuf,

    /// Height in the unit given by --units
    #[arg(long, allow_hyphen_values = true)]
    height: String,

    #[arg(long, value_enum, default_value_t = GenderArg::Other)]
    gender: GenderArg,

    /// Unit of --height
    #[arg(long, value_enum, default_value_t = UnitsArg::Metric)]
    units: UnitsArg,

    /// Accept images that fail the size checks
    #[arg(long)]
    permissive: bool,

    /// Pipeline config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Statistical model (.bin or .bin.bz2); built-in tables if omitted
    #[arg(long)]
    model: Option<PathBuf>,

    /// Unit for displayed lengths (defaults to --units)
    #[arg(long, value_enum)]
    display: Option<UnitsArg>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seed for reproducible results
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GenderArg {
    Male,
    Female,
    Other,
}

impl From<GenderArg> for Gender {
    fn from(g: GenderArg) -> Self {
        match g {
            GenderArg::Male => Gender::Male,
            GenderArg::Female => Gender::Female,
            GenderArg::Other => Gender::Other,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum UnitsArg {
    Metric,
    Imperial,
}

impl From<UnitsArg> for UnitSystem {
    fn from(u: UnitsArg) -> Self {
        match u {
            UnitsArg::Metric => UnitSystem::Metric,
            UnitsArg::Imperial => UnitSystem::Imperial,
        }
    }
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output<'a> {
    gender: Gender,
    measurements: &'a MeasurementSet,
    confidence: f32,
    confidence_percent: u32,
    confidence_level: ConfidenceLevel,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Measure(args) => run_measure(&args),
        Commands::ExportModel { out } => export_model(&out),
        Commands::ExportConfig { out } => export_config(&out),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_measure(args: &MeasureArgs) -> CliResult<()> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if args.permissive {
        config.validation = ValidationMode::Permissive;
    }

    let model = match &args.model {
        Some(path) => {
            tracing::info!("Loading model from {}", path.display());
            BodyModel::load(path)?
        }
        None => BodyModel::default(),
    };

    let front = BodyImage::open(&args.front)?;
    let side = BodyImage::open(&args.side)?;

    let gender = Gender::from(args.gender);
    let units = UnitSystem::from(args.units);
    let pipeline = MeasurementPipeline::new(model, config);

    tracing::info!("No landmark detector configured, using statistics only");

    let runtime = tokio::runtime::Runtime::new()?;
    let estimate: Estimate = runtime.block_on(async {
        match args.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                pipeline
                    .compute_measurements_with_rng(gender, &args.height, units, &front, &side, &mut rng)
                    .await
            }
            None => {
                pipeline
                    .compute_measurements(gender, &args.height, units, &front, &side)
                    .await
            }
        }
    })?;

    let output_str = if args.json {
        let output = Output {
            gender,
            measurements: &estimate.measurements,
            confidence: estimate.confidence,
            confidence_percent: percent_body::confidence::percentage(estimate.confidence),
            confidence_level: estimate.level(),
        };
        serde_json::to_string_pretty(&output)?
    } else if args.output.is_some() {
        report::to_text(&estimate.measurements)
    } else {
        let display = args.display.map(UnitSystem::from).unwrap_or(units);
        report::summary(&estimate.measurements, estimate.confidence, display)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        tracing::info!("Output written to {}", path.display());
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn export_model(out: &Path) -> CliResult<()> {
    BodyModel::default().save(out)?;
    tracing::info!("Model written to {}", out.display());
    Ok(())
}

fn export_config(out: &Path) -> CliResult<()> {
    PipelineConfig::default().save(out)?;
    tracing::info!("Config written to {}", out.display());
    Ok(())
}
