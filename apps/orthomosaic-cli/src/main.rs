use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::info;

use orthomosaic::config::{AssemblerConfig, FailurePolicy};
use orthomosaic::{posefile, Assembler};

#[derive(Parser, Debug)]
#[command(
    name = "orthomosaic",
    version,
    about = "Pose-guided aerial frame stitcher",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum FailurePolicyArg {
    Halt,
    Skip,
}

impl From<FailurePolicyArg> for FailurePolicy {
    fn from(v: FailurePolicyArg) -> Self {
        match v {
            FailurePolicyArg::Halt => FailurePolicy::Halt,
            FailurePolicyArg::Skip => FailurePolicy::Skip,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assemble a pose-ordered sequence of frames into a single mosaic
    Build {
        /// Pose file: one `filename, x, y, z, yaw, pitch, roll` record per line
        pose_file: PathBuf,
        /// Directory containing the images named in the pose file
        image_dir: PathBuf,
        /// Optional YAML config overriding the assembler defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Final mosaic output path
        #[arg(long, default_value = "results/mosaic.png")]
        out: PathBuf,
        /// What to do when a frame fails to align
        #[arg(long, value_enum, action = ArgAction::Set)]
        on_failure: Option<FailurePolicyArg>,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            pose_file,
            image_dir,
            config,
            out,
            on_failure,
        } => build(&pose_file, &image_dir, config.as_deref(), &out, on_failure),
    }
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn build(
    pose_file: &std::path::Path,
    image_dir: &std::path::Path,
    config_path: Option<&std::path::Path>,
    out: &std::path::Path,
    on_failure: Option<FailurePolicyArg>,
) -> Result<()> {
    let mut config = match config_path {
        Some(p) => AssemblerConfig::from_yaml_file(p)
            .with_context(|| format!("reading assembler config {}", p.display()))?,
        None => AssemblerConfig::default(),
    };
    if let Some(policy) = on_failure {
        config.on_alignment_failure = policy.into();
    }

    let records = posefile::read_file(pose_file)
        .with_context(|| format!("reading pose file {}", pose_file.display()))?;
    info!(frames = records.len(), "loaded pose file");

    let assembler = Assembler::new(config).context("initializing feature backend")?;

    let start = Instant::now();
    let frames = assembler
        .ingest(&records, image_dir)
        .context("ingesting and rectifying frames")?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "rectified all frames");

    let start = Instant::now();
    let mosaic = assembler.assemble(frames).context("assembling mosaic")?;
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        width = mosaic.width,
        height = mosaic.height,
        "assembled mosaic"
    );

    orthomosaic::cv::write_image(out, &mosaic).with_context(|| format!("writing mosaic to {}", out.display()))?;
    info!(path = %out.display(), "wrote mosaic");
    Ok(())
}
