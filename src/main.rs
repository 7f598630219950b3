use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use trailshade::{BackendPreference, DriverKind, Sketch, SketchConfig, SketchError};

#[derive(Parser, Debug)]
#[command(name = "trailshade", version, about = "Trail-driven mesh displacement and color ramp shading")]
struct Cli {
    /// JSON sketch configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a window and run the sketch
    Run {
        /// Impulse source: orbit or pointer
        #[arg(long)]
        driver: Option<DriverKind>,
        /// Diffuse texture image
        #[arg(long)]
        diffuse: Option<PathBuf>,
        /// Emissive texture image
        #[arg(long)]
        emissive: Option<PathBuf>,
    },
    /// Render frames offscreen and write PNG files
    Export {
        /// Output directory
        #[arg(long, default_value = "frames")]
        out: PathBuf,
        /// Number of frames (default: one playhead loop)
        #[arg(long)]
        frames: Option<u32>,
        /// auto, gpu or software
        #[arg(long)]
        backend: Option<BackendPreference>,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
    },
}

fn run(cli: Cli) -> Result<(), SketchError> {
    let config = match &cli.config {
        Some(path) => SketchConfig::load(path)?,
        None => SketchConfig::default(),
    };
    let mut sketch = Sketch::from_config(config);

    match cli.cmd {
        Command::Run {
            driver,
            diffuse,
            emissive,
        } => {
            if let Some(driver) = driver {
                sketch = sketch.with_driver(driver);
            }
            if let Some(path) = diffuse {
                sketch = sketch.with_diffuse(path);
            }
            if let Some(path) = emissive {
                sketch = sketch.with_emissive(path);
            }
            sketch.run()
        }
        Command::Export {
            out,
            frames,
            backend,
            width,
            height,
        } => {
            if let Some(backend) = backend {
                sketch = sketch.with_backend(backend);
            }
            let (w, h) = (sketch.config().width, sketch.config().height);
            sketch = sketch.with_size(width.unwrap_or(w), height.unwrap_or(h));
            let written = sketch.export(&out, frames)?;
            log::info!("Wrote {} frames to {}", written.len(), out.display());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
