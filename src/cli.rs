//! Command-line argument parsing.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use cumulus::compute::{ComputeDevice, CpuDevice, GpuDevice};
use cumulus::params::CloudConfig;
use cumulus::Result;

/// Compute backend for noise generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// rayon on all cores
    Cpu,
    /// wgpu compute shaders
    Gpu,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "cumulus")]
#[command(about = "Procedural cloud noise fields: generate, persist and preview", long_about = None)]
pub struct Args {
    /// TOML configuration (defaults are used when omitted)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Compute backend
    #[arg(long, value_enum, default_value = "cpu", global = true)]
    pub backend: Backend,

    /// Root directory holding `Textures/`
    #[arg(long, value_name = "DIR", default_value = "assets", global = true)]
    pub asset_root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Synthesise the shape volume and save it as an asset
    Generate {
        /// Override the configured volume resolution (voxels per axis)
        #[arg(long, value_name = "VOXELS")]
        resolution: Option<u32>,

        /// Override the configured asset name
        #[arg(long)]
        name: Option<String>,
    },

    /// Export the shape volume as 16-bit PNG slices
    Slices {
        /// Output directory
        #[arg(long, value_name = "DIR", default_value = "slices")]
        out: PathBuf,

        /// Read the stored asset instead of synthesising
        #[arg(long)]
        from_asset: bool,
    },

    /// Render the weather map as a 16-bit grayscale PNG
    WeatherMap {
        /// Output image
        #[arg(long, value_name = "PATH", default_value = "weather_map.png")]
        out: PathBuf,

        /// Override the configured seed
        #[arg(long)]
        seed: Option<u32>,
    },

    /// Map a weather description and coverage to a cloud state
    Classify {
        /// Lowercase condition text, e.g. "light rain"
        description: String,

        /// Cloud coverage (percent)
        #[arg(long, default_value = "0")]
        coverage: u32,

        /// Wind bearing (degrees)
        #[arg(long)]
        wind_deg: Option<f32>,

        /// Wind speed (m/s)
        #[arg(long)]
        wind_mps: Option<f64>,

        /// Temperature (Kelvin)
        #[arg(long)]
        temp_k: Option<f64>,
    },
}

impl Args {
    /// Configuration from `--config`, or the defaults
    pub fn load_config(&self) -> Result<CloudConfig> {
        match &self.config {
            Some(path) => {
                println!("Config: {}", path.display());
                CloudConfig::from_toml_file(path)
            }
            None => Ok(CloudConfig::default()),
        }
    }

    /// Create the selected compute backend
    pub fn create_device(&self) -> Result<Arc<dyn ComputeDevice>> {
        let device: Arc<dyn ComputeDevice> = match self.backend {
            Backend::Cpu => Arc::new(CpuDevice::new()),
            Backend::Gpu => Arc::new(GpuDevice::new_blocking()?),
        };
        println!("Backend: {}", device.label());
        Ok(device)
    }
}
