//! Command line interface definitions
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use fcdr_rs::templates::Sensor;

/// Create, write and inspect FIDUCEO FCDR netCDF products.
#[derive(Debug, Parser)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub(crate) command: Commands,

    #[command(flatten)]
    pub(crate) verbosity: Verbosity<InfoLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum Commands {
    /// Write an empty easy FCDR product (combined per-pixel uncertainties)
    Easy(EasyCli),
    /// Write an empty full FCDR product (all calibration inputs and uncertainties)
    Full(FullCli),
    /// Summarize the dimensions, variables and attributes of an FCDR file
    Inspect(InspectCli),
    /// Create an example of the writer configuration file
    ConfigTemplate(TemplateCli),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct EasyCli {
    #[clap(flatten)]
    pub(crate) product: ProductCli,

    /// Number of spectral response function samples per channel. Defaults to the
    /// instrument's maximum.
    #[clap(long)]
    pub(crate) srf_size: Option<usize>,

    /// Number of cross element correlation coefficients. Must be given together with --corr-dy.
    #[clap(long, requires = "corr_dy")]
    pub(crate) corr_dx: Option<usize>,

    /// Number of cross line correlation coefficients. Must be given together with --corr-dx.
    #[clap(long, requires = "corr_dx")]
    pub(crate) corr_dy: Option<usize>,

    /// Length of the radiance/brightness temperature lookup tables. If not given,
    /// no lookup tables are added.
    #[clap(long)]
    pub(crate) lut_size: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct FullCli {
    #[clap(flatten)]
    pub(crate) product: ProductCli,
}

/// Arguments shared by the commands that write a product
#[derive(Debug, Clone, Args)]
pub(crate) struct ProductCli {
    /// The instrument to create the product for
    #[clap(value_enum)]
    pub(crate) sensor: Sensor,

    /// Number of scan lines in the product
    pub(crate) height: usize,

    /// Path to write the netCDF file to
    pub(crate) output: PathBuf,

    /// Replace the output file if it already exists
    #[clap(long)]
    pub(crate) overwrite: bool,

    /// TOML file with writer settings, see the config-template command
    #[clap(short, long)]
    pub(crate) config: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct InspectCli {
    /// The netCDF file to summarize
    pub(crate) file: PathBuf,

    /// Evaluate virtual variables, so that their computed dimensions are shown
    #[clap(long)]
    pub(crate) load_virtual: bool,

    /// Print the summary as JSON instead of tables
    #[clap(long)]
    pub(crate) json: bool,
}

/// Create an example of the writer configuration file
#[derive(Debug, Clone, Args)]
pub(crate) struct TemplateCli {
    /// Path to write the template to
    pub(crate) template_file: PathBuf,
}
