//! Per-instrument product templates.
//!
//! A template knows which variables make up an instrument's product and adds
//! them, default filled, to a [`Dataset`]. Products come in two flavours:
//! the "easy" FCDR carries combined per-pixel uncertainties, while the "full"
//! FCDR carries all calibration inputs and their individual uncertainties.
//! Both start from the same set of "original" variables.
use crate::dataset::Dataset;
use crate::error::DatasetError;

pub mod avhrr;
pub mod hirs;
pub mod mviri;
pub mod util;

pub use avhrr::Avhrr;
pub use hirs::{Hirs, HirsGeneration};
pub use mviri::Mviri;

pub trait Template: Sync {
    /// Add the variables common to the easy and full products.
    ///
    /// `srf_size` is the number of spectral response function samples per
    /// channel; `None` uses the instrument's maximum.
    fn add_original_variables(&self, ds: &mut Dataset, height: usize, srf_size: Option<usize>) -> Result<(), DatasetError>;

    /// Add the uncertainty variables of the easy product.
    ///
    /// Lookup tables are only added if `lut_size` is given, and correlation
    /// coefficients only if both `corr_dx` and `corr_dy` are.
    fn add_easy_fcdr_variables(
        &self,
        ds: &mut Dataset,
        height: usize,
        corr_dx: Option<usize>,
        corr_dy: Option<usize>,
        lut_size: Option<usize>,
    ) -> Result<(), DatasetError>;

    fn add_full_fcdr_variables(&self, ds: &mut Dataset, height: usize) -> Result<(), DatasetError>;

    /// Number of pixels across one scan line.
    fn swath_width(&self) -> usize;

    fn template_key(&self) -> &'static str;

    fn add_template_key(&self, ds: &mut Dataset) {
        ds.set_attr("template_key", self.template_key());
    }

    /// Add instrument specific global attributes. Most instruments have none.
    fn add_specific_global_metadata(&self, _ds: &mut Dataset) {}
}

/// The instruments a product can be created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter, clap::ValueEnum)]
#[strum(ascii_case_insensitive)]
pub enum Sensor {
    #[strum(serialize = "AVHRR")]
    #[value(name = "AVHRR", alias = "avhrr")]
    Avhrr,
    #[strum(serialize = "HIRS2")]
    #[value(name = "HIRS2", alias = "hirs2")]
    Hirs2,
    #[strum(serialize = "HIRS3")]
    #[value(name = "HIRS3", alias = "hirs3")]
    Hirs3,
    #[strum(serialize = "HIRS4")]
    #[value(name = "HIRS4", alias = "hirs4")]
    Hirs4,
    #[strum(serialize = "MVIRI")]
    #[value(name = "MVIRI", alias = "mviri")]
    Mviri,
}

static AVHRR: Avhrr = Avhrr;
static HIRS2: Hirs = Hirs::new(HirsGeneration::Hirs2);
static HIRS3: Hirs = Hirs::new(HirsGeneration::Hirs3);
static HIRS4: Hirs = Hirs::new(HirsGeneration::Hirs4);
static MVIRI: Mviri = Mviri;

impl Sensor {
    pub fn template(&self) -> &'static dyn Template {
        match self {
            Sensor::Avhrr => &AVHRR,
            Sensor::Hirs2 => &HIRS2,
            Sensor::Hirs3 => &HIRS3,
            Sensor::Hirs4 => &HIRS4,
            Sensor::Mviri => &MVIRI,
        }
    }
}
