//! Template for the Meteosat Visible and Infra-Red Imager.
//!
//! MVIRI products are full disk images, so "height" and the swath width are
//! both image sizes rather than scan line counts.
use crate::dataset::{Dataset, Element, Variable};
use crate::default_data::{create_default_array, create_default_vector};
use crate::error::DatasetError;

use super::util::{self, add_fill_value, add_units};
use super::Template;

pub const SWATH_WIDTH: usize = 4000;
pub const SRF_SIZE: usize = 176;
pub const SOL_IRR_SIZE: usize = 24;

/// Per-pixel `float32` variables of the full product: (name, standard_name, units).
const PIXEL_UNCERTAINTIES: [(&str, &str, Option<&str>); 9] = [
    ("a0", "Calibration Coefficient at Launch", None),
    ("a1", "Time variation of a0", None),
    ("u_time", "Uncertainty in Time", Some("s")),
    ("u_satellite_zenith_angle", "Uncertainty in Satellite Zenith Angle", Some("degree")),
    ("u_satellite_azimuth_angle", "Uncertainty in Satellite Azimuth Angle", Some("degree")),
    ("u_solar_zenith_angle", "Uncertainty in Solar Zenith Angle", Some("degree")),
    ("u_solar_azimuth_angle", "Uncertainty in Solar Azimuth Angle", Some("degree")),
    ("u_tot_count", "Total Uncertainty in counts", Some("count")),
    ("u_a0", "Uncertainty in a0", None),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Mviri;

impl Template for Mviri {
    fn add_original_variables(&self, ds: &mut Dataset, height: usize, _srf_size: Option<usize>) -> Result<(), DatasetError> {
        util::add_geolocation_variables(ds, SWATH_WIDTH, height, None)?;

        let mut var = util::create_line_variable::<i32>(height, None)?;
        var.set_attr("standard_name", "time");
        var.set_attr("long_name", "Acquisition time in seconds since 1970-01-01 00:00:00");
        add_units(&mut var, "s");
        ds.insert("time", var)?;

        let mut var = Variable::new(&["y", "x"], create_default_array::<i8>(SWATH_WIDTH, height, None))?;
        add_fill_value(&mut var, i8::DEFAULT_FILL);
        var.set_attr("standard_name", "time");
        var.set_attr("long_name", "Acquisition time delta");
        add_units(&mut var, "s");
        var.set_attr("scale_factor", 0.025);
        ds.insert("time_delta", var)?;

        for (name, standard_name) in [
            ("satellite_azimuth_angle", "sensor_azimuth_angle"),
            ("satellite_zenith_angle", "sensor_zenith_angle"),
            ("solar_azimuth_angle", "solar_azimuth_angle"),
            ("solar_zenith_angle", "solar_zenith_angle"),
        ] {
            let mut var = util::create_float_variable(SWATH_WIDTH, height, Some(standard_name), None, None)?;
            add_units(&mut var, "degree");
            ds.insert(name, var)?;
        }

        let mut var = Variable::new(&["y", "x"], create_default_array::<i16>(SWATH_WIDTH, height, None))?;
        add_fill_value(&mut var, i16::DEFAULT_FILL);
        var.set_attr("standard_name", "Image counts");
        add_units(&mut var, "count");
        ds.insert("count", var)
    }

    fn add_easy_fcdr_variables(
        &self,
        ds: &mut Dataset,
        height: usize,
        _corr_dx: Option<usize>,
        _corr_dy: Option<usize>,
        _lut_size: Option<usize>,
    ) -> Result<(), DatasetError> {
        for name in ["u_independent_toa_bidirectional_reflectance", "u_structured_toa_bidirectional_reflectance"] {
            let var = util::create_float_variable(SWATH_WIDTH, height, None, None, Some(f32::NAN))?;
            ds.insert(name, var)?;
        }
        Ok(())
    }

    fn add_full_fcdr_variables(&self, ds: &mut Dataset, height: usize) -> Result<(), DatasetError> {
        ds.insert("srf", spectral_variable("srf_size", SRF_SIZE, "Spectral Response Function")?)?;
        ds.insert("sol_irr", spectral_variable("sol_irr_size", SOL_IRR_SIZE, "Solar Irradiance")?)?;

        for (name, standard_name) in [("u_lat", "Uncertainty in Latitude"), ("u_lon", "Uncertainty in Longitude")] {
            let mut var = util::create_float_variable(SWATH_WIDTH, height, Some(standard_name), None, None)?;
            add_units(&mut var, "degree");
            ds.insert(name, var)?;
        }

        for (name, standard_name, units) in PIXEL_UNCERTAINTIES {
            let mut var = util::create_float_variable(SWATH_WIDTH, height, Some(standard_name), None, None)?;
            if let Some(units) = units {
                add_units(&mut var, units);
            }
            ds.insert(name, var)?;
        }
        ds.insert("u_a1", util::create_float_variable(SWATH_WIDTH, height, Some("Uncertainty in a1"), None, None)?)?;

        ds.insert("u_srf", spectral_variable("srf_size", SRF_SIZE, "Uncertainty in SRF")?)?;
        ds.insert("u_sol_irr", spectral_variable("sol_irr_size", SOL_IRR_SIZE, "Uncertainty in Solar Irradiance")?)
    }

    fn swath_width(&self) -> usize {
        SWATH_WIDTH
    }

    fn template_key(&self) -> &'static str {
        "MVIRI"
    }
}

fn spectral_variable(dim: &str, size: usize, standard_name: &str) -> Result<Variable, DatasetError> {
    let mut var = Variable::new(&[dim], create_default_vector::<f32>(size, None))?;
    add_fill_value(&mut var, f32::DEFAULT_FILL);
    var.set_attr("standard_name", standard_name);
    Ok(var)
}
