//! Template for the High resolution Infra Red Sounder, generations 2 to 4.
//!
//! Unlike AVHRR, the HIRS original variables are stored in memory in their
//! packed integer form: `bt` holds `int16` counts with `scale_factor` and
//! `add_offset` attributes, so a reader that applies CF decoding gets the
//! physical values back.
use crate::correlation as corr;
use crate::dataset::{ArrayData, Dataset, Element, Variable};
use crate::default_data::{create_default_array, create_default_array_3d, create_default_vector};
use crate::error::DatasetError;

use super::util::{self, add_fill_value, add_units};
use super::Template;

pub const SWATH_WIDTH: usize = 56;
/// Brightness temperature channels
pub const NUM_CHANNELS: usize = 19;
/// Radiance channels, the 19 infrared channels plus the visible one
pub const NUM_RADIANCE_CHANNELS: usize = 20;
pub const NUM_CALIBRATION_CYCLES: usize = 337;
pub const NUM_MINOR_FRAMES: usize = 64;
pub const NUM_SCAN_ANGLES: usize = 168;
pub const NUM_SECOND_CALIBRATION_COEFFS: usize = 60;
pub const NUM_COEFFS: usize = 3;
pub const PRT_READINGS: usize = 5;
pub const NUM_IWCT_PRTS: usize = 4;

/// Fill value of the brightness temperature counts
pub const BT_FILL: i16 = -999;
/// Fill value of the per-scanline `scnlinf` view type
pub const SCNLINF_FILL: i8 = 9;
/// Fill value of the angle uncertainties
pub const ANGLE_UNCERTAINTY_FILL: f32 = -999.0;

const RADIANCE_UNITS: &str = "mW m^-2 sr^-1 cm";

/// Housekeeping temperatures as (variable suffix, descriptive name).
const HOUSEKEEPING_TEMPERATURES: [(&str, &str); 15] = [
    ("baseplate", "baseplate"),
    ("ch", "coolerhousing"),
    ("elec", "electronics"),
    ("fsr", "first_stage_radiator"),
    ("fwh", "filter_wheel_housing"),
    ("fwm", "filter_wheel_monitor"),
    ("icct", "internal_cold_calibration_target"),
    ("iwct", "internal_warm_calibration_target"),
    ("patch_exp", "patch_expanded_scale"),
    ("patch_full", "patch_full_range"),
    ("tlscp_prim", "telescope_primary"),
    ("tlscp_sec", "telescope_secondary"),
    ("tlscp_tert", "telescope_tertiary"),
    ("scanmirror", "scanmirror"),
    ("scanmotor", "scanmotor"),
];

/// How a temperature variable is laid out
#[derive(Debug, Clone, Copy)]
enum TemperatureShape {
    /// `(y)`
    Line,
    /// `(y, prt_reading)`
    PerReading,
    /// `(prt_number_iwt, y, prt_reading)`
    PerPrtReading,
}

/// Converted housekeeping temperatures:
/// (name, long_name, orig_name, NaN filled, shape)
const TEMPERATURES_K: [(&str, &str, Option<&str>, bool, TemperatureShape); 21] = [
    ("TK_baseplate", "Temperature baseplate", Some("temp_baseplate"), true, TemperatureShape::Line),
    ("TK_baseplate_analog", "Temperature baseplate (analog)", Some("temp_an_baseplate"), true, TemperatureShape::Line),
    ("TK_ch", "Temperature cooler housing", Some("temp_ch"), true, TemperatureShape::Line),
    ("TK_elec", "Temperature electronics", Some("temp_elec"), true, TemperatureShape::Line),
    ("TK_elec_analog", "Temperature electronics (analog)", Some("temp_an_el"), true, TemperatureShape::Line),
    ("TK_radiator_analog", "temperature_radiator_analog_K", Some("temp_an_rd"), true, TemperatureShape::Line),
    ("TK_fsr", "Temperature first stage radiator", Some("temp_fsr"), true, TemperatureShape::PerReading),
    ("TK_fwm", "Temperature filter wheel motor", Some("temp_fwm"), true, TemperatureShape::Line),
    ("TK_fwm_analog", "Temperature filter wheel motor (analogue)", Some("temp_an_fwm"), true, TemperatureShape::Line),
    ("TK_icct", "temperature_internal_cold_calibration_target_K", None, false, TemperatureShape::Line),
    ("TK_fwh", "Temperature filter wheel housing", Some("temp_fwh"), true, TemperatureShape::PerPrtReading),
    ("TK_iwct", "Temperature internal warm calibration target (IWCT)", Some("temp_iwt"), true, TemperatureShape::PerPrtReading),
    ("TK_patch_analog", "temperature_patch_analog_K", Some("temp_an_pch"), true, TemperatureShape::Line),
    ("TK_patch_exp", "Temperature patch (expanded)", Some("temp_patch_exp"), true, TemperatureShape::PerReading),
    ("TK_patch_full", "temperature_patch_full_range_K", Some("temp_patch_full"), true, TemperatureShape::Line),
    ("TK_tlscp_prim", "temperature_telescope_primary_K", Some("temp_primtlscp"), true, TemperatureShape::Line),
    ("TK_tlscp_sec", "temperature_telescope_secondary_K", Some("temp_sectlscp"), true, TemperatureShape::Line),
    ("TK_tlscp_tert", "temperature_telescope_tertiary_K", None, false, TemperatureShape::Line),
    ("TK_scanmirror", "temperature_scanmirror_K", Some("temp_scanmirror"), true, TemperatureShape::Line),
    ("TK_scanmirror_analog", "temperature_scanmirror_analog_K", Some("temp_an_scnm"), true, TemperatureShape::Line),
    ("TK_scanmotor", "temperature_scanmotor_K", Some("temp_scanmotor"), true, TemperatureShape::Line),
];

/// Uncertainties with no spatial dimension, held as NaN scalars until they are known.
const SCALAR_UNCERTAINTIES: [&str; 10] = [
    "u_Earthshine",
    "u_O_Re",
    "u_O_TIWCT",
    "u_Rself",
    "u_Rselfparams",
    "u_SRF_calib",
    "u_d_PRT",
    "u_electronics",
    "u_extraneous_periodic",
    "u_nonlinearity",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum HirsGeneration {
    #[strum(serialize = "HIRS2")]
    Hirs2,
    #[strum(serialize = "HIRS3")]
    Hirs3,
    #[strum(serialize = "HIRS4")]
    Hirs4,
}

impl HirsGeneration {
    /// Number of spectral response function samples per channel if none is given
    pub fn max_srf_size(&self) -> usize {
        match self {
            HirsGeneration::Hirs2 => 102,
            HirsGeneration::Hirs3 | HirsGeneration::Hirs4 => 51,
        }
    }

    /// The quality flag variables of this generation.
    pub fn flag_variables(&self) -> &'static [&'static str] {
        match self {
            HirsGeneration::Hirs2 => &["qualind", "mnfrqualflags"],
            HirsGeneration::Hirs3 | HirsGeneration::Hirs4 => &["qualind", "linqualflags", "chqualflags", "mnfrqualflags"],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Hirs {
    generation: HirsGeneration,
}

impl Hirs {
    pub const fn new(generation: HirsGeneration) -> Self {
        Self { generation }
    }

    pub fn generation(&self) -> HirsGeneration {
        self.generation
    }

    /// Value of the `ancilliary_variables` attribute of the calibrated variables.
    fn ancillary_variables(&self) -> String {
        let mut names = vec!["scnlinf"];
        names.extend_from_slice(self.generation.flag_variables());
        names.join(" ")
    }

    fn add_flag_variables(&self, ds: &mut Dataset, height: usize) -> Result<(), DatasetError> {
        let qualind = Variable::new(&["y"], create_default_vector(height, Some(0i32)))?
            .with_attr("flag_masks", "1, 2, 4, 8, 16, 32, 64, 128")
            .with_attr(
                "flag_meanings",
                "do_not_use_scan time_sequence_error data_gap_preceding_scan no_calibration no_earth_location \
                 clock_update status_changed line_incomplete",
            )
            .with_attr("standard_name", "status_flag")
            .with_attr("long_name", "quality_indicator_bitfield");
        ds.insert("qualind", qualind)?;

        if self.generation != HirsGeneration::Hirs2 {
            let linqualflags = Variable::new(&["y"], create_default_vector(height, Some(0i32)))?
                .with_attr(
                    "flag_masks",
                    "256, 512, 1024, 2048, 65536, 131072, 262144, 524288, 1048576, 2097152, 4194304, 8388608, \
                     16777216, 33554432, 67108864, 134217728, 268435456",
                )
                .with_attr(
                    "flag_meanings",
                    "time_field_bad time_field_bad_not_inf inconsistent_sequence scan_time_repeat uncalib_bad_time \
                     calib_few_scans uncalib_bad_prt calib_marginal_prt uncalib_channels uncalib_inst_mode \
                     quest_ant_black_body zero_loc bad_loc_time bad_loc_marginal bad_loc_reason bad_loc_ant",
                )
                .with_attr("standard_name", "status_flag")
                .with_attr("long_name", "scanline_quality_flags_bitfield");
            ds.insert("linqualflags", linqualflags)?;

            let chqualflags = Variable::new(&["y", "channel"], create_default_array(NUM_CHANNELS, height, Some(0u16)))?
                .with_attr("standard_name", "status_flag")
                .with_attr("long_name", "channel_quality_flags_bitfield");
            ds.insert("chqualflags", chqualflags)?;
        }

        let mnfrqualflags = Variable::new(&["y", "minor_frame"], create_default_array(NUM_MINOR_FRAMES, height, Some(0u8)))?
            .with_attr("standard_name", "status_flag")
            .with_attr("long_name", "minor_frame_quality_flags_bitfield");
        ds.insert("mnfrqualflags", mnfrqualflags)
    }
}

impl Template for Hirs {
    fn add_original_variables(&self, ds: &mut Dataset, height: usize, srf_size: Option<usize>) -> Result<(), DatasetError> {
        util::add_geolocation_variables(ds, SWATH_WIDTH, height, None)?;
        let ancillary = self.ancillary_variables();

        let data = create_default_array_3d(SWATH_WIDTH, height, NUM_CHANNELS, Some(BT_FILL));
        let var = packed_variable(&["channel", "y", "x"], data, BT_FILL, 0.01, 150.0)?
            .with_attr("standard_name", "toa_brightness_temperature")
            .with_attr("long_name", "Brightness temperature, NOAA/EUMETSAT calibrated")
            .with_attr("units", "K")
            .with_attr("ancilliary_variables", ancillary.as_str());
        ds.insert("bt", var)?;

        let mut var = Variable::new(
            &["rad_channel", "y", "x"],
            create_default_array_3d::<u16>(SWATH_WIDTH, height, NUM_RADIANCE_CHANNELS, None),
        )?;
        add_fill_value(&mut var, u16::DEFAULT_FILL);
        var.set_attr("long_name", "counts_earth");
        add_units(&mut var, "count");
        var.set_attr("ancilliary_variables", ancillary.as_str());
        ds.insert("c_earth", var)?;

        let mut var = Variable::new(
            &["rad_channel", "y", "x"],
            create_default_array_3d(SWATH_WIDTH, height, NUM_RADIANCE_CHANNELS, Some(f32::NAN)),
        )?;
        add_fill_value(&mut var, f32::NAN);
        var.set_attr("standard_name", "toa_outgoing_inband_radiance");
        add_units(&mut var, "W/Hz/m ** 2/sr");
        var.set_attr("long_name", "Channel radiance, NOAA/EUMETSAT calibrated");
        var.set_attr("orig_name", "radiance");
        var.set_attr("ancilliary_variables", ancillary.as_str());
        ds.insert("L_earth", var)?;

        let angles = [
            ("sat_za", "platform_zenith_angle", None, None),
            ("sat_aa", "sensor_azimuth_angle", Some("local_azimuth_angle"), None),
            ("solar_zenith_angle", "solar_zenith_angle", None, Some("sol_za")),
            ("sol_aa", "solar_azimuth_angle", None, None),
        ];
        for (name, standard_name, long_name, orig_name) in angles {
            let data = create_default_array::<u16>(SWATH_WIDTH, height, None);
            let mut var = packed_variable(&["y", "x"], data, u16::DEFAULT_FILL, 0.01, -180.0)?
                .with_attr("standard_name", standard_name)
                .with_attr("units", "degree");
            if let Some(long_name) = long_name {
                var.set_attr("long_name", long_name);
            }
            if let Some(orig_name) = orig_name {
                var.set_attr("orig_name", orig_name);
            }
            ds.insert(name, var)?;
        }

        let mut var = util::create_line_variable::<i16>(height, None)?;
        var.set_attr("long_name", "scanline_number");
        add_units(&mut var, "count");
        ds.insert("scanline", var)?;

        let mut var = util::create_line_variable::<u32>(height, None)?;
        var.set_attr("standard_name", "time");
        var.set_attr("long_name", "Acquisition time in seconds since 1970-01-01 00:00:00");
        add_units(&mut var, "s");
        ds.insert("time", var)?;

        let mut var = util::create_line_variable::<i32>(height, None)?;
        var.set_attr("standard_name", "time");
        var.set_attr("long_name", "Scan line time of day");
        var.set_attr("orig_name", "hrs_scnlintime");
        add_units(&mut var, "ms");
        ds.insert("scnlintime", var)?;

        let mut var = util::create_line_variable(height, Some(SCNLINF_FILL))?;
        var.set_attr("flag_values", "0, 1, 2, 3");
        var.set_attr("flag_meanings", "earth_view space_view icct_view iwct_view");
        var.set_attr("standard_name", "status_flag");
        var.set_attr("long_name", "scanline_bitfield");
        ds.insert("scnlinf", var)?;

        self.add_flag_variables(ds, height)?;

        let srf_size = srf_size.unwrap_or(self.generation.max_srf_size());
        for (name, long_name, units) in [
            ("SRF_weights", "Spectral Response Function weights", None),
            ("SRF_frequencies", "Spectral Response Function frequencies", Some("cm^-1")),
        ] {
            let data = create_default_array(srf_size, NUM_CHANNELS, Some(f32::NAN));
            let mut var = Variable::new(&["channel", "n_frequencies"], data)?;
            add_fill_value(&mut var, f32::NAN);
            var.set_attr("long_name", long_name);
            if let Some(units) = units {
                add_units(&mut var, units);
            }
            ds.insert(name, var)?;
        }
        Ok(())
    }

    fn add_easy_fcdr_variables(
        &self,
        ds: &mut Dataset,
        height: usize,
        corr_dx: Option<usize>,
        corr_dy: Option<usize>,
        lut_size: Option<usize>,
    ) -> Result<(), DatasetError> {
        for (name, long_name) in [("u_random", "random uncertainty per pixel"), ("u_non_random", "non-random uncertainty per pixel")] {
            let data = create_default_array_3d(SWATH_WIDTH, height, NUM_CHANNELS, Some(f32::NAN));
            let mut var = Variable::new(&["channel", "y", "x"], data)?;
            add_fill_value(&mut var, f32::NAN);
            var.set_attr("long_name", long_name);
            add_units(&mut var, "K");
            ds.insert(name, var)?;
        }

        util::add_correlation_matrices(ds, NUM_CHANNELS)?;

        if let Some(lut_size) = lut_size {
            util::add_lookup_tables(ds, NUM_CHANNELS, lut_size)?;
        }

        if let (Some(dx), Some(dy)) = (corr_dx, corr_dy) {
            util::add_correlation_coefficients(ds, NUM_CHANNELS, dx, dy)?;
        }
        Ok(())
    }

    fn add_full_fcdr_variables(&self, ds: &mut Dataset, height: usize) -> Result<(), DatasetError> {
        for (name, standard_name, units) in [
            ("u_lat", "uncertainty_latitude", "degree"),
            ("u_lon", "uncertainty_longitude", "degree"),
            ("u_time", "uncertainty_time", "s"),
        ] {
            let mut var = util::create_float_variable(SWATH_WIDTH, height, Some(standard_name), None, None)?;
            add_units(&mut var, units);
            ds.insert(name, var)?;
        }

        for (name, parameter) in [("u_c_earth", "C_E"), ("u_c_space", "C_s")] {
            let view = if parameter == "C_E" { "Earth" } else { "space" };
            let data = create_default_array::<u16>(NUM_CALIBRATION_CYCLES, NUM_CHANNELS, None);
            let mut var = Variable::new(&["channel", "calibration_number"], data)?;
            add_fill_value(&mut var, u16::DEFAULT_FILL);
            var.set_attr("long_name", format!("uncertainty counts for {view} views"));
            add_units(&mut var, "count");
            var.set_attr("ancilliary_variables", format!("{name}_chan_corr"));
            var.set_attr("channels_affected", "all");
            var.set_attr("parameter", parameter);
            var.set_attr(corr::PDF_SHAPE, "gaussian");
            var.set_attr("scale_factor", 0.005);
            ds.insert(name, var)?;
            ds.insert(
                &format!("{name}_chan_corr"),
                util::create_channel_correlation_variable(NUM_CHANNELS, &format!("{name} channel correlations"))?,
            )?;
        }

        for (suffix, description) in [
            ("random", "random"),
            ("structuredrandom", "structured_random"),
            ("systematic", "systematic"),
            ("total", "total"),
        ] {
            let data = create_default_array_3d::<f32>(SWATH_WIDTH, height, NUM_RADIANCE_CHANNELS, None);
            let mut var = Variable::new(&["rad_channel", "y", "x"], data)?;
            add_fill_value(&mut var, f32::DEFAULT_FILL);
            var.set_attr("standard_name", format!("uncertainty_radiance_Earth_{description}"));
            add_units(&mut var, RADIANCE_UNITS);
            ds.insert(&format!("u_L_earth_{suffix}"), var)?;
        }

        let data = create_default_array::<f32>(NUM_RADIANCE_CHANNELS, NUM_RADIANCE_CHANNELS, None);
        let mut var = Variable::new(&["rad_channel", "rad_channel_2"], data)?;
        add_fill_value(&mut var, f32::DEFAULT_FILL);
        var.set_attr("standard_name", "covariance_radiance_Earth");
        ds.insert("S_u_L_earth", var)?;

        for (suffix, description) in [
            ("random", "random"),
            ("structuredrandom", "structured_random"),
            ("systematic", "systematic"),
            ("total", "total"),
        ] {
            let data = create_default_array_3d::<f32>(SWATH_WIDTH, height, NUM_CHANNELS, None);
            let mut var = Variable::new(&["channel", "y", "x"], data)?;
            add_fill_value(&mut var, f32::DEFAULT_FILL);
            var.set_attr("standard_name", format!("uncertainty_bt_{description}"));
            add_units(&mut var, "K");
            ds.insert(&format!("u_bt_{suffix}"), var)?;
        }

        let data = create_default_array::<f32>(NUM_CHANNELS, NUM_CHANNELS, None);
        let mut var = Variable::new(&["channel", "channel_2"], data)?;
        add_fill_value(&mut var, f32::DEFAULT_FILL);
        var.set_attr("standard_name", "covariance_brightness_temperature");
        ds.insert("S_bt", var)?;

        for (name, standard_name) in [
            ("calcof", "calibration_coefficients"),
            ("u_calcof", "uncertainty_calibration_coefficients"),
        ] {
            let data = create_default_array_3d::<f32>(SWATH_WIDTH, height, NUM_COEFFS, None);
            let mut var = Variable::new(&["coeffs", "y", "x"], data)?;
            add_fill_value(&mut var, f32::DEFAULT_FILL);
            var.set_attr("standard_name", standard_name);
            ds.insert(name, var)?;
        }

        self.add_navigation_variables(ds, height)?;
        add_housekeeping_variables(ds, height)?;

        for (name, standard_name) in [
            ("u_sol_za", "uncertainty_solar_zenith_angle"),
            ("u_sol_aa", "uncertainty_solar_azimuth_angle"),
            ("u_sat_za", "uncertainty_satellite_zenith_angle"),
            ("u_sat_aa", "uncertainty_local_azimuth_angle"),
        ] {
            let mut var =
                util::create_float_variable(SWATH_WIDTH, height, Some(standard_name), None, Some(ANGLE_UNCERTAINTY_FILL))?;
            add_units(&mut var, "degree");
            ds.insert(name, var)?;
        }

        for name in SCALAR_UNCERTAINTIES {
            ds.insert(name, util::create_scalar_float_variable(None, None, None)?)?;
        }

        let mut var = Variable::new::<&str>(&[], ArrayData::full(&[], u16::DEFAULT_FILL))?;
        add_fill_value(&mut var, u16::DEFAULT_FILL);
        var.set_attr("channels_affected", "all");
        corr::add_fully_correlated(&mut var);
        var.set_attr("parameter", "O_TPRT");
        var.set_attr(corr::PDF_SHAPE, "gaussian");
        var.set_attr("scale_factor", 0.01);
        var.set_attr("short_name", "O_TPRT");
        add_units(&mut var, "K");
        var.set_attr("ancilliary_variables", "u_O_TPRT_chan_corr");
        ds.insert("u_O_TPRT", var)?;
        ds.insert(
            "u_O_TPRT_chan_corr",
            util::create_channel_correlation_variable(NUM_CHANNELS, "u_O_TPRT channel correlations")?,
        )?;

        ds.insert("emissivity", util::create_scalar_float_variable(None, Some("emissivity"), Some("1"))?)?;
        ds.insert(
            "temp_corr_slope",
            util::create_scalar_float_variable(None, Some("Slope for effective temperature correction"), Some("1"))?,
        )?;
        ds.insert(
            "temp_corr_offset",
            util::create_scalar_float_variable(None, Some("Offset for effective temperature correction"), Some("1"))?,
        )?;
        Ok(())
    }

    fn swath_width(&self) -> usize {
        SWATH_WIDTH
    }

    fn template_key(&self) -> &'static str {
        match self.generation {
            HirsGeneration::Hirs2 => "HIRS2",
            HirsGeneration::Hirs3 => "HIRS3",
            HirsGeneration::Hirs4 => "HIRS4",
        }
    }
}

impl Hirs {
    /// Platform attitude and the per-scanline values copied from the level 1b records.
    fn add_navigation_variables(&self, ds: &mut Dataset, height: usize) -> Result<(), DatasetError> {
        let int_lines = [
            ("navigation_status", Some("status_flag"), "Navigation status bit field", "hrs_navstat"),
            ("quality_flags", Some("status_flag"), "Quality indicator bit field", "hrs_qualind"),
            ("scanline_number", None, "scanline number", "hrs_scnlin"),
            ("scanline_position", None, "Scanline position number in 32 second cycle", "hrs_scnpos"),
        ];
        for (name, standard_name, long_name, orig_name) in int_lines {
            let mut var = util::create_line_variable::<i32>(height, None)?;
            if let Some(standard_name) = standard_name {
                var.set_attr("standard_name", standard_name);
            }
            var.set_attr("long_name", long_name);
            var.set_attr("orig_name", orig_name);
            ds.insert(name, var)?;
        }

        let float_lines = [
            ("platform_altitude", "Platform altitude", "hrs_scalti", "km"),
            ("platform_pitch_angle", "Platform pitch angle", "hrs_pitchang", "degree"),
            ("platform_roll_angle", "Platform roll angle", "hrs_rollang", "degree"),
            ("platform_yaw_angle", "Platform yaw angle", "hrs_yawang", "degree"),
        ];
        for (name, long_name, orig_name, units) in float_lines {
            let mut var = util::create_line_variable(height, Some(f32::NAN))?;
            var.set_attr("long_name", long_name);
            var.set_attr("orig_name", orig_name);
            add_units(&mut var, units);
            ds.insert(name, var)?;
        }

        let mut var = Variable::new(&["y", "scan_position"], create_default_array(NUM_SCAN_ANGLES, height, Some(f32::NAN)))?;
        add_fill_value(&mut var, f32::NAN);
        var.set_attr("long_name", "Scan angles");
        var.set_attr("orig_name", "hrs_ang");
        add_units(&mut var, "degree");
        ds.insert("scan_angles", var)?;

        let data = create_default_array(NUM_SECOND_CALIBRATION_COEFFS, height, Some(f32::NAN));
        let mut var = Variable::new(&["y", "calibration_coefficient"], data)?;
        add_fill_value(&mut var, f32::NAN);
        var.set_attr("long_name", "Second original calibration coefficients (unsorted)");
        var.set_attr("orig_name", "hrs_scalcof");
        ds.insert("second_original_calibration_coefficients", var)
    }
}

/// Raw and converted housekeeping temperatures with their uncertainties.
fn add_housekeeping_variables(ds: &mut Dataset, height: usize) -> Result<(), DatasetError> {
    for (suffix, description) in HOUSEKEEPING_TEMPERATURES {
        let mut var = util::create_line_variable::<i32>(height, None)?;
        var.set_attr("standard_name", format!("temperature_{description}_counts"));
        add_units(&mut var, "count");
        ds.insert(&format!("Tc_{suffix}"), var)?;
    }

    for (suffix, description) in HOUSEKEEPING_TEMPERATURES {
        let mut var = util::create_line_variable::<f32>(height, None)?;
        var.set_attr("standard_name", format!("uncertainty_temperature_{description}_counts"));
        add_units(&mut var, "count");
        ds.insert(&format!("u_Tc_{suffix}"), var)?;
    }

    for (name, long_name, orig_name, nan_filled, shape) in TEMPERATURES_K {
        let fill_value = if nan_filled { f32::NAN } else { f32::DEFAULT_FILL };
        let mut var = match shape {
            TemperatureShape::Line => Variable::new(&["y"], create_default_vector(height, Some(fill_value)))?,
            TemperatureShape::PerReading => {
                Variable::new(&["y", "prt_reading"], create_default_array(PRT_READINGS, height, Some(fill_value)))?
            }
            TemperatureShape::PerPrtReading => Variable::new(
                &["prt_number_iwt", "y", "prt_reading"],
                ArrayData::full(&[NUM_IWCT_PRTS, height, PRT_READINGS], fill_value),
            )?,
        };
        add_fill_value(&mut var, fill_value);
        var.set_attr("long_name", long_name);
        if let Some(orig_name) = orig_name {
            var.set_attr("orig_name", orig_name);
        }
        add_units(&mut var, "K");
        ds.insert(name, var)?;
    }

    for (suffix, description) in HOUSEKEEPING_TEMPERATURES {
        let mut var = util::create_line_variable::<f32>(height, None)?;
        var.set_attr("long_name", format!("uncertainty_temperature_{description}_K"));
        add_units(&mut var, "K");
        ds.insert(&format!("u_TK_{suffix}"), var)?;
    }
    Ok(())
}

/// A variable already holding packed integers, with the CF attributes to unpack them.
fn packed_variable<T: Element>(
    dims: &[&str],
    data: ArrayData,
    fill_value: T,
    scale_factor: f64,
    add_offset: f64,
) -> Result<Variable, DatasetError> {
    let mut var = Variable::new(dims, data)?;
    add_fill_value(&mut var, fill_value);
    var.set_attr("scale_factor", scale_factor);
    var.set_attr("add_offset", add_offset);
    Ok(var)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::dataset::{AttrValue, DataType};

    const HIRS4: Hirs = Hirs::new(HirsGeneration::Hirs4);

    fn str_attr<'a>(var: &'a Variable, name: &str) -> &'a str {
        var.attr(name).and_then(|a| a.as_str()).unwrap_or_else(|| panic!("missing string attribute {name}"))
    }

    fn value(var: &Variable, index: &[usize]) -> f64 {
        var.array().unwrap().get_f64(index).unwrap()
    }

    fn full(height: usize) -> Dataset {
        let mut ds = Dataset::new();
        HIRS4.add_full_fcdr_variables(&mut ds, height).unwrap();
        ds
    }

    #[test]
    fn test_add_original_variables() {
        let mut ds = Dataset::new();
        HIRS4.add_original_variables(&mut ds, 6, None).unwrap();

        let lat = ds.get("latitude").unwrap();
        assert_eq!(lat.shape(), &[6, 56]);
        assert_eq!(value(lat, &[0, 0]), -32768.0);

        let bt = ds.get("bt").unwrap();
        assert_eq!(bt.shape(), &[19, 6, 56]);
        assert_eq!(bt.dtype(), DataType::I16);
        assert_eq!(value(bt, &[0, 2, 1]), -999.0);
        assert_eq!(bt.fill_value(), Some(&AttrValue::I16(-999)));
        assert_eq!(str_attr(bt, "long_name"), "Brightness temperature, NOAA/EUMETSAT calibrated");
        assert_eq!(bt.attr("scale_factor"), Some(&AttrValue::F64(0.01)));
        assert_eq!(bt.attr("add_offset"), Some(&AttrValue::F64(150.0)));
        assert_eq!(str_attr(bt, "ancilliary_variables"), "scnlinf qualind linqualflags chqualflags mnfrqualflags");

        let c_earth = ds.get("c_earth").unwrap();
        assert_eq!(c_earth.shape(), &[20, 6, 56]);
        assert_eq!(value(c_earth, &[0, 2, 3]), 65535.0);
        assert_eq!(str_attr(c_earth, "long_name"), "counts_earth");

        let l_earth = ds.get("L_earth").unwrap();
        assert!(value(l_earth, &[0, 2, 4]).is_nan());
        assert!(l_earth.fill_value().unwrap().is_nan());
        assert_eq!(str_attr(l_earth, "units"), "W/Hz/m ** 2/sr");
        assert_eq!(str_attr(l_earth, "orig_name"), "radiance");

        let sat_aa = ds.get("sat_aa").unwrap();
        assert_eq!(value(sat_aa, &[5, 5]), 65535.0);
        assert_eq!(sat_aa.attr("add_offset"), Some(&AttrValue::F64(-180.0)));
        assert_eq!(str_attr(sat_aa, "standard_name"), "sensor_azimuth_angle");
        assert_eq!(str_attr(sat_aa, "long_name"), "local_azimuth_angle");

        let sol_za = ds.get("solar_zenith_angle").unwrap();
        assert_eq!(str_attr(sol_za, "orig_name"), "sol_za");
        assert_eq!(str_attr(ds.get("sat_za").unwrap(), "standard_name"), "platform_zenith_angle");

        let scanline = ds.get("scanline").unwrap();
        assert_eq!(scanline.shape(), &[6]);
        assert_eq!(value(scanline, &[3]), -32767.0);
        assert_eq!(str_attr(scanline, "units"), "count");

        let time = ds.get("time").unwrap();
        assert_eq!(time.fill_value(), Some(&AttrValue::U32(4294967295)));

        let scnlintime = ds.get("scnlintime").unwrap();
        assert_eq!(value(scnlintime, &[4]), -2147483647.0);
        assert_eq!(str_attr(scnlintime, "units"), "ms");

        let scnlinf = ds.get("scnlinf").unwrap();
        assert_eq!(value(scnlinf, &[4]), 9.0);
        assert_eq!(scnlinf.fill_value(), Some(&AttrValue::I8(9)));
        assert_eq!(str_attr(scnlinf, "flag_values"), "0, 1, 2, 3");
        assert_eq!(str_attr(scnlinf, "flag_meanings"), "earth_view space_view icct_view iwct_view");

        let qualind = ds.get("qualind").unwrap();
        assert_eq!(value(qualind, &[5]), 0.0);
        assert_eq!(str_attr(qualind, "flag_masks"), "1, 2, 4, 8, 16, 32, 64, 128");
        assert_eq!(str_attr(qualind, "long_name"), "quality_indicator_bitfield");

        let linqualflags = ds.get("linqualflags").unwrap();
        assert!(str_attr(linqualflags, "flag_masks").ends_with("134217728, 268435456"));
        assert!(str_attr(linqualflags, "flag_meanings").starts_with("time_field_bad time_field_bad_not_inf"));

        let chqualflags = ds.get("chqualflags").unwrap();
        assert_eq!(chqualflags.shape(), &[6, 19]);
        assert_eq!(value(chqualflags, &[1, 2]), 0.0);

        let mnfrqualflags = ds.get("mnfrqualflags").unwrap();
        assert_eq!(mnfrqualflags.shape(), &[6, 64]);
        assert_eq!(str_attr(mnfrqualflags, "long_name"), "minor_frame_quality_flags_bitfield");

        assert_eq!(ds.get("SRF_weights").unwrap().shape(), &[19, 51]);
    }

    #[test]
    fn test_hirs2_flags_and_srf_size() {
        let hirs2 = Hirs::new(HirsGeneration::Hirs2);
        let mut ds = Dataset::new();
        hirs2.add_original_variables(&mut ds, 4, None).unwrap();

        assert!(ds.contains("qualind"));
        assert!(ds.contains("mnfrqualflags"));
        assert!(!ds.contains("linqualflags"));
        assert!(!ds.contains("chqualflags"));
        assert_eq!(str_attr(ds.get("bt").unwrap(), "ancilliary_variables"), "scnlinf qualind mnfrqualflags");
        assert_eq!(ds.get("SRF_frequencies").unwrap().shape(), &[19, 102]);
    }

    #[test]
    fn test_add_easy_fcdr_variables() {
        let mut ds = Dataset::new();
        HIRS4.add_easy_fcdr_variables(&mut ds, 7, None, None, None).unwrap();
        for (name, long_name) in [("u_random", "random uncertainty per pixel"), ("u_non_random", "non-random uncertainty per pixel")] {
            let var = ds.get(name).unwrap();
            assert_eq!(var.shape(), &[19, 7, 56]);
            assert!(value(var, &[2, 5, 3]).is_nan());
            assert!(var.fill_value().unwrap().is_nan());
            assert_eq!(str_attr(var, "long_name"), long_name);
        }
        assert_eq!(ds.get("channel_correlation_matrix_structured").unwrap().shape(), &[19, 19]);
    }

    #[test]
    fn test_full_uncertainties() {
        let ds = full(7);

        let u_lat = ds.get("u_lat").unwrap();
        assert_eq!(u_lat.shape(), &[7, 56]);
        assert_eq!(value(u_lat, &[3, 3]), f32::DEFAULT_FILL as f64);
        assert_eq!(str_attr(u_lat, "standard_name"), "uncertainty_latitude");

        let u_c_earth = ds.get("u_c_earth").unwrap();
        assert_eq!(u_c_earth.shape(), &[19, 337]);
        assert_eq!(value(u_c_earth, &[6, 6]), 65535.0);
        assert_eq!(str_attr(u_c_earth, "long_name"), "uncertainty counts for Earth views");
        assert_eq!(str_attr(u_c_earth, "ancilliary_variables"), "u_c_earth_chan_corr");
        assert_eq!(str_attr(u_c_earth, "parameter"), "C_E");
        assert_eq!(u_c_earth.attr("scale_factor"), Some(&AttrValue::F64(0.005)));

        let u_c_space = ds.get("u_c_space").unwrap();
        assert_eq!(str_attr(u_c_space, "parameter"), "C_s");
        assert_eq!(str_attr(u_c_space, "ancilliary_variables"), "u_c_space_chan_corr");

        let corr = ds.get("u_c_space_chan_corr").unwrap();
        assert_eq!(corr.shape(), &[19, 19]);
        assert!(value(corr, &[11, 14]).is_nan());
        assert_eq!(str_attr(corr, "long_name"), "u_c_space channel correlations");

        let sr = ds.get("u_L_earth_structuredrandom").unwrap();
        assert_eq!(sr.shape(), &[20, 7, 56]);
        assert_eq!(str_attr(sr, "standard_name"), "uncertainty_radiance_Earth_structured_random");
        assert_eq!(str_attr(sr, "units"), "mW m^-2 sr^-1 cm");

        assert_eq!(ds.get("S_u_L_earth").unwrap().shape(), &[20, 20]);
        assert_eq!(ds.get("S_bt").unwrap().shape(), &[19, 19]);
        assert_eq!(str_attr(ds.get("u_bt_total").unwrap(), "standard_name"), "uncertainty_bt_total");
        assert_eq!(ds.get("calcof").unwrap().shape(), &[3, 7, 56]);

        let u_sat_aa = ds.get("u_sat_aa").unwrap();
        assert_eq!(value(u_sat_aa, &[6, 6]), -999.0);
        assert_eq!(u_sat_aa.fill_value(), Some(&AttrValue::F32(-999.0)));
        assert_eq!(str_attr(u_sat_aa, "standard_name"), "uncertainty_local_azimuth_angle");
    }

    #[test]
    fn test_full_navigation_variables() {
        let ds = full(7);

        let nav = ds.get("navigation_status").unwrap();
        assert_eq!(nav.shape(), &[7]);
        assert_eq!(nav.fill_value(), Some(&AttrValue::I32(-2147483647)));
        assert_eq!(str_attr(nav, "orig_name"), "hrs_navstat");

        let altitude = ds.get("platform_altitude").unwrap();
        assert!(value(altitude, &[4]).is_nan());
        assert_eq!(str_attr(altitude, "units"), "km");
        assert_eq!(str_attr(ds.get("platform_yaw_angle").unwrap(), "units"), "degree");

        let scan_angles = ds.get("scan_angles").unwrap();
        assert_eq!(scan_angles.shape(), &[7, 168]);
        assert!(value(scan_angles, &[4, 18]).is_nan());

        let coeffs = ds.get("second_original_calibration_coefficients").unwrap();
        assert_eq!(coeffs.shape(), &[7, 60]);
        assert_eq!(str_attr(coeffs, "orig_name"), "hrs_scalcof");
    }

    #[rstest]
    #[case("Tc_baseplate", "temperature_baseplate_counts")]
    #[case("Tc_ch", "temperature_coolerhousing_counts")]
    #[case("Tc_icct", "temperature_internal_cold_calibration_target_counts")]
    #[case("Tc_scanmotor", "temperature_scanmotor_counts")]
    fn test_line_counts_variable(#[case] name: &str, #[case] standard_name: &str) {
        let ds = full(7);
        let var = ds.get(name).unwrap();
        assert_eq!(var.shape(), &[7]);
        assert_eq!(value(var, &[4]), -2147483647.0);
        assert_eq!(str_attr(var, "standard_name"), standard_name);
        assert_eq!(str_attr(var, "units"), "count");

        let u_var = ds.get(&format!("u_{name}")).unwrap();
        assert_eq!(u_var.dtype(), DataType::F32);
        assert_eq!(str_attr(u_var, "standard_name"), format!("uncertainty_{standard_name}"));
    }

    #[rstest]
    #[case("TK_baseplate", "Temperature baseplate", Some("temp_baseplate"), true)]
    #[case("TK_radiator_analog", "temperature_radiator_analog_K", Some("temp_an_rd"), true)]
    #[case("TK_icct", "temperature_internal_cold_calibration_target_K", None, false)]
    #[case("TK_tlscp_tert", "temperature_telescope_tertiary_K", None, false)]
    #[case("u_TK_fwh", "uncertainty_temperature_filter_wheel_housing_K", None, false)]
    fn test_line_temperature_variable(
        #[case] name: &str,
        #[case] long_name: &str,
        #[case] orig_name: Option<&str>,
        #[case] nan_filled: bool,
    ) {
        let ds = full(7);
        let var = ds.get(name).unwrap();
        assert_eq!(var.shape(), &[7]);
        if nan_filled {
            assert!(value(var, &[4]).is_nan());
            assert!(var.fill_value().unwrap().is_nan());
        } else {
            assert_eq!(value(var, &[4]), f32::DEFAULT_FILL as f64);
            assert_eq!(var.fill_value(), Some(&AttrValue::F32(f32::DEFAULT_FILL)));
        }
        assert_eq!(str_attr(var, "long_name"), long_name);
        assert_eq!(var.attr("orig_name").and_then(|a| a.as_str()), orig_name);
        assert_eq!(str_attr(var, "units"), "K");
    }

    #[test]
    fn test_multi_dimensional_temperatures() {
        let ds = full(7);
        for name in ["TK_fsr", "TK_patch_exp"] {
            let var = ds.get(name).unwrap();
            assert_eq!(var.shape(), &[7, 5]);
            assert!(value(var, &[6, 4]).is_nan());
        }
        for name in ["TK_fwh", "TK_iwct"] {
            let var = ds.get(name).unwrap();
            assert_eq!(var.shape(), &[4, 7, 5]);
            assert!(value(var, &[2, 5, 3]).is_nan());
        }
        assert_eq!(str_attr(ds.get("TK_iwct").unwrap(), "orig_name"), "temp_iwt");
    }

    #[test]
    fn test_scalar_variables() {
        let ds = full(7);
        for name in SCALAR_UNCERTAINTIES.iter().chain(&["emissivity", "temp_corr_slope", "temp_corr_offset"]) {
            let var = ds.get(name).unwrap();
            assert!(var.shape().is_empty(), "{name} should be a scalar");
            assert!(value(var, &[]).is_nan());
            assert!(var.fill_value().unwrap().is_nan());
        }
        assert_eq!(str_attr(ds.get("temp_corr_slope").unwrap(), "long_name"), "Slope for effective temperature correction");
    }

    #[test]
    fn test_u_o_tprt() {
        let ds = full(7);
        let var = ds.get("u_O_TPRT").unwrap();
        assert!(var.shape().is_empty());
        assert_eq!(value(var, &[]), 65535.0);
        assert_eq!(var.fill_value(), Some(&AttrValue::U16(65535)));
        let unbounded = AttrValue::F64s(vec![f64::NEG_INFINITY, f64::INFINITY]);
        assert_eq!(str_attr(var, corr::SCAN_CORR_FORM), "rectangle");
        assert_eq!(str_attr(var, corr::SCAN_CORR_UNIT), "pixel");
        assert_eq!(var.attr(corr::SCAN_CORR_SCALE), Some(&unbounded));
        assert_eq!(str_attr(var, corr::TIME_CORR_UNIT), "line");
        assert_eq!(str_attr(var, corr::IMG_CORR_UNIT), "images");
        assert_eq!(var.attr(corr::IMG_CORR_SCALE), Some(&unbounded));
        assert_eq!(str_attr(var, "short_name"), "O_TPRT");
        assert_eq!(var.attr("scale_factor"), Some(&AttrValue::F64(0.01)));
        assert_eq!(str_attr(var, "ancilliary_variables"), "u_O_TPRT_chan_corr");
        assert_eq!(ds.get("u_O_TPRT_chan_corr").unwrap().shape(), &[19, 19]);
    }
}
