//! Template for the Advanced Very High Resolution Radiometer.
//!
//! Channel data, angles and uncertainties are held as `float32` with NaN
//! fills in memory and packed into 16-bit integers on disk.
use crate::correlation::{self as corr, AxisCorrelation};
use crate::dataset::{AttrValue, DataType, Dataset, Element, Variable};
use crate::default_data::{create_default_array, create_default_vector};
use crate::error::DatasetError;

use super::util::{self, add_chunking, add_encoding, add_fill_value, add_geolocation_attribute, add_units};
use super::Template;

pub const SWATH_WIDTH: usize = 409;
pub const PRT_WIDTH: usize = 3;
pub const N_CHANS: usize = 6;
pub const MAX_SRF_SIZE: usize = 5902;
pub const CHUNKS_2D: [usize; 2] = [1280, 409];

pub const CHANNELS: [&str; 6] = ["Ch1", "Ch2", "Ch3a", "Ch3b", "Ch4", "Ch5"];
const REFL_CHANNELS: [&str; 3] = ["Ch1", "Ch2", "Ch3a"];
const BT_CHANNELS: [&str; 3] = ["Ch3b", "Ch4", "Ch5"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Avhrr;

impl Template for Avhrr {
    fn add_original_variables(&self, ds: &mut Dataset, height: usize, srf_size: Option<usize>) -> Result<(), DatasetError> {
        util::add_geolocation_variables(ds, SWATH_WIDTH, height, Some(&CHUNKS_2D))?;
        util::add_quality_flags(ds, SWATH_WIDTH, height, Some(&CHUNKS_2D))?;

        let mut var = Variable::new(&["y"], create_default_vector(height, Some(f64::NAN)))?;
        add_fill_value(&mut var, f64::NAN);
        add_units(&mut var, "s");
        var.set_attr("standard_name", "time");
        var.set_attr("long_name", "Acquisition time in seconds since 1970-01-01 00:00:00");
        ds.insert("Time", var)?;

        let angles = [
            ("relative_azimuth_angle", "relative_azimuth_angle", -18000, 18000),
            ("satellite_zenith_angle", "sensor_zenith_angle", 0, 9000),
            ("solar_zenith_angle", "solar_zenith_angle", 0, 18000),
        ];
        for (name, standard_name, valid_min, valid_max) in angles {
            let mut var = packed_float_variable(height, DataType::I16, i16::DEFAULT_FILL.into_attr(), 0.01, 0.0)?;
            var.set_attr("standard_name", standard_name);
            add_units(&mut var, "degree");
            var.set_attr("valid_max", valid_max);
            var.set_attr("valid_min", valid_min);
            add_geolocation_attribute(&mut var);
            ds.insert(name, var)?;
        }

        for (name, long_name) in [
            ("Ch1", "Channel 1 Reflectance"),
            ("Ch2", "Channel 2 Reflectance"),
            ("Ch3a", "Channel 3a Reflectance"),
        ] {
            ds.insert(name, create_channel_refl_variable(height, long_name)?)?;
        }
        for (name, long_name) in [
            ("Ch3b", "Channel 3b Brightness Temperature"),
            ("Ch4", "Channel 4 Brightness Temperature"),
            ("Ch5", "Channel 5 Brightness Temperature"),
        ] {
            ds.insert(name, create_channel_bt_variable(height, long_name)?)?;
        }

        let mut var = Variable::new(&["y", "x"], create_default_array(SWATH_WIDTH, height, Some(0u8)))?
            .with_attr("standard_name", "status_flag")
            .with_attr("long_name", "bitmask for quality per pixel")
            .with_attr("flag_masks", "1,2")
            .with_attr("flag_meanings", "bad_geolocation_timing_err bad_calibration_radiometer_err");
        add_chunking(&mut var, &CHUNKS_2D);
        add_geolocation_attribute(&mut var);
        ds.insert("data_quality_bitmask", var)?;

        let var = Variable::new(&["y"], create_default_vector(height, Some(0u8)))?
            .with_attr("long_name", "bitmask for quality per scanline")
            .with_attr("standard_name", "status_flag")
            .with_attr("flag_masks", "1,2,4,8,16,32,64")
            .with_attr(
                "flag_meanings",
                "do_not_use bad_time bad_navigation bad_calibration channel3a_present solar_contamination solar_in_earth_view",
            );
        ds.insert("quality_scanline_bitmask", var)?;

        let var = Variable::new(&["y", "channel"], create_default_array(N_CHANS, height, Some(0u8)))?
            .with_attr("long_name", "bitmask for quality per channel")
            .with_attr("standard_name", "status_flag")
            .with_attr("flag_masks", "1,2")
            .with_attr("flag_meanings", "bad_channel some_pixels_not_detected_2sigma");
        ds.insert("quality_channel_bitmask", var)?;

        let srf_size = srf_size.unwrap_or(MAX_SRF_SIZE);

        let mut var = Variable::new(&["channel", "n_frequencies"], create_default_array(srf_size, N_CHANS, Some(f32::NAN)))?
            .with_attr("long_name", "Spectral Response Function weights")
            .with_attr("description", "Per channel: weights for the relative spectral response function");
        add_encoding(&mut var, DataType::I16, AttrValue::I16(-32768), 0.000033, 0.0, None);
        ds.insert("SRF_weights", var)?;

        let mut var = Variable::new(&["channel", "n_frequencies"], create_default_array(srf_size, N_CHANS, Some(f32::NAN)))?
            .with_attr("long_name", "Spectral Response Function wavelengths")
            .with_attr("description", "Per channel: wavelengths for the relative spectral response function");
        add_encoding(&mut var, DataType::I32, AttrValue::I32(-2147483648), 0.0001, 0.0, None);
        add_units(&mut var, "um");
        ds.insert("SRF_wavelengths", var)?;

        let mut var = util::create_line_variable::<u8>(height, Some(255))?;
        var.set_attr("long_name", "Indicator of original file");
        var.set_attr(
            "description",
            "Indicator for mapping each line to its corresponding original level 1b file. \
             See global attribute 'source' for the filenames. 0 corresponds to 1st listed file, 1 to 2nd file.",
        );
        ds.insert("scanline_map_to_origl1bfile", var)?;

        let mut var = util::create_line_variable::<i16>(height, None)?;
        var.set_attr("long_name", "Original_Scan_line_number");
        var.set_attr("description", "Original scan line numbers from corresponding l1b records");
        ds.insert("scanline_origl1b", var)?;

        util::add_coordinates(ds, &CHANNELS);
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
        for effect in ["independent", "structured"] {
            for ch in REFL_CHANNELS {
                let long_name = format!("{effect} uncertainty per pixel for channel {}", channel_label(ch));
                let var = create_refl_uncertainty_variable(height, [10, 10000], 1e-5, &long_name, "1")?;
                ds.insert(&format!("u_{effect}_{ch}"), var)?;
            }
        }
        for ch in REFL_CHANNELS {
            let long_name = format!("common uncertainty per pixel for channel {}", channel_label(ch));
            let var = create_refl_uncertainty_variable(height, [1, 1000], 0.001, &long_name, "percent")?;
            ds.insert(&format!("u_common_{ch}"), var)?;
        }

        for effect in ["independent", "structured", "common"] {
            for ch in BT_CHANNELS {
                let long_name = format!("{effect} uncertainty per pixel for channel {}", channel_label(ch));
                ds.insert(&format!("u_{effect}_{ch}"), create_bt_uncertainty_variable(height, &long_name)?)?;
            }
        }

        util::add_correlation_matrices(ds, N_CHANS)?;

        if let Some(lut_size) = lut_size {
            util::add_lookup_tables(ds, N_CHANS, lut_size)?;
        }

        if let (Some(dx), Some(dy)) = (corr_dx, corr_dy) {
            util::add_correlation_coefficients(ds, N_CHANS, dx, dy)?;
        }
        Ok(())
    }

    fn add_full_fcdr_variables(&self, ds: &mut Dataset, height: usize) -> Result<(), DatasetError> {
        ds.insert("u_latitude", create_angle_uncertainty_variable("latitude", height)?)?;
        ds.insert("u_longitude", create_angle_uncertainty_variable("longitude", height)?)?;

        let mut var = Variable::new(&["y"], create_default_vector(height, Some(f64::NAN)))?;
        add_fill_value(&mut var, f64::NAN);
        add_units(&mut var, "s");
        var.set_attr("long_name", "uncertainty of acquisition time");
        ds.insert("u_time", var)?;

        for angle in ["satellite azimuth angle", "satellite zenith angle", "solar azimuth angle", "solar zenith angle"] {
            let name = format!("u_{}", angle.replace(' ', "_"));
            ds.insert(&name, create_angle_uncertainty_variable(angle, height)?)?;
        }

        let mut var = Variable::new(&["y", "n_prt"], create_default_array::<i16>(PRT_WIDTH, height, None))?;
        add_fill_value(&mut var, i16::DEFAULT_FILL);
        var.set_attr("long_name", "Prt counts");
        add_units(&mut var, "count");
        ds.insert("PRT_C", var)?;

        let mut var = prt_float_variable(height, "Uncertainty on the PRT counts", "count")?;
        corr::add_scan_correlation(&mut var, &AxisCorrelation::unbounded(corr::PIXEL));
        corr::add_time_correlation(&mut var, &AxisCorrelation::unbounded(corr::LINE));
        var.set_attr(corr::PDF_SHAPE, "rectangle");
        var.set_attr(corr::PDF_PARAMETER, 0.1);
        ds.insert("u_prt", var)?;

        ds.insert("R_ICT", prt_float_variable(height, "Radiance of the PRT", "mW m^-2 sr^-1 cm")?)?;

        let mut var = util::create_line_variable(height, Some(f32::NAN))?;
        var.set_attr("long_name", "Instrument temperature");
        add_units(&mut var, "K");
        ds.insert("T_instr", var)?;

        for ch in CHANNELS {
            ds.insert(&format!("{ch}_Csp"), create_counts_variable(height, &format!("{ch} Space counts"))?)?;
        }
        for ch in BT_CHANNELS {
            ds.insert(&format!("{ch}_Cict"), create_counts_variable(height, &format!("{ch} ICT counts"))?)?;
        }
        for ch in CHANNELS {
            ds.insert(&format!("{ch}_Ce"), create_counts_variable(height, &format!("{ch} Earth counts"))?)?;
        }

        for ch in CHANNELS {
            let mut var = create_counts_uncertainty_variable(height, &format!("{ch} Uncertainty on space counts"))?;
            add_count_correlation_attributes(&mut var);
            ds.insert(&format!("{ch}_u_Csp"), var)?;
        }
        for ch in BT_CHANNELS {
            let mut var = create_counts_uncertainty_variable(height, &format!("{ch} Uncertainty on ICT counts"))?;
            add_count_correlation_attributes(&mut var);
            ds.insert(&format!("{ch}_u_Cict"), var)?;
        }
        for ch in CHANNELS {
            let mut var = create_counts_uncertainty_variable(height, &format!("{ch} Uncertainty on earth counts"))?;
            var.set_attr(corr::PDF_SHAPE, "digitised_gaussian");
            ds.insert(&format!("{ch}_u_Ce"), var)?;
        }

        for ch in REFL_CHANNELS {
            let long_name = format!("{ch} Total uncertainty on toa reflectance");
            ds.insert(&format!("{ch}_u_Refl"), create_refl_uncertainty_variable(height, [3, 5], 0.01, &long_name, "1")?)?;
        }

        for (suffix, kind) in [("u_Bt", "Total"), ("ur_Bt", "Random"), ("us_Bt", "Systematic")] {
            for ch in BT_CHANNELS {
                let long_name = format!("{ch} {kind} uncertainty on brightness temperature");
                ds.insert(&format!("{ch}_{suffix}"), create_bt_uncertainty_variable(height, &long_name)?)?;
            }
        }
        Ok(())
    }

    fn swath_width(&self) -> usize {
        SWATH_WIDTH
    }

    fn template_key(&self) -> &'static str {
        "AVHRR"
    }

    fn add_specific_global_metadata(&self, ds: &mut Dataset) {
        for name in ["Ch3a_Ch3b_split_file", "Ch3a_only", "Ch3b_only", "UUID", "comment", "sensor", "platform"] {
            ds.set_attr(name, "");
        }
    }
}

/// "Ch3a" -> "3a"
fn channel_label(channel: &str) -> &str {
    channel.trim_start_matches("Ch")
}

/// The pixel/scan line correlation of the count uncertainties.
fn add_count_correlation_attributes(var: &mut Variable) {
    corr::add_scan_correlation(var, &AxisCorrelation::unbounded(corr::PIXEL));
    corr::add_time_correlation(var, &AxisCorrelation { form: corr::TRI_REL, unit: corr::LINE, scale: [-25.0, 25.0] });
    var.set_attr(corr::PDF_SHAPE, "digitised_gaussian");
}

fn packed_float_variable(
    height: usize,
    dtype: DataType,
    fill_value: AttrValue,
    scale_factor: f64,
    add_offset: f64,
) -> Result<Variable, DatasetError> {
    let mut var = Variable::new(&["y", "x"], create_default_array(SWATH_WIDTH, height, Some(f32::NAN)))?;
    add_encoding(&mut var, dtype, fill_value, scale_factor, add_offset, Some(&CHUNKS_2D));
    Ok(var)
}

fn prt_float_variable(height: usize, long_name: &str, units: &str) -> Result<Variable, DatasetError> {
    let mut var = Variable::new(&["y", "n_prt"], create_default_array(PRT_WIDTH, height, Some(f32::NAN)))?;
    add_fill_value(&mut var, f32::NAN);
    var.set_attr("long_name", long_name);
    add_units(&mut var, units);
    Ok(var)
}

fn create_channel_refl_variable(height: usize, long_name: &str) -> Result<Variable, DatasetError> {
    let mut var = packed_float_variable(height, DataType::I16, i16::DEFAULT_FILL.into_attr(), 0.0001, 0.0)?;
    var.set_attr("standard_name", "toa_reflectance");
    var.set_attr("long_name", long_name);
    add_units(&mut var, "1");
    var.set_attr("valid_max", 15000);
    var.set_attr("valid_min", 0);
    add_geolocation_attribute(&mut var);
    Ok(var)
}

fn create_channel_bt_variable(height: usize, long_name: &str) -> Result<Variable, DatasetError> {
    let mut var = packed_float_variable(height, DataType::I16, i16::DEFAULT_FILL.into_attr(), 0.01, 273.15)?;
    var.set_attr("standard_name", "toa_brightness_temperature");
    var.set_attr("long_name", long_name);
    add_units(&mut var, "K");
    var.set_attr("valid_max", 10000);
    var.set_attr("valid_min", -20000);
    add_geolocation_attribute(&mut var);
    Ok(var)
}

fn create_refl_uncertainty_variable(
    height: usize,
    valid_range: [i32; 2],
    scale_factor: f64,
    long_name: &str,
    units: &str,
) -> Result<Variable, DatasetError> {
    let mut var = packed_float_variable(height, DataType::I16, i16::DEFAULT_FILL.into_attr(), scale_factor, 0.0)?;
    add_units(&mut var, units);
    add_geolocation_attribute(&mut var);
    var.set_attr("long_name", long_name);
    var.set_attr("valid_min", valid_range[0]);
    var.set_attr("valid_max", valid_range[1]);
    Ok(var)
}

fn create_bt_uncertainty_variable(height: usize, long_name: &str) -> Result<Variable, DatasetError> {
    let mut var = packed_float_variable(height, DataType::I16, i16::DEFAULT_FILL.into_attr(), 0.001, 0.0)?;
    add_units(&mut var, "K");
    add_geolocation_attribute(&mut var);
    var.set_attr("valid_max", 15000);
    var.set_attr("valid_min", 1);
    var.set_attr("long_name", long_name);
    Ok(var)
}

fn create_counts_variable(height: usize, long_name: &str) -> Result<Variable, DatasetError> {
    let mut var = Variable::new(&["y", "x"], create_default_array::<i32>(SWATH_WIDTH, height, None))?;
    add_fill_value(&mut var, i32::DEFAULT_FILL);
    var.set_attr("long_name", long_name);
    add_units(&mut var, "count");
    add_geolocation_attribute(&mut var);
    add_chunking(&mut var, &CHUNKS_2D);
    Ok(var)
}

fn create_counts_uncertainty_variable(height: usize, long_name: &str) -> Result<Variable, DatasetError> {
    let mut var = util::create_float_variable(SWATH_WIDTH, height, None, Some(long_name), Some(f32::NAN))?;
    add_units(&mut var, "count");
    add_geolocation_attribute(&mut var);
    add_chunking(&mut var, &CHUNKS_2D);
    Ok(var)
}

fn create_angle_uncertainty_variable(angle_name: &str, height: usize) -> Result<Variable, DatasetError> {
    let long_name = format!("uncertainty of {angle_name}");
    let mut var = util::create_float_variable(SWATH_WIDTH, height, None, Some(&long_name), Some(f32::NAN))?;
    add_units(&mut var, "degree");
    add_geolocation_attribute(&mut var);
    add_chunking(&mut var, &CHUNKS_2D);
    Ok(var)
}
