//! Building blocks shared by the instrument templates.
//!
//! These follow the CF conventions: every variable gets a `_FillValue`,
//! pixel variables on the `(y, x)` grid point to the geolocation variables
//! through their `coordinates` attribute, and flag variables describe their
//! bits with `flag_masks`/`flag_meanings`.
use crate::dataset::{AttrValue, DataType, Dataset, Element, Variable};
use crate::default_data::{create_default_array, create_default_scalar, create_default_vector};
use crate::error::DatasetError;

/// Fill value of the latitude and longitude variables
pub const GEOLOCATION_FILL: f32 = -32768.0;

pub const LICENCE: &str = "This dataset is released for use under CC-BY licence \
    (https://creativecommons.org/licenses/by/4.0/) and was developed in the EC FIDUCEO project \
    \"Fidelity and Uncertainty in Climate Data Records from Earth Observations\". Grant Agreement: 638822.";

/// Global attributes that every product carries but which have to be filled in by the producer.
pub const GLOBAL_PLACEHOLDERS: [&str; 6] = ["institution", "title", "source", "history", "references", "comment"];

pub fn add_fill_value<T: Element>(var: &mut Variable, fill_value: T) {
    var.set_attr("_FillValue", fill_value.into_attr());
}

pub fn add_units(var: &mut Variable, units: &str) {
    var.set_attr("units", units);
}

pub fn add_geolocation_attribute(var: &mut Variable) {
    var.set_attr("coordinates", "longitude latitude");
}

pub fn add_chunking(var: &mut Variable, chunksizes: &[usize]) {
    var.encoding.chunksizes = Some(chunksizes.to_vec());
}

/// Store `var` packed as `dtype` on disk: `packed = round((value - add_offset) / scale_factor)`.
///
/// The variable should hold floating point data; `fill_value` is the packed
/// value that NaN is stored as.
pub fn add_encoding(
    var: &mut Variable,
    dtype: DataType,
    fill_value: AttrValue,
    scale_factor: f64,
    add_offset: f64,
    chunksizes: Option<&[usize]>,
) {
    var.encoding.dtype = Some(dtype);
    var.encoding.fill_value = Some(fill_value);
    var.encoding.scale_factor = Some(scale_factor);
    var.encoding.add_offset = Some(add_offset);
    if let Some(chunks) = chunksizes {
        add_chunking(var, chunks);
    }
}

/// Set `coordinates = "longitude latitude"` on each of the named variables that exists.
pub fn add_coordinates(ds: &mut Dataset, names: &[&str]) {
    for &name in names {
        if let Some(var) = ds.get_mut(name) {
            add_geolocation_attribute(var);
        }
    }
}

pub fn add_geolocation_variables(
    ds: &mut Dataset,
    width: usize,
    height: usize,
    chunksizes: Option<&[usize]>,
) -> Result<(), DatasetError> {
    for (name, units) in [("latitude", "degrees_north"), ("longitude", "degrees_east")] {
        let data = create_default_array(width, height, Some(GEOLOCATION_FILL));
        let mut var = Variable::new(&["y", "x"], data)?;
        add_fill_value(&mut var, GEOLOCATION_FILL);
        var.set_attr("standard_name", name);
        add_units(&mut var, units);
        if let Some(chunks) = chunksizes {
            add_chunking(&mut var, chunks);
        }
        ds.insert(name, var)?;
    }
    Ok(())
}

pub fn add_quality_flags(
    ds: &mut Dataset,
    width: usize,
    height: usize,
    chunksizes: Option<&[usize]>,
) -> Result<(), DatasetError> {
    let data = create_default_array(width, height, Some(0u8));
    let mut var = Variable::new(&["y", "x"], data)?
        .with_attr("standard_name", "status_flag")
        .with_attr("flag_masks", "1, 2, 4, 8, 16, 32")
        .with_attr(
            "flag_meanings",
            "invalid use_with_caution invalid_input invalid_geoloc invalid_time sensor_error",
        );
    add_geolocation_attribute(&mut var);
    if let Some(chunks) = chunksizes {
        add_chunking(&mut var, chunks);
    }
    ds.insert("quality_pixel_bitmask", var)
}

/// A `float32` `(y, x)` variable filled with `fill_value` (the `float32` default if `None`).
pub fn create_float_variable(
    width: usize,
    height: usize,
    standard_name: Option<&str>,
    long_name: Option<&str>,
    fill_value: Option<f32>,
) -> Result<Variable, DatasetError> {
    let fill_value = fill_value.unwrap_or(f32::DEFAULT_FILL);
    let mut var = Variable::new(&["y", "x"], create_default_array(width, height, Some(fill_value)))?;
    add_fill_value(&mut var, fill_value);
    if let Some(name) = standard_name {
        var.set_attr("standard_name", name);
    }
    if let Some(name) = long_name {
        var.set_attr("long_name", name);
    }
    Ok(var)
}

/// A per-scanline `(y)` variable with its `_FillValue` set.
pub fn create_line_variable<T: Element>(height: usize, fill_value: Option<T>) -> Result<Variable, DatasetError> {
    let fill_value = fill_value.unwrap_or(T::DEFAULT_FILL);
    let mut var = Variable::new(&["y"], create_default_vector(height, Some(fill_value)))?;
    add_fill_value(&mut var, fill_value);
    Ok(var)
}

/// A scalar `float32` variable holding NaN.
pub fn create_scalar_float_variable(
    standard_name: Option<&str>,
    long_name: Option<&str>,
    units: Option<&str>,
) -> Result<Variable, DatasetError> {
    let mut var = Variable::new::<&str>(&[], create_default_scalar(Some(f32::NAN)))?;
    add_fill_value(&mut var, f32::NAN);
    if let Some(name) = standard_name {
        var.set_attr("standard_name", name);
    }
    if let Some(name) = long_name {
        var.set_attr("long_name", name);
    }
    if let Some(units) = units {
        add_units(&mut var, units);
    }
    Ok(var)
}

/// A `(channel, channel_2)` NaN-filled matrix of inter-channel error correlations.
pub fn create_channel_correlation_variable(n_chans: usize, long_name: &str) -> Result<Variable, DatasetError> {
    let mut var = Variable::new(&["channel", "channel_2"], create_default_array(n_chans, n_chans, Some(f32::NAN)))?;
    add_fill_value(&mut var, f32::NAN);
    var.set_attr("long_name", long_name);
    Ok(var)
}

pub fn add_correlation_matrices(ds: &mut Dataset, n_chans: usize) -> Result<(), DatasetError> {
    for effect in ["independent", "structured"] {
        let mut var = create_channel_correlation_variable(
            n_chans,
            &format!("Channel_correlation_matrix_{effect}_effects"),
        )?;
        var.set_attr("valid_min", -1.0f32);
        var.set_attr("valid_max", 1.0f32);
        add_units(&mut var, "1");
        var.set_attr("description", format!("Channel error correlation matrix for {effect} effects"));
        ds.insert(&format!("channel_correlation_matrix_{effect}"), var)?;
    }
    Ok(())
}

pub fn add_lookup_tables(ds: &mut Dataset, n_chans: usize, lut_size: usize) -> Result<(), DatasetError> {
    let tables = [
        ("lookup_table_BT", "Lookup table to convert radiance to brightness temperatures"),
        ("lookup_table_radiance", "Lookup table to convert brightness temperatures to radiance"),
    ];
    for (name, description) in tables {
        let data = create_default_array(n_chans, lut_size, Some(f32::NAN));
        let mut var = Variable::new(&["lut_size", "channel"], data)?;
        add_fill_value(&mut var, f32::NAN);
        var.set_attr("description", description);
        ds.insert(name, var)?;
    }
    Ok(())
}

pub fn add_correlation_coefficients(
    ds: &mut Dataset,
    n_chans: usize,
    corr_dx: usize,
    corr_dy: usize,
) -> Result<(), DatasetError> {
    let coefficients = [
        ("cross_element_correlation_coefficients", "cross_element", corr_dx, "Cross_element_correlation_coefficients"),
        ("cross_line_correlation_coefficients", "cross_line", corr_dy, "Cross_line_correlation_coefficients"),
    ];
    for (name, dim, len, long_name) in coefficients {
        let data = create_default_array(n_chans, len, Some(f32::NAN));
        let mut var = Variable::new(&[dim, "channel"], data)?;
        add_fill_value(&mut var, f32::NAN);
        var.set_attr("valid_min", 0.0f32);
        var.set_attr("valid_max", 1.0f32);
        var.set_attr("long_name", long_name);
        add_units(&mut var, "1");
        var.set_attr("description", "Correlation coefficients per spatial scale");
        ds.insert(name, var)?;
    }
    Ok(())
}

pub fn add_standard_global_attributes(ds: &mut Dataset) {
    ds.set_attr("Conventions", "CF-1.6");
    ds.set_attr("licence", LICENCE);
    ds.set_attr("writer_version", env!("CARGO_PKG_VERSION"));
    for name in GLOBAL_PLACEHOLDERS {
        ds.set_attr(name, "");
    }
}
