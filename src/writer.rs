//! Creating product templates and writing datasets to netCDF.
//!
//! Files are first written to a hidden temporary file next to the requested
//! output and only renamed into place once everything has been written, so an
//! interrupted write never leaves a truncated product under the final name.
use std::borrow::Cow;
use std::path::{Path, PathBuf};

use error_stack::ResultExt;
use ndarray::ArrayViewD;
use netcdf::{AttributeValue, Extents};

use crate::dataset::{with_array, ArrayData, AttrValue, DataType, Dataset, Element, Variable};
use crate::error::{DatasetError, WriteError};
use crate::templates::{util, Sensor};

/// Deflate level used when none is configured
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 5;

/// Attributes that describe packing. They are derived from the [`crate::dataset::Encoding`]
/// of packed variables rather than copied from memory.
const PACKING_ATTRIBUTES: [&str; 3] = ["_FillValue", "scale_factor", "add_offset"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FcdrWriter {
    compression_level: i32,
}

impl Default for FcdrWriter {
    fn default() -> Self {
        Self { compression_level: DEFAULT_COMPRESSION_LEVEL }
    }
}

impl FcdrWriter {
    /// A writer that deflates chunked variables at `compression_level`, clamped to 0 to 9.
    pub fn new(compression_level: i32) -> Self {
        Self { compression_level: compression_level.clamp(0, 9) }
    }

    pub fn compression_level(&self) -> i32 {
        self.compression_level
    }

    /// A new easy FCDR dataset for `sensor` with `height` scan lines, default filled.
    pub fn create_template_easy(
        sensor: Sensor,
        height: usize,
        srf_size: Option<usize>,
        corr_dx: Option<usize>,
        corr_dy: Option<usize>,
        lut_size: Option<usize>,
    ) -> Result<Dataset, DatasetError> {
        let template = sensor.template();
        let mut ds = Self::create_base(sensor);
        template.add_original_variables(&mut ds, height, srf_size)?;
        template.add_easy_fcdr_variables(&mut ds, height, corr_dx, corr_dy, lut_size)?;
        log::debug!("created easy {sensor} template with {} variables", ds.len());
        Ok(ds)
    }

    /// A new full FCDR dataset for `sensor` with `height` scan lines, default filled.
    pub fn create_template_full(sensor: Sensor, height: usize) -> Result<Dataset, DatasetError> {
        let template = sensor.template();
        let mut ds = Self::create_base(sensor);
        template.add_original_variables(&mut ds, height, None)?;
        template.add_full_fcdr_variables(&mut ds, height)?;
        log::debug!("created full {sensor} template with {} variables", ds.len());
        Ok(ds)
    }

    fn create_base(sensor: Sensor) -> Dataset {
        let template = sensor.template();
        let mut ds = Dataset::new();
        util::add_standard_global_attributes(&mut ds);
        template.add_template_key(&mut ds);
        template.add_specific_global_metadata(&mut ds);
        ds
    }

    /// Write `ds` to `path` with the default compression level.
    ///
    /// If `path` exists, it is replaced when `overwrite` is `true`, otherwise
    /// [`WriteError::FileExists`] is returned and the existing file is untouched.
    pub fn write(ds: &Dataset, path: &Path, overwrite: bool) -> error_stack::Result<(), WriteError> {
        Self::default().write_dataset(ds, path, overwrite)
    }

    pub fn write_dataset(&self, ds: &Dataset, path: &Path, overwrite: bool) -> error_stack::Result<(), WriteError> {
        if path.exists() && !overwrite {
            return Err(WriteError::FileExists(path.to_path_buf()).into());
        }

        let tmp_path = temporary_path(path);
        log::info!("Writing {} variables to {}", ds.len(), path.display());
        if let Err(e) = self.write_to_new_file(ds, &tmp_path) {
            if let Err(rm_err) = std::fs::remove_file(&tmp_path) {
                log::debug!("could not remove temporary file {}: {rm_err}", tmp_path.display());
            }
            return Err(e);
        }

        std::fs::rename(&tmp_path, path).change_context_lazy(|| WriteError::Finalize {
            from: tmp_path.clone(),
            to: path.to_path_buf(),
        })
    }

    fn write_to_new_file(&self, ds: &Dataset, nc_path: &Path) -> error_stack::Result<(), WriteError> {
        let mut file = netcdf::create(nc_path).change_context_lazy(|| WriteError::Create(nc_path.to_path_buf()))?;

        for (name, value) in ds.attrs() {
            file.add_attribute(name, AttributeValue::from(value))
                .change_context_lazy(|| WriteError::GlobalAttribute(name.clone()))?;
        }

        let dimensions = ds.dimensions();
        for (dimname, &dimlength) in dimensions.iter() {
            file.add_dimension(dimname, dimlength)
                .change_context_lazy(|| WriteError::Dimension(dimname.clone()))?;
        }

        for (name, var) in ds.variables() {
            let disk_var = DiskVariable::from_variable(name, var);
            log::debug!("writing variable {name} as {}", disk_var.data.dtype());
            disk_var
                .put_to(&mut file, self.compression_level)
                .change_context_lazy(|| WriteError::variable(name))?;
        }

        file.close().change_context_lazy(|| WriteError::Create(nc_path.to_path_buf()))?;
        Ok(())
    }
}

/// Hidden sibling of `path` used while the file is being written.
fn temporary_path(path: &Path) -> PathBuf {
    let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    path.with_file_name(format!(".{file_name}.tmp"))
}

/// A variable as it will be laid out in the file: packed if it has an
/// encoding, with its fill value separated out from its other attributes.
struct DiskVariable<'a> {
    name: &'a str,
    dims: Vec<&'a str>,
    data: Cow<'a, ArrayData>,
    fill_value: Option<AttrValue>,
    attrs: Vec<(&'a str, AttrValue)>,
    chunksizes: Option<Vec<usize>>,
}

impl<'a> DiskVariable<'a> {
    fn from_variable(name: &'a str, var: &'a Variable) -> Self {
        let dims: Vec<&str> = var.dims().iter().map(|d| d.as_str()).collect();
        let stored = var.stored_array();
        let encoding = &var.encoding;

        let (data, fill_value, attrs) = if let Some(dtype) = encoding.dtype {
            let fill_value = encoding.fill_value.clone().unwrap_or_else(|| dtype.default_fill());
            let data = pack(stored, var.fill_value(), dtype, encoding.scale_factor, encoding.add_offset, &fill_value);
            let mut attrs: Vec<(&str, AttrValue)> = var
                .attrs()
                .iter()
                .filter(|(k, _)| !PACKING_ATTRIBUTES.contains(&k.as_str()))
                .map(|(k, v)| (k.as_str(), v.clone()))
                .collect();
            if let Some(scale) = encoding.scale_factor {
                attrs.push(("scale_factor", AttrValue::F64(scale)));
            }
            if let Some(offset) = encoding.add_offset {
                attrs.push(("add_offset", AttrValue::F64(offset)));
            }
            (Cow::Owned(data), Some(fill_value), attrs)
        } else {
            let attrs = var
                .attrs()
                .iter()
                .filter(|(k, _)| k.as_str() != "_FillValue")
                .map(|(k, v)| (k.as_str(), v.clone()))
                .collect();
            (Cow::Borrowed(stored), var.fill_value().cloned(), attrs)
        };

        // Chunks larger than a dimension are not allowed by netCDF
        let chunksizes = encoding
            .chunksizes
            .as_ref()
            .filter(|chunks| chunks.len() == dims.len() && !dims.is_empty())
            .map(|chunks| chunks.iter().zip(data.shape()).map(|(&c, &n)| c.min(n).max(1)).collect());

        Self { name, dims, data, fill_value, attrs, chunksizes }
    }

    fn put_to(&self, file: &mut netcdf::FileMut, compression_level: i32) -> Result<(), netcdf::Error> {
        with_array!(self.data.as_ref(), arr => self.put_typed(file, arr.view(), compression_level))
    }

    fn put_typed<T: Element>(
        &self,
        file: &mut netcdf::FileMut,
        values: ArrayViewD<'_, T>,
        compression_level: i32,
    ) -> Result<(), netcdf::Error> {
        let mut var = file.add_variable::<T>(self.name, &self.dims)?;
        if let Some(chunks) = &self.chunksizes {
            var.set_chunking(chunks)?;
            var.set_compression(compression_level, true)?;
        }

        if let Some(fill) = &self.fill_value {
            match fill.to_element::<T>() {
                Some(fill) => var.set_fill_value(fill)?,
                None => log::warn!(
                    "fill value {fill:?} of variable {} cannot be represented as {}, it will not be written",
                    self.name,
                    T::DTYPE
                ),
            }
        }

        for (attname, value) in self.attrs.iter() {
            var.put_attribute(attname, AttributeValue::from(value))?;
        }

        var.put(values, Extents::All)?;
        Ok(())
    }
}

/// Pack floating point values into `dtype`: `round((v - add_offset) / scale_factor)`.
/// NaN and the in-memory fill value become `packed_fill`.
fn pack(
    data: &ArrayData,
    memory_fill: Option<&AttrValue>,
    dtype: DataType,
    scale_factor: Option<f64>,
    add_offset: Option<f64>,
    packed_fill: &AttrValue,
) -> ArrayData {
    let scale = scale_factor.unwrap_or(1.0);
    let offset = add_offset.unwrap_or(0.0);
    let memory_fill = memory_fill.and_then(|f| f.as_f64()).filter(|f| !f.is_nan());
    let fill_f64 = packed_fill.as_f64().unwrap_or(f64::NAN);

    let values = data.to_f64().mapv(|v| {
        if v.is_nan() || Some(v) == memory_fill {
            fill_f64
        } else if dtype.is_float() {
            (v - offset) / scale
        } else {
            ((v - offset) / scale).round()
        }
    });
    ArrayData::from_f64(dtype, &values, packed_fill)
}
