//! Reading FCDR netCDF files back into a [`Dataset`].
use std::path::Path;

use error_stack::ResultExt;
use indexmap::IndexMap;

use crate::dataset::{ArrayData, AttrValue, DataType, Dataset, Encoding, Variable};
use crate::error::{DatasetError, ReadError};

pub struct FcdrReader;

impl FcdrReader {
    /// Read every variable and attribute of the file at `path`, applying CF decoding.
    ///
    /// Integer variables with a `_FillValue`, and any variable with a
    /// `scale_factor` or `add_offset`, are unpacked to floating point with fill
    /// values replaced by NaN. The packing is kept in the variable's
    /// [`Encoding`] so that writing the dataset again reproduces it.
    pub fn read(path: &Path) -> error_stack::Result<Dataset, ReadError> {
        Self::read_with(path, true)
    }

    /// Read the file and turn its virtual variables into unevaluated expressions.
    pub fn open(path: &Path) -> error_stack::Result<Dataset, ReadError> {
        let mut ds = Self::read(path)?;
        Self::prepare_virtual_variables(&mut ds)?;
        Ok(ds)
    }

    /// Read the file with or without CF decoding.
    pub fn read_with(path: &Path, decode_cf: bool) -> error_stack::Result<Dataset, ReadError> {
        let file = netcdf::open(path).change_context_lazy(|| ReadError::Open(path.to_path_buf()))?;
        let mut ds = Dataset::new();

        for attr in file.attributes() {
            let value = attr.value().change_context_lazy(|| ReadError::Attribute {
                owner: "the file".to_string(),
                attribute: attr.name().to_string(),
            })?;
            ds.set_attr(attr.name(), AttrValue::from(value));
        }

        for nc_var in file.variables() {
            let name = nc_var.name();
            let dims: Vec<String> = nc_var.dimensions().iter().map(|d| d.name()).collect();
            let data = ArrayData::get_from(&nc_var).change_context_lazy(|| ReadError::Variable(name.clone()))?;

            let mut attrs = IndexMap::new();
            for attr in nc_var.attributes() {
                let value = attr.value().change_context_lazy(|| ReadError::Attribute {
                    owner: format!("variable '{name}'"),
                    attribute: attr.name().to_string(),
                })?;
                attrs.insert(attr.name().to_string(), AttrValue::from(value));
            }

            let var = if decode_cf {
                decode_variable(&dims, data, attrs)
            } else {
                build_variable(&dims, data, attrs)
            }
            .change_context_lazy(|| ReadError::Variable(name.clone()))?;

            ds.insert(&name, var).change_context_lazy(|| ReadError::Variable(name.clone()))?;
        }

        log::debug!("read {} variables from {}", ds.len(), path.display());
        Ok(ds)
    }

    /// Replace every variable with `virtual = "true"` by an unevaluated
    /// virtual variable built from its `expression` attribute.
    ///
    /// The number of variables and their attributes are unchanged; call
    /// [`Dataset::load`] or [`Dataset::load_all`] to compute the values.
    pub fn prepare_virtual_variables(ds: &mut Dataset) -> error_stack::Result<(), ReadError> {
        for (name, var) in ds.variables_mut() {
            if var.attr("virtual").and_then(|v| v.as_str()) == Some("true") {
                var.make_virtual(name).change_context_lazy(|| ReadError::Virtual(name.to_string()))?;
                log::debug!("prepared virtual variable {name}");
            }
        }
        Ok(())
    }
}

fn build_variable(dims: &[String], data: ArrayData, attrs: IndexMap<String, AttrValue>) -> Result<Variable, DatasetError> {
    let mut var = Variable::new(dims, data)?;
    for (k, v) in attrs {
        var.set_attr(&k, v);
    }
    Ok(var)
}

fn decode_variable(
    dims: &[String],
    data: ArrayData,
    mut attrs: IndexMap<String, AttrValue>,
) -> Result<Variable, DatasetError> {
    let dtype = data.dtype();
    let scale_factor = attrs.get("scale_factor").and_then(|v| v.as_f64());
    let add_offset = attrs.get("add_offset").and_then(|v| v.as_f64());
    let has_fill = attrs.contains_key("_FillValue");

    if scale_factor.is_none() && add_offset.is_none() && (dtype.is_float() || !has_fill) {
        return build_variable(dims, data, attrs);
    }

    let fill_value = attrs.shift_remove("_FillValue");
    attrs.shift_remove("scale_factor");
    attrs.shift_remove("add_offset");

    let raw_fill = fill_value.as_ref().and_then(|f| f.as_f64());
    let scale = scale_factor.unwrap_or(1.0);
    let offset = add_offset.unwrap_or(0.0);
    let values = data.to_f64().mapv(|v| {
        if v.is_nan() || Some(v) == raw_fill {
            f64::NAN
        } else {
            v * scale + offset
        }
    });

    let decoded_type = match dtype {
        DataType::I8 | DataType::U8 | DataType::I16 | DataType::U16 | DataType::F32 => DataType::F32,
        _ => DataType::F64,
    };
    let decoded = ArrayData::from_f64(decoded_type, &values, &decoded_type.default_fill());

    let mut var = build_variable(dims, decoded, attrs)?;
    var.encoding = Encoding {
        dtype: Some(dtype),
        fill_value,
        scale_factor,
        add_offset,
        chunksizes: None,
    };
    Ok(var)
}
