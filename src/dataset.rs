//! In-memory labeled arrays and the containers that hold them.
//!
//! A [`Variable`] is an n-dimensional array with named dimensions, an ordered
//! set of attributes and an [`Encoding`] that describes how it should be stored
//! on disk. A [`Dataset`] is an ordered collection of named variables plus
//! global attributes. Dimension lengths are tracked implicitly: every variable
//! that uses a dimension name must agree on its length, which
//! [`Dataset::insert`] enforces.
use std::fmt::Debug;

use indexmap::IndexMap;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use netcdf::{types::{FloatType, IntType, NcTypeDescriptor, NcVariableType}, AttributeValue, Extents};
use num_traits::{NumCast, ToPrimitive};
use serde::Serialize;

use crate::error::DatasetError;
use crate::expression::{Expression, ExpressionError, LabeledArray};

/// Name of the placeholder dimension used by virtual variables on disk.
pub const VIRTUAL_DIM: &str = "virtual";

/// The element types a variable can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum DataType {
    #[strum(serialize = "int8")]
    I8,
    #[strum(serialize = "uint8")]
    U8,
    #[strum(serialize = "int16")]
    I16,
    #[strum(serialize = "uint16")]
    U16,
    #[strum(serialize = "int32")]
    I32,
    #[strum(serialize = "uint32")]
    U32,
    #[strum(serialize = "int64")]
    I64,
    #[strum(serialize = "uint64")]
    U64,
    #[strum(serialize = "float32")]
    F32,
    #[strum(serialize = "float64")]
    F64,
}

impl DataType {
    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// The netCDF default fill value for this type, as an attribute value.
    pub fn default_fill(&self) -> AttrValue {
        match self {
            DataType::I8 => i8::DEFAULT_FILL.into_attr(),
            DataType::U8 => u8::DEFAULT_FILL.into_attr(),
            DataType::I16 => i16::DEFAULT_FILL.into_attr(),
            DataType::U16 => u16::DEFAULT_FILL.into_attr(),
            DataType::I32 => i32::DEFAULT_FILL.into_attr(),
            DataType::U32 => u32::DEFAULT_FILL.into_attr(),
            DataType::I64 => i64::DEFAULT_FILL.into_attr(),
            DataType::U64 => u64::DEFAULT_FILL.into_attr(),
            DataType::F32 => f32::DEFAULT_FILL.into_attr(),
            DataType::F64 => f64::DEFAULT_FILL.into_attr(),
        }
    }
}

/// A primitive type that can be stored in an [`ArrayData`].
///
/// `DEFAULT_FILL` matches the netCDF library's `NC_FILL_*` constants, so
/// variables created without an explicit fill value read back the same way
/// other netCDF tools would interpret them.
pub trait Element: NcTypeDescriptor + Copy + NumCast + ToPrimitive + PartialEq + Debug + 'static {
    const DTYPE: DataType;
    const DEFAULT_FILL: Self;

    fn into_array_data(arr: ArrayD<Self>) -> ArrayData;
    fn into_attr(self) -> AttrValue;
    fn try_view(data: &ArrayData) -> Option<ArrayViewD<'_, Self>>;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident, $fill:expr) => {
        impl Element for $t {
            const DTYPE: DataType = DataType::$variant;
            const DEFAULT_FILL: Self = $fill;

            fn into_array_data(arr: ArrayD<Self>) -> ArrayData {
                ArrayData::$variant(arr)
            }

            fn into_attr(self) -> AttrValue {
                AttrValue::$variant(self)
            }

            fn try_view(data: &ArrayData) -> Option<ArrayViewD<'_, Self>> {
                if let ArrayData::$variant(arr) = data {
                    Some(arr.view())
                } else {
                    None
                }
            }
        }

        impl From<$t> for AttrValue {
            fn from(value: $t) -> Self {
                AttrValue::$variant(value)
            }
        }
    };
}

impl_element!(i8, I8, -127);
impl_element!(u8, U8, 255);
impl_element!(i16, I16, -32767);
impl_element!(u16, U16, 65535);
impl_element!(i32, I32, -2147483647);
impl_element!(u32, U32, 4294967295);
impl_element!(i64, I64, -9223372036854775806);
impl_element!(u64, U64, 18446744073709551614);
impl_element!(f32, F32, 9.96921e36);
impl_element!(f64, F64, 9.969209968386869e36);

/// Apply `$body` to the array inside any [`ArrayData`] variant, binding it to `$arr`.
macro_rules! with_array {
    ($data:expr, $arr:ident => $body:expr) => {
        match $data {
            ArrayData::I8($arr) => $body,
            ArrayData::U8($arr) => $body,
            ArrayData::I16($arr) => $body,
            ArrayData::U16($arr) => $body,
            ArrayData::I32($arr) => $body,
            ArrayData::U32($arr) => $body,
            ArrayData::I64($arr) => $body,
            ArrayData::U64($arr) => $body,
            ArrayData::F32($arr) => $body,
            ArrayData::F64($arr) => $body,
        }
    };
}

pub(crate) use with_array;

/// A dynamically shaped array of any supported element type.
///
/// It is best created either through the helpers in [`crate::default_data`]
/// or by reading from a netCDF variable with [`ArrayData::get_from`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    I8(ArrayD<i8>),
    U8(ArrayD<u8>),
    I16(ArrayD<i16>),
    U16(ArrayD<u16>),
    I32(ArrayD<i32>),
    U32(ArrayD<u32>),
    I64(ArrayD<i64>),
    U64(ArrayD<u64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

impl ArrayData {
    /// Create an array of the given shape with every element set to `fill`.
    pub fn full<T: Element>(shape: &[usize], fill: T) -> Self {
        T::into_array_data(ArrayD::from_elem(IxDyn(shape), fill))
    }

    pub fn dtype(&self) -> DataType {
        match self {
            ArrayData::I8(_) => DataType::I8,
            ArrayData::U8(_) => DataType::U8,
            ArrayData::I16(_) => DataType::I16,
            ArrayData::U16(_) => DataType::U16,
            ArrayData::I32(_) => DataType::I32,
            ArrayData::U32(_) => DataType::U32,
            ArrayData::I64(_) => DataType::I64,
            ArrayData::U64(_) => DataType::U64,
            ArrayData::F32(_) => DataType::F32,
            ArrayData::F64(_) => DataType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_array!(self, arr => arr.shape())
    }

    pub fn ndim(&self) -> usize {
        with_array!(self, arr => arr.ndim())
    }

    pub fn len(&self) -> usize {
        with_array!(self, arr => arr.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the underlying array if it holds elements of type `T`.
    pub fn as_view<T: Element>(&self) -> Option<ArrayViewD<'_, T>> {
        T::try_view(self)
    }

    /// Get one element converted to `f64`, or `None` if the index is out of bounds.
    pub fn get_f64(&self, index: &[usize]) -> Option<f64> {
        with_array!(self, arr => arr.get(index).and_then(|v| v.to_f64()))
    }

    /// Convert every element to `f64`.
    pub fn to_f64(&self) -> ArrayD<f64> {
        with_array!(self, arr => arr.mapv(|v| v.to_f64().unwrap_or(f64::NAN)))
    }

    /// Cast `f64` values to `dtype`. Values that cannot be represented in
    /// `dtype` (including NaN for integer types) become `fill`.
    pub fn from_f64(dtype: DataType, values: &ArrayD<f64>, fill: &AttrValue) -> Self {
        fn cast<T: Element>(values: &ArrayD<f64>, fill: &AttrValue) -> ArrayData {
            let fill = fill.to_element::<T>().unwrap_or(T::DEFAULT_FILL);
            T::into_array_data(values.mapv(|v| T::from(v).unwrap_or(fill)))
        }

        match dtype {
            DataType::I8 => cast::<i8>(values, fill),
            DataType::U8 => cast::<u8>(values, fill),
            DataType::I16 => cast::<i16>(values, fill),
            DataType::U16 => cast::<u16>(values, fill),
            DataType::I32 => cast::<i32>(values, fill),
            DataType::U32 => cast::<u32>(values, fill),
            DataType::I64 => cast::<i64>(values, fill),
            DataType::U64 => cast::<u64>(values, fill),
            DataType::F32 => cast::<f32>(values, fill),
            DataType::F64 => cast::<f64>(values, fill),
        }
    }

    /// Retrieve data from a netCDF variable and construct the appropriate variant.
    ///
    /// Only the numeric netCDF types are supported; character, string, compound,
    /// opaque, enum and variable length types give [`DatasetError::UnsupportedType`].
    pub fn get_from(var: &netcdf::Variable) -> Result<Self, DatasetError> {
        let read_err = |e: netcdf::Error| DatasetError::Netcdf { variable: var.name(), inner: e };
        let data = match var.vartype() {
            NcVariableType::Int(IntType::I8) => Self::I8(var.get::<i8, _>(Extents::All).map_err(read_err)?),
            NcVariableType::Int(IntType::U8) => Self::U8(var.get::<u8, _>(Extents::All).map_err(read_err)?),
            NcVariableType::Int(IntType::I16) => Self::I16(var.get::<i16, _>(Extents::All).map_err(read_err)?),
            NcVariableType::Int(IntType::U16) => Self::U16(var.get::<u16, _>(Extents::All).map_err(read_err)?),
            NcVariableType::Int(IntType::I32) => Self::I32(var.get::<i32, _>(Extents::All).map_err(read_err)?),
            NcVariableType::Int(IntType::U32) => Self::U32(var.get::<u32, _>(Extents::All).map_err(read_err)?),
            NcVariableType::Int(IntType::I64) => Self::I64(var.get::<i64, _>(Extents::All).map_err(read_err)?),
            NcVariableType::Int(IntType::U64) => Self::U64(var.get::<u64, _>(Extents::All).map_err(read_err)?),
            NcVariableType::Float(FloatType::F32) => Self::F32(var.get::<f32, _>(Extents::All).map_err(read_err)?),
            NcVariableType::Float(FloatType::F64) => Self::F64(var.get::<f64, _>(Extents::All).map_err(read_err)?),
            other => {
                return Err(DatasetError::UnsupportedType { variable: var.name(), nctype: format!("{other:?}") })
            }
        };
        Ok(data)
    }
}

/// A typed attribute value.
///
/// Numeric scalars keep their exact type so that a `_FillValue` attribute
/// always matches the type of the variable it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    F64s(Vec<f64>),
    I32s(Vec<i32>),
    Str(String),
}

impl AttrValue {
    /// Numeric scalars as `f64`, `None` for strings and arrays.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::I8(v) => Some(*v as f64),
            AttrValue::U8(v) => Some(*v as f64),
            AttrValue::I16(v) => Some(*v as f64),
            AttrValue::U16(v) => Some(*v as f64),
            AttrValue::I32(v) => Some(*v as f64),
            AttrValue::U32(v) => Some(*v as f64),
            AttrValue::I64(v) => Some(*v as f64),
            AttrValue::U64(v) => Some(*v as f64),
            AttrValue::F32(v) => Some(*v as f64),
            AttrValue::F64(v) => Some(*v),
            AttrValue::F64s(_) | AttrValue::I32s(_) | AttrValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let AttrValue::Str(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Convert a numeric scalar to element type `T` without going through `f64`,
    /// so that 64-bit integer fill values survive exactly. `None` if the value
    /// is not a numeric scalar or does not fit in `T`.
    pub fn to_element<T: Element>(&self) -> Option<T> {
        match self {
            AttrValue::I8(v) => T::from(*v),
            AttrValue::U8(v) => T::from(*v),
            AttrValue::I16(v) => T::from(*v),
            AttrValue::U16(v) => T::from(*v),
            AttrValue::I32(v) => T::from(*v),
            AttrValue::U32(v) => T::from(*v),
            AttrValue::I64(v) => T::from(*v),
            AttrValue::U64(v) => T::from(*v),
            AttrValue::F32(v) => T::from(*v),
            AttrValue::F64(v) => T::from(*v),
            AttrValue::F64s(_) | AttrValue::I32s(_) | AttrValue::Str(_) => None,
        }
    }

    /// `true` only for floating point scalars holding NaN.
    pub fn is_nan(&self) -> bool {
        match self {
            AttrValue::F32(v) => v.is_nan(),
            AttrValue::F64(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Like `==`, but two NaN fill values compare equal.
    pub fn same_as(&self, other: &AttrValue) -> bool {
        (self.is_nan() && other.is_nan()) || self == other
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(value: Vec<f64>) -> Self {
        AttrValue::F64s(value)
    }
}

impl From<Vec<i32>> for AttrValue {
    fn from(value: Vec<i32>) -> Self {
        AttrValue::I32s(value)
    }
}

impl From<&AttrValue> for AttributeValue {
    fn from(value: &AttrValue) -> Self {
        match value {
            AttrValue::I8(v) => AttributeValue::Schar(*v),
            AttrValue::U8(v) => AttributeValue::Uchar(*v),
            AttrValue::I16(v) => AttributeValue::Short(*v),
            AttrValue::U16(v) => AttributeValue::Ushort(*v),
            AttrValue::I32(v) => AttributeValue::Int(*v),
            AttrValue::U32(v) => AttributeValue::Uint(*v),
            AttrValue::I64(v) => AttributeValue::Longlong(*v),
            AttrValue::U64(v) => AttributeValue::Ulonglong(*v),
            AttrValue::F32(v) => AttributeValue::Float(*v),
            AttrValue::F64(v) => AttributeValue::Double(*v),
            AttrValue::F64s(v) => AttributeValue::Doubles(v.clone()),
            AttrValue::I32s(v) => AttributeValue::Ints(v.clone()),
            AttrValue::Str(v) => AttributeValue::Str(v.clone()),
        }
    }
}

impl From<AttributeValue> for AttrValue {
    /// Convert an attribute read from netCDF. Array attributes of types other
    /// than doubles and ints are widened to one of those two; string arrays are
    /// joined with spaces.
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Schar(v) => AttrValue::I8(v),
            AttributeValue::Uchar(v) => AttrValue::U8(v),
            AttributeValue::Short(v) => AttrValue::I16(v),
            AttributeValue::Ushort(v) => AttrValue::U16(v),
            AttributeValue::Int(v) => AttrValue::I32(v),
            AttributeValue::Uint(v) => AttrValue::U32(v),
            AttributeValue::Longlong(v) => AttrValue::I64(v),
            AttributeValue::Ulonglong(v) => AttrValue::U64(v),
            AttributeValue::Float(v) => AttrValue::F32(v),
            AttributeValue::Double(v) => AttrValue::F64(v),
            AttributeValue::Str(v) => AttrValue::Str(v),
            AttributeValue::Doubles(v) => AttrValue::F64s(v),
            AttributeValue::Ints(v) => AttrValue::I32s(v),
            AttributeValue::Floats(v) => AttrValue::F64s(v.into_iter().map(<f64 as From<_>>::from).collect()),
            AttributeValue::Schars(v) => AttrValue::I32s(v.into_iter().map(<i32 as From<_>>::from).collect()),
            AttributeValue::Uchars(v) => AttrValue::I32s(v.into_iter().map(<i32 as From<_>>::from).collect()),
            AttributeValue::Shorts(v) => AttrValue::I32s(v.into_iter().map(<i32 as From<_>>::from).collect()),
            AttributeValue::Ushorts(v) => AttrValue::I32s(v.into_iter().map(<i32 as From<_>>::from).collect()),
            AttributeValue::Uints(v) => AttrValue::F64s(v.into_iter().map(<f64 as From<_>>::from).collect()),
            AttributeValue::Longlongs(v) => AttrValue::F64s(v.into_iter().map(|x| x as f64).collect()),
            AttributeValue::Ulonglongs(v) => AttrValue::F64s(v.into_iter().map(|x| x as f64).collect()),
            AttributeValue::Strs(v) => AttrValue::Str(v.join(" ")),
        }
    }
}

/// How a variable is stored on disk, as opposed to how it is held in memory.
///
/// When `dtype` is set, the in-memory values are packed on write as
/// `round((value - add_offset) / scale_factor)` into that type, and values that
/// are NaN or equal to the in-memory fill value become `fill_value`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Encoding {
    pub dtype: Option<DataType>,
    pub fill_value: Option<AttrValue>,
    pub scale_factor: Option<f64>,
    pub add_offset: Option<f64>,
    pub chunksizes: Option<Vec<usize>>,
}

impl Encoding {
    pub fn is_packed(&self) -> bool {
        self.dtype.is_some()
    }
}

/// The values of a variable: either a concrete array or a not yet evaluated expression.
#[derive(Debug, Clone)]
pub enum VariableData {
    Array(ArrayData),
    /// A virtual variable. `stored` is the placeholder array kept on disk.
    Virtual { expression: Expression, stored: ArrayData },
}

/// A named-dimension array with attributes.
#[derive(Debug, Clone)]
pub struct Variable {
    dims: Vec<String>,
    data: VariableData,
    attrs: IndexMap<String, AttrValue>,
    pub encoding: Encoding,
}

impl Variable {
    /// Create a variable; `dims` must have one entry per array axis.
    pub fn new<S: AsRef<str>>(dims: &[S], data: ArrayData) -> Result<Self, DatasetError> {
        if dims.len() != data.ndim() {
            return Err(DatasetError::RankMismatch { ndims: dims.len(), rank: data.ndim() });
        }
        let dims: Vec<String> = dims.iter().map(|d| d.as_ref().to_string()).collect();
        check_unique_dims(&dims)?;
        Ok(Self { dims, data: VariableData::Array(data), attrs: IndexMap::new(), encoding: Encoding::default() })
    }

    /// Create a virtual variable whose values are computed from `expression`.
    ///
    /// The variable carries the `virtual` and `expression` attributes so that
    /// it survives a round trip through a file.
    pub fn new_virtual(expression: &str) -> Result<Self, ExpressionError> {
        let expression = Expression::parse(expression)?;
        let mut attrs = IndexMap::new();
        attrs.insert("virtual".to_string(), AttrValue::from("true"));
        attrs.insert("expression".to_string(), AttrValue::from(expression.source()));
        Ok(Self {
            dims: vec![VIRTUAL_DIM.to_string()],
            data: VariableData::Virtual { expression, stored: ArrayData::full(&[1], 1i8) },
            attrs,
            encoding: Encoding::default(),
        })
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        match &self.data {
            VariableData::Array(arr) => arr.shape(),
            VariableData::Virtual { stored, .. } => stored.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn dtype(&self) -> DataType {
        match &self.data {
            VariableData::Array(arr) => arr.dtype(),
            VariableData::Virtual { stored, .. } => stored.dtype(),
        }
    }

    pub fn data(&self) -> &VariableData {
        &self.data
    }

    /// The concrete array, or `None` for an unloaded virtual variable.
    pub fn array(&self) -> Option<&ArrayData> {
        match &self.data {
            VariableData::Array(arr) => Some(arr),
            VariableData::Virtual { .. } => None,
        }
    }

    /// The array that would be written to disk.
    pub(crate) fn stored_array(&self) -> &ArrayData {
        match &self.data {
            VariableData::Array(arr) => arr,
            VariableData::Virtual { stored, .. } => stored,
        }
    }

    pub fn expression(&self) -> Option<&Expression> {
        match &self.data {
            VariableData::Virtual { expression, .. } => Some(expression),
            VariableData::Array(_) => None,
        }
    }

    /// `true` if the variable is defined by an expression.
    ///
    /// This holds before and after evaluation: loading replaces the data but
    /// keeps the `virtual` and `expression` attributes. Use
    /// [`Variable::is_loaded`] to tell whether the values have been computed.
    pub fn is_virtual(&self) -> bool {
        matches!(self.data, VariableData::Virtual { .. })
            || self.attr("virtual").and_then(|v| v.as_str()) == Some("true")
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.data, VariableData::Array(_))
    }

    pub fn attrs(&self) -> &IndexMap<String, AttrValue> {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn set_attr<V: Into<AttrValue>>(&mut self, name: &str, value: V) {
        self.attrs.insert(name.to_string(), value.into());
    }

    /// Builder form of [`Variable::set_attr`].
    pub fn with_attr<V: Into<AttrValue>>(mut self, name: &str, value: V) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<AttrValue> {
        self.attrs.shift_remove(name)
    }

    /// The in-memory fill value, i.e. the `_FillValue` attribute.
    pub fn fill_value(&self) -> Option<&AttrValue> {
        self.attr("_FillValue")
    }

    /// Turn a variable flagged with `virtual = "true"` into an unevaluated
    /// virtual variable, parsing its `expression` attribute.
    pub(crate) fn make_virtual(&mut self, name: &str) -> Result<(), DatasetError> {
        if let VariableData::Virtual { .. } = self.data {
            return Ok(());
        }
        let source = self
            .attr("expression")
            .and_then(|e| e.as_str())
            .ok_or_else(|| DatasetError::MissingExpression(name.to_string()))?;
        let expression = Expression::parse(source)
            .map_err(|e| DatasetError::Expression { variable: name.to_string(), inner: e })?;
        let stored = match &self.data {
            VariableData::Array(arr) => arr.clone(),
            VariableData::Virtual { stored, .. } => stored.clone(),
        };
        self.data = VariableData::Virtual { expression, stored };
        Ok(())
    }

    /// Store the evaluated values. The attributes, including `virtual`, are kept.
    fn set_loaded(&mut self, values: LabeledArray) {
        let (dims, arr) = values.into_parts();
        self.dims = dims;
        self.data = VariableData::Array(ArrayData::F64(arr));
    }
}

fn check_unique_dims(dims: &[String]) -> Result<(), DatasetError> {
    for (i, d) in dims.iter().enumerate() {
        if dims[..i].contains(d) {
            return Err(DatasetError::RepeatedDimension(d.clone()));
        }
    }
    Ok(())
}

/// An ordered collection of named variables plus global attributes.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    variables: IndexMap<String, Variable>,
    attrs: IndexMap<String, AttrValue>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable, replacing any existing variable of the same name.
    ///
    /// Fails if one of the variable's dimensions is already used by another
    /// variable with a different length.
    pub fn insert(&mut self, name: &str, var: Variable) -> Result<(), DatasetError> {
        for (other_name, other) in self.variables.iter() {
            if other_name == name {
                continue;
            }
            for (dim, &len) in var.dims().iter().zip(var.shape()) {
                if let Some(i) = other.dims().iter().position(|d| d == dim) {
                    let existing = other.shape()[i];
                    if existing != len {
                        return Err(DatasetError::DimensionConflict {
                            variable: name.to_string(),
                            dim: dim.clone(),
                            existing,
                            new: len,
                        });
                    }
                }
            }
        }
        self.variables.insert(name.to_string(), var);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }

    /// Like [`Dataset::get`] but with an error naming the missing variable.
    pub fn variable(&self, name: &str) -> Result<&Variable, DatasetError> {
        self.get(name).ok_or_else(|| DatasetError::MissingVariable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        self.variables.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(|k| k.as_str())
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn variables_mut(&mut self) -> impl Iterator<Item = (&str, &mut Variable)> {
        self.variables.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// All dimensions used by the variables, in order of first use.
    pub fn dimensions(&self) -> IndexMap<String, usize> {
        let mut dims = IndexMap::new();
        for var in self.variables.values() {
            for (dim, &len) in var.dims().iter().zip(var.shape()) {
                dims.entry(dim.clone()).or_insert(len);
            }
        }
        dims
    }

    pub fn attrs(&self) -> &IndexMap<String, AttrValue> {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn set_attr<V: Into<AttrValue>>(&mut self, name: &str, value: V) {
        self.attrs.insert(name.to_string(), value.into());
    }

    /// Evaluate the virtual variable `name` and store the result in place.
    ///
    /// Loading a variable that is not virtual does nothing. The evaluated
    /// variable keeps its attributes but takes the dimensions that result from
    /// broadcasting the variables its expression refers to.
    pub fn load(&mut self, name: &str) -> Result<(), DatasetError> {
        let var = self.variable(name)?;
        if var.is_loaded() {
            return Ok(());
        }
        let mut stack = Vec::new();
        let values = self.evaluate(name, &mut stack)?;
        log::debug!("loaded virtual variable {name} with dimensions {:?}", values.dims());
        if let Some(var) = self.variables.get_mut(name) {
            var.set_loaded(values);
        }
        Ok(())
    }

    /// Evaluate every virtual variable in the dataset.
    pub fn load_all(&mut self) -> Result<(), DatasetError> {
        let pending: Vec<String> = self
            .variables
            .iter()
            .filter(|(_, v)| !v.is_loaded())
            .map(|(k, _)| k.clone())
            .collect();
        for name in pending {
            self.load(&name)?;
        }
        Ok(())
    }

    fn evaluate(&self, name: &str, stack: &mut Vec<String>) -> Result<LabeledArray, DatasetError> {
        if stack.iter().any(|s| s == name) {
            let mut chain = stack.clone();
            chain.push(name.to_string());
            return Err(DatasetError::CircularReference(chain.join(" -> ")));
        }

        let var = self.variable(name)?;
        let result = match var.data() {
            VariableData::Array(arr) => {
                let mut values = arr.to_f64();
                if let Some(fill) = var.fill_value().and_then(|f| f.as_f64()) {
                    values.mapv_inplace(|v| if v == fill { f64::NAN } else { v });
                }
                LabeledArray::new(var.dims().to_vec(), values)
            }
            VariableData::Virtual { expression, .. } => {
                stack.push(name.to_string());
                let result = expression.evaluate(&mut |refname: &str| {
                    if !self.contains(refname) {
                        return Ok(None);
                    }
                    self.evaluate(refname, stack)
                        .map(Some)
                        .map_err(|e| ExpressionError::unresolved(refname, e))
                });
                stack.pop();
                result
            }
        };
        result.map_err(|e| DatasetError::Expression { variable: name.to_string(), inner: e })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn vector(len: usize) -> ArrayData {
        ArrayData::full(&[len], 0.0f32)
    }

    #[test]
    fn test_variable_rank_must_match_dims() {
        let err = Variable::new(&["y", "x"], vector(3)).unwrap_err();
        assert!(matches!(err, DatasetError::RankMismatch { ndims: 2, rank: 1 }));
    }

    #[test]
    fn test_variable_repeated_dims_rejected() {
        let err = Variable::new(&["y", "y"], ArrayData::full(&[2, 2], 0u8)).unwrap_err();
        assert!(matches!(err, DatasetError::RepeatedDimension(d) if d == "y"));
    }

    #[test]
    fn test_insert_conflicting_dimension() {
        let mut ds = Dataset::new();
        ds.insert("a", Variable::new(&["y"], vector(3)).unwrap()).unwrap();
        let err = ds.insert("b", Variable::new(&["y"], vector(4)).unwrap()).unwrap_err();
        assert!(matches!(err, DatasetError::DimensionConflict { existing: 3, new: 4, .. }));

        // Replacing the only user of a dimension is allowed to change its length
        ds.insert("a", Variable::new(&["y"], vector(5)).unwrap()).unwrap();
        assert_eq!(ds.dimensions().get("y"), Some(&5));
    }

    #[test]
    fn test_dimensions_in_order_of_use() {
        let mut ds = Dataset::new();
        ds.insert("a", Variable::new(&["y", "x"], ArrayData::full(&[2, 3], 0i16)).unwrap()).unwrap();
        ds.insert("b", Variable::new(&["channel", "y"], ArrayData::full(&[6, 2], 0i16)).unwrap()).unwrap();
        let dims: Vec<(String, usize)> = ds.dimensions().into_iter().collect();
        assert_eq!(
            dims,
            vec![("y".to_string(), 2), ("x".to_string(), 3), ("channel".to_string(), 6)]
        );
    }

    #[test]
    fn test_attribute_order_is_insertion_order() {
        let var = Variable::new(&["y"], vector(2))
            .unwrap()
            .with_attr("standard_name", "time")
            .with_attr("units", "s")
            .with_attr("_FillValue", f32::NAN);
        let names: Vec<&str> = var.attrs().keys().map(|k| k.as_str()).collect();
        assert_eq!(names, ["standard_name", "units", "_FillValue"]);
        assert!(var.fill_value().unwrap().is_nan());
    }

    #[test]
    fn test_default_fill_by_dtype() {
        assert_eq!(DataType::I16.default_fill(), AttrValue::I16(-32767));
        assert_eq!(DataType::U32.default_fill(), AttrValue::U32(4294967295));
        assert_eq!(DataType::F32.default_fill(), AttrValue::F32(9.96921e36));
    }

    #[test]
    fn test_dtype_names() {
        assert_eq!(DataType::U16.to_string(), "uint16");
        assert_eq!("float64".parse::<DataType>().unwrap(), DataType::F64);
    }

    #[test]
    fn test_virtual_variable_placeholder() {
        let var = Variable::new_virtual("a + b").unwrap();
        assert!(var.is_virtual());
        assert!(!var.is_loaded());
        assert_eq!(var.shape(), &[1]);
        assert_eq!(var.dims(), &["virtual"]);
        assert_eq!(var.attr("expression").and_then(|e| e.as_str()), Some("a + b"));
    }

    #[test]
    fn test_virtual_flag_survives_load() {
        let mut ds = Dataset::new();
        ds.insert("a", Variable::new(&["x"], ArrayData::F64(array![1.0, 2.0].into_dyn())).unwrap()).unwrap();
        ds.insert("b", Variable::new_virtual("a * 10").unwrap()).unwrap();

        ds.load("b").unwrap();
        let b = ds.get("b").unwrap();
        assert!(b.is_virtual());
        assert!(b.is_loaded());
        assert!(b.expression().is_none());
        assert_eq!(b.dims(), &["x"]);
        assert_eq!(b.attr("virtual").and_then(|v| v.as_str()), Some("true"));

        let a = ds.get("a").unwrap();
        assert!(!a.is_virtual());
        assert!(a.is_loaded());
    }
}
