//! Constructors for arrays pre-filled with a fill value.
//!
//! Two dimensional arrays are always laid out as `(height, width)` and three
//! dimensional ones as `(depth, height, width)`, i.e. the slowest varying
//! dimension first, matching the `(y, x)` convention used by the templates.
use crate::dataset::{ArrayData, Element};

/// The netCDF default fill value for element type `T`.
pub fn default_fill_value<T: Element>() -> T {
    T::DEFAULT_FILL
}

pub fn create_default_scalar<T: Element>(fill_value: Option<T>) -> ArrayData {
    ArrayData::full::<T>(&[], fill_value.unwrap_or(T::DEFAULT_FILL))
}

pub fn create_default_vector<T: Element>(length: usize, fill_value: Option<T>) -> ArrayData {
    ArrayData::full::<T>(&[length], fill_value.unwrap_or(T::DEFAULT_FILL))
}

pub fn create_default_array<T: Element>(width: usize, height: usize, fill_value: Option<T>) -> ArrayData {
    ArrayData::full::<T>(&[height, width], fill_value.unwrap_or(T::DEFAULT_FILL))
}

pub fn create_default_array_3d<T: Element>(width: usize, height: usize, depth: usize, fill_value: Option<T>) -> ArrayData {
    ArrayData::full::<T>(&[depth, height, width], fill_value.unwrap_or(T::DEFAULT_FILL))
}
