//! Attribute vocabulary describing how an uncertainty is correlated.
//!
//! Each uncertainty variable may describe its error correlation along three
//! axes: across pixels within a scan line (`scan_*`), across scan lines
//! (`time_*`) and across images (`image_*`). Each axis has a form, the unit
//! its scale is measured in, and a two element scale.
use crate::dataset::Variable;

pub const SCAN_CORR_FORM: &str = "scan_correlation_form";
pub const SCAN_CORR_UNIT: &str = "scan_correlation_units";
pub const SCAN_CORR_SCALE: &str = "scan_correlation_scales";

pub const TIME_CORR_FORM: &str = "time_correlation_form";
pub const TIME_CORR_UNIT: &str = "time_correlation_units";
pub const TIME_CORR_SCALE: &str = "time_correlation_scales";

pub const IMG_CORR_FORM: &str = "image_correlation_form";
pub const IMG_CORR_UNIT: &str = "image_correlation_units";
pub const IMG_CORR_SCALE: &str = "image_correlation_scales";

pub const PDF_SHAPE: &str = "pdf_shape";
pub const PDF_PARAMETER: &str = "pdf_parameter";

/// Rectangular, absolute correlation form
pub const RECT_ABS: &str = "rectangle";
/// Triangular, relative correlation form
pub const TRI_REL: &str = "triangle";

pub const PIXEL: &str = "pixel";
pub const LINE: &str = "line";
pub const IMAGES: &str = "images";

/// Correlation across one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCorrelation {
    pub form: &'static str,
    pub unit: &'static str,
    pub scale: [f64; 2],
}

impl AxisCorrelation {
    /// Fully correlated over an unbounded range.
    pub fn unbounded(unit: &'static str) -> Self {
        Self { form: RECT_ABS, unit, scale: [f64::NEG_INFINITY, f64::INFINITY] }
    }
}

/// Add the three `*_correlation_{form,units,scales}` attributes for one axis.
fn add_axis(var: &mut Variable, names: [&str; 3], corr: &AxisCorrelation) {
    var.set_attr(names[0], corr.form);
    var.set_attr(names[1], corr.unit);
    var.set_attr(names[2], corr.scale.to_vec());
}

pub fn add_scan_correlation(var: &mut Variable, corr: &AxisCorrelation) {
    add_axis(var, [SCAN_CORR_FORM, SCAN_CORR_UNIT, SCAN_CORR_SCALE], corr);
}

pub fn add_time_correlation(var: &mut Variable, corr: &AxisCorrelation) {
    add_axis(var, [TIME_CORR_FORM, TIME_CORR_UNIT, TIME_CORR_SCALE], corr);
}

pub fn add_image_correlation(var: &mut Variable, corr: &AxisCorrelation) {
    add_axis(var, [IMG_CORR_FORM, IMG_CORR_UNIT, IMG_CORR_SCALE], corr);
}

/// Mark an uncertainty as fully correlated across pixels, lines and images.
pub fn add_fully_correlated(var: &mut Variable) {
    add_scan_correlation(var, &AxisCorrelation::unbounded(PIXEL));
    add_time_correlation(var, &AxisCorrelation::unbounded(LINE));
    add_image_correlation(var, &AxisCorrelation::unbounded(IMAGES));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ArrayData, AttrValue};

    #[test]
    fn test_fully_correlated_attributes() {
        let mut var = Variable::new::<&str>(&[], ArrayData::full(&[], 0.0f32)).unwrap();
        add_fully_correlated(&mut var);
        let unbounded = AttrValue::F64s(vec![f64::NEG_INFINITY, f64::INFINITY]);

        assert_eq!(var.attr(SCAN_CORR_FORM), Some(&AttrValue::from("rectangle")));
        assert_eq!(var.attr(SCAN_CORR_UNIT), Some(&AttrValue::from("pixel")));
        assert_eq!(var.attr(SCAN_CORR_SCALE), Some(&unbounded));
        assert_eq!(var.attr(TIME_CORR_UNIT), Some(&AttrValue::from("line")));
        assert_eq!(var.attr(IMG_CORR_UNIT), Some(&AttrValue::from("images")));
        assert_eq!(var.attr(IMG_CORR_SCALE), Some(&unbounded));
    }

    #[test]
    fn test_triangular_time_correlation() {
        let mut var = Variable::new::<&str>(&[], ArrayData::full(&[], 0.0f32)).unwrap();
        add_time_correlation(&mut var, &AxisCorrelation { form: TRI_REL, unit: LINE, scale: [-25.0, 25.0] });
        assert_eq!(var.attr(TIME_CORR_FORM), Some(&AttrValue::from("triangle")));
        assert_eq!(var.attr(TIME_CORR_SCALE), Some(&AttrValue::F64s(vec![-25.0, 25.0])));
        assert!(var.attr(SCAN_CORR_FORM).is_none());
    }
}
