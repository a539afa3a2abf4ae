use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use fcdr_rs::dataset::{ArrayData, AttrValue, DataType, Dataset, Variable};
use fcdr_rs::error::WriteError;
use fcdr_rs::reader::FcdrReader;
use fcdr_rs::templates::util::add_encoding;
use fcdr_rs::templates::Sensor;
use fcdr_rs::writer::FcdrWriter;
use ndarray::array;
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn out_dir() -> TempDir {
    tempfile::tempdir().expect("creating a temporary directory should not fail")
}

fn out_file(dir: &TempDir) -> PathBuf {
    dir.path().join("fcdr_test.nc")
}

#[rstest]
fn test_write_empty_dataset(out_dir: TempDir) {
    let path = out_file(&out_dir);
    FcdrWriter::write(&Dataset::new(), &path, false).unwrap();
    assert!(path.exists());

    let ds = FcdrReader::read(&path).unwrap();
    assert!(ds.is_empty());
}

#[rstest]
fn test_overwrite(out_dir: TempDir) {
    let path = out_file(&out_dir);
    let mut ds = Dataset::new();
    ds.set_attr("title", "first");
    FcdrWriter::write(&ds, &path, true).unwrap();

    ds.set_attr("title", "second");
    FcdrWriter::write(&ds, &path, true).unwrap();

    let reread = FcdrReader::read(&path).unwrap();
    assert_eq!(reread.attr("title"), Some(&AttrValue::from("second")));
}

#[rstest]
fn test_no_overwrite_existing_file(out_dir: TempDir) {
    let path = out_file(&out_dir);
    let mut ds = Dataset::new();
    ds.set_attr("title", "original");
    FcdrWriter::write(&ds, &path, false).unwrap();

    ds.set_attr("title", "replacement");
    let err = FcdrWriter::write(&ds, &path, false).unwrap_err();
    assert!(matches!(err.current_context(), WriteError::FileExists(p) if p == &path));

    let reread = FcdrReader::read(&path).unwrap();
    assert_eq!(reread.attr("title"), Some(&AttrValue::from("original")));
}

#[rstest]
fn test_no_temporary_file_left(out_dir: TempDir) {
    let path = out_file(&out_dir);
    FcdrWriter::write(&Dataset::new(), &path, false).unwrap();
    let names: Vec<String> = std::fs::read_dir(out_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, ["fcdr_test.nc"]);
}

#[rstest]
fn test_round_trip_packed_variable(out_dir: TempDir) {
    let path = out_file(&out_dir);
    let mut var = Variable::new(&["y", "x"], ArrayData::F32(array![[273.15f32, 280.0], [f32::NAN, 300.5]].into_dyn()))
        .unwrap()
        .with_attr("_FillValue", f32::NAN)
        .with_attr("units", "K");
    add_encoding(&mut var, DataType::I16, AttrValue::I16(-32767), 0.01, 273.15, Some(&[1280, 409]));
    let mut ds = Dataset::new();
    ds.insert("Ch4", var).unwrap();
    FcdrWriter::write(&ds, &path, false).unwrap();

    let raw = FcdrReader::read_with(&path, false).unwrap();
    let raw_var = raw.get("Ch4").unwrap();
    assert_eq!(raw_var.dtype(), DataType::I16);
    assert_eq!(raw_var.fill_value(), Some(&AttrValue::I16(-32767)));
    assert_eq!(raw_var.attr("scale_factor"), Some(&AttrValue::F64(0.01)));
    let raw_values = raw_var.array().unwrap();
    assert_eq!(raw_values.get_f64(&[0, 0]), Some(0.0));
    assert_eq!(raw_values.get_f64(&[1, 0]), Some(-32767.0));

    let decoded = FcdrReader::read(&path).unwrap();
    let var = decoded.get("Ch4").unwrap();
    assert_eq!(var.dtype(), DataType::F32);
    assert_eq!(var.attr("units"), Some(&AttrValue::from("K")));
    let values = var.array().unwrap();
    assert_abs_diff_eq!(values.get_f64(&[0, 1]).unwrap(), 280.0, epsilon = 1e-3);
    assert_abs_diff_eq!(values.get_f64(&[1, 1]).unwrap(), 300.5, epsilon = 1e-3);
    assert!(values.get_f64(&[1, 0]).unwrap().is_nan());
    assert_eq!(var.encoding.dtype, Some(DataType::I16));
}

#[rstest]
fn test_round_trip_attributes_and_dimensions(out_dir: TempDir) {
    let path = out_file(&out_dir);
    let mut ds = Dataset::new();
    ds.set_attr("Conventions", "CF-1.6");
    ds.set_attr("version", 3i32);
    let var = Variable::new(&["channel", "n_frequencies"], ArrayData::full(&[3, 4], 0u16))
        .unwrap()
        .with_attr("long_name", "weights")
        .with_attr("valid_range", vec![0.0, 1.0]);
    ds.insert("weights", var).unwrap();
    let scalar = Variable::new::<&str>(&[], ArrayData::full(&[], 1.5f64)).unwrap();
    ds.insert("offset", scalar).unwrap();
    FcdrWriter::write(&ds, &path, false).unwrap();

    let reread = FcdrReader::read(&path).unwrap();
    assert_eq!(reread.attr("Conventions"), Some(&AttrValue::from("CF-1.6")));
    assert_eq!(reread.attr("version"), Some(&AttrValue::I32(3)));
    assert_eq!(reread.dimensions().get("n_frequencies"), Some(&4));

    let weights = reread.get("weights").unwrap();
    assert_eq!(weights.dims(), &["channel", "n_frequencies"]);
    assert_eq!(weights.dtype(), DataType::U16);
    assert_eq!(weights.attr("valid_range"), Some(&AttrValue::F64s(vec![0.0, 1.0])));
    let attr_names: Vec<&str> = weights.attrs().keys().map(|k| k.as_str()).collect();
    assert_eq!(attr_names, ["long_name", "valid_range"]);

    let offset = reread.get("offset").unwrap();
    assert!(offset.shape().is_empty());
    assert_eq!(offset.array().unwrap().get_f64(&[]), Some(1.5));
}

#[rstest]
#[case(Sensor::Avhrr)]
#[case(Sensor::Hirs2)]
#[case(Sensor::Hirs4)]
#[case(Sensor::Mviri)]
fn test_write_easy_template(out_dir: TempDir, #[case] sensor: Sensor) {
    let path = out_file(&out_dir);
    let ds = FcdrWriter::create_template_easy(sensor, 5, None, Some(3), Some(4), Some(10)).unwrap();
    FcdrWriter::new(1).write_dataset(&ds, &path, false).unwrap();

    let reread = FcdrReader::read(&path).unwrap();
    assert_eq!(reread.len(), ds.len());
    assert_eq!(reread.attr("template_key"), Some(&AttrValue::from(sensor.to_string())));
    let lat = reread.get("latitude").unwrap();
    assert_eq!(lat.shape(), &[5, sensor.template().swath_width()]);
    assert_eq!(lat.array().unwrap().get_f64(&[0, 0]), Some(-32768.0));
}

#[rstest]
fn test_write_full_hirs_template(out_dir: TempDir) {
    let path = out_file(&out_dir);
    let ds = FcdrWriter::create_template_full(Sensor::Hirs3, 4).unwrap();
    FcdrWriter::write(&ds, &path, false).unwrap();

    let reread = FcdrReader::read(&path).unwrap();
    assert_eq!(reread.len(), ds.len());

    let bt = reread.get("bt").unwrap();
    assert_eq!(bt.shape(), &[19, 4, 56]);
    assert!(bt.array().unwrap().get_f64(&[0, 0, 0]).unwrap().is_nan());
    assert_eq!(bt.encoding.fill_value, Some(AttrValue::I16(-999)));

    let tk_iwct = reread.get("TK_iwct").unwrap();
    assert_eq!(tk_iwct.dims(), &["prt_number_iwt", "y", "prt_reading"]);
}

#[rstest]
fn test_write_full_avhrr_template(out_dir: TempDir) {
    let path = out_file(&out_dir);
    let ds = FcdrWriter::create_template_full(Sensor::Avhrr, 3).unwrap();
    FcdrWriter::write(&ds, &path, false).unwrap();

    let raw = FcdrReader::read_with(&path, false).unwrap();
    let ch1 = raw.get("Ch1").unwrap();
    assert_eq!(ch1.dtype(), DataType::I16);
    assert_eq!(ch1.fill_value(), Some(&AttrValue::I16(-32767)));
    assert_eq!(ch1.array().unwrap().get_f64(&[2, 408]), Some(-32767.0));
}

#[rstest]
fn test_write_full_hirs2_template(out_dir: TempDir) {
    let path = out_file(&out_dir);
    let ds = FcdrWriter::create_template_full(Sensor::Hirs2, 2).unwrap();
    FcdrWriter::write(&ds, &path, false).unwrap();

    let reread = FcdrReader::read(&path).unwrap();
    assert_eq!(reread.len(), ds.len());
    assert_eq!(reread.dimensions(), ds.dimensions());
    assert_eq!(reread.dimensions().get("n_frequencies"), Some(&102));
    assert_eq!(reread.get("SRF_weights").unwrap().dims(), &["channel", "n_frequencies"]);
    assert_eq!(reread.get("SRF_weights").unwrap().shape(), &[19, 102]);
    assert!(reread.contains("qualind"));
    assert!(!reread.contains("linqualflags"));
}

#[rstest]
fn test_write_full_mviri_template(out_dir: TempDir) {
    let path = out_file(&out_dir);
    let ds = FcdrWriter::create_template_full(Sensor::Mviri, 2).unwrap();
    FcdrWriter::write(&ds, &path, false).unwrap();

    let reread = FcdrReader::read(&path).unwrap();
    assert_eq!(reread.len(), ds.len());
    assert_eq!(reread.dimensions().get("srf_size"), Some(&176));
    assert_eq!(reread.dimensions().get("sol_irr_size"), Some(&24));

    let srf = reread.get("srf").unwrap();
    assert_eq!(srf.dims(), &["srf_size"]);
    assert_eq!(srf.attr("standard_name"), Some(&AttrValue::from("Spectral Response Function")));
    let u_a1 = reread.get("u_a1").unwrap();
    assert_eq!(u_a1.shape(), &[2, 4000]);
    assert_eq!(u_a1.attr("standard_name"), Some(&AttrValue::from("Uncertainty in a1")));
}
