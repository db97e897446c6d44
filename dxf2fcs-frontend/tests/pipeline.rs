use std::fs;
use std::path::PathBuf;

use dxf2fcs_frontend::{ConversionRequest, convert_file, errors::FrontendError};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("../dxf2fcs-io/tests/data");
    path.push(name);
    path
}

#[test]
fn converts_fixture_next_to_input() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let input = dir.path().join("basic.dxf");
    fs::copy(fixture("basic_entities.dxf"), &input).expect("copy fixture");

    let summary = convert_file(&ConversionRequest::new(&input)).expect("convert");
    assert_eq!(summary.output, dir.path().join("basic.fcs"));
    assert!(summary.stats.curves > 0);

    let script = fs::read_to_string(&summary.output).expect("read output");
    assert!(script.starts_with("v = (x,y,z) => Fcs.Geometry.Vertex3D(x,y,z)\n"));
    // $INSUNITS = 4，1000 mm 的直线输出为 1
    assert!(script.contains("v1b = v(1,0,0)"));
    assert!(script.contains("curve {c1} vertex {v1a} {v1b}"));
}

#[test]
fn explicit_output_path_is_used() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let output = dir.path().join("hatch.txt");
    let request = ConversionRequest::new(fixture("hatch_paths.dxf"))
        .with_output(&output)
        .with_unit("m");

    let summary = convert_file(&request).expect("convert");
    assert_eq!(summary.output, output);
    assert_eq!(summary.stats.areas, 2);
    assert!(summary.describe().contains("2 areas"));
    assert!(fs::read_to_string(&output).expect("read output").contains("area {a2}"));
}

#[test]
fn missing_input_writes_nothing() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let input = dir.path().join("absent.dxf");

    let err = convert_file(&ConversionRequest::new(&input)).expect_err("should fail");
    assert!(matches!(err, FrontendError::InputNotFound(_)));
    assert!(err.to_string().starts_with("the dxf file does not exist: "));
    assert!(!dir.path().join("absent.fcs").exists());
}

#[test]
fn malformed_document_writes_nothing() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let input = dir.path().join("broken.dxf");
    fs::write(&input, "0\nSECTION\n2\nENTITIES\n0\nLINE\n10\nnot-a-number\n0\nENDSEC\n0\nEOF\n")
        .expect("write input");

    let err = convert_file(&ConversionRequest::new(&input)).expect_err("should fail");
    assert!(matches!(err, FrontendError::Load(_)));
    assert!(!dir.path().join("broken.fcs").exists());
}

#[test]
fn unwritable_output_is_reported_before_reading() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let input = dir.path().join("broken.dxf");
    fs::write(&input, "0\nSECTION\n2\nENTITIES\n0\nLINE\n10\nnot-a-number\n0\nENDSEC\n0\nEOF\n")
        .expect("write input");
    let output = dir.path().join("missing").join("out.fcs");

    let err = convert_file(&ConversionRequest::new(&input).with_output(&output))
        .expect_err("should fail");
    assert!(matches!(err, FrontendError::OutputNotWritable { .. }), "{err}");
    assert!(err.to_string().contains("parent directory does not exist"));
    assert!(!output.exists());
}

#[test]
fn directory_as_output_is_rejected() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let request = ConversionRequest::new(fixture("basic_entities.dxf")).with_output(dir.path());

    let err = convert_file(&request).expect_err("should fail");
    assert!(matches!(err, FrontendError::OutputNotWritable { .. }), "{err}");
}
