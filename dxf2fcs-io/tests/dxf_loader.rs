use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::path::PathBuf;

use dxf2fcs_core::{
    document::{Document, Entity, HatchEdge},
    units::DrawingUnits,
};
use dxf2fcs_io::{DocumentLoader, DxfFacade, IoError};

fn load_fixture(name: &str) -> Document {
    let mut fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    fixture.push("tests/data");
    fixture.push(name);
    DxfFacade::new()
        .load(&fixture)
        .unwrap_or_else(|err| panic!("读取 {name} 失败：{err}"))
}

#[test]
fn load_basic_entities_in_document_order() {
    let doc = load_fixture("basic_entities.dxf");
    assert_eq!(doc.units(), DrawingUnits::Millimeters);

    let kinds: Vec<&str> = doc.entities().map(|(_, entity)| entity.kind_name()).collect();
    assert_eq!(
        kinds,
        vec!["LINE", "ARC", "CIRCLE", "ELLIPSE", "LWPOLYLINE", "SPLINE"]
    );

    let entities: Vec<&Entity> = doc.entities().map(|(_, entity)| entity).collect();
    match entities[0] {
        Entity::Line(line) => {
            assert_eq!(line.layer, "GEOM");
            assert!((line.end.x() - 1000.0).abs() < 1e-9);
        }
        other => panic!("unexpected entity: {other:?}"),
    }
    match entities[1] {
        Entity::Arc(arc) => {
            assert!((arc.radius - 5.0).abs() < 1e-12);
            assert!(arc.start_angle.abs() < 1e-12);
            assert!((arc.end_angle - FRAC_PI_2).abs() < 1e-12);
        }
        other => panic!("unexpected entity: {other:?}"),
    }
    match entities[3] {
        Entity::Ellipse(ellipse) => {
            assert!((ellipse.ratio - 0.5).abs() < 1e-12);
            assert!((ellipse.end_parameter - TAU).abs() < 1e-9);
        }
        other => panic!("unexpected entity: {other:?}"),
    }
    match entities[4] {
        Entity::LwPolyline(polyline) => {
            assert!(polyline.is_closed);
            assert_eq!(polyline.vertices.len(), 3);
            assert!((polyline.vertices[0].bulge - 1.0).abs() < 1e-12);
            assert!(polyline.vertices[1].bulge.abs() < 1e-12);
            assert_eq!(polyline.layer, "OUTLINE");
        }
        other => panic!("unexpected entity: {other:?}"),
    }
    match entities[5] {
        Entity::Spline(spline) => {
            assert_eq!(spline.degree, 3);
            assert!(!spline.is_rational);
            assert_eq!(spline.knot_values.len(), 8);
            assert_eq!(spline.control_points.len(), 4);
            assert!((spline.control_points[1].y() - 2.0).abs() < 1e-12);
        }
        other => panic!("unexpected entity: {other:?}"),
    }
}

#[test]
fn load_blocks_with_units_and_skip_attributes() {
    let doc = load_fixture("blocks_inserts.dxf");

    let inner = doc.block("INNER").expect("缺少块 INNER");
    assert_eq!(inner.units, DrawingUnits::Meters);
    assert_eq!(inner.entities.len(), 1);

    let outer = doc.block("OUTER").expect("缺少块 OUTER");
    assert_eq!(outer.units, DrawingUnits::Millimeters);
    assert!((outer.base_point.x() - 5.0).abs() < 1e-12);
    match &outer.entities[0] {
        Entity::Insert(insert) => {
            assert_eq!(insert.block_name, "INNER");
            assert!((insert.rotation - FRAC_PI_2).abs() < 1e-12);
            assert!((insert.scale.0.x - 2.0).abs() < 1e-12);
        }
        other => panic!("unexpected entity: {other:?}"),
    }

    assert!(doc.block("*U1").is_some(), "匿名块应当保留");

    let kinds: Vec<&str> = doc.entities().map(|(_, entity)| entity.kind_name()).collect();
    assert_eq!(kinds, vec!["INSERT", "INSERT", "TEXT"]);
}

#[test]
fn load_hatch_paths_with_flags_and_edge_kinds() {
    let doc = load_fixture("hatch_paths.dxf");
    let hatch = doc
        .entities()
        .find_map(|(_, entity)| match entity {
            Entity::Hatch(hatch) => Some(hatch),
            _ => None,
        })
        .expect("未找到 HATCH 实体");

    assert!(hatch.is_solid);
    assert_eq!(hatch.pattern_name, "SOLID");
    assert_eq!(hatch.paths.len(), 3, "种子点不应被识别为边界顶点");

    let first = &hatch.paths[0];
    assert!(!first.is_outermost());
    assert_eq!(first.edges.len(), 4);
    match &first.edges[2] {
        HatchEdge::Arc {
            radius,
            end_angle,
            is_counter_clockwise,
            ..
        } => {
            assert!((radius - 50.0).abs() < 1e-12);
            assert!((end_angle - PI).abs() < 1e-12);
            assert!(is_counter_clockwise);
        }
        other => panic!("unexpected edge: {other:?}"),
    }

    let opening = &hatch.paths[1];
    assert!(opening.is_outermost());
    assert!(opening.is_polyline());
    match &opening.edges[..] {
        [HatchEdge::Polyline { vertices, is_closed }] => {
            assert!(is_closed);
            assert_eq!(vertices.len(), 4);
            assert!((vertices[2].position.y() - 40.0).abs() < 1e-12);
        }
        other => panic!("unexpected edges: {other:?}"),
    }

    match &hatch.paths[2].edges[0] {
        HatchEdge::Arc {
            is_counter_clockwise,
            ..
        } => assert!(!is_counter_clockwise),
        other => panic!("unexpected edge: {other:?}"),
    }
}

#[test]
fn load_meshes_and_heavy_polylines() {
    let doc = load_fixture("meshes_polylines.dxf");
    let entities: Vec<&Entity> = doc.entities().map(|(_, entity)| entity).collect();
    assert_eq!(entities.len(), 5);

    match entities[0] {
        Entity::Mesh(mesh) => {
            assert_eq!(mesh.vertices.len(), 4);
            assert_eq!(mesh.faces, vec![vec![0, 1, 2], vec![0, 2, 3]]);
        }
        other => panic!("unexpected entity: {other:?}"),
    }
    match entities[1] {
        Entity::Mesh(mesh) => {
            assert_eq!(mesh.vertices.len(), 3, "重合的第四点应被合并");
            assert_eq!(mesh.faces, vec![vec![0, 1, 2]]);
        }
        other => panic!("unexpected entity: {other:?}"),
    }
    match entities[2] {
        Entity::Mesh(mesh) => {
            assert_eq!(mesh.vertices.len(), 6);
            assert_eq!(mesh.faces.len(), 2);
            assert_eq!(mesh.faces[0], vec![0, 3, 4, 1]);
        }
        other => panic!("unexpected entity: {other:?}"),
    }
    match entities[3] {
        Entity::Polyline(polyline) => {
            assert!(polyline.is_closed);
            assert_eq!(polyline.vertices.len(), 3);
            assert!((polyline.vertices[2].z() - 2.0).abs() < 1e-12);
        }
        other => panic!("unexpected entity: {other:?}"),
    }
    match entities[4] {
        Entity::LwPolyline(polyline) => {
            assert!(!polyline.is_closed);
            assert!((polyline.vertices[0].bulge - 1.0).abs() < 1e-12);
            assert!((polyline.vertices[1].position.z() - 3.0).abs() < 1e-12);
        }
        other => panic!("unexpected entity: {other:?}"),
    }
}

#[test]
fn missing_file_reports_read_error() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/does_not_exist.dxf");
    match DxfFacade::new().load(&path) {
        Err(IoError::ReadError { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("unexpected result: {other:?}"),
    }
}
