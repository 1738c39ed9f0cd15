//! End-to-end tests for the repair pipeline.

use std::collections::HashMap;

use meshmend::algo::normals::compute_normals;
use meshmend::mesh::shapes::{open_cube, unit_cube};
use meshmend::mesh::topology::{boundary_loop_count, component_count, is_closed_manifold};
use meshmend::prelude::*;
use nalgebra::{Point3, Vector3};

/// Every directed edge appears exactly once, so neighbours wind the same way.
fn consistently_wound(mesh: &Mesh) -> bool {
    let mut directed: HashMap<(usize, usize), usize> = HashMap::new();
    for polygon in &mesh.polygons {
        for i in 0..polygon.len() {
            let a = polygon[i];
            let b = polygon[(i + 1) % polygon.len()];
            *directed.entry((a, b)).or_default() += 1;
        }
    }
    directed.values().all(|&n| n == 1)
}

/// Area-weighted share of polygons whose normal points away from the centroid.
fn outward_fraction(mesh: &Mesh) -> f64 {
    let normals = mesh.cell_normals.as_ref().expect("cell normals");
    let center = mesh.centroid().expect("points");
    let mut outward = 0.0;
    let mut total = 0.0;
    for (i, polygon) in mesh.polygons.iter().enumerate() {
        let c = polygon
            .iter()
            .map(|&v| mesh.points[v].coords)
            .sum::<Vector3<f64>>()
            / polygon.len() as f64;
        let area = mesh.polygon_area(i);
        total += area;
        if normals[i].dot(&(c - center.coords)) > 0.0 {
            outward += area;
        }
    }
    outward / total
}

/// Every point has a unit normal, and every point a polygon uses faces away
/// from the centroid.
fn assert_point_normals_outward(mesh: &Mesh) {
    let normals = mesh.point_normals.as_ref().expect("point normals");
    assert_eq!(normals.len(), mesh.num_points());
    for (v, n) in normals.iter().enumerate() {
        assert!((n.norm() - 1.0).abs() < 1e-9, "point {} has normal {:?}", v, n);
    }
    let center = mesh.centroid().expect("points");
    for polygon in &mesh.polygons {
        for &v in polygon {
            let outward = normals[v].dot(&(mesh.points[v] - center));
            assert!(outward > 0.0, "point {} normal faces the centroid", v);
        }
    }
}

/// The unit cube with its `+z` quad removed: 8 points, 5 quads, one hole.
fn five_quad_cube() -> Mesh {
    let mut cube = unit_cube();
    let points = cube.points.clone();
    cube.polygons
        .retain(|q| !q.iter().all(|&v| points[v].z == 0.5));
    cube
}

#[test]
fn test_five_quad_cube_is_closed_by_repair() {
    let input = five_quad_cube();
    assert_eq!(input.num_points(), 8);
    assert_eq!(input.num_polygons(), 5);
    assert_eq!(boundary_loop_count(&input), 1);

    // The default denoise threshold of 50 points would drop an 8-point cube.
    let config = RepairConfig::default().with_denoise_area_threshold(4.0);
    let repaired = repair(&input, &config).unwrap();

    assert!(is_closed_manifold(&repaired));
    assert_eq!(boundary_loop_count(&repaired), 0);
    assert_eq!(component_count(&repaired), 1);
    assert!(consistently_wound(&repaired));
    assert!(repaired.signed_volume() > 0.0);
    assert!(outward_fraction(&repaired) > 0.95);
    assert_point_normals_outward(&repaired);

    // The rim and the eight creases.
    assert_eq!(repaired.lines.len(), 12);
}

#[test]
fn test_repair_is_repeatable() {
    let input = open_cube(6);
    let config = RepairConfig::default().with_reconstruct_resolution(12);
    let a = repair(&input, &config).unwrap();
    let b = repair(&input, &config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_large_flat_faces_repair() {
    // 3600 points share each face plane.
    let input = open_cube(60);
    let config = RepairConfig::default().with_reconstruct_resolution(8);
    let repaired = repair(&input, &config).unwrap();
    assert!(is_closed_manifold(&repaired));
    assert_eq!(boundary_loop_count(&repaired), 0);
}

#[test]
fn test_open_cube_is_closed_by_repair() {
    let input = open_cube(6);
    assert_eq!(boundary_loop_count(&input), 1);

    let config = RepairConfig::default().with_reconstruct_resolution(20);
    let repaired = repair(&input, &config).unwrap();

    assert!(is_closed_manifold(&repaired));
    assert_eq!(boundary_loop_count(&repaired), 0);
    assert_eq!(component_count(&repaired), 1);
    assert!(consistently_wound(&repaired));
    assert!(repaired.signed_volume() > 0.0);

    assert!(outward_fraction(&repaired) > 0.95);
    assert_point_normals_outward(&repaired);

    // The rim of the hole and the cube's creases ride along as lines.
    assert!(!repaired.lines.is_empty());
}

#[test]
fn test_repair_scales_by_deform_factor() {
    let input = open_cube(6);
    let config = RepairConfig::default()
        .with_reconstruct_resolution(20)
        .with_deform_factor(5.0);
    let repaired = repair(&input, &config).unwrap();

    // Scaled by 1.5 about the origin: the unit cube grows to about 1.5 wide.
    let (min, max) = repaired.bounding_box().unwrap();
    let width = (max - min).max();
    assert!(width > 1.3 && width < 1.7, "width {}", width);
}

#[test]
fn test_input_not_modified() {
    let input = open_cube(6);
    let before = input.clone();
    let _ = repair(&input, &RepairConfig::default().with_reconstruct_resolution(12));
    assert_eq!(input, before);
}

#[test]
fn test_colinear_cloud_fails_in_reconstruct() {
    let cloud = Mesh::from_points(vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.5, 0.5, 0.5),
        Point3::new(1.0, 1.0, 1.0),
    ]);
    let err = repair(&cloud, &RepairConfig::default()).unwrap_err();
    assert_eq!(err.stage, Stage::Reconstruct);
    assert!(matches!(err.kind(), MeshError::InsufficientGeometry { .. }));
    assert!(err.to_string().contains("reconstruct"));
}

#[test]
fn test_cube_normals_axis_aligned() {
    let cube = compute_normals(&unit_cube());
    let normals = cube.cell_normals.as_ref().unwrap();
    let expected = [
        Vector3::new(0.0, 0.0, -1.0),
        Vector3::new(0.0, 0.0, 1.0),
        Vector3::new(0.0, -1.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(-1.0, 0.0, 0.0),
        Vector3::new(1.0, 0.0, 0.0),
    ];
    for (n, e) in normals.iter().zip(&expected) {
        assert!((n - e).norm() < 1e-12, "{:?} != {:?}", n, e);
    }
}

#[test]
fn test_obj_round_trip_of_repaired_mesh() {
    let config = RepairConfig::default().with_reconstruct_resolution(12);
    let repaired = repair(&open_cube(6), &config).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repaired.obj");
    meshmend::io::save(&repaired, &path).unwrap();
    let back = meshmend::io::load(&path).unwrap();

    assert_eq!(back.polygons, repaired.polygons);
    assert_eq!(back.lines, repaired.lines);
    assert_eq!(back.num_points(), repaired.num_points());
    for (a, b) in back.points.iter().zip(&repaired.points) {
        assert!((a - b).norm() < 1e-12);
    }
}
