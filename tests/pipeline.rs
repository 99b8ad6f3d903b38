//! End-to-end pipeline tests on small synthetic fields

use approx::assert_relative_eq;
use faultmesh::config::{FaultConfig, ReservoirConfig};
use faultmesh::geometry::GeometryExtractor;
use faultmesh::mesh::{FaceKind, FaceNeighbor};
use faultmesh::points::{PointDistributor, PointSource};
use faultmesh::prelude::*;
use faultmesh::sizing::SizeFunction;
use faultmesh::TierClassifier;

const FIELD: &str = r#"{
    "field": {"extent_x": 1000.0, "extent_y": 1000.0, "top_depth": 7900.0,
              "base_depth": 8240.0, "n_layers": 12},
    "wells": [
        {"name": "P1", "x": 250.0, "y": 250.0},
        {"name": "P2", "x": 800.0, "y": 200.0}
    ],
    "well_tiers": {
        "critical": {"cell_size": 50.0, "influence_radius": 200.0, "members": ["P1"]},
        "standard": {"cell_size": 150.0, "influence_radius": 300.0, "members": ["P2"]}
    },
    "faults": [
        {"name": "F1", "strike": 45.0, "length": 600.0,
         "is_sealing": true, "transmissibility_multiplier": 0.001}
    ],
    "fault_tiers": {"tiers": {
        "major": {"cell_size": 40.0, "buffer_distance": 100.0, "members": ["F1"]},
        "minor": {"cell_size": 80.0, "buffer_distance": 50.0}
    }},
    "meshing": {"background_size": 300.0, "alignment_tolerance": 20.0},
    "validation": {"min_cells": 100, "max_cells": 100000}
}"#;

fn config() -> ReservoirConfig {
    ReservoirConfig::from_json_str(FIELD).unwrap()
}

fn fault(name: &str, offset: (f64, f64), strike: f64, length: f64) -> FaultConfig {
    FaultConfig {
        name: name.into(),
        offset_x: offset.0,
        offset_y: offset.1,
        strike,
        length,
        is_sealing: true,
        transmissibility_multiplier: 0.01,
    }
}

/// Worst angle (degrees) between a lateral face normal and its generator line
fn worst_non_orthogonality(mesh: &ReservoirMesh) -> f64 {
    mesh.faces
        .iter()
        .filter(|f| f.kind == FaceKind::Lateral && f.area > 1.0)
        .filter_map(|f| {
            let q = f.neighbor.cell()?;
            let line = mesh.cells[q].generator - mesh.cells[f.owner].generator;
            let cos = line.dot(&f.normal.xy()) / line.norm();
            Some(cos.clamp(-1.0, 1.0).acos().to_degrees())
        })
        .fold(0.0, f64::max)
}

fn assert_fills_field(config: ReservoirConfig) {
    let artifact = ReservoirMeshPipeline::new(config).run().unwrap();
    let mesh = &artifact.mesh;
    assert_relative_eq!(mesh.total_volume(), 1000.0 * 1000.0 * 340.0, max_relative = 1e-8);
    assert!(mesh.cells.iter().all(|c| c.volume > 0.0));
    assert!(worst_non_orthogonality(mesh) < 1e-2);
    // No column is larger than the whole layer.
    let layer_volume = 1000.0 * 1000.0 * mesh.layers.thickness;
    assert!(mesh.cells.iter().all(|c| c.volume < 0.5 * layer_volume));
}

#[test]
fn well_points_lattice_and_tier_sizes() {
    let config = config();
    let classifier = TierClassifier::new(&config.well_tiers, &config.fault_tiers).unwrap();
    let extractor = GeometryExtractor::new(&config.field, &config.meshing, classifier);
    let wells = extractor.extract_wells(&config.wells).unwrap();
    let faults = extractor.extract_faults(&config.faults).unwrap();
    let sf = SizeFunction::new(wells.clone(), faults, 300.0, 1000.0, 1000.0).unwrap();

    let points = PointDistributor::new(&sf).generate();
    assert_eq!(points.count(PointSource::Well(0)), 2);
    // ceil(1000 / 300) + 1 = 5 points per axis
    assert_eq!(points.count(PointSource::Lattice), 25);

    for well in &wells {
        assert_relative_eq!(sf.eval(&well.position()), well.tier_size);
    }
    assert_relative_eq!(wells[0].tier_size, 50.0);
    assert_relative_eq!(wells[1].tier_size, 150.0);
}

#[test]
fn validated_mesh_fills_the_reservoir_volume() {
    let artifact = ReservoirMeshPipeline::new(config()).run().unwrap();
    let mesh = &artifact.mesh;

    assert!(mesh.cells.iter().all(|c| c.volume > 0.0));
    assert_relative_eq!(mesh.total_volume(), 1000.0 * 1000.0 * 340.0, max_relative = 1e-9);
    assert_relative_eq!(artifact.statistics.volume.sum, mesh.total_volume(), max_relative = 1e-12);
    assert_eq!(artifact.statistics.total_cells, mesh.n_cells());
    assert_eq!(mesh.n_cells() % 12, 0);
    assert!(artifact.validation.integrity_ok);
    assert!(artifact.validation.geometry_ok);
    assert!(artifact.validation.fault_properties_present);
}

#[test]
fn extrusion_honours_depth_interval() {
    let artifact = ReservoirMeshPipeline::new(config()).run().unwrap();
    let mesh = &artifact.mesh;

    assert_eq!(mesh.layers.n_layers, 12);
    assert_relative_eq!(mesh.layers.thickness, 28.333, epsilon = 1e-3);
    let (shallow, deep) = mesh.depth_range();
    assert_relative_eq!(shallow, 7900.0);
    assert!(((deep - shallow) - 340.0).abs() <= 1e-6);
}

#[test]
fn sealing_fault_faces_carry_multiplier() {
    let artifact = ReservoirMeshPipeline::new(config()).run().unwrap();
    let mesh = &artifact.mesh;
    let fault = &artifact.faults[0];
    let map = &mesh.fault_faces[0];
    let reach = fault.tier_buffer + 20.0;

    assert!(!map.is_empty());
    for &f in &map.faces {
        assert!(mesh.faces[f].fault.is_fault);
        assert_relative_eq!(mesh.faces[f].fault.fault_multiplier, 0.001);
    }

    let mut near = 0;
    for face in &mesh.faces {
        let c = nalgebra::Point2::new(face.centroid.x, face.centroid.y);
        let d = fault.distance_to(&c);
        if d <= reach {
            near += 1;
        } else {
            assert!(!face.fault.is_fault);
            assert_relative_eq!(face.fault.fault_multiplier, 1.0);
        }
    }
    assert!(map.len() <= near);
    assert_eq!(mesh.fault_face_count(), map.len());
}

#[test]
fn lateral_faces_link_cells_in_one_layer() {
    let artifact = ReservoirMeshPipeline::new(config()).run().unwrap();
    let mesh = &artifact.mesh;
    for face in mesh.faces.iter().filter(|f| f.kind == faultmesh::mesh::FaceKind::Lateral) {
        if let FaceNeighbor::Cell(n) = face.neighbor {
            assert_eq!(mesh.cells[face.owner].layer, mesh.cells[n].layer);
        }
    }
}

#[test]
fn implausible_cell_count_is_fatal() {
    let mut config = config();
    config.validation = config.validation.with_cell_bounds(1_000_000, 2_000_000);
    let err = ReservoirMeshPipeline::new(config).run().unwrap_err();
    match err {
        MeshError::CellCount { actual, min, max } => {
            assert!(actual > 0);
            assert_eq!((min, max), (1_000_000, 2_000_000));
        }
        other => panic!("expected cell count error, got {other}"),
    }
}

#[test]
fn unlisted_well_names_the_configuration_location() {
    let mut config = config();
    config.wells[1].name = "INJ-9".into();
    let err = ReservoirMeshPipeline::new(config).run().unwrap_err();
    assert!(err.is_configuration());
    let message = err.to_string();
    assert!(message.contains("INJ-9"));
    assert!(message.contains("well_tiers"));
}

#[test]
fn missing_faults_are_a_configuration_error() {
    let mut config = config();
    config.faults.clear();
    let err = ReservoirMeshPipeline::new(config).run().unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn artifact_round_trips_through_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("field_mesh.json");
    let artifact = ReservoirMeshPipeline::new(config()).run_to_file(&path, false).unwrap();
    let restored = ArtifactExporter::read_json(&path).unwrap();
    assert_eq!(restored, artifact);
}

#[test]
fn fault_along_west_edge_fills_field() {
    let mut config = config();
    config.faults.push(fault("EDGE", (-500.0, 0.0), 0.0, 800.0));
    assert_fills_field(config);
}

#[test]
fn fault_along_south_edge_fills_field() {
    let mut config = config();
    config.faults.push(fault("BASE", (0.0, -500.0), 90.0, 1000.0));
    assert_fills_field(config);
}

#[test]
fn fault_crossing_the_boundary_fills_field() {
    let mut config = config();
    config.faults.push(fault("EXIT", (300.0, 0.0), 30.0, 1400.0));
    assert_fills_field(config);
}

#[test]
fn crossing_faults_fill_field() {
    let mut config = config();
    config.faults.push(fault("CROSS", (0.0, 0.0), 135.0, 600.0));
    assert_fills_field(config);
}

#[test]
fn well_on_lattice_node_keeps_its_cell() {
    let mut config = config();
    // Background spacing is 300 m, so (600, 300) is a lattice node.
    config.wells[1].x = 600.0;
    config.wells[1].y = 300.0;
    let artifact = ReservoirMeshPipeline::new(config.clone()).run().unwrap();
    let columns = artifact
        .mesh
        .cells
        .iter()
        .filter(|c| c.layer == 0 && (c.generator - nalgebra::Point2::new(600.0, 300.0)).norm() < 1e-9)
        .count();
    assert_eq!(columns, 1);
    assert_fills_field(config);
}

#[test]
fn oversized_lattice_is_rejected_before_meshing() {
    let mut config = config();
    config.field.extent_x = 1.0e7;
    config.field.extent_y = 1.0e7;
    let err = ReservoirMeshPipeline::new(config).run().unwrap_err();
    match err {
        MeshError::CellCount { actual, max, .. } => {
            assert!(actual > max);
            assert_eq!(max, 100_000);
        }
        other => panic!("expected cell count error, got {other}"),
    }
}
