//! Layered depth extrusion
//!
//! Each planar PEBI cell becomes a column of prisms, one per layer. Depth is
//! positive downward: layer 0 sits at the reservoir top.

use crate::config::{FieldConfig, ValidationConfig};
use crate::error::{MeshError, MeshResult};
use crate::faults::FaultFaceMap;
use crate::mesh::{
    BoundarySide, Cell, Face, FaceKind, FaceNeighbor, FaultProperties, LayerInfo, PebiMesh, ReservoirMesh,
};
use nalgebra::{Point3, Vector3};

/// Configuration for the extrusion process
#[derive(Debug, Clone)]
pub struct ExtrusionConfig {
    /// Depth of the reservoir top (m)
    pub top_depth: f64,
    /// Depth of the reservoir base (m)
    pub base_depth: f64,
    /// Number of layers
    pub n_layers: usize,
    /// Allowed deviation of the extruded thickness (m)
    pub thickness_tolerance: f64,
    /// Fraction of degenerate cells at or above which extrusion fails
    pub max_degenerate_fraction: f64,
}

impl Default for ExtrusionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtrusionConfig {
    /// Single 1 m layer starting at the surface
    #[must_use]
    pub const fn new() -> Self {
        Self {
            top_depth: 0.0,
            base_depth: 1.0,
            n_layers: 1,
            thickness_tolerance: crate::defaults::DEFAULT_THICKNESS_TOLERANCE,
            max_degenerate_fraction: crate::defaults::DEFAULT_MAX_DEGENERATE_FRACTION,
        }
    }

    /// Take depths and layering from the field section and thresholds from validation
    #[must_use]
    pub const fn from_field(field: &FieldConfig, validation: &ValidationConfig) -> Self {
        Self {
            top_depth: field.top_depth,
            base_depth: field.base_depth,
            n_layers: field.n_layers,
            thickness_tolerance: field.thickness_tolerance,
            max_degenerate_fraction: validation.max_degenerate_fraction,
        }
    }

    /// Set the depth interval
    #[must_use]
    pub const fn with_depths(mut self, top_depth: f64, base_depth: f64) -> Self {
        self.top_depth = top_depth;
        self.base_depth = base_depth;
        self
    }

    /// Set the number of layers
    #[must_use]
    pub const fn with_layers(mut self, n_layers: usize) -> Self {
        self.n_layers = n_layers;
        self
    }

    /// Set the thickness tolerance
    #[must_use]
    pub const fn with_thickness_tolerance(mut self, tolerance: f64) -> Self {
        self.thickness_tolerance = tolerance;
        self
    }

    /// Set the degenerate-cell threshold
    #[must_use]
    pub const fn with_degenerate_fraction(mut self, fraction: f64) -> Self {
        self.max_degenerate_fraction = fraction;
        self
    }

    fn validate(&self) -> MeshResult<()> {
        if !(self.top_depth.is_finite() && self.base_depth.is_finite()) {
            return Err(MeshError::invalid_input("top and base depth must be finite"));
        }
        if self.top_depth >= self.base_depth {
            return Err(MeshError::invalid_input(format!(
                "top depth {} must be shallower than base depth {}",
                self.top_depth, self.base_depth
            )));
        }
        if self.n_layers == 0 {
            return Err(MeshError::configuration("at least one layer", "field.n_layers"));
        }
        Ok(())
    }

    /// Layer thickness
    #[must_use]
    pub fn layer_thickness(&self) -> f64 {
        (self.base_depth - self.top_depth) / self.n_layers as f64
    }
}

/// Result of extrusion
#[derive(Debug, Clone)]
pub struct ExtrusionResult {
    pub mesh: ReservoirMesh,
    pub statistics: ExtrusionStatistics,
    pub processing_time: std::time::Duration,
}

/// Statistics from extrusion
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrusionStatistics {
    pub columns: usize,
    pub layers: usize,
    pub lateral_faces: usize,
    pub horizontal_faces: usize,
    /// Cells whose volume is not positive (left in place)
    pub degenerate_cells: usize,
    pub total_volume: f64,
}

/// Extrudes a planar PEBI mesh through the reservoir interval
pub struct ExtrusionEngine {
    config: ExtrusionConfig,
}

impl ExtrusionEngine {
    #[must_use]
    pub const fn new(config: ExtrusionConfig) -> Self {
        Self { config }
    }

    /// Extrude `mesh`; `fault_faces` index planar faces and are re-expressed as lateral faces
    pub fn extrude(&self, mesh: &PebiMesh, fault_faces: &[FaultFaceMap]) -> MeshResult<ExtrusionResult> {
        let start_time = std::time::Instant::now();
        self.config.validate()?;
        if mesh.cells.is_empty() {
            return Err(MeshError::structure_error("cannot extrude a mesh without cells"));
        }

        let n = self.config.n_layers;
        let dz = self.config.layer_thickness();
        let top = self.config.top_depth;
        let n2d = mesh.n_nodes();
        let ncol = mesh.n_cells();
        let nf = mesh.n_faces();
        let depth = |level: usize| top + level as f64 * dz;

        let mut nodes: Vec<Point3<f64>> = (0..=n)
            .flat_map(|level| mesh.nodes.iter().map(move |p| Point3::new(p.x, p.y, depth(level))))
            .collect();

        let shallowest = nodes.iter().map(|p| p.z).fold(f64::INFINITY, f64::min);
        let shift = top - shallowest;
        if shift != 0.0 {
            for node in &mut nodes {
                node.z += shift;
            }
        }

        let cells: Vec<Cell> = (0..n)
            .flat_map(|layer| {
                mesh.cells.iter().enumerate().map(move |(column, c)| Cell {
                    column,
                    layer,
                    volume: c.area * dz,
                    centroid: Point3::new(c.centroid.x, c.centroid.y, depth(layer) + dz / 2.0 + shift),
                    generator: c.generator,
                })
            })
            .collect();

        let mut faces = Vec::with_capacity(n * nf + (n + 1) * ncol);
        for layer in 0..n {
            let (lo, hi) = (layer * n2d, (layer + 1) * n2d);
            for face in &mesh.faces {
                let [a, b] = face.nodes;
                let neighbor = match face.neighbor {
                    FaceNeighbor::Cell(q) => FaceNeighbor::Cell(layer * ncol + q),
                    side @ FaceNeighbor::Boundary(_) => side,
                };
                faces.push(Face {
                    nodes: vec![a + lo, b + lo, b + hi, a + hi],
                    owner: layer * ncol + face.owner,
                    neighbor,
                    kind: FaceKind::Lateral,
                    centroid: Point3::new(face.centroid.x, face.centroid.y, depth(layer) + dz / 2.0 + shift),
                    area: face.length * dz,
                    normal: Vector3::new(face.normal.x, face.normal.y, 0.0),
                    fault: face.fault,
                });
            }
        }
        let lateral_faces = faces.len();

        for level in 0..=n {
            for (column, c) in mesh.cells.iter().enumerate() {
                let (owner, neighbor, normal) = if level == 0 {
                    (column, FaceNeighbor::Boundary(BoundarySide::Top), -Vector3::<f64>::z())
                } else if level == n {
                    ((n - 1) * ncol + column, FaceNeighbor::Boundary(BoundarySide::Bottom), Vector3::z())
                } else {
                    ((level - 1) * ncol + column, FaceNeighbor::Cell(level * ncol + column), Vector3::z())
                };
                faces.push(Face {
                    nodes: c.nodes.iter().map(|&v| v + level * n2d).collect(),
                    owner,
                    neighbor,
                    kind: FaceKind::Horizontal,
                    centroid: Point3::new(c.centroid.x, c.centroid.y, depth(level) + shift),
                    area: c.area,
                    normal,
                    fault: FaultProperties::default(),
                });
            }
        }
        let horizontal_faces = faces.len() - lateral_faces;

        let fault_faces = fault_faces
            .iter()
            .map(|map| FaultFaceMap {
                faces: (0..n)
                    .flat_map(|layer| map.faces.iter().map(move |&f| layer * nf + f))
                    .collect(),
                ..map.clone()
            })
            .collect();

        let layers = LayerInfo {
            top_depth: self.config.top_depth,
            base_depth: self.config.base_depth,
            n_layers: n,
            thickness: dz,
        };
        let mesh3d = ReservoirMesh {
            nodes,
            cells,
            faces,
            layers,
            fault_faces,
            extent_x: mesh.extent_x,
            extent_y: mesh.extent_y,
        };

        self.check_thickness(&mesh3d)?;
        let degenerate_cells = self.check_degenerate_volumes(&mesh3d)?;

        let statistics = ExtrusionStatistics {
            columns: ncol,
            layers: n,
            lateral_faces,
            horizontal_faces,
            degenerate_cells,
            total_volume: mesh3d.total_volume(),
        };
        log::info!(
            "Extruded {} columns through {} layers of {:.3} m: {} cells, {} faces",
            ncol,
            n,
            dz,
            mesh3d.n_cells(),
            mesh3d.n_faces()
        );

        Ok(ExtrusionResult {
            mesh: mesh3d,
            statistics,
            processing_time: start_time.elapsed(),
        })
    }

    fn check_thickness(&self, mesh: &ReservoirMesh) -> MeshResult<()> {
        let (shallow, deep) = mesh.depth_range();
        let expected = self.config.base_depth - self.config.top_depth;
        let actual = deep - shallow;
        if (actual - expected).abs() > self.config.thickness_tolerance {
            return Err(MeshError::geometry_error(format!(
                "extruded thickness {actual} differs from base - top = {expected} \
                 by more than {}",
                self.config.thickness_tolerance
            )));
        }
        Ok(())
    }

    fn check_degenerate_volumes(&self, mesh: &ReservoirMesh) -> MeshResult<usize> {
        let total = mesh.n_cells();
        let bad = mesh
            .cells
            .iter()
            .filter(|c| !(c.volume.is_finite() && c.volume > 0.0))
            .count();
        if bad == 0 {
            return Ok(0);
        }
        let fraction = bad as f64 / total as f64;
        if fraction >= self.config.max_degenerate_fraction {
            return Err(MeshError::degenerate_cells(
                "extrusion",
                bad,
                total,
                self.config.max_degenerate_fraction,
            ));
        }
        log::warn!(
            "Extrusion produced {bad} of {total} cells with non-positive volume \
             (fraction {fraction:.4} < {:.4}); continuing",
            self.config.max_degenerate_fraction
        );
        Ok(bad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{PebiCell, PebiFace};
    use crate::points::PointSource;
    use approx::assert_relative_eq;
    use nalgebra::{Point2, Vector2};

    /// Two unit squares side by side
    fn two_squares() -> PebiMesh {
        let nodes = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let cell = |nodes: Vec<usize>, cx: f64| PebiCell {
            generator: Point2::new(cx, 0.5),
            source: PointSource::Lattice,
            nodes,
            area: 1.0,
            centroid: Point2::new(cx, 0.5),
        };
        let face = |a: usize, b: usize, owner: usize, neighbor: FaceNeighbor, c: (f64, f64), n: (f64, f64)| PebiFace {
            nodes: [a, b],
            owner,
            neighbor,
            centroid: Point2::new(c.0, c.1),
            length: 1.0,
            normal: Vector2::new(n.0, n.1),
            fault: FaultProperties::default(),
        };
        let mut faces = vec![
            face(0, 1, 0, FaceNeighbor::Boundary(BoundarySide::South), (0.5, 0.0), (0.0, -1.0)),
            face(1, 4, 0, FaceNeighbor::Cell(1), (1.0, 0.5), (1.0, 0.0)),
            face(4, 5, 0, FaceNeighbor::Boundary(BoundarySide::North), (0.5, 1.0), (0.0, 1.0)),
            face(5, 0, 0, FaceNeighbor::Boundary(BoundarySide::West), (0.0, 0.5), (-1.0, 0.0)),
            face(1, 2, 1, FaceNeighbor::Boundary(BoundarySide::South), (1.5, 0.0), (0.0, -1.0)),
            face(2, 3, 1, FaceNeighbor::Boundary(BoundarySide::East), (2.0, 0.5), (1.0, 0.0)),
            face(3, 4, 1, FaceNeighbor::Boundary(BoundarySide::North), (1.5, 1.0), (0.0, 1.0)),
        ];
        faces[1].fault = FaultProperties {
            is_fault: true,
            fault_multiplier: 0.01,
            fault_index: Some(0),
        };
        PebiMesh {
            nodes,
            cells: vec![cell(vec![0, 1, 4, 5], 0.5), cell(vec![1, 2, 3, 4], 1.5)],
            faces,
            extent_x: 2.0,
            extent_y: 1.0,
            triangle_count: 0,
        }
    }

    fn fault_map() -> Vec<FaultFaceMap> {
        vec![FaultFaceMap {
            fault_index: 0,
            fault_name: "F1".into(),
            transmissibility_multiplier: 0.01,
            faces: vec![1],
        }]
    }

    #[test]
    fn test_counts_and_indexing() {
        let config = ExtrusionConfig::new().with_depths(7900.0, 8240.0).with_layers(12);
        let result = ExtrusionEngine::new(config).extrude(&two_squares(), &fault_map()).unwrap();
        let mesh = &result.mesh;

        assert_eq!(mesh.n_nodes(), 6 * 13);
        assert_eq!(mesh.n_cells(), 24);
        assert_eq!(result.statistics.lateral_faces, 7 * 12);
        assert_eq!(result.statistics.horizontal_faces, 2 * 13);
        assert_eq!(mesh.cells[3].layer, 1);
        assert_eq!(mesh.cells[3].column, 1);
        assert_relative_eq!(mesh.layers.thickness, 340.0 / 12.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.layers.thickness, 28.333, epsilon = 1e-3);
    }

    #[test]
    fn test_depths_and_volume() {
        let config = ExtrusionConfig::new().with_depths(7900.0, 8240.0).with_layers(12);
        let result = ExtrusionEngine::new(config).extrude(&two_squares(), &[]).unwrap();
        let (shallow, deep) = result.mesh.depth_range();
        assert_relative_eq!(shallow, 7900.0);
        assert_relative_eq!(deep, 8240.0, epsilon = 1e-9);
        assert_relative_eq!(result.mesh.total_volume(), 2.0 * 340.0, epsilon = 1e-9);
        assert_relative_eq!(result.mesh.domain_volume(), result.mesh.total_volume(), epsilon = 1e-9);
        assert_relative_eq!(result.statistics.total_volume, 680.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fault_fields_follow_lateral_faces() {
        let config = ExtrusionConfig::new().with_depths(0.0, 30.0).with_layers(3);
        let result = ExtrusionEngine::new(config).extrude(&two_squares(), &fault_map()).unwrap();
        let mesh = &result.mesh;
        assert_eq!(mesh.fault_faces[0].faces, vec![1, 8, 15]);
        for &f in &mesh.fault_faces[0].faces {
            assert!(mesh.faces[f].fault.is_fault);
            assert_relative_eq!(mesh.faces[f].fault.fault_multiplier, 0.01);
            assert_eq!(mesh.faces[f].kind, FaceKind::Lateral);
        }
        assert_eq!(mesh.fault_face_count(), 3);
        // Lateral neighbor is in the same layer.
        assert_eq!(mesh.faces[8].owner, 2);
        assert_eq!(mesh.faces[8].neighbor, FaceNeighbor::Cell(3));
        assert_eq!(mesh.faces[8].nodes, vec![7, 10, 16, 13]);
    }

    #[test]
    fn test_horizontal_faces_link_layers() {
        let config = ExtrusionConfig::new().with_depths(0.0, 20.0).with_layers(2);
        let result = ExtrusionEngine::new(config).extrude(&two_squares(), &[]).unwrap();
        let horizontal: Vec<_> = result.mesh.faces.iter().filter(|f| f.kind == FaceKind::Horizontal).collect();
        assert_eq!(horizontal.len(), 6);
        assert_eq!(horizontal[0].neighbor, FaceNeighbor::Boundary(BoundarySide::Top));
        assert_eq!(horizontal[2].owner, 0);
        assert_eq!(horizontal[2].neighbor, FaceNeighbor::Cell(2));
        assert_eq!(horizontal[5].owner, 3);
        assert_eq!(horizontal[5].neighbor, FaceNeighbor::Boundary(BoundarySide::Bottom));
        assert_relative_eq!(horizontal[4].centroid.z, 20.0);
    }

    #[test]
    fn test_invalid_depths_rejected() {
        let config = ExtrusionConfig::new().with_depths(100.0, 100.0);
        assert!(ExtrusionEngine::new(config).extrude(&two_squares(), &[]).is_err());
        let config = ExtrusionConfig::new().with_layers(0);
        assert!(ExtrusionEngine::new(config)
            .extrude(&two_squares(), &[])
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn test_degenerate_policy() {
        let mut mesh = two_squares();
        mesh.cells[1].area = 0.0;
        // Half the cells are degenerate.
        let strict = ExtrusionConfig::new().with_degenerate_fraction(0.1);
        assert!(matches!(
            ExtrusionEngine::new(strict).extrude(&mesh, &[]),
            Err(MeshError::DegenerateCells { bad: 1, total: 2, .. })
        ));
        let lenient = ExtrusionConfig::new().with_degenerate_fraction(0.6);
        let result = ExtrusionEngine::new(lenient).extrude(&mesh, &[]).unwrap();
        assert_eq!(result.statistics.degenerate_cells, 1);
    }
}
