//! Mesh validation and graduated repair
//!
//! Checks run in a fixed order: structural integrity, plausible cell count,
//! finite geometry and positive volumes. A small fraction of degenerate cells
//! is removed; anything beyond the configured threshold is fatal. A repaired
//! mesh must still hold a plausible number of cells, and the surviving cells
//! must fill the field volume. PEBI orthogonality is measured and reported
//! but never fails a run.

use crate::config::ValidationConfig;
use crate::error::{MeshError, MeshResult};
use crate::mesh::{FaceKind, FaceNeighbor, ReservoirMesh};
use serde::{Deserialize, Serialize};

/// Allowed relative mismatch between the summed cell volumes and the field volume
const VOLUME_TOLERANCE: f64 = 1e-6;

/// Statistical summary of a set of values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub sum: f64,
}

impl StatisticsSummary {
    /// Summarise `values`; an empty input yields all zeros
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut count = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for v in values {
            count += 1;
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        if count == 0 {
            return Self {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                sum: 0.0,
            };
        }
        Self {
            min,
            max,
            mean: sum / count as f64,
            sum,
        }
    }
}

/// Outcome of a validation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub integrity_ok: bool,
    pub geometry_ok: bool,
    pub removed_cells: usize,
    pub cell_volumes: StatisticsSummary,
    /// Largest angle between a lateral face normal and its generator line (degrees)
    pub max_orthogonality_deg: f64,
    /// Internal lateral faces above the orthogonality threshold
    pub non_orthogonal_faces: usize,
    pub summary: String,
}

/// Validates a layered mesh against configured bounds
pub struct MeshValidator {
    config: ValidationConfig,
}

impl Default for MeshValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshValidator {
    /// Validator with default bounds
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ValidationConfig::default(),
        }
    }

    /// Set validation bounds
    #[must_use]
    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    /// Run all checks, returning the repaired mesh and a report
    pub fn validate(&self, mesh: ReservoirMesh) -> MeshResult<(ReservoirMesh, ValidationReport)> {
        self.check_structure(&mesh)?;
        self.check_cell_count(&mesh)?;
        self.check_finite_geometry(&mesh)?;
        let (mesh, removed_cells) = self.remove_degenerate_cells(mesh)?;
        if removed_cells > 0 {
            self.check_cell_count(&mesh)?;
        }
        self.check_fills_domain(&mesh)?;
        let (max_orthogonality_deg, non_orthogonal_faces) = self.measure_orthogonality(&mesh);

        let cell_volumes = StatisticsSummary::from_values(mesh.cells.iter().map(|c| c.volume));
        let summary = format!(
            "{} cells, {} faces, {} nodes; cell volume {:.3e}..{:.3e} m3 (total {:.6e}); \
             {} cells removed; {} fault faces; max non-orthogonality {:.2} deg",
            mesh.n_cells(),
            mesh.n_faces(),
            mesh.n_nodes(),
            cell_volumes.min,
            cell_volumes.max,
            cell_volumes.sum,
            removed_cells,
            mesh.fault_face_count(),
            max_orthogonality_deg
        );
        log::info!("Validation passed: {summary}");

        Ok((
            mesh,
            ValidationReport {
                integrity_ok: true,
                geometry_ok: true,
                removed_cells,
                cell_volumes,
                max_orthogonality_deg,
                non_orthogonal_faces,
                summary,
            },
        ))
    }

    fn check_structure(&self, mesh: &ReservoirMesh) -> MeshResult<()> {
        if mesh.cells.is_empty() || mesh.faces.is_empty() || mesh.nodes.is_empty() {
            return Err(MeshError::structure_error(format!(
                "mesh is missing elements: {} cells, {} faces, {} nodes",
                mesh.n_cells(),
                mesh.n_faces(),
                mesh.n_nodes()
            )));
        }

        let n_cells = mesh.n_cells();
        let n_nodes = mesh.n_nodes();
        for (i, face) in mesh.faces.iter().enumerate() {
            if face.owner >= n_cells {
                return Err(MeshError::structure_error(format!(
                    "face {i} owner {} does not exist ({n_cells} cells)",
                    face.owner
                )));
            }
            if let FaceNeighbor::Cell(c) = face.neighbor {
                if c >= n_cells || c == face.owner {
                    return Err(MeshError::structure_error(format!(
                        "face {i} neighbor {c} is invalid for owner {}",
                        face.owner
                    )));
                }
            }
            if face.nodes.len() < 3 || face.nodes.iter().any(|&n| n >= n_nodes) {
                return Err(MeshError::structure_error(format!(
                    "face {i} references missing nodes {:?} ({n_nodes} nodes)",
                    face.nodes
                )));
            }
        }

        for map in &mesh.fault_faces {
            if let Some(&f) = map.faces.iter().find(|&&f| f >= mesh.n_faces()) {
                return Err(MeshError::structure_error(format!(
                    "fault '{}' references missing face {f}",
                    map.fault_name
                )));
            }
        }
        Ok(())
    }

    fn check_cell_count(&self, mesh: &ReservoirMesh) -> MeshResult<()> {
        let actual = mesh.n_cells();
        if actual < self.config.min_cells || actual > self.config.max_cells {
            return Err(MeshError::CellCount {
                actual,
                min: self.config.min_cells,
                max: self.config.max_cells,
            });
        }
        Ok(())
    }

    fn check_finite_geometry(&self, mesh: &ReservoirMesh) -> MeshResult<()> {
        if let Some(i) = mesh
            .cells
            .iter()
            .position(|c| !(c.volume.is_finite() && c.centroid.coords.iter().all(|v| v.is_finite())))
        {
            return Err(MeshError::geometry_error(format!("cell {i} has non-finite volume or centroid")));
        }
        if let Some(i) = mesh
            .faces
            .iter()
            .position(|f| !(f.area.is_finite() && f.centroid.coords.iter().all(|v| v.is_finite())))
        {
            return Err(MeshError::geometry_error(format!("face {i} has non-finite area or centroid")));
        }
        if let Some(i) = mesh.nodes.iter().position(|n| !n.coords.iter().all(|v| v.is_finite())) {
            return Err(MeshError::geometry_error(format!("node {i} has non-finite coordinates")));
        }
        Ok(())
    }

    fn check_fills_domain(&self, mesh: &ReservoirMesh) -> MeshResult<()> {
        let expected = mesh.domain_volume();
        let actual = mesh.total_volume();
        if !((actual - expected).abs() <= VOLUME_TOLERANCE * expected.abs()) {
            return Err(MeshError::geometry_error(format!(
                "cell volumes sum to {actual:.6e} m3 but the field holds {expected:.6e} m3;                  cells overlap or leave gaps"
            )));
        }
        Ok(())
    }

    fn remove_degenerate_cells(&self, mesh: ReservoirMesh) -> MeshResult<(ReservoirMesh, usize)> {
        let degenerate: Vec<bool> = mesh.cells.iter().map(|c| c.volume <= 0.0).collect();
        let bad = degenerate.iter().filter(|&&d| d).count();
        if bad == 0 {
            return Ok((mesh, 0));
        }

        let total = mesh.n_cells();
        let threshold = self.config.max_degenerate_fraction;
        let fraction = bad as f64 / total as f64;
        if fraction >= threshold {
            return Err(MeshError::degenerate_cells("validation", bad, total, threshold));
        }

        let (repaired, remap) = mesh.without_cells(&degenerate);
        log::warn!(
            "Removed {} of {total} cells with non-positive volume (fraction {fraction:.4} < {threshold:.4})",
            remap.removed()
        );
        Ok((repaired, bad))
    }

    /// Maximum deviation of internal lateral face normals from the generator line
    fn measure_orthogonality(&self, mesh: &ReservoirMesh) -> (f64, usize) {
        let mut worst: f64 = 0.0;
        let mut flagged = 0;
        for face in &mesh.faces {
            let FaceNeighbor::Cell(q) = face.neighbor else {
                continue;
            };
            if face.kind != FaceKind::Lateral {
                continue;
            }
            let line = mesh.cells[q].generator - mesh.cells[face.owner].generator;
            let normal = face.normal.xy();
            let norms = line.norm() * normal.norm();
            if norms <= 0.0 {
                continue;
            }
            let angle = (line.dot(&normal).abs() / norms).clamp(0.0, 1.0).acos().to_degrees();
            if angle > self.config.max_orthogonality_deg {
                flagged += 1;
            }
            worst = worst.max(angle);
        }
        if flagged > 0 {
            log::warn!(
                "{flagged} lateral faces deviate from PEBI orthogonality by more than {} deg (worst {worst:.2})",
                self.config.max_orthogonality_deg
            );
        }
        (worst, flagged)
    }
}
