//! Mesh artifact assembly and JSON export
//!
//! The artifact bundles the validated mesh with every input that shaped it,
//! so a downstream simulator or a later inspection never has to re-run the
//! pipeline.

use crate::error::MeshResult;
use crate::geometry::{FaultSegment, WellConstraint};
use crate::mesh::ReservoirMesh;
use crate::quality::{StatisticsSummary, ValidationReport};
use crate::sizing::SizeFunction;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Counts and volume statistics of the final mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshStatistics {
    pub total_cells: usize,
    pub total_faces: usize,
    pub total_nodes: usize,
    pub volume: StatisticsSummary,
    pub fault_faces: usize,
    pub removed_cells: usize,
}

impl MeshStatistics {
    #[must_use]
    pub fn from_mesh(mesh: &ReservoirMesh, removed_cells: usize) -> Self {
        Self {
            total_cells: mesh.n_cells(),
            total_faces: mesh.n_faces(),
            total_nodes: mesh.n_nodes(),
            volume: StatisticsSummary::from_values(mesh.cells.iter().map(|c| c.volume)),
            fault_faces: mesh.fault_face_count(),
            removed_cells,
        }
    }
}

/// Outcome of validation, stamped with the export time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// RFC 3339 UTC timestamp
    pub timestamp: String,
    pub integrity_ok: bool,
    pub geometry_ok: bool,
    /// Every face carries a multiplier in [0, 1] and fault maps agree with face flags
    pub fault_properties_present: bool,
    pub summary: String,
}

/// Everything produced by one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshArtifact {
    pub mesh: ReservoirMesh,
    pub wells: Vec<WellConstraint>,
    pub faults: Vec<FaultSegment>,
    pub size_function: SizeFunction,
    pub statistics: MeshStatistics,
    pub validation: ValidationRecord,
}

fn fault_properties_present(mesh: &ReservoirMesh) -> bool {
    let multipliers_ok = mesh
        .faces
        .iter()
        .all(|f| (0.0..=1.0).contains(&f.fault.fault_multiplier));
    let maps_ok = mesh.fault_faces.iter().all(|map| {
        map.faces.iter().all(|&i| {
            mesh.faces
                .get(i)
                .is_some_and(|f| f.fault.is_fault && f.fault.fault_index == Some(map.fault_index))
        })
    });
    multipliers_ok && maps_ok
}

/// Assembles and writes mesh artifacts
pub struct ArtifactExporter {
    pretty: bool,
}

impl Default for ArtifactExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactExporter {
    #[must_use]
    pub const fn new() -> Self {
        Self { pretty: false }
    }

    /// Pretty-print JSON output
    #[must_use]
    pub const fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Bundle a validated mesh with its inputs
    #[must_use]
    pub fn assemble(
        &self,
        mesh: ReservoirMesh,
        wells: Vec<WellConstraint>,
        faults: Vec<FaultSegment>,
        size_function: SizeFunction,
        report: &ValidationReport,
    ) -> MeshArtifact {
        let statistics = MeshStatistics::from_mesh(&mesh, report.removed_cells);
        let validation = ValidationRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            integrity_ok: report.integrity_ok,
            geometry_ok: report.geometry_ok,
            fault_properties_present: fault_properties_present(&mesh),
            summary: report.summary.clone(),
        };
        MeshArtifact {
            mesh,
            wells,
            faults,
            size_function,
            statistics,
            validation,
        }
    }

    /// Write an artifact as JSON
    pub fn write_json<P: AsRef<Path>>(&self, artifact: &MeshArtifact, path: P) -> MeshResult<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, artifact)?;
        } else {
            serde_json::to_writer(&mut writer, artifact)?;
        }
        writer.flush()?;
        log::info!("Wrote mesh artifact to {}", path.display());
        Ok(())
    }

    /// Read an artifact written by [`Self::write_json`]
    pub fn read_json<P: AsRef<Path>>(path: P) -> MeshResult<MeshArtifact> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
