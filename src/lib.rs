//! `faultmesh` - Fault- and Well-Conforming PEBI Meshes for Reservoir Models
//!
//! Builds layered 3D PEBI (perpendicular-bisector) meshes for a rectangular
//! reservoir block. The mesh refines around wells and fault traces according
//! to configured sizing tiers, carries fault transmissibility multipliers on
//! the faces that lie along each fault, and is validated before export.
//!
//! # Architecture
//!
//! The pipeline runs leaf-first, each stage receiving only the configuration
//! it needs:
//!
//! - **tiers**: well and fault tier classification
//! - **geometry**: well points and fault segments in field coordinates
//! - **sizing**: distance-weighted target cell size
//! - **points**: well, fault-trace and lattice generator points
//! - **triangulation**: incremental Bowyer-Watson Delaunay triangulation
//! - **mesh**: PEBI dual construction and the layered mesh types
//! - **faults**: fault property mapping onto faces
//! - **extrusion**: layered depth extrusion
//! - **quality**: validation with graduated repair
//! - **export**: artifact assembly and JSON I/O
//!
//! # Examples
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use faultmesh::{ReservoirConfig, ReservoirMeshPipeline};
//!
//! let config = ReservoirConfig::from_json_file("field.json")?;
//! let artifact = ReservoirMeshPipeline::new(config).run_to_file("mesh.json", true)?;
//! println!("{}", artifact.validation.summary);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod extrusion;
pub mod faults;
pub mod geometry;
pub mod mesh;
pub mod points;
pub mod quality;
pub mod sizing;
pub mod tiers;
pub mod triangulation;

// Re-export commonly used types
pub use config::{FaultConflictPolicy, ReservoirConfig};
pub use error::{MeshError, MeshResult};
pub use export::{ArtifactExporter, MeshArtifact, MeshStatistics, ValidationRecord};
pub use extrusion::{ExtrusionConfig, ExtrusionEngine, ExtrusionResult};
pub use faults::{FaultFaceMap, FaultMapper};
pub use mesh::{MeshBuilder, PebiMesh, ReservoirMesh};
pub use quality::{MeshValidator, ValidationReport};
pub use tiers::{FaultTier, TierClassifier, WellTier};

use geometry::GeometryExtractor;
use points::PointDistributor;
use sizing::SizeFunction;
use std::path::Path;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default pipeline parameters
pub mod defaults {
    /// Multiplier below which an unlisted fault is treated as major
    pub const DEFAULT_MAJOR_MULTIPLIER_THRESHOLD: f64 = 0.1;

    /// Merge distance for coincident generator points (m)
    pub const DEFAULT_DUPLICATE_TOLERANCE: f64 = 1e-6;

    /// Allowed deviation of the extruded thickness (m)
    pub const DEFAULT_THICKNESS_TOLERANCE: f64 = 1e-6;

    /// Smallest plausible cell count
    pub const DEFAULT_MIN_CELLS: usize = 100;

    /// Largest plausible cell count
    pub const DEFAULT_MAX_CELLS: usize = 5_000_000;

    /// Degenerate-cell fraction at or above which a run fails
    pub const DEFAULT_MAX_DEGENERATE_FRACTION: f64 = 0.1;

    /// Non-orthogonality that triggers a warning (degrees)
    pub const DEFAULT_MAX_ORTHOGONALITY_DEG: f64 = 5.0;
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ArtifactExporter, ExtrusionConfig, ExtrusionEngine, FaultConflictPolicy, FaultFaceMap, FaultMapper,
        FaultTier, MeshArtifact, MeshBuilder, MeshError, MeshResult, MeshValidator, PebiMesh, ReservoirConfig,
        ReservoirMesh, ReservoirMeshPipeline, WellTier,
    };

    pub use crate::defaults::*;
}

/// Complete configuration-to-artifact pipeline
pub struct ReservoirMeshPipeline {
    config: ReservoirConfig,
}

impl ReservoirMeshPipeline {
    #[must_use]
    pub const fn new(config: ReservoirConfig) -> Self {
        Self { config }
    }

    /// Load and validate a JSON configuration
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> MeshResult<Self> {
        Ok(Self::new(ReservoirConfig::from_json_file(path)?))
    }

    #[must_use]
    pub const fn config(&self) -> &ReservoirConfig {
        &self.config
    }

    /// Run every stage and return the validated artifact
    pub fn run(&self) -> MeshResult<MeshArtifact> {
        let start_time = std::time::Instant::now();
        let config = &self.config;
        config.validate()?;

        let classifier = TierClassifier::new(&config.well_tiers, &config.fault_tiers)?;
        let extractor = GeometryExtractor::new(&config.field, &config.meshing, classifier);
        let wells = extractor.extract_wells(&config.wells)?;
        let faults = extractor.extract_faults(&config.faults)?;

        let size_function = SizeFunction::new(
            wells.clone(),
            faults.clone(),
            config.meshing.background_size,
            config.field.extent_x,
            config.field.extent_y,
        )?;
        let distributor = PointDistributor::new(&size_function);
        let planned = distributor.lattice_node_count() * config.field.n_layers as f64;
        if planned > config.validation.max_cells as f64 {
            // Lattice nodes alone already exceed the bound; fail before allocating them.
            return Err(MeshError::CellCount {
                actual: planned as usize,
                min: config.validation.min_cells,
                max: config.validation.max_cells,
            });
        }
        let points = distributor.generate();

        let mut planar = MeshBuilder::new(config.field.extent_x, config.field.extent_y)
            .with_duplicate_tolerance(config.meshing.duplicate_tolerance)
            .build(&points)?;
        let generators: Vec<_> = planar.cells.iter().map(|c| c.generator).collect();
        let coarsest = size_function
            .eval_many(&generators)
            .iter()
            .zip(&planar.cells)
            .map(|(target, cell)| cell.area.sqrt() / target)
            .fold(0.0, f64::max);
        log::info!("Coarsest planar cell is {coarsest:.2} times its target size");
        let fault_faces = FaultMapper::new(&faults, &config.meshing).map(&mut planar);

        let extruded = ExtrusionEngine::new(ExtrusionConfig::from_field(&config.field, &config.validation))
            .extrude(&planar, &fault_faces)?;

        let (mesh, report) = MeshValidator::new()
            .with_config(config.validation.clone())
            .validate(extruded.mesh)?;
        let artifact = ArtifactExporter::new().assemble(mesh, wells, faults, size_function, &report);

        log::info!(
            "Pipeline finished in {:.2?}: {} cells, {} fault faces",
            start_time.elapsed(),
            artifact.statistics.total_cells,
            artifact.statistics.fault_faces
        );
        Ok(artifact)
    }

    /// Run the pipeline and write the artifact as JSON
    pub fn run_to_file<P: AsRef<Path>>(&self, path: P, pretty: bool) -> MeshResult<MeshArtifact> {
        let artifact = self.run()?;
        ArtifactExporter::new().with_pretty(pretty).write_json(&artifact, path)?;
        Ok(artifact)
    }
}
