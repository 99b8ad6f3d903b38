//! Reservoir meshing configuration
//!
//! The configuration is an explicit, immutable value threaded through the
//! pipeline. Each stage takes only the sections it reads. Documents are JSON
//! and deserialize directly into these types.

use crate::error::{MeshError, MeshResult};
use crate::tiers::{FaultTierTable, TierTable, WellTier};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete configuration for one mesh-generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirConfig {
    /// Field extents and depth interval
    pub field: FieldConfig,
    /// Well locations
    #[serde(default)]
    pub wells: Vec<WellConfig>,
    /// Well sizing tiers
    #[serde(default)]
    pub well_tiers: TierTable<WellTier>,
    /// Fault descriptions
    #[serde(default)]
    pub faults: Vec<FaultConfig>,
    /// Fault sizing tiers
    #[serde(default)]
    pub fault_tiers: FaultTierTable,
    /// Point distribution and fault mapping parameters
    pub meshing: MeshingConfig,
    /// Validation bounds and thresholds
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Field extents and layering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Domain extent along x (m)
    pub extent_x: f64,
    /// Domain extent along y (m)
    pub extent_y: f64,
    /// Depth of the reservoir top (m, positive down)
    pub top_depth: f64,
    /// Depth of the reservoir base (m, positive down)
    pub base_depth: f64,
    /// Number of layers
    pub n_layers: usize,
    /// Allowed deviation of the extruded thickness from `base_depth - top_depth` (m)
    #[serde(default = "default_thickness_tolerance")]
    pub thickness_tolerance: f64,
}

/// A named well at an absolute surface location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellConfig {
    pub name: String,
    pub x: f64,
    pub y: f64,
}

/// A named fault, positioned relative to the domain center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultConfig {
    pub name: String,
    /// Offset of the fault center from the domain center along x (m)
    #[serde(default)]
    pub offset_x: f64,
    /// Offset of the fault center from the domain center along y (m)
    #[serde(default)]
    pub offset_y: f64,
    /// Strike, clockwise degrees from north
    pub strike: f64,
    /// Trace length (m)
    pub length: f64,
    #[serde(default)]
    pub is_sealing: bool,
    /// Multiplier in [0, 1] applied to faces on the fault
    pub transmissibility_multiplier: f64,
}

/// How overlapping fault buffers resolve on a shared face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultConflictPolicy {
    /// The fault processed last overwrites earlier assignments
    #[default]
    LastWins,
    /// The fault closest to the face centroid wins; ties go to the earlier fault
    NearestWins,
}

/// Point distribution and fault mapping parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshingConfig {
    /// Background cell size and lattice spacing (m)
    pub background_size: f64,
    /// Maximum face-centroid distance for a face to be assigned to a fault (m)
    pub alignment_tolerance: f64,
    #[serde(default)]
    pub fault_conflict: FaultConflictPolicy,
    /// Input points closer than this to an existing vertex are merged (m)
    #[serde(default = "default_duplicate_tolerance")]
    pub duplicate_tolerance: f64,
    /// Fail when no wells are configured
    #[serde(default = "default_true")]
    pub require_wells: bool,
    /// Fail when no faults are configured
    #[serde(default = "default_true")]
    pub require_faults: bool,
}

/// Validation bounds and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_cells")]
    pub min_cells: usize,
    #[serde(default = "default_max_cells")]
    pub max_cells: usize,
    /// Fraction of degenerate cells at or above which a run fails
    #[serde(default = "default_degenerate_fraction")]
    pub max_degenerate_fraction: f64,
    /// PEBI orthogonality deviation that triggers a warning (degrees)
    #[serde(default = "default_orthogonality")]
    pub max_orthogonality_deg: f64,
}

const fn default_true() -> bool {
    true
}

const fn default_thickness_tolerance() -> f64 {
    crate::defaults::DEFAULT_THICKNESS_TOLERANCE
}

const fn default_duplicate_tolerance() -> f64 {
    crate::defaults::DEFAULT_DUPLICATE_TOLERANCE
}

const fn default_min_cells() -> usize {
    crate::defaults::DEFAULT_MIN_CELLS
}

const fn default_max_cells() -> usize {
    crate::defaults::DEFAULT_MAX_CELLS
}

const fn default_degenerate_fraction() -> f64 {
    crate::defaults::DEFAULT_MAX_DEGENERATE_FRACTION
}

const fn default_orthogonality() -> f64 {
    crate::defaults::DEFAULT_MAX_ORTHOGONALITY_DEG
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_cells: default_min_cells(),
            max_cells: default_max_cells(),
            max_degenerate_fraction: default_degenerate_fraction(),
            max_orthogonality_deg: default_orthogonality(),
        }
    }
}

impl ValidationConfig {
    /// Set the plausible cell-count range
    #[must_use]
    pub const fn with_cell_bounds(mut self, min_cells: usize, max_cells: usize) -> Self {
        self.min_cells = min_cells;
        self.max_cells = max_cells;
        self
    }

    /// Set the degenerate-cell fraction threshold
    #[must_use]
    pub const fn with_degenerate_fraction(mut self, fraction: f64) -> Self {
        self.max_degenerate_fraction = fraction;
        self
    }
}

impl MeshingConfig {
    /// Create meshing parameters with default merge tolerance and policies
    #[must_use]
    pub const fn new(background_size: f64, alignment_tolerance: f64) -> Self {
        Self {
            background_size,
            alignment_tolerance,
            fault_conflict: FaultConflictPolicy::LastWins,
            duplicate_tolerance: default_duplicate_tolerance(),
            require_wells: true,
            require_faults: true,
        }
    }

    /// Set the fault overlap policy
    #[must_use]
    pub const fn with_fault_conflict(mut self, policy: FaultConflictPolicy) -> Self {
        self.fault_conflict = policy;
        self
    }

    /// Set which entity sets must be non-empty
    #[must_use]
    pub const fn with_required_sets(mut self, wells: bool, faults: bool) -> Self {
        self.require_wells = wells;
        self.require_faults = faults;
        self
    }
}

impl FieldConfig {
    /// Create a field with default thickness tolerance
    #[must_use]
    pub const fn new(extent_x: f64, extent_y: f64, top_depth: f64, base_depth: f64, n_layers: usize) -> Self {
        Self {
            extent_x,
            extent_y,
            top_depth,
            base_depth,
            n_layers,
            thickness_tolerance: default_thickness_tolerance(),
        }
    }

    /// Total reservoir thickness
    #[must_use]
    pub fn thickness(&self) -> f64 {
        self.base_depth - self.top_depth
    }
}

impl ReservoirConfig {
    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> MeshResult<Self> {
        let path = path.as_ref();
        let json_str = fs::read_to_string(path).map_err(|e| {
            MeshError::invalid_input(format!("Failed to read configuration {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json_str)
    }

    /// Parse configuration from a JSON string
    pub fn from_json_str(json_str: &str) -> MeshResult<Self> {
        let config: Self = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Check scalar parameters that every stage relies on
    pub fn validate(&self) -> MeshResult<()> {
        let field = &self.field;
        for (name, value) in [("field.extent_x", field.extent_x), ("field.extent_y", field.extent_y)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(MeshError::configuration(
                    format!("positive domain extent (got {value})"),
                    name,
                ));
            }
        }
        if !(self.meshing.background_size.is_finite() && self.meshing.background_size > 0.0) {
            return Err(MeshError::invalid_input(format!(
                "meshing.background_size must be positive, got {}",
                self.meshing.background_size
            )));
        }
        if !(self.meshing.alignment_tolerance.is_finite() && self.meshing.alignment_tolerance >= 0.0) {
            return Err(MeshError::invalid_input(format!(
                "meshing.alignment_tolerance must be non-negative, got {}",
                self.meshing.alignment_tolerance
            )));
        }
        if self.validation.min_cells > self.validation.max_cells {
            return Err(MeshError::invalid_input(format!(
                "validation.min_cells ({}) exceeds validation.max_cells ({})",
                self.validation.min_cells, self.validation.max_cells
            )));
        }
        if !(0.0..=1.0).contains(&self.validation.max_degenerate_fraction) {
            return Err(MeshError::invalid_input(format!(
                "validation.max_degenerate_fraction must lie in [0, 1], got {}",
                self.validation.max_degenerate_fraction
            )));
        }
        Ok(())
    }
}
