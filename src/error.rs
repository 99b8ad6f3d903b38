//! Error handling for the faultmesh pipeline
//!
//! Every stage returns [`MeshResult`] and fails on its own fatal conditions.
//! Errors fall into three families: configuration completeness, geometric
//! degeneracy and structural integrity. Messages name the offending item and
//! the configuration location that is expected to fix it.

use thiserror::Error;

/// Result type alias for faultmesh operations
pub type MeshResult<T> = Result<T, MeshError>;

/// Kind of named entity that failed tier classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Well,
    Fault,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Well => write!(f, "well"),
            Self::Fault => write!(f, "fault"),
        }
    }
}

/// Error types for faultmesh operations
#[derive(Error, Debug)]
pub enum MeshError {
    /// A required configuration item is missing or empty
    #[error("Missing configuration: {item} (expected in `{location}`)")]
    Configuration { item: String, location: String },

    /// A named well or fault belongs to no configured tier
    #[error("Unclassified {kind} '{name}': not listed in any tier (expected in `{location}`)")]
    UnclassifiedEntity {
        kind: EntityKind,
        name: String,
        location: String,
    },

    /// Invalid input data or parameters
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Triangulation or dual construction produced unusable geometry
    #[error("Geometry error: {message}")]
    Geometry { message: String },

    /// Too many cells with non-positive volume for the graduated repair policy
    #[error(
        "{stage}: {bad} of {total} cells have non-positive volume \
         (fraction {fraction:.4} >= threshold {threshold:.4}); fix the point distribution or sizing"
    )]
    DegenerateCells {
        stage: String,
        bad: usize,
        total: usize,
        fraction: f64,
        threshold: f64,
    },

    /// Cell count outside the configured plausible range
    #[error(
        "Cell count {actual} outside plausible range [{min}, {max}] \
         (adjust `validation.min_cells`/`validation.max_cells` or `meshing.background_size`)"
    )]
    CellCount { actual: usize, min: usize, max: usize },

    /// Mesh is missing expected collections or has dangling references
    #[error("Structural integrity error: {message}")]
    Structure { message: String },

    /// File I/O errors
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    /// JSON parsing errors
    #[error("JSON error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },
}

impl MeshError {
    /// Create a configuration-completeness error
    pub fn configuration(item: impl Into<String>, location: impl Into<String>) -> Self {
        Self::Configuration {
            item: item.into(),
            location: location.into(),
        }
    }

    /// Create an unclassified-entity error
    pub fn unclassified(kind: EntityKind, name: impl Into<String>, location: impl Into<String>) -> Self {
        Self::UnclassifiedEntity {
            kind,
            name: name.into(),
            location: location.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a geometry error
    pub fn geometry_error(message: impl Into<String>) -> Self {
        Self::Geometry {
            message: message.into(),
        }
    }

    /// Create a structural integrity error
    pub fn structure_error(message: impl Into<String>) -> Self {
        Self::Structure {
            message: message.into(),
        }
    }

    /// Create a degenerate-cells error for the given stage
    pub fn degenerate_cells(stage: impl Into<String>, bad: usize, total: usize, threshold: f64) -> Self {
        let fraction = if total == 0 { 1.0 } else { bad as f64 / total as f64 };
        Self::DegenerateCells {
            stage: stage.into(),
            bad,
            total,
            fraction,
            threshold,
        }
    }

    /// Whether this error belongs to the configuration-completeness family
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::UnclassifiedEntity { .. })
    }
}
