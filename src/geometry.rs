//! Well and fault geometry extraction
//!
//! Turns configured wells into absolute point constraints and configured
//! faults into absolute line segments, each carrying its sizing tier.

use crate::config::{FaultConfig, FieldConfig, MeshingConfig, WellConfig};
use crate::error::{MeshError, MeshResult};
use crate::tiers::{FaultTier, TierClassifier, TierSource, WellTier};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// A well as a point sizing constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellConstraint {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub tier: WellTier,
    pub tier_size: f64,
    pub tier_radius: f64,
}

/// A fault trace as a line-segment sizing constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultSegment {
    pub name: String,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub tier: FaultTier,
    pub tier_source: TierSource,
    pub tier_size: f64,
    pub tier_buffer: f64,
    pub is_sealing: bool,
    pub transmissibility_multiplier: f64,
}

impl WellConstraint {
    #[must_use]
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

impl FaultSegment {
    #[must_use]
    pub fn start(&self) -> Point2<f64> {
        Point2::new(self.x1, self.y1)
    }

    #[must_use]
    pub fn end(&self) -> Point2<f64> {
        Point2::new(self.x2, self.y2)
    }

    /// Trace length
    #[must_use]
    pub fn length(&self) -> f64 {
        (self.end() - self.start()).norm()
    }

    /// Distance from `p` to the trace
    #[must_use]
    pub fn distance_to(&self, p: &Point2<f64>) -> f64 {
        point_segment_distance(p, &self.start(), &self.end())
    }
}

/// Distance from `p` to segment `ab`.
///
/// Projects onto the supporting line and clamps the parameter to `[0, 1]`.
#[must_use]
pub fn point_segment_distance(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= f64::EPSILON * f64::EPSILON {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    let closest = a + ab * t;
    (p - closest).norm()
}

/// Fault endpoints from a center, a strike (clockwise degrees from north) and a length
#[must_use]
pub fn fault_endpoints(center: Point2<f64>, strike_deg: f64, length: f64) -> (Point2<f64>, Point2<f64>) {
    let strike = strike_deg.to_radians();
    let half = Vector2::new(strike.sin(), strike.cos()) * (length / 2.0);
    (center - half, center + half)
}

/// Extracts well and fault geometry from configuration
pub struct GeometryExtractor<'a> {
    field: &'a FieldConfig,
    meshing: &'a MeshingConfig,
    classifier: TierClassifier<'a>,
}

impl<'a> GeometryExtractor<'a> {
    /// Create an extractor over the field extents and tier classifier
    #[must_use]
    pub const fn new(field: &'a FieldConfig, meshing: &'a MeshingConfig, classifier: TierClassifier<'a>) -> Self {
        Self {
            field,
            meshing,
            classifier,
        }
    }

    /// Domain center on the surface
    #[must_use]
    pub fn domain_center(&self) -> Point2<f64> {
        Point2::new(self.field.extent_x / 2.0, self.field.extent_y / 2.0)
    }

    /// Build well constraints in configuration order
    pub fn extract_wells(&self, wells: &[WellConfig]) -> MeshResult<Vec<WellConstraint>> {
        if wells.is_empty() && self.meshing.require_wells {
            return Err(MeshError::configuration("at least one well", "wells"));
        }

        let constraints = wells
            .iter()
            .map(|well| {
                if !(well.x.is_finite() && well.y.is_finite()) {
                    return Err(MeshError::invalid_input(format!(
                        "well '{}' has non-finite coordinates ({}, {})",
                        well.name, well.x, well.y
                    )));
                }
                let assignment = self.classifier.classify_well(&well.name)?;
                log::debug!("Well '{}' classified as {} tier", well.name, assignment.tier);
                Ok(WellConstraint {
                    name: well.name.clone(),
                    x: well.x,
                    y: well.y,
                    tier: assignment.tier,
                    tier_size: assignment.cell_size,
                    tier_radius: assignment.influence,
                })
            })
            .collect::<MeshResult<Vec<_>>>()?;

        log::info!("Extracted {} well constraints", constraints.len());
        Ok(constraints)
    }

    /// Build fault segments in configuration order
    pub fn extract_faults(&self, faults: &[FaultConfig]) -> MeshResult<Vec<FaultSegment>> {
        if faults.is_empty() && self.meshing.require_faults {
            return Err(MeshError::configuration("at least one fault", "faults"));
        }

        let center = self.domain_center();
        let mut segments = Vec::with_capacity(faults.len());
        for fault in faults {
            if !(fault.length.is_finite() && fault.length > 0.0) {
                return Err(MeshError::invalid_input(format!(
                    "fault '{}' length must be positive, got {}",
                    fault.name, fault.length
                )));
            }
            if !(0.0..=1.0).contains(&fault.transmissibility_multiplier) {
                return Err(MeshError::invalid_input(format!(
                    "fault '{}' transmissibility multiplier must lie in [0, 1], got {}",
                    fault.name, fault.transmissibility_multiplier
                )));
            }
            if !(fault.offset_x.is_finite() && fault.offset_y.is_finite() && fault.strike.is_finite()) {
                return Err(MeshError::invalid_input(format!(
                    "fault '{}' has non-finite offset or strike",
                    fault.name
                )));
            }

            let assignment = self
                .classifier
                .classify_fault(&fault.name, fault.transmissibility_multiplier)?;
            let fault_center = center + Vector2::new(fault.offset_x, fault.offset_y);
            let (start, end) = fault_endpoints(fault_center, fault.strike, fault.length);

            segments.push(FaultSegment {
                name: fault.name.clone(),
                x1: start.x,
                y1: start.y,
                x2: end.x,
                y2: end.y,
                tier: assignment.tier,
                tier_source: assignment.source,
                tier_size: assignment.cell_size,
                tier_buffer: assignment.influence,
                is_sealing: fault.is_sealing,
                transmissibility_multiplier: fault.transmissibility_multiplier,
            });
        }

        log::info!("Extracted {} fault segments", segments.len());
        Ok(segments)
    }
}
