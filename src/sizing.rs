//! Distance-weighted target cell size
//!
//! Every well and fault pulls the local size down toward its tier size with a
//! linear ramp that reaches the background size at the edge of its influence
//! radius (wells) or buffer (faults). The smallest contribution wins.

use crate::error::{MeshError, MeshResult};
use crate::geometry::{FaultSegment, WellConstraint};
use nalgebra::Point2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Size function over the field surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeFunction {
    pub well_constraints: Vec<WellConstraint>,
    pub fault_segments: Vec<FaultSegment>,
    pub background_size: f64,
    pub domain_extent_x: f64,
    pub domain_extent_y: f64,
}

/// Linear ramp from `tier_size` at zero distance to `background` at `reach`
fn ramp(distance: f64, tier_size: f64, reach: f64, background: f64) -> Option<f64> {
    if distance > reach {
        return None;
    }
    if reach <= 0.0 {
        return Some(tier_size);
    }
    let t = distance / reach;
    Some(tier_size + (background - tier_size) * t)
}

impl SizeFunction {
    /// Build a size function
    pub fn new(
        well_constraints: Vec<WellConstraint>,
        fault_segments: Vec<FaultSegment>,
        background_size: f64,
        domain_extent_x: f64,
        domain_extent_y: f64,
    ) -> MeshResult<Self> {
        if !(background_size.is_finite() && background_size > 0.0) {
            return Err(MeshError::invalid_input(format!(
                "background size must be positive, got {background_size}"
            )));
        }
        if !(domain_extent_x > 0.0 && domain_extent_y > 0.0) {
            return Err(MeshError::configuration(
                format!("positive domain extents (got {domain_extent_x} x {domain_extent_y})"),
                "field.extent_x/field.extent_y",
            ));
        }
        for well in &well_constraints {
            if well.tier_size > background_size {
                log::warn!(
                    "Well '{}' tier size {} exceeds background size {background_size}; it will not refine",
                    well.name,
                    well.tier_size
                );
            }
        }

        Ok(Self {
            well_constraints,
            fault_segments,
            background_size,
            domain_extent_x,
            domain_extent_y,
        })
    }

    /// Target cell size at `point`
    #[must_use]
    pub fn eval(&self, point: &Point2<f64>) -> f64 {
        let background = self.background_size;

        let well_min = self
            .well_constraints
            .iter()
            .filter_map(|w| {
                let d = (point - w.position()).norm();
                ramp(d, w.tier_size, w.tier_radius, background)
            })
            .fold(background, f64::min);

        self.fault_segments
            .iter()
            .filter_map(|f| ramp(f.distance_to(point), f.tier_size, f.tier_buffer, background))
            .fold(well_min, f64::min)
    }

    /// Evaluate many points in parallel; output order matches input order
    #[must_use]
    pub fn eval_many(&self, points: &[Point2<f64>]) -> Vec<f64> {
        points.par_iter().map(|p| self.eval(p)).collect()
    }

    /// Spacing of the background lattice
    #[must_use]
    pub const fn background_spacing(&self) -> f64 {
        self.background_size
    }
}
