//! Constrained point distribution
//!
//! Generator points are emitted in a fixed order for traceability: wells,
//! then fault traces, then the background lattice. All points are clamped to
//! the field rectangle.

use crate::geometry::{FaultSegment, WellConstraint};
use crate::sizing::SizeFunction;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Origin of a generator point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "index")]
pub enum PointSource {
    /// Exact well location (index into the well constraints)
    Well(usize),
    /// Sample on a fault trace (index into the fault segments)
    FaultTrace(usize),
    /// Background lattice node
    Lattice,
}

impl PointSource {
    const fn rank(self) -> u8 {
        match self {
            Self::Well(_) => 0,
            Self::FaultTrace(_) => 1,
            Self::Lattice => 2,
        }
    }

    /// Whether two sources are of the same kind, ignoring the index
    #[must_use]
    pub const fn same_kind(self, other: Self) -> bool {
        self.rank() == other.rank()
    }
}

/// Ordered generator points with their sources
#[derive(Debug, Clone, Default)]
pub struct PointSet {
    pub points: Vec<Point2<f64>>,
    pub sources: Vec<PointSource>,
}

impl PointSet {
    fn push(&mut self, point: Point2<f64>, source: PointSource) {
        self.points.push(point);
        self.sources.push(source);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points of the same kind as `source`
    #[must_use]
    pub fn count(&self, source: PointSource) -> usize {
        self.sources.iter().filter(|s| s.same_kind(source)).count()
    }
}

/// Number of samples along a fault trace, endpoints included
#[must_use]
pub fn fault_sample_count(length: f64, tier_size: f64) -> usize {
    let n = (length / tier_size).ceil();
    if n.is_finite() && n > 3.0 {
        n as usize
    } else {
        3
    }
}

/// Lattice coordinates along one axis: `i * spacing`, the last clamped to `extent`
#[must_use]
pub fn lattice_axis(extent: f64, spacing: f64) -> Vec<f64> {
    let n = (extent / spacing).ceil() as usize + 1;
    (0..n).map(|i| (i as f64 * spacing).min(extent)).collect()
}

/// Builds the generator point set
pub struct PointDistributor<'a> {
    size_function: &'a SizeFunction,
}

impl<'a> PointDistributor<'a> {
    #[must_use]
    pub const fn new(size_function: &'a SizeFunction) -> Self {
        Self { size_function }
    }

    fn clamp(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(
            p.x.clamp(0.0, self.size_function.domain_extent_x),
            p.y.clamp(0.0, self.size_function.domain_extent_y),
        )
    }

    /// Number of background lattice nodes `generate` would emit.
    ///
    /// Computed in floating point so oversized fields can be rejected before
    /// anything is allocated.
    #[must_use]
    pub fn lattice_node_count(&self) -> f64 {
        let spacing = self.size_function.background_spacing();
        let per_axis = |extent: f64| (extent / spacing).ceil() + 1.0;
        per_axis(self.size_function.domain_extent_x) * per_axis(self.size_function.domain_extent_y)
    }

    /// Generate wells, fault traces and lattice, in that order
    #[must_use]
    pub fn generate(&self) -> PointSet {
        let mut set = PointSet::default();
        self.add_wells(&self.size_function.well_constraints, &mut set);
        self.add_fault_traces(&self.size_function.fault_segments, &mut set);
        self.add_lattice(&mut set);

        log::info!(
            "Generated {} points ({} well, {} fault trace, {} lattice)",
            set.len(),
            set.count(PointSource::Well(0)),
            set.count(PointSource::FaultTrace(0)),
            set.count(PointSource::Lattice)
        );
        set
    }

    fn add_wells(&self, wells: &[WellConstraint], set: &mut PointSet) {
        for (i, well) in wells.iter().enumerate() {
            set.push(self.clamp(well.position()), PointSource::Well(i));
        }
    }

    fn add_fault_traces(&self, faults: &[FaultSegment], set: &mut PointSet) {
        for (i, fault) in faults.iter().enumerate() {
            let n = fault_sample_count(fault.length(), fault.tier_size);
            let start = fault.start();
            let step = fault.end() - start;
            for k in 0..n {
                let t = k as f64 / (n - 1) as f64;
                set.push(self.clamp(start + step * t), PointSource::FaultTrace(i));
            }
        }
    }

    fn add_lattice(&self, set: &mut PointSet) {
        let spacing = self.size_function.background_spacing();
        let xs = lattice_axis(self.size_function.domain_extent_x, spacing);
        let ys = lattice_axis(self.size_function.domain_extent_y, spacing);
        for &y in &ys {
            for &x in &xs {
                set.push(Point2::new(x, y), PointSource::Lattice);
            }
        }
    }
}
