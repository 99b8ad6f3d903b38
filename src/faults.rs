//! Fault property mapping onto PEBI faces
//!
//! A face belongs to a fault when its centroid lies within the alignment
//! tolerance of the fault trace. The claimed face carries the fault's
//! transmissibility multiplier.

use crate::config::{FaultConflictPolicy, MeshingConfig};
use crate::geometry::FaultSegment;
use crate::mesh::{FaultProperties, PebiMesh};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Faces claimed by one fault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultFaceMap {
    /// Position of the fault in configured order
    pub fault_index: usize,
    pub fault_name: String,
    pub transmissibility_multiplier: f64,
    /// Face indices in ascending order
    pub faces: Vec<usize>,
}

impl FaultFaceMap {
    #[must_use]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Assigns fault properties to the faces of a planar mesh
pub struct FaultMapper<'a> {
    segments: &'a [FaultSegment],
    tolerance: f64,
    policy: FaultConflictPolicy,
}

impl<'a> FaultMapper<'a> {
    #[must_use]
    pub const fn new(segments: &'a [FaultSegment], meshing: &MeshingConfig) -> Self {
        Self {
            segments,
            tolerance: meshing.alignment_tolerance,
            policy: meshing.fault_conflict,
        }
    }

    /// Fault claiming a face with the given centroid, if any
    fn claim(&self, centroid: &nalgebra::Point2<f64>) -> Option<usize> {
        let within = self
            .segments
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.distance_to(centroid)))
            .filter(|&(_, d)| d <= self.tolerance);

        match self.policy {
            FaultConflictPolicy::LastWins => within.last().map(|(i, _)| i),
            FaultConflictPolicy::NearestWins => within
                .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                    Some((_, bd)) if bd <= d => best,
                    _ => Some((i, d)),
                })
                .map(|(i, _)| i),
        }
    }

    /// Mark fault faces in place and return the faces each fault claimed
    pub fn map(&self, mesh: &mut PebiMesh) -> Vec<FaultFaceMap> {
        let claims: Vec<Option<usize>> = mesh.faces.par_iter().map(|f| self.claim(&f.centroid)).collect();

        let mut maps: Vec<FaultFaceMap> = self
            .segments
            .iter()
            .enumerate()
            .map(|(i, s)| FaultFaceMap {
                fault_index: i,
                fault_name: s.name.clone(),
                transmissibility_multiplier: s.transmissibility_multiplier,
                faces: Vec::new(),
            })
            .collect();

        for (face_id, (face, claim)) in mesh.faces.iter_mut().zip(claims).enumerate() {
            let Some(fault) = claim else {
                face.fault = FaultProperties::default();
                continue;
            };
            face.fault = FaultProperties {
                is_fault: true,
                fault_multiplier: self.segments[fault].transmissibility_multiplier,
                fault_index: Some(fault),
            };
            maps[fault].faces.push(face_id);
        }

        for map in &maps {
            if map.is_empty() {
                log::warn!(
                    "Fault '{}' claimed no faces within {} m; check its trace or meshing.alignment_tolerance",
                    map.fault_name,
                    self.tolerance
                );
            } else {
                log::info!("Fault '{}' mapped to {} faces", map.fault_name, map.len());
            }
        }
        maps
    }
}
