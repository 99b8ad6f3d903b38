//! PEBI mesh representation and construction
//!
//! The planar mesh is the Voronoi dual of a Delaunay triangulation, clipped
//! to the field rectangle. Each cell is the field rectangle cut by the
//! perpendicular-bisector half-planes of its Delaunay neighbors, so every
//! internal face lies on the bisector of the two generators it separates.
//! That is the property two-point flux approximations rely on. Each clipped
//! cell is then checked against the nearest generator of every corner and
//! cut further if another generator is closer, so a missing Delaunay edge
//! can never leave two cells overlapping.
//!
//! The layered 3D mesh produced by [`crate::extrusion`] is also defined here,
//! together with the index remapping used when cells are pruned.

use crate::error::{MeshError, MeshResult};
use crate::faults::FaultFaceMap;
use crate::points::{PointSet, PointSource};
use crate::triangulation::Triangulation;
use nalgebra::{Point2, Point3, Vector2, Vector3};
use rayon::prelude::*;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Allowed relative mismatch between the summed cell areas and the field area
const AREA_TOLERANCE: f64 = 1e-6;

/// Side of the mesh a boundary face lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundarySide {
    South,
    East,
    North,
    West,
    Top,
    Bottom,
    /// Exposed inside the field by removing a degenerate cell
    Pruned,
}

/// What lies on the other side of a face from its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum FaceNeighbor {
    Cell(usize),
    Boundary(BoundarySide),
}

impl FaceNeighbor {
    /// Neighbor cell, if the face is internal
    #[must_use]
    pub const fn cell(self) -> Option<usize> {
        match self {
            Self::Cell(c) => Some(c),
            Self::Boundary(_) => None,
        }
    }

    #[must_use]
    pub const fn is_boundary(self) -> bool {
        matches!(self, Self::Boundary(_))
    }
}

/// Fault annotation carried by every face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultProperties {
    pub is_fault: bool,
    /// Transmissibility multiplier; 1.0 means no restriction
    pub fault_multiplier: f64,
    /// Index of the fault segment that claimed the face
    pub fault_index: Option<usize>,
}

impl Default for FaultProperties {
    fn default() -> Self {
        Self {
            is_fault: false,
            fault_multiplier: 1.0,
            fault_index: None,
        }
    }
}

/// A planar PEBI cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PebiCell {
    /// Generating point
    pub generator: Point2<f64>,
    /// Which constraint produced the generator
    pub source: PointSource,
    /// Counter-clockwise node ring
    pub nodes: Vec<usize>,
    pub area: f64,
    pub centroid: Point2<f64>,
}

/// A planar PEBI face (an edge of the cell polygons)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PebiFace {
    pub nodes: [usize; 2],
    pub owner: usize,
    pub neighbor: FaceNeighbor,
    pub centroid: Point2<f64>,
    pub length: f64,
    /// Unit normal pointing away from the owner
    pub normal: Vector2<f64>,
    pub fault: FaultProperties,
}

/// Planar PEBI mesh over the field rectangle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PebiMesh {
    pub nodes: Vec<Point2<f64>>,
    pub cells: Vec<PebiCell>,
    pub faces: Vec<PebiFace>,
    pub extent_x: f64,
    pub extent_y: f64,
    /// Number of Delaunay triangles the dual was built from
    pub triangle_count: usize,
}

impl PebiMesh {
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Sum of cell areas
    #[must_use]
    pub fn total_area(&self) -> f64 {
        self.cells.iter().map(|c| c.area).sum()
    }
}

/// Which constraint bounds a polygon edge during clipping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeLabel {
    Neighbor(usize),
    Side(BoundarySide),
}

/// Polygon as (vertex, label of the edge leaving that vertex)
type LabeledPolygon = Vec<(Point2<f64>, EdgeLabel)>;

type IndexedNode = GeomWithData<[f64; 2], usize>;

fn rectangle(extent_x: f64, extent_y: f64) -> LabeledPolygon {
    vec![
        (Point2::new(0.0, 0.0), EdgeLabel::Side(BoundarySide::South)),
        (Point2::new(extent_x, 0.0), EdgeLabel::Side(BoundarySide::East)),
        (Point2::new(extent_x, extent_y), EdgeLabel::Side(BoundarySide::North)),
        (Point2::new(0.0, extent_y), EdgeLabel::Side(BoundarySide::West)),
    ]
}

/// Keep the part of `polygon` closer to `p` than to `q`
fn clip_bisector(polygon: &LabeledPolygon, p: &Point2<f64>, q: &Point2<f64>, label: EdgeLabel) -> LabeledPolygon {
    let n = q - p;
    let mid = Point2::from((p.coords + q.coords) / 2.0);
    let tol = 1e-12 * n.norm_squared();
    let side = |x: &Point2<f64>| (x - mid).dot(&n);

    if polygon.iter().all(|(x, _)| side(x) <= tol) {
        return polygon.clone();
    }

    let len = polygon.len();
    let mut out = Vec::with_capacity(len + 1);
    for i in 0..len {
        let (cur, cur_label) = polygon[i];
        let next = polygon[(i + 1) % len].0;
        let sc = side(&cur);
        let sn = side(&next);
        let crossing = || cur + (next - cur) * (sc / (sc - sn));
        match (sc <= tol, sn <= tol) {
            (true, true) => out.push((cur, cur_label)),
            (true, false) => {
                out.push((cur, cur_label));
                out.push((crossing(), label));
            }
            (false, true) => out.push((crossing(), cur_label)),
            (false, false) => {}
        }
    }
    out
}

/// Drop vertices that coincide with their successor
fn drop_short_edges(polygon: &mut LabeledPolygon, eps: f64) {
    let mut i = 0;
    while polygon.len() > 1 && i < polygon.len() {
        let next = (i + 1) % polygon.len();
        if (polygon[next].0 - polygon[i].0).norm() <= eps {
            polygon.remove(i);
        } else {
            i += 1;
        }
    }
}

/// Cut `polygon` until no corner is closer to another generator than to `site`.
///
/// Returns the number of extra cuts.
fn enforce_nearest(polygon: &mut LabeledPolygon, p: usize, site: &Point2<f64>, sites: &RTree<IndexedNode>) -> usize {
    let mut cuts = 0;
    // Every cut removes a corner region owned by a distinct generator.
    for _ in 0..sites.size() {
        let intruder = polygon.iter().find_map(|(x, _)| {
            let hit = sites.nearest_neighbor(&[x.x, x.y])?;
            let own = (x - site).norm_squared();
            let g = hit.geom();
            let other = (g[0] - x.x).powi(2) + (g[1] - x.y).powi(2);
            (hit.data != p && other < own * (1.0 - 1e-9)).then(|| (hit.data, Point2::new(g[0], g[1])))
        });
        let Some((q, g)) = intruder else {
            break;
        };
        *polygon = clip_bisector(polygon, site, &g, EdgeLabel::Neighbor(q));
        cuts += 1;
        if polygon.is_empty() {
            break;
        }
    }
    cuts
}

/// Shoelace area and centroid of a closed ring
#[must_use]
pub fn polygon_area_centroid(ring: &[Point2<f64>]) -> (f64, Point2<f64>) {
    let n = ring.len();
    if n < 3 {
        return (0.0, ring.first().copied().unwrap_or_else(Point2::origin));
    }
    let origin = ring[0];
    let mut area2 = 0.0;
    let mut acc = Vector2::zeros();
    for i in 0..n {
        let a = ring[i] - origin;
        let b = ring[(i + 1) % n] - origin;
        let cross = a.x * b.y - b.x * a.y;
        area2 += cross;
        acc += (a + b) * cross;
    }
    if area2.abs() <= f64::MIN_POSITIVE {
        let mean = ring.iter().fold(Vector2::zeros(), |s, p| s + p.coords) / n as f64;
        return (0.0, Point2::from(mean));
    }
    (area2 / 2.0, origin + acc / (3.0 * area2))
}

/// Builds a planar PEBI mesh from a point set
pub struct MeshBuilder {
    extent_x: f64,
    extent_y: f64,
    duplicate_tolerance: f64,
}

impl MeshBuilder {
    /// Create a builder for the field rectangle `[0, extent_x] x [0, extent_y]`
    #[must_use]
    pub const fn new(extent_x: f64, extent_y: f64) -> Self {
        Self {
            extent_x,
            extent_y,
            duplicate_tolerance: crate::defaults::DEFAULT_DUPLICATE_TOLERANCE,
        }
    }

    /// Set the merge distance for coincident input points
    #[must_use]
    pub const fn with_duplicate_tolerance(mut self, tolerance: f64) -> Self {
        self.duplicate_tolerance = tolerance;
        self
    }

    fn weld_tolerance(&self) -> f64 {
        1e-9 * self.extent_x.max(self.extent_y)
    }

    /// Triangulate the points and build the dual mesh
    pub fn build(&self, points: &PointSet) -> MeshResult<PebiMesh> {
        let triangulation = Triangulation::build(&points.points, self.duplicate_tolerance)?;
        self.build_dual(&triangulation, points)
    }

    /// Build the dual of an existing triangulation of `points`
    pub fn build_dual(&self, triangulation: &Triangulation, points: &PointSet) -> MeshResult<PebiMesh> {
        let neighbors = triangulation.vertex_neighbors();
        let generators = &triangulation.vertices;
        let weld = self.weld_tolerance();
        let sites: RTree<IndexedNode> = RTree::bulk_load(
            generators
                .iter()
                .enumerate()
                .map(|(i, g)| IndexedNode::new([g.x, g.y], i))
                .collect(),
        );

        let clipped: Vec<(LabeledPolygon, usize)> = generators
            .par_iter()
            .enumerate()
            .map(|(p, site)| {
                let mut near = neighbors[p].clone();
                near.sort_by(|&a, &b| {
                    (generators[a] - *site)
                        .norm_squared()
                        .total_cmp(&(generators[b] - *site).norm_squared())
                });
                let mut polygon = rectangle(self.extent_x, self.extent_y);
                for q in near {
                    polygon = clip_bisector(&polygon, site, &generators[q], EdgeLabel::Neighbor(q));
                    if polygon.is_empty() {
                        break;
                    }
                }
                let cuts = enforce_nearest(&mut polygon, p, site, &sites);
                drop_short_edges(&mut polygon, weld);
                (polygon, cuts)
            })
            .collect();

        let extra_cuts: usize = clipped.iter().map(|(_, cuts)| cuts).sum();
        if extra_cuts > 0 {
            log::warn!("{extra_cuts} bisector cuts were missing from the Delaunay neighbourhoods and were added");
        }
        let polygons: Vec<LabeledPolygon> = clipped.into_iter().map(|(polygon, _)| polygon).collect();

        let mut node_index: RTree<IndexedNode> = RTree::new();
        let mut nodes: Vec<Point2<f64>> = Vec::new();
        let mut weld_node = |x: Point2<f64>| -> usize {
            let key = [x.x, x.y];
            if let Some(hit) = node_index.nearest_neighbor(&key) {
                let g = hit.geom();
                if (g[0] - x.x).hypot(g[1] - x.y) <= weld {
                    return hit.data;
                }
            }
            let id = nodes.len();
            node_index.insert(IndexedNode::new(key, id));
            nodes.push(x);
            id
        };

        let mut cells = Vec::with_capacity(generators.len());
        let mut rings: Vec<Vec<(usize, EdgeLabel)>> = Vec::with_capacity(generators.len());
        for (p, polygon) in polygons.iter().enumerate() {
            let mut ring: Vec<(usize, EdgeLabel)> = polygon.iter().map(|(x, l)| (weld_node(*x), *l)).collect();
            ring.dedup_by(|later, earlier| {
                let same = later.0 == earlier.0;
                if same {
                    earlier.1 = later.1;
                }
                same
            });
            if ring.len() > 1 && ring[0].0 == ring[ring.len() - 1].0 {
                ring.pop();
            }

            let coords: Vec<Point2<f64>> = polygon.iter().map(|(x, _)| *x).collect();
            let (area, centroid) = polygon_area_centroid(&coords);
            if !(area > 0.0) || ring.len() < 3 {
                return Err(MeshError::geometry_error(format!(
                    "PEBI cell {p} at ({:.3}, {:.3}) has non-positive area {area:e}; \
                     input points are likely near-coincident",
                    generators[p].x, generators[p].y
                )));
            }

            let source = points
                .sources
                .get(triangulation.input_of_vertex[p])
                .copied()
                .unwrap_or(PointSource::Lattice);
            cells.push(PebiCell {
                generator: generators[p],
                source,
                nodes: ring.iter().map(|(n, _)| *n).collect(),
                area,
                centroid,
            });
            rings.push(ring);
        }

        let field_area = self.extent_x * self.extent_y;
        let covered: f64 = cells.iter().map(|c| c.area).sum();
        if (covered - field_area).abs() > AREA_TOLERANCE * field_area {
            return Err(MeshError::geometry_error(format!(
                "PEBI cells cover {covered:.6e} m2 of a {field_area:.6e} m2 field; cells overlap or leave gaps"
            )));
        }

        let mut faces = Vec::new();
        let mut internal: HashMap<(usize, usize), usize> = HashMap::new();
        for (p, ring) in rings.iter().enumerate() {
            let len = ring.len();
            for i in 0..len {
                let (a, label) = ring[i];
                let b = ring[(i + 1) % len].0;
                if a == b {
                    continue;
                }
                let neighbor = match label {
                    EdgeLabel::Neighbor(q) => {
                        let key = (p.min(q), p.max(q));
                        if internal.contains_key(&key) {
                            continue;
                        }
                        internal.insert(key, faces.len());
                        FaceNeighbor::Cell(q)
                    }
                    EdgeLabel::Side(side) => FaceNeighbor::Boundary(side),
                };

                let (pa, pb) = (nodes[a], nodes[b]);
                let edge = pb - pa;
                let length = edge.norm();
                faces.push(PebiFace {
                    nodes: [a, b],
                    owner: p,
                    neighbor,
                    centroid: Point2::from((pa.coords + pb.coords) / 2.0),
                    length,
                    normal: Vector2::new(edge.y, -edge.x) / length,
                    fault: FaultProperties::default(),
                });
            }
        }

        let mesh = PebiMesh {
            nodes,
            cells,
            faces,
            extent_x: self.extent_x,
            extent_y: self.extent_y,
            triangle_count: triangulation.triangles.len(),
        };
        log::info!(
            "Built PEBI mesh: {} cells, {} faces, {} nodes (area {:.3e})",
            mesh.n_cells(),
            mesh.n_faces(),
            mesh.n_nodes(),
            mesh.total_area()
        );
        Ok(mesh)
    }
}

/// Stable old-to-new index mapping for pruned collections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRemap {
    new_index: Vec<Option<usize>>,
    kept: usize,
}

impl IndexRemap {
    /// Keep the indices in `0..len` for which `keep` holds, in order
    pub fn retain(len: usize, mut keep: impl FnMut(usize) -> bool) -> Self {
        let mut kept = 0;
        let new_index = (0..len)
            .map(|i| {
                keep(i).then(|| {
                    kept += 1;
                    kept - 1
                })
            })
            .collect();
        Self { new_index, kept }
    }

    /// New index of `old`, or `None` if it was removed
    #[must_use]
    pub fn get(&self, old: usize) -> Option<usize> {
        self.new_index.get(old).copied().flatten()
    }

    /// Number of surviving indices
    #[must_use]
    pub const fn kept(&self) -> usize {
        self.kept
    }

    /// Number of removed indices
    #[must_use]
    pub fn removed(&self) -> usize {
        self.new_index.len() - self.kept
    }
}

/// Orientation of a 3D face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceKind {
    /// Vertical face extruded from a planar PEBI face
    Lateral,
    /// Horizontal face between layers or on the top/base
    Horizontal,
}

/// A layered prism cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Planar cell the prism was extruded from
    pub column: usize,
    /// Layer index, 0 at the top
    pub layer: usize,
    pub volume: f64,
    pub centroid: Point3<f64>,
    /// Planar generator of the column
    pub generator: Point2<f64>,
}

/// A polygonal face of the layered mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub nodes: Vec<usize>,
    pub owner: usize,
    pub neighbor: FaceNeighbor,
    pub kind: FaceKind,
    pub centroid: Point3<f64>,
    pub area: f64,
    /// Unit normal pointing away from the owner
    pub normal: Vector3<f64>,
    pub fault: FaultProperties,
}

/// Depth interval and layering of the volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub top_depth: f64,
    pub base_depth: f64,
    pub n_layers: usize,
    pub thickness: f64,
}

/// Layered 3D reservoir mesh; node z is depth, positive downward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirMesh {
    pub nodes: Vec<Point3<f64>>,
    pub cells: Vec<Cell>,
    pub faces: Vec<Face>,
    pub layers: LayerInfo,
    /// Faces claimed by each fault
    pub fault_faces: Vec<FaultFaceMap>,
    pub extent_x: f64,
    pub extent_y: f64,
}

impl ReservoirMesh {
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Sum of cell volumes
    #[must_use]
    pub fn total_volume(&self) -> f64 {
        self.cells.iter().map(|c| c.volume).sum()
    }

    /// Volume of the field box the cells must fill
    #[must_use]
    pub fn domain_volume(&self) -> f64 {
        self.extent_x * self.extent_y * (self.layers.base_depth - self.layers.top_depth)
    }

    /// Shallowest and deepest node depth
    #[must_use]
    pub fn depth_range(&self) -> (f64, f64) {
        self.nodes
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), n| (lo.min(n.z), hi.max(n.z)))
    }

    /// Axis-aligned bounds
    #[must_use]
    pub fn bounds(&self) -> (Point3<f64>, Point3<f64>) {
        if self.nodes.is_empty() {
            return (Point3::origin(), Point3::origin());
        }
        let mut min = self.nodes[0];
        let mut max = self.nodes[0];
        for n in &self.nodes {
            min = min.inf(n);
            max = max.sup(n);
        }
        (min, max)
    }

    /// Faces marked as fault faces
    #[must_use]
    pub fn fault_face_count(&self) -> usize {
        self.faces.iter().filter(|f| f.fault.is_fault).count()
    }

    /// Remove the flagged cells and remap every reference to cell and face indices.
    ///
    /// A face that loses its owner or neighbor becomes a [`BoundarySide::Pruned`]
    /// face of the surviving cell; a face that loses both is dropped. Nodes are
    /// untouched.
    #[must_use]
    pub fn without_cells(&self, remove: &[bool]) -> (Self, IndexRemap) {
        let cell_map = IndexRemap::retain(self.cells.len(), |i| !remove.get(i).copied().unwrap_or(false));
        let cells = self
            .cells
            .iter()
            .enumerate()
            .filter(|(i, _)| cell_map.get(*i).is_some())
            .map(|(_, c)| c.clone())
            .collect();

        let mut faces = Vec::with_capacity(self.faces.len());
        let mut face_new_index = vec![None; self.faces.len()];
        for (i, face) in self.faces.iter().enumerate() {
            let owner = cell_map.get(face.owner);
            let neighbor = face.neighbor.cell().map(|c| cell_map.get(c));
            let pruned = FaceNeighbor::Boundary(BoundarySide::Pruned);
            let rewritten = match (owner, neighbor) {
                (Some(o), None) => Some((o, face.neighbor, face.normal)),
                (Some(o), Some(Some(n))) => Some((o, FaceNeighbor::Cell(n), face.normal)),
                (Some(o), Some(None)) => Some((o, pruned, face.normal)),
                (None, Some(Some(n))) => Some((n, pruned, -face.normal)),
                (None, _) => None,
            };
            if let Some((owner, neighbor, normal)) = rewritten {
                face_new_index[i] = Some(faces.len());
                faces.push(Face {
                    owner,
                    neighbor,
                    normal,
                    ..face.clone()
                });
            }
        }

        let fault_faces = self
            .fault_faces
            .iter()
            .map(|map| FaultFaceMap {
                faces: map.faces.iter().filter_map(|&f| face_new_index[f]).collect(),
                ..map.clone()
            })
            .collect();

        (
            Self {
                nodes: self.nodes.clone(),
                cells,
                faces,
                layers: self.layers,
                fault_faces,
                extent_x: self.extent_x,
                extent_y: self.extent_y,
            },
            cell_map,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn lattice(extent: f64, n: usize) -> PointSet {
        let mut set = PointSet::default();
        let step = extent / (n - 1) as f64;
        for j in 0..n {
            for i in 0..n {
                set.points.push(Point2::new(i as f64 * step, j as f64 * step));
                set.sources.push(PointSource::Lattice);
            }
        }
        set
    }

    #[test]
    fn test_polygon_area_centroid() {
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        let (area, c) = polygon_area_centroid(&square);
        assert_relative_eq!(area, 4.0);
        assert_relative_eq!(c.x, 1.0);
        assert_relative_eq!(c.y, 1.0);
    }

    #[test]
    fn test_lattice_dual_partitions_domain() {
        let mesh = MeshBuilder::new(1000.0, 1000.0).build(&lattice(1000.0, 5)).unwrap();
        assert_eq!(mesh.n_cells(), 25);
        assert_relative_eq!(mesh.total_area(), 1.0e6, max_relative = 1e-9);
        // Interior cells of a square lattice are squares of the lattice spacing.
        let center = mesh
            .cells
            .iter()
            .find(|c| (c.generator - Point2::new(500.0, 500.0)).norm() < 1e-9)
            .unwrap();
        assert_relative_eq!(center.area, 250.0 * 250.0, max_relative = 1e-9);
        // Corner cells are quarter squares.
        let corner = mesh.cells.iter().find(|c| c.generator.coords.norm() < 1e-9).unwrap();
        assert_relative_eq!(corner.area, 125.0 * 125.0, max_relative = 1e-9);
    }

    #[test]
    fn test_internal_faces_are_perpendicular_bisectors() {
        let mut set = lattice(900.0, 4);
        set.points.push(Point2::new(410.0, 380.0));
        set.sources.push(PointSource::Well(0));
        let mesh = MeshBuilder::new(900.0, 900.0).build(&set).unwrap();
        assert_relative_eq!(mesh.total_area(), 810_000.0, max_relative = 1e-9);

        for face in &mesh.faces {
            if let FaceNeighbor::Cell(q) = face.neighbor {
                let p = mesh.cells[face.owner].generator;
                let q = mesh.cells[q].generator;
                let joining = (q - p).normalize();
                assert_relative_eq!(joining.dot(&face.normal), 1.0, epsilon = 1e-9);
                let mid = Point2::from((p.coords + q.coords) / 2.0);
                // Face lies on the bisector.
                assert_relative_eq!((face.centroid - mid).dot(&joining), 0.0, epsilon = 1e-6);
            }
        }
        assert!(mesh.cells.iter().any(|c| c.source == PointSource::Well(0)));
    }

    #[test]
    fn test_boundary_faces_cover_perimeter() {
        let mesh = MeshBuilder::new(600.0, 300.0).build(&lattice_rect(600.0, 300.0, 4, 3)).unwrap();
        let perimeter: f64 = mesh
            .faces
            .iter()
            .filter(|f| f.neighbor.is_boundary())
            .map(|f| f.length)
            .sum();
        assert_relative_eq!(perimeter, 1800.0, max_relative = 1e-9);
    }

    fn lattice_rect(ex: f64, ey: f64, nx: usize, ny: usize) -> PointSet {
        let mut set = PointSet::default();
        for j in 0..ny {
            for i in 0..nx {
                set.points.push(Point2::new(
                    i as f64 * ex / (nx - 1) as f64,
                    j as f64 * ey / (ny - 1) as f64,
                ));
                set.sources.push(PointSource::Lattice);
            }
        }
        set
    }

    #[test]
    fn test_trace_on_field_edge_tiles_domain() {
        let mut set = PointSet::default();
        for k in 0..20 {
            set.points.push(Point2::new(0.0, 100.0 + 800.0 * f64::from(k) / 19.0));
            set.sources.push(PointSource::FaultTrace(0));
        }
        let lattice = lattice(1000.0, 6);
        set.points.extend(lattice.points);
        set.sources.extend(lattice.sources);

        let mesh = MeshBuilder::new(1000.0, 1000.0).build(&set).unwrap();
        assert_relative_eq!(mesh.total_area(), 1.0e6, max_relative = 1e-9);
        // No trace cell swallows the field.
        assert!(mesh.cells.iter().all(|c| c.area <= 200.0 * 200.0 * (1.0 + 1e-9)));
        let traced = mesh
            .cells
            .iter()
            .filter(|c| c.source == PointSource::FaultTrace(0))
            .count();
        assert_eq!(traced, 20);
    }

    #[test]
    fn test_missing_neighbor_cut_is_added() {
        let generators = [
            Point2::new(100.0, 100.0),
            Point2::new(300.0, 100.0),
            Point2::new(100.0, 300.0),
        ];
        let sites = RTree::bulk_load(
            generators
                .iter()
                .enumerate()
                .map(|(i, g)| IndexedNode::new([g.x, g.y], i))
                .collect(),
        );
        // Only the east neighbor is known; the north one must be found.
        let mut polygon = clip_bisector(
            &rectangle(400.0, 400.0),
            &generators[0],
            &generators[1],
            EdgeLabel::Neighbor(1),
        );
        let cuts = enforce_nearest(&mut polygon, 0, &generators[0], &sites);
        assert_eq!(cuts, 1);
        let ring: Vec<_> = polygon.iter().map(|(x, _)| *x).collect();
        let (area, _) = polygon_area_centroid(&ring);
        assert_relative_eq!(area, 200.0 * 200.0, max_relative = 1e-12);
        assert!(polygon.iter().any(|(_, l)| *l == EdgeLabel::Neighbor(2)));
    }

    #[test]
    fn test_pruned_faces_are_marked() {
        let planar = MeshBuilder::new(300.0, 300.0).build(&lattice(300.0, 4)).unwrap();
        let mesh = crate::extrusion::ExtrusionEngine::new(
            crate::extrusion::ExtrusionConfig::new().with_depths(0.0, 10.0).with_layers(1),
        )
        .extrude(&planar, &[])
        .unwrap()
        .mesh;
        let center = mesh
            .cells
            .iter()
            .position(|c| (c.generator - Point2::new(100.0, 100.0)).norm() < 1e-9)
            .unwrap();
        let mut remove = vec![false; mesh.n_cells()];
        remove[center] = true;

        let (pruned, remap) = mesh.without_cells(&remove);
        assert_eq!(remap.removed(), 1);
        let exposed: Vec<_> = pruned
            .faces
            .iter()
            .filter(|f| f.neighbor == FaceNeighbor::Boundary(BoundarySide::Pruned))
            .collect();
        // An interior lattice cell has four lateral neighbours.
        assert_eq!(exposed.len(), 4);
        for face in exposed {
            let away = face.centroid - pruned.cells[face.owner].centroid;
            assert!(away.dot(&face.normal) > 0.0);
        }
        assert_relative_eq!(pruned.extent_x, 300.0);
    }

    #[test]
    fn test_index_remap() {
        let remap = IndexRemap::retain(5, |i| i != 1 && i != 3);
        assert_eq!(remap.get(0), Some(0));
        assert_eq!(remap.get(1), None);
        assert_eq!(remap.get(2), Some(1));
        assert_eq!(remap.get(4), Some(2));
        assert_eq!(remap.get(9), None);
        assert_eq!(remap.kept(), 3);
        assert_eq!(remap.removed(), 2);
    }
}
