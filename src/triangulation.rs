//! Incremental Delaunay triangulation (Bowyer–Watson)
//!
//! Points are inserted one at a time into an enclosing super-triangle. Each
//! insertion walks the adjacency graph to the triangle containing the point,
//! flood-fills the cavity of triangles whose circumcircle contains it and
//! re-triangulates the cavity as a fan around the new vertex. Input points
//! closer than a tolerance to an existing vertex are merged into it.
//!
//! The super-triangle is kept close to the input so circumcircles through its
//! vertices stay small enough for the in-circle tolerance to resolve points on
//! the hull. Its vertices lie farther from every input point than the input's
//! own bounding-box corners, so Delaunay edges through super-adjacent
//! triangles still join every pair of Voronoi neighbours.

use crate::error::{MeshError, MeshResult};
use nalgebra::Point2;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use std::collections::HashMap;

/// Super-triangle reach relative to the input bounding box
const SUPER_SCALE: f64 = 10.0;
/// Relative shrink of circumcircles so cocircular points are not in conflict
const INCIRCLE_EPS: f64 = 1e-12;
/// Number of super-triangle vertices stored ahead of the input vertices
const N_SUPER: usize = 3;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// A planar Delaunay triangulation of merged input points
#[derive(Debug, Clone)]
pub struct Triangulation {
    /// Unique vertices
    pub vertices: Vec<Point2<f64>>,
    /// Counter-clockwise triangles (indices into `vertices`)
    pub triangles: Vec<[usize; 3]>,
    /// Vertex index for each input point
    pub vertex_of_input: Vec<usize>,
    /// Input point that created each vertex
    pub input_of_vertex: Vec<usize>,
    /// Sorted Delaunay neighbors of every vertex
    neighbors: Vec<Vec<usize>>,
}

#[derive(Debug, Clone)]
struct Tri {
    v: [usize; 3],
    /// Neighbor across the edge opposite `v[i]`
    adj: [Option<usize>; 3],
    center: Point2<f64>,
    radius2: f64,
    alive: bool,
}

fn orient(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn circumcircle(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> (Point2<f64>, f64) {
    let ab = b - a;
    let ac = c - a;
    let d = 2.0 * (ab.x * ac.y - ab.y * ac.x);
    if d.abs() <= f64::MIN_POSITIVE {
        return (Point2::from((a.coords + b.coords + c.coords) / 3.0), f64::INFINITY);
    }
    let ab2 = ab.norm_squared();
    let ac2 = ac.norm_squared();
    let ux = (ac.y * ab2 - ab.y * ac2) / d;
    let uy = (ab.x * ac2 - ac.x * ab2) / d;
    (Point2::new(a.x + ux, a.y + uy), ux * ux + uy * uy)
}

struct Builder {
    points: Vec<Point2<f64>>,
    tris: Vec<Tri>,
    stamp: Vec<u32>,
    epoch: u32,
    last: usize,
}

impl Builder {
    fn new(super_vertices: [Point2<f64>; 3]) -> Self {
        let mut builder = Self {
            points: super_vertices.to_vec(),
            tris: Vec::new(),
            stamp: Vec::new(),
            epoch: 0,
            last: 0,
        };
        let tri = builder.make_tri([0, 1, 2], [None, None, None]);
        builder.tris.push(tri);
        builder.stamp.push(0);
        builder
    }

    fn make_tri(&self, v: [usize; 3], adj: [Option<usize>; 3]) -> Tri {
        let (center, radius2) = circumcircle(&self.points[v[0]], &self.points[v[1]], &self.points[v[2]]);
        Tri {
            v,
            adj,
            center,
            radius2,
            alive: true,
        }
    }

    fn in_circle(&self, t: usize, p: &Point2<f64>) -> bool {
        let tri = &self.tris[t];
        (p - tri.center).norm_squared() < tri.radius2 * (1.0 - INCIRCLE_EPS)
    }

    fn contains(&self, t: usize, p: &Point2<f64>) -> bool {
        let v = self.tris[t].v;
        (0..3).all(|i| orient(&self.points[v[(i + 1) % 3]], &self.points[v[(i + 2) % 3]], p) >= 0.0)
    }

    /// Visibility walk from the last created triangle
    fn locate(&self, p: &Point2<f64>) -> Option<usize> {
        let mut t = self.last;
        let max_steps = 4 * self.tris.len() + 16;
        for _ in 0..max_steps {
            let tri = &self.tris[t];
            let next = (0..3).find_map(|i| {
                let a = &self.points[tri.v[(i + 1) % 3]];
                let b = &self.points[tri.v[(i + 2) % 3]];
                if orient(a, b, p) < 0.0 {
                    tri.adj[i]
                } else {
                    None
                }
            });
            match next {
                Some(n) => t = n,
                None => return Some(t),
            }
        }

        log::debug!("Point location walk did not converge; scanning triangles");
        (0..self.tris.len())
            .filter(|&t| self.tris[t].alive)
            .find(|&t| self.contains(t, p))
            .or_else(|| (0..self.tris.len()).find(|&t| self.tris[t].alive && self.in_circle(t, p)))
    }

    /// Cavity boundary as (a, b, outer) with a -> b counter-clockwise
    fn cavity_boundary(&self, cavity: &[usize], epoch: u32) -> Vec<(usize, usize, Option<usize>)> {
        let mut boundary = Vec::with_capacity(cavity.len() + 2);
        for &t in cavity {
            let tri = &self.tris[t];
            for i in 0..3 {
                let outer = tri.adj[i];
                if outer.map_or(true, |o| self.stamp[o] != epoch) {
                    boundary.push((tri.v[(i + 1) % 3], tri.v[(i + 2) % 3], outer));
                }
            }
        }
        boundary
    }

    fn insert(&mut self, p: Point2<f64>) -> MeshResult<usize> {
        let start = self
            .locate(&p)
            .ok_or_else(|| MeshError::geometry_error(format!("point ({}, {}) lies outside the triangulation", p.x, p.y)))?;

        let idx = self.points.len();
        self.points.push(p);

        self.epoch += 1;
        let epoch = self.epoch;
        self.stamp[start] = epoch;
        let mut cavity = vec![start];
        let mut stack = vec![start];
        while let Some(t) = stack.pop() {
            for n in self.tris[t].adj.into_iter().flatten() {
                if self.stamp[n] != epoch && self.in_circle(n, &p) {
                    self.stamp[n] = epoch;
                    cavity.push(n);
                    stack.push(n);
                }
            }
        }

        // The fan is only valid if every boundary edge sees the new point on
        // its left; grow the cavity across any edge that does not.
        let boundary = loop {
            let boundary = self.cavity_boundary(&cavity, epoch);
            let hidden = boundary
                .iter()
                .copied()
                .find(|&(a, b, _)| orient(&self.points[a], &self.points[b], &p) <= 0.0);
            match hidden {
                None => break boundary,
                Some((_, _, Some(o))) => {
                    self.stamp[o] = epoch;
                    cavity.push(o);
                }
                Some((a, b, None)) => {
                    return Err(MeshError::geometry_error(format!(
                        "point ({}, {}) is collinear with hull edge {a}-{b}",
                        p.x, p.y
                    )));
                }
            }
        };

        let mut slots = cavity.clone();
        for &t in &cavity {
            self.tris[t].alive = false;
        }
        while slots.len() < boundary.len() {
            slots.push(self.tris.len());
            let placeholder = self.make_tri([0, 1, 2], [None, None, None]);
            self.tris.push(placeholder);
            self.stamp.push(0);
        }

        let mut by_start = HashMap::with_capacity(boundary.len());
        let mut by_end = HashMap::with_capacity(boundary.len());
        for (k, &(a, b, _)) in boundary.iter().enumerate() {
            by_start.insert(a, slots[k]);
            by_end.insert(b, slots[k]);
        }

        for (k, &(a, b, outer)) in boundary.iter().enumerate() {
            let slot = slots[k];
            let adj = [by_start.get(&b).copied(), by_end.get(&a).copied(), outer];
            let tri = self.make_tri([a, b, idx], adj);
            self.tris[slot] = tri;

            if let Some(o) = outer {
                let ov = self.tris[o].v;
                if let Some(i) = (0..3).find(|&i| ov[(i + 1) % 3] == b && ov[(i + 2) % 3] == a) {
                    self.tris[o].adj[i] = Some(slot);
                }
            }
        }

        for &slot in &slots[boundary.len()..] {
            self.tris[slot].alive = false;
        }
        self.last = slots[boundary.len().saturating_sub(1)];
        Ok(idx)
    }
}

impl Triangulation {
    /// Triangulate `points`, merging points within `duplicate_tolerance`
    pub fn build(points: &[Point2<f64>], duplicate_tolerance: f64) -> MeshResult<Self> {
        if points.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(MeshError::invalid_input("triangulation input contains non-finite coordinates"));
        }

        let tol2 = duplicate_tolerance.max(0.0).powi(2);
        let mut index: RTree<IndexedPoint> = RTree::new();
        let mut unique: Vec<Point2<f64>> = Vec::new();
        let mut input_of_vertex = Vec::new();
        let mut vertex_of_input = Vec::with_capacity(points.len());

        for (i, p) in points.iter().enumerate() {
            let key = [p.x, p.y];
            let existing = index
                .nearest_neighbor(&key)
                .filter(|hit| {
                    let q = hit.geom();
                    (q[0] - p.x).powi(2) + (q[1] - p.y).powi(2) <= tol2
                })
                .map(|hit| hit.data);

            match existing {
                Some(v) => {
                    log::debug!("Merged input point {i} ({}, {}) into vertex {v}", p.x, p.y);
                    vertex_of_input.push(v);
                }
                None => {
                    let v = unique.len();
                    index.insert(IndexedPoint::new(key, v));
                    unique.push(*p);
                    input_of_vertex.push(i);
                    vertex_of_input.push(v);
                }
            }
        }

        Self::check_spread(&unique)?;

        let (min, max) = bounds(&unique);
        let span = (max.x - min.x).max(max.y - min.y).max(1.0);
        let mid = Point2::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0);
        let reach = SUPER_SCALE * span;
        let mut builder = Builder::new([
            Point2::new(mid.x - reach, mid.y - reach),
            Point2::new(mid.x + reach, mid.y - reach),
            Point2::new(mid.x, mid.y + reach),
        ]);

        for p in &unique {
            builder.insert(*p)?;
        }

        let alive: Vec<&Tri> = builder.tris.iter().filter(|t| t.alive).collect();
        let triangles: Vec<[usize; 3]> = alive
            .iter()
            .filter(|t| t.v.iter().all(|&v| v >= N_SUPER))
            .map(|t| [t.v[0] - N_SUPER, t.v[1] - N_SUPER, t.v[2] - N_SUPER])
            .collect();

        if triangles.is_empty() {
            return Err(MeshError::geometry_error("triangulation produced no triangles"));
        }

        let mut neighbors = vec![Vec::new(); unique.len()];
        for t in &alive {
            for i in 0..3 {
                let (a, b) = (t.v[i], t.v[(i + 1) % 3]);
                if a >= N_SUPER && b >= N_SUPER {
                    neighbors[a - N_SUPER].push(b - N_SUPER);
                    neighbors[b - N_SUPER].push(a - N_SUPER);
                }
            }
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }
        if let Some(v) = neighbors.iter().position(|list| list.len() < 2) {
            return Err(MeshError::geometry_error(format!(
                "vertex {v} at ({}, {}) has {} Delaunay neighbours",
                unique[v].x,
                unique[v].y,
                neighbors[v].len()
            )));
        }

        log::info!(
            "Triangulated {} vertices ({} merged) into {} triangles",
            unique.len(),
            points.len() - unique.len(),
            triangles.len()
        );

        Ok(Self {
            vertices: unique,
            triangles,
            vertex_of_input,
            input_of_vertex,
            neighbors,
        })
    }

    fn check_spread(vertices: &[Point2<f64>]) -> MeshResult<()> {
        if vertices.len() < 3 {
            return Err(MeshError::geometry_error(format!(
                "triangulation needs at least 3 distinct points, got {}",
                vertices.len()
            )));
        }
        let origin = vertices[0];
        let far = vertices
            .iter()
            .copied()
            .max_by(|a, b| (a - origin).norm_squared().total_cmp(&(b - origin).norm_squared()))
            .unwrap_or(origin);
        let base = (far - origin).norm();
        let offset = vertices
            .iter()
            .map(|p| orient(&origin, &far, p).abs() / base.max(f64::MIN_POSITIVE))
            .fold(0.0, f64::max);
        if base <= 0.0 || offset <= 1e-9 * base {
            return Err(MeshError::geometry_error("triangulation input points are collinear"));
        }
        Ok(())
    }

    /// Sorted, de-duplicated Delaunay neighbors of every vertex
    #[must_use]
    pub fn vertex_neighbors(&self) -> &[Vec<usize>] {
        &self.neighbors
    }

    /// Signed area of triangle `t`
    #[must_use]
    pub fn triangle_area(&self, t: usize) -> f64 {
        let [a, b, c] = self.triangles[t];
        orient(&self.vertices[a], &self.vertices[b], &self.vertices[c]) / 2.0
    }
}

fn bounds(points: &[Point2<f64>]) -> (Point2<f64>, Point2<f64>) {
    let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (min, max)
}
