//! Advancing-front paving.
//!
//! Fills a polygon with triangles, front by front, from its boundary inward.
//!
//! # Algorithm
//!
//! 1. **Front tree.** The redistributed boundary is the root front. Each
//!    front is offset inward ([`offset_polygon`]); every resulting domain has
//!    its rings redistributed at the next depth, keeping corners, and becomes
//!    a child front if it is simple and lies strictly inside its parent.
//! 2. **Strips.** When a front has exactly one child whose rings correspond
//!    one-to-one with its own, each ring pair is lofted: a walk along both
//!    rings emits triangles, advancing on whichever ring yields the better
//!    minimum angle. Triangles below `min_angle` are rejected and the walk
//!    restarts from another pairing; the last attempt accepts any triangle
//!    with positive area.
//! 3. **Closure.** A front without children is closed by best-ear clipping
//!    or by a fan around its centroid, whichever has the better minimum
//!    angle.
//! 4. **Fallback.** Any other region (several children, a hole that merged
//!    with the outer ring, a failed strip) is triangulated with a constrained
//!    Delaunay triangulation of all its rings. If even that fails, the
//!    subtree is discarded and the front is closed as a leaf.
//!
//! With breaklines, hard points or seed points the paver runs in constrained
//! mode instead: the front points (or the seed points) are kept away from
//! the constraints and the whole point set is triangulated at once with the
//! boundary and breaklines as constraint edges.
//!
//! The first points of the result are the boundary rings in order, so
//! callers can address them by [`PaveResult::ring_starts`].

use std::collections::VecDeque;
use std::f64::consts::PI;

use nalgebra::Point2;

use super::clean::{clean_ring, is_simple, rings_intersect};
use super::offset::{offset_polygon, OffsetOptions};
use super::redistribute::{find_corners, redistribute_anchored, RedistributeOptions, SizeProfile};
use crate::diagnostics::{Diagnostic, IssueKind};
use crate::error::{MeshError, Result};
use crate::geometry::{
    cross, distance_to_segment, point_in_ring, ring_centroid, segment_intersection, signed_area,
    tolerance_from_extents, triangle_area, triangle_min_angle, Polygon,
};
use crate::mesh::{Cell, Mesh2d};
use crate::size::SizeFunction;
use crate::spatial::{PointIndex, SegmentIndex, SpatialIndex};
use crate::triangulate::{SpadeTriangulator, Triangulator};

/// Rings longer than this are closed by triangulation instead of ear clipping.
const MAX_EAR_RING: usize = 256;

/// Options for paving.
#[derive(Debug, Clone)]
pub struct PaveOptions {
    /// Minimum triangle angle (radians) accepted in strips (default: 15°).
    pub min_angle: f64,

    /// Maximum number of fronts in the tree (default: 200).
    pub max_fronts: usize,

    /// Alternate start pairings tried per strip (default: 3).
    pub retries: usize,

    /// Offsetting options.
    pub offset: OffsetOptions,

    /// Redistribution options for the rings of inner fronts.
    pub redistribute: RedistributeOptions,
}

impl Default for PaveOptions {
    fn default() -> Self {
        Self {
            min_angle: PI / 12.0,
            max_fronts: 200,
            retries: 3,
            offset: OffsetOptions::default(),
            redistribute: RedistributeOptions::default(),
        }
    }
}

impl PaveOptions {
    /// Set the minimum strip angle in radians.
    pub fn with_min_angle(mut self, angle: f64) -> Self {
        self.min_angle = angle.clamp(0.0, PI / 3.0);
        self
    }

    /// Set the maximum number of fronts.
    pub fn with_max_fronts(mut self, max_fronts: usize) -> Self {
        self.max_fronts = max_fronts.max(1);
        self
    }

    /// Set the number of strip retries.
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }
}

/// Interior features that force constrained paving.
#[derive(Debug, Clone, Default)]
pub struct PaveConstraints {
    /// Open polylines that must appear as mesh edges (already redistributed).
    pub breaklines: Vec<Vec<Point2<f64>>>,
    /// Points that must become mesh vertices.
    pub hard_points: Vec<Point2<f64>>,
    /// Interior points to use instead of generated fronts.
    pub seed_points: Vec<Point2<f64>>,
}

impl PaveConstraints {
    /// Whether there is nothing to constrain.
    pub fn is_empty(&self) -> bool {
        self.breaklines.is_empty() && self.hard_points.is_empty() && self.seed_points.is_empty()
    }
}

/// Result of paving a polygon.
#[derive(Debug, Clone)]
pub struct PaveResult {
    /// The triangle mesh. Boundary ring points come first.
    pub mesh: Mesh2d,
    /// Index of the first point of each boundary ring (outer, then holes).
    pub ring_starts: Vec<usize>,
    /// Number of boundary ring points.
    pub boundary_points: usize,
    /// Breakline and hard points, which must not move.
    pub fixed: Vec<usize>,
    /// Breakline edges as `(min, max)` pairs.
    pub locked_edges: Vec<(usize, usize)>,
    /// Number of fronts in the tree.
    pub fronts: usize,
    /// Recovered problems.
    pub diagnostics: Vec<Diagnostic>,
}

/// Pave a polygon whose rings are already redistributed.
///
/// # Example
///
/// ```
/// use pavemesh::algo::pave::{pave, PaveOptions};
/// use pavemesh::algo::redistribute::{redistribute_constant, RedistributeOptions};
/// use pavemesh::geometry::Polygon;
/// use pavemesh::size::ConstantSize;
/// use nalgebra::Point2;
///
/// let square = vec![
///     Point2::new(0.0, 0.0),
///     Point2::new(6.0, 0.0),
///     Point2::new(6.0, 6.0),
///     Point2::new(0.0, 6.0),
/// ];
/// let boundary = redistribute_constant(&square, true, 1.0, &RedistributeOptions::default()).unwrap();
/// let size = ConstantSize::new(1.0).unwrap();
/// let result = pave(&Polygon::new(boundary, vec![]), &size, &PaveOptions::default()).unwrap();
///
/// assert!(result.mesh.validate().is_ok());
/// assert!((result.mesh.total_area() - 36.0).abs() < 1e-9);
/// ```
///
/// # Errors
///
/// * [`MeshError::Geometry`] if the domain is not simple
/// * [`MeshError::PavingFailure`] if a region cannot be triangulated at all
pub fn pave<S: SizeFunction + ?Sized>(
    domain: &Polygon,
    size: &S,
    options: &PaveOptions,
) -> Result<PaveResult> {
    pave_with(domain, &PaveConstraints::default(), size, &SpadeTriangulator, options)
}

/// Pave a polygon with interior constraints and an explicit triangulator.
pub fn pave_with<S, T>(
    domain: &Polygon,
    constraints: &PaveConstraints,
    size: &S,
    triangulator: &T,
    options: &PaveOptions,
) -> Result<PaveResult>
where
    S: SizeFunction + ?Sized,
    T: Triangulator + ?Sized,
{
    if domain.outer.len() < 3 || signed_area(&domain.outer) <= 0.0 {
        return Err(MeshError::geometry("paving needs a counter-clockwise outer ring"));
    }

    let mut mesh = Mesh2d::new();
    let mut ring_starts = Vec::with_capacity(domain.holes.len() + 1);
    let mut root_ids = Vec::with_capacity(domain.holes.len() + 1);
    for ring in domain.rings() {
        ring_starts.push(mesh.num_points());
        root_ids.push(ring.iter().map(|p| mesh.add_point(*p)).collect::<Vec<_>>());
    }
    let boundary_points = mesh.num_points();

    let mut tree = FrontTree::new(domain.clone(), root_ids);
    let mut diagnostics = Vec::new();
    if constraints.seed_points.is_empty() {
        tree.grow(&mut mesh, size, options, &mut diagnostics)?;
    }
    let fronts = tree.nodes.len();

    let mut result = PaveResult {
        mesh,
        ring_starts,
        boundary_points,
        fixed: Vec::new(),
        locked_edges: Vec::new(),
        fronts,
        diagnostics,
    };

    if constraints.is_empty() {
        tree.triangulate(&mut result.mesh, triangulator, options, &mut result.diagnostics)?;
    } else {
        triangulate_constrained(&tree, constraints, size, triangulator, &mut result)?;
    }

    let map = result.mesh.compact();
    result.fixed = result.fixed.iter().filter_map(|&v| map[v]).collect();
    result.locked_edges = result
        .locked_edges
        .iter()
        .filter_map(|&(a, b)| Some((map[a]?, map[b]?)))
        .collect();
    log::debug!(
        "paved {} fronts into {} triangles",
        result.fronts,
        result.mesh.num_cells()
    );
    Ok(result)
}

/// A front: a domain with the mesh ids of its ring points.
#[derive(Debug, Clone)]
struct FrontNode {
    polygon: Polygon,
    /// Point ids per ring, outer first.
    ids: Vec<Vec<usize>>,
    depth: usize,
    children: Vec<usize>,
    removed: bool,
}

#[derive(Debug)]
struct FrontTree {
    nodes: Vec<FrontNode>,
}

impl FrontTree {
    fn new(root: Polygon, ids: Vec<Vec<usize>>) -> Self {
        Self {
            nodes: vec![FrontNode {
                polygon: root,
                ids,
                depth: 0,
                children: Vec::new(),
                removed: false,
            }],
        }
    }

    /// Offset fronts breadth-first until every front collapses or the front
    /// budget is spent.
    fn grow<S: SizeFunction + ?Sized>(
        &mut self,
        mesh: &mut Mesh2d,
        size: &S,
        options: &PaveOptions,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<()> {
        let mut queue = VecDeque::from([0usize]);
        while let Some(ni) = queue.pop_front() {
            if self.nodes.len() >= options.max_fronts {
                diagnostics.push(Diagnostic::info(
                    IssueKind::PavingFallback,
                    format!("front budget of {} reached", options.max_fronts),
                ));
                break;
            }
            let depth = self.nodes[ni].depth;
            let domains = offset_polygon(&self.nodes[ni].polygon, size, depth, &options.offset)?;

            let mut accepted: Vec<Polygon> = Vec::new();
            for domain in domains {
                let Some(child) = redistribute_front(&domain, size, depth + 1, &options.redistribute)?
                else {
                    continue;
                };
                if !child_is_valid(&child, &self.nodes[ni].polygon, &accepted) {
                    log::debug!("dropped invalid front at depth {}", depth + 1);
                    continue;
                }
                accepted.push(child);
            }

            for child in accepted {
                let ids: Vec<Vec<usize>> = child
                    .rings()
                    .map(|r| r.iter().map(|p| mesh.add_point(*p)).collect())
                    .collect();
                let ci = self.nodes.len();
                self.nodes.push(FrontNode {
                    polygon: child,
                    ids,
                    depth: depth + 1,
                    children: Vec::new(),
                    removed: false,
                });
                self.nodes[ni].children.push(ci);
                queue.push_back(ci);
            }
        }
        Ok(())
    }

    /// Triangulate the region of every front, parents first.
    fn triangulate<T: Triangulator + ?Sized>(
        &mut self,
        mesh: &mut Mesh2d,
        triangulator: &T,
        options: &PaveOptions,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<()> {
        for ni in 0..self.nodes.len() {
            if self.nodes[ni].removed {
                continue;
            }
            let triangles = if self.nodes[ni].children.is_empty() {
                close_leaf(&self.nodes[ni], mesh, triangulator)?
            } else {
                match self.region_triangles(ni, mesh, triangulator, options, diagnostics) {
                    Some(t) => t,
                    None => {
                        diagnostics.push(
                            Diagnostic::info(
                                IssueKind::PavingFallback,
                                format!("discarded fronts below depth {}", self.nodes[ni].depth),
                            )
                            .at(self.nodes[ni].polygon.outer[0]),
                        );
                        self.remove_subtree(ni);
                        close_leaf(&self.nodes[ni], mesh, triangulator)?
                    }
                }
            };
            for t in triangles {
                mesh.add_cell(Cell::Triangle(t));
            }
        }
        Ok(())
    }

    /// Triangles between a front and its children, or `None` if neither
    /// strips nor the constrained fallback succeed.
    fn region_triangles<T: Triangulator + ?Sized>(
        &self,
        ni: usize,
        mesh: &Mesh2d,
        triangulator: &T,
        options: &PaveOptions,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Vec<[usize; 3]>> {
        let node = &self.nodes[ni];
        if let Some(pairs) = self.ring_pairs(ni) {
            let mut triangles = Vec::new();
            let mut ok = true;
            for (outer, inner) in &pairs {
                match loft(outer, inner, &mesh.points, options) {
                    Some(t) => triangles.extend(t),
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                return Some(triangles);
            }
            log::debug!("strip failed at depth {}, triangulating region", node.depth);
        }

        let children: Vec<&FrontNode> = node.children.iter().map(|&c| &self.nodes[c]).collect();
        let mut rings: Vec<&[usize]> = node.ids.iter().map(|r| r.as_slice()).collect();
        for child in &children {
            rings.extend(child.ids.iter().map(|r| r.as_slice()));
        }
        let keep = |p: &Point2<f64>| {
            node.polygon.contains(p) && !children.iter().any(|c| c.polygon.contains(p))
        };
        match triangulate_rings(&rings, &mesh.points, keep, triangulator) {
            Ok(t) => {
                diagnostics.push(Diagnostic::info(
                    IssueKind::PavingFallback,
                    format!("front region at depth {} triangulated directly", node.depth),
                ));
                Some(t)
            }
            Err(e) => {
                log::warn!("region triangulation at depth {} failed: {}", node.depth, e);
                None
            }
        }
    }

    /// Ring pairs `(outer, inner)` to loft, both counter-clockwise, when the
    /// front has one child with matching rings.
    fn ring_pairs(&self, ni: usize) -> Option<Vec<(Vec<usize>, Vec<usize>)>> {
        let node = &self.nodes[ni];
        let [ci] = node.children[..] else {
            return None;
        };
        let child = &self.nodes[ci];
        if child.polygon.holes.len() != node.polygon.holes.len() {
            return None;
        }
        let mut pairs = vec![(node.ids[0].clone(), child.ids[0].clone())];
        let mut used = vec![false; child.polygon.holes.len()];
        for (hi, hole) in node.polygon.holes.iter().enumerate() {
            let matches: Vec<usize> = child
                .polygon
                .holes
                .iter()
                .enumerate()
                .filter(|(_, ch)| point_in_ring(ch, &hole[0]))
                .map(|(k, _)| k)
                .collect();
            let [k] = matches[..] else {
                return None;
            };
            if used[k] {
                return None;
            }
            used[k] = true;
            let outer: Vec<usize> = child.ids[k + 1].iter().rev().copied().collect();
            let inner: Vec<usize> = node.ids[hi + 1].iter().rev().copied().collect();
            pairs.push((outer, inner));
        }
        Some(pairs)
    }

    fn remove_subtree(&mut self, ni: usize) {
        let mut stack = std::mem::take(&mut self.nodes[ni].children);
        while let Some(c) = stack.pop() {
            self.nodes[c].removed = true;
            stack.extend(self.nodes[c].children.iter().copied());
        }
    }
}

/// Redistribute the rings of an offset domain at `depth`, keeping corners.
/// Returns `None` when a ring degenerates.
fn redistribute_front<S: SizeFunction + ?Sized>(
    domain: &Polygon,
    size: &S,
    depth: usize,
    options: &RedistributeOptions,
) -> Result<Option<Polygon>> {
    let profile = SizeProfile::new(size, depth, options);
    let tol = tolerance_from_extents(&domain.outer);
    let mut rings = Vec::with_capacity(domain.holes.len() + 1);
    for ring in domain.rings() {
        let corners = find_corners(ring, true, options.corner_angle);
        let resampled = match redistribute_anchored(ring, true, &corners, &profile, options) {
            Ok(r) => r,
            Err(MeshError::Spacing { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let cleaned = clean_ring(&resampled, tol);
        if cleaned.len() < 3 {
            return Ok(None);
        }
        rings.push(cleaned);
    }
    let outer = rings.remove(0);
    Ok(Some(Polygon::new(outer, rings)))
}

/// A child front must be simple, correctly oriented, strictly inside its
/// parent, clear of its siblings, and must not swallow a parent hole.
fn child_is_valid(child: &Polygon, parent: &Polygon, siblings: &[Polygon]) -> bool {
    if signed_area(&child.outer) <= 0.0 || child.holes.iter().any(|h| signed_area(h) >= 0.0) {
        return false;
    }
    if child.area() <= 0.0 || child.area() >= parent.area() {
        return false;
    }
    let rings: Vec<&Vec<Point2<f64>>> = child.rings().collect();
    for (i, ring) in rings.iter().enumerate() {
        if !is_simple(ring) || !ring.iter().all(|p| parent.contains(p)) {
            return false;
        }
        if parent.rings().any(|pr| rings_intersect(ring, pr)) {
            return false;
        }
        if rings[i + 1..].iter().any(|other| rings_intersect(ring, other)) {
            return false;
        }
        if siblings
            .iter()
            .any(|s| s.rings().any(|sr| rings_intersect(ring, sr)))
        {
            return false;
        }
    }
    if child.holes.iter().any(|h| !point_in_ring(&child.outer, &h[0])) {
        return false;
    }
    if parent.holes.iter().any(|h| child.contains(&h[0])) {
        return false;
    }
    !siblings
        .iter()
        .any(|s| s.contains(&child.outer[0]) || child.contains(&s.outer[0]))
}

/// Loft a strip between two counter-clockwise rings, `inner` inside `outer`.
fn loft(
    outer: &[usize],
    inner: &[usize],
    points: &[Point2<f64>],
    options: &PaveOptions,
) -> Option<Vec<[usize; 3]>> {
    let (m, k) = (outer.len(), inner.len());
    if m < 3 || k < 3 {
        return None;
    }
    let segments: Vec<(usize, usize)> = (0..m)
        .map(|i| (outer[i], outer[(i + 1) % m]))
        .chain((0..k).map(|j| (inner[j], inner[(j + 1) % k])))
        .collect();
    let index = SegmentIndex::build(segments.iter().map(|&(a, b)| (points[a], points[b])));
    let inner_points: Vec<Point2<f64>> = inner.iter().map(|&v| points[v]).collect();
    let inner_index = PointIndex::build(&inner_points);

    let attempts = options.retries + 1;
    for attempt in 0..attempts {
        let i0 = attempt * m / attempts;
        let nearest = inner_index.nearest_neighbors(&points[outer[i0]], 2);
        let j0 = match (attempt % 2, nearest.as_slice()) {
            (1, [_, second, ..]) => *second,
            (_, [first, ..]) => *first,
            _ => return None,
        };
        let min_angle = if attempt + 1 == attempts {
            None
        } else {
            Some(options.min_angle)
        };
        let walker = StripWalk {
            outer,
            inner,
            points,
            index: &index,
            segments: &segments,
        };
        if let Some(t) = walker.walk(i0, j0, min_angle) {
            return Some(t);
        }
    }
    None
}

struct StripWalk<'a> {
    outer: &'a [usize],
    inner: &'a [usize],
    points: &'a [Point2<f64>],
    index: &'a SegmentIndex,
    segments: &'a [(usize, usize)],
}

impl StripWalk<'_> {
    fn walk(&self, i0: usize, j0: usize, min_angle: Option<f64>) -> Option<Vec<[usize; 3]>> {
        let (m, k) = (self.outer.len(), self.inner.len());
        if !self.link_is_clear(self.outer[i0], self.inner[j0]) {
            return None;
        }
        let mut triangles = Vec::with_capacity(m + k);
        let (mut i, mut j) = (0, 0);
        while i < m || j < k {
            let o = self.outer[(i0 + i) % m];
            let o_next = self.outer[(i0 + i + 1) % m];
            let n = self.inner[(j0 + j) % k];
            let n_next = self.inner[(j0 + j + 1) % k];
            let closing = i + j + 1 == m + k;

            let advance_outer = (i < m)
                .then(|| self.score([o, o_next, n], (o_next, n), closing, min_angle))
                .flatten();
            let advance_inner = (j < k)
                .then(|| self.score([o, n_next, n], (o, n_next), closing, min_angle))
                .flatten();

            let take_outer = match (advance_outer, advance_inner) {
                (Some((qa, la)), Some((qb, lb))) => {
                    if (qa - qb).abs() > 1e-9 {
                        qa > qb
                    } else {
                        la <= lb
                    }
                }
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => return None,
            };
            if take_outer {
                triangles.push([o, o_next, n]);
                i += 1;
            } else {
                triangles.push([o, n_next, n]);
                j += 1;
            }
        }
        Some(triangles)
    }

    /// Minimum angle and link length of a candidate triangle, or `None` if
    /// it is inverted, too sharp, or its new link crosses a ring.
    fn score(
        &self,
        t: [usize; 3],
        link: (usize, usize),
        closing: bool,
        min_angle: Option<f64>,
    ) -> Option<(f64, f64)> {
        let [a, b, c] = t.map(|v| self.points[v]);
        let scale = (b - a).norm_squared().max((c - a).norm_squared());
        if triangle_area(&a, &b, &c) <= 1e-12 * scale {
            return None;
        }
        let q = triangle_min_angle(&a, &b, &c);
        if min_angle.is_some_and(|min| q < min) {
            return None;
        }
        if !closing && !self.link_is_clear(link.0, link.1) {
            return None;
        }
        Some((q, (self.points[link.1] - self.points[link.0]).norm()))
    }

    fn link_is_clear(&self, a: usize, b: usize) -> bool {
        let (pa, pb) = (self.points[a], self.points[b]);
        self.index.candidates(&pa, &pb, 0.0).into_iter().all(|s| {
            let (s0, s1) = self.segments[s];
            s0 == a
                || s0 == b
                || s1 == a
                || s1 == b
                || segment_intersection(&pa, &pb, &self.points[s0], &self.points[s1]).is_none()
        })
    }
}

/// Close a front without children.
fn close_leaf<T: Triangulator + ?Sized>(
    node: &FrontNode,
    mesh: &mut Mesh2d,
    triangulator: &T,
) -> Result<Vec<[usize; 3]>> {
    if node.polygon.holes.is_empty() && node.ids[0].len() <= MAX_EAR_RING {
        let ring = &node.ids[0];
        let ears = ear_clip(ring, &mesh.points);
        let fan = centroid_fan(ring, &mesh.points);
        let ear_quality = ears.as_ref().map(|t| min_angle_of(t, &mesh.points));
        match (ears, fan) {
            (Some(ears), Some((_, q))) if ear_quality.is_some_and(|e| e >= q) => return Ok(ears),
            (_, Some((center, _))) => {
                let c = mesh.add_point(center);
                let n = ring.len();
                return Ok((0..n).map(|i| [c, ring[i], ring[(i + 1) % n]]).collect());
            }
            (Some(ears), None) => return Ok(ears),
            (None, None) => {}
        }
    }
    let rings: Vec<&[usize]> = node.ids.iter().map(|r| r.as_slice()).collect();
    triangulate_rings(&rings, &mesh.points, |p| node.polygon.contains(p), triangulator)
}

/// Ear clipping that always cuts the ear with the largest minimum angle.
pub(crate) fn ear_clip(ring: &[usize], points: &[Point2<f64>]) -> Option<Vec<[usize; 3]>> {
    let mut remaining: Vec<usize> = ring.to_vec();
    let mut triangles = Vec::with_capacity(ring.len().saturating_sub(2));
    while remaining.len() > 3 {
        let n = remaining.len();
        let mut best: Option<(usize, f64)> = None;
        for i in 0..n {
            let (a, b, c) = (remaining[(i + n - 1) % n], remaining[i], remaining[(i + 1) % n]);
            if !is_ear(a, b, c, &remaining, points) {
                continue;
            }
            let q = triangle_min_angle(&points[a], &points[b], &points[c]);
            if best.map_or(true, |(_, bq)| q > bq) {
                best = Some((i, q));
            }
        }
        let (i, _) = best?;
        let n = remaining.len();
        triangles.push([remaining[(i + n - 1) % n], remaining[i], remaining[(i + 1) % n]]);
        remaining.remove(i);
    }
    let [a, b, c] = remaining[..] else {
        return None;
    };
    if triangle_area(&points[a], &points[b], &points[c]) <= 0.0 {
        return None;
    }
    triangles.push([a, b, c]);
    Some(triangles)
}

fn is_ear(a: usize, b: usize, c: usize, ring: &[usize], points: &[Point2<f64>]) -> bool {
    let (pa, pb, pc) = (points[a], points[b], points[c]);
    let scale = (pb - pa).norm_squared().max((pc - pb).norm_squared());
    if cross(&pa, &pb, &pc) <= 1e-12 * scale {
        return false;
    }
    ring.iter().all(|&v| {
        if v == a || v == b || v == c {
            return true;
        }
        let p = points[v];
        if p == pa || p == pb || p == pc {
            return true;
        }
        // Reject points inside or on the triangle
        !(cross(&pa, &pb, &p) >= 0.0 && cross(&pb, &pc, &p) >= 0.0 && cross(&pc, &pa, &p) >= 0.0)
    })
}

/// Centroid of a ring and the minimum angle of the fan around it, if every
/// fan triangle is positive.
fn centroid_fan(ring: &[usize], points: &[Point2<f64>]) -> Option<(Point2<f64>, f64)> {
    let n = ring.len();
    if n < 4 {
        return None;
    }
    let coords: Vec<Point2<f64>> = ring.iter().map(|&v| points[v]).collect();
    let c = ring_centroid(&coords);
    let mut q = f64::INFINITY;
    for i in 0..n {
        let (a, b) = (coords[i], coords[(i + 1) % n]);
        let scale = (a - c).norm_squared().max((b - c).norm_squared());
        if triangle_area(&c, &a, &b) <= 1e-12 * scale {
            return None;
        }
        q = q.min(triangle_min_angle(&c, &a, &b));
    }
    Some((c, q))
}

fn min_angle_of(triangles: &[[usize; 3]], points: &[Point2<f64>]) -> f64 {
    triangles
        .iter()
        .map(|t| triangle_min_angle(&points[t[0]], &points[t[1]], &points[t[2]]))
        .fold(f64::INFINITY, f64::min)
}

/// Constrained triangulation of a region bounded by rings of mesh ids,
/// keeping triangles whose centroid satisfies `keep`.
fn triangulate_rings<T: Triangulator + ?Sized>(
    rings: &[&[usize]],
    points: &[Point2<f64>],
    keep: impl Fn(&Point2<f64>) -> bool,
    triangulator: &T,
) -> Result<Vec<[usize; 3]>> {
    let mut ids = Vec::new();
    let mut constraints = Vec::new();
    for ring in rings {
        let start = ids.len();
        let n = ring.len();
        ids.extend_from_slice(ring);
        constraints.extend((0..n).map(|i| [start + i, start + (i + 1) % n]));
    }
    let local: Vec<Point2<f64>> = ids.iter().map(|&v| points[v]).collect();
    let tri = triangulator.triangulate(&local, &constraints)?;
    if !tri.skipped_constraints.is_empty() {
        return Err(MeshError::paving(format!(
            "{} region edges could not be enforced",
            tri.skipped_constraints.len()
        )));
    }
    let triangles: Vec<[usize; 3]> = tri
        .triangles
        .into_iter()
        .filter(|t| {
            let c = Point2::from((local[t[0]].coords + local[t[1]].coords + local[t[2]].coords) / 3.0);
            keep(&c)
        })
        .map(|t| t.map(|i| ids[i]))
        .collect();
    if triangles.is_empty() {
        return Err(MeshError::paving("region triangulation produced no triangles"));
    }
    Ok(triangles)
}

/// Constrained mode: triangulate boundary, breaklines, hard points and the
/// interior points in one pass.
fn triangulate_constrained<S, T>(
    tree: &FrontTree,
    constraints: &PaveConstraints,
    size: &S,
    triangulator: &T,
    result: &mut PaveResult,
) -> Result<()>
where
    S: SizeFunction + ?Sized,
    T: Triangulator + ?Sized,
{
    let root = &tree.nodes[0];
    let domain = &root.polygon;
    let mesh = &mut result.mesh;
    let tol = tolerance_from_extents(&domain.outer);
    let boundary_index = PointIndex::build(&mesh.points[..result.boundary_points]);

    // Boundary points first, then breaklines and hard points reuse coincident
    // boundary points.
    let mut interior_points: Vec<Point2<f64>> = if constraints.seed_points.is_empty() {
        tree.nodes[1..]
            .iter()
            .flat_map(|n| n.polygon.rings().flatten().copied().collect::<Vec<_>>())
            .collect()
    } else {
        constraints.seed_points.clone()
    };
    mesh.points.truncate(result.boundary_points);

    let fixed_id = |p: &Point2<f64>, mesh: &mut Mesh2d| -> usize {
        match boundary_index.nearest(p) {
            Some((i, d)) if d <= tol => i,
            _ => mesh.add_point(*p),
        }
    };

    let mut edges = Vec::new();
    for line in &constraints.breaklines {
        let ids: Vec<usize> = line.iter().map(|p| fixed_id(p, mesh)).collect();
        for w in ids.windows(2) {
            if w[0] != w[1] {
                edges.push([w[0], w[1]]);
                result.locked_edges.push((w[0].min(w[1]), w[0].max(w[1])));
            }
        }
        result.fixed.extend(ids.iter().filter(|&&v| v >= result.boundary_points));
    }
    for p in &constraints.hard_points {
        let id = fixed_id(p, mesh);
        if id >= result.boundary_points {
            result.fixed.push(id);
        }
    }
    result.fixed.sort_unstable();
    result.fixed.dedup();

    // Keep interior points away from the constraints and the boundary
    let mut kept = 0;
    for p in interior_points.drain(..) {
        if !domain.contains(&p) {
            continue;
        }
        let clearance = 0.5 * size.size_at(&p)?;
        let near_breakline = constraints.breaklines.iter().any(|line| {
            line.windows(2)
                .any(|w| distance_to_segment(&p, &w[0], &w[1]) < clearance)
        });
        let near_hard = constraints
            .hard_points
            .iter()
            .any(|h| (h - p).norm() < clearance);
        if near_breakline || near_hard || domain.distance_to_boundary(&p) <= tol {
            continue;
        }
        mesh.add_point(p);
        kept += 1;
    }

    let mut all_edges = Vec::new();
    for (r, ring) in domain.rings().enumerate() {
        let start = result.ring_starts[r];
        let n = ring.len();
        all_edges.extend((0..n).map(|i| [start + i, start + (i + 1) % n]));
    }
    let boundary_edges = all_edges.len();
    all_edges.extend(edges.iter().copied());

    let tri = triangulator.triangulate(&mesh.points, &all_edges)?;
    for skipped in &tri.skipped_constraints {
        let idx = all_edges.iter().position(|e| e == skipped).unwrap_or(usize::MAX);
        if idx < boundary_edges {
            return Err(MeshError::paving(format!(
                "boundary edge ({}, {}) crossed by a breakline",
                skipped[0], skipped[1]
            )));
        }
        result.diagnostics.push(
            Diagnostic::warning(
                IssueKind::BreaklineSkipped,
                "breakline segment crosses another breakline and was not enforced",
            )
            .at(mesh.points[skipped[0]]),
        );
        let key = (skipped[0].min(skipped[1]), skipped[0].max(skipped[1]));
        result.locked_edges.retain(|&e| e != key);
    }

    for t in tri.triangles {
        let [a, b, c] = t.map(|v| mesh.points[v]);
        let centroid = Point2::from((a.coords + b.coords + c.coords) / 3.0);
        if domain.contains(&centroid) {
            mesh.add_cell(Cell::Triangle(t));
        }
    }
    if mesh.cells.is_empty() {
        return Err(MeshError::paving("constrained triangulation produced no triangles"));
    }
    log::debug!(
        "constrained paving: {} interior points, {} breakline edges",
        kept,
        edges.len()
    );
    Ok(())
}
