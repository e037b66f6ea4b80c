//! Multi-polygon meshing.
//!
//! [`mesh_polygons`] meshes a set of polygons into one conforming mesh. Each
//! polygon runs its own pipeline; polygons that share boundary stretches get
//! identical boundary points there, so the meshes stitch together without
//! hanging nodes.
//!
//! # Pipeline
//!
//! A sequential pre-pass prepares the shared boundary data:
//!
//! 1. Clean every polygon ([`clean_polygon`]).
//! 2. Optionally reject overlapping polygons.
//! 3. Snap coincident vertices to identical coordinates and insert
//!    T-junction vertices where a vertex lies on another polygon's edge.
//! 4. Find the anchors where the set of polygons owning the boundary changes.
//!    Chains between anchors that several polygons share are resampled with
//!    the pointwise minimum of their size functions.
//!
//! Then every polygon is meshed in parallel:
//!
//! ```text
//! size function → refine rings → boundary redistribution → breaklines
//!     → patch fill | paving → quad matching → relaxation → quad repair
//! ```
//!
//! Finally the per-polygon meshes are merged single-threaded: points are
//! unified within tolerance and cells re-indexed.
//!
//! A polygon whose pipeline fails is reported and skipped; the others are
//! still meshed.
//!
//! # Example
//!
//! ```
//! use pavemesh::mesher::{mesh_polygons, MesherOptions, MeshingJob};
//! use pavemesh::diagnostics::JobStatus;
//! use nalgebra::Point2;
//!
//! let square = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(4.0, 0.0),
//!     Point2::new(4.0, 4.0),
//!     Point2::new(0.0, 4.0),
//! ];
//! let job = MeshingJob::new(square).with_constant_size(1.0);
//! let output = mesh_polygons(&[job], &MesherOptions::default()).unwrap();
//!
//! assert_ne!(output.status, JobStatus::Failed);
//! assert_eq!(output.mesh.num_quads(), 16);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nalgebra::Point2;
use rayon::prelude::*;

use crate::algo::clean::{clean_polygon, CleanOptions};
use crate::algo::curvature::{CurvatureOptions, CurvatureProfile};
use crate::algo::patch::{fill_patch, PatchOptions, PatchResult};
use crate::algo::pave::{pave_with, PaveConstraints, PaveOptions};
use crate::algo::quad::{merge_triangles, QuadOptions};
use crate::algo::redistribute::{
    find_corners, redistribute_anchored, RedistributeOptions, SizeProfile,
};
use crate::algo::refine::{fill_refine_rings, plan_refinement, RefinePlan, RefinePoint};
use crate::algo::relax::{relax, RelaxOptions};
use crate::algo::repair::{repair_quads, RepairOptions};
use crate::algo::Progress;
use crate::diagnostics::{Diagnostic, IssueKind, JobStatus, PolygonStatus};
use crate::error::{MeshError, Result};
use crate::geometry::{
    distance_to_segment, lex_less, ring_centroid, segments_cross, tolerance_from_extents, Bounds,
    Polygon,
};
use crate::mesh::{Cell, Mesh2d};
use crate::size::{
    BiasedConstantSize, ConstantSize, MinSize, PolygonSize, RefinedSize, SizeFunction,
};
use crate::spatial::{PointIndex, PointMerger, SegmentIndex, SpatialIndex};
use crate::triangulate::SpadeTriangulator;

/// Elevation of a mesh point.
pub type Elevation = Arc<dyn Fn(&Point2<f64>) -> f64 + Send + Sync>;

/// How a polygon's target element size is defined.
#[derive(Clone, Default)]
pub enum SizeSpec {
    /// Interpolated from the input boundary edge lengths, weighted by the
    /// job's bias ([`PolygonSize`]).
    #[default]
    Boundary,
    /// One size everywhere.
    Constant(f64),
    /// The boundary-derived size near the boundary, moving toward a constant
    /// as paving advances at a rate set by the job's bias
    /// ([`BiasedConstantSize`]).
    BoundaryToConstant(f64),
    /// A caller-supplied size function.
    Function(Arc<dyn SizeFunction>),
}

impl std::fmt::Debug for SizeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeSpec::Boundary => write!(f, "Boundary"),
            SizeSpec::Constant(s) => f.debug_tuple("Constant").field(s).finish(),
            SizeSpec::BoundaryToConstant(s) => f.debug_tuple("BoundaryToConstant").field(s).finish(),
            SizeSpec::Function(_) => write!(f, "Function(..)"),
        }
    }
}

/// One polygon to mesh, with everything that constrains its mesh.
#[derive(Clone)]
pub struct MeshingJob {
    /// Outer boundary. Cleaning fixes its orientation.
    pub outer: Vec<Point2<f64>>,
    /// Holes.
    pub holes: Vec<Vec<Point2<f64>>>,
    /// Open polylines that must appear as mesh edges.
    pub breaklines: Vec<Vec<Point2<f64>>>,
    /// Local refinements.
    pub refine_points: Vec<RefinePoint>,
    /// Target element size.
    pub size: SizeSpec,
    /// Size grading bias in `[0, 1]` (default: 0.5).
    pub bias: f64,
    /// Try a structured patch fill before paving (default: true).
    pub patch: bool,
    /// Interior points to triangulate instead of generating fronts.
    pub seed_points: Vec<Point2<f64>>,
    /// Elevation of the mesh points.
    pub elevation: Option<Elevation>,
    /// Name used in reports.
    pub id: Option<String>,
}

impl MeshingJob {
    /// A job for the polygon bounded by `outer`.
    pub fn new(outer: Vec<Point2<f64>>) -> Self {
        Self {
            outer,
            holes: Vec::new(),
            breaklines: Vec::new(),
            refine_points: Vec::new(),
            size: SizeSpec::default(),
            bias: 0.5,
            patch: true,
            seed_points: Vec::new(),
            elevation: None,
            id: None,
        }
    }

    /// Add a hole.
    pub fn with_hole(mut self, hole: Vec<Point2<f64>>) -> Self {
        self.holes.push(hole);
        self
    }

    /// Add a breakline.
    pub fn with_breakline(mut self, line: Vec<Point2<f64>>) -> Self {
        self.breaklines.push(line);
        self
    }

    /// Add a refine point.
    pub fn with_refine_point(mut self, point: RefinePoint) -> Self {
        self.refine_points.push(point);
        self
    }

    /// Set the size definition.
    pub fn with_size(mut self, size: SizeSpec) -> Self {
        self.size = size;
        self
    }

    /// Use one size everywhere.
    pub fn with_constant_size(self, size: f64) -> Self {
        self.with_size(SizeSpec::Constant(size))
    }

    /// Use a size function.
    pub fn with_size_function<S: SizeFunction + 'static>(self, size: S) -> Self {
        self.with_size(SizeSpec::Function(Arc::new(size)))
    }

    /// Set the size grading bias.
    pub fn with_bias(mut self, bias: f64) -> Self {
        self.bias = bias.clamp(0.0, 1.0);
        self
    }

    /// Enable or disable the patch fill.
    pub fn with_patch(mut self, patch: bool) -> Self {
        self.patch = patch;
        self
    }

    /// Triangulate these interior points instead of paving.
    pub fn with_seed_points(mut self, points: Vec<Point2<f64>>) -> Self {
        self.seed_points = points;
        self
    }

    /// Evaluate point elevations with `elevation`.
    pub fn with_elevation<F>(mut self, elevation: F) -> Self
    where
        F: Fn(&Point2<f64>) -> f64 + Send + Sync + 'static,
    {
        self.elevation = Some(Arc::new(elevation));
        self
    }

    /// Name the polygon in reports.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn label(&self, index: usize) -> String {
        match &self.id {
            Some(id) => format!("polygon {} ({})", index, id),
            None => format!("polygon {}", index),
        }
    }
}

impl std::fmt::Debug for MeshingJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshingJob")
            .field("id", &self.id)
            .field("outer", &self.outer.len())
            .field("holes", &self.holes.len())
            .field("breaklines", &self.breaklines.len())
            .field("refine_points", &self.refine_points.len())
            .field("size", &self.size)
            .field("bias", &self.bias)
            .field("patch", &self.patch)
            .finish_non_exhaustive()
    }
}

/// Options for multi-polygon meshing.
#[derive(Debug, Clone)]
pub struct MesherOptions {
    /// Merge tolerance. `None` derives it from the extents of all polygons.
    pub tolerance: Option<f64>,
    /// Polygon cleaning.
    pub clean: CleanOptions,
    /// Boundary and breakline redistribution.
    pub redistribute: RedistributeOptions,
    /// Curvature-aware boundary spacing; `None` uses the size function only.
    pub curvature: Option<CurvatureOptions>,
    /// Paving.
    pub pave: PaveOptions,
    /// Patch filling.
    pub patch: PatchOptions,
    /// Produce quads (default: true). Without quads, patch quads are split.
    pub quads: bool,
    /// Quad matching.
    pub quad_options: QuadOptions,
    /// Relax the mesh (default: true).
    pub relax: bool,
    /// Relaxation.
    pub relax_options: RelaxOptions,
    /// Repair bad quads (default: true).
    pub repair: bool,
    /// Quad repair.
    pub repair_options: RepairOptions,
    /// Reject overlapping polygons (default: true).
    pub check_topology: bool,
    /// Size growth rate away from refine points (default: 0.3).
    pub refine_growth: f64,
    /// Mesh polygons in parallel (default: true).
    pub parallel: bool,
}

impl Default for MesherOptions {
    fn default() -> Self {
        Self {
            tolerance: None,
            clean: CleanOptions::default(),
            redistribute: RedistributeOptions::default(),
            curvature: None,
            pave: PaveOptions::default(),
            patch: PatchOptions::default(),
            quads: true,
            quad_options: QuadOptions::default(),
            relax: true,
            relax_options: RelaxOptions::default(),
            repair: true,
            repair_options: RepairOptions::default(),
            check_topology: true,
            refine_growth: 0.3,
            parallel: true,
        }
    }
}

impl MesherOptions {
    /// Use a fixed merge tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Enable or disable quads.
    pub fn with_quads(mut self, quads: bool) -> Self {
        self.quads = quads;
        self
    }

    /// Enable or disable relaxation.
    pub fn with_relax(mut self, relax: bool) -> Self {
        self.relax = relax;
        self
    }

    /// Enable or disable quad repair.
    pub fn with_repair(mut self, repair: bool) -> Self {
        self.repair = repair;
        self
    }

    /// Enable or disable the overlap check.
    pub fn with_check_topology(mut self, check: bool) -> Self {
        self.check_topology = check;
        self
    }

    /// Use curvature-aware boundary spacing.
    pub fn with_curvature(mut self, curvature: CurvatureOptions) -> Self {
        self.curvature = Some(curvature);
        self
    }

    /// Set the size growth rate around refine points.
    pub fn with_refine_growth(mut self, growth: f64) -> Self {
        self.refine_growth = growth;
        self
    }

    /// Enable or disable parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run everything on the calling thread.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self.relax_options = self.relax_options.sequential();
        self
    }
}

/// What happened to one input polygon.
#[derive(Debug, Clone)]
pub struct PolygonReport {
    /// Position of the polygon in the input.
    pub index: usize,
    /// The job's id, if any.
    pub id: Option<String>,
    /// Overall outcome.
    pub status: PolygonStatus,
    /// Issues recorded along the pipeline.
    pub diagnostics: Vec<Diagnostic>,
    /// The error that aborted the pipeline, if it failed.
    pub error: Option<MeshError>,
}

/// The merged mesh and the per-polygon reports.
#[derive(Debug, Clone)]
pub struct MeshOutput {
    /// The merged mesh.
    pub mesh: Mesh2d,
    /// Owning polygon of each cell.
    pub cell_polygons: Vec<usize>,
    /// One report per input polygon, in input order.
    pub reports: Vec<PolygonReport>,
    /// Overall outcome.
    pub status: JobStatus,
}

impl MeshOutput {
    /// Failed polygons and the errors that stopped them.
    pub fn failures(&self) -> Vec<(usize, &MeshError)> {
        self.reports
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| (r.index, e)))
            .collect()
    }
}

/// Mesh a set of polygons into one conforming mesh.
///
/// # Errors
///
/// Returns [`MeshError::InvalidParameter`] for an unusable tolerance or
/// refine growth. Problems with individual polygons are never errors; they
/// are recorded in the polygon's [`PolygonReport`].
pub fn mesh_polygons(jobs: &[MeshingJob], options: &MesherOptions) -> Result<MeshOutput> {
    mesh_polygons_internal(jobs, options, None)
}

/// Mesh a set of polygons with progress reporting.
///
/// The callback receives one update per stage of the pre-pass, one per
/// finished polygon (from worker threads) and one for the merge.
pub fn mesh_polygons_with_progress(
    jobs: &[MeshingJob],
    options: &MesherOptions,
    progress: &Progress,
) -> Result<MeshOutput> {
    mesh_polygons_internal(jobs, options, Some(progress))
}

/// Per-polygon bookkeeping.
#[derive(Debug, Default)]
struct PolygonState {
    polygon: Option<Polygon>,
    diagnostics: Vec<Diagnostic>,
    error: Option<MeshError>,
}

impl PolygonState {
    fn fail(&mut self, label: &str, error: MeshError) {
        if self.error.is_some() {
            return;
        }
        log::warn!("{} failed: {}", label, error);
        self.diagnostics
            .push(Diagnostic::error(issue_kind(&error), error.to_string()));
        self.polygon = None;
        self.error = Some(error);
    }

    fn is_live(&self) -> bool {
        self.error.is_none() && self.polygon.is_some()
    }
}

fn issue_kind(error: &MeshError) -> IssueKind {
    match error {
        MeshError::Spacing { .. } | MeshError::OutOfDomain { .. } => IssueKind::Spacing,
        MeshError::PavingFailure { .. } | MeshError::Triangulation { .. } => IssueKind::PavingFailure,
        MeshError::Overlap { .. } => IssueKind::Overlap,
        _ => IssueKind::Geometry,
    }
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Boundary data shared by all polygon pipelines.
struct SharedBoundary {
    /// Snapped points; rings refer to them by index.
    points: Vec<Point2<f64>>,
    index: PointIndex,
    /// Rings of each live polygon, outer first.
    rings: Vec<Vec<Vec<usize>>>,
    vertex_owners: HashMap<usize, Vec<usize>>,
    edge_owners: HashMap<(usize, usize), Vec<usize>>,
    /// Points that are anchors regardless of ownership.
    forced: HashSet<usize>,
    tol: f64,
}

impl SharedBoundary {
    fn build(jobs: &[MeshingJob], states: &mut [PolygonState], tol: f64) -> Self {
        let mut merger = PointMerger::new(tol);
        let mut rings: Vec<Vec<Vec<usize>>> = vec![Vec::new(); states.len()];
        for (i, state) in states.iter_mut().enumerate() {
            let Some(polygon) = state.polygon.as_ref() else {
                continue;
            };
            let mut snapped = Vec::new();
            let mut collapsed = false;
            for (r, ring) in polygon.rings().enumerate() {
                let mut ids: Vec<usize> = ring.iter().map(|p| merger.add(*p)).collect();
                ids.dedup();
                while ids.len() > 1 && ids.first() == ids.last() {
                    ids.pop();
                }
                if ids.len() >= 3 {
                    snapped.push(ids);
                } else if r == 0 {
                    collapsed = true;
                } else {
                    state.diagnostics.push(Diagnostic::warning(
                        IssueKind::Geometry,
                        format!("hole {} collapsed while snapping and was dropped", r - 1),
                    ));
                }
            }
            if collapsed {
                state.fail(
                    &jobs[i].label(i),
                    MeshError::geometry("outer ring collapsed while snapping"),
                );
            } else {
                rings[i] = snapped;
            }
        }

        let mut forced = HashSet::new();
        for (job, state) in jobs.iter().zip(states.iter()) {
            if !state.is_live() {
                continue;
            }
            for line in job.breaklines.iter().filter(|l| l.len() >= 2) {
                for p in [line[0], line[line.len() - 1]] {
                    forced.insert(merger.add(p));
                }
            }
        }

        let points = merger.into_points();
        let mut shared = Self {
            index: PointIndex::build(&points),
            points,
            rings,
            vertex_owners: HashMap::new(),
            edge_owners: HashMap::new(),
            forced,
            tol,
        };
        shared.insert_t_junctions();
        shared.compute_owners();
        shared
    }

    /// Insert every snapped vertex lying in the interior of a ring edge.
    fn insert_t_junctions(&mut self) {
        let mut splitters: HashSet<usize> = self.forced.clone();
        for ring in self.rings.iter().flatten() {
            splitters.extend(ring.iter().copied());
        }
        let mut index = PointIndex::new();
        for &v in &splitters {
            index.insert(v, &self.points[v]);
        }

        let mut inserted = 0;
        for ring in self.rings.iter_mut().flatten() {
            let n = ring.len();
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                let (a, b) = (ring[i], ring[(i + 1) % n]);
                out.push(a);
                let (pa, pb) = (self.points[a], self.points[b]);
                let ab = pb - pa;
                let len2 = ab.norm_squared();
                if len2 == 0.0 {
                    continue;
                }
                let mid = pa + ab * 0.5;
                let mut on_edge: Vec<(f64, usize)> = index
                    .within_distance(&mid, 0.5 * len2.sqrt() + self.tol)
                    .into_iter()
                    .filter(|&v| v != a && v != b)
                    .filter_map(|v| {
                        let p = self.points[v];
                        let t = (p - pa).dot(&ab) / len2;
                        (t > 0.0 && t < 1.0 && distance_to_segment(&p, &pa, &pb) <= self.tol)
                            .then_some((t, v))
                    })
                    .collect();
                on_edge.sort_by(|x, y| x.0.total_cmp(&y.0));
                inserted += on_edge.len();
                out.extend(on_edge.into_iter().map(|(_, v)| v));
            }
            *ring = out;
        }
        if inserted > 0 {
            log::debug!("inserted {} T-junction vertices", inserted);
        }
    }

    fn compute_owners(&mut self) {
        for (polygon, rings) in self.rings.iter().enumerate() {
            for ring in rings {
                let n = ring.len();
                for i in 0..n {
                    let owners = self.vertex_owners.entry(ring[i]).or_default();
                    if owners.last() != Some(&polygon) {
                        owners.push(polygon);
                    }
                    let owners = self
                        .edge_owners
                        .entry(edge_key(ring[i], ring[(i + 1) % n]))
                        .or_default();
                    if owners.last() != Some(&polygon) {
                        owners.push(polygon);
                    }
                }
            }
        }
    }

    fn edge_owners(&self, a: usize, b: usize) -> &[usize] {
        self.edge_owners
            .get(&edge_key(a, b))
            .map_or(&[][..], |o| o.as_slice())
    }

    /// Vertices where the owner set of the boundary changes.
    fn ownership_anchors(&self, ring: &[usize]) -> Vec<usize> {
        let n = ring.len();
        (0..n)
            .filter(|&i| {
                let v = ring[i];
                if self.forced.contains(&v) {
                    return true;
                }
                let owners = self.vertex_owners.get(&v).map_or(&[][..], |o| o.as_slice());
                owners != self.edge_owners(ring[(i + n - 1) % n], v)
                    || owners != self.edge_owners(v, ring[(i + 1) % n])
            })
            .collect()
    }

    /// Snap `p` to a shared point within tolerance.
    fn snap(&self, p: &Point2<f64>) -> Point2<f64> {
        match self.index.nearest(p) {
            Some((v, d)) if d <= self.tol => self.points[v],
            _ => *p,
        }
    }
}

/// Pairs of polygons whose domains overlap.
fn find_overlaps(polygons: &[Option<&Polygon>], tol: f64) -> Vec<(usize, usize)> {
    let bounds: Vec<Option<Bounds>> = polygons
        .iter()
        .map(|p| p.and_then(|p| p.bounds()))
        .collect();
    let mut pairs = Vec::new();
    for i in 0..polygons.len() {
        for j in i + 1..polygons.len() {
            let (Some(a), Some(b)) = (polygons[i], polygons[j]) else {
                continue;
            };
            let (Some(ba), Some(bb)) = (&bounds[i], &bounds[j]) else {
                continue;
            };
            let disjoint = ba.max.x < bb.min.x - tol
                || bb.max.x < ba.min.x - tol
                || ba.max.y < bb.min.y - tol
                || bb.max.y < ba.min.y - tol;
            if !disjoint && polygons_overlap(a, b, tol) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

fn ring_edges(polygon: &Polygon) -> Vec<(Point2<f64>, Point2<f64>)> {
    polygon
        .rings()
        .flat_map(|ring| {
            let n = ring.len();
            (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
        })
        .collect()
}

/// Crossing edges, or a vertex of one strictly inside the other.
fn polygons_overlap(a: &Polygon, b: &Polygon, tol: f64) -> bool {
    let b_edges = ring_edges(b);
    let index = SegmentIndex::build(b_edges.iter().copied());
    let crossing = ring_edges(a).iter().any(|(a0, a1)| {
        index.candidates(a0, a1, tol).into_iter().any(|k| {
            let (b0, b1) = b_edges[k];
            segments_cross(a0, a1, &b0, &b1)
        })
    });
    if crossing {
        return true;
    }
    let strictly_inside =
        |p: &Point2<f64>, q: &Polygon| q.contains(p) && q.distance_to_boundary(p) > tol;
    a.rings().flatten().any(|p| strictly_inside(p, b))
        || b.rings().flatten().any(|p| strictly_inside(p, a))
}

/// Size function and refine plan of one polygon.
fn build_size(job: &MeshingJob, polygon: &Polygon) -> Result<Arc<dyn SizeFunction>> {
    let rings = || polygon.rings().map(|r| r.as_slice());
    Ok(match &job.size {
        SizeSpec::Boundary => Arc::new(PolygonSize::from_rings(rings(), job.bias)?),
        SizeSpec::Constant(s) => Arc::new(ConstantSize::new(*s)?),
        SizeSpec::BoundaryToConstant(s) => Arc::new(BiasedConstantSize::new(
            PolygonSize::from_rings(rings(), job.bias)?,
            *s,
            job.bias,
        )?),
        SizeSpec::Function(f) => Arc::clone(f),
    })
}

/// Read-only inputs of the per-polygon stage.
struct Context<'a> {
    jobs: &'a [MeshingJob],
    options: &'a MesherOptions,
    shared: &'a SharedBoundary,
    sizes: &'a [Option<Arc<dyn SizeFunction>>],
    plans: &'a [RefinePlan],
}

impl Context<'_> {
    fn redistribute(
        &self,
        points: &[Point2<f64>],
        closed: bool,
        anchors: &[usize],
        size: &dyn SizeFunction,
    ) -> Result<Vec<Point2<f64>>> {
        let opts = &self.options.redistribute;
        match &self.options.curvature {
            Some(curvature) => redistribute_anchored(
                points,
                closed,
                anchors,
                &CurvatureProfile::new(size, 0, opts, curvature),
                opts,
            ),
            None => redistribute_anchored(points, closed, anchors, &SizeProfile::new(size, 0, opts), opts),
        }
    }

    /// Size function of a chain owned by `owners`.
    fn chain_size(&self, owners: &[usize], own: &Arc<dyn SizeFunction>) -> Result<Arc<dyn SizeFunction>> {
        if owners.len() < 2 {
            return Ok(Arc::clone(own));
        }
        let parts: Vec<Arc<dyn SizeFunction>> =
            owners.iter().filter_map(|&o| self.sizes[o].clone()).collect();
        Ok(Arc::new(MinSize::new(parts)?))
    }

    /// Redistribute one boundary ring, chain by chain. Also returns whether
    /// any part of the ring is shared with another polygon.
    fn redistribute_ring(
        &self,
        ids: &[usize],
        size: &Arc<dyn SizeFunction>,
    ) -> Result<(Vec<Point2<f64>>, bool)> {
        let n = ids.len();
        let points: Vec<Point2<f64>> = ids.iter().map(|&v| self.shared.points[v]).collect();
        let boundary = self.shared;
        let owners = move |i: usize| boundary.edge_owners(ids[i], ids[(i + 1) % n]);
        let shared = (0..n).any(|i| owners(i).len() > 1);

        let mut anchors = self.shared.ownership_anchors(ids);
        anchors.extend(find_corners(&points, true, self.options.redistribute.corner_angle));
        anchors.sort_unstable();
        anchors.dedup();

        if !shared {
            let ring = self.redistribute(&points, true, &anchors, size.as_ref())?;
            return Ok((ring, false));
        }
        if anchors.len() < 2 {
            // A fully shared ring is walked in opposite directions by its
            // owners; split it at vertices both can find.
            let by_lex = |&i: &usize, &j: &usize| {
                if lex_less(&points[i], &points[j]) {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                }
            };
            anchors.extend((0..n).min_by(by_lex));
            anchors.extend((0..n).max_by(by_lex));
            anchors.sort_unstable();
            anchors.dedup();
        }

        let mut ring = Vec::with_capacity(n);
        for c in 0..anchors.len() {
            let (a, b) = (anchors[c], anchors[(c + 1) % anchors.len()]);
            let len = if b > a { b - a } else { b + n - a };
            let chain: Vec<Point2<f64>> = (0..=len).map(|k| points[(a + k) % n]).collect();
            let chain_size = self.chain_size(owners(a), size)?;
            let resampled = self.redistribute(&chain, false, &[], chain_size.as_ref())?;
            ring.extend_from_slice(&resampled[..resampled.len() - 1]);
        }
        if ring.len() < 3 {
            return Err(MeshError::spacing("boundary ring has fewer than three points"));
        }
        Ok((ring, true))
    }

    fn breaklines(
        &self,
        job: &MeshingJob,
        domain: &Polygon,
        size: &Arc<dyn SizeFunction>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<Vec<Point2<f64>>> {
        let tol = self.shared.tol;
        let mut lines = Vec::new();
        for (k, input) in job.breaklines.iter().enumerate() {
            let mut line: Vec<Point2<f64>> = Vec::with_capacity(input.len());
            for p in input {
                if line.last().map_or(true, |q: &Point2<f64>| (p - q).norm() > tol) {
                    line.push(*p);
                }
            }
            if line.len() < 2 {
                diagnostics.push(Diagnostic::warning(
                    IssueKind::BreaklineSkipped,
                    format!("breakline {} has fewer than two distinct points", k),
                ));
                continue;
            }
            let last = line.len() - 1;
            line[0] = self.shared.snap(&line[0]);
            line[last] = self.shared.snap(&line[last]);
            if let Some(p) = line
                .iter()
                .find(|p| !domain.contains(p) && domain.distance_to_boundary(p) > tol)
            {
                diagnostics.push(
                    Diagnostic::warning(
                        IssueKind::BreaklineSkipped,
                        format!("breakline {} leaves the polygon", k),
                    )
                    .at(*p),
                );
                continue;
            }
            let corners = find_corners(&line, false, self.options.redistribute.corner_angle);
            match self.redistribute(&line, false, &corners, size.as_ref()) {
                Ok(resampled) => lines.push(resampled),
                Err(e) => diagnostics.push(Diagnostic::warning(
                    IssueKind::BreaklineSkipped,
                    format!("breakline {} could not be redistributed: {}", k, e),
                )),
            }
        }
        lines
    }

    /// The full pipeline of one polygon.
    fn mesh_polygon(&self, index: usize, diagnostics: &mut Vec<Diagnostic>) -> Result<Mesh2d> {
        let job = &self.jobs[index];
        let options = self.options;
        let size = self.sizes[index]
            .clone()
            .ok_or_else(|| MeshError::spacing("no size function"))?;
        let plan = &self.plans[index];

        let mut rings = Vec::with_capacity(self.shared.rings[index].len());
        let mut shared = false;
        for ids in &self.shared.rings[index] {
            let (ring, ring_shared) = self.redistribute_ring(ids, &size)?;
            rings.push(ring);
            shared |= ring_shared;
        }
        if rings.is_empty() {
            return Err(MeshError::geometry("polygon has no boundary"));
        }
        let outer = rings.remove(0);
        let domain = Polygon::new(outer, rings);

        let constraints = PaveConstraints {
            breaklines: self.breaklines(job, &domain, &size, diagnostics),
            hard_points: plan.hard_points.clone(),
            seed_points: job.seed_points.clone(),
        };

        let mut patched = None;
        if job.patch && domain.holes.is_empty() && constraints.is_empty() && plan.rings.is_empty() {
            let patch_options = options
                .patch
                .clone()
                .with_resample(options.patch.resample && !shared);
            match fill_patch(&domain.outer, &patch_options)? {
                PatchResult::Filled { points, quads, .. } => {
                    let mut mesh = Mesh2d::with_capacity(points.len(), quads.len());
                    mesh.points = points;
                    mesh.cells = quads.into_iter().map(Cell::Quad).collect();
                    patched = Some(mesh);
                }
                PatchResult::NotApplicable { reason } => {
                    diagnostics.push(Diagnostic::info(IssueKind::PatchNotApplicable, reason));
                }
            }
        }

        let (mut mesh, fixed, locked) = match patched {
            Some(mesh) => (mesh, Vec::new(), Vec::new()),
            None => {
                let mut holes = domain.holes.clone();
                holes.extend(plan.rings.iter().map(|aux| aux.ring.clone()));
                let paved_domain = Polygon::new(domain.outer.clone(), holes);
                let mut paved = pave_with(
                    &paved_domain,
                    &constraints,
                    size.as_ref(),
                    &SpadeTriangulator,
                    &options.pave,
                )?;
                diagnostics.append(&mut paved.diagnostics);
                let first_aux = 1 + domain.holes.len();
                let starts = paved.ring_starts.get(first_aux..).unwrap_or(&[]);
                let centers = fill_refine_rings(&mut paved.mesh, starts, &plan.rings)?;
                let mut fixed = paved.fixed;
                fixed.extend(centers);
                (paved.mesh, fixed, paved.locked_edges)
            }
        };

        if options.quads {
            if mesh.num_triangles() > 1 {
                let report = merge_triangles(&mut mesh, &locked, &options.quad_options)?;
                diagnostics.extend(report.diagnostics);
            }
        } else if mesh.num_quads() > 0 {
            mesh.split_quads();
        }

        if options.relax {
            let relax_options = if options.parallel {
                options.relax_options.clone()
            } else {
                options.relax_options.clone().sequential()
            };
            let report = relax(&mut mesh, &fixed, Some(size.as_ref()), &relax_options)?;
            diagnostics.extend(report.diagnostics);
        }

        if options.repair && mesh.num_quads() > 0 {
            let report = repair_quads(&mut mesh, &locked, &options.repair_options)?;
            diagnostics.extend(report.diagnostics);
        }

        mesh.validate()?;
        Ok(mesh)
    }
}

fn mesh_polygons_internal(
    jobs: &[MeshingJob],
    options: &MesherOptions,
    progress: Option<&Progress>,
) -> Result<MeshOutput> {
    if !(options.refine_growth.is_finite() && options.refine_growth > 0.0) {
        return Err(MeshError::invalid_param(
            "refine_growth",
            options.refine_growth,
            "must be positive",
        ));
    }
    let tol = match options.tolerance {
        Some(t) if t.is_finite() && t > 0.0 => t,
        Some(t) => return Err(MeshError::invalid_param("tolerance", t, "must be positive")),
        None => tolerance_from_extents(
            jobs.iter()
                .flat_map(|j| j.outer.iter().chain(j.holes.iter().flatten())),
        ),
    };
    let total = jobs.len();
    let report = |current: usize, message: &str| {
        if let Some(p) = progress {
            p.report(current, total, message);
        }
    };
    log::info!("meshing {} polygons (tolerance {:e})", total, tol);

    // Clean
    let clean_options = options.clean.clone().with_tolerance(tol);
    let mut states: Vec<PolygonState> = Vec::with_capacity(total);
    for (i, job) in jobs.iter().enumerate() {
        let mut state = PolygonState::default();
        match clean_polygon(&Polygon::new(job.outer.clone(), job.holes.clone()), &clean_options) {
            Ok(cleaned) => {
                state.polygon = Some(cleaned.polygon);
                state.diagnostics = cleaned.diagnostics;
            }
            Err(e) => state.fail(&job.label(i), e),
        }
        states.push(state);
    }
    report(0, "cleaned");

    if options.check_topology {
        let polygons: Vec<Option<&Polygon>> = states.iter().map(|s| s.polygon.as_ref()).collect();
        let overlaps = find_overlaps(&polygons, tol);
        for (first, second) in overlaps {
            for i in [first, second] {
                states[i].fail(&jobs[i].label(i), MeshError::Overlap { first, second });
            }
        }
    }

    let shared = SharedBoundary::build(jobs, &mut states, tol);

    let mut sizes: Vec<Option<Arc<dyn SizeFunction>>> = vec![None; total];
    let mut plans: Vec<RefinePlan> = vec![RefinePlan::default(); total];
    for (i, job) in jobs.iter().enumerate() {
        let Some(polygon) = states[i].polygon.as_ref().filter(|_| states[i].error.is_none()) else {
            continue;
        };
        let plan = plan_refinement(polygon, &job.refine_points, tol);
        match build_size(job, polygon) {
            Ok(size) if plan.regions.is_empty() => sizes[i] = Some(size),
            Ok(size) => {
                let refined = RefinedSize::new(size, plan.regions.clone(), options.refine_growth);
                sizes[i] = Some(Arc::new(refined));
            }
            Err(e) => {
                states[i].fail(&job.label(i), e);
                continue;
            }
        }
        states[i].diagnostics.extend(plan.diagnostics.iter().cloned());
        plans[i] = plan;
    }
    report(0, "prepared");

    let context = Context {
        jobs,
        options,
        shared: &shared,
        sizes: &sizes,
        plans: &plans,
    };
    let live: Vec<usize> = (0..total).filter(|&i| states[i].is_live()).collect();
    let done = AtomicUsize::new(0);
    let run = |&i: &usize| {
        let mut diagnostics = Vec::new();
        let result = context.mesh_polygon(i, &mut diagnostics);
        let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
        report(finished, "polygon meshed");
        (i, result, diagnostics)
    };
    let results: Vec<(usize, Result<Mesh2d>, Vec<Diagnostic>)> = if options.parallel {
        live.par_iter().map(run).collect()
    } else {
        live.iter().map(run).collect()
    };

    // Merge barrier
    let mut merger = PointMerger::new(tol);
    let mut point_owner: Vec<usize> = Vec::new();
    let mut cells = Vec::new();
    let mut cell_polygons = Vec::new();
    for (i, result, diagnostics) in results {
        let state = &mut states[i];
        state.diagnostics.extend(diagnostics);
        let mesh = match result {
            Ok(mesh) => mesh,
            Err(e) => {
                state.fail(&jobs[i].label(i), e);
                continue;
            }
        };
        let map: Vec<usize> = mesh
            .points
            .iter()
            .map(|p| {
                let id = merger.add(*p);
                if id == point_owner.len() {
                    point_owner.push(i);
                }
                id
            })
            .collect();
        for cell in &mesh.cells {
            let merged = cell.remap(|v| map[v]);
            if merged.has_duplicate_vertices() {
                state.diagnostics.push(
                    Diagnostic::warning(
                        IssueKind::DegenerateCellRemoved,
                        "cell collapsed while merging polygons",
                    )
                    .at(ring_centroid(&mesh.cell_points(cell))),
                );
                continue;
            }
            cells.push(merged);
            cell_polygons.push(i);
        }
        log::debug!(
            "{}: {} points, {} cells",
            jobs[i].label(i),
            mesh.num_points(),
            mesh.num_cells()
        );
    }
    let points = merger.into_points();
    let elevations: Option<Vec<f64>> = jobs.iter().any(|j| j.elevation.is_some()).then(|| {
        points
            .iter()
            .zip(&point_owner)
            .map(|(p, &owner)| jobs[owner].elevation.as_ref().map_or(0.0, |z| z(p)))
            .collect()
    });
    let mesh = Mesh2d {
        points,
        cells,
        elevations,
    };
    report(total, "merged");

    let reports: Vec<PolygonReport> = states
        .into_iter()
        .enumerate()
        .map(|(index, state)| PolygonReport {
            index,
            id: jobs[index].id.clone(),
            status: PolygonStatus::from_diagnostics(&state.diagnostics, state.error.is_some()),
            diagnostics: state.diagnostics,
            error: state.error,
        })
        .collect();
    let status = if reports.iter().all(|r| r.status == PolygonStatus::Success) {
        JobStatus::Success
    } else if mesh.num_cells() == 0 {
        JobStatus::Failed
    } else {
        JobStatus::Partial
    };
    log::info!(
        "meshed {} of {} polygons: {} points, {} cells ({:?})",
        reports.iter().filter(|r| r.error.is_none()).count(),
        total,
        mesh.num_points(),
        mesh.num_cells(),
        status
    );

    Ok(MeshOutput {
        mesh,
        cell_polygons,
        reports,
        status,
    })
}
