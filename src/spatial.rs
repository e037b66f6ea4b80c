//! Spatial search backed by R-trees.
//!
//! [`PointIndex`] answers nearest-neighbor and radius queries over indexed
//! points, [`PointMerger`] uses it to unify coincident points, and
//! [`SegmentIndex`] returns candidate segment pairs for intersection sweeps.

use nalgebra::Point2;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Nearest-neighbor and radius queries over a point set.
pub trait SpatialIndex {
    /// Indices of the `k` points closest to `p`, nearest first.
    fn nearest_neighbors(&self, p: &Point2<f64>, k: usize) -> Vec<usize>;

    /// Indices of all points within `radius` of `p`, in ascending index order.
    fn within_distance(&self, p: &Point2<f64>, radius: f64) -> Vec<usize>;
}

/// A point stored in the R-tree together with its caller-side index.
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    index: usize,
    xy: [f64; 2],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.xy)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.xy[0] - point[0];
        let dy = self.xy[1] - point[1];
        dx * dx + dy * dy
    }
}

/// R-tree over indexed points.
#[derive(Debug, Default)]
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load an index over `points`, using their positions as indices.
    pub fn build(points: &[Point2<f64>]) -> Self {
        let items = points
            .iter()
            .enumerate()
            .map(|(index, p)| IndexedPoint {
                index,
                xy: [p.x, p.y],
            })
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Add a point under `index`.
    pub fn insert(&mut self, index: usize, p: &Point2<f64>) {
        self.tree.insert(IndexedPoint {
            index,
            xy: [p.x, p.y],
        });
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The closest point and its distance.
    pub fn nearest(&self, p: &Point2<f64>) -> Option<(usize, f64)> {
        let q = [p.x, p.y];
        self.tree
            .nearest_neighbor(&q)
            .map(|ip| (ip.index, ip.distance_2(&q).sqrt()))
    }
}

impl SpatialIndex for PointIndex {
    fn nearest_neighbors(&self, p: &Point2<f64>, k: usize) -> Vec<usize> {
        self.tree
            .nearest_neighbor_iter(&[p.x, p.y])
            .take(k)
            .map(|ip| ip.index)
            .collect()
    }

    fn within_distance(&self, p: &Point2<f64>, radius: f64) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .tree
            .locate_within_distance([p.x, p.y], radius * radius)
            .map(|ip| ip.index)
            .collect();
        found.sort_unstable();
        found
    }
}

/// Accumulates points, returning the existing index for any point within
/// tolerance of one already added.
#[derive(Debug)]
pub struct PointMerger {
    index: PointIndex,
    points: Vec<Point2<f64>>,
    tolerance: f64,
}

impl PointMerger {
    /// Create a merger with the given tolerance.
    pub fn new(tolerance: f64) -> Self {
        Self {
            index: PointIndex::new(),
            points: Vec::new(),
            tolerance,
        }
    }

    /// Add a point and return its unified index.
    ///
    /// When several stored points are within tolerance the lowest index wins.
    pub fn add(&mut self, p: Point2<f64>) -> usize {
        if let Some(&existing) = self.index.within_distance(&p, self.tolerance).first() {
            return existing;
        }
        let idx = self.points.len();
        self.index.insert(idx, &p);
        self.points.push(p);
        idx
    }

    /// The unified points.
    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    /// Consume the merger, returning the unified points.
    pub fn into_points(self) -> Vec<Point2<f64>> {
        self.points
    }
}

/// Bounding box of a segment stored with its caller-side index.
#[derive(Debug, Clone, Copy)]
struct SegmentEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for SegmentEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// R-tree over segment bounding boxes.
#[derive(Debug)]
pub struct SegmentIndex {
    tree: RTree<SegmentEnvelope>,
}

impl SegmentIndex {
    /// Index segments by position in the iterator.
    pub fn build(segments: impl IntoIterator<Item = (Point2<f64>, Point2<f64>)>) -> Self {
        let items = segments
            .into_iter()
            .enumerate()
            .map(|(index, (a, b))| SegmentEnvelope {
                index,
                aabb: AABB::from_corners([a.x, a.y], [b.x, b.y]),
            })
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Index the edges of closed rings; segment `k` runs from point `k` to
    /// point `k + 1` (wrapping) of the concatenated rings.
    pub fn from_ring(ring: &[Point2<f64>]) -> Self {
        let n = ring.len();
        Self::build((0..n).map(|i| (ring[i], ring[(i + 1) % n])))
    }

    /// Segments whose boxes intersect the box of `a-b` grown by `pad`.
    /// Sorted by index.
    pub fn candidates(&self, a: &Point2<f64>, b: &Point2<f64>, pad: f64) -> Vec<usize> {
        let query = AABB::from_corners(
            [a.x.min(b.x) - pad, a.y.min(b.y) - pad],
            [a.x.max(b.x) + pad, a.y.max(b.y) + pad],
        );
        let mut found: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|s| s.index)
            .collect();
        found.sort_unstable();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_points() -> Vec<Point2<f64>> {
        let mut pts = Vec::new();
        for j in 0..5 {
            for i in 0..5 {
                pts.push(Point2::new(i as f64, j as f64));
            }
        }
        pts
    }

    #[test]
    fn test_nearest_neighbors() {
        let index = PointIndex::build(&grid_points());
        let near = index.nearest_neighbors(&Point2::new(2.1, 2.0), 1);
        assert_eq!(near, vec![12]);
        let (idx, dist) = index.nearest(&Point2::new(0.0, 0.5)).unwrap();
        assert!(idx == 0 || idx == 5);
        assert!((dist - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_within_distance_sorted() {
        let index = PointIndex::build(&grid_points());
        let found = index.within_distance(&Point2::new(2.0, 2.0), 1.0);
        assert_eq!(found, vec![7, 11, 12, 13, 17]);
    }

    #[test]
    fn test_point_merger() {
        let mut merger = PointMerger::new(1e-6);
        let a = merger.add(Point2::new(1.0, 1.0));
        let b = merger.add(Point2::new(2.0, 1.0));
        let c = merger.add(Point2::new(1.0 + 1e-9, 1.0));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(merger.points().len(), 2);
    }

    #[test]
    fn test_segment_candidates() {
        let ring = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ];
        let index = SegmentIndex::from_ring(&ring);
        let found = index.candidates(&Point2::new(3.5, 1.0), &Point2::new(4.5, 2.0), 0.0);
        assert_eq!(found, vec![1]);
        assert!(index
            .candidates(&Point2::new(1.0, 1.0), &Point2::new(2.0, 2.0), 0.0)
            .is_empty());
    }
}
