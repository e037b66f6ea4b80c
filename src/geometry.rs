//! Planar geometry primitives shared by every meshing stage.
//!
//! All rings are stored without a repeated closing point. Outer rings are
//! counter-clockwise and holes clockwise, so the domain always lies on the
//! left of a directed ring edge.

use std::f64::consts::PI;

use nalgebra::{Point2, Vector2};

/// Twice the signed area of the triangle `(o, a, b)`.
///
/// Positive when `b` lies to the left of the directed line `o -> a`.
#[inline]
pub fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Signed area of the triangle `(a, b, c)`; positive when counter-clockwise.
#[inline]
pub fn triangle_area(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    0.5 * cross(a, b, c)
}

/// Signed area of a closed ring (shoelace formula).
pub fn signed_area(ring: &[Point2<f64>]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = &ring[i];
        let b = &ring[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    0.5 * sum
}

/// Length of an open polyline.
pub fn polyline_length(points: &[Point2<f64>]) -> f64 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}

/// Perimeter of a closed ring.
pub fn ring_perimeter(ring: &[Point2<f64>]) -> f64 {
    if ring.len() < 2 {
        return 0.0;
    }
    polyline_length(ring) + (ring[0] - ring[ring.len() - 1]).norm()
}

/// Area centroid of a ring, falling back to the vertex average for
/// degenerate rings.
pub fn ring_centroid(ring: &[Point2<f64>]) -> Point2<f64> {
    let n = ring.len();
    if n == 0 {
        return Point2::origin();
    }
    let area = signed_area(ring);
    if area.abs() < 1e-300 {
        let sum = ring
            .iter()
            .fold(Vector2::zeros(), |acc: Vector2<f64>, p| acc + p.coords);
        return Point2::from(sum / n as f64);
    }
    let (mut cx, mut cy) = (0.0, 0.0);
    for i in 0..n {
        let a = &ring[i];
        let b = &ring[(i + 1) % n];
        let f = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * f;
        cy += (a.y + b.y) * f;
    }
    Point2::new(cx / (6.0 * area), cy / (6.0 * area))
}

/// Winding number of `ring` around `p`.
pub fn winding_number(ring: &[Point2<f64>], p: &Point2<f64>) -> i32 {
    let n = ring.len();
    let mut wn = 0;
    for i in 0..n {
        let a = &ring[i];
        let b = &ring[(i + 1) % n];
        if a.y <= p.y {
            if b.y > p.y && cross(a, b, p) > 0.0 {
                wn += 1;
            }
        } else if b.y <= p.y && cross(a, b, p) < 0.0 {
            wn -= 1;
        }
    }
    wn
}

/// Whether `p` lies inside `ring` (either orientation).
#[inline]
pub fn point_in_ring(ring: &[Point2<f64>], p: &Point2<f64>) -> bool {
    winding_number(ring, p) != 0
}

/// Intersection parameters of segments `a0-a1` and `b0-b1`.
///
/// Returns `(t, u)` with the intersection at `a0 + t (a1 - a0)` and
/// `b0 + u (b1 - b0)`, both in `[0, 1]`. Parallel and collinear segments
/// return `None`.
pub fn segment_intersection(
    a0: &Point2<f64>,
    a1: &Point2<f64>,
    b0: &Point2<f64>,
    b1: &Point2<f64>,
) -> Option<(f64, f64)> {
    let r = a1 - a0;
    let s = b1 - b0;
    let denom = r.perp(&s);
    let scale = r.norm() * s.norm();
    if denom.abs() <= 1e-14 * scale || scale == 0.0 {
        return None;
    }
    let qp = b0 - a0;
    let t = qp.perp(&s) / denom;
    let u = qp.perp(&r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some((t, u))
    } else {
        None
    }
}

/// Whether segments `a0-a1` and `b0-b1` cross at a point interior to both.
pub fn segments_cross(
    a0: &Point2<f64>,
    a1: &Point2<f64>,
    b0: &Point2<f64>,
    b1: &Point2<f64>,
) -> bool {
    const EPS: f64 = 1e-9;
    matches!(
        segment_intersection(a0, a1, b0, b1),
        Some((t, u)) if t > EPS && t < 1.0 - EPS && u > EPS && u < 1.0 - EPS
    )
}

/// Distance from `p` to the segment `a-b`.
pub fn distance_to_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Angle at `cur` measured on the left side of the path `prev -> cur -> next`.
///
/// For a counter-clockwise outer ring (or a clockwise hole) this is the
/// interior angle on the domain side, in `[0, 2π)`.
pub fn interior_angle(prev: &Point2<f64>, cur: &Point2<f64>, next: &Point2<f64>) -> f64 {
    let u = next - cur;
    let v = prev - cur;
    let mut a = u.perp(&v).atan2(u.dot(&v));
    if a < 0.0 {
        a += 2.0 * PI;
    }
    a
}

/// The three corner angles of a triangle.
pub fn triangle_angles(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> [f64; 3] {
    [
        vector_angle(&(b - a), &(c - a)),
        vector_angle(&(c - b), &(a - b)),
        vector_angle(&(a - c), &(b - c)),
    ]
}

/// Smallest corner angle of a triangle, in radians.
pub fn triangle_min_angle(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    let [x, y, z] = triangle_angles(a, b, c);
    x.min(y).min(z)
}

/// Unsigned angle between two vectors, in `[0, π]`.
#[inline]
pub fn vector_angle(u: &Vector2<f64>, v: &Vector2<f64>) -> f64 {
    u.perp(v).abs().atan2(u.dot(v))
}

/// Circumradius of a triangle, or `None` when the points are collinear.
pub fn circumradius(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> Option<f64> {
    let area2 = cross(a, b, c).abs();
    if area2 <= f64::EPSILON * (b - a).norm_squared().max((c - a).norm_squared()) {
        return None;
    }
    let la = (b - c).norm();
    let lb = (a - c).norm();
    let lc = (a - b).norm();
    Some(la * lb * lc / (2.0 * area2))
}

/// Lexicographic order on `(x, y)`.
#[inline]
pub fn lex_less(a: &Point2<f64>, b: &Point2<f64>) -> bool {
    a.x < b.x || (a.x == b.x && a.y < b.y)
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Lower-left corner.
    pub min: Point2<f64>,
    /// Upper-right corner.
    pub max: Point2<f64>,
}

impl Bounds {
    /// Bounds of a set of points, or `None` if the set is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2<f64>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut b = Bounds {
            min: first,
            max: first,
        };
        for p in iter {
            b.include(p);
        }
        Some(b)
    }

    /// Grow the box to contain `p`.
    pub fn include(&mut self, p: &Point2<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Length of the diagonal.
    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).norm()
    }
}

/// Comparison tolerance derived from the extents of a point set.
pub fn tolerance_from_extents<'a>(points: impl IntoIterator<Item = &'a Point2<f64>>) -> f64 {
    match Bounds::from_points(points) {
        Some(b) => (b.diagonal() * 1e-9).max(1e-12),
        None => 1e-9,
    }
}

/// A polygonal domain: one outer ring and zero or more holes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    /// Outer boundary, counter-clockwise.
    pub outer: Vec<Point2<f64>>,
    /// Holes, each clockwise.
    pub holes: Vec<Vec<Point2<f64>>>,
}

impl Polygon {
    /// Create a polygon from an outer ring and holes.
    pub fn new(outer: Vec<Point2<f64>>, holes: Vec<Vec<Point2<f64>>>) -> Self {
        Self { outer, holes }
    }

    /// Area of the domain (outer area minus hole areas).
    pub fn area(&self) -> f64 {
        signed_area(&self.outer).abs() - self.holes.iter().map(|h| signed_area(h).abs()).sum::<f64>()
    }

    /// Whether `p` lies inside the outer ring and outside every hole.
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        point_in_ring(&self.outer, p) && self.holes.iter().all(|h| !point_in_ring(h, p))
    }

    /// Iterate over all rings, outer first.
    pub fn rings(&self) -> impl Iterator<Item = &Vec<Point2<f64>>> {
        std::iter::once(&self.outer).chain(self.holes.iter())
    }

    /// Bounding box of the outer ring.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.outer)
    }

    /// Minimum distance from `p` to any ring edge.
    pub fn distance_to_boundary(&self, p: &Point2<f64>) -> f64 {
        self.rings()
            .flat_map(|ring| {
                let n = ring.len();
                (0..n).map(move |i| distance_to_segment(p, &ring[i], &ring[(i + 1) % n]))
            })
            .fold(f64::INFINITY, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_signed_area_orientation() {
        let mut sq = unit_square();
        assert_relative_eq!(signed_area(&sq), 1.0);
        sq.reverse();
        assert_relative_eq!(signed_area(&sq), -1.0);
    }

    #[test]
    fn test_centroid_of_square() {
        let c = ring_centroid(&unit_square());
        assert_relative_eq!(c.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(c.y, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_winding_both_orientations() {
        let mut sq = unit_square();
        let inside = Point2::new(0.25, 0.75);
        let outside = Point2::new(1.5, 0.5);
        assert_eq!(winding_number(&sq, &inside), 1);
        assert_eq!(winding_number(&sq, &outside), 0);
        sq.reverse();
        assert_eq!(winding_number(&sq, &inside), -1);
        assert!(point_in_ring(&sq, &inside));
    }

    #[test]
    fn test_segment_intersection() {
        let (t, u) = segment_intersection(
            &Point2::new(0.0, 0.0),
            &Point2::new(2.0, 2.0),
            &Point2::new(0.0, 2.0),
            &Point2::new(2.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(t, 0.5);
        assert_relative_eq!(u, 0.5);

        assert!(segment_intersection(
            &Point2::new(0.0, 0.0),
            &Point2::new(1.0, 0.0),
            &Point2::new(0.0, 1.0),
            &Point2::new(1.0, 1.0),
        )
        .is_none());
    }

    #[test]
    fn test_segments_cross_ignores_shared_endpoint() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        let c = Point2::new(1.0, 1.0);
        assert!(!segments_cross(&a, &b, &b, &c));
    }

    #[test]
    fn test_interior_angle() {
        let sq = unit_square();
        let a = interior_angle(&sq[0], &sq[1], &sq[2]);
        assert_relative_eq!(a, PI / 2.0, epsilon = 1e-12);

        // Reflex vertex of an L-shape
        let a = interior_angle(
            &Point2::new(2.0, 1.0),
            &Point2::new(1.0, 1.0),
            &Point2::new(1.0, 2.0),
        );
        assert_relative_eq!(a, 1.5 * PI, epsilon = 1e-12);
    }

    #[test]
    fn test_triangle_min_angle_equilateral() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        let c = Point2::new(0.5, 3.0_f64.sqrt() / 2.0);
        assert_relative_eq!(triangle_min_angle(&a, &b, &c), PI / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_circumradius() {
        let r = circumradius(
            &Point2::new(1.0, 0.0),
            &Point2::new(0.0, 1.0),
            &Point2::new(-1.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(r, 1.0, epsilon = 1e-12);
        assert!(circumradius(
            &Point2::new(0.0, 0.0),
            &Point2::new(1.0, 0.0),
            &Point2::new(2.0, 0.0)
        )
        .is_none());
    }

    #[test]
    fn test_polygon_contains_respects_holes() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ];
        let hole = vec![
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 3.0),
            Point2::new(3.0, 3.0),
            Point2::new(3.0, 1.0),
        ];
        let poly = Polygon::new(outer, vec![hole]);
        assert!(poly.contains(&Point2::new(0.5, 0.5)));
        assert!(!poly.contains(&Point2::new(2.0, 2.0)));
        assert_relative_eq!(poly.area(), 12.0);
        assert_relative_eq!(poly.distance_to_boundary(&Point2::new(2.0, 2.0)), 1.0);
    }

    #[test]
    fn test_tolerance_from_extents() {
        let tol = tolerance_from_extents(&unit_square());
        assert_relative_eq!(tol, 2.0_f64.sqrt() * 1e-9, epsilon = 1e-18);
    }
}
