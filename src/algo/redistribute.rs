//! Boundary point redistribution.
//!
//! Resamples a polyline or ring so that consecutive points are spaced
//! according to a target spacing profile, while keeping endpoints and
//! selected anchor vertices in place.
//!
//! # Algorithm
//!
//! The spacing `w` is sampled along the curve and varies linearly within each
//! sample segment. The number of elements is `N = round(∫ ds / w)`, and points
//! are placed at equal increments of that integral. The remainder is thus
//! spread over all elements instead of producing a short trailing element.
//!
//! Rings are split into open chains at anchors (corners, shared junctions).
//! Each chain is resampled in a canonical direction, starting from its
//! lexicographically smaller endpoint, so two rings that share a chain
//! produce identical points along it.
//!
//! # Example
//!
//! ```
//! use pavemesh::algo::redistribute::{redistribute_constant, RedistributeOptions};
//! use nalgebra::Point2;
//!
//! let line = vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)];
//! let points = redistribute_constant(&line, false, 1.0, &RedistributeOptions::default()).unwrap();
//! assert_eq!(points.len(), 11);
//! ```

use std::f64::consts::PI;

use nalgebra::Point2;

use crate::error::{MeshError, Result};
use crate::geometry::{interior_angle, lex_less};
use crate::size::{check_size, SizeFunction};

/// Options for point redistribution.
#[derive(Debug, Clone)]
pub struct RedistributeOptions {
    /// Deviation from a straight angle (radians) above which a vertex is a
    /// corner that must be kept (default: 30°).
    pub corner_angle: f64,

    /// Minimum number of points of a redistributed closed ring (default: 3).
    pub min_closed_points: usize,

    /// Maximum number of spacing samples per input segment (default: 16).
    pub max_samples_per_segment: usize,
}

impl Default for RedistributeOptions {
    fn default() -> Self {
        Self {
            corner_angle: PI / 6.0,
            min_closed_points: 3,
            max_samples_per_segment: 16,
        }
    }
}

impl RedistributeOptions {
    /// Set the corner angle in radians.
    pub fn with_corner_angle(mut self, angle: f64) -> Self {
        self.corner_angle = angle.clamp(0.0, PI);
        self
    }

    /// Set the minimum point count of closed rings.
    pub fn with_min_closed_points(mut self, n: usize) -> Self {
        self.min_closed_points = n.max(3);
        self
    }
}

/// Samples a target spacing along a path.
///
/// `path` is an open polyline. When `closed` is true its last point repeats
/// the first and the path is a loop. The returned samples must start and end
/// at the path's endpoints and lie on the path.
pub trait SpacingProfile: Sync {
    /// Sample positions along the path and the target spacing at each.
    fn sample(&self, path: &[Point2<f64>], closed: bool) -> Result<(Vec<Point2<f64>>, Vec<f64>)>;
}

/// Spacing taken from a size function at a given front depth.
///
/// Long segments are subdivided so the size function is sampled at least
/// once per local target length.
#[derive(Debug, Clone, Copy)]
pub struct SizeProfile<'a, S: ?Sized> {
    size: &'a S,
    depth: usize,
    max_samples: usize,
}

impl<'a, S: SizeFunction + ?Sized> SizeProfile<'a, S> {
    /// Profile evaluating `size` at `depth`.
    pub fn new(size: &'a S, depth: usize, options: &RedistributeOptions) -> Self {
        Self {
            size,
            depth,
            max_samples: options.max_samples_per_segment.max(1),
        }
    }
}

impl<S: SizeFunction + ?Sized> SpacingProfile for SizeProfile<'_, S> {
    fn sample(&self, path: &[Point2<f64>], _closed: bool) -> Result<(Vec<Point2<f64>>, Vec<f64>)> {
        let mut samples = Vec::with_capacity(path.len());
        let mut spacing = Vec::with_capacity(path.len());
        let Some(first) = path.first() else {
            return Ok((samples, spacing));
        };
        let mut wa = self.size.size_at_depth(first, self.depth)?;
        samples.push(*first);
        spacing.push(wa);
        for w in path.windows(2) {
            let (a, b) = (w[0], w[1]);
            let wb = self.size.size_at_depth(&b, self.depth)?;
            let len = (b - a).norm();
            let k = (len / wa.min(wb)).ceil().clamp(1.0, self.max_samples as f64) as usize;
            for i in 1..k {
                let p = a + (b - a) * (i as f64 / k as f64);
                samples.push(p);
                spacing.push(self.size.size_at_depth(&p, self.depth)?);
            }
            samples.push(b);
            spacing.push(wb);
            wa = wb;
        }
        Ok((samples, spacing))
    }
}

/// Constant spacing.
#[derive(Debug, Clone, Copy)]
struct ConstantProfile(f64);

impl SpacingProfile for ConstantProfile {
    fn sample(&self, path: &[Point2<f64>], _closed: bool) -> Result<(Vec<Point2<f64>>, Vec<f64>)> {
        Ok((path.to_vec(), vec![self.0; path.len()]))
    }
}

/// Resample a curve with a constant spacing.
///
/// # Errors
///
/// Returns [`MeshError::Spacing`] if the spacing is not positive or the curve
/// has zero length.
pub fn redistribute_constant(
    points: &[Point2<f64>],
    closed: bool,
    spacing: f64,
    options: &RedistributeOptions,
) -> Result<Vec<Point2<f64>>> {
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(MeshError::spacing(format!("spacing {} is not positive", spacing)));
    }
    redistribute_anchored(points, closed, &[], &ConstantProfile(spacing), options)
}

/// Resample a curve with the spacing given by a size function.
///
/// Only the endpoints of an open curve are kept. A closed ring starts at its
/// lexicographically smallest vertex.
pub fn redistribute<S: SizeFunction + ?Sized>(
    points: &[Point2<f64>],
    closed: bool,
    size: &S,
    depth: usize,
    options: &RedistributeOptions,
) -> Result<Vec<Point2<f64>>> {
    redistribute_anchored(points, closed, &[], &SizeProfile::new(size, depth, options), options)
}

/// Resample a curve given explicit per-vertex spacing values.
///
/// Spacing varies linearly between vertices. For a closed ring the closing
/// segment interpolates between the last and first values.
///
/// # Errors
///
/// * [`MeshError::InvalidParameter`] if the spacing slice length differs
/// * [`MeshError::Spacing`] for non-positive spacing or a zero-length curve
pub fn redistribute_with_spacing(
    points: &[Point2<f64>],
    closed: bool,
    spacing: &[f64],
    options: &RedistributeOptions,
) -> Result<Vec<Point2<f64>>> {
    if points.len() != spacing.len() {
        return Err(MeshError::invalid_param(
            "spacing",
            spacing.len(),
            "must have one value per point",
        ));
    }
    if closed {
        let mut path = points.to_vec();
        let mut w = spacing.to_vec();
        if let (Some(&p), Some(&s)) = (points.first(), spacing.first()) {
            path.push(p);
            w.push(s);
        }
        let mut out = distribute(&path, &w, options.min_closed_points.max(3))?;
        out.pop();
        Ok(out)
    } else {
        distribute(points, spacing, 1)
    }
}

/// Resample a curve, keeping the anchor vertices.
///
/// The curve is split at the anchors and each chain is resampled on its own
/// in canonical direction. The endpoints of an open curve are always anchors.
/// A closed ring without anchors is rotated to start at its lexicographically
/// smallest vertex.
pub fn redistribute_anchored<P: SpacingProfile + ?Sized>(
    points: &[Point2<f64>],
    closed: bool,
    anchors: &[usize],
    profile: &P,
    options: &RedistributeOptions,
) -> Result<Vec<Point2<f64>>> {
    let n = points.len();
    if n < 2 {
        return Err(MeshError::spacing("cannot redistribute fewer than two points"));
    }
    let mut anchors: Vec<usize> = anchors.iter().copied().filter(|&a| a < n).collect();
    if !closed {
        anchors.push(0);
        anchors.push(n - 1);
    }
    anchors.sort_unstable();
    anchors.dedup();

    if closed && anchors.is_empty() {
        return redistribute_loop(points, profile, options);
    }

    let chains = if closed { anchors.len() } else { anchors.len() - 1 };
    let mut out = Vec::new();
    for c in 0..chains {
        let a = anchors[c];
        let b = anchors[(c + 1) % anchors.len()];
        let chain = chain_points(points, a, b);
        let min_elements = if a == b { 3 } else { 1 };
        let resampled = redistribute_chain(&chain, profile, min_elements)?;
        out.extend_from_slice(&resampled[..resampled.len() - 1]);
    }
    if !closed {
        out.push(points[n - 1]);
    } else if out.len() < options.min_closed_points.max(3) {
        // Too few points between the anchors to form a ring
        return redistribute_loop(points, profile, options);
    }
    Ok(out)
}

/// Vertices whose interior angle deviates from a straight angle by more
/// than `corner_angle`.
///
/// For open polylines only interior vertices are considered.
pub fn find_corners(points: &[Point2<f64>], closed: bool, corner_angle: f64) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    let range = if closed { 0..n } else { 1..n - 1 };
    range
        .filter(|&i| {
            let prev = &points[(i + n - 1) % n];
            let next = &points[(i + 1) % n];
            (interior_angle(prev, &points[i], next) - PI).abs() > corner_angle
        })
        .collect()
}

/// Points from anchor `a` to anchor `b` inclusive, wrapping around the ring.
/// When `a == b` the whole loop is returned, starting and ending at `a`.
fn chain_points(points: &[Point2<f64>], a: usize, b: usize) -> Vec<Point2<f64>> {
    let n = points.len();
    let len = if b > a { b - a } else { b + n - a };
    (0..=len).map(|k| points[(a + k) % n]).collect()
}

fn redistribute_loop<P: SpacingProfile + ?Sized>(
    points: &[Point2<f64>],
    profile: &P,
    options: &RedistributeOptions,
) -> Result<Vec<Point2<f64>>> {
    let n = points.len();
    let start = (0..n)
        .min_by(|&i, &j| {
            if lex_less(&points[i], &points[j]) {
                std::cmp::Ordering::Less
            } else if lex_less(&points[j], &points[i]) {
                std::cmp::Ordering::Greater
            } else {
                i.cmp(&j)
            }
        })
        .unwrap_or(0);
    let path: Vec<Point2<f64>> = (0..=n).map(|k| points[(start + k) % n]).collect();
    let (samples, spacing) = profile.sample(&path, true)?;
    let mut out = distribute(&samples, &spacing, options.min_closed_points.max(3))?;
    out.pop();
    Ok(out)
}

fn redistribute_chain<P: SpacingProfile + ?Sized>(
    chain: &[Point2<f64>],
    profile: &P,
    min_elements: usize,
) -> Result<Vec<Point2<f64>>> {
    let (first, last) = (chain[0], chain[chain.len() - 1]);
    let reversed = lex_less(&last, &first);
    let path: Vec<Point2<f64>> = if reversed {
        chain.iter().rev().copied().collect()
    } else {
        chain.to_vec()
    };
    let (samples, spacing) = profile.sample(&path, first == last)?;
    let mut out = distribute(&samples, &spacing, min_elements)?;
    if reversed {
        out.reverse();
    }
    Ok(out)
}

/// Place points along an open path at equal increments of `∫ ds / w`.
fn distribute(path: &[Point2<f64>], spacing: &[f64], min_elements: usize) -> Result<Vec<Point2<f64>>> {
    if path.len() < 2 || path.len() != spacing.len() {
        return Err(MeshError::spacing("degenerate curve"));
    }
    for (p, &w) in path.iter().zip(spacing) {
        check_size(w, p)?;
    }

    let segments = path.len() - 1;
    let mut lengths = Vec::with_capacity(segments);
    let mut integrals = Vec::with_capacity(segments);
    for i in 0..segments {
        let len = (path[i + 1] - path[i]).norm();
        lengths.push(len);
        integrals.push(segment_integral(len, spacing[i], spacing[i + 1]));
    }
    let total_length: f64 = lengths.iter().sum();
    if !(total_length > 0.0) {
        return Err(MeshError::spacing("curve has zero length"));
    }
    let total: f64 = integrals.iter().sum();

    let count = if total < 1.0 {
        min_elements
    } else {
        (total.round() as usize).max(min_elements)
    };

    let mut out = Vec::with_capacity(count + 1);
    out.push(path[0]);
    let mut seg = 0;
    let mut before = 0.0;
    for k in 1..count {
        let target = total * k as f64 / count as f64;
        while seg + 1 < segments && before + integrals[seg] < target {
            before += integrals[seg];
            seg += 1;
        }
        let local = (target - before).clamp(0.0, integrals[seg]);
        let s = invert_segment_integral(lengths[seg], spacing[seg], spacing[seg + 1], local);
        let t = if lengths[seg] > 0.0 {
            (s / lengths[seg]).clamp(0.0, 1.0)
        } else {
            0.0
        };
        out.push(path[seg] + (path[seg + 1] - path[seg]) * t);
    }
    out.push(path[segments]);
    Ok(out)
}

/// `∫_0^len ds / w(s)` with `w` linear from `wa` to `wb`.
fn segment_integral(len: f64, wa: f64, wb: f64) -> f64 {
    let delta = wb - wa;
    if delta.abs() <= 1e-9 * wa.max(wb) {
        2.0 * len / (wa + wb)
    } else {
        len / delta * (wb / wa).ln()
    }
}

/// Arc length `s` at which the integral from 0 reaches `value`.
fn invert_segment_integral(len: f64, wa: f64, wb: f64, value: f64) -> f64 {
    let delta = wb - wa;
    let s = if delta.abs() <= 1e-9 * wa.max(wb) {
        value * 0.5 * (wa + wb)
    } else {
        len / delta * wa * ((value * delta / len).exp() - 1.0)
    };
    s.clamp(0.0, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size::FnSize;
    use approx::assert_relative_eq;

    fn line(len: f64) -> Vec<Point2<f64>> {
        vec![Point2::new(0.0, 0.0), Point2::new(len, 0.0)]
    }

    fn square(side: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(side, 0.0),
            Point2::new(side, side),
            Point2::new(0.0, side),
        ]
    }

    fn polygon_circle(n: usize, radius: f64) -> Vec<Point2<f64>> {
        (0..n)
            .map(|i| {
                let t = 2.0 * PI * i as f64 / n as f64;
                Point2::new(radius * t.cos(), radius * t.sin())
            })
            .collect()
    }

    #[test]
    fn test_constant_line() {
        let out = redistribute_constant(&line(10.0), false, 1.0, &RedistributeOptions::default()).unwrap();
        assert_eq!(out.len(), 11);
        for (i, p) in out.iter().enumerate() {
            assert_relative_eq!(p.x, i as f64, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_remainder_is_spread() {
        let out = redistribute_constant(&line(10.0), false, 3.0, &RedistributeOptions::default()).unwrap();
        assert_eq!(out.len(), 4);
        for w in out.windows(2) {
            assert_relative_eq!((w[1] - w[0]).norm(), 10.0 / 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_short_curve_returns_endpoints() {
        let out = redistribute_constant(&line(0.4), false, 1.0, &RedistributeOptions::default()).unwrap();
        assert_eq!(out, line(0.4));
    }

    #[test]
    fn test_invalid_spacing() {
        let opts = RedistributeOptions::default();
        assert!(matches!(
            redistribute_constant(&line(1.0), false, 0.0, &opts),
            Err(MeshError::Spacing { .. })
        ));
        let degenerate = vec![Point2::new(1.0, 1.0), Point2::new(1.0, 1.0)];
        assert!(matches!(
            redistribute_constant(&degenerate, false, 0.5, &opts),
            Err(MeshError::Spacing { .. })
        ));
    }

    #[test]
    fn test_graded_spacing() {
        let size = FnSize(|p: &Point2<f64>| Some(0.25 + 0.25 * p.x));
        let out = redistribute(&line(8.0), false, &size, 0, &RedistributeOptions::default()).unwrap();
        let first = (out[1] - out[0]).norm();
        let last = (out[out.len() - 1] - out[out.len() - 2]).norm();
        assert!(first < last);
        assert_relative_eq!(out[out.len() - 1].x, 8.0);
    }

    #[test]
    fn test_square_keeps_corners() {
        let sq = square(4.0);
        let corners = find_corners(&sq, true, PI / 6.0);
        assert_eq!(corners, vec![0, 1, 2, 3]);
        let opts = RedistributeOptions::default();
        let out = redistribute_anchored(&sq, true, &corners, &ConstantProfile(1.0), &opts).unwrap();
        assert_eq!(out.len(), 16);
        for c in &sq {
            assert!(out.iter().any(|p| (p - c).norm() < 1e-12));
        }
    }

    #[test]
    fn test_shared_chain_is_identical_both_ways() {
        let size = FnSize(|p: &Point2<f64>| Some(0.3 + 0.1 * p.x + 0.05 * p.y));
        let opts = RedistributeOptions::default();
        let chain = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(5.0, 1.5),
        ];
        let reversed: Vec<_> = chain.iter().rev().copied().collect();
        let a = redistribute(&chain, false, &size, 0, &opts).unwrap();
        let mut b = redistribute(&reversed, false, &size, 0, &opts).unwrap();
        b.reverse();
        assert_eq!(a, b);
    }

    #[test]
    fn test_idempotent_on_ring() {
        let opts = RedistributeOptions::default();
        let ring = polygon_circle(64, 5.0);
        let once = redistribute_constant(&ring, true, 0.7, &opts).unwrap();
        let twice = redistribute_constant(&once, true, 0.7, &opts).unwrap();
        assert_eq!(once.len(), twice.len());
        for (p, q) in once.iter().zip(&twice) {
            assert!((p - q).norm() < 0.1 * 0.7);
        }

        // Straight sides reproduce exactly
        let sq = redistribute_constant(&square(4.0), true, 0.5, &opts).unwrap();
        let again = redistribute_constant(&sq, true, 0.5, &opts).unwrap();
        assert_eq!(sq.len(), again.len());
        for (p, q) in sq.iter().zip(&again) {
            assert!((p - q).norm() < 1e-9);
        }
    }

    #[test]
    fn test_closed_short_loop_has_three_points() {
        let out = redistribute_constant(&square(0.1), true, 1.0, &RedistributeOptions::default()).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_open_corners() {
        let path = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.01),
            Point2::new(2.0, 1.0),
        ];
        assert_eq!(find_corners(&path, false, PI / 6.0), vec![2]);
    }
}
