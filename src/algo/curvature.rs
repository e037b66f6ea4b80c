//! Curvature-aware boundary redistribution.
//!
//! A variant of [`redistribute`](super::redistribute) where the target
//! spacing shrinks where the boundary bends, so curved features keep enough
//! points to be represented faithfully.
//!
//! # Algorithm
//!
//! 1. Sample the size function along the curve (spacing `w`).
//! 2. At each sample, the curvature `κ` is the inverse circumradius of the
//!    points half a feature length before and after it along the curve.
//! 3. Optionally smooth `κ` with weights 0.25/0.5/0.25.
//! 4. The spacing becomes `w · clamp(law(κ·w), min_ratio, max_ratio)`.
//!
//! The default law is `1 / (1 + x)`, so a bend whose radius equals the local
//! size halves the spacing.
//!
//! # Example
//!
//! ```
//! use pavemesh::algo::curvature::{redistribute_by_curvature, CurvatureOptions};
//! use pavemesh::algo::redistribute::RedistributeOptions;
//! use pavemesh::size::ConstantSize;
//! use nalgebra::Point2;
//!
//! let ring: Vec<_> = (0..32)
//!     .map(|i| {
//!         let t = i as f64 / 32.0 * std::f64::consts::TAU;
//!         Point2::new(t.cos(), t.sin())
//!     })
//!     .collect();
//! let size = ConstantSize::new(0.5).unwrap();
//! let points = redistribute_by_curvature(
//!     &ring,
//!     true,
//!     &[],
//!     &size,
//!     0,
//!     &RedistributeOptions::default(),
//!     &CurvatureOptions::default(),
//! )
//! .unwrap();
//! // Bending shrinks the spacing below 0.5
//! assert!(points.len() > 13);
//! ```

use std::sync::Arc;

use nalgebra::Point2;

use super::redistribute::{redistribute_anchored, RedistributeOptions, SizeProfile, SpacingProfile};
use crate::error::Result;
use crate::geometry::circumradius;
use crate::size::SizeFunction;

/// Maps the dimensionless bending `κ·w` to a spacing ratio.
pub type CurvatureLaw = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Options for curvature-aware redistribution.
#[derive(Clone)]
pub struct CurvatureOptions {
    /// Arc length over which curvature is measured. `None` uses the local
    /// target spacing.
    pub feature_size: Option<f64>,

    /// Smallest spacing ratio (default: 0.2).
    pub min_ratio: f64,

    /// Largest spacing ratio (default: 1.0).
    pub max_ratio: f64,

    /// Smooth curvature with a 0.25/0.5/0.25 stencil (default: true).
    pub smooth: bool,

    /// Scaling law from `κ·w` to spacing ratio (default: `1 / (1 + x)`).
    pub law: CurvatureLaw,
}

impl Default for CurvatureOptions {
    fn default() -> Self {
        Self {
            feature_size: None,
            min_ratio: 0.2,
            max_ratio: 1.0,
            smooth: true,
            law: Arc::new(|x| 1.0 / (1.0 + x)),
        }
    }
}

impl CurvatureOptions {
    /// Measure curvature over a fixed arc length.
    pub fn with_feature_size(mut self, size: f64) -> Self {
        self.feature_size = Some(size.abs());
        self
    }

    /// Set the spacing ratio range.
    pub fn with_ratio_range(mut self, min_ratio: f64, max_ratio: f64) -> Self {
        let lo = min_ratio.max(1e-3);
        self.min_ratio = lo;
        self.max_ratio = max_ratio.max(lo);
        self
    }

    /// Enable or disable curvature smoothing.
    pub fn with_smoothing(mut self, smooth: bool) -> Self {
        self.smooth = smooth;
        self
    }

    /// Replace the scaling law.
    pub fn with_law<F>(mut self, law: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.law = Arc::new(law);
        self
    }
}

impl std::fmt::Debug for CurvatureOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurvatureOptions")
            .field("feature_size", &self.feature_size)
            .field("min_ratio", &self.min_ratio)
            .field("max_ratio", &self.max_ratio)
            .field("smooth", &self.smooth)
            .finish_non_exhaustive()
    }
}

/// Spacing profile combining a size function with boundary curvature.
pub struct CurvatureProfile<'a, S: ?Sized> {
    base: SizeProfile<'a, S>,
    options: &'a CurvatureOptions,
}

impl<'a, S: SizeFunction + ?Sized> CurvatureProfile<'a, S> {
    /// Profile for `size` at `depth`.
    pub fn new(
        size: &'a S,
        depth: usize,
        redistribute: &RedistributeOptions,
        options: &'a CurvatureOptions,
    ) -> Self {
        Self {
            base: SizeProfile::new(size, depth, redistribute),
            options,
        }
    }
}

impl<S: SizeFunction + ?Sized> SpacingProfile for CurvatureProfile<'_, S> {
    fn sample(&self, path: &[Point2<f64>], closed: bool) -> Result<(Vec<Point2<f64>>, Vec<f64>)> {
        let (samples, spacing) = self.base.sample(path, closed)?;
        let kappa = sample_curvature(&samples, closed, |i| {
            self.options.feature_size.unwrap_or(spacing[i])
        });
        let kappa = if self.options.smooth {
            smooth_curvature(&kappa, closed)
        } else {
            kappa
        };
        let lo = self.options.min_ratio;
        let hi = self.options.max_ratio.max(lo);
        let adjusted = spacing
            .iter()
            .zip(&kappa)
            .map(|(&w, &k)| {
                let ratio = (self.options.law)(k * w);
                let ratio = if ratio.is_finite() { ratio.clamp(lo, hi) } else { lo };
                w * ratio
            })
            .collect();
        Ok((samples, adjusted))
    }
}

/// Redistribute a curve with curvature-scaled spacing, keeping anchors.
pub fn redistribute_by_curvature<S: SizeFunction + ?Sized>(
    points: &[Point2<f64>],
    closed: bool,
    anchors: &[usize],
    size: &S,
    depth: usize,
    redistribute: &RedistributeOptions,
    options: &CurvatureOptions,
) -> Result<Vec<Point2<f64>>> {
    let profile = CurvatureProfile::new(size, depth, redistribute, options);
    redistribute_anchored(points, closed, anchors, &profile, redistribute)
}

/// Curvature at each vertex of a path, measured over `feature(i)` arc length.
///
/// For a closed path the last point repeats the first.
pub fn sample_curvature(
    path: &[Point2<f64>],
    closed: bool,
    feature: impl Fn(usize) -> f64,
) -> Vec<f64> {
    let n = path.len();
    if n < 3 {
        return vec![0.0; n];
    }
    let mut arc = Vec::with_capacity(n);
    let mut s = 0.0;
    arc.push(0.0);
    for w in path.windows(2) {
        s += (w[1] - w[0]).norm();
        arc.push(s);
    }
    let total = s;
    if total <= 0.0 {
        return vec![0.0; n];
    }

    (0..n)
        .map(|i| {
            let half = 0.5 * feature(i);
            if half <= 0.0 {
                return 0.0;
            }
            let before = point_at(path, &arc, arc[i] - half, closed);
            let after = point_at(path, &arc, arc[i] + half, closed);
            circumradius(&before, &path[i], &after).map_or(0.0, |r| 1.0 / r)
        })
        .collect()
}

/// Smooth curvature values with a 0.25/0.5/0.25 stencil.
pub fn smooth_curvature(values: &[f64], closed: bool) -> Vec<f64> {
    let n = values.len();
    if n < 3 {
        return values.to_vec();
    }
    (0..n)
        .map(|i| {
            let (prev, next) = if closed {
                // Index 0 and n - 1 are the same point
                let prev = if i == 0 { n - 2 } else { i - 1 };
                let next = if i == n - 1 { 1 } else { i + 1 };
                (prev, next)
            } else {
                (i.saturating_sub(1), (i + 1).min(n - 1))
            };
            0.25 * values[prev] + 0.5 * values[i] + 0.25 * values[next]
        })
        .collect()
}

/// Position at arc length `s`, wrapping for loops and clamping otherwise.
fn point_at(path: &[Point2<f64>], arc: &[f64], s: f64, closed: bool) -> Point2<f64> {
    let total = arc[arc.len() - 1];
    let s = if closed {
        s.rem_euclid(total)
    } else {
        s.clamp(0.0, total)
    };
    let k = arc.partition_point(|&a| a <= s).clamp(1, arc.len() - 1);
    let (a, b) = (arc[k - 1], arc[k]);
    let t = if b > a { (s - a) / (b - a) } else { 0.0 };
    path[k - 1] + (path[k] - path[k - 1]) * t
}
