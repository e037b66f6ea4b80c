//! Target element size functions.
//!
//! A [`SizeFunction`] maps a location to the desired local edge length. The
//! pipeline treats it as a black box: it must return a positive length, or
//! an error for locations outside its domain.
//!
//! # Provided implementations
//!
//! - [`ConstantSize`]: one size everywhere
//! - [`FnSize`]: wraps a closure (e.g. an interpolated scattered field)
//! - [`PolygonSize`]: inverse-distance weighting of the boundary edge lengths
//! - [`BiasedConstantSize`]: moves from a boundary-derived size toward a
//!   constant as paving advances inward
//! - [`RefinedSize`]: local refinement around refine points
//! - [`MinSize`]: pointwise minimum of several functions
//!
//! # Example
//!
//! ```
//! use pavemesh::size::{ConstantSize, SizeFunction};
//! use nalgebra::Point2;
//!
//! let size = ConstantSize::new(0.5).unwrap();
//! assert_eq!(size.size_at(&Point2::new(3.0, 4.0)).unwrap(), 0.5);
//! ```

use std::sync::Arc;

use nalgebra::Point2;

use crate::error::{MeshError, Result};

/// Maps a location to a desired local element edge length.
pub trait SizeFunction: Send + Sync {
    /// Desired edge length at `p`.
    fn size_at(&self, p: &Point2<f64>) -> Result<f64>;

    /// Desired edge length at `p` for the front `depth` offsets in from the
    /// boundary. Most functions ignore the depth.
    fn size_at_depth(&self, p: &Point2<f64>, depth: usize) -> Result<f64> {
        let _ = depth;
        self.size_at(p)
    }
}

impl<S: SizeFunction + ?Sized> SizeFunction for Arc<S> {
    fn size_at(&self, p: &Point2<f64>) -> Result<f64> {
        (**self).size_at(p)
    }

    fn size_at_depth(&self, p: &Point2<f64>, depth: usize) -> Result<f64> {
        (**self).size_at_depth(p, depth)
    }
}

impl<S: SizeFunction + ?Sized> SizeFunction for &S {
    fn size_at(&self, p: &Point2<f64>) -> Result<f64> {
        (**self).size_at(p)
    }

    fn size_at_depth(&self, p: &Point2<f64>, depth: usize) -> Result<f64> {
        (**self).size_at_depth(p, depth)
    }
}

/// Check that a size value is usable.
pub fn check_size(value: f64, p: &Point2<f64>) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(MeshError::spacing(format!(
            "target size {} at ({}, {}) is not a positive length",
            value, p.x, p.y
        )))
    }
}

/// The same size everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSize(f64);

impl ConstantSize {
    /// Create a constant size function.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidParameter`] for non-positive or non-finite sizes.
    pub fn new(size: f64) -> Result<Self> {
        if !(size.is_finite() && size > 0.0) {
            return Err(MeshError::invalid_param("size", size, "must be positive"));
        }
        Ok(Self(size))
    }

    /// The constant value.
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl SizeFunction for ConstantSize {
    fn size_at(&self, _p: &Point2<f64>) -> Result<f64> {
        Ok(self.0)
    }
}

/// Size given by a closure; `None` means the location is out of domain.
pub struct FnSize<F>(pub F);

impl<F> SizeFunction for FnSize<F>
where
    F: Fn(&Point2<f64>) -> Option<f64> + Send + Sync,
{
    fn size_at(&self, p: &Point2<f64>) -> Result<f64> {
        match (self.0)(p) {
            Some(v) => check_size(v, p),
            None => Err(MeshError::OutOfDomain { x: p.x, y: p.y }),
        }
    }
}

impl<F> std::fmt::Debug for FnSize<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSize").finish_non_exhaustive()
    }
}

/// Size interpolated from the edge lengths of a polygon's boundary.
///
/// Each boundary vertex carries the mean length of its two edges. A query is
/// answered by inverse-distance-squared weighting of those lengths, where the
/// weight of each vertex is further scaled by `min + bias * (len - min)`.
/// With a small bias the short edges dominate and sizes grow slowly away from
/// fine boundary regions. Results are clamped to the boundary length range.
#[derive(Debug, Clone)]
pub struct PolygonSize {
    points: Vec<Point2<f64>>,
    lengths: Vec<f64>,
    min_length: f64,
    max_length: f64,
    bias: f64,
    constant: Option<f64>,
}

impl PolygonSize {
    /// Build from polygon rings.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::Geometry`] if no ring has at least two points, and
    /// [`MeshError::Spacing`] if every edge has zero length.
    pub fn from_rings<'a>(
        rings: impl IntoIterator<Item = &'a [Point2<f64>]>,
        bias: f64,
    ) -> Result<Self> {
        let mut points = Vec::new();
        let mut lengths = Vec::new();
        for ring in rings {
            let n = ring.len();
            if n < 2 {
                continue;
            }
            for i in 0..n {
                let prev = (ring[i] - ring[(i + n - 1) % n]).norm();
                let next = (ring[(i + 1) % n] - ring[i]).norm();
                points.push(ring[i]);
                lengths.push(0.5 * (prev + next));
            }
        }
        if points.is_empty() {
            return Err(MeshError::geometry("size function needs a boundary with edges"));
        }
        let min_length = lengths.iter().copied().fold(f64::INFINITY, f64::min);
        let max_length = lengths.iter().copied().fold(0.0, f64::max);
        if !(min_length > 0.0) {
            return Err(MeshError::spacing("polygon boundary has zero-length edges"));
        }
        let constant = if (max_length - min_length) / min_length < 0.05 {
            Some(0.5 * (max_length + min_length))
        } else {
            None
        };
        Ok(Self {
            points,
            lengths,
            min_length,
            max_length,
            bias: bias.clamp(0.0, 1.0),
            constant,
        })
    }

    /// Smallest boundary length.
    pub fn min_length(&self) -> f64 {
        self.min_length
    }

    /// Largest boundary length.
    pub fn max_length(&self) -> f64 {
        self.max_length
    }

    fn interpolate(&self, p: &Point2<f64>) -> f64 {
        if let Some(c) = self.constant {
            return c;
        }
        let mut sum_w = 0.0;
        let mut sum = 0.0;
        for (q, &len) in self.points.iter().zip(&self.lengths) {
            let d2 = (q - p).norm_squared();
            let w = if d2 < 1e-7 { 1e11 } else { 1.0 / d2 };
            let w = w * (self.min_length + self.bias * (len - self.min_length));
            sum_w += w;
            sum += w * len;
        }
        (sum / sum_w).clamp(self.min_length, self.max_length)
    }
}

impl SizeFunction for PolygonSize {
    fn size_at(&self, p: &Point2<f64>) -> Result<f64> {
        check_size(self.interpolate(p), p)
    }
}

/// Transition from a boundary-derived size toward a constant size.
///
/// At front depth `k` the distance to the constant is scaled by
/// `(1 - bias)^k` with `bias` clamped to `[0.01, 0.99]`, so larger biases
/// reach the constant size in fewer fronts.
#[derive(Debug, Clone)]
pub struct BiasedConstantSize<S> {
    boundary: S,
    constant: f64,
    bias: f64,
}

impl<S: SizeFunction> BiasedConstantSize<S> {
    /// Wrap a boundary size function.
    pub fn new(boundary: S, constant: f64, bias: f64) -> Result<Self> {
        if !(constant.is_finite() && constant > 0.0) {
            return Err(MeshError::invalid_param("constant", constant, "must be positive"));
        }
        Ok(Self {
            boundary,
            constant,
            bias: bias.clamp(0.01, 0.99),
        })
    }
}

impl<S: SizeFunction> SizeFunction for BiasedConstantSize<S> {
    fn size_at(&self, p: &Point2<f64>) -> Result<f64> {
        self.size_at_depth(p, 0)
    }

    fn size_at_depth(&self, p: &Point2<f64>, depth: usize) -> Result<f64> {
        let d = self.boundary.size_at_depth(p, depth)?;
        let factor = (1.0 - self.bias).powi(depth.min(i32::MAX as usize) as i32);
        let d = if d > self.constant {
            (d * factor).max(self.constant)
        } else {
            (d / factor).min(self.constant)
        };
        check_size(d, p)
    }
}

/// A local refinement: size `size` at `center`, growing linearly away from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefineRegion {
    /// Center of the refinement.
    pub center: Point2<f64>,
    /// Size at the center.
    pub size: f64,
}

/// A base size function with local refinements.
///
/// `size(p) = min(base(p), s + growth * max(0, |p - c| - s))` over all
/// refinements `(c, s)`.
#[derive(Debug, Clone)]
pub struct RefinedSize<S> {
    base: S,
    regions: Vec<RefineRegion>,
    growth: f64,
}

impl<S: SizeFunction> RefinedSize<S> {
    /// Wrap `base` with refinement regions.
    pub fn new(base: S, regions: Vec<RefineRegion>, growth: f64) -> Self {
        Self {
            base,
            regions,
            growth: growth.max(1e-3),
        }
    }

    fn refine(&self, p: &Point2<f64>, d: f64) -> f64 {
        self.regions.iter().fold(d, |d, r| {
            let dist = (p - r.center).norm();
            d.min(r.size + self.growth * (dist - r.size).max(0.0))
        })
    }
}

impl<S: SizeFunction> SizeFunction for RefinedSize<S> {
    fn size_at(&self, p: &Point2<f64>) -> Result<f64> {
        let d = self.base.size_at(p)?;
        check_size(self.refine(p, d), p)
    }

    fn size_at_depth(&self, p: &Point2<f64>, depth: usize) -> Result<f64> {
        let d = self.base.size_at_depth(p, depth)?;
        check_size(self.refine(p, d), p)
    }
}

/// Pointwise minimum of several size functions.
#[derive(Clone)]
pub struct MinSize {
    parts: Vec<Arc<dyn SizeFunction>>,
}

impl MinSize {
    /// Combine size functions. An empty list is invalid.
    pub fn new(parts: Vec<Arc<dyn SizeFunction>>) -> Result<Self> {
        if parts.is_empty() {
            return Err(MeshError::invalid_param("parts", 0, "need at least one size function"));
        }
        Ok(Self { parts })
    }
}

impl SizeFunction for MinSize {
    fn size_at(&self, p: &Point2<f64>) -> Result<f64> {
        self.size_at_depth(p, 0)
    }

    fn size_at_depth(&self, p: &Point2<f64>, depth: usize) -> Result<f64> {
        let mut best = f64::INFINITY;
        for part in &self.parts {
            best = best.min(part.size_at_depth(p, depth)?);
        }
        check_size(best, p)
    }
}

impl std::fmt::Debug for MinSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinSize")
            .field("parts", &self.parts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(side: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(side, 0.0),
            Point2::new(side, side),
            Point2::new(0.0, side),
        ]
    }

    #[test]
    fn test_constant_rejects_non_positive() {
        assert!(ConstantSize::new(0.0).is_err());
        assert!(ConstantSize::new(f64::NAN).is_err());
        assert!(ConstantSize::new(2.0).is_ok());
    }

    #[test]
    fn test_fn_size_out_of_domain() {
        let f = FnSize(|p: &Point2<f64>| if p.x >= 0.0 { Some(1.0 + p.x) } else { None });
        assert_relative_eq!(f.size_at(&Point2::new(1.0, 0.0)).unwrap(), 2.0);
        assert!(matches!(
            f.size_at(&Point2::new(-1.0, 0.0)),
            Err(MeshError::OutOfDomain { .. })
        ));
        let neg = FnSize(|_: &Point2<f64>| Some(-1.0));
        assert!(matches!(neg.size_at(&Point2::origin()), Err(MeshError::Spacing { .. })));
    }

    #[test]
    fn test_polygon_size_uniform_is_constant() {
        let sq = square(4.0);
        let size = PolygonSize::from_rings([sq.as_slice()], 1.0).unwrap();
        assert_relative_eq!(size.size_at(&Point2::new(2.0, 2.0)).unwrap(), 4.0);
    }

    #[test]
    fn test_polygon_size_interpolates_between_extremes() {
        // Fine edges along the bottom, one long edge at the top
        let ring = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(3.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ];
        let size = PolygonSize::from_rings([ring.as_slice()], 1.0).unwrap();
        let near_bottom = size.size_at(&Point2::new(2.0, 0.1)).unwrap();
        let near_top = size.size_at(&Point2::new(2.0, 3.9)).unwrap();
        assert!(near_bottom < near_top);
        assert!(near_bottom >= size.min_length() - 1e-12);
        assert!(near_top <= size.max_length() + 1e-12);
    }

    #[test]
    fn test_biased_constant_transitions() {
        let boundary = ConstantSize::new(4.0).unwrap();
        let biased = BiasedConstantSize::new(boundary, 1.0, 0.5).unwrap();
        let p = Point2::new(0.0, 0.0);
        assert_relative_eq!(biased.size_at_depth(&p, 0).unwrap(), 4.0);
        assert_relative_eq!(biased.size_at_depth(&p, 1).unwrap(), 2.0);
        assert_relative_eq!(biased.size_at_depth(&p, 5).unwrap(), 1.0);
    }

    #[test]
    fn test_refined_size() {
        let base = ConstantSize::new(1.0).unwrap();
        let refined = RefinedSize::new(
            base,
            vec![RefineRegion {
                center: Point2::new(0.0, 0.0),
                size: 0.1,
            }],
            0.5,
        );
        assert_relative_eq!(refined.size_at(&Point2::new(0.05, 0.0)).unwrap(), 0.1);
        assert_relative_eq!(refined.size_at(&Point2::new(1.1, 0.0)).unwrap(), 0.6);
        assert_relative_eq!(refined.size_at(&Point2::new(10.0, 0.0)).unwrap(), 1.0);
    }

    #[test]
    fn test_min_size() {
        let a: Arc<dyn SizeFunction> = Arc::new(ConstantSize::new(2.0).unwrap());
        let b: Arc<dyn SizeFunction> =
            Arc::new(FnSize(|p: &Point2<f64>| Some(1.0 + p.x.abs())));
        let m = MinSize::new(vec![a, b]).unwrap();
        assert_relative_eq!(m.size_at(&Point2::new(0.5, 0.0)).unwrap(), 1.5);
        assert_relative_eq!(m.size_at(&Point2::new(3.0, 0.0)).unwrap(), 2.0);
        assert!(MinSize::new(vec![]).is_err());
    }
}
