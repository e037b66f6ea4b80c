//! Per-polygon status and issue records.
//!
//! Stages never print anything. They return [`Diagnostic`] records which the
//! orchestrator collects into a [`PolygonReport`](crate::mesher::PolygonReport)
//! per input polygon. Formatting and display are left to the caller.

use std::fmt;

use nalgebra::Point2;

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational; the result is complete.
    Info,
    /// The result is usable but degraded.
    Warning,
    /// The polygon could not be meshed.
    Error,
}

/// What kind of issue was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// Input geometry problem (self-intersection, degenerate ring, dropped loop).
    Geometry,
    /// Target size problem.
    Spacing,
    /// Paving could not close a front.
    PavingFailure,
    /// Paving fell back from strip lofting to constrained triangulation.
    PavingFallback,
    /// The patch filler did not apply and paving was used instead.
    PatchNotApplicable,
    /// No triangle pair could be merged into an acceptable quad.
    MatchingInfeasible,
    /// Relaxation stopped before the convergence tolerance was reached.
    RelaxationNonConvergence,
    /// A low-quality quad could not be improved.
    BadQuadUnrepaired,
    /// A refine point was not used.
    RefinePointSkipped,
    /// A breakline segment could not be inserted.
    BreaklineSkipped,
    /// A cell collapsed while merging polygons and was removed.
    DegenerateCellRemoved,
    /// Two input polygons overlap.
    Overlap,
}

/// A single issue record.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// The kind of issue.
    pub kind: IssueKind,
    /// How serious it is.
    pub severity: Severity,
    /// Where it happened, if it has a location.
    pub location: Option<Point2<f64>>,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Create an informational record.
    pub fn info(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Info,
            location: None,
            message: message.into(),
        }
    }

    /// Create a warning record.
    pub fn warning(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            location: None,
            message: message.into(),
        }
    }

    /// Create an error record.
    pub fn error(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            location: None,
            message: message.into(),
        }
    }

    /// Attach a location to the record.
    pub fn at(mut self, location: Point2<f64>) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {:?}: {}", self.severity, self.kind, self.message)?;
        if let Some(p) = self.location {
            write!(f, " at ({}, {})", p.x, p.y)?;
        }
        Ok(())
    }
}

/// Outcome of meshing one polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonStatus {
    /// Meshed with no warnings.
    Success,
    /// Meshed, but with warning-level diagnostics.
    Partial,
    /// An error aborted the polygon's pipeline.
    Failed,
}

impl PolygonStatus {
    /// Derive the status from the collected diagnostics.
    pub fn from_diagnostics(diagnostics: &[Diagnostic], failed: bool) -> Self {
        if failed {
            PolygonStatus::Failed
        } else if diagnostics.iter().any(|d| d.severity >= Severity::Warning) {
            PolygonStatus::Partial
        } else {
            PolygonStatus::Success
        }
    }
}

/// Outcome of a whole meshing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Every polygon succeeded.
    Success,
    /// Some polygons failed or were degraded; see the per-polygon reports.
    Partial,
    /// No polygon produced any cells.
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_diagnostics() {
        let info = vec![Diagnostic::info(IssueKind::MatchingInfeasible, "no pairs")];
        assert_eq!(
            PolygonStatus::from_diagnostics(&info, false),
            PolygonStatus::Success
        );

        let warn = vec![Diagnostic::warning(IssueKind::BadQuadUnrepaired, "bad quad")];
        assert_eq!(
            PolygonStatus::from_diagnostics(&warn, false),
            PolygonStatus::Partial
        );
        assert_eq!(
            PolygonStatus::from_diagnostics(&warn, true),
            PolygonStatus::Failed
        );
    }

    #[test]
    fn test_display_includes_location() {
        let d = Diagnostic::warning(IssueKind::RefinePointSkipped, "too close")
            .at(Point2::new(1.0, 2.0));
        let text = d.to_string();
        assert!(text.contains("too close"));
        assert!(text.contains("(1, 2)"));
    }
}
