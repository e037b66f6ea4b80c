//! Meshing algorithms.
//!
//! One module per pipeline stage:
//!
//! - **Boundary preparation**: [`clean`], [`redistribute`], [`curvature`]
//! - **Paving**: [`offset`], [`pave`], with [`refine`] points as extra holes
//! - **Structured fill**: [`patch`]
//! - **Quads**: [`quad`] (blossom matching), [`repair`]
//! - **Smoothing**: [`relax`]
//!
//! The [`mesher`](crate::mesher) module chains them per polygon.

pub mod clean;
pub mod curvature;
pub mod offset;
pub mod patch;
pub mod pave;
pub mod progress;
pub mod quad;
pub mod redistribute;
pub mod refine;
pub mod relax;
pub mod repair;

pub use progress::Progress;
