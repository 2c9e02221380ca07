//! Label collision resolution.
//!
//! Chart code registers what it draws in a [`Registry`]; once a chart (or a
//! set of surfaces sharing an x axis) is complete, [`resolve_surface`] or
//! [`resolve_composed`] moves every registered label to the nearest
//! position that clears the bars, reference lines, curves and other labels
//! around it.

pub mod connector;
pub mod debug;
pub mod geometry;
pub mod registry;
pub mod resolve;
pub mod solver;

pub use geometry::{BBox, CurveObstacle, Point};
pub use registry::{ObstacleSource, Registry};
pub use resolve::{LabelOutcome, ResolutionReport, resolve_composed, resolve_surface};
pub use solver::{Displacement, Movement};
