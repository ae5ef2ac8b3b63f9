//! # Geotrail Geometry
//!
//! Path reduction and SVG serialization for location tracks.
//!
//! Each [`LineStyle`] turns a run of points into anchors, bounds and one `<path>` element:
//!
//! ```text
//! run ──► LineStyle::reduce ──► Reduction { anchors, bounds, fragment }
//!              │
//!              ├── Raw              every point, straight segments
//!              ├── Simplified       max-deviation split, cubic collapse
//!              └── CumulativeAngle  turn-driven anchors, quadratic/cubic joins
//! ```
//!
//! ## Example
//!
//! ```rust
//! use geotrail_geometry::{LineStyle, Point, ReductionConfig};
//!
//! let run = [Point::new(-122.0, 37.0), Point::new(-122.0, 37.001), Point::new(-122.0, 37.1)];
//! let out = LineStyle::Simplified.reduce(&run, &ReductionConfig::default());
//! assert_eq!(out.anchors, vec![0, 2]);
//! ```

mod config;
mod curve;
mod point;
mod raw;
mod simplify;
mod style;
mod svg;

pub use config::ReductionConfig;
pub use point::{centroid, sq_dist, Bounds, Point};
pub use style::{LineStyle, Reduction};
pub use svg::{padded_viewbox, parse_viewbox, path_element, viewbox, PathBuilder};
