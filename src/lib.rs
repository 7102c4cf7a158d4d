pub mod cli;
pub mod config;
pub mod detection;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod pipeline;
pub mod transform;

pub use cli::Cli;
pub use config::{CorrectionConfig, EdgeConfig, IntersectionBounds, LineConfig};
pub use detection::{detect_segments, extract_edges, LineSegment};
pub use error::{Error, Result};
pub use filter::{FrameFilter, PassThrough};
pub use geometry::{intersect, resolve_quadrilateral, sort_corners, Corners, Point};
pub use pipeline::{correct_perspective, read_still};
pub use transform::{rectify, warp_perspective, Homography};
