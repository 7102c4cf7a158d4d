use thiserror::Error;

/// Everything that can stop a frame from being rectified.
///
/// Acquisition failures are raised by the caller (the capture side), not by
/// the correction core, but they live here so the binary can map every
/// failure to an exit code in one place.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no capture source: {0}")]
    AcquisitionFailure(String),

    #[error("captured frame is empty")]
    EmptyFrame,

    #[error("quadrilateral not found: simplified polygon has {vertices} vertices, expected 4")]
    QuadrilateralNotFound { vertices: usize },

    #[error("degenerate quadrilateral: {0}")]
    DegenerateQuadrilateral(String),

    #[error("corners split {top} above / {bottom} below the centroid, expected 2 / 2")]
    UnbalancedCornerSplit { top: usize, bottom: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl Error {
    /// Process exit code reported by the binary for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::AcquisitionFailure(_) => -1,
            Error::EmptyFrame => -2,
            Error::QuadrilateralNotFound { .. }
            | Error::DegenerateQuadrilateral(_)
            | Error::UnbalancedCornerSplit { .. } => -3,
            Error::Config(_) | Error::Io(_) | Error::Encode(_) => -4,
        }
    }

    /// True for failures raised by the perspective correction itself.
    pub fn is_correction_failure(&self) -> bool {
        self.exit_code() == -3
    }
}

pub type Result<T> = std::result::Result<T, Error>;
