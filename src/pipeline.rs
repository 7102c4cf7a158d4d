use std::path::Path;

use image::RgbImage;
use tracing::{debug, info, instrument};

use crate::config::CorrectionConfig;
use crate::detection::{detect_segments, extract_edges};
use crate::error::{Error, Result};
use crate::geometry::resolve_quadrilateral;
use crate::transform::rectify;

/// Read a still frame from disk in place of a camera capture.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_still(path: &Path) -> Result<RgbImage> {
    let frame = image::open(path)
        .map_err(|err| Error::AcquisitionFailure(format!("{}: {err}", path.display())))?
        .to_rgb8();

    if frame.width() == 0 || frame.height() == 0 {
        return Err(Error::EmptyFrame);
    }
    info!(width = frame.width(), height = frame.height(), "Frame captured");
    Ok(frame)
}

/// Find the board in `frame` and warp it onto a frame of the same size.
///
/// Runs edge extraction, segment detection, corner resolution, and
/// rectification in order. The first failing stage ends the run; there is
/// no fallback to the uncorrected frame. `config` is validated first, so an
/// out-of-range setting is an `Error::Config` rather than a runaway
/// allocation.
#[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
pub fn correct_perspective(frame: &RgbImage, config: &CorrectionConfig) -> Result<RgbImage> {
    config.validate()?;
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::EmptyFrame);
    }

    let edges = extract_edges(frame, &config.edges);
    let segments = detect_segments(&edges, &config.lines);
    debug!(segments = segments.len(), "Line segments ready");

    let corners = resolve_quadrilateral(&segments, width, height, config)?;
    let rectified = rectify(frame, &corners)?;

    info!("Perspective corrected");
    Ok(rectified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_empty_frame_rejected() {
        let frame = RgbImage::new(0, 0);
        assert!(matches!(
            correct_perspective(&frame, &CorrectionConfig::default()),
            Err(Error::EmptyFrame)
        ));
    }

    #[test]
    fn test_uniform_frame_has_no_quadrilateral() {
        let frame = RgbImage::from_pixel(80, 60, Rgb([120, 110, 100]));
        let err = correct_perspective(&frame, &CorrectionConfig::default()).unwrap_err();
        assert!(matches!(err, Error::QuadrilateralNotFound { vertices: 0 }));
        assert_eq!(err.exit_code(), -3);
    }

    #[test]
    fn test_out_of_range_config_is_rejected_before_detection() {
        let frame = RgbImage::from_pixel(80, 60, Rgb([120, 110, 100]));
        let mut config = CorrectionConfig::default();
        config.lines.theta = 1e-9;
        let err = correct_perspective(&frame, &config).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");
        assert_eq!(err.exit_code(), -4);
    }

    #[test]
    fn test_missing_still_is_acquisition_failure() {
        let err = read_still(Path::new("/nonexistent/frame.png")).unwrap_err();
        assert!(matches!(err, Error::AcquisitionFailure(_)));
        assert_eq!(err.exit_code(), -1);
    }

    #[test]
    fn test_still_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let frame = RgbImage::from_fn(12, 9, |x, y| Rgb([x as u8 * 20, y as u8 * 20, 50]));
        frame.save(&path).unwrap();

        assert_eq!(read_still(&path).unwrap(), frame);
    }
}
