use image::RgbImage;

/// Stage that turns a frame into the marker-trace image handed to the tracer.
pub trait FrameFilter {
    fn apply(&self, frame: &RgbImage) -> RgbImage;
}

/// Returns the frame unchanged. Depth-level filtering is not implemented.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl FrameFilter for PassThrough {
    fn apply(&self, frame: &RgbImage) -> RgbImage {
        frame.clone()
    }
}
