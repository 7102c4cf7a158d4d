use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use tracing::debug;

use crate::error::{Error, Result};
use crate::geometry::{Corners, Point};

/// Corners closer than this, or triangles with less doubled area, are degenerate.
const DEGENERACY_EPS: f64 = 1e-6;

/// Planar projective transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Exact homography taking each `src[i]` to `dst[i]`.
    ///
    /// With `h33` fixed to 1, every correspondence
    /// `(x, y) -> (x', y')` gives two rows of an 8x8 linear system:
    ///
    /// ```text
    /// x*h11 + y*h12 + h13 - x'*x*h31 - x'*y*h32 = x'
    /// x*h21 + y*h22 + h23 - y'*x*h31 - y'*y*h32 = y'
    /// ```
    pub fn from_correspondences(src: &Corners, dst: &Corners) -> Result<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let (r1, r2) = (2 * i, 2 * i + 1);

            a[(r1, 0)] = s.x;
            a[(r1, 1)] = s.y;
            a[(r1, 2)] = 1.0;
            a[(r1, 6)] = -d.x * s.x;
            a[(r1, 7)] = -d.x * s.y;
            b[r1] = d.x;

            a[(r2, 3)] = s.x;
            a[(r2, 4)] = s.y;
            a[(r2, 5)] = 1.0;
            a[(r2, 6)] = -d.y * s.x;
            a[(r2, 7)] = -d.y * s.y;
            b[r2] = d.y;
        }

        let h = a.lu().solve(&b).ok_or_else(|| {
            Error::DegenerateQuadrilateral("homography system is singular".to_string())
        })?;
        if h.iter().any(|v| !v.is_finite()) {
            return Err(Error::DegenerateQuadrilateral(
                "homography has non-finite coefficients".to_string(),
            ));
        }

        #[rustfmt::skip]
        let matrix = Matrix3::new(
            h[0], h[1], h[2],
            h[3], h[4], h[5],
            h[6], h[7], 1.0,
        );
        Ok(Self::from_matrix(matrix))
    }

    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(Self::from_matrix)
    }

    /// Map a point, or `None` if it lands on the line at infinity.
    pub fn transform_point(&self, p: Point) -> Option<Point> {
        let v = self.matrix * Vector3::new(p.x, p.y, 1.0);
        if v.z.abs() < 1e-12 || !v.z.is_finite() {
            return None;
        }
        Some(Point::new(v.x / v.z, v.y / v.z))
    }

    /// Single precision copy for the imageproc resampler, normalized so that
    /// `h33` is 1. `None` when the matrix is singular or `h33` vanishes.
    pub fn to_projection(&self) -> Option<Projection> {
        let scale = self.matrix[(2, 2)];
        if scale.abs() < 1e-12 || self.matrix.try_inverse().is_none() {
            return None;
        }
        let normalized = self.matrix / scale;
        if normalized.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let coefficients: [f32; 9] =
            std::array::from_fn(|i| normalized[(i / 3, i % 3)] as f32);
        Projection::from_matrix(coefficients)
    }
}

/// Reject corner sets with coincident points or three collinear points.
pub fn validate_corners(corners: &Corners) -> Result<()> {
    for i in 0..4 {
        for j in (i + 1)..4 {
            if corners[i].distance(&corners[j]) < DEGENERACY_EPS {
                return Err(Error::DegenerateQuadrilateral(format!(
                    "corners {i} and {j} coincide at ({:.2}, {:.2})",
                    corners[i].x, corners[i].y
                )));
            }
        }
    }

    for (i, j, k) in [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)] {
        let (a, b, c) = (corners[i], corners[j], corners[k]);
        let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        if cross.abs() < DEGENERACY_EPS {
            return Err(Error::DegenerateQuadrilateral(format!(
                "corners {i}, {j} and {k} are collinear"
            )));
        }
    }

    Ok(())
}

/// Corners of the full output frame in canonical order.
pub fn destination_corners(width: u32, height: u32) -> Corners {
    let (w, h) = (width as f64, height as f64);
    [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ]
}

/// Copy of `img` with a one pixel frame replicating its outermost rows and
/// columns. imageproc's bilinear sampler needs both neighbours inside the
/// image, so without the frame the last row and column would read as border.
fn pad_edges(img: &RgbImage) -> RgbImage {
    let (width, height) = img.dimensions();
    RgbImage::from_fn(width + 2, height + 2, |x, y| {
        let sx = x.saturating_sub(1).min(width - 1);
        let sy = y.saturating_sub(1).min(height - 1);
        *img.get_pixel(sx, sy)
    })
}

/// Resample `img` through `forward` into a `width` x `height` frame.
///
/// Output pixels are pulled from the source with bilinear interpolation;
/// positions outside the source read as black.
pub fn warp_perspective(
    img: &RgbImage,
    forward: &Homography,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    let projection = forward.to_projection().ok_or_else(|| {
        Error::DegenerateQuadrilateral("homography is not invertible".to_string())
    })?;

    let mut output = RgbImage::new(width, height);
    if img.width() == 0 || img.height() == 0 {
        return Ok(output);
    }

    // Shift the padded frame back onto the source's coordinates before mapping.
    let projection = projection * Projection::translate(-1.0, -1.0);
    warp_into(
        &pad_edges(img),
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut output,
    );

    Ok(output)
}

/// Map the quadrilateral bounded by `corners` onto the whole frame.
pub fn rectify(img: &RgbImage, corners: &Corners) -> Result<RgbImage> {
    validate_corners(corners)?;

    let (width, height) = img.dimensions();
    let destination = destination_corners(width, height);
    let homography = Homography::from_correspondences(corners, &destination)?;

    let m = homography.matrix();
    debug!(
        row0 = ?[m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        row1 = ?[m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        row2 = ?[m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        "Perspective transform computed"
    );

    warp_perspective(img, &homography, width, height)
}
