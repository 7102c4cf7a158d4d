use image::{Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

/// Corners of a `2*half_w` x `2*half_h` rectangle centred on `center`, rotated
/// by `degrees`, in top-left, top-right, bottom-right, bottom-left order and
/// rounded to whole pixels.
pub fn rotated_rect_corners(
    center: (f64, f64),
    half_w: f64,
    half_h: f64,
    degrees: f64,
) -> [(i32, i32); 4] {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [(-half_w, -half_h), (half_w, -half_h), (half_w, half_h), (-half_w, half_h)].map(|(x, y)| {
        (
            (center.0 + x * cos - y * sin).round() as i32,
            (center.1 + x * sin + y * cos).round() as i32,
        )
    })
}

/// A white quadrilateral on a black background.
pub fn board_on_black(width: u32, height: u32, corners: &[(i32, i32); 4]) -> RgbImage {
    let mut img = RgbImage::new(width, height);
    let poly: Vec<Point<i32>> = corners.iter().map(|&(x, y)| Point::new(x, y)).collect();
    draw_polygon_mut(&mut img, &poly, Rgb([255, 255, 255]));
    img
}

pub fn is_white(pixel: &Rgb<u8>) -> bool {
    pixel.0.iter().all(|&c| c > 128)
}
