use image::{GrayImage, Luma, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::box_filter;
use tracing::debug;

use crate::config::{EdgeConfig, LineConfig};

/// A straight segment found in the edge map, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn length(&self) -> f64 {
        let dx = (self.x2 - self.x1) as f64;
        let dy = (self.y2 - self.y1) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Convert an RGB image to grayscale with the standard luminance weights
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let luma = (0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64)
            .round()
            .clamp(0.0, 255.0) as u8;
        gray.put_pixel(x, y, Luma([luma]));
    }

    gray
}

/// Grayscale, mean blur, then Canny. Always yields a map of the input size;
/// a uniform frame gives an all-black map.
pub fn extract_edges(img: &RgbImage, config: &EdgeConfig) -> GrayImage {
    let gray = to_grayscale(img);
    let blurred = if config.blur_radius > 0 {
        box_filter(&gray, config.blur_radius, config.blur_radius)
    } else {
        gray
    };

    let edges = canny(&blurred, config.canny_low, config.canny_high);
    debug!(
        low = config.canny_low,
        high = config.canny_high,
        blur_radius = config.blur_radius,
        edge_pixels = edges.pixels().filter(|p| p[0] > 0).count(),
        "Edge map extracted"
    );
    edges
}

/// Voting table of the Hough transform plus the precomputed trig for each angle bin.
struct Accumulator {
    votes: Vec<i32>,
    /// (cos, sin) of every angle bin, pre-scaled by 1/rho.
    trig: Vec<(f64, f64)>,
    /// Unscaled (cos, sin) of every angle bin.
    normals: Vec<(f64, f64)>,
    num_rho: usize,
    rho_offset: i64,
}

impl Accumulator {
    fn new(width: u32, height: u32, config: &LineConfig) -> Self {
        let num_angle = ((std::f64::consts::PI / config.theta).round() as usize).max(1);
        let span = (width + height) as f64 * 2.0 + 1.0;
        let num_rho = ((span / config.rho).round() as usize).max(1);
        let irho = 1.0 / config.rho;

        let normals: Vec<(f64, f64)> = (0..num_angle)
            .map(|n| {
                let angle = n as f64 * config.theta;
                (angle.cos(), angle.sin())
            })
            .collect();
        let trig = normals.iter().map(|&(c, s)| (c * irho, s * irho)).collect();

        Self {
            votes: vec![0; num_angle * num_rho],
            trig,
            normals,
            num_rho,
            rho_offset: (num_rho as i64 - 1) / 2,
        }
    }

    fn bin(&self, n: usize, x: i32, y: i32) -> Option<usize> {
        let (c, s) = self.trig[n];
        let r = (x as f64 * c + y as f64 * s).round() as i64 + self.rho_offset;
        if r < 0 || r >= self.num_rho as i64 {
            return None;
        }
        Some(n * self.num_rho + r as usize)
    }

    /// Add the votes of one point, returning the strongest angle bin and its count.
    fn vote(&mut self, x: i32, y: i32) -> (usize, i32) {
        let mut best = (0, i32::MIN);
        for n in 0..self.trig.len() {
            if let Some(idx) = self.bin(n, x, y) {
                self.votes[idx] += 1;
                if self.votes[idx] > best.1 {
                    best = (n, self.votes[idx]);
                }
            }
        }
        best
    }

    fn unvote(&mut self, x: i32, y: i32) {
        for n in 0..self.trig.len() {
            if let Some(idx) = self.bin(n, x, y) {
                self.votes[idx] -= 1;
            }
        }
    }
}

/// Set pixels of the edge map that are not yet claimed by a line.
struct EdgeMask {
    set: Vec<bool>,
    width: i32,
    height: i32,
}

impl EdgeMask {
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((y * self.width + x) as usize)
    }
}

/// Per-pixel step along a line, advancing exactly one pixel on the major axis.
fn line_step(normal: (f64, f64)) -> (f64, f64) {
    let (a, b) = (-normal.1, normal.0);
    if a.abs() > b.abs() {
        (a.signum(), b / a.abs())
    } else {
        (a / b.abs(), b.signum())
    }
}

/// Follow the line from `start` until more than `max_gap` unset pixels in a row
/// (or the border) are met. Returns the last set pixel.
fn walk_to_end(mask: &EdgeMask, start: (i32, i32), step: (f64, f64), max_gap: u32) -> (i32, i32) {
    let mut end = start;
    let mut gap = 0;
    let (mut fx, mut fy) = (start.0 as f64, start.1 as f64);

    loop {
        let (px, py) = (fx.round() as i32, fy.round() as i32);
        let Some(idx) = mask.index(px, py) else {
            break;
        };
        if mask.set[idx] {
            gap = 0;
            end = (px, py);
        } else {
            gap += 1;
            if gap > max_gap {
                break;
            }
        }
        fx += step.0;
        fy += step.1;
    }

    end
}

/// Clear every set pixel from `start` to `end` inclusive, withdrawing its votes
/// when the line was kept.
fn clear_to_end(
    mask: &mut EdgeMask,
    accum: &mut Accumulator,
    start: (i32, i32),
    end: (i32, i32),
    step: (f64, f64),
    withdraw: bool,
) {
    let (mut fx, mut fy) = (start.0 as f64, start.1 as f64);

    loop {
        let (px, py) = (fx.round() as i32, fy.round() as i32);
        let Some(idx) = mask.index(px, py) else {
            break;
        };
        if mask.set[idx] {
            if withdraw {
                accum.unvote(px, py);
            }
            mask.set[idx] = false;
        }
        if (px, py) == end {
            break;
        }
        fx += step.0;
        fy += step.1;
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Deterministic scrambled visiting order over `0..count`.
fn scrambled_order(count: usize) -> impl Iterator<Item = usize> {
    let mut stride = ((count as f64 * 0.618_033_988_75) as usize).max(1);
    while count > 1 && gcd(stride, count) != 1 {
        stride += 1;
    }
    (0..count).map(move |i| ((i as u64 * stride as u64) % count as u64) as usize)
}

/// Progressive probabilistic Hough transform over a binary edge map.
///
/// Edge pixels are visited in a fixed scrambled order. Each one votes in the
/// (rho, theta) accumulator. Once a bin reaches `threshold`, the line is
/// followed through the map in both directions, bridging gaps of up to
/// `max_line_gap` pixels. The covered pixels are removed so they cannot vote
/// again. Segments shorter than `min_line_length` on both axes are dropped.
pub fn detect_segments(edges: &GrayImage, config: &LineConfig) -> Vec<LineSegment> {
    let (width, height) = edges.dimensions();
    let mut accum = Accumulator::new(width, height, config);
    let mut mask = EdgeMask {
        set: vec![false; (width * height) as usize],
        width: width as i32,
        height: height as i32,
    };

    let mut points = Vec::new();
    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel[0] > 0 {
            mask.set[(y * width + x) as usize] = true;
            points.push((x as i32, y as i32));
        }
    }

    let threshold = i32::try_from(config.threshold).unwrap_or(i32::MAX);
    let min_length = config.min_line_length as i32;
    let mut segments = Vec::new();

    for idx in scrambled_order(points.len()) {
        let (x, y) = points[idx];
        if !mask.set[(y * mask.width + x) as usize] {
            continue;
        }

        let (best_bin, best_votes) = accum.vote(x, y);
        if best_votes < threshold {
            continue;
        }

        let forward = line_step(accum.normals[best_bin]);
        let backward = (-forward.0, -forward.1);
        let ends = [
            walk_to_end(&mask, (x, y), forward, config.max_line_gap),
            walk_to_end(&mask, (x, y), backward, config.max_line_gap),
        ];

        let kept = (ends[1].0 - ends[0].0).abs() >= min_length
            || (ends[1].1 - ends[0].1).abs() >= min_length;

        clear_to_end(&mut mask, &mut accum, (x, y), ends[0], forward, kept);
        clear_to_end(&mut mask, &mut accum, (x, y), ends[1], backward, kept);

        if kept {
            segments.push(LineSegment::new(ends[0].0, ends[0].1, ends[1].0, ends[1].1));
        }
    }

    debug!(
        edge_pixels = points.len(),
        segments = segments.len(),
        threshold = config.threshold,
        "Probabilistic Hough segments detected"
    );
    segments
}
