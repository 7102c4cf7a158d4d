use tracing::debug;

use crate::config::CorrectionConfig;
use crate::detection::LineSegment;
use crate::error::{Error, Result};

/// A point in image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Returned by [`intersect`] for parallel or coincident lines.
    pub const INVALID: Point = Point { x: -1.0, y: -1.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Ordered corners: top-left, top-right, bottom-right, bottom-left.
pub type Corners = [Point; 4];

/// Intersection of the infinite lines through two segments.
///
/// Returns [`Point::INVALID`] when the determinant is zero.
pub fn intersect(a: &LineSegment, b: &LineSegment) -> Point {
    let (x1, y1, x2, y2) = (a.x1 as f64, a.y1 as f64, a.x2 as f64, a.y2 as f64);
    let (x3, y3, x4, y4) = (b.x1 as f64, b.y1 as f64, b.x2 as f64, b.y2 as f64);

    let d = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    if d == 0.0 {
        return Point::INVALID;
    }

    let cross_a = x1 * y2 - y1 * x2;
    let cross_b = x3 * y4 - y3 * x4;
    Point::new(
        (cross_a * (x3 - x4) - (x1 - x2) * cross_b) / d,
        (cross_a * (y3 - y4) - (y1 - y2) * cross_b) / d,
    )
}

/// Pairwise intersections of all segments (i < j) that pass the bounds filter.
pub fn collect_intersections(
    segments: &[LineSegment],
    config: &CorrectionConfig,
    width: u32,
    height: u32,
) -> Vec<Point> {
    let mut points = Vec::new();
    for (i, a) in segments.iter().enumerate() {
        for b in &segments[i + 1..] {
            let pt = intersect(a, b);
            if pt != Point::INVALID && config.bounds.accepts(pt.x, pt.y, width, height) {
                points.push(pt);
            }
        }
    }
    points
}

pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// Length of the polyline through `points`, closing it back to the start if asked.
pub fn arc_length(points: &[Point], closed: bool) -> f64 {
    let mut length: f64 = points.windows(2).map(|w| w[0].distance(&w[1])).sum();
    if closed && points.len() > 1 {
        length += points[points.len() - 1].distance(&points[0]);
    }
    length
}

/// Distance from `point` to the line through `start` and `end`, or to `start`
/// when both ends coincide.
fn point_to_line_distance(point: &Point, start: &Point, end: &Point) -> f64 {
    let a = end.y - start.y;
    let b = start.x - end.x;
    let denominator = a.hypot(b);
    if denominator == 0.0 {
        return point.distance(start);
    }
    let c = end.x * start.y - start.x * end.y;
    (a * point.x + b * point.y + c).abs() / denominator
}

/// Douglas-Peucker over an open polyline; both endpoints are always kept.
fn simplify_open(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0, last)];
    while let Some((start, end)) = stack.pop() {
        if end - start <= 1 {
            continue;
        }

        let mut max_dist = 0.0;
        let mut max_index = start;
        for i in (start + 1)..end {
            let dist = point_to_line_distance(&points[i], &points[start], &points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }

        if max_dist > epsilon {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// Polygonal approximation of a point sequence (Douglas-Peucker).
///
/// A closed contour is cut at the vertex farthest from the first one and the
/// two halves are simplified independently, so the result never repeats its
/// first vertex at the end.
pub fn approximate_polygon(points: &[Point], epsilon: f64, closed: bool) -> Vec<Point> {
    if points.len() < 3 || !closed {
        return simplify_open(points, epsilon);
    }

    let (far, far_dist) = points
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, p)| (i, p.distance(&points[0])))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
    if far_dist == 0.0 {
        return vec![points[0]];
    }

    let mut polygon = simplify_open(&points[..=far], epsilon);

    let mut tail = points[far..].to_vec();
    tail.push(points[0]);
    let back = simplify_open(&tail, epsilon);
    polygon.extend_from_slice(&back[1..back.len() - 1]);

    polygon
}

/// Order four corners as top-left, top-right, bottom-right, bottom-left.
///
/// Corners with `y < center.y` form the top pair, the rest the bottom pair.
/// Any split other than two and two is rejected.
pub fn sort_corners(corners: &[Point; 4], center: Point) -> Result<Corners> {
    let (top, bottom): (Vec<Point>, Vec<Point>) =
        corners.iter().partition(|p| p.y < center.y);

    let (Ok(top), Ok(bottom)) = (
        <[Point; 2]>::try_from(top.as_slice()),
        <[Point; 2]>::try_from(bottom.as_slice()),
    ) else {
        return Err(Error::UnbalancedCornerSplit {
            top: top.len(),
            bottom: bottom.len(),
        });
    };

    let left_right = |pair: [Point; 2]| {
        if pair[0].x > pair[1].x {
            (pair[1], pair[0])
        } else {
            (pair[0], pair[1])
        }
    };
    let (tl, tr) = left_right(top);
    let (bl, br) = left_right(bottom);

    Ok([tl, tr, br, bl])
}

/// Reduce the segments to the four ordered corners of the board.
///
/// All pairwise intersections form a point cloud that is simplified to a
/// polygon with epsilon proportional to its perimeter. Anything other than
/// four vertices means no quadrilateral. The vertices are then ordered around
/// the centroid of the whole cloud.
pub fn resolve_quadrilateral(
    segments: &[LineSegment],
    width: u32,
    height: u32,
    config: &CorrectionConfig,
) -> Result<Corners> {
    let cloud = collect_intersections(segments, config, width, height);
    let epsilon = arc_length(&cloud, true) * config.approx_epsilon_ratio;
    let polygon = approximate_polygon(&cloud, epsilon, true);

    debug!(
        segments = segments.len(),
        intersections = cloud.len(),
        epsilon,
        vertices = polygon.len(),
        "Intersection cloud simplified"
    );

    let quad: [Point; 4] = polygon
        .as_slice()
        .try_into()
        .map_err(|_| Error::QuadrilateralNotFound {
            vertices: polygon.len(),
        })?;

    // the cloud is non-empty here since the polygon has four vertices
    let center = centroid(&cloud).ok_or(Error::QuadrilateralNotFound { vertices: 0 })?;
    let corners = sort_corners(&quad, center)?;

    debug!(
        top_left = ?corners[0],
        top_right = ?corners[1],
        bottom_right = ?corners[2],
        bottom_left = ?corners[3],
        "Quadrilateral corners ordered"
    );
    Ok(corners)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(x1: i32, y1: i32, x2: i32, y2: i32) -> LineSegment {
        LineSegment::new(x1, y1, x2, y2)
    }

    fn on_line(p: &Point, s: &LineSegment) -> bool {
        let cross = (s.x2 - s.x1) as f64 * (p.y - s.y1 as f64)
            - (s.y2 - s.y1) as f64 * (p.x - s.x1 as f64);
        cross.abs() / s.length() < 1e-9
    }

    #[test]
    fn test_intersect_symmetric_and_on_both_lines() {
        let pairs = [
            (seg(0, 0, 10, 10), seg(0, 10, 10, 0)),
            (seg(3, 7, 40, 9), seg(12, -5, 15, 60)),
            (seg(100, 20, 120, 25), seg(-4, 2, 3, 90)),
        ];
        for (a, b) in pairs {
            let ab = intersect(&a, &b);
            let ba = intersect(&b, &a);
            assert!((ab.x - ba.x).abs() < 1e-9 && (ab.y - ba.y).abs() < 1e-9);
            assert!(on_line(&ab, &a), "{ab:?} not on {a:?}");
            assert!(on_line(&ab, &b), "{ab:?} not on {b:?}");
        }
    }

    #[test]
    fn test_intersect_outside_segments() {
        let pt = intersect(&seg(0, 0, 1, 0), &seg(5, 3, 5, 4));
        assert_eq!(pt, Point::new(5.0, 0.0));
    }

    #[test]
    fn test_parallel_lines_give_sentinel() {
        assert_eq!(intersect(&seg(0, 0, 10, 0), &seg(0, 5, 10, 5)), Point::INVALID);
        assert_eq!(intersect(&seg(0, 0, 10, 10), &seg(2, 2, 7, 7)), Point::INVALID);
    }

    #[test]
    fn test_sort_rectangle_any_order() {
        let tl = Point::new(0.0, 0.0);
        let tr = Point::new(10.0, 0.0);
        let br = Point::new(10.0, 10.0);
        let bl = Point::new(0.0, 10.0);
        let center = Point::new(5.0, 5.0);

        let orders = [
            [tl, tr, br, bl],
            [br, bl, tl, tr],
            [bl, tr, tl, br],
            [tr, br, bl, tl],
            [br, tl, tr, bl],
        ];
        for order in orders {
            assert_eq!(sort_corners(&order, center).unwrap(), [tl, tr, br, bl]);
        }
    }

    #[test]
    fn test_unbalanced_split_is_an_error() {
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 1.0),
            Point::new(5.0, 20.0),
        ];
        let err = sort_corners(&corners, Point::new(5.0, 5.0)).unwrap_err();
        assert!(matches!(err, Error::UnbalancedCornerSplit { top: 3, bottom: 1 }));
    }

    #[test]
    fn test_centroid() {
        assert!(centroid(&[]).is_none());
        let c = centroid(&[Point::new(0.0, 0.0), Point::new(4.0, 2.0)]).unwrap();
        assert_eq!(c, Point::new(2.0, 1.0));
    }

    #[test]
    fn test_arc_length_closed_square() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!((arc_length(&square, false) - 30.0).abs() < 1e-12);
        assert!((arc_length(&square, true) - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_approximate_drops_near_collinear_points() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(50.0, 0.5),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ];
        let epsilon = arc_length(&points, true) * 0.02;
        let polygon = approximate_polygon(&points, epsilon, true);
        assert_eq!(polygon.len(), 4, "{polygon:?}");
        assert!(!polygon.contains(&Point::new(50.0, 0.5)));
    }

    fn regular_polygon(sides: usize, radius: f64) -> Vec<Point> {
        (0..sides)
            .map(|k| {
                let angle = std::f64::consts::FRAC_PI_2
                    + k as f64 * 2.0 * std::f64::consts::PI / sides as f64;
                Point::new(200.0 + radius * angle.cos(), 200.0 + radius * angle.sin())
            })
            .collect()
    }

    #[test]
    fn test_approximate_keeps_triangle_and_pentagon() {
        for sides in [3, 5] {
            let points = regular_polygon(sides, 100.0);
            let epsilon = arc_length(&points, true) * 0.02;
            assert_eq!(approximate_polygon(&points, epsilon, true).len(), sides);
        }
    }

    #[test]
    fn test_resolve_rectangle_sides() {
        let segments = [
            seg(10, 10, 90, 10),
            seg(10, 70, 90, 70),
            seg(10, 10, 10, 70),
            seg(90, 10, 90, 70),
        ];
        let config = CorrectionConfig::default();
        let corners = resolve_quadrilateral(&segments, 100, 80, &config).unwrap();
        assert_eq!(
            corners,
            [
                Point::new(10.0, 10.0),
                Point::new(90.0, 10.0),
                Point::new(90.0, 70.0),
                Point::new(10.0, 70.0),
            ]
        );
    }

    #[test]
    fn test_resolve_without_segments_fails() {
        let err = resolve_quadrilateral(&[], 100, 100, &CorrectionConfig::default()).unwrap_err();
        assert!(matches!(err, Error::QuadrilateralNotFound { vertices: 0 }));
    }

    #[test]
    fn test_resolve_triangle_fails() {
        // Three lines meeting pairwise give a three-vertex cloud
        let segments = [seg(0, 10, 100, 10), seg(0, 10, 50, 90), seg(100, 10, 50, 90)];
        let config = CorrectionConfig::default();
        let err = resolve_quadrilateral(&segments, 200, 200, &config).unwrap_err();
        assert!(matches!(err, Error::QuadrilateralNotFound { vertices: 3 }));
    }

    #[test]
    fn test_resolve_pentagon_fails() {
        // Five sides of a convex pentagon; only adjacent-side intersections
        // stay in bounds with the image-sized filter.
        let v = [(100, 20), (180, 80), (150, 170), (50, 170), (20, 80)];
        let segments: Vec<LineSegment> = (0..5)
            .map(|i| {
                let (a, b) = (v[i], v[(i + 1) % 5]);
                seg(a.0, a.1, b.0, b.1)
            })
            .collect();
        let config = CorrectionConfig {
            bounds: crate::config::IntersectionBounds::WithinImage,
            ..CorrectionConfig::default()
        };
        assert_eq!(collect_intersections(&segments, &config, 200, 200).len(), 5);
        let err = resolve_quadrilateral(&segments, 200, 200, &config).unwrap_err();
        assert!(matches!(err, Error::QuadrilateralNotFound { vertices: 5 }), "{err:?}");
    }

    #[test]
    fn test_within_image_bounds_filters_far_points() {
        let segments = [seg(0, 0, 10, 1), seg(0, 5, 10, 5)];
        let loose = CorrectionConfig::default();
        let strict = CorrectionConfig {
            bounds: crate::config::IntersectionBounds::WithinImage,
            ..CorrectionConfig::default()
        };
        // lines meet at (50, 5)
        assert_eq!(collect_intersections(&segments, &loose, 20, 20).len(), 1);
        assert!(collect_intersections(&segments, &strict, 20, 20).is_empty());
    }
}
