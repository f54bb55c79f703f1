//! Polygon helpers for contour candidates.

use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

/// Douglas–Peucker simplification of a closed contour.
///
/// The contour is split at the point farthest from its first point and both
/// open chains are simplified independently. Vertices left on an almost
/// straight run (such as the arbitrary start point) are then dropped. The
/// result never repeats its first vertex.
pub(crate) fn approximate_closed_dp(contour: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if contour.len() < 3 || epsilon <= 0.0 || !epsilon.is_finite() {
        return contour.to_vec();
    }

    let p0 = contour[0];
    let mut far = 0usize;
    let mut far_d2 = 0i64;
    for (i, p) in contour.iter().enumerate() {
        let dx = (p.x - p0.x) as i64;
        let dy = (p.y - p0.y) as i64;
        let d2 = dx * dx + dy * dy;
        if d2 > far_d2 {
            far = i;
            far_d2 = d2;
        }
    }
    if far == 0 {
        return vec![p0];
    }

    let mut out = approximate_polygon_dp(&contour[..=far], epsilon, false);

    let mut back: Vec<Point<i32>> = contour[far..].to_vec();
    back.push(p0);
    let back = approximate_polygon_dp(&back, epsilon, false);

    // `out` ends with contour[far]; `back` starts there and ends at p0.
    if back.len() > 2 {
        out.extend_from_slice(&back[1..back.len() - 1]);
    }
    drop_flat_vertices(&mut out, epsilon);
    out
}

fn drop_flat_vertices(poly: &mut Vec<Point<i32>>, epsilon: f64) {
    let mut i = 0;
    while poly.len() > 3 && i < poly.len() {
        let n = poly.len();
        let prev = poly[(i + n - 1) % n];
        let next = poly[(i + 1) % n];
        if line_distance(poly[i], prev, next) <= epsilon {
            poly.remove(i);
            i = i.saturating_sub(1);
        } else {
            i += 1;
        }
    }
}

/// Distance from `p` to the line through `a` and `b`.
fn line_distance(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let (px, py) = ((p.x - a.x) as f64, (p.y - a.y) as f64);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return px.hypot(py);
    }
    (dx * py - dy * px).abs() / len
}

/// Twice the signed area of a polygon, y axis pointing down.
///
/// Positive for polygons traversed clockwise on screen.
pub(crate) fn signed_area2(poly: &[[f64; 2]]) -> f64 {
    let n = poly.len();
    (0..n)
        .map(|i| {
            let a = poly[i];
            let b = poly[(i + 1) % n];
            a[0] * b[1] - b[0] * a[1]
        })
        .sum()
}

/// Strict convexity: every turn has the same, non-zero orientation.
pub(crate) fn is_convex(poly: &[[f64; 2]]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f64;
    for i in 0..n {
        let p0 = poly[i];
        let p1 = poly[(i + 1) % n];
        let p2 = poly[(i + 2) % n];
        let cross = (p1[0] - p0[0]) * (p2[1] - p1[1]) - (p1[1] - p0[1]) * (p2[0] - p1[0]);
        if cross == 0.0 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}
