use crate::{sample_bilinear_u8, GrayImage, GrayImageView};
use nalgebra::{Matrix3, Point2, Vector3};

/// Plane-to-plane projective transform, `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self {
            h: Matrix3::identity(),
        }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        Point2::new((v[0] / w) as f32, (v[1] / w) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Projective map taking the unit square `(0,0), (1,0), (1,1), (0,1)` onto
/// `quad`, in that corner order.
fn unit_square_to_quad(quad: &[Point2<f64>; 4]) -> Option<Matrix3<f64>> {
    let [p0, p1, p2, p3] = *quad;
    let (dx1, dy1) = (p1.x - p2.x, p1.y - p2.y);
    let (dx2, dy2) = (p3.x - p2.x, p3.y - p2.y);
    let (dx3, dy3) = (p0.x - p1.x + p2.x - p3.x, p0.y - p1.y + p2.y - p3.y);

    let den = dx1 * dy2 - dx2 * dy1;
    if den == 0.0 {
        return None;
    }
    let g = (dx3 * dy2 - dx2 * dy3) / den;
    let h = (dx1 * dy3 - dx3 * dy1) / den;

    Some(Matrix3::new(
        p1.x - p0.x + g * p1.x,
        p3.x - p0.x + h * p3.x,
        p0.x,
        p1.y - p0.y + g * p1.y,
        p3.y - p0.y + h * p3.y,
        p0.y,
        g,
        h,
        1.0,
    ))
}

/// `true` when some three of the four points are collinear, relative to the
/// squared extent of the point set.
fn has_collinear_triple(pts: &[Point2<f64>; 4]) -> bool {
    let extent = pts
        .iter()
        .flat_map(|a| pts.iter().map(move |b| (a - b).norm_squared()))
        .fold(0.0_f64, f64::max);
    if extent == 0.0 {
        return true;
    }
    let tol = 1e-9 * extent;
    (0..4).any(|skip| {
        let [a, b, c] = match skip {
            0 => [pts[1], pts[2], pts[3]],
            1 => [pts[0], pts[2], pts[3]],
            2 => [pts[0], pts[1], pts[3]],
            _ => [pts[0], pts[1], pts[2]],
        };
        let (u, v) = (b - a, c - a);
        (u.x * v.y - u.y * v.x).abs() <= tol
    })
}

/// Compute H such that `dst ~ H * src` from exactly four correspondences.
///
/// Both quads are expressed as images of the unit square and composed.
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// when either side is degenerate (three or more collinear points).
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let src = src.map(|p| Point2::new(p.x as f64, p.y as f64));
    let dst = dst.map(|p| Point2::new(p.x as f64, p.y as f64));
    if has_collinear_triple(&src) || has_collinear_triple(&dst) {
        return None;
    }

    let square_to_src = unit_square_to_quad(&src)?;
    let square_to_dst = unit_square_to_quad(&dst)?;
    let h = square_to_dst * square_to_src.try_inverse()?;

    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    let h = h / s;
    if h.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(Homography::new(h))
}

/// Resample `src` into an `out_w × out_h` image.
///
/// Each output pixel `(x, y)` is mapped into the source through
/// `h_src_from_dst` and sampled bilinearly; source pixels outside `src` read
/// as zero. Pixel coordinates address pixel centres, so a transform built from
/// the corners `(0,0)` and `(out_w-1, out_h-1)` reproduces them exactly.
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    h_src_from_dst: &Homography,
    out_w: usize,
    out_h: usize,
) -> GrayImage {
    GrayImage::from_fn(out_w, out_h, |x, y| {
        let ps = h_src_from_dst.apply(Point2::new(x as f32, y as f32));
        sample_bilinear_u8(src, ps.x, ps.y)
    })
}
