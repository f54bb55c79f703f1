//! Marker extrinsics from four ordered image corners.

use crate::{homography_from_4pt, CameraModel};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Rigid transform taking marker-frame points into the camera frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation * p + self.translation
    }
}

/// Estimates the camera-relative pose of a square marker.
///
/// `corners` are image pixels ordered top-left, top-right, bottom-right,
/// bottom-left in the marker's canonical orientation. The marker frame has its
/// origin at the marker centre, x toward the right edge, y toward the bottom
/// edge and z = x × y.
pub trait ExtrinsicsSolver {
    fn solve(
        &self,
        corners: &[Point2<f32>; 4],
        marker_size: f64,
        camera: &CameraModel,
    ) -> Option<Pose>;
}

/// Marker-frame coordinates of the four corners for a marker of side `size`.
pub fn marker_object_points(size: f64) -> [Point3<f64>; 4] {
    let h = 0.5 * size;
    [
        Point3::new(-h, -h, 0.0),
        Point3::new(h, -h, 0.0),
        Point3::new(h, h, 0.0),
        Point3::new(-h, h, 0.0),
    ]
}

/// Closed-form planar pose: undistort, fit the plane-to-image homography and
/// decompose it into `R | t`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlanarPoseSolver;

impl ExtrinsicsSolver for PlanarPoseSolver {
    fn solve(
        &self,
        corners: &[Point2<f32>; 4],
        marker_size: f64,
        camera: &CameraModel,
    ) -> Option<Pose> {
        if !(marker_size.is_finite() && marker_size > 0.0) {
            return None;
        }

        let mut normalized = [Point2::new(0.0_f32, 0.0); 4];
        for (n, c) in normalized.iter_mut().zip(corners) {
            let [x, y] = camera.pixel_to_undistorted_normalized([c.x as f64, c.y as f64])?;
            *n = Point2::new(x as f32, y as f32);
        }

        // Solve on the unit square, then fold the side length into the
        // rotation columns: H_unit = λ [s·r1, s·r2, t].
        let plane = marker_object_points(1.0).map(|p| Point2::new(p.x as f32, p.y as f32));
        let mut h = homography_from_4pt(&plane, &normalized)?.h;
        for c in 0..2 {
            let mut col = h.column_mut(c);
            col /= marker_size;
        }

        decompose_plane_homography(&h)
    }
}

fn decompose_plane_homography(h: &Matrix3<f64>) -> Option<Pose> {
    let h1: Vector3<f64> = h.column(0).into_owned();
    let h2: Vector3<f64> = h.column(1).into_owned();
    let h3: Vector3<f64> = h.column(2).into_owned();

    let scale = 0.5 * (h1.norm() + h2.norm());
    if !scale.is_finite() || scale < 1e-12 {
        return None;
    }

    let mut sign = 1.0 / scale;
    if h3.z * sign < 0.0 {
        sign = -sign;
    }

    let r1 = h1 * sign;
    let r2 = h2 * sign;
    let r3 = r1.cross(&r2);
    let t = h3 * sign;

    let approx = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = approx.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        u_fixed.column_mut(2).neg_mut();
        r = u_fixed * v_t;
    }

    if !r.iter().chain(t.iter()).all(|v| v.is_finite()) {
        return None;
    }

    Some(Pose {
        rotation: Rotation3::from_matrix_unchecked(r),
        translation: t,
    })
}
