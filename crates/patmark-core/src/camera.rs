//! Pinhole intrinsics and Brown-Conrady distortion.

use serde::{Deserialize, Serialize};

/// Pinhole camera intrinsics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in x (pixels).
    pub fx: f64,
    /// Focal length in y (pixels).
    pub fy: f64,
    /// Principal point x (pixels).
    pub cx: f64,
    /// Principal point y (pixels).
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Returns `true` when all entries are finite and the focal lengths are non-zero.
    pub fn is_valid(self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx.abs() > 1e-12
            && self.fy.abs() > 1e-12
    }

    pub fn pixel_to_normalized(self, pixel_xy: [f64; 2]) -> Option<[f64; 2]> {
        if !self.is_valid() {
            return None;
        }
        let x = (pixel_xy[0] - self.cx) / self.fx;
        let y = (pixel_xy[1] - self.cy) / self.fy;
        (x.is_finite() && y.is_finite()).then_some([x, y])
    }

    pub fn normalized_to_pixel(self, normalized_xy: [f64; 2]) -> [f64; 2] {
        [
            self.fx * normalized_xy[0] + self.cx,
            self.fy * normalized_xy[1] + self.cy,
        ]
    }
}

/// Radial-tangential distortion coefficients in OpenCV order.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RadialTangentialDistortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    #[serde(default)]
    pub k3: f64,
}

impl RadialTangentialDistortion {
    pub fn is_zero(self) -> bool {
        self == Self::default()
    }

    /// Apply distortion to normalized coordinates.
    pub fn distort_normalized(self, normalized_xy: [f64; 2]) -> [f64; 2] {
        let [x, y] = normalized_xy;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        [x * radial + x_tan, y * radial + y_tan]
    }

    /// Invert [`Self::distort_normalized`] by fixed-point iteration.
    pub fn undistort_normalized(self, distorted_xy: [f64; 2]) -> Option<[f64; 2]> {
        const MAX_ITERS: usize = 20;
        const EPS: f64 = 1e-12;

        if self.is_zero() {
            return Some(distorted_xy);
        }

        let [xd, yd] = distorted_xy;
        let (mut x, mut y) = (xd, yd);
        for _ in 0..MAX_ITERS {
            let r2 = x * x + y * y;
            let r4 = r2 * r2;
            let r6 = r4 * r2;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
            if !radial.is_finite() || radial.abs() < 1e-12 {
                return None;
            }

            let dx_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            let x_next = (xd - dx_tan) / radial;
            let y_next = (yd - dy_tan) / radial;
            if !x_next.is_finite() || !y_next.is_finite() {
                return None;
            }

            let step = (x_next - x).hypot(y_next - y);
            x = x_next;
            y = y_next;
            if step <= EPS {
                break;
            }
        }
        Some([x, y])
    }
}

/// Intrinsics plus distortion of the camera that captured a frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraModel {
    pub intrinsics: CameraIntrinsics,
    #[serde(default)]
    pub distortion: RadialTangentialDistortion,
}

impl CameraModel {
    pub fn new(intrinsics: CameraIntrinsics, distortion: RadialTangentialDistortion) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }

    /// Undistorted normalized coordinates of an observed (distorted) pixel.
    pub fn pixel_to_undistorted_normalized(self, pixel_xy: [f64; 2]) -> Option<[f64; 2]> {
        let xd = self.intrinsics.pixel_to_normalized(pixel_xy)?;
        self.distortion.undistort_normalized(xd)
    }

    /// Project an undistorted normalized point back to image pixels.
    pub fn project_normalized(self, normalized_xy: [f64; 2]) -> [f64; 2] {
        let xd = self.distortion.distort_normalized(normalized_xy);
        self.intrinsics.normalized_to_pixel(xd)
    }
}
