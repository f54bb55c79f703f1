//! Iterative sub-pixel corner refinement.
//!
//! At the true corner `q`, every image gradient `g(p)` in the neighbourhood is
//! orthogonal to `p - q` (on edges) or vanishes (in flat areas). Each
//! iteration solves the Gaussian-weighted least-squares system
//! `Σ g gᵀ · q = Σ g gᵀ · p` over a `(2w+1)²` window around the current
//! estimate.

use nalgebra::Point2;
use patmark_core::GrayImageView;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubPixParams {
    /// Half side `w` of the search window.
    pub half_window: u32,
    pub max_iters: u32,
    /// Stop once a step moves the corner by less than this many pixels.
    pub epsilon: f32,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 3,
            max_iters: 3,
            epsilon: 0.01,
        }
    }
}

/// Refine `corners` in place.
///
/// A corner whose estimate drifts farther than the half window from its
/// starting position, or whose system is singular on the first iteration,
/// keeps its starting position.
pub fn refine_corners(
    gray: &GrayImageView<'_>,
    corners: &mut [Point2<f32>],
    params: &SubPixParams,
) {
    if gray.is_empty() || params.half_window == 0 || params.max_iters == 0 {
        return;
    }
    let mask = window_mask(params.half_window as i32);
    for c in corners.iter_mut() {
        *c = refine_one(gray, *c, params, &mask);
    }
}

/// Separable Gaussian weights `exp(-d²/w²)` for `d ∈ [-w, w]`.
fn window_mask(w: i32) -> Vec<f32> {
    let coeff = 1.0 / (w * w) as f32;
    (-w..=w).map(|d| (-(d * d) as f32 * coeff).exp()).collect()
}

fn refine_one(
    gray: &GrayImageView<'_>,
    start: Point2<f32>,
    params: &SubPixParams,
    mask: &[f32],
) -> Point2<f32> {
    let w = params.half_window as i32;
    let eps2 = params.epsilon * params.epsilon;
    let mut c = start;

    for _ in 0..params.max_iters {
        let (mut a, mut b, mut cc) = (0.0f64, 0.0f64, 0.0f64);
        let (mut bb1, mut bb2) = (0.0f64, 0.0f64);

        for dy in -w..=w {
            let my = mask[(dy + w) as usize];
            for dx in -w..=w {
                let m = (mask[(dx + w) as usize] * my) as f64;
                let x = c.x + dx as f32;
                let y = c.y + dy as f32;
                let gx = sample_clamped(gray, x + 1.0, y) - sample_clamped(gray, x - 1.0, y);
                let gy = sample_clamped(gray, x, y + 1.0) - sample_clamped(gray, x, y - 1.0);
                let (gx, gy) = (gx as f64, gy as f64);

                let gxx = gx * gx * m;
                let gxy = gx * gy * m;
                let gyy = gy * gy * m;
                a += gxx;
                b += gxy;
                cc += gyy;
                bb1 += gxx * dx as f64 + gxy * dy as f64;
                bb2 += gxy * dx as f64 + gyy * dy as f64;
            }
        }

        let det = a * cc - b * b;
        if det.abs() <= f64::EPSILON * (a * cc).abs().max(1.0) {
            break;
        }
        let step_x = ((cc * bb1 - b * bb2) / det) as f32;
        let step_y = ((a * bb2 - b * bb1) / det) as f32;
        let next = Point2::new(c.x + step_x, c.y + step_y);

        let moved2 = step_x * step_x + step_y * step_y;
        c = next;
        if c.x < 0.0 || c.y < 0.0 || c.x >= gray.width as f32 || c.y >= gray.height as f32 {
            break;
        }
        if moved2 <= eps2 {
            break;
        }
    }

    let (dx, dy) = (c.x - start.x, c.y - start.y);
    if !c.x.is_finite() || !c.y.is_finite() || dx.abs() > w as f32 || dy.abs() > w as f32 {
        return start;
    }
    c
}

/// Bilinear sample with edge replication.
fn sample_clamped(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let max_x = (src.width - 1) as f32;
    let max_y = (src.height - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    patmark_core::sample_bilinear(src, x, y)
}
