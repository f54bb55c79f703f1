//! Quadrilateral candidates from a binary image.
//!
//! Contours are traced on the binary image, filtered by perimeter relative to
//! the frame size, simplified to polygons and kept only when they are convex
//! quadrilaterals. Each survivor gets a deterministic vertex order and
//! sub-pixel refined corners.

use imageproc::contours::find_contours;
use imageproc::geometry::arc_length;
use nalgebra::Point2;
use patmark_core::{GrayImage, GrayImageView};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::binarize::to_luma;
use crate::polygon::{approximate_closed_dp, is_convex, signed_area2};
use crate::subpix::{refine_corners, SubPixParams};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateParams {
    /// Minimum contour perimeter as a fraction of `(rows + cols) / 2`.
    pub min_perimeter_frac: f64,
    /// Maximum contour perimeter as a fraction of `(rows + cols) / 2`.
    pub max_perimeter_frac: f64,
    /// Polygon simplification tolerance as a fraction of the perimeter.
    pub approx_epsilon_frac: f64,
    pub subpix: SubPixParams,
}

impl Default for CandidateParams {
    fn default() -> Self {
        Self {
            min_perimeter_frac: 0.25,
            max_perimeter_frac: 4.0,
            approx_epsilon_frac: 0.02,
            subpix: SubPixParams::default(),
        }
    }
}

/// Integer axis-aligned box, inclusive of both end pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: usize,
    pub height: usize,
}

impl BoundingBox {
    fn of(points: &[[f64; 2]]) -> Self {
        let (mut x0, mut y0) = (i32::MAX, i32::MAX);
        let (mut x1, mut y1) = (i32::MIN, i32::MIN);
        for &[x, y] in points {
            let (x, y) = (x as i32, y as i32);
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
        Self {
            x: x0,
            y: y0,
            width: (x1 - x0 + 1) as usize,
            height: (y1 - y0 + 1) as usize,
        }
    }
}

/// A convex quadrilateral that may be a marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Refined vertices, counter-clockwise on screen (y down).
    pub vertices: [Point2<f32>; 4],
    /// Index into `vertices` of the vertex closest to the image origin.
    pub reference: usize,
    /// Box around the unrefined polygon vertices.
    pub bbox: BoundingBox,
    pub perimeter: f64,
}

impl Candidate {
    /// Vertices starting at the reference vertex and walking backward, i.e.
    /// clockwise on screen: the order of the normalized patch corners
    /// top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Point2<f32>; 4] {
        std::array::from_fn(|j| self.vertices[(4 + self.reference - j) % 4])
    }

    /// Corners reordered for a template matched at `rotation`, so that
    /// corner 0 is the template's own top-left corner.
    pub fn oriented_corners(&self, rotation: u8) -> [Point2<f32>; 4] {
        let rot = (rotation & 3) as usize;
        std::array::from_fn(|j| self.vertices[(8 - rot + self.reference - j) % 4])
    }
}

/// Find quadrilateral candidates in `binary`, refining corners on `gray`.
///
/// Candidates come out in contour-tracing order.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(w = binary.width, h = binary.height))
)]
pub fn extract_candidates(
    binary: &GrayImage,
    gray: &GrayImageView<'_>,
    params: &CandidateParams,
) -> Vec<Candidate> {
    let contours = find_contours::<i32>(&to_luma(binary));
    let avg_size = (binary.width + binary.height) as f64 / 2.0;
    let min_perimeter = params.min_perimeter_frac * avg_size;
    let max_perimeter = params.max_perimeter_frac * avg_size;

    let mut out = Vec::new();
    for contour in &contours {
        let perimeter = arc_length(&contour.points, true);
        if perimeter < min_perimeter || perimeter > max_perimeter {
            continue;
        }

        let epsilon = params.approx_epsilon_frac * perimeter;
        let poly = approximate_closed_dp(&contour.points, epsilon);
        if poly.len() != 4 {
            log::trace!("contour rejected: {} polygon vertices", poly.len());
            continue;
        }
        let quad: [[f64; 2]; 4] = std::array::from_fn(|i| [poly[i].x as f64, poly[i].y as f64]);
        if !is_convex(&quad) {
            log::trace!("contour rejected: non-convex quad {:?}", quad);
            continue;
        }
        let (quad, reference) = canonical_quad(quad);
        let bbox = BoundingBox::of(&quad);

        let mut vertices = quad.map(|[x, y]| Point2::new(x as f32, y as f32));
        refine_corners(gray, &mut vertices, &params.subpix);

        out.push(Candidate {
            vertices,
            reference,
            bbox,
            perimeter,
        });
    }

    log::debug!("{} contours, {} quad candidates", contours.len(), out.len());
    out
}

/// Put `quad` in counter-clockwise screen order and pick its reference
/// vertex. Distance ties go to the first vertex of that order, which is not
/// necessarily the first one of the traced contour.
fn canonical_quad(mut quad: [[f64; 2]; 4]) -> ([[f64; 2]; 4], usize) {
    if signed_area2(&quad) > 0.0 {
        quad.reverse();
    }
    let reference = reference_vertex(&quad);
    (quad, reference)
}

/// Index of the vertex nearest the origin; the first one wins ties.
fn reference_vertex(quad: &[[f64; 2]; 4]) -> usize {
    let mut best = 0;
    let mut best_d2 = f64::INFINITY;
    for (i, p) in quad.iter().enumerate() {
        let d2 = p[0] * p[0] + p[1] * p[1];
        if d2 < best_d2 {
            best = i;
            best_d2 = d2;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(pts: [[f32; 2]; 4], reference: usize) -> Candidate {
        Candidate {
            vertices: pts.map(|[x, y]| Point2::new(x, y)),
            reference,
            bbox: BoundingBox {
                x: 0,
                y: 0,
                width: 1,
                height: 1,
            },
            perimeter: 0.0,
        }
    }

    #[test]
    fn corners_walk_backward_from_reference() {
        // Counter-clockwise on screen starting at bottom-left.
        let c = quad([[0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]], 3);
        let xy = c.corners().map(|p| [p.x, p.y]);
        assert_eq!(xy, [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]);
    }

    #[test]
    fn oriented_corners_shift_by_rotation() {
        let c = quad([[0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]], 3);
        let canon = c.corners();
        for rot in 0..4u8 {
            let oriented = c.oriented_corners(rot);
            for j in 0..4 {
                assert_eq!(oriented[j], canon[(j + rot as usize) % 4]);
            }
        }
    }

    #[test]
    fn reference_tie_keeps_first() {
        let q = [[5.0, 0.0], [10.0, 10.0], [0.0, 5.0], [3.0, 20.0]];
        assert_eq!(reference_vertex(&q), 0);
    }

    #[test]
    fn tie_is_broken_in_counter_clockwise_order() {
        // Traced clockwise on screen: top, right, bottom, left. Top and left
        // are equally close to the origin.
        let traced = [[100.0, 50.0], [150.0, 100.0], [100.0, 150.0], [50.0, 100.0]];
        let (quad, reference) = canonical_quad(traced);
        assert_eq!(
            quad,
            [[50.0, 100.0], [100.0, 150.0], [150.0, 100.0], [100.0, 50.0]]
        );
        assert_eq!(quad[reference], [50.0, 100.0]);
    }

    #[test]
    fn bbox_is_inclusive() {
        let b = BoundingBox::of(&[[100.0, 100.0], [180.0, 100.0], [180.0, 180.0], [100.0, 180.0]]);
        assert_eq!(
            b,
            BoundingBox {
                x: 100,
                y: 100,
                width: 81,
                height: 81
            }
        );
    }
}
