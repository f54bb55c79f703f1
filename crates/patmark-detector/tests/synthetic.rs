use approx::assert_abs_diff_eq;
use nalgebra::Point2;
use patmark_core::{CameraIntrinsics, CameraModel, GrayImage, RadialTangentialDistortion};
use patmark_detector::{
    extract_candidates, normalize, threshold_gray, BinarizationConfig, BoundingBox,
    CandidateParams, DetectError, Frame, MonitorStage, PatternDetector, PatternDetectorParams,
    PipelineOutput, PixelFormat, ThresholdMode,
};
use patmark_library::{MatchParams, Matcher, PatchLayout, TemplateLibrary};

const W: usize = 640;
const H: usize = 480;
const DARK: u8 = 20;
const LIGHT: u8 = 230;

/// Bordered marker of side `side` at `(x0, y0)` on a light `w × h` canvas.
/// The border is a quarter of the side; of the interior, only the quadrant
/// `dark_quadrant` (0 top-left, 1 top-right, 2 bottom-right, 3 bottom-left)
/// is dark.
fn render_marker(
    w: usize,
    h: usize,
    x0: usize,
    y0: usize,
    side: usize,
    dark_quadrant: usize,
) -> GrayImage {
    let border = side / 4;
    let half = side / 2;
    GrayImage::from_fn(w, h, |x, y| {
        if x < x0 || y < y0 || x >= x0 + side || y >= y0 + side {
            return LIGHT;
        }
        let (u, v) = (x - x0, y - y0);
        if u < border || v < border || u >= side - border || v >= side - border {
            return DARK;
        }
        let quadrant = match (u < half, v < half) {
            (true, true) => 0,
            (false, true) => 1,
            (false, false) => 2,
            (true, false) => 3,
        };
        if quadrant == dark_quadrant {
            DARK
        } else {
            LIGHT
        }
    })
}

fn striped_template(size: usize) -> GrayImage {
    let border = size / 4;
    GrayImage::from_fn(size, size, |x, y| {
        let inside = x >= border && y >= border && x < size - border && y < size - border;
        if !inside || (y / 8) % 2 == 0 {
            DARK
        } else {
            LIGHT
        }
    })
}

fn library() -> TemplateLibrary {
    let mut lib = TemplateLibrary::new(PatchLayout::bordered(64)).expect("layout");
    lib.add_pattern(3, &render_marker(64, 64, 0, 0, 64, 0).view())
        .expect("template 3");
    lib.add_pattern(5, &striped_template(64).view())
        .expect("template 5");
    lib
}

fn camera() -> CameraModel {
    CameraModel::new(
        CameraIntrinsics {
            fx: 800.0,
            fy: 800.0,
            cx: 320.0,
            cy: 240.0,
        },
        RadialTangentialDistortion::default(),
    )
}

fn params() -> PatternDetectorParams {
    PatternDetectorParams {
        binarization: BinarizationConfig {
            mode: ThresholdMode::Fixed,
            fixed_threshold: 100,
            erode: false,
            dilate: false,
            ..BinarizationConfig::default()
        },
        ..PatternDetectorParams::default()
    }
}

fn assert_near(p: Point2<f32>, x: f32, y: f32, tol: f32) {
    assert!(
        (p.x - x).abs() <= tol && (p.y - y).abs() <= tol,
        "({}, {}) not within {tol} of ({x}, {y})",
        p.x,
        p.y
    );
}

#[test]
fn upright_marker_is_identified_with_pose() {
    let img = render_marker(W, H, 200, 160, 160, 0);
    let detector = PatternDetector::new(params()).expect("detector");
    let found = detector
        .detect(&Frame::gray(W, H, &img.data), &camera(), &library())
        .expect("detect");

    assert_eq!(found.len(), 1, "{found:?}");
    let p = &found[0];
    assert_eq!(p.id, 3);
    assert_eq!(p.orientation, 0);
    assert!(p.confidence > 0.9, "confidence {}", p.confidence);
    assert_near(p.vertices[0], 199.5, 159.5, 1.0);
    assert_near(p.vertices[1], 359.5, 159.5, 1.0);
    assert_near(p.vertices[2], 359.5, 319.5, 1.0);
    assert_near(p.vertices[3], 199.5, 319.5, 1.0);

    let pose = p.pose.expect("pose");
    // 160 px at f = 800 for a unit marker puts it 5 units away.
    assert_abs_diff_eq!(pose.translation.z, 5.0, epsilon = 0.05);
    assert!(pose.rotation.angle() < 0.02, "angle {}", pose.rotation.angle());
    assert_eq!(p.size, 1.0);
}

#[test]
fn rotated_marker_reports_orientation_and_reordered_corners() {
    let cases = [
        (1usize, (359.5f32, 159.5f32)),
        (2, (359.5, 319.5)),
        (3, (199.5, 319.5)),
    ];
    for (quadrant, top_left) in cases {
        let img = render_marker(W, H, 200, 160, 160, quadrant);
        let detector = PatternDetector::new(params()).expect("detector");
        let found = detector
            .detect(&Frame::gray(W, H, &img.data), &camera(), &library())
            .expect("detect");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 3);
        assert_eq!(found[0].orientation as usize, quadrant);
        assert_near(found[0].vertices[0], top_left.0, top_left.1, 1.0);
    }
}

#[test]
fn color_frame_gives_same_detection() {
    let img = render_marker(W, H, 200, 160, 160, 2);
    let bgr: Vec<u8> = img.data.iter().flat_map(|&v| [v, v, v]).collect();
    let detector = PatternDetector::new(params()).expect("detector");
    let lib = library();

    let a = detector
        .detect(&Frame::gray(W, H, &img.data), &camera(), &lib)
        .expect("gray");
    let b = detector
        .detect(&Frame::new(W, H, PixelFormat::Bgr8, &bgr), &camera(), &lib)
        .expect("bgr");
    assert_eq!(a, b);
}

#[test]
fn one_detector_serves_several_threads() {
    let detector = PatternDetector::new(params()).expect("detector");
    let lib = library();
    let cam = camera();
    let frames: Vec<GrayImage> = (0..4)
        .map(|q| render_marker(W, H, 200, 160, 160, q))
        .collect();

    let orientations: Vec<u8> = std::thread::scope(|s| {
        let handles: Vec<_> = frames
            .iter()
            .map(|img| {
                let (detector, lib, cam) = (&detector, &lib, &cam);
                s.spawn(move || {
                    let found = detector
                        .detect(&Frame::gray(W, H, &img.data), cam, lib)
                        .expect("detect");
                    assert_eq!(found.len(), 1);
                    found[0].orientation
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(orientations, vec![0, 1, 2, 3]);
}

#[test]
fn empty_library_detects_nothing() {
    let img = render_marker(W, H, 200, 160, 160, 0);
    let detector = PatternDetector::new(params()).expect("detector");
    let lib = TemplateLibrary::new(PatchLayout::bordered(64)).expect("layout");
    let found = detector
        .detect(&Frame::gray(W, H, &img.data), &camera(), &lib)
        .expect("detect");
    assert!(found.is_empty());
}

#[test]
fn malformed_input_is_reported() {
    let detector = PatternDetector::new(params()).expect("detector");
    assert!(matches!(
        detector.detect(&Frame::gray(0, 0, &[]), &camera(), &library()),
        Err(DetectError::EmptyFrame { .. })
    ));

    let img = GrayImage::new(W, H);
    let other = TemplateLibrary::new(PatchLayout::plain(64)).expect("layout");
    assert!(matches!(
        detector.detect(&Frame::gray(W, H, &img.data), &camera(), &other),
        Err(DetectError::LayoutMismatch { .. })
    ));
}

#[test]
fn monitor_stages_return_intermediate_images() {
    let img = render_marker(W, H, 200, 160, 160, 0);
    let frame = Frame::gray(W, H, &img.data);
    let lib = library();

    let mut p = params();
    p.monitor = MonitorStage::Binary;
    let out = PatternDetector::new(p.clone())
        .expect("detector")
        .run(&frame, &camera(), &lib)
        .expect("run");
    match out {
        PipelineOutput::Binary(bin) => assert_eq!(bin, threshold_gray(&img, &p.binarization)),
        other => panic!("unexpected {other:?}"),
    }

    p.monitor = MonitorStage::Normalized;
    let out = PatternDetector::new(p)
        .expect("detector")
        .run(&frame, &camera(), &lib)
        .expect("run");
    match out {
        PipelineOutput::Normalized(patches) => {
            assert_eq!(patches.len(), 1);
            assert_eq!((patches[0].width, patches[0].height), (64, 64));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn single_square_gives_one_candidate() {
    let inside = |x: usize, y: usize| (100..=180).contains(&x) && (100..=180).contains(&y);
    let speck = |x: usize, y: usize| y == 300 && (400..=401).contains(&x);
    let binary = GrayImage::from_fn(W, H, |x, y| {
        if inside(x, y) || speck(x, y) {
            255
        } else {
            0
        }
    });
    let gray = GrayImage::from_fn(W, H, |x, y| if inside(x, y) { DARK } else { LIGHT });

    let cands = extract_candidates(&binary, &gray.view(), &CandidateParams::default());
    assert_eq!(cands.len(), 1);
    let c = &cands[0];
    assert_eq!(
        c.bbox,
        BoundingBox {
            x: 100,
            y: 100,
            width: 81,
            height: 81
        }
    );
    assert_near(c.vertices[c.reference], 100.0, 100.0, 1.5);
    assert_near(c.corners()[0], 100.0, 100.0, 1.5);
    assert_near(c.corners()[1], 180.0, 100.0, 1.5);
    assert_near(c.corners()[2], 180.0, 180.0, 1.5);
}

#[test]
fn perimeter_upper_bound_is_inclusive() {
    // 512 × 512 keeps `frac * avg_size` exact for `frac = perimeter / 512`.
    const N: usize = 512;
    let inside = |x: usize, y: usize| (100..=180).contains(&x) && (100..=180).contains(&y);
    let binary = GrayImage::from_fn(N, N, |x, y| if inside(x, y) { 255 } else { 0 });
    let gray = GrayImage::from_fn(N, N, |x, y| if inside(x, y) { DARK } else { LIGHT });

    let cands = extract_candidates(&binary, &gray.view(), &CandidateParams::default());
    assert_eq!(cands.len(), 1);
    let perimeter = cands[0].perimeter;
    assert!(perimeter > 300.0, "perimeter {perimeter}");

    let at_bound = CandidateParams {
        max_perimeter_frac: perimeter / N as f64,
        ..CandidateParams::default()
    };
    assert_eq!(
        extract_candidates(&binary, &gray.view(), &at_bound).len(),
        1
    );

    let below = CandidateParams {
        max_perimeter_frac: (perimeter - 1.0) / N as f64,
        ..CandidateParams::default()
    };
    assert!(extract_candidates(&binary, &gray.view(), &below).is_empty());
}

#[test]
fn non_convex_quad_is_rejected() {
    let dart = [(100.0, 100.0), (300.0, 100.0), (160.0, 160.0), (100.0, 300.0)];
    let binary = GrayImage::from_fn(W, H, |x, y| {
        if point_in_polygon(&dart, x as f64, y as f64) {
            255
        } else {
            0
        }
    });
    let gray = GrayImage::from_fn(W, H, |x, y| 255 - binary.get(x, y));
    let cands = extract_candidates(&binary, &gray.view(), &CandidateParams::default());
    assert!(cands.is_empty(), "{cands:?}");
}

#[test]
fn template_normalized_through_identity_matches_itself() {
    let lib = library();
    let base = render_marker(64, 64, 0, 0, 64, 0);
    let corners = [
        Point2::new(0.0, 0.0),
        Point2::new(63.0, 0.0),
        Point2::new(63.0, 63.0),
        Point2::new(0.0, 63.0),
    ];
    let bbox = BoundingBox {
        x: 0,
        y: 0,
        width: 64,
        height: 64,
    };
    let patch = normalize(&base.view(), &corners, &bbox, 64).expect("normalize");
    assert_eq!(patch, base);

    let res = Matcher::new(MatchParams::default())
        .identify(&patch.view(), &lib)
        .expect("identify");
    let m = res.accepted().expect("accepted");
    assert_eq!((m.id, m.rotation), (3, 0));
    assert_abs_diff_eq!(m.score, 1.0, epsilon = 1e-9);
}

fn point_in_polygon(poly: &[(f64, f64)], x: f64, y: f64) -> bool {
    let mut inside = false;
    let n = poly.len();
    for i in 0..n {
        let (xi, yi) = poly[i];
        let (xj, yj) = poly[(i + n - 1) % n];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
    }
    inside
}
