use crate::{core, detector, library};
use ::image::DynamicImage;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("invalid grayscale image buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid grayscale image dimensions (width={width}, height={height})")]
    InvalidGrayDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Library(#[from] library::LibraryError),

    #[error(transparent)]
    Detect(#[from] detector::DetectError),
}

/// Borrow an `image::GrayImage` as a `patmark-core` view.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Borrow an `image::GrayImage` as a detector input frame.
pub fn gray_frame(img: &::image::GrayImage) -> detector::Frame<'_> {
    detector::Frame::gray(img.width() as usize, img.height() as usize, img.as_raw())
}

/// Build a template library from `size × size` base images keyed by id.
pub fn library_from_images<'a, I>(
    layout: library::PatchLayout,
    templates: I,
) -> Result<library::TemplateLibrary, DetectError>
where
    I: IntoIterator<Item = (u32, &'a ::image::GrayImage)>,
{
    let mut lib = library::TemplateLibrary::new(layout)?;
    for (id, img) in templates {
        lib.add_pattern(id, &gray_view(img))?;
    }
    log::debug!("template library with {} patterns", lib.len());
    Ok(lib)
}

/// Detect patterns in a grayscale image.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(img, detector, camera, library),
        fields(width = img.width(), height = img.height(), templates = library.len())
    )
)]
pub fn detect_patterns(
    img: &::image::GrayImage,
    detector: &detector::PatternDetector,
    camera: &core::CameraModel,
    library: &library::TemplateLibrary,
) -> Result<Vec<detector::DetectedPattern>, DetectError> {
    Ok(detector.detect(&gray_frame(img), camera, library)?)
}

/// Detect patterns in any decoded image.
///
/// Color images are handed to the detector as RGBA so the detector's own
/// luma weights apply.
pub fn detect_patterns_dynamic(
    img: &DynamicImage,
    detector: &detector::PatternDetector,
    camera: &core::CameraModel,
    library: &library::TemplateLibrary,
) -> Result<Vec<detector::DetectedPattern>, DetectError> {
    match img {
        DynamicImage::ImageLuma8(gray) => detect_patterns(gray, detector, camera, library),
        other => {
            let rgba = other.to_rgba8();
            let frame = detector::Frame::new(
                rgba.width() as usize,
                rgba.height() as usize,
                detector::PixelFormat::Rgba8,
                rgba.as_raw(),
            );
            Ok(detector.detect(&frame, camera, library)?)
        }
    }
}

/// Detect patterns in a raw row-major 8-bit grayscale buffer.
pub fn detect_patterns_gray_u8(
    width: u32,
    height: u32,
    pixels: &[u8],
    detector: &detector::PatternDetector,
    camera: &core::CameraModel,
    library: &library::TemplateLibrary,
) -> Result<Vec<detector::DetectedPattern>, DetectError> {
    let img = gray_image_from_slice(width, height, pixels)?;
    detect_patterns(&img, detector, camera, library)
}

fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, DetectError> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .ok_or(DetectError::InvalidGrayDimensions { width, height })?;
    if pixels.len() != expected {
        return Err(DetectError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(DetectError::InvalidGrayDimensions { width, height })
}
