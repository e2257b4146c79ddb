//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Contrast / brightness | per-pixel math from [`calculations`](super::calculations) |
//! | Lossy round-trip | `image::codecs::jpeg::JpegEncoder` at the requested quality |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Border | `image::imageops::replace` onto a solid canvas |
//! | Encode | JPEG at quality 90, other formats via `image`'s encoders |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{
    MAX_EDGE, brightness_channel, contrast_channel, luma, scaled_dimensions,
};
use super::params::{Quality, ResizeParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::path::Path;

/// JPEG quality for files we write, matching the helper's output.
const OUTPUT_JPEG_QUALITY: u8 = 90;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

/// Whether `path` has an extension this backend can decode.
pub fn is_supported_image(path: &Path) -> bool {
    format_for(path).is_some()
}

fn format_for(path: &Path) -> Option<ImageFormat> {
    let ext = path.extension()?.to_str()?;
    PHOTO_CANDIDATES
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(ext))
        .map(|(_, fmt)| *fmt)
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Map every RGB channel through `f`, leaving alpha untouched. The result
/// keeps an alpha channel only if the input had one.
fn map_rgb(image: &DynamicImage, f: impl Fn(u8) -> u8) -> DynamicImage {
    let mut rgba: RgbaImage = image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = f(*channel);
        }
    }
    let out = DynamicImage::ImageRgba8(rgba);
    if image.color().has_alpha() {
        out
    } else {
        DynamicImage::ImageRgb8(out.to_rgb8())
    }
}

/// Mean luma over all pixels, rounded to the nearest level.
fn mean_luma(image: &DynamicImage) -> f64 {
    let rgb = image.to_rgb8();
    let count = u64::from(rgb.width()) * u64::from(rgb.height());
    if count == 0 {
        return 0.0;
    }
    let total: f64 = rgb.pixels().map(|p| luma(p[0], p[1], p[2])).sum();
    (total / count as f64).round()
}

/// Frame `image` with a solid border `width` pixels wide on every side.
///
/// The result keeps an alpha channel only if the input had one.
pub fn add_border(
    image: &DynamicImage,
    width: u32,
    color: Rgba<u8>,
) -> Result<DynamicImage, BackendError> {
    let grow = |edge: u32| {
        width
            .checked_mul(2)
            .and_then(|w| edge.checked_add(w))
            .filter(|&e| e <= MAX_EDGE)
            .ok_or_else(|| BackendError::ProcessingFailed(format!("Border {width}px is too wide")))
    };
    let mut canvas = RgbaImage::from_pixel(grow(image.width())?, grow(image.height())?, color);
    imageops::replace(&mut canvas, &image.to_rgba8(), width as i64, width as i64);
    let out = DynamicImage::ImageRgba8(canvas);
    Ok(if image.color().has_alpha() {
        out
    } else {
        DynamicImage::ImageRgb8(out.to_rgb8())
    })
}

/// Save a DynamicImage to the given path, inferring format from extension.
/// JPEG output is written at a fixed quality of 90 and without alpha.
pub fn save_image(img: &DynamicImage, path: &Path) -> Result<(), BackendError> {
    let format = format_for(path).ok_or_else(|| {
        BackendError::ProcessingFailed(format!("Unsupported output format: {}", path.display()))
    })?;
    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let writer = std::io::BufWriter::new(file);
            let encoder = JpegEncoder::new_with_quality(writer, OUTPUT_JPEG_QUALITY);
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
        }
        other => img.save_with_format(path, other).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to write {}: {}", path.display(), e))
        }),
    }
}

impl ImageBackend for RustBackend {
    fn load(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        ImageReader::open(path)
            .map_err(BackendError::Io)?
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .decode()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!(
                    "Failed to decode {}: {}",
                    path.display(),
                    e
                ))
            })
    }

    fn adjust(
        &self,
        image: &DynamicImage,
        contrast: f64,
        brightness: f64,
    ) -> Result<DynamicImage, BackendError> {
        if !contrast.is_finite() || !brightness.is_finite() || contrast < 0.0 || brightness < 0.0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Invalid enhancement factors: contrast {contrast}, brightness {brightness}"
            )));
        }
        let mut img = image.clone();
        if contrast != 1.0 {
            let mean = mean_luma(&img);
            img = map_rgb(&img, |c| contrast_channel(c, mean, contrast));
        }
        if brightness != 1.0 {
            img = map_rgb(&img, |c| brightness_channel(c, brightness));
        }
        Ok(img)
    }

    fn recompress(
        &self,
        image: &DynamicImage,
        quality: Quality,
    ) -> Result<DynamicImage, BackendError> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.value() as u8);
        DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(encoder)
            .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
        image::load_from_memory_with_format(&buffer, ImageFormat::Jpeg)
            .map_err(|e| BackendError::ProcessingFailed(format!("JPEG decode failed: {}", e)))
    }

    fn resize(&self, params: &ResizeParams) -> Result<Dimensions, BackendError> {
        if !params.scale.is_finite() || params.scale <= 0.0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Invalid scale factor: {}",
                params.scale
            )));
        }
        let img = self.load(&params.source)?;
        let (width, height) = scaled_dimensions((img.width(), img.height()), params.scale)
            .ok_or_else(|| {
                BackendError::ProcessingFailed(format!(
                    "Scale {} makes {}x{} too large to resize",
                    params.scale,
                    img.width(),
                    img.height()
                ))
            })?;
        let resized = img.resize_exact(width, height, FilterType::Lanczos3);
        save_image(&resized, &params.output)?;
        Ok(Dimensions { width, height })
    }
}
