//! Local image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the in-process operations the
//! dispatcher falls back to when the helper cannot be used: load, adjust
//! (contrast + brightness), recompress (lossy round-trip) and resize.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust on top of
//! the `image` crate.

use super::params::{Quality, ResizeParams};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for local image processing backends.
///
/// `Sync` because batch resizes fan out over rayon's pool.
pub trait ImageBackend: Sync {
    /// Decode an image file.
    fn load(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Apply contrast, then brightness. Both factors are normalized
    /// (1.0 = unchanged).
    fn adjust(
        &self,
        image: &DynamicImage,
        contrast: f64,
        brightness: f64,
    ) -> Result<DynamicImage, BackendError>;

    /// Encode through the lossy codec at `quality` and decode the result, so
    /// the returned image carries the compression artifacts.
    fn recompress(&self, image: &DynamicImage, quality: Quality)
    -> Result<DynamicImage, BackendError>;

    /// Resize `params.source` by `params.scale` and write `params.output`.
    fn resize(&self, params: &ResizeParams) -> Result<Dimensions, BackendError>;
}
