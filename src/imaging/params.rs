//! Parameter types for local image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`dispatch`](crate::dispatch) layer (which decides
//! which path runs) and the [`backend`](super::backend) (which does the
//! actual pixel work). This separation allows swapping backends (e.g. for
//! testing with a mock) without changing dispatch logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 100). Clamped on construction.
//! - [`EnhanceParams`]: Contrast and brightness factors plus output quality.
//! - [`ResizeParams`]: Source, output path and scale factor for one resize.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
///
/// 100 means "leave the pixels alone": no lossy round-trip is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub const MAX: Quality = Quality(100);

    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn is_max(self) -> bool {
        self.0 >= 100
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::MAX
    }
}

/// Contrast/brightness adjustment. Factors are normalized: 1.0 leaves the
/// image unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhanceParams {
    pub contrast: f64,
    pub brightness: f64,
    pub quality: Quality,
}

impl EnhanceParams {
    pub fn is_identity(&self) -> bool {
        self.contrast == 1.0 && self.brightness == 1.0 && self.quality.is_max()
    }
}

impl Default for EnhanceParams {
    fn default() -> Self {
        Self {
            contrast: 1.0,
            brightness: 1.0,
            quality: Quality::MAX,
        }
    }
}

/// Parameters for a scale-factor resize written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub scale: f64,
}
