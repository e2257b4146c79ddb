//! Local image processing, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` |
//! | **Contrast / brightness** | per-pixel math in [`calculations`] |
//! | **Lossy round-trip** | `JpegEncoder` at the requested quality |
//! | **Resize** | Lanczos3, `max(1, floor(edge * scale))`, capped at [`MAX_EDGE`] |
//! | **Crop framing** | [`enforce_3x4`] clamp and 3:4 normalization |
//! | **Border** | [`add_border`] solid frame for exported images |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and pixel math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{MAX_EDGE, MAX_PIXELS, brightness_offset, enforce_3x4, scaled_dimensions};
pub use params::{EnhanceParams, Quality, ResizeParams};
pub use rust_backend::{RustBackend, add_border, is_supported_image, save_image};
