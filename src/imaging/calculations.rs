//! Pure calculation functions for dimensions and pixel arithmetic.
//!
//! All functions here are pure and testable without any I/O or images.

/// Largest edge, in pixels, a resize may produce. Also the JPEG limit.
pub const MAX_EDGE: u32 = 65_535;

/// Largest pixel count a resize may produce (256 Mpx).
pub const MAX_PIXELS: u64 = 1 << 28;

/// Dimensions of an image scaled by `scale`, truncated, never below 1px.
///
/// Returns `None` when the result would exceed [`MAX_EDGE`] on either edge
/// or [`MAX_PIXELS`] in total.
///
/// # Examples
/// ```
/// # use photocrop::imaging::scaled_dimensions;
/// assert_eq!(scaled_dimensions((800, 600), 0.5), Some((400, 300)));
/// // Never collapses to zero
/// assert_eq!(scaled_dimensions((3, 3), 0.1), Some((1, 1)));
/// // Too large to allocate
/// assert_eq!(scaled_dimensions((10, 10), 1e9), None);
/// ```
pub fn scaled_dimensions(source: (u32, u32), scale: f64) -> Option<(u32, u32)> {
    let (w, h) = source;
    let scale_edge = |edge: u32| {
        let scaled = (edge as f64 * scale).floor().max(1.0);
        (scaled <= MAX_EDGE as f64).then_some(scaled as u32)
    };
    let (w, h) = (scale_edge(w)?, scale_edge(h)?);
    (w as u64 * h as u64 <= MAX_PIXELS).then_some((w, h))
}

/// Normalize a crop rectangle `(x, y, width, height)` to a 3:4 portrait
/// inside an image of `image` dimensions.
///
/// The rectangle is first clamped to the image. The longer side (relative
/// to 3:4) is then shrunk around the rectangle's centre, and the result is
/// clamped again. A rectangle with no area after clamping is returned as
/// clamped.
///
/// # Examples
/// ```
/// # use photocrop::imaging::enforce_3x4;
/// // Square → narrowed around its centre
/// assert_eq!(enforce_3x4((0, 0, 1000, 1000), (1000, 1000)), (125, 0, 750, 1000));
/// // Too tall → shortened around its centre
/// assert_eq!(enforce_3x4((0, 0, 300, 1000), (1000, 1000)), (0, 300, 300, 400));
/// // Outside the image → clamped first
/// assert_eq!(enforce_3x4((-50, -50, 500, 500), (400, 400)), (50, 0, 300, 400));
/// ```
pub fn enforce_3x4(rect: (i32, i32, i32, i32), image: (u32, u32)) -> (i32, i32, i32, i32) {
    let (img_w, img_h) = (image.0 as i64, image.1 as i64);
    let clamp = |v: i64, limit: i64| v.clamp(0, limit);

    let (x, y, w, h) = (rect.0 as i64, rect.1 as i64, rect.2 as i64, rect.3 as i64);
    let (mut x0, mut y0) = (clamp(x, img_w), clamp(y, img_h));
    let (mut x1, mut y1) = (clamp(x + w, img_w), clamp(y + h, img_h));

    let (w, h) = (x1 - x0, y1 - y0);
    if w > 0 && h > 0 {
        // w / h > 3 / 4
        if 4 * w > 3 * h {
            let new_w = h * 3 / 4;
            let cx = (x0 + x1) / 2;
            (x0, x1) = (cx - new_w / 2, cx + new_w / 2);
        } else {
            let new_h = w * 4 / 3;
            let cy = (y0 + y1) / 2;
            (y0, y1) = (cy - new_h / 2, cy + new_h / 2);
        }
        (x0, y0) = (clamp(x0, img_w), clamp(y0, img_h));
        (x1, y1) = (clamp(x1, img_w), clamp(y1, img_h));
    }

    let narrow = |v: i64| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    (narrow(x0), narrow(y0), narrow(x1 - x0), narrow(y1 - y0))
}

/// Convert a normalized brightness factor (1.0 = unchanged) into the
/// helper's additive offset convention.
///
/// # Examples
/// ```
/// # use photocrop::imaging::brightness_offset;
/// assert_eq!(brightness_offset(1.0), 0.0);
/// assert_eq!(brightness_offset(1.5), 50.0);
/// assert_eq!(brightness_offset(0.8), -20.0);
/// ```
pub fn brightness_offset(factor: f64) -> f64 {
    ((factor - 1.0) * 100.0 * 1e6).round() / 1e6
}

/// ITU-R 601-2 luma of an RGB pixel, as used for grayscale conversion.
pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    (r as f64 * 299.0 + g as f64 * 587.0 + b as f64 * 114.0) / 1000.0
}

/// Push a channel value away from (or toward) `mean` by `factor`.
///
/// A factor of 1.0 is the identity; 0.0 flattens the channel to the mean.
pub fn contrast_channel(value: u8, mean: f64, factor: f64) -> u8 {
    clamp_channel(mean + factor * (value as f64 - mean))
}

/// Scale a channel value by `factor`. 0.0 is black, 1.0 is the identity.
pub fn brightness_channel(value: u8, factor: f64) -> u8 {
    clamp_channel(value as f64 * factor)
}

fn clamp_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
