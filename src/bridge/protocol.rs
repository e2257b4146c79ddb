//! Wire schema spoken with the helper process.
//!
//! The helper is invoked as `<helper> <operation> <payload-json>` and answers
//! with a single JSON document on stdout. Field names are PascalCase on both
//! sides.
//!
//! | Operation | Request | Response |
//! |---|---|---|
//! | `apply-filters` | [`ApplyFiltersRequest`] | [`FilterResult`] |
//! | `batch-resize` | [`BatchResizeRequest`] | [`BatchResult`] |
//! | `batch-crop` | [`BatchCropRequest`] | [`BatchResult`] |

use crate::imaging::enforce_3x4;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Operations the helper understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ApplyFilters,
    BatchResize,
    BatchCrop,
}

impl Operation {
    /// The name passed as the helper's first argument.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApplyFilters => "apply-filters",
            Self::BatchResize => "batch-resize",
            Self::BatchCrop => "batch-crop",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contrast/brightness adjustment of a single file.
///
/// `brightness` is an additive offset in the helper's convention, see
/// [`brightness_offset`](crate::imaging::brightness_offset).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApplyFiltersRequest {
    pub image_path: String,
    pub contrast: f64,
    pub brightness: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FilterResult {
    pub success: bool,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResizeItem {
    pub path: String,
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchResizeRequest {
    pub images: Vec<ResizeItem>,
}

/// A crop rectangle in source pixel coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CropSpec {
    pub path: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl CropSpec {
    /// The same crop clamped to an image of `image` dimensions and
    /// narrowed to a 3:4 portrait around its centre.
    pub fn portrait(self, image: (u32, u32)) -> Self {
        let (x, y, width, height) = enforce_3x4((self.x, self.y, self.width, self.height), image);
        Self {
            x,
            y,
            width,
            height,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchCropRequest {
    pub images: Vec<CropSpec>,
}

/// Per-image outcome inside a batch response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemResult {
    pub success: bool,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ItemResult {
    /// The written file, if this item succeeded. The helper reports failed
    /// items with an empty `OutputPath`, which counts as none.
    pub fn output(&self) -> Option<PathBuf> {
        if !self.success {
            return None;
        }
        self.output_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

/// Order-preserving results of a batch operation, one per input image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchResult {
    pub results: Vec<ItemResult>,
}
