//! Output file naming for locally processed images.
//!
//! Every operation that writes a file writes it next to its source, named
//! after the source with an operation suffix, keeping the extension:
//! - `beach.jpg` resized → `beach_resized.jpg`
//! - `IMG_001.PNG` enhanced → `IMG_001_enhanced.PNG`
//!
//! The helper follows the same convention for the files it writes
//! (`_filtered`, `_cropped`), but those names come back in its responses
//! and are never computed here.

use std::fmt;
use std::path::{Path, PathBuf};

/// Which operation produced a derived file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSuffix {
    Resized,
    Enhanced,
}

impl OutputSuffix {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resized => "resized",
            Self::Enhanced => "enhanced",
        }
    }
}

impl fmt::Display for OutputSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path of the file derived from `source` by the operation `suffix`.
///
/// Handles these patterns:
/// - `"/photos/beach.jpg"` → `"/photos/beach_resized.jpg"`
/// - `"archive.tar.png"` → `"archive.tar_resized.png"` (only the last extension counts)
/// - `"README"` → `"README_resized"` (no extension)
pub fn derived_output_path(source: &Path, suffix: OutputSuffix) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{stem}_{suffix}");
    if let Some(ext) = source.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    source.with_file_name(name)
}
