//! CLI output formatting for every command.
//!
//! Results go to stdout; diagnostics go through `tracing` to stderr. Each
//! input is listed by position with its file name, and the file that was
//! written is shown after an arrow.
//!
//! # Output Format
//!
//! ## Resize / Crop
//!
//! ```text
//! Resized 2 of 3 images
//! 001 beach.jpg → beach_resized.jpg
//! 002 dune.jpg: failed
//! 003 cliff.png → cliff_resized.png
//! ```
//!
//! ## Enhance
//!
//! ```text
//! Enhanced beach.jpg → beach_enhanced.jpg (800x600)
//! ```
//!
//! ## Helper
//!
//! ```text
//! Helper
//!     Status: available
//!     Path: /opt/photocrop/FastImageOps
//!     Timeout: 30s
//! Cache
//!     0/100 entries, ttl 300s
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cache::CacheStats;
use crate::helper::HelperHandle;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// The file name of `path`, or the whole path if it has none.
fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Batch operations
// ============================================================================

/// Format per-item results of a batch resize or crop.
///
/// `verb` is the past tense shown in the summary ("Resized", "Cropped").
/// `outputs` is parallel to `inputs`.
pub fn format_batch_results(
    verb: &str,
    inputs: &[PathBuf],
    outputs: &[Option<PathBuf>],
) -> Vec<String> {
    let succeeded = outputs.iter().filter(|o| o.is_some()).count();
    let noun = if inputs.len() == 1 { "image" } else { "images" };
    let mut lines = vec![format!(
        "{} {} of {} {}",
        verb,
        succeeded,
        inputs.len(),
        noun
    )];
    for (i, (input, output)) in inputs.iter().zip(outputs).enumerate() {
        let line = match output {
            Some(out) => format!(
                "{} {} → {}",
                format_index(i + 1),
                file_label(input),
                file_label(out)
            ),
            None => format!("{} {}: failed", format_index(i + 1), file_label(input)),
        };
        lines.push(line);
    }
    lines
}

pub fn print_batch_results(verb: &str, inputs: &[PathBuf], outputs: &[Option<PathBuf>]) {
    for line in format_batch_results(verb, inputs, outputs) {
        println!("{}", line);
    }
}

// ============================================================================
// Enhance
// ============================================================================

pub fn format_enhance_result(source: &Path, output: &Path, dimensions: (u32, u32)) -> Vec<String> {
    vec![format!(
        "Enhanced {} → {} ({}x{})",
        file_label(source),
        file_label(output),
        dimensions.0,
        dimensions.1
    )]
}

pub fn print_enhance_result(source: &Path, output: &Path, dimensions: (u32, u32)) {
    for line in format_enhance_result(source, output, dimensions) {
        println!("{}", line);
    }
}

// ============================================================================
// Helper status
// ============================================================================

/// What the `helper` command reports.
pub struct HelperStatus<'a> {
    pub enabled: bool,
    pub handle: &'a HelperHandle,
    /// Locations probed, in order. Empty when none were searched.
    pub candidates: &'a [PathBuf],
    pub timeout: Duration,
    pub cache: CacheStats,
}

pub fn format_helper_status(status: &HelperStatus<'_>) -> Vec<String> {
    let mut lines = vec!["Helper".to_string()];
    let state = match (status.enabled, status.handle) {
        (false, _) => "disabled",
        (true, HelperHandle::Available(_)) => "available",
        (true, HelperHandle::Unavailable) => "not found (local processing)",
    };
    lines.push(format!("{}Status: {}", indent(1), state));
    if let Some(path) = status.handle.path() {
        lines.push(format!("{}Path: {}", indent(1), path.display()));
    }
    lines.push(format!("{}Timeout: {}s", indent(1), status.timeout.as_secs()));

    if !status.handle.is_available() && !status.candidates.is_empty() {
        lines.push("Searched".to_string());
        for candidate in status.candidates {
            lines.push(format!("{}{}", indent(1), candidate.display()));
        }
    }

    lines.push("Cache".to_string());
    lines.push(format!("{}{}", indent(1), status.cache));
    lines
}

pub fn print_helper_status(status: &HelperStatus<'_>) {
    for line in format_helper_status(status) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> CacheStats {
        CacheStats {
            size: 0,
            max_size: 100,
            ttl_secs: 300,
            hits: 0,
            misses: 0,
        }
    }

    // =========================================================================
    // Batch results
    // =========================================================================

    #[test]
    fn batch_results_list_each_item() {
        let inputs = vec![
            PathBuf::from("/p/beach.jpg"),
            PathBuf::from("/p/dune.jpg"),
            PathBuf::from("/p/cliff.png"),
        ];
        let outputs = vec![
            Some(PathBuf::from("/p/beach_resized.jpg")),
            None,
            Some(PathBuf::from("/p/cliff_resized.png")),
        ];
        let lines = format_batch_results("Resized", &inputs, &outputs);
        assert_eq!(
            lines,
            vec![
                "Resized 2 of 3 images",
                "001 beach.jpg → beach_resized.jpg",
                "002 dune.jpg: failed",
                "003 cliff.png → cliff_resized.png",
            ]
        );
    }

    #[test]
    fn batch_results_singular() {
        let lines = format_batch_results(
            "Cropped",
            &[PathBuf::from("a.jpg")],
            &[Some(PathBuf::from("a_cropped.jpg"))],
        );
        assert_eq!(lines[0], "Cropped 1 of 1 image");
    }

    #[test]
    fn batch_results_empty() {
        let lines = format_batch_results("Resized", &[], &[]);
        assert_eq!(lines, vec!["Resized 0 of 0 images"]);
    }

    // =========================================================================
    // Enhance
    // =========================================================================

    #[test]
    fn enhance_result_line() {
        let lines = format_enhance_result(
            Path::new("/p/beach.jpg"),
            Path::new("/p/beach_enhanced.jpg"),
            (800, 600),
        );
        assert_eq!(lines, vec!["Enhanced beach.jpg → beach_enhanced.jpg (800x600)"]);
    }

    // =========================================================================
    // Helper status
    // =========================================================================

    #[test]
    fn helper_status_available() {
        let handle = HelperHandle::Available("/opt/FastImageOps".into());
        let lines = format_helper_status(&HelperStatus {
            enabled: true,
            handle: &handle,
            candidates: &[],
            timeout: Duration::from_secs(30),
            cache: stats(),
        });
        assert_eq!(
            lines,
            vec![
                "Helper",
                "    Status: available",
                "    Path: /opt/FastImageOps",
                "    Timeout: 30s",
                "Cache",
                "    0/100 entries, ttl 300s",
            ]
        );
    }

    #[test]
    fn helper_status_not_found_lists_search() {
        let candidates = vec![
            PathBuf::from("/bin/FastImageOps"),
            PathBuf::from("/bin/helpers/FastImageOps"),
        ];
        let lines = format_helper_status(&HelperStatus {
            enabled: true,
            handle: &HelperHandle::Unavailable,
            candidates: &candidates,
            timeout: Duration::from_secs(30),
            cache: stats(),
        });
        assert!(lines.contains(&"    Status: not found (local processing)".to_string()));
        assert!(lines.contains(&"Searched".to_string()));
        assert!(lines.contains(&"    /bin/helpers/FastImageOps".to_string()));
    }

    #[test]
    fn helper_status_disabled() {
        let lines = format_helper_status(&HelperStatus {
            enabled: false,
            handle: &HelperHandle::Unavailable,
            candidates: &[],
            timeout: Duration::from_secs(10),
            cache: stats(),
        });
        assert_eq!(lines[1], "    Status: disabled");
        assert!(!lines.iter().any(|l| l == "Searched"));
    }
}
