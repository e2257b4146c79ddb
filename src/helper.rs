//! Locating the optional native helper executable.
//!
//! The helper (`FastImageOps`) ships separately from this binary and may or
//! may not be installed. [`HelperLocator`] probes a fixed, ordered list of
//! places it could live and remembers the answer for the life of the
//! locator: the installation layout does not change while we run.
//!
//! Default search order, relative to the directory holding the running
//! executable:
//!
//! ```text
//! <exe dir>/FastImageOps                                          co-located
//! <exe dir>/helpers/FastImageOps                                  packaged
//! <exe dir>/FastImageOps/bin/Release/net8.0/publish/FastImageOps  build output
//! <exe dir>/../FastImageOps/bin/Release/net8.0/publish/FastImageOps  sibling build
//! ```
//!
//! Not finding the helper is a normal outcome, reported as
//! [`HelperHandle::Unavailable`], never as an error.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// File stem of the helper executable.
pub const HELPER_NAME: &str = "FastImageOps";

/// Resolved location of the helper, or the marker for "not installed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperHandle {
    Available(PathBuf),
    Unavailable,
}

impl HelperHandle {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Available(path) => Some(path),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// Resolves the helper once and memoizes the result.
#[derive(Debug)]
pub struct HelperLocator {
    candidates: Vec<PathBuf>,
    resolved: OnceLock<HelperHandle>,
}

impl HelperLocator {
    /// Probe `candidates` in order on first [`resolve`](Self::resolve).
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self {
            candidates,
            resolved: OnceLock::new(),
        }
    }

    /// Search the default layout around the running executable.
    pub fn from_current_exe() -> Self {
        let base = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        match base {
            Some(base) => Self::new(default_candidates(&base)),
            None => Self::new(Vec::new()),
        }
    }

    /// Use an explicit path if given, otherwise the default layout.
    pub fn from_override(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::new(vec![path.to_path_buf()]),
            None => Self::from_current_exe(),
        }
    }

    /// A locator that already knows its answer. Nothing is probed.
    pub fn with_handle(handle: HelperHandle) -> Self {
        Self {
            candidates: Vec::new(),
            resolved: OnceLock::from(handle),
        }
    }

    pub fn unavailable() -> Self {
        Self::with_handle(HelperHandle::Unavailable)
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// The helper handle, probing the filesystem on the first call only.
    pub fn resolve(&self) -> &HelperHandle {
        self.resolved.get_or_init(|| {
            let handle = probe(&self.candidates);
            match &handle {
                HelperHandle::Available(path) => info!("Helper available: {}", path.display()),
                HelperHandle::Unavailable => {
                    info!("Helper not found, using local processing");
                    debug!("Searched: {:?}", self.candidates);
                }
            }
            handle
        })
    }
}

/// First candidate that exists as a regular file.
fn probe(candidates: &[PathBuf]) -> HelperHandle {
    candidates
        .iter()
        .find(|path| path.is_file())
        .map(|path| HelperHandle::Available(path.clone()))
        .unwrap_or(HelperHandle::Unavailable)
}

/// Platform-specific helper file name (`FastImageOps.exe` on Windows).
pub fn helper_file_name() -> String {
    format!("{}{}", HELPER_NAME, std::env::consts::EXE_SUFFIX)
}

/// The ordered search list for an installation rooted at `base`.
pub fn default_candidates(base: &Path) -> Vec<PathBuf> {
    let file = helper_file_name();
    let publish = Path::new(HELPER_NAME)
        .join("bin")
        .join("Release")
        .join("net8.0")
        .join("publish")
        .join(&file);
    let mut candidates = vec![
        base.join(&file),
        base.join("helpers").join(&file),
        base.join(&publish),
    ];
    if let Some(parent) = base.parent() {
        candidates.push(parent.join(&publish));
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_candidates_order() {
        let base = Path::new("/opt/photocrop/bin");
        let file = helper_file_name();
        let c = default_candidates(base);
        assert_eq!(c.len(), 4);
        assert_eq!(c[0], base.join(&file));
        assert_eq!(c[1], base.join("helpers").join(&file));
        assert!(c[2].starts_with(base.join(HELPER_NAME)));
        assert!(c[3].starts_with("/opt/photocrop/FastImageOps"));
        assert!(c.iter().all(|p| p.ends_with(&file)));
    }

    #[test]
    fn default_candidates_at_root_skip_sibling() {
        let c = default_candidates(Path::new("/"));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn resolve_returns_first_existing_candidate() {
        let tmp = TempDir::new().unwrap();
        let second = tmp.path().join("second");
        let third = tmp.path().join("third");
        fs::write(&second, "").unwrap();
        fs::write(&third, "").unwrap();

        let locator = HelperLocator::new(vec![tmp.path().join("first"), second.clone(), third]);
        assert_eq!(locator.resolve(), &HelperHandle::Available(second));
    }

    #[test]
    fn resolve_with_no_candidates_present_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let locator = HelperLocator::new(vec![tmp.path().join("missing")]);
        assert_eq!(locator.resolve(), &HelperHandle::Unavailable);
        assert!(locator.resolve().path().is_none());
    }

    #[test]
    fn directories_are_not_helpers() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(HELPER_NAME);
        fs::create_dir(&dir).unwrap();
        let locator = HelperLocator::new(vec![dir]);
        assert!(!locator.resolve().is_available());
    }

    #[test]
    fn resolution_is_memoized() {
        let tmp = TempDir::new().unwrap();
        let helper = tmp.path().join("helper");
        let locator = HelperLocator::new(vec![helper.clone()]);
        assert!(!locator.resolve().is_available());

        // Installing the helper afterwards does not change the answer.
        fs::write(&helper, "").unwrap();
        assert!(!locator.resolve().is_available());
    }

    #[test]
    fn with_handle_skips_probing() {
        let locator = HelperLocator::with_handle(HelperHandle::Available("/nowhere/helper".into()));
        assert!(locator.candidates().is_empty());
        assert_eq!(
            locator.resolve().path(),
            Some(Path::new("/nowhere/helper"))
        );
        assert!(!HelperLocator::unavailable().resolve().is_available());
    }

    #[test]
    fn override_is_sole_candidate() {
        let locator = HelperLocator::from_override(Some(Path::new("/custom/helper")));
        assert_eq!(locator.candidates(), &[PathBuf::from("/custom/helper")]);
    }
}
