//! One call per high-level operation, resilient to helper absence or failure.
//!
//! [`FallbackDispatcher`] decides per call whether the helper is worth
//! trying, and if the attempt fails in a recoverable way, runs the
//! equivalent local implementation instead. Callers get the same result
//! shape either way and never need to know which path ran.
//!
//! | Operation | Accelerated when | On recoverable helper failure |
//! |---|---|---|
//! | [`enhance`](FallbackDispatcher::enhance) | helper ready, image has a source path | local adjust (+ lossy round-trip) |
//! | [`batch_resize`](FallbackDispatcher::batch_resize) | helper ready, more than one item | per-item local resize on the rayon pool |
//! | [`batch_crop`](FallbackDispatcher::batch_crop) | always | none: the error is returned |
//!
//! Batch crop has no local counterpart. Its geometry is owned by the helper,
//! and a local crop could silently diverge from it.

use crate::bridge::{
    ApplyFiltersRequest, BatchCropRequest, BatchResizeRequest, BridgeClient, BridgeError,
    CropSpec, ItemResult, ProcessRunner, ResizeItem,
};
use crate::cache::{Clock, SystemClock};
use crate::imaging::{
    BackendError, EnhanceParams, ImageBackend, Quality, ResizeParams, brightness_offset,
};
use crate::naming::{OutputSuffix, derived_output_path};
use image::DynamicImage;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Helper error: {0}")]
    Bridge(#[from] BridgeError),
    #[error("Imaging error: {0}")]
    Imaging(#[from] BackendError),
    #[error("Got {paths} paths but {scales} scale factors")]
    LengthMismatch { paths: usize, scales: usize },
}

/// An editable image, and the file it came from if there is one.
///
/// Only images with a source path can be sent to the helper, which works on
/// files rather than pixels.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub image: DynamicImage,
    pub path: Option<PathBuf>,
}

impl SourceImage {
    /// Decode `path` and remember it as the source.
    pub fn open(backend: &impl ImageBackend, path: &Path) -> Result<Self, BackendError> {
        Ok(Self {
            image: backend.load(path)?,
            path: Some(path.to_path_buf()),
        })
    }

    /// An image with no file behind it. Always processed locally.
    pub fn in_memory(image: DynamicImage) -> Self {
        Self { image, path: None }
    }
}

/// Routes each operation through the helper or the local backend.
pub struct FallbackDispatcher<'a, R: ProcessRunner, B: ImageBackend, C: Clock = SystemClock> {
    bridge: &'a BridgeClient<R, C>,
    backend: &'a B,
    use_helper: bool,
}

impl<'a, R: ProcessRunner, B: ImageBackend, C: Clock> FallbackDispatcher<'a, R, B, C> {
    pub fn new(bridge: &'a BridgeClient<R, C>, backend: &'a B) -> Self {
        Self {
            bridge,
            backend,
            use_helper: true,
        }
    }

    /// Disable acceleration entirely. The helper is then never probed.
    pub fn with_helper(mut self, enabled: bool) -> Self {
        self.use_helper = enabled;
        self
    }

    fn helper_ready(&self) -> bool {
        self.use_helper && self.bridge.is_available()
    }

    // =========================================================================
    // Enhance
    // =========================================================================

    /// Adjust contrast and brightness, then apply the lossy round-trip when
    /// `params.quality` is below maximum.
    ///
    /// Identity parameters return the image as is, without the helper.
    pub fn enhance(
        &self,
        source: &SourceImage,
        params: &EnhanceParams,
    ) -> Result<DynamicImage, DispatchError> {
        if params.is_identity() {
            debug!("Enhance with identity parameters, nothing to do");
            return Ok(source.image.clone());
        }

        if self.helper_ready()
            && let Some(path) = &source.path
        {
            match self.enhance_with_helper(path, params) {
                Ok(image) => return self.finish_quality(image, params.quality),
                Err(e) if e.is_recoverable() => {
                    warn!("Helper enhance failed ({}), using local processing", e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let adjusted = self
            .backend
            .adjust(&source.image, params.contrast, params.brightness)?;
        self.finish_quality(adjusted, params.quality)
    }

    fn enhance_with_helper(
        &self,
        path: &Path,
        params: &EnhanceParams,
    ) -> Result<DynamicImage, BridgeError> {
        let request = ApplyFiltersRequest {
            image_path: wire_path(path),
            contrast: params.contrast,
            brightness: brightness_offset(params.brightness),
        };
        let result = self.bridge.apply_filters(&request)?;
        if !result.success {
            return Err(BridgeError::Rejected(
                result
                    .error
                    .unwrap_or_else(|| "no reason given".to_string()),
            ));
        }
        let output = result
            .output_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| BridgeError::InvalidResponse("success without an output path".into()))?;
        debug!("Helper wrote {}", output);
        self.backend.load(Path::new(&output)).map_err(|e| {
            BridgeError::InvalidResponse(format!("cannot read helper output {}: {}", output, e))
        })
    }

    fn finish_quality(
        &self,
        image: DynamicImage,
        quality: Quality,
    ) -> Result<DynamicImage, DispatchError> {
        if quality.is_max() {
            return Ok(image);
        }
        Ok(self.backend.recompress(&image, quality)?)
    }

    // =========================================================================
    // Batch resize
    // =========================================================================

    /// Resize each `paths[i]` by `scales[i]`, writing `<stem>_resized.<ext>`.
    ///
    /// The result has one entry per input, in input order: the written file,
    /// or `None` if that item failed.
    pub fn batch_resize(
        &self,
        paths: &[PathBuf],
        scales: &[f64],
    ) -> Result<Vec<Option<PathBuf>>, DispatchError> {
        if paths.len() != scales.len() {
            return Err(DispatchError::LengthMismatch {
                paths: paths.len(),
                scales: scales.len(),
            });
        }

        if self.helper_ready() && paths.len() > 1 {
            match self.resize_with_helper(paths, scales) {
                Ok(outputs) => return Ok(outputs),
                Err(e) if e.is_recoverable() => {
                    warn!("Helper batch resize failed ({}), using local processing", e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(paths
            .par_iter()
            .zip(scales.par_iter())
            .map(|(path, &scale)| self.resize_local(path, scale))
            .collect())
    }

    fn resize_with_helper(
        &self,
        paths: &[PathBuf],
        scales: &[f64],
    ) -> Result<Vec<Option<PathBuf>>, BridgeError> {
        let request = BatchResizeRequest {
            images: paths
                .iter()
                .zip(scales)
                .map(|(path, &scale)| ResizeItem {
                    path: wire_path(path),
                    scale,
                })
                .collect(),
        };
        let result = self.bridge.batch_resize(&request)?;
        let sources: Vec<&str> = request.images.iter().map(|i| i.path.as_str()).collect();
        item_outputs("resize", &result.results, &sources)
    }

    fn resize_local(&self, source: &Path, scale: f64) -> Option<PathBuf> {
        let output = derived_output_path(source, OutputSuffix::Resized);
        let params = ResizeParams {
            source: source.to_path_buf(),
            output: output.clone(),
            scale,
        };
        match self.backend.resize(&params) {
            Ok(dims) => {
                debug!(
                    "Resized {} → {} ({}x{})",
                    source.display(),
                    output.display(),
                    dims.width,
                    dims.height
                );
                Some(output)
            }
            Err(e) => {
                warn!("Failed to resize {}: {}", source.display(), e);
                None
            }
        }
    }

    // =========================================================================
    // Batch crop
    // =========================================================================

    /// Crop each spec through the helper. There is no local fallback: helper
    /// absence or failure is returned as [`DispatchError::Bridge`].
    pub fn batch_crop(&self, specs: &[CropSpec]) -> Result<Vec<Option<PathBuf>>, DispatchError> {
        if specs.is_empty() {
            return Ok(Vec::new());
        }
        if !self.use_helper {
            return Err(BridgeError::Unavailable.into());
        }
        let request = BatchCropRequest {
            images: specs.to_vec(),
        };
        let result = self.bridge.batch_crop(&request)?;
        let sources: Vec<&str> = specs.iter().map(|s| s.path.as_str()).collect();
        Ok(item_outputs("crop", &result.results, &sources)?)
    }
}

/// Per-item outputs of a batch response, checked against the input count.
/// Items the helper failed are logged with its reason.
fn item_outputs(
    verb: &str,
    results: &[ItemResult],
    sources: &[&str],
) -> Result<Vec<Option<PathBuf>>, BridgeError> {
    if results.len() != sources.len() {
        return Err(BridgeError::InvalidResponse(format!(
            "expected {} results, got {}",
            sources.len(),
            results.len()
        )));
    }
    Ok(results
        .iter()
        .zip(sources)
        .map(|(result, source)| {
            let output = result.output();
            if output.is_none() {
                warn!(
                    "Helper failed to {} {}: {}",
                    verb,
                    source,
                    result.error_message.as_deref().unwrap_or("no reason given")
                );
            }
            output
        })
        .collect())
}

fn wire_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
