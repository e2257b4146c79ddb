//! Accelerated execution through the native helper process.
//!
//! | Piece | Role |
//! |---|---|
//! | [`client`] | [`BridgeClient`]: cache, coalescing, response validation |
//! | [`runner`] | [`ProcessRunner`] seam + [`ChildProcessRunner`] with timeout |
//! | [`protocol`] | Request/response schemas for each [`Operation`] |
//! | [`error`] | [`BridgeError`] taxonomy |

pub mod client;
pub mod error;
pub mod protocol;
pub mod runner;

pub use client::{BridgeClient, DEFAULT_TIMEOUT};
pub use error::BridgeError;
pub use protocol::{
    ApplyFiltersRequest, BatchCropRequest, BatchResizeRequest, BatchResult, CropSpec,
    FilterResult, ItemResult, Operation, ResizeItem,
};
pub use runner::{ChildProcessRunner, ProcessRunner};
