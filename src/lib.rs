//! # photocrop
//!
//! Photo enhance, resize and crop that runs the heavy lifting in an optional
//! native helper process (`FastImageOps`) and falls back to an in-process
//! implementation whenever the helper is missing, slow, or misbehaving.
//!
//! # Architecture: Bridge, Cache, Fallback
//!
//! ```text
//! caller → FallbackDispatcher ─┬→ BridgeClient ─→ CacheStore (hit: done)
//!                              │        └→ HelperLocator + child process
//!                              └→ ImageBackend (local fallback)
//! ```
//!
//! A call blocks until one of three things produces its result: a cached
//! helper response, a fresh helper invocation, or the local backend. The
//! caller sees the same result shape in every case.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`dispatch`] | One call per operation; decides helper vs local, recovers failures |
//! | [`bridge`] | Runs the helper: cache lookup, coalescing, timeout, response validation |
//! | [`cache`] | Size- and time-bounded LRU store keyed by operation + canonical payload |
//! | [`helper`] | Finds the helper executable once per process |
//! | [`imaging`] | Pure-Rust local operations: adjust, lossy round-trip, resize |
//! | [`naming`] | `<stem>_<operation>.<ext>` output file naming |
//! | [`config`] | `photocrop.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Acceleration Never Changes the Result
//!
//! The helper is a performance optimization. For enhance and batch resize,
//! every recoverable helper failure (absent, timed out, crashed, bad output,
//! rejected request) degrades to the local path, logged at `warn`. Only a
//! payload that cannot be serialized propagates, since retrying locally
//! would hide a bug.
//!
//! ## Batch Crop Has No Fallback
//!
//! Crop geometry is owned by the helper. Rather than approximate it locally
//! and risk diverging output, batch crop reports helper absence or failure
//! to the caller as an error.
//!
//! ## One Explicit Bridge
//!
//! There is no global client. `main` builds one
//! [`BridgeClient`](bridge::BridgeClient) from the config and lends it to the
//! dispatcher. Its cache and in-flight map sit behind mutexes, so it can be
//! shared across threads; identical concurrent requests launch the helper
//! only once.
//!
//! ## Single-Item Batches Stay Local
//!
//! Launching a process costs more than resizing one image in-process, so
//! batch resize only goes to the helper with two or more items.

pub mod bridge;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod helper;
pub mod imaging;
pub mod naming;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;
