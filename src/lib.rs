//! # Smart Thumbs
//!
//! Regenerates the catalog of derived thumbnails for an uploaded image:
//! trims uniform borders off the original, renders every selected size into
//! an exact canvas, optionally converts to JPEG and writes WebP siblings, and
//! keeps the host's attachment metadata consistent with what is on disk.
//!
//! # Pipeline
//!
//! ```text
//! upload event (image id + metadata)
//!   → quota gate → eligibility → trim → size catalog → generate sizes
//!   → metadata ledger → orphan cleanup → charge quota
//!   → new metadata
//! ```
//!
//! Every stage except pixel work is a plain function over plain data, so the
//! decision logic is tested without decoding a single image. Pixel work sits
//! behind [`imaging::ImageBackend`]; tests swap in a recording mock.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`process`] | The entry point: one [`process::Processor::process`] call per upload |
//! | [`imaging`] | Decode/encode backend, driver detection, trim, resize onto a canvas |
//! | [`sizes`] | Resolves selected size names into an ordered catalog of boxes |
//! | [`naming`] | Derived file names and WebP sibling paths |
//! | [`ledger`] | Typed view over the host's attachment metadata |
//! | [`reconcile`] | Deletes files left behind by the previous generation |
//! | [`quota`] | Monthly ceiling on processed originals |
//! | [`hooks`] | Ordered filter chains that let the embedder adjust decisions |
//! | [`host`] | What the pipeline needs from the content system, plus a file-backed host |
//! | [`config`] | `config.toml` loading, validation and stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Metadata Is Never Half-Written
//!
//! The host's metadata goes in as a JSON value and comes out as a JSON value.
//! A run either produces a complete new document or hands the input back
//! unchanged; errors are reported through [`host::Host::notify_error`] rather
//! than surfacing to the caller. Keys the pipeline does not own are carried
//! through verbatim.
//!
//! ## Exact Canvases
//!
//! Every derived size is exactly the requested box. A trimmed original that
//! does not fill the box is centered and padded with the background color, so
//! file names and recorded dimensions always agree.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate for decoding, Lanczos3
//! resampling and encoding, including lossless WebP. No system libraries.

pub mod config;
pub mod hooks;
pub mod host;
pub mod imaging;
pub mod ledger;
pub mod naming;
pub mod output;
pub mod process;
pub mod quota;
pub mod reconcile;
pub mod sizes;

pub use process::Processor;

#[cfg(test)]
pub(crate) mod test_helpers;
