//! Image processing in pure Rust, on top of the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `ImageReader` with content sniffing |
//! | **Trim** | color-distance bounding box + `crop_imm` |
//! | **Thumbnail** | Lanczos3 `resize_exact` + centered canvas |
//! | **Encode** | JPEG / PNG / GIF / lossless WebP encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Driver**: which driver is active and what it can write
//! - **Trim**: border removal and feather
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
pub mod calculations;
pub mod driver;
pub mod operations;
pub mod params;
pub mod rust_backend;
pub mod trim;

pub use backend::{BackendError, Dimensions, ImageBackend, SourceImage};
pub use driver::{Driver, Environment};
pub use params::{Format, Quality};
pub use rust_backend::RustBackend;
