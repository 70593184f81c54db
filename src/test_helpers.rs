//! Shared test utilities.
//!
//! Synthetic images, an in-memory [`Host`], and a metadata builder.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut host = TestHost::new("/uploads");
//! host.select(&["thumbnail", "medium"]);
//! let meta = metadata("2024/05/chair.jpg", 1000, 500);
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgba, RgbaImage};
use serde_json::{Value, json};

use crate::config::{Config, Settings};
use crate::host::{Host, ImageId, StoreError};
use crate::imaging::Dimensions;
use crate::ledger::SizeMap;
use crate::sizes::SizeRegistry;

// =========================================================================
// Synthetic images
// =========================================================================

/// Write a gradient PNG to `path`, regardless of the path's extension.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// A `fill` rectangle inside a `border`-pixel frame of `background`.
pub fn bordered_image(
    width: u32,
    height: u32,
    border: u32,
    background: Rgba<u8>,
    fill: Rgba<u8>,
) -> DynamicImage {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let inside =
            x >= border && y >= border && x < width - border && y < height - border;
        if inside { fill } else { background }
    });
    DynamicImage::ImageRgba8(img)
}

// =========================================================================
// Metadata
// =========================================================================

/// Minimal host metadata for an original at `file`.
pub fn metadata(file: &str, width: u32, height: u32) -> Value {
    json!({
        "file": file,
        "width": width,
        "height": height,
        "sizes": {},
    })
}

// =========================================================================
// In-memory host
// =========================================================================

/// A [`Host`] kept entirely in memory. Notifications are recorded.
#[derive(Debug)]
pub struct TestHost {
    pub settings: Settings,
    pub sizes: BTreeMap<String, Dimensions>,
    pub upload_dir: PathBuf,
    pub eligibility: HashMap<ImageId, bool>,
    pub prior: HashMap<ImageId, SizeMap>,
    notifications: RefCell<Vec<String>>,
}

impl TestHost {
    /// Stock settings and registry, rooted at `upload_dir`.
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        let config = Config::default();
        Self {
            settings: config.settings,
            sizes: config.sizes,
            upload_dir: upload_dir.into(),
            eligibility: HashMap::new(),
            prior: HashMap::new(),
            notifications: RefCell::new(Vec::new()),
        }
    }

    /// Replace the selected size names.
    pub fn select(&mut self, names: &[&str]) {
        self.settings.sizes = names.iter().map(|n| n.to_string()).collect();
    }

    pub fn notifications(&self) -> Vec<String> {
        self.notifications.borrow().clone()
    }
}

impl SizeRegistry for TestHost {
    fn size_dimensions(&self, name: &str) -> Option<Dimensions> {
        self.sizes.size_dimensions(name)
    }
}

impl Host for TestHost {
    fn settings(&self) -> Settings {
        self.settings.clone()
    }

    fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    fn eligibility(&self, image_id: ImageId) -> Option<bool> {
        self.eligibility.get(&image_id).copied()
    }

    fn prior_generation(&self, image_id: ImageId) -> Option<SizeMap> {
        self.prior.get(&image_id).cloned()
    }

    fn store_prior_generation(
        &mut self,
        image_id: ImageId,
        sizes: &SizeMap,
    ) -> Result<(), StoreError> {
        self.prior.insert(image_id, sizes.clone());
        Ok(())
    }

    fn notify_error(&self, _image_id: ImageId, message: &str) {
        self.notifications.borrow_mut().push(message.to_string());
    }
}
