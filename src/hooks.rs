//! Extensibility hooks.
//!
//! Every policy value the pipeline consults (driver, quality, upscale, size
//! list, save path, ...) is a default computed from settings and then passed
//! through a [`Filter`]: an ordered list of transforms `T -> T` applied in
//! registration order. Embedders register closures directly; the CLI builds
//! its hooks from the `[overrides]` table of `config.toml`
//! (see [`Hooks::from_overrides`]).
//!
//! | Hook | Value | Default |
//! |---|---|---|
//! | `size_names` | selected size names | `settings.sizes` |
//! | `size_catalog` | resolved [`SizeCatalog`] | resolver output |
//! | `upscale` | allow growing past the trimmed source | `false` |
//! | `trim_tolerance` | 0–100 color distance | `settings.trim_tolerance` |
//! | `trim_feather` | border pixels | `settings.trim_feather` |
//! | `quality` | encoder quality 0–100 | `100 - settings.jpg_quality` |
//! | `save_path` | output path, with size name + image id | `<stem>-<w>x<h>.<ext>` |
//! | `driver` | driver name | detected driver |
//! | `webp` | write WebP siblings | `settings.enable_webp` |
//! | `hd_sizes` | keep `1536x1536` / `2048x2048` | `false` |
//! | `force_square_single` | square the single-product size | `true` |
//! | `force_single_gallery` | gallery uses the single-product size | `true` |

use crate::config::Overrides;
use crate::host::ImageId;
use crate::sizes::SizeCatalog;
use std::fmt;
use std::path::PathBuf;

type Transform<T, C> = Box<dyn Fn(T, &C) -> T>;

/// An ordered pipeline of transforms over a value of type `T`.
///
/// `C` is read-only context handed to every transform (unit for most hooks).
pub struct Filter<T, C = ()> {
    transforms: Vec<Transform<T, C>>,
}

impl<T, C> Filter<T, C> {
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Append a transform. Transforms run in the order they were added.
    pub fn add(&mut self, transform: impl Fn(T, &C) -> T + 'static) -> &mut Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn apply_with(&self, default: T, context: &C) -> T {
        self.transforms
            .iter()
            .fold(default, |value, transform| transform(value, context))
    }
}

impl<T> Filter<T> {
    pub fn apply(&self, default: T) -> T {
        self.apply_with(default, &())
    }
}

impl<T, C> Default for Filter<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> fmt::Debug for Filter<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

/// Context for the `save_path` hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePathContext {
    pub size_name: String,
    pub image_id: ImageId,
}

/// All hooks consulted by one pipeline.
#[derive(Debug, Default)]
pub struct Hooks {
    pub size_names: Filter<Vec<String>>,
    pub size_catalog: Filter<SizeCatalog>,
    pub upscale: Filter<bool>,
    pub trim_tolerance: Filter<u8>,
    pub trim_feather: Filter<u32>,
    pub quality: Filter<u8>,
    pub save_path: Filter<PathBuf, SavePathContext>,
    pub driver: Filter<String>,
    pub webp: Filter<bool>,
    pub hd_sizes: Filter<bool>,
    pub force_square_single: Filter<bool>,
    pub force_single_gallery: Filter<bool>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one constant transform per key present in `[overrides]`.
    pub fn from_overrides(overrides: &Overrides) -> Self {
        let mut hooks = Self::new();
        if let Some(driver) = overrides.driver.clone() {
            hooks.driver.add(move |_, _| driver.clone());
        }
        if let Some(upscale) = overrides.upscale {
            hooks.upscale.add(move |_, _| upscale);
        }
        if let Some(hd) = overrides.hd_sizes {
            hooks.hd_sizes.add(move |_, _| hd);
        }
        if let Some(quality) = overrides.quality {
            hooks.quality.add(move |_, _| quality);
        }
        if let Some(tolerance) = overrides.trim_tolerance {
            hooks.trim_tolerance.add(move |_, _| tolerance);
        }
        if let Some(feather) = overrides.trim_feather {
            hooks.trim_feather.add(move |_, _| feather);
        }
        if let Some(webp) = overrides.webp {
            hooks.webp.add(move |_, _| webp);
        }
        if let Some(square) = overrides.force_square_single {
            hooks.force_square_single.add(move |_, _| square);
        }
        if let Some(single) = overrides.force_single_gallery {
            hooks.force_single_gallery.add(move |_, _| single);
        }
        hooks
    }
}
