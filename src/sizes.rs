//! Size catalog resolution.
//!
//! Turns the selected size names into an ordered catalog of target boxes.
//! Names the registry cannot resolve (missing, or a zero width or height) are
//! dropped silently. The two high-definition sizes are removed unless the
//! `hd_sizes` hook allows them, and the final catalog passes through the
//! `size_catalog` hook before use.
//!
//! The module also carries the two commerce policies the host consults when
//! rendering product pages: squaring the single-product size and pinning the
//! gallery to it.

use crate::hooks::Hooks;
use crate::imaging::Dimensions;
use std::collections::BTreeMap;
use tracing::debug;

/// Size names removed from every catalog unless `hd_sizes` is enabled.
pub const HD_SIZES: [&str; 2] = ["1536x1536", "2048x2048"];

/// Size names that make up the commerce single-product policy.
pub const SINGLE_PRODUCT_SIZES: [&str; 2] = ["woocommerce_single", "shop_single"];

/// Lookup of a named size's box in the host registry.
pub trait SizeRegistry {
    fn size_dimensions(&self, name: &str) -> Option<Dimensions>;
}

impl SizeRegistry for BTreeMap<String, Dimensions> {
    fn size_dimensions(&self, name: &str) -> Option<Dimensions> {
        self.get(name).copied()
    }
}

/// Ordered mapping of size name to target box.
///
/// Insertion order is generation order. Re-inserting an existing name
/// replaces its box in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeCatalog {
    entries: Vec<(String, Dimensions)>,
}

impl SizeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, dims: Dimensions) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = dims,
            None => self.entries.push((name, dims)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Dimensions> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| *d)
    }

    pub fn remove(&mut self, name: &str) -> Option<Dimensions> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Dimensions)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), *d))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, Dimensions) -> bool) {
        self.entries.retain(|(n, d)| keep(n, *d));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Dimensions)> for SizeCatalog {
    fn from_iter<I: IntoIterator<Item = (S, Dimensions)>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for (name, dims) in iter {
            catalog.insert(name, dims);
        }
        catalog
    }
}

/// The selected size names after the `size_names` hook.
pub fn selected_sizes(configured: &[String], hooks: &Hooks) -> Vec<String> {
    hooks.size_names.apply(configured.to_vec())
}

/// Whether every name in `names` is part of `selected`.
pub fn is_processable_size(names: &[&str], selected: &[String]) -> bool {
    names.iter().all(|name| selected.iter().any(|s| s == name))
}

/// Square a single-product box that has a width but no height.
///
/// Applies only when every single-product size is selected and the
/// `force_square_single` hook allows it.
pub fn force_square_single(dims: Dimensions, selected: &[String], hooks: &Hooks) -> Dimensions {
    if !hooks.force_square_single.apply(true)
        || !is_processable_size(&SINGLE_PRODUCT_SIZES, selected)
    {
        return dims;
    }
    if dims.width > 0 && dims.height == 0 {
        return Dimensions::new(dims.width, dims.width);
    }
    dims
}

/// The size a product gallery should render with.
///
/// The pipeline never calls this: it is the commerce policy the host consults
/// when it renders a product page and picks which generated size to show.
/// Returns `woocommerce_single` while both single-product sizes are selected
/// and the `force_single_gallery` hook allows it, else `requested`.
pub fn gallery_image_size(requested: &str, selected: &[String], hooks: &Hooks) -> String {
    if hooks.force_single_gallery.apply(true)
        && is_processable_size(&SINGLE_PRODUCT_SIZES, selected)
    {
        return SINGLE_PRODUCT_SIZES[0].to_string();
    }
    requested.to_string()
}

/// Resolve `selected` names against `registry` into the catalog to generate.
pub fn resolve_catalog(
    selected: &[String],
    registry: &impl SizeRegistry,
    hooks: &Hooks,
) -> SizeCatalog {
    let mut catalog = SizeCatalog::new();

    for name in selected {
        let Some(mut dims) = registry.size_dimensions(name) else {
            debug!(size = %name, "size not registered, skipping");
            continue;
        };
        if SINGLE_PRODUCT_SIZES.contains(&name.as_str()) {
            dims = force_square_single(dims, selected, hooks);
        }
        if !is_resolvable(dims) {
            debug!(size = %name, width = dims.width, height = dims.height, "size unresolvable, skipping");
            continue;
        }
        catalog.insert(name.as_str(), dims);
    }

    if !hooks.hd_sizes.apply(false) {
        for name in HD_SIZES {
            catalog.remove(name);
        }
    }

    let mut catalog = hooks.size_catalog.apply(catalog);
    // The hook may add boxes of its own; those get the same check.
    catalog.retain(|name, dims| {
        let keep = is_resolvable(dims);
        if !keep {
            debug!(size = name, width = dims.width, height = dims.height, "hooked size unresolvable, skipping");
        }
        keep
    });
    catalog
}

fn is_resolvable(dims: Dimensions) -> bool {
    dims.width > 0 && dims.height > 0
}
