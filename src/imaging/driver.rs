//! Capability detection: which processing driver is active and what it can
//! write.
//!
//! Two drivers exist. [`Driver::Extended`] is the more capable one and is the
//! only driver offering the exact-color alternate trim used as a fallback by
//! the trim engine. [`Driver::Basic`] is always present. WebP encoding support
//! is tracked per driver because a build may carry it for one and not the
//! other.
//!
//! Selection order:
//!
//! 1. `Extended` when available, else `Basic`.
//! 2. If WebP output is requested and `Extended` cannot encode WebP, drop to
//!    `Basic`.
//! 3. The `driver` hook sees the default's name; its answer wins only when it
//!    names a known driver.

use super::params::Format;
use crate::hooks::Filter;
use image::ImageFormat;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Extended,
    Basic,
}

impl Driver {
    pub fn name(self) -> &'static str {
        match self {
            Self::Extended => "extended",
            Self::Basic => "basic",
        }
    }

    /// Parse a driver name, case-insensitive and ignoring surrounding space.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "extended" => Some(Self::Extended),
            "basic" => Some(Self::Basic),
            _ => None,
        }
    }

    /// Whether the zero-tolerance alternate trim primitive is available.
    pub fn has_alternate_trim(self) -> bool {
        matches!(self, Self::Extended)
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the runtime offers. Built by [`Environment::detect`] in production and
/// by hand in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    pub extended_available: bool,
    pub extended_webp: bool,
    pub basic_webp: bool,
}

impl Environment {
    /// Inspect the compiled-in codecs.
    pub fn detect() -> Self {
        let webp = ImageFormat::WebP.writing_enabled();
        Self {
            extended_available: true,
            extended_webp: webp,
            basic_webp: webp,
        }
    }

    /// The driver chosen before any hook runs.
    pub fn default_driver(&self, webp_requested: bool) -> Driver {
        if !self.extended_available {
            return Driver::Basic;
        }
        if webp_requested && !self.extended_webp {
            return Driver::Basic;
        }
        Driver::Extended
    }

    /// The driver for this run, after the `driver` hook.
    pub fn active_driver(&self, webp_requested: bool, hook: &Filter<String>) -> Driver {
        let default = self.default_driver(webp_requested);
        let requested = hook.apply(default.name().to_string());
        match Driver::from_name(&requested) {
            Some(Driver::Extended) if !self.extended_available => {
                debug!(requested = %requested, "extended driver unavailable, keeping default");
                default
            }
            Some(driver) => driver,
            None => {
                debug!(requested = %requested, fallback = %default, "unknown driver requested");
                default
            }
        }
    }

    /// Whether `driver` can write `format`.
    pub fn supports_format(&self, driver: Driver, format: Format) -> bool {
        match format {
            Format::WebP => self.supports_webp(driver),
            other => other.image_format().writing_enabled(),
        }
    }

    pub fn supports_webp(&self, driver: Driver) -> bool {
        match driver {
            Driver::Extended => self.extended_available && self.extended_webp,
            Driver::Basic => self.basic_webp,
        }
    }
}
