//! Configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; the user file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [settings]
//! enable = true
//! sizes = ["thumbnail", "medium", "woocommerce_thumbnail",
//!          "woocommerce_single", "woocommerce_gallery_thumbnail"]
//! preserve_aspect_ratio = true
//! jpg_quality = 10          # Compression; encoder quality = 100 - jpg_quality
//! jpg_convert = false       # Re-encode non-JPEG originals as `<name>.<ext>.jpg`
//! enable_webp = false       # Also write `<name>-<w>x<h>.webp`
//! enable_trim = false
//! trim_tolerance = 0        # 0-100 color distance
//! trim_feather = 0          # Border pixels re-added after trim; 0 = off
//! bg_color = ""             # "#rrggbb" fill for feather and padding
//!
//! [quota]
//! limit = 0                 # Originals per calendar month; 0 = unlimited
//!
//! [overrides]               # Each key registers a hook transform
//!
//! [sizes.thumbnail]         # The size registry: name -> box
//! width = 150
//! height = 150
//! ```
//!
//! Tables merge key-by-key over the stock defaults, so adding
//! `[sizes.banner]` keeps every stock size. Unknown keys are rejected to
//! catch typos early.

use crate::imaging::Dimensions;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The settings snapshot handed to every pipeline run.
    pub settings: Settings,
    /// Processing quota.
    pub quota: QuotaConfig,
    /// Constant hook overrides.
    pub overrides: Overrides,
    /// Size registry: name → box. Zero width or height means "unresolvable".
    pub sizes: BTreeMap<String, Dimensions>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            quota: QuotaConfig::default(),
            overrides: Overrides::default(),
            sizes: stock_sizes(),
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;
        if self.overrides.quality.is_some_and(|q| q > 100) {
            return Err(ConfigError::Validation(
                "overrides.quality must be 0-100".into(),
            ));
        }
        if self.overrides.trim_tolerance.is_some_and(|t| t > 100) {
            return Err(ConfigError::Validation(
                "overrides.trim_tolerance must be 0-100".into(),
            ));
        }
        if let Some((name, _)) = self.sizes.iter().find(|(name, _)| name.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "size name {name:?} must not be blank"
            )));
        }
        Ok(())
    }
}

/// The settings snapshot: immutable for the duration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Master switch; when off every run returns metadata unchanged.
    pub enable: bool,
    /// Selected size names, in generation order.
    pub sizes: Vec<String>,
    /// Fit inside each box instead of cropping to fill it.
    pub preserve_aspect_ratio: bool,
    /// Compression amount (0-100). The encoder receives `100 - jpg_quality`.
    pub jpg_quality: u8,
    /// Re-encode non-JPEG originals as JPEG.
    pub jpg_convert: bool,
    /// Write a WebP sibling next to each derived file.
    pub enable_webp: bool,
    /// Remove uniform borders before resizing.
    pub enable_trim: bool,
    /// Color distance (0-100) still treated as border.
    pub trim_tolerance: u8,
    /// Pixels re-added around a trimmed image; 0 disables.
    pub trim_feather: u32,
    /// Fill for feather and padding, `#rgb` or `#rrggbb`. Empty for default.
    pub bg_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable: true,
            sizes: [
                "thumbnail",
                "medium",
                "woocommerce_thumbnail",
                "woocommerce_single",
                "woocommerce_gallery_thumbnail",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            preserve_aspect_ratio: true,
            jpg_quality: 10,
            jpg_convert: false,
            enable_webp: false,
            enable_trim: false,
            trim_tolerance: 0,
            trim_feather: 0,
            bg_color: String::new(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jpg_quality > 100 {
            return Err(ConfigError::Validation(
                "settings.jpg_quality must be 0-100".into(),
            ));
        }
        if self.trim_tolerance > 100 {
            return Err(ConfigError::Validation(
                "settings.trim_tolerance must be 0-100".into(),
            ));
        }
        if !self.bg_color.trim().is_empty() && parse_hex_color(&self.bg_color).is_none() {
            return Err(ConfigError::Validation(format!(
                "settings.bg_color {:?} is not a #rgb or #rrggbb color",
                self.bg_color
            )));
        }
        Ok(())
    }

    /// The configured background color, if set and well-formed.
    pub fn background(&self) -> Option<Rgba<u8>> {
        parse_hex_color(&self.bg_color)
    }
}

/// Processing quota.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuotaConfig {
    /// Originals processed per calendar month. 0 = unlimited.
    pub limit: u32,
}

/// Constant overrides, one hook transform per present key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upscale: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hd_sizes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_tolerance: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_feather: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_square_single: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_single_gallery: Option<bool>,
}

/// The stock size registry.
fn stock_sizes() -> BTreeMap<String, Dimensions> {
    [
        ("thumbnail", 150, 150),
        ("medium", 300, 300),
        ("medium_large", 768, 0),
        ("large", 1024, 1024),
        ("1536x1536", 1536, 1536),
        ("2048x2048", 2048, 2048),
        ("woocommerce_thumbnail", 300, 300),
        ("woocommerce_single", 600, 0),
        ("woocommerce_gallery_thumbnail", 100, 100),
    ]
    .into_iter()
    .map(|(name, w, h)| (name.to_string(), Dimensions::new(w, h)))
    .collect()
}

/// Parse `#rgb` / `#rrggbb` into an opaque color. Anything else is `None`.
pub fn parse_hex_color(value: &str) -> Option<Rgba<u8>> {
    let hex = value.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 16 + v;
            }
            Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
        }
        6 => Some(Rgba([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            255,
        ])),
        _ => None,
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` when the file is absent.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given `config.toml` path.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Smart Thumbs Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Settings snapshot
# ---------------------------------------------------------------------------
[settings]
# Master switch. When false, metadata passes through untouched.
enable = true

# Size names to generate, in order. Names missing from [sizes] or with a
# zero width/height are skipped. "1536x1536" and "2048x2048" are dropped
# unless overrides.hd_sizes = true.
sizes = [
    "thumbnail",
    "medium",
    "woocommerce_thumbnail",
    "woocommerce_single",
    "woocommerce_gallery_thumbnail",
]

# true: fit inside each box and pad. false: crop to fill the box.
preserve_aspect_ratio = true

# Compression amount (0 = best quality, 100 = smallest file).
# The encoder quality is 100 - jpg_quality.
jpg_quality = 10

# Re-encode PNG/GIF/WebP originals as JPEG. The original extension is kept
# in the name to avoid collisions: chair.png -> chair-300x300.png.jpg
jpg_convert = false

# Write a WebP copy next to every derived size.
enable_webp = false

# Remove uniform-color borders before resizing.
enable_trim = false

# How different (0-100) a pixel may be from the border color and still be
# trimmed.
trim_tolerance = 0

# Pixels of border re-added around a trimmed image (0 = off).
trim_feather = 0

# Background for feather and padding, "#rgb" or "#rrggbb".
# Empty: transparent (white once flattened into JPEG).
bg_color = ""

# ---------------------------------------------------------------------------
# Quota
# ---------------------------------------------------------------------------
[quota]
# Originals processed per calendar month (UTC). 0 = unlimited.
limit = 0

# ---------------------------------------------------------------------------
# Hook overrides (each key replaces the computed default)
# ---------------------------------------------------------------------------
[overrides]
# driver = "basic"              # "extended" or "basic"
# upscale = true                # allow growing small images to fill a box
# hd_sizes = true               # keep 1536x1536 and 2048x2048
# quality = 82                  # encoder quality, bypasses jpg_quality
# trim_tolerance = 5
# trim_feather = 10
# webp = false
# force_square_single = true    # square woocommerce_single when height is 0
# force_single_gallery = true   # gallery uses woocommerce_single

# ---------------------------------------------------------------------------
# Size registry (name -> box). Add your own tables; stock entries remain.
# ---------------------------------------------------------------------------
[sizes.thumbnail]
width = 150
height = 150

[sizes.medium]
width = 300
height = 300

[sizes.medium_large]
width = 768
height = 0

[sizes.large]
width = 1024
height = 1024

[sizes.1536x1536]
width = 1536
height = 1536

[sizes.2048x2048]
width = 2048
height = 2048

[sizes.woocommerce_thumbnail]
width = 300
height = 300

[sizes.woocommerce_single]
width = 600
height = 0

[sizes.woocommerce_gallery_thumbnail]
width = 100
height = 100
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_stock_sizes() {
        let config = Config::default();
        assert_eq!(config.sizes["thumbnail"], Dimensions::new(150, 150));
        assert_eq!(config.sizes["woocommerce_single"], Dimensions::new(600, 0));
        assert_eq!(config.settings.jpg_quality, 10);
        assert_eq!(config.quota.limit, 0);
    }

    #[test]
    fn parse_partial_settings() {
        let toml_str = r#"
[settings]
sizes = ["thumbnail"]
enable_trim = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.settings.sizes, vec!["thumbnail"]);
        assert!(config.settings.enable_trim);
        assert!(config.settings.preserve_aspect_ratio);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config.settings, Settings::default());
        assert_eq!(config.sizes.len(), 9);
    }

    #[test]
    fn load_config_merges_new_size_into_registry() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[sizes.banner]
width = 1200
height = 400

[sizes.medium]
width = 320
height = 240
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.sizes["banner"], Dimensions::new(1200, 400));
        assert_eq!(config.sizes["medium"], Dimensions::new(320, 240));
        // Stock entries survive the merge
        assert_eq!(config.sizes["thumbnail"], Dimensions::new(150, 150));
    }

    #[test]
    fn load_config_replaces_selected_sizes_list() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[settings]\nsizes = [\"large\"]\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.settings.sizes, vec!["large"]);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[settings]\njpg_quality = 150\n").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_config_parses_overrides() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[overrides]
driver = "basic"
hd_sizes = true
quality = 75
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.overrides.driver.as_deref(), Some("basic"));
        assert_eq!(config.overrides.hd_sizes, Some(true));
        assert_eq!(config.overrides.quality, Some(75));
        assert_eq!(config.overrides.upscale, None);
    }

    // =========================================================================
    // Unknown keys
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[settings]
jpg_qualty = 10
"#;
        let result: Result<Config, _> = toml::from_str(toml_str);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<Config, _> = toml::from_str("[setings]\nenable = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_size_field_rejected() {
        let result: Result<Config, _> =
            toml::from_str("[sizes.banner]\nwidth = 10\nheigth = 10\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_tolerance_too_high() {
        let mut config = Config::default();
        config.settings.trim_tolerance = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("trim_tolerance"));
    }

    #[test]
    fn validate_bad_background_color() {
        let mut config = Config::default();
        config.settings.bg_color = "blue".into();
        assert!(config.validate().is_err());

        config.settings.bg_color = "#00f".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_override_quality_range() {
        let mut config = Config::default();
        config.overrides.quality = Some(101);
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // parse_hex_color tests
    // =========================================================================

    #[test]
    fn hex_color_long_form() {
        assert_eq!(parse_hex_color("#ff8000"), Some(Rgba([255, 128, 0, 255])));
        assert_eq!(parse_hex_color("  #FF8000 "), Some(Rgba([255, 128, 0, 255])));
    }

    #[test]
    fn hex_color_short_form() {
        assert_eq!(parse_hex_color("#0f8"), Some(Rgba([0, 255, 136, 255])));
    }

    #[test]
    fn hex_color_rejects_garbage() {
        assert_eq!(parse_hex_color(""), None);
        assert_eq!(parse_hex_color("ff8000"), None);
        assert_eq!(parse_hex_color("#ff80"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn settings_background_is_none_when_empty() {
        assert_eq!(Settings::default().background(), None);
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_is_valid_toml() {
        let content = stock_config_toml();
        let _: toml::Value = toml::from_str(content).expect("stock config must be valid TOML");
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: Config = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config.settings, Settings::default());
        assert_eq!(config.sizes, Config::default().sizes);
        assert_eq!(config.overrides, Overrides::default());
    }

    #[test]
    fn stock_defaults_value_is_table() {
        let val = stock_defaults_value().unwrap();
        assert!(val.is_table());
        assert!(val.get("sizes").is_some());
        assert!(val.get("settings").is_some());
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }
}
