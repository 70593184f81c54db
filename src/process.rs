//! The regeneration pipeline.
//!
//! One call to [`Processor::process`] handles one upload event:
//!
//! ```text
//! settings.enable? ─no──────────────────────────────▶ metadata unchanged
//! quota exceeded? ─yes──────────────────────────────▶ metadata unchanged
//! ledger from metadata ─structural error────────────▶ metadata unchanged
//! eligible? ─no─────────────────────────────────────▶ metadata unchanged
//! load original → trim → backup + clear sizes
//!   for each catalog size (in order):
//!     same (w,h) as an earlier size? copy its record
//!     else render, delete old file, write, WebP sibling
//! mark regenerated → delete orphans
//! store prior generation → charge quota ───────────▶ new metadata
//!
//! any processing error → host notification ─────────▶ metadata unchanged
//! ```
//!
//! The master image is decoded once. Each size renders from a borrow of it
//! into its own buffer, which is dropped as soon as the size is written.

use crate::config::Settings;
use crate::hooks::{Hooks, SavePathContext};
use crate::host::{Host, ImageId, StoreError};
use crate::imaging::driver::{Driver, Environment};
use crate::imaging::operations::{render_thumbnail, write_image};
use crate::imaging::params::{Format, Quality, SaveParams, ThumbnailParams};
use crate::imaging::trim::{TrimOptions, TrimResult, trim};
use crate::imaging::{BackendError, Dimensions, ImageBackend};
use crate::ledger::{LedgerError, MetadataLedger, SizeRecord};
use crate::naming::{output_format, thumbnail_path, webp_sibling};
use crate::quota::{QuotaGate, QuotaStore};
use crate::reconcile::reconcile;
use crate::sizes::{resolve_catalog, selected_sizes};
use image::{DynamicImage, Rgba};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Invalid metadata: {0}")]
    Metadata(#[from] LedgerError),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("State store error: {0}")]
    Store(#[from] StoreError),
    #[error("Refusing to overwrite the original image at {0}")]
    WouldOverwriteOriginal(PathBuf),
}

/// One catalog size as handled by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeOutcome {
    pub name: String,
    pub dimensions: Dimensions,
    pub file: String,
    /// Set when the record was copied from an earlier size with the same box.
    pub alias_of: Option<String>,
    pub webp: Option<PathBuf>,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub image_id: ImageId,
    pub driver: Driver,
    pub trim: TrimResult,
    pub format: Format,
    pub sizes: Vec<SizeOutcome>,
    pub deleted: Vec<PathBuf>,
    /// Count for the period after this run; `None` if charging failed.
    pub quota_consumed: Option<u32>,
}

impl RunReport {
    /// Files actually written (aliases excluded, WebP siblings excluded).
    pub fn written(&self) -> usize {
        self.sizes.iter().filter(|s| s.alias_of.is_none()).count()
    }
}

/// Why the metadata came back the way it did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Disabled,
    QuotaExceeded,
    Malformed(String),
    Ineligible,
    Failed(String),
    Regenerated(RunReport),
}

/// Result of [`Processor::process_detailed`].
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub metadata: Value,
    pub outcome: Outcome,
}

/// Runs the pipeline against a host, an image backend and a quota store.
pub struct Processor<H, B, Q> {
    host: H,
    backend: B,
    quota: QuotaGate<Q>,
    hooks: Hooks,
    environment: Environment,
}

impl<H: Host, B: ImageBackend, Q: QuotaStore> Processor<H, B, Q> {
    pub fn new(host: H, backend: B, quota: QuotaGate<Q>, hooks: Hooks) -> Self {
        Self {
            host,
            backend,
            quota,
            hooks,
            environment: Environment::detect(),
        }
    }

    /// Replace the detected driver environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn quota(&self) -> &QuotaGate<Q> {
        &self.quota
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Handle one upload event. Returns the new metadata, or `metadata`
    /// unchanged when the image was not regenerated.
    pub fn process(&mut self, image_id: ImageId, metadata: Value) -> Value {
        self.process_detailed(image_id, metadata).metadata
    }

    /// Like [`process`](Self::process), also reporting what happened.
    pub fn process_detailed(&mut self, image_id: ImageId, metadata: Value) -> Processed {
        let settings = self.host.settings();
        if !settings.enable {
            debug!(image = image_id, "processing disabled");
            return unchanged(metadata, Outcome::Disabled);
        }

        match self.quota.is_exceeded() {
            Ok(false) => {}
            Ok(true) => {
                info!(image = image_id, limit = self.quota.limit(), "quota exceeded, skipping");
                return unchanged(metadata, Outcome::QuotaExceeded);
            }
            Err(e) => return self.fail(image_id, metadata, e.into()),
        }

        let ledger = match MetadataLedger::from_value(&metadata, self.host.upload_dir()) {
            Ok(ledger) => ledger,
            Err(e) => {
                debug!(image = image_id, error = %e, "metadata not usable, skipping");
                return unchanged(metadata, Outcome::Malformed(e.to_string()));
            }
        };

        if !self.host.is_processable(image_id, &ledger) {
            debug!(image = image_id, "image not eligible");
            return unchanged(metadata, Outcome::Ineligible);
        }

        match self.regenerate(image_id, &settings, ledger) {
            Ok((ledger, mut report)) => {
                // Files are already committed; bookkeeping failures only get logged.
                if let Err(e) = self.host.store_prior_generation(image_id, ledger.sizes()) {
                    warn!(image = image_id, error = %e, "could not store prior generation");
                }
                report.quota_consumed = match self.quota.consume(image_id) {
                    Ok(consumed) => Some(consumed),
                    Err(e) => {
                        warn!(image = image_id, error = %e, "could not charge quota");
                        None
                    }
                };
                Processed {
                    metadata: ledger.to_value(),
                    outcome: Outcome::Regenerated(report),
                }
            }
            Err(ProcessError::Metadata(e)) => unchanged(metadata, Outcome::Malformed(e.to_string())),
            Err(e) => self.fail(image_id, metadata, e),
        }
    }

    fn fail(&self, image_id: ImageId, metadata: Value, error: ProcessError) -> Processed {
        let message = format!("Smart Thumbs: {error}");
        self.host.notify_error(image_id, &message);
        unchanged(metadata, Outcome::Failed(error.to_string()))
    }

    fn regenerate(
        &self,
        image_id: ImageId,
        settings: &Settings,
        mut ledger: MetadataLedger,
    ) -> Result<(MetadataLedger, RunReport), ProcessError> {
        let hooks = &self.hooks;
        let webp_requested = hooks.webp.apply(settings.enable_webp);
        let driver = self.environment.active_driver(webp_requested, &hooks.driver);
        let write_webp = webp_requested && self.environment.supports_webp(driver);

        let original_path = ledger.original_path();
        let source = self.backend.load(&original_path)?;
        ledger.set_mime_type(source.format.mime_type());

        let background = settings.background();
        let trim_options = TrimOptions {
            enabled: settings.enable_trim,
            tolerance: hooks.trim_tolerance.apply(settings.trim_tolerance).min(100),
            feather: hooks.trim_feather.apply(settings.trim_feather),
            background,
        };
        let (master, trim_result) = trim(source.pixels, &trim_options, driver);
        ledger.set_trim(trim_result.dimensions);

        let previous = ledger.sizes().clone();
        ledger.set_backup();
        ledger.clear_sizes();

        let selected = selected_sizes(&settings.sizes, hooks);
        let catalog = resolve_catalog(&selected, &self.host, hooks);
        let upscale = hooks.upscale.apply(false);
        let default_quality = Quality::from_compression(settings.jpg_quality).value();
        let quality = Quality::new(u32::from(hooks.quality.apply(default_quality)));
        let format = output_format(&original_path, source.format, settings.jpg_convert);
        if !self.environment.supports_format(driver, format) {
            return Err(BackendError::UnsupportedFormat(format!(
                "{} driver cannot write {}",
                driver,
                format.mime_type()
            ))
            .into());
        }

        info!(
            image = image_id,
            driver = %driver,
            sizes = catalog.len(),
            trimmed_width = trim_result.dimensions.width,
            trimmed_height = trim_result.dimensions.height,
            "regenerating thumbnails"
        );

        let mut first_by_box: HashMap<Dimensions, String> = HashMap::new();
        let mut outcomes = Vec::with_capacity(catalog.len());

        for (name, dims) in catalog.iter() {
            if let Some(first) = first_by_box.get(&dims) {
                if let Some(record) = ledger.get_size(first).cloned() {
                    debug!(size = name, alias_of = %first, "same box as an earlier size, reusing");
                    outcomes.push(SizeOutcome {
                        name: name.to_string(),
                        dimensions: dims,
                        file: record.file.clone(),
                        alias_of: Some(first.clone()),
                        webp: None,
                    });
                    ledger.set_size(name, record);
                    continue;
                }
            }

            let thumb = render_thumbnail(
                &master,
                &ThumbnailParams {
                    width: dims.width,
                    height: dims.height,
                    preserve_aspect_ratio: settings.preserve_aspect_ratio,
                    upscale,
                    background,
                },
            );

            let context = SavePathContext {
                size_name: name.to_string(),
                image_id,
            };
            let path = hooks.save_path.apply_with(
                thumbnail_path(&original_path, dims, settings.jpg_convert),
                &context,
            );
            if path == original_path {
                return Err(ProcessError::WouldOverwriteOriginal(path));
            }

            write_image(
                &self.backend,
                &thumb,
                &SaveParams {
                    output: path.clone(),
                    format,
                    quality,
                    background,
                },
            )?;
            debug!(size = name, path = %path.display(), "thumbnail written");

            let webp = if write_webp {
                self.write_webp_sibling(&thumb, &path, &original_path, quality, background)
            } else {
                None
            };

            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            ledger.set_size(
                name,
                SizeRecord {
                    file: file.clone(),
                    width: thumb.width(),
                    height: thumb.height(),
                    mime_type: format.mime_type().to_string(),
                },
            );
            first_by_box.insert(dims, name.to_string());
            outcomes.push(SizeOutcome {
                name: name.to_string(),
                dimensions: Dimensions::of(&thumb),
                file,
                alias_of: None,
                webp,
            });
        }
        drop(master);

        ledger.mark_regenerated();

        let prior = self.host.prior_generation(image_id);
        let deleted = reconcile(
            &ledger.image_dir(),
            &previous,
            prior.as_ref(),
            ledger.sizes(),
            ledger.original_basename(),
        );

        let report = RunReport {
            image_id,
            driver,
            trim: trim_result,
            format,
            sizes: outcomes,
            deleted,
            quota_consumed: None,
        };
        Ok((ledger, report))
    }

    /// Best-effort WebP copy next to `primary`. `None` when skipped or failed.
    fn write_webp_sibling(
        &self,
        thumb: &DynamicImage,
        primary: &Path,
        original: &Path,
        quality: Quality,
        background: Option<Rgba<u8>>,
    ) -> Option<PathBuf> {
        let sibling = webp_sibling(primary);
        if sibling == primary || sibling == original {
            return None;
        }
        let params = SaveParams {
            output: sibling.clone(),
            format: Format::WebP,
            quality,
            background,
        };
        match write_image(&self.backend, thumb, &params) {
            Ok(()) => Some(sibling),
            Err(e) => {
                // WebP is optional output; the primary file stands on its own.
                debug!(path = %sibling.display(), error = %e, "WebP sibling skipped");
                None
            }
        }
    }
}

fn unchanged(metadata: Value, outcome: Outcome) -> Processed {
    Processed { metadata, outcome }
}
