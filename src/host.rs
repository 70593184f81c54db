//! The host side of the pipeline.
//!
//! [`Host`] is everything the pipeline consumes from the content system that
//! owns the images: the settings snapshot, the size registry, where uploads
//! live, per-image persisted fields and a way to surface errors to the user.
//!
//! [`FsHost`] is the file-backed host used by the CLI. It keeps per-image
//! state in `<state-dir>/attachments.json`:
//!
//! ```json
//! {
//!   "attachments": {
//!     "42": { "eligible": false },
//!     "43": { "prior_generation": { "thumbnail": { "file": "...", ... } } }
//!   }
//! }
//! ```

use crate::config::{Config, Settings};
use crate::imaging::Dimensions;
use crate::imaging::params::Format;
use crate::ledger::{MetadataLedger, SizeMap};
use crate::quota::JsonQuotaStore;
use crate::sizes::SizeRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::error;

/// Host identifier of an uploaded image.
pub type ImageId = u64;

const ATTACHMENTS_FILENAME: &str = "attachments.json";
const QUOTA_FILENAME: &str = "quota.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Collaborators the pipeline calls into.
pub trait Host: SizeRegistry {
    /// Settings snapshot for one run.
    fn settings(&self) -> Settings;

    /// Root that metadata `file` paths are relative to.
    fn upload_dir(&self) -> &Path;

    /// The persisted eligibility preference. `None` when never set.
    fn eligibility(&self, image_id: ImageId) -> Option<bool>;

    /// Sizes written by the last finalized run for this image.
    fn prior_generation(&self, image_id: ImageId) -> Option<SizeMap>;

    /// Replace the prior-generation snapshot.
    fn store_prior_generation(
        &mut self,
        image_id: ImageId,
        sizes: &SizeMap,
    ) -> Result<(), StoreError>;

    /// Surface a processing failure to the user.
    fn notify_error(&self, image_id: ImageId, message: &str);

    /// Whether this image should be processed at all.
    ///
    /// The preference must not be `false`, and the image must be one of the
    /// raster formats the pipeline writes.
    fn is_processable(&self, image_id: ImageId, ledger: &MetadataLedger) -> bool {
        if self.eligibility(image_id) == Some(false) {
            return false;
        }
        match ledger.mime_type() {
            Some(mime) => is_supported_mime(mime),
            None => Format::from_path(Path::new(ledger.file())).is_some(),
        }
    }
}

/// JPEG, PNG, GIF and WebP.
pub fn is_supported_mime(mime: &str) -> bool {
    matches!(
        mime.trim().to_ascii_lowercase().as_str(),
        "image/jpeg" | "image/jpg" | "image/png" | "image/gif" | "image/webp"
    )
}

/// Persisted per-image state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_generation: Option<SizeMap>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AttachmentFile {
    #[serde(default)]
    attachments: BTreeMap<ImageId, AttachmentState>,
}

/// File-backed host for the CLI.
#[derive(Debug)]
pub struct FsHost {
    config: Config,
    upload_dir: PathBuf,
    state_dir: PathBuf,
    attachments: BTreeMap<ImageId, AttachmentState>,
}

impl FsHost {
    /// Open the host, reading `attachments.json` from `state_dir` if present.
    pub fn open(
        config: Config,
        upload_dir: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let state_dir = state_dir.into();
        let path = state_dir.join(ATTACHMENTS_FILENAME);
        let attachments = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<AttachmentFile>(&content)?.attachments,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            config,
            upload_dir: upload_dir.into(),
            state_dir,
            attachments,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn attachment(&self, image_id: ImageId) -> Option<&AttachmentState> {
        self.attachments.get(&image_id)
    }

    /// Persist the eligibility preference for one image.
    pub fn set_eligibility(&mut self, image_id: ImageId, eligible: bool) -> Result<(), StoreError> {
        self.attachments.entry(image_id).or_default().eligible = Some(eligible);
        self.save()
    }

    /// The quota store living next to `attachments.json`.
    pub fn quota_store(&self) -> JsonQuotaStore {
        JsonQuotaStore::new(self.state_dir.join(QUOTA_FILENAME))
    }

    fn save(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.state_dir)?;
        let file = AttachmentFile {
            attachments: self.attachments.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(self.state_dir.join(ATTACHMENTS_FILENAME), json)?;
        Ok(())
    }
}

impl SizeRegistry for FsHost {
    fn size_dimensions(&self, name: &str) -> Option<Dimensions> {
        self.config.sizes.size_dimensions(name)
    }
}

impl Host for FsHost {
    fn settings(&self) -> Settings {
        self.config.settings.clone()
    }

    fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    fn eligibility(&self, image_id: ImageId) -> Option<bool> {
        self.attachments.get(&image_id).and_then(|a| a.eligible)
    }

    fn prior_generation(&self, image_id: ImageId) -> Option<SizeMap> {
        self.attachments
            .get(&image_id)
            .and_then(|a| a.prior_generation.clone())
    }

    fn store_prior_generation(
        &mut self,
        image_id: ImageId,
        sizes: &SizeMap,
    ) -> Result<(), StoreError> {
        self.attachments.entry(image_id).or_default().prior_generation = Some(sizes.clone());
        self.save()
    }

    fn notify_error(&self, image_id: ImageId, message: &str) {
        error!(image = image_id, "{message}");
    }
}
