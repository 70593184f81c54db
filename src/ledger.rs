//! Per-image metadata ledger.
//!
//! The host stores one JSON object per uploaded image. The ledger reads the
//! fields the pipeline owns and keeps every other key untouched:
//!
//! ```json
//! {
//!   "file": "2024/05/chair.jpg",
//!   "width": 1000,
//!   "height": 500,
//!   "mime-type": "image/jpeg",
//!   "sizes": {
//!     "thumbnail": { "file": "chair-150x150.jpg", "width": 150, "height": 150, "mime-type": "image/jpeg" }
//!   },
//!   "trimmed_width": 1000,
//!   "trimmed_height": 500,
//!   "backup_sizes": { },
//!   "sizes_regenerated": true
//! }
//! ```
//!
//! `file` is relative to the upload directory; size files are bare names in
//! the original's directory. `sizes` may be an empty JSON array, which some
//! hosts write for an empty map.

use crate::imaging::Dimensions;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

const FILE: &str = "file";
const WIDTH: &str = "width";
const HEIGHT: &str = "height";
const MIME_TYPE: &str = "mime-type";
const SIZES: &str = "sizes";
const TRIMMED_WIDTH: &str = "trimmed_width";
const TRIMMED_HEIGHT: &str = "trimmed_height";
const BACKUP_SIZES: &str = "backup_sizes";
const SIZES_REGENERATED: &str = "sizes_regenerated";

/// Structural problems with stored metadata.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("metadata is not a JSON object")]
    NotAnObject,
    #[error("metadata field `{0}` is missing")]
    Missing(&'static str),
    #[error("metadata field `{field}` is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// One derived size as recorded in metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRecord {
    pub file: String,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "mime-type")]
    pub mime_type: String,
}

/// Ordered size name → record mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeMap {
    entries: Vec<(String, SizeRecord)>,
}

impl SizeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced entry keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, record: SizeRecord) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = record,
            None => self.entries.push((name, record)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SizeRecord> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SizeRecord)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// File names referenced by the map, in order, possibly repeated.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, r)| r.file.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Serialize for SizeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, record) in &self.entries {
            map.serialize_entry(name, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SizeMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(object) => {
                let mut sizes = SizeMap::new();
                for (name, value) in object {
                    let record = SizeRecord::deserialize(value)
                        .map_err(|e| D::Error::custom(format!("size `{name}`: {e}")))?;
                    sizes.insert(name, record);
                }
                Ok(sizes)
            }
            Value::Array(items) if items.is_empty() => Ok(SizeMap::new()),
            Value::Null => Ok(SizeMap::new()),
            other => Err(D::Error::custom(format!(
                "expected an object of sizes, found {other}"
            ))),
        }
    }
}

/// Mutable view of one image's metadata for the length of a run.
#[derive(Debug, Clone)]
pub struct MetadataLedger {
    upload_dir: PathBuf,
    file: String,
    original: Dimensions,
    mime_type: Option<String>,
    sizes: SizeMap,
    trimmed: Option<Dimensions>,
    backup_sizes: Option<SizeMap>,
    regenerated: bool,
    /// The metadata as received; unknown keys are written back from here.
    raw: Map<String, Value>,
}

impl MetadataLedger {
    /// Build a ledger from stored metadata.
    ///
    /// Fails when `file`, `width` or `height` is missing or malformed, or
    /// when a sizes table cannot be read.
    pub fn from_value(value: &Value, upload_dir: &Path) -> Result<Self, LedgerError> {
        let raw = value.as_object().ok_or(LedgerError::NotAnObject)?;

        let file = match raw.get(FILE).ok_or(LedgerError::Missing(FILE))? {
            Value::String(s) if !s.trim().is_empty() => s.clone(),
            _ => {
                return Err(LedgerError::Invalid {
                    field: FILE,
                    reason: "expected a non-empty string".into(),
                });
            }
        };
        let width = read_dimension(raw, WIDTH)?;
        let height = read_dimension(raw, HEIGHT)?;

        let trimmed = match (raw.get(TRIMMED_WIDTH), raw.get(TRIMMED_HEIGHT)) {
            (Some(_), Some(_)) => Some(Dimensions::new(
                read_dimension(raw, TRIMMED_WIDTH)?,
                read_dimension(raw, TRIMMED_HEIGHT)?,
            )),
            _ => None,
        };

        Ok(Self {
            upload_dir: upload_dir.to_path_buf(),
            file,
            original: Dimensions::new(width, height),
            mime_type: raw.get(MIME_TYPE).and_then(Value::as_str).map(String::from),
            sizes: read_sizes(raw, SIZES)?.unwrap_or_default(),
            trimmed,
            backup_sizes: read_sizes(raw, BACKUP_SIZES)?,
            regenerated: raw
                .get(SIZES_REGENERATED)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            raw: raw.clone(),
        })
    }

    /// The original's path relative to the upload directory.
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn original_path(&self) -> PathBuf {
        self.upload_dir.join(&self.file)
    }

    /// Directory holding the original and every derived file.
    pub fn image_dir(&self) -> PathBuf {
        self.original_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.upload_dir.clone())
    }

    /// Bare file name of the original.
    pub fn original_basename(&self) -> &str {
        self.file.rsplit('/').next().unwrap_or(&self.file)
    }

    pub fn original_dimensions(&self) -> Dimensions {
        self.original
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn set_mime_type(&mut self, mime_type: impl Into<String>) {
        self.mime_type = Some(mime_type.into());
    }

    pub fn trimmed(&self) -> Option<Dimensions> {
        self.trimmed
    }

    pub fn set_trim(&mut self, dims: Dimensions) {
        self.trimmed = Some(dims);
    }

    /// Snapshot the current sizes as the backup, once. Later calls are no-ops.
    pub fn set_backup(&mut self) {
        if self.backup_sizes.is_none() {
            self.backup_sizes = Some(self.sizes.clone());
        }
    }

    pub fn backup_sizes(&self) -> Option<&SizeMap> {
        self.backup_sizes.as_ref()
    }

    /// Forget every size record. Backup and original fields are kept.
    pub fn clear_sizes(&mut self) {
        self.sizes.clear();
    }

    pub fn set_size(&mut self, name: impl Into<String>, record: SizeRecord) {
        self.sizes.insert(name, record);
    }

    pub fn get_size(&self, name: &str) -> Option<&SizeRecord> {
        self.sizes.get(name)
    }

    pub fn sizes(&self) -> &SizeMap {
        &self.sizes
    }

    pub fn mark_regenerated(&mut self) {
        self.regenerated = true;
    }

    pub fn is_regenerated(&self) -> bool {
        self.regenerated
    }

    /// Serialize back into the host's metadata shape.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.raw.clone();
        map.insert(FILE.into(), Value::from(self.file.clone()));
        map.insert(WIDTH.into(), Value::from(self.original.width));
        map.insert(HEIGHT.into(), Value::from(self.original.height));
        if let Some(mime) = &self.mime_type {
            map.insert(MIME_TYPE.into(), Value::from(mime.clone()));
        }
        map.insert(SIZES.into(), sizes_value(&self.sizes));
        if let Some(trimmed) = self.trimmed {
            map.insert(TRIMMED_WIDTH.into(), Value::from(trimmed.width));
            map.insert(TRIMMED_HEIGHT.into(), Value::from(trimmed.height));
        }
        if let Some(backup) = &self.backup_sizes {
            map.insert(BACKUP_SIZES.into(), sizes_value(backup));
        }
        if self.regenerated {
            map.insert(SIZES_REGENERATED.into(), Value::Bool(true));
        }
        map
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }
}

fn read_dimension(raw: &Map<String, Value>, field: &'static str) -> Result<u32, LedgerError> {
    let value = raw.get(field).ok_or(LedgerError::Missing(field))?;
    // Some hosts store numbers as strings.
    let number = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    number
        .filter(|&n| n > 0)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| LedgerError::Invalid {
            field,
            reason: format!("expected a positive integer, found {value}"),
        })
}

fn read_sizes(raw: &Map<String, Value>, field: &'static str) -> Result<Option<SizeMap>, LedgerError> {
    raw.get(field)
        .map(|value| {
            SizeMap::deserialize(value).map_err(|e| LedgerError::Invalid {
                field,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn sizes_value(sizes: &SizeMap) -> Value {
    // Only strings and integers inside: serialization cannot fail.
    serde_json::to_value(sizes).unwrap_or_default()
}
