//! Processing quota.
//!
//! Counts originals processed per UTC calendar month. The gate is consulted
//! before a run and charged once after a fully successful run. The counter
//! never goes down; a new month simply starts from zero.

use crate::host::{ImageId, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::info;

/// Persisted counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    /// `YYYY-MM` of the last charge.
    pub period: String,
    pub consumed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_image: Option<ImageId>,
}

/// Where the counter lives.
pub trait QuotaStore {
    fn load(&self) -> Result<QuotaState, StoreError>;
    fn save(&self, state: &QuotaState) -> Result<(), StoreError>;
}

/// In-process store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryQuotaStore {
    state: RefCell<QuotaState>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> QuotaState {
        self.state.borrow().clone()
    }
}

impl QuotaStore for MemoryQuotaStore {
    fn load(&self) -> Result<QuotaState, StoreError> {
        Ok(self.state.borrow().clone())
    }

    fn save(&self, state: &QuotaState) -> Result<(), StoreError> {
        *self.state.borrow_mut() = state.clone();
        Ok(())
    }
}

/// JSON file store. A missing file is an empty counter.
#[derive(Debug, Clone)]
pub struct JsonQuotaStore {
    path: PathBuf,
}

impl JsonQuotaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QuotaStore for JsonQuotaStore {
    fn load(&self) -> Result<QuotaState, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(QuotaState::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, state: &QuotaState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(state)?)?;
        Ok(())
    }
}

/// The period key for `now`: `YYYY-MM`.
pub fn period_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

/// Usage snapshot for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaUsage {
    pub period: String,
    pub consumed: u32,
    /// 0 = unlimited.
    pub limit: u32,
}

impl QuotaUsage {
    /// `None` when unlimited.
    pub fn remaining(&self) -> Option<u32> {
        (self.limit > 0).then(|| self.limit.saturating_sub(self.consumed))
    }
}

/// Ceiling check and charge over a [`QuotaStore`].
#[derive(Debug)]
pub struct QuotaGate<Q> {
    store: Q,
    limit: u32,
}

impl<Q: QuotaStore> QuotaGate<Q> {
    /// `limit` of 0 means unlimited.
    pub fn new(store: Q, limit: u32) -> Self {
        Self { store, limit }
    }

    pub fn store(&self) -> &Q {
        &self.store
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn usage_at(&self, now: DateTime<Utc>) -> Result<QuotaUsage, StoreError> {
        let period = period_key(now);
        let state = self.store.load()?;
        let consumed = if state.period == period {
            state.consumed
        } else {
            0
        };
        Ok(QuotaUsage {
            period,
            consumed,
            limit: self.limit,
        })
    }

    pub fn usage(&self) -> Result<QuotaUsage, StoreError> {
        self.usage_at(Utc::now())
    }

    pub fn is_exceeded_at(&self, now: DateTime<Utc>) -> Result<bool, StoreError> {
        if self.limit == 0 {
            return Ok(false);
        }
        Ok(self.usage_at(now)?.consumed >= self.limit)
    }

    pub fn is_exceeded(&self) -> Result<bool, StoreError> {
        self.is_exceeded_at(Utc::now())
    }

    /// Charge one processed original. Returns the new count for the period.
    pub fn consume_at(&self, image_id: ImageId, now: DateTime<Utc>) -> Result<u32, StoreError> {
        let usage = self.usage_at(now)?;
        let state = QuotaState {
            period: usage.period,
            consumed: usage.consumed.saturating_add(1),
            last_image: Some(image_id),
        };
        self.store.save(&state)?;
        info!(image = image_id, consumed = state.consumed, limit = self.limit, "quota consumed");
        Ok(state.consumed)
    }

    pub fn consume(&self, image_id: ImageId) -> Result<u32, StoreError> {
        self.consume_at(image_id, Utc::now())
    }
}
