//! Loading the office policy in force

use tracing::info;
use workday_api::SYSTEM_ACTOR;
use workday_config::{OfficeConfig, OfficePolicy, ValidationError};
use workday_store::{Store, StoreResult, StoredPolicy};

use crate::{CoreError, CoreResult};

/// A validated policy together with the stored version it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePolicy {
    pub version: i64,
    pub policy: OfficePolicy,
}

impl ActivePolicy {
    /// Load the stored policy, seeding it from `seed` the first time
    pub fn load(store: &dyn Store, seed: &OfficeConfig) -> CoreResult<Self> {
        let stored = stored_or_seeded(store, seed)?;
        Self::from_stored(&stored).map_err(CoreError::InvalidPolicy)
    }

    pub fn from_stored(stored: &StoredPolicy) -> Result<Self, Vec<ValidationError>> {
        Ok(Self {
            version: stored.version,
            policy: OfficePolicy::from_config(stored.config.clone())?,
        })
    }
}

/// The stored policy record, writing `seed` as version 1 when none exists
pub fn stored_or_seeded(store: &dyn Store, seed: &OfficeConfig) -> StoreResult<StoredPolicy> {
    if let Some(stored) = store.load_policy()? {
        return Ok(stored);
    }

    let stored = store.seed_policy(seed, SYSTEM_ACTOR)?;
    info!(version = stored.version, "Office policy seeded");
    Ok(stored)
}
