use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::organization::PlanTier;

/// Usage ceiling attached to a feature. Serialized as a number, or `null`
/// when unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureLimit {
    Limited(u64),
    Unbounded,
}

impl FeatureLimit {
    /// Whether a total of `usage` units stays within the limit
    pub fn allows(&self, usage: u64) -> bool {
        match self {
            FeatureLimit::Limited(max) => usage <= *max,
            FeatureLimit::Unbounded => true,
        }
    }

    /// Build from the nullable column pair every feature table uses
    pub fn from_columns(limit_value: Option<i64>, unbounded: bool) -> Option<Self> {
        if unbounded {
            return Some(FeatureLimit::Unbounded);
        }
        limit_value.map(|v| FeatureLimit::Limited(u64::try_from(v).unwrap_or(0)))
    }

    /// Inverse of [`FeatureLimit::from_columns`]
    pub fn to_columns(limit: Option<FeatureLimit>) -> (Option<i64>, bool) {
        match limit {
            Some(FeatureLimit::Unbounded) => (None, true),
            Some(FeatureLimit::Limited(v)) => (Some(i64::try_from(v).unwrap_or(i64::MAX)), false),
            None => (None, false),
        }
    }
}

/// Global definition of a feature flag
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeatureFlag {
    pub key: String,
    pub description: Option<String>,
    pub is_enabled_by_default: bool,
    pub rollout_percentage: Option<i16>,
    pub default_limit: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl FeatureFlag {
    /// Rollout percentage clamped to 0..=100
    pub fn rollout(&self) -> Option<u8> {
        self.rollout_percentage.map(|p| p.clamp(0, 100) as u8)
    }

    pub fn limit(&self) -> Option<FeatureLimit> {
        FeatureLimit::from_columns(self.default_limit, false)
    }
}

/// Default for one feature on one plan tier
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanFeature {
    #[sqlx(try_from = "String")]
    pub plan_tier: PlanTier,
    pub feature_key: String,
    pub enabled: bool,
    pub limit_value: Option<i64>,
    pub limit_unbounded: bool,
}

impl PlanFeature {
    pub fn limit(&self) -> Option<FeatureLimit> {
        FeatureLimit::from_columns(self.limit_value, self.limit_unbounded)
    }
}

/// Explicit per-organization override. `enabled` and the limit are
/// independent: either may be left unset to fall through.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeatureOverride {
    pub organization_id: Uuid,
    pub feature_key: String,
    pub enabled: Option<bool>,
    pub limit_value: Option<i64>,
    pub limit_unbounded: bool,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl FeatureOverride {
    pub fn limit(&self) -> Option<FeatureLimit> {
        FeatureLimit::from_columns(self.limit_value, self.limit_unbounded)
    }
}
