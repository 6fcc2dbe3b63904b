//! Feature gate: may an organization use a feature, and up to what limit.
//!
//! Enablement, first match wins:
//! 1. explicit per-organization override (`enabled` set)
//! 2. percentage rollout on the flag (deterministic bucket)
//! 3. plan-tier default for the organization's plan
//! 4. the flag's global `is_enabled_by_default`
//! 5. disabled
//!
//! The limit walks override → plan → flag default → unbounded on its own,
//! so an organization can keep its plan's enablement with a custom limit.
//!
//! Parent inheritance is a separate, depth-bounded traversal
//! ([`FeatureGate::is_enabled_inherited`]) and never happens implicitly
//! inside [`FeatureGate::is_enabled`].

mod catalog;
mod rollout;

pub use catalog::{FeatureCatalog, FlagDefinition, PlanEntry};
pub use rollout::{in_rollout, rollout_bucket};

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::FeatureConfig;
use crate::database::models::{FeatureFlag, FeatureLimit, FeatureOverride, Organization, PlanFeature};
use crate::database::{DatabaseError, FeatureStore, OrganizationStore};

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    #[error("invalid feature catalog: {0}")]
    Catalog(String),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Which step of the chain produced a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Override,
    Rollout,
    Plan,
    Default,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureDecision {
    pub feature_key: String,
    pub enabled: bool,
    pub limit: FeatureLimit,
    pub source: DecisionSource,
    pub limit_source: DecisionSource,
    /// Set when the value came from an ancestor organization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<Uuid>,
}

impl FeatureDecision {
    /// Enabled and `usage` within the limit
    pub fn permits(&self, usage: u64) -> bool {
        self.enabled && self.limit.allows(usage)
    }
}

/// Pure resolution over already-loaded rows
pub fn evaluate(
    organization_id: Uuid,
    feature_key: &str,
    flag: Option<&FeatureFlag>,
    plan: Option<&PlanFeature>,
    feature_override: Option<&FeatureOverride>,
) -> FeatureDecision {
    let (enabled, source) = if let Some(enabled) = feature_override.and_then(|o| o.enabled) {
        (enabled, DecisionSource::Override)
    } else if let Some(percentage) = flag.and_then(FeatureFlag::rollout) {
        (
            in_rollout(feature_key, organization_id, percentage),
            DecisionSource::Rollout,
        )
    } else if let Some(plan) = plan {
        (plan.enabled, DecisionSource::Plan)
    } else if let Some(flag) = flag {
        (flag.is_enabled_by_default, DecisionSource::Default)
    } else {
        (false, DecisionSource::Fallback)
    };

    let (limit, limit_source) = if let Some(limit) = feature_override.and_then(FeatureOverride::limit) {
        (limit, DecisionSource::Override)
    } else if let Some(limit) = plan.and_then(PlanFeature::limit) {
        (limit, DecisionSource::Plan)
    } else if let Some(limit) = flag.and_then(FeatureFlag::limit) {
        (limit, DecisionSource::Default)
    } else {
        (FeatureLimit::Unbounded, DecisionSource::Fallback)
    };

    FeatureDecision {
        feature_key: feature_key.to_string(),
        enabled,
        limit,
        source,
        limit_source,
        inherited_from: None,
    }
}

pub struct FeatureGate<'a, S: ?Sized> {
    store: &'a S,
    config: &'a FeatureConfig,
}

impl<'a, S> FeatureGate<'a, S>
where
    S: FeatureStore + OrganizationStore + ?Sized,
{
    pub fn new(store: &'a S, config: &'a FeatureConfig) -> Self {
        Self { store, config }
    }

    /// Resolve using the configured strategy: inheritance when
    /// `inherit_from_parent` is on, the flat chain otherwise.
    pub async fn resolve(&self, organization: &Organization, key: &str) -> Result<FeatureDecision, FeatureError> {
        if self.config.inherit_from_parent {
            self.is_enabled_inherited(organization, key).await
        } else {
            self.is_enabled(organization, key).await
        }
    }

    /// Flat resolution for one organization. Never looks at the parent.
    pub async fn is_enabled(&self, organization: &Organization, key: &str) -> Result<FeatureDecision, FeatureError> {
        let feature_override = self.store.find_override(organization.id, key).await?;
        self.decide(organization, key, feature_override.as_ref()).await
    }

    /// Like [`Self::is_enabled`], but an organization without its own override
    /// takes its parent's resolved value. The walk stops at the first
    /// ancestor with an override, at a root, after `max_hierarchy_depth` hops
    /// or on a revisited id, and that organization is resolved normally.
    pub async fn is_enabled_inherited(
        &self,
        organization: &Organization,
        key: &str,
    ) -> Result<FeatureDecision, FeatureError> {
        let mut current = organization.clone();
        let mut visited = HashSet::from([organization.id]);
        let mut depth = 0u32;

        let feature_override = loop {
            if let Some(found) = self.store.find_override(current.id, key).await? {
                break Some(found);
            }
            let Some(parent_id) = current.parent_id else {
                break None;
            };
            if depth >= self.config.max_hierarchy_depth {
                debug!(organization_id = %organization.id, depth, "feature inheritance depth limit reached");
                break None;
            }
            if !visited.insert(parent_id) {
                warn!(organization_id = %organization.id, parent_id = %parent_id, "organization hierarchy cycle detected");
                break None;
            }
            match self.store.find_organization(parent_id).await? {
                Some(parent) => {
                    current = parent;
                    depth += 1;
                }
                None => break None,
            }
        };

        let mut decision = self.decide(&current, key, feature_override.as_ref()).await?;
        if current.id != organization.id {
            decision.inherited_from = Some(current.id);
        }
        Ok(decision)
    }

    /// Create or replace an organization's override for a known flag
    pub async fn set_override(
        &self,
        organization_id: Uuid,
        key: &str,
        enabled: Option<bool>,
        limit: Option<FeatureLimit>,
        updated_by: Option<Uuid>,
    ) -> Result<FeatureOverride, FeatureError> {
        self.require_flag(key).await?;

        let (limit_value, limit_unbounded) = FeatureLimit::to_columns(limit);
        let feature_override = FeatureOverride {
            organization_id,
            feature_key: key.to_string(),
            enabled,
            limit_value,
            limit_unbounded,
            updated_by,
            updated_at: Utc::now(),
        };
        self.store.upsert_override(&feature_override).await?;
        Ok(feature_override)
    }

    pub async fn clear_override(&self, organization_id: Uuid, key: &str) -> Result<bool, FeatureError> {
        Ok(self.store.delete_override(organization_id, key).await?)
    }

    pub async fn require_flag(&self, key: &str) -> Result<FeatureFlag, FeatureError> {
        self.store
            .find_flag(key)
            .await?
            .ok_or_else(|| FeatureError::UnknownFeature(key.to_string()))
    }

    async fn decide(
        &self,
        organization: &Organization,
        key: &str,
        feature_override: Option<&FeatureOverride>,
    ) -> Result<FeatureDecision, FeatureError> {
        let flag = self.store.find_flag(key).await?;
        let plan = self
            .store
            .find_plan_feature(organization.plan_tier, key)
            .await?;

        if flag.is_none() && plan.is_none() && feature_override.is_none() {
            debug!(feature_key = key, "feature has no definition, treating as disabled");
        }

        Ok(evaluate(
            organization.id,
            key,
            flag.as_ref(),
            plan.as_ref(),
            feature_override,
        ))
    }
}
