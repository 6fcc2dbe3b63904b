use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

use super::FeatureError;
use crate::database::models::{FeatureFlag, FeatureLimit, PlanFeature, PlanTier};
use crate::database::FeatureStore;

/// Flag definitions and plan defaults as kept in `config/features.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureCatalog {
    #[serde(default)]
    pub flags: Vec<FlagDefinition>,
    #[serde(default)]
    pub plans: BTreeMap<PlanTier, BTreeMap<String, PlanEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagDefinition {
    pub key: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled_by_default: bool,
    #[serde(default)]
    pub rollout_percentage: Option<u8>,
    #[serde(default)]
    pub default_limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    pub enabled: bool,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub unbounded: bool,
}

impl FeatureCatalog {
    pub fn from_yaml_str(source: &str) -> Result<Self, FeatureError> {
        let catalog: Self =
            serde_yaml::from_str(source).map_err(|e| FeatureError::Catalog(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FeatureError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| FeatureError::Catalog(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&source)
    }

    /// Unique keys, percentages within 0..=100, plan entries for known flags only
    pub fn validate(&self) -> Result<(), FeatureError> {
        let mut keys = HashSet::new();
        for flag in &self.flags {
            if flag.key.trim().is_empty() {
                return Err(FeatureError::Catalog("flag with empty key".to_string()));
            }
            if !keys.insert(flag.key.as_str()) {
                return Err(FeatureError::Catalog(format!("duplicate flag '{}'", flag.key)));
            }
            if flag.rollout_percentage.is_some_and(|p| p > 100) {
                return Err(FeatureError::Catalog(format!(
                    "flag '{}' rollout_percentage must be within 0..=100",
                    flag.key
                )));
            }
        }
        for (tier, entries) in &self.plans {
            if let Some(unknown) = entries.keys().find(|k| !keys.contains(k.as_str())) {
                return Err(FeatureError::Catalog(format!(
                    "plan {tier} references unknown flag '{unknown}'"
                )));
            }
        }
        Ok(())
    }

    pub fn feature_flags(&self) -> Vec<FeatureFlag> {
        let now = Utc::now();
        self.flags
            .iter()
            .map(|f| FeatureFlag {
                key: f.key.clone(),
                description: f.description.clone(),
                is_enabled_by_default: f.enabled_by_default,
                rollout_percentage: f.rollout_percentage.map(i16::from),
                default_limit: f.default_limit.map(|v| i64::try_from(v).unwrap_or(i64::MAX)),
                updated_at: now,
            })
            .collect()
    }

    pub fn plan_features(&self) -> Vec<PlanFeature> {
        self.plans
            .iter()
            .flat_map(|(tier, entries)| {
                entries.iter().map(move |(key, entry)| {
                    let limit = if entry.unbounded {
                        Some(FeatureLimit::Unbounded)
                    } else {
                        entry.limit.map(FeatureLimit::Limited)
                    };
                    let (limit_value, limit_unbounded) = FeatureLimit::to_columns(limit);
                    PlanFeature {
                        plan_tier: *tier,
                        feature_key: key.clone(),
                        enabled: entry.enabled,
                        limit_value,
                        limit_unbounded,
                    }
                })
            })
            .collect()
    }

    /// Upsert every flag, then every plan default. Returns both counts.
    pub async fn seed<S: FeatureStore + ?Sized>(&self, store: &S) -> Result<(usize, usize), FeatureError> {
        let flags = self.feature_flags();
        for flag in &flags {
            store.upsert_flag(flag).await?;
        }
        let plan_features = self.plan_features();
        for plan_feature in &plan_features {
            store.upsert_plan_feature(plan_feature).await?;
        }
        info!(flags = flags.len(), plan_features = plan_features.len(), "feature catalog seeded");
        Ok((flags.len(), plan_features.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
flags:
  - key: advanced_export
    enabled_by_default: false
  - key: agents
    enabled_by_default: true
    default_limit: 1
  - key: agent_memory
    rollout_percentage: 25
plans:
  STARTER:
    agents: { enabled: true, limit: 3 }
  ENTERPRISE:
    agents: { enabled: true, unbounded: true }
    advanced_export: { enabled: true }
"#;

    #[test]
    fn parses_flags_and_plan_defaults() {
        let catalog = FeatureCatalog::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(catalog.flags.len(), 3);

        let plans = catalog.plan_features();
        let enterprise_agents = plans
            .iter()
            .find(|p| p.plan_tier == PlanTier::Enterprise && p.feature_key == "agents")
            .unwrap();
        assert_eq!(enterprise_agents.limit(), Some(FeatureLimit::Unbounded));

        let starter_agents = plans
            .iter()
            .find(|p| p.plan_tier == PlanTier::Starter && p.feature_key == "agents")
            .unwrap();
        assert_eq!(starter_agents.limit(), Some(FeatureLimit::Limited(3)));
    }

    #[test]
    fn rejects_plan_entry_for_unknown_flag() {
        let err = FeatureCatalog::from_yaml_str(
            "flags: []\nplans:\n  PRO:\n    ghost: { enabled: true }\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn rejects_out_of_range_rollout() {
        assert!(FeatureCatalog::from_yaml_str(
            "flags:\n  - key: x\n    rollout_percentage: 150\n"
        )
        .is_err());
    }

    #[test]
    fn shipped_catalog_is_valid() {
        let catalog = FeatureCatalog::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config/features.yaml"));
        assert!(catalog.is_ok(), "{:?}", catalog.err());
    }
}
