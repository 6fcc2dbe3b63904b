//! Compliance trail shared by all three portals. Entries are appended and
//! read back, nothing else.

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::database::models::AuditLogEntry;
use crate::database::{AuditQuery, AuditStore, DatabaseError};
use crate::types::Portal;

/// What happened, before id and timestamp are assigned
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub portal: Portal,
    pub actor_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Value,
}

impl AuditEvent {
    pub fn new(portal: Portal, actor_id: Uuid, action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            portal,
            actor_id,
            organization_id: None,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            details: Value::Object(Default::default()),
        }
    }

    pub fn organization(mut self, organization_id: Uuid) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

pub struct AuditLog<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> AuditLog<'a, S>
where
    S: AuditStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn record(&self, event: AuditEvent) -> Result<AuditLogEntry, DatabaseError> {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            portal: event.portal,
            actor_id: event.actor_id,
            organization_id: event.organization_id,
            action: event.action,
            resource_type: event.resource_type,
            resource_id: event.resource_id,
            details: event.details,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.append_audit(&entry).await {
            error!(action = %entry.action, actor_id = %entry.actor_id, "failed to write audit entry: {}", e);
            return Err(e);
        }

        info!(
            portal = %entry.portal,
            action = %entry.action,
            actor_id = %entry.actor_id,
            resource_type = %entry.resource_type,
            "audit"
        );
        Ok(entry)
    }

    pub async fn list(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, DatabaseError> {
        self.store.list_audit(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn entries_come_back_newest_first_and_filtered() {
        let store = MemoryStore::new();
        let log = AuditLog::new(&store);
        let actor = Uuid::new_v4();
        let org = Uuid::new_v4();

        log.record(AuditEvent::new(Portal::Dashboard, actor, "member.role_changed", "membership").organization(org))
            .await
            .unwrap();
        log.record(
            AuditEvent::new(Portal::Admin, actor, "organization.plan_changed", "organization")
                .organization(org)
                .details(json!({ "plan_tier": "PRO" })),
        )
        .await
        .unwrap();
        log.record(AuditEvent::new(Portal::Admin, Uuid::new_v4(), "feature.override_set", "feature"))
            .await
            .unwrap();

        let for_org = log
            .list(&AuditQuery {
                organization_id: Some(org),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(for_org.len(), 2);
        assert_eq!(for_org[0].action, "organization.plan_changed");
        assert_eq!(for_org[0].details["plan_tier"], "PRO");

        let admin_only = log
            .list(&AuditQuery {
                portal: Some(Portal::Admin),
                actor_id: Some(actor),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(admin_only.len(), 1);
    }
}
