//! Permission evaluation.
//!
//! Capabilities are `namespace:resource:action` strings such as
//! `gwi:datasources:write`. Everything here is a pure function of
//! `(role, permissions, capability)`: no store access, no clock. A `false`
//! result is not an error; callers decide how to answer a denial.

use std::collections::BTreeSet;

use super::principal::{AdminPrincipal, AdminRole, OrgRole};
use crate::database::models::Membership;

const WILDCARD_SUFFIX: &str = ":*";

/// Granted to every member; higher roles add their own tier on top
const MEMBER_CAPABILITIES: &[&str] = &[
    "org:read",
    "agents:read",
    "agents:run",
    "projects:read",
    "projects:write",
    "insights:read",
    "features:read",
];

const ADMIN_CAPABILITIES: &[&str] = &[
    "members:read",
    "members:invite",
    "members:update",
    "members:remove",
    "agents:write",
    "audit:read",
    "settings:write",
    "api_keys:manage",
];

const OWNER_CAPABILITIES: &[&str] = &[
    "billing:manage",
    "ownership:transfer",
    "org:delete",
];

/// Role tiers in ascending order. A role holds its own tier and every tier below it.
const ORG_ROLE_TIERS: &[(OrgRole, &[&str])] = &[
    (OrgRole::Member, MEMBER_CAPABILITIES),
    (OrgRole::Admin, ADMIN_CAPABILITIES),
    (OrgRole::Owner, OWNER_CAPABILITIES),
];

/// Static fallback grants for staff roles. Entries may be namespace wildcards.
fn admin_role_grants(role: AdminRole) -> &'static [&'static str] {
    match role {
        AdminRole::SuperAdmin => &["super:*", "gwi:*"],
        AdminRole::Admin => &[
            "super:organizations:read",
            "super:organizations:write",
            "super:features:read",
            "super:features:write",
            "super:users:read",
            "super:audit:read",
        ],
        AdminRole::Support => &[
            "super:organizations:read",
            "super:features:read",
            "super:users:read",
        ],
        AdminRole::Analyst => &["super:organizations:read", "super:audit:read"],
        AdminRole::GwiAdmin => &["gwi:*"],
        AdminRole::GwiAnalyst => &["gwi:datasources:read", "gwi:audit:read"],
    }
}

/// Namespace of a capability: the text before the first colon. Capabilities
/// without a colon have no namespace and can only be granted exactly.
pub fn namespace(capability: &str) -> Option<&str> {
    capability
        .split_once(':')
        .map(|(ns, _)| ns)
        .filter(|ns| !ns.is_empty())
}

/// Does a single grant entry cover `capability`? Either an exact match or a
/// `<namespace>:*` wildcard whose namespace equals the capability's.
pub fn grant_matches(grant: &str, capability: &str) -> bool {
    if grant == capability {
        return true;
    }
    match grant.strip_suffix(WILDCARD_SUFFIX) {
        Some(ns) if !ns.is_empty() && !ns.contains(':') => namespace(capability) == Some(ns),
        _ => false,
    }
}

/// End-user check: set membership in the cumulative tier table
pub fn org_role_can(role: OrgRole, capability: &str) -> bool {
    ORG_ROLE_TIERS
        .iter()
        .filter(|(tier, _)| role.has_at_least(*tier))
        .any(|(_, caps)| caps.contains(&capability))
}

/// Every capability a role holds, lowest tier first
pub fn org_role_capabilities(role: OrgRole) -> Vec<&'static str> {
    ORG_ROLE_TIERS
        .iter()
        .filter(|(tier, _)| role.has_at_least(*tier))
        .flat_map(|(_, caps)| caps.iter().copied())
        .collect()
}

/// Staff check: exact permission, then permission wildcards, then the static
/// role table.
pub fn admin_can(role: AdminRole, permissions: &BTreeSet<String>, capability: &str) -> bool {
    if permissions.contains(capability) {
        return true;
    }
    if permissions
        .iter()
        .any(|p| p.ends_with(WILDCARD_SUFFIX) && grant_matches(p, capability))
    {
        return true;
    }
    admin_role_grants(role)
        .iter()
        .any(|grant| grant_matches(grant, capability))
}

/// Anything that can be asked whether it holds a capability
pub trait Authorize {
    fn can(&self, capability: &str) -> bool;
}

impl Authorize for OrgRole {
    fn can(&self, capability: &str) -> bool {
        org_role_can(*self, capability)
    }
}

impl Authorize for Membership {
    fn can(&self, capability: &str) -> bool {
        org_role_can(self.role, capability)
    }
}

impl Authorize for AdminPrincipal {
    fn can(&self, capability: &str) -> bool {
        admin_can(self.role, &self.permissions, capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(entries: &[&str]) -> BTreeSet<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn namespace_is_text_before_first_colon() {
        assert_eq!(namespace("gwi:datasources:write"), Some("gwi"));
        assert_eq!(namespace("audit:read"), Some("audit"));
        assert_eq!(namespace("audit"), None);
        assert_eq!(namespace(":read"), None);
    }

    #[test]
    fn wildcard_grants_only_its_namespace() {
        let cases = [
            ("gwi:*", "gwi:datasources:write", true),
            ("gwi:*", "gwi:audit:read", true),
            ("gwi:*", "super:anything", false),
            ("gwi:*", "gwi", false),
            ("gwi:*", "gwiextra:read", false),
            ("gwi:datasources:*", "gwi:datasources:write", false),
            ("*", "gwi:datasources:write", false),
            ("audit:read", "audit:read", true),
        ];
        for (grant, capability, expected) in cases {
            assert_eq!(
                grant_matches(grant, capability),
                expected,
                "grant {grant} vs {capability}"
            );
        }
    }

    #[test]
    fn gwi_wildcard_principal() {
        let p = perms(&["gwi:*"]);
        assert!(admin_can(AdminRole::Support, &p, "gwi:datasources:write"));
        assert!(!admin_can(AdminRole::Support, &p, "super:anything"));
    }

    #[test]
    fn explicit_permission_beats_role_table() {
        let p = perms(&["super:billing:refund"]);
        assert!(admin_can(AdminRole::Analyst, &p, "super:billing:refund"));
        assert!(!admin_can(AdminRole::Analyst, &BTreeSet::new(), "super:billing:refund"));
    }

    #[test]
    fn role_table_is_the_fallback() {
        let empty = BTreeSet::new();
        let cases = [
            (AdminRole::SuperAdmin, "super:organizations:write", true),
            (AdminRole::SuperAdmin, "gwi:datasources:write", true),
            (AdminRole::Admin, "super:features:write", true),
            (AdminRole::Admin, "gwi:datasources:read", false),
            (AdminRole::Support, "super:features:write", false),
            (AdminRole::GwiAdmin, "gwi:datasources:write", true),
            (AdminRole::GwiAdmin, "super:organizations:read", false),
            (AdminRole::GwiAnalyst, "gwi:datasources:read", true),
            (AdminRole::GwiAnalyst, "gwi:datasources:write", false),
        ];
        for (role, capability, expected) in cases {
            assert_eq!(admin_can(role, &empty, capability), expected, "{role} {capability}");
        }
    }

    #[test]
    fn org_roles_are_cumulative() {
        let cases = [
            (OrgRole::Member, "org:read", true),
            (OrgRole::Member, "members:read", false),
            (OrgRole::Member, "audit:read", false),
            (OrgRole::Admin, "org:read", true),
            (OrgRole::Admin, "audit:read", true),
            (OrgRole::Admin, "billing:manage", false),
            (OrgRole::Owner, "members:remove", true),
            (OrgRole::Owner, "ownership:transfer", true),
            (OrgRole::Owner, "super:organizations:read", false),
        ];
        for (role, capability, expected) in cases {
            assert_eq!(org_role_can(role, capability), expected, "{role} {capability}");
        }
    }

    #[test]
    fn owner_capabilities_are_a_superset() {
        let member = org_role_capabilities(OrgRole::Member);
        let admin = org_role_capabilities(OrgRole::Admin);
        let owner = org_role_capabilities(OrgRole::Owner);
        assert!(member.iter().all(|c| admin.contains(c)));
        assert!(admin.iter().all(|c| owner.contains(c)));
        assert!(owner.len() > admin.len() && admin.len() > member.len());
    }
}
