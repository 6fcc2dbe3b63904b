use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::database::models::{AdminAccount, UserAccount};
use crate::types::{ParseEnumError, Portal, PrincipalKind};

/// Role a user holds inside one organization. Scoped per membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgRole {
    Owner,
    Admin,
    Member,
}

impl OrgRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRole::Owner => "OWNER",
            OrgRole::Admin => "ADMIN",
            OrgRole::Member => "MEMBER",
        }
    }

    /// Higher level means strictly more capabilities
    pub fn hierarchy_level(&self) -> u8 {
        match self {
            OrgRole::Owner => 3,
            OrgRole::Admin => 2,
            OrgRole::Member => 1,
        }
    }

    pub fn has_at_least(&self, other: OrgRole) -> bool {
        self.hierarchy_level() >= other.hierarchy_level()
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrgRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OWNER" => Ok(OrgRole::Owner),
            "ADMIN" => Ok(OrgRole::Admin),
            "MEMBER" => Ok(OrgRole::Member),
            _ => Err(ParseEnumError::new("organization role", s)),
        }
    }
}

impl TryFrom<String> for OrgRole {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Coarse tier of a platform staff account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminRole {
    SuperAdmin,
    Admin,
    Support,
    Analyst,
    GwiAdmin,
    GwiAnalyst,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::SuperAdmin => "SUPER_ADMIN",
            AdminRole::Admin => "ADMIN",
            AdminRole::Support => "SUPPORT",
            AdminRole::Analyst => "ANALYST",
            AdminRole::GwiAdmin => "GWI_ADMIN",
            AdminRole::GwiAnalyst => "GWI_ANALYST",
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUPER_ADMIN" => Ok(AdminRole::SuperAdmin),
            "ADMIN" => Ok(AdminRole::Admin),
            "SUPPORT" => Ok(AdminRole::Support),
            "ANALYST" => Ok(AdminRole::Analyst),
            "GWI_ADMIN" => Ok(AdminRole::GwiAdmin),
            "GWI_ANALYST" => Ok(AdminRole::GwiAnalyst),
            _ => Err(ParseEnumError::new("admin role", s)),
        }
    }
}

impl TryFrom<String> for AdminRole {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

impl From<UserAccount> for EndUser {
    fn from(account: UserAccount) -> Self {
        Self {
            id: account.id,
            email: account.email,
            name: account.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminPrincipal {
    pub id: Uuid,
    pub email: String,
    pub role: AdminRole,
    pub permissions: BTreeSet<String>,
}

impl From<AdminAccount> for AdminPrincipal {
    fn from(account: AdminAccount) -> Self {
        Self {
            id: account.id,
            email: account.email,
            role: account.role,
            permissions: account.permissions.into_iter().collect(),
        }
    }
}

/// Authenticated identity, built from current account state on every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    EndUser(EndUser),
    SuperAdmin(AdminPrincipal),
    GwiAdmin(AdminPrincipal),
}

impl Principal {
    /// Wrap a staff account in the variant matching the portal it logged into
    pub fn admin_for(portal: Portal, admin: AdminPrincipal) -> Self {
        match portal {
            Portal::Gwi => Principal::GwiAdmin(admin),
            Portal::Admin | Portal::Dashboard => Principal::SuperAdmin(admin),
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Principal::EndUser(user) => user.id,
            Principal::SuperAdmin(admin) | Principal::GwiAdmin(admin) => admin.id,
        }
    }

    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::EndUser(_) => PrincipalKind::User,
            Principal::SuperAdmin(_) | Principal::GwiAdmin(_) => PrincipalKind::Admin,
        }
    }

    pub fn portal(&self) -> Portal {
        match self {
            Principal::EndUser(_) => Portal::Dashboard,
            Principal::SuperAdmin(_) => Portal::Admin,
            Principal::GwiAdmin(_) => Portal::Gwi,
        }
    }

    pub fn as_end_user(&self) -> Option<&EndUser> {
        match self {
            Principal::EndUser(user) => Some(user),
            _ => None,
        }
    }

    pub fn as_admin(&self) -> Option<&AdminPrincipal> {
        match self {
            Principal::SuperAdmin(admin) | Principal::GwiAdmin(admin) => Some(admin),
            Principal::EndUser(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_roles_are_ordered() {
        assert!(OrgRole::Owner.has_at_least(OrgRole::Admin));
        assert!(OrgRole::Admin.has_at_least(OrgRole::Member));
        assert!(!OrgRole::Member.has_at_least(OrgRole::Admin));
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("owner".parse::<OrgRole>().unwrap(), OrgRole::Owner);
        assert_eq!("gwi_admin".parse::<AdminRole>().unwrap(), AdminRole::GwiAdmin);
        assert!("root".parse::<AdminRole>().is_err());
    }

    #[test]
    fn admin_variant_follows_portal() {
        let admin = AdminPrincipal {
            id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
            role: AdminRole::Admin,
            permissions: BTreeSet::new(),
        };
        assert_eq!(Principal::admin_for(Portal::Gwi, admin.clone()).portal(), Portal::Gwi);
        assert_eq!(Principal::admin_for(Portal::Admin, admin).portal(), Portal::Admin);
    }
}
