/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three independent web surfaces. Each one issues and validates its own
/// session tokens under its own cookie name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Portal {
    Dashboard,
    Admin,
    Gwi,
}

impl Portal {
    pub const ALL: [Portal; 3] = [Portal::Dashboard, Portal::Admin, Portal::Gwi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Portal::Dashboard => "dashboard",
            Portal::Admin => "admin",
            Portal::Gwi => "gwi",
        }
    }

    /// Kind of principal a session on this portal must belong to
    pub fn principal_kind(&self) -> PrincipalKind {
        match self {
            Portal::Dashboard => PrincipalKind::User,
            Portal::Admin | Portal::Gwi => PrincipalKind::Admin,
        }
    }
}

impl fmt::Display for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Portal {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dashboard" => Ok(Portal::Dashboard),
            "admin" => Ok(Portal::Admin),
            "gwi" => Ok(Portal::Gwi),
            _ => Err(ParseEnumError::new("portal", s)),
        }
    }
}

impl TryFrom<String> for Portal {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Which principal table a session points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Admin,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Admin => "admin",
        }
    }
}

impl FromStr for PrincipalKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(PrincipalKind::User),
            "admin" => Ok(PrincipalKind::Admin),
            _ => Err(ParseEnumError::new("principal kind", s)),
        }
    }
}

impl TryFrom<String> for PrincipalKind {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Error returned when a stored or submitted enum value is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
