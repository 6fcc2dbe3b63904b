use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

use crate::types::Portal;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub session: SessionConfig,
    pub features: FeatureConfig,
    pub gwi: GwiConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    /// Adds the `Secure` attribute to every cookie we set
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub dashboard_cookie: String,
    pub admin_cookie: String,
    pub gwi_cookie: String,
    pub dashboard_ttl_hours: u64,
    pub admin_ttl_hours: u64,
    pub gwi_ttl_hours: u64,
    /// When set, a resolution with less than half the TTL left pushes
    /// `expires_at` back out to a full TTL.
    pub sliding_expiry: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub inherit_from_parent: bool,
    pub max_hierarchy_depth: u32,
    pub catalog_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GwiConfig {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: u64,
}

/// Plain preference cookies shared by every portal
pub const CURRENT_ORG_COOKIE: &str = "currentOrgId";
pub const LOCALE_COOKIE: &str = "locale";
pub const ORGANIZATION_HEADER: &str = "x-organization-id";
pub const PREFERENCE_COOKIE_MAX_AGE_DAYS: i64 = 365;

impl SessionConfig {
    pub fn cookie_name(&self, portal: Portal) -> &str {
        match portal {
            Portal::Dashboard => &self.dashboard_cookie,
            Portal::Admin => &self.admin_cookie,
            Portal::Gwi => &self.gwi_cookie,
        }
    }

    pub fn ttl(&self, portal: Portal) -> chrono::Duration {
        let hours = match portal {
            Portal::Dashboard => self.dashboard_ttl_hours,
            Portal::Admin => self.admin_ttl_hours,
            Portal::Gwi => self.gwi_ttl_hours,
        };
        chrono::Duration::hours(hours as i64)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dashboard_cookie: "sessionToken".to_string(),
            admin_cookie: "adminToken".to_string(),
            gwi_cookie: "gwiToken".to_string(),
            dashboard_ttl_hours: 24 * 30,
            admin_ttl_hours: 24,
            gwi_ttl_hours: 24,
            sliding_expiry: false,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            inherit_from_parent: false,
            max_hierarchy_depth: 8,
            catalog_path: "config/features.yaml".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|v| !v.trim().is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("PORTAL_API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_SECURE_COOKIES") {
            self.security.secure_cookies = v.parse().unwrap_or(self.security.secure_cookies);
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_DASHBOARD_COOKIE") {
            self.session.dashboard_cookie = v;
        }
        if let Ok(v) = env::var("SESSION_DASHBOARD_TTL_HOURS") {
            self.session.dashboard_ttl_hours = v.parse().unwrap_or(self.session.dashboard_ttl_hours);
        }
        if let Ok(v) = env::var("SESSION_ADMIN_TTL_HOURS") {
            self.session.admin_ttl_hours = v.parse().unwrap_or(self.session.admin_ttl_hours);
        }
        if let Ok(v) = env::var("SESSION_GWI_TTL_HOURS") {
            self.session.gwi_ttl_hours = v.parse().unwrap_or(self.session.gwi_ttl_hours);
        }
        if let Ok(v) = env::var("SESSION_SLIDING_EXPIRY") {
            self.session.sliding_expiry = v.parse().unwrap_or(self.session.sliding_expiry);
        }

        // Feature gate overrides
        if let Ok(v) = env::var("FEATURES_INHERIT_FROM_PARENT") {
            self.features.inherit_from_parent = v.parse().unwrap_or(self.features.inherit_from_parent);
        }
        if let Ok(v) = env::var("FEATURES_MAX_HIERARCHY_DEPTH") {
            self.features.max_hierarchy_depth = v.parse().unwrap_or(self.features.max_hierarchy_depth);
        }
        if let Ok(v) = env::var("FEATURES_CATALOG_PATH") {
            self.features.catalog_path = v;
        }

        // Upstream GWI API
        if let Ok(v) = env::var("GWI_API_BASE_URL") {
            self.gwi.api_base_url = Some(v).filter(|v| !v.trim().is_empty());
        }
        if let Ok(v) = env::var("GWI_REQUEST_TIMEOUT_SECS") {
            self.gwi.request_timeout_secs = v.parse().unwrap_or(self.gwi.request_timeout_secs);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                secure_cookies: false,
            },
            session: SessionConfig::default(),
            features: FeatureConfig::default(),
            gwi: GwiConfig {
                api_base_url: None,
                request_timeout_secs: 30,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                secure_cookies: true,
            },
            session: SessionConfig {
                admin_ttl_hours: 12,
                gwi_ttl_hours: 12,
                ..SessionConfig::default()
            },
            features: FeatureConfig::default(),
            gwi: GwiConfig {
                api_base_url: None,
                request_timeout_secs: 20,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                secure_cookies: true,
            },
            session: SessionConfig {
                admin_ttl_hours: 8,
                gwi_ttl_hours: 8,
                ..SessionConfig::default()
            },
            features: FeatureConfig::default(),
            gwi: GwiConfig {
                api_base_url: None,
                request_timeout_secs: 15,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(!config.security.secure_cookies);
        assert_eq!(config.session.cookie_name(Portal::Admin), "adminToken");
        assert_eq!(config.session.cookie_name(Portal::Gwi), "gwiToken");
        assert!(!config.session.sliding_expiry);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.security.secure_cookies);
        assert_eq!(config.session.ttl(Portal::Admin), chrono::Duration::hours(8));
        assert!(config.features.max_hierarchy_depth > 0);
    }

    #[test]
    fn portals_never_share_a_cookie_name() {
        let session = SessionConfig::default();
        let names: std::collections::HashSet<_> =
            Portal::ALL.iter().map(|p| session.cookie_name(*p)).collect();
        assert_eq!(names.len(), Portal::ALL.len());
    }
}
