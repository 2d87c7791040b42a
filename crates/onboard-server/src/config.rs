//! Server configuration from `ONBOARD_*` environment variables.

use std::env;

use onboard_db::DbConfig;
use onboard_engine::EngineConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not valid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// An administrator to seed into the registry at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedAdmin {
    pub principal_id: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub engine: EngineConfig,
    pub seed_admins: Vec<SeedAdmin>,
}

impl ServerConfig {
    /// Read the configuration, falling back to defaults for anything unset.
    ///
    /// - `ONBOARD_DB_URL`, `ONBOARD_DB_NAMESPACE`, `ONBOARD_DB_DATABASE`,
    ///   `ONBOARD_DB_USER`, `ONBOARD_DB_PASSWORD`
    /// - `ONBOARD_EMPLOYEE_ID_PREFIX`, `ONBOARD_PEPPER`,
    ///   `ONBOARD_MIN_PASSWORD_LENGTH`, `ONBOARD_RETRY_ATTEMPTS`
    /// - `ONBOARD_ADMIN_IDS`: comma-separated `principal_id:email` pairs
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut db = DbConfig::default();
        if let Some(url) = var("ONBOARD_DB_URL") {
            db.url = url;
        }
        if let Some(namespace) = var("ONBOARD_DB_NAMESPACE") {
            db.namespace = namespace;
        }
        if let Some(database) = var("ONBOARD_DB_DATABASE") {
            db.database = database;
        }
        if let Some(username) = var("ONBOARD_DB_USER") {
            db.username = username;
        }
        if let Some(password) = var("ONBOARD_DB_PASSWORD") {
            db.password = password;
        }

        let mut engine = EngineConfig::default();
        if let Some(prefix) = var("ONBOARD_EMPLOYEE_ID_PREFIX") {
            engine.employee_id_prefix = prefix.to_uppercase();
        }
        engine.pepper = var("ONBOARD_PEPPER");
        if let Some(min) = var("ONBOARD_MIN_PASSWORD_LENGTH") {
            engine.min_password_length = min.parse().map_err(|e| ConfigError::Invalid {
                name: "ONBOARD_MIN_PASSWORD_LENGTH",
                reason: format!("{e}"),
            })?;
        }
        if let Some(attempts) = var("ONBOARD_RETRY_ATTEMPTS") {
            engine.retry.max_attempts = attempts.parse().map_err(|e| ConfigError::Invalid {
                name: "ONBOARD_RETRY_ATTEMPTS",
                reason: format!("{e}"),
            })?;
        }

        let seed_admins = match var("ONBOARD_ADMIN_IDS") {
            Some(list) => parse_admins(&list)?,
            None => Vec::new(),
        };

        Ok(Self {
            db,
            engine,
            seed_admins,
        })
    }
}

fn parse_admins(list: &str) -> Result<Vec<SeedAdmin>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (principal_id, email) = item.split_once(':').unwrap_or((item, ""));
            if principal_id.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    name: "ONBOARD_ADMIN_IDS",
                    reason: format!("missing principal id in {item:?}"),
                });
            }
            Ok(SeedAdmin {
                principal_id: principal_id.trim().to_string(),
                email: email.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.db.namespace, "onboard");
        assert_eq!(config.engine.employee_id_prefix, "SP");
        assert!(config.engine.pepper.is_none());
        assert!(config.seed_admins.is_empty());
    }

    #[test]
    fn overrides_and_admins_are_read() {
        let config = config(&[
            ("ONBOARD_DB_URL", "db:8000"),
            ("ONBOARD_EMPLOYEE_ID_PREFIX", "emp"),
            ("ONBOARD_PEPPER", "  "),
            ("ONBOARD_RETRY_ATTEMPTS", "9"),
            ("ONBOARD_ADMIN_IDS", "uid-1:hr@example.com, uid-2 ,"),
        ])
        .unwrap();
        assert_eq!(config.db.url, "db:8000");
        assert_eq!(config.engine.employee_id_prefix, "EMP");
        assert!(config.engine.pepper.is_none());
        assert_eq!(config.engine.retry.max_attempts, 9);
        assert_eq!(
            config.seed_admins,
            vec![
                SeedAdmin {
                    principal_id: "uid-1".into(),
                    email: "hr@example.com".into(),
                },
                SeedAdmin {
                    principal_id: "uid-2".into(),
                    email: String::new(),
                },
            ]
        );
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(config(&[("ONBOARD_RETRY_ATTEMPTS", "many")]).is_err());
        assert!(config(&[("ONBOARD_ADMIN_IDS", ":hr@example.com")]).is_err());
    }
}
