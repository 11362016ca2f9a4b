// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Settings are read once at startup: an optional JSON document (see
//! [`AuthSettings`]) then environment overrides.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_AUTH_CONFIG` | JSON settings file | Optional |
//! | `PRINCIPALS_FILE` | JSON principal records per provider | Optional |
//! | `JWT_SECRET` | Shared secret for HMAC algorithms | None |
//! | `JWT_PUBLIC_KEY` | Path to the PEM verification key | None |
//! | `JWT_PRIVATE_KEY` | Path to the PEM signing key | None |
//! | `JWT_TTL_CREATE` | Lifetime of issued tokens (seconds, `0` = no `exp`) | `60` |
//! | `JWT_TTL_REFRESH` | Lifetime of refreshed tokens (seconds) | `60` |
//! | `JWT_ALGORITHM` | Signing algorithm | `HS256` |
//! | `JWT_LEEWAY` | Clock skew tolerance (seconds) | `0` |
//! | `JWT_BLACKLIST_ENABLED` | Accepted, not enforced | `true` |
//! | `JWT_BLACKLIST_GRACE_PERIOD` | Accepted, not enforced | `0` |
//! | `JWT_SHOW_ERROR_REASON` | Expose failure reasons in 401 bodies | `false` |
//! | `JWT_ISSUER` | `iss` of tokens issued by the login endpoint | `Relational JWT Guard` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use jsonwebtoken::Algorithm;
use serde::Deserialize;

use crate::auth::{JwtConfig, PrincipalRecord};

/// Environment variable name for the server bind address.
pub const HOST_ENV: &str = "HOST";

/// Environment variable name for the server bind port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the JSON settings file.
pub const JWT_AUTH_CONFIG_ENV: &str = "JWT_AUTH_CONFIG";

/// Environment variable name for the principal records file.
///
/// The file maps provider names to lists of `{ "id", "attributes" }` records.
pub const PRINCIPALS_FILE_ENV: &str = "PRINCIPALS_FILE";

pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_PUBLIC_KEY_ENV: &str = "JWT_PUBLIC_KEY";
pub const JWT_PRIVATE_KEY_ENV: &str = "JWT_PRIVATE_KEY";
pub const JWT_TTL_CREATE_ENV: &str = "JWT_TTL_CREATE";
pub const JWT_TTL_REFRESH_ENV: &str = "JWT_TTL_REFRESH";
pub const JWT_ALGORITHM_ENV: &str = "JWT_ALGORITHM";
pub const JWT_LEEWAY_ENV: &str = "JWT_LEEWAY";
pub const JWT_BLACKLIST_ENABLED_ENV: &str = "JWT_BLACKLIST_ENABLED";
pub const JWT_BLACKLIST_GRACE_PERIOD_ENV: &str = "JWT_BLACKLIST_GRACE_PERIOD";
pub const JWT_SHOW_ERROR_REASON_ENV: &str = "JWT_SHOW_ERROR_REASON";
pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";

/// Environment variable name for the log output format (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ISSUER: &str = "Relational JWT Guard";

/// Guard id and provider name used when no guards are configured.
pub const DEFAULT_GUARD: &str = "jwt_users";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Behaviour of the HTTP guard boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GuardSettings {
    pub show_error_reason: bool,
}

/// One configured guard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GuardDefinition {
    /// Name of the principal provider backing the guard
    pub provider: String,
}

/// Complete authentication settings.
///
/// ```json
/// {
///   "guard": { "show_error_reason": false },
///   "jwt": { "secret": "...", "algorithm": "HS256", "aud_config_override": {} },
///   "guards": { "jwt_users": { "provider": "users" } },
///   "issuer": "Relational JWT Guard"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub guard: GuardSettings,
    pub jwt: JwtConfig,
    pub guards: BTreeMap<String, GuardDefinition>,
    pub issuer: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            guard: GuardSettings::default(),
            jwt: JwtConfig::default(),
            guards: BTreeMap::from([(
                DEFAULT_GUARD.to_string(),
                GuardDefinition {
                    provider: DEFAULT_GUARD.to_string(),
                },
            )]),
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }
}

impl AuthSettings {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` for environment values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = match lookup(JWT_AUTH_CONFIG_ENV).filter(|path| !path.is_empty()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(&lookup)?;
        Ok(settings)
    }

    /// Parse a JSON settings file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_overrides(
        &mut self,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let jwt = &mut self.jwt;

        if let Some(secret) = lookup(JWT_SECRET_ENV) {
            jwt.secret = Some(secret).filter(|s| !s.is_empty());
        }
        if let Some(path) = lookup(JWT_PUBLIC_KEY_ENV) {
            jwt.keys.public = Some(PathBuf::from(path)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(path) = lookup(JWT_PRIVATE_KEY_ENV) {
            jwt.keys.private = Some(PathBuf::from(path)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(ttl) = parse_var(lookup, JWT_TTL_CREATE_ENV)? {
            jwt.ttl.on_create = ttl;
        }
        if let Some(ttl) = parse_var(lookup, JWT_TTL_REFRESH_ENV)? {
            jwt.ttl.on_refresh = ttl;
        }
        if let Some(algorithm) = parse_var::<Algorithm>(lookup, JWT_ALGORITHM_ENV)? {
            jwt.algorithm = algorithm;
        }
        if let Some(leeway) = parse_var(lookup, JWT_LEEWAY_ENV)? {
            jwt.leeway = leeway;
        }
        if let Some(enabled) = parse_flag(lookup, JWT_BLACKLIST_ENABLED_ENV)? {
            jwt.blacklist_enabled = enabled;
        }
        if let Some(grace) = parse_var(lookup, JWT_BLACKLIST_GRACE_PERIOD_ENV)? {
            jwt.blacklist_grace_period = grace;
        }
        if let Some(show) = parse_flag(lookup, JWT_SHOW_ERROR_REASON_ENV)? {
            self.guard.show_error_reason = show;
        }
        if let Some(issuer) = lookup(JWT_ISSUER_ENV).filter(|s| !s.is_empty()) {
            self.issuer = issuer;
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<bool>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue { var, value }),
        },
    }
}

/// Principal records by provider name.
pub type PrincipalDirectory = BTreeMap<String, Vec<PrincipalRecord>>;

/// Read a principal records file.
pub fn load_principals(path: impl AsRef<Path>) -> Result<PrincipalDirectory, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    fn json_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_environment() {
        let settings = AuthSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.jwt, JwtConfig::default());
        assert_eq!(settings.issuer, DEFAULT_ISSUER);
        assert!(!settings.guard.show_error_reason);
        assert_eq!(settings.guards[DEFAULT_GUARD].provider, DEFAULT_GUARD);
    }

    #[test]
    fn environment_overrides_apply() {
        let settings = AuthSettings::from_lookup(lookup(&[
            (JWT_SECRET_ENV, "s3cr3t"),
            (JWT_PRIVATE_KEY_ENV, "/keys/private.pem"),
            (JWT_PUBLIC_KEY_ENV, ""),
            (JWT_TTL_CREATE_ENV, "120"),
            (JWT_TTL_REFRESH_ENV, "30"),
            (JWT_ALGORITHM_ENV, "RS384"),
            (JWT_LEEWAY_ENV, "5"),
            (JWT_BLACKLIST_ENABLED_ENV, "false"),
            (JWT_SHOW_ERROR_REASON_ENV, "1"),
            (JWT_ISSUER_ENV, "issuer.example"),
        ]))
        .unwrap();

        assert_eq!(settings.jwt.secret(), Some("s3cr3t"));
        assert_eq!(
            settings.jwt.keys.private,
            Some(PathBuf::from("/keys/private.pem"))
        );
        assert_eq!(settings.jwt.keys.public, None);
        assert_eq!(settings.jwt.ttl.on_create, 120);
        assert_eq!(settings.jwt.ttl.on_refresh, 30);
        assert_eq!(settings.jwt.algorithm, Algorithm::RS384);
        assert_eq!(settings.jwt.leeway, 5);
        assert!(!settings.jwt.blacklist_enabled);
        assert!(settings.guard.show_error_reason);
        assert_eq!(settings.issuer, "issuer.example");
    }

    #[test]
    fn invalid_values_are_reported() {
        let result = AuthSettings::from_lookup(lookup(&[(JWT_LEEWAY_ENV, "soon")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { var: JWT_LEEWAY_ENV, value }) if value == "soon"
        ));

        let result = AuthSettings::from_lookup(lookup(&[(JWT_ALGORITHM_ENV, "HS999")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let result = AuthSettings::from_lookup(lookup(&[(JWT_SHOW_ERROR_REASON_ENV, "maybe")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn settings_file_is_read_then_overridden() {
        let file = json_file(
            r#"{
                "guard": { "show_error_reason": true },
                "jwt": {
                    "secret": "from-file",
                    "ttl": { "on_create": 10 },
                    "aud_config_override": {
                        "mobile": { "ttl": { "on_create": 50, "on_refresh": 40 } }
                    }
                },
                "guards": {
                    "jwt_users": { "provider": "users" },
                    "jwt_admins": { "provider": "admins" }
                }
            }"#,
        );
        let path = file.path().to_str().unwrap();

        let settings = AuthSettings::from_lookup(lookup(&[
            (JWT_AUTH_CONFIG_ENV, path),
            (JWT_SECRET_ENV, "from-env"),
        ]))
        .unwrap();

        assert_eq!(settings.jwt.secret(), Some("from-env"));
        assert_eq!(settings.jwt.ttl.on_create, 10);
        assert_eq!(settings.jwt.ttl.on_refresh, 60);
        assert!(settings.jwt.audience_overrides.contains_key("mobile"));
        assert!(settings.guard.show_error_reason);
        assert_eq!(settings.issuer, DEFAULT_ISSUER);
        assert_eq!(
            settings.guards.keys().collect::<Vec<_>>(),
            vec!["jwt_admins", "jwt_users"]
        );
        assert_eq!(settings.guards["jwt_admins"].provider, "admins");
    }

    #[test]
    fn unreadable_settings_file_is_an_error() {
        let result = AuthSettings::from_file("/nonexistent/settings.json");
        assert!(matches!(result, Err(ConfigError::Read { .. })));

        let file = json_file("{ not json");
        assert!(matches!(
            AuthSettings::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn principals_file_groups_records_by_provider() {
        let file = json_file(
            r#"{
                "users": [ { "id": "Pepe", "attributes": { "username": "Pepe" } } ],
                "admins": [ { "id": "PepeAdmin" } ]
            }"#,
        );

        let principals = load_principals(file.path()).unwrap();
        assert_eq!(principals["users"][0].attributes["username"], "Pepe");
        assert_eq!(principals["admins"][0], PrincipalRecord::new("PepeAdmin"));
    }
}
