//! Binding configuration
//!
//! Configuration arrives as YCSB-style `key=value` properties, either from
//! the workload harness or from `DINGO_*` environment variables.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    BindingResult, ConfigError, COORDINATOR_HOST_PROPERTY, DEFAULT_FIELD_COUNT, DEFAULT_TABLE,
    FIELD_COUNT_PROPERTY, LMDB_MAP_SIZE_PROPERTY, MAX_FIELD_COUNT, PASSWORD_PROPERTY,
    TABLE_COMMAND_PROPERTY, TABLE_PROPERTY, USER_PROPERTY,
};

/// Default LMDB map size in megabytes.
pub const DEFAULT_LMDB_MAP_SIZE_MB: usize = 64;

/// Largest accepted LMDB map size in megabytes (1 TiB).
pub const MAX_LMDB_MAP_SIZE_MB: usize = 1 << 20;

/// Check a requested field count and convert it to a column count.
pub(crate) fn checked_field_count(field_count: i64) -> Result<usize, ConfigError> {
    match usize::try_from(field_count) {
        Ok(count) if field_count <= MAX_FIELD_COUNT => Ok(count),
        _ => Err(ConfigError::InvalidValue {
            field: FIELD_COUNT_PROPERTY.to_string(),
            value: field_count.to_string(),
            reason: format!("must be an integer between 0 and {}", MAX_FIELD_COUNT),
        }),
    }
}

/// Environment variable -> property name.
const ENV_PROPERTIES: &[(&str, &str)] = &[
    ("DINGO_COORDINATOR_HOST", COORDINATOR_HOST_PROPERTY),
    ("DINGO_TABLE", TABLE_PROPERTY),
    ("DINGO_FIELD_COUNT", FIELD_COUNT_PROPERTY),
    ("DINGO_USER", USER_PROPERTY),
    ("DINGO_PASSWORD", PASSWORD_PROPERTY),
    ("DINGO_TABLE_COMMAND", TABLE_COMMAND_PROPERTY),
    ("DINGO_LMDB_MAP_SIZE_MB", LMDB_MAP_SIZE_PROPERTY),
];

/// Administrative table command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableCommand {
    #[default]
    Create,
    Drop,
}

impl FromStr for TableCommand {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "create" => Ok(TableCommand::Create),
            "drop" => Ok(TableCommand::Drop),
            _ => Err(ConfigError::InvalidValue {
                field: TABLE_COMMAND_PROPERTY.to_string(),
                value: s.to_string(),
                reason: "expected create or drop".to_string(),
            }),
        }
    }
}

impl fmt::Display for TableCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableCommand::Create => write!(f, "create"),
            TableCommand::Drop => write!(f, "drop"),
        }
    }
}

/// Storage client credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration shared by the binding and the table command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Coordinator endpoint; the scheme picks the storage client.
    pub coordinator_host: String,
    pub table: String,
    /// Signed so that a negative value can be reported instead of clamped.
    pub field_count: i64,
    pub credentials: Option<Credentials>,
    pub command: TableCommand,
    pub lmdb_map_size_mb: usize,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            coordinator_host: String::new(),
            table: DEFAULT_TABLE.to_string(),
            field_count: DEFAULT_FIELD_COUNT,
            credentials: None,
            command: TableCommand::Create,
            lmdb_map_size_mb: DEFAULT_LMDB_MAP_SIZE_MB,
        }
    }
}

impl BindingConfig {
    /// Default configuration pointed at an endpoint.
    pub fn new(coordinator_host: impl Into<String>) -> Self {
        Self {
            coordinator_host: coordinator_host.into(),
            ..Default::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_field_count(mut self, field_count: i64) -> Self {
        self.field_count = field_count;
        self
    }

    pub fn with_lmdb_map_size_mb(mut self, map_size_mb: usize) -> Self {
        self.lmdb_map_size_mb = map_size_mb;
        self
    }

    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    /// Parse recognized properties; unknown keys are ignored.
    ///
    /// Properties:
    /// - `coordinator.host`: endpoint (`mem://name` or `lmdb:///path`)
    /// - `dingo.table`: table name (default: usertable)
    /// - `fieldcount`: number of value columns (default: 10)
    /// - `dingo.user` / `dingo.password`: optional credentials
    /// - `command`: create or drop (default: create)
    /// - `lmdb.map_size_mb`: LMDB map size (default: 64)
    pub fn from_properties(props: &HashMap<String, String>) -> BindingResult<Self> {
        let mut config = Self::default();

        if let Some(host) = props.get(COORDINATOR_HOST_PROPERTY) {
            config.coordinator_host = host.trim().to_string();
        }
        if let Some(table) = props.get(TABLE_PROPERTY) {
            config.table = table.trim().to_string();
        }
        if let Some(raw) = props.get(FIELD_COUNT_PROPERTY) {
            config.field_count = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: FIELD_COUNT_PROPERTY.to_string(),
                value: raw.clone(),
                reason: "must be an integer".to_string(),
            })?;
        }
        if let Some(user) = props.get(USER_PROPERTY).filter(|u| !u.is_empty()) {
            config.credentials = Some(Credentials {
                user: user.clone(),
                password: props.get(PASSWORD_PROPERTY).cloned().unwrap_or_default(),
            });
        }
        if let Some(raw) = props.get(TABLE_COMMAND_PROPERTY) {
            config.command = raw.parse()?;
        }
        if let Some(raw) = props.get(LMDB_MAP_SIZE_PROPERTY) {
            config.lmdb_map_size_mb =
                raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: LMDB_MAP_SIZE_PROPERTY.to_string(),
                    value: raw.clone(),
                    reason: "must be a positive integer".to_string(),
                })?;
        }

        Ok(config)
    }

    /// Build configuration from `DINGO_*` environment variables.
    ///
    /// Environment variables:
    /// - `DINGO_COORDINATOR_HOST`
    /// - `DINGO_TABLE` (default: usertable)
    /// - `DINGO_FIELD_COUNT` (default: 10)
    /// - `DINGO_USER`, `DINGO_PASSWORD`
    /// - `DINGO_TABLE_COMMAND` (default: create)
    /// - `DINGO_LMDB_MAP_SIZE_MB` (default: 64)
    pub fn from_env() -> BindingResult<Self> {
        let props: HashMap<String, String> = ENV_PROPERTIES
            .iter()
            .filter_map(|(var, prop)| std::env::var(var).ok().map(|v| (prop.to_string(), v)))
            .collect();
        Self::from_properties(&props)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - coordinator host is present
    /// - table name is non-empty
    /// - field count in `0..=MAX_FIELD_COUNT`
    /// - LMDB map size in `1..=MAX_LMDB_MAP_SIZE_MB`
    pub fn validate(&self) -> BindingResult<()> {
        if self.coordinator_host.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: COORDINATOR_HOST_PROPERTY.to_string(),
            }
            .into());
        }
        if self.table.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: TABLE_PROPERTY.to_string(),
            }
            .into());
        }
        checked_field_count(self.field_count)?;
        if !(1..=MAX_LMDB_MAP_SIZE_MB).contains(&self.lmdb_map_size_mb) {
            return Err(ConfigError::InvalidValue {
                field: LMDB_MAP_SIZE_PROPERTY.to_string(),
                value: self.lmdb_map_size_mb.to_string(),
                reason: format!("must be between 1 and {}", MAX_LMDB_MAP_SIZE_MB),
            }
            .into());
        }
        Ok(())
    }
}
