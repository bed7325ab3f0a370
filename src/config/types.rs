//! Raw config types matching the gateway config file and per-table config files.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Directory searched for table config files when the config file does not name one.
pub const DEFAULT_TABLE_CONFIG_PATH: &str = "tables";

/// Returned by column type lookups for columns with no declared or discovered type.
pub const UNKNOWN_COLUMN_TYPE: &str = "unknown";

/// Top-level gateway configuration after compiled defaults and the user file are merged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub default_datasource: Option<String>,
    /// Datasource entries in declaration order (serde_json is built with `preserve_order`).
    #[serde(default)]
    pub datasources: Map<String, Value>,
    #[serde(default = "default_table_config_path")]
    pub table_config_path: String,
    #[serde(default)]
    pub log: bool,
}

fn default_table_config_path() -> String {
    DEFAULT_TABLE_CONFIG_PATH.to_string()
}

impl GatewayConfig {
    /// Compiled defaults, as a document the user config is merged onto.
    pub fn defaults_json() -> Value {
        serde_json::json!({
            "datasources": {},
            "table_config_path": DEFAULT_TABLE_CONFIG_PATH,
            "log": false
        })
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(|e| ConfigError::Load(e.to_string()))
    }

    pub fn datasource_names(&self) -> impl Iterator<Item = &str> {
        self.datasources.keys().map(String::as_str)
    }

    /// Explicit `default_datasource`, else the first declared datasource.
    pub fn resolve_default_database(&self) -> Result<String, ConfigError> {
        match self.default_datasource.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => self
                .datasources
                .keys()
                .next()
                .cloned()
                .ok_or(ConfigError::NoDatasource),
        }
    }
}

/// Properties recognized on a datasource entry once the `type` tag is stripped.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DatasourceProperties {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub min_connections: Option<u32>,
    #[serde(default)]
    pub acquire_timeout_secs: Option<u64>,
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Anything else; logged and ignored by the pool constructors.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One datasource entry: pool type tag plus constructor properties.
#[derive(Clone, Debug)]
pub struct DatasourceConfig {
    pub pool_type: Option<String>,
    pub properties: DatasourceProperties,
    /// Entry as declared, minus `type`.
    pub raw: Map<String, Value>,
}

impl DatasourceConfig {
    pub fn from_entry(name: &str, entry: &Value) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidDatasource {
            name: name.to_string(),
            reason,
        };
        let mut raw = entry
            .as_object()
            .cloned()
            .ok_or_else(|| invalid("datasource entry must be a JSON object".into()))?;
        let pool_type = match raw.remove("type") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(_) => return Err(invalid("'type' must be a string".into())),
        };
        let properties: DatasourceProperties =
            serde_json::from_value(Value::Object(raw.clone())).map_err(|e| invalid(e.to_string()))?;
        Ok(DatasourceConfig {
            pool_type,
            properties,
            raw,
        })
    }
}

/// Relationship direction declared on a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    #[serde(alias = "one-to-one", alias = "ONE_TO_ONE", alias = "oneToOne")]
    OneToOne,
    #[serde(alias = "one-to-many", alias = "ONE_TO_MANY", alias = "oneToMany")]
    OneToMany,
    #[serde(alias = "many-to-one", alias = "MANY_TO_ONE", alias = "manyToOne")]
    ManyToOne,
}

impl AssociationKind {
    /// The same relationship seen from the other table.
    pub fn inverse(self) -> Self {
        match self {
            AssociationKind::OneToMany => AssociationKind::ManyToOne,
            AssociationKind::ManyToOne => AssociationKind::OneToMany,
            AssociationKind::OneToOne => AssociationKind::OneToOne,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssociationConfig {
    #[serde(alias = "target_table")]
    pub target: String,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<AssociationKind>,
}

impl AssociationConfig {
    pub fn kind_or_default(&self) -> AssociationKind {
        self.kind.unwrap_or(AssociationKind::OneToOne)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<AssociationConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Overrides the file base name as the table name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Table configs of one database, keyed by table name.
pub type DbTableConfig = BTreeMap<String, TableConfig>;
