//! Load the gateway config file and the per-table config directory.

use crate::config::types::{DbTableConfig, GatewayConfig, TableConfig};
use crate::config::merge::deep_merge;
use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Config file read when the caller does not name one.
pub const DEFAULT_CONFIG_FILE: &str = "datagate.json";

/// Env var overriding [`DEFAULT_CONFIG_FILE`].
pub const CONFIG_FILE_ENV: &str = "DATAGATE_CONFIG";

pub fn default_config_file() -> PathBuf {
    std::env::var(CONFIG_FILE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

async fn read_json_file(path: &Path) -> Result<Option<Value>, ConfigError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::Load(format!("{}: {}", path.display(), e))),
    };
    let value = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(Some(value))
}

/// Read the user config document. A file requested by name must exist and parse; the
/// default-named file may be absent, in which case an empty document is returned.
pub async fn load_user_config(requested: Option<&Path>) -> Result<Value, ConfigError> {
    match requested {
        Some(path) => {
            let value = read_json_file(path)
                .await?
                .ok_or_else(|| ConfigError::MissingFile(path.to_path_buf()))?;
            if !value.is_object() {
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    message: "config root must be a JSON object".into(),
                });
            }
            tracing::info!(path = %path.display(), "loaded config file");
            Ok(value)
        }
        None => {
            let path = default_config_file();
            match read_json_file(&path).await? {
                Some(value) if value.is_object() => {
                    tracing::info!(path = %path.display(), "loaded default config file");
                    Ok(value)
                }
                Some(_) => Err(ConfigError::Parse {
                    path,
                    message: "config root must be a JSON object".into(),
                }),
                None => {
                    tracing::info!(path = %path.display(), "no config file, using compiled defaults");
                    Ok(Value::Object(Map::new()))
                }
            }
        }
    }
}

/// Merge a user config document onto the compiled defaults.
pub fn merge_with_defaults(user: Value) -> Result<GatewayConfig, ConfigError> {
    let mut merged = GatewayConfig::defaults_json();
    deep_merge(&mut merged, user);
    GatewayConfig::from_value(merged)
}

/// Compiled defaults plus the user config file.
pub async fn load_config(requested: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let user = load_user_config(requested).await?;
    merge_with_defaults(user)
}

/// Read table configs from `root`, walking exactly two levels:
/// `<root>/<table>.json` belongs to `default_db`, `<root>/<db>/<table>.json` to `<db>` when
/// `<db>` is a declared datasource. Everything else is ignored. For the default database,
/// datasource-level entries are merged over root-level ones.
pub async fn load_table_configs(
    root: &Path,
    databases: &[String],
    default_db: &str,
) -> Result<BTreeMap<String, DbTableConfig>, ConfigError> {
    let mut out = BTreeMap::new();
    let root_entries = match list_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %root.display(), "no table config directory");
            return Ok(out);
        }
        Err(e) => return Err(ConfigError::Load(format!("{}: {}", root.display(), e))),
    };

    let mut root_tables = Map::new();
    let mut db_tables: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for (path, is_dir) in root_entries {
        if is_dir {
            let Some(db) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            if !databases.contains(&db) {
                tracing::debug!(path = %path.display(), "skipping directory: not a datasource");
                continue;
            }
            let entries = list_dir(&path)
                .await
                .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
            let tables = db_tables.entry(db).or_default();
            for (file, is_dir) in entries {
                if !is_dir {
                    read_table_file(&file, tables).await;
                }
            }
        } else {
            read_table_file(&path, &mut root_tables).await;
        }
    }

    if !root_tables.is_empty() {
        let mut merged = Value::Object(root_tables);
        if let Some(own) = db_tables.remove(default_db) {
            deep_merge(&mut merged, Value::Object(own));
        }
        if let Value::Object(map) = merged {
            db_tables.insert(default_db.to_string(), map);
        }
    }

    for (db, tables) in db_tables {
        let mut typed = DbTableConfig::new();
        for (name, value) in tables {
            match serde_json::from_value::<TableConfig>(value) {
                Ok(table) => {
                    typed.insert(name, table);
                }
                Err(e) => tracing::warn!(db = %db, table = %name, error = %e, "skipping invalid table config"),
            }
        }
        out.insert(db, typed);
    }
    Ok(out)
}

/// Directory entries sorted by path, tagged with whether each is a directory.
async fn list_dir(dir: &Path) -> std::io::Result<Vec<(PathBuf, bool)>> {
    let mut read = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = read.next_entry().await? {
        let is_dir = entry.file_type().await?.is_dir();
        entries.push((entry.path(), is_dir));
    }
    entries.sort();
    Ok(entries)
}

/// Parse one table file into `tables`, keyed by its `table` override or file stem.
/// Unreadable or malformed files are logged and skipped.
async fn read_table_file(path: &Path, tables: &mut Map<String, Value>) {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return;
    }
    let value = match read_json_file(path).await {
        Ok(Some(value @ Value::Object(_))) => value,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "skipping table config: not a JSON object");
            return;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping table config");
            return;
        }
    };
    let name = value
        .get("table")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(str::to_string));
    if let Some(name) = name {
        tables.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::DEFAULT_TABLE_CONFIG_PATH;
    use serde_json::json;

    fn write(path: &Path, value: Value) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn requested_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("nope.json"))).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }

    #[tokio::test]
    async fn requested_malformed_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_config(Some(&path)).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[tokio::test]
    async fn user_config_merges_onto_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gw.json");
        write(&path, json!({ "log": true, "datasources": { "db1": { "url": "postgres://h/db1" } } }));
        let config = load_config(Some(&path)).await.unwrap();
        assert!(config.log);
        assert_eq!(config.table_config_path, "tables");
        assert_eq!(config.datasource_names().collect::<Vec<_>>(), vec!["db1"]);
    }

    // Both cases share one test since they mutate the process environment.
    #[tokio::test]
    async fn default_named_file_follows_env_override() {
        let dir = tempfile::tempdir().unwrap();

        let absent = dir.path().join("absent.json");
        std::env::set_var(CONFIG_FILE_ENV, &absent);
        assert_eq!(default_config_file(), absent);
        let user = load_user_config(None).await.unwrap();
        assert_eq!(user, json!({}));
        let config = load_config(None).await.unwrap();
        assert_eq!(config.table_config_path, DEFAULT_TABLE_CONFIG_PATH);
        assert!(!config.log);
        assert_eq!(config.datasource_names().count(), 0);

        let present = dir.path().join("env.json");
        write(&present, json!({ "default_datasource": "db2", "datasources": { "db2": { "url": "mysql://h/db2" } } }));
        std::env::set_var(CONFIG_FILE_ENV, &present);
        let config = load_config(None).await.unwrap();
        std::env::remove_var(CONFIG_FILE_ENV);
        assert_eq!(config.default_datasource.as_deref(), Some("db2"));
        assert_eq!(config.datasource_names().collect::<Vec<_>>(), vec!["db2"]);
        assert_eq!(config.table_config_path, DEFAULT_TABLE_CONFIG_PATH);
    }

    #[tokio::test]
    async fn two_level_layout_assigns_tables_to_databases() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("users.json"), json!({ "comment": "root users", "columns": { "id": { "type": "int" } } }));
        write(&root.join("renamed.json"), json!({ "table": "accounts" }));
        write(&root.join("db2/orders.json"), json!({ "comment": "db2 orders" }));
        write(&root.join("unknown/ignored.json"), json!({}));
        write(&root.join("db2/deep/too_deep.json"), json!({}));
        std::fs::write(root.join("notes.txt"), "ignored").unwrap();

        let dbs = vec!["db1".to_string(), "db2".to_string()];
        let tables = load_table_configs(root, &dbs, "db1").await.unwrap();

        assert_eq!(tables["db1"].keys().collect::<Vec<_>>(), vec!["accounts", "users"]);
        assert_eq!(tables["db2"].keys().collect::<Vec<_>>(), vec!["orders"]);
        assert!(!tables.contains_key("unknown"));
        assert_eq!(tables["db1"]["users"].comment.as_deref(), Some("root users"));
    }

    #[tokio::test]
    async fn datasource_level_files_take_precedence_for_default_db() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("users.json"),
            json!({ "comment": "root", "columns": { "id": { "type": "int", "comment": "pk" } } }),
        );
        write(&root.join("audit.json"), json!({ "comment": "root only" }));
        write(
            &root.join("db1/users.json"),
            json!({ "comment": "datasource", "columns": { "id": { "comment": "identifier" } } }),
        );

        let dbs = vec!["db1".to_string()];
        let tables = load_table_configs(root, &dbs, "db1").await.unwrap();
        let users = &tables["db1"]["users"];
        assert_eq!(users.comment.as_deref(), Some("datasource"));
        assert_eq!(users.columns["id"].comment.as_deref(), Some("identifier"));
        assert_eq!(users.columns["id"].type_.as_deref(), Some("int"));
        assert_eq!(tables["db1"]["audit"].comment.as_deref(), Some("root only"));
    }

    #[tokio::test]
    async fn missing_root_yields_no_tables() {
        let dir = tempfile::tempdir().unwrap();
        let tables = load_table_configs(&dir.path().join("absent"), &[], "db1").await.unwrap();
        assert!(tables.is_empty());
    }
}
