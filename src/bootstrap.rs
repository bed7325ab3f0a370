//! One-time startup: config merge, datasource binding, table-config loading and
//! live-schema reconciliation. Produces the registry every dispatch reads from.

use crate::config::{load_table_configs, load_user_config, merge_with_defaults, DbTableConfig};
use crate::datasource::{connect_datasource, Binding, DatasourceHandle};
use crate::error::ConfigError;
use crate::introspect::{reconcile, InformationSchemaIntrospector, SchemaIntrospector};
use crate::registry::ConfigRegistry;
use futures::future::try_join_all;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Binding name given to a caller-supplied handle.
pub const SUPPLIED_DATASOURCE_NAME: &str = "default";

pub struct Bootstrap {
    config_file: Option<PathBuf>,
    user_config: Option<Value>,
    handles: Vec<DatasourceHandle>,
    base_dir: Option<PathBuf>,
    introspector: Arc<dyn SchemaIntrospector>,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}

impl Bootstrap {
    pub fn new() -> Self {
        Bootstrap {
            config_file: None,
            user_config: None,
            handles: Vec::new(),
            base_dir: None,
            introspector: Arc::new(InformationSchemaIntrospector),
        }
    }

    /// Config file to read; it must exist. Without one the default-named file is optional.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// In-memory user config, used instead of any file.
    pub fn config_value(mut self, value: Value) -> Self {
        self.user_config = Some(value);
        self
    }

    /// Single datasource from a connection URL, bound as [`SUPPLIED_DATASOURCE_NAME`].
    /// Replaces any config file or value.
    pub fn url(mut self, url: impl Into<String>, username: Option<&str>, password: Option<&str>) -> Self {
        let mut entry = serde_json::Map::new();
        entry.insert("url".into(), Value::String(url.into()));
        if let Some(user) = username {
            entry.insert("username".into(), Value::String(user.to_string()));
        }
        if let Some(password) = password {
            entry.insert("password".into(), Value::String(password.to_string()));
        }
        self.user_config = Some(serde_json::json!({
            "default_datasource": SUPPLIED_DATASOURCE_NAME,
            "datasources": { SUPPLIED_DATASOURCE_NAME: entry }
        }));
        self
    }

    /// Ready-made handles. Only the first is bound (as [`SUPPLIED_DATASOURCE_NAME`]);
    /// configured datasources are then not built.
    pub fn handles(mut self, handles: Vec<DatasourceHandle>) -> Self {
        self.handles = handles;
        self
    }

    /// Directory a relative `table_config_path` is resolved against. Defaults to the
    /// config file's directory, else the working directory.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn introspector(mut self, introspector: Arc<dyn SchemaIntrospector>) -> Self {
        self.introspector = introspector;
        self
    }

    pub async fn run(self) -> Result<Arc<ConfigRegistry>, ConfigError> {
        let Bootstrap {
            config_file,
            user_config,
            handles,
            base_dir,
            introspector,
        } = self;

        let user = match user_config {
            Some(value) => value,
            None => load_user_config(config_file.as_deref()).await?,
        };
        let config = merge_with_defaults(user)?;

        let mut handles = handles.into_iter();
        let supplied = handles.next();
        let ignored = handles.count();
        if ignored > 0 {
            tracing::warn!(ignored, "only the first supplied datasource handle is bound");
        }
        let (bindings, default_db) = match supplied {
            Some(handle) => {
                let binding = Binding::from_handle(SUPPLIED_DATASOURCE_NAME, handle);
                tracing::info!(dialect = %binding.dialect, "using supplied datasource handle");
                (vec![binding], SUPPLIED_DATASOURCE_NAME.to_string())
            }
            None => {
                let default_db = config.resolve_default_database()?;
                let bindings = config
                    .datasources
                    .iter()
                    .map(|(name, entry)| connect_datasource(name, entry))
                    .collect::<Result<Vec<_>, _>>()?;
                (bindings, default_db)
            }
        };

        let mut databases: Vec<String> = config.datasource_names().map(str::to_string).collect();
        if !databases.contains(&default_db) {
            databases.push(default_db.clone());
        }
        let table_root = resolve_table_root(&config.table_config_path, base_dir, config_file.as_deref());
        let mut tables = load_table_configs(&table_root, &databases, &default_db).await?;

        // Independent per database; the first failure aborts startup.
        let introspector = introspector.as_ref();
        let discovered = try_join_all(
            bindings
                .iter()
                .filter(|b| b.dialect.is_relational())
                .map(|b| async move {
                    let rows = introspector.introspect(b).await?;
                    Ok::<_, ConfigError>((b.name.clone(), rows))
                }),
        )
        .await?;
        for (db, rows) in discovered {
            let count = rows.len();
            let db_tables = tables.entry(db.clone()).or_insert_with(DbTableConfig::new);
            reconcile(db_tables, rows);
            tracing::info!(db = %db, rows = count, tables = db_tables.len(), "schema reconciled");
        }

        let mut builder = ConfigRegistry::builder(config).default_database(default_db);
        for binding in bindings {
            builder = builder.binding(binding);
        }
        let registry = builder.all_tables(tables).build()?;
        tracing::info!(
            default_db = %registry.default_database(),
            datasources = registry.bindings().len(),
            "registry ready"
        );
        Ok(Arc::new(registry))
    }
}

/// A relative table-config path is resolved against `base_dir`, else the config file's
/// directory, else the working directory.
fn resolve_table_root(configured: &str, base_dir: Option<PathBuf>, config_file: Option<&Path>) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    base_dir
        .or_else(|| config_file.and_then(Path::parent).map(Path::to_path_buf))
        .unwrap_or_default()
        .join(path)
}
