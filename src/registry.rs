//! Config registry: merged configuration, datasource bindings, table lookups and
//! association inference. Built once at bootstrap, then shared read-only.

use crate::config::{validate, AssociationKind, ColumnConfig, DbTableConfig, GatewayConfig, TableConfig, UNKNOWN_COLUMN_TYPE};
use crate::context;
use crate::datasource::Binding;
use crate::dialect::Dialect;
use crate::error::{AppError, ConfigError};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
pub struct ConfigRegistry {
    config: GatewayConfig,
    default_db: String,
    /// Declaration order.
    bindings: Vec<Binding>,
    binding_index: HashMap<String, usize>,
    tables: BTreeMap<String, DbTableConfig>,
    empty_db: DbTableConfig,
    empty_table: TableConfig,
}

impl ConfigRegistry {
    pub fn builder(config: GatewayConfig) -> RegistryBuilder {
        RegistryBuilder::new(config)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Explicit default datasource, else the first bound datasource in declaration order.
    pub fn default_database(&self) -> &str {
        &self.default_db
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn binding(&self, db: &str) -> Option<&Binding> {
        self.binding_index.get(db).map(|&i| &self.bindings[i])
    }

    pub fn database_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    pub fn dialect_of(&self, db: &str) -> Option<Dialect> {
        self.binding(db).map(|b| b.dialect)
    }

    pub fn is_search_engine(&self, db: &str) -> bool {
        self.dialect_of(db).map(|d| d.is_search_engine()).unwrap_or(false)
    }

    /// Whether the current request's database is a search engine; false outside a scope.
    pub fn is_search_engine_current(&self) -> bool {
        context::current_database()
            .map(|db| self.is_search_engine(&db))
            .unwrap_or(false)
    }

    /// First database bound to a search-engine dialect, if any.
    pub fn search_engine_database(&self) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.dialect.is_search_engine())
            .map(|b| b.name.as_str())
    }

    /// All table configs, keyed by database.
    pub fn dbs_config(&self) -> &BTreeMap<String, DbTableConfig> {
        &self.tables
    }

    /// Table configs of `db`; empty for unknown databases.
    pub fn db_config(&self, db: &str) -> &DbTableConfig {
        self.tables.get(db).unwrap_or(&self.empty_db)
    }

    /// Config of `db.table`; empty for unknown tables.
    pub fn table_config(&self, db: &str, table: &str) -> &TableConfig {
        self.db_config(db).get(table).unwrap_or(&self.empty_table)
    }

    pub fn columns_config(&self, db: &str, table: &str) -> &BTreeMap<String, ColumnConfig> {
        &self.table_config(db, table).columns
    }

    /// Declared (or discovered) column type, else [`UNKNOWN_COLUMN_TYPE`].
    pub fn column_type(&self, db: &str, table: &str, column: &str) -> &str {
        self.columns_config(db, table)
            .get(column)
            .and_then(|c| c.type_.as_deref())
            .unwrap_or(UNKNOWN_COLUMN_TYPE)
    }

    /// Relationship of `table_a` to `table_b`. A declaration on `table_a` wins; otherwise a
    /// declaration on `table_b` pointing back is inverted. `None` means no association.
    pub fn resolve_association(&self, db: &str, table_a: &str, table_b: &str) -> Option<AssociationKind> {
        if let Some(kind) = declared_association(self.columns_config(db, table_a), table_b) {
            return Some(kind);
        }
        declared_association(self.columns_config(db, table_b), table_a).map(AssociationKind::inverse)
    }

    /// [`Self::resolve_association`] within the current request's database.
    pub fn resolve_association_current(&self, table_a: &str, table_b: &str) -> Option<AssociationKind> {
        let db = context::current_database()?;
        self.resolve_association(&db, table_a, table_b)
    }

    /// Fails with `UnknownTarget` when `db` or `table` is undeclared. Search-engine
    /// databases are accepted without checking the table.
    pub fn validate_target(&self, db: &str, table: &str) -> Result<(), AppError> {
        if db.is_empty() || table.is_empty() {
            return Err(AppError::UnknownTarget(format!("'{}.{}'", db, table)));
        }
        let binding = self
            .binding(db)
            .ok_or_else(|| AppError::UnknownTarget(format!("datasource '{}' does not exist", db)))?;
        if binding.dialect.is_search_engine() {
            return Ok(());
        }
        if !self.db_config(db).contains_key(table) {
            return Err(AppError::UnknownTarget(format!("table '{}' does not exist in '{}'", table, db)));
        }
        Ok(())
    }
}

/// Columns are scanned in name order, so when several target the same table the
/// alphabetically first column decides.
fn declared_association(columns: &BTreeMap<String, ColumnConfig>, target: &str) -> Option<AssociationKind> {
    columns
        .values()
        .filter_map(|c| c.association.as_ref())
        .find(|a| a.target == target)
        .map(|a| a.kind_or_default())
}

/// Accumulates bindings and table config during bootstrap.
pub struct RegistryBuilder {
    config: GatewayConfig,
    default_db: Option<String>,
    bindings: Vec<Binding>,
    tables: BTreeMap<String, DbTableConfig>,
}

impl RegistryBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        RegistryBuilder {
            config,
            default_db: None,
            bindings: Vec::new(),
            tables: BTreeMap::new(),
        }
    }

    /// Override the default database (used when bindings come from caller-supplied handles).
    pub fn default_database(mut self, db: impl Into<String>) -> Self {
        self.default_db = Some(db.into());
        self
    }

    pub fn binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn tables(mut self, db: impl Into<String>, tables: DbTableConfig) -> Self {
        self.tables.insert(db.into(), tables);
        self
    }

    pub fn all_tables(mut self, tables: BTreeMap<String, DbTableConfig>) -> Self {
        self.tables = tables;
        self
    }

    pub fn build(self) -> Result<ConfigRegistry, ConfigError> {
        if self.bindings.is_empty() {
            return Err(ConfigError::NoDatasource);
        }
        let mut binding_index = HashMap::with_capacity(self.bindings.len());
        for (i, b) in self.bindings.iter().enumerate() {
            if binding_index.insert(b.name.clone(), i).is_some() {
                return Err(ConfigError::Validation(format!("datasource '{}' bound twice", b.name)));
            }
        }
        let default_db = match self.default_db {
            Some(db) => db,
            None => match self.config.resolve_default_database() {
                Ok(db) => db,
                Err(_) => self.bindings[0].name.clone(),
            },
        };
        if !binding_index.contains_key(&default_db) {
            return Err(ConfigError::Validation(format!(
                "default datasource '{}' is not declared",
                default_db
            )));
        }
        validate(&self.tables)?;
        Ok(ConfigRegistry {
            config: self.config,
            default_db,
            bindings: self.bindings,
            binding_index,
            tables: self.tables,
            empty_db: DbTableConfig::new(),
            empty_table: TableConfig::default(),
        })
    }
}
