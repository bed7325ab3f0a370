//! Live-schema introspection and reconciliation into table config.

use crate::config::{ColumnConfig, DbTableConfig, TableConfig};
use crate::datasource::{Binding, DatasourceHandle};
use crate::error::ConfigError;
use async_trait::async_trait;

/// One row of `information_schema.tables` left-joined with `information_schema.columns`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchemaRow {
    pub table_name: String,
    pub table_comment: Option<String>,
    pub column_name: Option<String>,
    pub data_type: Option<String>,
    pub column_comment: Option<String>,
}

type RawRow = (String, Option<String>, Option<String>, Option<String>, Option<String>);

impl From<RawRow> for SchemaRow {
    fn from((table_name, table_comment, column_name, data_type, column_comment): RawRow) -> Self {
        SchemaRow {
            table_name,
            table_comment: table_comment.filter(|c| !c.is_empty()),
            column_name,
            data_type,
            column_comment: column_comment.filter(|c| !c.is_empty()),
        }
    }
}

#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Tables and columns of the binding's current schema.
    async fn introspect(&self, binding: &Binding) -> Result<Vec<SchemaRow>, ConfigError>;
}

const PG_SCHEMA_SQL: &str = r#"
SELECT t.table_name::text,
       obj_description(format('%I.%I', t.table_schema, t.table_name)::regclass, 'pg_class'),
       c.column_name::text,
       c.data_type::text,
       col_description(format('%I.%I', t.table_schema, t.table_name)::regclass, c.ordinal_position::int)
FROM information_schema.tables t
LEFT JOIN information_schema.columns c
  ON c.table_schema = t.table_schema AND c.table_name = t.table_name
WHERE t.table_schema = current_schema() AND t.table_type = 'BASE TABLE'
ORDER BY t.table_name, c.ordinal_position
"#;

const MYSQL_SCHEMA_SQL: &str = r#"
SELECT CAST(t.table_name AS CHAR),
       CAST(t.table_comment AS CHAR),
       CAST(c.column_name AS CHAR),
       CAST(c.data_type AS CHAR),
       CAST(c.column_comment AS CHAR)
FROM information_schema.tables t
LEFT JOIN information_schema.columns c
  ON c.table_schema = t.table_schema AND c.table_name = t.table_name
WHERE t.table_schema = DATABASE() AND t.table_type = 'BASE TABLE'
ORDER BY t.table_name, c.ordinal_position
"#;

/// Reads `information_schema` through the binding's sqlx pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct InformationSchemaIntrospector;

#[async_trait]
impl SchemaIntrospector for InformationSchemaIntrospector {
    async fn introspect(&self, binding: &Binding) -> Result<Vec<SchemaRow>, ConfigError> {
        let failed = |e: sqlx::Error| ConfigError::Introspection {
            db: binding.name.clone(),
            message: e.to_string(),
        };
        let rows: Vec<RawRow> = match &binding.handle {
            DatasourceHandle::Postgres(pool) => {
                tracing::debug!(db = %binding.name, sql = %PG_SCHEMA_SQL, "query");
                sqlx::query_as(PG_SCHEMA_SQL).fetch_all(pool).await.map_err(failed)?
            }
            DatasourceHandle::MySql(pool) => {
                tracing::debug!(db = %binding.name, sql = %MYSQL_SCHEMA_SQL, "query");
                sqlx::query_as(MYSQL_SCHEMA_SQL).fetch_all(pool).await.map_err(failed)?
            }
            DatasourceHandle::Search(_) => return Ok(Vec::new()),
        };
        Ok(rows.into_iter().map(SchemaRow::from).collect())
    }
}

/// Merge live-schema rows into `tables`: column type and comment always come from the
/// schema; a table comment already present is kept, otherwise the schema comment is
/// adopted; tables and columns missing from config are added.
pub fn reconcile(tables: &mut DbTableConfig, rows: Vec<SchemaRow>) {
    for row in rows {
        let table = tables.entry(row.table_name).or_insert_with(TableConfig::default);
        if table.comment.is_none() {
            table.comment = row.table_comment;
        }
        let Some(column_name) = row.column_name else { continue };
        let column = table.columns.entry(column_name).or_insert_with(ColumnConfig::default);
        column.type_ = row.data_type;
        column.comment = row.column_comment;
    }
}
