/// Bootstrap tests
///
/// Config files, table-config directories and schema reconciliation, with a fake
/// introspector standing in for live databases.
/// Run with: cargo test --test bootstrap_tests

use async_trait::async_trait;
use datagate::{
    AssociationKind, Binding, Bootstrap, ConfigError, DatasourceHandle, Dialect, SchemaIntrospector, SchemaRow,
    SearchClient,
};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct FakeIntrospector {
    rows: HashMap<String, Vec<SchemaRow>>,
    failing: Option<String>,
    seen: Mutex<Vec<String>>,
}

impl FakeIntrospector {
    fn with_rows(mut self, db: &str, rows: Vec<SchemaRow>) -> Self {
        self.rows.insert(db.to_string(), rows);
        self
    }

    fn failing_on(mut self, db: &str) -> Self {
        self.failing = Some(db.to_string());
        self
    }
}

#[async_trait]
impl SchemaIntrospector for FakeIntrospector {
    async fn introspect(&self, binding: &Binding) -> Result<Vec<SchemaRow>, ConfigError> {
        self.seen.lock().unwrap().push(binding.name.clone());
        if self.failing.as_deref() == Some(binding.name.as_str()) {
            return Err(ConfigError::Introspection {
                db: binding.name.clone(),
                message: "connection refused".into(),
            });
        }
        Ok(self.rows.get(&binding.name).cloned().unwrap_or_default())
    }
}

fn column(table: &str, table_comment: Option<&str>, column: &str, data_type: &str) -> SchemaRow {
    SchemaRow {
        table_name: table.to_string(),
        table_comment: table_comment.map(str::to_string),
        column_name: Some(column.to_string()),
        data_type: Some(data_type.to_string()),
        column_comment: None,
    }
}

fn write(path: &Path, value: serde_json::Value) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

fn two_database_config(dir: &Path) -> std::path::PathBuf {
    let file = dir.join("datagate.json");
    write(
        &file,
        json!({
            "default_datasource": "shop",
            "log": true,
            "datasources": {
                "shop": { "type": "sqlx", "url": "postgres://localhost/shop", "max_connections": 4 },
                "crm": { "url": "mysql://localhost/crm" }
            }
        }),
    );
    file
}

#[tokio::test]
async fn test_config_tables_and_schema_are_combined() {
    let dir = TempDir::new().unwrap();
    let file = two_database_config(dir.path());
    write(&dir.path().join("tables/orders.json"), json!({ "comment": "User comment" }));
    write(
        &dir.path().join("tables/shop/orders.json"),
        json!({ "columns": { "customer_id": { "association": { "target": "customers", "type": "many_to_one" } } } }),
    );
    write(&dir.path().join("tables/crm/leads.json"), json!({ "comment": "Leads" }));
    write(&dir.path().join("tables/crm/broken.json"), json!(["not", "a", "table"]));

    let introspector = Arc::new(
        FakeIntrospector::default()
            .with_rows(
                "shop",
                vec![
                    column("orders", Some("Schema comment"), "status", "varchar"),
                    column("orders", Some("Schema comment"), "customer_id", "bigint"),
                    column("customers", Some("Buyers"), "id", "bigint"),
                ],
            )
            .with_rows("crm", vec![column("leads", None, "email", "varchar")]),
    );
    let registry = Bootstrap::new()
        .config_file(&file)
        .introspector(introspector.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(registry.default_database(), "shop");
    assert!(registry.config().log);
    assert_eq!(registry.dialect_of("crm"), Some(Dialect::MySql));

    let orders = registry.table_config("shop", "orders");
    assert_eq!(orders.comment.as_deref(), Some("User comment"));
    assert_eq!(registry.column_type("shop", "orders", "status"), "varchar");
    assert_eq!(registry.column_type("shop", "orders", "customer_id"), "bigint");
    assert_eq!(registry.column_type("shop", "orders", "missing"), "unknown");
    assert_eq!(registry.table_config("shop", "customers").comment.as_deref(), Some("Buyers"));

    assert_eq!(
        registry.resolve_association("shop", "orders", "customers"),
        Some(AssociationKind::ManyToOne)
    );
    assert_eq!(
        registry.resolve_association("shop", "customers", "orders"),
        Some(AssociationKind::OneToMany)
    );

    assert_eq!(registry.table_config("crm", "leads").comment.as_deref(), Some("Leads"));
    assert!(!registry.db_config("crm").contains_key("broken"));
    assert!(registry.db_config("crm").get("orders").is_none());

    let mut seen = introspector.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["crm".to_string(), "shop".to_string()]);
}

#[tokio::test]
async fn test_introspection_failure_aborts_startup() {
    let dir = TempDir::new().unwrap();
    let file = two_database_config(dir.path());
    let introspector = Arc::new(FakeIntrospector::default().failing_on("crm"));

    let err = Bootstrap::new()
        .config_file(&file)
        .introspector(introspector)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Introspection { ref db, .. } if db == "crm"));
}

#[tokio::test]
async fn test_search_engine_databases_are_not_introspected() {
    let introspector = Arc::new(FakeIntrospector::default());
    let registry = Bootstrap::new()
        .config_value(json!({
            "datasources": {
                "main": { "url": "jdbc:postgresql://localhost/main" },
                "logs": { "type": "reqwest", "url": "elasticsearch://localhost:9200", "username": "elastic" }
            }
        }))
        .base_dir(std::env::temp_dir().join("datagate-no-tables"))
        .introspector(introspector.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(registry.default_database(), "main");
    assert_eq!(registry.search_engine_database(), Some("logs"));
    assert!(registry.validate_target("logs", "any-index").is_ok());
    assert!(registry.validate_target("main", "ghosts").is_err());
    assert_eq!(introspector.seen.lock().unwrap().as_slice(), &["main".to_string()]);
}

#[tokio::test]
async fn test_supplied_handle_replaces_configured_datasources() {
    let client = SearchClient::from_url("elasticsearch://localhost:9200", &Default::default()).unwrap();
    let extra = SearchClient::from_url("elasticsearch://localhost:9201", &Default::default()).unwrap();
    let introspector = Arc::new(FakeIntrospector::default());

    let registry = Bootstrap::new()
        .config_value(json!({ "datasources": { "ignored": { "url": "postgres://localhost/ignored" } } }))
        .handles(vec![DatasourceHandle::Search(client), DatasourceHandle::Search(extra)])
        .base_dir(std::env::temp_dir().join("datagate-no-tables"))
        .introspector(introspector.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(registry.default_database(), "default");
    assert_eq!(registry.bindings().len(), 1);
    assert!(registry.binding("ignored").is_none());
    assert!(registry.is_search_engine("default"));
    assert!(introspector.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_url_shorthand_binds_a_single_default_datasource() {
    let introspector = Arc::new(
        FakeIntrospector::default().with_rows("default", vec![column("users", Some("People"), "id", "int")]),
    );
    let registry = Bootstrap::new()
        .url("jdbc:postgresql://localhost/app", Some("app"), Some("secret"))
        .base_dir(std::env::temp_dir().join("datagate-no-tables"))
        .introspector(introspector.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(registry.default_database(), "default");
    assert_eq!(registry.dialect_of("default"), Some(Dialect::Postgres));
    let binding = registry.binding("default").unwrap();
    assert_eq!(binding.properties["username"], "app");
    assert_eq!(registry.column_type("default", "users", "id"), "int");
    assert_eq!(introspector.seen.lock().unwrap().as_slice(), &["default".to_string()]);
}

#[tokio::test]
async fn test_invalid_configs_fail_fast() {
    let dir = TempDir::new().unwrap();

    let missing = Bootstrap::new().config_file(dir.path().join("absent.json")).run().await;
    assert!(matches!(missing, Err(ConfigError::MissingFile(_))));

    let garbled = dir.path().join("garbled.json");
    std::fs::write(&garbled, "{ not json").unwrap();
    let parsed = Bootstrap::new().config_file(&garbled).run().await;
    assert!(matches!(parsed, Err(ConfigError::Parse { .. })));

    let no_sources = Bootstrap::new().config_value(json!({})).base_dir(dir.path()).run().await;
    assert!(matches!(no_sources, Err(ConfigError::NoDatasource)));

    let bad_scheme = Bootstrap::new()
        .config_value(json!({ "datasources": { "x": { "url": "oracle://localhost/x" } } }))
        .run()
        .await;
    assert!(matches!(bad_scheme, Err(ConfigError::InvalidDatasource { .. })));

    let wrong_type = Bootstrap::new()
        .config_value(json!({ "datasources": { "x": { "type": "reqwest", "url": "postgres://localhost/x" } } }))
        .run()
        .await;
    assert!(matches!(wrong_type, Err(ConfigError::InvalidDatasource { .. })));

    let dotted = Bootstrap::new()
        .config_value(json!({ "datasources": { "shop.eu": { "url": "postgres://localhost/shop" } } }))
        .introspector(Arc::new(FakeIntrospector::default().failing_on("shop.eu")))
        .run()
        .await;
    assert!(matches!(dotted, Err(ConfigError::Validation(_))));

    let undeclared_default = Bootstrap::new()
        .config_value(json!({
            "default_datasource": "nope",
            "datasources": { "x": { "url": "postgres://localhost/x" } }
        }))
        .introspector(Arc::new(FakeIntrospector::default()))
        .run()
        .await;
    assert!(undeclared_default.is_err());
}
