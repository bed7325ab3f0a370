//! Datasource bindings: pool or client construction from declared properties.

use crate::config::{validate_datasource_name, DatasourceConfig, DatasourceProperties};
use crate::dialect::{strip_jdbc_prefix, url_scheme, Dialect};
use crate::error::ConfigError;
use serde_json::{Map, Value};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Pool implementation tag for relational datasources.
pub const SQLX_POOL_TYPE: &str = "sqlx";
/// Client implementation tag for search-engine datasources.
pub const SEARCH_CLIENT_TYPE: &str = "reqwest";

/// HTTP client for a search-engine datasource.
#[derive(Clone, Debug)]
pub struct SearchClient {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    http: reqwest::Client,
}

impl SearchClient {
    /// `elasticsearch://host:9200` maps to `http://host:9200`;
    /// `elasticsearch+https://host` maps to `https://host`.
    pub fn from_url(url: &str, props: &DatasourceProperties) -> Result<Self, String> {
        let url = strip_jdbc_prefix(url);
        let (_, rest) = url.split_once("://").ok_or_else(|| format!("invalid search url: {}", url))?;
        let secure = url_scheme(url).as_deref() == Some("elasticsearch+https");
        let host = rest.trim_end_matches('/');
        if host.is_empty() {
            return Err(format!("invalid search url: {}", url));
        }
        let base_url = format!("{}://{}", if secure { "https" } else { "http" }, host);
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = props.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().map_err(|e| e.to_string())?;
        Ok(SearchClient {
            base_url,
            username: props.username.clone(),
            password: props.password.clone(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request builder for `path` under the base URL, with basic auth when configured.
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.http.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }
}

/// Live connection handle of one datasource.
#[derive(Clone, Debug)]
pub enum DatasourceHandle {
    Postgres(PgPool),
    MySql(MySqlPool),
    Search(SearchClient),
}

impl DatasourceHandle {
    pub fn dialect(&self) -> Dialect {
        match self {
            DatasourceHandle::Postgres(_) => Dialect::Postgres,
            DatasourceHandle::MySql(_) => Dialect::MySql,
            DatasourceHandle::Search(_) => Dialect::Elasticsearch,
        }
    }
}

/// A database name paired with its handle and dialect.
#[derive(Clone, Debug)]
pub struct Binding {
    pub name: String,
    pub dialect: Dialect,
    pub handle: DatasourceHandle,
    /// Declared properties without the `type` tag; empty for caller-supplied handles.
    pub properties: Map<String, Value>,
}

impl Binding {
    /// Wrap a caller-supplied handle.
    pub fn from_handle(name: impl Into<String>, handle: DatasourceHandle) -> Self {
        Binding {
            name: name.into(),
            dialect: handle.dialect(),
            handle,
            properties: Map::new(),
        }
    }
}

/// Build the binding for one declared datasource entry. Pools connect lazily, so
/// connectivity problems surface on first use (schema introspection at bootstrap).
pub fn connect_datasource(name: &str, entry: &Value) -> Result<Binding, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidDatasource {
        name: name.to_string(),
        reason,
    };
    validate_datasource_name(name)?;
    let ds = DatasourceConfig::from_entry(name, entry)?;
    let url = ds
        .properties
        .url
        .clone()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| invalid("missing 'url'".into()))?;
    let dialect = Dialect::from_url(&url).ok_or_else(|| invalid(format!("unsupported url scheme: {}", url)))?;
    let url = strip_jdbc_prefix(&url);

    let expected = if dialect.is_search_engine() {
        SEARCH_CLIENT_TYPE
    } else {
        SQLX_POOL_TYPE
    };
    if let Some(tag) = ds.pool_type.as_deref() {
        if tag != expected {
            return Err(invalid(format!(
                "type '{}' is not available for {} (expected '{}')",
                tag, dialect, expected
            )));
        }
    }
    for key in ds.properties.extra.keys() {
        tracing::warn!(datasource = %name, property = %key, "ignoring unknown datasource property");
    }

    let handle = match dialect {
        Dialect::Postgres => {
            let mut opts = PgConnectOptions::from_str(url).map_err(|e| invalid(e.to_string()))?;
            if let Some(user) = &ds.properties.username {
                opts = opts.username(user);
            }
            if let Some(password) = &ds.properties.password {
                opts = opts.password(password);
            }
            let pool = apply_pool_properties(PgPoolOptions::new(), &ds.properties).connect_lazy_with(opts);
            DatasourceHandle::Postgres(pool)
        }
        Dialect::MySql => {
            let mut opts = MySqlConnectOptions::from_str(url).map_err(|e| invalid(e.to_string()))?;
            if let Some(user) = &ds.properties.username {
                opts = opts.username(user);
            }
            if let Some(password) = &ds.properties.password {
                opts = opts.password(password);
            }
            let pool = apply_pool_properties(MySqlPoolOptions::new(), &ds.properties).connect_lazy_with(opts);
            DatasourceHandle::MySql(pool)
        }
        Dialect::Elasticsearch => {
            let client = SearchClient::from_url(url, &ds.properties).map_err(invalid)?;
            DatasourceHandle::Search(client)
        }
    };
    tracing::info!(datasource = %name, dialect = %dialect, "datasource bound");
    Ok(Binding {
        name: name.to_string(),
        dialect,
        handle,
        properties: ds.raw,
    })
}

fn apply_pool_properties<DB: sqlx::Database>(
    mut options: sqlx::pool::PoolOptions<DB>,
    props: &DatasourceProperties,
) -> sqlx::pool::PoolOptions<DB> {
    if let Some(n) = props.max_connections {
        options = options.max_connections(n);
    }
    if let Some(n) = props.min_connections {
        options = options.min_connections(n);
    }
    if let Some(secs) = props.acquire_timeout_secs {
        options = options.acquire_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = props.idle_timeout_secs {
        options = options.idle_timeout(Some(Duration::from_secs(secs)));
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn builds_lazy_relational_bindings() {
        let pg = connect_datasource("db1", &json!({ "url": "postgres://u:p@localhost/db1", "max_connections": 3 }))
            .unwrap();
        assert_eq!(pg.dialect, Dialect::Postgres);
        assert!(matches!(pg.handle, DatasourceHandle::Postgres(_)));
        assert_eq!(pg.properties.get("max_connections"), Some(&json!(3)));

        let my = connect_datasource("db2", &json!({ "type": "sqlx", "url": "mysql://localhost/db2" })).unwrap();
        assert_eq!(my.dialect, Dialect::MySql);
        assert!(!my.properties.contains_key("type"));

        let jdbc = connect_datasource("db3", &json!({ "url": "jdbc:postgresql://localhost:5433/db3" })).unwrap();
        assert_eq!(jdbc.dialect, Dialect::Postgres);
    }

    #[tokio::test]
    async fn builds_search_client_for_search_scheme() {
        let es = connect_datasource("search", &json!({ "url": "elasticsearch://localhost:9200/" })).unwrap();
        assert_eq!(es.dialect, Dialect::Elasticsearch);
        match es.handle {
            DatasourceHandle::Search(client) => assert_eq!(client.base_url(), "http://localhost:9200"),
            other => panic!("unexpected handle {:?}", other),
        }
        let es = connect_datasource("search", &json!({ "url": "elasticsearch+https://es.internal" })).unwrap();
        match es.handle {
            DatasourceHandle::Search(client) => assert_eq!(client.base_url(), "https://es.internal"),
            other => panic!("unexpected handle {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejects_names_unusable_in_targets() {
        let err = connect_datasource("shop.eu", &json!({ "url": "postgres://localhost/shop" })).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_bad_datasource_entries() {
        for entry in [
            json!({ "max_connections": 2 }),
            json!({ "url": "sqlite://file.db" }),
            json!({ "type": "reqwest", "url": "postgres://localhost/db" }),
            json!({ "url": "postgres://localhost/db", "max_connections": -1 }),
            json!("postgres://localhost/db"),
        ] {
            let err = connect_datasource("bad", &entry).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidDatasource { .. }), "{:?}", entry);
        }
    }
}
