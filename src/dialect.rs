//! Backend dialects, detected once per datasource from its connection URL.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Postgres,
    MySql,
    /// Search-engine store; tables are indexes and are not verifiable locally.
    Elasticsearch,
}

impl Dialect {
    /// Detect the dialect from a connection URL. A leading `jdbc:` is tolerated.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url_scheme(url)?;
        match scheme.as_str() {
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "elasticsearch" | "elasticsearch+http" | "elasticsearch+https" | "es" => Some(Dialect::Elasticsearch),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Elasticsearch => "elasticsearch",
        }
    }

    pub fn is_search_engine(&self) -> bool {
        matches!(self, Dialect::Elasticsearch)
    }

    pub fn is_relational(&self) -> bool {
        !self.is_search_engine()
    }

    /// Quote an identifier taken from config (never from request values). Used by
    /// [`crate::session::Session`] implementations when rendering statements.
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Elasticsearch => ident.to_string(),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// `url` trimmed, without a leading `jdbc:` in any case.
pub(crate) fn strip_jdbc_prefix(url: &str) -> &str {
    let url = url.trim();
    url.get(..5)
        .filter(|p| p.eq_ignore_ascii_case("jdbc:"))
        .map(|_| &url[5..])
        .unwrap_or(url)
}

/// Lower-cased scheme of `url`, without a `jdbc:` prefix.
pub(crate) fn url_scheme(url: &str) -> Option<String> {
    let url = strip_jdbc_prefix(url);
    let (scheme, _) = url.split_once(':')?;
    if scheme.is_empty() {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}
