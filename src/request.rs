//! Request classifier: turns a JSON request into an immutable [`Request`] descriptor.
//!
//! A request carries exactly one operation key whose value names the target as
//! `"[db.]table[ alias]"`, e.g. `{"query": "db1.users u", ...}`. A `"native"` key carries
//! backend-native SQL text instead, unless it accompanies `select`/`query`, in which case
//! it is a search-engine query object and the request is classified normally.

use crate::error::AppError;
use crate::registry::ConfigRegistry;
use serde::Serialize;
use serde_json::{Map, Value};

pub const NATIVE_KEY: &str = "native";
pub const SOURCE_KEY: &str = "source";
pub const TEMPLATE_KEY: &str = "template";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Detail,
    Query,
    Select,
    Insert,
    Update,
    Delete,
    Transaction,
    Struct,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::Detail,
        OperationKind::Query,
        OperationKind::Select,
        OperationKind::Insert,
        OperationKind::Update,
        OperationKind::Delete,
        OperationKind::Transaction,
        OperationKind::Struct,
    ];

    /// Top-level request key of this operation.
    pub fn key(&self) -> &'static str {
        match self {
            OperationKind::Detail => "detail",
            OperationKind::Query => "query",
            OperationKind::Select => "select",
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Transaction => "transaction",
            OperationKind::Struct => "struct",
        }
    }

    /// Classify native SQL by its leading keyword.
    fn from_statement(sql: &str) -> Option<Self> {
        let keyword: String = sql
            .trim_start()
            .chars()
            .take_while(char::is_ascii_alphabetic)
            .collect::<String>()
            .to_ascii_lowercase();
        match keyword.as_str() {
            "select" => Some(OperationKind::Select),
            "insert" => Some(OperationKind::Insert),
            "update" => Some(OperationKind::Update),
            "delete" => Some(OperationKind::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Response-shaping templates a request may name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    List,
    Page,
    Tree,
}

impl std::str::FromStr for Template {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "list" => Ok(Template::List),
            "page" => Ok(Template::Page),
            "tree" => Ok(Template::Tree),
            _ => Err(AppError::MalformedRequest(format!(
                "unknown template: {} (expected list, page or tree)",
                s
            ))),
        }
    }
}

/// Parsed `"[db.]table[ alias]"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub db: Option<String>,
    pub table: String,
    pub alias: Option<String>,
}

pub fn parse_target(raw: &str) -> Result<Target, AppError> {
    let malformed = || AppError::MalformedRequest(format!("unparseable target: '{}'", raw));
    let trimmed = raw.trim();
    let (db, rest) = match trimmed.split_once('.') {
        Some((db, rest)) => (Some(db.trim()), rest),
        None => (None, trimmed),
    };
    if db.is_some_and(str::is_empty) || rest.contains('.') {
        return Err(malformed());
    }
    let mut words = rest.split_whitespace();
    let table = words.next().ok_or_else(malformed)?;
    let alias = words.next();
    if words.next().is_some() {
        return Err(malformed());
    }
    Ok(Target {
        db: db.map(str::to_string),
        table: table.to_string(),
        alias: alias.map(str::to_string),
    })
}

/// Immutable request descriptor consumed by the dispatch path and the session.
#[derive(Clone, Debug)]
pub struct Request {
    kind: OperationKind,
    db: String,
    table: Option<String>,
    alias: Option<String>,
    template: Option<Template>,
    native: bool,
    payload: Value,
}

impl Request {
    /// Parse JSON text.
    pub fn parse_str(json: &str, registry: &ConfigRegistry) -> Result<Self, AppError> {
        let payload: Value =
            serde_json::from_str(json).map_err(|e| AppError::MalformedRequest(format!("invalid JSON: {}", e)))?;
        Self::parse(payload, registry)
    }

    pub fn parse(payload: Value, registry: &ConfigRegistry) -> Result<Self, AppError> {
        Self::parse_with_default(payload, registry.default_database())
    }

    /// Parse with `default_db` for unqualified targets.
    pub fn parse_with_default(payload: Value, default_db: &str) -> Result<Self, AppError> {
        let object = payload
            .as_object()
            .ok_or_else(|| AppError::MalformedRequest("request must be a JSON object".into()))?;

        let native = object.contains_key(NATIVE_KEY);
        let native_query_object = object.contains_key(OperationKind::Select.key())
            || object.contains_key(OperationKind::Query.key());
        if native && !native_query_object {
            return Self::parse_native(object, default_db, payload.clone());
        }

        let kind = classify(object)?;
        let (db, table, alias) = match kind {
            OperationKind::Transaction => {
                let members = object.get(kind.key()).and_then(Value::as_array);
                match members {
                    Some(m) if !m.is_empty() && m.iter().all(Value::is_object) => {}
                    _ => {
                        return Err(AppError::MalformedRequest(
                            "transaction must be a non-empty array of request objects".into(),
                        ))
                    }
                }
                (default_db.to_string(), None, None)
            }
            _ => {
                let raw = object.get(kind.key()).and_then(Value::as_str).ok_or_else(|| {
                    AppError::MalformedRequest(format!("'{}' must be a \"[db.]table[ alias]\" string", kind))
                })?;
                let target = parse_target(raw)?;
                let db = target.db.unwrap_or_else(|| default_db.to_string());
                (db, Some(target.table), target.alias)
            }
        };

        let template = match object.get(TEMPLATE_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(name.parse::<Template>()?),
            Some(_) => return Err(AppError::MalformedRequest("'template' must be a string".into())),
        };

        Ok(Request {
            kind,
            db,
            table,
            alias,
            template,
            native,
            payload,
        })
    }

    fn parse_native(object: &Map<String, Value>, default_db: &str, payload: Value) -> Result<Self, AppError> {
        let sql = object
            .get(NATIVE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::MalformedRequest("'native' must be a SQL string".into()))?;
        let kind = OperationKind::from_statement(sql).ok_or_else(|| {
            AppError::MalformedRequest(format!(
                "native statement must start with select, insert, update or delete: '{}'",
                sql.trim()
            ))
        })?;
        let db = match object.get(SOURCE_KEY) {
            None | Some(Value::Null) => default_db.to_string(),
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(_) => return Err(AppError::MalformedRequest("'source' must be a datasource name".into())),
        };
        Ok(Request {
            kind,
            db,
            table: None,
            alias: None,
            template: None,
            native: true,
            payload,
        })
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn template(&self) -> Option<Template> {
        self.template
    }

    /// True for native SQL passthrough and for search-engine native query objects.
    pub fn is_native(&self) -> bool {
        self.native
    }

    /// SQL text of a native passthrough request.
    pub fn native_statement(&self) -> Option<&str> {
        if self.native && self.table.is_none() {
            self.payload.get(NATIVE_KEY).and_then(Value::as_str)
        } else {
            None
        }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Raw member requests of a transaction; empty for other kinds.
    pub fn transaction_members(&self) -> &[Value] {
        match self.kind {
            OperationKind::Transaction => self
                .payload
                .get(OperationKind::Transaction.key())
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            _ => &[],
        }
    }
}

fn classify(object: &Map<String, Value>) -> Result<OperationKind, AppError> {
    let found: Vec<OperationKind> = OperationKind::ALL
        .into_iter()
        .filter(|k| object.contains_key(k.key()))
        .collect();
    match found.as_slice() {
        [kind] => Ok(*kind),
        [] => Err(AppError::MalformedRequest("no operation specified".into())),
        many => Err(AppError::MalformedRequest(format!(
            "multiple operations specified: {}",
            many.iter().map(OperationKind::key).collect::<Vec<_>>().join(", ")
        ))),
    }
}
