//! Dispatch coordinator: parses requests, enforces single-database transactions, scopes
//! the current database and hands off to the session.

use crate::context;
use crate::error::AppError;
use crate::registry::ConfigRegistry;
use crate::request::{parse_target, OperationKind, Request};
use crate::session::{DispatchContext, LoggingSession, Session};
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct Gateway {
    registry: Arc<ConfigRegistry>,
    session: Arc<dyn Session>,
}

impl Gateway {
    /// Sessions are wrapped in [`LoggingSession`] when the config `log` flag is set.
    pub fn new(registry: Arc<ConfigRegistry>, session: Arc<dyn Session>) -> Self {
        let session: Arc<dyn Session> = if registry.config().log {
            Arc::new(LoggingSession::new(session))
        } else {
            session
        };
        Gateway { registry, session }
    }

    pub fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.registry
    }

    /// Parse JSON text and dispatch it.
    pub async fn translate(&self, json: &str) -> Result<Value, AppError> {
        let payload: Value =
            serde_json::from_str(json).map_err(|e| AppError::MalformedRequest(format!("invalid JSON: {}", e)))?;
        self.dispatch(payload).await
    }

    pub async fn dispatch(&self, payload: Value) -> Result<Value, AppError> {
        let request = Request::parse(payload, &self.registry)?;
        match request.kind() {
            OperationKind::Struct => self.describe(&request),
            OperationKind::Transaction => self.transaction(&request).await,
            _ => self.single(request).await,
        }
    }

    async fn single(&self, request: Request) -> Result<Value, AppError> {
        if let Some(table) = request.table().filter(|_| !request.is_native()) {
            self.registry.validate_target(request.db(), table)?;
        }
        let ctx = self.context_for(request.db())?;
        context::scope(ctx.database.clone(), self.session.execute(&ctx, &request)).await
    }

    /// Every member is parsed and checked for a shared database before targets are
    /// validated or the session is called.
    async fn transaction(&self, request: &Request) -> Result<Value, AppError> {
        let mut members = Vec::with_capacity(request.transaction_members().len());
        for payload in request.transaction_members() {
            let member = Request::parse(payload.clone(), &self.registry)?;
            match member.kind() {
                OperationKind::Transaction => {
                    return Err(AppError::MalformedRequest("nested transactions are not allowed".into()))
                }
                OperationKind::Struct => {
                    return Err(AppError::MalformedRequest("struct cannot run inside a transaction".into()))
                }
                _ => {}
            }
            members.push(member);
        }
        let db = match members.first() {
            Some(first) => first.db().to_string(),
            None => return Err(AppError::MalformedRequest("transaction has no statements".into())),
        };
        if let Some(other) = members.iter().find(|m| m.db() != db) {
            return Err(AppError::UnsupportedOperation(format!(
                "cross-database transaction spanning '{}' and '{}'",
                db,
                other.db()
            )));
        }
        for member in &members {
            if let Some(table) = member.table().filter(|_| !member.is_native()) {
                self.registry.validate_target(member.db(), table)?;
            }
        }
        let ctx = self.context_for(&db)?;
        context::scope(db, self.session.transaction(&ctx, &members)).await
    }

    /// Stored table config, without executing anything.
    fn describe(&self, request: &Request) -> Result<Value, AppError> {
        let table = request
            .table()
            .ok_or_else(|| AppError::MalformedRequest("struct requires a table".into()))?;
        self.registry.validate_target(request.db(), table)?;
        serde_json::to_value(self.registry.table_config(request.db(), table))
            .map_err(|e| AppError::MalformedRequest(e.to_string()))
    }

    /// Stored table config for a `"[db.]table"` string.
    pub fn describe_target(&self, target: &str) -> Result<Value, AppError> {
        let target = parse_target(target)?;
        let db = target.db.unwrap_or_else(|| self.registry.default_database().to_string());
        self.registry.validate_target(&db, &target.table)?;
        serde_json::to_value(self.registry.table_config(&db, &target.table))
            .map_err(|e| AppError::MalformedRequest(e.to_string()))
    }

    fn context_for(&self, db: &str) -> Result<DispatchContext, AppError> {
        self.registry
            .binding(db)
            .map(DispatchContext::new)
            .ok_or_else(|| AppError::UnknownTarget(format!("datasource '{}' does not exist", db)))
    }
}
