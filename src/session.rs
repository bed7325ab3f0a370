//! Session collaborator: builds and executes dialect-specific statements for parsed
//! requests. Implementations live outside this crate; [`LoggingSession`] decorates one
//! with per-call logging when the config `log` flag is set.

use crate::datasource::Binding;
use crate::dialect::Dialect;
use crate::error::AppError;
use crate::request::Request;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Database a dispatch runs against, passed explicitly to the session.
#[derive(Clone, Debug)]
pub struct DispatchContext {
    pub database: String,
    pub dialect: Dialect,
    pub binding: Binding,
}

impl DispatchContext {
    pub fn new(binding: &Binding) -> Self {
        DispatchContext {
            database: binding.name.clone(),
            dialect: binding.dialect,
            binding: binding.clone(),
        }
    }
}

#[async_trait]
pub trait Session: Send + Sync {
    /// Execute one request and return its result document.
    async fn execute(&self, ctx: &DispatchContext, request: &Request) -> Result<Value, AppError>;

    /// Execute `requests` in order, all-or-nothing, on `ctx.database`.
    async fn transaction(&self, ctx: &DispatchContext, requests: &[Request]) -> Result<Value, AppError>;
}

pub struct LoggingSession {
    inner: Arc<dyn Session>,
}

impl LoggingSession {
    pub fn new(inner: Arc<dyn Session>) -> Self {
        LoggingSession { inner }
    }
}

#[async_trait]
impl Session for LoggingSession {
    async fn execute(&self, ctx: &DispatchContext, request: &Request) -> Result<Value, AppError> {
        let started = Instant::now();
        let result = self.inner.execute(ctx, request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(
                db = %ctx.database,
                dialect = %ctx.dialect,
                kind = %request.kind(),
                table = request.table().unwrap_or("-"),
                native = request.is_native(),
                elapsed_ms,
                "request executed"
            ),
            Err(e) => tracing::warn!(
                db = %ctx.database,
                kind = %request.kind(),
                table = request.table().unwrap_or("-"),
                error = %e,
                elapsed_ms,
                "request failed"
            ),
        }
        result
    }

    async fn transaction(&self, ctx: &DispatchContext, requests: &[Request]) -> Result<Value, AppError> {
        let started = Instant::now();
        let result = self.inner.transaction(ctx, requests).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(
                db = %ctx.database,
                dialect = %ctx.dialect,
                statements = requests.len(),
                elapsed_ms,
                "transaction committed"
            ),
            Err(e) => tracing::warn!(
                db = %ctx.database,
                statements = requests.len(),
                error = %e,
                elapsed_ms,
                "transaction failed"
            ),
        }
        result
    }
}
