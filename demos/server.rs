//! Demo gateway: bootstraps from `datagate.json` (or `DATAGATE_CONFIG`), then reads one JSON
//! request per line on stdin and prints the dispatch plan or the error body.

use async_trait::async_trait;
use datagate::{AppError, Bootstrap, DispatchContext, Gateway, Request, Session};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Describes what would run instead of executing it.
struct PlanSession;

fn plan(ctx: &DispatchContext, request: &Request) -> Value {
    json!({
        "db": ctx.database,
        "dialect": ctx.dialect.name(),
        "kind": request.kind(),
        "table": request.table().map(|t| ctx.dialect.quote_identifier(t)),
        "alias": request.alias(),
        "template": request.template(),
        "native": request.native_statement(),
    })
}

#[async_trait]
impl Session for PlanSession {
    async fn execute(&self, ctx: &DispatchContext, request: &Request) -> Result<Value, AppError> {
        Ok(plan(ctx, request))
    }

    async fn transaction(&self, ctx: &DispatchContext, requests: &[Request]) -> Result<Value, AppError> {
        let statements: Vec<Value> = requests.iter().map(|r| plan(ctx, r)).collect();
        Ok(json!({ "db": ctx.database, "transaction": statements }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("datagate=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let registry = Bootstrap::new().run().await?;
    tracing::info!(
        default_db = %registry.default_database(),
        databases = ?registry.database_names().collect::<Vec<_>>(),
        "gateway ready; reading requests from stdin"
    );
    let gateway = Gateway::new(registry, Arc::new(PlanSession));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let out = match gateway.translate(&line).await {
            Ok(value) => value,
            Err(e) => e.to_json(),
        };
        stdout.write_all(format!("{}\n", out).as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}
