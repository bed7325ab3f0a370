//! Request-scoped current database.
//!
//! The value lives in a task-local cell: every dispatch runs its future inside [`scope`],
//! so concurrently executing requests each see their own database and the value is gone
//! once the future completes, fails or panics. Tasks spawned from inside a scope do not
//! inherit it; pass the explicit [`crate::session::DispatchContext`] instead.

use std::future::Future;

tokio::task_local! {
    static CURRENT_DATABASE: String;
}

/// Run `fut` with `db` as the current database.
pub async fn scope<F>(db: impl Into<String>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_DATABASE.scope(db.into(), fut).await
}

/// Run `f` with `db` as the current database.
pub fn sync_scope<R>(db: impl Into<String>, f: impl FnOnce() -> R) -> R {
    CURRENT_DATABASE.sync_scope(db.into(), f)
}

/// Current database of the executing request, if inside a scope.
pub fn current_database() -> Option<String> {
    CURRENT_DATABASE.try_with(|db| db.clone()).ok()
}
