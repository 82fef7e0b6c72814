//! Shared application state for all routes.

use crate::catalog::SchemaCatalog;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Process-wide schema cache; entries live until invalidated.
    pub catalog: Arc<SchemaCatalog>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        AppState {
            pool,
            catalog: Arc::new(SchemaCatalog::new()),
        }
    }
}
