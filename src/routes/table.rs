//! Table CRUD routes: a single parameterized path per table. Handlers
//! resolve the table at request time through the schema catalog; verbs
//! outside the supported set land on the MethodNotSupported fallback.

use crate::handlers::table::{create, delete as delete_handler, list, method_not_supported, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn table_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/:table",
            get(list)
                .post(create)
                .patch(update)
                .delete(delete_handler)
                .fallback(method_not_supported),
        )
        .with_state(state)
}
