//! Route construction: common service routes and the per-table CRUD surface.

mod common;
mod table;
pub use common::common_routes;
pub use table::table_routes;
