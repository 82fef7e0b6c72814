//! CrudService: generic CRUD orchestration over the schema catalog.

mod crud;
pub use crud::{CrudService, Verb};
