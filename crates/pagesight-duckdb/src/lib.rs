pub mod backend;
mod predicate;
pub mod schema;
mod store_impl;

pub use backend::DuckDbBackend;

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `pagesight_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
