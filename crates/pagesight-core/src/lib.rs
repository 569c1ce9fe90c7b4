pub mod config;
pub mod enrich;
pub mod error;
pub mod event;
pub mod filter;
pub mod period;
pub mod store;
pub mod visitor;
