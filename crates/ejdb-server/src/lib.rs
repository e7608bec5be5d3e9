//! Embedded HTTP gateway (spec.md §6) over [`ejdb_db::Db`]: a thin REST
//! surface plus bearer-token auth and env-var bootstrap. The library
//! itself is storage-agnostic; `main.rs` picks the concrete `Store`.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod server;

pub use config::Config;
pub use server::Server;
