//! Bootstrap configuration (spec.md §6 "Environment variables"): the
//! gateway only reads its own four env vars, not a general config file —
//! the library itself has no notion of environment.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub path: Option<PathBuf>,
    pub token: Option<String>,
    pub read_anon: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            addr: std::env::var("EJDB_ADDR").unwrap_or_else(|_| "0.0.0.0:9090".to_string()),
            path: std::env::var("EJDB_PATH").ok().map(PathBuf::from),
            token: std::env::var("EJDB_TOKEN").ok().filter(|t| !t.is_empty()),
            read_anon: std::env::var("EJDB_READ_ANON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}
