//! Bearer-token auth (spec.md §6): when `EJDB_TOKEN` is unset the
//! gateway is open. When set, every write needs the token; reads are
//! exempt only when `EJDB_READ_ANON` is enabled — a request with no
//! configured token at all skips this module entirely.

use crate::config::Config;

pub fn authorized(config: &Config, headers: &[tiny_http::Header], is_write: bool) -> bool {
    let Some(expected) = &config.token else {
        return true;
    };
    if !is_write && config.read_anon {
        return true;
    }
    let presented = headers
        .iter()
        .find(|h| h.field.equiv("Authorization"))
        .and_then(|h| h.value.as_str().strip_prefix("Token "));
    presented == Some(expected.as_str())
}
