//! Route dispatch for the embedded REST surface (spec.md §6). One
//! request, one thread (see `server.rs`); this module only knows how to
//! turn a parsed method/path/body into a `Db` call and a JSON response.

use std::io::Read;

use bson::oid::ObjectId;
use tiny_http::{Method, Request, Response, StatusCode};

use ejdb_db::Db;
use ejdb_store::Store;

use crate::auth;
use crate::config::Config;
use crate::error::status_for;

pub fn dispatch<S: Store>(mut request: Request, db: &Db<S>, config: &Config) {
    let mut body = Vec::new();
    let _ = request.as_reader().read_to_end(&mut body);

    let method = request.method().clone();
    let path = request.url().split('?').next().unwrap_or("").to_string();
    let headers: Vec<tiny_http::Header> = request.headers().to_vec();
    let explain = headers.iter().any(|h| {
        h.field.equiv("X-Hints") && h.value.as_str().eq_ignore_ascii_case("explain")
    });

    let is_write = !matches!(method, Method::Get);
    if !auth::authorized(config, &headers, is_write) {
        respond(request, 401, "unauthorized".to_string());
        return;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let result = match (&method, segments.as_slice()) {
        (Method::Post, []) => handle_query(db, &body, explain),
        (Method::Post, [coll]) => handle_insert(db, coll, &body),
        (Method::Put, [coll, id]) => handle_replace(db, coll, id, &body),
        (Method::Patch, [coll, id]) => handle_patch(db, coll, id, &body),
        (Method::Get, [coll, id]) => handle_get(db, coll, id),
        (Method::Delete, [coll, id]) => handle_delete(db, coll, id),
        _ => Err((404, "no such route".to_string())),
    };

    match result {
        Ok((status, body)) => respond(request, status, body),
        Err((status, body)) => respond(request, status, body),
    }
}

fn respond(request: Request, status: u16, body: String) {
    let response = Response::from_string(body).with_status_code(StatusCode(status));
    let _ = request.respond(response);
}

fn parse_id(id: &str) -> Result<ObjectId, (u16, String)> {
    ObjectId::parse_str(id).map_err(|e| (400, format!("invalid_argument: {e}")))
}

fn parse_doc(body: &[u8]) -> Result<bson::Document, (u16, String)> {
    serde_json::from_slice(body).map_err(|e| (400, format!("invalid_argument: {e}")))
}

fn handle_insert<S: Store>(db: &Db<S>, coll: &str, body: &[u8]) -> Result<(u16, String), (u16, String)> {
    let doc = parse_doc(body)?;
    let id = db.save(coll, doc).map_err(|e| (status_for(&e), e.to_string()))?;
    Ok((200, id.to_hex()))
}

fn handle_replace<S: Store>(
    db: &Db<S>,
    coll: &str,
    id: &str,
    body: &[u8],
) -> Result<(u16, String), (u16, String)> {
    let id = parse_id(id)?;
    let doc = parse_doc(body)?;
    db.replace(coll, &id, doc).map_err(|e| (status_for(&e), e.to_string()))?;
    Ok((200, "{}".to_string()))
}

fn handle_patch<S: Store>(
    db: &Db<S>,
    coll: &str,
    id: &str,
    body: &[u8],
) -> Result<(u16, String), (u16, String)> {
    let oid = parse_id(id)?;
    let patch: json_patch::Patch =
        serde_json::from_slice(body).map_err(|e| (400, format!("invalid_argument: {e}")))?;

    let current = db
        .load(coll, &oid)
        .map_err(|e| (status_for(&e), e.to_string()))?
        .ok_or_else(|| (404, format!("not_found: {}", oid.to_hex())))?;

    let mut value = serde_json::to_value(&current).map_err(|e| (400, e.to_string()))?;
    json_patch::patch(&mut value, &patch).map_err(|e| (400, format!("invalid_argument: {e}")))?;
    let new_doc: bson::Document = serde_json::from_value(value).map_err(|e| (400, e.to_string()))?;

    db.replace(coll, &oid, new_doc)
        .map_err(|e| (status_for(&e), e.to_string()))?;
    Ok((200, "{}".to_string()))
}

fn handle_get<S: Store>(db: &Db<S>, coll: &str, id: &str) -> Result<(u16, String), (u16, String)> {
    let oid = parse_id(id)?;
    let doc = db
        .load(coll, &oid)
        .map_err(|e| (status_for(&e), e.to_string()))?
        .ok_or_else(|| (404, format!("not_found: {}", oid.to_hex())))?;
    let body = serde_json::to_string(&doc).map_err(|e| (500, e.to_string()))?;
    Ok((200, body))
}

fn handle_delete<S: Store>(db: &Db<S>, coll: &str, id: &str) -> Result<(u16, String), (u16, String)> {
    let oid = parse_id(id)?;
    let removed = db.remove(coll, &oid).map_err(|e| (status_for(&e), e.to_string()))?;
    if !removed {
        return Err((404, format!("not_found: {}", oid.to_hex())));
    }
    Ok((200, "{}".to_string()))
}

/// `POST /` ad-hoc query (spec.md §6): the body is either the compact
/// `@<coll>/<query>` form or a literal `{"collection": ..., "query": ...}`
/// envelope — there's no collection segment in the URL to carry it.
fn handle_query<S: Store>(db: &Db<S>, body: &[u8], explain: bool) -> Result<(u16, String), (u16, String)> {
    let text = std::str::from_utf8(body).map_err(|e| (400, format!("invalid_argument: {e}")))?;
    let (coll, query_text) = if let Some(rest) = text.strip_prefix('@') {
        let (coll, query) = rest
            .split_once('/')
            .ok_or_else(|| (400, "invalid_argument: missing '/' after collection".to_string()))?;
        (coll.to_string(), query.to_string())
    } else {
        let envelope: serde_json::Value =
            serde_json::from_str(text).map_err(|e| (400, format!("invalid_argument: {e}")))?;
        let coll = envelope
            .get("collection")
            .and_then(|v| v.as_str())
            .ok_or_else(|| (400, "invalid_argument: missing 'collection'".to_string()))?
            .to_string();
        let query = envelope
            .get("query")
            .cloned()
            .unwrap_or(serde_json::Value::Object(Default::default()));
        (coll, query.to_string())
    };

    let query_doc: bson::Document = if query_text.trim().is_empty() {
        bson::Document::new()
    } else {
        serde_json::from_str(&query_text).map_err(|e| (400, format!("invalid_argument: {e}")))?
    };
    let raw = bson::RawDocumentBuf::from_document(&query_doc).map_err(|e| (400, e.to_string()))?;

    let result = db
        .exec(&coll, &raw, explain)
        .map_err(|e| (status_for(&e), e.to_string()))?;

    let mut out = String::new();
    for doc in &result.docs {
        let id = doc
            .get_object_id("_id")
            .map(|oid| oid.to_hex())
            .unwrap_or_default();
        let json = serde_json::to_string(doc).map_err(|e| (500, e.to_string()))?;
        out.push_str(&id);
        out.push('\t');
        out.push_str(&json);
        out.push('\n');
    }
    if explain {
        for line in &result.log {
            out.push_str("# ");
            out.push_str(line);
            out.push('\n');
        }
    }
    Ok((200, out))
}
