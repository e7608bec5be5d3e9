use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use ejdb_db::{Db, OpenOptions};
use ejdb_server::{Config, Server};
use ejdb_store::MemoryStore;

fn start_server(token: Option<&str>, read_anon: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let config = Config {
        addr: addr.clone(),
        path: None,
        token: token.map(str::to_string),
        read_anon,
    };
    let store = MemoryStore::new();
    let db = Db::open(store, OpenOptions::read_write()).unwrap();
    let server = Server::new(db, config);
    thread::spawn(move || {
        server.serve().unwrap();
    });
    thread::sleep(Duration::from_millis(100));
    addr
}

/// Raw HTTP/1.1 round trip: this embedding has no pack-confirmed HTTP
/// client crate, and the whole point of a gateway test is to exercise
/// the wire format, so the request is framed by hand the same way the
/// protocol's own client side would.
fn send(
    addr: &str,
    method: &str,
    path: &str,
    auth: Option<&str>,
    hints: Option<&str>,
    body: &str,
) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    let mut request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Length: {}\r\n",
        body.len()
    );
    if let Some(token) = auth {
        request.push_str(&format!("Authorization: Token {token}\r\n"));
    }
    if let Some(hint) = hints {
        request.push_str(&format!("X-Hints: {hint}\r\n"));
    }
    request.push_str("\r\n");
    request.push_str(body);

    stream.write_all(request.as_bytes()).unwrap();

    let mut raw = Vec::new();
    let _ = stream.read_to_end(&mut raw);
    let text = String::from_utf8_lossy(&raw);

    let mut parts = text.splitn(2, "\r\n\r\n");
    let head = parts.next().unwrap_or("");
    let resp_body = parts.next().unwrap_or("").to_string();
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
        .unwrap_or(0);
    (status, resp_body)
}

#[test]
fn insert_and_get_roundtrip() {
    let addr = start_server(None, false);

    let (status, body) = send(&addr, "POST", "/people", None, None, r#"{"name":"Ada"}"#);
    assert_eq!(status, 200);
    let id = body.trim().to_string();
    assert_eq!(id.len(), 24);

    let (status, body) = send(&addr, "GET", &format!("/people/{id}"), None, None, "");
    assert_eq!(status, 200);
    assert!(body.contains("Ada"));
}

#[test]
fn get_missing_document_is_404() {
    let addr = start_server(None, false);
    let (status, _) = send(
        &addr,
        "GET",
        "/people/000000000000000000000000",
        None,
        None,
        "",
    );
    assert_eq!(status, 404);
}

#[test]
fn delete_then_get_is_404() {
    let addr = start_server(None, false);
    let (_, body) = send(&addr, "POST", "/people", None, None, r#"{"name":"Bo"}"#);
    let id = body.trim().to_string();

    let (status, _) = send(&addr, "DELETE", &format!("/people/{id}"), None, None, "");
    assert_eq!(status, 200);

    let (status, _) = send(&addr, "GET", &format!("/people/{id}"), None, None, "");
    assert_eq!(status, 404);
}

#[test]
fn patch_applies_json_patch_ops() {
    let addr = start_server(None, false);
    let (_, body) = send(
        &addr,
        "POST",
        "/people",
        None,
        None,
        r#"{"name":"Cy","age":30}"#,
    );
    let id = body.trim().to_string();

    let patch = r#"[{"op":"replace","path":"/age","value":31}]"#;
    let (status, _) = send(&addr, "PATCH", &format!("/people/{id}"), None, None, patch);
    assert_eq!(status, 200);

    let (_, body) = send(&addr, "GET", &format!("/people/{id}"), None, None, "");
    assert!(body.contains("31"));
}

#[test]
fn writes_require_token_when_configured() {
    let addr = start_server(Some("secret"), true);

    let (status, _) = send(&addr, "POST", "/people", None, None, r#"{"name":"Di"}"#);
    assert_eq!(status, 401);

    let (status, _) = send(
        &addr,
        "POST",
        "/people",
        Some("secret"),
        None,
        r#"{"name":"Di"}"#,
    );
    assert_eq!(status, 200);
}

#[test]
fn reads_are_anonymous_when_configured() {
    let addr = start_server(Some("secret"), true);
    let (_, body) = send(
        &addr,
        "POST",
        "/people",
        Some("secret"),
        None,
        r#"{"name":"El"}"#,
    );
    let id = body.trim().to_string();

    let (status, _) = send(&addr, "GET", &format!("/people/{id}"), None, None, "");
    assert_eq!(status, 200);
}

#[test]
fn adhoc_query_compact_form() {
    let addr = start_server(None, false);
    send(&addr, "POST", "/people", None, None, r#"{"name":"Fi","age":40}"#);
    send(&addr, "POST", "/people", None, None, r#"{"name":"Gi","age":20}"#);

    let (status, body) = send(
        &addr,
        "POST",
        "/",
        None,
        None,
        r#"@people/{"age": {"$gte": 30}}"#,
    );
    assert_eq!(status, 200);
    assert!(body.contains("Fi"));
    assert!(!body.contains("Gi"));
}

#[test]
fn adhoc_query_envelope_form_with_explain() {
    let addr = start_server(None, false);
    send(&addr, "POST", "/people", None, None, r#"{"name":"Hu"}"#);

    let envelope = r#"{"collection":"people","query":{}}"#;
    let (status, body) = send(&addr, "POST", "/", None, Some("explain"), envelope);
    assert_eq!(status, 200);
    assert!(body.contains("Hu"));
    assert!(body.contains("# "));
}
