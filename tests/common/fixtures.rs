//! Datadog Logs v2 response bodies.

use serde_json::{json, Value};

/// One entry of a `/api/v2/logs/events` response. `ts` is RFC 3339.
pub fn dd_entry(id: &str, ts: &str, status: &str, message: &str) -> Value {
    json!({
        "id": id,
        "type": "log",
        "attributes": {
            "timestamp": ts,
            "status": status,
            "message": message,
            "service": "checkout",
            "host": "i-0abc",
            "tags": ["env:test", "service:checkout"],
            "attributes": { "http": { "status_code": 200 } }
        }
    })
}

/// A full response page around `entries`.
pub fn dd_page(entries: &[Value]) -> String {
    json!({
        "data": entries,
        "links": {},
        "meta": { "elapsed": 12, "status": "done", "request_id": "req-1" }
    })
    .to_string()
}

/// A page whose `meta.page.after` points at the next page.
pub fn dd_page_after(entries: &[Value], after: &str) -> String {
    json!({
        "data": entries,
        "meta": { "page": { "after": after }, "status": "done" }
    })
    .to_string()
}

/// A page carrying one backend warning and no data.
pub fn dd_warning_page(code: &str, title: &str) -> String {
    json!({
        "data": [],
        "meta": { "warnings": [{ "code": code, "title": title, "detail": "partial results" }] }
    })
    .to_string()
}

pub const DD_EMPTY_PAGE: &str = r#"{"data":[]}"#;
