//! An in-memory PostgREST table served by wiremock, enough of the protocol
//! for the record access layer: `eq` filters, `or` of `ilike`s, ordering,
//! limits, single-object responses and returned representations.

#![allow(dead_code)]

use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use lokiai::config::SupabaseConfig;
use lokiai::Backend;

pub const ANON_KEY: &str = "anon-key";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

pub fn backend(server: &MockServer) -> Backend {
    Backend::new(SupabaseConfig::new(&server.uri(), ANON_KEY).unwrap()).unwrap()
}

#[derive(Clone)]
pub struct FakeTable {
    rows: Arc<Mutex<Vec<Value>>>,
    defaults: Map<String, Value>,
    unique: Option<&'static str>,
    clock: Arc<AtomicI64>,
}

#[derive(Clone, Copy)]
enum Op {
    Select,
    Insert,
    Update,
    Delete,
}

struct Handler {
    table: FakeTable,
    op: Op,
    single: bool,
}

impl FakeTable {
    pub fn new(defaults: Value, unique: Option<&'static str>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(Vec::new())),
            defaults: defaults.as_object().cloned().unwrap_or_default(),
            unique,
            clock: Arc::new(AtomicI64::new(0)),
        }
    }

    /// `one_on_one_conversations` with its column defaults
    pub fn conversations() -> Self {
        Self::new(
            json!({
                "conversation_type": "regular",
                "status": "draft",
                "tokens_used": 0,
                "ai_model": "gpt-4",
                "is_template": false,
                "employee_role": null,
                "conversation_date": null,
                "completed_at": null,
            }),
            None,
        )
    }

    /// `user_profiles`, unique on `user_id`
    pub fn profiles() -> Self {
        Self::new(
            json!({
                "subscription_tier": "free",
                "subscription_status": "active",
                "credits_balance": 10,
                "settings": {},
            }),
            Some("user_id"),
        )
    }

    pub async fn mount(&self, server: &MockServer, table: &str) {
        let route = format!("/rest/v1/{}", table);
        for (verb, op) in [
            ("GET", Op::Select),
            ("POST", Op::Insert),
            ("PATCH", Op::Update),
            ("DELETE", Op::Delete),
        ] {
            Mock::given(method(verb))
                .and(path(route.as_str()))
                .and(header("accept", SINGLE_OBJECT))
                .respond_with(self.handler(op, true))
                .mount(server)
                .await;
            Mock::given(method(verb))
                .and(path(route.as_str()))
                .respond_with(self.handler(op, false))
                .mount(server)
                .await;
        }
    }

    fn handler(&self, op: Op, single: bool) -> Handler {
        Handler {
            table: self.clone(),
            op,
            single,
        }
    }

    pub fn rows(&self) -> Vec<Value> {
        self.rows.lock().unwrap().clone()
    }

    /// Store a row as-is, filling only id and timestamps when absent
    pub fn seed(&self, row: Value) -> Value {
        let row = self.stamp(row.as_object().cloned().unwrap_or_default(), true);
        self.rows.lock().unwrap().push(row.clone());
        row
    }

    /// Strictly increasing timestamps with a fixed width, so they order as strings
    fn now(&self) -> String {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst);
        (Utc::now() + Duration::milliseconds(tick))
            .to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn stamp(&self, mut row: Map<String, Value>, created: bool) -> Value {
        let now = self.now();
        if created {
            row.entry("id")
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            row.entry("created_at")
                .or_insert_with(|| Value::String(now.clone()));
        }
        row.insert("updated_at".to_string(), Value::String(now));
        Value::Object(row)
    }
}

fn api_error(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "code": code,
        "message": message,
        "details": null,
        "hint": null,
    }))
}

fn no_single_row(count: usize) -> ResponseTemplate {
    ResponseTemplate::new(406).set_body_json(json!({
        "code": "PGRST116",
        "message": "JSON object requested, multiple (or no) rows returned",
        "details": format!("The result contains {} rows", count),
        "hint": null,
    }))
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn ilike(value: &Value, pattern: &str) -> bool {
    let needle = pattern.trim_matches('*').to_lowercase();
    as_text(value).to_lowercase().contains(&needle)
}

fn matches(row: &Value, request: &Request) -> bool {
    request.url.query_pairs().all(|(key, value)| match key.as_ref() {
        "select" | "order" | "limit" => true,
        "or" => value
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split(',')
            .any(|condition| {
                let mut parts = condition.splitn(3, '.');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(column), Some("ilike"), Some(pattern)) => ilike(&row[column], pattern),
                    _ => false,
                }
            }),
        column => match value.split_once('.') {
            Some(("eq", expected)) => as_text(&row[column]) == expected,
            _ => false,
        },
    })
}

fn respond_rows(rows: Vec<Value>, single: bool, status: u16) -> ResponseTemplate {
    if single {
        if rows.len() != 1 {
            return no_single_row(rows.len());
        }
        ResponseTemplate::new(status).set_body_json(&rows[0])
    } else {
        ResponseTemplate::new(status).set_body_json(Value::Array(rows))
    }
}

impl Handler {
    fn select(&self, request: &Request) -> ResponseTemplate {
        let mut rows: Vec<Value> = self
            .table
            .rows()
            .into_iter()
            .filter(|row| matches(row, request))
            .collect();

        let param = |name: &str| {
            request
                .url
                .query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };
        if let Some(order) = param("order") {
            let (column, direction) = order.split_once('.').unwrap_or((order.as_str(), "asc"));
            rows.sort_by_key(|row| as_text(&row[column]));
            if direction == "desc" {
                rows.reverse();
            }
        }
        if let Some(limit) = param("limit").and_then(|limit| limit.parse().ok()) {
            rows.truncate(limit);
        }

        respond_rows(rows, self.single, 200)
    }

    fn insert(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match request.body_json() {
            Ok(body) => body,
            Err(e) => return api_error(400, "PGRST102", &e.to_string()),
        };
        let payloads = match body {
            Value::Array(items) => items,
            other => vec![other],
        };

        let mut stored = self.table.rows.lock().unwrap();
        let mut inserted = Vec::new();
        for payload in payloads {
            let mut row = self.table.defaults.clone();
            if let Value::Object(fields) = payload {
                row.extend(fields);
            }
            if let Some(column) = self.table.unique {
                let key = row.get(column).cloned().unwrap_or(Value::Null);
                if stored.iter().any(|existing| existing[column] == key) {
                    return api_error(
                        409,
                        "23505",
                        "duplicate key value violates unique constraint",
                    );
                }
            }
            let row = self.table.stamp(row, true);
            stored.push(row.clone());
            inserted.push(row);
        }

        respond_rows(inserted, self.single, 201)
    }

    fn update(&self, request: &Request) -> ResponseTemplate {
        let changes: Map<String, Value> = match request.body_json() {
            Ok(changes) => changes,
            Err(e) => return api_error(400, "PGRST102", &e.to_string()),
        };

        let mut stored = self.table.rows.lock().unwrap();
        let matched = stored.iter().filter(|row| matches(row, request)).count();
        if self.single && matched != 1 {
            return no_single_row(matched);
        }

        let mut updated = Vec::new();
        for row in stored.iter_mut().filter(|row| matches(row, request)) {
            let mut fields = row.as_object().cloned().unwrap_or_default();
            fields.extend(changes.clone());
            *row = self.table.stamp(fields, false);
            updated.push(row.clone());
        }

        respond_rows(updated, self.single, 200)
    }

    fn delete(&self, request: &Request) -> ResponseTemplate {
        let mut stored = self.table.rows.lock().unwrap();
        let (removed, kept): (Vec<Value>, Vec<Value>) =
            stored.drain(..).partition(|row| matches(row, request));
        *stored = kept;

        respond_rows(removed, self.single, 200)
    }
}

impl Respond for Handler {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        match self.op {
            Op::Select => self.select(request),
            Op::Insert => self.insert(request),
            Op::Update => self.update(request),
            Op::Delete => self.delete(request),
        }
    }
}
