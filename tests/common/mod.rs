//! Shared fixtures: in-memory SQLite with a statement log, and entity declarations held in memory.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tabula::config::sql_literal;
use tabula::{AdminService, Database, Dialect, Hooks, MemoryConfigSource, Record, RequestContext, Settings,
    SqliteDatabase};

const SCHEMA: &[&str] = &[
    "CREATE TABLE customers (id INTEGER PRIMARY KEY, name VARCHAR(64) NOT NULL)",
    "CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        customer_id INTEGER,
        status VARCHAR(32),
        notes TEXT,
        email VARCHAR(128),
        qty INTEGER,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT,
        is_paid BOOLEAN NOT NULL DEFAULT 0,
        price NUMERIC(10,2)
    )",
    "CREATE TABLE order_items (id INTEGER PRIMARY KEY, order_id INTEGER NOT NULL, sku VARCHAR(32))",
    "INSERT INTO customers (id, name) VALUES (3, 'Acme'), (4, 'Globex')",
    "INSERT INTO orders (id, customer_id, status, notes, email, qty, is_active, created_at) VALUES
        (1, 3, 'open', 'first', 'a@example.com', 2, 1, '2024-03-15 10:30:00'),
        (2, 3, 'open', NULL, 'b@example.com', 1, 0, '2024-03-16 08:00:00'),
        (3, 99, 'closed', NULL, 'c@example.com', 5, 1, '2024-03-17 12:00:00'),
        (4, 0, 'draft', NULL, 'd@example.com', 1, 1, NULL)",
    "INSERT INTO order_items (order_id, sku) VALUES (1, 'A-1'), (1, 'A-2'), (2, 'B-1')",
    "UPDATE orders SET price = 12.50 WHERE id = 1",
    "CREATE TABLE users (id INTEGER PRIMARY KEY, login VARCHAR(32) NOT NULL, secret VARCHAR(128))",
    "INSERT INTO users (id, login, secret) VALUES (1, 'root', 'old-hash')",
];

pub const ORDER: &str = r#"{
    "pageTitle": "Orders",
    "dbTable": "orders",
    "fields": ["id", "customerId", "status", "notes", "createdAt", "isActive", "itemCount", "edit"],
    "orderBy": "id",
    "headers": {"customerId": "Customer"},
    "relatedData": {"customerId": "customers.name"},
    "dateTimeFields": {"createdAt": "%d.%m.%Y"},
    "addableFields": ["customerId", "status", "email", "qty", "notes"],
    "requiredFields": ["email"],
    "editableFields": ["status", "notes", "qty", "isActive"],
    "noZeroValueFields": ["qty"],
    "countRelatedData": {"itemCount": {"localFieldID": "id", "table": "order_items", "targetFieldID": "order_id"}},
    "columnDataFunc": {"edit": "stdRecordControls"},
    "links": {"id": {"preset": "self"}}
}"#;

pub const ORDER_ITEM: &str = r#"{
    "pageTitle": "Order items",
    "dbTable": "order_items",
    "fields": ["id", "sku"],
    "addableFields": ["sku"],
    "editableFields": ["sku"],
    "parent": {"modelName": "Order", "localConnectionField": "order_id", "queryVariableName": "order_id"},
    "sqlWhere": "order_id = {{order_id}}"
}"#;

pub const USER: &str = r#"{
    "pageTitle": "Users",
    "dbTable": "users",
    "fields": ["id", "login"],
    "addableFields": ["login", "secret"],
    "editableFields": ["login", "secret"],
    "passwordFields": ["secret"]
}"#;

/// Wraps the SQLite backend and records every statement it runs with its parameters.
pub struct RecordingDb {
    inner: SqliteDatabase,
    log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl RecordingDb {
    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|(sql, _)| sql.contains(needle)).count()
    }

    /// Parameters of every statement containing `needle`, in order.
    pub fn params_of(&self, needle: &str) -> Vec<Vec<Value>> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(sql, _)| sql.contains(needle))
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        self.inner.pool()
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.log.lock().unwrap().push((sql.to_string(), params.to_vec()));
    }
}

#[async_trait]
impl Database for RecordingDb {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, sqlx::Error> {
        self.record(sql, params);
        self.inner.fetch_all(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, sqlx::Error> {
        self.record(sql, params);
        self.inner.execute(sql, params).await
    }
}

pub struct Fixture {
    pub db: Arc<RecordingDb>,
    pub source: Arc<MemoryConfigSource>,
    pub service: Arc<AdminService>,
}

impl Fixture {
    /// Replace a declaration; `tick` distinguishes timestamps.
    pub fn declare(&self, entity: &str, json: &str, tick: u64) {
        self.source
            .set(entity, json, SystemTime::UNIX_EPOCH + Duration::from_secs(1_000 + tick));
    }

    pub async fn scalar(&self, sql: &str) -> Value {
        let row = self.db.inner.fetch_optional(sql, &[]).await.unwrap().unwrap();
        row.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null)
    }
}

pub async fn fixture(hooks: Hooks) -> Fixture {
    fixture_with(hooks, Settings::default()).await
}

/// Resolves `{{name}}` from the query string, quoted unless it is an integer.
pub fn query_variables(ctx: &RequestContext, _entity: &str, name: &str) -> Option<String> {
    ctx.query_param(name).map(sql_literal)
}

pub async fn fixture_with(mut hooks: Hooks, settings: Settings) -> Fixture {
    if hooks.variables.is_none() {
        hooks = hooks.with_variables(query_variables);
    }
    build(hooks, settings).await
}

/// Fixture whose hooks are used as given, without the query-string variable resolver.
pub async fn fixture_without_variables(hooks: Hooks) -> Fixture {
    build(hooks, Settings::default()).await
}

async fn build(hooks: Hooks, settings: Settings) -> Fixture {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }
    let db = Arc::new(RecordingDb {
        inner: SqliteDatabase::new(pool),
        log: Mutex::new(Vec::new()),
    });
    let source = Arc::new(MemoryConfigSource::new());
    let service = AdminService::with_source(db.clone(), settings, hooks, source.clone());
    let fx = Fixture {
        db,
        source,
        service: Arc::new(service),
    };
    fx.declare("Order", ORDER, 0);
    fx.declare("OrderItem", ORDER_ITEM, 0);
    fx.declare("User", USER, 0);
    fx
}

pub fn payload(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => panic!("payload must be an object"),
    }
}
