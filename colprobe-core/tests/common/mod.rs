//! In-memory query engine for exercising probe runs without a server.
//!
//! Answers are keyed by the exact statement text, built with the same query
//! builders the prober uses. Every statement any connection receives is
//! recorded in arrival order.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use async_trait::async_trait;
use colprobe_core::engine::{Connection, ConnectionPool, EngineResult};
use colprobe_core::probe::{metadata_query, probe_query};
use colprobe_core::{EngineError, EngineKind, ProbeError, TableRef, WorkItem};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CATALOG: &str = "lake";

/// How a scripted statement behaves.
#[derive(Debug, Clone)]
pub enum Answer {
    Rows(Vec<String>),
    Error(String),
    /// Never completes
    Stall,
    /// Panics the task running it
    Panic,
}

#[derive(Default)]
struct Inner {
    answers: HashMap<String, Answer>,
    statements: Mutex<Vec<String>>,
    acquired: AtomicUsize,
    fail_acquire_at: Option<usize>,
    capacity: usize,
}

/// Cloneable handle to the scripted engine.
#[derive(Clone)]
pub struct MemoryPool {
    inner: Arc<Inner>,
}

pub struct MemoryPoolBuilder {
    inner: Inner,
}

impl MemoryPool {
    pub fn builder() -> MemoryPoolBuilder {
        MemoryPoolBuilder {
            inner: Inner {
                capacity: 100,
                ..Default::default()
            },
        }
    }

    /// Every statement received so far, in arrival order.
    pub fn statements(&self) -> Vec<String> {
        self.inner.statements.lock().unwrap().clone()
    }

    /// Statements that were column probes rather than metadata lookups.
    pub fn probe_statements(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| !s.contains("information_schema"))
            .collect()
    }

    pub fn metadata_statements(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| s.contains("information_schema"))
            .collect()
    }

    /// Number of successful and failed acquire attempts.
    pub fn acquire_attempts(&self) -> usize {
        self.inner.acquired.load(Ordering::SeqCst)
    }

    pub fn shared(&self) -> Arc<dyn ConnectionPool> {
        Arc::new(self.clone())
    }
}

pub fn table_ref(schema: &str, table: &str) -> TableRef {
    WorkItem::new(schema, table).in_catalog(CATALOG)
}

impl MemoryPoolBuilder {
    /// A table whose columns all read back fine.
    pub fn table(self, schema: &str, table: &str, columns: &[&str]) -> Self {
        let answers: Vec<(&str, Answer)> = columns
            .iter()
            .map(|c| (*c, Answer::Rows(vec!["1".to_string()])))
            .collect();
        self.table_with(schema, table, answers)
    }

    /// A table with a scripted answer per column.
    pub fn table_with(mut self, schema: &str, table: &str, columns: Vec<(&str, Answer)>) -> Self {
        let table = table_ref(schema, table);
        self.inner.answers.insert(
            metadata_query(&table),
            Answer::Rows(columns.iter().map(|(c, _)| c.to_string()).collect()),
        );
        for (column, answer) in columns {
            self.inner
                .answers
                .insert(probe_query(&table, column), answer);
        }
        self
    }

    /// A table whose metadata query fails.
    pub fn broken_table(mut self, schema: &str, table: &str, error: &str) -> Self {
        self.inner.answers.insert(
            metadata_query(&table_ref(schema, table)),
            Answer::Error(error.to_string()),
        );
        self
    }

    /// Makes the `n`th acquire (0-based) fail.
    pub fn fail_acquire_at(mut self, n: usize) -> Self {
        self.inner.fail_acquire_at = Some(n);
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.inner.capacity = capacity;
        self
    }

    pub fn build(self) -> MemoryPool {
        MemoryPool {
            inner: Arc::new(self.inner),
        }
    }
}

#[async_trait]
impl ConnectionPool for MemoryPool {
    async fn acquire(&self) -> colprobe_core::Result<Box<dyn Connection>> {
        let attempt = self.inner.acquired.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_acquire_at == Some(attempt) {
            return Err(ProbeError::connection_timeout(
                self.describe(),
                Duration::from_secs(30),
            ));
        }
        Ok(Box::new(MemoryConnection {
            inner: Arc::clone(&self.inner),
        }))
    }

    fn capacity(&self) -> usize {
        self.inner.capacity
    }

    fn describe(&self) -> String {
        "memory://lake".to_string()
    }

    fn engine(&self) -> EngineKind {
        EngineKind::Trino
    }
}

struct MemoryConnection {
    inner: Arc<Inner>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn fetch_column(&mut self, sql: &str) -> EngineResult<Vec<String>> {
        self.inner.statements.lock().unwrap().push(sql.to_string());
        match self.inner.answers.get(sql).cloned() {
            // Unknown tables look like they do on a real engine: no columns.
            None if sql.contains("information_schema") => Ok(Vec::new()),
            None => Err(EngineError::query(format!("line 1:8: Table does not exist: {sql}"))),
            Some(Answer::Rows(rows)) => Ok(rows),
            Some(Answer::Error(message)) => Err(EngineError::query(message)),
            Some(Answer::Stall) => std::future::pending().await,
            Some(Answer::Panic) => panic!("engine exploded on {sql}"),
        }
    }

    async fn execute(&mut self, sql: &str) -> EngineResult<u64> {
        self.fetch_column(sql).await.map(|rows| rows.len() as u64)
    }
}

/// `count` tables named `t000`, `t001`, ... in schema `s`, each with
/// `columns` columns `c0`, `c1`, ...
pub fn many_tables(count: usize, columns: usize) -> (MemoryPoolBuilder, Vec<WorkItem>) {
    let names: Vec<String> = (0..columns).map(|i| format!("c{i}")).collect();
    let column_refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let mut builder = MemoryPool::builder();
    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        let table = format!("t{i:03}");
        builder = builder.table("s", &table, &column_refs);
        items.push(WorkItem::new("s", table));
    }
    (builder, items)
}
