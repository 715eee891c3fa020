//! Gather loop tests against an in-memory database

use pgq_core::{
    Collector, CollectError, CollectResult, Database, MetricBuffer, MetricValue, QuerySpec,
    RowCursor, Scanner, SqlValue,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A row that either scans cleanly or fails
#[derive(Clone)]
enum MockRow {
    Values(Vec<SqlValue>),
    Broken(&'static str),
}

impl Scanner for MockRow {
    fn scan(&self, _columns: &[String]) -> CollectResult<Vec<SqlValue>> {
        match self {
            MockRow::Values(values) => Ok(values.clone()),
            MockRow::Broken(msg) => Err(CollectError::ScanError(msg.to_string())),
        }
    }
}

#[derive(Clone)]
enum MockResult {
    Rows {
        columns: Vec<&'static str>,
        rows: Vec<MockRow>,
    },
    Fail(&'static str),
}

#[derive(Default)]
struct MockDb {
    results: HashMap<String, MockResult>,
    refuse_connection: bool,
    connects: usize,
    connected: bool,
    executed: Vec<String>,
    open_cursors: Arc<AtomicUsize>,
}

impl MockDb {
    fn with(mut self, sql: &str, result: MockResult) -> Self {
        self.results.insert(sql.to_string(), result);
        self
    }
}

struct MockCursor {
    columns: Vec<String>,
    rows: VecDeque<MockRow>,
    open: Arc<AtomicUsize>,
}

impl Drop for MockCursor {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl RowCursor for MockCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next_row(&mut self) -> CollectResult<Option<Box<dyn Scanner + Send>>> {
        Ok(self
            .rows
            .pop_front()
            .map(|row| Box::new(row) as Box<dyn Scanner + Send>))
    }
}

#[async_trait::async_trait]
impl Database for MockDb {
    async fn ensure_connected(&mut self) -> CollectResult<()> {
        if self.refuse_connection {
            return Err(CollectError::ConnectionError("connection refused".into()));
        }
        if !self.connected {
            self.connected = true;
            self.connects += 1;
        }
        Ok(())
    }

    async fn query<'a>(&'a mut self, sql: &'a str) -> CollectResult<Box<dyn RowCursor + 'a>> {
        self.executed.push(sql.to_string());
        match self.results.get(sql).cloned() {
            Some(MockResult::Rows { columns, rows }) => {
                self.open_cursors.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(MockCursor {
                    columns: columns.into_iter().map(String::from).collect(),
                    rows: rows.into(),
                    open: Arc::clone(&self.open_cursors),
                }))
            }
            Some(MockResult::Fail(msg)) => Err(CollectError::QueryExecutionError(msg.into())),
            None => Err(CollectError::QueryExecutionError(format!(
                "relation does not exist: {sql}"
            ))),
        }
    }

    async fn close(&mut self) {
        self.connected = false;
    }
}

fn values(values: Vec<SqlValue>) -> MockRow {
    MockRow::Values(values)
}

fn pg_stat_database() -> MockResult {
    MockResult::Rows {
        columns: vec!["datname", "numbackends", "stats_reset"],
        rows: vec![
            values(vec!["mydb".into(), 5i64.into(), SqlValue::Null]),
            values(vec!["template1".into(), 0i64.into(), SqlValue::Null]),
        ],
    }
}

#[tokio::test]
async fn test_pg_stat_database_scenario() {
    let db = MockDb::default().with("SELECT * FROM pg_stat_database", pg_stat_database());
    let mut collector = Collector::new(db, vec![QuerySpec::new("SELECT * FROM pg_stat_database")]);
    let mut acc = MetricBuffer::new();

    collector.gather(&mut acc).await.unwrap();

    let metrics = acc.drain();
    assert_eq!(metrics.len(), 2);
    let first = &metrics[0];
    assert_eq!(first.measurement, "postgresql");
    assert_eq!(first.tags.len(), 1);
    assert_eq!(first.tags["db"], "mydb");
    assert_eq!(first.fields.len(), 1);
    assert_eq!(first.fields["numbackends"], MetricValue::Integer(5));
    assert_eq!(metrics[1].tags["db"], "template1");
}

#[tokio::test]
async fn test_fallback_db_tag_and_measurement_override() {
    let db = MockDb::default().with(
        "SELECT count(*) AS count FROM pg_stat_activity",
        MockResult::Rows {
            columns: vec!["count"],
            rows: vec![values(vec![42i64.into()])],
        },
    );
    let spec = QuerySpec::new("SELECT count(*) AS count FROM pg_stat_activity")
        .with_measurement("pg_activity");
    let mut collector = Collector::new(db, vec![spec]);
    let mut acc = MetricBuffer::new();

    collector.gather(&mut acc).await.unwrap();

    let metric = &acc.metrics()[0];
    assert_eq!(metric.measurement, "pg_activity");
    assert_eq!(metric.tags["db"], "postgres");
    assert_eq!(metric.fields["count"], MetricValue::Integer(42));
}

#[tokio::test]
async fn test_failing_query_aborts_gather() {
    let db = MockDb::default()
        .with("SELECT * FROM pg_stat_database", pg_stat_database())
        .with("SELECT * FROM missing", MockResult::Fail("permission denied"))
        .with(
            "SELECT 1 AS one",
            MockResult::Rows {
                columns: vec!["one"],
                rows: vec![values(vec![1i64.into()])],
            },
        );
    let open = Arc::clone(&db.open_cursors);
    let mut collector = Collector::new(
        db,
        vec![
            QuerySpec::new("SELECT * FROM pg_stat_database"),
            QuerySpec::new("SELECT * FROM missing"),
            QuerySpec::new("SELECT 1 AS one"),
        ],
    );
    let mut acc = MetricBuffer::new();

    let err = collector.gather(&mut acc).await.unwrap_err();

    assert!(matches!(err, CollectError::QueryExecutionError(_)));
    // Only rows of the first query reached the accumulator
    assert_eq!(acc.len(), 2);
    assert!(acc.metrics().iter().all(|m| !m.fields.contains_key("one")));
    assert_eq!(
        collector.database().executed,
        vec!["SELECT * FROM pg_stat_database", "SELECT * FROM missing"]
    );
    assert_eq!(open.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_scan_error_aborts_remaining_rows_and_queries() {
    let db = MockDb::default()
        .with(
            "SELECT * FROM pg_stat_bgwriter",
            MockResult::Rows {
                columns: vec!["checkpoints_timed"],
                rows: vec![
                    values(vec![10i64.into()]),
                    MockRow::Broken("column type mismatch"),
                    values(vec![12i64.into()]),
                ],
            },
        )
        .with("SELECT * FROM pg_stat_database", pg_stat_database());
    let open = Arc::clone(&db.open_cursors);
    let mut collector = Collector::new(
        db,
        vec![
            QuerySpec::new("SELECT * FROM pg_stat_bgwriter"),
            QuerySpec::new("SELECT * FROM pg_stat_database"),
        ],
    );
    let mut acc = MetricBuffer::new();

    let err = collector.gather(&mut acc).await.unwrap_err();

    assert!(matches!(err, CollectError::ScanError(_)));
    assert_eq!(collector.database().executed.len(), 1);
    assert_eq!(acc.len(), 1);
    assert_eq!(
        acc.metrics()[0].fields["checkpoints_timed"],
        MetricValue::Integer(10)
    );
    assert_eq!(open.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_tag_conversion_tolerated_but_scan_error_is_not() {
    // A float targeted as a tag only drops that column...
    let db = MockDb::default().with(
        "SELECT ratio, calls FROM stats",
        MockResult::Rows {
            columns: vec!["ratio", "calls"],
            rows: vec![values(vec![0.5f64.into(), 3i64.into()])],
        },
    );
    let mut collector = Collector::new(
        db,
        vec![QuerySpec::new("SELECT ratio, calls FROM stats").with_tags("ratio")],
    );
    let mut acc = MetricBuffer::new();
    collector.gather(&mut acc).await.unwrap();
    let metric = &acc.metrics()[0];
    assert!(!metric.tags.contains_key("ratio"));
    assert!(!metric.fields.contains_key("ratio"));
    assert_eq!(metric.fields["calls"], MetricValue::Integer(3));

    // ...while a row that fails to scan aborts the cycle
    let db = MockDb::default().with(
        "SELECT ratio, calls FROM stats",
        MockResult::Rows {
            columns: vec!["ratio", "calls"],
            rows: vec![MockRow::Broken("bad value")],
        },
    );
    let mut collector = Collector::new(
        db,
        vec![QuerySpec::new("SELECT ratio, calls FROM stats").with_tags("ratio")],
    );
    let mut acc = MetricBuffer::new();
    assert!(collector.gather(&mut acc).await.is_err());
    assert!(acc.is_empty());
}

#[tokio::test]
async fn test_connection_error_runs_no_queries() {
    let db = MockDb {
        refuse_connection: true,
        ..Default::default()
    }
    .with("SELECT * FROM pg_stat_database", pg_stat_database());
    let mut collector = Collector::new(db, vec![QuerySpec::new("SELECT * FROM pg_stat_database")]);
    let mut acc = MetricBuffer::new();

    let err = collector.gather(&mut acc).await.unwrap_err();

    assert!(matches!(err, CollectError::ConnectionError(_)));
    assert!(acc.is_empty());
    assert!(collector.database().executed.is_empty());
}

#[tokio::test]
async fn test_tag_columns_are_per_query() {
    let db = MockDb::default()
        .with(
            "SELECT state, count FROM activity",
            MockResult::Rows {
                columns: vec!["state", "count"],
                rows: vec![values(vec!["idle".into(), 4i64.into()])],
            },
        )
        .with(
            "SELECT state, waiting FROM locks",
            MockResult::Rows {
                columns: vec!["state", "waiting"],
                rows: vec![values(vec!["granted".into(), false.into()])],
            },
        );
    let mut collector = Collector::new(
        db,
        vec![
            QuerySpec::new("SELECT state, count FROM activity").with_tags("state"),
            QuerySpec::new("SELECT state, waiting FROM locks"),
        ],
    );
    let mut acc = MetricBuffer::new();

    collector.gather(&mut acc).await.unwrap();

    let metrics = acc.drain();
    assert_eq!(metrics[0].tags["state"], "idle");
    assert_eq!(metrics[0].fields["count"], MetricValue::Integer(4));
    assert!(!metrics[1].tags.contains_key("state"));
    assert_eq!(
        metrics[1].fields["state"],
        MetricValue::String("granted".into())
    );
    assert_eq!(metrics[1].fields["waiting"], MetricValue::Bool(false));
}

#[tokio::test]
async fn test_connection_reused_across_gathers() {
    let db = MockDb::default().with("SELECT * FROM pg_stat_database", pg_stat_database());
    let mut collector = Collector::new(db, vec![QuerySpec::new("SELECT * FROM pg_stat_database")]);
    let mut acc = MetricBuffer::new();

    collector.gather(&mut acc).await.unwrap();
    collector.gather(&mut acc).await.unwrap();

    assert_eq!(acc.len(), 4);
    assert_eq!(collector.database().connects, 1);

    collector.close().await;
    assert!(!collector.database().connected);
}

#[tokio::test]
async fn test_row_without_fields_is_still_emitted() {
    let db = MockDb::default().with(
        "SELECT datname, state FROM activity",
        MockResult::Rows {
            columns: vec!["datname", "state"],
            rows: vec![values(vec!["mydb".into(), SqlValue::Null])],
        },
    );
    let mut collector = Collector::new(
        db,
        vec![QuerySpec::new("SELECT datname, state FROM activity")],
    );
    let mut acc = MetricBuffer::new();

    collector.gather(&mut acc).await.unwrap();

    assert_eq!(acc.len(), 1);
    assert!(acc.metrics()[0].fields.is_empty());
    assert_eq!(acc.metrics()[0].tags["db"], "mydb");
}
