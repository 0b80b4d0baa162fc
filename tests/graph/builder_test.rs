// tests/graph/builder_test.rs
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use schemagraph::graph::export::to_json;
use schemagraph::graph::{
    column_id, BuildConfig, BuildError, Category, EdgeKind, EntityKind, GraphBuilder,
    KnowledgeGraph, NodeKind,
};
use schemagraph::metadata::{
    ColumnInfo, ForeignKeyInfo, IndexInfo, SchemaSource, SnapshotSource, SourceError,
    SourceResult, TableSnapshot,
};

/// Snapshot source with injectable failures.
#[derive(Default)]
struct ScriptedSource {
    inner: SnapshotSource,
    fail_list: bool,
    fail_columns: HashSet<String>,
    fail_foreign_keys: HashSet<String>,
    row_count_delay: Option<Duration>,
    row_count_calls: AtomicUsize,
    columns_delay: Option<Duration>,
    columns_in_flight: AtomicUsize,
    columns_peak: AtomicUsize,
}

impl ScriptedSource {
    fn new(tables: Vec<TableSnapshot>) -> Self {
        Self {
            inner: SnapshotSource::from_tables(tables),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SchemaSource for ScriptedSource {
    async fn list_tables(&self) -> SourceResult<Vec<String>> {
        if self.fail_list {
            return Err(SourceError::Connection("connection refused".to_string()));
        }
        self.inner.list_tables().await
    }

    async fn get_columns(&self, table: &str) -> SourceResult<Vec<ColumnInfo>> {
        if self.fail_columns.contains(table) {
            return Err(SourceError::Query(format!("permission denied on {}", table)));
        }
        if let Some(delay) = self.columns_delay {
            let now = self.columns_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.columns_peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.columns_in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        self.inner.get_columns(table).await
    }

    async fn get_primary_key(&self, table: &str) -> SourceResult<Vec<String>> {
        self.inner.get_primary_key(table).await
    }

    async fn get_foreign_keys(&self, table: &str) -> SourceResult<Vec<ForeignKeyInfo>> {
        if self.fail_foreign_keys.contains(table) {
            return Err(SourceError::Unsupported("foreign keys"));
        }
        self.inner.get_foreign_keys(table).await
    }

    async fn get_indexes(&self, table: &str) -> SourceResult<Vec<IndexInfo>> {
        self.inner.get_indexes(table).await
    }

    async fn get_table_comment(&self, table: &str) -> SourceResult<Option<String>> {
        self.inner.get_table_comment(table).await
    }

    async fn get_row_count(&self, table: &str) -> SourceResult<u64> {
        self.row_count_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.row_count_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.get_row_count(table).await
    }
}

fn customers_and_orders() -> Vec<TableSnapshot> {
    vec![
        TableSnapshot::new("customers")
            .column("id", "INTEGER", false)
            .column("name", "VARCHAR(100)", true)
            .primary_key(["id"])
            .comment("People who buy things")
            .rows(100),
        TableSnapshot::new("orders")
            .column("id", "INTEGER", false)
            .column("customer_id", "INTEGER", false)
            .column("total", "DECIMAL(10,2)", true)
            .primary_key(["id"])
            .foreign_key("customer_id", "customers", "id")
            .index(IndexInfo::new("ix_orders_customer", ["customer_id"], false))
            .rows(1000),
    ]
}

fn count_edges(graph: &KnowledgeGraph, kind: EdgeKind) -> usize {
    graph.edges().iter().filter(|e| e.kind() == kind).count()
}

#[tokio::test]
async fn test_customers_orders_scenario() {
    let source = ScriptedSource::new(customers_and_orders());
    let outcome = GraphBuilder::default().build(&source).await.unwrap();
    let graph = &outcome.graph;

    assert_eq!(graph.table_names(), vec!["customers", "orders"]);
    assert_eq!(count_edges(graph, EdgeKind::HasColumn), 5);
    assert_eq!(count_edges(graph, EdgeKind::References), 1);
    assert_eq!(count_edges(graph, EdgeKind::FkReferences), 1);
    assert_eq!(count_edges(graph, EdgeKind::Indexes), 1);

    let reference = graph
        .outgoing_edges("table:orders")
        .find(|e| e.kind() == EdgeKind::References)
        .unwrap();
    assert_eq!(reference.target, "table:customers");
    let props = reference.as_references().unwrap();
    assert_eq!(props.constraint_name, "fk_orders_customer_id");
    assert_eq!(props.columns, vec!["customer_id"]);
    assert_eq!(props.ref_columns, vec!["id"]);

    let fk_column = graph
        .outgoing_edges("column:orders.customer_id")
        .find(|e| e.kind() == EdgeKind::FkReferences)
        .unwrap();
    assert_eq!(fk_column.target, "column:customers.id");

    let customers = graph.table("customers").unwrap().as_table().unwrap();
    assert_eq!(customers.row_count, 100);
    assert_eq!(customers.comment.as_deref(), Some("People who buy things"));

    assert!(graph.categories_of("customers").contains(&Category::Master));
    assert!(graph.categories_of("orders").contains(&Category::Transaction));
    assert!(outcome.stats.skipped.is_empty());
}

#[tokio::test]
async fn test_column_count_matches_has_column_edges() {
    let source = ScriptedSource::new(customers_and_orders());
    let graph = GraphBuilder::default().build(&source).await.unwrap().graph;

    for node in graph.nodes().iter().filter(|n| n.kind() == NodeKind::Table) {
        let has_columns = graph
            .outgoing_edges(&node.node_id)
            .filter(|e| e.kind() == EdgeKind::HasColumn)
            .count();
        assert_eq!(node.as_table().unwrap().column_count, has_columns, "{}", node.name);
    }
}

#[tokio::test]
async fn test_list_tables_failure_is_fatal() {
    let source = ScriptedSource {
        fail_list: true,
        ..ScriptedSource::new(customers_and_orders())
    };

    let err = GraphBuilder::default().build(&source).await.unwrap_err();
    assert!(matches!(err, BuildError::ListTables(SourceError::Connection(_))));
}

#[tokio::test]
async fn test_unreadable_table_is_skipped_with_its_references() {
    let source = ScriptedSource {
        fail_columns: HashSet::from(["customers".to_string()]),
        ..ScriptedSource::new(customers_and_orders())
    };

    let outcome = GraphBuilder::default().build(&source).await.unwrap();

    assert!(!outcome.graph.has_table("customers"));
    assert!(outcome.graph.has_table("orders"));
    assert_eq!(count_edges(&outcome.graph, EdgeKind::References), 0);

    let kinds: Vec<EntityKind> = outcome.stats.skipped.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![EntityKind::Table, EntityKind::ForeignKey]);
    assert_eq!(outcome.stats.skipped[0].table, "customers");
}

#[tokio::test]
async fn test_foreign_key_failure_only_drops_foreign_keys() {
    let source = ScriptedSource {
        fail_foreign_keys: HashSet::from(["orders".to_string()]),
        ..ScriptedSource::new(customers_and_orders())
    };

    let outcome = GraphBuilder::default().build(&source).await.unwrap();

    assert!(outcome.graph.has_table("orders"));
    assert_eq!(count_edges(&outcome.graph, EdgeKind::HasColumn), 5);
    assert_eq!(count_edges(&outcome.graph, EdgeKind::References), 0);
    assert_eq!(outcome.stats.skipped.len(), 1);
    assert_eq!(outcome.stats.skipped[0].kind, EntityKind::ForeignKey);
}

#[tokio::test]
async fn test_slow_row_count_times_out_to_zero() {
    let source = ScriptedSource {
        row_count_delay: Some(Duration::from_millis(500)),
        ..ScriptedSource::new(customers_and_orders())
    };
    let builder = GraphBuilder::new(BuildConfig {
        row_count_timeout: Duration::from_millis(10),
        ..Default::default()
    });

    let outcome = builder.build(&source).await.unwrap();

    let orders = outcome.graph.table("orders").unwrap().as_table().unwrap();
    assert_eq!(orders.row_count, 0);
    assert_eq!(orders.column_count, 3);
    assert!(outcome
        .stats
        .skipped
        .iter()
        .all(|s| s.kind == EntityKind::RowCount && s.reason.contains("timed out")));
    assert_eq!(outcome.stats.skipped.len(), 2);
}

#[tokio::test]
async fn test_row_counts_can_be_disabled() {
    let source = ScriptedSource::new(customers_and_orders());
    let builder = GraphBuilder::new(BuildConfig {
        collect_row_counts: false,
        ..Default::default()
    });

    let outcome = builder.build(&source).await.unwrap();

    assert_eq!(source.row_count_calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.graph.table("orders").unwrap().as_table().unwrap().row_count, 0);
    assert!(outcome.stats.skipped.is_empty());
}

#[tokio::test]
async fn test_duplicate_table_names_first_wins() {
    let mut tables = customers_and_orders();
    tables.push(TableSnapshot::new("customers").column("other", "TEXT", true));
    let source = ScriptedSource::new(tables);

    let outcome = GraphBuilder::default().build(&source).await.unwrap();

    let customers = outcome.graph.table("customers").unwrap().as_table().unwrap();
    assert_eq!(customers.column_count, 2);
    assert_eq!(outcome.stats.tables, 2);
    assert_eq!(outcome.stats.skipped.len(), 1);
    assert_eq!(outcome.stats.skipped[0].reason, "duplicate table name");
}

#[tokio::test]
async fn test_composite_foreign_key_with_missing_column() {
    let source = ScriptedSource::new(vec![
        TableSnapshot::new("regions")
            .column("country", "CHAR(2)", false)
            .column("code", "CHAR(3)", false)
            .primary_key(["country", "code"])
            .rows(1),
        TableSnapshot::new("stores")
            .column("region_country", "CHAR(2)", false)
            .column("region_code", "CHAR(3)", false)
            .foreign_key_info(ForeignKeyInfo::new(
                Some("fk_store_region"),
                ["region_country", "region_code"],
                "regions",
                ["country", "missing"],
            ))
            .rows(1),
    ]);

    let outcome = GraphBuilder::default().build(&source).await.unwrap();

    assert_eq!(count_edges(&outcome.graph, EdgeKind::References), 1);
    assert_eq!(count_edges(&outcome.graph, EdgeKind::FkReferences), 1);
    assert_eq!(outcome.stats.skipped.len(), 1);
    assert!(outcome.stats.skipped[0].reason.contains("column:regions.missing"));
}

#[tokio::test]
async fn test_build_is_deterministic_across_concurrency() {
    let mut tables = customers_and_orders();
    for i in 0..20 {
        tables.push(
            TableSnapshot::new(format!("audit_{}", i))
                .column("id", "INTEGER", false)
                .column("order_id", "INTEGER", true)
                .foreign_key("order_id", "orders", "id")
                .rows(i),
        );
    }
    let source = ScriptedSource::new(tables);

    let serial = GraphBuilder::new(BuildConfig {
        max_concurrency: 1,
        ..Default::default()
    });
    let parallel = GraphBuilder::new(BuildConfig {
        max_concurrency: 16,
        ..Default::default()
    });

    let a = serial.build(&source).await.unwrap().graph;
    let b = parallel.build(&source).await.unwrap().graph;
    let c = parallel.build(&source).await.unwrap().graph;

    assert_eq!(to_json(&a).unwrap(), to_json(&b).unwrap());
    assert_eq!(to_json(&b).unwrap(), to_json(&c).unwrap());
    assert_eq!(a.categories(), b.categories());
}

#[tokio::test]
async fn test_fetch_concurrency_is_bounded() {
    let tables = (0..12)
        .map(|i| TableSnapshot::new(format!("t{}", i)).column("id", "INTEGER", false).rows(1))
        .collect();
    let source = ScriptedSource {
        columns_delay: Some(Duration::from_millis(20)),
        ..ScriptedSource::new(tables)
    };
    let builder = GraphBuilder::new(BuildConfig {
        max_concurrency: 4,
        ..Default::default()
    });

    let outcome = builder.build(&source).await.unwrap();

    assert_eq!(outcome.stats.tables, 12);
    let peak = source.columns_peak.load(Ordering::SeqCst);
    assert!(peak <= 4, "peak in-flight fetches was {}", peak);
    assert!(peak > 1, "fetches never overlapped");
    assert_eq!(source.columns_in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dotted_names_keep_columns_apart() {
    let source = ScriptedSource::new(vec![
        TableSnapshot::new("a").column("b.c", "TEXT", true).rows(1),
        TableSnapshot::new("a.b").column("c", "INTEGER", false).rows(1),
        TableSnapshot::new("child")
            .column("ref", "INTEGER", false)
            .foreign_key("ref", "a.b", "c")
            .rows(1),
    ]);

    let outcome = GraphBuilder::default().build(&source).await.unwrap();
    let graph = &outcome.graph;

    assert!(outcome.stats.skipped.is_empty());
    for table in ["a", "a.b", "child"] {
        let props = graph.table(table).unwrap().as_table().unwrap();
        let ctx = graph.table_context(table, 1).unwrap();
        assert_eq!(props.column_count, 1, "{}", table);
        assert_eq!(ctx.columns.len(), props.column_count, "{}", table);
    }

    let fk = graph
        .outgoing_edges(&column_id("child", "ref"))
        .find(|e| e.kind() == EdgeKind::FkReferences)
        .unwrap();
    assert_eq!(fk.target, column_id("a.b", "c"));
    assert_eq!(
        graph.node(&fk.target).unwrap().as_column().unwrap().table,
        "a.b"
    );
}

#[tokio::test]
async fn test_duplicate_column_names_first_wins() {
    let source = ScriptedSource::new(vec![TableSnapshot::new("t")
        .column("id", "INTEGER", false)
        .column("id", "TEXT", true)
        .column("name", "TEXT", true)
        .rows(1)]);

    let outcome = GraphBuilder::default().build(&source).await.unwrap();

    let props = outcome.graph.table("t").unwrap().as_table().unwrap();
    let ctx = outcome.graph.table_context("t", 1).unwrap();
    assert_eq!(props.column_count, 2);
    assert_eq!(ctx.columns.len(), 2);
    assert_eq!(ctx.columns[0].data_type, "INTEGER");
    assert_eq!(outcome.stats.skipped.len(), 1);
    assert_eq!(outcome.stats.skipped[0].kind, EntityKind::Column);
    assert_eq!(outcome.stats.skipped[0].reason, "duplicate column name");
}

#[tokio::test]
async fn test_empty_source_builds_empty_graph() {
    let source = ScriptedSource::new(vec![]);
    let outcome = GraphBuilder::default().build(&source).await.unwrap();

    assert_eq!(outcome.graph.node_count(), 0);
    assert_eq!(outcome.graph.edge_count(), 0);
    assert!(outcome.graph.categories().is_empty());
}
