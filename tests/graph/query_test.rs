// tests/graph/query_test.rs
use schemagraph::graph::{Category, CodeColumn, GraphBuilder, KnowledgeGraph};
use schemagraph::metadata::{ForeignKeyInfo, IndexInfo, SnapshotSource, TableSnapshot};

async fn build(tables: Vec<TableSnapshot>) -> KnowledgeGraph {
    let source = SnapshotSource::from_tables(tables);
    GraphBuilder::default().build(&source).await.unwrap().graph
}

/// customers <- orders <- order_items -> products -> lkp_product_type
/// plus an isolated `settings` table.
async fn create_test_graph() -> KnowledgeGraph {
    build(vec![
        TableSnapshot::new("customers")
            .column("id", "INTEGER", false)
            .column("name", "VARCHAR(100)", true)
            .column("status_cd", "CHAR(1)", true)
            .primary_key(["id"])
            .index(IndexInfo::new("ux_customers_name", ["name"], true))
            .rows(50),
        TableSnapshot::new("orders")
            .column("id", "INTEGER", false)
            .column("customer_id", "INTEGER", false)
            .column("placed_at", "TIMESTAMP", false)
            .primary_key(["id"])
            .foreign_key("customer_id", "customers", "id")
            .rows(500),
        TableSnapshot::new("order_items")
            .column("order_id", "INTEGER", false)
            .column("product_id", "INTEGER", false)
            .column("quantity", "INTEGER", false)
            .foreign_key("order_id", "orders", "id")
            .foreign_key("product_id", "products", "id")
            .rows(2000),
        TableSnapshot::new("products")
            .column("id", "INTEGER", false)
            .column("product_type", "VARCHAR(10)", false)
            .primary_key(["id"])
            .foreign_key("product_type", "lkp_product_type", "code")
            .rows(20),
        TableSnapshot::new("lkp_product_type")
            .column("code", "VARCHAR(10)", false)
            .column("label", "TEXT", false)
            .primary_key(["code"])
            .rows(4),
        TableSnapshot::new("lkp_status")
            .column("code", "CHAR(1)", false)
            .rows(3),
        TableSnapshot::new("settings")
            .column("key", "TEXT", false)
            .column("value", "TEXT", true)
            .rows(7),
    ])
    .await
}

#[tokio::test]
async fn test_nonexistent_table_has_no_context() {
    let graph = create_test_graph().await;
    assert!(graph.table_context("nonexistent_table", 2).is_none());
}

#[tokio::test]
async fn test_orders_context() {
    let graph = create_test_graph().await;
    let ctx = graph.table_context("orders", 1).unwrap();

    assert_eq!(ctx.table_name, "orders");
    assert_eq!(ctx.row_count, 500);
    assert_eq!(ctx.categories, vec![Category::Transaction]);

    let columns: Vec<&str> = ctx.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, vec!["id", "customer_id", "placed_at"]);
    assert_eq!(ctx.primary_keys, vec!["id"]);

    assert_eq!(ctx.foreign_keys.len(), 1);
    assert_eq!(ctx.foreign_keys[0].references_table, "customers");
    assert_eq!(ctx.foreign_keys[0].columns, vec!["customer_id"]);
    assert_eq!(ctx.foreign_keys[0].ref_columns, vec!["id"]);

    assert_eq!(ctx.referenced_by.len(), 1);
    assert_eq!(ctx.referenced_by[0].from_table, "order_items");
    assert_eq!(ctx.referenced_by[0].columns, vec!["order_id"]);
    assert_eq!(ctx.referenced_by[0].ref_columns, vec!["id"]);

    assert_eq!(ctx.related_tables, vec!["customers", "order_items"]);
    assert!(ctx.semantic_cluster.is_empty());
}

#[tokio::test]
async fn test_customers_context_lists_indexes_and_code_columns() {
    let graph = create_test_graph().await;
    let ctx = graph.table_context("customers", 1).unwrap();

    assert_eq!(ctx.indexes.len(), 1);
    assert_eq!(ctx.indexes[0].name, "ux_customers_name");
    assert!(ctx.indexes[0].unique);
    assert_eq!(
        ctx.code_columns,
        vec![CodeColumn {
            column: "status_cd".to_string(),
            lookup_table: Some("lkp_status".to_string()),
        }]
    );
}

#[tokio::test]
async fn test_code_column_prefers_foreign_key_to_lookup_table() {
    let graph = create_test_graph().await;
    let ctx = graph.table_context("products", 1).unwrap();

    assert_eq!(
        ctx.code_columns,
        vec![CodeColumn {
            column: "product_type".to_string(),
            lookup_table: Some("lkp_product_type".to_string()),
        }]
    );
}

#[tokio::test]
async fn test_isolated_table_context_is_empty_but_valid() {
    let graph = create_test_graph().await;
    let ctx = graph.table_context("settings", 3).unwrap();

    assert_eq!(ctx.columns.len(), 2);
    assert!(ctx.foreign_keys.is_empty());
    assert!(ctx.referenced_by.is_empty());
    assert!(ctx.related_tables.is_empty());
    assert!(ctx.indexes.is_empty());
    assert!(ctx.semantic_cluster.is_empty());
    assert!(ctx.categories.is_empty());
}

#[tokio::test]
async fn test_semantic_cluster_grows_with_depth() {
    let graph = create_test_graph().await;

    let depth2 = graph.table_context("orders", 2).unwrap().semantic_cluster;
    assert_eq!(depth2, vec!["customers", "order_items", "products"]);

    let depth3 = graph.table_context("orders", 3).unwrap().semantic_cluster;
    assert_eq!(
        depth3,
        vec!["customers", "order_items", "products", "lkp_product_type"]
    );
    assert!(!depth3.contains(&"orders".to_string()));
    assert!(!depth3.contains(&"settings".to_string()));
}

#[tokio::test]
async fn test_fk_pair_has_direct_path() {
    let graph = create_test_graph().await;

    assert_eq!(
        graph.find_path("orders", "customers").unwrap(),
        vec!["orders", "customers"]
    );
    // undirected: the referenced side finds its way back
    assert_eq!(
        graph.find_path("customers", "orders").unwrap(),
        vec!["customers", "orders"]
    );
}

#[tokio::test]
async fn test_multi_hop_path() {
    let graph = create_test_graph().await;

    assert_eq!(
        graph.find_path("customers", "lkp_product_type").unwrap(),
        vec![
            "customers",
            "orders",
            "order_items",
            "products",
            "lkp_product_type"
        ]
    );
}

#[tokio::test]
async fn test_path_edge_cases() {
    let graph = create_test_graph().await;

    assert_eq!(graph.find_path("orders", "orders").unwrap(), vec!["orders"]);
    assert!(graph.find_path("orders", "settings").is_none());
    assert!(graph.find_path("orders", "ghost").is_none());
    assert!(graph.find_path("ghost", "ghost").is_none());
}

#[tokio::test]
async fn test_path_follows_named_foreign_key() {
    let graph = build(vec![
        TableSnapshot::new("a").column("id", "INTEGER", false).rows(0),
        TableSnapshot::new("b")
            .column("a_id", "INTEGER", false)
            .foreign_key_info(ForeignKeyInfo::new(Some("fk_b_a"), ["a_id"], "a", ["id"]))
            .rows(0),
    ])
    .await;

    assert_eq!(graph.find_path("a", "b").unwrap(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_statistics() {
    let graph = create_test_graph().await;
    let stats = graph.statistics();

    assert_eq!(stats.total_tables, 7);
    assert_eq!(stats.node_types["TABLE"], 7);
    assert_eq!(stats.node_types["COLUMN"], 16);
    assert_eq!(stats.node_types["INDEX"], 1);
    assert_eq!(stats.total_nodes, 24);
    assert_eq!(stats.edge_types["HAS_COLUMN"], 16);
    assert_eq!(stats.edge_types["REFERENCES"], 4);
    assert_eq!(stats.edge_types["FK_REFERENCES"], 4);
    assert_eq!(stats.edge_types["INDEXES"], 1);
    assert_eq!(stats.total_edges, 25);
    assert_eq!(stats.category_distribution["LOOKUP"], 2);
    assert_eq!(stats.category_distribution["JUNCTION"], 1);
}

#[tokio::test]
async fn test_context_serializes_without_node_ids() {
    let graph = create_test_graph().await;
    let ctx = graph.table_context("order_items", 2).unwrap();

    let json = serde_json::to_string(&ctx).unwrap();
    assert!(!json.contains("table:"));
    assert!(!json.contains("column:"));
    assert!(json.contains("\"JUNCTION\""));
}
