// Integration tests for the query construction controller
//
// Drive the full state machine against a mocked warehouse: table
// identification, knowledge retrieval, join resolution (declared and
// fallback), composition, validation, bounded retries, analysis, and the
// follow-up path.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;

use retailiq::config::config::QueryConfig;
use retailiq::controller::{
    Aggregate, AggregateFunc, ChatEvent, ColumnRef, EventSink, KeywordPlanner, OrderBy, OrderKey,
    OutcomeKind, PlanningContext, QueryController, QueryPlan, QueryPlanner,
};
use retailiq::error::{AppError, Result};
use retailiq::knowledge::{DocumentKnowledgeIndex, FallbackKnowledgeIndex, HashEmbeddingModel, KnowledgeDocument};
use retailiq::models::knowledge::SnippetKind;
use retailiq::models::semantic::SemanticModel;
use retailiq::models::session::Session;
use retailiq::schema::SchemaGraph;
use retailiq::services::session::{SessionService, create_session_service};
use retailiq::storage::memory::{MemorySessionRepository, MemoryTurnRepository};
use retailiq::tools::{ColumnSchema, QueryRow, SqlBackend, TableSchema};

const RETAIL_MODEL: &str = include_str!("../semantic_model.json");

mock! {
    Warehouse {}

    #[async_trait]
    impl SqlBackend for Warehouse {
        async fn describe_table(&self, name: &str) -> Result<TableSchema>;
        async fn execute(&self, sql: &str) -> Result<Vec<QueryRow>>;
    }
}

fn schema_of(table: &str, columns: &[(&str, &str)]) -> TableSchema {
    TableSchema {
        table_name: table.to_string(),
        columns: columns
            .iter()
            .map(|(name, data_type)| ColumnSchema {
                name: name.to_string(),
                data_type: data_type.to_string(),
                nullable: true,
            })
            .collect(),
    }
}

/// Warehouse stub with fixed schemas and canned rows, capturing every
/// executed statement.
struct StubWarehouse {
    schemas: HashMap<String, TableSchema>,
    rows: Vec<QueryRow>,
    executed: Mutex<Vec<String>>,
}

impl StubWarehouse {
    fn new(schemas: Vec<TableSchema>, rows: Vec<QueryRow>) -> Self {
        Self {
            schemas: schemas
                .into_iter()
                .map(|s| (s.table_name.to_ascii_uppercase(), s))
                .collect(),
            rows,
            executed: Mutex::new(Vec::new()),
        }
    }

    fn retail(rows: Vec<QueryRow>) -> Self {
        Self::new(
            vec![
                schema_of(
                    "DIM_CUSTOMER",
                    &[("customer_id", "bigint"), ("customer_name", "text")],
                ),
                schema_of(
                    "FACT_SALES",
                    &[
                        ("sale_id", "bigint"),
                        ("customer_id", "bigint"),
                        ("total_amount", "numeric"),
                    ],
                ),
            ],
            rows,
        )
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl SqlBackend for StubWarehouse {
    async fn describe_table(&self, name: &str) -> Result<TableSchema> {
        self.schemas
            .get(&name.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("table not found: {}", name)))
    }

    async fn execute(&self, sql: &str) -> Result<Vec<QueryRow>> {
        self.executed.lock().push(sql.to_string());
        Ok(self.rows.clone())
    }
}

/// Planner scripted to fixed tables and plans, for tests that pin the
/// language-understanding side down.
struct ScriptedPlanner {
    tables: Vec<String>,
    plan: QueryPlan,
    repairs: Mutex<Vec<String>>,
}

impl ScriptedPlanner {
    fn new(tables: Vec<&str>, plan: QueryPlan) -> Self {
        Self {
            tables: tables.into_iter().map(String::from).collect(),
            plan,
            repairs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl QueryPlanner for ScriptedPlanner {
    async fn identify_tables(&self, _question: &str, _model: &SemanticModel) -> Result<Vec<String>> {
        Ok(self.tables.clone())
    }

    async fn build_plan(&self, _ctx: &PlanningContext) -> Result<QueryPlan> {
        Ok(self.plan.clone())
    }

    async fn repair_plan(
        &self,
        _ctx: &PlanningContext,
        prior_sql: &str,
        _error: &str,
    ) -> Result<QueryPlan> {
        self.repairs.lock().push(prior_sql.to_string());
        Ok(self.plan.clone())
    }
}

fn customer_rows(n: usize) -> Vec<QueryRow> {
    (0..n)
        .map(|i| {
            let mut row = QueryRow::new();
            row.insert("customer_id".into(), json!(i + 1));
            row.insert("customer_name".into(), json!(format!("Customer {}", i + 1)));
            row.insert("sum_total_amount".into(), json!(1000.0 - i as f64 * 100.0));
            row
        })
        .collect()
}

struct Harness {
    controller: QueryController,
    sessions: Arc<dyn SessionService>,
}

async fn harness(
    model_doc: &str,
    backend: Arc<dyn SqlBackend>,
    planner: Arc<dyn QueryPlanner>,
    documents: Vec<KnowledgeDocument>,
) -> Harness {
    let model = SemanticModel::from_str(model_doc).unwrap();
    let schema = Arc::new(SchemaGraph::new(model).unwrap());
    let sessions = create_session_service(
        Arc::new(MemorySessionRepository::new()),
        Arc::new(MemoryTurnRepository::new()),
    );

    let knowledge =
        DocumentKnowledgeIndex::build(documents, Box::new(HashEmbeddingModel::new(64))).await;

    let controller = QueryController::new(
        schema,
        planner,
        sessions.clone(),
        backend,
        Arc::new(FallbackKnowledgeIndex::new(Box::new(knowledge))),
        QueryConfig::default(),
        5,
    );

    Harness { controller, sessions }
}

async fn open_session(sessions: &Arc<dyn SessionService>, id: &str) -> Session {
    sessions
        .load_or_create(Some(id), "analyst", "openai:gpt-4o-mini", false)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_top_five_customers_scenario() {
    let backend = Arc::new(StubWarehouse::retail(customer_rows(5)));
    let h = harness(
        RETAIL_MODEL,
        backend.clone(),
        Arc::new(KeywordPlanner::new()),
        vec![KnowledgeDocument {
            source: "fact_sales_rules.md".into(),
            content: "Revenue is total_amount, already net of discounts.".into(),
            associated_table: Some("FACT_SALES".into()),
            kind: SnippetKind::Rule,
        }],
    ).await;

    let session = open_session(&h.sessions, "scenario").await;
    let outcome = h
        .controller
        .handle_turn(
            &session,
            "Who are the top 5 customers by total purchase amount?",
            &EventSink::detached(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.kind, OutcomeKind::Answered);

    let sql = outcome.sql.unwrap();
    // Declared relationship drives the join.
    assert!(sql.contains(
        "JOIN \"FACT_SALES\" ON \"DIM_CUSTOMER\".\"customer_id\" = \"FACT_SALES\".\"customer_id\""
    ));
    assert!(sql.contains("GROUP BY"));
    assert!(sql.contains("ORDER BY"));
    assert!(sql.contains("DESC"));
    assert!(sql.ends_with("LIMIT 5"));
    assert!(!sql.contains(';'));

    let analysis = outcome.analysis.unwrap();
    assert_eq!(analysis.row_count, 5);
    assert!(analysis.hit_row_cap);

    // The executed statement is the presented one.
    assert_eq!(backend.executed(), vec![sql.clone()]);
    // The answer shows the exact SQL.
    assert!(outcome.answer.contains(&sql));

    // Tool calls were recorded on the assistant turn.
    let history = h.sessions.tool_call_history("scenario", 20).await.unwrap();
    let names: Vec<&str> = history.iter().map(|c| c.tool_name.as_str()).collect();
    assert!(names.contains(&"search_knowledge_base"));
    assert!(names.contains(&"describe_table"));
    assert_eq!(names.last(), Some(&"run_query"));
}

#[tokio::test]
async fn test_unidentifiable_question_clarifies() {
    let backend = Arc::new(StubWarehouse::retail(vec![]));
    let h = harness(
        RETAIL_MODEL,
        backend.clone(),
        Arc::new(KeywordPlanner::new()),
        vec![],
    ).await;

    let session = open_session(&h.sessions, "clarify").await;
    let outcome = h
        .controller
        .handle_turn(&session, "What is the meaning of life?", &EventSink::detached())
        .await
        .unwrap();

    assert_eq!(outcome.kind, OutcomeKind::Clarification);
    assert!(outcome.sql.is_none());
    assert!(backend.executed().is_empty());
}

const UNRELATED_MODEL: &str = r#"{
    "tables": [
        {
            "table_name": "FACT_INVENTORY",
            "table_description": "Inventory snapshots.",
            "Use Case": "Stock analysis.",
            "relationships": []
        },
        {
            "table_name": "FACT_PURCHASE_ORDERS",
            "table_description": "Purchase orders.",
            "Use Case": "Procurement analysis.",
            "relationships": []
        }
    ]
}"#;

#[tokio::test]
async fn test_fallback_join_on_matching_name_and_type() {
    let backend = Arc::new(StubWarehouse::new(
        vec![
            schema_of(
                "FACT_INVENTORY",
                &[("product_id", "bigint"), ("stock_level", "numeric")],
            ),
            schema_of(
                "FACT_PURCHASE_ORDERS",
                &[("product_id", "bigint"), ("order_qty", "numeric")],
            ),
        ],
        vec![customer_rows(1).remove(0)],
    ));

    let plan = QueryPlan {
        tables: vec!["FACT_INVENTORY".into(), "FACT_PURCHASE_ORDERS".into()],
        columns: vec![ColumnRef::new("FACT_INVENTORY", "product_id")],
        ..Default::default()
    };
    let h = harness(
        UNRELATED_MODEL,
        backend.clone(),
        Arc::new(ScriptedPlanner::new(
            vec!["FACT_INVENTORY", "FACT_PURCHASE_ORDERS"],
            plan,
        )),
        vec![],
    ).await;

    let session = open_session(&h.sessions, "fallback").await;
    let outcome = h
        .controller
        .handle_turn(
            &session,
            "Compare inventory against purchase orders",
            &EventSink::detached(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.kind, OutcomeKind::Answered);
    let sql = outcome.sql.unwrap();
    assert!(sql.contains(
        "JOIN \"FACT_PURCHASE_ORDERS\" ON \"FACT_INVENTORY\".\"product_id\" = \"FACT_PURCHASE_ORDERS\".\"product_id\""
    ));
    // Join without aggregation deduplicates.
    assert!(sql.starts_with("SELECT DISTINCT"));
}

#[tokio::test]
async fn test_no_relationship_and_no_matching_columns_clarifies() {
    let backend = Arc::new(StubWarehouse::new(
        vec![
            schema_of("FACT_INVENTORY", &[("inv_key", "bigint")]),
            schema_of("FACT_PURCHASE_ORDERS", &[("po_key", "varchar")]),
        ],
        vec![],
    ));

    let plan = QueryPlan {
        tables: vec!["FACT_INVENTORY".into(), "FACT_PURCHASE_ORDERS".into()],
        columns: vec![ColumnRef::new("FACT_INVENTORY", "inv_key")],
        ..Default::default()
    };
    let h = harness(
        UNRELATED_MODEL,
        backend.clone(),
        Arc::new(ScriptedPlanner::new(
            vec!["FACT_INVENTORY", "FACT_PURCHASE_ORDERS"],
            plan,
        )),
        vec![],
    ).await;

    let session = open_session(&h.sessions, "no-join").await;
    let outcome = h
        .controller
        .handle_turn(&session, "Join these somehow", &EventSink::detached())
        .await
        .unwrap();

    assert_eq!(outcome.kind, OutcomeKind::Clarification);
    assert!(outcome.answer.contains("join"));
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_default_row_cap_injected() {
    let backend = Arc::new(StubWarehouse::retail(customer_rows(2)));
    let plan = QueryPlan {
        tables: vec!["DIM_CUSTOMER".into()],
        columns: vec![ColumnRef::new("DIM_CUSTOMER", "customer_name")],
        ..Default::default()
    };
    let h = harness(
        RETAIL_MODEL,
        backend.clone(),
        Arc::new(ScriptedPlanner::new(vec!["DIM_CUSTOMER"], plan)),
        vec![],
    ).await;

    let session = open_session(&h.sessions, "cap").await;
    let outcome = h
        .controller
        .handle_turn(&session, "Show customers", &EventSink::detached())
        .await
        .unwrap();

    // No explicit limit in the plan: the default cap must appear.
    assert!(outcome.sql.unwrap().ends_with("LIMIT 100"));
}

#[tokio::test]
async fn test_all_rows_request_suppresses_cap() {
    let backend = Arc::new(StubWarehouse::retail(customer_rows(2)));
    let plan = QueryPlan {
        tables: vec!["DIM_CUSTOMER".into()],
        columns: vec![ColumnRef::new("DIM_CUSTOMER", "customer_name")],
        all_rows: true,
        ..Default::default()
    };
    let h = harness(
        RETAIL_MODEL,
        backend.clone(),
        Arc::new(ScriptedPlanner::new(vec!["DIM_CUSTOMER"], plan)),
        vec![],
    ).await;

    let session = open_session(&h.sessions, "all-rows").await;
    let outcome = h
        .controller
        .handle_turn(&session, "Show all customer rows", &EventSink::detached())
        .await
        .unwrap();

    assert!(!outcome.sql.unwrap().to_lowercase().contains("limit"));
}

#[tokio::test]
async fn test_query_errors_retry_twice_then_clarify() {
    let mut mock = MockWarehouse::new();
    mock.expect_describe_table().returning(|name| {
        Ok(schema_of(
            &name.to_ascii_uppercase(),
            &[("customer_id", "bigint"), ("customer_name", "text")],
        ))
    });
    // Initial attempt plus exactly two retries, never more.
    mock.expect_execute()
        .times(3)
        .returning(|_| Err(AppError::Query("relation does not exist".into())));

    let plan = QueryPlan {
        tables: vec!["DIM_CUSTOMER".into()],
        columns: vec![ColumnRef::new("DIM_CUSTOMER", "customer_name")],
        ..Default::default()
    };
    let planner = Arc::new(ScriptedPlanner::new(vec!["DIM_CUSTOMER"], plan));
    let h = harness(RETAIL_MODEL, Arc::new(mock), planner.clone(), vec![]).await;

    let session = open_session(&h.sessions, "retries").await;
    let outcome = h
        .controller
        .handle_turn(&session, "Show customers", &EventSink::detached())
        .await
        .unwrap();

    assert_eq!(outcome.kind, OutcomeKind::Clarification);
    // Each retry got the failing statement as repair context.
    assert_eq!(planner.repairs.lock().len(), 2);
}

#[tokio::test]
async fn test_followup_yes_repairs_prior_statement() {
    let backend = Arc::new(StubWarehouse::retail(customer_rows(5)));
    let plan = QueryPlan {
        tables: vec!["DIM_CUSTOMER".into(), "FACT_SALES".into()],
        columns: vec![ColumnRef::new("DIM_CUSTOMER", "customer_name")],
        aggregates: vec![Aggregate {
            func: AggregateFunc::Sum,
            column: Some(ColumnRef::new("FACT_SALES", "total_amount")),
            alias: "sum_total_amount".into(),
        }],
        order_by: vec![OrderBy {
            key: OrderKey::Alias("sum_total_amount".into()),
            descending: true,
        }],
        row_limit: Some(5),
        ..Default::default()
    };
    let planner = Arc::new(ScriptedPlanner::new(
        vec!["DIM_CUSTOMER", "FACT_SALES"],
        plan,
    ));
    let h = harness(RETAIL_MODEL, backend.clone(), planner.clone(), vec![]).await;

    let session = open_session(&h.sessions, "followup").await;
    let first = h
        .controller
        .handle_turn(&session, "Top 5 customers by revenue", &EventSink::detached())
        .await
        .unwrap();
    assert_eq!(first.kind, OutcomeKind::Answered);
    let first_sql = first.sql.unwrap();

    let second = h
        .controller
        .handle_turn(&session, "yes", &EventSink::detached())
        .await
        .unwrap();
    assert_eq!(second.kind, OutcomeKind::Answered);

    // The repair path recovered the prior statement from the history.
    let repairs = planner.repairs.lock().clone();
    assert!(repairs.iter().any(|prior| prior == &first_sql));
}

#[tokio::test]
async fn test_followup_no_closes_the_thread() {
    let backend = Arc::new(StubWarehouse::retail(customer_rows(3)));
    let plan = QueryPlan {
        tables: vec!["DIM_CUSTOMER".into()],
        columns: vec![ColumnRef::new("DIM_CUSTOMER", "customer_name")],
        ..Default::default()
    };
    let h = harness(
        RETAIL_MODEL,
        backend.clone(),
        Arc::new(ScriptedPlanner::new(vec!["DIM_CUSTOMER"], plan)),
        vec![],
    ).await;

    let session = open_session(&h.sessions, "decline").await;
    h.controller
        .handle_turn(&session, "Show customers", &EventSink::detached())
        .await
        .unwrap();
    let executed_before = backend.executed().len();

    let outcome = h
        .controller
        .handle_turn(&session, "no thanks", &EventSink::detached())
        .await
        .unwrap();

    assert_eq!(outcome.kind, OutcomeKind::Closed);
    assert_eq!(backend.executed().len(), executed_before);
}

#[tokio::test]
async fn test_event_stream_orders_and_terminates() {
    let backend = Arc::new(StubWarehouse::retail(customer_rows(5)));
    let h = harness(
        RETAIL_MODEL,
        backend,
        Arc::new(KeywordPlanner::new()),
        vec![],
    ).await;

    let session = open_session(&h.sessions, "events").await;
    let (tx, mut rx) = mpsc::channel(64);
    let sink = EventSink::new(tx);

    h.controller
        .handle_turn(
            &session,
            "Who are the top 5 customers by total purchase amount?",
            &sink,
        )
        .await
        .unwrap();
    drop(sink);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(events.last(), Some(ChatEvent::Terminal)));
    assert!(events.iter().any(|e| matches!(e, ChatEvent::ToolCall { .. })));
    assert!(events.iter().any(|e| matches!(e, ChatEvent::ContentDelta { .. })));
    // Exactly one terminal marker, and nothing after it.
    let terminals = events
        .iter()
        .filter(|e| matches!(e, ChatEvent::Terminal))
        .count();
    assert_eq!(terminals, 1);
}

#[tokio::test]
async fn test_session_turns_accumulate_across_turns() {
    let backend = Arc::new(StubWarehouse::retail(customer_rows(2)));
    let plan = QueryPlan {
        tables: vec!["DIM_CUSTOMER".into()],
        columns: vec![ColumnRef::new("DIM_CUSTOMER", "customer_name")],
        ..Default::default()
    };
    let h = harness(
        RETAIL_MODEL,
        backend,
        Arc::new(ScriptedPlanner::new(vec!["DIM_CUSTOMER"], plan)),
        vec![],
    ).await;

    let session = open_session(&h.sessions, "log").await;
    h.controller
        .handle_turn(&session, "Show customers", &EventSink::detached())
        .await
        .unwrap();
    h.controller
        .handle_turn(&session, "Show customers again", &EventSink::detached())
        .await
        .unwrap();

    let turns = h.sessions.turns("log", 100, 0).await.unwrap();
    // user/assistant pairs, in order, numbered 1..=4.
    assert_eq!(turns.len(), 4);
    let numbers: Vec<u64> = turns.iter().map(|t| t.turn_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
}
