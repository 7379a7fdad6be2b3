//! The query construction state machine
//!
//! Start → IdentifyTables → RetrieveMetadata → ResolveJoins → ComposeQuery
//! → ValidateQuery → Execute → Analyze → Present → AwaitFollowup, with a
//! Clarify edge from every stage that cannot proceed. Retry budgets are
//! fixed; exhausting one asks the user instead of looping or failing
//! silently.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::config::QueryConfig;
use crate::error::{AppError, Result};
use crate::knowledge::KnowledgeIndex;
use crate::models::knowledge::KnowledgeSnippet;
use crate::models::session::Session;
use crate::models::turn::Turn;
use crate::schema::{JoinHop, SchemaGraph};
use crate::services::session::{SessionHistory, SessionService};
use crate::tools::{QueryResult, SqlBackend, TableSchema, ToolCallRecorder, ToolExecutor, WarehouseTools};

use super::analyze::{analyze_result, narrative, ResultAnalysis};
use super::compose;
use super::events::EventSink;
use super::plan::{PlanningContext, QueryPlan};
use super::planner::QueryPlanner;
use super::validate::{confirm_identifiers, match_columns, validate_statement};

/// Stages of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Start,
    IdentifyTables,
    RetrieveMetadata,
    ResolveJoins,
    ComposeQuery,
    ValidateQuery,
    Execute,
    Analyze,
    Present,
    AwaitFollowup,
    Clarify,
    End,
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Query executed, analysis presented
    Answered,
    /// The controller needs more information from the user
    Clarification,
    /// A forbidden operation was attempted; no retry
    Refused,
    /// The user declined the follow-up offer
    Closed,
}

/// Final result of one turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub kind: OutcomeKind,
    pub answer: String,
    pub sql: Option<String>,
    pub analysis: Option<ResultAnalysis>,
}

const FOLLOWUP_OFFER: &str =
    "Was the result okay? I can refine the query or fix any problems if you say yes.";

/// The query construction controller
pub struct QueryController {
    schema: Arc<SchemaGraph>,
    planner: Arc<dyn QueryPlanner>,
    sessions: Arc<dyn SessionService>,
    backend: Arc<dyn SqlBackend>,
    knowledge: Arc<dyn KnowledgeIndex>,
    config: QueryConfig,
    knowledge_top_k: usize,
}

impl QueryController {
    pub fn new(
        schema: Arc<SchemaGraph>,
        planner: Arc<dyn QueryPlanner>,
        sessions: Arc<dyn SessionService>,
        backend: Arc<dyn SqlBackend>,
        knowledge: Arc<dyn KnowledgeIndex>,
        config: QueryConfig,
        knowledge_top_k: usize,
    ) -> Self {
        Self {
            schema,
            planner,
            sessions,
            backend,
            knowledge,
            config,
            knowledge_top_k,
        }
    }

    /// Process one user turn to completion
    ///
    /// Appends the user turn, drives the state machine, streams events to
    /// `sink`, appends the assistant turn with its tool-call records, and
    /// returns the outcome.
    pub async fn handle_turn(
        &self,
        session: &Session,
        question: &str,
        sink: &EventSink,
    ) -> Result<TurnOutcome> {
        self.sessions
            .append_turn(&session.id, Turn::user(&session.id, 0, question))
            .await?;

        let recorder = ToolCallRecorder::new();
        let tools = WarehouseTools::new(
            self.backend.clone(),
            self.knowledge.clone(),
            Arc::new(SessionHistory::new(self.sessions.clone(), &session.id)),
            recorder.clone(),
            self.knowledge_top_k,
        );

        let outcome = if let Some(reply) = self.followup_reply(session, question).await? {
            sink.content(&reply.answer).await;
            reply
        } else {
            self.run_pipeline(session, question, &tools, &recorder, sink, None)
                .await?
        };

        let mut turn = Turn::assistant(&session.id, 0, &outcome.answer);
        turn.tool_calls = recorder.drain();
        self.sessions.append_turn(&session.id, turn).await?;

        sink.terminal().await;
        Ok(outcome)
    }

    /// Handle yes/no replies to the follow-up offer
    async fn followup_reply(&self, session: &Session, question: &str) -> Result<Option<TurnOutcome>> {
        let prior_sql = self.last_presented_sql(session).await?;
        if prior_sql.is_none() {
            return Ok(None);
        }

        if is_negative(question) {
            let answer =
                "Understood, leaving the result as it is. Ask me whenever the next question comes up.";
            return Ok(Some(TurnOutcome {
                kind: OutcomeKind::Closed,
                answer: answer.to_string(),
                sql: None,
                analysis: None,
            }));
        }

        Ok(None)
    }

    /// The most recent successfully executed statement of this session
    async fn last_presented_sql(&self, session: &Session) -> Result<Option<String>> {
        let history = self
            .sessions
            .tool_call_history(&session.id, self.config.history_window)
            .await?;
        Ok(history
            .iter()
            .rev()
            .find(|c| c.tool_name == "run_query" && c.result_summary.ends_with("rows"))
            .and_then(|c| c.argument("sql").map(|s| s.to_string())))
    }

    async fn run_pipeline(
        &self,
        session: &Session,
        question: &str,
        tools: &WarehouseTools,
        recorder: &ToolCallRecorder,
        sink: &EventSink,
        mut repair_seed: Option<String>,
    ) -> Result<TurnOutcome> {
        let mut state = ControllerState::Start;

        // A bare affirmative re-enters composition against the previous
        // question, repairing the statement recovered from the history.
        let mut effective_question = question.to_string();
        if is_affirmative(question) {
            if let Some(prior) = self.recover_prior_statement(tools, recorder, sink).await? {
                if let Some(previous_question) = self.previous_user_question(session).await? {
                    info!(session = %session.id, "re-entering composition to repair prior statement");
                    effective_question = previous_question;
                    repair_seed = Some(prior);
                }
            }
        }

        // IdentifyTables
        state = self.transition(state, ControllerState::IdentifyTables);
        let proposed = self
            .planner
            .identify_tables(&effective_question, self.schema.model())
            .await?;
        let tables: Vec<String> = proposed
            .iter()
            .filter_map(|t| {
                self.schema
                    .lookup_table(t)
                    .map(|def| def.table_name.clone())
                    .ok()
            })
            .collect();
        if tables.is_empty() {
            let _ = self.transition(state, ControllerState::Clarify);
            return Ok(self
                .clarify(
                    sink,
                    "I couldn't match the question to any table in the semantic model. \
                     Could you name the data you are interested in, such as sales, \
                     inventory, customers, promotions or suppliers?",
                )
                .await);
        }
        debug!(tables = ?tables, "candidate tables identified");

        // RetrieveMetadata: rules and sample queries per candidate table
        state = self.transition(state, ControllerState::RetrieveMetadata);
        let mut snippets: Vec<KnowledgeSnippet> = Vec::new();
        for table in &tables {
            match tools.search_knowledge_base(table).await {
                Ok(found) => snippets.extend(found),
                Err(e) => warn!(table = table.as_str(), "knowledge retrieval failed: {}", e),
            }
            self.emit_last_tool_call(recorder, sink).await;
        }

        // Authoritative schemas for every candidate table
        let mut schemas: HashMap<String, TableSchema> = HashMap::new();
        for table in &tables {
            match tools.describe_table(table).await {
                Ok(schema) => {
                    schemas.insert(schema.table_name.to_ascii_uppercase(), schema);
                }
                Err(AppError::NotFound(_)) => {
                    self.emit_last_tool_call(recorder, sink).await;
                    let _ = self.transition(state, ControllerState::Clarify);
                    return Ok(self
                        .clarify(
                            sink,
                            &format!(
                                "The semantic model names {}, but the warehouse doesn't expose it. \
                                 Should I use a different table?",
                                table
                            ),
                        )
                        .await);
                }
                Err(e) => return Err(e),
            }
            self.emit_last_tool_call(recorder, sink).await;
        }

        // ResolveJoins
        state = self.transition(state, ControllerState::ResolveJoins);
        let hops = match self.resolve_joins(&tables, &schemas) {
            Ok(hops) => hops,
            Err(clarification) => {
                let _ = self.transition(state, ControllerState::Clarify);
                return Ok(self.clarify(sink, &clarification).await);
            }
        };

        // ComposeQuery → ValidateQuery → Execute, bounded retries
        let ctx = PlanningContext {
            question: effective_question.clone(),
            tables: tables.clone(),
            snippets,
            schemas: schemas.clone(),
            default_row_limit: self.config.default_row_limit,
        };

        let mut plan = match &repair_seed {
            Some(prior) => {
                self.planner
                    .repair_plan(&ctx, prior, "the analyst asked for the previous query to be revised")
                    .await?
            }
            None => self.planner.build_plan(&ctx).await?,
        };

        let mut compose_attempts: u32 = 0;
        let mut execute_attempts: u32 = 0;
        let (sql, result) = loop {
            state = self.transition(state, ControllerState::ComposeQuery);
            state = self.transition(state, ControllerState::ValidateQuery);

            let rendered = match self.validate(&mut plan, &mut schemas, tools, &hops).await {
                Ok(sql) => sql,
                Err(e) => {
                    compose_attempts += 1;
                    if compose_attempts > self.config.max_retries {
                        let _ = self.transition(state, ControllerState::Clarify);
                        return Ok(self
                            .clarify(
                                sink,
                                &format!(
                                    "I couldn't compose a valid query: {}. \
                                     Could you rephrase or name the columns you need?",
                                    e
                                ),
                            )
                            .await);
                    }
                    debug!(attempt = compose_attempts, "composition rejected: {}", e);
                    plan = self.planner.repair_plan(&ctx, "", &e.to_string()).await?;
                    continue;
                }
            };

            state = self.transition(state, ControllerState::Execute);
            let cap = if plan.all_rows {
                None
            } else {
                Some(plan.row_limit.unwrap_or(self.config.default_row_limit))
            };
            match tools.run_query(&rendered, cap).await {
                Ok(result) => {
                    self.emit_last_tool_call(recorder, sink).await;
                    break (rendered, result);
                }
                Err(AppError::ForbiddenOperation(m)) => {
                    // Never retried.
                    self.emit_last_tool_call(recorder, sink).await;
                    let answer = format!(
                        "I refused to run that statement: {}. Only read-only queries are executed.",
                        m
                    );
                    sink.content(&answer).await;
                    return Ok(TurnOutcome {
                        kind: OutcomeKind::Refused,
                        answer,
                        sql: Some(rendered),
                        analysis: None,
                    });
                }
                Err(e) => {
                    self.emit_last_tool_call(recorder, sink).await;
                    execute_attempts += 1;
                    if execute_attempts > self.config.max_retries {
                        let _ = self.transition(state, ControllerState::Clarify);
                        return Ok(self
                            .clarify(
                                sink,
                                &format!(
                                    "The query kept failing ({}). Could you point me at the right \
                                     columns or narrow the question?",
                                    e
                                ),
                            )
                            .await);
                    }
                    debug!(attempt = execute_attempts, "execution failed, repairing: {}", e);
                    plan = self.planner.repair_plan(&ctx, &rendered, &e.to_string()).await?;
                }
            }
        };

        // Analyze always runs before Present.
        state = self.transition(state, ControllerState::Analyze);
        let expected = if plan.all_rows {
            None
        } else {
            Some(plan.row_limit.unwrap_or(self.config.default_row_limit))
        };
        let analysis = analyze_result(&result, expected);

        // Present: the answer, the exact SQL, the analysis narrative.
        state = self.transition(state, ControllerState::Present);
        let table_text = render_rows(&result);
        let sql_block = format!("```sql\n{}\n```", sql);
        let analysis_text = narrative(&analysis);

        sink.content(&table_text).await;
        sink.content(&format!("\n\n{}\n\n", sql_block)).await;
        sink.content(&analysis_text).await;
        sink.content(&format!("\n\n{}", FOLLOWUP_OFFER)).await;

        let answer = format!(
            "{}\n\n{}\n\n{}\n\n{}",
            table_text, sql_block, analysis_text, FOLLOWUP_OFFER
        );

        state = self.transition(state, ControllerState::AwaitFollowup);
        let _ = self.transition(state, ControllerState::End);

        Ok(TurnOutcome {
            kind: OutcomeKind::Answered,
            answer,
            sql: Some(sql),
            analysis: Some(analysis),
        })
    }

    /// Declared relationships first; name/type matching as fallback;
    /// clarification text when neither works.
    fn resolve_joins(
        &self,
        tables: &[String],
        schemas: &HashMap<String, TableSchema>,
    ) -> std::result::Result<Vec<JoinHop>, String> {
        let mut hops: Vec<JoinHop> = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let primary = &tables[0];

        for other in &tables[1..] {
            match self.schema.resolve_join_path(primary, other) {
                Ok(path) => {
                    for hop in path.hops {
                        let key = (hop.source_table.clone(), hop.target_table.clone());
                        if seen.insert(key) {
                            hops.push(hop);
                        }
                    }
                }
                Err(AppError::AmbiguousJoin(_)) => {
                    let a = &schemas[&primary.to_ascii_uppercase()];
                    let b = &schemas[&other.to_ascii_uppercase()];
                    let columns = match_columns(a, b);
                    if columns.is_empty() {
                        return Err(format!(
                            "I can't infer how to join {} with {}: no declared relationship and \
                             no columns share both name and type. Which columns should the join \
                             use?",
                            primary, other
                        ));
                    }
                    info!(
                        source = primary.as_str(),
                        target = other.as_str(),
                        "no declared relationship, joining on name/type matches"
                    );
                    let key = (primary.clone(), other.clone());
                    if seen.insert(key) {
                        hops.push(JoinHop {
                            source_table: primary.clone(),
                            target_table: other.clone(),
                            columns,
                        });
                    }
                }
                Err(e) => return Err(e.to_string()),
            }
        }

        Ok(hops)
    }

    async fn validate(
        &self,
        plan: &mut QueryPlan,
        schemas: &mut HashMap<String, TableSchema>,
        tools: &WarehouseTools,
        hops: &[JoinHop],
    ) -> Result<String> {
        confirm_identifiers(plan, schemas, tools).await?;
        let sql = compose::render(plan, hops, self.config.default_row_limit)?;
        validate_statement(&sql, plan.all_rows)?;
        Ok(sql)
    }

    async fn recover_prior_statement(
        &self,
        tools: &WarehouseTools,
        recorder: &ToolCallRecorder,
        sink: &EventSink,
    ) -> Result<Option<String>> {
        let history = tools
            .get_tool_call_history(self.config.history_window)
            .await?;
        self.emit_last_tool_call(recorder, sink).await;
        Ok(history
            .iter()
            .rev()
            .find(|c| c.tool_name == "run_query" && c.result_summary.ends_with("rows"))
            .and_then(|c| c.argument("sql").map(|s| s.to_string())))
    }

    async fn previous_user_question(&self, session: &Session) -> Result<Option<String>> {
        let turns = self.sessions.turns(&session.id, 1000, 0).await?;
        // The current user turn is already appended; skip it.
        Ok(turns
            .iter()
            .rev()
            .filter(|t| t.role == crate::models::turn::Role::User)
            .nth(1)
            .map(|t| t.content.clone()))
    }

    async fn clarify(&self, sink: &EventSink, question: &str) -> TurnOutcome {
        sink.content(question).await;
        TurnOutcome {
            kind: OutcomeKind::Clarification,
            answer: question.to_string(),
            sql: None,
            analysis: None,
        }
    }

    async fn emit_last_tool_call(&self, recorder: &ToolCallRecorder, sink: &EventSink) {
        let calls = recorder.snapshot();
        if let Some(call) = calls.last() {
            sink.tool_call(&call.tool_name, &call.result_summary).await;
        }
    }

    fn transition(&self, from: ControllerState, to: ControllerState) -> ControllerState {
        debug!(from = %from, to = %to, "controller transition");
        to
    }
}

/// Compact markdown rendering of the result rows
fn render_rows(result: &QueryResult) -> String {
    const PREVIEW: usize = 10;

    if result.rows.is_empty() {
        return "The query returned no rows.".to_string();
    }

    let columns: Vec<&String> = result.rows[0].keys().collect();
    let mut lines = Vec::new();
    lines.push(format!(
        "| {} |",
        columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(" | ")
    ));
    lines.push(format!("|{}|", vec![" --- "; columns.len()].join("|")));

    for row in result.rows.iter().take(PREVIEW) {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| match row.get(*c) {
                Some(serde_json::Value::Null) | None => "".to_string(),
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    if result.rows.len() > PREVIEW {
        lines.push(format!("... {} more row(s)", result.rows.len() - PREVIEW));
    }

    lines.join("\n")
}

/// A bare agreement to the follow-up offer
fn is_affirmative(question: &str) -> bool {
    let q = question.trim().to_ascii_lowercase();
    matches!(
        q.as_str(),
        "yes" | "yes please" | "yeah" | "yep" | "sure" | "ok" | "okay" | "please fix" | "fix it"
    ) || q.starts_with("yes,")
}

/// A bare refusal of the follow-up offer
fn is_negative(question: &str) -> bool {
    let q = question.trim().to_ascii_lowercase();
    matches!(
        q.as_str(),
        "no" | "no thanks" | "no thank you" | "nope" | "all good" | "that's all" | "thats all"
    )
}
