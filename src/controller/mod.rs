//! Query construction controller
//!
//! The orchestration state machine that turns an analyst question into a
//! validated read-only SQL statement, executes it, analyzes the result and
//! streams the answer. Structural obligations (identifier quoting, row
//! caps, read-only enforcement, retry budgets, join-resolution fallback
//! order) are encoded here, independent of whichever language model drives
//! the planning.

pub mod analyze;
pub mod compose;
pub mod events;
pub mod machine;
pub mod plan;
pub mod planner;
pub mod validate;

pub use analyze::{ResultAnalysis, analyze_result};
pub use events::{ChatEvent, EventSink};
pub use machine::{ControllerState, OutcomeKind, QueryController, TurnOutcome};
pub use plan::{Aggregate, AggregateFunc, ColumnRef, Filter, FilterOp, OrderBy, OrderKey, PlanningContext, QueryPlan};
pub use planner::{KeywordPlanner, QueryPlanner};
