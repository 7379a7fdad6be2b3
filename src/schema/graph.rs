use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::semantic::{RelationshipDef, SemanticModel, TableDef};

/// One edge of a resolved join path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinHop {
    pub source_table: String,
    pub target_table: String,
    /// Declared column pairs, source column to target column
    pub columns: Vec<(String, String)>,
}

/// A resolved join specification between two tables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinPath {
    /// Tables visited, starting table first
    pub tables: Vec<String>,
    /// Hops in traversal order; empty when start and end coincide
    pub hops: Vec<JoinHop>,
}

#[derive(Debug)]
struct Edge {
    target: usize,
    columns: Vec<(String, String)>,
}

/// Semantic schema graph
///
/// Tables are nodes, declared relationships are directed edges. Immutable
/// after construction.
#[derive(Debug)]
pub struct SchemaGraph {
    model: SemanticModel,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<Edge>>,
}

impl SchemaGraph {
    /// Build the graph from a semantic model document
    ///
    /// Fails when a relationship references an unknown table or declares
    /// no join-column pair.
    pub fn new(model: SemanticModel) -> Result<Self> {
        let mut index = HashMap::with_capacity(model.tables.len());
        for (i, table) in model.tables.iter().enumerate() {
            let key = table.table_name.to_ascii_lowercase();
            if index.insert(key, i).is_some() {
                return Err(AppError::Validation(format!(
                    "duplicate table in semantic model: {}",
                    table.table_name
                )));
            }
        }

        let mut adjacency: Vec<Vec<Edge>> = Vec::with_capacity(model.tables.len());
        for table in &model.tables {
            let mut edges = Vec::with_capacity(table.relationships.len());
            for rel in &table.relationships {
                let target = *index
                    .get(&rel.related_table.to_ascii_lowercase())
                    .ok_or_else(|| {
                        AppError::Validation(format!(
                            "relationship of {} references unknown table {}",
                            table.table_name, rel.related_table
                        ))
                    })?;
                if rel.join_columns.is_empty() {
                    return Err(AppError::Validation(format!(
                        "relationship {} -> {} declares no join columns",
                        table.table_name, rel.related_table
                    )));
                }
                edges.push(Edge {
                    target,
                    columns: rel
                        .join_columns
                        .iter()
                        .map(|(s, t)| (s.clone(), t.clone()))
                        .collect(),
                });
            }
            adjacency.push(edges);
        }

        Ok(Self {
            model,
            index,
            adjacency,
        })
    }

    /// The underlying semantic model
    pub fn model(&self) -> &SemanticModel {
        &self.model
    }

    /// Look up a table by name, case-insensitively
    pub fn lookup_table(&self, name: &str) -> Result<&TableDef> {
        self.index
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.model.tables[i])
            .ok_or_else(|| AppError::NotFound(format!("table not in semantic model: {}", name)))
    }

    /// Declared relationships of a table, in declaration order
    pub fn relationships_of(&self, table_name: &str) -> Result<&[RelationshipDef]> {
        self.lookup_table(table_name)
            .map(|t| t.relationships.as_slice())
    }

    /// Resolve the join specification between two tables
    ///
    /// Breadth-first search over declared relationship edges; the first
    /// path found (shortest by hop count) wins, and neighbors expand in
    /// declaration order so equal-length alternatives resolve
    /// deterministically. The declared join columns are used verbatim even
    /// when endpoint column names differ textually. No path at all signals
    /// `AmbiguousJoin`; the caller decides whether to fall back to
    /// name/type matching.
    pub fn resolve_join_path(&self, table_a: &str, table_b: &str) -> Result<JoinPath> {
        let start = *self
            .index
            .get(&table_a.to_ascii_lowercase())
            .ok_or_else(|| AppError::NotFound(format!("table not in semantic model: {}", table_a)))?;
        let goal = *self
            .index
            .get(&table_b.to_ascii_lowercase())
            .ok_or_else(|| AppError::NotFound(format!("table not in semantic model: {}", table_b)))?;

        if start == goal {
            return Ok(JoinPath {
                tables: vec![self.model.tables[start].table_name.clone()],
                hops: Vec::new(),
            });
        }

        let mut parent: Vec<Option<(usize, usize)>> = vec![None; self.model.tables.len()];
        let mut visited = vec![false; self.model.tables.len()];
        let mut queue = VecDeque::new();

        visited[start] = true;
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            for (edge_idx, edge) in self.adjacency[node].iter().enumerate() {
                if visited[edge.target] {
                    continue;
                }
                visited[edge.target] = true;
                parent[edge.target] = Some((node, edge_idx));
                if edge.target == goal {
                    return Ok(self.reconstruct(start, goal, &parent));
                }
                queue.push_back(edge.target);
            }
        }

        Err(AppError::AmbiguousJoin(format!(
            "no declared relationship path between {} and {}",
            table_a, table_b
        )))
    }

    fn reconstruct(&self, start: usize, goal: usize, parent: &[Option<(usize, usize)>]) -> JoinPath {
        let mut rev_hops = Vec::new();
        let mut node = goal;
        while node != start {
            let (prev, edge_idx) = parent[node].expect("parent chain is complete");
            let edge = &self.adjacency[prev][edge_idx];
            rev_hops.push(JoinHop {
                source_table: self.model.tables[prev].table_name.clone(),
                target_table: self.model.tables[edge.target].table_name.clone(),
                columns: edge.columns.clone(),
            });
            node = prev;
        }
        rev_hops.reverse();

        let mut tables = vec![self.model.tables[start].table_name.clone()];
        tables.extend(rev_hops.iter().map(|h| h.target_table.clone()));

        JoinPath {
            tables,
            hops: rev_hops,
        }
    }
}
