// Query construction: a validated request becomes a QuerySpec, and the
// QuerySpec renders to one parameterized SQL statement at execution time.
//
// Table identifiers and position tags are taken from the schema registry
// only; request input reaches the database exclusively through bound
// parameters.

use rusqlite::types::Value;
use thiserror::Error;

use crate::schema::{Position, PositionSelector, ALL_POSITIONS, VALID_TAGS};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("search requires a non-empty name")]
    EmptySearchTerm,

    #[error("name search cannot target the DEF aggregate; use one of {VALID_TAGS} or drop the position filter")]
    SearchAcrossAggregate,
}

/// One result row: column name to loosely typed SQL value. Produced by the
/// store when executing a spec, consumed by the normalizer.
pub type SqlRow = std::collections::HashMap<String, Value>;

/// Which columns a query projects.
///
/// Single-table queries (and the DEF union, whose three tables share one
/// shape) project the full stat set. Fan-outs across heterogeneous tables
/// project only the fields every table has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Full,
    Summary,
}

/// The (at most one) filter predicate applied to every target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    All,
    TeamEquals(String),
    NameContains(String),
}

/// A fully validated query: target tables, filter, projection. Ordering is
/// fixed policy (total points descending, rank ascending as the stable
/// tie-break) and is applied at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub segments: Vec<Position>,
    pub filter: RowFilter,
    pub projection: Projection,
}

impl QuerySpec {
    /// All rows of one position group, or the LB+DL+DB union for the
    /// defensive aggregate.
    pub fn by_position(selector: PositionSelector) -> QuerySpec {
        QuerySpec {
            segments: selector.groups(),
            filter: RowFilter::All,
            projection: Projection::Full,
        }
    }

    /// Roster lookup: every position table filtered by exact team code.
    pub fn by_team(team_code: &str) -> QuerySpec {
        QuerySpec {
            segments: ALL_POSITIONS.to_vec(),
            filter: RowFilter::TeamEquals(team_code.to_string()),
            projection: Projection::Summary,
        }
    }

    /// Case-insensitive substring search on player name, either scoped to
    /// one real group or fanned out across all eight tables. Scoping to the
    /// DEF aggregate is rejected: name search operates on one backing table
    /// or the full fan-out, never a partial union.
    pub fn search_by_name(
        term: &str,
        scope: Option<PositionSelector>,
    ) -> Result<QuerySpec, QueryError> {
        if term.trim().is_empty() {
            return Err(QueryError::EmptySearchTerm);
        }
        let (segments, projection) = match scope {
            None => (ALL_POSITIONS.to_vec(), Projection::Summary),
            Some(PositionSelector::Single(pos)) => (vec![pos], Projection::Full),
            Some(PositionSelector::Defense) => return Err(QueryError::SearchAcrossAggregate),
        };
        Ok(QuerySpec {
            segments,
            filter: RowFilter::NameContains(term.to_string()),
            projection,
        })
    }

    /// Render to SQL text plus the bound parameter list.
    ///
    /// Each segment becomes one SELECT carrying its registry tag as a
    /// literal `position` column; multi-segment specs are merged with
    /// UNION ALL inside a subselect so the ordering expression can apply to
    /// the combined result.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let (where_sql, params) = match &self.filter {
            RowFilter::All => ("", Vec::new()),
            RowFilter::TeamEquals(code) => {
                (" WHERE team = ?1", vec![Value::Text(code.clone())])
            }
            RowFilter::NameContains(term) => (
                " WHERE LOWER(playername) LIKE ?1 ESCAPE '\\'",
                vec![Value::Text(like_pattern(term))],
            ),
        };

        let selects: Vec<String> = self
            .segments
            .iter()
            .map(|pos| {
                let schema = pos.schema();
                let mut columns: Vec<String> =
                    vec!["playername".to_string(), "team".to_string()];
                if self.projection == Projection::Full {
                    columns.extend(schema.stat_columns.iter().map(|c| c.column.to_string()));
                }
                columns.push("totalpoints".to_string());
                columns.push("rank".to_string());
                columns.push(format!("'{}' AS position", schema.tag));
                format!(
                    "SELECT {} FROM {}{}",
                    columns.join(", "),
                    schema.table,
                    where_sql
                )
            })
            .collect();

        const ORDERING: &str = "ORDER BY COALESCE(totalpoints, 0) DESC, rank ASC";
        let sql = if selects.len() == 1 {
            format!("{} {}", selects[0], ORDERING)
        } else {
            format!("SELECT * FROM ({}) {}", selects.join(" UNION ALL "), ORDERING)
        };

        (sql, params)
    }
}

/// Build the bound LIKE pattern for a substring search: lower-cased, with
/// LIKE wildcards escaped so the caller's text always matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
