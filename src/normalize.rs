// Row normalization: heterogeneous table rows become canonical player
// records ready for JSON serialization.
//
// Pure transformation. Input order is preserved; the ordering policy was
// already applied by the query. A row that lacks a column its schema
// declares is an internal-consistency fault (the registry and the actual
// table have drifted) and is surfaced as an error, never defaulted away.

use rusqlite::types::Value as SqlValue;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::query::{Projection, SqlRow};
use crate::schema::{FieldKind, Position};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaMismatch {
    #[error("row is missing expected column `{column}`")]
    MissingColumn { column: String },

    #[error("column `{column}` held a {found} value where {expected} was expected")]
    WrongType {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("row carries unrecognized position tag `{tag}`")]
    UnknownTag { tag: String },
}

/// The canonical API-facing record. Synthesized per request, never stored.
///
/// `stats` holds the position-appropriate stat fields (empty under the
/// summary projection) and is flattened into the JSON object alongside the
/// identity fields.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayerRecord {
    pub name: String,
    pub position: String,
    pub team: Option<String>,
    #[serde(flatten)]
    pub stats: serde_json::Map<String, JsonValue>,
    pub total_points: f64,
}

/// Convert executed rows into canonical records, in input order.
pub fn normalize(rows: &[SqlRow], projection: Projection) -> Result<Vec<PlayerRecord>, SchemaMismatch> {
    rows.iter().map(|row| normalize_row(row, projection)).collect()
}

fn normalize_row(row: &SqlRow, projection: Projection) -> Result<PlayerRecord, SchemaMismatch> {
    // The position column is a registry literal carried through the query,
    // so it both tags the record and selects the stat shape for full rows.
    let tag = required_text(row, "position")?;
    let name = required_text(row, "playername")?;
    let team = optional_text(row, "team")?;
    let total_points = fractional(row, "totalpoints")?;

    let mut stats = serde_json::Map::new();
    if projection == Projection::Full {
        let position =
            Position::parse(&tag).map_err(|_| SchemaMismatch::UnknownTag { tag: tag.clone() })?;
        for spec in position.schema().stat_columns {
            let value = match spec.kind {
                FieldKind::Counting => JsonValue::from(counting(row, spec.column)?),
                FieldKind::Fractional => JsonValue::from(fractional(row, spec.column)?),
            };
            stats.insert(spec.field.to_string(), value);
        }
    }

    Ok(PlayerRecord {
        name,
        position: tag,
        team,
        stats,
        total_points,
    })
}

// ---------------------------------------------------------------------------
// Per-column coercion
// ---------------------------------------------------------------------------

fn get<'r>(row: &'r SqlRow, column: &str) -> Result<&'r SqlValue, SchemaMismatch> {
    row.get(column).ok_or_else(|| SchemaMismatch::MissingColumn {
        column: column.to_string(),
    })
}

fn type_name(value: &SqlValue) -> &'static str {
    match value {
        SqlValue::Null => "null",
        SqlValue::Integer(_) => "integer",
        SqlValue::Real(_) => "real",
        SqlValue::Text(_) => "text",
        SqlValue::Blob(_) => "blob",
    }
}

/// Whole-number stat: null becomes 0, fractional storage is truncated.
fn counting(row: &SqlRow, column: &str) -> Result<i64, SchemaMismatch> {
    match get(row, column)? {
        SqlValue::Null => Ok(0),
        SqlValue::Integer(v) => Ok(*v),
        SqlValue::Real(v) => Ok(*v as i64),
        other => Err(SchemaMismatch::WrongType {
            column: column.to_string(),
            expected: "a number",
            found: type_name(other),
        }),
    }
}

/// Fractional stat: null becomes 0.0, integer storage widens losslessly.
fn fractional(row: &SqlRow, column: &str) -> Result<f64, SchemaMismatch> {
    match get(row, column)? {
        SqlValue::Null => Ok(0.0),
        SqlValue::Integer(v) => Ok(*v as f64),
        SqlValue::Real(v) => Ok(*v),
        other => Err(SchemaMismatch::WrongType {
            column: column.to_string(),
            expected: "a number",
            found: type_name(other),
        }),
    }
}

fn required_text(row: &SqlRow, column: &str) -> Result<String, SchemaMismatch> {
    match get(row, column)? {
        SqlValue::Text(s) => Ok(s.clone()),
        other => Err(SchemaMismatch::WrongType {
            column: column.to_string(),
            expected: "text",
            found: type_name(other),
        }),
    }
}

/// Identity field that may legitimately be unset: a null stays `None`, it
/// never becomes an empty string.
fn optional_text(row: &SqlRow, column: &str) -> Result<Option<String>, SchemaMismatch> {
    match get(row, column)? {
        SqlValue::Null => Ok(None),
        SqlValue::Text(s) => Ok(Some(s.clone())),
        other => Err(SchemaMismatch::WrongType {
            column: column.to_string(),
            expected: "text or null",
            found: type_name(other),
        }),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
