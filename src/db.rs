// SQLite store for the per-position season-stat tables.
//
// The API path is read-only; writes happen only through the fixture
// loader. DDL and insert statements are generated from the schema registry
// so the registry stays the single source of truth for table shapes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{ensure, Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use crate::query::{QuerySpec, SqlRow};
use crate::schema::{FieldKind, Position, TableSchema, ALL_POSITIONS};

/// The seam between query construction and execution. The service layer
/// talks to this trait so tests can substitute a counting or canned-row
/// double for the real database.
pub trait Store: Send + Sync {
    /// Execute a spec and return its rows as column-name/value maps, in
    /// the order the query produced them.
    fn fetch(&self, spec: &QuerySpec) -> Result<Vec<SqlRow>>;

    /// Trivial round trip to check the store is reachable.
    fn ping(&self) -> Result<()>;
}

/// A team reference row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub code: String,
    pub name: String,
    pub division: Option<String>,
}

/// One stat row ready for insertion. `stats` is aligned with the target
/// schema's `stat_columns`; counting columns are written as integers.
#[derive(Debug, Clone)]
pub struct StatRowInsert {
    pub player_id: String,
    pub name: String,
    pub team: Option<String>,
    pub stats: Vec<f64>,
    pub total_points: f64,
    pub rank: i64,
}

/// SQLite-backed store. A single connection behind a mutex; callers run
/// blocking operations on the runtime's blocking pool.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path` and ensure the teams table
    /// and all eight position tables exist. Pass `":memory:"` for an
    /// ephemeral database (useful for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        let mut ddl = String::from(
            "CREATE TABLE IF NOT EXISTS teams (
                team_code TEXT PRIMARY KEY,
                team_name TEXT NOT NULL,
                division  TEXT
            );\n",
        );
        for pos in ALL_POSITIONS {
            ddl.push_str(&create_table_sql(pos.schema()));
        }
        conn.execute_batch(&ddl)
            .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Insert or update team reference rows. Returns the number written.
    pub fn upsert_teams(&self, teams: &[Team]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin teams transaction")?;

        for team in teams {
            tx.execute(
                "INSERT INTO teams (team_code, team_name, division)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(team_code) DO UPDATE SET
                    team_name = excluded.team_name,
                    division  = excluded.division",
                params![team.code, team.name, team.division],
            )
            .with_context(|| format!("failed to upsert team {}", team.code))?;
        }

        tx.commit().context("failed to commit teams")?;
        Ok(teams.len())
    }

    /// Bulk-load stat rows for one position group in a single transaction.
    /// Re-loading the same player id overwrites the previous row.
    pub fn import_stats(&self, position: Position, rows: &[StatRowInsert]) -> Result<usize> {
        let schema = position.schema();
        let sql = insert_sql(schema);

        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;
        {
            let mut stmt = tx
                .prepare(&sql)
                .with_context(|| format!("failed to prepare insert for {}", schema.table))?;

            for row in rows {
                ensure!(
                    row.stats.len() == schema.stat_columns.len(),
                    "stat row for {} has {} values, schema expects {}",
                    schema.table,
                    row.stats.len(),
                    schema.stat_columns.len()
                );

                let mut values: Vec<Value> = Vec::with_capacity(row.stats.len() + 5);
                values.push(Value::Text(row.player_id.clone()));
                values.push(Value::Text(row.name.clone()));
                values.push(match &row.team {
                    Some(code) => Value::Text(code.clone()),
                    None => Value::Null,
                });
                for (spec, stat) in schema.stat_columns.iter().zip(&row.stats) {
                    values.push(match spec.kind {
                        FieldKind::Counting => Value::Integer(*stat as i64),
                        FieldKind::Fractional => Value::Real(*stat),
                    });
                }
                values.push(Value::Real(row.total_points));
                values.push(Value::Integer(row.rank));

                stmt.execute(params_from_iter(values))
                    .with_context(|| format!("failed to insert {} into {}", row.player_id, schema.table))?;
            }
        }
        tx.commit().context("failed to commit import")?;
        Ok(rows.len())
    }
}

impl Store for Database {
    fn fetch(&self, spec: &QuerySpec) -> Result<Vec<SqlRow>> {
        let (sql, query_params) = spec.to_sql();
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&sql)
            .context("failed to prepare stat query")?;

        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = stmt
            .query(params_from_iter(query_params))
            .context("failed to execute stat query")?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().context("failed to read stat row")? {
            let mut map = HashMap::with_capacity(column_names.len());
            for (idx, name) in column_names.iter().enumerate() {
                let value: Value = row
                    .get(idx)
                    .with_context(|| format!("failed to read column {name}"))?;
                map.insert(name.clone(), value);
            }
            out.push(map);
        }
        Ok(out)
    }

    fn ping(&self) -> Result<()> {
        let conn = self.conn();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .context("store did not answer the health round trip")?;
        Ok(())
    }
}

/// DDL for one position table, derived from its schema. Counting columns
/// are INTEGER, fractional columns REAL, matching the fixture shapes.
fn create_table_sql(schema: &TableSchema) -> String {
    let mut columns = vec![
        "playerid    TEXT PRIMARY KEY".to_string(),
        "playername  TEXT NOT NULL".to_string(),
        "team        TEXT REFERENCES teams(team_code)".to_string(),
    ];
    for spec in schema.stat_columns {
        let sql_type = match spec.kind {
            FieldKind::Counting => "INTEGER",
            FieldKind::Fractional => "REAL",
        };
        columns.push(format!("{} {}", spec.column, sql_type));
    }
    columns.push("totalpoints REAL".to_string());
    columns.push("rank INTEGER".to_string());

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);\n",
        schema.table,
        columns.join(",\n    ")
    )
}

/// Upsert statement for one position table, again registry-derived.
fn insert_sql(schema: &TableSchema) -> String {
    let mut columns = vec!["playerid", "playername", "team"];
    columns.extend(schema.stat_columns.iter().map(|c| c.column));
    columns.push("totalpoints");
    columns.push("rank");

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = columns
        .iter()
        .skip(1) // playerid is the conflict key
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})
         ON CONFLICT(playerid) DO UPDATE SET {}",
        schema.table,
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Projection;
    use crate::schema::PositionSelector;

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        let db = Database::open(":memory:").expect("in-memory database should open");
        db.upsert_teams(&[
            Team {
                code: "KC".to_string(),
                name: "Kansas City Chiefs".to_string(),
                division: Some("AFC West".to_string()),
            },
            Team {
                code: "BUF".to_string(),
                name: "Buffalo Bills".to_string(),
                division: Some("AFC East".to_string()),
            },
        ])
        .expect("teams should load");
        db
    }

    /// Helper: build a stat row with zeroed stats for the given position.
    fn stat_row(position: Position, id: &str, name: &str, team: Option<&str>, points: f64, rank: i64) -> StatRowInsert {
        StatRowInsert {
            player_id: id.to_string(),
            name: name.to_string(),
            team: team.map(|t| t.to_string()),
            stats: vec![0.0; position.schema().stat_columns.len()],
            total_points: points,
            rank,
        }
    }

    #[test]
    fn open_creates_all_tables() {
        let db = test_db();
        let conn = db.conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"teams".to_string()));
        for pos in ALL_POSITIONS {
            assert!(
                tables.contains(&pos.schema().table.to_string()),
                "missing {}",
                pos.schema().table
            );
        }
    }

    #[test]
    fn import_then_fetch_orders_by_points_then_rank() {
        let db = test_db();
        db.import_stats(
            Position::QB,
            &[
                stat_row(Position::QB, "qb1", "Second Best", Some("BUF"), 298.5, 2),
                stat_row(Position::QB, "qb2", "League Leader", Some("KC"), 310.2, 1),
                // Same points as qb1: rank breaks the tie.
                stat_row(Position::QB, "qb3", "Tied But Ranked Later", None, 298.5, 7),
            ],
        )
        .unwrap();

        let rows = db
            .fetch(&QuerySpec::by_position(PositionSelector::Single(Position::QB)))
            .unwrap();
        let names: Vec<&Value> = rows.iter().map(|r| &r["playername"]).collect();
        assert_eq!(
            names,
            vec![
                &Value::Text("League Leader".to_string()),
                &Value::Text("Second Best".to_string()),
                &Value::Text("Tied But Ranked Later".to_string()),
            ]
        );
    }

    #[test]
    fn null_points_sort_as_zero_without_being_rewritten() {
        let db = test_db();
        db.import_stats(
            Position::K,
            &[
                stat_row(Position::K, "k1", "Scoring Kicker", Some("KC"), 120.0, 1),
                stat_row(Position::K, "k2", "Unscored Kicker", None, 0.0, 2),
            ],
        )
        .unwrap();
        // Simulate an upstream points computation that has not run yet.
        db.conn()
            .execute("UPDATE k_stats SET totalpoints = NULL WHERE playerid = 'k2'", [])
            .unwrap();

        let rows = db
            .fetch(&QuerySpec::by_position(PositionSelector::Single(Position::K)))
            .unwrap();
        assert_eq!(rows[1]["playername"], Value::Text("Unscored Kicker".to_string()));
        // The stored value stays NULL; only the ordering treated it as zero.
        assert_eq!(rows[1]["totalpoints"], Value::Null);
    }

    #[test]
    fn team_fanout_merges_positions() {
        let db = test_db();
        db.import_stats(
            Position::QB,
            &[stat_row(Position::QB, "qb1", "KC QB", Some("KC"), 310.2, 1)],
        )
        .unwrap();
        db.import_stats(
            Position::K,
            &[stat_row(Position::K, "k1", "KC Kicker", Some("KC"), 142.0, 1)],
        )
        .unwrap();
        db.import_stats(
            Position::WR,
            &[stat_row(Position::WR, "wr1", "Buffalo WR", Some("BUF"), 200.0, 1)],
        )
        .unwrap();

        let rows = db.fetch(&QuerySpec::by_team("KC")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["position"], Value::Text("QB".to_string()));
        assert_eq!(rows[1]["position"], Value::Text("K".to_string()));
    }

    #[test]
    fn search_matches_substring_case_insensitively() {
        let db = test_db();
        db.import_stats(
            Position::QB,
            &[
                stat_row(Position::QB, "qb1", "Patrick Mahomes", Some("KC"), 310.2, 1),
                stat_row(Position::QB, "qb2", "Josh Allen", Some("BUF"), 305.0, 2),
            ],
        )
        .unwrap();

        let spec = QuerySpec::search_by_name("MAHO", None).unwrap();
        let rows = db.fetch(&spec).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["playername"], Value::Text("Patrick Mahomes".to_string()));
    }

    #[test]
    fn hostile_search_input_matches_nothing() {
        let db = test_db();
        db.import_stats(
            Position::QB,
            &[stat_row(Position::QB, "qb1", "Patrick Mahomes", Some("KC"), 310.2, 1)],
        )
        .unwrap();

        let spec = QuerySpec::search_by_name("%' OR '1'='1", None).unwrap();
        let rows = db.fetch(&spec).unwrap();
        assert!(rows.is_empty());

        // A literal percent in a name is still findable.
        db.import_stats(
            Position::QB,
            &[stat_row(Position::QB, "qb9", "Mr. 100% Healthy", None, 50.0, 9)],
        )
        .unwrap();
        let spec = QuerySpec::search_by_name("100% h", None).unwrap();
        let rows = db.fetch(&spec).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn fetch_projects_summary_columns_only_for_fanouts() {
        let db = test_db();
        db.import_stats(
            Position::QB,
            &[stat_row(Position::QB, "qb1", "KC QB", Some("KC"), 310.2, 1)],
        )
        .unwrap();

        let rows = db.fetch(&QuerySpec::by_team("KC")).unwrap();
        let row = &rows[0];
        assert!(row.contains_key("playername"));
        assert!(row.contains_key("totalpoints"));
        assert!(!row.contains_key("passingyards"));
    }

    #[test]
    fn def_union_carries_per_table_tags() {
        let db = test_db();
        db.import_stats(
            Position::LB,
            &[stat_row(Position::LB, "lb1", "Edge Rusher", Some("KC"), 188.5, 1)],
        )
        .unwrap();
        db.import_stats(
            Position::DB,
            &[stat_row(Position::DB, "db1", "Ballhawk Safety", Some("BUF"), 190.0, 1)],
        )
        .unwrap();

        let rows = db.fetch(&QuerySpec::by_position(PositionSelector::Defense)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["position"], Value::Text("DB".to_string()));
        assert_eq!(rows[1]["position"], Value::Text("LB".to_string()));
    }

    #[test]
    fn foreign_keys_reject_unknown_team_codes() {
        let db = test_db();
        let result = db.import_stats(
            Position::RB,
            &[stat_row(Position::RB, "rb1", "Phantom Back", Some("ZZZ"), 10.0, 1)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn reimporting_a_player_overwrites_the_row() {
        let db = test_db();
        db.import_stats(
            Position::TE,
            &[stat_row(Position::TE, "te1", "Travis Kelce", Some("KC"), 180.0, 1)],
        )
        .unwrap();
        db.import_stats(
            Position::TE,
            &[stat_row(Position::TE, "te1", "Travis Kelce", Some("KC"), 201.5, 1)],
        )
        .unwrap();

        let rows = db
            .fetch(&QuerySpec::by_position(PositionSelector::Single(Position::TE)))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["totalpoints"], Value::Real(201.5));
    }

    #[test]
    fn fetch_rows_normalize_cleanly() {
        let db = test_db();
        let mut row = stat_row(Position::LB, "lb1", "Half Sack Artist", Some("KC"), 90.5, 3);
        row.stats[2] = 11.5; // sacks
        db.import_stats(Position::LB, &[row]).unwrap();

        let spec = QuerySpec::by_position(PositionSelector::Single(Position::LB));
        let rows = db.fetch(&spec).unwrap();
        let records = crate::normalize::normalize(&rows, Projection::Full).unwrap();
        assert_eq!(records[0].stats["sacks"], serde_json::Value::from(11.5));
        assert_eq!(records[0].total_points, 90.5);
    }

    #[test]
    fn ping_answers_on_an_open_store() {
        let db = test_db();
        assert!(db.ping().is_ok());
    }
}
